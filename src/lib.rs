//! # proofpop-engine
//!
//! Social-proof notification engine: ingests raw activity from commerce,
//! payment, form, and review providers, normalizes it into a canonical
//! event vocabulary, and selects the single best notification to show a
//! visitor under targeting rules, frequency caps, and A/B tests.
//!
//! ## Architecture
//!
//! ```text
//! Providers (webhooks, polling)          Visitors (embed script)
//!     │                                      │
//!     ├── Webhook / Sync Handlers (api/)     ├── Select / Stats Handlers (api/)
//!     │                                      │
//!     ├── AdapterRegistry (providers/)       ├── Selector (selection/)
//!     ├── Normalizer → Dedup → Queue         ├── TargetingFilter (targeting/)
//!     │   (pipeline/)                        ├── ExperimentEvaluator (experiment/)
//!     │                                      │
//!     ├── EngineService (service/)  ── EventBus (domain/)
//!     │
//!     └── Store: Memory / PostgreSQL (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod experiment;
pub mod pipeline;
pub mod providers;
pub mod selection;
pub mod service;
pub mod store;
pub mod targeting;
