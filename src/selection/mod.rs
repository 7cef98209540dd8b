//! Notification selection.

pub mod selector;

pub use selector::{SelectedNotification, Selector};
