//! Campaign schedule evaluation in the campaign's own timezone.

use chrono::{DateTime, Datelike, Timelike, Utc};

use super::SkipReason;
use crate::domain::Schedule;

/// Checks whether `now` falls inside the campaign's schedule.
///
/// The instant is converted to the schedule's timezone first; both the
/// weekday and the time-of-day checks run on the converted local time.
/// An empty `active_days` set means never active; an empty `active_hours`
/// list means all 24 hours on active days.
#[must_use]
pub fn check_schedule(schedule: &Schedule, now: DateTime<Utc>) -> Option<SkipReason> {
    let local = now.with_timezone(&schedule.timezone);

    let weekday = u8::try_from(local.weekday().num_days_from_sunday()).unwrap_or(0);
    if !schedule.active_days.contains(&weekday) {
        return Some(SkipReason::OutsideActiveDays);
    }

    if schedule.active_hours.is_empty() {
        return None;
    }
    let time = local.time().with_nanosecond(0).unwrap_or_else(|| local.time());
    if schedule.active_hours.iter().any(|range| range.contains(time)) {
        None
    } else {
        Some(SkipReason::OutsideActiveHours)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::HourRange;
    use chrono::{NaiveTime, TimeZone};
    use chrono_tz::Europe::London;
    use chrono_tz::Tz;
    use std::collections::BTreeSet;

    fn nt(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
    }

    fn schedule(days: &[u8], hours: Vec<HourRange>) -> Schedule {
        Schedule {
            timezone: London,
            active_days: days.iter().copied().collect::<BTreeSet<_>>(),
            active_hours: hours,
        }
    }

    /// 2026-08-26 is a Wednesday (weekday 3).
    fn london_instant(h: u32, m: u32) -> DateTime<Utc> {
        let local = London
            .with_ymd_and_hms(2026, 8, 26, h, m, 0)
            .single()
            .unwrap_or_else(|| panic!("unambiguous local time"));
        local.with_timezone(&Utc)
    }

    #[test]
    fn business_hours_boundary() {
        let s = schedule(
            &[1, 2, 3, 4, 5],
            vec![HourRange {
                start: nt(9, 0),
                end: nt(17, 0),
            }],
        );
        assert_eq!(check_schedule(&s, london_instant(16, 59)), None);
        assert_eq!(
            check_schedule(&s, london_instant(17, 1)),
            Some(SkipReason::OutsideActiveHours)
        );
    }

    #[test]
    fn empty_active_days_is_never_active() {
        let s = schedule(&[], vec![]);
        assert_eq!(
            check_schedule(&s, london_instant(12, 0)),
            Some(SkipReason::OutsideActiveDays)
        );
    }

    #[test]
    fn empty_active_hours_means_all_day() {
        let s = schedule(&[3], vec![]);
        assert_eq!(check_schedule(&s, london_instant(3, 30)), None);
        assert_eq!(check_schedule(&s, london_instant(23, 59)), None);
    }

    #[test]
    fn weekday_is_evaluated_in_campaign_timezone() {
        // 2026-08-26 01:00 in Auckland is still 2026-08-25 (Tuesday) in UTC,
        // so a Wednesday-only Auckland campaign must use the local weekday.
        let auckland: Tz = "Pacific/Auckland".parse().unwrap_or(chrono_tz::UTC);
        let s = Schedule {
            timezone: auckland,
            active_days: [3u8].into_iter().collect(),
            active_hours: vec![],
        };
        let local = auckland
            .with_ymd_and_hms(2026, 8, 26, 1, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("unambiguous local time"));
        assert_eq!(check_schedule(&s, local.with_timezone(&Utc)), None);
    }
}
