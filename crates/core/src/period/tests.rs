//! Date boundary tests for period derivation.

use chrono::NaiveDate;
use proptest::prelude::*;
use rstest::rstest;

use super::*;
use crate::reports::ReportError;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[rstest]
#[case(d(2024, 3, 15), d(2024, 3, 1), d(2024, 3, 31))]
#[case(d(2024, 2, 10), d(2024, 2, 1), d(2024, 2, 29))]
#[case(d(2023, 2, 10), d(2023, 2, 1), d(2023, 2, 28))]
#[case(d(2024, 12, 31), d(2024, 12, 1), d(2024, 12, 31))]
#[case(d(2024, 4, 1), d(2024, 4, 1), d(2024, 4, 30))]
fn test_month_bounds(#[case] date: NaiveDate, #[case] first: NaiveDate, #[case] last: NaiveDate) {
    assert_eq!(month_bounds(date), (first, last));
}

#[test]
fn test_january_rolls_back_to_previous_december() {
    let set = PeriodSet::derive(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
    assert_eq!((set.pam.start, set.pam.end), (d(2023, 12, 1), d(2023, 12, 31)));
    assert_eq!((set.paa.start, set.paa.end), (d(2023, 1, 1), d(2023, 1, 31)));
    assert_eq!(set.pam.tag, PeriodTag::Pam);
    assert_eq!(set.paa.tag, PeriodTag::Paa);
}

#[test]
fn test_march_pam_is_leap_february() {
    let set = PeriodSet::derive(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
    assert_eq!((set.pam.start, set.pam.end), (d(2024, 2, 1), d(2024, 2, 29)));
    assert_eq!((set.paa.start, set.paa.end), (d(2023, 3, 1), d(2023, 3, 31)));
}

#[test]
fn test_leap_february_paa_is_common_february() {
    let set = PeriodSet::derive(d(2024, 2, 29), d(2024, 2, 29)).unwrap();
    assert_eq!((set.paa.start, set.paa.end), (d(2023, 2, 1), d(2023, 2, 28)));
    assert_eq!((set.pam.start, set.pam.end), (d(2024, 1, 1), d(2024, 1, 31)));
}

#[test]
fn test_december_window() {
    let set = PeriodSet::derive(d(2024, 12, 1), d(2024, 12, 31)).unwrap();
    assert_eq!((set.pam.start, set.pam.end), (d(2024, 11, 1), d(2024, 11, 30)));
    assert_eq!((set.paa.start, set.paa.end), (d(2023, 12, 1), d(2023, 12, 31)));
}

#[test]
fn test_baselines_follow_start_month_for_multi_month_window() {
    let set = PeriodSet::derive(d(2024, 5, 20), d(2024, 7, 10)).unwrap();
    assert_eq!(set.pam.start, d(2024, 4, 1));
    assert_eq!(set.paa.start, d(2023, 5, 1));
    assert_eq!(set.current.days(), 52);
}

#[test]
fn test_start_after_end_is_rejected() {
    let err = PeriodSet::derive(d(2024, 3, 2), d(2024, 3, 1)).unwrap_err();
    assert!(matches!(err, ReportError::InvalidDateRange { .. }));
}

#[test]
fn test_baselines_are_tagged_pam_then_paa() {
    let set = PeriodSet::derive(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
    let tags: Vec<PeriodTag> = set.baselines().iter().map(|p| p.tag).collect();
    assert_eq!(tags, vec![PeriodTag::Pam, PeriodTag::Paa]);
    assert_eq!(set.current.tag, PeriodTag::Current);
}

proptest! {
    /// Baselines are always complete months strictly before the current start.
    #[test]
    fn test_baselines_are_full_prior_months(days in 0i64..20_000) {
        let start = d(1990, 1, 1) + chrono::Duration::days(days);
        let set = PeriodSet::derive(start, start).unwrap();

        for period in set.baselines() {
            prop_assert_eq!(period.start.day(), 1);
            prop_assert!(period.end < start);
            prop_assert!(period.start <= period.end);
            prop_assert_eq!(month_bounds(period.start), (period.start, period.end));
        }
    }
}
