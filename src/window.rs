use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// First day of week 1 (a Monday).
pub const WEEK1_START: NaiveDate = match NaiveDate::from_ymd_opt(2025, 1, 20) {
    Some(d) => d,
    None => panic!("valid anchor date"),
};
/// Last day of week 1 (the following Friday).
pub const WEEK1_END: NaiveDate = match NaiveDate::from_ymd_opt(2025, 1, 24) {
    Some(d) => d,
    None => panic!("valid anchor date"),
};
/// First day of week 2 (a Saturday); all later weeks are Sat–Fri blocks.
pub const WEEK2_START: NaiveDate = match NaiveDate::from_ymd_opt(2025, 1, 25) {
    Some(d) => d,
    None => panic!("valid anchor date"),
};

/// An inclusive `[start, end]` date interval.
///
/// Windows are only ever produced by [`Window::resolve`]; every other part of
/// the pipeline takes one ready-made, so the `start <= end` invariant holds
/// globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    /// Resolve any of the allowed CLI date specifications into a window.
    ///
    /// Modes:
    /// 1. `start` + `end`
    /// 2. `start` + `weeks` (end = start + 7*weeks - 1)
    /// 3. `week` (week 1 = the short Mon–Fri anchor week, later weeks Sat–Fri)
    /// 4. `week` + `weeks` (extend the end by 7*(weeks-1) further days)
    ///
    /// The short first week is a fixed historical anchor, not an ISO-week
    /// rule; it must not be "corrected" to a uniform calendar.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        weeks: Option<u32>,
        week: Option<u32>,
    ) -> Result<Window, PipelineError> {
        if let Some(start) = start {
            let end = if let Some(end) = end {
                end
            } else if let Some(weeks) = weeks {
                if weeks < 1 {
                    return Err(PipelineError::InvalidWindow("--weeks must be >= 1".into()));
                }
                start + Duration::days(7 * i64::from(weeks) - 1)
            } else {
                return Err(PipelineError::InvalidWindow(
                    "--start requires either --end or --weeks".into(),
                ));
            };
            if end < start {
                return Err(PipelineError::InvalidWindow(format!(
                    "end {end} precedes start {start}"
                )));
            }
            return Ok(Window { start, end });
        }

        if let Some(week) = week {
            if week < 1 {
                return Err(PipelineError::InvalidWindow("--week must be >= 1".into()));
            }
            let (start, mut end) = if week == 1 {
                (WEEK1_START, WEEK1_END)
            } else {
                let s = WEEK2_START + Duration::days(7 * (i64::from(week) - 2));
                (s, s + Duration::days(6))
            };
            if let Some(weeks) = weeks {
                if weeks > 1 {
                    end += Duration::days(7 * (i64::from(weeks) - 1));
                }
            }
            return Ok(Window { start, end });
        }

        Err(PipelineError::InvalidWindow(
            "supply (--start with --end|--weeks) or (--week [--weeks])".into(),
        ))
    }

    /// True when `date` lies inside the window, inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \u{2192} {}", self.start, self.end)
    }
}

/// A calendar week under the pipeline's irregular convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekSpan {
    pub number: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Map a date onto its week, or `None` for dates before the week-1 anchor.
pub fn week_for(date: NaiveDate) -> Option<WeekSpan> {
    if date < WEEK1_START {
        return None;
    }
    if date <= WEEK1_END {
        return Some(WeekSpan {
            number: 1,
            start: WEEK1_START,
            end: WEEK1_END,
        });
    }
    let offset = (date - WEEK2_START).num_days() / 7;
    let start = WEEK2_START + Duration::days(7 * offset);
    Some(WeekSpan {
        number: 2 + offset as u32,
        start,
        end: start + Duration::days(6),
    })
}

/// Debug aid: weekday of a resolved start, used in logs only.
pub fn weekday_of(date: NaiveDate) -> Weekday {
    date.weekday()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn week_one_is_the_short_anchor_window() {
        let w = Window::resolve(None, None, None, Some(1)).unwrap();
        assert_eq!(w.start, d("2025-01-20"));
        assert_eq!(w.end, d("2025-01-24"));
    }

    #[test]
    fn later_weeks_start_on_saturday_and_span_full_weeks() {
        for week in 2u32..20 {
            for weeks in 1u32..4 {
                let w = Window::resolve(None, None, Some(weeks), Some(week)).unwrap();
                assert_eq!(w.start.weekday(), Weekday::Sat, "week {week}");
                assert_eq!((w.end - w.start).num_days() + 1, 7 * i64::from(weeks));
            }
        }
    }

    #[test]
    fn week_two_anchors() {
        let w = Window::resolve(None, None, None, Some(2)).unwrap();
        assert_eq!(w.start, d("2025-01-25"));
        assert_eq!(w.end, d("2025-01-31"));
    }

    #[test]
    fn start_plus_weeks() {
        let w = Window::resolve(Some(d("2025-02-01")), None, Some(2), None).unwrap();
        assert_eq!(w.end, d("2025-02-14"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = Window::resolve(Some(d("2025-02-10")), Some(d("2025-02-01")), None, None);
        assert!(matches!(err, Err(PipelineError::InvalidWindow(_))));
    }

    #[test]
    fn missing_mode_is_rejected() {
        assert!(Window::resolve(None, None, None, None).is_err());
        assert!(Window::resolve(Some(d("2025-02-01")), None, None, None).is_err());
    }

    #[test]
    fn week_for_maps_the_boundaries() {
        assert_eq!(week_for(d("2025-01-19")), None);
        assert_eq!(week_for(d("2025-01-20")).unwrap().number, 1);
        assert_eq!(week_for(d("2025-01-24")).unwrap().number, 1);
        let w2 = week_for(d("2025-01-25")).unwrap();
        assert_eq!((w2.number, w2.start, w2.end), (2, d("2025-01-25"), d("2025-01-31")));
        let w3 = week_for(d("2025-02-01")).unwrap();
        assert_eq!(w3.number, 3);
        assert_eq!(w3.start.weekday(), Weekday::Sat);
    }

    #[test]
    fn window_contains_is_inclusive() {
        let w = Window::resolve(Some(d("2025-02-01")), Some(d("2025-02-07")), None, None).unwrap();
        assert!(w.contains(d("2025-02-01")));
        assert!(w.contains(d("2025-02-07")));
        assert!(!w.contains(d("2025-02-08")));
    }
}
