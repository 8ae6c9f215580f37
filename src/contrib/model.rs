use chrono::{Datelike, NaiveDate, Weekday};

use crate::foundation::error::{GitlapseError, GitlapseResult};

/// Number of week columns in the contribution grid.
pub const GRID_WEEKS: usize = 53;
/// Number of day rows per week column.
pub const GRID_DAYS: usize = 7;

/// Intensity bucket for one day, `0..=4`. `0` means no activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    /// The empty bucket.
    pub const ZERO: Level = Level(0);
    /// Highest intensity bucket.
    pub const MAX: Level = Level(4);

    /// Raw bucket value.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Bucket value as a palette index.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for Level {
    type Error = GitlapseError;

    fn try_from(v: u8) -> GitlapseResult<Self> {
        if v > 4 {
            return Err(GitlapseError::validation(format!(
                "level must be 0..=4, got {v}"
            )));
        }
        Ok(Level(v))
    }
}

impl<'de> serde::Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = u8::deserialize(deserializer)?;
        Level::try_from(v).map_err(serde::de::Error::custom)
    }
}

/// One calendar day of contribution activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContributionDay {
    /// Calendar date (ISO `YYYY-MM-DD` on the wire).
    pub date: NaiveDate,
    /// Contribution count for the day.
    pub count: u32,
    /// Quantized intensity bucket for `count`.
    pub level: Level,
}

/// A full year of contribution activity, laid out as the 53x7 grid the chart
/// renders.
///
/// `weeks[0][0]` is the Sunday on or before Jan 1 of `year`, so the grid may
/// carry trailing days of the prior year and leading days of the next year.
/// Those boundary days render blank and never count toward totals.
///
/// Construct from a source (or [`crate::contrib::synth`]), [`validate`], then
/// treat as immutable for the duration of one preview/export cycle.
///
/// [`validate`]: ContributionDataset::validate
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionDataset {
    /// Authoritative total reported by the source. May differ from the grid
    /// sum (e.g. a source reporting a rolling total); the chart header trusts
    /// it for unbounded renders.
    pub total_contributions: u32,
    /// 53 week columns of 7 days each, chronological.
    pub weeks: Vec<Vec<ContributionDay>>,
    /// The year this dataset covers.
    pub year: i32,
}

impl ContributionDataset {
    /// Validate the grid shape and per-day invariants, failing fast with a
    /// descriptive error rather than rendering garbled output.
    pub fn validate(&self) -> GitlapseResult<()> {
        if self.weeks.len() != GRID_WEEKS {
            return Err(GitlapseError::validation(format!(
                "dataset must have {GRID_WEEKS} weeks, got {}",
                self.weeks.len()
            )));
        }
        for (i, week) in self.weeks.iter().enumerate() {
            if week.len() != GRID_DAYS {
                return Err(GitlapseError::validation(format!(
                    "week {i} must have {GRID_DAYS} days, got {}",
                    week.len()
                )));
            }
        }

        let first = self.weeks[0][0].date;
        if first.weekday() != Weekday::Sun {
            return Err(GitlapseError::validation(format!(
                "grid must start on a Sunday, got {} ({})",
                first,
                first.weekday()
            )));
        }
        let jan1 = NaiveDate::from_ymd_opt(self.year, 1, 1)
            .ok_or_else(|| GitlapseError::validation(format!("invalid year {}", self.year)))?;
        let lead = (jan1 - first).num_days();
        if !(0..GRID_DAYS as i64).contains(&lead) {
            return Err(GitlapseError::validation(format!(
                "grid must start on the Sunday on or before Jan 1 {}, got {first}",
                self.year
            )));
        }

        let mut expected = first;
        for (wi, week) in self.weeks.iter().enumerate() {
            for (di, day) in week.iter().enumerate() {
                if day.date != expected {
                    return Err(GitlapseError::validation(format!(
                        "week {wi} day {di}: expected date {expected}, got {}",
                        day.date
                    )));
                }
                if day.count == 0 && day.level != Level::ZERO {
                    return Err(GitlapseError::validation(format!(
                        "{}: level {} with count 0",
                        day.date,
                        day.level.get()
                    )));
                }
                expected = expected.succ_opt().ok_or_else(|| {
                    GitlapseError::validation("grid dates overflow the calendar")
                })?;
            }
        }

        self.check_level_monotonicity()
    }

    // `level` must be a non-decreasing function of `count` across the dataset.
    fn check_level_monotonicity(&self) -> GitlapseResult<()> {
        let mut pairs: Vec<(u32, u8)> = self
            .days()
            .map(|(_, day)| (day.count, day.level.get()))
            .collect();
        pairs.sort_unstable();

        let mut max_level_below = 0u8;
        let mut i = 0;
        while i < pairs.len() {
            let count = pairs[i].0;
            let mut group_max = 0u8;
            while i < pairs.len() && pairs[i].0 == count {
                let level = pairs[i].1;
                if level < max_level_below {
                    return Err(GitlapseError::validation(format!(
                        "level is not monotone in count: count {count} has level {level} \
                         below a smaller count's level {max_level_below}"
                    )));
                }
                group_max = group_max.max(level);
                i += 1;
            }
            max_level_below = max_level_below.max(group_max);
        }
        Ok(())
    }

    /// Iterate all grid days chronologically with their 1-based day index
    /// (week-major, day-minor — the reveal order).
    pub fn days(&self) -> impl Iterator<Item = (u64, &ContributionDay)> {
        self.weeks
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, d)| (i as u64 + 1, d))
    }

    /// Sum of `count` over days that actually fall inside `year`.
    pub fn in_year_total(&self) -> u32 {
        self.days()
            .filter(|(_, d)| d.date.year() == self.year)
            .map(|(_, d)| d.count)
            .sum()
    }

    /// Sum of `count` over the first `reveal` chronological days that fall
    /// inside `year`. This is the running total the chart header shows while
    /// a reveal cutoff is active.
    pub fn visible_total(&self, reveal: u64) -> u32 {
        self.days()
            .take_while(|(idx, _)| *idx <= reveal)
            .filter(|(_, d)| d.date.year() == self.year)
            .map(|(_, d)| d.count)
            .sum()
    }

    /// Highest 1-based day index whose date is on or before `today`.
    ///
    /// This bounds how many reveal steps are meaningful: for a current-year
    /// dataset the animation never runs toward future days.
    pub fn days_through(&self, today: NaiveDate) -> u64 {
        let mut last = 0;
        for (idx, day) in self.days() {
            if day.date <= today {
                last = idx;
            }
        }
        last
    }
}

/// Validate a profile username: 1-39 characters, alphanumeric with internal
/// hyphens. Display-only downstream of this check.
pub fn validate_username(username: &str) -> GitlapseResult<()> {
    let n = username.chars().count();
    if n == 0 || n > 39 {
        return Err(GitlapseError::validation(
            "username must be 1-39 characters",
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(GitlapseError::validation(
            "username may only contain alphanumerics and hyphens",
        ));
    }
    if username.starts_with('-') || username.ends_with('-') {
        return Err(GitlapseError::validation(
            "username may not start or end with a hyphen",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrib::synth::{synthesize, SynthOpts};

    fn sample() -> ContributionDataset {
        synthesize(SynthOpts {
            year: 2024,
            seed: 1,
            today: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn level_rejects_out_of_range() {
        assert!(Level::try_from(5).is_err());
        assert_eq!(Level::try_from(4).unwrap(), Level::MAX);
        let bad: Result<Level, _> = serde_json::from_str("9");
        assert!(bad.is_err());
    }

    #[test]
    fn dataset_json_round_trips_camel_case() {
        let data = sample();
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"totalContributions\""));
        let back: ContributionDataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn validate_accepts_synthesized_grid() {
        sample().validate().unwrap();
    }

    #[test]
    fn validate_rejects_short_week() {
        let mut data = sample();
        data.weeks[10].pop();
        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("7 days"));
    }

    #[test]
    fn validate_rejects_non_sunday_start() {
        let mut data = sample();
        for week in &mut data.weeks {
            for day in week.iter_mut() {
                day.date = day.date.succ_opt().unwrap();
            }
        }
        assert!(data.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_count_with_level() {
        let mut data = sample();
        data.weeks[5][3].count = 0;
        data.weeks[5][3].level = Level::try_from(2).unwrap();
        assert!(data.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_monotone_levels() {
        let mut data = sample();
        // A large count in the lowest bucket while smaller counts sit higher.
        data.weeks[2][2].count = 1000;
        data.weeks[2][2].level = Level::try_from(1).unwrap();
        data.weeks[2][3].count = 2;
        data.weeks[2][3].level = Level::try_from(3).unwrap();
        assert!(data.validate().is_err());
    }

    #[test]
    fn visible_total_matches_prefix_sum() {
        let data = sample();
        let year = data.year;
        let mut running = 0u32;
        for (idx, day) in data.days().collect::<Vec<_>>() {
            if day.date.year() == year {
                running += day.count;
            }
            assert_eq!(data.visible_total(idx), running, "at index {idx}");
        }
        assert_eq!(data.visible_total(0), 0);
        assert_eq!(data.visible_total(u64::MAX), data.in_year_total());
    }

    #[test]
    fn days_through_ignores_future_days() {
        let data = sample();
        let mid = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let through = data.days_through(mid);
        assert!(through > 0);
        let (_, last_shown) = data.days().nth(through as usize - 1).unwrap();
        assert!(last_shown.date <= mid);
        let (_, first_hidden) = data.days().nth(through as usize).unwrap();
        assert!(first_hidden.date > mid);
    }

    #[test]
    fn username_rules() {
        validate_username("octocat").unwrap();
        validate_username("a-b-c1").unwrap();
        assert!(validate_username("").is_err());
        assert!(validate_username(&"x".repeat(40)).is_err());
        assert!(validate_username("-lead").is_err());
        assert!(validate_username("trail-").is_err());
        assert!(validate_username("has space").is_err());
    }
}
