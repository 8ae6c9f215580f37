use chrono::{Datelike, NaiveDate, Weekday};
use xxhash_rust::xxh3::xxh3_64;

use crate::contrib::model::{
    ContributionDataset, ContributionDay, GRID_DAYS, GRID_WEEKS, Level,
};
use crate::foundation::error::{GitlapseError, GitlapseResult};
use crate::foundation::math::SplitMix64;

/// Inputs for the synthetic dataset generator.
#[derive(Clone, Copy, Debug)]
pub struct SynthOpts {
    /// Target year to fill.
    pub year: i32,
    /// Generator seed; equal seeds produce equal datasets.
    pub seed: u64,
    /// Days after this date stay empty (mirrors a live profile mid-year).
    pub today: NaiveDate,
}

/// Derive a stable generator seed from a username, so repeated runs for the
/// same profile produce the same plausible history.
pub fn seed_for_username(username: &str) -> u64 {
    xxh3_64(username.as_bytes())
}

/// Generate a plausible year of contribution activity.
///
/// Weekdays are more active than weekends, activity ebbs and flows across
/// weeks, and intensities fall into four non-overlapping count buckets so the
/// level/count monotonicity invariant holds by construction. All randomness
/// comes from the [`SplitMix64`] value seeded by `opts.seed`.
pub fn synthesize(opts: SynthOpts) -> GitlapseResult<ContributionDataset> {
    let jan1 = NaiveDate::from_ymd_opt(opts.year, 1, 1)
        .ok_or_else(|| GitlapseError::validation(format!("invalid year {}", opts.year)))?;
    let first_sunday = jan1
        - chrono::Days::new(u64::from(jan1.weekday().num_days_from_sunday()));

    let mut rng = SplitMix64::new(opts.seed);
    let mut date = first_sunday;
    let mut total = 0u32;
    let mut weeks = Vec::with_capacity(GRID_WEEKS);

    for week in 0..GRID_WEEKS {
        let mut days = Vec::with_capacity(GRID_DAYS);
        for _ in 0..GRID_DAYS {
            let in_year = date.year() == opts.year;
            let future = date > opts.today;

            let (count, level) = if in_year && !future {
                roll_day(&mut rng, week, date.weekday())
            } else {
                (0, Level::ZERO)
            };
            total += count;

            days.push(ContributionDay { date, count, level });
            date = date
                .succ_opt()
                .ok_or_else(|| GitlapseError::validation("grid dates overflow the calendar"))?;
        }
        weeks.push(days);
    }

    let data = ContributionDataset {
        total_contributions: total,
        weeks,
        year: opts.year,
    };
    data.validate()?;
    Ok(data)
}

fn roll_day(rng: &mut SplitMix64, week: usize, weekday: Weekday) -> (u32, Level) {
    let base = match weekday {
        Weekday::Sat | Weekday::Sun => 0.3,
        _ => 0.6,
    };
    // Slow ebb and flow across the year so streaks and quiet stretches emerge.
    let week_factor = (week as f64 * 0.3).sin() * 0.2 + 0.8;
    if rng.next_f64() >= base * week_factor {
        return (0, Level::ZERO);
    }

    let intensity = rng.next_f64();
    if intensity > 0.85 {
        (8 + (rng.next_f64() * 10.0) as u32, Level::MAX)
    } else if intensity > 0.6 {
        (4 + (rng.next_f64() * 4.0) as u32, level(3))
    } else if intensity > 0.35 {
        (2 + (rng.next_f64() * 2.0) as u32, level(2))
    } else {
        (1, level(1))
    }
}

fn level(v: u8) -> Level {
    Level::try_from(v).expect("bucket levels are 0..=4")
}
