//! Difficulty estimate from note density.
//!
//! The level only depends on the counts, the duration and the key count of a chart:
//!
//! ```text
//! density = (normal + 1.5 * head) / max(duration, 1000 ms) * 1000
//! level   = clamp(density * sqrt(4 / key_count) * 3, 0, 50)
//! ```
//!
//! Holds weigh more than taps since they need two actions. Wider layouts spread the same
//! density over more fingers, so the density is scaled down with the key count.

use super::Chart;

/// Highest level returned.
pub const MAX_LEVEL: f64 = 50.0;

/// Shortest duration used for the density, so that very short charts do not explode.
const MIN_DURATION_MS: f64 = 1000.0;

/// Weight of a hold against a tap.
const HOLD_WEIGHT: f64 = 1.5;

/// Estimates the level of `chart`.
///
/// Never decreases when notes are added without making the chart longer.
#[must_use]
pub fn level(chart: &Chart) -> f64 {
    level_of(
        chart.normal_count(),
        chart.head_count(),
        chart.duration(),
        chart.key_count(),
    )
}

/// [`level`] from the raw statistics.
#[must_use]
pub fn level_of(normal_count: usize, head_count: usize, duration: i64, key_count: u32) -> f64 {
    if key_count == 0 {
        return 0.0;
    }
    let weight = normal_count as f64 + HOLD_WEIGHT * head_count as f64;
    let density = weight / (duration as f64).max(MIN_DURATION_MS) * 1000.0;
    let spread = (4.0 / f64::from(key_count)).sqrt();
    (density * spread * 3.0).clamp(0.0, MAX_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denser_is_harder() {
        let sparse = level_of(100, 0, 60_000, 4);
        let dense = level_of(400, 0, 60_000, 4);
        let with_holds = level_of(100, 50, 60_000, 4);
        assert!(sparse < dense);
        assert!(sparse < with_holds);
    }

    #[test]
    fn bounds() {
        assert_eq!(level_of(0, 0, 0, 4), 0.0);
        assert_eq!(level_of(100_000, 0, 1000, 4), MAX_LEVEL);
        // 10 notes in a 500 ms chart count as 10 notes per second.
        assert_eq!(level_of(10, 0, 500, 4), 30.0);
        assert!(level_of(10, 0, 500, 7) < level_of(10, 0, 500, 4));
    }
}
