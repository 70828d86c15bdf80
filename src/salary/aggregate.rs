//! Summary statistics over matched salary observations.
//!
//! Percentiles use linear interpolation between order statistics. An empty
//! candidate set aggregates to `count == 0`; callers branch on the count
//! before reading any other field.

use serde::Serialize;

use crate::salary::SalaryMatch;

/// Aggregate statistics of a candidate set, in MAD per month.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    /// Most frequent market among the matches, ties kept first-seen.
    pub dominant_market: Option<String>,
    /// Market label → number of matches, in first-seen order.
    pub market_distribution: Vec<(String, usize)>,
    /// Country → number of matches, in first-seen order.
    pub country_distribution: Vec<(String, usize)>,
}

impl AggregateStats {
    /// The aggregate of nothing: count 0, every other field meaningless.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            count: 0,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            median: 0.0,
            p25: 0.0,
            p75: 0.0,
            dominant_market: None,
            market_distribution: Vec::new(),
            country_distribution: Vec::new(),
        }
    }
}

/// Linearly interpolated percentile of an ascending-sorted slice.
///
/// `p` is in [0, 100]. With `n` values the rank is `p/100 * (n-1)`;
/// fractional ranks interpolate between the neighboring order statistics.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n as f64 - 1.0);
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let weight = rank - lower as f64;
                sorted[lower] * (1.0 - weight) + sorted[upper] * weight
            }
        }
    }
}

/// Counts labels preserving first-seen order.
fn count_first_seen<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(seen, _)| seen.as_str() == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }
    counts
}

/// The most frequent market label among matches.
///
/// Ties break in favor of the label seen first, so the result is stable
/// for a given match ordering.
#[must_use]
pub fn dominant_market(matches: &[SalaryMatch]) -> Option<String> {
    let counts = count_first_seen(matches.iter().map(|m| m.market.as_str()));
    let mut best: Option<(String, usize)> = None;
    for (label, n) in counts {
        // Strict comparison keeps the first-seen label on ties.
        if best.as_ref().is_none_or(|(_, top)| n > *top) {
            best = Some((label, n));
        }
    }
    best.map(|(label, _)| label)
}

/// Aggregates the monetary values of a candidate set.
#[must_use]
pub fn aggregate(matches: &[SalaryMatch]) -> AggregateStats {
    if matches.is_empty() {
        return AggregateStats::empty();
    }

    let mut values: Vec<f64> = matches.iter().map(|m| m.salary).collect();
    values.sort_by(|a, b| a.partial_cmp(b).expect("salaries are finite"));

    let count = values.len();
    let sum: f64 = values.iter().sum();

    AggregateStats {
        count,
        min: values[0],
        max: values[count - 1],
        mean: sum / count as f64,
        median: percentile(&values, 50.0),
        p25: percentile(&values, 25.0),
        p75: percentile(&values, 75.0),
        dominant_market: dominant_market(matches),
        market_distribution: count_first_seen(matches.iter().map(|m| m.market.as_str())),
        country_distribution: count_first_seen(matches.iter().map(|m| m.country.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{RecordId, Score};

    fn salary_match(salary: f64, market: &str, country: &str) -> SalaryMatch {
        SalaryMatch {
            id: RecordId::new(1).unwrap(),
            job_title: "Engineer".to_string(),
            location: country.to_string(),
            country: country.to_string(),
            market: market.to_string(),
            experience: "3-5 years".to_string(),
            salary,
            score: Score::clamped(0.9),
        }
    }

    #[test]
    fn empty_set_aggregates_to_count_zero() {
        let stats = aggregate(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.dominant_market.is_none());
    }

    #[test]
    fn single_value_is_every_statistic() {
        let stats = aggregate(&[salary_match(10_000.0, "Maghreb", "Maroc")]);
        assert_eq!(stats.count, 1);
        for value in [
            stats.min,
            stats.max,
            stats.mean,
            stats.median,
            stats.p25,
            stats.p75,
        ] {
            assert_eq!(value, 10_000.0);
        }
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&values, 0.0), 10.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
        assert_eq!(percentile(&values, 50.0), 25.0);
        assert_eq!(percentile(&values, 25.0), 17.5);
        assert_eq!(percentile(&values, 75.0), 32.5);
    }

    #[test]
    fn order_statistics_are_consistent() {
        let salaries = [9_000.0, 14_000.0, 11_000.0, 30_000.0, 18_000.0, 12_500.0];
        let matches: Vec<SalaryMatch> = salaries
            .iter()
            .map(|&s| salary_match(s, "Maghreb", "Maroc"))
            .collect();
        let stats = aggregate(&matches);
        assert_eq!(stats.count, 6);
        assert!(stats.min <= stats.p25);
        assert!(stats.p25 <= stats.median);
        assert!(stats.median <= stats.p75);
        assert!(stats.p75 <= stats.max);
        assert!((stats.mean - salaries.iter().sum::<f64>() / 6.0).abs() < 1e-9);
    }

    #[test]
    fn dominant_market_is_most_frequent() {
        let matches = vec![
            salary_match(10_000.0, "Maghreb", "Maroc"),
            salary_match(12_000.0, "Europe", "France"),
            salary_match(11_000.0, "Maghreb", "Maroc"),
        ];
        let stats = aggregate(&matches);
        assert_eq!(stats.dominant_market.as_deref(), Some("Maghreb"));
        assert_eq!(
            stats.market_distribution,
            vec![("Maghreb".to_string(), 2), ("Europe".to_string(), 1)]
        );
        assert_eq!(stats.country_distribution.len(), 2);
    }

    #[test]
    fn dominant_market_ties_keep_first_seen() {
        let matches = vec![
            salary_match(10_000.0, "Europe", "France"),
            salary_match(11_000.0, "Maghreb", "Maroc"),
            salary_match(12_000.0, "Maghreb", "Maroc"),
            salary_match(13_000.0, "Europe", "Germany"),
        ];
        assert_eq!(dominant_market(&matches).as_deref(), Some("Europe"));
    }
}
