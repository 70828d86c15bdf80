//! Ingestion-time plausibility check for salary observations.
//!
//! The gate searches existing valid observations in widening tiers (city,
//! country, market) and judges the claimed value against the matched
//! distribution. When no comparable data exists the claim passes by
//! default — a new, unreferenced data point cannot yet be judged
//! anomalous — and the estimated band comes from the generation model
//! instead. Validation is strict exactly when data exists to be strict
//! with.

use tracing::debug;

use crate::salary::aggregate::percentile;
use crate::store::ObservationStatus;
use crate::vector::RecordId;

/// Fewest comparable observations worth computing an estimate from.
pub const MIN_COMPARABLE: usize = 2;

/// Comparable observations at which a tier is "enough" and the walk stops.
pub const TARGET_COMPARABLE: usize = 12;

/// Margins widening the interquartile range into the estimated band.
const ESTIMATE_LOW_MARGIN: f64 = 0.9;
const ESTIMATE_HIGH_MARGIN: f64 = 1.1;

/// Multiplicative slack loosening the p10/p90 plausibility band.
const BAND_LOW_SLACK: f64 = 0.6;
const BAND_HIGH_SLACK: f64 = 1.4;

/// Search tiers in widening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTier {
    City,
    Country,
    Market,
}

impl SearchTier {
    const WALK: [SearchTier; 3] = [Self::City, Self::Country, Self::Market];
}

/// The gate's verdict for one submitted observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub estimated_min: f64,
    pub estimated_max: f64,
    pub status: ObservationStatus,
    /// Comparable observations the verdict was computed from; 0 means the
    /// estimate came from the generation fallback.
    pub comparable_count: usize,
}

/// Evaluates a claimed salary against comparable observations.
///
/// `search_tier` returns the `(id, salary)` matches of one tier; tiers are
/// walked city → country → market and the walk stops early once a tier
/// accumulates [`TARGET_COMPARABLE`] distinct observations. `fallback`
/// supplies an estimated band when fewer than [`MIN_COMPARABLE`] matches
/// exist anywhere; in that case the status is always Valid.
pub fn evaluate<F, G>(claimed: f64, mut search_tier: F, fallback: G) -> ValidationOutcome
where
    F: FnMut(SearchTier) -> Vec<(RecordId, f64)>,
    G: FnOnce() -> (f64, f64),
{
    let mut seen: Vec<RecordId> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for tier in SearchTier::WALK {
        for (id, salary) in search_tier(tier) {
            if !seen.contains(&id) {
                seen.push(id);
                values.push(salary);
            }
        }
        if values.len() >= TARGET_COMPARABLE {
            debug!(?tier, count = values.len(), "tier walk stopped early");
            break;
        }
    }

    if values.len() < MIN_COMPARABLE {
        let (estimated_min, estimated_max) = fallback();
        return ValidationOutcome {
            estimated_min,
            estimated_max,
            status: ObservationStatus::Valid,
            comparable_count: 0,
        };
    }

    values.sort_by(|a, b| a.partial_cmp(b).expect("salaries are finite"));
    let estimated_min = percentile(&values, 25.0) * ESTIMATE_LOW_MARGIN;
    let estimated_max = percentile(&values, 75.0) * ESTIMATE_HIGH_MARGIN;

    let lower = percentile(&values, 10.0) * BAND_LOW_SLACK;
    let upper = percentile(&values, 90.0) * BAND_HIGH_SLACK;
    let status = if claimed < lower || claimed > upper {
        ObservationStatus::Invalid
    } else {
        ObservationStatus::Valid
    };

    ValidationOutcome {
        estimated_min,
        estimated_max,
        status,
        comparable_count: values.len(),
    }
}
