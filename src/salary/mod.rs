//! Salary benchmarking on top of the retrieval engine.
//!
//! Observations are rendered to one text row each, embedded, and indexed
//! like any other corpus. Ingestion resolves the location, runs the
//! validation gate, and always stores the observation — implausible values
//! are kept with an Invalid status and excluded from indexing. Queries
//! search in widening tiers (city, country, market), aggregate the matched
//! salaries, and narrate the result through the generation model with
//! deterministic fallbacks.

pub mod aggregate;
pub mod location;
pub mod validation;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::EngineResult;
use crate::generation::{self, GenerativeModel};
use crate::store::{NewSalaryObservation, ObservationStatus, SalaryStore};
use crate::sync::IndexSyncManager;
use crate::vector::{IndexPaths, RecordId, Score};

use aggregate::AggregateStats;
use location::{ResolvedLocation, experience_band_label, experience_bucket};
use validation::{SearchTier, ValidationOutcome};

/// Fewest matches worth an aggregate-driven analysis; below this the
/// narration comes from the generation model alone.
pub const MIN_ANALYSIS_MATCHES: usize = 5;

/// Neighbors handed to the narration prompt.
const NEIGHBOR_COUNT: usize = 8;

/// A submitted salary observation.
#[derive(Debug, Clone, Deserialize)]
pub struct SalaryIngest {
    pub job_title: String,
    pub location: String,
    pub experience_years: f32,
    /// Claimed monthly salary in MAD.
    pub salary: f64,
}

/// What ingestion decided about one observation.
#[derive(Debug, Clone, Serialize)]
pub struct SalaryIngestOutcome {
    pub id: RecordId,
    pub status: ObservationStatus,
    pub estimated_min: f64,
    pub estimated_max: f64,
    /// 0 when the estimate came from the generation fallback.
    pub comparable_count: usize,
}

/// A salary analysis request.
#[derive(Debug, Clone, Deserialize)]
pub struct SalaryQuery {
    pub job_title: String,
    pub location: String,
    pub experience_years: f32,
    /// The requester's current monthly salary in MAD.
    pub current_salary: f64,
}

/// One matched observation with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct SalaryMatch {
    pub id: RecordId,
    pub job_title: String,
    pub location: String,
    pub country: String,
    pub market: String,
    pub experience: String,
    pub salary: f64,
    pub score: Score,
}

/// Typed narration of a salary analysis. Field defaults keep parsing
/// tolerant of partially filled model responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryAnalysis {
    #[serde(default)]
    pub mean: f64,
    #[serde(default)]
    pub gap: f64,
    #[serde(default)]
    pub gap_percent: f64,
    #[serde(default)]
    pub minimum: f64,
    #[serde(default)]
    pub maximum: f64,
    #[serde(default)]
    pub percentile: f64,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub trends: Vec<Trend>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub data_quality: DataQuality,
    #[serde(default)]
    pub market_used: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trend {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQuality {
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub sample_size: usize,
    #[serde(default)]
    pub market_analyzed: String,
}

fn default_unit() -> String {
    "MAD/month".to_string()
}

impl Default for DataQuality {
    fn default() -> Self {
        Self {
            source: String::new(),
            unit: default_unit(),
            sample_size: 0,
            market_analyzed: String::new(),
        }
    }
}

/// Introspection snapshot of the salary engine.
#[derive(Debug, Clone, Serialize)]
pub struct SalaryEngineStatus {
    pub ready: bool,
    pub vectors: usize,
    pub index_version: u64,
    pub observations: usize,
    pub valid_observations: usize,
    pub blob_path: String,
    pub id_map_path: String,
    pub markets: Vec<(String, usize)>,
    pub countries: Vec<(String, usize)>,
}

/// The generation model's answer to the no-data estimate prompt.
#[derive(Debug, Deserialize)]
struct EstimateBand {
    estimated_min: f64,
    estimated_max: f64,
}

/// Salary-variant façade over the store, index, and generation model.
pub struct SalaryBenchmark<S: SalaryStore> {
    store: Arc<S>,
    embedder: Arc<dyn EmbeddingProvider>,
    sync: Arc<IndexSyncManager<S>>,
    generator: Arc<dyn GenerativeModel>,
    candidate_pool: usize,
}

impl<S: SalaryStore> SalaryBenchmark<S> {
    pub fn new(
        store: Arc<S>,
        embedder: Arc<dyn EmbeddingProvider>,
        sync: Arc<IndexSyncManager<S>>,
        generator: Arc<dyn GenerativeModel>,
        candidate_pool: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            sync,
            generator,
            candidate_pool: candidate_pool.max(1),
        }
    }

    /// The sync manager, exposed for explicit rebuilds and readiness polls.
    #[must_use]
    pub fn sync(&self) -> &Arc<IndexSyncManager<S>> {
        &self.sync
    }

    /// The backing store handle.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Stores a submitted observation with its validation verdict.
    ///
    /// Always succeeds when the store does: an implausible claim is stored
    /// Invalid, never rejected. The new observation reaches the index on
    /// the next rebuild.
    pub fn ingest(&self, request: SalaryIngest) -> EngineResult<SalaryIngestOutcome> {
        self.sync.ensure_ready()?;

        let resolved = location::resolve(&request.location);
        let outcome = self.validate(&request, &resolved);

        let id = self.store.insert_observation(NewSalaryObservation {
            job_title: request.job_title.clone(),
            city: resolved.city.clone(),
            country: resolved.country.clone(),
            market: resolved.market.label().to_string(),
            experience: experience_band_label(request.experience_years).to_string(),
            estimated_min: outcome.estimated_min,
            estimated_max: outcome.estimated_max,
            salary: request.salary,
            status: outcome.status,
        })?;
        debug!(
            %id,
            status = outcome.status.as_str(),
            comparables = outcome.comparable_count,
            "observation ingested"
        );

        Ok(SalaryIngestOutcome {
            id,
            status: outcome.status,
            estimated_min: outcome.estimated_min,
            estimated_max: outcome.estimated_max,
            comparable_count: outcome.comparable_count,
        })
    }

    fn validate(&self, request: &SalaryIngest, resolved: &ResolvedLocation) -> ValidationOutcome {
        validation::evaluate(
            request.salary,
            |tier| {
                let scope = match tier {
                    SearchTier::City => resolved.city.as_deref(),
                    SearchTier::Country => {
                        (resolved.country != "Global").then_some(resolved.country.as_str())
                    }
                    SearchTier::Market => Some(resolved.market.label()),
                };
                let Some(scope) = scope else {
                    return Vec::new();
                };
                match self.search_scope(
                    &request.job_title,
                    scope,
                    resolved,
                    request.experience_years,
                    self.candidate_pool,
                ) {
                    Ok(matches) => matches.into_iter().map(|m| (m.id, m.salary)).collect(),
                    Err(e) => {
                        warn!(?tier, "tier search failed, treating as empty: {e}");
                        Vec::new()
                    }
                }
            },
            || self.estimate_via_model(request, resolved),
        )
    }

    /// Asks the generation model for a plausible band; falls back to ±10%
    /// of the claimed value when that fails too. Never blocks ingestion.
    fn estimate_via_model(&self, request: &SalaryIngest, resolved: &ResolvedLocation) -> (f64, f64) {
        let place = resolved.city.as_deref().unwrap_or(&resolved.country);
        let prompt =
            generation::estimate_prompt(&request.job_title, place, request.experience_years);
        match self
            .generator
            .generate(&prompt)
            .and_then(|raw| generation::parse_response::<EstimateBand>(&raw))
        {
            Ok(band) if band.estimated_min > 0.0 && band.estimated_max >= band.estimated_min => {
                (band.estimated_min, band.estimated_max)
            }
            Ok(_) | Err(_) => {
                warn!("estimate fallback degraded to ±10% of the claimed value");
                (request.salary * 0.9, request.salary * 1.1)
            }
        }
    }

    /// Searches one scope (a city, a country, or a market label).
    fn search_scope(
        &self,
        job_title: &str,
        scope: &str,
        resolved: &ResolvedLocation,
        experience_years: f32,
        k: usize,
    ) -> EngineResult<Vec<SalaryMatch>> {
        let level = experience_bucket(experience_years);
        let query = format!(
            "{job_title} | {scope} | {} | {} | {level}",
            resolved.country,
            resolved.market.label()
        );
        let query_vector = self.embedder.embed(&query)?;
        let raw = self.sync.search(&query_vector, k)?;

        let mut matches = Vec::with_capacity(raw.len());
        for (chunk_id, score) in raw {
            match self.store.observation_for_chunk(chunk_id)? {
                Some(obs) if obs.status.is_valid() => {
                    matches.push(SalaryMatch {
                        id: obs.id,
                        job_title: obs.job_title,
                        location: obs.city.clone().unwrap_or_else(|| obs.country.clone()),
                        country: obs.country,
                        market: obs.market,
                        experience: obs.experience,
                        salary: obs.salary,
                        score,
                    });
                }
                Some(_) => {}
                None => {
                    debug!(chunk = %chunk_id, "dropping salary hit with no observation");
                }
            }
        }
        Ok(matches)
    }

    /// Progressive search: city first, widened to country, then market,
    /// until enough distinct observations accumulate. Best score wins for
    /// observations seen in several tiers.
    pub fn search_tiered(
        &self,
        job_title: &str,
        raw_location: &str,
        experience_years: f32,
        limit: usize,
    ) -> EngineResult<Vec<SalaryMatch>> {
        self.sync.ensure_ready()?;
        let resolved = location::resolve(raw_location);

        let mut pool: Vec<SalaryMatch> = Vec::new();
        let scopes = [
            resolved.city.clone(),
            (resolved.country != "Global").then(|| resolved.country.clone()),
            Some(resolved.market.label().to_string()),
        ];
        for scope in scopes.into_iter().flatten() {
            let found = self.search_scope(
                job_title,
                &scope,
                &resolved,
                experience_years,
                self.candidate_pool,
            )?;
            for candidate in found {
                match pool.iter_mut().find(|m| m.id == candidate.id) {
                    Some(existing) => {
                        if candidate.score > existing.score {
                            *existing = candidate;
                        }
                    }
                    None => pool.push(candidate),
                }
            }
            if pool.len() >= validation::TARGET_COMPARABLE {
                break;
            }
        }

        pool.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        pool.truncate(limit);
        Ok(pool)
    }

    /// The nearest observations for display, resolved and ranked.
    pub fn neighbors(
        &self,
        job_title: &str,
        raw_location: &str,
        experience_years: f32,
        k: usize,
    ) -> EngineResult<Vec<SalaryMatch>> {
        self.search_tiered(job_title, raw_location, experience_years, k)
    }

    /// Full analysis: tiered search, aggregation, percentile positioning,
    /// and narration. Generation failures degrade to deterministic
    /// responses; this method never fails past retrieval.
    pub fn analyze(&self, request: SalaryQuery) -> EngineResult<SalaryAnalysis> {
        let resolved = location::resolve(&request.location);
        let matches = self.search_tiered(
            &request.job_title,
            &request.location,
            request.experience_years,
            self.candidate_pool,
        )?;
        let stats = aggregate::aggregate(&matches);
        let market_used = stats
            .dominant_market
            .clone()
            .unwrap_or_else(|| resolved.market.label().to_string());

        if stats.count < MIN_ANALYSIS_MATCHES {
            return Ok(self.analyze_without_data(&request, &market_used));
        }

        let percentile = position_percentile(request.current_salary, &stats);
        let neighbors = &matches[..matches.len().min(NEIGHBOR_COUNT)];
        let prompt = analysis_prompt(&request, &stats, percentile, neighbors, &market_used);

        match self
            .generator
            .generate(&prompt)
            .and_then(|raw| generation::parse_response::<SalaryAnalysis>(&raw))
        {
            Ok(mut analysis) => {
                if analysis.market_used.is_empty() {
                    analysis.market_used = market_used.clone();
                }
                if analysis.data_quality.market_analyzed.is_empty() {
                    analysis.data_quality.market_analyzed = market_used;
                }
                analysis.data_quality.sample_size = stats.count;
                Ok(analysis)
            }
            Err(e) => {
                warn!("salary narration fell back to aggregate stats: {e}");
                Ok(stats_fallback_analysis(&request, &stats, percentile, &market_used))
            }
        }
    }

    /// Analysis with too little data: the model narrates from its own
    /// knowledge, and if it cannot, a minimal response anchored on the
    /// requester's salary goes out instead.
    fn analyze_without_data(&self, request: &SalaryQuery, market_used: &str) -> SalaryAnalysis {
        let prompt = knowledge_only_prompt(request, market_used);
        match self
            .generator
            .generate(&prompt)
            .and_then(|raw| generation::parse_response::<SalaryAnalysis>(&raw))
        {
            Ok(mut analysis) => {
                if analysis.market_used.is_empty() {
                    analysis.market_used = market_used.to_string();
                }
                analysis.data_quality.sample_size = 0;
                analysis
            }
            Err(e) => {
                warn!("knowledge-only narration failed, sending minimal response: {e}");
                minimal_analysis(request, market_used)
            }
        }
    }

    /// Introspection for status endpoints and the CLI.
    pub fn status(&self) -> EngineResult<SalaryEngineStatus> {
        let observations = self.store.observations()?;
        let mut markets: Vec<(String, usize)> = Vec::new();
        let mut countries: Vec<(String, usize)> = Vec::new();
        for obs in &observations {
            match markets.iter_mut().find(|(label, _)| *label == obs.market) {
                Some((_, n)) => *n += 1,
                None => markets.push((obs.market.clone(), 1)),
            }
            match countries.iter_mut().find(|(label, _)| *label == obs.country) {
                Some((_, n)) => *n += 1,
                None => countries.push((obs.country.clone(), 1)),
            }
        }
        let paths: &IndexPaths = self.sync.paths();
        Ok(SalaryEngineStatus {
            ready: self.sync.is_ready(),
            vectors: self.sync.vector_count(),
            index_version: self.sync.version(),
            observations: observations.len(),
            valid_observations: observations.iter().filter(|o| o.status.is_valid()).count(),
            blob_path: paths.blob.display().to_string(),
            id_map_path: paths.id_map.display().to_string(),
            markets,
            countries,
        })
    }
}

/// Where the current salary sits inside the matched range, 0..=100.
fn position_percentile(current: f64, stats: &AggregateStats) -> f64 {
    let range = (stats.max - stats.min).max(1.0);
    (((current - stats.min) / range) * 100.0).clamp(0.0, 100.0).round()
}

fn analysis_prompt(
    request: &SalaryQuery,
    stats: &AggregateStats,
    percentile: f64,
    neighbors: &[SalaryMatch],
    market_used: &str,
) -> String {
    let neighbors_json = serde_json::to_string(neighbors).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are an international HR compensation expert. Respond ONLY with a valid JSON object.\n\n\
         MARKET CONTEXT:\n\
         - Dominant market analyzed: {market_used}\n\
         - Unit: MAD/month\n\
         - Dataset sample: N={}, min={}, p25={}, median={}, p75={}, max={}\n\
         - Nearest observations: {neighbors_json}\n\n\
         CANDIDATE:\n\
         - Position: {}\n\
         - Location: {}\n\
         - Experience: {} years\n\
         - Current salary: {} MAD/month (≈ {percentile}th percentile)\n\n\
         Return exactly this JSON shape:\n\
         {{\n\
           \"mean\": number, \"gap\": number, \"gap_percent\": number,\n\
           \"minimum\": number, \"maximum\": number, \"percentile\": number,\n\
           \"recommendations\": [{{\"title\": \"...\", \"description\": \"...\", \"priority\": \"high|medium|low\"}}],\n\
           \"trends\": [{{\"title\": \"...\", \"detail\": \"...\"}}],\n\
           \"steps\": [{{\"number\": 1, \"content\": \"...\"}}],\n\
           \"data_quality\": {{\"source\": \"salary_dataset\", \"unit\": \"MAD/month\", \"sample_size\": {}, \"market_analyzed\": \"{market_used}\"}},\n\
           \"market_used\": \"{market_used}\"\n\
         }}",
        stats.count,
        stats.min as i64,
        stats.p25 as i64,
        stats.median as i64,
        stats.p75 as i64,
        stats.max as i64,
        request.job_title,
        request.location,
        request.experience_years,
        request.current_salary as i64,
        stats.count,
    )
}

fn knowledge_only_prompt(request: &SalaryQuery, market_used: &str) -> String {
    format!(
        "You are an international HR compensation expert. Our dataset has no\n\
         comparable observations for this profile, so base the analysis on\n\
         your own knowledge of the real market. Respond ONLY with the same\n\
         JSON shape as usual (mean, gap, gap_percent, minimum, maximum,\n\
         percentile, recommendations, trends, steps, data_quality,\n\
         market_used), unit MAD/month.\n\n\
         PROFILE:\n\
         - Position: {}\n\
         - Location: {}\n\
         - Experience: {} years\n\
         - Current salary: {} MAD/month\n\
         - Identified market: {market_used}",
        request.job_title,
        request.location,
        request.experience_years,
        request.current_salary as i64,
    )
}

/// Deterministic analysis computed from aggregate statistics, used when
/// the generation model fails while data exists.
fn stats_fallback_analysis(
    request: &SalaryQuery,
    stats: &AggregateStats,
    percentile: f64,
    market_used: &str,
) -> SalaryAnalysis {
    let gap = stats.median - request.current_salary;
    let gap_percent = gap / request.current_salary.max(1.0) * 100.0;
    SalaryAnalysis {
        mean: stats.median,
        gap,
        gap_percent: (gap_percent * 10.0).round() / 10.0,
        minimum: stats.p25,
        maximum: stats.p75,
        percentile,
        recommendations: vec![Recommendation {
            title: format!("Positioning on the {market_used} market"),
            description: format!(
                "Your salary sits at the {percentile:.0}th percentile of {} comparable profiles on the {market_used} market.",
                stats.count
            ),
            priority: "medium".to_string(),
        }],
        trends: vec![Trend {
            title: format!("{market_used} market trend"),
            detail: format!(
                "Median {} MAD/month, interquartile range [{}, {}].",
                stats.median as i64, stats.p25 as i64, stats.p75 as i64
            ),
        }],
        steps: vec![
            Step {
                number: 1,
                content: format!("Review comparable profiles on the {market_used} market."),
            },
            Step {
                number: 2,
                content: format!(
                    "Compare your package against the {} MAD/month median.",
                    stats.median as i64
                ),
            },
            Step {
                number: 3,
                content: "Negotiate using the median and 75th percentile as anchors.".to_string(),
            },
        ],
        data_quality: DataQuality {
            source: "salary_dataset".to_string(),
            unit: default_unit(),
            sample_size: stats.count,
            market_analyzed: market_used.to_string(),
        },
        market_used: market_used.to_string(),
    }
}

/// Minimal response when there is no data and no working model.
fn minimal_analysis(request: &SalaryQuery, market_used: &str) -> SalaryAnalysis {
    SalaryAnalysis {
        mean: request.current_salary,
        gap: 0.0,
        gap_percent: 0.0,
        minimum: request.current_salary * 0.8,
        maximum: request.current_salary * 1.2,
        percentile: 50.0,
        recommendations: vec![Recommendation {
            title: "Insufficient data".to_string(),
            description: "Not enough comparable observations for a precise analysis.".to_string(),
            priority: "low".to_string(),
        }],
        trends: vec![Trend {
            title: "Limited analysis".to_string(),
            detail: "The dataset holds no comparable observations yet.".to_string(),
        }],
        steps: vec![Step {
            number: 1,
            content: "Collect more market data for this profile.".to_string(),
        }],
        data_quality: DataQuality {
            source: "fallback".to_string(),
            unit: default_unit(),
            sample_size: 0,
            market_analyzed: market_used.to_string(),
        },
        market_used: market_used.to_string(),
    }
}
