//! Location, market, and experience normalization for salary data.
//!
//! Free-text locations resolve against a curated city table first, then
//! country keyword lists, and finally fall back to a generic city under the
//! catch-all "Global" country. Markets are a fixed many-to-one grouping of
//! countries used to widen search when city- or country-level data is
//! sparse.

use serde::{Deserialize, Serialize};

/// Coarse economic region a country belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    Maghreb,
    Europe,
    NorthAmerica,
    AngloSaxon,
    Global,
}

impl Market {
    /// Human-readable label stored on observations and shown in analyses.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Maghreb => "Maghreb",
            Self::Europe => "Europe",
            Self::NorthAmerica => "North America",
            Self::AngloSaxon => "Anglo-Saxon",
            Self::Global => "Global",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A resolved location: optional canonical city, country, market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    pub city: Option<String>,
    pub country: String,
    pub market: Market,
}

/// Experience bucket derived from years of experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Junior,
    Intermediate,
    Senior,
    Expert,
}

impl ExperienceLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Intermediate => "intermediate",
            Self::Senior => "senior",
            Self::Expert => "expert",
        }
    }
}

impl std::fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authoritative experience-bucket boundaries, in years.
///
/// Every caller derives buckets and band labels from this one table; the
/// upper bound is inclusive. Years above the last entry are Expert.
pub const EXPERIENCE_BUCKETS: [(f32, ExperienceLevel); 3] = [
    (2.0, ExperienceLevel::Junior),
    (5.0, ExperienceLevel::Intermediate),
    (10.0, ExperienceLevel::Senior),
];

/// Buckets years of experience using [`EXPERIENCE_BUCKETS`].
#[must_use]
pub fn experience_bucket(years: f32) -> ExperienceLevel {
    for (upper, level) in EXPERIENCE_BUCKETS {
        if years <= upper {
            return level;
        }
    }
    ExperienceLevel::Expert
}

/// Coarse band label used in chunk text and queries, e.g. "3-5 years".
#[must_use]
pub fn experience_band_label(years: f32) -> &'static str {
    match experience_bucket(years) {
        ExperienceLevel::Junior => "0-2 years",
        ExperienceLevel::Intermediate => "3-5 years",
        ExperienceLevel::Senior => "5-10 years",
        ExperienceLevel::Expert => "10+ years",
    }
}

/// Dataset level codes and their buckets, upper-case side.
const LEVEL_CODES: [(&str, ExperienceLevel); 8] = [
    ("EN", ExperienceLevel::Junior),
    ("MI", ExperienceLevel::Intermediate),
    ("SE", ExperienceLevel::Senior),
    ("EX", ExperienceLevel::Expert),
    ("JUNIOR", ExperienceLevel::Junior),
    ("INTERMEDIATE", ExperienceLevel::Intermediate),
    ("SENIOR", ExperienceLevel::Senior),
    ("EXPERT", ExperienceLevel::Expert),
];

/// French labels as they appear in imported datasets, accent-folded side.
const LEVEL_LABELS_FR: [(&str, ExperienceLevel); 4] = [
    ("debutant", ExperienceLevel::Junior),
    ("intermediaire", ExperienceLevel::Intermediate),
    ("senior", ExperienceLevel::Senior),
    ("cadre superieur", ExperienceLevel::Expert),
];

/// Normalizes a textual experience label from an imported dataset.
///
/// Unrecognized values map to Intermediate. That default is a deliberate
/// fallback for heterogeneous imports, not a detected condition.
#[must_use]
pub fn normalize_level_label(raw: &str) -> ExperienceLevel {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ExperienceLevel::Intermediate;
    }
    let upper = trimmed.to_uppercase();
    for (code, level) in LEVEL_CODES {
        if upper == code {
            return level;
        }
    }
    let folded = fold_accents(&trimmed.to_lowercase());
    for (label, level) in LEVEL_LABELS_FR {
        if folded == label {
            return level;
        }
    }
    ExperienceLevel::Intermediate
}

/// Curated city table: country, its cities (lower-case match keys).
const CITY_TABLE: [(&str, &[&str]); 6] = [
    (
        "Maroc",
        &[
            "casablanca",
            "rabat",
            "tanger",
            "tangier",
            "fes",
            "fès",
            "marrakech",
            "marrakesh",
            "agadir",
            "meknes",
            "meknès",
            "kenitra",
            "kénitra",
            "tetouan",
            "tétouan",
            "safi",
            "el jadida",
            "oujda",
            "nador",
            "salé",
            "sale",
            "temara",
            "témara",
            "mohammedia",
            "khouribga",
            "laayoune",
            "al hoceima",
            "beni mellal",
            "berrechid",
        ],
    ),
    (
        "France",
        &[
            "paris",
            "lyon",
            "marseille",
            "toulouse",
            "nice",
            "nantes",
            "montpellier",
            "strasbourg",
            "bordeaux",
            "lille",
            "rennes",
            "grenoble",
            "dijon",
            "angers",
        ],
    ),
    (
        "United States",
        &[
            "new york",
            "los angeles",
            "chicago",
            "houston",
            "philadelphia",
            "san diego",
            "dallas",
            "san jose",
            "austin",
            "san francisco",
            "seattle",
            "denver",
            "boston",
            "atlanta",
            "miami",
            "minneapolis",
        ],
    ),
    (
        "Canada",
        &[
            "toronto",
            "montreal",
            "vancouver",
            "calgary",
            "ottawa",
            "edmonton",
            "winnipeg",
            "quebec",
            "québec",
            "halifax",
            "victoria",
        ],
    ),
    (
        "Germany",
        &[
            "berlin",
            "hamburg",
            "munich",
            "münchen",
            "cologne",
            "köln",
            "frankfurt",
            "stuttgart",
            "düsseldorf",
            "leipzig",
            "dresden",
            "bonn",
        ],
    ),
    (
        "United Kingdom",
        &[
            "london",
            "birmingham",
            "liverpool",
            "leeds",
            "glasgow",
            "edinburgh",
            "manchester",
            "bristol",
            "cardiff",
            "nottingham",
            "newcastle",
            "belfast",
            "aberdeen",
        ],
    ),
];

/// Country keyword lists; multi-word keywords match as substrings,
/// single-word keywords match whole tokens only so a short code like "ma"
/// cannot fire inside an unrelated word.
const COUNTRY_KEYWORDS: [(&str, &[&str]); 6] = [
    ("Maroc", &["maroc", "morocco", "ma"]),
    ("France", &["france", "french", "fr"]),
    (
        "United States",
        &[
            "usa",
            "united states",
            "etats-unis",
            "états-unis",
            "us",
            "u.s.",
            "america",
        ],
    ),
    ("Canada", &["canada", "canadian", "ca"]),
    ("Germany", &["germany", "deutschland", "german", "de"]),
    (
        "United Kingdom",
        &[
            "uk",
            "united kingdom",
            "britain",
            "england",
            "scotland",
            "wales",
            "gb",
        ],
    ),
];

/// Maps a country to its market. Unknown countries are Global.
#[must_use]
pub fn market_for_country(country: &str) -> Market {
    match country {
        "Maroc" => Market::Maghreb,
        "France" | "Germany" => Market::Europe,
        "United States" | "Canada" => Market::NorthAmerica,
        "United Kingdom" => Market::AngloSaxon,
        _ => Market::Global,
    }
}

/// Infers city, country, and market from a free-text location.
///
/// Lookup order: city table substring match, country keywords, then the
/// first comma-delimited token as a generic city under "Global".
#[must_use]
pub fn resolve(raw_location: &str) -> ResolvedLocation {
    let cleaned = raw_location.trim().to_lowercase();
    if cleaned.is_empty() {
        return ResolvedLocation {
            city: None,
            country: "Global".to_string(),
            market: Market::Global,
        };
    }

    for (country, cities) in CITY_TABLE {
        for city in cities {
            if cleaned.contains(city) {
                return ResolvedLocation {
                    city: Some(canonical_city(city)),
                    country: country.to_string(),
                    market: market_for_country(country),
                };
            }
        }
    }

    let tokens: Vec<&str> = cleaned
        .split(|c: char| !c.is_alphanumeric() && c != '.' && c != '-')
        .filter(|t| !t.is_empty())
        .collect();
    for (country, keywords) in COUNTRY_KEYWORDS {
        for keyword in keywords {
            let hit = if keyword.contains(' ') {
                cleaned.contains(keyword)
            } else {
                tokens.iter().any(|t| t == keyword)
            };
            if hit {
                return ResolvedLocation {
                    city: None,
                    country: country.to_string(),
                    market: market_for_country(country),
                };
            }
        }
    }

    let generic = cleaned
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(title_case);
    ResolvedLocation {
        city: generic,
        country: "Global".to_string(),
        market: Market::Global,
    }
}

/// Canonical display form for a matched city key.
fn canonical_city(key: &str) -> String {
    match key {
        "fes" | "fès" => "Fès".to_string(),
        "meknes" | "meknès" => "Meknès".to_string(),
        "kenitra" | "kénitra" => "Kénitra".to_string(),
        "tetouan" | "tétouan" => "Tétouan".to_string(),
        "sale" | "salé" => "Salé".to_string(),
        "temara" | "témara" => "Témara".to_string(),
        "quebec" | "québec" => "Québec".to_string(),
        "münchen" => "Munich".to_string(),
        "köln" => "Cologne".to_string(),
        other => title_case(other),
    }
}

/// Upper-cases the first letter of each whitespace-separated word.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replaces the accented characters common in French labels.
fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' => 'e',
            'à' | 'â' => 'a',
            'î' => 'i',
            'ô' => 'o',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_city_resolves_with_country() {
        let loc = resolve("Casablanca, Maroc");
        assert_eq!(loc.city.as_deref(), Some("Casablanca"));
        assert_eq!(loc.country, "Maroc");
        assert_eq!(loc.market, Market::Maghreb);
    }

    #[test]
    fn city_match_is_case_insensitive_substring() {
        let loc = resolve("Greater LONDON area");
        assert_eq!(loc.city.as_deref(), Some("London"));
        assert_eq!(loc.country, "United Kingdom");
        assert_eq!(loc.market, Market::AngloSaxon);
    }

    #[test]
    fn accented_city_keys_canonicalize() {
        assert_eq!(resolve("fes").city.as_deref(), Some("Fès"));
        assert_eq!(resolve("Meknès").city.as_deref(), Some("Meknès"));
    }

    #[test]
    fn country_keyword_without_city() {
        let loc = resolve("somewhere in Morocco");
        assert_eq!(loc.city, None);
        assert_eq!(loc.country, "Maroc");
        assert_eq!(loc.market, Market::Maghreb);
    }

    #[test]
    fn short_country_codes_match_whole_tokens_only() {
        let loc = resolve("remote, MA");
        assert_eq!(loc.country, "Maroc");
        // "marketing" must not hit the "ma" code.
        let other = resolve("marketing hub");
        assert_eq!(other.country, "Global");
        assert_eq!(other.city.as_deref(), Some("Marketing Hub"));
    }

    #[test]
    fn unknown_location_falls_back_to_generic_city() {
        let loc = resolve("somewhere, unknownland");
        assert_eq!(loc.city.as_deref(), Some("Somewhere"));
        assert_eq!(loc.country, "Global");
        assert_eq!(loc.market, Market::Global);
    }

    #[test]
    fn empty_location_is_global() {
        let loc = resolve("   ");
        assert_eq!(loc.city, None);
        assert_eq!(loc.country, "Global");
        assert_eq!(loc.market, Market::Global);
    }

    #[test]
    fn markets_group_countries() {
        assert_eq!(market_for_country("Maroc"), Market::Maghreb);
        assert_eq!(market_for_country("France"), Market::Europe);
        assert_eq!(market_for_country("Germany"), Market::Europe);
        assert_eq!(market_for_country("United States"), Market::NorthAmerica);
        assert_eq!(market_for_country("Canada"), Market::NorthAmerica);
        assert_eq!(market_for_country("United Kingdom"), Market::AngloSaxon);
        assert_eq!(market_for_country("Atlantis"), Market::Global);
    }

    #[test]
    fn experience_buckets_follow_the_boundaries() {
        assert_eq!(experience_bucket(0.0), ExperienceLevel::Junior);
        assert_eq!(experience_bucket(2.0), ExperienceLevel::Junior);
        assert_eq!(experience_bucket(2.5), ExperienceLevel::Intermediate);
        assert_eq!(experience_bucket(5.0), ExperienceLevel::Intermediate);
        assert_eq!(experience_bucket(7.0), ExperienceLevel::Senior);
        assert_eq!(experience_bucket(10.0), ExperienceLevel::Senior);
        assert_eq!(experience_bucket(11.0), ExperienceLevel::Expert);
    }

    #[test]
    fn band_labels_align_with_buckets() {
        assert_eq!(experience_band_label(1.0), "0-2 years");
        assert_eq!(experience_band_label(4.0), "3-5 years");
        assert_eq!(experience_band_label(8.0), "5-10 years");
        assert_eq!(experience_band_label(15.0), "10+ years");
    }

    #[test]
    fn level_codes_normalize() {
        assert_eq!(normalize_level_label("EN"), ExperienceLevel::Junior);
        assert_eq!(normalize_level_label("mi"), ExperienceLevel::Intermediate);
        assert_eq!(normalize_level_label("SE"), ExperienceLevel::Senior);
        assert_eq!(normalize_level_label("EXPERT"), ExperienceLevel::Expert);
    }

    #[test]
    fn french_labels_normalize_with_accent_folding() {
        assert_eq!(normalize_level_label("débutant"), ExperienceLevel::Junior);
        assert_eq!(normalize_level_label("debutant"), ExperienceLevel::Junior);
        assert_eq!(
            normalize_level_label("Intermédiaire"),
            ExperienceLevel::Intermediate
        );
        assert_eq!(
            normalize_level_label("cadre supérieur"),
            ExperienceLevel::Expert
        );
    }

    #[test]
    fn unrecognized_labels_default_to_intermediate() {
        assert_eq!(
            normalize_level_label("wizard"),
            ExperienceLevel::Intermediate
        );
        assert_eq!(normalize_level_label(""), ExperienceLevel::Intermediate);
    }
}
