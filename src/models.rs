// src/models.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------
// Using newtype pattern for type safety to prevent mixing different ID types

/// Strongly typed identifier for canonical registry entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalEntityId(pub i64);

impl std::fmt::Display for CanonicalEntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------------------------------------------------------------------------
// CORE DOMAIN MODELS
//------------------------------------------------------------------------------

/// An authoritative registry entry (a registered mining company or site).
///
/// Loaded once per run and treated as read-only; match results reference
/// canonical entities by id rather than copying them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// Stable registry identifier
    pub id: CanonicalEntityId,

    /// Display name as recorded in the registry
    pub name: String,
}

/// One row of scraped source data, as handed over by the scraping collaborator.
///
/// Fields the core does not interpret travel in `attributes` untouched.
/// All parsed fields are optional: scraped tables routinely carry missing
/// names, missing coordinates, and malformed geometry encodings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedRecord {
    /// Zero-based row index in the staging table this record came from
    #[serde(default)]
    pub row: usize,

    /// Company or site name exactly as scraped
    #[serde(default)]
    pub raw_name: Option<String>,

    /// WGS84 latitude in degrees, if the source carried one
    #[serde(default, deserialize_with = "lenient_coord")]
    pub latitude: Option<f64>,

    /// WGS84 longitude in degrees, if the source carried one
    #[serde(default, deserialize_with = "lenient_coord")]
    pub longitude: Option<f64>,

    /// JSON-encoded license polygon rings, either bare nested arrays or a
    /// GeoJSON-style envelope. Parsed lazily by the geometric resolver.
    #[serde(default)]
    pub polygon_coordinates: Option<String>,

    /// Passthrough attributes the core carries but never reads
    #[serde(default, flatten)]
    pub attributes: HashMap<String, Value>,
}

/// Deserializes a coordinate that the scraped table may encode as a JSON
/// number, a numeric string, or an empty string. Anything unparseable
/// becomes `None` rather than an error.
fn lenient_coord<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coord_from_value))
}

/// Extracts a finite coordinate from a loosely typed cell value.
pub fn coord_from_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

//------------------------------------------------------------------------------
// MATCH RESULTS
//------------------------------------------------------------------------------

/// Which stage of the cascade produced a match, ordered by descending
/// confidence. `None` is the explicit terminal state for unmatched targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchTier {
    /// Normalized name and rounded coordinates both agreed
    Confidence,

    /// Rounded coordinates alone agreed
    Coordinate,

    /// Normalized name alone agreed
    NameFallback,

    /// No tier produced a match
    None,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Confidence => "confidence",
            MatchTier::Coordinate => "coordinate",
            MatchTier::NameFallback => "name_fallback",
            MatchTier::None => "none",
        }
    }
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of resolving one target record, created once per target per
/// run. A later tier never overwrites an earlier tier's fields; it only
/// fills results that are still empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Row index of the target record this result belongs to
    pub target_row: usize,

    /// Row index of the scraped candidate that satisfied the match, if any
    pub candidate_row: Option<usize>,

    /// Canonical entity the name resolved to, if any
    pub entity_id: Option<CanonicalEntityId>,

    /// Display name of the canonical entity, if any
    pub entity_name: Option<String>,

    /// Similarity score on a 0-100 scale; 100 means exact
    pub score: Option<f64>,

    /// The tier that produced this result
    pub tier: MatchTier,
}

impl MatchResult {
    /// An unmatched terminal result for the given target row.
    pub fn unmatched(target_row: usize) -> Self {
        MatchResult {
            target_row,
            candidate_row: None,
            entity_id: None,
            entity_name: None,
            score: None,
            tier: MatchTier::None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.tier != MatchTier::None
    }
}
