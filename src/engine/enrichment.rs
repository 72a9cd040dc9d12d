//! Optional point-of-interest enrichment.
//!
//! An enrichment source (typically an OSM lookup) may suggest a category and
//! a name for a new place. The suggested category only feeds the auto-accept
//! bonus; it never overrides the scorer.

use serde::{Deserialize, Serialize};

use crate::{GpsPoint, PlaceCategory};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSuggestion {
    #[serde(default)]
    pub category: Option<PlaceCategory>,
    #[serde(default)]
    pub name: Option<String>,
}

pub trait CategoryEnrichment: Send + Sync {
    fn suggest(&self, center: &GpsPoint) -> Option<EnrichmentSuggestion>;
}

impl<F> CategoryEnrichment for F
where
    F: Fn(&GpsPoint) -> Option<EnrichmentSuggestion> + Send + Sync,
{
    fn suggest(&self, center: &GpsPoint) -> Option<EnrichmentSuggestion> {
        self(center)
    }
}

/// Name for a new place: enrichment name, then category display name.
///
/// Unknown places are called "Unknown Place".
pub fn suggest_name(category: PlaceCategory, suggestion: Option<&EnrichmentSuggestion>) -> String {
    suggestion
        .and_then(|s| s.name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| category.display_name().to_string())
}
