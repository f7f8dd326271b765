//! Per-field boost weights and the total-boost cap (spec.md §4.7).

use serde::{Deserialize, Serialize};

/// Hard cap on the summed boost contribution, regardless of how the
/// individual weights below are configured.
pub const MAX_TOTAL_BOOST: f32 = 0.60;

/// Tunable per-field weights. Defaults match the registered weights in the
/// original search service's configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoostWeights {
    pub keywords: f32,
    pub topics: f32,
    pub questions: f32,
    pub summary: f32,
    pub semantic_keywords: f32,
    pub entity_relationships: f32,
    pub attributes: f32,
}

impl Default for BoostWeights {
    fn default() -> Self {
        Self {
            keywords: 0.10,
            topics: 0.06,
            questions: 0.08,
            summary: 0.06,
            semantic_keywords: 0.15,
            entity_relationships: 0.10,
            attributes: 0.08,
        }
    }
}
