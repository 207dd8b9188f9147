use serde::Serialize;

use crate::analysis::{AnalysisResult, CrowdDensity};

/// Terminal aggregate report produced once per monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub average_people: f64,
    pub max_people: u32,
    pub fire_events: usize,
    pub weapon_events: usize,
    pub fight_events: usize,
    pub dominant_density: CrowdDensity,
    /// Per-frame results in arrival order. Never empty.
    pub frames: Vec<AnalysisResult>,
}
