//! Per-frame scene assessment and derived risk scoring.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VigilError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdDensity {
    Low,
    Medium,
    High,
}

impl CrowdDensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdDensity::Low => "low",
            CrowdDensity::Medium => "medium",
            CrowdDensity::High => "high",
        }
    }
}

impl FromStr for CrowdDensity {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CrowdDensity::Low),
            "medium" => Ok(CrowdDensity::Medium),
            "high" => Ok(CrowdDensity::High),
            other => Err(VigilError::InvalidResponse(format!(
                "unknown crowd density '{other}'"
            ))),
        }
    }
}

/// Scene description reported by the inference service for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAssessment {
    pub timestamp_sec: u64,
    pub people_count: u32,
    pub crowd_density: CrowdDensity,
    pub fire_detected: bool,
    pub weapons_visible: bool,
    pub fight_detected: bool,
    pub panic_or_running: bool,
    pub confidence: f64,
    pub notes: String,
}

/// Risk weights in hundredths, so the weighted sum is exact before rounding.
const FIRE_WEIGHT: u32 = 90;
const WEAPONS_WEIGHT: u32 = 80;
const FIGHT_WEIGHT: u32 = 60;
const PANIC_WEIGHT: u32 = 40;
const MAX_RISK: u32 = 100;

/// Weighted hazard score: `min(1.0, round(0.9f + 0.8w + 0.6t + 0.4p, 2))`.
pub fn risk_score(fire: bool, weapons: bool, fight: bool, panic: bool) -> f64 {
    let hundredths = [
        (fire, FIRE_WEIGHT),
        (weapons, WEAPONS_WEIGHT),
        (fight, FIGHT_WEIGHT),
        (panic, PANIC_WEIGHT),
    ]
    .iter()
    .filter(|(flag, _)| *flag)
    .map(|(_, weight)| weight)
    .sum::<u32>()
    .min(MAX_RISK);
    f64::from(hundredths) / 100.0
}

/// A validated assessment together with its derived risk score.
///
/// The score is computed on construction and cannot be supplied from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    assessment: SceneAssessment,
    risk_score: f64,
}

impl AnalysisResult {
    pub fn new(assessment: SceneAssessment) -> Self {
        let risk_score = risk_score(
            assessment.fire_detected,
            assessment.weapons_visible,
            assessment.fight_detected,
            assessment.panic_or_running,
        );
        Self {
            assessment,
            risk_score,
        }
    }

    pub fn assessment(&self) -> &SceneAssessment {
        &self.assessment
    }

    pub fn timestamp_sec(&self) -> u64 {
        self.assessment.timestamp_sec
    }

    pub fn people_count(&self) -> u32 {
        self.assessment.people_count
    }

    pub fn crowd_density(&self) -> CrowdDensity {
        self.assessment.crowd_density
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    /// One-line human readable status used for per-frame logging.
    pub fn status_line(&self) -> String {
        let a = &self.assessment;
        format!(
            "[{}s] people={} fire={} weapon={} fight={} risk={:.2}",
            a.timestamp_sec,
            a.people_count,
            a.fire_detected,
            a.weapons_visible,
            a.fight_detected,
            self.risk_score
        )
    }
}
