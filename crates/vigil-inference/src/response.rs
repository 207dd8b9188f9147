use serde::Deserialize;
use vigil_types::{
    analysis::{AnalysisResult, CrowdDensity, SceneAssessment},
    Result,
};

use crate::invalid_response;

/// Every field except `notes` must be present; `timestamp_sec` is ignored in
/// favour of the frame's own timestamp.
#[derive(Debug, Deserialize)]
struct RawAssessment {
    people_count: u32,
    crowd_density: String,
    fire_detected: bool,
    weapons_visible: bool,
    fight_detected: bool,
    panic_or_running: bool,
    confidence: f64,
    #[serde(default)]
    notes: String,
}

/// Strips code-fence markup and returns the outermost JSON object in `text`.
pub fn extract_json(text: &str) -> Result<&str> {
    let unfenced = text.trim().trim_start_matches("```json").trim_matches('`').trim();
    let start = unfenced
        .find('{')
        .ok_or_else(|| invalid_response("no JSON object in response"))?;
    let end = unfenced
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| invalid_response("unterminated JSON object in response"))?;
    Ok(&unfenced[start..=end])
}

/// Validates a raw service response into a scored result for the frame at
/// `timestamp_sec`. Anything malformed yields an error and no result.
pub fn parse_analysis(text: &str, timestamp_sec: u64) -> Result<AnalysisResult> {
    if text.trim().is_empty() {
        return Err(invalid_response("empty response"));
    }
    let json = extract_json(text)?;
    let raw: RawAssessment = serde_json::from_str(json)
        .map_err(|err| invalid_response(format!("malformed assessment: {err}")))?;

    let crowd_density: CrowdDensity = raw.crowd_density.parse()?;
    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(invalid_response(format!(
            "confidence {} outside [0, 1]",
            raw.confidence
        )));
    }

    Ok(AnalysisResult::new(SceneAssessment {
        timestamp_sec,
        people_count: raw.people_count,
        crowd_density,
        fire_detected: raw.fire_detected,
        weapons_visible: raw.weapons_visible,
        fight_detected: raw.fight_detected,
        panic_or_running: raw.panic_or_running,
        confidence: raw.confidence,
        notes: raw.notes,
    }))
}
