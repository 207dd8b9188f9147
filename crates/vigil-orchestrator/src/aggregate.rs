use vigil_types::{
    analysis::{AnalysisResult, CrowdDensity},
    summary::SessionSummary,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Summary(SessionSummary),
    /// The result stream was empty; no summary is produced.
    NothingAnalyzed,
}

/// Reduces the finished result stream into a session summary.
pub fn summarize(results: Vec<AnalysisResult>) -> SessionOutcome {
    let Some(dominant_density) = dominant_density(&results) else {
        return SessionOutcome::NothingAnalyzed;
    };

    let total_people: u64 = results.iter().map(|r| u64::from(r.people_count())).sum();
    let average_people = round2(total_people as f64 / results.len() as f64);
    let max_people = results.iter().map(|r| r.people_count()).max().unwrap_or(0);
    let count = |flag: fn(&AnalysisResult) -> bool| results.iter().filter(|r| flag(r)).count();

    SessionOutcome::Summary(SessionSummary {
        average_people,
        max_people,
        fire_events: count(|r| r.assessment().fire_detected),
        weapon_events: count(|r| r.assessment().weapons_visible),
        fight_events: count(|r| r.assessment().fight_detected),
        dominant_density,
        frames: results,
    })
}

/// Most frequent density; ties go to the value seen first.
pub fn dominant_density(results: &[AnalysisResult]) -> Option<CrowdDensity> {
    let mut tally: Vec<(CrowdDensity, usize)> = Vec::with_capacity(3);
    for density in results.iter().map(|r| r.crowd_density()) {
        match tally.iter_mut().find(|(seen, _)| *seen == density) {
            Some((_, count)) => *count += 1,
            None => tally.push((density, 1)),
        }
    }

    let mut best: Option<(CrowdDensity, usize)> = None;
    for (density, count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((density, count));
        }
    }
    best.map(|(density, _)| density)
}

/// Two decimal places, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
