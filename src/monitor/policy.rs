use crate::db::models::Severity;

use super::rules::AlertCandidate;

/// Chooses which of the fired candidates becomes the emitted alert.
///
/// Candidates arrive in rule evaluation order. Returning `None` suppresses
/// emission for this evaluation.
pub trait SelectionPolicy: Send + Sync {
    fn select(&self, candidates: Vec<AlertCandidate>) -> Option<AlertCandidate>;
}

impl<F> SelectionPolicy for F
where
    F: Fn(Vec<AlertCandidate>) -> Option<AlertCandidate> + Send + Sync,
{
    fn select(&self, candidates: Vec<AlertCandidate>) -> Option<AlertCandidate> {
        self(candidates)
    }
}

/// The first critical candidate, otherwise the first candidate.
///
/// Simultaneous critical conditions collapse into one alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCriticalWins;

impl SelectionPolicy for FirstCriticalWins {
    fn select(&self, candidates: Vec<AlertCandidate>) -> Option<AlertCandidate> {
        let critical = candidates
            .iter()
            .position(|c| c.severity == Severity::Critical)
            .unwrap_or(0);
        candidates.into_iter().nth(critical)
    }
}
