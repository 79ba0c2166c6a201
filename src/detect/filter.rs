//! Label stability filter
//!
//! Turns the noisy per-frame prediction stream into a sparse stream of
//! accepted label changes. Pure function over the current candidate set and
//! the prior accepted label; it holds no timers and no other state. The
//! only reset is a label change ("sticky until changed"), there is no
//! time-based decay.

use super::{AcceptedDetection, DetectionCandidate};

/// Evaluate one cycle's candidates against the previous accepted label
///
/// Selects the candidate with maximum probability, ties broken by input
/// order (first wins). Returns `None` when:
/// - there are no candidates left after dropping `ignored_labels`,
/// - the winner's probability is below `threshold` (the threshold itself
///   is accepting: probability == threshold passes),
/// - the winner's trimmed label equals the previous accepted label
///   (repeat suppression, compared case-sensitively).
///
/// `ignored_labels` must already be lowercased; candidates are compared
/// against it case-insensitively. Candidates with a NaN probability are
/// dropped before selection. The winner's label is trimmed of surrounding
/// whitespace before the repeat compare and in the returned record.
pub fn accept(
    candidates: &[DetectionCandidate],
    previous: Option<&AcceptedDetection>,
    threshold: f64,
    ignored_labels: &[String],
) -> Option<AcceptedDetection> {
    let mut considered = candidates.iter().filter(|c| {
        !c.probability.is_nan() && !ignored_labels.contains(&c.label.to_lowercase())
    });

    let first = considered.next()?;
    // Strict > keeps the earliest candidate on ties
    let winner = considered.fold(first, |best, c| {
        if c.probability > best.probability {
            c
        } else {
            best
        }
    });

    if !(winner.probability >= threshold) {
        return None;
    }

    // Repeat check and stored record both use the trimmed label
    let label = winner.label.trim();

    if let Some(prev) = previous {
        if prev.label == label {
            return None;
        }
    }

    Some(AcceptedDetection {
        label: label.to_string(),
        probability: winner.probability,
        accepted_at: chrono::Utc::now(),
    })
}
