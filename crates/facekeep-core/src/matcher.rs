use crate::policy::MatchPolicy;
use crate::types::{Embedding, MatchVerdict, Profile};

/// Strategy for scoring a probe embedding against one enrolled profile.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, profile: &Profile, policy: &MatchPolicy) -> MatchVerdict;
}

/// Minimum Euclidean distance over the profile's window.
///
/// Visits every window entry with no early exit. Entries whose
/// dimensionality differs from the probe are skipped.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, profile: &Profile, policy: &MatchPolicy) -> MatchVerdict {
        let mut best = f32::INFINITY;
        let mut incomparable = 0usize;

        for stored in &profile.window {
            match probe.euclidean_distance(stored) {
                Some(d) if d < best => best = d,
                Some(_) => {}
                None => incomparable += 1,
            }
        }

        if incomparable > 0 {
            tracing::warn!(
                user_id = %profile.id,
                incomparable,
                probe_dim = probe.dim(),
                "skipped stored embeddings with mismatched dimensionality"
            );
        }

        MatchVerdict {
            matched: policy.is_match(best),
            label: profile.label.clone(),
            distance: best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DescriptorWindow;

    fn profile(entries: Vec<Vec<f32>>) -> Profile {
        let window = DescriptorWindow::from_batch(entries.into_iter().map(Embedding::new), 10);
        Profile::enrolled("u1", "alice", window)
    }

    fn policy() -> MatchPolicy {
        MatchPolicy { embedding_dim: 2, ..MatchPolicy::default() }
    }

    #[test]
    fn test_best_match_is_minimum_over_window() {
        // Closest entry is last; the whole window must be visited.
        let p = profile(vec![vec![3.0, 0.0], vec![1.0, 0.0], vec![0.3, 0.0]]);
        let v = EuclideanMatcher.compare(&Embedding::new(vec![0.0, 0.0]), &p, &policy());
        assert!(v.matched);
        assert_eq!(v.label, "alice");
        assert!((v.distance - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_rejection_still_reports_label_and_distance() {
        let p = profile(vec![vec![0.8, 0.0]]);
        let v = EuclideanMatcher.compare(&Embedding::new(vec![0.0, 0.0]), &p, &policy());
        assert!(!v.matched);
        assert_eq!(v.label, "alice");
        assert!((v.distance - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_empty_window_is_infinite_distance() {
        let p = profile(vec![]);
        let v = EuclideanMatcher.compare(&Embedding::new(vec![0.0, 0.0]), &p, &policy());
        assert!(!v.matched);
        assert_eq!(v.distance, f32::INFINITY);
    }

    #[test]
    fn test_mismatched_dimensions_are_skipped() {
        let p = profile(vec![vec![0.0, 0.0, 0.0], vec![0.5, 0.0]]);
        let v = EuclideanMatcher.compare(&Embedding::new(vec![0.0, 0.0]), &p, &policy());
        assert!(v.matched);
        assert!((v.distance - 0.5).abs() < 1e-6);
    }
}
