//! Pre-programmed aligner for exercising refinement policies.

use std::collections::VecDeque;

use super::{AlignmentResult, GoodnessGate, RigidAligner};
use crate::core::types::{PointCloud3D, Pose3D};

/// Returns queued results in order, ignoring the clouds it is given.
///
/// Once the queue is empty every call returns `fallback`. The point counts
/// of each call are recorded so tests can inspect what was aligned.
#[derive(Debug, Clone)]
pub struct AlignmentScript {
    results: VecDeque<AlignmentResult>,
    fallback: AlignmentResult,
    gate: GoodnessGate,
    calls: Vec<(usize, usize)>,
}

impl AlignmentScript {
    /// Empty script on a percentage scale gated at `min_goodness`.
    pub fn percentage(min_goodness: f64) -> Self {
        Self {
            results: VecDeque::new(),
            fallback: AlignmentResult::new(Pose3D::identity(), 1, 100.0, true),
            gate: GoodnessGate::AtLeast(min_goodness),
            calls: Vec::new(),
        }
    }

    pub fn with_gate(mut self, gate: GoodnessGate) -> Self {
        self.gate = gate;
        self
    }

    /// Queue one result.
    pub fn then(mut self, transform: Pose3D, goodness: f64) -> Self {
        self.results
            .push_back(AlignmentResult::new(transform, 1, goodness, true));
        self
    }

    /// (source, target) point counts of every call so far.
    pub fn calls(&self) -> &[(usize, usize)] {
        &self.calls
    }
}

impl RigidAligner for AlignmentScript {
    fn name(&self) -> &'static str {
        "script"
    }

    fn align(
        &mut self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        _initial_guess: &Pose3D,
    ) -> AlignmentResult {
        self.calls.push((source.len(), target.len()));
        self.results.pop_front().unwrap_or(self.fallback)
    }

    fn gate(&self) -> GoodnessGate {
        self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_then_falls_back() {
        let shift = Pose3D::from_translation(1.0, 0.0, 0.0);
        let mut script = AlignmentScript::percentage(96.0).then(shift, 50.0);
        let cloud = PointCloud3D::from_points(&[Default::default()]);

        let first = script.align(&cloud, &PointCloud3D::new(), &Pose3D::identity());
        assert_eq!(first.transform, shift);
        assert_eq!(first.goodness, 50.0);

        let second = script.align(&cloud, &cloud, &Pose3D::identity());
        assert_eq!(second.goodness, 100.0);
        assert_eq!(script.calls(), &[(1, 0), (1, 1)]);
    }
}
