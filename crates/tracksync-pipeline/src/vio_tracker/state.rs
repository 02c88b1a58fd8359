//! Intermediate state for VIO/tracker calibration.

use serde::{Deserialize, Serialize};
use tracksync_linear::{LeverArmEstimate, PairEstimate, SyncEstimate, SyncVariant};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VioTrackerState {
    // ─────────────────────────────────────────────────────────────────────────
    // From sync search
    // ─────────────────────────────────────────────────────────────────────────
    /// Minimum-variance search, including every candidate.
    pub variance_sync: Option<SyncEstimate>,

    /// Maximum-cosine search, including every candidate.
    pub cosine_sync: Option<SyncEstimate>,

    /// Variant whose offset feeds the translation step.
    pub chosen_variant: Option<SyncVariant>,

    // ─────────────────────────────────────────────────────────────────────────
    // From translation estimation
    // ─────────────────────────────────────────────────────────────────────────
    pub diagnostic: Option<Vec<PairEstimate>>,

    pub lever_arm: Option<LeverArmEstimate>,
}

impl VioTrackerState {
    pub fn has_sync(&self) -> bool {
        self.chosen_sync().is_some()
    }

    pub fn has_translation(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn sync(&self, variant: SyncVariant) -> Option<&SyncEstimate> {
        match variant {
            SyncVariant::MinVariance => self.variance_sync.as_ref(),
            SyncVariant::MaxCosine => self.cosine_sync.as_ref(),
        }
    }

    pub fn chosen_sync(&self) -> Option<&SyncEstimate> {
        self.chosen_variant.and_then(|v| self.sync(v))
    }

    /// Drop sync results and everything computed from them.
    pub fn clear_sync(&mut self) {
        self.variance_sync = None;
        self.cosine_sync = None;
        self.chosen_variant = None;
        self.clear_translation();
    }

    pub fn clear_translation(&mut self) {
        self.diagnostic = None;
        self.lever_arm = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(variant: SyncVariant, offset: f64) -> SyncEstimate {
        SyncEstimate {
            variant,
            offset,
            objective: 0.5,
            candidates: Vec::new(),
        }
    }

    #[test]
    fn chosen_sync_follows_variant() {
        let mut state = VioTrackerState {
            variance_sync: Some(estimate(SyncVariant::MinVariance, 1.0)),
            cosine_sync: Some(estimate(SyncVariant::MaxCosine, 1.1)),
            ..VioTrackerState::default()
        };
        assert!(!state.has_sync());

        state.chosen_variant = Some(SyncVariant::MaxCosine);
        assert_eq!(state.chosen_sync().map(|e| e.offset), Some(1.1));

        state.cosine_sync = None;
        assert!(!state.has_sync());
    }

    #[test]
    fn clear_sync_drops_translation() {
        let mut state = VioTrackerState {
            variance_sync: Some(estimate(SyncVariant::MinVariance, 1.0)),
            chosen_variant: Some(SyncVariant::MinVariance),
            diagnostic: Some(Vec::new()),
            ..VioTrackerState::default()
        };
        assert!(state.has_translation());
        state.clear_sync();
        assert!(!state.has_sync());
        assert!(!state.has_translation());
    }
}
