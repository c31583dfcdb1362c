//! Repair of a path left behind by an encounter that never completed.
//!
//! Entering a battle node appends it to the path and records the coordinate
//! as the pending marker. Completion clears the marker, so a marker seen on
//! map entry means the process died mid-fight and the append is rolled back.
use crate::ids::Coord;
use crate::map::MapState;
use crate::progression::ProgressionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No marker was stored.
    Nothing,
    /// The marker was empty or not a coordinate.
    ClearedUnparseable,
    /// The marker matched the tip, which was popped.
    Retracted(Coord),
    /// The marker did not match the tip; the path was left alone.
    Stale(Coord),
}

impl RecoveryOutcome {
    /// Whether the map document changed and must be saved.
    #[must_use]
    pub const fn path_changed(self) -> bool {
        matches!(self, Self::Retracted(_))
    }

    /// Whether the progression document changed and must be saved.
    #[must_use]
    pub const fn marker_cleared(self) -> bool {
        !matches!(self, Self::Nothing)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryReconciler;

impl RecoveryReconciler {
    /// Reconcile the pending marker against the path. The marker is always
    /// gone afterwards; the caller persists whatever changed.
    pub fn reconcile(
        map: Option<&mut MapState>,
        progression: &mut ProgressionStore,
    ) -> RecoveryOutcome {
        let Some(raw) = progression.clear_pending_node_point() else {
            return RecoveryOutcome::Nothing;
        };
        let coord = match raw.parse::<Coord>() {
            Ok(coord) => coord,
            Err(err) => {
                log::warn!("discarding pending node marker: {err}");
                return RecoveryOutcome::ClearedUnparseable;
            }
        };
        let Some(map) = map else {
            log::info!("pending node marker {coord} has no map to repair");
            return RecoveryOutcome::Stale(coord);
        };
        if map.pop_if_tip(coord) {
            log::info!("retracted interrupted encounter at {coord}");
            RecoveryOutcome::Retracted(coord)
        } else {
            log::info!(
                "stale pending node marker {coord} (tip is {:?})",
                map.tip()
            );
            RecoveryOutcome::Stale(coord)
        }
    }

    /// A map whose stage boss has been entered is finished and gets replaced.
    #[must_use]
    pub fn needs_regeneration(map: &MapState) -> bool {
        map.stage_boss_reached()
    }
}
