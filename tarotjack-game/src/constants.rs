//! Storage keys shared by the engine and its hosts.
//!
//! Document keys are part of the save format. Changing one orphans every
//! existing save, so bump the suffix instead of editing in place.

// Documents ----------------------------------------------------------------
pub const MAP_KEY: &str = "Map";
pub const PROGRESSION_KEY: &str = "GameProgression_v2";

// Scene hand-off -----------------------------------------------------------
pub const HANDOFF_RETURN_TO_MAP: &str = "ReturnToMapPending";
pub const HANDOFF_ENTERED_NODE_KIND: &str = "EnteredNodeKind";
pub const HANDOFF_IS_REPLAY: &str = "IsReplayAttempt";
pub const HANDOFF_RETURN_TO_TITLE: &str = "ReturnToTitlePending";

/// Seed mixing constant for map regeneration within one session.
pub(crate) const MAP_SEED_STEP: u64 = 0x9E37_79B9_7F4A_7C15;
