//! Write-once, read-once values passed between scenes through storage.
use serde::{Deserialize, Serialize};

use crate::GameStorage;
use crate::constants::{
    HANDOFF_ENTERED_NODE_KIND, HANDOFF_IS_REPLAY, HANDOFF_RETURN_TO_MAP, HANDOFF_RETURN_TO_TITLE,
};
use crate::map::NodeKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneHandoff {
    pub return_to_map: bool,
    pub entered_node_kind: Option<NodeKind>,
    pub is_replay: bool,
    pub return_to_title: bool,
}

impl SceneHandoff {
    /// Handoff for a scene entered from the map.
    #[must_use]
    pub const fn entering(kind: NodeKind, replay: bool) -> Self {
        Self {
            return_to_map: false,
            entered_node_kind: Some(kind),
            is_replay: replay,
            return_to_title: false,
        }
    }

    /// Handoff for an encounter that finished and is heading back.
    #[must_use]
    pub const fn returning(kind: Option<NodeKind>, replay: bool) -> Self {
        Self {
            return_to_map: true,
            entered_node_kind: kind,
            is_replay: replay,
            return_to_title: false,
        }
    }

    #[must_use]
    pub const fn to_title() -> Self {
        Self {
            return_to_map: false,
            entered_node_kind: None,
            is_replay: false,
            return_to_title: true,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.return_to_map && self.entered_node_kind.is_none() && !self.return_to_title
    }

    /// Write every set value under its own key.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn write<S: GameStorage>(&self, storage: &S) -> Result<(), S::Error> {
        if self.return_to_map {
            storage.save_document(HANDOFF_RETURN_TO_MAP, &true)?;
        }
        if let Some(kind) = self.entered_node_kind {
            storage.save_document(HANDOFF_ENTERED_NODE_KIND, &kind)?;
            storage.save_document(HANDOFF_IS_REPLAY, &self.is_replay)?;
        }
        if self.return_to_title {
            storage.save_document(HANDOFF_RETURN_TO_TITLE, &true)?;
        }
        Ok(())
    }

    /// Read then delete every hand-off key. Unreadable values count as unset.
    ///
    /// # Errors
    ///
    /// Propagates failures to delete a key.
    pub fn take<S: GameStorage>(storage: &S) -> Result<Self, S::Error> {
        let handoff = Self {
            return_to_map: read_or_default(storage, HANDOFF_RETURN_TO_MAP),
            entered_node_kind: read_or_default(storage, HANDOFF_ENTERED_NODE_KIND),
            is_replay: read_or_default(storage, HANDOFF_IS_REPLAY),
            return_to_title: read_or_default(storage, HANDOFF_RETURN_TO_TITLE),
        };
        for key in [
            HANDOFF_RETURN_TO_MAP,
            HANDOFF_ENTERED_NODE_KIND,
            HANDOFF_IS_REPLAY,
            HANDOFF_RETURN_TO_TITLE,
        ] {
            storage.delete_document(key)?;
        }
        Ok(handoff)
    }
}

fn read_or_default<S, T>(storage: &S, key: &str) -> T
where
    S: GameStorage,
    T: serde::de::DeserializeOwned + Default,
{
    match storage.load_document(key) {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            log::warn!("ignoring unreadable hand-off '{key}': {err}");
            T::default()
        }
    }
}
