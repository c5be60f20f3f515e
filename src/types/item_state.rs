// src/types/item_state.rs
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lifecycle of one URL inside a scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Normalizing,
    Waiting,
    Navigating,
    Dismissing,
    Expanding,
    Extracting,
    Succeeded,
    Failed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Failed)
    }

    /// The only non-failure state reachable from `self`
    pub fn successor(self) -> Option<ItemState> {
        match self {
            ItemState::Pending => Some(ItemState::Normalizing),
            ItemState::Normalizing => Some(ItemState::Waiting),
            ItemState::Waiting => Some(ItemState::Navigating),
            ItemState::Navigating => Some(ItemState::Dismissing),
            ItemState::Dismissing => Some(ItemState::Expanding),
            ItemState::Expanding => Some(ItemState::Extracting),
            ItemState::Extracting => Some(ItemState::Succeeded),
            ItemState::Succeeded | ItemState::Failed => None,
        }
    }
}

/// Forward-only tracker for an item's state
#[derive(Debug, Clone)]
pub struct ItemProgress {
    url: String,
    state: ItemState,
}

impl ItemProgress {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: ItemState::Pending,
        }
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    /// Moves to `next` if it is the successor, or `Failed` from any live state.
    /// Returns false (and stays put) for any other transition.
    pub fn advance(&mut self, next: ItemState) -> bool {
        let allowed = match next {
            ItemState::Failed => !self.state.is_terminal(),
            _ => self.state.successor() == Some(next),
        };

        if allowed {
            debug!(url = %self.url, from = ?self.state, to = ?next, "item state change");
            self.state = next;
        } else {
            warn!(url = %self.url, from = ?self.state, to = ?next, "rejected item state change");
        }
        allowed
    }

    /// Marks the item failed and returns the stage it failed in.
    pub fn fail(&mut self) -> ItemState {
        let stage = self.state;
        self.advance(ItemState::Failed);
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_walks_every_state() {
        let mut progress = ItemProgress::new("u");
        let path = [
            ItemState::Normalizing,
            ItemState::Waiting,
            ItemState::Navigating,
            ItemState::Dismissing,
            ItemState::Expanding,
            ItemState::Extracting,
            ItemState::Succeeded,
        ];
        for state in path {
            assert!(progress.advance(state), "could not enter {:?}", state);
        }
        assert!(progress.state().is_terminal());
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        let mut progress = ItemProgress::new("u");
        assert!(!progress.advance(ItemState::Navigating));
        assert!(progress.advance(ItemState::Normalizing));
        assert!(progress.advance(ItemState::Waiting));
        assert!(!progress.advance(ItemState::Normalizing));
        assert_eq!(progress.state(), ItemState::Waiting);
    }

    #[test]
    fn test_fail_records_stage_and_is_terminal() {
        let mut progress = ItemProgress::new("u");
        progress.advance(ItemState::Normalizing);
        assert_eq!(progress.fail(), ItemState::Normalizing);
        assert_eq!(progress.state(), ItemState::Failed);
        assert!(!progress.advance(ItemState::Waiting));
        assert!(!progress.advance(ItemState::Failed));
    }
}
