//! Client-side copy of the server board

use crate::network::StateUpdate;
use log::debug;
use shared::Board;
use std::sync::{Arc, Mutex, MutexGuard};

/// Last known board, shared between the state receiver task and the UI.
///
/// Diffs only make sense on top of a snapshot, so any that arrive before
/// the first snapshot are dropped.
#[derive(Debug, Clone, Default)]
pub struct BoardCache {
    inner: Arc<Mutex<CacheState>>,
}

#[derive(Debug, Default)]
struct CacheState {
    board: Option<Board>,
    snapshots: usize,
    updates: usize,
}

impl BoardCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // updates are applied whole, so a poisoned board is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies a snapshot or diff. Returns whether the board changed.
    pub fn apply(&self, update: StateUpdate) -> bool {
        let mut state = self.lock();
        match update {
            StateUpdate::Snapshot(snapshot) => {
                state.snapshots += 1;
                match state.board.as_mut() {
                    Some(board) => board.replace_with(&snapshot.board),
                    None => state.board = Some(snapshot.board),
                }
                true
            }
            StateUpdate::Update(update) => {
                let Some(board) = state.board.as_mut() else {
                    debug!("Dropping diff {} received before any snapshot", update.num);
                    return false;
                };
                let applied = board.apply_diff(&update.diffs);
                state.updates += 1;
                applied > 0
            }
        }
    }

    pub fn board(&self) -> Option<Board> {
        self.lock().board.clone()
    }

    pub fn has_board(&self) -> bool {
        self.lock().board.is_some()
    }

    /// Text rendering of the board, if one has been received.
    pub fn render(&self) -> Option<String> {
        self.lock().board.as_ref().map(|board| board.to_string())
    }

    /// Number of snapshots and diffs applied so far.
    pub fn counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.snapshots, state.updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BoardSnapshot, BoardUpdate, Tile, TileDiff};

    fn snapshot(num: u16) -> StateUpdate {
        let mut board = Board::new(3, 3);
        board.set(0, 0, Tile::Player1);
        StateUpdate::Snapshot(BoardSnapshot { num, board })
    }

    fn move_right() -> StateUpdate {
        StateUpdate::Update(BoardUpdate {
            num: 0,
            diffs: vec![
                TileDiff {
                    x: 0,
                    y: 0,
                    tile: Tile::Empty,
                },
                TileDiff {
                    x: 1,
                    y: 0,
                    tile: Tile::Player1,
                },
            ],
        })
    }

    #[test]
    fn test_diff_before_snapshot_is_dropped() {
        let cache = BoardCache::new();
        assert!(!cache.apply(move_right()));
        assert!(!cache.has_board());
        assert_eq!(cache.counts(), (0, 0));
    }

    #[test]
    fn test_diff_applies_on_snapshot() {
        let cache = BoardCache::new();
        assert!(cache.apply(snapshot(0)));
        assert!(cache.apply(move_right()));

        let board = cache.board().unwrap();
        assert_eq!(board.get(0, 0), Some(Tile::Empty));
        assert_eq!(board.get(1, 0), Some(Tile::Player1));
        assert_eq!(cache.counts(), (1, 1));
    }

    #[test]
    fn test_snapshot_replaces_board() {
        let cache = BoardCache::new();
        cache.apply(snapshot(0));
        cache.apply(move_right());
        cache.apply(snapshot(1));
        assert_eq!(cache.board().unwrap().get(0, 0), Some(Tile::Player1));
    }

    #[test]
    fn test_clones_share_the_board() {
        let cache = BoardCache::new();
        let reader = cache.clone();
        cache.apply(snapshot(0));
        assert_eq!(reader.render().unwrap(), "-----\n|1  |\n|   |\n|   |\n-----");
    }
}
