use crate::game::Game;
use log::debug;
use std::collections::HashMap;

/// Games hosted by this process, keyed by a monotonically assigned id.
#[derive(Debug, Default)]
pub struct GameRegistry {
    games: HashMap<u32, Game>,
    next_id: u32,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `game` and returns its id.
    pub fn create(&mut self, game: Game) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.games.insert(id, game);
        debug!("Registered game {}", id);
        id
    }

    pub fn get(&self, id: u32) -> Option<&Game> {
        self.games.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Game> {
        self.games.get_mut(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<Game> {
        let game = self.games.remove(&id);
        if game.is_some() {
            debug!("Removed game {}", id);
        }
        game
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Board, GameMode};
    use std::time::Duration;

    fn game() -> Game {
        Game::with_board(Board::new(7, 7), GameMode::Solo, Duration::from_secs(1))
    }

    #[test]
    fn test_create_assigns_distinct_ids() {
        let mut registry = GameRegistry::new();
        let a = registry.create(game());
        let b = registry.create(game());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_games_are_independent() {
        let mut registry = GameRegistry::new();
        let a = registry.create(game());
        let b = registry.create(game());

        registry.get_mut(a).unwrap().kill(0);
        assert!(!registry.get(a).unwrap().players()[0].alive);
        assert!(registry.get(b).unwrap().players()[0].alive);
    }

    #[test]
    fn test_remove() {
        let mut registry = GameRegistry::new();
        let id = registry.create(game());
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }
}
