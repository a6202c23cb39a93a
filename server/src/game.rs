//! Authoritative simulation of one match: board generation, action
//! application, bomb resolution and win detection.

use log::{debug, info};
use rand::Rng;
use shared::{
    diff, team_of, Action, Board, Chat, GameMode, Tile, TileDiff, MAX_BOARD_DIM,
    MIN_BOARD_HEIGHT, MIN_BOARD_WIDTH, PLAYER_NUM,
};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Cells reached by a blast in each cardinal direction.
pub const BLAST_RANGE: i32 = 2;

const CARDINALS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const DIAGONALS: [(i32, i32); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error(
        "board {width}x{height} is smaller than the {}x{} minimum",
        MIN_BOARD_WIDTH,
        MIN_BOARD_HEIGHT
    )]
    BoardTooSmall { width: usize, height: usize },

    #[error("board {width}x{height} exceeds {} cells per side", MAX_BOARD_DIM)]
    BoardTooLarge { width: usize, height: usize },

    #[error("empty cell odds must be at least 1")]
    InvalidOdds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub x: usize,
    pub y: usize,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bomb {
    pub x: usize,
    pub y: usize,
    pub placed_at: Instant,
}

/// Result of a finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(usize),
    WinningTeam(u8),
    Draw,
}

/// Generates an arena of (at most) the requested size.
///
/// Even dimensions are rounded down to the next odd value. Pillars sit on
/// every (odd, odd) cell; destructible walls are seeded everywhere except
/// the three-cell pocket around each corner, each seeded cell staying empty
/// with a 1-in-`empty_odds` chance.
pub fn generate_board<R: Rng + ?Sized>(
    width: usize,
    height: usize,
    empty_odds: u32,
    rng: &mut R,
) -> Result<Board, GameError> {
    let width = if width % 2 == 0 { width.saturating_sub(1) } else { width };
    let height = if height % 2 == 0 { height.saturating_sub(1) } else { height };

    if width < MIN_BOARD_WIDTH || height < MIN_BOARD_HEIGHT {
        return Err(GameError::BoardTooSmall { width, height });
    }
    if width > MAX_BOARD_DIM || height > MAX_BOARD_DIM {
        return Err(GameError::BoardTooLarge { width, height });
    }
    if empty_odds == 0 {
        return Err(GameError::InvalidOdds);
    }

    let mut board = Board::new(width, height);
    for y in (1..height).step_by(2) {
        for x in (1..width).step_by(2) {
            board.set(x, y, Tile::IndestructibleWall);
        }
    }

    let mut seed = |board: &mut Board, x: usize, y: usize| {
        if !rng.gen_ratio(1, empty_odds) {
            board.set(x, y, Tile::DestructibleWall);
        }
    };

    for y in [0, height - 1] {
        for x in 3..width - 3 {
            seed(&mut board, x, y);
        }
    }
    for y in [1, height - 2] {
        for x in (2..width - 2).step_by(2) {
            seed(&mut board, x, y);
        }
    }
    for y in [2, height - 3] {
        for x in 1..width - 1 {
            seed(&mut board, x, y);
        }
    }
    for y in 3..height - 3 {
        let step = if y % 2 == 0 { 1 } else { 2 };
        for x in (0..width).step_by(step) {
            seed(&mut board, x, y);
        }
    }

    Ok(board)
}

/// Starting corner of each seat.
fn spawn_point(seat: usize, width: usize, height: usize) -> (usize, usize) {
    match seat {
        0 => (0, 0),
        1 => (width - 1, 0),
        2 => (0, height - 1),
        _ => (width - 1, height - 1),
    }
}

/// One match: board, seats, live bombs and chat log.
#[derive(Debug, Clone)]
pub struct Game {
    mode: GameMode,
    board: Board,
    players: [Player; PLAYER_NUM],
    bombs: Vec<Bomb>,
    chat: Chat,
    bomb_lifetime: Duration,
}

impl Game {
    pub fn new<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        mode: GameMode,
        bomb_lifetime: Duration,
        empty_odds: u32,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let board = generate_board(width, height, empty_odds, rng)?;
        info!(
            "Generated {}x{} board for a {} game",
            board.width(),
            board.height(),
            mode
        );
        Ok(Self::with_board(board, mode, bomb_lifetime))
    }

    /// Wraps an existing board and places every seat on its corner.
    pub fn with_board(mut board: Board, mode: GameMode, bomb_lifetime: Duration) -> Self {
        let (width, height) = (board.width(), board.height());
        let players = std::array::from_fn(|seat| {
            let (x, y) = spawn_point(seat, width, height);
            if let Some(tile) = Tile::player(seat) {
                board.set(x, y, tile);
            }
            Player { x, y, alive: true }
        });

        Self {
            mode,
            board,
            players,
            bombs: Vec::new(),
            chat: Chat::new(),
            bomb_lifetime,
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn players(&self) -> &[Player; PLAYER_NUM] {
        &self.players
    }

    pub fn bombs(&self) -> &[Bomb] {
        &self.bombs
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut Chat {
        &mut self.chat
    }

    /// Applies one action from `seat`. Returns whether anything changed.
    pub fn apply_action(&mut self, seat: usize, action: Action, now: Instant) -> bool {
        if seat >= PLAYER_NUM || !self.players[seat].alive {
            return false;
        }
        match action {
            Action::PlaceBomb => self.place_bomb(seat, now),
            movement => self.perform_move(seat, movement),
        }
    }

    /// Moves a seat one cell. Bombs, walls and other players block.
    pub fn perform_move(&mut self, seat: usize, action: Action) -> bool {
        let Some((dx, dy)) = action.delta() else {
            return false;
        };
        let Some(player) = self.players.get(seat).copied() else {
            return false;
        };
        if !player.alive {
            return false;
        }

        let (nx, ny) = (player.x as i32 + dx, player.y as i32 + dy);
        if !self.board.contains(nx, ny) {
            return false;
        }
        let (nx, ny) = (nx as usize, ny as usize);
        match self.board.get(nx, ny) {
            Some(target) if target == Tile::Bomb || target.is_wall() || target.is_player() => {
                return false;
            }
            None => return false,
            Some(_) => {}
        }

        if self.board.get(player.x, player.y) != Some(Tile::Bomb) {
            self.board.set(player.x, player.y, Tile::Empty);
        }
        if let Some(tile) = Tile::player(seat) {
            self.board.set(nx, ny, tile);
        }
        self.players[seat].x = nx;
        self.players[seat].y = ny;
        true
    }

    /// Drops a bomb under the seat unless one is already there.
    pub fn place_bomb(&mut self, seat: usize, now: Instant) -> bool {
        let Some(player) = self.players.get(seat).copied() else {
            return false;
        };
        if !player.alive || self.board.get(player.x, player.y) == Some(Tile::Bomb) {
            return false;
        }

        self.bombs.push(Bomb {
            x: player.x,
            y: player.y,
            placed_at: now,
        });
        self.board.set(player.x, player.y, Tile::Bomb);
        debug!("Seat {} placed a bomb at ({}, {})", seat, player.x, player.y);
        true
    }

    /// Detonates every bomb whose lifetime has elapsed at `now`.
    /// Returns the number of explosions.
    pub fn resolve_bombs(&mut self, now: Instant) -> usize {
        let mut exploded = 0;
        let mut i = 0;
        while i < self.bombs.len() {
            if now.saturating_duration_since(self.bombs[i].placed_at) >= self.bomb_lifetime {
                let bomb = self.bombs.swap_remove(i);
                self.explode(bomb);
                exploded += 1;
            } else {
                i += 1;
            }
        }
        exploded
    }

    fn explode(&mut self, bomb: Bomb) {
        let (bx, by) = (bomb.x as i32, bomb.y as i32);
        self.kill_at(bomb.x, bomb.y);

        for (dx, dy) in CARDINALS {
            for step in 1..=BLAST_RANGE {
                if !self.blast(bx + dx * step, by + dy * step) {
                    break;
                }
            }
        }
        for (dx, dy) in DIAGONALS {
            self.blast(bx + dx, by + dy);
        }

        self.board.set(bomb.x, bomb.y, Tile::Empty);
        debug!("Bomb at ({}, {}) exploded", bomb.x, bomb.y);
    }

    /// Affects one cell; returns whether the blast travels further.
    fn blast(&mut self, x: i32, y: i32) -> bool {
        if !self.board.contains(x, y) {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        match self.board.get(x, y) {
            Some(Tile::IndestructibleWall) | None => false,
            Some(Tile::DestructibleWall) => {
                self.board.set(x, y, Tile::Empty);
                false
            }
            Some(_) => {
                self.kill_at(x, y);
                true
            }
        }
    }

    fn kill_at(&mut self, x: usize, y: usize) {
        let victims: Vec<usize> = (0..PLAYER_NUM)
            .filter(|&seat| {
                let p = &self.players[seat];
                p.alive && p.x == x && p.y == y
            })
            .collect();
        for seat in victims {
            self.kill(seat);
        }
    }

    /// Marks a seat dead and removes its tile from the board.
    pub fn kill(&mut self, seat: usize) {
        let Some(player) = self.players.get_mut(seat) else {
            return;
        };
        if !player.alive {
            return;
        }
        player.alive = false;
        let (x, y) = (player.x, player.y);
        if self.board.get(x, y) == Tile::player(seat) {
            self.board.set(x, y, Tile::Empty);
        }
        info!("Seat {} was eliminated", seat);
    }

    /// Runs one tick: applies actions in order, resolves due bombs and
    /// returns the resulting cell changes.
    pub fn update(&mut self, actions: &[(usize, Action)], now: Instant) -> Vec<TileDiff> {
        let before = self.board.clone();
        for &(seat, action) in actions {
            self.apply_action(seat, action, now);
        }
        self.resolve_bombs(now);
        diff(&before, &self.board).unwrap_or_default()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    pub fn is_over(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.mode {
            GameMode::Solo => {
                if self.alive_count() > 1 {
                    return None;
                }
                Some(
                    self.players
                        .iter()
                        .position(|p| p.alive)
                        .map_or(Outcome::Draw, Outcome::Winner),
                )
            }
            GameMode::Team => {
                let team_alive = |team: u8| {
                    self.players
                        .iter()
                        .enumerate()
                        .any(|(seat, p)| p.alive && team_of(seat) == team)
                };
                match (team_alive(0), team_alive(1)) {
                    (true, true) => None,
                    (true, false) => Some(Outcome::WinningTeam(0)),
                    (false, true) => Some(Outcome::WinningTeam(1)),
                    (false, false) => Some(Outcome::Draw),
                }
            }
        }
    }
}
