//! Simulation tests that drive the engine through the wire codec
//!
//! No sockets: every frame the server would send is encoded and decoded in
//! process, so the checks cover engine, codec and client cache together.

use client::game::BoardCache;
use client::input::InputSequencer;
use client::network::{StateUpdate, MAX_STATE_DATAGRAM};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::{Game, Outcome};
use server::session::{accept_action, game_end_for};
use shared::protocol::frame_len;
use shared::{
    Action, Board, BoardSnapshot, BoardUpdate, GameAction, GameMode, Message, Tile, TileDiff,
};
use std::time::{Duration, Instant};

const FUSE: Duration = Duration::from_millis(100);

/// Encodes a state message and decodes it the way the client's state
/// socket does.
fn over_the_wire(message: Message) -> StateUpdate {
    let frame = message.encode().unwrap();
    assert_eq!(frame_len(&frame), Some(frame.len()));
    match Message::decode(&frame) {
        Some(Message::Snapshot(snapshot)) => StateUpdate::Snapshot(snapshot),
        Some(Message::Update(update)) => StateUpdate::Update(update),
        other => panic!("not a state message: {:?}", other),
    }
}

/// Runs one tick and forwards its diff, if any, to the cache.
fn tick(game: &mut Game, cache: &BoardCache, actions: &[(usize, Action)], now: Instant, num: u16) {
    let diffs = game.update(actions, now);
    if !diffs.is_empty() {
        cache.apply(over_the_wire(Message::Update(BoardUpdate { num, diffs })));
    }
}

/// ENGINE TO CLIENT CACHE
mod state_stream_tests {
    use super::*;

    /// A client that saw the first snapshot stays in sync from diffs alone
    #[test]
    fn cache_follows_the_server_board() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut game = Game::new(15, 9, GameMode::Solo, FUSE, 3, &mut rng).unwrap();
        let cache = BoardCache::new();
        let start = Instant::now();

        cache.apply(over_the_wire(Message::Snapshot(BoardSnapshot {
            num: 0,
            board: game.board().clone(),
        })));

        let script: [&[(usize, Action)]; 3] = [
            &[(0, Action::Right), (1, Action::Left)],
            &[(0, Action::PlaceBomb)],
            &[(0, Action::Left)],
        ];
        for (num, actions) in script.iter().enumerate() {
            tick(&mut game, &cache, actions, start, num as u16);
            assert_eq!(cache.board().as_ref(), Some(game.board()));
        }
        assert_eq!(game.board().get(1, 0), Some(Tile::Bomb));

        tick(&mut game, &cache, &[], start + FUSE, 3);
        assert_eq!(cache.board().as_ref(), Some(game.board()));
        assert_eq!(game.board().get(1, 0), Some(Tile::Empty));
        // the bomber stepped back into range
        assert!(!game.players()[0].alive);
        assert_eq!(game.board().get(0, 0), Some(Tile::Empty));
        assert_eq!(cache.counts(), (1, 4));
    }

    /// The largest board still fits a single datagram
    #[test]
    fn largest_snapshot_fits_a_datagram() {
        let mut rng = StdRng::seed_from_u64(11);
        let game = Game::new(255, 255, GameMode::Team, FUSE, 3, &mut rng).unwrap();

        let frame = Message::Snapshot(BoardSnapshot {
            num: 9,
            board: game.board().clone(),
        })
        .encode()
        .unwrap();
        assert_eq!(frame.len(), MAX_STATE_DATAGRAM);

        let cache = BoardCache::new();
        match Message::decode(&frame) {
            Some(Message::Snapshot(snapshot)) => {
                assert!(cache.apply(StateUpdate::Snapshot(snapshot)))
            }
            other => panic!("expected a snapshot, got {:?}", other),
        }
        assert_eq!(cache.board().as_ref(), Some(game.board()));
    }
}

/// CLIENT ACTIONS TO ENGINE
mod action_tests {
    use super::*;

    fn datagram(sequencer: &mut InputSequencer, mode: GameMode, seat: u8, action: Action) -> Vec<u8> {
        GameAction {
            mode,
            id: seat,
            eq: if mode.is_team() { shared::team_of(seat as usize) } else { 0 },
            num: sequencer.next(),
            action,
        }
        .encode()
        .unwrap()
    }

    /// Actions decoded from datagrams apply in receipt order within a tick
    #[test]
    fn datagrams_apply_in_order() {
        let mut game = Game::with_board(Board::new(7, 7), GameMode::Team, FUSE);
        let mut sequencer = InputSequencer::new();

        let actions: Vec<(usize, Action)> = [
            datagram(&mut sequencer, GameMode::Team, 3, Action::Up),
            datagram(&mut sequencer, GameMode::Team, 3, Action::Up),
            datagram(&mut sequencer, GameMode::Team, 3, Action::Left),
            datagram(&mut sequencer, GameMode::Solo, 0, Action::Right),
        ]
        .iter()
        .filter_map(|bytes| accept_action(GameMode::Team, bytes))
        .collect();
        assert_eq!(actions.len(), 3);
        assert_eq!(sequencer.peek(), 4);

        let diffs = game.update(&actions, Instant::now());
        let seat = game.players()[3];
        assert_eq!((seat.x, seat.y), (5, 4));
        assert_eq!(
            diffs,
            vec![
                TileDiff {
                    x: 5,
                    y: 4,
                    tile: Tile::Player4
                },
                TileDiff {
                    x: 6,
                    y: 6,
                    tile: Tile::Empty
                },
            ]
        );
        // the solo datagram never reached seat 0
        assert_eq!(game.board().get(0, 0), Some(Tile::Player1));
    }
}

/// MATCH OUTCOMES
mod outcome_tests {
    use super::*;

    fn end_frame(mode: GameMode, outcome: Outcome) -> Option<Message> {
        let end = game_end_for(mode, outcome)?;
        Message::decode(&Message::End(end).encode().unwrap())
    }

    /// Seat 0 bombs the last rival and walks out of range
    #[test]
    fn last_seat_standing_wins() {
        let mut game = Game::with_board(Board::new(7, 7), GameMode::Solo, FUSE);
        game.kill(2);
        game.kill(3);
        let start = Instant::now();

        for _ in 0..4 {
            game.update(&[(0, Action::Right)], start);
        }
        game.update(&[(0, Action::PlaceBomb)], start);
        for _ in 0..3 {
            game.update(&[(0, Action::Left)], start);
        }
        assert_eq!(game.outcome(), None);

        game.update(&[], start + FUSE);
        assert!(game.players()[0].alive);
        assert!(!game.players()[1].alive);
        assert_eq!(game.outcome(), Some(Outcome::Winner(0)));

        match end_frame(GameMode::Solo, Outcome::Winner(0)) {
            Some(Message::End(end)) => assert_eq!(end.id, 0),
            other => panic!("expected a game end, got {:?}", other),
        }
    }

    /// A team wins once both rivals are gone, even if one teammate fell
    #[test]
    fn surviving_team_wins() {
        let mut game = Game::with_board(Board::new(7, 7), GameMode::Team, FUSE);
        game.kill(0);
        game.kill(1);
        assert_eq!(game.outcome(), None);

        game.kill(2);
        assert_eq!(game.outcome(), Some(Outcome::WinningTeam(0)));
        match end_frame(GameMode::Team, Outcome::WinningTeam(0)) {
            Some(Message::End(end)) => {
                assert_eq!(end.mode, GameMode::Team);
                assert_eq!(end.eq, 0);
            }
            other => panic!("expected a game end, got {:?}", other),
        }
    }

    /// Nobody left: the match ends without a game end message
    #[test]
    fn mutual_destruction_is_a_draw() {
        let mut game = Game::with_board(Board::new(7, 7), GameMode::Solo, FUSE);
        for seat in 0..4 {
            game.kill(seat);
        }
        assert_eq!(game.outcome(), Some(Outcome::Draw));
        assert!(end_frame(GameMode::Solo, Outcome::Draw).is_none());
    }
}
