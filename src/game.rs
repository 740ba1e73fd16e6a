//! Game state: board, falling piece, next preview, clears, compaction animation and
//! session phase.

use crate::anim::{Animations, PROGRESS_PER_FRAME};
use crate::board::{Board, Cell, GRID_SIZE};
use crate::piece::{NextPiece, Piece};
use crate::theme::Theme;
use crate::{GameConfig, GameMode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;

/// Score per cleared cell.
pub const POINTS_PER_CELL: u32 = 10;

/// Session phase. Spawning and landing happen inside `step_down`/`tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A piece is falling and accepts input.
    Falling,
    /// Compaction slides are playing; the next piece spawns when they finish.
    Clearing,
    /// Terminal: no more board changes.
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Piece moved down one row.
    Moved,
    /// Piece was written into the board; `cleared` cells were removed.
    Landed { cleared: usize },
    GameOver,
    /// No falling piece (clearing, game over, or classic mode).
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned,
    Blocked,
}

/// Game state: board, current piece, next piece, score, animations.
#[derive(Debug)]
pub struct GameState {
    pub theme: Theme,
    pub mode: GameMode,
    pub board: Board,
    pub piece: Option<Piece>,
    pub next: Option<NextPiece>,
    pub animations: Animations,
    pub score: u32,
    pub cells_cleared: u32,
    pub phase: Phase,
    /// Classic mode selection cursor (x, y).
    pub cursor: (usize, usize),
    /// Seed of the current session, shown in the sidebar.
    pub seed: u64,
    /// Seed from the command line; restarts replay it instead of drawing a new one.
    fixed_seed: Option<u64>,
    cascade: bool,
    animate: bool,
    rng: StdRng,
    /// Cells cleared since the renderer last asked (for the flash effect).
    flash: Vec<(usize, usize)>,
}

impl GameState {
    pub fn new(theme: Theme, config: &GameConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut state = Self {
            theme,
            mode: config.mode,
            board: Board::new(),
            piece: None,
            next: None,
            animations: Animations::new(),
            score: 0,
            cells_cleared: 0,
            phase: Phase::Falling,
            cursor: (GRID_SIZE / 2, GRID_SIZE / 2),
            seed,
            fixed_seed: config.seed,
            cascade: config.cascade,
            animate: config.animate,
            rng: StdRng::seed_from_u64(seed),
            flash: Vec::new(),
        };
        tracing::info!(mode = ?state.mode, seed, cascade = state.cascade, "new session");
        state.start();
        state
    }

    fn start(&mut self) {
        match self.mode {
            GameMode::Falling => {
                self.board = Board::new();
                self.spawn();
            }
            GameMode::Classic => {
                self.board = Board::random(&mut self.rng);
                self.phase = Phase::Falling;
            }
        }
    }

    /// Fresh session. A fixed seed replays the same game; otherwise a new seed is drawn.
    pub fn restart(&mut self) {
        self.seed = self.fixed_seed.unwrap_or_else(rand::random);
        self.rng = StdRng::seed_from_u64(self.seed);
        self.piece = None;
        self.next = None;
        self.animations.clear();
        self.flash.clear();
        self.score = 0;
        self.cells_cleared = 0;
        self.cursor = (GRID_SIZE / 2, GRID_SIZE / 2);
        self.phase = Phase::Falling;
        tracing::info!(mode = ?self.mode, seed = self.seed, "restart");
        self.start();
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    /// Promote the preview to the falling piece and roll a new preview.
    /// Blocked when the spawn position overlaps the stack: that ends the game.
    pub fn spawn(&mut self) -> SpawnOutcome {
        if self.phase == Phase::GameOver {
            return SpawnOutcome::Blocked;
        }
        let next = self
            .next
            .take()
            .unwrap_or_else(|| NextPiece::random(&mut self.rng));
        self.next = Some(NextPiece::random(&mut self.rng));
        let piece = Piece::spawn(next);
        if !self.can_place(&piece) {
            tracing::info!(score = self.score, "spawn blocked, game over");
            self.piece = None;
            self.phase = Phase::GameOver;
            return SpawnOutcome::Blocked;
        }
        tracing::debug!(kind = ?piece.kind, "spawn");
        self.piece = Some(piece);
        self.phase = Phase::Falling;
        SpawnOutcome::Spawned
    }

    #[inline]
    pub fn can_place(&self, piece: &Piece) -> bool {
        self.board.can_place(piece)
    }

    /// Replace the falling piece with `f(piece)` if that fits. False when rejected.
    fn try_update(&mut self, f: impl FnOnce(&Piece) -> Piece) -> bool {
        if self.phase != Phase::Falling {
            return false;
        }
        let Some(piece) = self.piece.as_ref() else {
            return false;
        };
        let candidate = f(piece);
        if !self.can_place(&candidate) {
            return false;
        }
        self.piece = Some(candidate);
        true
    }

    pub fn move_piece(&mut self, dx: i32) -> bool {
        self.try_update(|p| p.shifted(dx, 0))
    }

    pub fn move_left(&mut self) -> bool {
        self.move_piece(-1)
    }

    pub fn move_right(&mut self) -> bool {
        self.move_piece(1)
    }

    pub fn rotate_cw(&mut self) -> bool {
        self.try_update(|p| p.rotated(1))
    }

    pub fn rotate_ccw(&mut self) -> bool {
        self.try_update(|p| p.rotated(3))
    }

    /// Move the piece down one row, or land it when it cannot move.
    pub fn step_down(&mut self) -> StepOutcome {
        if self.phase != Phase::Falling {
            return StepOutcome::Ignored;
        }
        let Some(piece) = self.piece.take() else {
            return StepOutcome::Ignored;
        };
        let lower = piece.shifted(0, 1);
        if self.can_place(&lower) {
            self.piece = Some(lower);
            return StepOutcome::Moved;
        }
        self.land(&piece)
    }

    /// Step down until the piece lands.
    pub fn hard_drop(&mut self) -> StepOutcome {
        loop {
            match self.step_down() {
                StepOutcome::Moved => {}
                outcome => return outcome,
            }
        }
    }

    fn land(&mut self, piece: &Piece) -> StepOutcome {
        if piece.is_above_board() {
            tracing::info!(score = self.score, "landed above the board, game over");
            self.phase = Phase::GameOver;
            return StepOutcome::GameOver;
        }
        for (x, y, color) in piece.blocks() {
            if y >= 0 {
                self.board.set(x, y, Cell::Block(color));
            }
        }
        let cleared = self.resolve_matches();
        tracing::debug!(x = piece.x, y = piece.y, cleared, "landed");
        if !self.animations.is_empty() {
            self.phase = Phase::Clearing;
        } else if self.spawn() == SpawnOutcome::Blocked {
            return StepOutcome::GameOver;
        }
        StepOutcome::Landed { cleared }
    }

    /// Clear every run on the board. With cascade on, repeat until none remain.
    /// Returns the number of cells cleared.
    pub fn resolve_matches(&mut self) -> usize {
        let mut total = 0;
        loop {
            let matches = self.board.find_matches();
            if matches.is_empty() {
                break;
            }
            total += self.clear(&matches);
            if !self.cascade {
                break;
            }
        }
        total
    }

    /// Score, empty and compact. Falling mode leaves vacancies for future pieces;
    /// classic mode refills them with random blocks.
    pub fn clear(&mut self, matches: &BTreeSet<(usize, usize)>) -> usize {
        if matches.is_empty() {
            return 0;
        }
        let n = matches.len();
        self.score += POINTS_PER_CELL * n as u32;
        self.cells_cleared += n as u32;
        self.board.remove(matches);
        self.animations.cancel(matches);
        let falls = match self.mode {
            GameMode::Falling => self.board.collapse(),
            GameMode::Classic => self.board.collapse_and_refill(&mut self.rng),
        };
        debug_assert!(self.board.is_settled());
        if self.animate {
            self.animations.start(falls);
        }
        self.flash.extend(matches.iter().copied());
        tracing::info!(cells = n, score = self.score, slides = self.animations.len(), "cleared");
        n
    }

    /// Once per frame: advance slides; spawn when a clear's slides are done.
    pub fn tick(&mut self) {
        self.animations.tick(PROGRESS_PER_FRAME);
        if self.phase == Phase::Clearing && self.animations.is_empty() {
            self.spawn();
        }
    }

    /// Classic mode: clear the group through (x, y). Returns cells cleared.
    pub fn select(&mut self, x: usize, y: usize) -> usize {
        if self.mode != GameMode::Classic || x >= GRID_SIZE || y >= GRID_SIZE {
            return 0;
        }
        self.cursor = (x, y);
        let group = self.board.matches_through(x, y);
        let mut cleared = self.clear(&group);
        if cleared > 0 && self.cascade {
            cleared += self.resolve_matches();
        }
        cleared
    }

    pub fn select_at_cursor(&mut self) -> usize {
        let (x, y) = self.cursor;
        self.select(x, y)
    }

    pub fn move_cursor(&mut self, dx: i32, dy: i32) {
        let clamp = |v: usize, d: i32| (v as i32 + d).clamp(0, GRID_SIZE as i32 - 1) as usize;
        self.cursor = (clamp(self.cursor.0, dx), clamp(self.cursor.1, dy));
    }

    /// Cells cleared since the last call.
    pub fn take_flash(&mut self) -> Vec<(usize, usize)> {
        std::mem::take(&mut self.flash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BlockColor::{Cinnamoroll, HelloKitty, Keroppi, MyMelody};
    use crate::board::tests::board_from;
    use crate::piece::ShapeKind;

    fn config(mode: GameMode) -> GameConfig {
        GameConfig {
            mode,
            seed: Some(42),
            cascade: false,
            animate: true,
        }
    }

    fn falling() -> GameState {
        GameState::new(Theme::default(), &config(GameMode::Falling))
    }

    /// Line whose colours never form a run on their own.
    fn line() -> NextPiece {
        NextPiece::new(ShapeKind::Line, [HelloKitty, MyMelody, HelloKitty, MyMelody])
    }

    fn with_piece(state: &mut GameState, next: NextPiece) {
        state.piece = None;
        state.next = Some(next);
        assert_eq!(state.spawn(), SpawnOutcome::Spawned);
    }

    #[test]
    fn test_new_session_spawns_piece_and_preview() {
        let state = falling();
        assert_eq!(state.phase, Phase::Falling);
        assert!(state.piece.is_some());
        assert!(state.next.is_some());
        assert!(state.board.is_empty());
    }

    #[test]
    fn test_same_seed_same_pieces() {
        let a = falling();
        let b = falling();
        assert_eq!(a.piece, b.piece);
        assert_eq!(a.next, b.next);
    }

    #[test]
    fn test_line_falls_seven_rows_then_lands_in_column_three() {
        let mut state = falling();
        with_piece(&mut state, line());
        assert_eq!(state.piece.as_ref().map(|p| (p.x, p.y)), Some((3, -3)));
        for _ in 0..7 {
            assert_eq!(state.step_down(), StepOutcome::Moved);
        }
        assert_eq!(state.piece.as_ref().map(|p| p.y), Some(4));
        assert_eq!(state.step_down(), StepOutcome::Landed { cleared: 0 });
        assert_eq!(state.board.get(3, 4), Some(Cell::Block(HelloKitty)));
        assert_eq!(state.board.get(3, 5), Some(Cell::Block(MyMelody)));
        assert_eq!(state.board.get(3, 6), Some(Cell::Block(HelloKitty)));
        assert_eq!(state.board.get(3, 7), Some(Cell::Block(MyMelody)));
        assert!((0..4).all(|y| !state.board.is_occupied(3, y)));
        // Next piece is already falling.
        assert_eq!(state.phase, Phase::Falling);
        assert!(state.piece.is_some());
    }

    #[test]
    fn test_hard_drop_lands_at_floor() {
        let mut state = falling();
        with_piece(&mut state, line());
        assert_eq!(state.hard_drop(), StepOutcome::Landed { cleared: 0 });
        assert!((4..8).all(|y| state.board.is_occupied(3, y)));
    }

    #[test]
    fn test_move_rejected_at_wall() {
        let mut state = falling();
        with_piece(&mut state, line());
        for _ in 0..3 {
            assert!(state.move_left());
        }
        assert!(!state.move_left());
        assert_eq!(state.piece.as_ref().map(|p| p.x), Some(0));
        assert!(state.move_right());
    }

    #[test]
    fn test_move_rejected_by_stack() {
        let mut state = falling();
        with_piece(&mut state, line());
        state.board.set(4, 0, Cell::Block(Keroppi));
        assert!(!state.move_right());
        assert_eq!(state.piece.as_ref().map(|p| p.x), Some(3));
    }

    #[test]
    fn test_four_rotations_return_to_start() {
        let mut state = falling();
        with_piece(&mut state, line());
        for _ in 0..4 {
            state.step_down();
        }
        let before = state.piece.clone();
        for _ in 0..4 {
            assert!(state.rotate_cw());
        }
        assert_eq!(state.piece, before);
    }

    #[test]
    fn test_blocked_rotation_leaves_piece_unchanged() {
        let mut state = falling();
        with_piece(&mut state, line());
        for _ in 0..3 {
            state.move_left();
        }
        state.step_down();
        let before = state.piece.clone();
        // Clockwise turn swings the line left of column 0.
        assert!(!state.rotate_cw());
        assert_eq!(state.piece, before);
        assert!(state.rotate_ccw());
        assert_eq!(state.piece.as_ref().map(|p| p.rotation), Some(3));
    }

    #[test]
    fn test_can_place_does_not_mutate() {
        let mut state = falling();
        with_piece(&mut state, line());
        state.board.set(0, 7, Cell::Block(Keroppi));
        let board = state.board.clone();
        let piece = state.piece.clone();
        let probe = piece.clone().map(|p| p.shifted(0, 9));
        for _ in 0..10 {
            if let Some(p) = piece.as_ref() {
                assert!(state.can_place(p));
            }
            if let Some(p) = probe.as_ref() {
                assert!(!state.can_place(p));
            }
        }
        assert_eq!(state.board, board);
        assert_eq!(state.piece, piece);
    }

    #[test]
    fn test_blocked_spawn_is_game_over_without_board_change() {
        let mut state = falling();
        state.board.set(3, 0, Cell::Block(Keroppi));
        let board = state.board.clone();
        state.piece = None;
        state.next = Some(line());
        assert_eq!(state.spawn(), SpawnOutcome::Blocked);
        assert!(state.is_game_over());
        assert_eq!(state.board, board);
        assert_eq!(state.step_down(), StepOutcome::Ignored);
        assert!(!state.move_left());
        assert_eq!(state.spawn(), SpawnOutcome::Blocked);
    }

    #[test]
    fn test_landing_above_board_is_game_over() {
        let mut state = falling();
        state.board.set(3, 0, Cell::Block(Keroppi));
        state.board.set(4, 0, Cell::Block(MyMelody));
        let board = state.board.clone();
        let square = NextPiece::new(ShapeKind::Square, [HelloKitty; 4]);
        state.piece = Some(Piece::new(square, 3, -2));
        assert_eq!(state.step_down(), StepOutcome::GameOver);
        assert!(state.is_game_over());
        assert_eq!(state.board, board);
    }

    #[test]
    fn test_partial_landing_writes_cells_on_board() {
        let mut state = falling();
        state.board.set(3, 2, Cell::Block(Keroppi));
        state.piece = Some(Piece::new(line(), 3, -2));
        state.next = Some(line());
        // Cells land on rows 0 and 1; the next spawn then overlaps row 0.
        assert_eq!(state.step_down(), StepOutcome::GameOver);
        assert_eq!(state.board.get(3, 0), Some(Cell::Block(HelloKitty)));
        assert_eq!(state.board.get(3, 1), Some(Cell::Block(MyMelody)));
    }

    #[test]
    fn test_clear_triple_scores_thirty() {
        let mut state = falling();
        state.board = board_from(&[
            ".....KKK",
            "........",
            "........",
            "........",
            "........",
            "........",
            "........",
            ".HMKCHMC",
        ]);
        let matches = state.board.find_matches();
        assert_eq!(matches, BTreeSet::from([(5, 0), (6, 0), (7, 0)]));
        assert_eq!(state.clear(&matches), 3);
        assert_eq!(state.score, 30);
        for x in 5..8 {
            assert!((0..7).all(|y| !state.board.is_occupied(x, y)));
            assert!(state.board.is_occupied(x, 7));
        }
        assert!(!state.board.is_occupied(0, 7));
        assert!(state.board.is_settled());
        assert_eq!(state.take_flash().len(), 3);
        assert!(state.take_flash().is_empty());
    }

    #[test]
    fn test_clear_compacts_and_animates() {
        let mut state = falling();
        state.board = board_from(&[
            "........",
            "........",
            "........",
            "..M.....",
            "..C.....",
            "..HHH...",
            "..K.....",
            "..M.....",
        ]);
        assert_eq!(state.resolve_matches(), 3);
        assert!(state.board.is_settled());
        assert_eq!(state.board.get(2, 5), Some(Cell::Block(Cinnamoroll)));
        assert_eq!(state.board.get(2, 4), Some(Cell::Block(MyMelody)));
        assert_eq!(state.animations.len(), 2);
        assert!(state.animations.targets(2, 5));
        assert!(state.animations.iter().all(|a| a.to_row as i32 > a.from_row));
    }

    #[test]
    fn test_landing_clear_waits_for_slides_before_spawning() {
        let mut state = falling();
        state.board.set(2, 7, Cell::Block(HelloKitty));
        state.board.set(4, 7, Cell::Block(HelloKitty));
        let piece = NextPiece::new(ShapeKind::Line, [MyMelody, Keroppi, Cinnamoroll, HelloKitty]);
        with_piece(&mut state, piece);
        assert_eq!(state.hard_drop(), StepOutcome::Landed { cleared: 3 });
        assert_eq!(state.score, 30);
        assert_eq!(state.phase, Phase::Clearing);
        assert!(state.piece.is_none());
        assert!(!state.move_left());
        assert_eq!(state.step_down(), StepOutcome::Ignored);
        assert_eq!(state.board.get(3, 7), Some(Cell::Block(Cinnamoroll)));
        assert_eq!(state.board.get(3, 6), Some(Cell::Block(Keroppi)));
        assert_eq!(state.board.get(3, 5), Some(Cell::Block(MyMelody)));
        assert!(!state.board.is_occupied(2, 7));
        for _ in 0..25 {
            state.tick();
        }
        assert!(state.animations.is_empty());
        assert_eq!(state.phase, Phase::Falling);
        assert!(state.piece.is_some());
    }

    #[test]
    fn test_without_animation_spawns_immediately() {
        let mut cfg = config(GameMode::Falling);
        cfg.animate = false;
        let mut state = GameState::new(Theme::default(), &cfg);
        state.board.set(2, 7, Cell::Block(HelloKitty));
        state.board.set(4, 7, Cell::Block(HelloKitty));
        with_piece(
            &mut state,
            NextPiece::new(ShapeKind::Line, [MyMelody, Keroppi, Cinnamoroll, HelloKitty]),
        );
        assert_eq!(state.hard_drop(), StepOutcome::Landed { cleared: 3 });
        assert_eq!(state.phase, Phase::Falling);
        assert!(state.animations.is_empty());
    }

    const CASCADE_BOARD: [&str; 8] = [
        "........",
        "........",
        "........",
        "........",
        "K.......",
        "HHH.....",
        "K.......",
        "K.......",
    ];

    #[test]
    fn test_no_cascade_by_default() {
        let mut state = falling();
        state.board = board_from(&CASCADE_BOARD);
        assert_eq!(state.resolve_matches(), 3);
        assert_eq!(state.score, 30);
        assert_eq!(state.board.find_matches().len(), 3);
    }

    #[test]
    fn test_cascade_clears_runs_formed_by_gravity() {
        let mut cfg = config(GameMode::Falling);
        cfg.cascade = true;
        let mut state = GameState::new(Theme::default(), &cfg);
        state.board = board_from(&CASCADE_BOARD);
        assert_eq!(state.resolve_matches(), 6);
        assert_eq!(state.score, 60);
        assert!(state.board.is_empty());
    }

    #[test]
    fn test_classic_select_clears_and_refills() {
        let mut state = GameState::new(Theme::default(), &config(GameMode::Classic));
        assert!(state.piece.is_none());
        assert!((0..8).all(|y| (0..8).all(|x| state.board.is_occupied(x, y))));
        state.board = board_from(&[
            "........", "........", "........", "........", "........", "........", "........",
            "HHH.....",
        ]);
        assert_eq!(state.select(0, 6), 0);
        assert_eq!(state.select(1, 7), 3);
        assert_eq!(state.score, 30);
        assert_eq!(state.cursor, (1, 7));
        assert!((0..8).all(|y| (0..8).all(|x| state.board.is_occupied(x, y))));
        assert!(state.animations.iter().any(|a| a.from_row < 0));
    }

    #[test]
    fn test_classic_ignores_falling_controls() {
        let mut state = GameState::new(Theme::default(), &config(GameMode::Classic));
        assert_eq!(state.step_down(), StepOutcome::Ignored);
        assert!(!state.rotate_cw());
        state.move_cursor(-10, 10);
        assert_eq!(state.cursor, (0, GRID_SIZE - 1));
    }

    #[test]
    fn test_select_ignored_in_falling_mode() {
        let mut state = falling();
        state.board = board_from(&["HHH....."]);
        assert_eq!(state.select(0, 0), 0);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_restart_after_game_over() {
        let mut state = falling();
        state.board.set(3, 0, Cell::Block(Keroppi));
        state.score = 120;
        state.next = Some(line());
        state.spawn();
        assert!(state.is_game_over());
        state.restart();
        assert_eq!(state.phase, Phase::Falling);
        assert_eq!(state.score, 0);
        assert!(state.board.is_empty());
        assert!(state.piece.is_some());
    }

    #[test]
    fn test_restart_replays_fixed_seed() {
        let mut state = falling();
        let (piece, next) = (state.piece.clone(), state.next);
        state.hard_drop();
        state.hard_drop();
        state.restart();
        assert_eq!(state.seed, 42);
        assert_eq!(state.piece, piece);
        assert_eq!(state.next, next);
    }

    #[test]
    fn test_restart_without_seed_shows_a_reproducible_seed() {
        let mut cfg = config(GameMode::Classic);
        cfg.seed = None;
        let mut state = GameState::new(Theme::default(), &cfg);
        state.restart();
        cfg.seed = Some(state.seed);
        let replay = GameState::new(Theme::default(), &cfg);
        assert_eq!(state.board, replay.board);
    }

    #[test]
    fn test_second_clear_cancels_slides_into_cleared_cells() {
        let mut state = GameState::new(Theme::default(), &config(GameMode::Classic));
        state.board = board_from(&[
            "........", "........", "........", "........", "........", "HMC.....", "KKK.....",
            "HHH.....",
        ]);
        assert!(state.select(0, 7) >= 3);
        assert!(state.animations.iter().any(|a| a.to_row == 7 && a.color == Keroppi));
        assert!(state.select(0, 7) >= 3);
        for x in 0..3 {
            let into_floor: Vec<_> = state
                .animations
                .iter()
                .filter(|a| a.column == x && a.to_row == 7)
                .collect();
            assert_eq!(into_floor.len(), 1);
            assert_eq!(state.board.get(x as i32, 7), Some(Cell::Block(into_floor[0].color)));
        }
    }
}
