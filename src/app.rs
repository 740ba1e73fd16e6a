//! App: terminal init, main loop, tick and key handling.
//!
//! Each frame runs in a fixed order: queued input, the auto-drop timer, the drop
//! slides, then drawing. That way a piece that lands this frame is already part of the
//! board when it is drawn.

use crate::game::{GameState, StepOutcome};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::{Args, GameConfig, GameMode};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

pub struct App {
    args: Args,
    state: GameState,
    paused: bool,
    /// Last auto-drop or player drop; the auto-drop timer restarts from here.
    last_drop: Instant,
    drop_interval: Duration,
    frame_duration: Duration,
    /// Terminal area of the last draw, for mapping mouse clicks to cells.
    last_area: Rect,
    /// Cells being flashed after a clear.
    flash_cells: Vec<(usize, usize)>,
    /// TachyonFX flash effect (created on first draw after a clear).
    flash_effect: Option<Effect>,
    /// Last time we processed the flash effect (for delta).
    flash_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: &GameConfig, theme: Theme) -> Self {
        let state = GameState::new(theme, config);
        let frame_rate = if args.frame_rate > 0.0 { args.frame_rate } else { 60.0 };
        Self {
            drop_interval: Duration::from_millis(args.drop_interval_ms.max(1)),
            frame_duration: Duration::from_secs_f64(1.0 / frame_rate),
            args,
            state,
            paused: false,
            last_drop: Instant::now(),
            last_area: Rect::default(),
            flash_cells: Vec::new(),
            flash_effect: None,
            flash_effect_process_time: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        tracing::info!(score = self.state.score, cleared = self.state.cells_cleared, "exit");

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let mut frame_start = Instant::now();
        loop {
            let timeout = self.frame_duration.saturating_sub(frame_start.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if self.handle_event(&event::read()?) {
                        return Ok(());
                    }
                }
            }
            if frame_start.elapsed() < self.frame_duration {
                continue;
            }
            let now = Instant::now();
            frame_start = now;

            if !self.paused {
                self.tick_drop(now);
                self.state.tick();
            }

            let cleared = self.state.take_flash();
            if !cleared.is_empty() && !self.args.no_animation {
                self.flash_cells = cleared;
                self.flash_effect = None;
                self.flash_effect_process_time = None;
            }

            let mut area = self.last_area;
            terminal.draw(|f| {
                area = f.area();
                crate::ui::draw(
                    f,
                    &self.state,
                    self.paused,
                    &self.flash_cells,
                    &mut self.flash_effect,
                    &mut self.flash_effect_process_time,
                    now,
                );
            })?;
            self.last_area = area;

            if self.flash_effect.as_ref().is_some_and(Effect::done) {
                self.flash_cells.clear();
                self.flash_effect = None;
                self.flash_effect_process_time = None;
            }
        }
    }

    /// Auto-drop one row when the interval has passed.
    fn tick_drop(&mut self, now: Instant) {
        if self.state.mode != GameMode::Falling
            || now.duration_since(self.last_drop) < self.drop_interval
        {
            return;
        }
        self.last_drop = now;
        if self.state.step_down() == StepOutcome::GameOver {
            tracing::info!(score = self.state.score, "game over");
        }
    }

    /// Returns true when the player asked to quit.
    fn handle_event(&mut self, event: &Event) -> bool {
        match event {
            // Press and OS key repeat both act; releases do not.
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                self.handle_action(key_to_action(*key))
            }
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                if !self.paused {
                    if let Some((x, y)) = crate::ui::cell_at(self.last_area, mouse.column, mouse.row) {
                        self.state.select(x, y);
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn handle_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return true,
            Action::Pause => {
                if !self.state.is_game_over() {
                    self.paused = !self.paused;
                }
            }
            Action::Restart => {
                if self.state.is_game_over() || self.state.mode == GameMode::Classic {
                    self.state.restart();
                    self.paused = false;
                    self.last_drop = Instant::now();
                    self.flash_cells.clear();
                    self.flash_effect = None;
                    self.flash_effect_process_time = None;
                }
            }
            Action::None => {}
            _ if self.paused || self.state.is_game_over() => {}
            _ => match self.state.mode {
                GameMode::Falling => self.apply_falling(action),
                GameMode::Classic => self.apply_classic(action),
            },
        }
        false
    }

    fn apply_falling(&mut self, action: Action) {
        match action {
            Action::MoveLeft => {
                self.state.move_left();
            }
            Action::MoveRight => {
                self.state.move_right();
            }
            Action::RotateCw => {
                self.state.rotate_cw();
            }
            Action::RotateCcw => {
                self.state.rotate_ccw();
            }
            Action::SoftDrop => {
                if self.state.step_down() != StepOutcome::Ignored {
                    self.last_drop = Instant::now();
                }
            }
            Action::HardDrop => {
                if self.state.hard_drop() != StepOutcome::Ignored {
                    self.last_drop = Instant::now();
                }
            }
            _ => {}
        }
    }

    fn apply_classic(&mut self, action: Action) {
        match action {
            Action::MoveLeft => self.state.move_cursor(-1, 0),
            Action::MoveRight => self.state.move_cursor(1, 0),
            Action::RotateCw => self.state.move_cursor(0, -1),
            Action::SoftDrop => self.state.move_cursor(0, 1),
            Action::HardDrop => {
                self.state.select_at_cursor();
            }
            _ => {}
        }
    }
}
