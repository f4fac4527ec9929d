//! App: terminal init, main loop, input repeat and key handling.

use crate::game::GameState;
use crate::highscores;
use crate::input::{key_to_action, Action};
use crate::theme::Theme;
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding. 50 ms ≈ 20 moves/sec.
const REPEAT_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    GameOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    Exit,
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    /// Playfield size clamped to terminal so board + border fit on screen.
    effective_playfield_width: u16,
    effective_playfield_height: u16,
    state: GameState,
    screen: Screen,
    paused: bool,
    /// Last time gravity was advanced; elapsed wall time is fed to the engine.
    last_update: Instant,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    /// TachyonFX fade for the board on game over (created when the screen flips).
    game_over_effect: Option<Effect>,
    /// Last time we processed the game-over effect (for delta).
    game_over_effect_process_time: Option<Instant>,
    quit_selected: QuitOption,
    high_score: u32,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let width = args.width;
        let height = args.height;
        let state = GameState::new(width, height, &config)?;
        let now = Instant::now();
        Ok(Self {
            args,
            config,
            theme,
            effective_playfield_width: width,
            effective_playfield_height: height,
            state,
            screen: Screen::Playing,
            paused: false,
            last_update: now,
            repeat_state: None,
            last_repeat_fire: None,
            game_over_effect: None,
            game_over_effect_process_time: None,
            quit_selected: QuitOption::Resume,
            high_score: highscores::load_high_score(),
        })
    }

    fn reset_game(&mut self) -> Result<()> {
        self.state = GameState::new(
            self.effective_playfield_width,
            self.effective_playfield_height,
            &self.config,
        )?;
        self.screen = Screen::Playing;
        self.paused = false;
        self.last_update = Instant::now();
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.game_over_effect = None;
        self.game_over_effect_process_time = None;
        Ok(())
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::Quit => {}
            Action::Pause => {}
            Action::MoveLeft => self.state.move_left(),
            Action::MoveRight => self.state.move_right(),
            Action::Rotate => self.state.rotate(),
            Action::SoftDrop => self.state.soft_drop(),
            Action::HardDrop => {
                self.state.hard_drop();
                self.repeat_state = None;
            }
            Action::None => {}
        }
    }

    fn tick_repeat(&mut self) {
        let now = Instant::now();
        let (action, first) = match self.repeat_state {
            Some(s) => s,
            None => return,
        };
        if !matches!(action, Action::MoveLeft | Action::MoveRight | Action::SoftDrop) {
            return;
        }
        if first.elapsed() < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next = self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    /// Record a finished game's score, returning true if it is a new best.
    fn note_game_over(&mut self) -> bool {
        if self.state.score > self.high_score {
            self.high_score = self.state.score;
            let _ = highscores::save_high_score(self.high_score);
            return true;
        }
        false
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, size, EnterAlternateScreen, LeaveAlternateScreen},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Attempt to enable enhanced keyboard for Release events
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        // Size playfield to fit terminal; respect --width/--height when they fit
        let (term_cols, term_rows) = size()?;
        let (fit_w, fit_h) = crate::ui::playfield_size_for_terminal(term_cols, term_rows);
        self.effective_playfield_width = self.args.width.min(fit_w).max(1);
        self.effective_playfield_height = self.args.height.min(fit_h).max(1);
        let need_resize = self.state.playfield.width != self.effective_playfield_width as usize
            || self.state.playfield.height != self.effective_playfield_height as usize;
        if need_resize {
            self.state = GameState::new(
                self.effective_playfield_width,
                self.effective_playfield_height,
                &self.config,
            )?;
        }
        self.last_update = Instant::now();

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let dt = now.duration_since(self.last_update);
            self.last_update = now;

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    &self.theme,
                    self.paused,
                    self.high_score,
                    if self.screen == Screen::QuitMenu {
                        Some(self.quit_selected)
                    } else {
                        None
                    },
                    &mut self.game_over_effect,
                    &mut self.game_over_effect_process_time,
                    now,
                    self.args.no_animation,
                )
            })?;

            // Limit event polling so we redraw at roughly 60 FPS (16 ms)
            let frame_duration = Duration::from_millis(16);
            let timeout = frame_duration.saturating_sub(now.elapsed());

            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        let action = key_to_action(key);

                        // Ignore OS repeats and only process first Press.
                        if key.kind != KeyEventKind::Press {
                            if key.kind == KeyEventKind::Release
                                && self.repeat_state.map(|(a, _)| a) == Some(action)
                            {
                                self.repeat_state = None;
                                self.last_repeat_fire = None;
                            }
                            continue;
                        }
                        // If we are already repeating this action, ignore subsequent OS Press events
                        if self.repeat_state.map(|(a, _)| a) == Some(action) {
                            continue;
                        }

                        match self.screen {
                            Screen::Playing => {
                                if self.paused {
                                    if action == Action::Pause {
                                        self.paused = false;
                                        self.last_update = Instant::now();
                                    } else if action == Action::Quit {
                                        self.screen = Screen::QuitMenu;
                                        self.quit_selected = QuitOption::Resume;
                                    }
                                } else if action == Action::Pause {
                                    self.paused = true;
                                    self.repeat_state = None;
                                } else if action == Action::Quit {
                                    self.screen = Screen::QuitMenu;
                                    self.quit_selected = QuitOption::Resume;
                                    self.repeat_state = None;
                                } else {
                                    self.apply_action(action);
                                    let repeatable = matches!(
                                        action,
                                        Action::MoveLeft | Action::MoveRight | Action::SoftDrop
                                    );
                                    if repeatable {
                                        self.repeat_state = Some((action, Instant::now()));
                                        self.last_repeat_fire = None;
                                    }
                                }
                            }
                            Screen::QuitMenu => match action {
                                Action::SoftDrop | Action::MoveRight | Action::MoveLeft
                                | Action::Rotate => {
                                    self.quit_selected = match self.quit_selected {
                                        QuitOption::Resume => QuitOption::Exit,
                                        QuitOption::Exit => QuitOption::Resume,
                                    };
                                }
                                Action::HardDrop => match self.quit_selected {
                                    QuitOption::Resume => {
                                        self.screen = Screen::Playing;
                                        self.last_update = Instant::now();
                                    }
                                    QuitOption::Exit => return Ok(()),
                                },
                                Action::Pause | Action::Quit => {
                                    self.screen = Screen::Playing;
                                    self.last_update = Instant::now();
                                }
                                _ => {}
                            },
                            Screen::GameOver => {
                                if action == Action::Quit {
                                    return Ok(());
                                }
                                if key.code == KeyCode::Char('r') || key.code == KeyCode::Char('R')
                                {
                                    self.reset_game()?;
                                }
                            }
                        }
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                self.tick_repeat();
                self.state.advance_time(dt);
                if self.state.game_over {
                    self.note_game_over();
                    self.screen = Screen::GameOver;
                    self.repeat_state = None;
                }
            }
        }
    }
}
