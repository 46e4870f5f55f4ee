//! App: terminal init, main loop, tick and key handling.

use crate::config::{Overrides, Settings};
use crate::game::{GameState, Submission};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tachyonfx::{Duration as TfxDuration, Effect};

/// Longest step fed to the simulation; longer gaps (suspend, debugger) are clamped.
const MAX_FRAME_MS: f32 = 100.0;

/// Target frame time, ~60 FPS.
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    Paused,
    GameOver,
}

pub struct App {
    theme: Theme,
    state: GameState,
    screen: Screen,
    last_tick: Instant,
    /// TachyonFX board flash for penalty rows and chain explosions.
    flash: Option<Effect>,
    /// Override file re-read on `Reload`.
    config_path: Option<PathBuf>,
}

impl App {
    pub fn new(settings: Settings, theme: Theme, seed: u64, config_path: Option<PathBuf>) -> Self {
        Self {
            theme,
            state: GameState::new(settings, seed),
            screen: Screen::Playing,
            last_tick: Instant::now(),
            flash: None,
            config_path,
        }
    }

    /// Returns false when the player quits.
    fn apply_action(&mut self, action: Action) -> bool {
        match (self.screen, action) {
            (_, Action::Quit) => return false,
            (Screen::Playing, Action::Digit(d)) => self.state.push_digit(d),
            (Screen::Playing, Action::Erase) => self.state.erase(),
            (Screen::Playing, Action::Submit) => self.submit(),
            (Screen::Playing, Action::Pause) => self.screen = Screen::Paused,
            (Screen::Playing | Screen::Paused, Action::Reload) => self.reload_config(),
            (Screen::Paused, Action::Pause | Action::Submit) => {
                self.screen = Screen::Playing;
                self.last_tick = Instant::now();
            }
            (Screen::GameOver, Action::Restart) => {
                self.state.restart();
                self.flash = None;
                self.screen = Screen::Playing;
                self.last_tick = Instant::now();
            }
            (Screen::GameOver, Action::CycleDifficulty) => self.state.cycle_difficulty(),
            _ => {}
        }
        true
    }

    /// A bad file is logged and ignored; the game keeps its current settings.
    fn reload_config(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        let result = Overrides::load(path).and_then(|o| self.state.apply_overrides(&o));
        if let Err(e) = result {
            log::warn!("config reload from {} failed: {}", path.display(), e);
        }
    }

    fn submit(&mut self) {
        match self.state.submit() {
            Submission::Correct { blocks, points } => {
                log::debug!("+{} for {} block(s)", points, blocks.len());
                if blocks.iter().any(|h| h.kind.is_special()) {
                    self.flash = Some(crate::ui::board_flash(self.theme.accent));
                }
            }
            Submission::Wrong { penalty } if penalty > 0 => {
                self.flash = Some(crate::ui::board_flash(self.theme.alert));
            }
            Submission::GameOver => self.screen = Screen::GameOver,
            _ => {}
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let us ignore key-up on terminals that report them.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        self.last_tick = Instant::now();
        loop {
            let now = Instant::now();
            let elapsed = now.saturating_duration_since(self.last_tick);
            self.last_tick = now;
            let delta_ms = (elapsed.as_secs_f32() * 1000.0).min(MAX_FRAME_MS);

            if self.screen == Screen::Playing {
                self.state.tick(delta_ms)?;
                if self.state.game_over {
                    self.screen = Screen::GameOver;
                }
            }

            let fx_delta = TfxDuration::from_millis(delta_ms as u32);
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    &self.theme,
                    &mut self.flash,
                    fx_delta,
                );
            })?;

            let timeout = FRAME.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if !self.apply_action(key_to_action(key)) {
                        return Ok(());
                    }
                }
            }
        }
    }
}
