use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::Context;
use chip8_vm::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Framebuffer};
use chip8_vm::state::Settings;
use chip8_vm::{Chip8, Chip8Error, KeyWait};
use crossterm::event;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use crate::audio::Beep;
use crate::input::{self, InputEvent};

type Tui = Terminal<CrosstermBackend<std::io::Stdout>>;

const KEY_MAPPING: &str = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";

pub struct Emulator {
    chip8: Chip8,
    beeper: Option<Beep>,
    frame_rate: u64,
    cycles_per_tick: u64,
    rom_name: String,
}

impl Emulator {
    /// Builds the interpreter and loads the ROM, so load failures surface
    /// before the terminal is touched.
    pub fn new(settings: &Settings, rom: PathBuf) -> anyhow::Result<Self> {
        let mut chip8 = Chip8::new(settings);
        chip8
            .load_rom_file(&rom)
            .with_context(|| format!("failed to load ROM {}", rom.display()))?;

        let rom_name = rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string());

        Ok(Emulator {
            chip8,
            beeper: None,
            frame_rate: settings.frame_rate.max(1),
            cycles_per_tick: settings.cycles_per_tick(),
            rom_name,
        })
    }

    pub fn with_beeper(mut self, beeper: Beep) -> Self {
        self.beeper = Some(beeper);
        self
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let (tx, rx) = mpsc::channel();
        input::install_signal_handler(tx.clone())?;
        input::spawn_listener(tx);

        enable_raw_mode().context("failed to enable raw mode")?;
        let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
        terminal.clear()?;

        let result = self.main_loop(&mut terminal, &rx);

        if let Some(beeper) = self.beeper.as_mut() {
            beeper.set(false);
        }
        let restored = disable_raw_mode();
        let cleared = terminal.clear();
        if let Err(e) = &result {
            let state = self.chip8.state();
            log::error!(
                "halted at {:#05X} (I={:#05X} V={:02X?})",
                state.pc,
                state.index,
                state.registers.as_slice()
            );
            log::error!("{e:#}");
        }
        teardown_outcome(result, restored, cleared)
    }

    fn main_loop(&mut self, terminal: &mut Tui, rx: &Receiver<InputEvent>) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.frame_rate as f64);
        let mut first_frame = true;

        loop {
            let frame_start = Instant::now();

            // Consume and discard crossterm events so keystrokes are not
            // echoed into the shell once raw mode is off
            while event::poll(Duration::ZERO)? {
                let _ = event::read()?;
            }

            let drained = apply_input(&mut self.chip8, rx)?;
            if drained.quit {
                break;
            }

            for _ in drained.cycles..self.cycles_per_tick {
                self.chip8.execute_cycle()?;
            }

            if self.chip8.needs_redraw() || first_frame {
                let framebuffer = self.chip8.framebuffer();
                let rom_name = self.rom_name.as_str();
                terminal.draw(|frame| draw(frame, framebuffer, rom_name))?;
                self.chip8.clear_redraw();
                first_frame = false;
            }

            if let Some(beeper) = self.beeper.as_mut() {
                beeper.set(self.chip8.should_beep());
            }

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
        Ok(())
    }
}

/// The loop's own error wins; otherwise a failed raw-mode restore, then a
/// failed clear. Every step has already run by the time this is called.
fn teardown_outcome(
    result: anyhow::Result<()>,
    restored: std::io::Result<()>,
    cleared: std::io::Result<()>,
) -> anyhow::Result<()> {
    result?;
    restored.context("failed to disable raw mode")?;
    cleared.context("failed to clear terminal")?;
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Drained {
    quit: bool,
    /// Cycles already run this frame.
    cycles: u64,
}

/// Applies queued input to the interpreter. A key-down that opens a pending
/// `Fx0A` is followed by one cycle before any later event is applied, so a
/// press and release arriving in the same frame still reach the program.
fn apply_input(chip8: &mut Chip8, rx: &Receiver<InputEvent>) -> Result<Drained, Chip8Error> {
    let mut drained = Drained::default();
    loop {
        match rx.try_recv() {
            Ok(InputEvent::KeyDown(key)) => {
                let waiting = chip8.key_wait() == KeyWait::AwaitingPress;
                chip8.key_down(key);
                if waiting {
                    chip8.execute_cycle()?;
                    drained.cycles += 1;
                }
            }
            Ok(InputEvent::KeyUp(key)) => chip8.key_up(key),
            Ok(InputEvent::Quit) | Err(TryRecvError::Disconnected) => {
                drained.quit = true;
                break;
            }
            Err(TryRecvError::Empty) => break,
        }
    }
    Ok(drained)
}

/// Renders a framebuffer as block characters, one per pixel.
fn render_pixels(framebuffer: &Framebuffer) -> String {
    let mut screen = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT * 3 + DISPLAY_HEIGHT);
    for y in 0..DISPLAY_HEIGHT {
        screen.extend(framebuffer.row(y).map(|pixel| if pixel == 1 { '█' } else { ' ' }));
        screen.push('\n');
    }
    screen
}

fn draw(frame: &mut ratatui::Frame, framebuffer: &Framebuffer, rom_name: &str) {
    let area = frame.area();
    // +2 for the borders on each axis
    let game_width = (DISPLAY_WIDTH as u16) + 2;
    let game_height = (DISPLAY_HEIGHT as u16) + 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(game_height),
            Constraint::Length(7),
            Constraint::Min(0),
        ])
        .split(area);

    let game_area = if chunks[0].width > game_width {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(game_width),
                Constraint::Min(0),
            ])
            .split(chunks[0])[1]
    } else {
        chunks[0]
    };

    let game = Paragraph::new(render_pixels(framebuffer))
        .block(Block::default().borders(Borders::ALL).title(rom_name))
        .style(Style::default().fg(Color::White));
    frame.render_widget(game, game_area);

    let keys = Paragraph::new(KEY_MAPPING)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Keypad"))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(keys, chunks[1]);
}
