// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Terminal front end.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{DisplaySink, Notice, UserAction, VelocityBand};
use crate::mass::{MassEditor, ProjectileMass, DIGIT_HINTS};
use crate::session::{ShotRecord, Statistics};
use crate::state::{AppState, ConnectionStatus};
use crate::storage::HistoryView;

const NO_DATA: &str = "---";
const ANSI_RESET: &str = "\x1b[0m";

const HELP: &str = "\
Commands:
  connect | disconnect | toggle
  reset               clear the readings
  mass [GRAMS]        show the mass editor, or set the mass directly
  up N | down N       roll mass wheel N (1-4)
  default             put the editor back to the default mass
  apply               send the edited mass
  stats | history     show session statistics or open the shot list
  details N | share N show one entry of the shot list
  delete N | clear    edit the shot list (the session keeps its shots)
  export FILE         write the shot list as CSV
  status | help | quit";

/// Writes readings and notices as plain text lines.
pub struct ConsoleDisplay<W> {
    out: W,
    colour: bool,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), true)
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W, colour: bool) -> Self {
        Self { out, colour }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(args).and_then(|_| self.out.write_all(b"\n")) {
            warn!("Console write failed: {}", e);
        }
    }

    fn velocity(&self, velocity: f64) -> String {
        if self.colour {
            format!("{}{:.1}{}", VelocityBand::of(velocity).ansi(), velocity, ANSI_RESET)
        } else {
            format!("{velocity:.1}")
        }
    }

    fn write_statistics(&mut self, stats: &Statistics) {
        match (stats.velocity, stats.energy) {
            (Some(v), Some(e)) => {
                self.line(format_args!("Shots: {}", stats.count));
                self.line(format_args!(
                    "Speed  min {:.1} | max {:.1} | avg {:.1} m/s",
                    v.min, v.max, v.avg
                ));
                self.line(format_args!(
                    "Energy min {:.2} | max {:.2} | avg {:.2} J",
                    e.min, e.max, e.avg
                ));
            }
            _ => {
                self.line(format_args!("Shots: 0"));
                self.line(format_args!("Speed  min {NO_DATA} | max {NO_DATA} | avg {NO_DATA} m/s"));
                self.line(format_args!("Energy min {NO_DATA} | max {NO_DATA} | avg {NO_DATA} J"));
            }
        }
    }
}

impl<W: Write + Send> DisplaySink for ConsoleDisplay<W> {
    fn shot_recorded(&mut self, shot: &ShotRecord, stats: &Statistics) {
        let velocity = self.velocity(shot.velocity);
        self.line(format_args!(
            "Shot {}: {} m/s, {:.2} J",
            shot.index, velocity, shot.energy
        ));
        if let (Some(v), Some(e)) = (stats.velocity, stats.energy) {
            self.line(format_args!(
                "  avg {:.1} m/s ({:.1}-{:.1}), avg {:.2} J over {} shots",
                v.avg, v.min, v.max, e.avg, stats.count
            ));
        }
    }

    fn session_cleared(&mut self, mass_grams: f64) {
        self.line(format_args!(
            "Speed: {NO_DATA} m/s | Energy: {NO_DATA} J | Shots: 0 | Mass: {mass_grams:.2} g"
        ));
    }

    fn connection_changed(&mut self, status: ConnectionStatus, device_name: Option<&str>) {
        match device_name {
            Some(name) => self.line(format_args!("[{}] {}", status.as_str(), name)),
            None => self.line(format_args!("[{}]", status.as_str())),
        }
    }

    fn show_statistics(&mut self, stats: &Statistics) {
        self.write_statistics(stats);
    }

    fn show_history(&mut self, history: &HistoryView) {
        self.line(format_args!("{}", history.summary()));
        if history.is_empty() {
            return;
        }
        self.line(format_args!("Mass: {:.2} g", history.mass_grams()));
        for (n, entry) in history.entries().iter().enumerate() {
            let velocity = self.velocity(entry.velocity);
            self.line(format_args!(
                "{:>3}. #{:<4} {}  {} m/s  {:.2} J",
                n + 1,
                entry.shot_number,
                entry.time(),
                velocity,
                entry.energy
            ));
        }
    }

    fn show_text(&mut self, text: &str) {
        self.line(format_args!("{text}"));
    }

    fn notify(&mut self, notice: &Notice) {
        self.line(format_args!("* {notice}"));
    }
}

/// What a console line turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Action(UserAction),
    Message(String),
    Empty,
}

/// Parses console lines and owns the mass editor.
#[derive(Debug)]
pub struct ConsoleInput {
    state: Arc<AppState>,
    editor: MassEditor,
}

impl ConsoleInput {
    pub fn new(state: Arc<AppState>) -> Self {
        let editor = MassEditor::from_grams(state.get_mass_grams());
        Self { state, editor }
    }

    pub fn editor(&self) -> &MassEditor {
        &self.editor
    }

    /// Interpret one line. `Err` carries a message for the user.
    pub fn handle_line(&mut self, line: &str) -> Result<Input, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Input::Empty);
        };
        let argument = words.next();
        if words.next().is_some() {
            return Err(format!("Too many arguments for '{command}'"));
        }

        let input = match (command.to_ascii_lowercase().as_str(), argument) {
            ("connect" | "c", None) => Input::Action(UserAction::Connect),
            ("disconnect" | "d", None) => Input::Action(UserAction::Disconnect),
            ("toggle" | "t", None) => match self.state.get_status() {
                ConnectionStatus::Disconnected => Input::Action(UserAction::Connect),
                ConnectionStatus::Connected => Input::Action(UserAction::Disconnect),
                ConnectionStatus::Connecting => Input::Message("Connection in progress".into()),
            },
            ("reset" | "r", None) => Input::Action(UserAction::Reset),
            ("mass" | "m", None) => Input::Message(self.render_editor()),
            ("mass" | "m", Some(value)) => {
                let grams: f64 = value
                    .replace(',', ".")
                    .parse()
                    .map_err(|_| format!("'{value}' is not a mass in grams"))?;
                let mass = ProjectileMass::new(grams).map_err(|e| e.to_string())?;
                self.set_mass(mass)
            }
            ("up" | "down", Some(position)) => {
                let position = parse_wheel(position)?;
                if command.eq_ignore_ascii_case("up") {
                    self.editor.increment(position);
                } else {
                    self.editor.decrement(position);
                }
                Input::Message(self.render_editor())
            }
            ("default", None) => {
                self.editor.reset();
                Input::Message(self.render_editor())
            }
            ("apply", None) => {
                let mass = self.editor.confirm().map_err(|e| e.to_string())?;
                self.set_mass(mass)
            }
            ("stats" | "s", None) => Input::Action(UserAction::ShowStatistics),
            ("history" | "h", None) => Input::Action(UserAction::ShowHistory),
            ("details", Some(n)) => Input::Action(UserAction::ShowDetails(parse_entry(n)?)),
            ("share", Some(n)) => Input::Action(UserAction::ShareEntry(parse_entry(n)?)),
            ("delete", Some(n)) => Input::Action(UserAction::RemoveHistoryEntry(parse_entry(n)?)),
            ("clear", None) => Input::Action(UserAction::ClearHistory),
            ("export", Some(target)) => Input::Action(UserAction::Export(target.to_string())),
            ("export", None) => return Err("Usage: export FILE".to_string()),
            ("status", None) => Input::Message(self.render_status()),
            ("help" | "?", None) => Input::Message(HELP.to_string()),
            ("quit" | "q" | "exit", None) => Input::Action(UserAction::Quit),
            _ => return Err(format!("Unknown command '{}', try 'help'", line.trim())),
        };
        Ok(input)
    }

    fn set_mass(&mut self, mass: ProjectileMass) -> Input {
        self.editor = MassEditor::from_grams(mass.grams());
        Input::Action(UserAction::SetMass(mass))
    }

    fn render_editor(&self) -> String {
        let [tens, ones, tenths, hundredths] = self.editor.digits();
        let mut text = format!("Mass editor: {tens}{ones}.{tenths}{hundredths} g");
        for (n, hint) in DIGIT_HINTS.iter().enumerate() {
            text.push_str(&format!("\n  wheel {}: {}", n + 1, hint));
        }
        text
    }

    fn render_status(&self) -> String {
        let status = self.state.get_status();
        let device = self
            .state
            .get_device_name()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();
        format!(
            "{}{} | Mass: {:.2} g | toggle: {}",
            status.as_str(),
            device,
            self.state.get_mass_grams(),
            status.action_hint()
        )
    }
}

fn parse_wheel(position: &str) -> Result<usize, String> {
    match position.parse::<usize>() {
        Ok(n @ 1..=4) => Ok(n - 1),
        _ => Err(format!("Wheel must be 1-4, got '{position}'")),
    }
}

/// History entries are numbered from 1 on screen.
fn parse_entry(position: &str) -> Result<usize, String> {
    match position.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("Entry must be a list number from 1, got '{position}'")),
    }
}

/// Read commands from stdin until EOF or `quit`.
///
/// Runs on its own thread so a pending read never holds up runtime shutdown.
/// End of input is sent on as [`UserAction::Quit`].
pub fn run_console(
    state: Arc<AppState>,
    action_tx: mpsc::UnboundedSender<UserAction>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let mut input = ConsoleInput::new(state);
            println!("{HELP}");

            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Console read failed: {}", e);
                        break;
                    }
                };

                match input.handle_line(&line) {
                    Ok(Input::Action(action)) => {
                        debug!("Console action: {:?}", action);
                        let quit = action == UserAction::Quit;
                        if action_tx.send(action).is_err() || quit {
                            return;
                        }
                    }
                    Ok(Input::Message(text)) => println!("{text}"),
                    Ok(Input::Empty) => {}
                    Err(text) => println!("{text}"),
                }
            }

            info!("Console input closed");
            let _ = action_tx.send(UserAction::Quit);
        })
}
