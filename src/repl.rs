use anyhow::{Context, Result};
use crossterm::ExecutableCommand;
use crossterm::cursor::MoveTo;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, warn};

use crate::channel::{AiChannel, HttpChannel};
use crate::engine::{Console, ExchangeEnd, MediationEngine, Narration};
use crate::executor::ShellExecutor;
use crate::history::HistoryLog;

/// Sent verbatim to ask the remote workflow to drop its conversation memory.
const CLEAR_REMOTE_HISTORY_PROMPT: &str = "/clear_history_chat";

/// What a line typed at the main prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserInput<'a> {
    Blank,
    /// Local control command starting with `/`; never sent to the AI
    Command(&'a str),
    Prompt(&'a str),
}

impl<'a> UserInput<'a> {
    fn classify(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            Self::Blank
        } else if line.starts_with('/') {
            Self::Command(line)
        } else {
            Self::Prompt(line)
        }
    }
}

/// Terminal side of an exchange: rustyline for input, crossterm colors for
/// narration and an indicatif spinner for progress.
pub struct TerminalConsole {
    editor: DefaultEditor,
    spinner: Option<ProgressBar>,
}

impl TerminalConsole {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("Failed to initialize readline editor")?;
        Ok(Self {
            editor,
            spinner: None,
        })
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.clear_status();
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err).context("Failed to read input"),
        }
    }
}

impl Console for TerminalConsole {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        self.read_line(question)
    }

    fn narrate(&mut self, narration: Narration<'_>) {
        self.clear_status();
        match narration {
            Narration::Answer(text) | Narration::Assistant(text) => print_assistant_message(text),
            Narration::PendingCommand(command) => {
                let mut out = stdout();
                out.execute(SetForegroundColor(Color::Blue)).ok();
                out.execute(SetAttribute(Attribute::Bold)).ok();
                println!("\n✨ AI wants to run: {command}");
                out.execute(SetAttribute(Attribute::Reset)).ok();
                out.execute(ResetColor).ok();
            }
            Narration::Cancelled => print_colored("🚫 Okay, the command was cancelled.", Color::DarkGrey),
            Narration::CommandOutput { command, outcome } => {
                if outcome.failed {
                    print_colored(&format!("⚠️  '{command}' did not succeed"), Color::Yellow);
                } else {
                    print_colored(&format!("✅ Finished '{command}'"), Color::Green);
                }
                print_colored(
                    &format!("\n--- command output ---\n{}\n----------------------\n", outcome.text),
                    Color::DarkGrey,
                );
            }
            Narration::Failure(message) => print_colored(&format!("❌ {message}"), Color::Red),
        }
    }

    fn status(&mut self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(message.to_string());
            return;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.yellow} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    fn clear_status(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

pub struct Repl {
    console: TerminalConsole,
    engine: MediationEngine<HttpChannel, ShellExecutor>,
    history: HistoryLog,
}

impl Repl {
    pub fn new(engine: MediationEngine<HttpChannel, ShellExecutor>, history: HistoryLog) -> Result<Self> {
        let mut console = TerminalConsole::new()?;

        match history.load() {
            Ok(entries) => {
                for entry in entries {
                    console
                        .editor
                        .add_history_entry(entry.as_str())
                        .context("Failed to add history entry")?;
                }
            }
            Err(err) => print_warning(&format!("Could not load prompt history: {err:#}")),
        }

        Ok(Self {
            console,
            engine,
            history,
        })
    }

    /// Handles a single line for `--message`. Slash commands run locally and
    /// blank input is refused, so only a real prompt reaches the AI.
    pub async fn run_once(&mut self, message: &str) -> Result<Option<ExchangeEnd>> {
        match UserInput::classify(message) {
            UserInput::Blank => {
                print_warning("Nothing to send: the message is empty.");
                Ok(None)
            }
            UserInput::Command(command) => {
                self.handle_command(command).await?;
                Ok(None)
            }
            UserInput::Prompt(prompt) => {
                self.record_history(prompt);
                Ok(Some(self.engine.run_exchange(prompt, &mut self.console).await))
            }
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        print_colored("🤖 Ready to chat! Type /help for commands.", Color::Green);

        loop {
            debug!("waiting for input");
            let Some(line) = self.console.read_line("👤: ")? else {
                println!("Exiting");
                break;
            };

            let input = UserInput::classify(&line);
            if input == UserInput::Blank {
                continue;
            }

            self.console
                .editor
                .add_history_entry(line.trim())
                .context("Failed to add history entry")?;

            match input {
                UserInput::Blank => {}
                UserInput::Command(command) => {
                    if let Err(e) = self.handle_command(command).await {
                        eprintln!("Error: {:#}", e);
                    }

                    if command == "/quit" || command == "/exit" {
                        break;
                    }
                }
                UserInput::Prompt(prompt) => {
                    self.record_history(prompt);
                    let end = self.engine.run_exchange(prompt, &mut self.console).await;
                    debug!(?end, "exchange finished");
                }
            }
        }

        Ok(())
    }

    fn record_history(&mut self, prompt: &str) {
        if let Err(err) = self.history.record(prompt) {
            warn!(error = %err, "failed to record history");
            print_warning(&format!("Could not save prompt history: {err:#}"));
        }
    }

    async fn handle_command(&mut self, command: &str) -> Result<()> {
        match command {
            "/help" => self.show_help(),
            "/quit" | "/exit" => {
                print_colored("👋 Bye! See you next time.", Color::Magenta);
                Ok(())
            }
            "/clear" => {
                let mut out = stdout();
                out.execute(Clear(ClearType::All))?;
                out.execute(MoveTo(0, 0))?;
                print_colored("🤖 Screen cleared, ready when you are.", Color::Green);
                Ok(())
            }
            "/show_history" => {
                self.show_session_history();
                Ok(())
            }
            "/show_full_history" => self.show_full_history(),
            "/clear_history_chat" => {
                self.clear_remote_history().await;
                Ok(())
            }
            _ => {
                print_colored(&format!("🤔 Unknown command: {command}"), Color::Yellow);
                println!("Type /help for available commands");
                Ok(())
            }
        }
    }

    fn show_help(&self) -> Result<()> {
        println!("Available commands:");
        println!("  /show_history        - Show prompts sent in this session");
        println!("  /show_full_history   - Show every prompt saved in the history file");
        println!("  /clear_history_chat  - Ask the AI to forget this conversation");
        println!("  /clear               - Clear the screen");
        println!("  /help                - Show this help message");
        println!("  /quit, /exit         - Exit the session");
        println!();
        match self.engine.channel().session() {
            Some(session) => println!("Session: {}", session.id()),
            None => println!("Session: (not scoped)"),
        }
        println!("History file: {}", self.history.path().display());
        Ok(())
    }

    fn show_session_history(&self) {
        let entries = self.history.session_entries();
        if entries.is_empty() {
            print_colored("📜 No prompts in this session yet", Color::Yellow);
            return;
        }

        print_colored("\n--- 📜 Prompts in this session ---", Color::DarkGrey);
        for entry in entries {
            println!("{entry}");
        }
        print_colored("----------------------------------", Color::DarkGrey);
    }

    fn show_full_history(&self) -> Result<()> {
        let entries = self.history.load()?;
        if entries.is_empty() {
            print_colored(
                &format!("📜 No saved prompts in {}", self.history.path().display()),
                Color::Yellow,
            );
            return Ok(());
        }

        print_colored(
            &format!("\n--- 📜 All saved prompts ({}) ---", self.history.path().display()),
            Color::DarkGrey,
        );
        for entry in entries {
            println!("{entry}");
        }
        print_colored("-------------------------------------------", Color::DarkGrey);
        Ok(())
    }

    async fn clear_remote_history(&mut self) {
        self.console.status("🗑️ Asking the AI to clear its history...");
        let result = self.engine.channel().send(CLEAR_REMOTE_HISTORY_PROMPT).await;
        self.console.clear_status();

        match result {
            Ok(_) => print_colored("✅ The AI-side history was cleared.", Color::Green),
            Err(err) => {
                warn!(error = %err, "clearing remote history failed");
                self.console.narrate(Narration::Failure(&err.to_string()));
            }
        }
    }
}

fn print_assistant_message(text: &str) {
    let mut out = stdout();
    out.execute(SetForegroundColor(Color::Green)).ok();
    out.execute(Print("🤖: ")).ok();
    out.execute(ResetColor).ok();
    println!("{}", text);
    println!();
}

fn print_colored(text: &str, color: Color) {
    let mut out = stdout();
    out.execute(SetForegroundColor(color)).ok();
    println!("{}", text);
    out.execute(ResetColor).ok();
}

fn print_warning(text: &str) {
    print_colored(&format!("⚠️  {text}"), Color::Yellow);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_lines_are_local_commands() {
        assert_eq!(UserInput::classify("/help"), UserInput::Command("/help"));
        assert_eq!(UserInput::classify("  /show_history \n"), UserInput::Command("/show_history"));
        assert_eq!(UserInput::classify("/not_a_command"), UserInput::Command("/not_a_command"));
    }

    #[test]
    fn blank_lines_never_become_prompts() {
        assert_eq!(UserInput::classify(""), UserInput::Blank);
        assert_eq!(UserInput::classify(" \t\n"), UserInput::Blank);
    }

    #[test]
    fn other_lines_are_trimmed_prompts() {
        assert_eq!(UserInput::classify("  list files "), UserInput::Prompt("list files"));
        assert_eq!(UserInput::classify("what is a/b?"), UserInput::Prompt("what is a/b?"));
    }
}
