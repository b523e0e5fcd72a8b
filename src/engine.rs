//! The command-mediation loop.
//!
//! One call to [`MediationEngine::run_exchange`] drives a user turn from the
//! first prompt to a final answer: it inspects each AI reply for a
//! `[CMD]...[/CMD]` directive, asks the user before running anything, and
//! feeds the command output back until the AI answers in plain text.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::affirm::is_affirmative;
use crate::channel::AiChannel;
use crate::chunker::OutputChunker;
use crate::error::{ChannelError, ExchangeError};
use crate::executor::{CommandOutcome, CommandRunner};

static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[CMD\](.*?)\[/CMD\]").expect("directive pattern is valid")
});

pub const CONFIRMATION_QUESTION: &str = "👉 Allow this command to run? ";

/// A command request embedded in an AI reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub command: String,
    /// Reply text with the directive removed; may be empty.
    pub preceding_message: String,
}

impl Directive {
    /// Finds the first complete directive in `reply`. Later ones are ignored.
    pub fn parse(reply: &str) -> Option<Self> {
        let found = DIRECTIVE_PATTERN.captures(reply)?;
        let whole = found.get(0)?;
        let command = found.get(1)?.as_str().trim().to_string();

        let mut remainder = String::with_capacity(reply.len() - whole.len());
        remainder.push_str(&reply[..whole.start()]);
        remainder.push_str(&reply[whole.end()..]);

        Some(Self {
            command,
            preceding_message: remainder.trim().to_string(),
        })
    }
}

/// Everything the engine shows the user while an exchange runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narration<'a> {
    /// Final answer of the exchange
    Answer(&'a str),
    /// Text the AI sent alongside a directive
    Assistant(&'a str),
    PendingCommand(&'a str),
    Cancelled,
    CommandOutput {
        command: &'a str,
        outcome: &'a CommandOutcome,
    },
    Failure(&'a str),
}

/// The user-facing side of an exchange: line input plus narration.
///
/// The status methods drive an optional progress indicator and default to
/// doing nothing.
pub trait Console {
    /// Poses `question` and waits for one line. `None` means the user
    /// closed the input (Ctrl-C / Ctrl-D).
    fn ask(&mut self, question: &str) -> anyhow::Result<Option<String>>;

    fn narrate(&mut self, narration: Narration<'_>);

    fn status(&mut self, _message: &str) {}

    fn clear_status(&mut self) {}
}

/// How an exchange ended.
#[derive(Debug)]
pub enum ExchangeEnd {
    Answered(String),
    Declined,
    Aborted(ExchangeError),
}

pub struct MediationEngine<Ch, Ex> {
    channel: Ch,
    executor: Ex,
    chunker: OutputChunker,
}

impl<Ch, Ex> MediationEngine<Ch, Ex>
where
    Ch: AiChannel,
    Ex: CommandRunner,
{
    pub fn new(channel: Ch, executor: Ex) -> Self {
        Self::with_chunker(channel, executor, OutputChunker::default())
    }

    pub fn with_chunker(channel: Ch, executor: Ex, chunker: OutputChunker) -> Self {
        Self {
            channel,
            executor,
            chunker,
        }
    }

    pub fn channel(&self) -> &Ch {
        &self.channel
    }

    /// Runs one user turn to completion. Failures are narrated and returned
    /// as [`ExchangeEnd::Aborted`]; they never escape as errors.
    ///
    /// Taking `&mut self` keeps a second exchange from starting while one is
    /// in flight.
    pub async fn run_exchange<C>(&mut self, user_text: &str, console: &mut C) -> ExchangeEnd
    where
        C: Console + ?Sized,
    {
        let end = match self.mediate(user_text, console).await {
            Ok(Some(answer)) => ExchangeEnd::Answered(answer),
            Ok(None) => ExchangeEnd::Declined,
            Err(err) => {
                warn!(error = %err, "exchange aborted");
                console.clear_status();
                console.narrate(Narration::Failure(&err.to_string()));
                ExchangeEnd::Aborted(err)
            }
        };
        console.clear_status();
        end
    }

    async fn mediate<C>(
        &self,
        user_text: &str,
        console: &mut C,
    ) -> Result<Option<String>, ExchangeError>
    where
        C: Console + ?Sized,
    {
        let mut current_prompt = user_text.to_string();

        loop {
            console.status("🤔 Thinking...");
            let reply = self.channel.send(&current_prompt).await?;
            console.clear_status();

            let Some(directive) = Directive::parse(&reply) else {
                debug!("reply carries no directive; exchange complete");
                console.narrate(Narration::Answer(&reply));
                return Ok(Some(reply));
            };

            info!(command = %directive.command, "AI requested a command");
            if !directive.preceding_message.is_empty() {
                console.narrate(Narration::Assistant(&directive.preceding_message));
            }
            console.narrate(Narration::PendingCommand(&directive.command));

            let answer = console
                .ask(CONFIRMATION_QUESTION)
                .map_err(|err| ExchangeError::Input(format!("{err:#}")))?;
            let approved = answer.as_deref().is_some_and(is_affirmative);
            debug!(approved, "confirmation answered");

            if !approved {
                console.narrate(Narration::Cancelled);
                return Ok(None);
            }

            console.status(&format!("⚙️ Running: {}", directive.command));
            let outcome = self.executor.run(&directive.command).await;
            console.clear_status();
            console.narrate(Narration::CommandOutput {
                command: &directive.command,
                outcome: &outcome,
            });

            current_prompt = self.follow_up(&directive.command, &outcome, console).await?;
        }
    }

    async fn follow_up<C>(
        &self,
        command: &str,
        outcome: &CommandOutcome,
        console: &mut C,
    ) -> Result<String, ChannelError>
    where
        C: Console + ?Sized,
    {
        if !self.chunker.needs_chunking(&outcome.text) {
            return Ok(analysis_prompt(command, &outcome.text));
        }

        console.status("📝 Output is large, sending it to the AI in parts...");
        self.chunker
            .feed(&self.channel, &outcome.text, command, |part, total| {
                console.status(&format!("📝 Sending part {part}/{total} to the AI..."));
            })
            .await
    }
}

fn analysis_prompt(command: &str, output: &str) -> String {
    format!(
        "The command \"{command}\" was executed and this was the output:\n\n{output}\n\n\
Based on this, please analyze the result and continue with the next step or provide the final answer to the user."
    )
}
