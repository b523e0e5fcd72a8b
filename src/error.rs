//! Error kinds that abort a mediation exchange.
//!
//! Command failures are not represented here: they travel inside
//! [`CommandOutcome`](crate::executor::CommandOutcome) so the AI can react to them.

use thiserror::Error;

/// Failures of a single round-trip to the AI service.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The request did not complete within the configured bound
    #[error("AI request timed out after {0} seconds")]
    Timeout(u64),

    /// The service answered with something other than 200
    #[error("AI service returned HTTP {status}\n{body}")]
    HttpStatus { status: u16, body: String },

    /// The body could not be decoded as JSON
    #[error("Could not decode AI response as JSON:\n{body}")]
    MalformedResponse { body: String },

    /// DNS, refused connection, reset and other transport failures
    #[error("Connection to AI service failed: {0}")]
    Network(String),
}

/// Reasons an exchange stops before the AI produced a final answer.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The line-input source failed while a question was pending
    #[error("Failed to read confirmation: {0}")]
    Input(String),
}
