//! Feeds command output that is too large for one prompt across several
//! round-trips, relying on the remote session to keep the earlier parts.

use tracing::debug;

use crate::channel::AiChannel;
use crate::error::ChannelError;

/// Largest output, in characters, sent to the AI in a single prompt.
pub const MAX_CHUNK_CHARS: usize = 4000;

pub struct OutputChunker {
    chunk_chars: usize,
}

impl Default for OutputChunker {
    fn default() -> Self {
        Self::new(MAX_CHUNK_CHARS)
    }
}

impl OutputChunker {
    pub fn new(chunk_chars: usize) -> Self {
        Self {
            chunk_chars: chunk_chars.max(1),
        }
    }

    /// True when `text` has to go through [`feed`](Self::feed).
    pub fn needs_chunking(&self, text: &str) -> bool {
        text.chars().count() > self.chunk_chars
    }

    /// Splits `text` into consecutive windows of at most `chunk_chars`
    /// characters. Windows always end on a character boundary.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut count = 0;

        for (index, _) in text.char_indices() {
            if count == self.chunk_chars {
                chunks.push(&text[start..index]);
                start = index;
                count = 0;
            }
            count += 1;
        }

        if start < text.len() {
            chunks.push(&text[start..]);
        }

        chunks
    }

    /// Sends every window but the last as an acknowledge-only prompt and
    /// returns the prompt carrying the last window. Replies to the
    /// intermediate prompts are discarded without inspection.
    ///
    /// `progress` is called with `(part, total)` before each send.
    pub async fn feed<C, F>(
        &self,
        channel: &C,
        output: &str,
        command: &str,
        mut progress: F,
    ) -> Result<String, ChannelError>
    where
        C: AiChannel + ?Sized,
        F: FnMut(usize, usize),
    {
        let chunks = self.split(output);
        let total = chunks.len();
        debug!(command, total, "feeding oversized output in parts");

        let Some((last, leading)) = chunks.split_last() else {
            return Ok(final_part_prompt(command, "", 1, 1));
        };

        for (index, chunk) in leading.iter().enumerate() {
            let part = index + 1;
            progress(part, total);
            debug!(part, total, "sending intermediate part");
            channel.send(&intermediate_part_prompt(command, chunk, part, total)).await?;
        }

        progress(total, total);
        Ok(final_part_prompt(command, last, total, total))
    }
}

fn intermediate_part_prompt(command: &str, chunk: &str, part: usize, total: usize) -> String {
    format!(
        "The user ran the command \"{command}\". The output is very large, so I am feeding it to you in parts. \
This is part {part} of {total}. Do not analyze it yet or perform any other action. \
Just acknowledge that you have received this part by replying with \"OK\" and nothing else.\n\n\
--- START OF PART {part}/{total} ---\n{chunk}\n--- END OF PART {part}/{total} ---"
    )
}

fn final_part_prompt(command: &str, chunk: &str, part: usize, total: usize) -> String {
    format!(
        "This is the final part ({part} of {total}) of the output from the command \"{command}\".\n\n\
--- START OF FINAL PART {part}/{total} ---\n{chunk}\n--- END OF FINAL PART ---\n\n\
Now, taking all the previous parts into account, please analyze the complete result \
and provide the final answer or suggest the next step to the user."
    )
}
