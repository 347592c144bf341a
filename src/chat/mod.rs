// Chat module
// Console conversation loop over the response generator

#[cfg(test)]
mod tests;

pub mod history;

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{debug, warn};

use crate::generation::{GenerationOutcome, ResponseGenerator};

pub use history::{ConversationHistory, Exchange};

/// Word that ends the session, compared case-insensitively
pub const EXIT_COMMAND: &str = "exit";

/// One interactive session: answers lines from `input` until EOF or `exit`
pub struct ChatSession<'a> {
    generator: &'a ResponseGenerator,
    assistant_name: String,
    history: ConversationHistory,
}

impl<'a> ChatSession<'a> {
    #[inline]
    pub fn new(generator: &'a ResponseGenerator, assistant_name: impl Into<String>) -> Self {
        Self {
            generator,
            assistant_name: assistant_name.into(),
            history: ConversationHistory::new(),
        }
    }

    #[inline]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[inline]
    pub async fn run<R, W>(&mut self, mut input: R, mut output: W) -> Result<()>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(
            output,
            "Hi! Welcome to {}. Type '{}' to quit.\n",
            self.assistant_name, EXIT_COMMAND
        )?;

        let mut line = String::new();
        loop {
            write!(output, "You: ")?;
            output.flush()?;

            line.clear();
            let read = input
                .read_line(&mut line)
                .context("Failed to read from console")?;
            if read == 0 {
                writeln!(output)?;
                break;
            }

            let query = line.trim();
            if query.eq_ignore_ascii_case(EXIT_COMMAND) {
                break;
            }
            if query.is_empty() {
                continue;
            }

            let outcome = self.generator.generate(query, &self.history).await;
            let answer = render_outcome(outcome, Some(self.assistant_name.as_str()), &mut output)?;
            self.history.push(query, answer);
        }

        debug!("Chat session ended after {} exchanges", self.history.len());
        Ok(())
    }
}

/// Print an outcome and return the full answer text.
///
/// A failure message is printed in one write. A stream is printed fragment by
/// fragment as it arrives; if it breaks off, the partial answer is kept.
#[inline]
pub fn render_outcome<W: Write>(
    outcome: GenerationOutcome,
    label: Option<&str>,
    output: &mut W,
) -> Result<String> {
    let prefix = label.map(|name| format!("{name}: ")).unwrap_or_default();

    match outcome {
        GenerationOutcome::Failed(message) => {
            writeln!(output, "{prefix}{message}\n")?;
            Ok(message)
        }
        GenerationOutcome::Stream(stream) => {
            write!(output, "{prefix}")?;
            output.flush()?;

            let mut answer = String::new();
            for fragment in stream {
                match fragment {
                    Ok(text) => {
                        write!(output, "{text}")?;
                        output.flush()?;
                        answer.push_str(&text);
                    }
                    Err(e) => {
                        warn!("Answer stream ended early: {:#}", e);
                        break;
                    }
                }
            }

            write!(output, "\n\n")?;
            output.flush()?;
            Ok(answer)
        }
    }
}
