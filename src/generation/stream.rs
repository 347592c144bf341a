use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Request sent to the generation service
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerateOptions,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_ctx: u32,
}

/// One NDJSON line of a generation response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateChunk {
    response: String,
    done: bool,
    error: Option<String>,
}

/// Lazy sequence of answer fragments, in the order the service produces them.
///
/// Each call to `next` blocks until the next fragment arrives. The stream ends
/// after the fragment marked `done`; a service error or a broken connection
/// is yielded once as `Err` and then the stream ends.
pub struct TokenStream {
    fragments: Box<dyn Iterator<Item = Result<String>> + Send>,
}

impl TokenStream {
    /// Stream fragments out of an NDJSON generation response body
    #[inline]
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self {
            fragments: Box::new(NdjsonFragments {
                lines: reader.lines(),
                finished: false,
            }),
        }
    }

    /// A stream that yields already-known fragments
    #[inline]
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self {
            fragments: Box::new(fragments.into_iter().map(Ok)),
        }
    }

    /// Drain the stream into a single string
    #[inline]
    pub fn collect_text(self) -> Result<String> {
        let mut text = String::new();
        for fragment in self {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStream").finish_non_exhaustive()
    }
}

impl Iterator for TokenStream {
    type Item = Result<String>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.fragments.next()
    }
}

struct NdjsonFragments<L> {
    lines: L,
    finished: bool,
}

impl<L> Iterator for NdjsonFragments<L>
where
    L: Iterator<Item = std::io::Result<String>>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = match self.lines.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e).context("Generation stream was interrupted"));
                }
                Some(Ok(line)) => line,
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let chunk: GenerateChunk = match serde_json::from_str(line) {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e).context("Failed to parse generation stream line"));
                }
            };

            if let Some(error) = chunk.error {
                self.finished = true;
                return Some(Err(anyhow!("Generation service error: {}", error)));
            }

            if chunk.done {
                self.finished = true;
            }

            if !chunk.response.is_empty() {
                return Some(Ok(chunk.response));
            }
        }

        None
    }
}
