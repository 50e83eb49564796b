//! Line-oriented terminal prompts.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use super::prompt::{CachePrompt, ConfirmationPrompt};
use super::{CacheDecision, ConfirmationGate, Decision, GateFuture};
use crate::cache::CacheInfo;
use crate::estimate::Estimate;

/// Asks on a writer and reads one answer line from a reader.
///
/// End of input counts as cancel.
pub struct TerminalGate<R, W> {
    io: Mutex<(R, W)>,
}

impl TerminalGate<BufReader<Stdin>, Stderr> {
    /// Prompt on stderr, read answers from stdin.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

impl<R, W> TerminalGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        self.io.into_inner()
    }

    async fn ask(&self, text: &str, question: &str) -> Option<String> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;
        let written = async {
            writer.write_all(text.as_bytes()).await?;
            writer.write_all(question.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("failed to write prompt: {e}");
        }

        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => Some(String::new()),
            Ok(_) => Some(line.trim().to_ascii_lowercase()),
            Err(e) => {
                warn!("failed to read answer: {e}");
                None
            }
        }
    }
}

fn parse_decision(answer: &str) -> Decision {
    match answer {
        "y" | "yes" | "proceed" => Decision::Proceed,
        _ => Decision::Cancel,
    }
}

fn parse_cache_decision(answer: &str) -> CacheDecision {
    match answer {
        "c" | "cache" | "use_cache" | "1" => CacheDecision::UseCache,
        "r" | "refresh" | "2" => CacheDecision::Refresh,
        _ => CacheDecision::Cancel,
    }
}

impl<R, W> ConfirmationGate for TerminalGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn confirm<'a>(&'a self, estimate: &'a Estimate) -> GateFuture<'a, Decision> {
        Box::pin(async move {
            let text = ConfirmationPrompt::from_estimate(estimate).render();
            let answer = self.ask(&text, "Proceed? [y/N] ").await?;
            Some(parse_decision(&answer))
        })
    }

    fn choose_cache<'a>(&'a self, info: &'a CacheInfo) -> GateFuture<'a, CacheDecision> {
        Box::pin(async move {
            let text = CachePrompt::from_info(info).render();
            let answer = self
                .ask(&text, "[c]ache / [r]efresh / anything else cancels: ")
                .await?;
            Some(parse_cache_decision(&answer))
        })
    }
}
