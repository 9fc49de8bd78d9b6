//! Terminal console for the user and human proxy agents

use parley_core::UserConsole;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Reads answers from stdin and prints turns to stdout.
///
/// An empty line, `exit`, end of input, or cancellation ends the session.
pub struct StdinConsole {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinConsole {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait::async_trait]
impl UserConsole for StdinConsole {
    fn display(&self, speaker: &str, text: &str) {
        println!("\n[{}] {}", speaker, text);
    }

    async fn read(&self, prompt: &str, cancel: &CancellationToken) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return None;
        }

        let mut lines = self.lines.lock().await;
        let line = tokio::select! {
            _ = cancel.cancelled() => return None,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(text)) => answer(&text),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }
}

fn answer(line: &str) -> Option<String> {
    let text = line.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("exit") {
        None
    } else {
        Some(text.to_string())
    }
}
