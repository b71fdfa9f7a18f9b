//! Line-oriented operator console.
//!
//! Stdin is read on a dedicated thread and delivered over a channel, so a
//! read can be raced against a timeout without losing typed-ahead input.

use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct Console {
    lines: mpsc::UnboundedReceiver<String>,
}

impl Console {
    pub fn new() -> Self {
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if lines_tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { lines: lines_rx }
    }

    /// Wait for the next operator line; `None` once stdin closes.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Wait up to `grace` for an operator line, returning early if one
    /// arrives. Best-effort cutover, not a hard deadline.
    pub async fn next_line_within(&mut self, grace: Duration) -> Option<String> {
        tokio::time::timeout(grace, self.lines.recv())
            .await
            .ok()
            .flatten()
    }

    /// Prompt for a device index; `None` when the input is not a number.
    pub async fn prompt_index(&mut self) -> Option<u32> {
        print!("Select a device to connect (enter index): ");
        let _ = io::stdout().flush();
        parse_index(&self.next_line().await?)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_index(line: &str) -> Option<u32> {
    line.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_parsing_tolerates_whitespace_only() {
        assert_eq!(parse_index("2"), Some(2));
        assert_eq!(parse_index("  7 \n"), Some(7));
        assert_eq!(parse_index("two"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index(""), None);
    }
}
