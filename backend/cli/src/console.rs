//! Response sink that prints responses to the terminal.

use anyhow::Result;
use async_trait::async_trait;
use slashforge_core::{Choice, InteractionToken, ResponseSink};
use slashforge_logging::redact_token;

use crate::terminal_output::{BOLD, CYAN, DIM, RESET, supports_color};

#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    fn print(&self, token: &InteractionToken, label: &str, body: &str) {
        let token = redact_token(token.as_str());
        if supports_color() {
            println!("{DIM}[{token}]{RESET} {CYAN}{BOLD}{label}{RESET} {body}");
        } else {
            println!("[{token}] {label} {body}");
        }
    }
}

#[async_trait]
impl ResponseSink for ConsoleSink {
    async fn ack(&self, token: &InteractionToken) -> Result<()> {
        self.print(token, "ack", "");
        Ok(())
    }

    async fn send(&self, token: &InteractionToken, content: &str, ephemeral: bool) -> Result<()> {
        let label = if ephemeral { "reply (ephemeral)" } else { "reply" };
        self.print(token, label, content);
        Ok(())
    }

    async fn defer(&self, token: &InteractionToken, ephemeral: bool) -> Result<()> {
        self.print(token, "defer", if ephemeral { "(ephemeral)" } else { "" });
        Ok(())
    }

    async fn suggest(&self, token: &InteractionToken, choices: &[Choice]) -> Result<()> {
        let names: Vec<&str> = choices.iter().map(|c| c.name.as_str()).collect();
        self.print(token, "suggest", &format!("[{}]", names.join(", ")));
        Ok(())
    }
}
