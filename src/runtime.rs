//! Event loop tying a [`Bot`] to a transport [`Connection`].
//!
//! Events are handled strictly one at a time: every outbound line of one
//! event is queued before the next event is read.

use crate::bot::Bot;
use crate::transport::Connection;
use anyhow::{Context, Result};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connected,
    Listening,
}

pub struct Runtime {
    bot: Bot,
    phase: Phase,
}

impl Runtime {
    pub fn new(bot: Bot) -> Self {
        Runtime {
            bot,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn bot_mut(&mut self) -> &mut Bot {
        &mut self.bot
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Runtime {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Dispatch inbound events until the transport closes
    pub async fn run(&mut self, connection: Connection, join_message: Option<&str>) -> Result<()> {
        let Connection {
            mut inbound,
            outbound,
        } = connection;
        self.enter(Phase::Connected);

        if let Some(message) = join_message {
            outbound
                .send(message.to_string())
                .await
                .context("Transport closed before the join message was sent")?;
        }

        self.enter(Phase::Listening);
        info!("Listening for commands with prefix '{}'", self.bot.prefix());

        while let Some(event) = inbound.recv().await {
            for line in self.bot.handle_message(&event.user, &event.text) {
                outbound
                    .send(line)
                    .await
                    .context("Transport closed while sending")?;
            }
        }

        info!("Transport closed; stopping dispatch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;
    use crate::transport::ChatEvent;
    use serde_json::json;

    fn bot() -> Bot {
        load(&json!({
            "classes": {},
            "approved_users": [],
            "restricted": [],
            "public": ["greet"],
            "commands": [["InfoCommand", "greet", "hello!"]]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_until_transport_closes() {
        let (connection, events, mut lines) = Connection::pair();
        let mut runtime = Runtime::new(bot());
        assert_eq!(runtime.phase(), Phase::Idle);

        events.send(ChatEvent::new("a", "!greet")).await.unwrap();
        events.send(ChatEvent::new("b", "not a command")).await.unwrap();
        events.send(ChatEvent::new("c", "!greet again")).await.unwrap();
        drop(events);

        runtime.run(connection, Some("Logging on...")).await.unwrap();
        assert_eq!(runtime.phase(), Phase::Listening);

        let mut sent = Vec::new();
        while let Ok(line) = lines.try_recv() {
            sent.push(line);
        }
        assert_eq!(sent, vec!["Logging on...", "hello!", "hello!"]);
    }
}
