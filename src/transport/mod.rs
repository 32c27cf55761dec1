//! Chat transport boundary.
//!
//! A transport yields inbound `(user, text)` events and accepts outbound chat
//! lines. Both directions are tokio channels so the dispatch loop never sees
//! protocol framing.

pub mod console;
pub mod irc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Channel depth for both directions
pub const CHANNEL_CAPACITY: usize = 256;

/// One chat message, stripped of protocol framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub user: String,
    pub text: String,
}

impl ChatEvent {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        ChatEvent {
            user: user.into(),
            text: text.into(),
        }
    }
}

/// Which transport the binary attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Irc,
    Console,
}

/// An attached transport
pub struct Connection {
    pub inbound: mpsc::Receiver<ChatEvent>,
    pub outbound: mpsc::Sender<String>,
}

impl Connection {
    /// A connection backed by plain channels, returning the far ends
    pub fn pair() -> (Connection, mpsc::Sender<ChatEvent>, mpsc::Receiver<String>) {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (line_tx, line_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Connection {
                inbound: event_rx,
                outbound: line_tx,
            },
            event_tx,
            line_rx,
        )
    }
}
