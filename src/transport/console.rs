//! Console transport for trying a command document locally.
//!
//! Each stdin line is `user: text`, or plain text sent as [`CONSOLE_USER`].
//! Outbound lines are printed to stdout.

use super::{ChatEvent, Connection, CHANNEL_CAPACITY};
use log::{error, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

pub const CONSOLE_USER: &str = "console";

pub fn connect() -> Connection {
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (line_tx, mut line_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if event_tx.send(parse_line(&line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Console input closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read console input: {e}");
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = line_rx.recv().await {
            let framed = format!("{line}\n");
            if let Err(e) = stdout.write_all(framed.as_bytes()).await {
                error!("Failed to write console output: {e}");
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    Connection {
        inbound: event_rx,
        outbound: line_tx,
    }
}

/// `user: text` -> event from `user`; anything else comes from the console user
pub fn parse_line(line: &str) -> ChatEvent {
    match line.split_once(": ") {
        Some((user, text)) if !user.is_empty() && !user.contains(char::is_whitespace) => {
            ChatEvent::new(user, text)
        }
        _ => ChatEvent::new(CONSOLE_USER, line),
    }
}
