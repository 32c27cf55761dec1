//! IRC transport: connects to a chat server over TCP, answers PINGs and
//! forwards PRIVMSG lines for one channel.
//!
//! `connect` returns only once the server has confirmed the join with the
//! end of the channel's NAMES list (numeric 366), so the join message is
//! never sent to a channel the bot is not in yet.
//!
//! There is no reconnect logic; when the socket closes the inbound channel
//! closes and the dispatch loop ends.

use super::{ChatEvent, Connection, CHANNEL_CAPACITY};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub const DEFAULT_HOST: &str = "irc.chat.twitch.tv";
pub const DEFAULT_PORT: u16 = 6667;

/// How long the server gets to confirm the join
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct IrcSettings {
    pub host: String,
    pub port: u16,
    pub nick: String,
    pub password: String,
    /// Channel including the leading `#`
    pub channel: String,
}

/// Connect, log in and join the channel
pub async fn connect(settings: &IrcSettings) -> Result<Connection> {
    let addr = format!("{}:{}", settings.host, settings.port);
    info!("[IRC] Connecting to {}", addr);

    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Failed to connect to {addr}"))?;
    let (reader, mut writer) = stream.into_split();

    for line in [
        format!("PASS {}\r\n", settings.password),
        format!("NICK {}\r\n", settings.nick),
        format!("JOIN {}\r\n", settings.channel),
    ] {
        writer
            .write_all(line.as_bytes())
            .await
            .context("Failed to send login to IRC server")?;
    }

    let mut lines = BufReader::new(reader).lines();
    tokio::time::timeout(JOIN_TIMEOUT, wait_for_join(&mut lines, &mut writer))
        .await
        .with_context(|| format!("Timed out joining {}", settings.channel))??;
    info!("[IRC] Joined {} as {}", settings.channel, settings.nick);

    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (line_tx, mut line_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (raw_tx, mut raw_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let channel = settings.channel.clone();
    tokio::spawn(async move {
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("[IRC] Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("[IRC] Read failed: {e}");
                    break;
                }
            };

            if let Some(pong) = pong_reply(&line) {
                debug!("[IRC] PING'd by the server");
                if raw_tx.send(pong).await.is_err() {
                    break;
                }
                continue;
            }

            match parse_privmsg(&line, &channel) {
                Some(event) => {
                    info!("{:>25}: {}", event.user, event.text);
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
                None => debug!("[IRC] {}", line),
            }
        }
    });

    let channel = settings.channel.clone();
    let nick = settings.nick.clone();
    tokio::spawn(async move {
        loop {
            let raw = tokio::select! {
                Some(line) = line_rx.recv() => {
                    info!("{:>25}: {}", nick, line);
                    privmsg(&channel, &line)
                }
                Some(raw) = raw_rx.recv() => raw,
                else => break,
            };
            if let Err(e) = writer.write_all(raw.as_bytes()).await {
                warn!("[IRC] Write failed: {e}");
                break;
            }
        }
    });

    Ok(Connection {
        inbound: event_rx,
        outbound: line_tx,
    })
}

/// Read until the end of the NAMES list, answering PINGs on the way
async fn wait_for_join<R, W>(lines: &mut Lines<R>, writer: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from IRC server")?
    {
        if let Some(pong) = pong_reply(&line) {
            writer
                .write_all(pong.as_bytes())
                .await
                .context("Failed to answer PING")?;
        } else if is_end_of_names(&line) {
            return Ok(());
        } else {
            debug!("[IRC] {}", line);
        }
    }
    anyhow::bail!("IRC server closed the connection before the join completed")
}

/// `:server 366 nick #channel :End of /NAMES list`
pub fn is_end_of_names(line: &str) -> bool {
    let line = match line.strip_prefix('@') {
        Some(tagged) => tagged.split_once(' ').map_or("", |(_, rest)| rest),
        None => line,
    };
    let mut parts = line.split_whitespace();
    parts.next().is_some_and(|source| source.starts_with(':')) && parts.next() == Some("366")
}

/// `:nick!user@host PRIVMSG #channel :text`, with optional leading IRCv3 tags
pub fn parse_privmsg(line: &str, channel: &str) -> Option<ChatEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = match line.strip_prefix('@') {
        Some(tagged) => tagged.split_once(' ')?.1,
        None => line,
    };
    let (prefix, rest) = line.strip_prefix(':')?.split_once(' ')?;
    let user = prefix.split('!').next().filter(|u| !u.is_empty())?;
    let text = rest.strip_prefix(&format!("PRIVMSG {channel} :"))?;
    Some(ChatEvent::new(user, text))
}

pub fn pong_reply(line: &str) -> Option<String> {
    line.trim_end()
        .strip_prefix("PING ")
        .map(|server| format!("PONG {server}\r\n"))
}

/// Frame a chat line; embedded line breaks would start a new IRC command
pub fn privmsg(channel: &str, text: &str) -> String {
    let text = text.replace(['\r', '\n'], " ");
    format!("PRIVMSG {channel} :{text}\r\n")
}

/// `#host` -> `host`
pub fn channel_host(channel: &str) -> Option<&str> {
    channel.strip_prefix('#').filter(|host| !host.is_empty())
}
