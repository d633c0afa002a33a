// src/client/session.rs

//! The interactive client: one task reads envelopes from the server and
//! prints them, the other reads console lines and sends envelopes.

use super::input::{InputCommand, parse_line};
use super::render::{PROMPT, render};
use crate::core::protocol::{DEFAULT_MAX_FRAME_SIZE, Envelope, FrameCodec, read_frame};
use anyhow::{Context, Result};
use futures::SinkExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

pub const DISCONNECTED_NOTICE: &str = "Disconnected from the server";

/// Settings for one client run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub screen_name: String,
    pub max_frame_size: usize,
    /// How long to wait for the server to close after we send EXIT.
    pub exit_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            screen_name: String::new(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            exit_grace: Duration::from_secs(2),
        }
    }
}

/// How the input side of a session came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `!exit`.
    UserExit,
    /// Console input was exhausted (Ctrl-D).
    InputClosed,
    Interrupted,
    /// The server closed the connection first.
    ServerClosed,
}

/// Connects to the configured server and runs a session on the process console.
pub async fn run(config: ClientConfig) -> Result<SessionEnd> {
    let addr = format!("{}:{}", config.host, config.port);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Failed to connect to {addr}"))?;
    stream.set_nodelay(true)?;
    info!("Connected to {} as {}", addr, config.screen_name);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_session(stream, &config, stdin, tokio::io::stdout()).await
}

/// Runs one chat session over `stream`.
///
/// Sends START exactly once, then relays console lines to the server until
/// the user leaves or the server goes away. Incoming envelopes are rendered
/// to `output` as they arrive.
pub async fn run_session<S, I, O>(
    stream: S,
    config: &ClientConfig,
    input: I,
    output: O,
) -> Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut writer = FramedWrite::new(write_half, FrameCodec::new(config.max_frame_size));
    let output = Arc::new(Mutex::new(output));

    writer
        .send(Envelope::Start {
            name: config.screen_name.clone(),
        })
        .await
        .context("Failed to send START")?;

    write_output(&output, PROMPT).await;

    let mut receiver = tokio::spawn(receive_loop(
        read_half,
        output.clone(),
        config.max_frame_size,
    ));
    let mut receiver_done = false;
    let mut lines = input.lines();
    let name = config.screen_name.as_str();

    let end = loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break SessionEnd::InputClosed,
                    Err(e) => {
                        warn!("Failed to read console input: {}", e);
                        break SessionEnd::InputClosed;
                    }
                };
                match parse_line(&line) {
                    Ok(InputCommand::Exit) => break SessionEnd::UserExit,
                    Ok(command) => {
                        if let Err(e) = writer.send(command.into_envelope(name)).await {
                            debug!("Send failed, leaving: {}", e);
                            break SessionEnd::ServerClosed;
                        }
                        write_output(&output, PROMPT).await;
                    }
                    Err(e) => write_output(&output, &format!("{e}\n{PROMPT}")).await,
                }
            }
            _ = &mut receiver => {
                receiver_done = true;
                break SessionEnd::ServerClosed;
            }
            _ = tokio::signal::ctrl_c() => break SessionEnd::Interrupted,
        }
    };

    if end != SessionEnd::ServerClosed {
        if let Err(e) = writer.send(Envelope::Exit { name: name.to_string() }).await {
            debug!("Failed to send EXIT: {}", e);
        }
    }
    if !receiver_done && tokio::time::timeout(config.exit_grace, &mut receiver).await.is_err() {
        debug!("Server did not close within {:?}; closing locally.", config.exit_grace);
        receiver.abort();
    }
    if let Err(e) = writer.close().await {
        debug!("Error while closing connection: {}", e);
    }
    output.lock().await.flush().await.ok();
    Ok(end)
}

/// Prints every envelope from the server until the connection closes.
async fn receive_loop<R, O>(mut reader: R, output: Arc<Mutex<O>>, max_frame_size: usize)
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    loop {
        match read_frame(&mut reader, max_frame_size).await {
            Ok(Some(payload)) => match Envelope::from_payload(&payload) {
                Ok(envelope) => {
                    if let Some(text) = render(&envelope) {
                        write_output(&output, &format!("{text}\n{PROMPT}")).await;
                    } else {
                        debug!("Ignoring unexpected {} from server", envelope.kind());
                    }
                }
                Err(e) => warn!("Ignoring malformed frame from server: {}", e),
            },
            Ok(None) => break,
            Err(e) => {
                debug!("Connection error: {}", e);
                break;
            }
        }
    }
    write_output(&output, &format!("{DISCONNECTED_NOTICE}\n")).await;
}

async fn write_output<O: AsyncWrite + Unpin>(output: &Mutex<O>, text: &str) {
    let mut out = output.lock().await;
    if out.write_all(text.as_bytes()).await.is_ok() {
        out.flush().await.ok();
    }
}
