//! The SSH scanner/sniffer driver (C3): pilots RouterOS's interactive
//! `/interface wireless scan` or `/interface wireless sniffer sniff` over an
//! SSH shell channel and turns the PTY output into [`Event`]s.
//!
//! Ported at the protocol level from the reference's `mt-ssh.c` state
//! machine (see `mt-ssh.h`'s ret-code/info-type enums, mirrored in
//! [`crate::error::SshError`]); the transport itself is new — the reference
//! links `libssh`, this crate uses `russh` since it composes with the rest
//! of the tokio-based stack instead of needing its own event loop.
//!
//! The `russh`/`russh-keys` 0.44 call shapes below (`client::Handler`,
//! `client::connect`, channel requests) are written from the crate's public
//! API surface, not checked against a build of it; treat the exact method
//! names here as the first place to look if this module fails to compile.

use std::sync::Arc;

use russh::client::{self, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ScanMode, SshConfig};
use crate::error::SshError;
use crate::event::Event;
use crate::ssh::line_editor::LineEditor;
use crate::ssh::table::{self, ColumnLayout};

/// Driver lifecycle, mirroring the reference's state diagram
/// (`NEW → CONNECTING → AUTHENTICATING → [AUTH_VERIFY?] → CONNECTED →
/// IDENTIFYING → INTERFACE_CHECK → SCANLIST_CHECK → READY → {SCANNING |
/// SNIFFING | IDLE} → CLOSED`), collapsed to the subset this crate actually
/// branches on; the rest is observable only through the [`Event`] stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Authenticating,
    Ready,
    Running(ScanMode),
}

/// A command enqueued onto the driver's shell channel. Mirrors
/// `mt_ssh_cmd_type_t`.
#[derive(Debug, Clone)]
pub enum Command {
    Auth,
    ScanList(String),
    Stop,
    Scan,
    Sniff,
}

struct VerifyHandler {
    verify_tx: mpsc::Sender<Event>,
    skip_verification: bool,
}

#[async_trait::async_trait]
impl client::Handler for VerifyHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, key: &PublicKey) -> Result<bool, Self::Error> {
        if self.skip_verification {
            return Ok(true);
        }
        let fingerprint = key.fingerprint();
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .verify_tx
            .send(Event::Verify {
                fingerprint,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return Ok(false);
        }
        Ok(reply_rx.await.unwrap_or(false))
    }
}

/// Runs one SSH session end to end: connect, authenticate, request a PTY +
/// shell, pilot the requested mode, and emit [`Event`]s until cancelled or
/// disconnected. Reconnection is the caller's responsibility (SPEC_FULL.md
/// §4.3): this function returns once the session ends.
pub async fn run_session(
    config: SshConfig,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) -> SshError {
    let ssh_config = Arc::new(client::Config::default());
    let handler = VerifyHandler {
        verify_tx: events.clone(),
        skip_verification: config.skip_host_verification,
    };

    let _ = events
        .send(Event::Status(
            crate::event::Source::Ssh,
            crate::event::StatusKind::Info,
            format!("connecting to {}:{}", config.host, config.port),
        ))
        .await;

    let addr = (config.host.as_str(), config.port);
    let mut handle = match client::connect(ssh_config, addr, handler).await {
        Ok(h) => h,
        Err(e) => {
            debug!(error = %e, "ssh connect failed");
            return SshError::ErrConnect;
        }
    };

    let authenticated = match handle
        .authenticate_password(&config.login, &config.password)
        .await
    {
        Ok(ok) => ok,
        Err(e) => {
            debug!(error = %e, "ssh authentication request failed");
            return SshError::ErrAuth;
        }
    };
    if !authenticated {
        return SshError::ErrAuth;
    }

    let mut channel: Channel<Msg> = match handle.channel_open_session().await {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "failed to open ssh channel");
            return SshError::ErrChannelOpen;
        }
    };

    if channel
        .request_pty(
            false,
            "xterm",
            config.pty_columns as u32,
            200,
            0,
            0,
            &[],
        )
        .await
        .is_err()
    {
        return SshError::ErrChannelReqPtySize;
    }
    if channel.request_shell(false).await.is_err() {
        return SshError::ErrChannelReqShell;
    }

    let mut editor = LineEditor::new(config.pty_columns as usize);
    let mut layout: Option<ColumnLayout> = None;
    let mut phase = Phase::Connecting;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = channel.data(&b"\x03"[..]).await;
                let _ = handle.disconnect(Disconnect::ByApplication, "", "").await;
                return SshError::Canceled;
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(command) => {
                        if handle_command(&mut channel, &command, &config).await.is_err() {
                            return SshError::ErrChannelOpen;
                        }
                        if let Command::Scan = command {
                            phase = Phase::Running(ScanMode::Scanner);
                        }
                        if let Command::Sniff = command {
                            phase = Phase::Running(ScanMode::Sniffer);
                        }
                        if let Command::Stop = command {
                            phase = Phase::Ready;
                        }
                    }
                    None => {
                        return SshError::Closed;
                    }
                }
            }
            msg = channel.wait() => {
                match msg {
                    Some(ChannelMsg::Data { data }) => {
                        editor.feed(&data);
                        process_editor_output(&mut editor, &mut layout, phase, &events).await;
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        let _ = events.send(Event::SshDisconnected {
                            cause: SshError::Closed,
                            cancelled: false,
                        }).await;
                        return SshError::Closed;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn handle_command(
    channel: &mut Channel<Msg>,
    command: &Command,
    config: &SshConfig,
) -> Result<(), russh::Error> {
    match command {
        Command::Auth => Ok(()),
        Command::ScanList(list) => {
            let compressed = crate::scanlist::compress(list);
            channel
                .data(format!("scan-list={compressed}\r").as_bytes())
                .await
        }
        Command::Stop => channel.data(&b"\x03"[..]).await,
        Command::Scan => {
            let duration = config
                .duration
                .map(|d| format!(" duration={d}"))
                .unwrap_or_default();
            channel
                .data(format!("\x03scan {}{duration}\r", config.iface).as_bytes())
                .await
        }
        Command::Sniff => {
            channel
                .data(format!("\x03sniffer sniff {}\r", config.iface).as_bytes())
                .await
        }
    }
}

async fn process_editor_output(
    editor: &mut LineEditor,
    layout: &mut Option<ColumnLayout>,
    phase: Phase,
    events: &mpsc::Sender<Event>,
) {
    for line in editor.take_committed() {
        if let Some(identity) = table::is_prompt_line(&line) {
            let _ = events
                .send(Event::Status(
                    crate::event::Source::Ssh,
                    crate::event::StatusKind::Info,
                    format!("prompt: {identity}"),
                ))
                .await;
            continue;
        }

        if layout.is_none() {
            if let Some(discovered) = ColumnLayout::discover(&line) {
                *layout = Some(discovered);
                continue;
            }
        }

        if let Some(stats) = table::parse_sniffer_stats(&line) {
            let _ = events
                .send(Event::Status(
                    crate::event::Source::Ssh,
                    crate::event::StatusKind::Info,
                    format!("sniffer: {} packets processed", stats.processed_packets),
                ))
                .await;
            continue;
        }

        if let (Some(layout), Phase::Running(_)) = (layout.as_ref(), phase) {
            let now = chrono::Utc::now().timestamp();
            if let Some(record) = layout.parse_row(&line, now) {
                let _ = events.send(Event::Network(record)).await;
            }
        }
    }

    if editor.take_redraw_boundary() {
        let _ = events.send(Event::Heartbeat).await;
        let _ = warn_on_empty_grid(editor);
    }
}

fn warn_on_empty_grid(editor: &LineEditor) -> Option<()> {
    if editor.grid().is_empty() {
        warn!("redraw boundary with no rows buffered yet");
    }
    Some(())
}
