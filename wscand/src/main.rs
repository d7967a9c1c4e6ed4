//! wscand — entry point that wires the TZSP receiver, SSH driver and gpsd
//! client into the consolidation model and prints updates as they land.
//!
//! This is the one place in the workspace allowed to read CLI flags: every
//! core constructor takes an explicit, owned config value built here and
//! moved into the component that needs it.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wscan_core::config::{GpsdConfig, ModelConfig, ScanMode, SshConfig, TzspConfig};
use wscan_core::event::Event;
use wscan_core::gpsd::GpsdEvent;
use wscan_core::model::{GpsFix, Model, Predicates};
use wscan_core::ssh;
use wscan_types::NetworkRecord;

#[derive(Parser, Debug)]
#[command(name = "wscand", about = "Wireless scan aggregator")]
struct Args {
    /// TZSP receiver UDP port
    #[arg(long, default_value_t = 37008)]
    tzsp_port: u16,

    /// RouterOS host to drive over SSH; omit to run TZSP/gpsd only
    #[arg(long)]
    ssh_host: Option<String>,
    #[arg(long, default_value_t = 22)]
    ssh_port: u16,
    #[arg(long, default_value = "admin")]
    ssh_login: String,
    #[arg(long, default_value = "")]
    ssh_password: String,
    #[arg(long, default_value = "wlan1")]
    ssh_iface: String,
    #[arg(long)]
    ssh_sniff: bool,
    #[arg(long)]
    ssh_skip_host_verification: bool,

    /// gpsd host; omit to run without GPS stamping
    #[arg(long)]
    gpsd_host: Option<String>,
    #[arg(long, default_value_t = 2947)]
    gpsd_port: u16,

    /// Seconds a New record stays New before becoming Active even if unseen
    #[arg(long, default_value_t = 0)]
    new_timeout_secs: i64,
    /// Seconds any record goes quiet before becoming Inactive
    #[arg(long, default_value_t = 2)]
    active_timeout_secs: i64,
    /// Path to save/load the network table log on exit/start
    #[arg(long)]
    log_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wscand=info,wscan_core=info".into()),
        )
        .init();

    let args = Args::parse();
    info!("wscand starting");

    let cancel = CancellationToken::new();
    let model_config = ModelConfig {
        active_timeout_secs: args.active_timeout_secs,
        new_timeout_secs: args.new_timeout_secs,
        ..ModelConfig::default()
    };
    let mut model = Model::new(model_config);

    if let Some(path) = &args.log_file {
        if path.exists() {
            let mut loaded = 0usize;
            wscan_core::persistence::load(path, |record| {
                model.load_insert(record);
                loaded += 1;
            })?;
            info!(loaded, "restored network table from {}", path.display());
        }
    }

    let (net_tx, mut net_rx) = mpsc::channel::<NetworkRecord>(256);
    let (gpsd_tx, mut gpsd_rx) = mpsc::channel::<GpsdEvent>(64);
    let (event_tx, mut event_rx) = mpsc::channel::<Event>(64);

    let tzsp_cancel = cancel.clone();
    tokio::spawn(wscan_core::tzsp::run_receiver(
        TzspConfig {
            port: args.tzsp_port,
            ..TzspConfig::default()
        },
        "ISO-8859-2".to_string(),
        net_tx.clone(),
        tzsp_cancel,
        Arc::new(now),
    ));

    if let Some(host) = args.ssh_host.clone() {
        let ssh_config = SshConfig {
            host,
            port: args.ssh_port,
            login: args.ssh_login.clone(),
            password: args.ssh_password.clone(),
            iface: args.ssh_iface.clone(),
            duration: None,
            mode: if args.ssh_sniff {
                ScanMode::Sniffer
            } else {
                ScanMode::Scanner
            },
            skip_host_verification: args.ssh_skip_host_verification,
            pty_columns: 200,
        };
        let (_cmd_tx, cmd_rx) = mpsc::channel::<ssh::Command>(16);
        let ssh_cancel = cancel.clone();
        let ssh_events = event_tx.clone();
        tokio::spawn(async move {
            let cause = ssh::run_session(ssh_config, cmd_rx, ssh_events.clone(), ssh_cancel).await;
            let _ = ssh_events
                .send(Event::SshDisconnected {
                    cause,
                    cancelled: false,
                })
                .await;
        });
    }

    if let Some(host) = args.gpsd_host.clone() {
        let gpsd_cancel = cancel.clone();
        tokio::spawn(wscan_core::gpsd::run_client(
            GpsdConfig {
                host,
                port: args.gpsd_port,
            },
            Some(Duration::from_secs(5)),
            gpsd_tx,
            gpsd_cancel,
        ));
    }

    // Surface core-level events (status, verify prompts, disconnects) emitted
    // by the SSH driver; a real frontend would route Verify through a UI
    // prompt, here we trust on first use.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                Event::Verify { fingerprint, reply } => {
                    warn!(fingerprint, "accepting host key on first use");
                    let _ = reply.send(true);
                }
                Event::Status(source, kind, message) => {
                    info!(?source, ?kind, "{message}");
                }
                Event::SshDisconnected { cause, cancelled } => {
                    warn!(%cause, cancelled, "ssh session ended");
                }
                Event::Network(record) => {
                    let _ = net_tx.send(record).await;
                }
                _ => {}
            }
        }
    });

    let mut fix: Option<GpsFix> = None;
    let mut drain_interval = tokio::time::interval(Duration::from_millis(500));
    let predicates = Predicates::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                cancel.cancel();
                break;
            }
            Some(record) = net_rx.recv() => {
                model.buffer_add(record);
            }
            Some(event) = gpsd_rx.recv() => {
                if let GpsdEvent::Data(data) = event {
                    fix = GpsFix::from_gpsd(&data);
                }
            }
            _ = drain_interval.tick() => {
                let mask = model.drain(now(), fix, &predicates);
                if !mask.is_empty() {
                    info!(table_size = model.len(), ?mask, "model updated");
                }
            }
        }
    }

    if let Some(path) = &args.log_file {
        let records: Vec<&NetworkRecord> = model.records().collect();
        wscan_core::persistence::save(path, &records, wscan_core::persistence::SaveOptions::default())?;
        info!(saved = records.len(), "wrote network table to {}", path.display());
    }

    Ok(())
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
