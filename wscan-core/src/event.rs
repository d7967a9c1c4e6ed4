//! Replaces the reference implementation's C-style function-pointer callback
//! table with a plain enum delivered over an `mpsc::Sender<Event>`
//! (SPEC_FULL.md §6/§10.3). One channel, one consumer task, no registration
//! step: the owning binary just holds the receiving end.

use wscan_types::NetworkRecord;

use crate::config::ScanMode;
use crate::error::SshError;
use crate::model::UpdateMask;

/// Which producer raised an event, for status lines that don't otherwise
/// carry enough context to tell (`on_status` in the reference).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Tzsp,
    Ssh,
    Gpsd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug)]
pub enum Event {
    /// The SSH driver's scanner/sniffer has changed mode.
    State(Option<ScanMode>),
    /// A fully parsed, not-yet-merged observation. Ownership transfers to
    /// the receiver, which is expected to stage it via `Model::buffer_add`.
    Network(NetworkRecord),
    /// The SSH driver completed one redraw cycle; the consolidation task
    /// should call `Model::drain` now.
    Heartbeat,
    /// The scan-list string currently in effect on the router, echoed back
    /// after a `SCANLIST` command is applied.
    ScanList(String),
    Status(Source, StatusKind, String),
    /// Host-key verification request. `on_verify` in the reference blocks the
    /// SSH thread for an answer; here the driver awaits a reply on the
    /// bundled oneshot instead of calling back into foreign code directly.
    Verify {
        fingerprint: String,
        reply: tokio::sync::oneshot::Sender<bool>,
    },
    SshDisconnected { cause: SshError, cancelled: bool },
    GpsdInfo(crate::gpsd::GpsdInfo),
    GpsdData(crate::gpsd::GpsdData),
    /// Carries the mask a `Model::drain` call produced, so a UI collaborator
    /// doesn't need its own access to the model to know what to repaint.
    ModelUpdated(UpdateMask),
}
