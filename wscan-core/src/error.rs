//! Typed error taxonomies for each producer, mirroring the ret-code kinds in
//! SPEC_FULL.md §4.2/§4.3/§4.4 so `on_disconnect` carries a cause an external
//! reconnect loop can switch on, not just a string.

use thiserror::Error;

/// Parse-time failures inside C1. All are recoverable: callers log and drop
/// the offending datagram/IE rather than propagating.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("buffer too short for a TZSP header")]
    TruncatedHeader,
    #[error("unsupported TZSP version {0}")]
    UnsupportedVersion(u8),
    #[error("TZSP tag would overrun the buffer")]
    TagOverrun,
    #[error("frame reported an FCS error")]
    FcsError,
    #[error("frame-control byte did not match a recognised frame type")]
    UnrecognisedFrame,
    #[error("information element would overrun the frame body")]
    IeOverrun,
    #[error("vendor-IE decrypt verification failed")]
    DecryptVerificationFailed,
    #[error("vendor-IE had an inconsistent declared length")]
    InconsistentLength,
}

/// C2 (TZSP receiver) construction/lifecycle failures.
#[derive(Debug, Error)]
pub enum TzspError {
    #[error("failed to bind UDP socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// C3 (SSH scanner driver) ret-codes. Names mirror `mt_ssh_ret_t` in the
/// reference implementation's header.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SshError {
    #[error("session closed normally")]
    Closed,
    #[error("session canceled by caller")]
    Canceled,
    #[error("failed to establish the SSH transport")]
    ErrNew,
    #[error("failed to set session options")]
    ErrSetOptions,
    #[error("failed to connect")]
    ErrConnect,
    #[error("host key verification was rejected")]
    ErrVerify,
    #[error("authentication failed")]
    ErrAuth,
    #[error("failed to open a new channel")]
    ErrChannelNew,
    #[error("failed to open the channel")]
    ErrChannelOpen,
    #[error("failed to request a PTY of the requested size")]
    ErrChannelReqPtySize,
    #[error("failed to request a shell")]
    ErrChannelReqShell,
    #[error("router reported an invalid interface")]
    ErrInterface,
}

/// C4 (gpsd client) failures / info-taxonomy, richer than the coarse state
/// machine exposed to C5 (see SPEC_FULL.md §4.4).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GpsdError {
    #[error("resolving hostname failed")]
    ErrResolve,
    #[error("connect failed")]
    ErrConnect,
    #[error("no VERSION line received within the data timeout")]
    ErrTimeout,
    #[error("stream did not begin with a VERSION handshake")]
    ErrMismatch,
}

/// File I/O / log-format failures for C5 save/load. The in-memory table is
/// never mutated on a failed load, and a failed save leaves any prior file
/// on disk untouched.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed log JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gzip stream was corrupt")]
    Gzip,
}
