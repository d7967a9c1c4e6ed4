//! Explicit, owned configuration values passed into every core constructor.
//!
//! The reference implementation reads a unitary config through free-function
//! getters/setters from anywhere in the program. SPEC_FULL.md §9 calls that
//! out for re-architecting: nothing in this crate reads an environment
//! variable or touches a global. A config value is built once by the owning
//! binary and moved into the component that needs it.

use wscan_types::MacAddr;

/// Which interactive RouterOS command the SSH driver is piloting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Scanner,
    Sniffer,
}

#[derive(Debug, Clone)]
pub struct TzspConfig {
    pub port: u16,
    /// RouterOS tags every TZSP packet with the sensor's MAC from 6.41
    /// onward. `None` disables the filter (accept any sensor, including
    /// pre-6.41 firmware) — off by default because the spec treats an
    /// absent sensor-MAC tag as a drop condition when a filter is set.
    pub sensor_mac: Option<MacAddr>,
    pub channel_width_mhz: u32,
    pub frequency_base_khz: u32,
}

impl Default for TzspConfig {
    fn default() -> Self {
        TzspConfig {
            port: 37008,
            sensor_mac: None,
            channel_width_mhz: 20,
            frequency_base_khz: 2_407_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub iface: String,
    pub duration: Option<u32>,
    pub mode: ScanMode,
    pub skip_host_verification: bool,
    /// PTY column width; wide enough that RouterOS never wraps a table row.
    pub pty_columns: u16,
}

#[derive(Debug, Clone)]
pub struct GpsdConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GpsdConfig {
    fn default() -> Self {
        GpsdConfig {
            host: "127.0.0.1".to_string(),
            port: 2947,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub active_timeout_secs: i64,
    /// Grace period, in seconds past insertion, an entry stays `New` before
    /// the age scan downgrades it to `Active` on the next drain even if
    /// nothing re-observes it. `0` means the very next heartbeat after
    /// insertion always promotes it.
    pub new_timeout_secs: i64,
    pub record_signals: bool,
    pub clip_invalid_signal: bool,
    /// `encoding_rs` label (e.g. `"ISO-8859-2"`) used when raw SSID/radioname
    /// bytes fail UTF-8 validation.
    pub fallback_encoding: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            active_timeout_secs: 2,
            new_timeout_secs: 0,
            record_signals: true,
            clip_invalid_signal: false,
            fallback_encoding: "ISO-8859-2".to_string(),
        }
    }
}
