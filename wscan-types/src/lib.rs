//! # wscan-types
//!
//! Shared data model for the wireless-scan aggregator.
//!
//! These types are used by:
//! - `wscan-core`: parsing (TZSP/802.11/SSH) and consolidating network observations
//! - `tzsp-sim`: synthesizing TZSP traffic for manual exercise of the receiver
//!
//! ## Conventions
//!
//! - A `MacAddr` is always the 48-bit BSSID; its canonical textual form is
//!   12 uppercase hex digits with no separators.
//! - Absence is modeled explicitly: `TriState::Unknown` for booleans that were
//!   never observed, `NO_SIGNAL` for an RSSI/noise byte that was never reported,
//!   `f64::NAN` for a geographic field that has no fix.
//! - Nothing in this crate performs I/O or owns a socket; it is pure data plus
//!   the handful of methods that fall out of the data shape itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── MAC address ───────────────────────────────────────────────────────────────

/// A 48-bit BSSID. Canonical text form is 12 uppercase hex digits, no colons
/// (matches the compact log-file encoding in the save/load format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() != 6 {
            return None;
        }
        let mut out = [0u8; 6];
        out.copy_from_slice(b);
        Some(MacAddr(out))
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    /// Packs the address MSB-first into a u64 (top two bytes zero), the same
    /// layout the original scanner used for its in-memory sort key.
    pub fn as_u64(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Accepts both the bare `020304050607` form and colon/dash separated forms.
impl FromStr for MacAddr {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if cleaned.len() != 12 {
            return Err(ParseMacError);
        }
        let mut out = [0u8; 6];
        for (i, byte) in out.iter_mut().enumerate() {
            let hex = &cleaned[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(hex, 16).map_err(|_| ParseMacError)?;
        }
        Ok(MacAddr(out))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseMacError;

impl fmt::Display for ParseMacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a 12-hex-digit MAC address")
    }
}

impl std::error::Error for ParseMacError {}

impl Serialize for MacAddr {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Tri-state boolean ─────────────────────────────────────────────────────────

/// Replaces the source's `-1`/`0`/`1` signed-int tri-state with a type that
/// can't silently participate in `if` as a boolean. `Unknown` means "never
/// observed", not "observed false".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    #[default]
    Unknown,
    False,
    True,
}

impl TriState {
    pub fn from_bool(b: bool) -> Self {
        if b {
            TriState::True
        } else {
            TriState::False
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, TriState::True)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TriState::Unknown)
    }

    /// `self` wins unless it's unknown, in which case `other` carries through.
    /// This is the merge rule used throughout C5: a known value is never
    /// overwritten by an incoming unknown one.
    pub fn merge(self, other: TriState) -> TriState {
        if self.is_known() {
            self
        } else {
            other
        }
    }
}

impl Serialize for TriState {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            TriState::Unknown => s.serialize_none(),
            TriState::False => s.serialize_bool(false),
            TriState::True => s.serialize_bool(true),
        }
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let opt = Option::<bool>::deserialize(d)?;
        Ok(match opt {
            None => TriState::Unknown,
            Some(b) => TriState::from_bool(b),
        })
    }
}

// ── Mode / flags / WPS ────────────────────────────────────────────────────────

/// PHY mode, resolved from capability IEs by C1 (see `mode resolution` in
/// SPEC_FULL.md §4.1). Ordered roughly oldest-to-newest for readability only;
/// no ordinal comparison is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    B,
    G,
    A,
    Gn,
    An,
    Ac,
    Ax,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::B => "b",
            Mode::G => "g",
            Mode::A => "a",
            Mode::Gn => "gn",
            Mode::An => "an",
            Mode::Ac => "ac",
            Mode::Ax => "ax",
        };
        write!(f, "{s}")
    }
}

/// Per-record protocol flags. Every field is a tri-state: the source
/// distinguished "observed false" from "never reported" and that distinction
/// matters for the merge rule in C5 (a known value is sticky).
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    pub privacy: TriState,
    pub routeros: TriState,
    pub nstreme: TriState,
    pub tdma: TriState,
    pub wds: TriState,
    pub bridge: TriState,
}

impl Flags {
    pub fn merge(self, other: Flags) -> Flags {
        Flags {
            privacy: self.privacy.merge(other.privacy),
            routeros: self.routeros.merge(other.routeros),
            nstreme: self.nstreme.merge(other.nstreme),
            tdma: self.tdma.merge(other.tdma),
            wds: self.wds.merge(other.wds),
            bridge: self.bridge.merge(other.bridge),
        }
    }
}

/// WPS visibility: beacons only ever carry presence, probe-responses may
/// carry the full descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WpsState {
    #[default]
    Absent,
    BeaconOnly,
    ProbeResponseFull,
}

// ── Signal sample / sample list ───────────────────────────────────────────────

/// Sentinel RSSI/noise value meaning "no signal reported", distinct from any
/// real dBm reading (RSSI/noise are otherwise small negative numbers).
pub const NO_SIGNAL: i8 = i8::MIN;

/// One time-stamped, optionally geo-stamped RSSI observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    pub timestamp: i64,
    pub rssi: i8,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub accuracy: f64,
    pub azimuth: f64,
}

impl SignalSample {
    pub fn new(timestamp: i64, rssi: i8) -> Self {
        SignalSample {
            timestamp,
            rssi,
            latitude: f64::NAN,
            longitude: f64::NAN,
            altitude: f64::NAN,
            accuracy: f64::NAN,
            azimuth: f64::NAN,
        }
    }
}

/// Timestamp-ordered sample history for one network record.
///
/// The source keeps this as a singly-linked list with head/tail pointers so
/// that append is O(1) and a merge of two already-sorted lists is O(n) with
/// no allocation beyond splicing nodes. A `Vec` gives the same asymptotics
/// for append (amortized) and for merge we do the equivalent O(n) walk by
/// hand in [`SignalList::merge`] rather than re-sorting, so the monotonicity
/// law in SPEC_FULL.md §8 is preserved exactly, not just as a side effect of
/// calling `sort`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalList(pub Vec<SignalSample>);

impl SignalList {
    pub fn new() -> Self {
        SignalList(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// O(1) amortized: the list is always kept non-decreasing by timestamp,
    /// so an append whose timestamp is `>=` the current tail stays sorted.
    /// Callers that append out-of-order timestamps should use `merge` instead.
    pub fn append(&mut self, sample: SignalSample) {
        self.0.push(sample);
    }

    /// Merges `other` into `self`, producing a single timestamp-ordered list.
    /// Mirrors the four-way branch of the original `signals_merge`:
    /// empty/empty short-circuits, `other` entirely before `self`'s head
    /// prepends, `other` entirely after `self`'s tail appends, otherwise an
    /// O(n) walk-and-splice preserves order. Every element from both inputs
    /// survives — `len() == self.len() + other.len()` always.
    pub fn merge(mut self, other: SignalList) -> SignalList {
        if other.0.is_empty() {
            return self;
        }
        if self.0.is_empty() {
            return other;
        }
        let self_head = self.0.first().unwrap().timestamp;
        let self_tail = self.0.last().unwrap().timestamp;
        let other_head = other.0.first().unwrap().timestamp;
        let other_tail = other.0.last().unwrap().timestamp;

        if other_tail <= self_head {
            let mut merged = other.0;
            merged.extend(self.0);
            return SignalList(merged);
        }
        if other_head >= self_tail {
            self.0.extend(other.0);
            return self;
        }

        let mut merged = Vec::with_capacity(self.0.len() + other.0.len());
        let mut a = self.0.into_iter().peekable();
        let mut b = other.0.into_iter().peekable();
        loop {
            match (a.peek(), b.peek()) {
                (Some(x), Some(y)) => {
                    if x.timestamp <= y.timestamp {
                        merged.push(a.next().unwrap());
                    } else {
                        merged.push(b.next().unwrap());
                    }
                }
                (Some(_), None) => merged.push(a.next().unwrap()),
                (None, Some(_)) => merged.push(b.next().unwrap()),
                (None, None) => break,
            }
        }
        SignalList(merged)
    }

    pub fn is_sorted_non_decreasing(&self) -> bool {
        self.0.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }
}

// ── Network record ────────────────────────────────────────────────────────────

/// A value-typed observation of a BSS: the unit the parsers produce and the
/// table consolidates. `address` is the table's primary key; every other
/// field may be partially known and is merged field-by-field (see
/// `wscan_core::model`).
#[derive(Debug, Clone)]
pub struct NetworkRecord {
    pub address: MacAddr,
    /// Observed frequency in kHz; 0 when unknown.
    pub frequency: u32,
    /// Channel-width descriptor, optionally `"<width>-<ext>"`.
    pub channel: String,
    pub mode: Option<Mode>,
    pub streams: u8,
    pub ssid: Option<String>,
    pub radioname: Option<String>,
    pub routeros_ver: Option<String>,
    pub rssi: i8,
    pub noise: i8,
    pub flags: Flags,
    pub ubnt_airmax: TriState,
    pub ubnt_ptp: TriState,
    pub ubnt_ptmp: TriState,
    pub ubnt_mixed: TriState,
    pub wps: WpsState,
    pub wps_manufacturer: Option<String>,
    pub wps_model_name: Option<String>,
    pub wps_model_number: Option<String>,
    pub wps_serial_number: Option<String>,
    pub wps_device_name: Option<String>,
    pub firstseen: i64,
    pub lastseen: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub accuracy: f64,
    pub azimuth: f64,
    pub distance: f64,
    pub signals: SignalList,
}

impl NetworkRecord {
    /// A record with every field at its "never observed" sentinel, the same
    /// defaults `network_init` gives a freshly allocated record.
    pub fn new(address: MacAddr, timestamp: i64) -> Self {
        NetworkRecord {
            address,
            frequency: 0,
            channel: String::new(),
            mode: None,
            streams: 0,
            ssid: None,
            radioname: None,
            routeros_ver: None,
            rssi: NO_SIGNAL,
            noise: NO_SIGNAL,
            flags: Flags::default(),
            ubnt_airmax: TriState::Unknown,
            ubnt_ptp: TriState::Unknown,
            ubnt_ptmp: TriState::Unknown,
            ubnt_mixed: TriState::Unknown,
            wps: WpsState::Absent,
            wps_manufacturer: None,
            wps_model_name: None,
            wps_model_number: None,
            wps_serial_number: None,
            wps_device_name: None,
            firstseen: timestamp,
            lastseen: timestamp,
            latitude: f64::NAN,
            longitude: f64::NAN,
            altitude: f64::NAN,
            accuracy: f64::NAN,
            azimuth: f64::NAN,
            distance: f64::NAN,
            signals: SignalList::new(),
        }
    }

    pub fn has_signal(&self) -> bool {
        self.rssi != NO_SIGNAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_addr_round_trips_through_display_and_parse() {
        let addr = MacAddr([0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        assert_eq!(addr.to_string(), "020304050607");
        assert_eq!("02:03:04:05:06:07".parse::<MacAddr>().unwrap(), addr);
        assert_eq!("020304050607".parse::<MacAddr>().unwrap(), addr);
    }

    #[test]
    fn tristate_merge_prefers_known_self() {
        assert_eq!(TriState::True.merge(TriState::False), TriState::True);
        assert_eq!(TriState::Unknown.merge(TriState::False), TriState::False);
        assert_eq!(TriState::Unknown.merge(TriState::Unknown), TriState::Unknown);
    }

    #[test]
    fn signal_list_merge_preserves_length_and_order() {
        let a = SignalList(vec![SignalSample::new(1, -50), SignalSample::new(3, -55)]);
        let b = SignalList(vec![SignalSample::new(2, -60), SignalSample::new(4, -65)]);
        let merged = a.clone().merge(b.clone());
        assert_eq!(merged.len(), a.len() + b.len());
        assert!(merged.is_sorted_non_decreasing());
        assert_eq!(
            merged.0.iter().map(|s| s.timestamp).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn signal_list_merge_prepend_and_append_fast_paths() {
        let head = SignalList(vec![SignalSample::new(10, -50)]);
        let earlier = SignalList(vec![SignalSample::new(1, -40), SignalSample::new(2, -41)]);
        let merged = head.clone().merge(earlier.clone());
        assert_eq!(merged.0[0].timestamp, 1);
        assert_eq!(merged.0.last().unwrap().timestamp, 10);

        let later = SignalList(vec![SignalSample::new(20, -40)]);
        let merged2 = head.merge(later);
        assert_eq!(merged2.0.last().unwrap().timestamp, 20);
    }
}
