//! The consolidation model (C5): single-writer owner of the network table.
//!
//! Producers never touch the table directly. They call [`Model::buffer_add`]
//! to stage an observation, and the owning task calls [`Model::drain`] on
//! every heartbeat to merge the staged batch, age out stale entries, and
//! report what changed. This mirrors the reference scanner's "idle queue
//! flushed on a GTK timeout" shape, recast as a plain method call driven by
//! whichever task owns the `Model` value — there is no lock around the table
//! itself, only message passing into it.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;
use wscan_types::{MacAddr, NetworkRecord, SignalSample, NO_SIGNAL};

use crate::config::ModelConfig;
use crate::gpsd::{GpsdData, GpsdMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    New,
    Active,
    Inactive,
}

bitflags! {
    /// Returned by [`Model::drain`] so a UI collaborator can decide which
    /// sounds/highlights to fire without re-diffing the table itself.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UpdateMask: u8 {
        const NEW           = 0b0000_0001;
        const NEW_HIGHLIGHT = 0b0000_0010;
        const NEW_ALARM     = 0b0000_0100;
        const UPDATE        = 0b0000_1000;
        const ONLY_INACTIVE = 0b0001_0000;
    }
}

/// Predicates supplied by the owning binary's configuration (SPEC_FULL.md
/// §6). Kept as plain closures rather than a trait object: the table never
/// needs to downcast or enumerate implementors, just call them.
pub struct Predicates<'a> {
    pub blacklist: &'a dyn Fn(MacAddr) -> bool,
    pub highlight: &'a dyn Fn(MacAddr) -> bool,
    pub alarm: &'a dyn Fn(MacAddr) -> bool,
}

impl Default for Predicates<'_> {
    fn default() -> Self {
        fn never(_: MacAddr) -> bool {
            false
        }
        Predicates {
            blacklist: &never,
            highlight: &never,
            alarm: &never,
        }
    }
}

/// The last-known gpsd fix, as read non-blocking at sample time. Age is the
/// caller's responsibility (SPEC_FULL.md §4.4) — this struct carries no
/// "valid until" field of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub accuracy: f64,
}

impl GpsFix {
    pub fn from_gpsd(data: &GpsdData) -> Option<GpsFix> {
        if data.mode != GpsdMode::TwoD && data.mode != GpsdMode::ThreeD {
            return None;
        }
        if data.lat.is_nan() || data.lon.is_nan() {
            return None;
        }
        Some(GpsFix {
            latitude: data.lat,
            longitude: data.lon,
            altitude: data.alt,
            accuracy: data.epx.max(data.epy),
        })
    }
}

/// The keyed network table plus its staging buffer and activity bookkeeping.
pub struct Model {
    config: ModelConfig,
    table: HashMap<MacAddr, NetworkRecord>,
    activity: HashMap<MacAddr, ActivityState>,
    active_set: HashSet<MacAddr>,
    staging: Vec<NetworkRecord>,
    sort_disabled: bool,
}

impl Model {
    pub fn new(config: ModelConfig) -> Self {
        Model {
            config,
            table: HashMap::new(),
            activity: HashMap::new(),
            active_set: HashSet::new(),
            staging: Vec::new(),
            sort_disabled: false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, address: MacAddr) -> Option<&NetworkRecord> {
        self.table.get(&address)
    }

    pub fn state_of(&self, address: MacAddr) -> Option<ActivityState> {
        self.activity.get(&address).copied()
    }

    pub fn is_active(&self, address: MacAddr) -> bool {
        self.active_set.contains(&address)
    }

    /// Disables the table's sort bookkeeping for the duration of a bulk
    /// insert (a log load), matching the reference's O(n) load path. The
    /// table itself has no intrinsic order — this only matters to a caller
    /// that keeps a sorted projection alongside it.
    pub fn disable_sorting(&mut self) {
        self.sort_disabled = true;
    }

    pub fn enable_sorting(&mut self) {
        self.sort_disabled = false;
    }

    pub fn sorting_disabled(&self) -> bool {
        self.sort_disabled
    }

    /// Stages an observation. No merge happens until the next [`drain`].
    ///
    /// [`drain`]: Model::drain
    pub fn buffer_add(&mut self, record: NetworkRecord) {
        self.staging.push(record);
    }

    /// Merges the staged batch into the table, ages every entry, and returns
    /// the union of update flags produced by this cycle.
    pub fn drain(&mut self, now: i64, fix: Option<GpsFix>, predicates: &Predicates) -> UpdateMask {
        let mut mask = UpdateMask::empty();
        let staged = std::mem::take(&mut self.staging);

        for mut record in staged {
            if (predicates.blacklist)(record.address) {
                continue;
            }

            if self.config.clip_invalid_signal && record.rssi < -100 {
                record.rssi = -99;
            }
            if let (Some(fix), true) = (fix, record.has_signal()) {
                record.latitude = fix.latitude;
                record.longitude = fix.longitude;
                record.altitude = fix.altitude;
                record.accuracy = fix.accuracy;
            }

            match self.table.remove(&record.address) {
                None => {
                    let address = record.address;
                    if self.config.record_signals && record.has_signal() {
                        record.signals.append(SignalSample {
                            timestamp: record.lastseen,
                            rssi: record.rssi,
                            latitude: record.latitude,
                            longitude: record.longitude,
                            altitude: record.altitude,
                            accuracy: record.accuracy,
                            azimuth: record.azimuth,
                        });
                    }
                    self.table.insert(address, record);
                    self.activity.insert(address, ActivityState::New);
                    self.active_set.insert(address);

                    mask |= UpdateMask::NEW;
                    if (predicates.highlight)(address) {
                        mask |= UpdateMask::NEW_HIGHLIGHT;
                    }
                    if (predicates.alarm)(address) {
                        mask |= UpdateMask::NEW_ALARM;
                    }
                }
                Some(existing) => {
                    let address = record.address;
                    let newer_lastseen = record.lastseen > existing.lastseen;
                    let merged = merge(existing, record, self.config.record_signals);
                    self.table.insert(address, merged);
                    if newer_lastseen {
                        self.activity.insert(address, ActivityState::Active);
                        self.active_set.insert(address);
                    }
                    mask |= UpdateMask::UPDATE;
                }
            }
        }

        let active_timeout = self.config.active_timeout_secs;
        let new_timeout = self.config.new_timeout_secs;
        let mut newly_inactive = false;

        for (address, record) in self.table.iter() {
            let state = self.activity.entry(*address).or_insert(ActivityState::New);
            let silent_for = now - record.lastseen;

            if silent_for > active_timeout {
                if *state != ActivityState::Inactive {
                    *state = ActivityState::Inactive;
                    self.active_set.remove(address);
                    newly_inactive = true;
                }
            } else if *state == ActivityState::New && silent_for > new_timeout {
                *state = ActivityState::Active;
            }
        }

        if newly_inactive && mask.is_empty() {
            mask |= UpdateMask::ONLY_INACTIVE;
        }

        mask
    }

    /// Iterates the table sorted by a single caller-chosen key. The table
    /// keeps no persistent sort order of its own (SPEC_FULL.md §4.5); this
    /// builds the ordering on demand.
    pub fn iter_sorted_by<K: Ord, F: Fn(&NetworkRecord) -> K>(
        &self,
        key: F,
    ) -> Vec<&NetworkRecord> {
        let mut records: Vec<&NetworkRecord> = self.table.values().collect();
        records.sort_by_key(|r| key(r));
        records
    }

    pub fn records(&self) -> impl Iterator<Item = &NetworkRecord> {
        self.table.values()
    }

    /// Inserts a record loaded from disk without going through the staging
    /// buffer's merge/age machinery — a freshly loaded table has no prior
    /// entries to merge against.
    pub fn load_insert(&mut self, record: NetworkRecord) {
        let address = record.address;
        self.table.insert(address, record);
        self.activity.insert(address, ActivityState::Inactive);
    }
}

/// Merges `incoming` into `existing`, matching the field-by-field rules in
/// SPEC_FULL.md §4.5: `lastseen`/`firstseen` take the max/min, scalar fields
/// only move when the incoming value is non-empty, `signals` is a
/// timestamp-ordered union.
fn merge(existing: NetworkRecord, incoming: NetworkRecord, record_signals: bool) -> NetworkRecord {
    let mut out = existing;

    out.firstseen = out.firstseen.min(incoming.firstseen);
    let newer_lastseen = incoming.lastseen > out.lastseen;
    out.lastseen = out.lastseen.max(incoming.lastseen);

    if incoming.frequency != 0 {
        out.frequency = incoming.frequency;
    }
    if !incoming.channel.is_empty() {
        out.channel = incoming.channel.clone();
    }
    if incoming.mode.is_some() {
        out.mode = incoming.mode.clone();
    }
    if incoming.streams != 0 {
        out.streams = incoming.streams;
    }
    if incoming.ssid.is_some() {
        out.ssid = incoming.ssid.clone();
    }
    if incoming.radioname.is_some() {
        out.radioname = incoming.radioname.clone();
    }
    if incoming.routeros_ver.is_some() {
        out.routeros_ver = incoming.routeros_ver.clone();
    }
    if incoming.rssi != NO_SIGNAL {
        out.rssi = out.rssi.max(incoming.rssi);
    }
    if incoming.noise != NO_SIGNAL {
        out.noise = out.noise.max(incoming.noise);
    }
    out.flags = out.flags.merge(incoming.flags);
    out.ubnt_airmax = out.ubnt_airmax.merge(incoming.ubnt_airmax);
    out.ubnt_ptp = out.ubnt_ptp.merge(incoming.ubnt_ptp);
    out.ubnt_ptmp = out.ubnt_ptmp.merge(incoming.ubnt_ptmp);
    out.ubnt_mixed = out.ubnt_mixed.merge(incoming.ubnt_mixed);

    if incoming.wps != wscan_types::WpsState::Absent {
        out.wps = incoming.wps;
    }
    if incoming.wps_manufacturer.is_some() {
        out.wps_manufacturer = incoming.wps_manufacturer.clone();
    }
    if incoming.wps_model_name.is_some() {
        out.wps_model_name = incoming.wps_model_name.clone();
    }
    if incoming.wps_model_number.is_some() {
        out.wps_model_number = incoming.wps_model_number.clone();
    }
    if incoming.wps_serial_number.is_some() {
        out.wps_serial_number = incoming.wps_serial_number.clone();
    }
    if incoming.wps_device_name.is_some() {
        out.wps_device_name = incoming.wps_device_name.clone();
    }

    if newer_lastseen && !incoming.latitude.is_nan() {
        out.latitude = incoming.latitude;
        out.longitude = incoming.longitude;
        out.altitude = incoming.altitude;
        out.accuracy = incoming.accuracy;
    }
    if !incoming.azimuth.is_nan() {
        out.azimuth = incoming.azimuth;
    }
    if !incoming.distance.is_nan() {
        out.distance = incoming.distance;
    }

    if record_signals && incoming.has_signal() {
        let sample = SignalSample {
            timestamp: incoming.lastseen,
            rssi: incoming.rssi,
            latitude: incoming.latitude,
            longitude: incoming.longitude,
            altitude: incoming.altitude,
            accuracy: incoming.accuracy,
            azimuth: incoming.azimuth,
        };
        let mut incoming_signals = incoming.signals;
        incoming_signals.append(sample);
        out.signals = out.signals.merge(incoming_signals);
    } else {
        out.signals = out.signals.merge(incoming.signals);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wscan_types::Mode;

    fn addr(last: u8) -> MacAddr {
        MacAddr([0x02, 0x03, 0x04, 0x05, 0x06, last])
    }

    fn record_with_signal(address: MacAddr, timestamp: i64, rssi: i8) -> NetworkRecord {
        let mut r = NetworkRecord::new(address, timestamp);
        r.rssi = rssi;
        r.ssid = Some("net".to_string());
        r
    }

    #[test]
    fn insert_then_drain_marks_new_and_populates_active_set() {
        let mut model = Model::new(ModelConfig::default());
        model.buffer_add(record_with_signal(addr(1), 100, -50));
        let predicates = Predicates::default();
        let mask = model.drain(100, None, &predicates);

        assert!(mask.contains(UpdateMask::NEW));
        assert_eq!(model.state_of(addr(1)), Some(ActivityState::New));
        assert!(model.is_active(addr(1)));
        assert_eq!(model.get(addr(1)).unwrap().signals.len(), 1);
    }

    #[test]
    fn record_with_no_signal_produces_no_sample() {
        let mut model = Model::new(ModelConfig::default());
        model.buffer_add(NetworkRecord::new(addr(1), 100));
        model.drain(100, None, &Predicates::default());
        assert!(model.get(addr(1)).unwrap().signals.is_empty());
    }

    #[test]
    fn merge_takes_min_firstseen_and_max_lastseen() {
        let mut model = Model::new(ModelConfig::default());
        model.buffer_add(record_with_signal(addr(1), 100, -50));
        model.drain(100, None, &Predicates::default());

        model.buffer_add(record_with_signal(addr(1), 120, -40));
        model.drain(120, None, &Predicates::default());

        let rec = model.get(addr(1)).unwrap();
        assert_eq!(rec.firstseen, 100);
        assert_eq!(rec.lastseen, 120);
        assert_eq!(rec.signals.len(), 2);
        assert!(rec.signals.is_sorted_non_decreasing());
    }

    #[test]
    fn scalar_fields_only_move_when_incoming_is_non_empty() {
        let mut model = Model::new(ModelConfig::default());
        let mut first = record_with_signal(addr(1), 100, -50);
        first.mode = Some(Mode::G);
        model.buffer_add(first);
        model.drain(100, None, &Predicates::default());

        let mut second = NetworkRecord::new(addr(1), 110);
        second.mode = None;
        model.buffer_add(second);
        model.drain(110, None, &Predicates::default());

        assert_eq!(model.get(addr(1)).unwrap().mode, Some(Mode::G));
    }

    /// Literal scenario S5: insert at T with `active_timeout=2`; Active by
    /// the T+1 heartbeat, Inactive (but still present) by T+3.
    #[test]
    fn entry_goes_active_then_inactive_per_scenario_s5() {
        let config = ModelConfig {
            active_timeout_secs: 2,
            ..ModelConfig::default()
        };
        let mut model = Model::new(config);
        model.buffer_add(record_with_signal(addr(1), 0, -50));
        model.drain(0, None, &Predicates::default());
        assert_eq!(model.state_of(addr(1)), Some(ActivityState::New));

        model.drain(1, None, &Predicates::default());
        assert_eq!(model.state_of(addr(1)), Some(ActivityState::Active));
        assert!(model.is_active(addr(1)));

        let mask = model.drain(3, None, &Predicates::default());
        assert_eq!(model.state_of(addr(1)), Some(ActivityState::Inactive));
        assert!(!model.is_active(addr(1)));
        assert!(model.get(addr(1)).is_some());
        assert!(mask.contains(UpdateMask::ONLY_INACTIVE));
    }

    #[test]
    fn blacklisted_address_is_never_inserted() {
        let mut model = Model::new(ModelConfig::default());
        model.buffer_add(record_with_signal(addr(9), 0, -50));
        let blacklist = |a: MacAddr| a == addr(9);
        let predicates = Predicates {
            blacklist: &blacklist,
            ..Predicates::default()
        };
        model.drain(0, None, &predicates);
        assert!(model.get(addr(9)).is_none());
    }

    #[test]
    fn clip_invalid_signal_floors_rssi_to_minus_99() {
        let config = ModelConfig {
            clip_invalid_signal: true,
            ..ModelConfig::default()
        };
        let mut model = Model::new(config);
        model.buffer_add(record_with_signal(addr(1), 0, -120));
        model.drain(0, None, &Predicates::default());
        assert_eq!(model.get(addr(1)).unwrap().rssi, -99);
    }

    #[test]
    fn gps_fix_stamps_record_and_sample_when_signalled() {
        let mut model = Model::new(ModelConfig::default());
        model.buffer_add(record_with_signal(addr(1), 0, -50));
        let fix = GpsFix {
            latitude: 52.0,
            longitude: 21.0,
            altitude: 100.0,
            accuracy: 5.0,
        };
        model.drain(0, Some(fix), &Predicates::default());
        let rec = model.get(addr(1)).unwrap();
        assert_eq!(rec.latitude, 52.0);
        assert_eq!(rec.signals.0[0].latitude, 52.0);
    }

    #[test]
    fn firstseen_never_exceeds_lastseen_across_merges() {
        let mut model = Model::new(ModelConfig::default());
        model.buffer_add(record_with_signal(addr(1), 50, -50));
        model.drain(50, None, &Predicates::default());
        model.buffer_add(record_with_signal(addr(1), 10, -60));
        model.drain(50, None, &Predicates::default());
        let rec = model.get(addr(1)).unwrap();
        assert!(rec.firstseen <= rec.lastseen);
    }
}
