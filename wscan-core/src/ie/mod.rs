//! Information-element and frame parsers for the three beacon dialects this
//! crate recognises: standard 802.11 management frames (optionally carrying
//! MikroTik/AirMax/AirMax-AC/WPS vendor IEs), MikroTik's Nv2 TDMA protocol,
//! and Cambium. See [`crate::tzsp`] for the dispatch order and field
//! reconciliation that turns one of these into a [`wscan_types::NetworkRecord`].

pub mod airmax;
pub mod airmax_ac;
pub mod cambium;
pub mod mac80211;
pub mod mikrotik;
pub mod nv2;
pub mod wps;
