//! Core of a wireless-scan aggregator: two independent beacon producers (a
//! TZSP UDP receiver and a RouterOS SSH scanner/sniffer driver), an
//! opportunistic gpsd client, and a single-writer consolidation model that
//! merges their output into a deduplicated, time-aware table.
//!
//! Nothing in this crate performs UI work or reads ambient configuration —
//! every constructor takes an explicit, owned config value (see
//! [`config`]), and every producer reports back over a plain `mpsc`
//! channel of [`event::Event`] values rather than a registered callback.

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod event;
pub mod gpsd;
pub mod ie;
pub mod model;
pub mod persistence;
pub mod scanlist;
pub mod ssh;
pub mod tzsp;

pub use error::{GpsdError, ParseError, PersistError, SshError, TzspError};
pub use event::Event;
pub use model::Model;
