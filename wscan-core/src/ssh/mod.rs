//! C3: the SSH-driven RouterOS scanner/sniffer.

pub mod driver;
mod line_editor;
mod table;

pub use driver::{run_session, Command};
