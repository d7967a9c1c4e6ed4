//! Classification and parsing of committed terminal lines into structured
//! rows: the RouterOS `scan`/`sniff` table, the sniffer summary line, and
//! prompt/status text. No upstream source for the column layout survives in
//! the retrieval pack (the original scanner only ships the `mt-ssh.h`
//! header contract, not `mt-ssh.c`); the header-driven offset discovery
//! below is this crate's own design, recorded as an open question in
//! DESIGN.md rather than presented as ported.

use wscan_types::{Flags, MacAddr, NetworkRecord, TriState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Flags,
    Address,
    Ssid,
    Channel,
    Freq,
    Signal,
    Noise,
    RadioName,
    RouterosVer,
}

/// Column start offsets discovered once from a header row, then reused for
/// every body row until the session ends (RouterOS never changes its table
/// layout mid-session).
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    columns: Vec<(Field, usize)>,
}

const HEADER_TOKENS: &[(&str, Field)] = &[
    ("FLAGS", Field::Flags),
    ("ADDRESS", Field::Address),
    ("SSID", Field::Ssid),
    ("CHANNEL", Field::Channel),
    ("FREQ", Field::Freq),
    ("SIGNAL", Field::Signal),
    ("NOISE", Field::Noise),
    ("RADIO-NAME", Field::RadioName),
    ("R-OS-VER", Field::RouterosVer),
];

impl ColumnLayout {
    /// Scans a header row for known column labels and records where each
    /// one starts. Requires at least `ADDRESS` to be present; every other
    /// column is optional (RouterOS versions differ on which columns they
    /// print).
    pub fn discover(header: &str) -> Option<ColumnLayout> {
        let upper = header.to_uppercase();
        let mut columns: Vec<(Field, usize)> = HEADER_TOKENS
            .iter()
            .filter_map(|(token, field)| upper.find(token).map(|pos| (*field, pos)))
            .collect();

        if !columns.iter().any(|(f, _)| *f == Field::Address) {
            return None;
        }
        columns.sort_by_key(|(_, pos)| *pos);
        Some(ColumnLayout { columns })
    }

    fn slice(&self, row: &str, field: Field) -> Option<String> {
        let chars: Vec<char> = row.chars().collect();
        let idx = self.columns.iter().position(|(f, _)| *f == field)?;
        let start = self.columns[idx].1;
        let end = self
            .columns
            .get(idx + 1)
            .map(|(_, p)| *p)
            .unwrap_or(chars.len());
        if start >= chars.len() {
            return None;
        }
        let end = end.min(chars.len());
        let s: String = chars[start..end].iter().collect();
        Some(s.trim().to_string())
    }

    /// Parses one body row into a [`NetworkRecord`]. Returns `None` if the
    /// row doesn't even carry a parseable address (e.g. it's a blank filler
    /// row left over from a shrinking table).
    pub fn parse_row(&self, row: &str, now: i64) -> Option<NetworkRecord> {
        let address_str = self.slice(row, Field::Address)?;
        let address: MacAddr = address_str.parse().ok()?;

        let mut record = NetworkRecord::new(address, now);

        if let Some(flags_str) = self.slice(row, Field::Flags) {
            let mut flags = Flags::default();
            for c in flags_str.chars() {
                match c {
                    'P' => flags.privacy = TriState::True,
                    'R' => flags.routeros = TriState::True,
                    'N' => flags.nstreme = TriState::True,
                    'T' => flags.tdma = TriState::True,
                    'W' => flags.wds = TriState::True,
                    'B' => flags.bridge = TriState::True,
                    _ => {}
                }
            }
            record.flags = flags;
        }

        if let Some(ssid) = self.slice(row, Field::Ssid) {
            if !ssid.is_empty() {
                record.ssid = Some(ssid);
            }
        }
        if let Some(channel) = self.slice(row, Field::Channel) {
            if !channel.is_empty() {
                record.channel = channel;
            }
        }
        if let Some(freq) = self.slice(row, Field::Freq) {
            if let Ok(khz) = freq.trim_end_matches("MHz").trim().parse::<f64>() {
                record.frequency = (khz * 1000.0).round() as u32;
            }
        }
        if let Some(signal) = self.slice(row, Field::Signal) {
            if let Ok(rssi) = signal.parse::<i8>() {
                record.rssi = rssi;
            }
        }
        if let Some(noise) = self.slice(row, Field::Noise) {
            if let Ok(n) = noise.parse::<i8>() {
                record.noise = n;
            }
        }
        if let Some(name) = self.slice(row, Field::RadioName) {
            if !name.is_empty() {
                record.radioname = Some(name);
            }
        }
        if let Some(ver) = self.slice(row, Field::RouterosVer) {
            if !ver.is_empty() {
                record.routeros_ver = Some(ver);
            }
        }

        Some(record)
    }
}

/// A sniffer-mode snapshot row (`/interface wireless sniffer sniff`), parsed
/// from a single line of whitespace-separated `label: number` pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnifferStats {
    pub processed_packets: u32,
    pub memory_size: u32,
    pub memory_saved_packets: u32,
    pub memory_over_limit_packets: u32,
    pub stream_dropped_packets: u32,
    pub stream_sent_packets: u32,
    pub real_file_limit: u32,
    pub real_memory_limit: u32,
}

/// Recognises the sniffer summary line by the presence of its fixed set of
/// labels, then extracts the integer following each one.
pub fn parse_sniffer_stats(line: &str) -> Option<SnifferStats> {
    if !line.contains("packets-total") && !line.contains("processed") {
        return None;
    }
    let extract = |label: &str| -> u32 {
        line.find(label)
            .and_then(|pos| line[pos + label.len()..].split_whitespace().next())
            .and_then(|tok| tok.trim_matches(|c: char| !c.is_ascii_digit()).parse().ok())
            .unwrap_or(0)
    };
    Some(SnifferStats {
        processed_packets: extract("packets-total"),
        memory_size: extract("memory-size"),
        memory_saved_packets: extract("memory-saved-packets"),
        memory_over_limit_packets: extract("memory-over-limit-packets"),
        stream_dropped_packets: extract("stream-dropped-packets"),
        stream_sent_packets: extract("stream-sent-packets"),
        real_file_limit: extract("real-file-limit"),
        real_memory_limit: extract("real-memory-limit"),
    })
}

/// Matches a RouterOS prompt line, `[user@identity] > `.
pub fn is_prompt_line(line: &str) -> Option<&str> {
    let trimmed = line.trim_end();
    let start = trimmed.strip_prefix('[')?;
    let close = start.find(']')?;
    let identity_part = &start[..close];
    identity_part.find('@')?;
    let rest = trimmed[close + 2..].trim_start();
    rest.starts_with('>').then_some(identity_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_layout_and_parses_body_row() {
        let header = "FLAGS  ADDRESS       SSID";
        let layout = ColumnLayout::discover(header).unwrap();
        let row = "APR  02:03:04:05:06:07   test-ssid     ";
        let record = layout.parse_row(row, 1000).unwrap();

        assert_eq!(record.address, MacAddr([2, 3, 4, 5, 6, 7]));
        assert_eq!(record.ssid.as_deref(), Some("test-ssid"));
        assert_eq!(record.flags.privacy, TriState::True);
        assert_eq!(record.flags.routeros, TriState::True);
    }

    #[test]
    fn header_without_address_column_is_rejected() {
        assert!(ColumnLayout::discover("FLAGS SSID").is_none());
    }

    #[test]
    fn row_without_a_valid_address_is_skipped() {
        let layout = ColumnLayout::discover("FLAGS  ADDRESS       SSID").unwrap();
        assert!(layout.parse_row("     not-a-mac              ssid", 0).is_none());
    }

    #[test]
    fn prompt_line_is_recognised() {
        assert_eq!(is_prompt_line("[admin@MikroTik] > "), Some("admin@MikroTik"));
        assert_eq!(is_prompt_line("not a prompt"), None);
    }

    #[test]
    fn sniffer_stats_line_is_parsed() {
        let line = "packets-total: 120 memory-size: 64 memory-saved-packets: 100";
        let stats = parse_sniffer_stats(line).unwrap();
        assert_eq!(stats.processed_packets, 120);
        assert_eq!(stats.memory_size, 64);
        assert_eq!(stats.memory_saved_packets, 100);
    }
}
