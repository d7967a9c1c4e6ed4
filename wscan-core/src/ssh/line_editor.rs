//! A minimal ANSI/VT100 virtual terminal: enough of a line editor to track
//! what RouterOS's `scan`/`sniff` table redraws actually leave on screen,
//! without pulling in a full terminal emulator crate. RouterOS redraws a
//! fixed-size table in place using cursor addressing rather than scrolling,
//! so the buffer is a flat grid of rows, not a scrollback.

const MAX_ROWS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    Csi,
}

/// Tracks the terminal grid RouterOS is drawing into and surfaces two kinds
/// of output to the caller: lines committed by a bare `LF` (pushed onto a
/// queue, consumed once) and the live grid snapshot (read on a heartbeat
/// boundary, i.e. whenever the cursor returns home via `CSI H`/`CSI f`).
pub struct LineEditor {
    rows: Vec<String>,
    cursor_row: usize,
    cursor_col: usize,
    width: usize,
    committed: Vec<String>,
    state: ParseState,
    csi_params: Vec<u32>,
    csi_current: Option<u32>,
    saw_redraw_boundary: bool,
}

impl LineEditor {
    pub fn new(width: usize) -> Self {
        LineEditor {
            rows: vec![String::new()],
            cursor_row: 0,
            cursor_col: 0,
            width,
            committed: Vec::new(),
            state: ParseState::Ground,
            csi_params: Vec::new(),
            csi_current: None,
            saw_redraw_boundary: false,
        }
    }

    fn ensure_row(&mut self, row: usize) {
        while self.rows.len() <= row && self.rows.len() < MAX_ROWS {
            self.rows.push(String::new());
        }
    }

    fn put_char(&mut self, c: char) {
        self.ensure_row(self.cursor_row);
        let row_idx = self.cursor_row.min(self.rows.len() - 1);
        let row = &mut self.rows[row_idx];
        while row.chars().count() < self.cursor_col {
            row.push(' ');
        }
        let mut chars: Vec<char> = row.chars().collect();
        if self.cursor_col < chars.len() {
            chars[self.cursor_col] = c;
        } else {
            chars.push(c);
        }
        *row = chars.into_iter().collect();
        self.cursor_col += 1;
        if self.cursor_col >= self.width {
            self.cursor_col = 0;
            self.cursor_row += 1;
        }
    }

    fn erase_to_end_of_line(&mut self, whole_line: bool) {
        self.ensure_row(self.cursor_row);
        if let Some(row) = self.rows.get_mut(self.cursor_row) {
            if whole_line {
                row.clear();
            } else {
                let keep: String = row.chars().take(self.cursor_col).collect();
                *row = keep;
            }
        }
    }

    fn clear_below(&mut self) {
        self.ensure_row(self.cursor_row);
        for row in self.rows.iter_mut().skip(self.cursor_row + 1) {
            row.clear();
        }
        if let Some(row) = self.rows.get_mut(self.cursor_row) {
            let keep: String = row.chars().take(self.cursor_col).collect();
            *row = keep;
        }
    }

    fn apply_csi(&mut self, final_byte: u8) {
        let params = &self.csi_params;
        let count = |i: usize| params.get(i).copied().unwrap_or(0).max(1) as usize;
        match final_byte {
            b'A' => {
                self.cursor_row = self.cursor_row.saturating_sub(count(0));
            }
            b'B' => {
                self.cursor_row += count(0);
            }
            b'H' | b'f' => {
                let row = params.first().copied().unwrap_or(1).max(1) - 1;
                let col = params.get(1).copied().unwrap_or(1).max(1) - 1;
                self.cursor_row = row as usize;
                self.cursor_col = col as usize;
                if self.cursor_row == 0 && self.cursor_col == 0 {
                    self.saw_redraw_boundary = true;
                }
            }
            b'K' => {
                let mode = params.first().copied().unwrap_or(0);
                self.erase_to_end_of_line(mode == 2);
            }
            b'J' => {
                self.clear_below();
            }
            _ => {}
        }
    }

    /// Feeds a chunk of raw shell output through the parser. Call
    /// [`LineEditor::take_committed`] and [`LineEditor::redraw_boundary`]
    /// afterward to see what changed.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match self.state {
                ParseState::Ground => match b {
                    0x1B => self.state = ParseState::Escape,
                    b'\r' => self.cursor_col = 0,
                    b'\n' => {
                        self.ensure_row(self.cursor_row);
                        let line = self.rows[self.cursor_row].clone();
                        self.committed.push(line);
                        self.cursor_row += 1;
                        self.cursor_col = 0;
                    }
                    0x08 => self.cursor_col = self.cursor_col.saturating_sub(1),
                    0x20..=0x7E => self.put_char(b as char),
                    _ => {}
                },
                ParseState::Escape => {
                    if b == b'[' {
                        self.state = ParseState::Csi;
                        self.csi_params.clear();
                        self.csi_current = None;
                    } else {
                        self.state = ParseState::Ground;
                    }
                }
                ParseState::Csi => match b {
                    b'0'..=b'9' => {
                        let digit = (b - b'0') as u32;
                        self.csi_current = Some(self.csi_current.unwrap_or(0) * 10 + digit);
                    }
                    b';' => {
                        self.csi_params.push(self.csi_current.take().unwrap_or(0));
                    }
                    0x40..=0x7E => {
                        self.csi_params.push(self.csi_current.take().unwrap_or(0));
                        self.apply_csi(b);
                        self.state = ParseState::Ground;
                    }
                    _ => {}
                },
            }
        }
    }

    /// Drains the lines committed by a bare `LF` since the last call.
    pub fn take_committed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.committed)
    }

    /// True if the cursor returned to the home position since the last
    /// call, the signal RouterOS gives at the start of a fresh table
    /// redraw. Consuming this resets it.
    pub fn take_redraw_boundary(&mut self) -> bool {
        std::mem::take(&mut self.saw_redraw_boundary)
    }

    /// The current screen grid, top to bottom, for parsing a full-frame
    /// table snapshot rather than line-by-line.
    pub fn grid(&self) -> &[String] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_with_crlf_commits_a_line() {
        let mut ed = LineEditor::new(200);
        ed.feed(b"hello world\r\n");
        assert_eq!(ed.take_committed(), vec!["hello world".to_string()]);
    }

    #[test]
    fn cursor_home_sets_redraw_boundary() {
        let mut ed = LineEditor::new(200);
        ed.feed(b"\x1b[H");
        assert!(ed.take_redraw_boundary());
        assert!(!ed.take_redraw_boundary());
    }

    #[test]
    fn erase_to_end_of_line_truncates_current_row() {
        let mut ed = LineEditor::new(200);
        ed.feed(b"abcdef");
        ed.feed(b"\x1b[3D"); // not handled (only A/B), cursor stays; emulate with explicit column via H
        ed.feed(b"\x1b[1;3H");
        ed.feed(b"\x1b[K");
        assert_eq!(ed.grid()[0], "ab");
    }

    #[test]
    fn cursor_addressing_overwrites_in_place() {
        let mut ed = LineEditor::new(200);
        ed.feed(b"AAAA\r\n");
        ed.feed(b"\x1b[1;1H");
        ed.feed(b"BB");
        assert_eq!(ed.grid()[0], "BBAA");
    }

    #[test]
    fn clear_below_blanks_all_following_rows() {
        let mut ed = LineEditor::new(200);
        ed.feed(b"row0\r\nrow1\r\nrow2\r\n");
        ed.feed(b"\x1b[2;1H");
        ed.feed(b"\x1b[J");
        assert_eq!(ed.grid()[2], "");
        assert_eq!(ed.grid()[3], "");
    }
}
