//! Cheap partial read of an osu! beatmap, enough to classify it.
//!
//! Only `[General] Mode` and `[Difficulty] CircleSize` are read, with the same value parsers as
//! [`parse_osu`](super::parse_osu), and reading stops at the first timing or hit object section
//! after `[Difficulty]`.

use std::io::{self, BufRead};

use super::{
    OsuMode, Section, key_count_from_circle_size, parse_circle_size, parse_mode, split_key_value,
};

/// Mode and column count declared by a beatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsuProbe {
    /// `[General] Mode`, standard if absent.
    pub mode: OsuMode,
    /// Rounded `[Difficulty] CircleSize`, 5 if absent.
    pub key_count: u32,
}

/// Reads the mode and column count from the start of a beatmap.
///
/// # Errors
///
/// Returns the underlying I/O error if the reader fails.
pub fn probe_osu(mut reader: impl BufRead) -> io::Result<OsuProbe> {
    let mut mode = OsuMode::default();
    let mut circle_size = super::Difficulty::default().circle_size;
    let mut section = None;
    let mut difficulty_seen = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if let Some(header) = Section::from_header(line) {
            let next = header.unwrap_or(Section::Unknown);
            if difficulty_seen && matches!(next, Section::TimingPoints | Section::HitObjects) {
                break;
            }
            difficulty_seen |= next == Section::Difficulty;
            section = Some(next);
            continue;
        }
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        match (section, key) {
            (Some(Section::General), "Mode") => {
                if let Some(parsed) = parse_mode(value) {
                    mode = parsed;
                }
            }
            (Some(Section::Difficulty), "CircleSize") => {
                if let Some(parsed) = parse_circle_size(value) {
                    circle_size = parsed;
                }
            }
            _ => {}
        }
    }

    Ok(OsuProbe {
        mode,
        key_count: key_count_from_circle_size(circle_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_mode_and_key_count() {
        let src = b"osu file format v14\r\n[General]\r\nMode: 3\r\n[Difficulty]\r\nCircleSize:6.4\r\n[HitObjects]\r\n";
        let probe = probe_osu(&src[..]).unwrap();
        assert_eq!(
            probe,
            OsuProbe {
                mode: OsuMode::Mania,
                key_count: 6
            }
        );
    }

    #[test]
    fn defaults_when_absent() {
        let probe = probe_osu(&b"osu file format v14\n"[..]).unwrap();
        assert_eq!(probe.mode, OsuMode::Standard);
        assert_eq!(probe.key_count, 5);
    }
}
