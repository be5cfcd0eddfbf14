//! The BMS text format (`.bms`, `.bme`, `.bml`).
//!
//! Only the commands that shape the playable chart are modelled: metadata, tempo definitions,
//! stops, section lengths, long note settings and the note channels. Key sounds, images and
//! other presentation commands are accepted and dropped.
//!
//! Positions are kept symbolic (measure and fraction of measure) in [`ObjTime`]; converting them
//! into milliseconds needs the whole tempo map and is left to the chart builder.
//!
//! In detail, our policies are:
//!
//! - `#RANDOM`, `#SETRANDOM`, `#IF`, `#ELSEIF`, `#ELSE`, `#ENDIF` and `#ENDRANDOM` are evaluated
//!   while reading, see [`control_flow`].
//! - Object ids are case-insensitive unless `#BASE 62` is declared.
//! - When the same lane has two objects at the same position, the later line wins.
//! - `#LNTYPE 2` is read as `#LNTYPE 1` with a warning.

pub mod control_flow;
pub mod rng;

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

use thiserror::Error;

use self::{
    control_flow::{ControlFlow, ControlFlowWarning},
    rng::Rng,
};
use super::span::{WithSpan, WithSpanExt, lines_with_span};

/// Tempo used when the file declares none.
pub const DEFAULT_BPM: f64 = 130.0;

/// A two character object id such as `01` or `ZZ`. `00` means "no object".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjId([u8; 2]);

impl ObjId {
    /// Reads an id from two ASCII alphanumeric characters.
    #[must_use]
    pub fn parse(src: &str, case_sensitive: bool) -> Option<Self> {
        let &[a, b] = src.as_bytes() else {
            return None;
        };
        if !a.is_ascii_alphanumeric() || !b.is_ascii_alphanumeric() {
            return None;
        }
        Some(if case_sensitive {
            Self([a, b])
        } else {
            Self([a.to_ascii_uppercase(), b.to_ascii_uppercase()])
        })
    }

    /// Whether this is the `00` placeholder.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0[0] == b'0' && self.0[1] == b'0'
    }

    /// Reads the id as a hexadecimal byte, as the `03` tempo channel does.
    #[must_use]
    pub fn as_hex(self) -> Option<u8> {
        let digits = std::str::from_utf8(&self.0).ok()?;
        u8::from_str_radix(digits, 16).ok()
    }
}

impl std::fmt::Debug for ObjId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjId").field(&self.to_string()).finish()
    }
}

impl std::fmt::Display for ObjId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

/// A position in the score: a measure number and a reduced fraction of that measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjTime {
    /// Measure number, from `000` to `999`.
    pub measure: u32,
    /// Numerator of the position within the measure.
    pub numerator: u32,
    /// Denominator of the position within the measure, never zero.
    pub denominator: u32,
}

impl ObjTime {
    /// Creates a position, reducing the fraction.
    ///
    /// # Panics
    ///
    /// Panics if `denominator` is zero.
    #[must_use]
    pub fn new(measure: u32, numerator: u32, denominator: u32) -> Self {
        assert!(denominator > 0, "denominator must be positive");
        let divisor = gcd(numerator, denominator);
        Self {
            measure,
            numerator: numerator / divisor,
            denominator: denominator / divisor,
        }
    }

    /// Position within the measure in `[0, 1)`.
    #[must_use]
    pub fn fraction(self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    if a == 0 { 1 } else { a }
}

impl PartialOrd for ObjTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.measure.cmp(&other.measure).then_with(|| {
            let lhs = u64::from(self.numerator) * u64::from(other.denominator);
            let rhs = u64::from(other.numerator) * u64::from(self.denominator);
            lhs.cmp(&rhs)
        })
    }
}

/// A side of the player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlayerSide {
    /// The player 1 side, channels `1x` and `5x`.
    #[default]
    Player1,
    /// The player 2 side, channels `2x` and `6x`.
    Player2,
}

/// A key of the beatmania layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BmsKey {
    /// The turntable, channel digit `6`.
    Scratch,
    /// Keys 1 to 5 use channel digits `1` to `5`, keys 6 and 7 use `8` and `9`.
    Key(u8),
}

impl BmsKey {
    fn from_channel_digit(digit: u8) -> Option<Self> {
        Some(match digit {
            b'1'..=b'5' => Self::Key(digit - b'0'),
            b'6' => Self::Scratch,
            b'8' => Self::Key(6),
            b'9' => Self::Key(7),
            _ => return None,
        })
    }
}

/// The channels that matter for the playable chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BmsChannel {
    /// `03`, the id is the new tempo in hexadecimal.
    BpmHex,
    /// `08`, the id refers to `#BPMxx`.
    BpmRef,
    /// `09`, the id refers to `#STOPxx`.
    Stop,
    /// `1x`/`2x` visible notes and `5x`/`6x` long notes.
    Note {
        /// Which side.
        side: PlayerSide,
        /// Which key.
        key: BmsKey,
        /// Whether this is a long note channel.
        long: bool,
    },
}

impl BmsChannel {
    /// Reads a channel. `None` for channels without effect on the playable chart.
    fn parse(src: &[u8; 2]) -> Option<Self> {
        let [kind, digit] = *src;
        let note = |side, long| {
            BmsKey::from_channel_digit(digit).map(|key| Self::Note { side, key, long })
        };
        match kind {
            b'0' => match digit {
                b'3' => Some(Self::BpmHex),
                b'8' => Some(Self::BpmRef),
                b'9' => Some(Self::Stop),
                _ => None,
            },
            b'1' => note(PlayerSide::Player1, false),
            b'2' => note(PlayerSide::Player2, false),
            b'5' => note(PlayerSide::Player1, true),
            b'6' => note(PlayerSide::Player2, true),
            _ => None,
        }
    }
}

/// Long note notation of the `5x`/`6x` channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LnType {
    /// `#LNTYPE 1`: objects alternate between start and end.
    #[default]
    Rdm,
    /// `#LNTYPE 2`: consecutive objects form one long note.
    Mgq,
}

/// Header commands.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BmsHeader {
    /// `#TITLE`.
    pub title: Option<String>,
    /// `#SUBTITLE`.
    pub subtitle: Option<String>,
    /// `#ARTIST`.
    pub artist: Option<String>,
    /// `#SUBARTIST`, often the chart author.
    pub sub_artist: Option<String>,
    /// `#GENRE`.
    pub genre: Option<String>,
    /// `#PLAYER`: 1 single, 2 couple, 3 double.
    pub player: Option<u8>,
    /// `#PLAYLEVEL`.
    pub play_level: Option<u32>,
    /// `#DIFFICULTY`: 1 beginner to 5 insane.
    pub difficulty: Option<u8>,
    /// `#BPM`.
    pub bpm: Option<f64>,
    /// `#PREVIEW`, a preview audio file.
    pub preview: Option<String>,
    /// `#LNOBJ`.
    pub ln_obj: Option<ObjId>,
    /// `#LNTYPE`.
    pub ln_type: LnType,
}

/// A parsed BMS chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bms {
    /// Header commands.
    pub header: BmsHeader,
    /// `#BPMxx` and `#EXBPMxx` definitions.
    pub bpm_defs: HashMap<ObjId, f64>,
    /// `#STOPxx` definitions, in 1/192 of a 4/4 measure.
    pub stop_defs: HashMap<ObjId, f64>,
    /// `02` channel measure length multipliers.
    pub section_lengths: BTreeMap<u32, f64>,
    /// Objects of the relevant channels.
    pub objects: BTreeMap<(ObjTime, BmsChannel), ObjId>,
}

impl Bms {
    /// Tempo at the start of the chart: `#BPM`, else the first tempo change, else [`DEFAULT_BPM`].
    #[must_use]
    pub fn initial_bpm(&self) -> f64 {
        self.header
            .bpm
            .or_else(|| self.bpm_changes().next().map(|(_, bpm)| bpm))
            .unwrap_or(DEFAULT_BPM)
    }

    /// Beat position (quarter notes from the chart start) of `time`.
    #[must_use]
    pub fn beat_of(&self, time: ObjTime) -> f64 {
        let stretched: f64 = self
            .section_lengths
            .range(..time.measure)
            .map(|(_, length)| 4.0 * (length - 1.0))
            .sum();
        let current = self.section_lengths.get(&time.measure).copied().unwrap_or(1.0);
        4.0 * f64::from(time.measure) + stretched + 4.0 * current * time.fraction()
    }

    /// Tempo changes of the `03` and `08` channels in score order.
    pub fn bpm_changes(&self) -> impl Iterator<Item = (ObjTime, f64)> + '_ {
        self.objects
            .iter()
            .filter_map(|(&(time, channel), &id)| match channel {
                BmsChannel::BpmHex => id.as_hex().map(|bpm| (time, f64::from(bpm))),
                BmsChannel::BpmRef => self.bpm_defs.get(&id).map(|&bpm| (time, bpm)),
                _ => None,
            })
            .filter(|(_, bpm)| *bpm > 0.0)
    }

    /// Stops of the `09` channel in score order, as durations in beats.
    pub fn stops(&self) -> impl Iterator<Item = (ObjTime, f64)> + '_ {
        self.objects
            .iter()
            .filter(|((_, channel), _)| *channel == BmsChannel::Stop)
            .filter_map(|(&(time, _), id)| self.stop_defs.get(id).map(|&v| (time, v / 48.0)))
            .filter(|(_, beats)| *beats > 0.0)
    }

    /// Note objects in score order.
    pub fn notes(&self) -> impl Iterator<Item = (ObjTime, PlayerSide, BmsKey, bool, ObjId)> + '_ {
        self.objects
            .iter()
            .filter_map(|(&(time, channel), &id)| match channel {
                BmsChannel::Note { side, key, long } => Some((time, side, key, long, id)),
                _ => None,
            })
    }

    /// Whether this chart uses both sides of the controller.
    #[must_use]
    pub fn is_double_play(&self) -> bool {
        self.header.player == Some(3)
            || self
                .notes()
                .any(|(_, side, ..)| side == PlayerSide::Player2)
    }
}

/// Recoverable problems found while reading. The offending line is skipped.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BmsWarning {
    /// An unrecognised `#COMMAND`.
    #[error("unknown command `#{0}`")]
    UnknownCommand(String),
    /// A known command with an unreadable argument.
    #[error("invalid argument `{value}` for `#{command}`")]
    InvalidValue {
        /// The command name.
        command: String,
        /// The raw argument.
        value: String,
    },
    /// A `#mmmcc:` message that could not be read.
    #[error("invalid message `{0}`")]
    InvalidMessage(String),
    /// `#LNTYPE 2` is read as `#LNTYPE 1`.
    #[error("`#LNTYPE {0}` is not supported, reading long notes as `#LNTYPE 1`")]
    UnsupportedLnType(u8),
    /// A misplaced control flow command.
    #[error(transparent)]
    ControlFlow(#[from] ControlFlowWarning),
}

/// Parsed chart and the warnings found on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct BmsOutput {
    /// The chart.
    pub bms: Bms,
    /// Recoverable problems, in source order.
    pub warnings: Vec<WithSpan<BmsWarning>>,
}

/// Commands read and dropped without warning.
const IGNORED_COMMANDS: &[&str] = &[
    "WAV", "BMP", "RANK", "DEFEXRANK", "EXRANK", "TOTAL", "BANNER", "STAGEFILE", "BACKBMP",
    "VOLWAV", "MAKER", "COMMENT", "PATH_WAV", "MIDIFILE", "VIDEOFILE", "EXWAV", "ARGB", "TEXT",
    "SCROLL", "SPEED", "BGA", "POORBGA", "CHARFILE", "EMAIL", "URL", "OCT/FP", "BASE",
];

/// Parses a BMS chart with the given random source for `#RANDOM` blocks.
///
/// Parsing never fails: unreadable lines become warnings.
///
/// # Example
///
/// ```
/// use rhythm_chart::format::bms::{parse_bms, rng::FixedRng};
///
/// let source = "#TITLE Test Song\n#BPM 120\n#00111:01000001\n";
/// let output = parse_bms(source, FixedRng::new(vec![1]));
/// assert_eq!(output.bms.header.title.as_deref(), Some("Test Song"));
/// assert_eq!(output.bms.notes().count(), 2);
/// ```
pub fn parse_bms(source: &str, rng: impl Rng) -> BmsOutput {
    let case_sensitive = source
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case("#BASE 62"));
    let mut bms = Bms::default();
    let mut warnings = Vec::new();
    let mut flow = ControlFlow::new(rng);

    for (range, raw) in lines_with_span(source) {
        let line = raw.trim();
        let Some(body) = line.strip_prefix('#') else {
            continue;
        };
        if is_message(body) {
            if flow.is_active() {
                if let Err(warning) = read_message(&mut bms, body, case_sensitive) {
                    warnings.push(warning.with_span(range));
                }
            }
            continue;
        }
        let (command, arg) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(command, arg)| (command, arg.trim()));
        let command = command.to_ascii_uppercase();
        if let Some(result) = flow.handle(&command, arg) {
            if let Err(warning) = result {
                warnings.push(BmsWarning::from(warning).with_span(range));
            }
            continue;
        }
        if !flow.is_active() {
            continue;
        }
        if let Err(warning) = read_header(&mut bms, &command, arg, case_sensitive) {
            warnings.push(warning.with_span(range));
        }
    }

    if let Some(warning) = flow.finish() {
        let end = source.len();
        warnings.push(BmsWarning::from(warning).with_span(end..end));
    }
    BmsOutput { bms, warnings }
}

/// `mmmcc:` with a three digit measure and a two character channel.
fn is_message(body: &str) -> bool {
    let bytes = body.as_bytes();
    bytes.len() >= 6
        && bytes.get(..3).is_some_and(|m| m.iter().all(u8::is_ascii_digit))
        && bytes.get(3..5).is_some_and(|c| c.iter().all(u8::is_ascii_alphanumeric))
        && bytes.get(5) == Some(&b':')
}

fn read_message(bms: &mut Bms, body: &str, case_sensitive: bool) -> Result<(), BmsWarning> {
    let invalid = || BmsWarning::InvalidMessage(body.to_owned());
    let measure: u32 = body.get(..3).and_then(|m| m.parse().ok()).ok_or_else(invalid)?;
    let &[kind, digit] = body.as_bytes().get(3..5).ok_or_else(invalid)? else {
        return Err(invalid());
    };
    let channel = [kind.to_ascii_uppercase(), digit.to_ascii_uppercase()];
    let data = body.get(6..).ok_or_else(invalid)?.trim();

    if channel == *b"02" {
        let length: f64 = data.parse().map_err(|_| invalid())?;
        if !(length.is_finite() && length > 0.0) {
            return Err(invalid());
        }
        bms.section_lengths.insert(measure, length);
        return Ok(());
    }
    let Some(channel) = BmsChannel::parse(&channel) else {
        return Ok(());
    };
    let data: Vec<char> = data.chars().filter(|c| !c.is_whitespace()).collect();
    if data.len() % 2 != 0 || data.is_empty() {
        return Err(invalid());
    }
    let count = (data.len() / 2) as u32;
    for (index, pair) in data.chunks_exact(2).enumerate() {
        let pair: String = pair.iter().collect();
        let id = ObjId::parse(&pair, case_sensitive).ok_or_else(invalid)?;
        if id.is_null() {
            continue;
        }
        let time = ObjTime::new(measure, index as u32, count);
        bms.objects.insert((time, channel), id);
    }
    Ok(())
}

fn read_header(
    bms: &mut Bms,
    command: &str,
    arg: &str,
    case_sensitive: bool,
) -> Result<(), BmsWarning> {
    let invalid = || BmsWarning::InvalidValue {
        command: command.to_owned(),
        value: arg.to_owned(),
    };
    let text = || Some(arg.to_owned());
    let header = &mut bms.header;
    match command {
        "TITLE" => header.title = text(),
        "SUBTITLE" => header.subtitle = text(),
        "ARTIST" => header.artist = text(),
        "SUBARTIST" => header.sub_artist = text(),
        "GENRE" => header.genre = text(),
        "PREVIEW" => header.preview = text(),
        "PLAYER" => header.player = Some(arg.parse().map_err(|_| invalid())?),
        "PLAYLEVEL" => header.play_level = Some(arg.parse().map_err(|_| invalid())?),
        "DIFFICULTY" => header.difficulty = Some(arg.parse().map_err(|_| invalid())?),
        "BPM" => header.bpm = Some(parse_positive(arg).ok_or_else(invalid)?),
        "LNOBJ" => header.ln_obj = Some(ObjId::parse(arg, case_sensitive).ok_or_else(invalid)?),
        "LNTYPE" => match arg {
            "1" => header.ln_type = LnType::Rdm,
            "2" => {
                header.ln_type = LnType::Mgq;
                return Err(BmsWarning::UnsupportedLnType(2));
            }
            _ => return Err(invalid()),
        },
        _ => {
            if let Some((id, value)) = indexed(command, &["EXBPM", "BPM"], arg, case_sensitive) {
                let bpm = parse_positive(value).ok_or_else(invalid)?;
                bms.bpm_defs.insert(id, bpm);
            } else if let Some((id, value)) = indexed(command, &["STOP"], arg, case_sensitive) {
                let stop = value
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(invalid)?;
                bms.stop_defs.insert(id, stop);
            } else if !IGNORED_COMMANDS
                .iter()
                .any(|ignored| command.starts_with(ignored))
            {
                return Err(BmsWarning::UnknownCommand(command.to_owned()));
            }
        }
    }
    Ok(())
}

/// Splits `#BPMxx value` style commands into the id and the argument.
fn indexed<'a>(
    command: &str,
    prefixes: &[&str],
    arg: &'a str,
    case_sensitive: bool,
) -> Option<(ObjId, &'a str)> {
    prefixes.iter().find_map(|prefix| {
        let id = command.strip_prefix(prefix)?;
        Some((ObjId::parse(id, case_sensitive)?, arg))
    })
}

fn parse_positive(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
