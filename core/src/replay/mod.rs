use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::*;
pub use avf::*;
pub use engine::*;
pub use evf::*;
pub use evfs::*;
pub use mvf::*;
pub use rmv::*;

mod avf;
mod engine;
mod evf;
mod evfs;
mod mvf;
mod reader;
mod rmv;
mod timestamp;

pub type DecodeResult<T> = core::result::Result<T, FormatError>;

/// Recorder-side game state changes, logged alongside the mouse trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMarker {
    Replay,
    Win,
    Fail,
    Error,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Move,
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    MiddleDown,
    MiddleUp,
    /// Both buttons went down, with no record of which came first.
    DoubleClick,
    /// Flag placed before the first click.
    PreFlag,
    Marker(GameMarker),
}

impl Action {
    /// Short name used by the historical click-accounting tables.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Move => "mv",
            Self::LeftDown => "lc",
            Self::LeftUp => "lr",
            Self::RightDown => "rc",
            Self::RightUp => "rr",
            Self::MiddleDown => "mc",
            Self::MiddleUp => "mr",
            Self::DoubleClick => "cc",
            Self::PreFlag => "pf",
            Self::Marker(_) => "gs",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the recorder started.
    pub time: f64,
    pub action: Action,
    pub x: Pixel,
    pub y: Pixel,
    /// Cursor positions passed through since the previous event, when the format keeps them.
    pub path: Option<Vec<(Pixel, Pixel)>>,
    pub comment: Option<String>,
}

impl Event {
    pub fn new(time: f64, action: Action, x: Pixel, y: Pixel) -> Self {
        Self {
            time,
            action,
            x,
            y,
            path: None,
            comment: None,
        }
    }

    /// Cell under the cursor, `None` outside the board.
    pub fn cell(&self, cell_size: u8, size: Coord2) -> Option<Coord2> {
        if cell_size == 0 {
            return None;
        }
        let row = self.y / cell_size as Pixel;
        let col = self.x / cell_size as Pixel;
        if row < size.0 as Pixel && col < size.1 as Pixel {
            Some((row as Coord, col as Coord))
        } else {
            None
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Beginner,
    Intermediate,
    Expert,
    #[default]
    Custom,
}

impl Level {
    pub const fn code(self) -> u8 {
        match self {
            Self::Beginner => 3,
            Self::Intermediate => 4,
            Self::Expert => 5,
            Self::Custom => 6,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(Self::Beginner),
            4 => Some(Self::Intermediate),
            5 => Some(Self::Expert),
            6 => Some(Self::Custom),
            _ => None,
        }
    }

    /// Standard level of a board shape, `Custom` for anything else.
    pub fn from_config(config: GameConfig) -> Self {
        if config == GameConfig::BEGINNER {
            Self::Beginner
        } else if config == GameConfig::INTERMEDIATE {
            Self::Intermediate
        } else if config == GameConfig::EXPERT {
            Self::Expert
        } else {
            Self::Custom
        }
    }
}

bitflags! {
    /// Header flags, first flag byte in the high half.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ReplayFlags: u16 {
        const COMPLETED    = 0x80 << 8;
        const OFFICIAL     = 0x40 << 8;
        const FAIR         = 0x20 << 8;
        const NO_FLAG      = 0x10 << 8;
        const TRANSLATED   = 0x08 << 8;
        const QUESTION     = 0x80;
        const CURSOR_LIMIT = 0x40;
        const AUTO_REPLAY  = 0x20;
    }
}

impl ReplayFlags {
    pub fn from_bytes(first: u8, second: u8) -> Self {
        Self::from_bits_truncate(u16::from_be_bytes([first, second]))
    }
}

bitflags! {
    /// Buttons held down, for formats that store button state instead of transitions.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub(crate) struct MouseButtons: u8 {
        const LEFT   = 1;
        const RIGHT  = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

impl MouseButtons {
    /// Actions that turn `self` into `next`: presses before releases, left, right, then middle.
    pub(crate) fn transitions(self, next: Self) -> impl Iterator<Item = Action> {
        let pressed = next.difference(self);
        let released = self.difference(next);
        [
            (pressed, Self::LEFT, Action::LeftDown),
            (pressed, Self::RIGHT, Action::RightDown),
            (pressed, Self::MIDDLE, Action::MiddleDown),
            (released, Self::LEFT, Action::LeftUp),
            (released, Self::RIGHT, Action::RightUp),
            (released, Self::MIDDLE, Action::MiddleUp),
        ]
        .into_iter()
        .filter(|(set, button, _)| set.contains(*button))
        .map(|(_, _, action)| action)
    }

    /// Tracks the button an explicit press or release refers to.
    pub(crate) fn apply(&mut self, action: Action) {
        match action {
            Action::LeftDown => self.insert(Self::LEFT),
            Action::LeftUp => self.remove(Self::LEFT),
            Action::RightDown => self.insert(Self::RIGHT),
            Action::RightUp => self.remove(Self::RIGHT),
            Action::MiddleDown => self.insert(Self::MIDDLE),
            Action::MiddleUp => self.remove(Self::MIDDLE),
            Action::DoubleClick => self.insert(Self::LEFT | Self::RIGHT),
            _ => {}
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayFormat {
    Avf,
    Rmv,
    Mvf,
    Evf,
}

impl ReplayFormat {
    pub const ALL: [Self; 4] = [Self::Avf, Self::Rmv, Self::Mvf, Self::Evf];

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Avf => "avf",
            Self::Rmv => "rmv",
            Self::Mvf => "mvf",
            Self::Evf => "evf",
        }
    }

    /// Format named by the extension of `name`, case-insensitive.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(extension))
    }

    pub fn decoder(self) -> &'static dyn Decoder {
        match self {
            Self::Avf => &AvfDecoder,
            Self::Rmv => &RmvDecoder,
            Self::Mvf => &MvfDecoder,
            Self::Evf => &EvfDecoder,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayHeader {
    pub format: ReplayFormat,
    pub software: String,
    pub translated_software: String,
    pub original_encoding: String,
    pub player: String,
    pub race: String,
    pub uniqueness: String,
    pub country: String,
    pub device_uuid: Vec<u8>,
    pub level: Level,
    pub mode: u16,
    pub cell_pixel_size: u8,
    pub declared_bbbv: Option<usize>,
    /// Seconds, as the recorder reported them.
    pub declared_time: Option<f64>,
    /// Epoch microseconds.
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub flags: ReplayFlags,
    pub custom_index: Vec<String>,
    pub checksum: Vec<u8>,
}

impl ReplayHeader {
    pub fn new(format: ReplayFormat, software: impl Into<String>) -> Self {
        Self {
            format,
            software: software.into(),
            translated_software: String::new(),
            original_encoding: String::new(),
            player: String::new(),
            race: String::new(),
            uniqueness: String::new(),
            country: String::new(),
            device_uuid: Vec::new(),
            level: Level::Custom,
            mode: 0,
            cell_pixel_size: 16,
            declared_bbbv: None,
            declared_time: None,
            start_time: None,
            end_time: None,
            flags: ReplayFlags::empty(),
            custom_index: Vec::new(),
            checksum: Vec::new(),
        }
    }
}

/// A decoded replay: header, ground truth and the ordered event list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub header: ReplayHeader,
    pub layout: MineLayout,
    pub events: Vec<Event>,
}

impl Replay {
    pub fn game_config(&self) -> GameConfig {
        self.layout.game_config()
    }

    /// Time of the last event, `0` for an empty trace.
    pub fn last_event_time(&self) -> f64 {
        self.events.last().map_or(0.0, |event| event.time)
    }
}

/// One binary replay format.
pub trait Decoder {
    /// Decodes `bytes`; `hint` is the file name the bytes came from.
    fn decode(&self, bytes: &[u8], hint: &str) -> DecodeResult<Replay>;
}

pub fn decode(format: ReplayFormat, bytes: &[u8], hint: &str) -> DecodeResult<Replay> {
    format.decoder().decode(bytes, hint)
}

/// Decodes `bytes` with the format named by the extension of `hint`.
pub fn decode_file(bytes: &[u8], hint: &str) -> DecodeResult<Replay> {
    let format = ReplayFormat::from_file_name(hint).ok_or(FormatError::UnknownFormat)?;
    decode(format, bytes, hint)
}

/// Builds a layout from decoded dimensions and mine cells.
pub(crate) fn build_layout(
    height: usize,
    width: usize,
    mines: &[Coord2],
) -> DecodeResult<MineLayout> {
    if height == 0 || width == 0 || height > Coord::MAX as usize || width > Coord::MAX as usize {
        return Err(FormatError::InvalidBoardSize);
    }
    MineLayout::from_mine_coords((height as Coord, width as Coord), mines).map_err(|err| match err {
        GameError::InvalidCoords => FormatError::InvalidMinePosition,
        _ => FormatError::InvalidBoardSize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_file_name() {
        assert_eq!(
            ReplayFormat::from_file_name("HI-SCORE Exp_49.25_3BV=127.avf"),
            Some(ReplayFormat::Avf)
        );
        assert_eq!(
            ReplayFormat::from_file_name("game.EVF"),
            Some(ReplayFormat::Evf)
        );
        assert_eq!(ReplayFormat::from_file_name("notes.txt"), None);
        assert_eq!(ReplayFormat::from_file_name("rmv"), None);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert_eq!(
            decode_file(&[1, 2, 3], "replay.bin"),
            Err(FormatError::UnknownFormat)
        );
    }

    #[test]
    fn event_cell_maps_pixels() {
        let event = Event::new(0.0, Action::LeftDown, 40, 17);
        assert_eq!(event.cell(16, (8, 8)), Some((1, 2)));
        assert_eq!(event.cell(16, (1, 8)), None);
        assert_eq!(Event::new(0.0, Action::Move, 128, 0).cell(16, (8, 8)), None);
    }

    #[test]
    fn flag_bytes_keep_their_halves() {
        let flags = ReplayFlags::from_bytes(0x80 | 0x10, 0x20);
        assert!(flags.contains(ReplayFlags::COMPLETED | ReplayFlags::NO_FLAG));
        assert!(flags.contains(ReplayFlags::AUTO_REPLAY));
        assert!(!flags.contains(ReplayFlags::QUESTION));
    }

    #[test]
    fn button_transitions_press_before_release() {
        let held = MouseButtons::LEFT | MouseButtons::MIDDLE;
        let next = MouseButtons::RIGHT | MouseButtons::MIDDLE;
        let actions: Vec<_> = held.transitions(next).collect();
        assert_eq!(actions, vec![Action::RightDown, Action::LeftUp]);
        assert_eq!(next.transitions(next).count(), 0);
    }

    #[test]
    fn level_from_standard_configs() {
        assert_eq!(Level::from_config(GameConfig::EXPERT), Level::Expert);
        assert_eq!(
            Level::from_config(GameConfig::new_unchecked((8, 8), 11)),
            Level::Custom
        );
        assert_eq!(Level::from_code(Level::Intermediate.code()), Some(Level::Intermediate));
    }

    #[test]
    fn layout_errors_become_format_errors() {
        assert_eq!(build_layout(0, 8, &[]), Err(FormatError::InvalidBoardSize));
        assert_eq!(build_layout(2, 2, &[(2, 0)]), Err(FormatError::InvalidMinePosition));
        assert_eq!(build_layout(2, 2, &[(1, 1)]).unwrap().mine_count(), 1);
    }
}
