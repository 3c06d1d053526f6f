use super::reader::{ByteReader, lossy};
use super::*;

const LATEST_VERSION: u8 = 4;
const CHECKSUM_LEN: usize = 32;

/// Metasweeper `.evf` replays, versions 0 to 4.
///
/// Versions up to 3 store absolute event records. Version 4 stores the first mouse position
/// absolutely and every later one as a delta, with pauses folded into the next event's time.
#[derive(Copy, Clone, Debug, Default)]
pub struct EvfDecoder;

impl Decoder for EvfDecoder {
    fn decode(&self, bytes: &[u8], _hint: &str) -> DecodeResult<Replay> {
        let mut reader = ByteReader::new(bytes);
        let version = reader.u8().map_err(|_| FormatError::Empty)?;
        match version {
            0..=3 => decode_legacy(&mut reader, version),
            LATEST_VERSION => decode_v4(&mut reader),
            version => Err(FormatError::UnsupportedVersion(version)),
        }
    }
}

struct Shape {
    height: u8,
    width: u8,
    mines: u16,
    time_ms: u32,
}

fn read_shape(
    reader: &mut ByteReader,
    header: &mut ReplayHeader,
    wide_time: bool,
) -> DecodeResult<Shape> {
    let height = reader.u8()?;
    let width = reader.u8()?;
    let mines = reader.u16()?;
    header.level = Level::from_config(GameConfig::new_unchecked((height, width), mines));
    header.cell_pixel_size = reader.u8()?;
    header.mode = reader.u16()?;
    header.declared_bbbv = Some(reader.u16()? as usize);
    let time_ms = if wide_time {
        reader.u32()?
    } else {
        reader.u24()?
    };
    header.declared_time = Some(time_ms as f64 / 1000.0);
    Ok(Shape {
        height,
        width,
        mines,
        time_ms,
    })
}

/// One bit per cell, row-major, most significant bit first.
fn read_mine_bitmap(reader: &mut ByteReader, shape: &Shape) -> DecodeResult<MineLayout> {
    let size = (shape.height, shape.width);
    let cells = shape.height as usize * shape.width as usize;
    let bitmap = reader.bytes(cells.div_ceil(8))?;

    let mines: Vec<_> = iter_coords(size)
        .enumerate()
        .filter(|&(i, _)| bitmap[i / 8] & (0x80 >> (i % 8)) != 0)
        .map(|(_, coords)| coords)
        .collect();
    if mines.len() != shape.mines as usize {
        log::debug!(
            "evf mine bitmap holds {} mines, header says {}",
            mines.len(),
            shape.mines
        );
    }
    build_layout(shape.height as usize, shape.width as usize, &mines)
}

fn mouse_action(code: u8, held: &mut MouseButtons, toggles: bool) -> DecodeResult<Action> {
    use Action::*;

    let action = match code {
        1 => Move,
        2 => LeftDown,
        3 => LeftUp,
        4 => RightDown,
        5 => RightUp,
        6 => MiddleDown,
        7 => MiddleUp,
        8 => PreFlag,
        9 => DoubleClick,
        10..=12 if toggles => {
            let (button, down, up) = match code {
                10 => (MouseButtons::LEFT, LeftDown, LeftUp),
                11 => (MouseButtons::RIGHT, RightDown, RightUp),
                _ => (MouseButtons::MIDDLE, MiddleDown, MiddleUp),
            };
            if held.contains(button) { up } else { down }
        }
        code => return Err(FormatError::InvalidEvent { code }),
    };
    held.apply(action);
    Ok(action)
}

fn decode_legacy(reader: &mut ByteReader, version: u8) -> DecodeResult<Replay> {
    let first = reader.u8()?;
    let second = if version >= 3 { reader.u8()? } else { 0 };
    let mut header = ReplayHeader::new(ReplayFormat::Evf, "");
    header.flags = ReplayFlags::from_bytes(first, second) - ReplayFlags::TRANSLATED;

    let shape = read_shape(reader, &mut header, false)?;

    header.software = reader.c_string()?;
    if !header.software.starts_with('元') {
        header.flags |= ReplayFlags::TRANSLATED;
    }
    header.player = reader.c_string()?;
    header.race = reader.c_string()?;
    header.uniqueness = reader.c_string()?;
    let start = reader.c_string()?;
    let end = reader.c_string()?;
    read_legacy_timestamps(&mut header, &start, &end, shape.time_ms);
    header.country = reader.c_string()?;
    if version >= 2 {
        header.device_uuid = reader.until(0)?.to_vec();
    }

    let layout = read_mine_bitmap(reader, &shape)?;

    let mut held = MouseButtons::empty();
    let mut events = Vec::new();
    let has_checksum = loop {
        let code = reader.u8()?;
        let action = match code {
            0 => break true,
            255 => break false,
            code => mouse_action(code, &mut held, version >= 3)?,
        };
        let time = reader.u24()? as f64 / 1000.0;
        let x = reader.u16()?;
        let y = reader.u16()?;
        events.push(Event::new(time, action, x, y));
    };
    if has_checksum {
        header.checksum = reader.bytes(CHECKSUM_LEN)?.to_vec();
    }

    Ok(Replay {
        header,
        layout,
        events,
    })
}

/// Start and end stamps are text whose meaning depends on the recording software.
fn read_legacy_timestamps(header: &mut ReplayHeader, start: &str, end: &str, time_ms: u32) {
    let (start_time, end_time) = match header.software.as_str() {
        "Arbiter" => (
            timestamp::arbiter_start(start),
            timestamp::arbiter_end(start, end),
        ),
        "Viennasweeper" => {
            let start_time = start
                .parse::<u64>()
                .ok()
                .and_then(|seconds| seconds.checked_mul(1_000_000));
            (start_time, start_time.map(|micros| micros + time_ms as u64 * 1000))
        }
        software if software.starts_with('元') => (start.parse().ok(), end.parse().ok()),
        _ => (None, None),
    };
    header.start_time = start_time;
    header.end_time = end_time;
}

fn decode_v4(reader: &mut ByteReader) -> DecodeResult<Replay> {
    let first = reader.u8()?;
    let second = reader.u8()?;
    let mut header = ReplayHeader::new(ReplayFormat::Evf, "");
    header.flags = ReplayFlags::from_bytes(first, second);

    let shape = read_shape(reader, &mut header, true)?;
    header.country = lossy(reader.bytes(2)?);
    header.start_time = Some(reader.u64()?);
    header.end_time = Some(reader.u64()?);
    header.software = reader.c_string()?;
    if header.flags.contains(ReplayFlags::TRANSLATED) {
        header.translated_software = reader.c_string()?;
        header.original_encoding = reader.c_string()?;
    }
    header.player = reader.c_string()?;
    header.race = reader.c_string()?;
    header.uniqueness = reader.c_string()?;
    let uuid_len = reader.u16()? as usize;
    header.device_uuid = reader.bytes(uuid_len)?.to_vec();

    let layout = read_mine_bitmap(reader, &shape)?;

    let custom_count = reader.u16()?;
    for _ in 0..custom_count {
        header.custom_index.push(reader.c_string()?);
    }

    let events = read_v4_events(reader)?;

    let checksum_len = reader.u16()? as usize;
    header.checksum = reader.bytes(checksum_len)?.to_vec();

    Ok(Replay {
        header,
        layout,
        events,
    })
}

fn read_v4_events(reader: &mut ByteReader) -> DecodeResult<Vec<Event>> {
    let mut held = MouseButtons::empty();

    let action = match reader.u8()? {
        code @ (1 | 2 | 4 | 8) => mouse_action(code, &mut held, true)?,
        code => return Err(FormatError::InvalidEvent { code }),
    };
    let mut last_ms = reader.u8()? as u32;
    let mut last_x = reader.u16()?;
    let mut last_y = reader.u16()?;
    let mut events = vec![Event::new(
        last_ms as f64 / 1000.0,
        action,
        last_x,
        last_y,
    )];
    let mut pause_ms = 0u32;

    loop {
        let code = reader.u8()?;
        let action = match code {
            0 => break,
            1..=80 => mouse_action(code, &mut held, true)?,
            81 => Action::Marker(GameMarker::Replay),
            82 => Action::Marker(GameMarker::Win),
            83 => Action::Marker(GameMarker::Fail),
            99 => Action::Marker(GameMarker::Error),
            84..=98 => return Err(FormatError::InvalidEvent { code }),
            100..=254 => continue,
            255 => {
                pause_ms += reader.u16()? as u32;
                continue;
            }
        };

        last_ms += reader.u8()? as u32 + pause_ms;
        pause_ms = 0;
        if !matches!(action, Action::Marker(_)) {
            last_x = last_x.wrapping_add_signed(reader.i16()?);
            last_y = last_y.wrapping_add_signed(reader.i16()?);
        }
        events.push(Event::new(last_ms as f64 / 1000.0, action, last_x, last_y));
    }
    Ok(events)
}
