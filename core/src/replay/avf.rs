use super::reader::{ByteReader, lossy, parse_digits};
use super::*;

/// Arbiter `.avf` replays.
///
/// A fixed binary header with the mine list, a text result block, 8-byte event records and a
/// text trailer carrying the player name.
#[derive(Copy, Clone, Debug, Default)]
pub struct AvfDecoder;

impl Decoder for AvfDecoder {
    fn decode(&self, bytes: &[u8], _hint: &str) -> DecodeResult<Replay> {
        if bytes.is_empty() {
            return Err(FormatError::Empty);
        }

        let mut reader = ByteReader::new(bytes);
        reader.skip(5)?;

        let mut header = ReplayHeader::new(ReplayFormat::Avf, "Arbiter");
        header.flags = ReplayFlags::OFFICIAL | ReplayFlags::FAIR;

        let level_code = reader.u8()?;
        let (height, width, mines) = match level_code {
            3 => (8, 8, 10),
            4 => (16, 16, 40),
            5 => (16, 30, 99),
            6 => {
                let width = reader.u8()? as usize + 1;
                let height = reader.u8()? as usize + 1;
                let mines = reader.u16()? as usize;
                (height, width, mines)
            }
            code => return Err(FormatError::InvalidLevel(code)),
        };
        header.level = Level::from_code(level_code).unwrap_or_default();

        let mut mine_coords = Vec::with_capacity(mines);
        for _ in 0..mines {
            let row = reader.u8()?.checked_sub(1);
            let col = reader.u8()?.checked_sub(1);
            match (row, col) {
                (Some(row), Some(col)) => mine_coords.push((row, col)),
                _ => return Err(FormatError::InvalidMinePosition),
            }
        }
        let layout = build_layout(height, width, &mine_coords)?;

        read_result_block(&mut reader, &mut header)?;
        let events = read_events(&mut reader)?;

        match read_player(&mut reader) {
            Ok(player) => header.player = player,
            Err(err) => log::debug!("avf trailer without player name: {err}"),
        }

        Ok(Replay {
            header,
            layout,
            events,
        })
    }
}

/// `[d|start|end|...|B<bbbv>T<time>]`
fn read_result_block(reader: &mut ByteReader, header: &mut ReplayHeader) -> DecodeResult<()> {
    let mut window = [0u8; 3];
    while !(window[0] == b'[' && (b'0'..=b'3').contains(&window[1]) && window[2] == b'|') {
        window = [window[1], window[2], reader.u8()?];
    }

    let start = lossy(reader.until(b'|')?);
    let end = lossy(reader.until(b'|')?);

    // the closing bar of the end stamp may be the one in front of `B`
    let mut prev = b'|';
    loop {
        let byte = reader.u8()?;
        if prev == b'|' && byte == b'B' {
            break;
        }
        prev = byte;
    }

    header.declared_bbbv = Some(parse_digits(reader.until(b'T')?, "bbbv")?);
    let time: f64 = lossy(reader.until(b']')?)
        .replace(',', ".")
        .trim()
        .parse()
        .map_err(|_| FormatError::InvalidField("time"))?;
    header.declared_time = Some(time - 1.0);

    header.start_time = timestamp::arbiter_start(&start);
    header.end_time = timestamp::arbiter_end(&start, &end);
    if header.start_time.is_none() {
        log::debug!("unreadable avf timestamps {start:?} / {end:?}");
    }
    Ok(())
}

fn read_events(reader: &mut ByteReader) -> DecodeResult<Vec<Event>> {
    let mut record = [0u8; 8];
    while record[2] != 1 || record[1] > 1 {
        record[0] = record[1];
        record[1] = record[2];
        record[2] = reader.u8()?;
    }
    record[3..].copy_from_slice(reader.bytes(5)?);

    let mut events = Vec::new();
    loop {
        if let Some(action) = action_of(record[0])? {
            let seconds = u16::from_be_bytes([record[6], record[2]]);
            let time = seconds as f64 - 1.0 + record[4] as f64 / 100.0;
            let x = u16::from_be_bytes([record[1], record[3]]);
            let y = u16::from_be_bytes([record[5], record[7]]);
            events.push(Event::new(time, action, x, y));
        }

        record.copy_from_slice(reader.bytes(8)?);
        if record[2] == 0 && record[6] == 0 {
            break;
        }
    }
    Ok(events)
}

fn action_of(code: u8) -> DecodeResult<Option<Action>> {
    use Action::*;

    let action = match code {
        1 => Move,
        3 => LeftDown,
        5 | 21 => LeftUp,
        9 => RightDown,
        17 | 145 => RightUp,
        33 => MiddleDown,
        65 | 193 => MiddleUp,
        // shift-click, never acted on
        11 => return Ok(None),
        code => return Err(FormatError::InvalidEvent { code }),
    };
    Ok(Some(action))
}

fn read_player(reader: &mut ByteReader) -> DecodeResult<String> {
    reader.seek_past(b"Skin:")?;
    reader.until(b'\r')?;
    Ok(lossy(reader.until(b'\r')?).trim().to_owned())
}
