use super::reader::{ByteReader, lossy, parse_digits};
use super::*;

const CELL_SIZE: u16 = 16;

/// Viennasweeper `.rmv` replays.
#[derive(Copy, Clone, Debug, Default)]
pub struct RmvDecoder;

impl Decoder for RmvDecoder {
    fn decode(&self, bytes: &[u8], _hint: &str) -> DecodeResult<Replay> {
        if bytes.is_empty() {
            return Err(FormatError::Empty);
        }

        let mut reader = ByteReader::new(bytes);
        let magic = reader.bytes(4).map_err(|_| FormatError::BadMagic)?;
        if magic != b"*rmv" || reader.u16().map_err(|_| FormatError::BadMagic)? != 1 {
            return Err(FormatError::BadMagic);
        }

        let mut header = ReplayHeader::new(ReplayFormat::Rmv, "Viennasweeper");
        header.flags = ReplayFlags::OFFICIAL | ReplayFlags::FAIR;

        reader.skip(4)?;
        let result_size = reader.u16()? as usize;
        let version_size = reader.u16()? as usize;
        reader.skip(4)?;
        let preflags_size = reader.u16()?;
        let properties_size = reader.u16()? as usize;
        reader.skip(7)?;

        if result_size > 35 {
            reader.skip(result_size - 32)?;
            // up to three digits, padded with spaces
            let digits: Vec<u8> = reader
                .bytes(3)?
                .iter()
                .copied()
                .filter(u8::is_ascii_digit)
                .collect();
            header.declared_bbbv = Some(parse_digits(&digits, "bbbv")?);
            reader.skip(16)?;
            let stamp = lossy(reader.bytes(10)?);
            header.start_time = stamp
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|seconds| seconds.checked_mul(1_000_000));
        } else {
            let rest = result_size
                .checked_sub(3)
                .ok_or(FormatError::InvalidField("result size"))?;
            reader.skip(rest)?;
        }
        reader.skip(version_size + 2)?;

        let player_fields = reader.u16()?;
        if player_fields > 0 {
            header.player = reader.short_string()?;
        }
        if player_fields > 1 {
            // nickname
            reader.short_string()?;
        }
        if player_fields > 2 {
            header.country = reader.short_string()?;
        }
        if player_fields > 3 {
            // token
            reader.short_string()?;
        }

        reader.skip(4)?;
        let width = reader.u8()?;
        let height = reader.u8()?;
        let mines = reader.u16()?;

        let mut mine_coords = Vec::with_capacity(mines as usize);
        for _ in 0..mines {
            let col = reader.u8()?;
            let row = reader.u8()?;
            if col >= width || row >= height {
                return Err(FormatError::InvalidMinePosition);
            }
            mine_coords.push((row, col));
        }
        let layout = build_layout(height as usize, width as usize, &mine_coords)?;

        let mut events = Vec::new();
        if preflags_size > 0 {
            let count = reader.u16()?;
            for _ in 0..count {
                let row = reader.u8()? as Pixel;
                let col = reader.u8()? as Pixel;
                events.push(Event::new(0.0, Action::PreFlag, col * CELL_SIZE, row * CELL_SIZE));
            }
        }

        reader.skip(1)?;
        if reader.u8()? == 1 {
            header.flags |= ReplayFlags::NO_FLAG;
        }
        header.mode = reader.u8()? as u16;
        let level_code = reader.u8()?.saturating_add(3);
        header.level = Level::from_code(level_code).unwrap_or_default();
        let properties_rest = properties_size
            .checked_sub(4)
            .ok_or(FormatError::InvalidField("properties size"))?;
        reader.skip(properties_rest)?;

        read_events(&mut reader, (width as Pixel, height as Pixel), &mut events)?;
        header.declared_time = events.last().map(|event| event.time);

        Ok(Replay {
            header,
            layout,
            events,
        })
    }
}

fn read_events(
    reader: &mut ByteReader,
    (width, height): (Pixel, Pixel),
    events: &mut Vec<Event>,
) -> DecodeResult<()> {
    let outside = (width * CELL_SIZE, height * CELL_SIZE);
    let mut first = true;

    loop {
        match reader.u8()? {
            0 => reader.skip(4)?,
            code @ 1..=7 => {
                let time = (reader.u32()? >> 8) as f64 / 1000.0;
                let mut x = reader.u16()?.wrapping_sub(12);
                let mut y = reader.u16()?.wrapping_sub(56);
                if x >= outside.0 || y >= outside.1 {
                    (x, y) = outside;
                }

                // the press that starts the game is not recorded
                if first {
                    first = false;
                    events.push(Event::new(time, Action::LeftDown, x, y));
                }

                let action = match code {
                    1 => Action::Move,
                    2 => Action::LeftDown,
                    3 => Action::LeftUp,
                    4 => Action::RightDown,
                    5 => Action::RightUp,
                    6 => Action::MiddleDown,
                    _ => Action::MiddleUp,
                };
                events.push(Event::new(time, action, x, y));
            }
            8 => return Err(FormatError::InvalidField("event")),
            9..=14 | 18..=27 => reader.skip(2)?,
            15..=17 => return Ok(()),
            _ => return Err(FormatError::InvalidField("event")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        result: Vec<u8>,
        preflags: Vec<(u8, u8)>,
        players: Vec<&'static str>,
        size: (u8, u8),
        mines: Vec<(u8, u8)>,
        events: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut result = vec![b'#'; 11];
            result.extend_from_slice(b" 12");
            result.extend_from_slice(&[b'.'; 16]);
            result.extend_from_slice(b"1666124135");
            Self {
                result,
                preflags: Vec::new(),
                players: vec!["Tester", "nick", "AT"],
                size: (8, 8),
                mines: vec![(0, 0), (7, 7), (3, 2)],
                events: Vec::new(),
            }
        }

        fn event(mut self, code: u8, ms: u32, x: u16, y: u16) -> Self {
            self.events.push(code);
            self.events.extend_from_slice(&(ms << 8).to_be_bytes());
            self.events.extend_from_slice(&(x + 12).to_be_bytes());
            self.events.extend_from_slice(&(y + 56).to_be_bytes());
            self
        }

        fn bytes(&self) -> Vec<u8> {
            let properties = [0u8, 1, 0, 1, 9, 9];
            let mut bytes = b"*rmv".to_vec();
            bytes.extend_from_slice(&1u16.to_be_bytes());
            bytes.extend_from_slice(&[0; 4]);
            bytes.extend_from_slice(&(self.result.len() as u16).to_be_bytes());
            bytes.extend_from_slice(&3u16.to_be_bytes());
            bytes.extend_from_slice(&[0; 4]);
            let preflags_size = if self.preflags.is_empty() { 0u16 } else { 1 };
            bytes.extend_from_slice(&preflags_size.to_be_bytes());
            bytes.extend_from_slice(&(properties.len() as u16).to_be_bytes());
            bytes.extend_from_slice(&[0; 7]);

            // the result string starts 3 bytes before the header ends
            bytes.truncate(bytes.len() - 3);
            bytes.extend_from_slice(&self.result);
            bytes.extend_from_slice(&[b'v'; 3 + 2]);

            bytes.extend_from_slice(&(self.players.len() as u16).to_be_bytes());
            for player in &self.players {
                bytes.push(player.len() as u8);
                bytes.extend_from_slice(player.as_bytes());
            }

            bytes.extend_from_slice(&[0; 4]);
            bytes.extend_from_slice(&[self.size.0, self.size.1]);
            bytes.extend_from_slice(&(self.mines.len() as u16).to_be_bytes());
            for &(col, row) in &self.mines {
                bytes.extend_from_slice(&[col, row]);
            }
            if !self.preflags.is_empty() {
                bytes.extend_from_slice(&(self.preflags.len() as u16).to_be_bytes());
                for &(row, col) in &self.preflags {
                    bytes.extend_from_slice(&[row, col]);
                }
            }

            bytes.extend_from_slice(&properties);
            bytes.extend_from_slice(&self.events);
            bytes.push(15);
            bytes.extend_from_slice(&[0xAB; 6]);
            bytes
        }
    }

    #[test]
    fn decodes_header_and_board() {
        let bytes = Fixture::new().event(1, 100, 20, 20).bytes();
        let replay = RmvDecoder.decode(&bytes, "a.rmv").unwrap();

        assert_eq!(replay.game_config(), GameConfig::new_unchecked((8, 8), 3));
        assert!(replay.layout.contains_mine((2, 3)));
        assert_eq!(replay.header.declared_bbbv, Some(12));
        assert_eq!(replay.header.start_time, Some(1_666_124_135_000_000));
        assert_eq!(replay.header.player, "Tester");
        assert_eq!(replay.header.country, "AT");
        assert_eq!(replay.header.level, Level::Intermediate);
        assert!(replay.header.flags.contains(ReplayFlags::NO_FLAG));
        assert_eq!(replay.header.software, "Viennasweeper");
    }

    #[test]
    fn first_event_gets_a_synthetic_press() {
        let bytes = Fixture::new()
            .event(1, 100, 20, 30)
            .event(3, 250, 20, 30)
            .event(4, 1500, 40, 40)
            .bytes();
        let replay = RmvDecoder.decode(&bytes, "").unwrap();

        let actions: Vec<_> = replay.events.iter().map(|event| event.action).collect();
        assert_eq!(
            actions,
            vec![Action::LeftDown, Action::Move, Action::LeftUp, Action::RightDown]
        );
        assert_eq!(replay.events[0].time, 0.1);
        assert_eq!((replay.events[0].x, replay.events[0].y), (20, 30));
        assert_eq!(replay.header.declared_time, Some(1.5));
    }

    #[test]
    fn off_board_positions_collapse_to_the_corner() {
        let mut fixture = Fixture::new().event(1, 0, 500, 3);
        // y below the recorder's window origin wraps around
        fixture.events.extend_from_slice(&[1, 0, 0, 1, 0, 0, 30, 0, 10]);
        let replay = RmvDecoder.decode(&fixture.bytes(), "").unwrap();

        for event in &replay.events {
            assert_eq!((event.x, event.y), (128, 128));
        }
    }

    #[test]
    fn preflags_and_padding_codes() {
        let mut fixture = Fixture::new();
        fixture.preflags = vec![(1, 2), (3, 4)];
        fixture.events.extend_from_slice(&[0, 9, 9, 9, 9, 12, 1, 1]);
        let bytes = fixture.event(2, 10, 0, 0).bytes();
        let replay = RmvDecoder.decode(&bytes, "").unwrap();

        assert_eq!(replay.events[0].action, Action::PreFlag);
        assert_eq!((replay.events[0].x, replay.events[0].y), (32, 16));
        assert_eq!((replay.events[1].x, replay.events[1].y), (64, 48));
        assert_eq!(replay.events.len(), 4);
    }

    #[test]
    fn short_result_string_has_no_bbbv() {
        let mut fixture = Fixture::new();
        fixture.result = b"abcdefghij".to_vec();
        let replay = RmvDecoder.decode(&fixture.event(1, 0, 0, 0).bytes(), "").unwrap();
        assert_eq!(replay.header.declared_bbbv, None);
        assert_eq!(replay.header.start_time, None);
        assert_eq!(replay.header.player, "Tester");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(RmvDecoder.decode(&[], ""), Err(FormatError::Empty));
        assert_eq!(RmvDecoder.decode(b"*rmx\x00\x01", ""), Err(FormatError::BadMagic));
        assert_eq!(RmvDecoder.decode(b"*rmv\x00\x02", ""), Err(FormatError::BadMagic));

        let mut fixture = Fixture::new();
        fixture.mines.push((8, 0));
        assert_eq!(
            RmvDecoder.decode(&fixture.bytes(), ""),
            Err(FormatError::InvalidMinePosition)
        );

        let mut fixture = Fixture::new();
        fixture.events.push(8);
        assert_eq!(
            RmvDecoder.decode(&fixture.bytes(), ""),
            Err(FormatError::InvalidField("event"))
        );

        let bytes = Fixture::new().event(1, 0, 0, 0).bytes();
        assert_eq!(
            RmvDecoder.decode(&bytes[..bytes.len() - 8 - 11], ""),
            Err(FormatError::Truncated)
        );
    }
}
