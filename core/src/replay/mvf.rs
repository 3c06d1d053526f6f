use super::reader::ByteReader;
use super::*;

const BITS: usize = 40;

/// Minesweeper Clone 0.97 `.mvf` replays.
///
/// Event records are 40-bit words whose bit order is scrambled by a key stored in the file.
#[derive(Copy, Clone, Debug, Default)]
pub struct MvfDecoder;

impl Decoder for MvfDecoder {
    fn decode(&self, bytes: &[u8], _hint: &str) -> DecodeResult<Replay> {
        if bytes.is_empty() {
            return Err(FormatError::Empty);
        }

        let mut reader = ByteReader::new(bytes);
        if reader.bytes(2).map_err(|_| FormatError::BadMagic)? != [0x11, 0x4D] {
            return Err(FormatError::BadMagic);
        }
        reader.skip(25)?;
        match reader.u8()? {
            b'5' => reader.skip(46)?,
            version => return Err(FormatError::UnsupportedVersion(version)),
        }

        let mut header = ReplayHeader::new(ReplayFormat::Mvf, "0.97 beta");
        header.flags = ReplayFlags::OFFICIAL | ReplayFlags::FAIR;

        let month = reader.u8()?;
        let day = reader.u8()?;
        let year = reader.u16()?;
        let hour = reader.u8()?;
        let minute = reader.u8()?;
        let second = reader.u8()?;
        header.start_time = timestamp::calendar_micros(year as i32, month, day, hour, minute, second);

        header.level = Level::from_code(reader.u8()?.saturating_add(2)).unwrap_or_default();
        header.mode = match reader.u8()? {
            1 => 0,
            2 => 3,
            3 => 1,
            _ => 2,
        };
        let seconds = reader.u16()? as f64;
        let hundredths = reader.u8()? as f64;
        header.declared_time = Some(seconds + hundredths / 100.0);
        header.declared_bbbv = Some(reader.u16()? as usize);
        // click counts and the question mark option
        reader.skip(9)?;

        let width = reader.u8()?;
        let height = reader.u8()?;
        let mines = reader.u16()?;
        let mut mine_coords = Vec::with_capacity(mines as usize);
        for _ in 0..mines {
            let col = reader.u8()?.checked_sub(1);
            let row = reader.u8()?.checked_sub(1);
            match (row, col) {
                (Some(row), Some(col)) => mine_coords.push((row, col)),
                _ => return Err(FormatError::InvalidMinePosition),
            }
        }
        let layout = build_layout(height as usize, width as usize, &mine_coords)?;

        header.player = reader.short_string()?;

        let key = Permutation::from_leading(reader.u16()?);
        let count = reader.u24()?;
        if count == 0 {
            return Err(FormatError::InvalidField("event count"));
        }

        let first = key.sample(reader.bytes(5)?);
        let action = if first.buttons.contains(MouseButtons::MIDDLE) {
            Action::MiddleDown
        } else if first.buttons.contains(MouseButtons::RIGHT) {
            Action::RightDown
        } else if first.buttons.contains(MouseButtons::LEFT) {
            Action::LeftDown
        } else {
            Action::Move
        };
        let mut events = vec![Event::new(first.time, action, first.x, first.y)];

        // the recorder diffs the second record against the origin, not the first record
        let mut prev = Sample {
            x: 0,
            y: 0,
            ..first
        };
        for _ in 1..count {
            let sample = key.sample(reader.bytes(5)?);
            if (sample.x, sample.y) != (prev.x, prev.y) {
                events.push(Event::new(sample.time, Action::Move, sample.x, sample.y));
            }
            for action in prev.buttons.transitions(sample.buttons) {
                events.push(Event::new(sample.time, action, sample.x, sample.y));
            }
            prev = sample;
        }

        Ok(Replay {
            header,
            layout,
            events,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Sample {
    buttons: MouseButtons,
    x: Pixel,
    y: Pixel,
    time: f64,
}

/// Where each logical bit of a record lives: byte index and mask.
struct Permutation {
    byte: [usize; BITS],
    mask: [u8; BITS],
}

impl Permutation {
    fn from_leading(leading: u16) -> Self {
        let leading = leading as f64;
        let num1 = leading.sqrt();
        let num2 = (leading + 1000.0).sqrt();
        let num3 = (num1 + 1000.0).sqrt();
        let groups = [
            (num3 + 1000.0).cos(),
            num2.sqrt().sin(),
            num3.cos(),
            (num1.sqrt() + 1000.0).sin(),
            (num2 + 1000.0).sqrt().cos(),
        ];

        let mut digits = [0u8; BITS];
        for (chunk, value) in digits.chunks_exact_mut(8).zip(groups) {
            let text = format!("{:08}", (value * 1e8).abs().round() as u64);
            chunk.copy_from_slice(&text.as_bytes()[..8]);
        }

        let mut key = Self {
            byte: [0; BITS],
            mask: [0; BITS],
        };
        let mut next = 0;
        for digit in b'0'..=b'9' {
            for (pos, _) in digits.iter().enumerate().filter(|&(_, &d)| d == digit) {
                key.byte[next] = pos / 8;
                key.mask[next] = 1 << (pos % 8);
                next += 1;
            }
        }
        key
    }

    fn bit(&self, record: &[u8], n: usize) -> bool {
        record[self.byte[n]] & self.mask[n] != 0
    }

    fn field(&self, record: &[u8], start: usize, len: usize) -> u16 {
        (0..len).fold(0, |acc, j| acc | (self.bit(record, start + j) as u16) << j)
    }

    fn sample(&self, record: &[u8]) -> Sample {
        let mut buttons = MouseButtons::empty();
        buttons.set(MouseButtons::RIGHT, self.bit(record, 0));
        buttons.set(MouseButtons::MIDDLE, self.bit(record, 1));
        buttons.set(MouseButtons::LEFT, self.bit(record, 2));

        let hundredths = self.field(record, 21, 7);
        let seconds = self.field(record, 28, 10);
        Sample {
            buttons,
            y: self.field(record, 3, 9),
            x: self.field(record, 12, 9),
            time: seconds as f64 + (hundredths * 10) as f64 / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEADING: u16 = 0x1234;

    fn encode(key: &Permutation, buttons: MouseButtons, x: u16, y: u16, hundredths: u16, seconds: u16) -> [u8; 5] {
        let mut record = [0u8; 5];
        let mut set = |n: usize, on: bool| {
            if on {
                record[key.byte[n]] |= key.mask[n];
            }
        };
        set(0, buttons.contains(MouseButtons::RIGHT));
        set(1, buttons.contains(MouseButtons::MIDDLE));
        set(2, buttons.contains(MouseButtons::LEFT));
        for j in 0..9 {
            set(3 + j, y >> j & 1 == 1);
            set(12 + j, x >> j & 1 == 1);
        }
        for j in 0..7 {
            set(21 + j, hundredths >> j & 1 == 1);
        }
        for j in 0..10 {
            set(28 + j, seconds >> j & 1 == 1);
        }
        record
    }

    fn fixture(records: &[[u8; 5]]) -> Vec<u8> {
        let mut bytes = vec![0x11, 0x4D];
        bytes.extend_from_slice(&[0; 25]);
        bytes.push(b'5');
        bytes.extend_from_slice(&[0; 46]);
        bytes.extend_from_slice(&[10, 18]);
        bytes.extend_from_slice(&2022u16.to_be_bytes());
        bytes.extend_from_slice(&[20, 15, 35]);
        // level, mode
        bytes.extend_from_slice(&[1, 2]);
        bytes.extend_from_slice(&12u16.to_be_bytes());
        bytes.push(34);
        bytes.extend_from_slice(&7u16.to_be_bytes());
        bytes.extend_from_slice(&[0; 9]);
        bytes.extend_from_slice(&[8, 8]);
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&[1, 1, 3, 8]);
        bytes.push(6);
        bytes.extend_from_slice(b"Tester");
        bytes.extend_from_slice(&LEADING.to_be_bytes());
        bytes.extend_from_slice(&(records.len() as u32).to_be_bytes()[1..]);
        for record in records {
            bytes.extend_from_slice(record);
        }
        bytes
    }

    #[test]
    fn key_covers_every_bit_once() {
        let key = Permutation::from_leading(LEADING);
        let mut seen: Vec<_> = key.byte.iter().zip(key.mask).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), BITS);
        assert!(key.byte.iter().all(|&byte| byte < 5));
    }

    #[test]
    fn decodes_header() {
        let key = Permutation::from_leading(LEADING);
        let bytes = fixture(&[encode(&key, MouseButtons::empty(), 5, 5, 0, 0)]);
        let replay = MvfDecoder.decode(&bytes, "").unwrap();

        assert_eq!(replay.game_config(), GameConfig::new_unchecked((8, 8), 2));
        assert!(replay.layout.contains_mine((0, 0)));
        assert!(replay.layout.contains_mine((7, 2)));
        assert_eq!(replay.header.level, Level::Beginner);
        assert_eq!(replay.header.mode, 3);
        assert_eq!(replay.header.declared_time, Some(12.34));
        assert_eq!(replay.header.declared_bbbv, Some(7));
        assert_eq!(replay.header.player, "Tester");
        assert_eq!(replay.header.start_time, Some(1_666_124_135_000_000));
        assert_eq!(replay.events.len(), 1);
        assert_eq!(replay.events[0].action, Action::Move);
    }

    #[test]
    fn button_changes_become_events() {
        let key = Permutation::from_leading(LEADING);
        let bytes = fixture(&[
            encode(&key, MouseButtons::empty(), 10, 20, 0, 0),
            encode(&key, MouseButtons::LEFT, 10, 20, 50, 0),
            encode(&key, MouseButtons::empty(), 30, 20, 23, 1),
            encode(&key, MouseButtons::LEFT | MouseButtons::RIGHT, 30, 20, 0, 2),
        ]);
        let replay = MvfDecoder.decode(&bytes, "").unwrap();

        let actions: Vec<_> = replay.events.iter().map(|event| event.action).collect();
        assert_eq!(
            actions,
            vec![
                Action::Move,
                // second record is compared against the origin
                Action::Move,
                Action::LeftDown,
                Action::Move,
                Action::LeftUp,
                Action::LeftDown,
                Action::RightDown,
            ]
        );
        assert_eq!(replay.events[2].time, 0.5);
        assert!((replay.events[4].time - 1.23).abs() < 1e-9);
        assert_eq!((replay.events[4].x, replay.events[4].y), (30, 20));
    }

    #[test]
    fn first_record_prefers_middle_then_right() {
        let key = Permutation::from_leading(LEADING);
        let bytes = fixture(&[encode(&key, MouseButtons::all(), 1, 1, 0, 0)]);
        let replay = MvfDecoder.decode(&bytes, "").unwrap();
        assert_eq!(replay.events[0].action, Action::MiddleDown);
    }

    #[test]
    fn header_errors() {
        assert_eq!(MvfDecoder.decode(&[], ""), Err(FormatError::Empty));
        assert_eq!(MvfDecoder.decode(&[0x11, 0x4E, 0], ""), Err(FormatError::BadMagic));

        let mut bytes = fixture(&[]);
        bytes[27] = b'4';
        assert_eq!(MvfDecoder.decode(&bytes, ""), Err(FormatError::UnsupportedVersion(b'4')));

        let bytes = fixture(&[]);
        assert_eq!(
            MvfDecoder.decode(&bytes, ""),
            Err(FormatError::InvalidField("event count"))
        );

        let key = Permutation::from_leading(LEADING);
        let bytes = fixture(&[encode(&key, MouseButtons::empty(), 0, 0, 0, 0)]);
        assert_eq!(
            MvfDecoder.decode(&bytes[..bytes.len() - 1], ""),
            Err(FormatError::Truncated)
        );
    }
}
