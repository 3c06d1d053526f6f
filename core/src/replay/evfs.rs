use super::reader::ByteReader;
use super::*;

/// One replay of a bundle with the name and checksum it was stored under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub name: String,
    pub replay: Replay,
    pub checksum: Vec<u8>,
}

/// A Metasweeper `.evfs` file: a session of EVF replays stored back to back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvfsBundle {
    pub entries: Vec<BundleEntry>,
}

impl EvfsBundle {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replays(&self) -> impl Iterator<Item = &Replay> {
        self.entries.iter().map(|entry| &entry.replay)
    }

    pub fn into_replays(self) -> Vec<Replay> {
        self.entries.into_iter().map(|entry| entry.replay).collect()
    }

    /// Whether every replay comes from the same client and player, and the games follow each
    /// other in time without overlapping.
    pub fn is_consistent(&self) -> bool {
        let Some(first) = self.entries.first() else {
            return false;
        };
        let first = &first.replay.header;
        let same_origin = self.replays().all(|replay| {
            let header = &replay.header;
            header.software == first.software
                && header.country == first.country
                && header.player == first.player
                && header.race == first.race
                && header.uniqueness == first.uniqueness
        });

        let spans: Vec<_> = self
            .replays()
            .map(|replay| (replay.header.start_time, replay.header.end_time))
            .collect();
        let ordered = spans.iter().all(|span| match span {
            (Some(start), Some(end)) => start <= end,
            _ => false,
        }) && spans.windows(2).all(|pair| pair[0].1 <= pair[1].0);

        same_origin && ordered
    }
}

/// Splits a bundle and decodes every replay in it. Any entry that fails to decode fails the bundle.
pub fn decode_bundle(bytes: &[u8]) -> DecodeResult<EvfsBundle> {
    let mut reader = ByteReader::new(bytes);
    let version = reader.u8().map_err(|_| FormatError::Empty)?;
    if version != 0 {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let checksum_len = reader.u16()? as usize;
    let mut entries = Vec::new();
    // a single trailing byte is padding
    while reader.remaining() > 1 {
        let name = reader.c_string()?;
        let size = reader.u32()? as usize;
        let data = reader.bytes(size)?;
        let checksum = reader.bytes(checksum_len)?.to_vec();
        let replay = EvfDecoder.decode(data, &name)?;
        log::debug!("bundle entry {name}: {} events", replay.events.len());
        entries.push(BundleEntry {
            name,
            replay,
            checksum,
        });
    }

    Ok(EvfsBundle { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::evf::tests::{legacy_event, legacy_prefix};

    fn game(start: &str, end: &str) -> Vec<u8> {
        let mut bytes = legacy_prefix(1, "元3.1.11", start, end);
        legacy_event(&mut bytes, 2, 0, 20, 20);
        legacy_event(&mut bytes, 3, 80, 20, 20);
        bytes.push(255);
        bytes
    }

    fn bundle(games: &[(&str, Vec<u8>)], checksum_len: u16) -> Vec<u8> {
        let mut bytes = vec![0];
        bytes.extend_from_slice(&checksum_len.to_be_bytes());
        for (i, (name, data)) in games.iter().enumerate() {
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(0);
            bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
            bytes.extend_from_slice(data);
            bytes.extend(core::iter::repeat_n(i as u8, checksum_len as usize));
        }
        bytes
    }

    #[test]
    fn splits_entries_in_order() {
        let bytes = bundle(
            &[
                ("first", game("1725811200000000", "1725811260000000")),
                ("second", game("1725811300000000", "1725811330000000")),
            ],
            4,
        );

        let decoded = decode_bundle(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.entries[0].name, "first");
        assert_eq!(decoded.entries[1].checksum, vec![1; 4]);
        assert_eq!(decoded.entries[1].replay.events.len(), 2);
        assert!(decoded.is_consistent());

        let replays = decoded.into_replays();
        assert_eq!(replays[1].header.start_time, Some(1_725_811_300_000_000));
    }

    #[test]
    fn overlapping_games_are_inconsistent() {
        let bytes = bundle(
            &[
                ("a", game("1725811200000000", "1725811260000000")),
                ("b", game("1725811250000000", "1725811330000000")),
            ],
            0,
        );
        let decoded = decode_bundle(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(!decoded.is_consistent());
    }

    #[test]
    fn trailing_padding_byte_is_ignored() {
        let mut bytes = bundle(&[("only", game("0", "0"))], 2);
        bytes.push(0);
        assert_eq!(decode_bundle(&bytes).unwrap().len(), 1);
    }

    #[test]
    fn broken_entry_fails_the_bundle() {
        let mut data = game("0", "0");
        data.truncate(20);
        let bytes = bundle(&[("cut", data)], 0);
        assert_eq!(decode_bundle(&bytes), Err(FormatError::Truncated));
    }

    #[test]
    fn header_errors() {
        assert_eq!(decode_bundle(&[]), Err(FormatError::Empty));
        assert_eq!(decode_bundle(&[1, 0, 0]), Err(FormatError::UnsupportedVersion(1)));
        assert!(decode_bundle(&[0, 0, 0]).unwrap().is_empty());
        assert!(!EvfsBundle::default().is_consistent());
    }
}
