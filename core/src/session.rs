use crate::*;

pub type SessionResult<T> = core::result::Result<T, ReplayError>;

/// One replay file being studied: decoded once, analysed once, then explored through a time cursor.
///
/// The cursor runs from `-delta_time` (the first recorded event) through `0` (the click that
/// started the game) to the last event.
#[derive(Clone, Debug)]
pub struct ReplaySession {
    format: ReplayFormat,
    bytes: Vec<u8>,
    hint: String,
    replay: Option<Replay>,
    analysis: Option<ReplayAnalysis>,
    current_time: f64,
    current_event: usize,
}

/// One event together with what the engine made of it.
#[derive(Copy, Clone, Debug)]
pub struct EventView<'a> {
    pub index: usize,
    pub event: &'a Event,
    pub record: &'a EventRecord,
    pub prior: &'a BoardSnapshot,
    pub next: &'a BoardSnapshot,
}

impl EventView<'_> {
    /// Event time on the session clock.
    pub fn time(&self, delta_time: f64) -> f64 {
        self.event.time - delta_time
    }
}

impl ReplaySession {
    pub fn new(format: ReplayFormat, bytes: impl Into<Vec<u8>>, hint: impl Into<String>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
            hint: hint.into(),
            replay: None,
            analysis: None,
            current_time: 0.0,
            current_event: 0,
        }
    }

    /// Picks the format from the file name's extension.
    pub fn from_file(bytes: impl Into<Vec<u8>>, file_name: &str) -> SessionResult<Self> {
        let format = ReplayFormat::from_file_name(file_name).ok_or(FormatError::UnknownFormat)?;
        Ok(Self::new(format, bytes, file_name))
    }

    /// Wraps an already decoded replay.
    pub fn from_replay(replay: Replay) -> Self {
        let mut session = Self::new(replay.header.format, Vec::new(), "");
        session.replay = Some(replay);
        session
    }

    pub fn format(&self) -> ReplayFormat {
        self.format
    }

    pub fn parse(&mut self) -> SessionResult<&Replay> {
        if self.replay.is_none() {
            let replay = decode(self.format, &self.bytes, &self.hint)?;
            log::debug!(
                "decoded {} replay {:?}: {} events",
                self.format.extension(),
                self.hint,
                replay.events.len()
            );
            self.replay = Some(replay);
        }
        self.replay()
    }

    pub fn analyse(&mut self) -> SessionResult<&ReplayAnalysis> {
        if self.analysis.is_none() {
            let replay = self.replay()?;
            if replay.events.is_empty() {
                return Err(ReplayError::NoEvents);
            }
            let analysis = analyse(replay);
            let end_time = replay.last_event_time() - analysis.delta_time;
            self.current_event = analysis.records.len() - 1;
            self.current_time = end_time;
            self.analysis = Some(analysis);
        }
        self.analysis()
    }

    pub fn replay(&self) -> SessionResult<&Replay> {
        self.replay.as_ref().ok_or(ReplayError::NotParsed)
    }

    pub fn analysis(&self) -> SessionResult<&ReplayAnalysis> {
        self.analysis.as_ref().ok_or(ReplayError::NotAnalysed)
    }

    pub fn delta_time(&self) -> SessionResult<f64> {
        Ok(self.analysis()?.delta_time)
    }

    pub fn start_time(&self) -> SessionResult<f64> {
        Ok(self.replay()?.events[0].time - self.delta_time()?)
    }

    pub fn end_time(&self) -> SessionResult<f64> {
        Ok(self.replay()?.last_event_time() - self.delta_time()?)
    }

    /// Moves the cursor; times outside the replay clamp to its ends.
    pub fn set_current_time(&mut self, time: f64) -> SessionResult<()> {
        let time = time.clamp(self.start_time()?, self.end_time()?);
        let target = time + self.delta_time()?;
        let events = &self.replay()?.events;
        let after = events.partition_point(|event| event.time <= target);
        self.current_event = after.saturating_sub(1);
        self.current_time = time;
        Ok(())
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn current_event(&self) -> usize {
        self.current_event
    }

    pub fn current_record(&self) -> SessionResult<&EventRecord> {
        Ok(&self.analysis()?.records[self.current_event])
    }

    pub fn counters(&self) -> SessionResult<Counters> {
        Ok(self.current_record()?.counters)
    }

    /// Figures for the events up to the cursor.
    pub fn metrics(&self) -> SessionResult<Metrics> {
        let replay = self.replay()?;
        let analysis = self.analysis()?;
        let record = self.current_record()?;
        Ok(Metrics::new(
            &analysis.stats,
            &record.counters,
            replay.game_config(),
            self.current_time.max(0.0),
            record.path,
        ))
    }

    /// Cursor pixel position at the current time.
    ///
    /// Between two events the position is interpolated; events right of the board are skipped
    /// in favour of the last one over it.
    pub fn cursor(&self) -> SessionResult<(Pixel, Pixel)> {
        let replay = self.replay()?;
        let target = self.current_time + self.delta_time()?;
        let events = &replay.events;
        let right_edge = replay.layout.size().1 as u32 * replay.header.cell_pixel_size as u32;
        let over_board = |event: &Event| (event.x as u32) < right_edge;

        let Some(anchor) = (0..=self.current_event).rev().find(|&i| over_board(&events[i])) else {
            let event = &events[self.current_event];
            return Ok((event.x, event.y));
        };
        let from = &events[anchor];

        match events.get(anchor + 1) {
            Some(to)
                if anchor == self.current_event
                    && over_board(to)
                    && from.time < target
                    && target < to.time =>
            {
                let k = (target - from.time) / (to.time - from.time);
                let lerp = |a: Pixel, b: Pixel| (a as f64 + (b as f64 - a as f64) * k).round() as Pixel;
                Ok((lerp(from.x, to.x), lerp(from.y, to.y)))
            }
            _ => Ok((from.x, from.y)),
        }
    }

    /// Board as the player saw it at the current time.
    pub fn snapshot(&self) -> SessionResult<&BoardSnapshot> {
        let record = self.current_record()?;
        Ok(&self.analysis()?.snapshots[record.next_snapshot])
    }

    pub fn classify(&self, cfg: AnalysisConfig) -> SessionResult<Classification> {
        Ok(self.snapshot()?.classify(cfg))
    }

    pub fn events(&self) -> SessionResult<impl Iterator<Item = EventView<'_>> + '_> {
        let replay = self.replay()?;
        let analysis = self.analysis()?;
        Ok(replay
            .events
            .iter()
            .zip(&analysis.records)
            .enumerate()
            .map(|(index, (event, record))| EventView {
                index,
                event,
                record,
                prior: &analysis.snapshots[record.prior_snapshot],
                next: &analysis.snapshots[record.next_snapshot],
            }))
    }

    /// Whether the replay's client and start time fall inside a window of `table`.
    pub fn is_within_validity(&self, table: &ValidityTable) -> SessionResult<bool> {
        let header = &self.replay()?.header;
        Ok(header
            .start_time
            .is_some_and(|micros| table.covers(&header.software, micros / 1_000_000)))
    }
}
