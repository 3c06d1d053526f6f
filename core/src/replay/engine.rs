use hashbrown::HashSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseState {
    #[default]
    UpUp,
    UpDown,
    /// Right button down over a cell it could not flag.
    UpDownNotFlag,
    DownUp,
    Chording,
    /// Both buttons down, the right one pressed first over a cell it could not flag.
    ChordingNotFlag,
    /// Right button released after a chord while the left one is still down.
    DownUpAfterChording,
    Undefined,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Ready,
    /// Flags placed before the first reveal.
    PreFlagging,
    Playing,
    Won,
    Lost,
}

impl Phase {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    /// Whether the game clock is running.
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Playing | Self::Won | Self::Lost)
    }
}

/// How much an event changed the board.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UsefulLevel {
    #[default]
    None = 0,
    Flag = 1,
    Reveal = 2,
    Chord = 3,
    MineHit = 4,
}

impl UsefulLevel {
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Whether the solver's view of the board may have changed.
    pub const fn is_solver_relevant(self) -> bool {
        self.value() >= Self::Reveal.value()
    }
}

/// Click accounting over a board, driven one mouse event at a time.
///
/// Counts clicks the way the historical clients do: a press over a cell does nothing until the
/// matching release, both buttons down turn the release into a chord, and flags placed before
/// the first reveal can be taken back to restart the count.
#[derive(Clone, Debug)]
pub struct ClickMachine {
    board: Board,
    openings: OpeningMap,
    phase: Phase,
    mouse: MouseState,
    counters: Counters,
    flagged_mines: HashSet<Coord2>,
    pre_flags: usize,
    middle_held: bool,
}

impl ClickMachine {
    pub fn new(layout: MineLayout) -> Self {
        let board = Board::new(layout);
        let openings = OpeningMap::new(board.numbers());
        Self {
            board,
            openings,
            phase: Phase::Ready,
            mouse: MouseState::UpUp,
            counters: Counters::default(),
            flagged_mines: HashSet::new(),
            pre_flags: 0,
            middle_held: false,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mouse_state(&self) -> MouseState {
        self.mouse
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn is_middle_held(&self) -> bool {
        self.middle_held
    }

    /// Feeds one event; `cell` is `None` when the cursor is outside the board.
    pub fn step(&mut self, action: Action, cell: Option<Coord2>) -> OperationResult<UsefulLevel> {
        if let Action::Marker(_) = action {
            return Ok(UsefulLevel::None);
        }

        let handled = match self.phase {
            Phase::Ready => self.step_ready(action, cell)?,
            Phase::PreFlagging => self.step_pre_flagging(action, cell)?,
            Phase::Playing => None,
            Phase::Won | Phase::Lost => Some(UsefulLevel::None),
        };

        match handled {
            Some(level) => Ok(level),
            None => self.step_playing(action, cell),
        }
    }

    /// `None` hands the event on to the in-game table.
    fn step_ready(
        &mut self,
        action: Action,
        cell: Option<Coord2>,
    ) -> OperationResult<Option<UsefulLevel>> {
        use MouseState::*;

        let level = match (action, self.mouse) {
            (Action::Move, _) => UsefulLevel::None,
            (Action::LeftDown, mouse) => {
                match mouse {
                    UpUp => {
                        self.mouse = DownUp;
                        if cell.is_some() {
                            self.phase = Phase::PreFlagging;
                        }
                    }
                    UpDown => self.mouse = Chording,
                    UpDownNotFlag => self.mouse = ChordingNotFlag,
                    _ => {}
                }
                UsefulLevel::None
            }
            (Action::PreFlag, _) => {
                let coords = self.pre_flag_target(cell)?;
                self.pre_flags += 1;
                self.phase = Phase::PreFlagging;
                self.right_click(coords)?
            }
            (Action::RightDown, UpUp) => {
                self.mouse = UpDown;
                match cell {
                    Some(coords) => {
                        self.pre_flags = 1;
                        self.phase = Phase::PreFlagging;
                        self.right_click(coords)?
                    }
                    None => UsefulLevel::None,
                }
            }
            (Action::RightDown, DownUpAfterChording) => {
                self.mouse = Chording;
                UsefulLevel::None
            }
            (Action::LeftUp, Chording | ChordingNotFlag) => {
                self.mouse = UpDown;
                UsefulLevel::None
            }
            (Action::LeftUp, DownUpAfterChording | DownUp | UpUp) => {
                self.mouse = UpUp;
                UsefulLevel::None
            }
            (Action::RightUp, UpDown) => {
                self.mouse = UpUp;
                UsefulLevel::None
            }
            (Action::RightUp, Chording) => {
                self.mouse = DownUpAfterChording;
                UsefulLevel::None
            }
            (Action::RightUp, UpUp) => UsefulLevel::None,
            (Action::DoubleClick, mouse) => {
                match mouse {
                    DownUp | DownUpAfterChording | UpDown | UpUp => self.mouse = Chording,
                    UpDownNotFlag => self.mouse = ChordingNotFlag,
                    _ => {}
                }
                UsefulLevel::None
            }
            (Action::RightDown | Action::LeftUp | Action::RightUp, _) => return Ok(None),
            _ => return Err(InvalidOperation::UnexpectedAction),
        };
        Ok(Some(level))
    }

    fn step_pre_flagging(
        &mut self,
        action: Action,
        cell: Option<Coord2>,
    ) -> OperationResult<Option<UsefulLevel>> {
        use MouseState::*;

        let level = match (action, self.mouse) {
            (Action::LeftDown | Action::RightUp | Action::Move, _) => return Ok(None),
            (Action::LeftUp, DownUp) => match cell {
                None => {
                    self.mouse = UpUp;
                    if self.pre_flags == 0 {
                        self.phase = Phase::Ready;
                        self.reset_clicks();
                    } else {
                        self.counters.left += 1;
                    }
                    UsefulLevel::None
                }
                Some(coords) if self.board.cell_at(coords).is_covered() => {
                    self.phase = Phase::Playing;
                    self.mouse = UpUp;
                    self.left_click(coords)?
                }
                Some(_) => {
                    self.counters.left += 1;
                    UsefulLevel::None
                }
            },
            (Action::LeftUp, _) => return Ok(None),
            (Action::PreFlag, _) => {
                let coords = self.pre_flag_target(cell)?;
                self.pre_flags += 1;
                self.right_click(coords)?
            }
            (Action::RightDown, UpUp) => match cell {
                Some(coords) => {
                    self.mouse = UpDown;
                    if self.board.cell_at(coords).is_covered() {
                        self.pre_flags += 1;
                    } else {
                        self.pre_flags = self.pre_flags.saturating_sub(1);
                        if self.pre_flags == 0 {
                            // taking back the last pre-flag restarts the count
                            self.phase = Phase::Ready;
                            self.reset_clicks();
                            self.board.unflag(coords)?;
                            return Ok(Some(UsefulLevel::None));
                        }
                    }
                    self.right_click(coords)?
                }
                None => {
                    self.mouse = UpDownNotFlag;
                    self.counters.right += 1;
                    return Ok(None);
                }
            },
            (Action::RightDown, DownUp) => {
                self.mouse = Chording;
                if cell.is_some() && self.pre_flags == 0 {
                    self.phase = Phase::Ready;
                }
                return Ok(None);
            }
            (Action::RightDown, DownUpAfterChording) => {
                self.mouse = Chording;
                return Ok(None);
            }
            (Action::DoubleClick, DownUp) => {
                if cell.is_some() && self.pre_flags == 0 {
                    self.phase = Phase::Ready;
                }
                self.mouse = Chording;
                UsefulLevel::None
            }
            (Action::DoubleClick, DownUpAfterChording | UpDown) => {
                self.mouse = Chording;
                UsefulLevel::None
            }
            (Action::DoubleClick, UpDownNotFlag) => {
                self.mouse = ChordingNotFlag;
                UsefulLevel::None
            }
            _ => return Err(InvalidOperation::UnexpectedAction),
        };
        Ok(Some(level))
    }

    fn step_playing(&mut self, action: Action, cell: Option<Coord2>) -> OperationResult<UsefulLevel> {
        use MouseState::*;

        let level = match (action, self.mouse) {
            (Action::Move, _) => UsefulLevel::None,

            (Action::LeftDown, UpUp | Undefined) => self.set_mouse(DownUp),
            (Action::LeftDown, UpDown) => self.set_mouse(Chording),
            (Action::LeftDown, UpDownNotFlag) => self.set_mouse(ChordingNotFlag),
            (Action::LeftDown, _) => UsefulLevel::None,

            (Action::LeftUp, DownUp) => {
                self.mouse = UpUp;
                match cell {
                    Some(coords) => self.left_click(coords)?,
                    None => {
                        self.counters.left += 1;
                        UsefulLevel::None
                    }
                }
            }
            (Action::LeftUp, Chording) => {
                self.mouse = UpDown;
                self.chording_click(cell)?
            }
            (Action::LeftUp, ChordingNotFlag) => {
                self.mouse = UpDown;
                self.counters.right = self.counters.right.saturating_sub(1);
                self.chording_click(cell)?
            }
            (Action::LeftUp, DownUpAfterChording | UpUp | Undefined) => self.set_mouse(UpUp),
            (Action::LeftUp, _) => UsefulLevel::None,

            (Action::RightDown, UpUp) => match cell {
                Some(coords) => {
                    self.mouse = if self.board.cell_at(coords).is_unrevealed() {
                        UpDown
                    } else {
                        UpDownNotFlag
                    };
                    self.right_click(coords)?
                }
                None => {
                    self.mouse = UpDownNotFlag;
                    self.counters.right += 1;
                    UsefulLevel::None
                }
            },
            (Action::RightDown, DownUp | DownUpAfterChording) => self.set_mouse(Chording),
            (Action::RightDown, Undefined) => self.set_mouse(UpDown),
            (Action::RightDown, _) => UsefulLevel::None,

            (Action::RightUp, UpDown | UpDownNotFlag | UpUp | Undefined) => self.set_mouse(UpUp),
            (Action::RightUp, Chording) => {
                self.mouse = DownUpAfterChording;
                self.chording_click(cell)?
            }
            (Action::RightUp, ChordingNotFlag) => {
                self.mouse = DownUpAfterChording;
                self.counters.right = self.counters.right.saturating_sub(1);
                self.chording_click(cell)?
            }
            (Action::RightUp, _) => UsefulLevel::None,

            (Action::MiddleDown, _) => {
                self.middle_held = true;
                UsefulLevel::None
            }
            (Action::MiddleUp, _) => {
                self.middle_held = false;
                self.chording_click(cell)?
            }

            (Action::DoubleClick, DownUp | DownUpAfterChording | UpDown) => self.set_mouse(Chording),
            (Action::DoubleClick, UpDownNotFlag) => self.set_mouse(ChordingNotFlag),
            (Action::DoubleClick | Action::PreFlag | Action::Marker(_), _) => {
                return Err(InvalidOperation::UnexpectedAction);
            }
        };
        Ok(level)
    }

    fn set_mouse(&mut self, mouse: MouseState) -> UsefulLevel {
        self.mouse = mouse;
        UsefulLevel::None
    }

    fn pre_flag_target(&self, cell: Option<Coord2>) -> OperationResult<Coord2> {
        match cell {
            Some(coords) if self.board.cell_at(coords).is_covered() => Ok(coords),
            _ => Err(InvalidOperation::UnexpectedAction),
        }
    }

    fn left_click(&mut self, coords: Coord2) -> OperationResult<UsefulLevel> {
        self.counters.left += 1;
        if !self.board.cell_at(coords).is_covered() {
            return Ok(UsefulLevel::None);
        }

        let number = self.board.number_at(coords);
        if number == 0 {
            let mut marks = Array2::from_elem(self.board.numbers().dim(), false);
            if self.opening_completes(coords, &mut marks) {
                self.counters.bbbv_solved += 1;
            }
        }

        if self.board.reveal(coords)? == RevealOutcome::HitMine {
            self.phase = Phase::Lost;
            return Ok(UsefulLevel::MineHit);
        }

        if is_isolated_number(self.board.numbers(), coords) {
            self.counters.bbbv_solved += 1;
        }
        self.counters.lce += 1;
        self.sync_with_board();
        Ok(UsefulLevel::Reveal)
    }

    fn right_click(&mut self, coords: Coord2) -> OperationResult<UsefulLevel> {
        self.counters.right += 1;
        if !self.board.cell_at(coords).is_unrevealed() {
            return Ok(UsefulLevel::None);
        }

        match self.board.toggle_flag(coords)? {
            MarkOutcome::Flagged => {
                self.counters.flag += 1;
                // re-flagging a mine is not another effective click
                if self.board.has_mine_at(coords) && self.flagged_mines.insert(coords) {
                    self.counters.rce += 1;
                }
            }
            MarkOutcome::Unflagged => self.counters.flag = self.counters.flag.saturating_sub(1),
            MarkOutcome::NoChange => {}
        }
        Ok(UsefulLevel::Flag)
    }

    fn chording_click(&mut self, cell: Option<Coord2>) -> OperationResult<UsefulLevel> {
        let Some(coords) = cell else {
            return Ok(UsefulLevel::None);
        };
        self.counters.double += 1;

        let number = match self.board.cell_at(coords) {
            CellState::Revealed(number @ 1..=7) => number,
            _ => return Ok(UsefulLevel::None),
        };
        let covered: Vec<_> = self.board.covered_neighbors(coords).collect();
        if covered.is_empty() || self.board.count_flagged_neighbors(coords) != number {
            return Ok(UsefulLevel::None);
        }

        let isolated = covered
            .iter()
            .filter(|&&pos| is_isolated_number(self.board.numbers(), pos))
            .count();
        let openings = self.openings_completed_around(coords);
        self.counters.dce += 1;
        self.counters.bbbv_solved += isolated + openings;

        let outcome = self.board.chord(coords)?;
        self.sync_with_board();
        if outcome == RevealOutcome::HitMine {
            Ok(UsefulLevel::MineHit)
        } else {
            Ok(UsefulLevel::Chord)
        }
    }

    /// Openings a chord at `coords` will uncover in full.
    fn openings_completed_around(&self, coords: Coord2) -> usize {
        let mut marks = Array2::from_elem(self.board.numbers().dim(), false);
        let mut count = 0;
        for pos in core::iter::once(coords).chain(self.board.iter_neighbors(coords)) {
            if self.board.cell_at(pos).is_covered()
                && self.board.number_at(pos) == 0
                && !marks[pos.to_nd_index()]
                && self.opening_completes(pos, &mut marks)
            {
                count += 1;
            }
        }
        count
    }

    /// Whether revealing the zero at `start` uncovers its whole opening, i.e. no zero in it is flagged.
    fn opening_completes(&self, start: Coord2, marks: &mut Array2<bool>) -> bool {
        let mut stack = vec![start];
        while let Some(pos) = stack.pop() {
            if self.board.number_at(pos) != 0 {
                continue;
            }
            if self.board.cell_at(pos).is_flagged() {
                return false;
            }
            marks[pos.to_nd_index()] = true;
            stack.extend(
                self.board
                    .iter_neighbors(pos)
                    .filter(|next| !marks[next.to_nd_index()]),
            );
        }
        true
    }

    fn sync_with_board(&mut self) {
        self.counters.op_solved = self.openings.solved(self.board.cells());
        match self.board.state() {
            BoardState::Won => self.phase = Phase::Won,
            BoardState::Lost => self.phase = Phase::Lost,
            BoardState::Ready | BoardState::Playing => {}
        }
    }

    fn reset_clicks(&mut self) {
        self.counters.clear_clicks();
        self.flagged_mines.clear();
    }
}

/// Player view after an event that changed the board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Event that produced it, `None` for the untouched board.
    pub event: Option<usize>,
    pub board: Board,
}

impl BoardSnapshot {
    pub fn observation(&self) -> Observation {
        Observation::from_board(&self.board)
    }

    pub fn classify(&self, cfg: AnalysisConfig) -> Classification {
        classify(&self.observation(), cfg)
    }
}

/// Everything the engine knows after applying one event, indexed like [`Replay::events`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub cell: Option<Coord2>,
    pub useful_level: UsefulLevel,
    /// Snapshot the event was applied to.
    pub prior_snapshot: usize,
    /// Snapshot current once the event is applied.
    pub next_snapshot: usize,
    pub mouse_state: MouseState,
    pub phase: Phase,
    pub counters: Counters,
    /// Cursor travel since the game started, in pixels of a 16-pixel cell.
    pub path: f64,
    pub error: Option<InvalidOperation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayAnalysis {
    pub records: Vec<EventRecord>,
    pub snapshots: Vec<BoardSnapshot>,
    /// Replay time of the click that started the game.
    pub delta_time: f64,
    pub stats: BoardStats,
    pub final_phase: Phase,
}

impl ReplayAnalysis {
    pub fn final_board(&self) -> &Board {
        // the untouched board is always present
        &self.snapshots[self.snapshots.len() - 1].board
    }
}

/// Replays every event of `replay` against its own layout.
pub fn analyse(replay: &Replay) -> ReplayAnalysis {
    let cell_size = replay.header.cell_pixel_size;
    let size = replay.layout.size();
    let scale = 16.0 / cell_size.max(1) as f64;

    let mut machine = ClickMachine::new(replay.layout.clone());
    let mut snapshots = vec![BoardSnapshot {
        event: None,
        board: machine.board().clone(),
    }];
    let mut records = Vec::with_capacity(replay.events.len());
    let mut delta_time = 0.0;
    let mut path = 0.0;
    let mut last_in_board: Option<(Pixel, Pixel)> = None;

    for (index, event) in replay.events.iter().enumerate() {
        let prior_snapshot = snapshots.len() - 1;
        let cell = event.cell(cell_size, size);
        let mut useful_level = UsefulLevel::None;
        let mut error = None;

        if !matches!(event.action, Action::Move | Action::Marker(_)) {
            let phase_before = machine.phase();
            match machine.step(event.action, cell) {
                Ok(level) => useful_level = level,
                Err(err) => {
                    log::debug!(
                        "event {index} ({}) at {:.3}s ignored: {err}",
                        event.action.code(),
                        event.time
                    );
                    error = Some(err);
                }
            }

            if useful_level != UsefulLevel::None {
                snapshots.push(BoardSnapshot {
                    event: Some(index),
                    board: machine.board().clone(),
                });
                if phase_before != Phase::Playing {
                    delta_time = event.time;
                }
            }
        }

        if machine.phase().is_started() && cell.is_some() {
            if let Some((x, y)) = last_in_board {
                let dx = event.x as f64 - x as f64;
                let dy = event.y as f64 - y as f64;
                path += dx.hypot(dy) * scale;
            }
            last_in_board = Some((event.x, event.y));
        }

        records.push(EventRecord {
            cell,
            useful_level,
            prior_snapshot,
            next_snapshot: snapshots.len() - 1,
            mouse_state: machine.mouse_state(),
            phase: machine.phase(),
            counters: machine.counters(),
            path,
            error,
        });
    }

    log::debug!(
        "analysed {} events into {} snapshots, game {:?}",
        records.len(),
        snapshots.len(),
        machine.phase()
    );

    ReplayAnalysis {
        records,
        snapshots,
        delta_time,
        stats: BoardStats::new(&replay.layout.numbers()),
        final_phase: machine.phase(),
    }
}
