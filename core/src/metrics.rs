use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// Rates are reported as zero below this many seconds.
const MIN_RATE_TIME: f64 = 0.00099;

/// Minimum number of clicks that clears the board: every opening plus every number not touching one.
///
/// Takes a fully revealed raw grid (`0..=8` numbers, negative for mines).
pub fn bbbv(numbers: &Array2<i8>) -> usize {
    op(numbers) + isolated_numbers(numbers).count()
}

/// Number of openings, the 8-connected regions of zero cells.
pub fn op(numbers: &Array2<i8>) -> usize {
    OpeningMap::new(numbers).count()
}

/// Number of islands, the 8-connected groups of numbers without a zero neighbour.
pub fn isl(numbers: &Array2<i8>) -> usize {
    let size = grid_size(numbers);
    let mut mask = Array2::from_elem(numbers.dim(), false);
    for coords in isolated_numbers(numbers) {
        mask[coords.to_nd_index()] = true;
    }
    label_regions(size, |coords| mask[coords.to_nd_index()]).1
}

/// How many cells of each number `0..=8` the board holds.
pub fn cell_counts(numbers: &Array2<i8>) -> [usize; 9] {
    let mut counts = [0; 9];
    for &value in numbers.iter() {
        if (0..=8).contains(&value) {
            counts[value as usize] += 1;
        }
    }
    counts
}

/// A number with no zero anywhere in its 3×3 neighbourhood; each one costs a click.
pub fn is_isolated_number(numbers: &Array2<i8>, coords: Coord2) -> bool {
    numbers[coords.to_nd_index()] > 0
        && numbers
            .iter_neighbor_cells(coords)
            .all(|value| value != 0)
}

fn isolated_numbers(numbers: &Array2<i8>) -> impl Iterator<Item = Coord2> + '_ {
    iter_coords(grid_size(numbers)).filter(|&coords| is_isolated_number(numbers, coords))
}

/// Labels 8-connected regions of cells matching `member`. Label 0 means "not a member".
fn label_regions(size: Coord2, member: impl Fn(Coord2) -> bool) -> (Array2<u16>, usize) {
    let mut labels = Array2::zeros(size.to_nd_index());
    let mut count = 0;

    for start in iter_coords(size) {
        if labels[start.to_nd_index()] != 0 || !member(start) {
            continue;
        }

        count += 1;
        let label = count as u16;
        labels[start.to_nd_index()] = label;
        let mut stack = vec![start];

        while let Some(coords) = stack.pop() {
            for pos in NeighborIter::new(coords, size) {
                if labels[pos.to_nd_index()] == 0 && member(pos) {
                    labels[pos.to_nd_index()] = label;
                    stack.push(pos);
                }
            }
        }
    }

    (labels, count)
}

/// Zero cells grouped by the opening they belong to.
#[derive(Clone, Debug, PartialEq)]
pub struct OpeningMap {
    labels: Array2<u16>,
    count: usize,
}

impl OpeningMap {
    pub fn new(numbers: &Array2<i8>) -> Self {
        let (labels, count) =
            label_regions(grid_size(numbers), |coords| numbers[coords.to_nd_index()] == 0);
        Self { labels, count }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Opening id of a zero cell, `None` for everything else.
    pub fn opening_at(&self, coords: Coord2) -> Option<u16> {
        match self.labels[coords.to_nd_index()] {
            0 => None,
            label => Some(label),
        }
    }

    /// Openings whose zero cells are all revealed on `cells`.
    pub fn solved(&self, cells: &Array2<CellState>) -> usize {
        let mut open = vec![true; self.count + 1];
        for (label, cell) in self.labels.iter().zip(cells.iter()) {
            if *label != 0 && !matches!(cell, CellState::Revealed(_)) {
                open[*label as usize] = false;
            }
        }
        open.iter().skip(1).filter(|&&solved| solved).count()
    }
}

/// Static figures of a layout, independent of how it was played.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardStats {
    pub bbbv: usize,
    pub op: usize,
    pub isl: usize,
    pub cell_counts: [usize; 9],
}

impl BoardStats {
    pub fn new(numbers: &Array2<i8>) -> Self {
        Self {
            bbbv: bbbv(numbers),
            op: op(numbers),
            isl: isl(numbers),
            cell_counts: cell_counts(numbers),
        }
    }
}

/// Cumulative click accounting after one replay event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub left: usize,
    pub right: usize,
    pub double: usize,
    /// Left clicks that revealed something. A count, not a ratio.
    pub lce: usize,
    /// First flags placed on true mines. A count.
    pub rce: usize,
    /// Chords that revealed something. A count.
    pub dce: usize,
    pub flag: usize,
    pub bbbv_solved: usize,
    pub op_solved: usize,
}

impl Counters {
    pub const fn cl(&self) -> usize {
        self.left + self.right + self.double
    }

    pub const fn ce(&self) -> usize {
        self.lce + self.rce + self.dce
    }

    pub(crate) fn clear_clicks(&mut self) {
        self.left = 0;
        self.right = 0;
        self.double = 0;
        self.flag = 0;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Seconds of play the figures cover.
    pub time: f64,
    pub bbbv: usize,
    pub op: usize,
    pub isl: usize,
    pub cell_counts: [usize; 9],
    pub left: usize,
    pub right: usize,
    pub double: usize,
    pub cl: usize,
    /// Effective left, right and double clicks. These are counts; `corr` and `ioe` hold the
    /// efficiency ratios.
    pub lce: usize,
    pub rce: usize,
    pub dce: usize,
    pub ce: usize,
    pub flag: usize,
    pub bbbv_solved: usize,
    pub op_solved: usize,
    pub left_s: f64,
    pub right_s: f64,
    pub double_s: f64,
    pub cl_s: f64,
    pub ce_s: f64,
    pub flag_s: f64,
    pub bbbv_s: f64,
    pub ioe: f64,
    pub corr: f64,
    pub thrp: f64,
    pub etime: f64,
    pub rqp: f64,
    pub stnb: f64,
    pub path: f64,
}

impl Metrics {
    pub fn new(
        stats: &BoardStats,
        counters: &Counters,
        config: GameConfig,
        time: f64,
        path: f64,
    ) -> Self {
        let cl = counters.cl();
        let ce = counters.ce();
        let solved = counters.bbbv_solved as f64;
        let bbbv = stats.bbbv as f64;

        let rate = |count: usize| {
            if time < MIN_RATE_TIME {
                0.0
            } else {
                count as f64 / time
            }
        };

        let stnb = match stnb_constant(config) {
            Some(c) if time >= MIN_RATE_TIME && bbbv > 0.0 => {
                c * bbbv / time.powf(1.7) * (solved / bbbv).sqrt()
            }
            _ => 0.0,
        };

        Self {
            time,
            bbbv: stats.bbbv,
            op: stats.op,
            isl: stats.isl,
            cell_counts: stats.cell_counts,
            left: counters.left,
            right: counters.right,
            double: counters.double,
            cl,
            lce: counters.lce,
            rce: counters.rce,
            dce: counters.dce,
            ce,
            flag: counters.flag,
            bbbv_solved: counters.bbbv_solved,
            op_solved: counters.op_solved,
            left_s: rate(counters.left),
            right_s: rate(counters.right),
            double_s: rate(counters.double),
            cl_s: rate(cl),
            ce_s: rate(ce),
            flag_s: rate(counters.flag),
            bbbv_s: rate(counters.bbbv_solved),
            ioe: ratio(solved, cl),
            corr: ratio(ce as f64, cl),
            thrp: ratio(solved, ce),
            etime: if counters.bbbv_solved == 0 {
                0.0
            } else {
                time / solved * bbbv
            },
            rqp: if counters.bbbv_solved == 0 {
                0.0
            } else {
                time * time / solved
            },
            stnb,
            path,
        }
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

fn stnb_constant(config: GameConfig) -> Option<f64> {
    match (config.size, config.mines) {
        ((8, 8), 10) => Some(47.299),
        ((16, 16), 40) => Some(153.73),
        ((16, 30), 99) => Some(435.001),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Array2<i8> {
        array![
            [0, 0, 1, -1, 2, -1, 1, 0],
            [0, 0, 2, 2, 3, 1, 1, 0],
            [0, 1, 2, -1, 1, 0, 0, 0],
            [0, 1, -1, 3, 2, 0, 0, 0],
            [2, 3, 3, -1, 2, 1, 1, 0],
            [-1, -1, 2, 2, 3, -1, 1, 0],
            [2, 2, 1, 1, -1, 3, 2, 0],
            [0, 0, 0, 1, 2, -1, 1, 0],
        ]
    }

    #[test]
    fn sample_board_figures() {
        let numbers = sample();
        assert_eq!(bbbv(&numbers), 12);
        assert_eq!(op(&numbers), 3);
        assert_eq!(isl(&numbers), 2);
    }

    #[test]
    fn isolated_numbers_differ_from_islands() {
        let numbers = sample();
        let isolated: Vec<_> = iter_coords(grid_size(&numbers))
            .filter(|&coords| is_isolated_number(&numbers, coords))
            .collect();
        assert_eq!(
            isolated,
            [(0, 4), (1, 3), (3, 3), (4, 2), (5, 2), (5, 3), (5, 4), (6, 5), (7, 4)]
        );
        assert_eq!(isl(&numbers), 2);
    }

    #[test]
    fn all_zero_board_is_one_opening() {
        let numbers = Array2::<i8>::zeros((4, 5));
        assert_eq!(op(&numbers), 1);
        assert_eq!(bbbv(&numbers), 1);
        assert_eq!(isl(&numbers), 0);
    }

    #[test]
    fn all_mine_board_has_nothing_to_click() {
        let numbers = Array2::<i8>::from_elem((3, 3), -1);
        assert_eq!(bbbv(&numbers), 0);
        assert_eq!(op(&numbers), 0);
        assert_eq!(isl(&numbers), 0);
    }

    #[test]
    fn bbbv_of_board_without_zeros_counts_every_number() {
        let numbers = array![[1, -1], [1, 1]];
        assert_eq!(bbbv(&numbers), 3);
        assert_eq!(op(&numbers), 0);
        assert_eq!(isl(&numbers), 1);
    }

    #[test]
    fn cell_counts_skip_mines() {
        let numbers = array![[0, 1, -1], [0, 1, 1]];
        let counts = cell_counts(&numbers);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[1], 3);
        assert_eq!(counts.iter().sum::<usize>(), 5);
    }

    #[test]
    fn opening_map_tracks_solved_openings() {
        let numbers = sample();
        let openings = OpeningMap::new(&numbers);
        let mut board = Board::from_raw(&numbers).unwrap();

        assert_eq!(openings.solved(board.cells()), 0);
        board.reveal((0, 0)).unwrap();
        assert_eq!(openings.solved(board.cells()), 1);
        assert!(openings.opening_at((0, 2)).is_none());
    }

    #[test]
    fn rates_are_zero_at_time_zero() {
        let stats = BoardStats::new(&sample());
        let counters = Counters {
            left: 3,
            bbbv_solved: 2,
            ..Default::default()
        };
        let metrics = Metrics::new(&stats, &counters, GameConfig::BEGINNER, 0.0, 0.0);
        assert_eq!(metrics.left_s, 0.0);
        assert_eq!(metrics.bbbv_s, 0.0);
        assert_eq!(metrics.stnb, 0.0);
    }

    #[test]
    fn derived_ratios_follow_counters() {
        let stats = BoardStats::new(&sample());
        let counters = Counters {
            left: 8,
            right: 2,
            lce: 6,
            rce: 2,
            bbbv_solved: 6,
            ..Default::default()
        };
        let metrics = Metrics::new(&stats, &counters, GameConfig::new((9, 9), 10), 3.0, 0.0);

        assert_eq!(metrics.cl, 10);
        assert_eq!((metrics.lce, metrics.rce, metrics.dce), (6, 2, 0));
        assert_eq!(metrics.ce, 8);
        assert_eq!(metrics.ioe, 0.6);
        assert_eq!(metrics.corr, 0.8);
        assert_eq!(metrics.thrp, 0.75);
        assert_eq!(metrics.bbbv_s, 2.0);
        assert_eq!(metrics.etime, 6.0);
        assert_eq!(metrics.stnb, 0.0);
    }
}
