use crate::*;

/// Mine patterns along a board edge that leave a guess no clue can settle.
///
/// Cells are `(along, depth)`: `along` runs parallel to the edge from the start of the pattern,
/// `depth` counts rows inward from the edge.
struct EdgePattern {
    len: Coord,
    mines: &'static [(Coord, Coord)],
    safe: &'static [(Coord, Coord)],
    /// Pairs holding exactly one mine.
    one_of: &'static [[(Coord, Coord); 2]],
}

const EDGE_PATTERNS: &[EdgePattern] = &[
    // two mine pairs fence a 1-of-2 along the edge
    EdgePattern {
        len: 4,
        mines: &[(0, 0), (0, 1), (3, 0), (3, 1)],
        safe: &[],
        one_of: &[[(1, 0), (2, 0)]],
    },
    // a mine wall cuts off a 1-of-2 pointing inward
    EdgePattern {
        len: 3,
        mines: &[(0, 2), (1, 2), (2, 2)],
        safe: &[],
        one_of: &[[(1, 0), (1, 1)]],
    },
    // a safe cell walled in by mines
    EdgePattern {
        len: 3,
        mines: &[(0, 0), (0, 1), (1, 1), (2, 1), (2, 0)],
        safe: &[(1, 0)],
        one_of: &[],
    },
    // an alternating chain of four cells between two posts
    EdgePattern {
        len: 4,
        mines: &[(0, 2), (3, 2)],
        safe: &[],
        one_of: &[[(1, 0), (1, 1)], [(1, 1), (2, 1)], [(2, 1), (2, 0)]],
    },
];

const DEPTH: Coord = 3;

#[derive(Copy, Clone, Debug)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Top, Self::Bottom];

    /// Cells along the edge and cells inward from it.
    fn extent(self, (rows, cols): Coord2) -> (Coord, Coord) {
        match self {
            Self::Left | Self::Right => (rows, cols),
            Self::Top | Self::Bottom => (cols, rows),
        }
    }

    fn coords(self, (rows, cols): Coord2, along: Coord, depth: Coord) -> Coord2 {
        match self {
            Self::Left => (along, depth),
            Self::Right => (along, cols - 1 - depth),
            Self::Top => (depth, along),
            Self::Bottom => (rows - 1 - depth, along),
        }
    }
}

/// Whether the layout holds one of the known edge patterns that force a guess.
///
/// A match means a zero opening cannot clear the board on clues alone. A miss proves nothing.
pub fn has_forced_guess(layout: &MineLayout) -> bool {
    let size = layout.size();
    Edge::ALL.into_iter().any(|edge| {
        let (length, inward) = edge.extent(size);
        if inward < DEPTH {
            return false;
        }
        EDGE_PATTERNS.iter().any(|pattern| {
            length >= pattern.len
                && (0..=length - pattern.len).any(|start| {
                    let mine = |&(along, depth): &(Coord, Coord)| {
                        layout.contains_mine(edge.coords(size, start + along, depth))
                    };
                    pattern.mines.iter().all(&mine)
                        && !pattern.safe.iter().any(&mine)
                        && pattern
                            .one_of
                            .iter()
                            .all(|[a, b]| mine(a) != mine(b))
                })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_pair_on_left_edge() {
        let layout =
            MineLayout::from_mine_coords((5, 5), &[(0, 0), (0, 1), (3, 0), (3, 1), (1, 0)])
                .unwrap();
        assert!(has_forced_guess(&layout));
        assert!(!is_solvable(&layout, (4, 4), SolverLimits::default()));
    }

    #[test]
    fn fenced_pair_needs_exactly_one_mine() {
        let layout =
            MineLayout::from_mine_coords((5, 5), &[(0, 0), (0, 1), (3, 0), (3, 1)]).unwrap();
        assert!(!has_forced_guess(&layout));
    }

    #[test]
    fn walled_cell_on_bottom_edge() {
        let layout = MineLayout::from_mine_coords(
            (5, 6),
            &[(4, 1), (3, 1), (3, 2), (3, 3), (4, 3)],
        )
        .unwrap();
        assert!(has_forced_guess(&layout));
    }

    #[test]
    fn chain_on_right_edge() {
        // rows 2..=3 of the last two columns alternate between the posts in column 2
        let layout = MineLayout::from_mine_coords(
            (6, 5),
            &[(1, 2), (4, 2), (2, 4), (2, 3), (3, 3)],
        )
        .unwrap();
        assert!(!has_forced_guess(&layout));

        let layout =
            MineLayout::from_mine_coords((6, 5), &[(1, 2), (4, 2), (2, 3), (3, 4)]).unwrap();
        assert!(has_forced_guess(&layout));
    }

    #[test]
    fn small_boards_have_no_patterns() {
        let layout = MineLayout::from_mine_coords((2, 2), &[(0, 0)]).unwrap();
        assert!(!has_forced_guess(&layout));
    }

    #[test]
    fn single_mine_has_no_pattern() {
        let layout = MineLayout::from_mine_coords((8, 8), &[(3, 3)]).unwrap();
        assert!(!has_forced_guess(&layout));
    }
}
