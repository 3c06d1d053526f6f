use ndarray::Array2;
use rand::prelude::*;

use super::*;

/// Generation strategy that can optionally try to make the starting cell zero or at least safe, but other than that is
/// purely random.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomLayoutGenerator {
    seed: u64,
    start: Coord2,
    start_tile: StartTile,
}

impl RandomLayoutGenerator {
    pub fn new(seed: u64, start: Coord2, start_tile: StartTile) -> Self {
        Self {
            seed,
            start,
            start_tile,
        }
    }

    /// Cells kept free for `start_tile`, start cell included.
    fn reserved_cells(&self, config: GameConfig, start_tile: StartTile) -> Vec<Coord2> {
        match start_tile {
            StartTile::Random => Vec::new(),
            StartTile::SimpleSafe => vec![self.start],
            StartTile::AlwaysZero => core::iter::once(self.start)
                .chain(NeighborIter::new(self.start, config.size))
                .collect(),
        }
    }

    /// Resolves the requested start tile against the room left on the board.
    fn effective_start_tile(&self, config: GameConfig) -> StartTile {
        use StartTile::*;

        let total_cells = config.total_cells();
        let zero_cells = self.reserved_cells(config, AlwaysZero).len() as CellCount;
        match self.start_tile {
            Random => Random,
            SimpleSafe | AlwaysZero if config.mines + 1 > total_cells => {
                log::warn!("Cannot make start cell safe, fallback to random");
                Random
            }
            SimpleSafe => SimpleSafe,
            AlwaysZero if config.mines + zero_cells > total_cells => {
                log::warn!("Cannot make start cell zero, fallback to simple safe");
                SimpleSafe
            }
            AlwaysZero => AlwaysZero,
        }
    }

    /// Places the mines drawing from `rng`, so repeated calls continue one random sequence.
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        config: GameConfig,
        rng: &mut R,
    ) -> Result<MineLayout> {
        if self.start.0 >= config.size.0 || self.start.1 >= config.size.1 {
            return Err(GameError::InvalidCoords);
        }

        let total_cells = config.total_cells();

        // optimize for full boards
        if config.mines >= total_cells {
            if config.mines > total_cells {
                log::warn!(
                    "Layout already full, generated anyway, requested {} but only fits {}",
                    config.mines,
                    total_cells
                );
            }
            return MineLayout::from_mine_mask(Array2::from_elem(config.size.to_nd_index(), true));
        }

        let start_tile = self.effective_start_tile(config);
        let reserved = self.reserved_cells(config, start_tile);

        // reserved cells are marked as mines while placing, then cleared
        let mut mines: Array2<bool> = Array2::default(config.size.to_nd_index());
        for &coords in &reserved {
            mines[coords.to_nd_index()] = true;
        }
        let mut free_cells = total_cells - reserved.len() as CellCount;
        let mut mines_placed = 0;

        {
            let cells = mines
                .as_slice_mut()
                .ok_or(GameError::InvalidBoardShape)?;
            while mines_placed < config.mines {
                if free_cells == 0 {
                    break;
                }
                let mut place: usize = rng.random_range(0..free_cells as usize);
                for (i, cell) in cells.iter_mut().enumerate() {
                    if *cell {
                        place += 1;
                    }
                    if i == place {
                        *cell = true;
                        mines_placed += 1;
                        free_cells -= 1;
                        break;
                    }
                }
            }
        }

        for &coords in &reserved {
            mines[coords.to_nd_index()] = false;
        }

        let layout = MineLayout::from_mine_mask(mines)?;
        if layout.mine_count() != config.mines {
            log::warn!(
                "Generated layout count mismatch, actual: {}, requested: {}",
                layout.mine_count(),
                config.mines
            );
        }
        Ok(layout)
    }
}

impl LayoutGenerator for RandomLayoutGenerator {
    fn generate(self, config: GameConfig) -> Result<MineLayout> {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        self.generate_with_rng(config, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_layout() {
        let config = GameConfig::EXPERT;
        let a = RandomLayoutGenerator::new(7, (3, 4), StartTile::Random).generate(config);
        let b = RandomLayoutGenerator::new(7, (3, 4), StartTile::Random).generate(config);
        assert_eq!(a, b);
        assert_eq!(a.unwrap().mine_count(), 99);
    }

    #[test]
    fn always_zero_clears_the_neighbourhood() {
        let config = GameConfig::new_unchecked((9, 9), 70);
        for seed in 0..20 {
            let layout = RandomLayoutGenerator::new(seed, (4, 4), StartTile::AlwaysZero)
                .generate(config)
                .unwrap();
            assert_eq!(layout.mine_count(), 70);
            assert!(!layout.contains_mine((4, 4)));
            assert_eq!(layout.adjacent_mine_count((4, 4)), 0);
        }
    }

    #[test]
    fn corner_start_reserves_only_four_cells() {
        // 5 free cells beside a corner zero fit exactly
        let config = GameConfig::new_unchecked((3, 3), 5);
        let layout = RandomLayoutGenerator::new(1, (0, 0), StartTile::AlwaysZero)
            .generate(config)
            .unwrap();
        assert_eq!(layout.adjacent_mine_count((0, 0)), 0);
        assert_eq!(layout.mine_count(), 5);
    }

    #[test]
    fn crowded_board_falls_back_to_simple_safe() {
        let config = GameConfig::new_unchecked((3, 3), 8);
        let layout = RandomLayoutGenerator::new(3, (1, 1), StartTile::AlwaysZero)
            .generate(config)
            .unwrap();
        assert!(!layout.contains_mine((1, 1)));
        assert_eq!(layout.mine_count(), 8);
    }

    #[test]
    fn full_board_is_all_mines() {
        let config = GameConfig::new_unchecked((2, 2), 4);
        let layout = RandomLayoutGenerator::new(0, (0, 0), StartTile::SimpleSafe)
            .generate(config)
            .unwrap();
        assert_eq!(layout.mine_count(), 4);
    }

    #[test]
    fn start_outside_board_is_rejected() {
        let result = RandomLayoutGenerator::new(0, (8, 0), StartTile::Random)
            .generate(GameConfig::BEGINNER);
        assert_eq!(result, Err(GameError::InvalidCoords));
    }
}
