use rand::prelude::*;
use rayon::prelude::*;

use super::*;

/// Random layout with a safe opening cell and no other guarantee.
pub fn lay_mine(config: GameConfig, open: Coord2, seed: u64) -> Result<MineLayout> {
    if config.mines >= config.total_cells() {
        return Err(GameError::TooManyMines);
    }
    RandomLayoutGenerator::new(seed, open, StartTile::SimpleSafe).generate(config)
}

/// Draws zero-opening layouts until one can be cleared from `open` without guessing.
///
/// Every attempt draws from the same seeded generator, so a given seed always gives the same
/// layout or fails after the same number of attempts.
pub fn laymine_solvable(
    config: GameConfig,
    open: Coord2,
    max_attempts: u32,
    seed: u64,
) -> Result<MineLayout> {
    laymine_solvable_with_limits(config, open, max_attempts, seed, SolverLimits::default())
}

pub fn laymine_solvable_with_limits(
    config: GameConfig,
    open: Coord2,
    max_attempts: u32,
    seed: u64,
    limits: SolverLimits,
) -> Result<MineLayout> {
    check_zero_opening(config, open)?;

    let generator = RandomLayoutGenerator::new(seed, open, StartTile::AlwaysZero);
    let mut rng = SmallRng::seed_from_u64(seed);
    for attempt in 1..=max_attempts {
        let layout = generator.generate_with_rng(config, &mut rng)?;
        if accepts(&layout, open, limits) {
            log::debug!("solvable layout found after {attempt} attempts");
            return Ok(layout);
        }
    }

    Err(GameError::GenerationExhausted {
        attempts: max_attempts,
    })
}

/// Same search as [`laymine_solvable_with_limits`], spread over the rayon thread pool.
///
/// Attempt `n` draws from its own generator seeded from `seed` and `n`. The lowest solvable
/// attempt wins, so a given seed gives the same layout on any number of threads, though not the
/// one the sequential search picks.
pub fn laymine_solvable_parallel(
    config: GameConfig,
    open: Coord2,
    max_attempts: u32,
    seed: u64,
    limits: SolverLimits,
) -> Result<MineLayout> {
    check_zero_opening(config, open)?;

    let generator = RandomLayoutGenerator::new(seed, open, StartTile::AlwaysZero);
    let found = (0..max_attempts).into_par_iter().find_map_first(|attempt| {
        let mut rng = SmallRng::seed_from_u64(attempt_seed(seed, attempt));
        match generator.generate_with_rng(config, &mut rng) {
            Ok(layout) if accepts(&layout, open, limits) => {
                log::debug!("solvable layout found on attempt {attempt}");
                Some(Ok(layout))
            }
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        }
    });

    found.unwrap_or(Err(GameError::GenerationExhausted {
        attempts: max_attempts,
    }))
}

/// The start cell and its neighbours must fit next to the mines.
fn check_zero_opening(config: GameConfig, open: Coord2) -> Result<()> {
    if open.0 >= config.size.0 || open.1 >= config.size.1 {
        return Err(GameError::InvalidCoords);
    }

    let opening = 1 + NeighborIter::new(open, config.size).count() as CellCount;
    match config.mines.checked_add(opening) {
        Some(needed) if needed <= config.total_cells() => Ok(()),
        _ => Err(GameError::TooManyMines),
    }
}

fn accepts(layout: &MineLayout, open: Coord2, limits: SolverLimits) -> bool {
    !has_forced_guess(layout) && is_solvable(layout, open, limits)
}

fn attempt_seed(seed: u64, attempt: u32) -> u64 {
    seed ^ u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
