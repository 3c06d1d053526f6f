use serde::{Deserialize, Serialize};

use crate::*;
pub use no_guess::*;
pub use random::*;

mod no_guess;
mod random;

pub trait LayoutGenerator {
    fn generate(self, config: GameConfig) -> Result<MineLayout>;
}

/// How much of the opening click is kept free of mines.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartTile {
    Random,
    /// The start cell itself is safe.
    SimpleSafe,
    /// The start cell and all its neighbours are safe, so it opens as a zero.
    AlwaysZero,
}
