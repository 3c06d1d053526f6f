use super::*;

/// Mine probability used for the unconstrained pool when no mine count is available
/// and no island gives a density to borrow.
pub(crate) const FALLBACK_DENSITY: f64 = 0.5;

/// `ln(n!)` for every `n` up to a bound.
struct LnFactorials(Vec<f64>);

impl LnFactorials {
    fn new(max: usize) -> Self {
        let mut table = Vec::with_capacity(max + 1);
        let mut acc = 0.0;
        table.push(acc);
        for n in 1..=max {
            acc += (n as f64).ln();
            table.push(acc);
        }
        Self(table)
    }

    /// `ln C(n, k)`, `None` outside `0..=n`.
    fn ln_choose(&self, n: usize, k: i64) -> Option<f64> {
        if k < 0 || k as usize > n {
            return None;
        }
        let k = k as usize;
        Some(self.0[n] - self.0[k] - self.0[n - k])
    }
}

fn convolve(left: &[f64], right: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; left.len() + right.len() - 1];
    for (i, &a) in left.iter().enumerate() {
        if a == 0.0 {
            continue;
        }
        for (j, &b) in right.iter().enumerate() {
            out[i + j] += a * b;
        }
    }

    // only ratios matter, keep magnitudes bounded
    let max = out.iter().copied().fold(0.0, f64::max);
    if max > 0.0 {
        out.iter_mut().for_each(|value| *value /= max);
    }
    out
}

fn log_sum_exp(terms: &[f64]) -> Option<f64> {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return None;
    }
    Some(max + terms.iter().map(|term| (term - max).exp()).sum::<f64>().ln())
}

/// Per-variable mine probability for every cell the island report covers.
///
/// `remaining_mines` is the mine count minus every mine already known. When it is given, island
/// assignments are weighted by the number of ways the leftover mines fit into the pool of free and
/// undetermined cells. Entries for cells outside the report stay `None`.
pub fn mine_probabilities(
    report: &IslandReport,
    remaining_mines: Option<usize>,
    variable_count: usize,
) -> (Vec<Option<f64>>, Option<Contradiction>) {
    let mut probabilities = vec![None; variable_count];
    let pool: Vec<usize> = report
        .free
        .iter()
        .chain(&report.undetermined)
        .copied()
        .collect();

    let weighted = remaining_mines.and_then(|mines| weighted(report, mines, pool.len()));
    let contradiction = match (remaining_mines, &weighted) {
        (Some(_), None) => Some(Contradiction::GlobalMineCountImpossible {
            target_mines: remaining_mines.map_or(0, |mines| mines as i32),
            available_variables: pool.len()
                + report
                    .solved
                    .iter()
                    .map(|island| island.variable_ids.len())
                    .sum::<usize>(),
        }),
        _ => None,
    };

    match weighted {
        Some(Weighted { islands, pool: pool_probability }) => {
            for (island, island_probabilities) in report.solved.iter().zip(islands) {
                for (&var, probability) in island.variable_ids.iter().zip(island_probabilities) {
                    probabilities[var] = Some(probability);
                }
            }
            for &var in &pool {
                probabilities[var] = Some(pool_probability);
            }
        }
        None => {
            let mut expected_mines = 0.0;
            let mut island_cells = 0;
            for island in &report.solved {
                let total = island.total() as f64;
                for (index, &var) in island.variable_ids.iter().enumerate() {
                    let mined = island.mine_counts[index].iter().sum::<u64>() as f64;
                    probabilities[var] = Some(mined / total);
                    expected_mines += mined / total;
                }
                island_cells += island.variable_ids.len();
            }

            let density = if island_cells > 0 {
                expected_mines / island_cells as f64
            } else {
                FALLBACK_DENSITY
            };
            for &var in &pool {
                probabilities[var] = Some(density);
            }
        }
    }

    (probabilities, contradiction)
}

struct Weighted {
    islands: Vec<Vec<f64>>,
    pool: f64,
}

fn weighted(report: &IslandReport, mines: usize, pool_size: usize) -> Option<Weighted> {
    let factorials = LnFactorials::new(pool_size);
    let mines = mines as i64;
    let distributions: Vec<Vec<f64>> = report
        .solved
        .iter()
        .map(|island| island.by_mines.iter().map(|&count| count as f64).collect())
        .collect();

    let count = distributions.len();
    let mut prefix = vec![vec![1.0]];
    for distribution in &distributions {
        let next = convolve(prefix.last().map_or(&[1.0][..], Vec::as_slice), distribution);
        prefix.push(next);
    }
    let mut suffix = vec![vec![1.0]; count + 1];
    for index in (0..count).rev() {
        suffix[index] = convolve(&distributions[index], &suffix[index + 1]);
    }

    // weight of each island total, times the ways to place the rest in the pool
    let all = &prefix[count];
    let terms: Vec<(usize, f64)> = all
        .iter()
        .enumerate()
        .filter(|(_, weight)| **weight > 0.0)
        .filter_map(|(placed, weight)| {
            factorials
                .ln_choose(pool_size, mines - placed as i64)
                .map(|ln_ways| (placed, weight.ln() + ln_ways))
        })
        .collect();
    let total = log_sum_exp(&terms.iter().map(|(_, term)| *term).collect::<Vec<_>>())?;

    let pool = if pool_size == 0 {
        0.0
    } else {
        terms
            .iter()
            .map(|&(placed, term)| {
                (term - total).exp() * (mines - placed as i64) as f64 / pool_size as f64
            })
            .sum()
    };

    let mut islands = Vec::with_capacity(count);
    for (index, island) in report.solved.iter().enumerate() {
        let others = convolve(&prefix[index], &suffix[index + 1]);

        // ln of the weight of the rest of the board given this island places `k` mines
        let rest: Vec<Option<f64>> = (0..island.by_mines.len())
            .map(|k| {
                let terms: Vec<f64> = others
                    .iter()
                    .enumerate()
                    .filter(|(_, weight)| **weight > 0.0)
                    .filter_map(|(placed, weight)| {
                        factorials
                            .ln_choose(pool_size, mines - k as i64 - placed as i64)
                            .map(|ln_ways| weight.ln() + ln_ways)
                    })
                    .collect();
                log_sum_exp(&terms)
            })
            .collect();

        let island_terms: Vec<f64> = island
            .by_mines
            .iter()
            .zip(&rest)
            .filter(|(count, _)| **count > 0)
            .filter_map(|(&count, rest)| rest.map(|rest| (count as f64).ln() + rest))
            .collect();
        let island_total = log_sum_exp(&island_terms)?;

        let probabilities = island
            .mine_counts
            .iter()
            .map(|mined| {
                mined
                    .iter()
                    .zip(&rest)
                    .filter(|(count, _)| **count > 0)
                    .filter_map(|(&count, rest)| {
                        rest.map(|rest| ((count as f64).ln() + rest - island_total).exp())
                    })
                    .sum::<f64>()
                    .clamp(0.0, 1.0)
            })
            .collect();
        islands.push(probabilities);
    }

    Some(Weighted { islands, pool })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn island(variable_ids: Vec<usize>, by_mines: Vec<u64>, mine_counts: Vec<Vec<u64>>) -> IslandSolutions {
        IslandSolutions {
            variable_ids,
            by_mines,
            mine_counts,
        }
    }

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn ln_choose_matches_small_values() {
        let factorials = LnFactorials::new(10);
        assert!(close(factorials.ln_choose(10, 3).unwrap().exp(), 120.0));
        assert!(factorials.ln_choose(4, 5).is_none());
        assert!(factorials.ln_choose(4, -1).is_none());
    }

    #[test]
    fn free_pool_shares_remaining_mines() {
        let report = IslandReport {
            free: vec![0, 1, 2, 3],
            ..Default::default()
        };

        let (probabilities, contradiction) = mine_probabilities(&report, Some(1), 4);

        assert!(contradiction.is_none());
        assert!(probabilities.iter().all(|p| close(p.unwrap(), 0.25)));
    }

    #[test]
    fn island_weighting_uses_pool_size() {
        // island {0, 1}: either one mine on 0 (one way) or mines on both (one way)
        // pool {2, 3, 4} with two mines left in total
        let report = IslandReport {
            solved: vec![island(vec![0, 1], vec![0, 1, 1], vec![vec![0, 1, 1], vec![0, 0, 1]])],
            free: vec![2, 3, 4],
            ..Default::default()
        };

        let (probabilities, _) = mine_probabilities(&report, Some(2), 5);

        // one mine on the island leaves C(3, 1) = 3 layouts, two mines leave C(3, 0) = 1
        assert!(close(probabilities[0].unwrap(), 1.0));
        assert!(close(probabilities[1].unwrap(), 0.25));
        assert!(close(probabilities[2].unwrap(), 0.75 / 3.0));
    }

    #[test]
    fn impossible_count_falls_back_to_island_ratios() {
        let report = IslandReport {
            solved: vec![island(vec![0, 1], vec![0, 2, 0], vec![vec![0, 1, 0], vec![0, 1, 0]])],
            ..Default::default()
        };

        let (probabilities, contradiction) = mine_probabilities(&report, Some(5), 2);

        assert!(contradiction.is_some());
        assert!(close(probabilities[0].unwrap(), 0.5));
    }

    #[test]
    fn unknown_count_uses_island_density_for_pool() {
        let report = IslandReport {
            solved: vec![island(vec![0, 1], vec![0, 2, 0], vec![vec![0, 1, 0], vec![0, 1, 0]])],
            free: vec![2],
            ..Default::default()
        };

        let (probabilities, contradiction) = mine_probabilities(&report, None, 3);

        assert!(contradiction.is_none());
        assert!(close(probabilities[2].unwrap(), 0.5));
    }
}
