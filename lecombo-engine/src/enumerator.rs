use rand::rngs::StdRng;

use lecombo_model::models::{Ticket, TicketSignature};

use crate::error::Result;
use crate::progress::Progress;
use crate::strategy::{GenerationStrategy, StrategyInput};

pub const DEFAULT_ENUMERATION_CAP: usize = 500_000;

/// C(n, k), saturé à `u128::MAX`.
pub fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc = 1u128;
    for i in 0..k {
        // acc * (n - i) / (i + 1) reste entier à chaque étape
        acc = match acc.checked_mul((n - i) as u128) {
            Some(v) => v / (i + 1) as u128,
            None => return u128::MAX,
        };
    }
    acc
}

/// Trie et dédoublonne un pool de numéros.
pub fn normalize_pool(pool: &[u8]) -> Vec<u8> {
    let mut sorted = pool.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

/// Parcours lexicographique (par indice dans le pool trié) des k-sous-ensembles.
pub struct Combinations {
    pool: Vec<u8>,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(pool: &[u8], k: usize) -> Self {
        let pool = normalize_pool(pool);
        let done = k == 0 || k > pool.len();
        Self {
            pool,
            indices: (0..k).collect(),
            done,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.done {
            return None;
        }
        let current: Vec<u8> = self.indices.iter().map(|&i| self.pool[i]).collect();

        let n = self.pool.len();
        let k = self.indices.len();
        match (0..k).rev().find(|&i| self.indices[i] < n - k + i) {
            Some(i) => {
                self.indices[i] += 1;
                for j in (i + 1)..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
            }
            None => self.done = true,
        }
        Some(current)
    }
}

/// Énumération exhaustive, tronquée à `cap` tickets.
#[derive(Debug, Clone)]
pub struct CombinationEnumerator {
    cap: usize,
}

impl Default for CombinationEnumerator {
    fn default() -> Self {
        Self::new(DEFAULT_ENUMERATION_CAP)
    }
}

impl CombinationEnumerator {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn enumerate(&self, pool: &[u8], k: usize) -> Vec<Ticket> {
        let total = binomial(normalize_pool(pool).len(), k);
        if total > self.cap as u128 {
            log::warn!(
                "Énumération tronquée : C({}, {}) = {} > plafond {}",
                pool.len(),
                k,
                total,
                self.cap
            );
        }
        Combinations::new(pool, k)
            .take(self.cap)
            .filter_map(|c| Ticket::new(c).ok())
            .collect()
    }
}

impl GenerationStrategy for CombinationEnumerator {
    fn name(&self) -> &str {
        "Exhaustif"
    }

    fn generate(
        &self,
        input: &StrategyInput<'_>,
        _rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<Ticket>> {
        let total = binomial(normalize_pool(input.pool).len(), input.ticket_size)
            .min(self.cap as u128) as usize;
        let wanted = input.count.min(total);
        let mut tickets = Vec::with_capacity(wanted);

        for (visited, combo) in Combinations::new(input.pool, input.ticket_size)
            .take(self.cap)
            .enumerate()
        {
            if tickets.len() >= wanted {
                break;
            }
            if visited % 4096 == 0 {
                progress.checkpoint(visited, total)?;
            }
            if input.exclusions.contains(&TicketSignature::of(&combo)) {
                continue;
            }
            tickets.push(Ticket::new(combo)?);
        }
        Ok(tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TicketHistory;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(17, 15), 136);
        assert_eq!(binomial(60, 6), 50_063_860);
        assert_eq!(binomial(25, 15), 3_268_760);
        assert_eq!(binomial(5, 0), 1);
        assert_eq!(binomial(3, 4), 0);
    }

    #[test]
    fn test_enumerate_17_choose_15() {
        let pool: Vec<u8> = (1..=17).collect();
        let tickets = CombinationEnumerator::default().enumerate(&pool, 15);
        assert_eq!(tickets.len(), 136);

        let unique: HashSet<_> = tickets.iter().map(|t| t.signature()).collect();
        assert_eq!(unique.len(), 136);
        for t in &tickets {
            assert_eq!(t.len(), 15);
            assert!(t.numbers().iter().all(|n| (1..=17).contains(n)));
        }
    }

    #[test]
    fn test_enumerate_lexicographic() {
        let tickets = CombinationEnumerator::default().enumerate(&[4, 1, 3, 2], 2);
        let got: Vec<Vec<u8>> = tickets.iter().map(|t| t.numbers().to_vec()).collect();
        assert_eq!(
            got,
            vec![
                vec![1, 2],
                vec![1, 3],
                vec![1, 4],
                vec![2, 3],
                vec![2, 4],
                vec![3, 4]
            ]
        );
    }

    #[test]
    fn test_enumerate_pool_too_small() {
        let tickets = CombinationEnumerator::default().enumerate(&[1, 2, 3], 4);
        assert!(tickets.is_empty());
    }

    #[test]
    fn test_enumerate_cap() {
        let pool: Vec<u8> = (1..=20).collect();
        let tickets = CombinationEnumerator::new(100).enumerate(&pool, 10);
        assert_eq!(tickets.len(), 100);
    }

    #[test]
    fn test_strategy_skips_exclusions() {
        let pool: Vec<u8> = (1..=6).collect();
        let mut exclusions = TicketHistory::new();
        exclusions.add(TicketSignature::of(&[1, 2, 3, 4, 5]));
        let input = StrategyInput {
            pool: &pool,
            ticket_size: 5,
            count: 10,
            exclusions: &exclusions,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let tickets = CombinationEnumerator::default()
            .generate(&input, &mut rng, &mut Progress::silent())
            .unwrap();
        assert_eq!(tickets.len(), 5);
        assert!(tickets.iter().all(|t| !exclusions.contains_ticket(t)));
    }
}
