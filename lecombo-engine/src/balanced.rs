use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use lecombo_model::models::{Ticket, TicketSignature};

use crate::config::EngineConfig;
use crate::enumerator::{binomial, normalize_pool};
use crate::error::Result;
use crate::history::TicketHistory;
use crate::progress::Progress;
use crate::strategy::{GenerationStrategy, StrategyInput};

const REFILL_AFTER_REJECTIONS: usize = 8;
/// Borne des allocations initiales ; au-delà, le paquet se regarnit au fil des tirages.
const MAX_PREALLOC: usize = 1 << 16;

/// Matrice équilibrée : chaque numéro du pool apparaît à peu près le même nombre
/// de fois dans le lot. Propriété statistique, pas de garantie combinatoire.
#[derive(Debug, Clone)]
pub struct BalancedMatrixBuilder {
    max_retries: usize,
    progress_chunk: usize,
}

impl Default for BalancedMatrixBuilder {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl BalancedMatrixBuilder {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.balanced_max_retries.max(1),
            progress_chunk: config.progress_chunk.max(1),
        }
    }

    pub fn build(
        &self,
        pool: &[u8],
        ticket_size: usize,
        total_tickets: usize,
        exclusions: &TicketHistory,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<Ticket>> {
        let pool = normalize_pool(pool);
        if ticket_size == 0 || pool.len() < ticket_size || total_tickets == 0 {
            return Ok(Vec::new());
        }

        // Jamais plus de tickets que de combinaisons distinctes
        let possible = binomial(pool.len(), ticket_size);
        let reachable = (total_tickets as u128).min(possible) as usize;

        // Paquet virtuel : chaque numéro répété ceil(k * N / m) fois
        let per_number = ticket_size
            .saturating_mul(reachable)
            .div_ceil(pool.len())
            .min(MAX_PREALLOC);
        let mut deck: Vec<u8> = pool
            .iter()
            .flat_map(|&n| std::iter::repeat(n).take(per_number))
            .collect();
        deck.shuffle(rng);

        let capacity = reachable.min(MAX_PREALLOC);
        let mut seen: HashSet<TicketSignature> = HashSet::with_capacity(capacity);
        let mut tickets = Vec::with_capacity(capacity);

        'batch: while tickets.len() < reachable {
            let mut attempts = 0usize;
            loop {
                let numbers = draw_distinct(&mut deck, &pool, ticket_size, rng);
                let signature = TicketSignature::of(&numbers);
                if !exclusions.contains(&signature) && seen.insert(signature) {
                    tickets.push(Ticket::new(numbers)?);
                    break;
                }
                // Ticket refusé : ses numéros retournent dans le paquet
                for n in numbers {
                    insert_random(&mut deck, n, rng);
                }
                attempts += 1;
                if attempts >= self.max_retries {
                    log::warn!(
                        "Matrice équilibrée : {} tentatives sans ticket nouveau, arrêt à {}/{}",
                        attempts,
                        tickets.len(),
                        total_tickets
                    );
                    break 'batch;
                }
                // Refus en série : le reste du paquet ne recompose plus que des tickets
                // connus, on le regarnit avec le pool de base
                if attempts % REFILL_AFTER_REJECTIONS == 0 {
                    deck.extend_from_slice(&pool);
                    deck.shuffle(rng);
                }
            }
            if tickets.len() % self.progress_chunk == 0 {
                progress.checkpoint(tickets.len(), reachable)?;
            }
        }

        Ok(tickets)
    }
}

/// Tire `size` numéros distincts depuis la fin du paquet. Les doublons sont mis de
/// côté puis réinsérés ; un paquet vide est regarni avec le pool de base.
fn draw_distinct(deck: &mut Vec<u8>, pool: &[u8], size: usize, rng: &mut StdRng) -> Vec<u8> {
    let mut picked = Vec::with_capacity(size);
    let mut held = Vec::new();

    while picked.len() < size {
        match deck.pop() {
            Some(n) if picked.contains(&n) => held.push(n),
            Some(n) => picked.push(n),
            None => {
                deck.extend_from_slice(pool);
                deck.append(&mut held);
                deck.shuffle(rng);
            }
        }
    }

    for n in held {
        insert_random(deck, n, rng);
    }
    picked
}

fn insert_random(deck: &mut Vec<u8>, n: u8, rng: &mut StdRng) {
    deck.push(n);
    let last = deck.len() - 1;
    let j = rng.random_range(0..=last);
    deck.swap(j, last);
}

impl GenerationStrategy for BalancedMatrixBuilder {
    fn name(&self) -> &str {
        "Matrice équilibrée"
    }

    fn generate(
        &self,
        input: &StrategyInput<'_>,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<Ticket>> {
        self.build(
            input.pool,
            input.ticket_size,
            input.count,
            input.exclusions,
            rng,
            progress,
        )
    }
}
