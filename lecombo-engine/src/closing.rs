use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::Rng;

use lecombo_model::models::{Ticket, TicketSignature};

use crate::balanced::BalancedMatrixBuilder;
use crate::config::EngineConfig;
use crate::enumerator::{binomial, normalize_pool};
use crate::error::Result;
use crate::history::TicketHistory;
use crate::progress::Progress;
use crate::strategy::{GenerationStrategy, StrategyInput};

/// Appelle `f` pour chaque sous-ensemble de taille `t` de `items`, en ordre lexicographique.
fn for_each_subset(items: &[usize], t: usize, mut f: impl FnMut(&[usize])) {
    let k = items.len();
    if t == 0 || t > k {
        return;
    }
    let mut idx: Vec<usize> = (0..t).collect();
    let mut buf = vec![0usize; t];
    loop {
        for (slot, &i) in buf.iter_mut().zip(&idx) {
            *slot = items[i];
        }
        f(&buf);
        match (0..t).rev().find(|&i| idx[i] < k - t + i) {
            Some(i) => {
                idx[i] += 1;
                for j in (i + 1)..t {
                    idx[j] = idx[j - 1] + 1;
                }
            }
            None => break,
        }
    }
}

/// Suivi des t-sous-ensembles (indices du pool trié) déjà couverts.
/// Rang colexicographique : rank(c_0 < ... < c_{t-1}) = Σ C(c_i, i + 1).
struct CoverageTracker {
    m: usize,
    t: usize,
    binom: Vec<Vec<u128>>,
    covered: Vec<bool>,
    remaining: usize,
    uncovered_per_index: Vec<usize>,
    cursor: usize,
}

impl CoverageTracker {
    fn new(m: usize, t: usize, cap: usize) -> Option<Self> {
        if t == 0 || t > m {
            return None;
        }
        let total = binomial(m, t);
        if total > cap as u128 {
            return None;
        }
        let total = total as usize;

        let mut binom = vec![vec![0u128; t + 1]; m + 1];
        for n in 0..=m {
            binom[n][0] = 1;
            for r in 1..=t.min(n) {
                binom[n][r] = binom[n - 1][r - 1].saturating_add(binom[n - 1][r]);
            }
        }

        let per_index = binomial(m - 1, t - 1) as usize;
        Some(Self {
            m,
            t,
            binom,
            covered: vec![false; total],
            remaining: total,
            uncovered_per_index: vec![per_index; m],
            cursor: 0,
        })
    }

    fn total(&self) -> usize {
        self.covered.len()
    }

    fn covered_count(&self) -> usize {
        self.total() - self.remaining
    }

    fn rank(&self, subset: &[usize]) -> usize {
        subset
            .iter()
            .enumerate()
            .map(|(i, &c)| self.binom[c][i + 1] as usize)
            .sum()
    }

    fn unrank(&self, rank: usize) -> Vec<usize> {
        let mut r = rank as u128;
        let mut c = self.m;
        let mut subset = vec![0usize; self.t];
        for i in (1..=self.t).rev() {
            c -= 1;
            while self.binom[c][i] > r {
                c -= 1;
            }
            subset[i - 1] = c;
            r -= self.binom[c][i];
        }
        subset
    }

    fn cover_rank(&mut self, rank: usize, subset: &[usize]) -> bool {
        if self.covered[rank] {
            return false;
        }
        self.covered[rank] = true;
        self.remaining -= 1;
        for &c in subset {
            self.uncovered_per_index[c] -= 1;
        }
        true
    }

    /// Marque tous les t-sous-ensembles du ticket ; retourne le nombre de nouveaux.
    fn mark(&mut self, ticket: &[usize]) -> usize {
        let mut ranks = Vec::new();
        for_each_subset(ticket, self.t, |subset| ranks.push((self.rank(subset), subset.to_vec())));
        ranks
            .into_iter()
            .filter(|(rank, subset)| self.cover_rank(*rank, subset))
            .count()
    }

    fn abandon(&mut self, rank: usize) {
        let subset = self.unrank(rank);
        self.cover_rank(rank, &subset);
    }

    fn first_uncovered(&mut self) -> Option<usize> {
        while self.cursor < self.covered.len() {
            if !self.covered[self.cursor] {
                return Some(self.cursor);
            }
            self.cursor += 1;
        }
        None
    }

    fn random_uncovered(&mut self, rng: &mut StdRng) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        for _ in 0..16 {
            let rank = rng.random_range(0..self.covered.len());
            if !self.covered[rank] {
                return Some(rank);
            }
        }
        self.first_uncovered()
    }
}

/// Résultat brut de la phase de couverture.
#[derive(Debug, Clone)]
pub struct CoverOutcome {
    pub tickets: Vec<Ticket>,
    pub covered: usize,
    pub total: usize,
    pub abandoned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageReport {
    pub covered: usize,
    pub total: usize,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.covered == self.total
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.covered as f64 / self.total as f64
        }
    }
}

/// Mesure combien de `guarantee`-sous-ensembles du pool sont contenus dans au moins un ticket.
/// `None` si l'univers dépasse `cap`.
pub fn coverage_report(
    tickets: &[Ticket],
    pool: &[u8],
    guarantee: usize,
    cap: usize,
) -> Option<CoverageReport> {
    let pool = normalize_pool(pool);
    let mut tracker = CoverageTracker::new(pool.len(), guarantee, cap)?;
    for ticket in tickets {
        let idx: Vec<usize> = ticket
            .numbers()
            .iter()
            .filter_map(|n| pool.binary_search(n).ok())
            .collect();
        tracker.mark(&idx);
    }
    Some(CoverageReport {
        covered: tracker.covered_count(),
        total: tracker.total(),
    })
}

#[derive(Debug, Clone)]
struct ClosingParams {
    guarantee: usize,
    universe_cap: usize,
    max_retries: usize,
    window: usize,
    chunk: usize,
    balanced: BalancedMatrixBuilder,
}

impl ClosingParams {
    fn new(guarantee: usize, config: &EngineConfig) -> Self {
        Self {
            guarantee,
            universe_cap: config.coverage_universe_cap,
            max_retries: config.closing_max_retries.max(1),
            window: config.candidate_window,
            chunk: config.progress_chunk.max(1),
            balanced: BalancedMatrixBuilder::from_config(config),
        }
    }

    /// Heuristique gloutonne : on part d'un t-sous-ensemble non couvert et on le complète
    /// avec les numéros qui apparaissent dans le plus de t-sous-ensembles encore libres.
    #[allow(clippy::too_many_arguments)]
    fn cover(
        &self,
        pool: &[u8],
        ticket_size: usize,
        limit: usize,
        exclusions: &TicketHistory,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
        deterministic: bool,
    ) -> Result<CoverOutcome> {
        let pool = normalize_pool(pool);
        let t = self.guarantee;
        let empty = CoverOutcome {
            tickets: Vec::new(),
            covered: 0,
            total: 0,
            abandoned: 0,
        };
        if ticket_size == 0 || ticket_size > pool.len() || t == 0 || t > ticket_size || limit == 0 {
            return Ok(empty);
        }
        let Some(mut tracker) = CoverageTracker::new(pool.len(), t, self.universe_cap) else {
            log::warn!(
                "Univers de couverture trop grand : C({}, {}) > {}",
                pool.len(),
                t,
                self.universe_cap
            );
            return Ok(empty);
        };

        let need = ticket_size - t;
        let mut produced: HashSet<TicketSignature> = HashSet::new();
        let mut tickets = Vec::new();
        let mut abandoned = 0usize;
        let mut steps = 0usize;

        while tickets.len() < limit && tracker.remaining > 0 {
            let seed_rank = if deterministic {
                tracker.first_uncovered()
            } else {
                tracker.random_uncovered(rng)
            };
            let Some(seed_rank) = seed_rank else { break };
            let seed = tracker.unrank(seed_rank);

            let mut order: Vec<usize> = (0..pool.len()).filter(|i| !seed.contains(i)).collect();
            if !deterministic {
                order.shuffle(rng);
            }
            // Tri stable : à égalité, l'ordre précédent (indice ou hasard) départage
            order.sort_by(|&a, &b| {
                tracker.uncovered_per_index[b].cmp(&tracker.uncovered_per_index[a])
            });

            let attempts = if need == 0 {
                1
            } else if deterministic {
                order.len() - need + 1
            } else {
                self.max_retries
            };

            let mut chosen = None;
            for attempt in 0..attempts {
                let extra = if need == 0 {
                    Vec::new()
                } else if deterministic {
                    // on fait varier le dernier numéro ajouté
                    let mut extra = order[..need - 1].to_vec();
                    extra.push(order[need - 1 + attempt]);
                    extra
                } else if attempt == 0 {
                    order[..need].to_vec()
                } else {
                    let width = (need + self.window + attempt).min(order.len());
                    index::sample(rng, width, need)
                        .into_iter()
                        .map(|i| order[i])
                        .collect()
                };

                let mut idx = seed.clone();
                idx.extend(extra);
                idx.sort_unstable();
                let numbers: Vec<u8> = idx.iter().map(|&i| pool[i]).collect();
                let signature = TicketSignature::of(&numbers);
                if exclusions.contains(&signature) || produced.contains(&signature) {
                    continue;
                }
                chosen = Some((idx, numbers, signature));
                break;
            }

            match chosen {
                Some((idx, numbers, signature)) => {
                    tracker.mark(&idx);
                    produced.insert(signature);
                    tickets.push(Ticket::new(numbers)?);
                }
                None => {
                    tracker.abandon(seed_rank);
                    abandoned += 1;
                }
            }

            steps += 1;
            if steps % self.chunk == 0 {
                let by_count = tickets.len() as f64 / limit as f64;
                let by_coverage = tracker.covered_count() as f64 / tracker.total() as f64;
                let done = (by_count.max(by_coverage) * 1000.0) as usize;
                progress.checkpoint(done, 1000)?;
            }
        }

        if abandoned > 0 {
            log::debug!("{} sous-ensembles sans ticket admissible", abandoned);
        }
        Ok(CoverOutcome {
            tickets,
            covered: tracker.covered_count(),
            total: tracker.total(),
            abandoned,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        name: &str,
        pool: &[u8],
        ticket_size: usize,
        requested: usize,
        exclusions: &TicketHistory,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
        deterministic: bool,
    ) -> Result<Vec<Ticket>> {
        let outcome = progress.within(0.0, 0.85, |p| {
            self.cover(pool, ticket_size, requested, exclusions, rng, p, deterministic)
        })?;
        log::debug!(
            "{} : {} tickets, couverture {}/{}",
            name,
            outcome.tickets.len(),
            outcome.covered,
            outcome.total
        );

        let mut tickets = outcome.tickets;
        if tickets.len() < requested {
            let mut extended = exclusions.clone();
            for ticket in &tickets {
                extended.add_ticket(ticket);
            }
            let missing = requested - tickets.len();
            log::info!("{} : complément de {} tickets par matrice équilibrée", name, missing);
            let fill = progress.within(0.85, 1.0, |p| {
                self.balanced
                    .build(pool, ticket_size, missing, &extended, rng, p)
            })?;
            tickets.extend(fill);
        }
        Ok(tickets)
    }
}

/// Fermeture réduite : graines tirées au hasard, départage aléatoire.
#[derive(Debug, Clone)]
pub struct ReducedClosingBuilder {
    params: ClosingParams,
}

impl ReducedClosingBuilder {
    pub fn new(guarantee: usize, config: &EngineConfig) -> Self {
        Self {
            params: ClosingParams::new(guarantee, config),
        }
    }

    pub fn guarantee(&self) -> usize {
        self.params.guarantee
    }

    pub fn build(
        &self,
        pool: &[u8],
        ticket_size: usize,
        requested: usize,
        exclusions: &TicketHistory,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<Ticket>> {
        self.params.build(
            self.name(), pool, ticket_size, requested, exclusions, rng, progress, false,
        )
    }

    pub fn cover(
        &self,
        pool: &[u8],
        ticket_size: usize,
        limit: usize,
        exclusions: &TicketHistory,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<CoverOutcome> {
        self.params
            .cover(pool, ticket_size, limit, exclusions, rng, progress, false)
    }
}

impl GenerationStrategy for ReducedClosingBuilder {
    fn name(&self) -> &str {
        "Fermeture réduite"
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

/// Fermeture déterministe : graine = premier sous-ensemble non couvert, départage par
/// indice, et toutes les variantes du dernier numéro sont essayées avant d'abandonner
/// une graine. La phase de couverture ne consomme pas d'aléa.
#[derive(Debug, Clone)]
pub struct DeterministicClosingBuilder {
    params: ClosingParams,
}

impl DeterministicClosingBuilder {
    pub fn new(guarantee: usize, config: &EngineConfig) -> Self {
        Self {
            params: ClosingParams::new(guarantee, config),
        }
    }

    pub fn guarantee(&self) -> usize {
        self.params.guarantee
    }

    pub fn build(
        &self,
        pool: &[u8],
        ticket_size: usize,
        requested: usize,
        exclusions: &TicketHistory,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<Ticket>> {
        self.params.build(
            self.name(), pool, ticket_size, requested, exclusions, rng, progress, true,
        )
    }

    pub fn cover(
        &self,
        pool: &[u8],
        ticket_size: usize,
        limit: usize,
        exclusions: &TicketHistory,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<CoverOutcome> {
        self.params
            .cover(pool, ticket_size, limit, exclusions, rng, progress, true)
    }
}

impl GenerationStrategy for DeterministicClosingBuilder {
    fn name(&self) -> &str {
        "Fermeture déterministe"
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

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn pool(n: u8) -> Vec<u8> {
        (1..=n).collect()
    }

    #[test]
    fn test_rank_unrank_roundtrip() {
        let tracker = CoverageTracker::new(7, 3, 1000).unwrap();
        assert_eq!(tracker.total(), 35);
        let mut seen = HashSet::new();
        for rank in 0..tracker.total() {
            let subset = tracker.unrank(rank);
            assert!(subset.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(tracker.rank(&subset), rank);
            seen.insert(subset);
        }
        assert_eq!(seen.len(), 35);
    }

    #[test]
    fn test_tracker_rejects_large_universe() {
        assert!(CoverageTracker::new(25, 13, 1000).is_none());
        assert!(CoverageTracker::new(5, 6, 1000).is_none());
    }

    #[test]
    fn test_deterministic_cover_is_complete() {
        let builder = DeterministicClosingBuilder::new(4, &EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = builder
            .cover(&pool(10), 6, usize::MAX, &TicketHistory::new(), &mut rng, &mut Progress::silent())
            .unwrap();
        assert_eq!(outcome.total, 210);
        assert_eq!(outcome.covered, 210);
        assert_eq!(outcome.abandoned, 0);
        assert!(
            outcome.tickets.len() < 210,
            "la fermeture devrait être plus petite que C(10,6) : {}",
            outcome.tickets.len()
        );

        let report = coverage_report(&outcome.tickets, &pool(10), 4, 1_000_000).unwrap();
        assert!(report.is_complete());
    }

    #[test]
    fn test_deterministic_cover_reproducible() {
        let builder = DeterministicClosingBuilder::new(3, &EngineConfig::default());
        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(999);
        let a = builder
            .cover(&pool(9), 5, usize::MAX, &TicketHistory::new(), &mut rng_a, &mut Progress::silent())
            .unwrap();
        let b = builder
            .cover(&pool(9), 5, usize::MAX, &TicketHistory::new(), &mut rng_b, &mut Progress::silent())
            .unwrap();
        assert_eq!(a.tickets, b.tickets);
    }

    #[test]
    fn test_reduced_cover_is_complete() {
        let builder = ReducedClosingBuilder::new(4, &EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        let outcome = builder
            .cover(&pool(10), 6, usize::MAX, &TicketHistory::new(), &mut rng, &mut Progress::silent())
            .unwrap();
        assert_eq!(outcome.covered, outcome.total);
        let report = coverage_report(&outcome.tickets, &pool(10), 4, 1_000_000).unwrap();
        assert!(report.is_complete());
        assert!((report.ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reduced_stops_at_requested() {
        let builder = ReducedClosingBuilder::new(3, &EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(5);
        let tickets = builder
            .build(&pool(12), 6, 5, &TicketHistory::new(), &mut rng, &mut Progress::silent())
            .unwrap();
        assert_eq!(tickets.len(), 5);
    }

    #[test]
    fn test_shortfall_filled_by_balanced() {
        // C(8,5) = 56 sous-ensembles, couverts bien avant 25 tickets ; C(8,6) = 28
        let builder = ReducedClosingBuilder::new(5, &EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(11);
        let tickets = builder
            .build(&pool(8), 6, 25, &TicketHistory::new(), &mut rng, &mut Progress::silent())
            .unwrap();
        assert_eq!(tickets.len(), 25);
        let unique: HashSet<_> = tickets.iter().map(|t| t.signature()).collect();
        assert_eq!(unique.len(), 25);
    }

    #[test]
    fn test_closing_respects_exclusions() {
        let mut exclusions = TicketHistory::new();
        exclusions.add(TicketSignature::of(&[1, 2, 3, 4, 5, 6]));
        exclusions.add(TicketSignature::of(&[2, 3, 4, 5, 6, 7]));
        for deterministic in [false, true] {
            let config = EngineConfig::default();
            let mut rng = StdRng::seed_from_u64(8);
            let tickets = if deterministic {
                DeterministicClosingBuilder::new(5, &config)
                    .build(&pool(7), 6, 5, &exclusions, &mut rng, &mut Progress::silent())
                    .unwrap()
            } else {
                ReducedClosingBuilder::new(5, &config)
                    .build(&pool(7), 6, 5, &exclusions, &mut rng, &mut Progress::silent())
                    .unwrap()
            };
            assert_eq!(tickets.len(), 5);
            assert!(tickets.iter().all(|t| !exclusions.contains_ticket(t)));
        }
    }

    #[test]
    fn test_large_universe_falls_back_to_balanced() {
        let config = EngineConfig {
            coverage_universe_cap: 10,
            ..EngineConfig::default()
        };
        let builder = ReducedClosingBuilder::new(3, &config);
        let mut rng = StdRng::seed_from_u64(2);
        let tickets = builder
            .build(&pool(20), 6, 10, &TicketHistory::new(), &mut rng, &mut Progress::silent())
            .unwrap();
        assert_eq!(tickets.len(), 10);
    }

    #[test]
    fn test_closing_reports_progress() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: u8| seen.push(p);
            let mut progress = Progress::new(&mut sink);
            let builder = ReducedClosingBuilder::new(4, &EngineConfig {
                progress_chunk: 1,
                ..EngineConfig::default()
            });
            let mut rng = StdRng::seed_from_u64(3);
            builder
                .build(&pool(12), 6, 40, &TicketHistory::new(), &mut rng, &mut progress)
                .unwrap();
        }
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.iter().all(|&p| p < 100));
    }
}
