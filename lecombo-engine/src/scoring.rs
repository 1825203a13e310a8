use rayon::prelude::*;

use lecombo_model::models::{GameDomain, GameKind, Ticket};

use crate::stats::{DetailedStats, DetailedStatsCalculator};

pub const MIN_SCORE: u8 = 40;
pub const MAX_SCORE: u8 = 99;
const BASE_SCORE: i32 = 95;
const NEUTRAL_SCORE: i32 = 75;

/// Plage favorable d'une statistique : pénalité en dehors de [lo, hi], bonus dans
/// la sous-plage idéale.
#[derive(Debug, Clone, Copy)]
struct Band {
    lo: f64,
    hi: f64,
    ideal_lo: f64,
    ideal_hi: f64,
    penalty: i32,
    bonus: i32,
}

const fn band(lo: f64, hi: f64, ideal_lo: f64, ideal_hi: f64, penalty: i32, bonus: i32) -> Band {
    Band { lo, hi, ideal_lo, ideal_hi, penalty, bonus }
}

impl Band {
    fn scaled(self, factor: f64) -> Band {
        Band {
            lo: self.lo * factor,
            hi: self.hi * factor,
            ideal_lo: self.ideal_lo * factor,
            ideal_hi: self.ideal_hi * factor,
            ..self
        }
    }

    fn adjust(&self, value: f64) -> i32 {
        let step = ((self.hi - self.lo) / 10.0).max(1.0);
        if value < self.lo {
            -(self.penalty + ((self.lo - value) / step).floor() as i32)
        } else if value > self.hi {
            -(self.penalty + ((value - self.hi) / step).floor() as i32)
        } else if value >= self.ideal_lo && value <= self.ideal_hi {
            self.bonus
        } else {
            0
        }
    }
}

/// Seuils propres à un jeu, définis pour un ticket de `base_size` numéros.
struct ScoringProfile {
    base_size: usize,
    odd: Option<Band>,
    even: Option<Band>,
    sum: Band,
    primes: Option<Band>,
    frame: Option<Band>,
    repeats: Option<Band>,
}

fn profile(kind: GameKind) -> Option<ScoringProfile> {
    match kind {
        GameKind::Lotofacil => Some(ScoringProfile {
            base_size: 15,
            odd: Some(band(5.0, 10.0, 7.0, 8.0, 10, 1)),
            even: None,
            sum: band(170.0, 230.0, 185.0, 215.0, 10, 2),
            primes: Some(band(3.0, 7.0, 4.0, 6.0, 8, 1)),
            frame: Some(band(8.0, 11.0, 9.0, 10.0, 6, 1)),
            repeats: Some(band(7.0, 11.0, 8.0, 10.0, 10, 2)),
        }),
        GameKind::MegaSena => Some(ScoringProfile {
            base_size: 6,
            odd: None,
            even: Some(band(2.0, 4.0, 3.0, 3.0, 10, 2)),
            sum: band(120.0, 250.0, 150.0, 220.0, 10, 2),
            primes: Some(band(0.0, 3.0, 1.0, 2.0, 5, 1)),
            frame: None,
            repeats: None,
        }),
        GameKind::Quina => Some(ScoringProfile {
            base_size: 5,
            odd: None,
            even: Some(band(1.0, 4.0, 2.0, 3.0, 8, 2)),
            sum: band(120.0, 300.0, 160.0, 250.0, 10, 2),
            primes: None,
            frame: None,
            repeats: None,
        }),
        GameKind::Lotomania => Some(ScoringProfile {
            base_size: 50,
            odd: None,
            even: Some(band(20.0, 30.0, 23.0, 27.0, 8, 2)),
            sum: band(2200.0, 2750.0, 2350.0, 2600.0, 10, 2),
            primes: None,
            frame: None,
            repeats: None,
        }),
        GameKind::Custom => None,
    }
}

/// Score heuristique d'un ticket à partir de ses statistiques, borné à [40, 99].
/// Un décalage tiré de la somme départage les tickets par ailleurs équivalents.
pub fn score_stats(kind: GameKind, stats: &DetailedStats, ticket_size: usize) -> u8 {
    let offset = (stats.sum % 5) as i32 - 2;
    let Some(profile) = profile(kind) else {
        return clamp_score(NEUTRAL_SCORE + offset);
    };

    let factor = ticket_size as f64 / profile.base_size as f64;
    let apply = |b: Option<Band>, value: f64| b.map_or(0, |b| b.scaled(factor).adjust(value));

    let mut score = BASE_SCORE;
    score += apply(profile.odd, stats.odd as f64);
    score += apply(profile.even, stats.even as f64);
    score += apply(Some(profile.sum), stats.sum as f64);
    score += apply(profile.primes, stats.primes as f64);
    score += apply(profile.frame, stats.frame as f64);
    if let Some(repeats) = stats.repeats {
        score += apply(profile.repeats, repeats as f64);
    }
    clamp_score(score + offset)
}

fn clamp_score(score: i32) -> u8 {
    score.clamp(MIN_SCORE as i32, MAX_SCORE as i32) as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub score: u8,
    pub stats: DetailedStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTicket {
    pub ticket: Ticket,
    pub score: u8,
    pub stats: DetailedStats,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    kind: GameKind,
    calculator: DetailedStatsCalculator,
}

impl ScoringEngine {
    pub fn new(domain: &GameDomain) -> Self {
        Self {
            kind: domain.kind,
            calculator: DetailedStatsCalculator::new(domain),
        }
    }

    pub fn evaluate(&self, ticket: &[u8], previous: Option<&[u8]>) -> ScoreResult {
        let stats = self.calculator.compute(ticket, previous);
        let score = score_stats(self.kind, &stats, ticket.len());
        ScoreResult { score, stats }
    }

    pub fn score(&self, ticket: &[u8], previous: Option<&[u8]>) -> u8 {
        self.evaluate(ticket, previous).score
    }

    /// Note tout le lot en parallèle, écarte les tickets sous `min_score` et garde
    /// les `top_n` meilleurs (score décroissant, puis ordre des numéros).
    pub fn rank(
        &self,
        tickets: Vec<Ticket>,
        previous: Option<&[u8]>,
        top_n: usize,
        min_score: Option<u8>,
    ) -> Vec<ScoredTicket> {
        let mut scored: Vec<ScoredTicket> = tickets
            .into_par_iter()
            .map(|ticket| {
                let ScoreResult { score, stats } = self.evaluate(ticket.numbers(), previous);
                ScoredTicket { ticket, score, stats }
            })
            .filter(|s| min_score.map_or(true, |min| s.score >= min))
            .collect();
        scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.ticket.cmp(&b.ticket)));
        scored.truncate(top_n);
        scored
    }
}

pub fn score(ticket: &Ticket, domain: &GameDomain, previous: Option<&[u8]>) -> u8 {
    ScoringEngine::new(domain).score(ticket.numbers(), previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balanced::BalancedMatrixBuilder;
    use crate::history::TicketHistory;
    use crate::progress::Progress;
    use lecombo_model::games::{preset, PRESETS};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random_tickets(domain: &GameDomain, size: usize, n: usize, seed: u64) -> Vec<Ticket> {
        let mut rng = StdRng::seed_from_u64(seed);
        BalancedMatrixBuilder::default()
            .build(&domain.numbers(), size, n, &TicketHistory::new(), &mut rng, &mut Progress::silent())
            .unwrap()
    }

    #[test]
    fn test_score_bounds() {
        for kind in PRESETS {
            let domain = preset(kind).unwrap();
            for t in random_tickets(&domain, domain.min_pick, 200, 1) {
                let s = score(&t, &domain, None);
                assert!((MIN_SCORE..=MAX_SCORE).contains(&s), "{kind}: score {s} hors bornes");
            }
        }
    }

    #[test]
    fn test_extreme_ticket_penalized() {
        let domain = preset(GameKind::Lotofacil).unwrap();
        let low = Ticket::new((1..=15).collect::<Vec<u8>>()).unwrap();
        let good = Ticket::new(vec![1, 2, 4, 5, 7, 10, 11, 13, 14, 16, 18, 19, 21, 23, 25]).unwrap();
        let low_score = score(&low, &domain, None);
        let good_score = score(&good, &domain, None);
        assert!(good_score > low_score, "{good_score} devrait dépasser {low_score}");
        assert_eq!(good_score, MAX_SCORE);
    }

    #[test]
    fn test_repeats_affect_lotofacil_score() {
        let domain = preset(GameKind::Lotofacil).unwrap();
        let ticket = Ticket::new(vec![1, 2, 4, 5, 7, 10, 11, 13, 14, 16, 18, 19, 21, 23, 25]).unwrap();
        // 9 numéros communs : dans la plage idéale
        let close: Vec<u8> = vec![1, 2, 4, 5, 7, 10, 11, 13, 14, 3, 6, 8, 9, 12, 15];
        // aucun numéro commun
        let far: Vec<u8> = vec![3, 6, 8, 9, 12, 15, 17, 20, 22, 24];
        let engine = ScoringEngine::new(&domain);
        assert!(engine.score(ticket.numbers(), Some(&close)) > engine.score(ticket.numbers(), Some(&far)));
    }

    #[test]
    fn test_custom_game_neutral() {
        let mut domain = preset(GameKind::MegaSena).unwrap();
        domain.kind = GameKind::Custom;
        let ticket = Ticket::new(vec![1, 2, 3, 4, 5, 6]).unwrap();
        // somme 21 : décalage 21 % 5 - 2 = -1
        assert_eq!(score(&ticket, &domain, None), 74);
    }

    #[test]
    fn test_score_deterministic() {
        let domain = preset(GameKind::MegaSena).unwrap();
        let ticket = Ticket::new(vec![5, 17, 23, 38, 44, 59]).unwrap();
        assert_eq!(score(&ticket, &domain, None), score(&ticket, &domain, None));
    }

    #[test]
    fn test_rank_top_n() {
        let domain = preset(GameKind::Lotofacil).unwrap();
        let tickets = random_tickets(&domain, 15, 300, 9);
        let engine = ScoringEngine::new(&domain);
        let ranked = engine.rank(tickets, None, 10, None);
        assert_eq!(ranked.len(), 10);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_rank_min_score() {
        let domain = preset(GameKind::Lotofacil).unwrap();
        let tickets = vec![
            Ticket::new((1..=15).collect::<Vec<u8>>()).unwrap(),
            Ticket::new(vec![1, 2, 4, 5, 7, 10, 11, 13, 14, 16, 18, 19, 21, 23, 25]).unwrap(),
        ];
        let ranked = ScoringEngine::new(&domain).rank(tickets, None, 10, Some(90));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, MAX_SCORE);
    }
}
