use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use lecombo_model::models::GameDomain;

const FIBONACCI: [u8; 12] = [1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233];

#[derive(Debug, Clone, PartialEq)]
pub struct DetailedStats {
    pub even: usize,
    pub odd: usize,
    pub sum: u32,
    pub mean: f64,
    /// Écart type de population.
    pub std_dev: f64,
    pub primes: usize,
    pub fibonacci: usize,
    pub triangular: usize,
    pub multiples_of_3: usize,
    pub frame: usize,
    pub center: usize,
    /// Numéros communs avec le tirage précédent, `None` si ce tirage est inconnu.
    pub repeats: Option<usize>,
}

pub fn is_prime(n: u8) -> bool {
    if n < 2 {
        return false;
    }
    let n = n as u32;
    (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}

pub fn is_fibonacci(n: u8) -> bool {
    FIBONACCI.contains(&n)
}

pub fn is_triangular(n: u8) -> bool {
    if n == 0 {
        return false;
    }
    let disc = 8 * n as u32 + 1;
    let root = (disc as f64).sqrt().round() as u32;
    root * root == disc
}

/// Position de chaque numéro dans la grille imprimée du jeu : cadre (première ou
/// dernière ligne, première ou dernière colonne) ou centre.
#[derive(Debug, Clone)]
pub struct GridLayout {
    first: u8,
    frame: Vec<bool>,
}

impl GridLayout {
    pub fn new(domain: &GameDomain) -> Self {
        let columns = domain.columns.max(1);
        let rows = domain.rows();
        let frame = (0..domain.total_numbers as usize)
            .map(|offset| {
                let row = offset / columns;
                let col = offset % columns;
                row == 0 || row + 1 == rows || col == 0 || col + 1 == columns
            })
            .collect();
        Self {
            first: domain.first_number,
            frame,
        }
    }

    pub fn is_frame(&self, n: u8) -> bool {
        n.checked_sub(self.first)
            .and_then(|offset| self.frame.get(offset as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_center(&self, n: u8) -> bool {
        n.checked_sub(self.first)
            .and_then(|offset| self.frame.get(offset as usize))
            .map(|&frame| !frame)
            .unwrap_or(false)
    }

    pub fn frame_size(&self) -> usize {
        self.frame.iter().filter(|&&f| f).count()
    }
}

type LayoutKey = (u8, u8, usize);

/// Nombre de géométries gardées en cache ; au-delà le cache repart de zéro.
const MAX_CACHED_LAYOUTS: usize = 64;

#[derive(Debug)]
struct LayoutCache {
    layouts: HashMap<LayoutKey, Arc<GridLayout>>,
    limit: usize,
}

impl LayoutCache {
    fn new(limit: usize) -> Self {
        Self {
            layouts: HashMap::new(),
            limit: limit.max(1),
        }
    }

    fn get(&mut self, domain: &GameDomain) -> Arc<GridLayout> {
        let key = (domain.first_number, domain.total_numbers, domain.columns);
        if !self.layouts.contains_key(&key) && self.layouts.len() >= self.limit {
            log::debug!("Cache des grilles plein ({} entrées), vidé", self.layouts.len());
            self.layouts.clear();
        }
        Arc::clone(
            self.layouts
                .entry(key)
                .or_insert_with(|| Arc::new(GridLayout::new(domain))),
        )
    }

    fn len(&self) -> usize {
        self.layouts.len()
    }
}

/// La géométrie ne dépend que de la configuration du jeu : calculée une fois par domaine.
pub fn layout_for(domain: &GameDomain) -> Arc<GridLayout> {
    static LAYOUTS: OnceLock<Mutex<LayoutCache>> = OnceLock::new();
    LAYOUTS
        .get_or_init(|| Mutex::new(LayoutCache::new(MAX_CACHED_LAYOUTS)))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(domain)
}

#[derive(Debug, Clone)]
pub struct DetailedStatsCalculator {
    layout: Arc<GridLayout>,
}

impl DetailedStatsCalculator {
    pub fn new(domain: &GameDomain) -> Self {
        Self {
            layout: layout_for(domain),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn compute(&self, ticket: &[u8], previous: Option<&[u8]>) -> DetailedStats {
        let n = ticket.len();
        let sum: u32 = ticket.iter().map(|&x| x as u32).sum();
        let mean = if n > 0 { sum as f64 / n as f64 } else { 0.0 };
        let variance = if n > 0 {
            ticket
                .iter()
                .map(|&x| (x as f64 - mean).powi(2))
                .sum::<f64>()
                / n as f64
        } else {
            0.0
        };

        let even = ticket.iter().filter(|&&x| x % 2 == 0).count();
        let count = |pred: fn(u8) -> bool| ticket.iter().filter(|&&x| pred(x)).count();

        DetailedStats {
            even,
            odd: n - even,
            sum,
            mean,
            std_dev: variance.sqrt(),
            primes: count(is_prime),
            fibonacci: count(is_fibonacci),
            triangular: count(is_triangular),
            multiples_of_3: ticket.iter().filter(|&&x| x != 0 && x % 3 == 0).count(),
            frame: ticket.iter().filter(|&&x| self.layout.is_frame(x)).count(),
            center: ticket.iter().filter(|&&x| self.layout.is_center(x)).count(),
            repeats: previous.map(|prev| ticket.iter().filter(|&&x| prev.contains(&x)).count()),
        }
    }
}

pub fn compute_stats(ticket: &[u8], previous: Option<&[u8]>, domain: &GameDomain) -> DetailedStats {
    DetailedStatsCalculator::new(domain).compute(ticket, previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecombo_model::games::preset;
    use lecombo_model::models::GameKind;

    fn lotofacil() -> GameDomain {
        preset(GameKind::Lotofacil).unwrap()
    }

    #[test]
    fn test_number_sets() {
        let primes: Vec<u8> = (0..=30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        let triangular: Vec<u8> = (0..=30).filter(|&n| is_triangular(n)).collect();
        assert_eq!(triangular, vec![1, 3, 6, 10, 15, 21, 28]);
        assert!(is_fibonacci(21));
        assert!(!is_fibonacci(0));
        assert!(is_prime(251));
    }

    #[test]
    fn test_basic_stats() {
        let stats = compute_stats(&[1, 2, 3, 4, 5, 6], None, &preset(GameKind::MegaSena).unwrap());
        assert_eq!(stats.even, 3);
        assert_eq!(stats.odd, 3);
        assert_eq!(stats.sum, 21);
        assert!((stats.mean - 3.5).abs() < 1e-12);
        assert!((stats.std_dev - (35.0f64 / 12.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.primes, 3);
        assert_eq!(stats.fibonacci, 4);
        assert_eq!(stats.triangular, 3);
        assert_eq!(stats.multiples_of_3, 2);
        assert_eq!(stats.repeats, None);
    }

    #[test]
    fn test_repeat_count() {
        let stats = compute_stats(&[1, 2, 6, 7, 8], Some(&[1, 2, 3, 4, 5]), &lotofacil());
        assert_eq!(stats.repeats, Some(2));
    }

    #[test]
    fn test_lotofacil_frame_and_center() {
        let calc = DetailedStatsCalculator::new(&lotofacil());
        assert_eq!(calc.layout().frame_size(), 16);

        let center = calc.compute(&[7, 8, 9, 12, 13, 14, 17, 18, 19], None);
        assert_eq!(center.frame, 0);
        assert_eq!(center.center, 9);

        let border = calc.compute(&[1, 5, 21, 25, 11, 15], None);
        assert_eq!(border.frame, 6);
        assert_eq!(border.center, 0);
    }

    #[test]
    fn test_zero_based_layout() {
        let calc = DetailedStatsCalculator::new(&preset(GameKind::Lotomania).unwrap());
        assert!(calc.layout().is_frame(0));
        assert!(calc.layout().is_frame(99));
        assert!(calc.layout().is_frame(9));
        assert!(calc.layout().is_center(11));
        assert!(!calc.layout().is_frame(100));
        assert_eq!(calc.layout().frame_size(), 36);
    }

    #[test]
    fn test_layout_memoized() {
        let a = layout_for(&lotofacil());
        let b = layout_for(&lotofacil());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_layout_cache_bounded() {
        let mut cache = LayoutCache::new(4);
        let base = lotofacil();
        for columns in 1..=10 {
            let domain = GameDomain { columns, ..base.clone() };
            let layout = cache.get(&domain);
            assert!(cache.len() <= 4);
            assert_eq!(layout.frame_size(), GridLayout::new(&domain).frame_size());
        }
        let again = cache.get(&GameDomain { columns: 10, ..base.clone() });
        assert!(Arc::ptr_eq(&again, &cache.get(&GameDomain { columns: 10, ..base })));
    }

    #[test]
    fn test_stats_pure() {
        let domain = lotofacil();
        let ticket = [1, 2, 3, 5, 8, 10, 11, 13, 14, 17, 19, 20, 22, 24, 25];
        let prev = [2, 3, 4, 6, 7, 9, 10, 12, 13, 15, 16, 18, 21, 23, 25];
        let a = compute_stats(&ticket, Some(&prev), &domain);
        let b = compute_stats(&ticket, Some(&prev), &domain);
        assert_eq!(a, b);
        assert_eq!(a.even + a.odd, 15);
        assert_eq!(a.frame + a.center, 15);
    }
}
