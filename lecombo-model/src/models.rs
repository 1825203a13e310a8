use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Lotofacil,
    MegaSena,
    Quina,
    Lotomania,
    Custom,
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameKind::Lotofacil => write!(f, "Lotofácil"),
            GameKind::MegaSena => write!(f, "Mega-Sena"),
            GameKind::Quina => write!(f, "Quina"),
            GameKind::Lotomania => write!(f, "Lotomania"),
            GameKind::Custom => write!(f, "Personnalisé"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPrice {
    pub size: usize,
    pub price: f64,
}

/// Configuration d'un jeu, fournie par l'appelant et jamais modifiée par le moteur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDomain {
    pub kind: GameKind,
    pub name: String,
    /// Premier numéro de la grille (0 pour la Lotomania, 1 ailleurs).
    pub first_number: u8,
    pub total_numbers: u8,
    pub min_pick: usize,
    pub max_pick: usize,
    pub columns: usize,
    #[serde(default)]
    pub prices: Vec<TicketPrice>,
}

impl GameDomain {
    pub fn last_number(&self) -> u8 {
        self.first_number + (self.total_numbers - 1)
    }

    pub fn numbers(&self) -> Vec<u8> {
        (self.first_number..=self.last_number()).collect()
    }

    pub fn contains(&self, n: u8) -> bool {
        n >= self.first_number && n <= self.last_number()
    }

    pub fn rows(&self) -> usize {
        (self.total_numbers as usize).div_ceil(self.columns)
    }

    pub fn accepts_size(&self, size: usize) -> bool {
        size >= self.min_pick && size <= self.max_pick
    }

    pub fn price_for(&self, size: usize) -> Option<f64> {
        self.prices.iter().find(|p| p.size == size).map(|p| p.price)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_numbers == 0 {
            bail!("Le jeu {} n'a aucun numéro", self.name);
        }
        if self.first_number as usize + self.total_numbers as usize - 1 > u8::MAX as usize {
            bail!("Le jeu {} dépasse le numéro maximal 255", self.name);
        }
        if self.columns == 0 {
            bail!("Le jeu {} doit avoir au moins une colonne", self.name);
        }
        if self.min_pick == 0 || self.min_pick > self.max_pick {
            bail!(
                "Plage de sélection invalide pour {} : {}-{}",
                self.name, self.min_pick, self.max_pick
            );
        }
        if self.max_pick > self.total_numbers as usize {
            bail!(
                "Sélection maximale {} supérieure au nombre de numéros {} ({})",
                self.max_pick, self.total_numbers, self.name
            );
        }
        Ok(())
    }
}

/// Clé canonique d'un ticket : valeurs triées, sur deux chiffres, séparées par '-'.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketSignature(String);

impl TicketSignature {
    pub fn of(numbers: &[u8]) -> Self {
        let mut sorted = numbers.to_vec();
        sorted.sort_unstable();
        let key = sorted
            .iter()
            .map(|n| format!("{:02}", n))
            .collect::<Vec<_>>()
            .join("-");
        TicketSignature(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn numbers(&self) -> Vec<u8> {
        if self.0.is_empty() {
            return Vec::new();
        }
        self.0.split('-').filter_map(|s| s.parse::<u8>().ok()).collect()
    }
}

impl std::fmt::Display for TicketSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Combinaison jouable : numéros distincts, triés par ordre croissant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket {
    numbers: Vec<u8>,
}

impl Ticket {
    pub fn new(numbers: impl Into<Vec<u8>>) -> Result<Self> {
        let mut numbers = numbers.into();
        if numbers.is_empty() {
            bail!("Ticket vide");
        }
        numbers.sort_unstable();
        if let Some(w) = numbers.windows(2).find(|w| w[0] == w[1]) {
            bail!("Numéro en double dans le ticket : {}", w[0]);
        }
        Ok(Ticket { numbers })
    }

    pub fn numbers(&self) -> &[u8] {
        &self.numbers
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn contains(&self, n: u8) -> bool {
        self.numbers.binary_search(&n).is_ok()
    }

    pub fn contains_all(&self, numbers: &[u8]) -> bool {
        numbers.iter().all(|&n| self.contains(n))
    }

    pub fn sum(&self) -> u32 {
        self.numbers.iter().map(|&n| n as u32).sum()
    }

    pub fn signature(&self) -> TicketSignature {
        TicketSignature::of(&self.numbers)
    }

    pub fn fits(&self, domain: &GameDomain, size: usize) -> bool {
        self.numbers.len() == size && self.numbers.iter().all(|&n| domain.contains(n))
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self
            .numbers
            .iter()
            .map(|n| format!("{:02}", n))
            .collect::<Vec<_>>()
            .join(" - ");
        f.write_str(&s)
    }
}

/// Vérifie une sélection ou un tirage saisi par l'utilisateur.
pub fn validate_numbers(numbers: &[u8], domain: &GameDomain) -> Result<()> {
    for &n in numbers {
        if !domain.contains(n) {
            bail!(
                "Numéro {} hors limites ({}-{})",
                n,
                domain.first_number,
                domain.last_number()
            );
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                bail!("Numéro en double : {}", numbers[i]);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::preset;

    #[test]
    fn test_ticket_sorted() {
        let t = Ticket::new(vec![9, 3, 1]).unwrap();
        assert_eq!(t.numbers(), &[1, 3, 9]);
    }

    #[test]
    fn test_ticket_rejects_duplicates() {
        assert!(Ticket::new(vec![1, 2, 2]).is_err());
        assert!(Ticket::new(Vec::new()).is_err());
    }

    #[test]
    fn test_signature_order_independent() {
        let a = TicketSignature::of(&[6, 1, 5, 2, 4, 3]);
        let b = TicketSignature::of(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "01-02-03-04-05-06");
        assert_eq!(a.numbers(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_signature_zero_based() {
        let sig = TicketSignature::of(&[0, 99, 10]);
        assert_eq!(sig.as_str(), "00-10-99");
        assert_eq!(sig.numbers(), vec![0, 10, 99]);
    }

    #[test]
    fn test_ticket_display() {
        let t = Ticket::new(vec![12, 3]).unwrap();
        assert_eq!(t.to_string(), "03 - 12");
    }

    #[test]
    fn test_ticket_fits_domain() {
        let domain = preset(GameKind::MegaSena).unwrap();
        let t = Ticket::new(vec![1, 2, 3, 4, 5, 60]).unwrap();
        assert!(t.fits(&domain, 6));
        assert!(!t.fits(&domain, 7));
        let out = Ticket::new(vec![1, 2, 3, 4, 5, 61]).unwrap();
        assert!(!out.fits(&domain, 6));
    }

    #[test]
    fn test_validate_numbers() {
        let domain = preset(GameKind::Lotofacil).unwrap();
        assert!(validate_numbers(&[1, 2, 25], &domain).is_ok());
        assert!(validate_numbers(&[0, 2, 3], &domain).is_err());
        assert!(validate_numbers(&[1, 26], &domain).is_err());
        assert!(validate_numbers(&[4, 4], &domain).is_err());
    }

    #[test]
    fn test_domain_geometry() {
        let domain = preset(GameKind::Lotofacil).unwrap();
        assert_eq!(domain.last_number(), 25);
        assert_eq!(domain.rows(), 5);
        assert_eq!(domain.numbers().len(), 25);

        let mania = preset(GameKind::Lotomania).unwrap();
        assert_eq!(mania.first_number, 0);
        assert_eq!(mania.last_number(), 99);
        assert_eq!(mania.rows(), 10);
    }

    #[test]
    fn test_domain_validate() {
        let mut domain = preset(GameKind::Quina).unwrap();
        assert!(domain.validate().is_ok());
        domain.max_pick = 200;
        assert!(domain.validate().is_err());
        domain.max_pick = 5;
        domain.columns = 0;
        assert!(domain.validate().is_err());
    }

    #[test]
    fn test_domain_serde_roundtrip() {
        let domain = preset(GameKind::Lotofacil).unwrap();
        let json = serde_json::to_string(&domain).unwrap();
        let restored: GameDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, domain);
    }
}
