use crate::models::{GameDomain, GameKind, TicketPrice};

pub const PRESETS: [GameKind; 4] = [
    GameKind::Lotofacil,
    GameKind::MegaSena,
    GameKind::Quina,
    GameKind::Lotomania,
];

/// C(n, k) en flottant, suffisant pour les tables de prix.
fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0f64, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Prix d'un ticket de `size` numéros : le prix de base multiplié par le nombre
/// de combinaisons simples qu'il contient.
fn price_table(base: f64, min_pick: usize, max_pick: usize) -> Vec<TicketPrice> {
    (min_pick..=max_pick)
        .map(|size| TicketPrice {
            size,
            price: (base * binomial(size, min_pick) * 100.0).round() / 100.0,
        })
        .collect()
}

pub fn preset(kind: GameKind) -> Option<GameDomain> {
    let domain = match kind {
        GameKind::Lotofacil => GameDomain {
            kind,
            name: "Lotofácil".to_string(),
            first_number: 1,
            total_numbers: 25,
            min_pick: 15,
            max_pick: 20,
            columns: 5,
            prices: price_table(3.5, 15, 20),
        },
        GameKind::MegaSena => GameDomain {
            kind,
            name: "Mega-Sena".to_string(),
            first_number: 1,
            total_numbers: 60,
            min_pick: 6,
            max_pick: 15,
            columns: 10,
            prices: price_table(6.0, 6, 15),
        },
        GameKind::Quina => GameDomain {
            kind,
            name: "Quina".to_string(),
            first_number: 1,
            total_numbers: 80,
            min_pick: 5,
            max_pick: 15,
            columns: 10,
            prices: price_table(3.0, 5, 15),
        },
        GameKind::Lotomania => GameDomain {
            kind,
            name: "Lotomania".to_string(),
            first_number: 0,
            total_numbers: 100,
            min_pick: 50,
            max_pick: 50,
            columns: 10,
            prices: price_table(3.0, 50, 50),
        },
        GameKind::Custom => return None,
    };
    Some(domain)
}

pub fn parse_game(name: &str) -> Option<GameKind> {
    match name.trim().to_lowercase().as_str() {
        "lotofacil" | "lotofácil" | "loto" => Some(GameKind::Lotofacil),
        "megasena" | "mega-sena" | "mega" => Some(GameKind::MegaSena),
        "quina" => Some(GameKind::Quina),
        "lotomania" | "mania" => Some(GameKind::Lotomania),
        _ => None,
    }
}
