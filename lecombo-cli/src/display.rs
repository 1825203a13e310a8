use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};

use lecombo_engine::history::TicketHistory;
use lecombo_engine::orchestrator::GenerationOutcome;
use lecombo_engine::scoring::ScoringEngine;
use lecombo_engine::stats::DetailedStats;
use lecombo_model::models::{GameDomain, Ticket};

fn score_color(score: u8) -> Color {
    match score {
        90..=u8::MAX => Color::Green,
        0..=59 => Color::Red,
        _ => Color::White,
    }
}

pub fn display_games(domains: &[GameDomain]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Jeu", "Numéros", "Sélection", "Grille", "Prix"]);

    for domain in domains {
        let prices = domain
            .prices
            .iter()
            .map(|p| format!("{}: {:.2}", p.size, p.price))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            domain.name.clone(),
            format!("{:02}-{:02}", domain.first_number, domain.last_number()),
            format!("{}-{}", domain.min_pick, domain.max_pick),
            format!("{} x {}", domain.rows(), domain.columns),
            prices,
        ]);
    }
    println!("{table}");
}

pub fn display_tickets(tickets: &[Ticket], engine: &ScoringEngine, previous: Option<&[u8]>) {
    if tickets.is_empty() {
        println!("Aucun ticket généré.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Numéros", "Score", "P/I", "Somme", "Premiers", "Cadre/Centre", "Répétés"]);

    for (i, ticket) in tickets.iter().enumerate() {
        let result = engine.evaluate(ticket.numbers(), previous);
        let stats = &result.stats;
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(ticket.to_string()),
            Cell::new(result.score).fg(score_color(result.score)),
            Cell::new(format!("{}/{}", stats.even, stats.odd)),
            Cell::new(stats.sum),
            Cell::new(stats.primes),
            Cell::new(format!("{}/{}", stats.frame, stats.center)),
            Cell::new(repeats_label(stats)),
        ]);
    }
    println!("{table}");
}

fn repeats_label(stats: &DetailedStats) -> String {
    match stats.repeats {
        Some(n) => n.to_string(),
        None => "—".to_string(),
    }
}

pub fn display_outcome(domain: &GameDomain, size: usize, outcome: &GenerationOutcome) {
    println!("\nGénération #{} ({})", outcome.id, outcome.strategy);
    println!("  Tickets           : {}", outcome.tickets.len());
    if !outcome.fixed.is_empty() {
        let fixed = outcome
            .fixed
            .iter()
            .map(|n| format!("{:02}", n))
            .collect::<Vec<_>>()
            .join(" - ");
        println!("  Numéros fixes     : {}", fixed);
    }
    if outcome.adopted_external > 0 {
        println!("  Suggestions       : {}", outcome.adopted_external);
    }
    match domain.price_for(size) {
        Some(price) => println!(
            "  Coût total        : {:.2} ({} x {:.2})",
            price * outcome.tickets.len() as f64,
            outcome.tickets.len(),
            price
        ),
        None => println!("  Coût total        : prix inconnu pour {} numéros", size),
    }
    for warning in &outcome.warnings {
        println!("  ⚠ {}", warning);
    }
}

pub fn display_ticket_stats(ticket: &Ticket, stats: &DetailedStats, score: u8) {
    println!("\nTicket : {}\n", ticket);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Statistique", "Valeur"]);

    let rows: Vec<(&str, String)> = vec![
        ("Pairs", stats.even.to_string()),
        ("Impairs", stats.odd.to_string()),
        ("Somme", stats.sum.to_string()),
        ("Moyenne", format!("{:.2}", stats.mean)),
        ("Écart type", format!("{:.2}", stats.std_dev)),
        ("Premiers", stats.primes.to_string()),
        ("Fibonacci", stats.fibonacci.to_string()),
        ("Triangulaires", stats.triangular.to_string()),
        ("Multiples de 3", stats.multiples_of_3.to_string()),
        ("Cadre", stats.frame.to_string()),
        ("Centre", stats.center.to_string()),
        ("Répétés", repeats_label(stats)),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    table.add_row(vec![
        Cell::new("Score"),
        Cell::new(score).fg(score_color(score)),
    ]);
    println!("{table}");
}

pub fn display_history(history: &TicketHistory) {
    if history.is_empty() {
        println!("Historique vide.");
        return;
    }
    let mut signatures: Vec<&str> = history.iter().map(|s| s.as_str()).collect();
    signatures.sort_unstable();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Signature"]);
    for (i, sig) in signatures.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), sig.to_string()]);
    }
    println!("{table}");
    println!("{} tickets déjà émis pour cette sélection.", history.len());
}
