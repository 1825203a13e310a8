use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use rand::rngs::StdRng;

use lecombo_engine::config::EngineConfig;
use lecombo_engine::history::SelectionSession;
use lecombo_engine::orchestrator::{GenerationOrchestrator, GenerationRequest};
use lecombo_model::models::GameDomain;

use crate::display::display_history;
use crate::StrategyArg;

#[derive(Debug, PartialEq)]
enum InteractiveCommand {
    Select,
    Generate,
    Clear,
    Game,
    History,
    Quit,
}

fn parse_command(input: &str) -> Option<InteractiveCommand> {
    match input.trim().to_lowercase().as_str() {
        "1" | "choisir" | "select" | "sel" => Some(InteractiveCommand::Select),
        "2" | "generer" | "générer" | "generate" | "gen" => Some(InteractiveCommand::Generate),
        "3" | "effacer" | "clear" => Some(InteractiveCommand::Clear),
        "4" | "jeu" | "game" => Some(InteractiveCommand::Game),
        "5" | "historique" | "history" | "hist" => Some(InteractiveCommand::History),
        "6" | "quitter" | "quit" | "q" | "exit" => Some(InteractiveCommand::Quit),
        _ => None,
    }
}

fn parse_strategy(input: &str) -> Option<StrategyArg> {
    match input.trim().to_lowercase().as_str() {
        "exhaustif" | "exhaustive" | "e" => Some(StrategyArg::Exhaustive),
        "equilibree" | "équilibrée" | "balanced" | "b" => Some(StrategyArg::Balanced),
        "reduite" | "réduite" | "reduced" | "r" => Some(StrategyArg::Reduced),
        "deterministe" | "déterministe" | "deterministic" | "d" => Some(StrategyArg::Deterministic),
        _ => None,
    }
}

fn display_menu(session: &SelectionSession) {
    println!();
    println!("── {} ── sélection : {} numéros, historique : {}",
        session.domain().name,
        session.selection().len(),
        session.history().len());
    println!("  1. choisir    Choisir les numéros");
    println!("  2. generer    Générer un lot");
    println!("  3. effacer    Vider l'historique");
    println!("  4. jeu        Changer de jeu");
    println!("  5. historique Tickets déjà émis");
    println!("  6. quitter    Quitter");
    println!();
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    if read == 0 {
        bail!("Fin de l'entrée");
    }
    Ok(input.trim().to_string())
}

fn prompt_with_default(msg: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}] : ", msg, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

fn cmd_select_interactive(session: &mut SelectionSession) -> Result<()> {
    let domain = session.domain();
    let input = prompt(&format!(
        "Numéros ({:02}-{:02}, vide = aucun) : ",
        domain.first_number,
        domain.last_number()
    ))?;
    let numbers = super::parse_numbers(&input)?;
    session.set_selection(&numbers)?;
    println!("Sélection : {} numéros.", session.selection().len());
    Ok(())
}

fn cmd_generate_interactive(
    orchestrator: &mut GenerationOrchestrator,
    session: &mut SelectionSession,
    rng: &mut StdRng,
) -> Result<()> {
    let min_pick = session.domain().min_pick;
    let size: usize = prompt_with_default("Numéros par ticket", &min_pick.to_string())?
        .parse()
        .context("Taille invalide")?;
    let count: usize = prompt_with_default("Nombre de tickets", "10")?
        .parse()
        .context("Nombre invalide")?;
    let strategy_str = prompt_with_default("Stratégie (exhaustif, equilibree, reduite, deterministe)", "equilibree")?;
    let Some(strategy) = parse_strategy(&strategy_str) else {
        bail!("Stratégie inconnue : '{}'", strategy_str);
    };
    let guarantee = match strategy {
        StrategyArg::Reduced | StrategyArg::Deterministic => {
            let default = size.saturating_sub(1).max(1).to_string();
            Some(prompt_with_default("Garantie", &default)?.parse().context("Garantie invalide")?)
        }
        _ => None,
    };

    let mut request = GenerationRequest::new(size, count, super::strategy_kind(strategy, guarantee)?);
    let previous = prompt_with_default("Tirage précédent (vide = inconnu)", "")?;
    if !previous.is_empty() {
        request = request.with_previous_draw(super::parse_numbers(&previous)?);
    }

    let outcome = super::run_generation(orchestrator, session, &request, rng)?;
    super::show_outcome(session.domain(), &request, &outcome);
    Ok(())
}

fn cmd_game_interactive(session: &mut SelectionSession) -> Result<()> {
    let name = prompt("Jeu (lotofacil, megasena, quina, lotomania) : ")?;
    let domain = super::load_domain(&name, None)?;
    println!("Jeu actif : {} (sélection et historique remis à zéro)", domain.name);
    session.switch_game(domain);
    Ok(())
}

pub fn run_interactive(config: EngineConfig, domain: GameDomain, seed: Option<u64>) -> Result<()> {
    println!("Bienvenue dans le mode interactif de lecombo !");

    let mut session = SelectionSession::new(domain);
    let mut orchestrator = GenerationOrchestrator::new(config);
    let mut rng = super::make_rng(seed);

    loop {
        display_menu(&session);
        let input = match prompt("> ") {
            Ok(s) => s,
            Err(_) => break, // EOF / Ctrl+D
        };

        if input.is_empty() {
            continue;
        }

        let result = match parse_command(&input) {
            Some(InteractiveCommand::Quit) => {
                println!("Au revoir !");
                break;
            }
            Some(InteractiveCommand::Select) => cmd_select_interactive(&mut session),
            Some(InteractiveCommand::Generate) => {
                cmd_generate_interactive(&mut orchestrator, &mut session, &mut rng)
            }
            Some(InteractiveCommand::Clear) => {
                session.clear_history();
                println!("Historique vidé.");
                Ok(())
            }
            Some(InteractiveCommand::Game) => cmd_game_interactive(&mut session),
            Some(InteractiveCommand::History) => {
                display_history(session.history());
                Ok(())
            }
            None => {
                println!("Commande inconnue : '{}'. Tapez un numéro (1-6) ou un nom de commande.", input);
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("Erreur: {e:#}");
        }
    }

    Ok(())
}
