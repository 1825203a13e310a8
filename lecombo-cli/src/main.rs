mod display;
mod interactive;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;

use lecombo_engine::config::{EngineConfig, load_config};
use lecombo_engine::history::SelectionSession;
use lecombo_engine::orchestrator::{
    GenerationOrchestrator, GenerationOutcome, GenerationRequest, RankingOptions,
};
use lecombo_engine::scoring::ScoringEngine;
use lecombo_engine::strategy::StrategyKind;
use lecombo_engine::suggestion::StaticSuggestions;
use lecombo_model::games::{PRESETS, parse_game, preset};
use lecombo_model::models::{GameDomain, Ticket, validate_numbers};

use crate::display::{display_games, display_outcome, display_ticket_stats, display_tickets};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum StrategyArg {
    Exhaustive,
    #[default]
    Balanced,
    Reduced,
    Deterministic,
}

#[derive(Parser)]
#[command(name = "lecombo", about = "Générateur de fermetures pour loteries")]
struct Cli {
    /// Configuration du moteur (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lister les jeux disponibles
    Games,

    /// Générer un lot de tickets
    Generate {
        /// Jeu (lotofacil, megasena, quina, lotomania)
        #[arg(short, long, default_value = "lotofacil")]
        game: String,

        /// Jeu personnalisé décrit en JSON (remplace --game)
        #[arg(long)]
        game_file: Option<PathBuf>,

        /// Numéros par ticket (défaut : minimum du jeu)
        #[arg(short, long)]
        size: Option<usize>,

        /// Nombre de tickets
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Stratégie de génération
        #[arg(long, default_value = "balanced")]
        strategy: StrategyArg,

        /// Taille des sous-ensembles à couvrir (fermetures)
        #[arg(long)]
        guarantee: Option<usize>,

        /// Numéros sélectionnés (ex: 1,5,12)
        #[arg(long)]
        select: Option<String>,

        /// Tirage précédent, pour le comptage des répétitions
        #[arg(long)]
        previous: Option<String>,

        /// Sur-échantillonnage avant classement par score
        #[arg(long)]
        top_oversample: Option<usize>,

        /// Score minimal des tickets retenus
        #[arg(long)]
        min_score: Option<u8>,

        /// Fichier JSON de suggestions externes
        #[arg(long)]
        suggestions: Option<PathBuf>,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Statistiques détaillées et score d'un ticket
    Stats {
        #[arg(short, long, default_value = "lotofacil")]
        game: String,

        #[arg(long)]
        game_file: Option<PathBuf>,

        /// Numéros du ticket (ex: 1,2,3,4,5,6)
        #[arg(short, long)]
        numbers: String,

        #[arg(long)]
        previous: Option<String>,
    },

    /// Mode interactif : l'historique persiste d'une génération à l'autre
    Interactive {
        #[arg(short, long, default_value = "lotofacil")]
        game: String,

        #[arg(long)]
        game_file: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_engine_config(cli.config.as_deref())?;

    match cli.command {
        Command::Games => {
            let domains: Vec<GameDomain> = PRESETS.iter().filter_map(|&k| preset(k)).collect();
            display_games(&domains);
            Ok(())
        }
        Command::Generate {
            game,
            game_file,
            size,
            count,
            strategy,
            guarantee,
            select,
            previous,
            top_oversample,
            min_score,
            suggestions,
            seed,
        } => {
            let domain = load_domain(&game, game_file.as_deref())?;
            let size = size.unwrap_or(domain.min_pick);
            let mut request = GenerationRequest::new(size, count, strategy_kind(strategy, guarantee)?);
            if let Some(prev) = previous {
                request = request.with_previous_draw(parse_numbers(&prev)?);
            }
            if top_oversample.is_some() || min_score.is_some() {
                request = request.with_ranking(RankingOptions {
                    oversample: top_oversample.unwrap_or(RankingOptions::default().oversample),
                    min_score,
                });
            }
            let selection = match select {
                Some(s) => parse_numbers(&s)?,
                None => Vec::new(),
            };
            cmd_generate(config, domain, &selection, &request, suggestions.as_deref(), seed)
        }
        Command::Stats {
            game,
            game_file,
            numbers,
            previous,
        } => {
            let domain = load_domain(&game, game_file.as_deref())?;
            let previous = previous.map(|p| parse_numbers(&p)).transpose()?;
            cmd_stats(&domain, &parse_numbers(&numbers)?, previous.as_deref())
        }
        Command::Interactive {
            game,
            game_file,
            seed,
        } => {
            let domain = load_domain(&game, game_file.as_deref())?;
            interactive::run_interactive(config, domain, seed)
        }
    }
}

fn cmd_generate(
    config: EngineConfig,
    domain: GameDomain,
    selection: &[u8],
    request: &GenerationRequest,
    suggestions: Option<&Path>,
    seed: Option<u64>,
) -> Result<()> {
    let mut session = SelectionSession::new(domain);
    session.set_selection(selection)?;

    let mut orchestrator = GenerationOrchestrator::new(config);
    if let Some(path) = suggestions {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {}", path.display()))?;
        let source = StaticSuggestions::from_json(&json)?;
        log::info!("{} suggestions lues depuis {}", source.len(), path.display());
        orchestrator = orchestrator.with_suggestion_source(Box::new(source));
    }

    let mut rng = make_rng(seed);
    let outcome = run_generation(&mut orchestrator, &mut session, request, &mut rng)?;
    show_outcome(session.domain(), request, &outcome);
    Ok(())
}

fn cmd_stats(domain: &GameDomain, numbers: &[u8], previous: Option<&[u8]>) -> Result<()> {
    validate_numbers(numbers, domain)?;
    if let Some(prev) = previous {
        validate_numbers(prev, domain)?;
    }
    let ticket = Ticket::new(numbers.to_vec())?;
    let result = ScoringEngine::new(domain).evaluate(ticket.numbers(), previous);
    display_ticket_stats(&ticket, &result.stats, result.score);
    Ok(())
}

/// Lance une génération avec une barre de progression alimentée par le moteur.
pub fn run_generation(
    orchestrator: &mut GenerationOrchestrator,
    session: &mut SelectionSession,
    request: &GenerationRequest,
    rng: &mut StdRng,
) -> Result<GenerationOutcome> {
    let pb = ProgressBar::new(100);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        .unwrap()
        .progress_chars("=> "));
    pb.set_message(request.strategy.to_string());

    let result = orchestrator.generate(session, request, rng, &mut |p| pb.set_position(p as u64));
    pb.finish_and_clear();
    let outcome = result?;
    log::debug!(
        "Génération #{} terminée : {} tickets, {} avertissements",
        outcome.id,
        outcome.tickets.len(),
        outcome.warnings.len()
    );
    Ok(outcome)
}

pub fn show_outcome(domain: &GameDomain, request: &GenerationRequest, outcome: &GenerationOutcome) {
    let engine = ScoringEngine::new(domain);
    display_tickets(&outcome.tickets, &engine, request.previous_draw.as_deref());
    display_outcome(domain, request.ticket_size, outcome);
}

pub fn strategy_kind(arg: StrategyArg, guarantee: Option<usize>) -> Result<StrategyKind> {
    let kind = match (arg, guarantee) {
        (StrategyArg::Exhaustive, _) => StrategyKind::Exhaustive,
        (StrategyArg::Balanced, _) => StrategyKind::Balanced,
        (StrategyArg::Reduced, Some(guarantee)) => StrategyKind::Reduced { guarantee },
        (StrategyArg::Deterministic, Some(guarantee)) => StrategyKind::Deterministic { guarantee },
        (_, None) => bail!("Les fermetures demandent --guarantee"),
    };
    Ok(kind)
}

pub fn load_domain(game: &str, game_file: Option<&Path>) -> Result<GameDomain> {
    if let Some(path) = game_file {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {}", path.display()))?;
        let domain: GameDomain = serde_json::from_str(&json)
            .with_context(|| format!("Jeu invalide dans {}", path.display()))?;
        domain.validate()?;
        log::info!("Jeu personnalisé {} chargé depuis {}", domain.name, path.display());
        return Ok(domain);
    }
    let Some(kind) = parse_game(game) else {
        bail!("Jeu inconnu : '{}' (lotofacil, megasena, quina, lotomania)", game);
    };
    preset(kind).with_context(|| format!("Pas de configuration pour {}", kind))
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => {
            let config = load_config(p)?;
            log::info!("Configuration du moteur chargée depuis {}", p.display());
            Ok(config)
        }
        None => {
            log::debug!("Configuration du moteur par défaut");
            Ok(EngineConfig::default())
        }
    }
}

/// "1,5 12" -> [1, 5, 12]
pub fn parse_numbers(input: &str) -> Result<Vec<u8>> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u8>().with_context(|| format!("Numéro invalide : '{}'", s)))
        .collect()
}

pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}
