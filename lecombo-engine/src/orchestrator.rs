use std::collections::HashSet;

use anyhow::anyhow;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use lecombo_model::models::{validate_numbers, GameDomain, Ticket};

use crate::balanced::BalancedMatrixBuilder;
use crate::config::EngineConfig;
use crate::error::{GenerationError, GenerationWarning, Result};
use crate::history::{SelectionSession, TicketHistory};
use crate::progress::{CancellationHandle, Progress};
use crate::scoring::ScoringEngine;
use crate::strategy::{build_strategy, GenerationStrategy, StrategyInput, StrategyKind};
use crate::suggestion::SuggestionSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating { id: u64 },
    Success { id: u64, produced: usize },
    Error { id: u64, message: String },
}

/// Sur-échantillonnage puis sélection des meilleurs tickets selon le score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingOptions {
    pub oversample: usize,
    pub min_score: Option<u8>,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            oversample: 3,
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub ticket_size: usize,
    pub count: usize,
    pub strategy: StrategyKind,
    #[serde(default)]
    pub previous_draw: Option<Vec<u8>>,
    #[serde(default)]
    pub ranking: Option<RankingOptions>,
}

impl GenerationRequest {
    pub fn new(ticket_size: usize, count: usize, strategy: StrategyKind) -> Self {
        Self {
            ticket_size,
            count,
            strategy,
            previous_draw: None,
            ranking: None,
        }
    }

    pub fn with_previous_draw(mut self, draw: Vec<u8>) -> Self {
        self.previous_draw = Some(draw);
        self
    }

    pub fn with_ranking(mut self, ranking: RankingOptions) -> Self {
        self.ranking = Some(ranking);
        self
    }

    /// Nombre de candidats à assembler avant l'éventuel classement.
    fn target(&self) -> usize {
        match self.ranking {
            Some(r) => self.count.saturating_mul(r.oversample.max(1)),
            None => self.count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub id: u64,
    pub tickets: Vec<Ticket>,
    pub fixed: Vec<u8>,
    pub strategy: String,
    pub warnings: Vec<GenerationWarning>,
    pub adopted_external: usize,
}

/// Découpe la sélection en numéros fixes et pool libre.
/// - sélection vide : tout le domaine est libre ;
/// - sélection plus petite que le ticket : elle est fixée, le reste du domaine est libre ;
/// - sinon la sélection elle-même est le pool.
pub fn partition_selection(
    domain: &GameDomain,
    selection: &[u8],
    ticket_size: usize,
) -> (Vec<u8>, Vec<u8>) {
    let mut selection = selection.to_vec();
    selection.sort_unstable();
    selection.dedup();
    if selection.is_empty() {
        (Vec::new(), domain.numbers())
    } else if selection.len() < ticket_size {
        let free = domain
            .numbers()
            .into_iter()
            .filter(|n| selection.binary_search(n).is_err())
            .collect();
        (selection, free)
    } else {
        (Vec::new(), selection)
    }
}

/// Lot en cours d'assemblage : dédoublonne contre l'historique et contre lui-même.
struct Batch<'a> {
    fixed: &'a [u8],
    history: &'a TicketHistory,
    seen: TicketHistory,
    tickets: Vec<Ticket>,
}

impl<'a> Batch<'a> {
    fn new(fixed: &'a [u8], history: &'a TicketHistory) -> Self {
        Self {
            fixed,
            history,
            seen: TicketHistory::new(),
            tickets: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.tickets.len()
    }

    fn push_inner(&mut self, inner: &[u8]) -> Result<bool> {
        let mut numbers = Vec::with_capacity(self.fixed.len() + inner.len());
        numbers.extend_from_slice(self.fixed);
        numbers.extend_from_slice(inner);
        self.push(Ticket::new(numbers)?)
    }

    fn push(&mut self, ticket: Ticket) -> Result<bool> {
        if self.history.contains_ticket(&ticket) || !self.seen.add_ticket(&ticket) {
            return Ok(false);
        }
        self.tickets.push(ticket);
        Ok(true)
    }

    /// Exclusions au niveau des tickets internes : historique + lot courant.
    fn inner_exclusions(&self) -> TicketHistory {
        let mut all = self.history.clone();
        all.merge(&self.seen);
        all.project_out(self.fixed)
    }
}

pub struct GenerationOrchestrator {
    config: EngineConfig,
    state: GenerationState,
    cancellation: CancellationHandle,
    suggestions: Option<Box<dyn SuggestionSource>>,
    strategy: Option<Box<dyn GenerationStrategy>>,
}

impl GenerationOrchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: GenerationState::Idle,
            cancellation: CancellationHandle::new(),
            suggestions: None,
            strategy: None,
        }
    }

    pub fn with_suggestion_source(mut self, source: Box<dyn SuggestionSource>) -> Self {
        self.suggestions = Some(source);
        self
    }

    /// Remplace la stratégie déduite de la requête par une implémentation fournie.
    pub fn with_strategy(mut self, strategy: Box<dyn GenerationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Partage le compteur de générations avec d'autres orchestrateurs ou threads.
    pub fn with_cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancellation = handle;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn cancellation(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Génère un lot pour la sélection courante de `session`, puis enregistre les
    /// tickets retournés dans son historique. Une requête invalide échoue avant tout
    /// travail et laisse l'état inchangé.
    pub fn generate(
        &mut self,
        session: &mut SelectionSession,
        request: &GenerationRequest,
        rng: &mut StdRng,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<GenerationOutcome> {
        let domain = session.domain().clone();
        let (fixed, free) = partition_selection(&domain, session.selection(), request.ticket_size);
        validate_request(&domain, session.selection(), &fixed, request)?;

        let token = self.cancellation.begin();
        let id = token.id();
        self.state = GenerationState::Generating { id };
        log::info!(
            "Génération #{} : {} x {} numéros, {}, {} fixes, pool de {}",
            id,
            request.count,
            request.ticket_size,
            request.strategy,
            fixed.len(),
            free.len()
        );

        let mut progress = Progress::new(on_progress).with_token(token);
        let result = self.assemble(
            &domain,
            session.history(),
            request,
            &fixed,
            &free,
            rng,
            &mut progress,
        );

        match result {
            Ok(assembled) => {
                session.record(&assembled.tickets);
                progress.finish();
                self.state = GenerationState::Success {
                    id,
                    produced: assembled.tickets.len(),
                };
                Ok(GenerationOutcome {
                    id,
                    tickets: assembled.tickets,
                    fixed,
                    strategy: assembled.strategy,
                    warnings: assembled.warnings,
                    adopted_external: assembled.adopted,
                })
            }
            Err(GenerationError::Superseded { id }) => {
                log::info!("Génération #{} abandonnée au profit d'une requête plus récente", id);
                self.state = GenerationState::Idle;
                Err(GenerationError::Superseded { id })
            }
            Err(err) => {
                log::error!("Génération #{} en échec : {}", id, err);
                self.state = GenerationState::Error {
                    id,
                    message: err.to_string(),
                };
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        domain: &GameDomain,
        history: &TicketHistory,
        request: &GenerationRequest,
        fixed: &[u8],
        free: &[u8],
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<Assembled> {
        let inner_size = request.ticket_size - fixed.len();
        let target = request.target();
        let mut batch = Batch::new(fixed, history);
        let mut warnings = Vec::new();

        // Suggestions externes : adoptées telles quelles si elles sont valides
        let adopted = match &self.suggestions {
            Some(source) => self.adopt_suggestions(
                source.as_ref(),
                domain,
                request,
                target,
                &mut batch,
                &mut warnings,
            )?,
            None => 0,
        };
        progress.within(0.0, 0.05, |p| p.report(1, 1));

        // Stratégie principale sur le pool libre
        let built;
        let strategy: &dyn GenerationStrategy = match &self.strategy {
            Some(custom) => custom.as_ref(),
            None => {
                built = build_strategy(request.strategy, &self.config);
                built.as_ref()
            }
        };
        let strategy_name = strategy.name().to_string();
        if batch.len() < target {
            let exclusions = batch.inner_exclusions();
            let input = StrategyInput {
                pool: free,
                ticket_size: inner_size,
                count: target - batch.len(),
                exclusions: &exclusions,
            };
            let inner = progress.within(0.05, 0.75, |p| strategy.generate(&input, rng, p))?;
            for ticket in &inner {
                batch.push_inner(ticket.numbers())?;
            }
        }

        // Complément par matrice équilibrée sur tout le domaine hors numéros fixes
        let backfill_pool: Vec<u8> = domain
            .numbers()
            .into_iter()
            .filter(|n| !fixed.contains(n))
            .collect();
        if batch.len() < target {
            let warning = GenerationWarning::InsufficientCoverage {
                strategy: strategy_name.clone(),
                produced: batch.len(),
                requested: target,
            };
            log::warn!("{}", warning);
            warnings.push(warning);

            let exclusions = batch.inner_exclusions();
            let missing = target - batch.len();
            let balanced = BalancedMatrixBuilder::from_config(&self.config);
            let fill = progress.within(0.75, 0.9, |p| {
                balanced.build(&backfill_pool, inner_size, missing, &exclusions, rng, p)
            })?;
            for ticket in &fill {
                batch.push_inner(ticket.numbers())?;
            }
        }
        batch.tickets.truncate(target);

        // Boucle de sécurité : tirages aléatoires bornés
        if batch.len() < target {
            progress.within(0.9, 1.0, |p| {
                self.safety_fill(&backfill_pool, inner_size, target, &mut batch, rng, p)
            })?;
            if batch.len() < target {
                let warning = GenerationWarning::Exhausted {
                    produced: batch.len(),
                    requested: target,
                };
                log::warn!("{}", warning);
                warnings.push(warning);
            }
        }

        let mut tickets = batch.tickets;
        check_invariants(&tickets, domain, history, fixed, request.ticket_size)?;

        if let Some(ranking) = request.ranking {
            let engine = ScoringEngine::new(domain);
            let ranked = engine.rank(
                tickets,
                request.previous_draw.as_deref(),
                request.count,
                ranking.min_score,
            );
            log::debug!("Classement : {} tickets retenus", ranked.len());
            tickets = ranked.into_iter().map(|s| s.ticket).collect();
        }

        Ok(Assembled {
            tickets,
            strategy: strategy_name,
            warnings,
            adopted,
        })
    }

    fn adopt_suggestions(
        &self,
        source: &dyn SuggestionSource,
        domain: &GameDomain,
        request: &GenerationRequest,
        target: usize,
        batch: &mut Batch<'_>,
        warnings: &mut Vec<GenerationWarning>,
    ) -> Result<usize> {
        let failure = match source.suggest(domain, request.ticket_size, batch.fixed, target) {
            Ok(suggested) if suggested.is_empty() => Some("lot vide".to_string()),
            Ok(suggested) => {
                let mut adopted = 0;
                for numbers in suggested {
                    if batch.len() >= target {
                        break;
                    }
                    let Ok(ticket) = Ticket::new(numbers) else {
                        continue;
                    };
                    if !ticket.fits(domain, request.ticket_size) || !ticket.contains_all(batch.fixed) {
                        continue;
                    }
                    if batch.push(ticket)? {
                        adopted += 1;
                    }
                }
                if adopted > 0 {
                    log::info!("{} : {} tickets adoptés", source.name(), adopted);
                    return Ok(adopted);
                }
                Some("aucune suggestion exploitable".to_string())
            }
            Err(err) => Some(err.to_string()),
        };

        if let Some(message) = failure {
            log::warn!("{} : {}, génération locale", source.name(), message);
            warnings.push(GenerationWarning::ExternalSuggestionFailure(message));
        }
        Ok(0)
    }

    fn safety_fill(
        &self,
        pool: &[u8],
        inner_size: usize,
        target: usize,
        batch: &mut Batch<'_>,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<()> {
        let iterations = self.config.safety_iterations;
        let chunk = self.config.progress_chunk.max(1);
        for i in 0..iterations {
            if batch.len() >= target {
                break;
            }
            let inner: Vec<u8> = index::sample(rng, pool.len(), inner_size)
                .into_iter()
                .map(|j| pool[j])
                .collect();
            batch.push_inner(&inner)?;
            if (i + 1) % chunk == 0 {
                progress.checkpoint(i + 1, iterations)?;
            }
        }
        Ok(())
    }
}

struct Assembled {
    tickets: Vec<Ticket>,
    strategy: String,
    warnings: Vec<GenerationWarning>,
    adopted: usize,
}

fn validate_request(
    domain: &GameDomain,
    selection: &[u8],
    fixed: &[u8],
    request: &GenerationRequest,
) -> Result<()> {
    let size = request.ticket_size;
    if !domain.accepts_size(size) {
        return Err(GenerationError::InvalidTicketSize {
            game: domain.name.clone(),
            size,
            min: domain.min_pick,
            max: domain.max_pick,
        });
    }
    if (domain.total_numbers as usize) < size {
        return Err(GenerationError::InvalidSelection(format!(
            "{} numéros disponibles pour des tickets de {}",
            domain.total_numbers, size
        )));
    }
    validate_numbers(selection, domain)
        .map_err(|e| GenerationError::InvalidSelection(e.to_string()))?;
    if request.count == 0 {
        return Err(GenerationError::InvalidRequest("nombre de tickets nul".into()));
    }
    if let Some(ranking) = request.ranking {
        if ranking.oversample == 0 {
            return Err(GenerationError::InvalidRequest(
                "facteur de sur-échantillonnage nul".into(),
            ));
        }
    }
    if let Some(draw) = &request.previous_draw {
        validate_numbers(draw, domain)
            .map_err(|e| GenerationError::InvalidRequest(format!("tirage précédent : {e}")))?;
    }
    let inner = size - fixed.len();
    if let Some(guarantee) = request.strategy.guarantee() {
        if guarantee == 0 || guarantee > inner {
            return Err(GenerationError::InvalidRequest(format!(
                "garantie {guarantee} hors de 1..={inner}"
            )));
        }
    }
    Ok(())
}

/// Dernier contrôle avant de rendre le lot : toute violation est une erreur interne.
fn check_invariants(
    tickets: &[Ticket],
    domain: &GameDomain,
    history: &TicketHistory,
    fixed: &[u8],
    size: usize,
) -> Result<()> {
    let mut seen = HashSet::with_capacity(tickets.len());
    for ticket in tickets {
        if !ticket.fits(domain, size) {
            return Err(anyhow!("ticket {} invalide pour {}", ticket, domain.name).into());
        }
        if !ticket.contains_all(fixed) {
            return Err(anyhow!("ticket {} sans les numéros fixes", ticket).into());
        }
        let signature = ticket.signature();
        if history.contains(&signature) || !seen.insert(signature) {
            return Err(anyhow!("ticket {} en double", ticket).into());
        }
    }
    Ok(())
}
