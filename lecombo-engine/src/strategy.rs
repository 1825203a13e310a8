use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use lecombo_model::models::Ticket;

use crate::balanced::BalancedMatrixBuilder;
use crate::closing::{DeterministicClosingBuilder, ReducedClosingBuilder};
use crate::config::EngineConfig;
use crate::enumerator::CombinationEnumerator;
use crate::error::Result;
use crate::history::TicketHistory;
use crate::progress::Progress;

/// Entrée commune à toutes les stratégies. `exclusions` est en lecture seule.
pub struct StrategyInput<'a> {
    pub pool: &'a [u8],
    pub ticket_size: usize,
    pub count: usize,
    pub exclusions: &'a TicketHistory,
}

pub trait GenerationStrategy: Send + Sync {
    fn name(&self) -> &str;
    /// Produit au plus `count` tickets distincts de `ticket_size` numéros tirés de `pool`,
    /// aucun n'appartenant à `exclusions`.
    fn generate(
        &self,
        input: &StrategyInput<'_>,
        rng: &mut StdRng,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<Ticket>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StrategyKind {
    Exhaustive,
    Balanced,
    Reduced { guarantee: usize },
    Deterministic { guarantee: usize },
}

impl StrategyKind {
    pub fn guarantee(&self) -> Option<usize> {
        match self {
            StrategyKind::Reduced { guarantee } | StrategyKind::Deterministic { guarantee } => {
                Some(*guarantee)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Exhaustive => write!(f, "exhaustive"),
            StrategyKind::Balanced => write!(f, "équilibrée"),
            StrategyKind::Reduced { guarantee } => write!(f, "réduite (garantie {guarantee})"),
            StrategyKind::Deterministic { guarantee } => {
                write!(f, "déterministe (garantie {guarantee})")
            }
        }
    }
}

pub fn build_strategy(kind: StrategyKind, config: &EngineConfig) -> Box<dyn GenerationStrategy> {
    match kind {
        StrategyKind::Exhaustive => Box::new(CombinationEnumerator::new(config.enumeration_cap)),
        StrategyKind::Balanced => Box::new(BalancedMatrixBuilder::from_config(config)),
        StrategyKind::Reduced { guarantee } => {
            Box::new(ReducedClosingBuilder::new(guarantee, config))
        }
        StrategyKind::Deterministic { guarantee } => {
            Box::new(DeterministicClosingBuilder::new(guarantee, config))
        }
    }
}
