use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("taille de ticket {size} hors limites pour {game} ({min}-{max})")]
    InvalidTicketSize {
        game: String,
        size: usize,
        min: usize,
        max: usize,
    },

    #[error("sélection invalide : {0}")]
    InvalidSelection(String),

    #[error("requête invalide : {0}")]
    InvalidRequest(String),

    #[error("génération #{id} remplacée par une requête plus récente")]
    Superseded { id: u64 },

    #[error("erreur interne de génération : {0}")]
    Internal(#[from] anyhow::Error),
}

impl GenerationError {
    /// Vrai pour les erreurs détectées avant tout travail de génération.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            GenerationError::InvalidTicketSize { .. }
                | GenerationError::InvalidSelection(_)
                | GenerationError::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Incidents non bloquants, résolus en interne et rapportés avec le lot.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationWarning {
    InsufficientCoverage {
        strategy: String,
        produced: usize,
        requested: usize,
    },
    ExternalSuggestionFailure(String),
    Exhausted {
        produced: usize,
        requested: usize,
    },
}

impl std::fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationWarning::InsufficientCoverage { strategy, produced, requested } => write!(
                f,
                "{strategy} : {produced}/{requested} tickets, complément par matrice équilibrée"
            ),
            GenerationWarning::ExternalSuggestionFailure(msg) => {
                write!(f, "suggestions externes ignorées : {msg}")
            }
            GenerationWarning::Exhausted { produced, requested } => write!(
                f,
                "seulement {produced}/{requested} tickets uniques disponibles"
            ),
        }
    }
}
