use anyhow::{bail, Result};

use lecombo_model::models::GameDomain;

/// Collaborateur externe capable de proposer des tickets (service de suggestions).
/// Ses échecs ne remontent jamais comme erreurs de génération.
pub trait SuggestionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Jusqu'à `count` combinaisons de `ticket_size` numéros contenant `fixed`.
    fn suggest(
        &self,
        domain: &GameDomain,
        ticket_size: usize,
        fixed: &[u8],
        count: usize,
    ) -> Result<Vec<Vec<u8>>>;
}

/// Lot de suggestions déjà connu, par exemple lu depuis un fichier JSON.
#[derive(Debug, Clone, Default)]
pub struct StaticSuggestions {
    batch: Vec<Vec<u8>>,
}

impl StaticSuggestions {
    pub fn new(batch: Vec<Vec<u8>>) -> Self {
        Self { batch }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let batch: Vec<Vec<u8>> = serde_json::from_str(json)?;
        Ok(Self { batch })
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

impl SuggestionSource for StaticSuggestions {
    fn name(&self) -> &str {
        "suggestions statiques"
    }

    fn suggest(
        &self,
        _domain: &GameDomain,
        ticket_size: usize,
        fixed: &[u8],
        count: usize,
    ) -> Result<Vec<Vec<u8>>> {
        if self.batch.is_empty() {
            bail!("aucune suggestion disponible");
        }
        Ok(self
            .batch
            .iter()
            .filter(|s| s.len() == ticket_size && fixed.iter().all(|f| s.contains(f)))
            .take(count)
            .cloned()
            .collect())
    }
}
