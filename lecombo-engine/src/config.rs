use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Bornes et réglages du moteur. Toutes les boucles aléatoires sont bornées par ces valeurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nombre maximal de tickets produits par l'énumération exhaustive.
    pub enumeration_cap: usize,
    /// Tentatives par ticket avant d'abandonner dans la matrice équilibrée.
    pub balanced_max_retries: usize,
    /// Tirages aléatoires de secours quand le lot reste incomplet.
    pub safety_iterations: usize,
    /// Nombre maximal de sous-combinaisons suivies par une fermeture.
    pub coverage_universe_cap: usize,
    /// Variantes essayées pour une graine de couverture dont le ticket est exclu.
    pub closing_max_retries: usize,
    /// Nombre de tickets entre deux rapports de progression.
    pub progress_chunk: usize,
    /// Largeur de la fenêtre de candidats tirés au hasard dans la fermeture réduite.
    pub candidate_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enumeration_cap: 500_000,
            balanced_max_retries: 1000,
            safety_iterations: 1000,
            coverage_universe_cap: 2_000_000,
            closing_max_retries: 64,
            progress_chunk: 32,
            candidate_window: 3,
        }
    }
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire la configuration {:?}", path))?;
    let config = serde_json::from_str(&json)
        .with_context(|| format!("Configuration invalide {:?}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.enumeration_cap, 500_000);
        assert_eq!(config.balanced_max_retries, 1000);
        assert_eq!(config.safety_iterations, 1000);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let restored: EngineConfig = serde_json::from_str(r#"{"enumeration_cap": 10}"#).unwrap();
        assert_eq!(restored.enumeration_cap, 10);
        assert_eq!(restored.progress_chunk, 32);
    }

    #[test]
    fn test_load_config_missing_file() {
        let path = std::env::temp_dir().join("lecombo_config_absent.json");
        let _ = std::fs::remove_file(&path);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_load_config_file() {
        let path = std::env::temp_dir().join("lecombo_config_test.json");
        std::fs::write(&path, r#"{"safety_iterations": 5}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.safety_iterations, 5);
        let _ = std::fs::remove_file(&path);
    }
}
