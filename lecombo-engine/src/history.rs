use std::collections::HashSet;

use anyhow::Result;
use lecombo_model::models::{validate_numbers, GameDomain, Ticket, TicketSignature};

/// Signatures déjà émises pendant la session de sélection courante.
#[derive(Debug, Clone, Default)]
pub struct TicketHistory {
    signatures: HashSet<TicketSignature>,
}

impl TicketHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, signature: &TicketSignature) -> bool {
        self.signatures.contains(signature)
    }

    pub fn contains_ticket(&self, ticket: &Ticket) -> bool {
        self.contains(&ticket.signature())
    }

    /// Retourne `false` si la signature était déjà présente.
    pub fn add(&mut self, signature: TicketSignature) -> bool {
        self.signatures.insert(signature)
    }

    pub fn add_ticket(&mut self, ticket: &Ticket) -> bool {
        self.add(ticket.signature())
    }

    pub fn merge(&mut self, other: &TicketHistory) {
        self.signatures.extend(other.signatures.iter().cloned());
    }

    pub fn clear(&mut self) {
        self.signatures.clear();
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TicketSignature> {
        self.signatures.iter()
    }

    /// Ramène l'historique au niveau des tickets internes : pour chaque ticket qui
    /// contient tous les numéros fixes, on garde la signature de ses numéros libres.
    pub fn project_out(&self, fixed: &[u8]) -> TicketHistory {
        if fixed.is_empty() {
            return self.clone();
        }
        let signatures = self
            .signatures
            .iter()
            .filter_map(|sig| {
                let numbers = sig.numbers();
                if !fixed.iter().all(|f| numbers.contains(f)) {
                    return None;
                }
                let inner: Vec<u8> = numbers.into_iter().filter(|n| !fixed.contains(n)).collect();
                Some(TicketSignature::of(&inner))
            })
            .collect();
        TicketHistory { signatures }
    }
}

/// Session de sélection : jeu actif, numéros choisis et historique associé.
/// C'est la seule donnée partagée d'un appel à l'autre ; seul l'orchestrateur
/// enregistre de nouveaux tickets.
#[derive(Debug, Clone)]
pub struct SelectionSession {
    domain: GameDomain,
    selection: Vec<u8>,
    history: TicketHistory,
}

impl SelectionSession {
    pub fn new(domain: GameDomain) -> Self {
        Self {
            domain,
            selection: Vec::new(),
            history: TicketHistory::new(),
        }
    }

    pub fn domain(&self) -> &GameDomain {
        &self.domain
    }

    pub fn selection(&self) -> &[u8] {
        &self.selection
    }

    pub fn history(&self) -> &TicketHistory {
        &self.history
    }

    /// Change la sélection ; l'historique est vidé si elle diffère de la précédente.
    pub fn set_selection(&mut self, numbers: &[u8]) -> Result<()> {
        validate_numbers(numbers, &self.domain)?;
        let mut sorted = numbers.to_vec();
        sorted.sort_unstable();
        if sorted != self.selection {
            log::debug!(
                "Nouvelle sélection ({} numéros), historique vidé ({} signatures)",
                sorted.len(),
                self.history.len()
            );
            self.selection = sorted;
            self.history.clear();
        }
        Ok(())
    }

    pub fn switch_game(&mut self, domain: GameDomain) {
        log::debug!("Changement de jeu : {} -> {}", self.domain.name, domain.name);
        self.domain = domain;
        self.selection.clear();
        self.history.clear();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub(crate) fn record(&mut self, tickets: &[Ticket]) {
        for ticket in tickets {
            self.history.add_ticket(ticket);
        }
        log::debug!("Historique : {} signatures", self.history.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecombo_model::games::preset;
    use lecombo_model::models::GameKind;

    #[test]
    fn test_add_contains() {
        let mut history = TicketHistory::new();
        let ticket = Ticket::new(vec![6, 5, 4, 3, 2, 1]).unwrap();
        assert!(!history.contains_ticket(&ticket));
        assert!(history.add_ticket(&ticket));
        assert!(!history.add_ticket(&ticket));
        assert!(history.contains(&TicketSignature::of(&[1, 2, 3, 4, 5, 6])));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_merge() {
        let mut a = TicketHistory::new();
        a.add(TicketSignature::of(&[1, 2]));
        let mut b = TicketHistory::new();
        b.add(TicketSignature::of(&[1, 2]));
        b.add(TicketSignature::of(&[3, 4]));
        a.merge(&b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_project_out() {
        let mut history = TicketHistory::new();
        history.add(TicketSignature::of(&[1, 2, 7, 9]));
        history.add(TicketSignature::of(&[3, 4, 5, 6]));
        let inner = history.project_out(&[1, 2]);
        assert_eq!(inner.len(), 1);
        assert!(inner.contains(&TicketSignature::of(&[7, 9])));
    }

    #[test]
    fn test_session_clears_on_new_selection() {
        let domain = preset(GameKind::MegaSena).unwrap();
        let mut session = SelectionSession::new(domain);
        session.set_selection(&[1, 2, 3]).unwrap();
        session.record(&[Ticket::new(vec![1, 2, 3, 4, 5, 6]).unwrap()]);
        assert_eq!(session.history().len(), 1);

        // Même sélection dans un autre ordre : historique conservé
        session.set_selection(&[3, 2, 1]).unwrap();
        assert_eq!(session.history().len(), 1);

        session.set_selection(&[1, 2, 4]).unwrap();
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_session_switch_game() {
        let mut session = SelectionSession::new(preset(GameKind::MegaSena).unwrap());
        session.set_selection(&[10, 20]).unwrap();
        session.record(&[Ticket::new(vec![1, 2, 3, 4, 5, 6]).unwrap()]);
        session.switch_game(preset(GameKind::Lotofacil).unwrap());
        assert!(session.history().is_empty());
        assert!(session.selection().is_empty());
        assert_eq!(session.domain().total_numbers, 25);
    }

    #[test]
    fn test_session_rejects_invalid_selection() {
        let mut session = SelectionSession::new(preset(GameKind::Lotofacil).unwrap());
        assert!(session.set_selection(&[0, 1]).is_err());
        assert!(session.set_selection(&[5, 5]).is_err());
    }
}
