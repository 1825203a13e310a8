use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{GenerationError, Result};

/// Compteur partagé de générations : la dernière requête l'emporte.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    latest: Arc<AtomicU64>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ouvre une nouvelle génération et rend obsolètes toutes les précédentes.
    pub fn begin(&self) -> CancelToken {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        CancelToken {
            latest: Arc::clone(&self.latest),
            id,
        }
    }

    pub fn supersede(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    latest: Arc<AtomicU64>,
    id: u64,
}

impl CancelToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_superseded(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.id
    }
}

/// Rapporte la progression (0-100) à l'appelant et sert de point de coopération
/// entre deux blocs de travail.
pub struct Progress<'a> {
    sink: Option<&'a mut dyn FnMut(u8)>,
    token: Option<CancelToken>,
    span: (f64, f64),
    last: u8,
    finished: bool,
}

impl<'a> Progress<'a> {
    pub fn new(sink: &'a mut dyn FnMut(u8)) -> Self {
        Self {
            sink: Some(sink),
            token: None,
            span: (0.0, 100.0),
            last: 0,
            finished: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            sink: None,
            token: None,
            span: (0.0, 100.0),
            last: 0,
            finished: false,
        }
    }

    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn last(&self) -> u8 {
        self.last
    }

    /// Exécute `f` dans la sous-plage [from, to] (fractions de la plage courante).
    pub fn within<R>(&mut self, from: f64, to: f64, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.span;
        let width = saved.1 - saved.0;
        self.span = (saved.0 + width * from, saved.0 + width * to);
        let result = f(self);
        self.span = saved;
        result
    }

    pub fn report(&mut self, done: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).min(1.0)
        };
        let percent = self.span.0 + (self.span.1 - self.span.0) * fraction;
        // 100 est réservé à finish()
        self.emit((percent.round().clamp(0.0, 99.0)) as u8);
    }

    /// Rapporte, vérifie qu'aucune requête plus récente n'est arrivée, puis cède la main.
    pub fn checkpoint(&mut self, done: usize, total: usize) -> Result<()> {
        self.report(done, total);
        if let Some(token) = &self.token {
            if token.is_superseded() {
                return Err(GenerationError::Superseded { id: token.id() });
            }
        }
        std::thread::yield_now();
        Ok(())
    }

    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.last = 100;
        if let Some(sink) = &mut self.sink {
            sink(100);
        }
    }

    fn emit(&mut self, percent: u8) {
        if percent <= self.last {
            return;
        }
        self.last = percent;
        if let Some(sink) = &mut self.sink {
            sink(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_monotonic_and_final() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: u8| seen.push(p);
            let mut progress = Progress::new(&mut sink);
            progress.report(5, 10);
            progress.report(2, 10);
            progress.report(10, 10);
            progress.finish();
            progress.finish();
        }
        assert_eq!(seen, vec![50, 99, 100]);
    }

    #[test]
    fn test_progress_within_span() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: u8| seen.push(p);
            let mut progress = Progress::new(&mut sink);
            progress.within(0.5, 1.0, |p| {
                p.within(0.0, 0.5, |inner| inner.report(1, 1));
            });
        }
        assert_eq!(seen, vec![75]);
    }

    #[test]
    fn test_last_request_wins() {
        let handle = CancellationHandle::new();
        let first = handle.begin();
        assert!(!first.is_superseded());
        let second = handle.begin();
        assert!(first.is_superseded());
        assert!(!second.is_superseded());
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_checkpoint_superseded() {
        let handle = CancellationHandle::new();
        let token = handle.begin();
        let mut progress = Progress::silent().with_token(token);
        assert!(progress.checkpoint(1, 2).is_ok());
        handle.supersede();
        match progress.checkpoint(2, 2) {
            Err(GenerationError::Superseded { .. }) => {}
            other => panic!("attendu Superseded, obtenu {:?}", other.map(|_| ())),
        }
    }
}
