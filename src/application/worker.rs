//! Background query worker.
//!
//! Runs an encrypted risk query on its own thread and streams progress
//! over a channel, so a front end stays responsive while the homomorphic
//! traversal runs.

use std::sync::mpsc::{self, Receiver, RecvError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::service::RiskService;
use crate::domain::RiskAssessment;
use crate::ports::VectorCodec;

/// Progress updates from the query worker.
#[derive(Debug, Clone)]
pub enum QueryProgress {
    /// Encrypted traversal started
    Propagating,
    /// Traversal succeeded, aggregate being decoded and classified
    Decoding,
    /// Query complete
    Complete(RiskAssessment),
    /// Query aborted
    Error(String),
}

impl QueryProgress {
    /// Whether no further updates follow this one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}

/// Handle to a running query.
pub struct QueryWorkerHandle {
    pub progress_rx: Receiver<QueryProgress>,
    handle: JoinHandle<()>,
}

impl QueryWorkerHandle {
    /// Try to receive the next progress update (non-blocking).
    #[must_use]
    pub fn try_recv(&self) -> Option<QueryProgress> {
        self.progress_rx.try_recv().ok()
    }

    /// Block until the next progress update.
    ///
    /// # Errors
    /// Returns `RecvError` once the worker has exited and the channel is drained.
    pub fn recv(&self) -> Result<QueryProgress, RecvError> {
        self.progress_rx.recv()
    }

    /// Block until the query finishes and return its terminal update.
    #[must_use]
    pub fn wait(self) -> QueryProgress {
        let mut last = QueryProgress::Error("query worker exited without a result".into());
        while let Ok(progress) = self.progress_rx.recv() {
            let done = progress.is_terminal();
            last = progress;
            if done {
                break;
            }
        }
        if self.handle.join().is_err() {
            return QueryProgress::Error("query worker panicked".into());
        }
        last
    }
}

/// Spawns risk queries on background threads.
pub struct QueryWorker;

impl QueryWorker {
    /// Spawn a query for `person`.
    ///
    /// The index is validated on the worker; an out-of-range person yields
    /// a `QueryProgress::Error` without touching any ciphertext.
    pub fn spawn<C>(service: Arc<RiskService<C>>, person: usize) -> QueryWorkerHandle
    where
        C: VectorCodec + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            Self::run_with_progress(&service, person, &tx);
        });

        QueryWorkerHandle {
            progress_rx: rx,
            handle,
        }
    }

    fn run_with_progress<C: VectorCodec>(
        service: &RiskService<C>,
        person: usize,
        tx: &Sender<QueryProgress>,
    ) {
        let _ = tx.send(QueryProgress::Propagating);

        let mut rng = ChaCha20Rng::from_entropy();
        let result = service.propagate(person, &mut rng).and_then(|propagation| {
            let _ = tx.send(QueryProgress::Decoding);
            service.conclude(person, propagation)
        });

        match result {
            Ok(assessment) => {
                let _ = tx.send(QueryProgress::Complete(assessment));
            }
            Err(e) => {
                tracing::warn!("Risk query for person {person} failed: {e}");
                let _ = tx.send(QueryProgress::Error(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clear::ClearCodec;
    use crate::config::EngineConfig;

    fn service() -> Arc<RiskService<ClearCodec>> {
        let config = EngineConfig {
            persons: 4,
            infections: 2,
            ..EngineConfig::default()
        };
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let (service, _) =
            RiskService::bootstrap(Arc::new(ClearCodec::new("ctx")), &config, &mut rng)
                .expect("bootstrap");
        Arc::new(service)
    }

    #[test]
    fn test_worker_reports_progress_then_result() {
        let handle = QueryWorker::spawn(service(), 1);

        assert!(matches!(handle.recv(), Ok(QueryProgress::Propagating)));
        assert!(matches!(handle.recv(), Ok(QueryProgress::Decoding)));
        match handle.recv() {
            Ok(QueryProgress::Complete(assessment)) => assert_eq!(assessment.person, 1),
            other => panic!("unexpected progress: {other:?}"),
        }
    }

    #[test]
    fn test_worker_reports_errors() {
        match QueryWorker::spawn(service(), 9).wait() {
            QueryProgress::Error(msg) => assert!(msg.contains("Invalid person index 9")),
            other => panic!("unexpected progress: {other:?}"),
        }
    }

    #[test]
    fn test_failed_traversal_skips_decoding_stage() {
        let handle = QueryWorker::spawn(service(), 9);

        assert!(matches!(handle.recv(), Ok(QueryProgress::Propagating)));
        assert!(matches!(handle.recv(), Ok(QueryProgress::Error(_))));
        assert!(handle.recv().is_err());
    }

    #[test]
    fn test_concurrent_queries_share_service() {
        let service = service();
        let handles: Vec<_> = (0..4)
            .map(|person| QueryWorker::spawn(Arc::clone(&service), person))
            .collect();

        for (person, handle) in handles.into_iter().enumerate() {
            match handle.wait() {
                QueryProgress::Complete(assessment) => assert_eq!(assessment.person, person),
                other => panic!("unexpected progress: {other:?}"),
            }
        }
    }
}
