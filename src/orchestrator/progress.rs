//! Progress events and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::Phase;

/// Progress notification emitted during a run.
///
/// Optimizer phases emit one event per generation/iteration with
/// `progress` interpolated between the previous phase's mark and their
/// own, so the value never decreases within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Overall completion, 0 to 100.
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Generation or iteration number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_fitness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_fitness: Option<f64>,
}

impl ProgressEvent {
    /// Phase-completion event.
    pub fn completed(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            progress: phase.progress(),
            message: Some(message.into()),
            step: None,
            total_steps: None,
            best_fitness: None,
            avg_fitness: None,
        }
    }

    /// In-phase optimizer event.
    pub fn optimizer(
        phase: Phase,
        step: usize,
        total_steps: usize,
        best_fitness: f64,
        avg_fitness: f64,
    ) -> Self {
        let floor = phase.previous().map_or(0.0, Phase::progress);
        let fraction = if total_steps == 0 {
            1.0
        } else {
            (step as f64 / total_steps as f64).min(1.0)
        };
        Self {
            phase,
            progress: floor + (phase.progress() - floor) * fraction,
            message: None,
            step: Some(step),
            total_steps: Some(total_steps),
            best_fitness: Some(best_fitness),
            avg_fitness: Some(avg_fitness),
        }
    }
}

/// Shared flag a caller sets to stop a run.
///
/// Checked between phases and between optimizer generations/iterations.
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
