//! The scheduling state machine.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};
use uuid::Uuid;

use super::Phase;
use super::conflict::{ConflictOutcome, resolve_conflicts};
use super::kpi::ScheduleKpi;
use super::placement::create_initial_schedule;
use super::progress::{CancellationToken, ProgressEvent};
use super::result::{PhaseError, ScheduleResult};
use crate::config::SchedulerConfig;
use crate::constraints::{ConstraintKind, Violation, check_patient_contraindications};
use crate::context::SchedulingContext;
use crate::error::{Result, SchedulerError};
use crate::explain::{ExplainabilityLog, PhaseId};
use crate::ga::{GaProblem, GeneticOptimizer, TherapyGaProblem};
use crate::models::{
    Interval, Patient, ResourcePool, Session, SessionStatus, TherapyProtocol, generate_time_slots,
};
use crate::priority::PriorityToken;
use crate::pso::{SwarmProblem, SwarmRefiner};
use crate::validation;

type ProgressCallback = Box<dyn FnMut(&ProgressEvent) + Send>;

/// Runs the eight-phase pipeline for one scheduling request.
///
/// Owns its [`ExplainabilityLog`], which is cleared at the start of every
/// [`generate_schedule`](Self::generate_schedule) call, so two schedulers
/// never share decisions.
///
/// # Example
///
/// ```ignore
/// let mut scheduler = HybridScheduler::new(SchedulerConfig::default().with_seed(42))
///     .with_progress(|event| println!("{:.0}% {}", event.progress, event.phase));
/// let result = scheduler.generate_schedule(&protocol, &patient, None, &pool, &existing);
/// if result.success {
///     store.commit(&result.schedule)?;
/// }
/// ```
pub struct HybridScheduler {
    config: SchedulerConfig,
    log: ExplainabilityLog,
    on_progress: Option<ProgressCallback>,
    cancellation: CancellationToken,
}

impl HybridScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            log: ExplainabilityLog::new(),
            on_progress: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Registers a callback for phase and optimizer progress.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Uses `token` for cancellation instead of a private one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// A handle that cancels this scheduler's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Decisions recorded by the last run.
    pub fn explainer(&self) -> &ExplainabilityLog {
        &self.log
    }

    /// Schedules every workflow step of `therapy` for `patient`.
    ///
    /// Never fails and never panics: eligibility failures, configuration
    /// errors, cancellation and panics inside a phase all come back as a
    /// result with `success == false` and an entry in `errors`.
    /// `priority` defaults to NORMAL.
    pub fn generate_schedule(
        &mut self,
        therapy: &TherapyProtocol,
        patient: &Patient,
        priority: Option<PriorityToken>,
        pool: &ResourcePool,
        existing: &[Session],
    ) -> ScheduleResult {
        self.log.clear();
        info!(therapy = %therapy.name, patient = %patient.id, "scheduling run started");

        let mut run = Run {
            config: &self.config,
            log: &mut self.log,
            on_progress: self.on_progress.as_mut(),
            cancellation: &self.cancellation,
            phase: Phase::ProtocolRetrieval,
            open_phase: None,
            result: ScheduleResult::default(),
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run.execute(therapy, patient, priority, pool, existing)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => run.fail(error),
            Err(payload) => run.fail(SchedulerError::Internal(panic_message(payload.as_ref()))),
        }

        let mut result = run.result;
        if self.config.enable_explainability {
            result.explanations = self.log.generate_report();
            result.explanation_summary = Some(result.explanations.to_markdown());
        }
        info!(
            success = result.success,
            sessions = result.schedule.len(),
            "scheduling run finished"
        );
        result
    }
}

/// State of one `generate_schedule` call.
struct Run<'a> {
    config: &'a SchedulerConfig,
    log: &'a mut ExplainabilityLog,
    on_progress: Option<&'a mut ProgressCallback>,
    cancellation: &'a CancellationToken,
    phase: Phase,
    open_phase: Option<PhaseId>,
    result: ScheduleResult,
}

impl Run<'_> {
    fn execute(
        &mut self,
        therapy: &TherapyProtocol,
        patient: &Patient,
        priority: Option<PriorityToken>,
        pool: &ResourcePool,
        existing: &[Session],
    ) -> Result<()> {
        let config = self.config;

        self.begin(Phase::ProtocolRetrieval)?;
        validation::validate_config(config)?;
        validation::validate_request(therapy, pool, existing)?;
        self.finish(format!(
            "Loaded {} workflow steps for {}",
            therapy.workflow.len(),
            therapy.name
        ));

        self.begin(Phase::EligibilityCheck)?;
        self.check_eligibility(therapy, patient)?;
        self.finish("Patient eligible for therapy".to_string());

        self.begin(Phase::InitialPlacement)?;
        let slots = generate_time_slots(&config.slot_grid()?);
        let ctx = SchedulingContext::new(therapy.clone(), patient.clone(), pool.clone(), slots)
            .with_existing_sessions(existing.to_vec())
            .with_material_requirements(config.material_requirements.clone())
            .with_gap(config.gap);
        self.place_initial(&ctx);

        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        let workers = config.effective_workers();

        if config.enable_ga {
            self.optimize_genetic(&ctx, &mut rng, workers)?;
        }
        if config.enable_pso {
            self.refine_swarm(&ctx, &mut rng, workers)?;
        }

        self.begin(Phase::PriorityHandling)?;
        let token = priority.unwrap_or_default();
        self.apply_priority(&token);

        self.begin(Phase::ConflictResolution)?;
        self.resolve(&ctx, &token);

        self.begin(Phase::Finalization)?;
        self.finalize(&ctx);
        Ok(())
    }

    fn check_eligibility(&mut self, therapy: &TherapyProtocol, patient: &Patient) -> Result<()> {
        let check = check_patient_contraindications(patient, therapy);
        if check.valid {
            self.result.warnings.extend(check.violations);
            return Ok(());
        }

        let (critical, other): (Vec<Violation>, Vec<Violation>) =
            check.violations.into_iter().partition(Violation::is_critical);
        for violation in &critical {
            self.log.log_constraint(
                violation,
                "Blocked scheduling",
                "Patient has a contraindication for this therapy",
            );
        }
        let conditions = critical
            .iter()
            .map(|v| v.subject.clone().unwrap_or_else(|| v.message.clone()))
            .collect();
        self.result.violations = critical;
        self.result.warnings.extend(other);

        Err(SchedulerError::Eligibility {
            patient_id: patient.id.clone(),
            conditions,
        })
    }

    fn place_initial(&mut self, ctx: &SchedulingContext) {
        let placement = create_initial_schedule(ctx);
        for session in &placement.sessions {
            self.log.log_placement(session, "Initial rule-based placement");
        }
        for violation in &placement.unplaced {
            self.log
                .log_constraint(violation, "Skipped workflow step", "Step left unscheduled");
        }

        let summary = format!(
            "Placed {} of {} workflow steps",
            placement.sessions.len(),
            ctx.therapy.workflow.len()
        );
        self.result.warnings.extend(placement.unplaced);
        self.result.schedule = placement.sessions;
        self.finish(summary);
    }

    /// Replaces the working schedule with the GA's best unless the current
    /// one already scores higher.
    fn optimize_genetic(
        &mut self,
        ctx: &SchedulingContext,
        rng: &mut SmallRng,
        workers: usize,
    ) -> Result<()> {
        let phase = Phase::GeneticAlgorithm;
        self.begin(phase)?;
        if ctx.time_slots.is_empty() {
            self.finish("Skipped: no time slots in the horizon".to_string());
            return Ok(());
        }

        let problem = TherapyGaProblem::new(ctx, &self.config.ga);
        let optimizer = GeneticOptimizer::new(self.config.ga.clone()).with_workers(workers);
        let on_progress = &mut self.on_progress;
        let cancellation = self.cancellation;
        let outcome = optimizer.run(&problem, rng, |stats| {
            notify(
                on_progress,
                &ProgressEvent::optimizer(
                    phase,
                    stats.generation,
                    stats.total_generations,
                    stats.best_fitness,
                    stats.avg_fitness,
                ),
            );
            keep_going(cancellation)
        })?;

        let baseline = problem
            .encode(&self.result.schedule)
            .map(|chromosome| problem.evaluate(&chromosome));
        let before = baseline.unwrap_or_else(|| outcome.initial_fitness());
        let fitness = match baseline {
            Some(current) if current > outcome.best_fitness => current,
            _ => {
                self.result.schedule = problem.decode(&outcome.best);
                outcome.best_fitness
            }
        };
        self.log.log_optimization(phase.name(), before, fitness);
        self.result.metrics.ga_generations = outcome.generations_run;
        self.result.metrics.ga_fitness = fitness;

        if outcome.cancelled {
            return Err(SchedulerError::Cancelled { phase });
        }
        let verb = if outcome.converged { "converged" } else { "finished" };
        self.finish(format!(
            "GA {verb} after {} generations, fitness {fitness:.1}",
            outcome.generations_run
        ));
        Ok(())
    }

    /// Moves sessions to the swarm's best slots when that does not lower
    /// fitness.
    fn refine_swarm(
        &mut self,
        ctx: &SchedulingContext,
        rng: &mut SmallRng,
        workers: usize,
    ) -> Result<()> {
        let phase = Phase::ParticleSwarm;
        self.begin(phase)?;
        if self.result.schedule.is_empty() || ctx.time_slots.is_empty() {
            self.finish("Skipped: nothing to refine".to_string());
            return Ok(());
        }

        let problem = SwarmProblem::new(ctx, self.result.schedule.clone());
        let refiner = SwarmRefiner::new(self.config.pso.clone()).with_workers(workers);
        let on_progress = &mut self.on_progress;
        let cancellation = self.cancellation;
        let outcome = refiner.run(&problem, rng, |stats| {
            notify(
                on_progress,
                &ProgressEvent::optimizer(
                    phase,
                    stats.iteration,
                    stats.total_iterations,
                    stats.global_best_fitness,
                    stats.avg_fitness,
                ),
            );
            keep_going(cancellation)
        })?;

        let before = problem.evaluate(&problem.base_position());
        let fitness = if outcome.best_fitness >= before {
            self.result.schedule = outcome.apply(&problem);
            outcome.best_fitness
        } else {
            before
        };
        self.log.log_optimization(phase.name(), before, fitness);
        self.result.metrics.pso_iterations = outcome.iterations_run;
        self.result.metrics.pso_fitness = fitness;

        if outcome.cancelled {
            return Err(SchedulerError::Cancelled { phase });
        }
        self.finish(format!(
            "PSO refined {} sessions in {} iterations, fitness {fitness:.1}",
            self.result.schedule.len(),
            outcome.iterations_run
        ));
        Ok(())
    }

    fn apply_priority(&mut self, token: &PriorityToken) {
        if token.is_expired() {
            warn!(level = %token.level, "priority token has expired and cannot preempt");
        }
        for session in &mut self.result.schedule {
            session.priority = Some(token.clone());
        }
        self.result.metrics.priority = token.level;
        self.finish(format!(
            "Applied {} priority to {} sessions",
            token.level,
            self.result.schedule.len()
        ));
    }

    fn resolve(&mut self, ctx: &SchedulingContext, token: &PriorityToken) {
        let sessions = std::mem::take(&mut self.result.schedule);
        let (sessions, resolutions) =
            resolve_conflicts(sessions, &ctx.existing_sessions, &ctx.time_slots, token);
        self.result.schedule = sessions;

        for resolution in &resolutions {
            let alternatives: Vec<Interval> = match &resolution.outcome {
                ConflictOutcome::Relocated { to, .. } => vec![*to],
                _ => Vec::new(),
            };
            self.log.log_conflict_resolution(
                resolution.kind.label(),
                &resolution.message,
                resolution.outcome.action(),
                &alternatives,
            );

            match &resolution.outcome {
                ConflictOutcome::Relocated { .. } => self.result.metrics.conflicts_resolved += 1,
                ConflictOutcome::PreemptionRequested(pending) => {
                    self.log.log_preemption(
                        &pending.session,
                        &pending.target,
                        &pending.reason,
                        "Awaiting confirmation",
                        pending.proposed_relocation.as_ref(),
                    );
                    self.result.pending_preemptions.push(pending.clone());
                    self.result.metrics.conflicts_unresolved += 1;
                }
                ConflictOutcome::Unresolved { .. } => self.result.metrics.conflicts_unresolved += 1,
            }
        }

        let summary = format!(
            "Handled {} conflicts, {} relocated",
            resolutions.len(),
            self.result.metrics.conflicts_resolved
        );
        self.result.resolutions = resolutions;
        self.finish(summary);
    }

    fn finalize(&mut self, ctx: &SchedulingContext) {
        let now = Utc::now();
        let mut renamed: HashMap<String, String> = HashMap::new();
        for session in &mut self.result.schedule {
            let id = format!("session_{}", Uuid::new_v4());
            renamed.insert(std::mem::replace(&mut session.id, id.clone()), id);
            session.status = SessionStatus::Scheduled;
            session.created_at = Some(now);
        }

        let rename = |id: &mut String| {
            if let Some(new_id) = renamed.get(id.as_str()) {
                id.clone_from(new_id);
            }
        };
        for resolution in &mut self.result.resolutions {
            rename(&mut resolution.session_id);
            if let ConflictOutcome::PreemptionRequested(pending) = &mut resolution.outcome {
                rename(&mut pending.session.id);
            }
        }
        for pending in &mut self.result.pending_preemptions {
            rename(&mut pending.session.id);
        }

        // Steps the optimizers managed to place are no longer unplaced.
        let placed: HashSet<u32> = self.result.schedule.iter().map(|s| s.step_number).collect();
        self.result.warnings.retain(|w| {
            w.kind != ConstraintKind::UnplacedStep
                || !w
                    .subject
                    .as_deref()
                    .and_then(|id| ctx.therapy.workflow.iter().find(|step| step.id == id))
                    .is_some_and(|step| placed.contains(&step.step))
        });

        let metrics = &mut self.result.metrics;
        metrics.total_sessions = self.result.schedule.len();
        metrics.kpi = ScheduleKpi::calculate(&self.result.schedule);
        self.result.success = true;
        self.finish(format!(
            "Finalized {} sessions",
            self.result.metrics.total_sessions
        ));
    }

    /// Enters `phase` unless the run has been cancelled.
    fn begin(&mut self, phase: Phase) -> Result<()> {
        self.phase = phase;
        if self.cancellation.is_cancelled() {
            return Err(SchedulerError::Cancelled { phase });
        }
        info!(%phase, "phase started");
        self.open_phase = Some(self.log.start_phase(phase.name(), phase.description()));
        Ok(())
    }

    fn finish(&mut self, summary: String) {
        info!(phase = %self.phase, %summary, "phase completed");
        if let Some(id) = self.open_phase.take() {
            self.log.end_phase(id, Some(summary.clone()));
        }
        notify(&mut self.on_progress, &ProgressEvent::completed(self.phase, summary));
    }

    /// Records `error` against the current phase.
    fn fail(&mut self, error: SchedulerError) {
        let phase = self.phase;
        if let Some(id) = self.open_phase.take() {
            self.log.end_phase(id, Some(error.to_string()));
        }

        let violations = match &error {
            SchedulerError::Cancelled { .. } => {
                warn!(%phase, "scheduling run cancelled");
                self.result.cancelled = true;
                Vec::new()
            }
            SchedulerError::Eligibility { .. } => {
                warn!(%phase, %error, "patient not eligible");
                self.result.violations.clone()
            }
            _ => {
                warn!(%phase, %error, "scheduling run failed");
                self.result.schedule.clear();
                Vec::new()
            }
        };

        self.result.success = false;
        self.result.errors.push(PhaseError {
            phase,
            message: error.to_string(),
            violations,
        });
    }
}

fn notify(on_progress: &mut Option<&mut ProgressCallback>, event: &ProgressEvent) {
    if let Some(callback) = on_progress.as_deref_mut() {
        callback(event);
    }
}

fn keep_going(cancellation: &CancellationToken) -> ControlFlow<()> {
    if cancellation.is_cancelled() {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
