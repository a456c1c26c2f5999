//! Input validation for scheduling requests.
//!
//! Checks structural integrity of the protocol, resource pool, booked
//! sessions and configuration before a run. Detects:
//! - Duplicate IDs
//! - Empty workflows and empty resource pools
//! - Repeated workflow step numbers
//! - Booked sessions that end before they start
//! - Configuration values no run can work with

use std::collections::HashSet;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::models::{ResourcePool, Session, TherapyProtocol};

/// Validation result.
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// The protocol has no workflow steps.
    EmptyWorkflow,
    /// Two workflow steps share a step number.
    DuplicateStepNumber,
    /// No therapists or no rooms to schedule on.
    EmptyResourcePool,
    /// A session's end is not after its start.
    InvalidInterval,
    /// A configuration value is out of range.
    InvalidConfig,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<Vec<ValidationError>> for SchedulerError {
    fn from(errors: Vec<ValidationError>) -> Self {
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        SchedulerError::Configuration(messages.join("; "))
    }
}

/// Validates the inputs of one scheduling request.
///
/// Checks:
/// 1. The workflow has at least one step
/// 2. No duplicate step IDs or step numbers
/// 3. At least one therapist and one room
/// 4. No duplicate therapist or room IDs
/// 5. No duplicate booked-session IDs, and every booked session has
///    `end > start`
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_request(
    therapy: &TherapyProtocol,
    pool: &ResourcePool,
    existing: &[Session],
) -> ValidationResult {
    let mut errors = Vec::new();

    if therapy.workflow.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyWorkflow,
            format!("Therapy '{}' has no workflow steps", therapy.name),
        ));
    }

    let mut step_ids = HashSet::new();
    let mut step_numbers = HashSet::new();
    for step in &therapy.workflow {
        if !step_ids.insert(step.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate workflow step ID: {}", step.id),
            ));
        }
        if !step_numbers.insert(step.step) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateStepNumber,
                format!("Workflow step number {} is used more than once", step.step),
            ));
        }
    }

    if pool.therapists.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyResourcePool,
            "Resource pool has no therapists",
        ));
    }
    if pool.rooms.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyResourcePool,
            "Resource pool has no rooms",
        ));
    }

    let therapist_ids = pool.therapists.iter().map(|t| t.id.as_str());
    let room_ids = pool.rooms.iter().map(|r| r.id.as_str());
    let session_ids = existing.iter().map(|s| s.id.as_str());
    for (what, ids) in [
        ("therapist", therapist_ids.collect::<Vec<_>>()),
        ("room", room_ids.collect()),
        ("session", session_ids.collect()),
    ] {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DuplicateId,
                    format!("Duplicate {what} ID: {id}"),
                ));
            }
        }
    }

    for session in existing {
        if session.end <= session.start {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidInterval,
                format!("Session '{}' does not end after it starts", session.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Rejects configurations no run can use.
///
/// Optimizer parameters are only checked for optimizers that are enabled.
pub fn validate_config(config: &SchedulerConfig) -> Result<()> {
    config.offset()?;

    let mut errors = Vec::new();
    let mut invalid = |message: String| {
        errors.push(ValidationError::new(ValidationErrorKind::InvalidConfig, message));
    };

    if config.scheduling_horizon_days == 0 {
        invalid("scheduling horizon must be at least one day".into());
    }
    if config.time_slot_duration_hours == 0 {
        invalid("time slot duration must be at least one hour".into());
    }
    if config.working_hours_end > 24 || config.working_hours_start >= config.working_hours_end {
        invalid(format!(
            "working hours {}-{} are out of range",
            config.working_hours_start, config.working_hours_end
        ));
    }
    for (name, value) in [
        ("minimum gap", config.gap.min_hours),
        ("maximum gap", config.gap.max_hours),
    ] {
        if !value.is_finite() {
            invalid(format!("{name} {value} must be finite"));
        }
    }
    if config.gap.min_hours > config.gap.max_hours {
        invalid(format!(
            "minimum gap {}h exceeds maximum gap {}h",
            config.gap.min_hours, config.gap.max_hours
        ));
    }

    if config.enable_ga {
        let ga = &config.ga;
        if ga.population_size == 0 {
            invalid("GA population size must be at least 1".into());
        }
        if ga.elitism_count > ga.population_size {
            invalid(format!(
                "GA elitism count {} exceeds population size {}",
                ga.elitism_count, ga.population_size
            ));
        }
        if ga.tournament_size == 0 {
            invalid("GA tournament size must be at least 1".into());
        }
        for (name, rate) in [("mutation", ga.mutation_rate), ("crossover", ga.crossover_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                invalid(format!("GA {name} rate {rate} is outside [0, 1]"));
            }
        }
        if !(ga.convergence_threshold >= 0.0 && ga.convergence_threshold.is_finite()) {
            invalid(format!(
                "GA convergence threshold {} must be finite and non-negative",
                ga.convergence_threshold
            ));
        }
    }

    if config.enable_pso {
        let pso = &config.pso;
        if pso.swarm_size == 0 {
            invalid("PSO swarm size must be at least 1".into());
        }
        if !(pso.max_velocity > 0.0 && pso.max_velocity.is_finite()) {
            invalid(format!(
                "PSO max velocity {} must be finite and positive",
                pso.max_velocity
            ));
        }
        for (name, value) in [
            ("inertia weight", pso.inertia_weight),
            ("inertia decay", pso.inertia_decay),
            ("cognitive coefficient", pso.cognitive_coef),
            ("social coefficient", pso.social_coef),
            ("convergence threshold", pso.convergence_threshold),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                invalid(format!("PSO {name} {value} must be finite and non-negative"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}
