//! Rule-based constraint engine.
//!
//! Stateless validators that inspect a candidate session list and report
//! violations classified by severity. The optimizers use the aggregated
//! [`ConstraintReport`] counts directly as fitness penalties; the
//! orchestrator uses them to gate eligibility and surface warnings.
//!
//! # Checks
//!
//! | Check | Critical when | Warning when |
//! |-------|---------------|--------------|
//! | Sequence | a step precedes a lower step number | |
//! | Gap | gap < `min_hours` | gap > `max_hours` |
//! | Contraindication | condition or age rule matches | |
//! | Therapist | unknown therapist, off shift | no matching skill |
//! | Room | overlapping booking of the same room | |
//! | Material | short on an item whose status is low | short otherwise, or item missing |
//! | Patient | start outside every availability window | |
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 2 (constraint classes)

mod materials;
mod rules;

use serde::{Deserialize, Serialize};

pub use materials::{
    MaterialRequirement, default_material_requirements, validate_material_sufficiency,
};
pub use rules::{
    check_patient_contraindications, validate_patient_availability, validate_room_availability,
    validate_session_gaps, validate_therapist_availability, validate_therapy_sequence,
};

use crate::context::SchedulingContext;
use crate::models::Session;

/// What a violation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    Sequence,
    Gap,
    Contraindication,
    TherapistAvailability,
    RoomAvailability,
    MaterialSufficiency,
    PatientAvailability,
    /// A workflow step that initial placement could not fit on the grid.
    UnplacedStep,
}

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// The schedule cannot proceed as is.
    Critical,
    /// Proceed with caution.
    Warning,
    Info,
}

impl ConstraintKind {
    /// Wire name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "SEQUENCE",
            Self::Gap => "GAP",
            Self::Contraindication => "CONTRAINDICATION",
            Self::TherapistAvailability => "THERAPIST_AVAILABILITY",
            Self::RoomAvailability => "ROOM_AVAILABILITY",
            Self::MaterialSufficiency => "MATERIAL_SUFFICIENCY",
            Self::PatientAvailability => "PATIENT_AVAILABILITY",
            Self::UnplacedStep => "UNPLACED_STEP",
        }
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

/// A single constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ConstraintKind,
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Sessions involved, in the order they were compared.
    #[serde(default)]
    pub session_ids: Vec<String>,
    /// Offending condition, material or step, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Violation {
    /// Creates a critical violation.
    pub fn critical(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Critical, message)
    }

    /// Creates a warning.
    pub fn warning(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    fn new(kind: ConstraintKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            session_ids: Vec::new(),
            subject: None,
        }
    }

    /// Adds an involved session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_ids.push(session_id.into());
        self
    }

    /// Sets the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[inline]
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// No critical violations.
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl CheckResult {
    /// Wraps violations; validity is the absence of critical ones.
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            valid: !violations.iter().any(Violation::is_critical),
            violations,
        }
    }
}

/// Violation counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationSummary {
    pub total: usize,
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
}

impl ViolationSummary {
    /// Counts violations by severity.
    pub fn of(violations: &[Violation]) -> Self {
        let mut summary = Self {
            total: violations.len(),
            ..Self::default()
        };
        for v in violations {
            match v.severity {
                Severity::Critical => summary.critical += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }
}

/// Combined result of every check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintReport {
    /// No critical violations in any check.
    pub valid: bool,
    /// All violations, grouped in check order.
    pub violations: Vec<Violation>,
    pub summary: ViolationSummary,
}

impl ConstraintReport {
    /// Builds a report from collected violations.
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        let summary = ViolationSummary::of(&violations);
        Self {
            valid: summary.critical == 0,
            violations,
            summary,
        }
    }

    /// Critical violations only.
    pub fn critical(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_critical())
    }

    /// Violations of one kind.
    pub fn of_kind(&self, kind: ConstraintKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

/// Runs every check against `sessions` in the given context.
///
/// Room overlaps are checked against the context's existing sessions as
/// well as among `sessions` themselves.
pub fn validate_all(sessions: &[Session], ctx: &SchedulingContext) -> ConstraintReport {
    let checks = [
        validate_therapy_sequence(sessions),
        validate_session_gaps(sessions, &ctx.gap),
        check_patient_contraindications(&ctx.patient, &ctx.therapy),
        validate_therapist_availability(sessions, &ctx.therapists),
        validate_room_availability(sessions, &ctx.existing_sessions),
        validate_material_sufficiency(sessions, &ctx.inventory, &ctx.material_requirements),
        validate_patient_availability(sessions, &ctx.patient),
    ];

    ConstraintReport::from_violations(checks.into_iter().flat_map(|c| c.violations).collect())
}
