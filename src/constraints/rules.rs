//! Individual constraint checks.

use chrono::Datelike;

use super::{CheckResult, ConstraintKind, Violation};
use crate::config::GapConstraints;
use crate::models::{Patient, Session, Therapist, TherapyProtocol};

/// Case-insensitive containment in either direction. Empty strings never match.
fn mentions(a: &str, b: &str) -> bool {
    if a.trim().is_empty() || b.trim().is_empty() {
        return false;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

fn sorted_by_start(sessions: &[Session]) -> Vec<&Session> {
    let mut sorted: Vec<&Session> = sessions.iter().collect();
    sorted.sort_by_key(|s| s.start);
    sorted
}

/// Sessions ordered by start must not go back to an earlier workflow step.
///
/// Sessions with step number 0 carry no workflow position and are ignored.
pub fn validate_therapy_sequence(sessions: &[Session]) -> CheckResult {
    let mut violations = Vec::new();
    let mut last_step = 0;

    for session in sorted_by_start(sessions) {
        if session.step_number == 0 {
            continue;
        }
        if session.step_number < last_step {
            violations.push(
                Violation::critical(
                    ConstraintKind::Sequence,
                    format!(
                        "Step \"{}\" (Step {}) cannot come after Step {}",
                        session.action, session.step_number, last_step
                    ),
                )
                .with_session(&session.id),
            );
        }
        last_step = session.step_number;
    }

    CheckResult::from_violations(violations)
}

/// Consecutive sessions must be at least `min_hours` apart; more than
/// `max_hours` is flagged.
pub fn validate_session_gaps(sessions: &[Session], gap: &GapConstraints) -> CheckResult {
    let sorted = sorted_by_start(sessions);
    let mut violations = Vec::new();

    for pair in sorted.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let gap_hours = (curr.start - prev.end).num_seconds() as f64 / 3600.0;

        if gap_hours < gap.min_hours {
            violations.push(
                Violation::critical(
                    ConstraintKind::Gap,
                    format!(
                        "Minimum {}h gap required between sessions. Found: {gap_hours:.1}h",
                        gap.min_hours
                    ),
                )
                .with_session(&prev.id)
                .with_session(&curr.id),
            );
        }
        if gap_hours > gap.max_hours {
            violations.push(
                Violation::warning(
                    ConstraintKind::Gap,
                    format!(
                        "Sessions are {gap_hours:.1}h apart, exceeding recommended {}h",
                        gap.max_hours
                    ),
                )
                .with_session(&prev.id)
                .with_session(&curr.id),
            );
        }
    }

    CheckResult::from_violations(violations)
}

/// Matches patient conditions against therapy contraindications.
///
/// Also applies the age rules embedded in contraindication text:
/// "under 12" excludes patients younger than 12, "over 70" excludes
/// patients older than 70. `valid == false` means ineligible.
pub fn check_patient_contraindications(
    patient: &Patient,
    therapy: &TherapyProtocol,
) -> CheckResult {
    let mut violations = Vec::new();

    for condition in &patient.conditions {
        for contraindication in &therapy.contraindications {
            if mentions(condition, contraindication) {
                violations.push(
                    Violation::critical(
                        ConstraintKind::Contraindication,
                        format!(
                            "Patient condition \"{condition}\" conflicts with \
                             contraindication \"{contraindication}\""
                        ),
                    )
                    .with_subject(condition),
                );
            }
        }
    }

    if let Some(age) = patient.age {
        for contraindication in &therapy.contraindications {
            let text = contraindication.to_lowercase();
            if text.contains("under 12") && age < 12 {
                violations.push(
                    Violation::critical(
                        ConstraintKind::Contraindication,
                        format!("Patient age {age} is below minimum age requirement"),
                    )
                    .with_subject(format!("Age: {age}")),
                );
            }
            if text.contains("over 70") && age > 70 {
                violations.push(
                    Violation::critical(
                        ConstraintKind::Contraindication,
                        format!("Patient age {age} exceeds maximum age limit"),
                    )
                    .with_subject(format!("Age: {age}")),
                );
            }
        }
    }

    CheckResult::from_violations(violations)
}

/// Each session's therapist must exist and work that weekday, and should
/// hold a skill matching the session type.
pub fn validate_therapist_availability(
    sessions: &[Session],
    therapists: &[Therapist],
) -> CheckResult {
    let mut violations = Vec::new();

    for session in sessions {
        let Some(therapist) = therapists.iter().find(|t| t.id == session.therapist_id) else {
            violations.push(
                Violation::critical(
                    ConstraintKind::TherapistAvailability,
                    format!("Therapist {} not found", session.therapist_id),
                )
                .with_session(&session.id),
            );
            continue;
        };

        let day = session.start.weekday();
        if !therapist.works_on(day) {
            violations.push(
                Violation::critical(
                    ConstraintKind::TherapistAvailability,
                    format!("{} not available on {day}", therapist.display_name()),
                )
                .with_session(&session.id),
            );
        }

        if !session.session_type.is_empty() && !therapist.is_skilled_for(&session.session_type) {
            violations.push(
                Violation::warning(
                    ConstraintKind::TherapistAvailability,
                    format!(
                        "{} may not be trained for {}",
                        therapist.display_name(),
                        session.session_type
                    ),
                )
                .with_session(&session.id),
            );
        }
    }

    CheckResult::from_violations(violations)
}

/// No room may host two overlapping sessions.
///
/// Every session in `sessions` is compared with every other one and with
/// `existing`; an overlapping pair among `sessions` is reported once from
/// each side.
pub fn validate_room_availability(sessions: &[Session], existing: &[Session]) -> CheckResult {
    let mut violations = Vec::new();

    for session in sessions {
        let interval = session.interval();
        let conflicts = existing.iter().chain(sessions.iter()).filter(|other| {
            !std::ptr::eq(*other, session)
                && other.id != session.id
                && other.room_id == session.room_id
                && other.interval().overlaps(&interval)
        });

        for other in conflicts {
            violations.push(
                Violation::critical(
                    ConstraintKind::RoomAvailability,
                    format!("Room {} has overlapping booking", session.room_id),
                )
                .with_session(&session.id)
                .with_session(&other.id),
            );
        }
    }

    CheckResult::from_violations(violations)
}

/// Every session must start inside one of the patient's availability
/// windows. A patient without windows is always available.
pub fn validate_patient_availability(sessions: &[Session], patient: &Patient) -> CheckResult {
    let violations = sessions
        .iter()
        .filter(|s| !patient.is_available_at(s.start))
        .map(|s| {
            Violation::critical(
                ConstraintKind::PatientAvailability,
                format!("Patient not available on {}", s.start.format("%a %b %d %Y")),
            )
            .with_session(&s.id)
        })
        .collect();

    CheckResult::from_violations(violations)
}
