//! Seams to the systems around the scheduler.
//!
//! The core never touches a database. It reads protocols, patients,
//! resources and booked sessions through the source traits here, and hands
//! finalized schedules and audit records to sinks. [`SchedulingService`]
//! wires them to a [`HybridScheduler`]: load, run, then commit only when the
//! run succeeded.
//!
//! The `InMemory*` types back development and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::error::{CollaboratorError, Result};
use crate::explain::AuditEntry;
use crate::models::{Patient, ResourcePool, Session, TherapyProtocol};
use crate::orchestrator::{HybridScheduler, ScheduleResult};
use crate::priority::PriorityToken;

/// Looks up therapy protocols by id.
pub trait ProtocolSource: Send + Sync {
    fn protocol(&self, id: &str) -> std::result::Result<TherapyProtocol, CollaboratorError>;
}

/// Looks up patients by id.
pub trait PatientSource: Send + Sync {
    fn patient(&self, id: &str) -> std::result::Result<Patient, CollaboratorError>;
}

/// Current therapists, rooms and inventory.
pub trait ResourceSource: Send + Sync {
    fn resources(&self) -> std::result::Result<ResourcePool, CollaboratorError>;
}

/// Booked sessions, read before a run and written after a successful one.
pub trait SessionStore: Send + Sync {
    fn existing_sessions(&self) -> std::result::Result<Vec<Session>, CollaboratorError>;

    /// Persists a finalized schedule. Must store all sessions or none.
    fn commit(&self, sessions: &[Session]) -> std::result::Result<(), CollaboratorError>;
}

/// Receives one audit record per run.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> std::result::Result<(), CollaboratorError>;
}

/// What to schedule.
#[derive(Debug, Clone)]
pub struct SchedulingRequest {
    pub protocol_id: String,
    pub patient_id: String,
    pub priority: Option<PriorityToken>,
}

impl SchedulingRequest {
    pub fn new(protocol_id: impl Into<String>, patient_id: impl Into<String>) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            patient_id: patient_id.into(),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: PriorityToken) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Loads inputs, runs the scheduler and commits the outcome.
pub struct SchedulingService {
    protocols: Arc<dyn ProtocolSource>,
    patients: Arc<dyn PatientSource>,
    resources: Arc<dyn ResourceSource>,
    sessions: Arc<dyn SessionStore>,
    audit: Option<Arc<dyn AuditSink>>,
    scheduler: HybridScheduler,
}

impl SchedulingService {
    pub fn new(
        protocols: Arc<dyn ProtocolSource>,
        patients: Arc<dyn PatientSource>,
        resources: Arc<dyn ResourceSource>,
        sessions: Arc<dyn SessionStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            protocols,
            patients,
            resources,
            sessions,
            audit: None,
            scheduler: HybridScheduler::new(config),
        }
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Replaces the scheduler, e.g. one with a progress callback attached.
    pub fn with_scheduler(mut self, scheduler: HybridScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn scheduler(&self) -> &HybridScheduler {
        &self.scheduler
    }

    /// Runs one request end to end.
    ///
    /// Lookup and commit failures are errors. A run that fails inside the
    /// pipeline is not: it comes back as `Ok` with `success == false` and
    /// nothing committed. Every completed run is audited.
    pub fn schedule(&mut self, request: &SchedulingRequest) -> Result<ScheduleResult> {
        let protocol = self.protocols.protocol(&request.protocol_id)?;
        let patient = self.patients.patient(&request.patient_id)?;
        let pool = self.resources.resources()?;
        let existing = self.sessions.existing_sessions()?;

        let result = self.scheduler.generate_schedule(
            &protocol,
            &patient,
            request.priority.clone(),
            &pool,
            &existing,
        );

        if result.success {
            self.sessions.commit(&result.schedule)?;
            info!(
                patient = %patient.id,
                sessions = result.schedule.len(),
                "schedule committed"
            );
        } else {
            warn!(patient = %patient.id, errors = result.errors.len(), "schedule not committed");
        }

        if let Some(audit) = &self.audit {
            audit.record(result.explanations.to_audit_entry(&patient.id))?;
        }
        Ok(result)
    }
}

fn lock_error<T>(e: std::sync::PoisonError<T>) -> CollaboratorError {
    CollaboratorError::Unavailable(e.to_string())
}

/// Protocols, patients and resources held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    protocols: RwLock<HashMap<String, TherapyProtocol>>,
    patients: RwLock<HashMap<String, Patient>>,
    resources: RwLock<ResourcePool>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol(mut self, protocol: TherapyProtocol) -> Self {
        if let Ok(protocols) = self.protocols.get_mut() {
            protocols.insert(protocol.id.clone(), protocol);
        }
        self
    }

    pub fn with_patient(mut self, patient: Patient) -> Self {
        if let Ok(patients) = self.patients.get_mut() {
            patients.insert(patient.id.clone(), patient);
        }
        self
    }

    pub fn with_resources(mut self, pool: ResourcePool) -> Self {
        if let Ok(resources) = self.resources.get_mut() {
            *resources = pool;
        }
        self
    }
}

impl ProtocolSource for InMemoryCatalog {
    fn protocol(&self, id: &str) -> std::result::Result<TherapyProtocol, CollaboratorError> {
        self.protocols
            .read()
            .map_err(lock_error)?
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound {
                kind: "protocol",
                id: id.to_string(),
            })
    }
}

impl PatientSource for InMemoryCatalog {
    fn patient(&self, id: &str) -> std::result::Result<Patient, CollaboratorError> {
        self.patients
            .read()
            .map_err(lock_error)?
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound {
                kind: "patient",
                id: id.to_string(),
            })
    }
}

impl ResourceSource for InMemoryCatalog {
    fn resources(&self) -> std::result::Result<ResourcePool, CollaboratorError> {
        Ok(self.resources.read().map_err(lock_error)?.clone())
    }
}

/// Session store held in memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<Vec<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: RwLock::new(sessions),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn existing_sessions(&self) -> std::result::Result<Vec<Session>, CollaboratorError> {
        Ok(self.sessions.read().map_err(lock_error)?.clone())
    }

    fn commit(&self, sessions: &[Session]) -> std::result::Result<(), CollaboratorError> {
        self.sessions
            .write()
            .map_err(lock_error)?
            .extend_from_slice(sessions);
        Ok(())
    }
}

/// Audit records held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> std::result::Result<(), CollaboratorError> {
        self.entries.write().map_err(lock_error)?.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{pool, protocol};
    use crate::error::SchedulerError;
    use crate::models::calendar::test_support::monday;

    struct Fixture {
        store: Arc<InMemorySessionStore>,
        audit: Arc<InMemoryAuditLog>,
        service: SchedulingService,
    }

    fn fixture(patient: Patient) -> Fixture {
        let catalog = Arc::new(
            InMemoryCatalog::new()
                .with_protocol(protocol(2).with_contraindication("Cardiac conditions"))
                .with_patient(patient)
                .with_resources(pool()),
        );
        let store = Arc::new(InMemorySessionStore::new());
        let audit = Arc::new(InMemoryAuditLog::new());
        let config = SchedulerConfig::new()
            .with_ga(false)
            .with_pso(false)
            .with_start_date(monday());
        let service = SchedulingService::new(
            catalog.clone(),
            catalog.clone(),
            catalog,
            store.clone(),
            config,
        )
        .with_audit(audit.clone());
        Fixture {
            store,
            audit,
            service,
        }
    }

    #[test]
    fn test_successful_run_commits_and_audits() {
        let mut f = fixture(Patient::new("p1").with_age(40));
        let result = f
            .service
            .schedule(&SchedulingRequest::new("t1", "p1"))
            .unwrap();

        assert!(result.success);
        let stored = f.store.existing_sessions().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored, result.schedule);

        let audit = f.audit.entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].subject, "p1");
        assert!(audit[0].id.starts_with("audit_"));
    }

    #[test]
    fn test_second_run_avoids_committed_sessions() {
        let mut f = fixture(Patient::new("p1").with_age(40));
        let first = f.service.schedule(&SchedulingRequest::new("t1", "p1")).unwrap();
        let second = f.service.schedule(&SchedulingRequest::new("t1", "p1")).unwrap();

        assert!(second.success);
        for s in &second.schedule {
            assert!(first.schedule.iter().all(|b| !b.conflicts_with(s)));
        }
        assert_eq!(f.store.existing_sessions().unwrap().len(), 4);
    }

    #[test]
    fn test_failed_run_commits_nothing() {
        let mut f = fixture(
            Patient::new("p1")
                .with_age(40)
                .with_condition("Cardiac conditions"),
        );
        let result = f
            .service
            .schedule(&SchedulingRequest::new("t1", "p1"))
            .unwrap();

        assert!(!result.success);
        assert!(f.store.existing_sessions().unwrap().is_empty());
        // failures are audited too
        assert_eq!(f.audit.entries().len(), 1);
    }

    #[test]
    fn test_unknown_patient_is_collaborator_error() {
        let mut f = fixture(Patient::new("p1"));
        let err = f
            .service
            .schedule(&SchedulingRequest::new("t1", "nobody"))
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::Collaborator(CollaboratorError::NotFound {
                kind: "patient",
                id: "nobody".into(),
            })
        );
        assert!(f.audit.entries().is_empty());
    }

    #[test]
    fn test_request_builder() {
        let request = SchedulingRequest::new("t1", "p1")
            .with_priority(PriorityToken::new(crate::priority::PriorityLevel::Urgent, "pain"));
        assert_eq!(request.priority.map(|t| t.value()), Some(80));
    }
}
