//! Therapy protocol model.
//!
//! A protocol is an ordered workflow of treatment steps plus the medical
//! conditions that rule a patient out. It is immutable for the duration
//! of a scheduling run.

use serde::{Deserialize, Serialize};

/// A therapy protocol (e.g. a Panchakarma procedure).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TherapyProtocol {
    /// Unique protocol identifier.
    pub id: String,
    /// Therapy name. Also used as the session type.
    pub name: String,
    /// Ordered treatment steps.
    #[serde(default)]
    pub workflow: Vec<WorkflowStep>,
    /// Conditions that disqualify a patient.
    #[serde(default)]
    pub contraindications: Vec<String>,
    /// Free-form safety notes.
    #[serde(default)]
    pub safety_notes: String,
}

/// One ordered action within a protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step identifier.
    pub id: String,
    /// 1-based position in the workflow.
    pub step: u32,
    /// Action name (e.g. "oleation", "steam", "purgation").
    pub action: String,
    /// Nominal duration in minutes.
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub required_materials: Vec<String>,
    #[serde(default)]
    pub precautions: Vec<String>,
}

impl TherapyProtocol {
    /// Creates a protocol with no steps.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a workflow step.
    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.workflow.push(step);
        self
    }

    /// Adds a contraindication.
    pub fn with_contraindication(mut self, condition: impl Into<String>) -> Self {
        self.contraindications.push(condition.into());
        self
    }

    /// Sets the safety notes.
    pub fn with_safety_notes(mut self, notes: impl Into<String>) -> Self {
        self.safety_notes = notes.into();
        self
    }

    /// Finds the workflow step for an action name.
    pub fn step_for_action(&self, action: &str) -> Option<&WorkflowStep> {
        self.workflow.iter().find(|w| w.action == action)
    }
}

impl WorkflowStep {
    /// Creates a workflow step.
    pub fn new(id: impl Into<String>, step: u32, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step,
            action: action.into(),
            ..Self::default()
        }
    }

    /// Sets the nominal duration.
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Sets step notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Adds a required material.
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.required_materials.push(material.into());
        self
    }

    /// Adds a precaution.
    pub fn with_precaution(mut self, precaution: impl Into<String>) -> Self {
        self.precautions.push(precaution.into());
        self
    }
}
