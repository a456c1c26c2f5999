//! Consumable material sufficiency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CheckResult, ConstraintKind, Violation};
use crate::models::{InventoryItem, InventoryStatus, Session};

/// Quantity of one material consumed by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    /// Material name, matched against inventory item names.
    pub name: String,
    pub quantity: f64,
}

impl MaterialRequirement {
    pub fn new(name: impl Into<String>, quantity: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// Built-in requirement table, keyed by session type.
pub fn default_material_requirements() -> BTreeMap<String, Vec<MaterialRequirement>> {
    BTreeMap::from([
        (
            "Abhyanga".to_string(),
            vec![MaterialRequirement::new("Sesame Oil", 0.5)],
        ),
        (
            "Vamana".to_string(),
            vec![
                MaterialRequirement::new("Sesame Oil", 0.3),
                MaterialRequirement::new("Steam Towels", 2.0),
            ],
        ),
        (
            "Shirodhara".to_string(),
            vec![MaterialRequirement::new("Sesame Oil", 1.0)],
        ),
        (
            "Virechana".to_string(),
            vec![MaterialRequirement::new("Dashamoola Herbs", 1.0)],
        ),
    ])
}

/// Sums material needs across sessions and compares them with stock.
///
/// An item is found when its name contains the material name
/// (case-insensitive). Shortfall on an item already marked low is
/// critical; any other shortfall, or a missing item, is a warning.
pub fn validate_material_sufficiency(
    sessions: &[Session],
    inventory: &[InventoryItem],
    requirements: &BTreeMap<String, Vec<MaterialRequirement>>,
) -> CheckResult {
    let mut needs: BTreeMap<&str, f64> = BTreeMap::new();
    for session in sessions {
        let Some(reqs) = requirements.get(&session.session_type) else {
            continue;
        };
        for req in reqs {
            *needs.entry(req.name.as_str()).or_insert(0.0) += req.quantity;
        }
    }

    let mut violations = Vec::new();
    for (material, needed) in needs {
        let wanted = material.to_lowercase();
        let item = inventory
            .iter()
            .find(|i| i.name.to_lowercase().contains(&wanted));

        match item {
            None => violations.push(
                Violation::warning(
                    ConstraintKind::MaterialSufficiency,
                    format!("Material \"{material}\" not found in inventory"),
                )
                .with_subject(material),
            ),
            Some(item) if item.stock < needed => {
                let message =
                    format!("Insufficient {material}: have {}, need {needed}", item.stock);
                let violation = if item.status == InventoryStatus::Low {
                    Violation::critical(ConstraintKind::MaterialSufficiency, message)
                } else {
                    Violation::warning(ConstraintKind::MaterialSufficiency, message)
                };
                violations.push(violation.with_subject(material));
            }
            Some(_) => {}
        }
    }

    CheckResult::from_violations(violations)
}
