//! Gene-per-step chromosome.
//!
//! # Encoding
//!
//! One [`Gene`] per workflow step, in workflow order. Each gene assigns
//! a therapist, a room, and an index into the run's slot grid.
//!
//! Invariants, enforced by [`Chromosome::new`] and preserved by every
//! operator:
//! - `genes.len()` equals the workflow length
//! - every `slot_index` is in `[0, num_slots)`

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Allocation of one workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gene {
    pub therapist_id: String,
    pub room_id: String,
    /// Index into the slot grid.
    pub slot_index: usize,
}

impl Gene {
    pub fn new(
        therapist_id: impl Into<String>,
        room_id: impl Into<String>,
        slot_index: usize,
    ) -> Self {
        Self {
            therapist_id: therapist_id.into(),
            room_id: room_id.into(),
            slot_index,
        }
    }
}

/// One candidate schedule.
///
/// Higher fitness = better schedule, within `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    genes: Vec<Gene>,
    /// Fitness value; 0 until evaluated.
    pub fitness: f64,
}

impl Chromosome {
    /// Creates a chromosome, checking gene count and slot bounds.
    pub fn new(genes: Vec<Gene>, num_steps: usize, num_slots: usize) -> Result<Self> {
        if genes.len() != num_steps {
            return Err(SchedulerError::invariant(
                "chromosome",
                format!("expected {num_steps} genes, got {}", genes.len()),
            ));
        }
        if let Some((i, gene)) = genes
            .iter()
            .enumerate()
            .find(|(_, g)| g.slot_index >= num_slots)
        {
            return Err(SchedulerError::invariant(
                "chromosome",
                format!(
                    "gene {i} slot index {} out of range 0..{num_slots}",
                    gene.slot_index
                ),
            ));
        }
        Ok(Self::from_genes(genes))
    }

    /// Wraps genes produced by code that already upholds the invariants.
    pub(crate) fn from_genes(genes: Vec<Gene>) -> Self {
        Self {
            genes,
            fitness: 0.0,
        }
    }

    #[inline]
    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub(crate) fn genes_mut(&mut self) -> &mut [Gene] {
        &mut self.genes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Slot indices in gene order.
    pub fn slot_indices(&self) -> Vec<usize> {
        self.genes.iter().map(|g| g.slot_index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_gene_count() {
        let genes = vec![Gene::new("t1", "r1", 0)];
        let err = Chromosome::new(genes, 2, 10).unwrap_err();
        assert!(matches!(err, SchedulerError::Invariant { entity: "chromosome", .. }));
    }

    #[test]
    fn test_new_checks_slot_bounds() {
        let genes = vec![Gene::new("t1", "r1", 0), Gene::new("t1", "r1", 10)];
        let err = Chromosome::new(genes, 2, 10).unwrap_err();
        assert!(err.to_string().contains("gene 1 slot index 10 out of range"));
    }

    #[test]
    fn test_valid_chromosome() {
        let c = Chromosome::new(vec![Gene::new("t1", "r1", 3), Gene::new("t2", "r1", 9)], 2, 10)
            .unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.slot_indices(), vec![3, 9]);
        assert_eq!(c.fitness, 0.0);
    }
}
