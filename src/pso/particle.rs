//! Swarm particle.

use serde::{Deserialize, Serialize};

/// Velocity-update coefficients for one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
    pub max_velocity: f64,
}

/// One candidate slot assignment.
///
/// `position[d]` is the slot index of session `d`; `velocity` has the
/// same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vec<usize>,
    pub velocity: Vec<f64>,
    pub fitness: f64,
    pub best_position: Vec<usize>,
    pub best_fitness: f64,
}

impl Particle {
    /// Creates an unevaluated particle.
    pub fn new(position: Vec<usize>, velocity: Vec<f64>) -> Self {
        Self {
            best_position: position.clone(),
            position,
            velocity,
            fitness: 0.0,
            best_fitness: f64::NEG_INFINITY,
        }
    }

    /// Records the current position as the personal best if it improved.
    pub fn update_personal_best(&mut self) -> bool {
        if self.fitness > self.best_fitness {
            self.best_fitness = self.fitness;
            self.best_position.clone_from(&self.position);
            true
        } else {
            false
        }
    }

    /// Applies the velocity update and moves the particle.
    ///
    /// `r1`/`r2` are the random factors for this step. Velocities are
    /// clamped to `±max_velocity`; positions are rounded and clamped to
    /// `[0, max_slot]`.
    pub fn advance(
        &mut self,
        global_best: &[usize],
        coeffs: Coefficients,
        r1: f64,
        r2: f64,
        max_slot: usize,
    ) {
        let vmax = coeffs.max_velocity.abs();
        for d in 0..self.position.len() {
            let x = self.position[d] as f64;
            let pbest = self.best_position[d] as f64;
            let gbest = global_best.get(d).map_or(x, |&g| g as f64);

            let v = coeffs.inertia * self.velocity[d]
                + coeffs.cognitive * r1 * (pbest - x)
                + coeffs.social * r2 * (gbest - x);
            let v = v.clamp(-vmax, vmax);
            self.velocity[d] = v;
            self.position[d] = (x + v).round().clamp(0.0, max_slot as f64) as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COEFFS: Coefficients = Coefficients {
        inertia: 0.7,
        cognitive: 1.5,
        social: 1.5,
        max_velocity: 3.0,
    };

    #[test]
    fn test_personal_best_only_improves() {
        let mut p = Particle::new(vec![1, 2], vec![0.0, 0.0]);
        p.fitness = 50.0;
        assert!(p.update_personal_best());

        p.position = vec![5, 6];
        p.fitness = 40.0;
        assert!(!p.update_personal_best());
        assert_eq!(p.best_position, vec![1, 2]);
        assert_eq!(p.best_fitness, 50.0);
    }

    #[test]
    fn test_advance_moves_toward_global_best() {
        let mut p = Particle::new(vec![0, 10], vec![0.0, 0.0]);
        p.advance(&[2, 8], COEFFS, 0.0, 1.0, 47);
        // social term: 1.5 * (2 - 0) = 3, 1.5 * (8 - 10) = -3
        assert_eq!(p.position, vec![3, 7]);
        assert_eq!(p.velocity, vec![3.0, -3.0]);
    }

    #[test]
    fn test_advance_clamps_velocity_and_position() {
        let mut p = Particle::new(vec![0, 47], vec![-10.0, 10.0]);
        p.advance(&[0, 47], COEFFS, 0.5, 0.5, 47);
        assert_eq!(p.velocity, vec![-3.0, 3.0]);
        assert_eq!(p.position, vec![0, 47]);
    }
}
