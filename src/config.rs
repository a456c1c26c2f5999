//! Run configuration.
//!
//! [`SchedulerConfig`] carries every tunable of a scheduling run. All
//! structs use `#[serde(default)]`, so a partial JSON document only needs
//! the fields it overrides.
//!
//! # Sources
//! - [`SchedulerConfig::default`]: built-in defaults
//! - [`SchedulerConfig::from_json_str`]: JSON document
//! - [`SchedulerConfig::from_env`]: `HYBRID_SCHEDULE_*` overrides on top of defaults

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constraints::{MaterialRequirement, default_material_requirements};
use crate::error::{Result, SchedulerError};
use crate::models::SlotGridConfig;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "HYBRID_SCHEDULE_";

/// Genetic optimizer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    pub population_size: usize,
    /// Maximum number of generations.
    pub generations: usize,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Probability that two parents recombine instead of being cloned.
    pub crossover_rate: f64,
    /// Individuals copied unchanged into the next generation.
    pub elitism_count: usize,
    pub tournament_size: usize,
    /// Best-fitness spread below which the run has converged.
    pub convergence_threshold: f64,
    /// Window of generations the spread is measured over.
    pub convergence_generations: usize,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            elitism_count: 2,
            tournament_size: 3,
            convergence_threshold: 0.001,
            convergence_generations: 10,
        }
    }
}

impl GaConfig {
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_elitism(mut self, count: usize) -> Self {
        self.elitism_count = count;
        self
    }

    pub fn with_convergence(mut self, threshold: f64, generations: usize) -> Self {
        self.convergence_threshold = threshold;
        self.convergence_generations = generations;
        self
    }
}

/// Particle swarm parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsoConfig {
    pub swarm_size: usize,
    /// Maximum number of iterations.
    pub iterations: usize,
    /// Initial inertia weight `w`.
    pub inertia_weight: f64,
    /// Multiplier applied to `w` after every iteration.
    pub inertia_decay: f64,
    /// Pull toward the particle's own best (`c1`).
    pub cognitive_coef: f64,
    /// Pull toward the swarm's best (`c2`).
    pub social_coef: f64,
    /// Velocity clamp, in slots per iteration.
    pub max_velocity: f64,
    pub convergence_threshold: f64,
    pub convergence_iterations: usize,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            swarm_size: 30,
            iterations: 50,
            inertia_weight: 0.7,
            inertia_decay: 0.99,
            cognitive_coef: 1.5,
            social_coef: 1.5,
            max_velocity: 3.0,
            convergence_threshold: 0.001,
            convergence_iterations: 5,
        }
    }
}

impl PsoConfig {
    pub fn with_swarm_size(mut self, size: usize) -> Self {
        self.swarm_size = size;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_max_velocity(mut self, max_velocity: f64) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    pub fn with_coefficients(mut self, cognitive: f64, social: f64) -> Self {
        self.cognitive_coef = cognitive;
        self.social_coef = social;
        self
    }
}

/// Allowed spacing between consecutive sessions of one patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConstraints {
    /// Shorter gaps are critical.
    pub min_hours: f64,
    /// Longer gaps are flagged as warnings.
    pub max_hours: f64,
}

impl Default for GapConstraints {
    fn default() -> Self {
        Self {
            min_hours: 1.0,
            max_hours: 48.0,
        }
    }
}

/// Configuration of one scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enable_ga: bool,
    pub enable_pso: bool,
    /// When false the result carries no report or summary.
    pub enable_explainability: bool,
    pub scheduling_horizon_days: u32,
    pub working_hours_start: u32,
    pub working_hours_end: u32,
    pub time_slot_duration_hours: u32,
    pub ga: GaConfig,
    pub pso: PsoConfig,
    pub gap: GapConstraints,
    /// Seed for the run's random source. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Evaluate populations and swarms on worker threads.
    pub parallel: bool,
    pub worker_threads: usize,
    /// First day of the slot grid. `None` means today in the clinic offset.
    pub start_date: Option<NaiveDate>,
    /// Clinic UTC offset in minutes.
    pub utc_offset_minutes: i32,
    /// Consumables per session type.
    pub material_requirements: BTreeMap<String, Vec<MaterialRequirement>>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_ga: true,
            enable_pso: true,
            enable_explainability: true,
            scheduling_horizon_days: 14,
            working_hours_start: 9,
            working_hours_end: 18,
            time_slot_duration_hours: 2,
            ga: GaConfig::default(),
            pso: PsoConfig::default(),
            gap: GapConstraints::default(),
            seed: None,
            parallel: true,
            worker_threads: default_worker_threads(),
            start_date: None,
            utc_offset_minutes: 0,
            material_requirements: default_material_requirements(),
        }
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl SchedulerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ga(mut self, enabled: bool) -> Self {
        self.enable_ga = enabled;
        self
    }

    pub fn with_pso(mut self, enabled: bool) -> Self {
        self.enable_pso = enabled;
        self
    }

    pub fn with_explainability(mut self, enabled: bool) -> Self {
        self.enable_explainability = enabled;
        self
    }

    pub fn with_ga_config(mut self, ga: GaConfig) -> Self {
        self.ga = ga;
        self
    }

    pub fn with_pso_config(mut self, pso: PsoConfig) -> Self {
        self.pso = pso;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.scheduling_horizon_days = days;
        self
    }

    pub fn with_working_hours(mut self, start: u32, end: u32) -> Self {
        self.working_hours_start = start;
        self.working_hours_end = end;
        self
    }

    pub fn with_slot_duration_hours(mut self, hours: u32) -> Self {
        self.time_slot_duration_hours = hours;
        self
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn with_gap(mut self, gap: GapConstraints) -> Self {
        self.gap = gap;
        self
    }

    /// Toggles parallel evaluation; `threads == 0` keeps the current count.
    pub fn with_parallelism(mut self, parallel: bool, threads: usize) -> Self {
        self.parallel = parallel;
        if threads > 0 {
            self.worker_threads = threads;
        }
        self
    }

    /// Replaces the requirement list for one session type.
    pub fn with_material_requirement(
        mut self,
        session_type: impl Into<String>,
        requirements: Vec<MaterialRequirement>,
    ) -> Self {
        self.material_requirements
            .insert(session_type.into(), requirements);
        self
    }

    /// Worker count actually used for evaluation.
    pub fn effective_workers(&self) -> usize {
        if self.parallel {
            self.worker_threads.max(1)
        } else {
            1
        }
    }

    /// The clinic offset.
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).ok_or_else(|| {
            SchedulerError::Configuration(format!(
                "utc offset out of range: {} minutes",
                self.utc_offset_minutes
            ))
        })
    }

    /// Slot grid parameters for a run.
    pub fn slot_grid(&self) -> Result<SlotGridConfig> {
        let offset = self.offset()?;
        let start_date = self
            .start_date
            .unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());
        Ok(SlotGridConfig {
            start_date,
            offset,
            horizon_days: self.scheduling_horizon_days,
            working_hours_start: self.working_hours_start,
            working_hours_end: self.working_hours_end,
            slot_duration_hours: self.time_slot_duration_hours,
        })
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SchedulerError::Configuration(format!("invalid config JSON: {e}")))
    }

    /// Defaults overridden by `HYBRID_SCHEDULE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`.
    ///
    /// A value that fails to parse is ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(seed) = parse_var(&read, "SEED") {
            config.seed = Some(seed);
        }
        override_var(&read, "ENABLE_GA", &mut config.enable_ga);
        override_var(&read, "ENABLE_PSO", &mut config.enable_pso);
        override_var(
            &read,
            "ENABLE_EXPLAINABILITY",
            &mut config.enable_explainability,
        );
        override_var(
            &read,
            "HORIZON_DAYS",
            &mut config.scheduling_horizon_days,
        );
        override_var(&read, "WORKING_HOURS_START", &mut config.working_hours_start);
        override_var(&read, "WORKING_HOURS_END", &mut config.working_hours_end);
        override_var(
            &read,
            "SLOT_DURATION_HOURS",
            &mut config.time_slot_duration_hours,
        );
        override_var(&read, "PARALLEL", &mut config.parallel);
        override_var(&read, "WORKER_THREADS", &mut config.worker_threads);
        override_var(&read, "UTC_OFFSET_MINUTES", &mut config.utc_offset_minutes);
        if let Some(date) = parse_var::<NaiveDate, _>(&read, "START_DATE") {
            config.start_date = Some(date);
        }

        config
    }
}

fn parse_var<T, F>(read: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = read(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{ENV_PREFIX}{name}={raw:?} is not valid, using default");
            None
        }
    }
}

fn override_var<T, F>(read: &F, name: &str, slot: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = parse_var(read, name) {
        *slot = value;
    }
}
