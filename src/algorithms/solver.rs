//! Pluggable 2D position solvers
//!
//! Solvers are registered by name in a [`SolverRegistry`] and picked from the
//! configuration at startup. Every solver takes the anchor positions and the
//! measured distances in the same order and returns its candidate positions,
//! best first.

use crate::algorithms::ranging::RoundRanges;
use crate::utils::config::ConfigError;
use crate::validation::error::SolverError;
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Relative threshold under which a normal matrix is treated as singular
const SINGULARITY_THRESHOLD: f64 = 1e-12;

/// Solver selection and tuning, the `algorithms.tof.solver` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Registered solver name
    pub kind: String,
    /// Iteration cap for iterative solvers
    pub max_iterations: u32,
    /// Convergence threshold on the update step (metres)
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            kind: LinearLeastSquares::NAME.to_string(),
            max_iterations: 50,
            tolerance: 1e-9,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                parameter: "solver.kind".to_string(),
                value: self.kind.clone(),
                reason: "solver name must not be empty".to_string(),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "solver.max_iterations".to_string(),
                value: self.max_iterations.to_string(),
                reason: "at least one iteration is required".to_string(),
            });
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "solver.tolerance".to_string(),
                value: self.tolerance.to_string(),
                reason: "tolerance must be a positive finite number".to_string(),
            });
        }
        Ok(())
    }
}

/// Capability every position solver provides.
///
/// Solver settings are bound when the registry builds the solver, so `solve`
/// takes no configuration argument.
pub trait PositionSolver: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Candidate positions for the given ranges, best first
    fn solve(&self, anchor_positions: &[Vector2<f64>], distances: &[f64]) -> Result<Vec<Vector2<f64>>, SolverError>;
}

fn check_inputs(anchor_positions: &[Vector2<f64>], distances: &[f64], required: usize) -> Result<(), SolverError> {
    if anchor_positions.len() != distances.len() {
        return Err(SolverError::LengthMismatch {
            anchors: anchor_positions.len(),
            distances: distances.len(),
        });
    }
    if anchor_positions.len() < required {
        return Err(SolverError::InsufficientAnchors {
            available: anchor_positions.len(),
            required,
        });
    }
    if anchor_positions.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(SolverError::InvalidInput {
            reason: "non-finite anchor position".to_string(),
        });
    }
    if distances.iter().any(|d| !d.is_finite()) {
        return Err(SolverError::InvalidInput {
            reason: "non-finite distance".to_string(),
        });
    }
    Ok(())
}

/// Closed-form solution of the circle equations linearised against the first anchor
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearLeastSquares;

impl LinearLeastSquares {
    pub const NAME: &'static str = "linear_least_squares";

    fn locate(anchor_positions: &[Vector2<f64>], distances: &[f64]) -> Result<Vector2<f64>, SolverError> {
        check_inputs(anchor_positions, distances, 3)?;

        let p1 = anchor_positions[0];
        let rows = anchor_positions.len() - 1;
        let mut a_matrix = DMatrix::zeros(rows, 2);
        let mut b_vector = DVector::zeros(rows);

        for (row, (pi, ri)) in anchor_positions.iter().zip(distances).skip(1).enumerate() {
            a_matrix[(row, 0)] = 2.0 * (pi.x - p1.x);
            a_matrix[(row, 1)] = 2.0 * (pi.y - p1.y);

            b_vector[row] = distances[0].powi(2) - ri.powi(2) + pi.norm_squared() - p1.norm_squared();
        }

        let a_transpose = a_matrix.transpose();
        let normal = &a_transpose * &a_matrix;
        let normal = Matrix2::new(normal[(0, 0)], normal[(0, 1)], normal[(1, 0)], normal[(1, 1)]);

        let scale = normal.trace().powi(2);
        if scale == 0.0 || normal.determinant().abs() <= SINGULARITY_THRESHOLD * scale {
            return Err(SolverError::DegenerateGeometry {
                reason: "anchors are collinear or coincident".to_string(),
            });
        }

        let rhs = &a_transpose * &b_vector;
        let inverse = normal.try_inverse().ok_or_else(|| SolverError::DegenerateGeometry {
            reason: "normal matrix is not invertible".to_string(),
        })?;

        Ok(inverse * Vector2::new(rhs[0], rhs[1]))
    }
}

impl PositionSolver for LinearLeastSquares {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn solve(&self, anchor_positions: &[Vector2<f64>], distances: &[f64]) -> Result<Vec<Vector2<f64>>, SolverError> {
        Self::locate(anchor_positions, distances).map(|position| vec![position])
    }
}

/// Iterative non-linear least squares on the range residuals
#[derive(Debug, Clone, Copy)]
pub struct GaussNewton {
    pub max_iterations: u32,
    pub tolerance: f64,
}

impl GaussNewton {
    pub const NAME: &'static str = "gauss_newton";

    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }

    fn initial_guess(anchor_positions: &[Vector2<f64>], distances: &[f64]) -> Vector2<f64> {
        LinearLeastSquares::locate(anchor_positions, distances).unwrap_or_else(|_| {
            let sum: Vector2<f64> = anchor_positions.iter().sum();
            sum / anchor_positions.len() as f64
        })
    }
}

impl Default for GaussNewton {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

impl PositionSolver for GaussNewton {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn solve(&self, anchor_positions: &[Vector2<f64>], distances: &[f64]) -> Result<Vec<Vector2<f64>>, SolverError> {
        check_inputs(anchor_positions, distances, 3)?;

        let mut position = Self::initial_guess(anchor_positions, distances);
        let mut last_step = f64::INFINITY;

        for _ in 0..self.max_iterations {
            let mut jtj = Matrix2::zeros();
            let mut jtr = Vector2::zeros();

            for (anchor, distance) in anchor_positions.iter().zip(distances) {
                let offset = position - anchor;
                let range = offset.norm();
                if range < 1e-12 {
                    continue; // gradient undefined on top of the anchor
                }

                let gradient = offset / range;
                let residual = range - distance;
                jtj += gradient * gradient.transpose();
                jtr += gradient * residual;
            }

            let inverse = jtj.try_inverse().ok_or_else(|| SolverError::DegenerateGeometry {
                reason: "range jacobian is rank deficient".to_string(),
            })?;

            let step = -(inverse * jtr);
            position += step;
            last_step = step.norm();

            if !position.x.is_finite() || !position.y.is_finite() {
                return Err(SolverError::InvalidInput {
                    reason: "iteration diverged".to_string(),
                });
            }
            if last_step < self.tolerance {
                return Ok(vec![position]);
            }
        }

        Err(SolverError::ConvergenceFailure {
            iterations: self.max_iterations,
            last_step,
        })
    }
}

/// Intersection of the first two range circles.
///
/// Returns both intersection points ordered by their fit to the remaining
/// anchors. Circles that do not touch yield the single point of closest
/// approach on the line between the two anchors.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircleIntersection;

impl CircleIntersection {
    pub const NAME: &'static str = "circle_intersection";
}

impl PositionSolver for CircleIntersection {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn solve(&self, anchor_positions: &[Vector2<f64>], distances: &[f64]) -> Result<Vec<Vector2<f64>>, SolverError> {
        check_inputs(anchor_positions, distances, 2)?;

        let (p0, p1) = (anchor_positions[0], anchor_positions[1]);
        let (r0, r1) = (distances[0], distances[1]);

        let baseline = p1 - p0;
        let separation = baseline.norm();
        if separation < 1e-12 {
            return Err(SolverError::DegenerateGeometry {
                reason: "first two anchors coincide".to_string(),
            });
        }

        let along = (r0 * r0 - r1 * r1 + separation * separation) / (2.0 * separation);
        let across_squared = r0 * r0 - along * along;

        let unit = baseline / separation;
        let foot = p0 + unit * along;

        let mut candidates = if across_squared > 0.0 {
            let normal = Vector2::new(-unit.y, unit.x) * across_squared.sqrt();
            vec![foot + normal, foot - normal]
        } else {
            vec![foot]
        };

        let misfit = |candidate: &Vector2<f64>| -> f64 {
            anchor_positions
                .iter()
                .zip(distances)
                .skip(2)
                .map(|(anchor, distance)| ((candidate - anchor).norm() - distance).powi(2))
                .sum()
        };
        candidates.sort_by(|a, b| misfit(a).total_cmp(&misfit(b)));

        Ok(candidates)
    }
}

type SolverFactory = Box<dyn Fn(&SolverConfig) -> Result<Box<dyn PositionSolver>, ConfigError> + Send + Sync>;

/// Name-keyed solver factories, filled explicitly at startup
pub struct SolverRegistry {
    factories: BTreeMap<String, SolverFactory>,
}

impl SolverRegistry {
    /// Registry without any solver
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in solvers
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(LinearLeastSquares::NAME, |_| Ok(Box::new(LinearLeastSquares)));
        registry.register(GaussNewton::NAME, |config| Ok(Box::new(GaussNewton::from_config(config))));
        registry.register(CircleIntersection::NAME, |_| Ok(Box::new(CircleIntersection)));
        registry
    }

    /// Add or replace a factory; returns true if a previous one was replaced
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&SolverConfig) -> Result<Box<dyn PositionSolver>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory)).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Build the solver named by the configuration
    pub fn create(&self, config: &SolverConfig) -> Result<Box<dyn PositionSolver>, ConfigError> {
        config.validate()?;
        let factory = self.factories.get(&config.kind).ok_or_else(|| ConfigError::UnknownSolver {
            name: config.kind.clone(),
            available: self.names(),
        })?;
        factory(config)
    }
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for SolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverRegistry")
            .field("solvers", &self.names())
            .finish()
    }
}

/// Feeds round ranges to the configured solver and keeps its first candidate
#[derive(Debug)]
pub struct SolverAdapter {
    solver: Box<dyn PositionSolver>,
}

impl SolverAdapter {
    pub fn new(solver: Box<dyn PositionSolver>) -> Self {
        Self { solver }
    }

    pub fn from_config(registry: &SolverRegistry, config: &SolverConfig) -> Result<Self, ConfigError> {
        registry.create(config).map(Self::new)
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    /// Accepted position for one round
    pub fn locate(&self, ranges: &RoundRanges<'_>) -> Result<Vector2<f64>, SolverError> {
        let anchor_positions = ranges.anchor_positions();
        self.solver
            .solve(&anchor_positions, &ranges.distances)?
            .into_iter()
            .next()
            .ok_or(SolverError::NoCandidate)
    }
}
