use std::time::{Duration, Instant};

use pointalign_3d::{linalg, pointcloud::PointCloud};
use serde::{Deserialize, Serialize};

use crate::config::ICPConfig;
use crate::correspondence::{find_correspondences, CorrespondenceStats};
use crate::error::ICPError;
use crate::kdtree::KdTree;
use crate::ops::{mean_residual, RigidTransform};
use crate::registration::fit_transformation;
use crate::sampler::{IndexSampler, UniformSampler};

/// Maximum drift of an initial rotation from an orthonormal matrix.
const INITIAL_ROTATION_TOLERANCE: f64 = 1e-6;

/// State of an alignment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ICPStatus {
    /// More iterations are needed.
    Running,
    /// The error changed by less than the tolerance between two iterations.
    Converged,
    /// The iteration budget was spent before convergence.
    MaxIterationsReached,
}

impl ICPStatus {
    /// Returns true for `Converged` and `MaxIterationsReached`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ICPStatus::Running)
    }
}

/// Error bookkeeping of the iteration loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceState {
    /// Error of the last iteration, infinite before the first one.
    pub current_error: f64,
    /// Error of the iteration before the last one.
    pub previous_error: f64,
    /// Number of completed iterations.
    pub iteration: usize,
}

impl Default for ConvergenceState {
    fn default() -> Self {
        Self {
            current_error: f64::INFINITY,
            previous_error: 0.0,
            iteration: 0,
        }
    }
}

impl ConvergenceState {
    /// Evaluate the termination guard.
    pub fn status(&self, max_iterations: usize, tolerance: f64) -> ICPStatus {
        if self.iteration >= max_iterations {
            ICPStatus::MaxIterationsReached
        } else if self.iteration > 0 && (self.current_error - self.previous_error).abs() < tolerance
        {
            ICPStatus::Converged
        } else {
            ICPStatus::Running
        }
    }

    fn record(&mut self, error: f64) {
        self.previous_error = self.current_error;
        self.current_error = error;
        self.iteration += 1;
    }
}

/// Diagnostics of a single iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// Zero based index of the iteration.
    pub iteration: usize,
    /// Correspondence search statistics.
    pub correspondences: CorrespondenceStats,
    /// Transform estimated at this iteration.
    pub transform: RigidTransform,
    /// Mean distance between the accepted pairs after the update.
    pub error: f64,
    /// Wall time spent in the iteration.
    pub elapsed: Duration,
}

/// Result of the ICP algorithm.
///
/// The transformation is from the data to the model frame.
#[derive(Debug, Clone, Serialize)]
pub struct ICPResult {
    /// The data cloud after alignment.
    pub points: PointCloud,
    /// Estimated rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Estimated translation vector.
    pub translation: [f64; 3],
    /// The terminal state of the run.
    pub status: ICPStatus,
    /// Error of every iteration, in order.
    pub errors: Vec<f64>,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Last computed error.
    pub error: f64,
}

impl ICPResult {
    /// The estimated transform.
    pub fn transform(&self) -> RigidTransform {
        RigidTransform::new(self.rotation, self.translation)
    }
}

/// Iterative Closest Point solver using point to point distance.
///
/// The solver owns the data cloud and moves it onto the borrowed model cloud.
/// Each [`ICPSolver::step`] pairs a sample of the data points with their
/// nearest model points, rejects statistical outliers, fits a rigid transform
/// to the remaining pairs and applies it to the whole data cloud.
///
/// # Example
///
/// ```
/// use pointalign_3d::pointcloud::PointCloud;
/// use pointalign_icp::{ICPConfig, ICPSolver, SequenceSampler};
///
/// let model = PointCloud::new(vec![
///     [0.0, 0.0, 0.0],
///     [1.0, 0.0, 0.0],
///     [0.0, 2.0, 0.0],
///     [0.0, 0.0, 3.0],
/// ]);
/// let data = PointCloud::new(
///     model.points().iter().map(|p| [p[0] + 0.1, p[1], p[2]]).collect(),
/// );
///
/// let config = ICPConfig::default().with_rejection_sigma(3.0);
/// let sampler = SequenceSampler::new((0..4).collect());
/// let mut solver = ICPSolver::new(data, &model, config, sampler)?;
/// let result = solver.run()?;
/// assert!(result.status.is_terminal());
/// assert!((result.translation[0] + 0.1).abs() < 1e-9);
/// # Ok::<(), pointalign_icp::ICPError>(())
/// ```
pub struct ICPSolver<'a, S: IndexSampler> {
    data: PointCloud,
    model: &'a PointCloud,
    config: ICPConfig,
    sampler: S,
    kdtree: Option<KdTree>,
    transform: RigidTransform,
    state: ConvergenceState,
    errors: Vec<f64>,
}

impl<'a, S: IndexSampler> ICPSolver<'a, S> {
    /// Create a solver for aligning `data` onto `model`.
    ///
    /// The spatial index is not built; call [`ICPSolver::build_index`] or
    /// [`ICPSolver::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range or either cloud
    /// is empty or holds a non-finite coordinate.
    pub fn new(
        data: PointCloud,
        model: &'a PointCloud,
        config: ICPConfig,
        sampler: S,
    ) -> Result<Self, ICPError> {
        config.validate()?;
        data.validate()
            .map_err(|source| ICPError::PointCloud { role: "data", source })?;
        model
            .validate()
            .map_err(|source| ICPError::PointCloud { role: "model", source })?;

        Ok(Self {
            data,
            model,
            config,
            sampler,
            kdtree: None,
            transform: RigidTransform::identity(),
            state: ConvergenceState::default(),
            errors: Vec::new(),
        })
    }

    /// Apply an initial guess to the data cloud and start the accumulated transform from it.
    ///
    /// # Errors
    ///
    /// Returns [`ICPError::InvalidInput`] if iterations were already performed
    /// or the rotation is not a proper rotation matrix.
    pub fn with_initial_transform(mut self, initial: RigidTransform) -> Result<Self, ICPError> {
        if self.state.iteration > 0 {
            return Err(ICPError::InvalidInput(
                "initial transform set after the first iteration".to_string(),
            ));
        }
        let drift = linalg::orthonormality_error(&initial.rotation);
        if !(drift < INITIAL_ROTATION_TOLERANCE && linalg::det33(&initial.rotation) > 0.0) {
            return Err(ICPError::InvalidInput(format!(
                "initial rotation is not a rotation matrix (orthonormality error {drift:e})"
            )));
        }
        if !initial.translation.iter().all(|v| v.is_finite()) {
            return Err(ICPError::InvalidInput(
                "initial translation is not finite".to_string(),
            ));
        }

        self.data
            .transform_inplace(&initial.rotation, &initial.translation);
        self.transform = self.transform.then(&initial);
        Ok(self)
    }

    /// Build the spatial index over the model cloud.
    pub fn build_index(&mut self) -> Result<(), ICPError> {
        self.kdtree = Some(KdTree::build(self.model.points(), self.config.metric)?);
        Ok(())
    }

    /// Returns true once [`ICPSolver::build_index`] succeeded.
    pub fn is_index_built(&self) -> bool {
        self.kdtree.is_some()
    }

    /// Evaluate the termination guard.
    pub fn status(&self) -> ICPStatus {
        self.state
            .status(self.config.max_iterations, self.config.tolerance)
    }

    /// Perform one iteration regardless of the current status.
    ///
    /// # Errors
    ///
    /// Returns [`ICPError::IndexNotBuilt`] before [`ICPSolver::build_index`],
    /// or the estimator error tagged with the current iteration.
    pub fn step(&mut self) -> Result<IterationReport, ICPError> {
        let kdtree = self.kdtree.as_ref().ok_or(ICPError::IndexNotBuilt)?;
        let iteration = self.state.iteration;
        let now = Instant::now();

        // find closest points between current data and model
        let sample_size = self.config.sample_size(self.data.len());
        let correspondences = find_correspondences(
            self.data.points(),
            kdtree,
            &mut self.sampler,
            sample_size,
            self.config.rejection_sigma,
        )
        .map_err(|e| e.at_iteration(iteration))?;

        // compute transformation between the accepted pairs
        let delta = fit_transformation(
            self.data.points(),
            self.model.points(),
            &correspondences.map,
            self.config.degeneracy_tolerance,
        )
        .map_err(|e| e.at_iteration(iteration))?;

        let error = mean_residual(
            self.data.points(),
            self.model.points(),
            &correspondences.map,
            &delta,
        );

        // move the whole data cloud and accumulate the transform
        self.data
            .transform_inplace(&delta.rotation, &delta.translation);
        self.transform = self.transform.then(&delta);

        self.state.record(error);
        self.errors.push(error);

        let report = IterationReport {
            iteration,
            correspondences: correspondences.stats,
            transform: delta,
            error,
            elapsed: now.elapsed(),
        };

        log::debug!(
            "Iteration {}: {}/{} correspondences (rejection rate {:.3}), error {:e}, elapsed {:?}",
            report.iteration,
            report.correspondences.accepted,
            report.correspondences.sampled,
            report.correspondences.rejection_rate,
            report.error,
            report.elapsed
        );

        Ok(report)
    }

    /// Iterate until the run converges or the iteration budget is spent.
    ///
    /// Builds the spatial index first if needed.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an iteration. No partial transform is
    /// returned in that case.
    pub fn run(&mut self) -> Result<ICPResult, ICPError> {
        if self.kdtree.is_none() {
            self.build_index()?;
        }

        let status = loop {
            match self.status() {
                ICPStatus::Running => {
                    self.step()?;
                }
                terminal => break terminal,
            }
        };

        match status {
            ICPStatus::MaxIterationsReached => log::warn!(
                "ICP stopped after {} iterations without converging, error {:e}",
                self.state.iteration,
                self.state.current_error
            ),
            _ => log::info!(
                "ICP converged in {} iterations with error {:e}",
                self.state.iteration,
                self.state.current_error
            ),
        }

        Ok(ICPResult {
            points: self.data.clone(),
            rotation: self.transform.rotation,
            translation: self.transform.translation,
            status,
            errors: self.errors.clone(),
            num_iterations: self.state.iteration,
            error: self.state.current_error,
        })
    }

    /// The data cloud in its current pose.
    pub fn data(&self) -> &PointCloud {
        &self.data
    }

    /// The model cloud.
    pub fn model(&self) -> &PointCloud {
        self.model
    }

    /// The run configuration.
    pub fn config(&self) -> &ICPConfig {
        &self.config
    }

    /// The transform accumulated so far, from the original data frame to the model frame.
    pub fn transform(&self) -> &RigidTransform {
        &self.transform
    }

    /// The convergence bookkeeping.
    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }

    /// Error of every iteration so far.
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Consume the solver and return the aligned data cloud.
    pub fn into_data(self) -> PointCloud {
        self.data
    }
}

/// Align `data` onto `model` with a uniform index sampler.
///
/// The sampler is seeded from `config.seed`, or from the thread rng when no
/// seed is set.
///
/// # Arguments
///
/// * `data` - The movable cloud.
/// * `model` - The fixed reference cloud.
/// * `config` - Run configuration.
///
/// # Returns
///
/// The aligned cloud, the transform from the data to the model frame and the
/// per iteration errors.
pub fn icp_align(
    data: PointCloud,
    model: &PointCloud,
    config: ICPConfig,
) -> Result<ICPResult, ICPError> {
    match config.seed {
        Some(seed) => {
            ICPSolver::new(data, model, config, UniformSampler::seeded(seed))?.run()
        }
        None => ICPSolver::new(data, model, config, UniformSampler::from_entropy())?.run(),
    }
}
