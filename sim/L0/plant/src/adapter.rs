//! Glue between a [`DynamicsModel`] and the guarded solver.
//!
//! Each step solves `M(q)·q̈ = τ(u) − C(q,q̇)·q̇ − G(q)` through the adapter's
//! own [`MatrixInverter`]. No inverter or monitor state is shared between
//! adapters.

use nalgebra::{DMatrix, DVector};
use sim_stability::{
    InstabilityCause, MatrixInverter, MatrixStructure, MonitorStatistics, RegularizationPolicy,
};

use crate::error::PlantError;
use crate::model::DynamicsModel;

/// Generalized positions and velocities.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantState {
    /// Generalized coordinates.
    pub q: DVector<f64>,
    /// Generalized velocities.
    pub qd: DVector<f64>,
}

impl PlantState {
    /// Create a state from positions and velocities.
    #[must_use]
    pub fn new(q: DVector<f64>, qd: DVector<f64>) -> Self {
        Self { q, qd }
    }

    /// State at rest at the origin.
    #[must_use]
    pub fn zeros(dof: usize) -> Self {
        Self {
            q: DVector::zeros(dof),
            qd: DVector::zeros(dof),
        }
    }

    /// Split a stacked `[q, q̇]` vector.
    ///
    /// # Errors
    ///
    /// Returns [`PlantError::DimensionMismatch`] if `x` does not have length
    /// `2 * dof`.
    pub fn from_stacked(x: &DVector<f64>, dof: usize) -> Result<Self, PlantError> {
        if x.len() != 2 * dof {
            return Err(PlantError::dimension_mismatch(2 * dof, x.len()));
        }
        Ok(Self {
            q: x.rows(0, dof).into_owned(),
            qd: x.rows(dof, dof).into_owned(),
        })
    }

    /// Stack into `[q, q̇]`.
    #[must_use]
    pub fn to_stacked(&self) -> DVector<f64> {
        let n = self.q.len();
        DVector::from_fn(n + self.qd.len(), |i, _| {
            if i < n {
                self.q[i]
            } else {
                self.qd[i - n]
            }
        })
    }
}

/// Step-level result: never an `Err`, failures become `success = false`.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicsResult {
    /// Whether accelerations were computed.
    pub success: bool,
    /// `[q̇, q̈]`, zeros on failure.
    pub state_derivative: DVector<f64>,
    /// Condition number of the mass matrix (`+∞` if unknown).
    pub condition_number: f64,
    /// Whether the mass matrix needed adaptive regularization.
    pub was_regularized: bool,
    /// Instability category on failure.
    pub cause: Option<InstabilityCause>,
    /// Diagnostic message on failure.
    pub error: Option<String>,
}

impl DynamicsResult {
    /// Accelerations `q̈` (the second half of the state derivative).
    #[must_use]
    pub fn accelerations(&self) -> DVector<f64> {
        let n = self.state_derivative.len() / 2;
        self.state_derivative.rows(n, n).into_owned()
    }

    fn failed(
        dof: usize,
        error: &PlantError,
        condition_number: f64,
        was_regularized: bool,
    ) -> Self {
        Self {
            success: false,
            state_derivative: DVector::zeros(2 * dof),
            condition_number,
            was_regularized,
            cause: error.instability().map(|e| e.cause),
            error: Some(error.to_string()),
        }
    }
}

/// Owns one dynamics model and one guarded solver.
#[derive(Debug, Clone)]
pub struct PhysicsMatrixAdapter<D: DynamicsModel> {
    model: D,
    inverter: MatrixInverter,
}

impl<D: DynamicsModel> PhysicsMatrixAdapter<D> {
    /// Create an adapter with the default policy.
    ///
    /// Mass matrices are declared symmetric positive definite, so solves try
    /// Cholesky first.
    #[must_use]
    pub fn new(model: D) -> Self {
        Self::with_policy(model, RegularizationPolicy::default())
    }

    /// Create an adapter with a specific policy.
    #[must_use]
    pub fn with_policy(model: D, policy: RegularizationPolicy) -> Self {
        let inverter =
            MatrixInverter::new(policy).with_structure(MatrixStructure::SymmetricPositiveDefinite);
        Self { model, inverter }
    }

    /// Create an adapter around a preconfigured inverter.
    #[must_use]
    pub fn with_inverter(model: D, inverter: MatrixInverter) -> Self {
        Self { model, inverter }
    }

    /// The dynamics model.
    #[must_use]
    pub fn model(&self) -> &D {
        &self.model
    }

    /// The owned solver.
    #[must_use]
    pub fn inverter(&self) -> &MatrixInverter {
        &self.inverter
    }

    fn check_len(&self, v: &DVector<f64>) -> Result<(), PlantError> {
        let dof = self.model.dof();
        if v.len() == dof {
            Ok(())
        } else {
            Err(PlantError::dimension_mismatch(dof, v.len()))
        }
    }

    /// Forcing vector `b = τ(u) − C(q,q̇)·q̇ − G(q)`.
    ///
    /// # Errors
    ///
    /// Returns [`PlantError::DimensionMismatch`] if `q` or `qd` does not match
    /// the model's degrees of freedom.
    pub fn forcing(
        &self,
        q: &DVector<f64>,
        qd: &DVector<f64>,
        u: f64,
    ) -> Result<DVector<f64>, PlantError> {
        self.check_len(q)?;
        self.check_len(qd)?;
        let c = self.model.coriolis_matrix(q, qd);
        Ok(self.model.input_vector(u) - c * qd - self.model.gravity_vector(q))
    }

    /// Generalized accelerations `q̈`.
    ///
    /// # Errors
    ///
    /// Returns [`PlantError::DimensionMismatch`] for mis-sized state vectors
    /// and [`PlantError::Instability`] when the guarded mass-matrix solve
    /// fails.
    pub fn accelerations(
        &mut self,
        q: &DVector<f64>,
        qd: &DVector<f64>,
        u: f64,
    ) -> Result<DVector<f64>, PlantError> {
        let b = self.forcing(q, qd, u)?;
        let m = self.model.mass_matrix(q);
        Ok(self.inverter.solve_linear_system(&m, &b)?)
    }

    /// `[q̇, q̈]` for an integrator, with failures translated into
    /// `success = false`.
    pub fn compute_dynamics(&mut self, state: &PlantState, u: f64) -> DynamicsResult {
        let dof = self.model.dof();
        match self.accelerations(&state.q, &state.qd, u) {
            Ok(qdd) => {
                let outcome = self.inverter.last_outcome();
                let derivative = PlantState::new(state.qd.clone(), qdd).to_stacked();
                DynamicsResult {
                    success: true,
                    state_derivative: derivative,
                    condition_number: outcome.map_or(f64::INFINITY, |o| o.condition_number),
                    was_regularized: outcome.is_some_and(|o| o.was_regularized),
                    cause: None,
                    error: None,
                }
            }
            Err(error) => {
                let condition_number = error
                    .instability()
                    .map_or(f64::INFINITY, |e| e.condition_number);
                let was_regularized = error.instability().is_some()
                    && self.inverter.last_outcome().is_some_and(|o| o.was_regularized);
                DynamicsResult::failed(dof, &error, condition_number, was_regularized)
            }
        }
    }

    /// Explicit `M(q)⁻¹`, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`PlantError::DimensionMismatch`] if `q` is mis-sized and
    /// [`PlantError::Instability`] when the guarded inversion fails.
    pub fn inverse_mass_matrix(&mut self, q: &DVector<f64>) -> Result<DMatrix<f64>, PlantError> {
        self.check_len(q)?;
        let m = self.model.mass_matrix(q);
        Ok(self.inverter.invert_matrix(&m)?)
    }

    /// Statistics of this adapter's solver.
    #[must_use]
    pub fn statistics(&self) -> MonitorStatistics {
        self.inverter.statistics()
    }

    /// Zero this adapter's statistics.
    pub fn reset_statistics(&mut self) {
        self.inverter.reset_statistics();
    }
}
