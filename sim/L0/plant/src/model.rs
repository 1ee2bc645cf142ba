//! The dynamics-model seam between plant physics and the guarded solver.

use nalgebra::{DMatrix, DVector};

/// Supplies the terms of `M(q)·q̈ + C(q,q̇)·q̇ + G(q) = τ(u)`.
///
/// Implementations are pure functions of their arguments. The adapter checks
/// state lengths against [`dof`](Self::dof) before calling any term.
pub trait DynamicsModel: Send {
    /// Number of generalized coordinates.
    fn dof(&self) -> usize;

    /// Mass (inertia) matrix, `dof × dof`.
    fn mass_matrix(&self, q: &DVector<f64>) -> DMatrix<f64>;

    /// Coriolis/centrifugal matrix including viscous friction, `dof × dof`.
    fn coriolis_matrix(&self, q: &DVector<f64>, qd: &DVector<f64>) -> DMatrix<f64>;

    /// Gravity vector, length `dof`.
    fn gravity_vector(&self, q: &DVector<f64>) -> DVector<f64>;

    /// Generalized forces produced by control input `u`, length `dof`.
    fn input_vector(&self, u: f64) -> DVector<f64>;
}
