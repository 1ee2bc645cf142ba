//! Factorization backends.
//!
//! [`KernelBackend::Dense`] factors heap-allocated `DMatrix` values of any
//! order. [`KernelBackend::Static`] copies order-3 input into stack-allocated
//! `Matrix3` storage and runs the same elimination there; other orders fall
//! back to the dense path. Both backends are always compiled. The
//! `static-kernel` feature only changes which one is the default.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::linalg::{self, FactorError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which kernel family performs factorizations and singular-value solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KernelBackend {
    /// Heap-allocated dynamic matrices.
    Dense,
    /// Stack-allocated fixed-size matrices for order 3.
    Static,
}

impl Default for KernelBackend {
    fn default() -> Self {
        if cfg!(feature = "static-kernel") {
            Self::Static
        } else {
            Self::Dense
        }
    }
}

impl std::fmt::Display for KernelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dense => write!(f, "dense"),
            Self::Static => write!(f, "static"),
        }
    }
}

/// Decomposition requested from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactorMethod {
    /// Partial-pivot LU.
    Lu,
    /// LLᵀ, symmetric positive definite input only.
    Cholesky,
}

/// Factors produced by [`KernelBackend::factor`].
#[derive(Debug, Clone)]
pub(crate) enum Factorization {
    DenseLu { lu: DMatrix<f64>, piv: Vec<usize> },
    DenseCholesky { l: DMatrix<f64> },
    StaticLu { lu: Matrix3<f64>, piv: [usize; 3] },
    StaticCholesky { l: Matrix3<f64> },
}

fn to_static(m: &DMatrix<f64>) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| m[(i, j)])
}

impl KernelBackend {
    /// Whether this backend takes the fixed-size path for an order-`n` matrix.
    #[must_use]
    pub fn is_static_for(self, n: usize) -> bool {
        self == Self::Static && n == 3
    }

    /// Singular values of a square matrix, in no particular order.
    ///
    /// Input must be finite.
    pub(crate) fn singular_values(self, m: &DMatrix<f64>) -> Vec<f64> {
        if self.is_static_for(m.nrows()) {
            to_static(m).singular_values().iter().copied().collect()
        } else {
            m.singular_values().iter().copied().collect()
        }
    }

    /// Factor a square, finite matrix.
    pub(crate) fn factor(
        self,
        m: &DMatrix<f64>,
        method: FactorMethod,
    ) -> Result<Factorization, FactorError> {
        let n = m.nrows();
        match (self.is_static_for(n), method) {
            (true, FactorMethod::Lu) => {
                let mut lu = to_static(m);
                let mut piv = [0; 3];
                linalg::lu_factor_in_place(&mut lu, &mut piv)?;
                Ok(Factorization::StaticLu { lu, piv })
            }
            (true, FactorMethod::Cholesky) => {
                let mut l = to_static(m);
                linalg::cholesky_in_place(&mut l)?;
                Ok(Factorization::StaticCholesky { l })
            }
            (false, FactorMethod::Lu) => {
                let mut lu = m.clone();
                let mut piv = vec![0; n];
                linalg::lu_factor_in_place(&mut lu, &mut piv)?;
                Ok(Factorization::DenseLu { lu, piv })
            }
            (false, FactorMethod::Cholesky) => {
                let mut l = m.clone();
                linalg::cholesky_in_place(&mut l)?;
                Ok(Factorization::DenseCholesky { l })
            }
        }
    }

    /// Smallest LU pivot relative to the largest absolute entry of `m`.
    ///
    /// Returns `0.0` when elimination meets an exactly zero pivot column.
    pub(crate) fn min_relative_pivot(self, m: &DMatrix<f64>) -> f64 {
        let max_abs = m.amax();
        match self.factor(m, FactorMethod::Lu) {
            Ok(Factorization::DenseLu { lu, .. }) => linalg::min_relative_pivot(&lu, max_abs),
            Ok(Factorization::StaticLu { lu, .. }) => linalg::min_relative_pivot(&lu, max_abs),
            Ok(_) | Err(_) => 0.0,
        }
    }
}

impl Factorization {
    /// Order of the factored matrix.
    pub(crate) fn order(&self) -> usize {
        match self {
            Self::DenseLu { lu, .. } => lu.nrows(),
            Self::DenseCholesky { l } => l.nrows(),
            Self::StaticLu { .. } | Self::StaticCholesky { .. } => 3,
        }
    }

    /// Overwrite `x` (holding b) with the solution of A·x = b.
    pub(crate) fn solve_in_place(&self, x: &mut DVector<f64>) {
        match self {
            Self::DenseLu { lu, piv } => linalg::lu_solve_factored(lu, piv, x),
            Self::DenseCholesky { l } => linalg::cholesky_solve_in_place(l, x),
            Self::StaticLu { lu, piv } => {
                let mut v = Vector3::new(x[0], x[1], x[2]);
                linalg::lu_solve_factored(lu, piv, &mut v);
                x.copy_from(&v);
            }
            Self::StaticCholesky { l } => {
                let mut v = Vector3::new(x[0], x[1], x[2]);
                linalg::cholesky_solve_in_place(l, &mut v);
                x.copy_from(&v);
            }
        }
    }

    /// Overwrite `x` (holding b) with the solution of Aᵀ·x = b.
    pub(crate) fn solve_transposed_in_place(&self, x: &mut DVector<f64>) {
        match self {
            Self::DenseLu { lu, piv } => linalg::lu_solve_transposed(lu, piv, x),
            Self::StaticLu { lu, piv } => {
                let mut v = Vector3::new(x[0], x[1], x[2]);
                linalg::lu_solve_transposed(lu, piv, &mut v);
                x.copy_from(&v);
            }
            // Symmetric
            Self::DenseCholesky { .. } | Self::StaticCholesky { .. } => self.solve_in_place(x),
        }
    }

    /// Solve column by column. `x` holds the right-hand sides on entry.
    pub(crate) fn solve_columns_in_place(&self, x: &mut DMatrix<f64>) {
        let mut column = DVector::zeros(x.nrows());
        for j in 0..x.ncols() {
            column.copy_from(&x.column(j));
            self.solve_in_place(&mut column);
            x.set_column(j, &column);
        }
    }
}
