//! In-place LU and Cholesky kernels.
//!
//! Generic over nalgebra storage so the same elimination order runs on heap
//! (`DMatrix`) and stack (`Matrix3`) matrices. Both backends therefore
//! produce bit-identical factors for the same input.

use nalgebra::{Dim, Matrix, RawStorage, RawStorageMut, U1};

/// Why a factorization stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactorError {
    /// Cholesky met a non-positive diagonal (matrix not positive definite).
    CholeskyFailed,
    /// LU met an exactly zero (or non-finite) pivot column.
    LuSingular,
}

impl std::fmt::Display for FactorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CholeskyFailed => write!(f, "Cholesky decomposition failed"),
            Self::LuSingular => write!(f, "LU decomposition hit a zero pivot"),
        }
    }
}

// ============================================================================
// LU Factorization
// ============================================================================

/// Factor A = P·L·U in place. Stores L (unit lower) and U (upper) in `a`.
/// Stores the row swapped into position `k` at `piv[k]`. O(n³/3).
///
/// # Errors
///
/// Returns `Err(FactorError::LuSingular)` if a pivot column is entirely zero
/// or contains non-finite values.
pub(crate) fn lu_factor_in_place<D, S>(
    a: &mut Matrix<f64, D, D, S>,
    piv: &mut [usize],
) -> Result<(), FactorError>
where
    D: Dim,
    S: RawStorageMut<f64, D, D>,
{
    let n = a.nrows();
    debug_assert_eq!(piv.len(), n);
    for k in 0..n {
        // Partial pivot: find max |a[i,k]| for i in k..n
        let mut max_val = a[(k, k)].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            let v = a[(i, k)].abs();
            if v > max_val {
                max_val = v;
                max_row = i;
            }
        }
        if max_val == 0.0 || !max_val.is_finite() {
            return Err(FactorError::LuSingular);
        }
        piv[k] = max_row;

        if max_row != k {
            for j in 0..n {
                let tmp = a[(k, j)];
                a[(k, j)] = a[(max_row, j)];
                a[(max_row, j)] = tmp;
            }
        }

        for i in (k + 1)..n {
            a[(i, k)] /= a[(k, k)];
            for j in (k + 1)..n {
                a[(i, j)] -= a[(i, k)] * a[(k, j)];
            }
        }
    }
    Ok(())
}

/// Solve P·L·U·x = b using pre-computed factors. Non-destructive on `a`/`piv`.
#[allow(clippy::needless_range_loop)]
pub(crate) fn lu_solve_factored<D, S, SV>(
    a: &Matrix<f64, D, D, S>,
    piv: &[usize],
    x: &mut Matrix<f64, D, U1, SV>,
) where
    D: Dim,
    S: RawStorage<f64, D, D>,
    SV: RawStorageMut<f64, D, U1>,
{
    let n = a.nrows();

    // Apply row permutation to RHS
    for k in 0..n {
        if piv[k] != k {
            let tmp = x[k];
            x[k] = x[piv[k]];
            x[piv[k]] = tmp;
        }
    }

    // Forward substitution (L·y = Pb)
    for i in 1..n {
        for k in 0..i {
            x[i] -= a[(i, k)] * x[k];
        }
    }

    // Back substitution (U·x = y)
    for i in (0..n).rev() {
        for k in (i + 1)..n {
            x[i] -= a[(i, k)] * x[k];
        }
        x[i] /= a[(i, i)];
    }
}

/// Solve Aᵀ·x = b with the factors of A (Aᵀ = Uᵀ·Lᵀ·P).
#[allow(clippy::needless_range_loop)]
pub(crate) fn lu_solve_transposed<D, S, SV>(
    a: &Matrix<f64, D, D, S>,
    piv: &[usize],
    x: &mut Matrix<f64, D, U1, SV>,
) where
    D: Dim,
    S: RawStorage<f64, D, D>,
    SV: RawStorageMut<f64, D, U1>,
{
    let n = a.nrows();

    // Uᵀ·w = b (Uᵀ is lower triangular)
    for i in 0..n {
        for k in 0..i {
            x[i] -= a[(k, i)] * x[k];
        }
        x[i] /= a[(i, i)];
    }

    // Lᵀ·v = w (unit upper triangular)
    for i in (0..n).rev() {
        for k in (i + 1)..n {
            x[i] -= a[(k, i)] * x[k];
        }
    }

    // Undo the row interchanges in reverse order
    for k in (0..n).rev() {
        if piv[k] != k {
            let tmp = x[k];
            x[k] = x[piv[k]];
            x[piv[k]] = tmp;
        }
    }
}

/// Smallest |U[k,k]| divided by the largest |A[i,j]| of the original matrix.
///
/// Called on already-factored storage; `max_abs_entry` comes from the input.
pub(crate) fn min_relative_pivot<D, S>(lu: &Matrix<f64, D, D, S>, max_abs_entry: f64) -> f64
where
    D: Dim,
    S: RawStorage<f64, D, D>,
{
    if max_abs_entry == 0.0 {
        return 0.0;
    }
    let n = lu.nrows();
    let mut min_pivot = f64::INFINITY;
    for k in 0..n {
        min_pivot = min_pivot.min(lu[(k, k)].abs());
    }
    min_pivot / max_abs_entry
}

// ============================================================================
// Dense Cholesky
// ============================================================================

/// In-place Cholesky (LL^T) factorization. Overwrites the lower triangle of `m` with L.
/// The upper triangle is left unchanged.
///
/// # Errors
///
/// Returns `Err(FactorError::CholeskyFailed)` if the matrix is not positive definite.
pub(crate) fn cholesky_in_place<D, S>(m: &mut Matrix<f64, D, D, S>) -> Result<(), FactorError>
where
    D: Dim,
    S: RawStorageMut<f64, D, D>,
{
    let n = m.nrows();
    for j in 0..n {
        // Diagonal: L[j,j] = sqrt(M[j,j] - Σ(L[j,k]² for k < j))
        let mut diag = m[(j, j)];
        for k in 0..j {
            diag -= m[(j, k)] * m[(j, k)];
        }
        // Negated comparison also rejects NaN.
        if !(diag > 0.0) || !diag.is_finite() {
            return Err(FactorError::CholeskyFailed);
        }
        let ljj = diag.sqrt();
        m[(j, j)] = ljj;

        // Off-diagonal: L[i,j] = (M[i,j] - Σ(L[i,k]·L[j,k] for k < j)) / L[j,j]
        for i in (j + 1)..n {
            let mut sum = m[(i, j)];
            for k in 0..j {
                sum -= m[(i, k)] * m[(j, k)];
            }
            m[(i, j)] = sum / ljj;
        }
    }
    Ok(())
}

/// Solve L·L^T·x = b in place, where L is stored in the lower triangle of `l`.
/// On entry `x` contains b; on exit `x` contains the solution.
pub(crate) fn cholesky_solve_in_place<D, S, SV>(
    l: &Matrix<f64, D, D, S>,
    x: &mut Matrix<f64, D, U1, SV>,
) where
    D: Dim,
    S: RawStorage<f64, D, D>,
    SV: RawStorageMut<f64, D, U1>,
{
    let n = l.nrows();

    // Forward substitution: L·y = b
    for j in 0..n {
        for k in 0..j {
            x[j] -= l[(j, k)] * x[k];
        }
        x[j] /= l[(j, j)];
    }

    // Back substitution: L^T·z = y
    for j in (0..n).rev() {
        for k in (j + 1)..n {
            x[j] -= l[(k, j)] * x[k];
        }
        x[j] /= l[(j, j)];
    }
}

// ============================================================================
// Tests
// ============================================================================
