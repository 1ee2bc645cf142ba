//! Simplified double inverted pendulum on a cart.
//!
//! Generalized coordinates `q = [x, θ1, θ2]`: cart position and the absolute
//! angle of each link from the upright vertical. The control input is a
//! horizontal force on the cart.
//!
//! ```text
//! M11 = m0 + m1 + m2
//! M12 = (m1·lc1 + m2·L1)·cos θ1
//! M13 = m2·lc2·cos θ2
//! M22 = m1·lc1² + m2·L1² + I1
//! M23 = m2·L1·lc2·cos(θ1 − θ2)
//! M33 = m2·lc2² + I2
//! ```

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::error::PlantError;
use crate::model::DynamicsModel;
use crate::params::PlantParameters;

/// Lumped coefficients that do not depend on the state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    total_mass: f64,
    link1_moment: f64,
    link2_moment: f64,
    coupling: f64,
    link1_rotational: f64,
    link2_rotational: f64,
}

impl Coefficients {
    fn new(p: &PlantParameters) -> Self {
        Self {
            total_mass: p.cart_mass + p.link1_mass + p.link2_mass,
            link1_moment: p.link1_mass * p.com1 + p.link2_mass * p.link1_length,
            link2_moment: p.link2_mass * p.com2,
            coupling: p.link2_mass * p.link1_length * p.com2,
            link1_rotational: p.link1_mass * p.com1 * p.com1
                + p.link2_mass * p.link1_length * p.link1_length
                + p.link1_inertia,
            link2_rotational: p.link2_mass * p.com2 * p.com2 + p.link2_inertia,
        }
    }
}

/// Reference three-DOF plant model.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedDip {
    params: PlantParameters,
    coeffs: Coefficients,
}

impl Default for SimplifiedDip {
    fn default() -> Self {
        let params = PlantParameters::default();
        let coeffs = Coefficients::new(&params);
        Self { params, coeffs }
    }
}

impl SimplifiedDip {
    /// Build from validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PlantError::InvalidParameters`] if `params` fails
    /// [`PlantParameters::validate`].
    pub fn new(params: PlantParameters) -> Result<Self, PlantError> {
        params.validate()?;
        let coeffs = Coefficients::new(&params);
        Ok(Self { params, coeffs })
    }

    /// Physical parameters.
    #[must_use]
    pub fn params(&self) -> &PlantParameters {
        &self.params
    }

    /// Mass matrix on stack storage.
    #[must_use]
    pub fn mass_matrix3(&self, q: &Vector3<f64>) -> Matrix3<f64> {
        let k = &self.coeffs;
        let (th1, th2) = (q[1], q[2]);
        let m12 = k.link1_moment * th1.cos();
        let m13 = k.link2_moment * th2.cos();
        let m23 = k.coupling * (th1 - th2).cos();
        #[rustfmt::skip]
        let m = Matrix3::new(
            k.total_mass, m12, m13,
            m12, k.link1_rotational, m23,
            m13, m23, k.link2_rotational,
        );
        m
    }

    /// Coriolis/centrifugal matrix with viscous friction on the diagonal.
    #[must_use]
    pub fn coriolis_matrix3(&self, q: &Vector3<f64>, qd: &Vector3<f64>) -> Matrix3<f64> {
        let k = &self.coeffs;
        let p = &self.params;
        let (th1, th2) = (q[1], q[2]);
        let (w1, w2) = (qd[1], qd[2]);
        let s12 = (th1 - th2).sin();
        #[rustfmt::skip]
        let c = Matrix3::new(
            p.cart_friction, -k.link1_moment * th1.sin() * w1, -k.link2_moment * th2.sin() * w2,
            0.0, p.joint1_friction, k.coupling * s12 * w2,
            0.0, -k.coupling * s12 * w1, p.joint2_friction,
        );
        c
    }

    /// Gravity vector on stack storage.
    #[must_use]
    pub fn gravity_vector3(&self, q: &Vector3<f64>) -> Vector3<f64> {
        let k = &self.coeffs;
        let g = self.params.gravity;
        Vector3::new(
            0.0,
            -k.link1_moment * g * q[1].sin(),
            -k.link2_moment * g * q[2].sin(),
        )
    }

    /// Total mechanical energy (kinetic + potential, upright links at `+h`).
    #[must_use]
    pub fn total_energy(&self, q: &Vector3<f64>, qd: &Vector3<f64>) -> f64 {
        let kinetic = 0.5 * qd.dot(&(self.mass_matrix3(q) * qd));
        let k = &self.coeffs;
        let potential =
            self.params.gravity * (k.link1_moment * q[1].cos() + k.link2_moment * q[2].cos());
        kinetic + potential
    }
}

fn to_vector3(v: &DVector<f64>) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

impl DynamicsModel for SimplifiedDip {
    fn dof(&self) -> usize {
        3
    }

    fn mass_matrix(&self, q: &DVector<f64>) -> DMatrix<f64> {
        let m = self.mass_matrix3(&to_vector3(q));
        DMatrix::from_iterator(3, 3, m.iter().copied())
    }

    fn coriolis_matrix(&self, q: &DVector<f64>, qd: &DVector<f64>) -> DMatrix<f64> {
        let c = self.coriolis_matrix3(&to_vector3(q), &to_vector3(qd));
        DMatrix::from_iterator(3, 3, c.iter().copied())
    }

    fn gravity_vector(&self, q: &DVector<f64>) -> DVector<f64> {
        let g = self.gravity_vector3(&to_vector3(q));
        DVector::from_column_slice(g.as_slice())
    }

    fn input_vector(&self, u: f64) -> DVector<f64> {
        DVector::from_vec(vec![u, 0.0, 0.0])
    }
}
