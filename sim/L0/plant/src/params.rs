//! Physical parameters of the double inverted pendulum on a cart.

use crate::error::PlantError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Masses, lengths, inertias and friction of a cart with two links.
///
/// Angles are measured from the upright vertical. `com1`/`com2` are the
/// distances from each joint to its link's center of mass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PlantParameters {
    /// Cart mass (kg).
    pub cart_mass: f64,
    /// First link mass (kg).
    pub link1_mass: f64,
    /// Second link mass (kg).
    pub link2_mass: f64,
    /// First link length (m).
    pub link1_length: f64,
    /// Second link length (m).
    pub link2_length: f64,
    /// Joint-to-center-of-mass distance of link 1 (m).
    pub com1: f64,
    /// Joint-to-center-of-mass distance of link 2 (m).
    pub com2: f64,
    /// Moment of inertia of link 1 about its center of mass (kg·m²).
    pub link1_inertia: f64,
    /// Moment of inertia of link 2 about its center of mass (kg·m²).
    pub link2_inertia: f64,
    /// Gravitational acceleration (m/s²).
    pub gravity: f64,
    /// Viscous friction on the cart (N·s/m).
    pub cart_friction: f64,
    /// Viscous friction at joint 1 (N·m·s/rad).
    pub joint1_friction: f64,
    /// Viscous friction at joint 2 (N·m·s/rad).
    pub joint2_friction: f64,
}

impl Default for PlantParameters {
    fn default() -> Self {
        Self {
            cart_mass: 1.5,
            link1_mass: 0.2,
            link2_mass: 0.15,
            link1_length: 0.4,
            link2_length: 0.3,
            com1: 0.2,
            com2: 0.15,
            link1_inertia: 0.0081,
            link2_inertia: 0.0034,
            gravity: 9.81,
            cart_friction: 0.2,
            joint1_friction: 0.005,
            joint2_friction: 0.004,
        }
    }
}

impl PlantParameters {
    /// Frictionless variant of these parameters.
    #[must_use]
    pub fn frictionless(mut self) -> Self {
        self.cart_friction = 0.0;
        self.joint1_friction = 0.0;
        self.joint2_friction = 0.0;
        self
    }

    /// Set the gravitational acceleration.
    #[must_use]
    pub fn gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PlantError::InvalidParameters`] naming the first field that is
    /// non-finite or out of its physical range.
    pub fn validate(&self) -> Result<(), PlantError> {
        let positive = [
            ("cart_mass", self.cart_mass),
            ("link1_mass", self.link1_mass),
            ("link2_mass", self.link2_mass),
            ("link1_length", self.link1_length),
            ("link2_length", self.link2_length),
            ("com1", self.com1),
            ("com2", self.com2),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PlantError::invalid_parameters(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }

        let non_negative = [
            ("link1_inertia", self.link1_inertia),
            ("link2_inertia", self.link2_inertia),
            ("cart_friction", self.cart_friction),
            ("joint1_friction", self.joint1_friction),
            ("joint2_friction", self.joint2_friction),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PlantError::invalid_parameters(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }

        if !self.gravity.is_finite() {
            return Err(PlantError::invalid_parameters(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }
        if self.com1 > self.link1_length || self.com2 > self.link2_length {
            return Err(PlantError::invalid_parameters(
                "center of mass lies beyond the end of its link",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PlantParameters::default().validate().is_ok());
        assert!(PlantParameters::default().frictionless().validate().is_ok());
        assert!(PlantParameters::default().gravity(0.0).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut p = PlantParameters::default();
        p.cart_mass = 0.0;
        assert!(p.validate().is_err());

        let mut p = PlantParameters::default();
        p.link2_length = f64::NAN;
        assert!(p.validate().is_err());

        let mut p = PlantParameters::default();
        p.joint1_friction = -0.1;
        assert!(p.validate().is_err());

        let mut p = PlantParameters::default();
        p.com1 = 0.5;
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("center of mass"));

        let p = PlantParameters::default().gravity(f64::INFINITY);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_frictionless() {
        let p = PlantParameters::default().frictionless();
        assert_eq!(p.cart_friction, 0.0);
        assert_eq!(p.joint1_friction, 0.0);
        assert_eq!(p.joint2_friction, 0.0);
        assert_eq!(p.cart_mass, PlantParameters::default().cart_mass);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_config_uses_defaults() {
        let p: PlantParameters = serde_json::from_str(r#"{"cart_mass": 2.0}"#).unwrap();
        assert_eq!(p.cart_mass, 2.0);
        assert_eq!(p.gravity, 9.81);
    }
}
