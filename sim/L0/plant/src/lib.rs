//! Plant dynamics on top of guarded mass-matrix solves.
//!
//! A [`DynamicsModel`] supplies `M(q)`, `C(q,q̇)`, `G(q)` and `τ(u)`; a
//! [`PhysicsMatrixAdapter`] turns them into accelerations through its own
//! [`sim_stability::MatrixInverter`]. Instability never reaches an
//! integrator as NaN: [`PhysicsMatrixAdapter::compute_dynamics`] reports it
//! as `success = false` with the cause and condition number.
//!
//! [`SimplifiedDip`] is the reference double inverted pendulum on a cart.
//! [`PlantBatch`] evaluates many independent instances, in parallel with the
//! `parallel` feature.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use sim_plant::{PhysicsMatrixAdapter, PlantState, SimplifiedDip};
//!
//! let mut adapter = PhysicsMatrixAdapter::new(SimplifiedDip::default());
//! let state = PlantState::new(
//!     DVector::from_vec(vec![0.0, 0.05, -0.02]),
//!     DVector::zeros(3),
//! );
//!
//! let result = adapter.compute_dynamics(&state, 1.0);
//! assert!(result.success);
//! assert_eq!(result.state_derivative.len(), 6);
//! assert_eq!(adapter.statistics().total_inversions, 1);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-plant/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod adapter;
mod batch;
mod error;
mod model;
mod params;
mod pendulum;

pub use adapter::{DynamicsResult, PhysicsMatrixAdapter, PlantState};
pub use batch::PlantBatch;
pub use error::PlantError;
pub use model::DynamicsModel;
pub use params::PlantParameters;
pub use pendulum::SimplifiedDip;
