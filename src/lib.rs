#![warn(missing_docs)]

//! # Drone Racer Actuation Library
//!
//! This library provides the actuation pipeline of a drone-racing reinforcement-learning task:
//! policy outputs go in, body wrenches for a whole batch of simulated quadrotors come out.
//!
//! Every quantity is stored as a dense batch with one row per environment, so a single call
//! advances all drones in lockstep.
//!
//! ## Features
//!
//! - A rotor model ([`motor::Motor`]) with per-rotor first-order lag and slew-rate limiting, or
//!   a transparent bypass for fast, stable training.
//! - A control allocation ([`allocation::Allocation`]) mapping four rotor speeds to collective
//!   thrust and three-axis body torque, for "X" and "+" quadrotor frames.
//! - An action term ([`action::ControlAction`]) driving both every physics tick and applying
//!   the resulting wrench to the simulated body, with per-environment episode resets.
//! - Host-facing traits ([`host::Articulation`], [`host::TelemetrySink`]) so that any physics
//!   engine can be plugged in.
//!
//! ## Usage
//!
//! ### Rotor model and allocation
//!
//! ```rust
//! use drone_racer::allocation::{Allocation, FrameLayout};
//! use drone_racer::motor::Motor;
//! use drone_racer::RotorBatch;
//!
//! let num_envs = 8;
//! let mut motor = Motor::<f64>::new(
//!     num_envs,
//!     [0.02; 4],     // time constants
//!     [0.0; 4],      // initial speeds
//!     [50000.0; 4],  // max rate
//!     [-50000.0; 4], // min rate
//!     0.002,         // physics timestep
//!     true,          // use the motor model
//! )
//! .expect("Invalid motor parameters");
//! let allocation =
//!     Allocation::<f64>::new(num_envs, 0.1825, 5.3453e-7, 1.5e-9, FrameLayout::QuadX);
//!
//! let omega_ref = RotorBatch::<f64>::from_element(num_envs, 2500.0);
//! let omega = motor.compute(&omega_ref);
//! let wrench = allocation.compute(omega);
//!
//! // Symmetric rotor speeds produce pure thrust
//! assert!(wrench[(0, 0)] > 0.0);
//! assert!(wrench[(0, 3)].abs() < 1e-12);
//! ```
//!
//! ### Action term
//!
//! The [`action::ControlAction`] owns the asset it actuates. The host calls
//! [`action::ActionTerm::process_actions`] then [`action::ActionTerm::apply_actions`] every
//! physics tick, and [`action::ActionTerm::reset`] on episode boundaries. See the `hover` demo
//! (`cargo run --example hover --features simulation`) for a complete loop.
//!
//! ## License
//!
//! MIT

use std::borrow::Cow;

use nalgebra as na;

/// The action term gluing the rotor model and allocation to a simulated asset.
pub mod action;

/// Control allocation from rotor speeds to body wrench.
pub mod allocation;

/// Immutable, validated configuration of the action term.
pub mod config;

/// Traits describing the simulation host: articulated assets and telemetry sinks.
pub mod host;

/// Rotor dynamics: first-order lag with slew-rate limiting.
pub mod motor;

/// A minimal batched rigid-body host for running the action term without an external engine.
#[cfg(feature = "simulation")]
pub mod sim;

/// One row per environment, one column per rotor.
pub type RotorBatch<T> = na::OMatrix<T, na::Dyn, na::U4>;

/// One row per environment, one column per spatial axis.
pub type Vector3Batch<T> = na::OMatrix<T, na::Dyn, na::U3>;

/// Resolves an optional list of environment indices to an explicit one.
///
/// `None`, or a list as long as the batch, stands for every environment.
pub(crate) fn resolve_env_ids(env_ids: Option<&[usize]>, num_envs: usize) -> Cow<'_, [usize]> {
    match env_ids {
        Some(ids) if ids.len() != num_envs => Cow::Borrowed(ids),
        _ => Cow::Owned((0..num_envs).collect()),
    }
}

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
