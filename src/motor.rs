// Rotor dynamics with first-order lag and slew-rate limiting
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use nalgebra as na;

use crate::config::{validate_rotors, ConfigError};
use crate::RotorBatch;

/// Batched rotor model, one row per environment and one column per rotor.
///
/// With the motor model enabled, each rotor tracks its commanded angular velocity through a
/// first-order lag whose rate of change is clamped, then integrated with an explicit Euler step:
///
/// ```text
/// ω̇ = clamp((ω_ref - ω) / τ, min_rate, max_rate)
/// ω ← ω + ω̇ · dt
/// ```
///
/// When `dt` exceeds `τ` the Euler step overshoots: instead of settling, the rotor keeps
/// alternating around its reference in a band of `max(|min_rate|, |max_rate|) · dt`.
///
/// With the motor model disabled the commanded angular velocity is realized instantly.
#[derive(Clone, Debug)]
pub struct Motor<T: na::RealField + Copy> {
    omega: RotorBatch<T>,
    taus: [T; 4],
    init: [T; 4],
    max_rate: [T; 4],
    min_rate: [T; 4],
    dt: T,
    use_motor_model: bool,
}

impl<T: na::RealField + Copy> Motor<T> {
    /// Creates a rotor model for `num_envs` environments, with every rotor spinning at `init`.
    ///
    /// # Arguments
    /// - `taus`: Time constant of each rotor in seconds.
    /// - `init`: Initial angular velocity of each rotor in rad/s; also the reset value.
    /// - `max_rate`, `min_rate`: Bounds on the rate of change of each rotor in rad/s².
    /// - `dt`: The fixed integration timestep in seconds.
    /// - `use_motor_model`: If false, the rotors follow their reference instantly.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidTimestep`] if `dt` is not positive and finite.
    /// - [`ConfigError::InvalidTimeConstant`], [`ConfigError::InvalidRateBounds`] or
    ///   [`ConfigError::InvalidInitialSpeed`] for the first rotor with an invalid parameter.
    pub fn new(
        num_envs: usize,
        taus: [f64; 4],
        init: [f64; 4],
        max_rate: [f64; 4],
        min_rate: [f64; 4],
        dt: f64,
        use_motor_model: bool,
    ) -> Result<Self, ConfigError> {
        if dt <= 0.0 || !dt.is_finite() {
            return Err(ConfigError::InvalidTimestep);
        }
        validate_rotors(&taus, &init, &max_rate, &min_rate)?;

        if use_motor_model && taus.iter().any(|&tau| dt > tau) {
            log::warn!(
                "Motor timestep {dt} s exceeds a rotor time constant {taus:?}; explicit Euler will overshoot until the rate limit binds"
            );
        }

        let init: [T; 4] = init.map(na::convert);
        Ok(Self {
            omega: RotorBatch::from_fn(num_envs, |_, rotor| init[rotor]),
            taus: taus.map(na::convert),
            init,
            max_rate: max_rate.map(na::convert),
            min_rate: min_rate.map(na::convert),
            dt: na::convert(dt),
            use_motor_model,
        })
    }

    /// Returns the number of environments in the batch.
    pub fn num_envs(&self) -> usize {
        self.omega.nrows()
    }

    /// Returns the realized angular velocities of every rotor.
    pub fn omega(&self) -> &RotorBatch<T> {
        &self.omega
    }

    /// Returns the integration timestep.
    pub fn dt(&self) -> T {
        self.dt
    }

    /// Returns the flag indicating whether the lag/rate-limit model is active.
    pub fn use_motor_model(&self) -> bool {
        self.use_motor_model
    }

    /// Advances every rotor by one timestep towards `omega_ref` and returns the realized angular
    /// velocities.
    ///
    /// # Panics
    /// If `omega_ref` does not have one row per environment.
    pub fn compute(&mut self, omega_ref: &RotorBatch<T>) -> &RotorBatch<T> {
        assert_eq!(
            omega_ref.nrows(),
            self.omega.nrows(),
            "Rotor reference has the wrong batch size"
        );

        if !self.use_motor_model {
            self.omega.copy_from(omega_ref);
            return &self.omega;
        }

        for (rotor, (mut omega, reference)) in self
            .omega
            .column_iter_mut()
            .zip(omega_ref.column_iter())
            .enumerate()
        {
            let tau = self.taus[rotor];
            let (lo, hi) = (self.min_rate[rotor], self.max_rate[rotor]);
            for (w, &w_ref) in omega.iter_mut().zip(reference.iter()) {
                let domega = ((w_ref - *w) / tau).clamp(lo, hi);
                *w += domega * self.dt;
            }
        }
        &self.omega
    }

    /// Restores the initial angular velocities of the given environments, or of all of them if
    /// `env_ids` is `None`. Other environments are left untouched.
    ///
    /// # Panics
    /// If an index is out of bounds.
    pub fn reset(&mut self, env_ids: Option<&[usize]>) {
        let env_ids = crate::resolve_env_ids(env_ids, self.num_envs());
        for &env in env_ids.iter() {
            for (rotor, &w0) in self.init.iter().enumerate() {
                self.omega[(env, rotor)] = w0;
            }
        }
    }
}
