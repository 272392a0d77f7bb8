// Action term converting policy outputs into rotor speeds and body wrenches
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
use thiserror::Error;

use crate::allocation::Allocation;
use crate::config::{ConfigError, ControlActionConfig};
use crate::host::{record_columns, Articulation, TelemetrySink};
use crate::motor::Motor;
use crate::{resolve_env_ids, RotorBatch, Vector3Batch};

/// Name of the rigid body receiving the wrench.
pub const BODY_NAME: &str = "body";

const ACTION_CHANNELS: [&str; 4] = ["a1", "a2", "a3", "a4"];
const ROTOR_SPEED_CHANNELS: [&str; 4] = ["w1", "w2", "w3", "w4"];
const TIME_CHANNEL: &str = "time";

/// The lifecycle of an action term, driven by the host once per physics step.
///
/// The host must call [`process_actions`](Self::process_actions) before
/// [`apply_actions`](Self::apply_actions) on every step; applying without processing re-applies
/// whatever was processed last.
pub trait ActionTerm {
    /// The batch of policy outputs consumed every step.
    type Actions;

    /// Converts raw policy outputs into the quantities applied on this step.
    fn process_actions(&mut self, actions: &Self::Actions);

    /// Applies the processed actions to the simulation.
    fn apply_actions(&mut self);

    /// Resets the given environments, or all of them if `env_ids` is `None`.
    fn reset(&mut self, env_ids: Option<&[usize]>);
}

/// Error type for constructing a [`ControlAction`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ActionError {
    /// The asset handed over is not the one named in the configuration.
    #[error("Asset '{found}' does not match the configured asset '{expected}'")]
    AssetNameMismatch {
        /// Configured asset name.
        expected: String,
        /// Name of the asset handed over.
        found: String,
    },

    /// The asset has no body to apply the wrench to.
    #[error("Asset '{asset}' has no body named '{body}'")]
    BodyNotFound {
        /// Name of the asset.
        asset: String,
        /// Name of the missing body.
        body: String,
    },

    /// The asset has no environments.
    #[error("Asset '{0}' has no environments")]
    EmptyBatch(String),

    /// The physics timestep is zero, negative or not finite.
    #[error("Physics timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),

    /// The rotor model rejected its parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Rotor-speed control of a batch of quadrotors.
///
/// Each policy action in `[-1, 1]` commands one rotor speed in `[0, omega_max]`. The commanded
/// speeds go through the [`Motor`] model, the realized speeds through the [`Allocation`], and the
/// resulting collective thrust and body torque are applied to the body of the asset.
///
/// Telemetry channels `a1..a4` (clamped actions) and `w1..w4` (realized rotor speeds) are
/// recorded when processing, `time` (elapsed time since reset) when applying.
pub struct ControlAction<T, A, S>
where
    T: na::RealField + Copy,
    A: Articulation<T>,
    S: TelemetrySink<T>,
{
    config: ControlActionConfig,
    asset: A,
    sink: S,
    body_id: usize,
    physics_dt: T,
    omega_max: T,
    elapsed_time: na::DVector<T>,
    raw_actions: RotorBatch<T>,
    omega_ref: RotorBatch<T>,
    processed_actions: RotorBatch<T>,
    thrust: Vector3Batch<T>,
    moment: Vector3Batch<T>,
    allocation: Allocation<T>,
    motor: Motor<T>,
}

impl<T, A, S> ControlAction<T, A, S>
where
    T: na::RealField + Copy,
    A: Articulation<T>,
    S: TelemetrySink<T>,
{
    /// Creates the action term for `asset`, stepped every `physics_dt` seconds.
    ///
    /// The batch size is taken from the asset.
    ///
    /// # Errors
    /// - [`ActionError::InvalidTimestep`] if `physics_dt` is not positive and finite.
    /// - [`ActionError::AssetNameMismatch`] if the asset is not the configured one.
    /// - [`ActionError::EmptyBatch`] if the asset has no environments.
    /// - [`ActionError::BodyNotFound`] if the asset has no body named [`BODY_NAME`].
    /// - [`ActionError::Config`] if the rotor model rejects the configured parameters, which a
    ///   built [`ControlActionConfig`] never does.
    pub fn new(
        config: ControlActionConfig,
        asset: A,
        physics_dt: f64,
        sink: S,
    ) -> Result<Self, ActionError> {
        if physics_dt <= 0.0 || !physics_dt.is_finite() {
            return Err(ActionError::InvalidTimestep(physics_dt));
        }
        if asset.name() != config.asset_name() {
            return Err(ActionError::AssetNameMismatch {
                expected: config.asset_name().to_owned(),
                found: asset.name().to_owned(),
            });
        }

        let num_envs = asset.num_envs();
        if num_envs == 0 {
            return Err(ActionError::EmptyBatch(asset.name().to_owned()));
        }
        let body_id = asset
            .find_body(BODY_NAME)
            .ok_or_else(|| ActionError::BodyNotFound {
                asset: asset.name().to_owned(),
                body: BODY_NAME.to_owned(),
            })?;

        let allocation = Allocation::new(
            num_envs,
            config.arm_length(),
            config.thrust_coeff(),
            config.drag_coeff(),
            config.frame_layout(),
        );
        let motor = Motor::new(
            num_envs,
            config.taus(),
            config.init(),
            config.max_rate(),
            config.min_rate(),
            physics_dt,
            config.use_motor_model(),
        )?;

        log::debug!(
            "Created control action for {num_envs} environments of '{}' (dt = {physics_dt} s): {config:?}",
            config.asset_name()
        );

        Ok(Self {
            omega_max: na::convert(config.omega_max()),
            physics_dt: na::convert(physics_dt),
            config,
            asset,
            sink,
            body_id,
            elapsed_time: na::DVector::zeros(num_envs),
            raw_actions: RotorBatch::zeros(num_envs),
            omega_ref: RotorBatch::zeros(num_envs),
            processed_actions: RotorBatch::zeros(num_envs),
            thrust: Vector3Batch::zeros(num_envs),
            moment: Vector3Batch::zeros(num_envs),
            allocation,
            motor,
        })
    }

    /// Returns the number of environments in the batch.
    pub fn num_envs(&self) -> usize {
        self.raw_actions.nrows()
    }

    /// Returns the dimension of the action space: one command per rotor.
    pub fn action_dim(&self) -> usize {
        self.raw_actions.ncols()
    }

    /// Returns the actions received on the last step, clamped to `[-1, 1]`.
    pub fn raw_actions(&self) -> &RotorBatch<T> {
        &self.raw_actions
    }

    /// Returns the wrench computed on the last step, as `[thrust, τx, τy, τz]`.
    pub fn processed_actions(&self) -> &RotorBatch<T> {
        &self.processed_actions
    }

    /// Returns the time elapsed since the last reset of every environment.
    pub fn elapsed_time(&self) -> &na::DVector<T> {
        &self.elapsed_time
    }

    /// Returns the index of the body receiving the wrench.
    pub fn body_id(&self) -> usize {
        self.body_id
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ControlActionConfig {
        &self.config
    }

    /// Returns the rotor model.
    pub fn motor(&self) -> &Motor<T> {
        &self.motor
    }

    /// Returns the control allocation.
    pub fn allocation(&self) -> &Allocation<T> {
        &self.allocation
    }

    /// Returns the actuated asset.
    pub fn asset(&self) -> &A {
        &self.asset
    }

    /// Returns the actuated asset mutably, e.g. to step the physics engine.
    pub fn asset_mut(&mut self) -> &mut A {
        &mut self.asset
    }

    /// Returns the telemetry sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn reset_root_state(&mut self, env_ids: &[usize]) {
        let mut root_state = self.asset.default_root_state(env_ids);
        let origins = self.asset.env_origins(env_ids);
        let mut position = root_state.fixed_columns_mut::<3>(0);
        position += &origins;

        let pose = root_state.fixed_columns::<7>(0).into_owned();
        let velocity = root_state.fixed_columns::<6>(7).into_owned();
        self.asset.write_root_pose(&pose, env_ids);
        self.asset.write_root_velocity(&velocity, env_ids);
    }
}

impl<T, A, S> ActionTerm for ControlAction<T, A, S>
where
    T: na::RealField + Copy,
    A: Articulation<T>,
    S: TelemetrySink<T>,
{
    type Actions = RotorBatch<T>;

    /// Clamps the actions to `[-1, 1]`, maps them to rotor speed references in
    /// `[0, omega_max]`, advances the rotor model and computes the wrench.
    ///
    /// # Panics
    /// If `actions` does not have one row per environment.
    fn process_actions(&mut self, actions: &RotorBatch<T>) {
        assert_eq!(
            actions.nrows(),
            self.num_envs(),
            "Actions have the wrong batch size"
        );

        let (lo, hi) = (-T::one(), T::one());
        self.raw_actions.copy_from(actions);
        self.raw_actions.apply(|a| *a = (*a).clamp(lo, hi));

        let half: T = na::convert(0.5);
        for (w_ref, &a) in self.omega_ref.iter_mut().zip(self.raw_actions.iter()) {
            *w_ref = self.omega_max * (a + T::one()) * half;
        }
        let omega = self.motor.compute(&self.omega_ref);
        self.allocation
            .compute_into(omega, &mut self.processed_actions);

        record_columns(&mut self.sink, &ACTION_CHANNELS, &self.raw_actions);
        record_columns(&mut self.sink, &ROTOR_SPEED_CHANNELS, omega);
    }

    /// Applies the collective thrust along the body z-axis and the body torque, then advances
    /// the elapsed time of every environment.
    fn apply_actions(&mut self) {
        self.thrust
            .column_mut(2)
            .copy_from(&self.processed_actions.column(0));
        self.moment
            .copy_from(&self.processed_actions.fixed_columns::<3>(1));
        self.asset
            .set_external_force_and_torque(&self.thrust, &self.moment, self.body_id);

        self.elapsed_time.add_scalar_mut(self.physics_dt);
        self.sink.record(TIME_CHANNEL, self.elapsed_time.as_slice());
    }

    /// Zeroes the actions and elapsed time of the given environments, resets their rotors and
    /// restores the default joint state of the asset. The default root state is restored too if
    /// [`ControlActionConfig::reset_root_state`] is set.
    ///
    /// # Panics
    /// If an index is out of bounds.
    fn reset(&mut self, env_ids: Option<&[usize]>) {
        let env_ids = resolve_env_ids(env_ids, self.num_envs());
        log::trace!("Resetting {} environments", env_ids.len());

        for &env in env_ids.iter() {
            self.raw_actions.row_mut(env).fill(T::zero());
            self.processed_actions.row_mut(env).fill(T::zero());
            self.elapsed_time[env] = T::zero();
        }

        self.motor.reset(Some(&*env_ids));
        self.asset.reset(&env_ids);
        if self.config.reset_root_state() {
            self.reset_root_state(&env_ids);
        }
        let (joint_pos, joint_vel) = self.asset.default_joint_state(&env_ids);
        self.asset.write_joint_state(&joint_pos, &joint_vel, &env_ids);
    }
}
