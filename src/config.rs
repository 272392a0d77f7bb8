// Configuration of the rotor-speed control action
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

use thiserror::Error;

use crate::allocation::FrameLayout;

/// Error type for invalid action term configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Zero, negative or non-finite arm length.
    #[error("Arm length must be positive and finite")]
    InvalidArmLength,

    /// Zero, negative or non-finite thrust coefficient.
    #[error("Thrust coefficient must be positive and finite")]
    InvalidThrustCoefficient,

    /// Negative or non-finite drag coefficient.
    #[error("Drag coefficient must be non-negative and finite")]
    InvalidDragCoefficient,

    /// Zero, negative or non-finite maximum rotor speed.
    #[error("Maximum rotor speed must be positive and finite")]
    InvalidMaxRotorSpeed,

    /// Zero, negative or non-finite time constant of the given rotor.
    #[error("Time constant of rotor {0} must be positive and finite")]
    InvalidTimeConstant(usize),

    /// Non-finite or inverted rate bounds of the given rotor.
    #[error("Rate bounds of rotor {0} must be finite and satisfy min_rate <= max_rate")]
    InvalidRateBounds(usize),

    /// Negative or non-finite initial speed of the given rotor.
    #[error("Initial speed of rotor {0} must be non-negative and finite")]
    InvalidInitialSpeed(usize),

    /// Empty asset name.
    #[error("Asset name must not be empty")]
    EmptyAssetName,

    /// Zero, negative or non-finite integration timestep.
    #[error("Timestep must be positive and finite")]
    InvalidTimestep,
}

/// Checks the per-rotor parameters of the rotor model, rotor by rotor.
pub(crate) fn validate_rotors(
    taus: &[f64; 4],
    init: &[f64; 4],
    max_rate: &[f64; 4],
    min_rate: &[f64; 4],
) -> Result<(), ConfigError> {
    for rotor in 0..4 {
        let tau = taus[rotor];
        if tau <= 0.0 || !tau.is_finite() {
            return Err(ConfigError::InvalidTimeConstant(rotor));
        }

        let (lo, hi) = (min_rate[rotor], max_rate[rotor]);
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return Err(ConfigError::InvalidRateBounds(rotor));
        }

        let w0 = init[rotor];
        if w0 < 0.0 || !w0.is_finite() {
            return Err(ConfigError::InvalidInitialSpeed(rotor));
        }
    }
    Ok(())
}

/// Parameters of the [`ControlAction`](crate::action::ControlAction) term.
///
/// The configuration is fixed for the lifetime of the action term. Obtain a validated instance
/// with `ControlActionConfig::default()` or through [`ControlActionConfigBuilder`].
#[derive(Clone, Debug, PartialEq)]
pub struct ControlActionConfig {
    /// Name of the asset actuated by the action term.
    /// Defaults to "robot".
    asset_name: String,

    /// Distance from the center of mass to each rotor hub in meters.
    /// Defaults to 0.1825 m.
    arm_length: f64,

    /// Reaction torque coefficient, in N·m·s².
    /// Defaults to 1.5e-9.
    drag_coeff: f64,

    /// Thrust coefficient, in N·s².
    /// Defaults to 5.3453e-7.
    thrust_coeff: f64,

    /// Maximum rotor angular velocity in rad/s. An action of +1 commands this speed, an action
    /// of -1 commands a standstill.
    /// Defaults to 5541 rad/s: a 2100KV motor on a fully charged 6S battery, 2100 * 6 * 4.2 =
    /// 52,920 RPM.
    omega_max: f64,

    /// Time constant of each rotor in seconds.
    /// Defaults to 0.1ms.
    taus: [f64; 4],

    /// Initial angular velocity of each rotor in rad/s, restored on reset.
    /// Defaults to 2572.5 rad/s.
    init: [f64; 4],

    /// Upper bound on the rate of change of each rotor angular velocity in rad/s².
    /// Defaults to 50000 rad/s².
    max_rate: [f64; 4],

    /// Lower bound on the rate of change of each rotor angular velocity in rad/s².
    /// Defaults to -50000 rad/s².
    min_rate: [f64; 4],

    /// Whether the rotors follow the lag/rate-limit model. If false, commanded speeds are
    /// realized instantly.
    /// Defaults to false.
    use_motor_model: bool,

    /// Arrangement of the rotors on the airframe.
    /// Defaults to the "x" configuration.
    frame_layout: FrameLayout,

    /// Whether a reset also writes the default root pose and velocity of the asset, offset by the
    /// environment origins. If false, only the joint state is restored and the drone keeps its
    /// root pose across resets.
    /// Defaults to false.
    reset_root_state: bool,
}

impl Default for ControlActionConfig {
    fn default() -> Self {
        ControlActionConfig {
            asset_name: String::from("robot"),
            arm_length: 0.1825,
            drag_coeff: 1.5e-9,
            thrust_coeff: 5.3453e-7,
            omega_max: 5541.0,
            taus: [0.0001; 4],
            init: [2572.5; 4],
            max_rate: [50000.0; 4],
            min_rate: [-50000.0; 4],
            use_motor_model: false,
            frame_layout: FrameLayout::QuadX,
            reset_root_state: false,
        }
    }
}

impl ControlActionConfig {
    /// Returns the name of the actuated asset.
    pub fn asset_name(&self) -> &str {
        &self.asset_name
    }

    /// Returns the arm length.
    pub fn arm_length(&self) -> f64 {
        self.arm_length
    }

    /// Returns the reaction torque coefficient.
    pub fn drag_coeff(&self) -> f64 {
        self.drag_coeff
    }

    /// Returns the thrust coefficient.
    pub fn thrust_coeff(&self) -> f64 {
        self.thrust_coeff
    }

    /// Returns the maximum rotor angular velocity.
    pub fn omega_max(&self) -> f64 {
        self.omega_max
    }

    /// Returns the rotor time constants.
    pub fn taus(&self) -> [f64; 4] {
        self.taus
    }

    /// Returns the initial rotor angular velocities.
    pub fn init(&self) -> [f64; 4] {
        self.init
    }

    /// Returns the upper bounds on the rotor acceleration.
    pub fn max_rate(&self) -> [f64; 4] {
        self.max_rate
    }

    /// Returns the lower bounds on the rotor acceleration.
    pub fn min_rate(&self) -> [f64; 4] {
        self.min_rate
    }

    /// Returns the flag indicating whether the motor model is active.
    pub fn use_motor_model(&self) -> bool {
        self.use_motor_model
    }

    /// Returns the rotor arrangement.
    pub fn frame_layout(&self) -> FrameLayout {
        self.frame_layout
    }

    /// Returns the flag indicating whether resets rewrite the root state of the asset.
    pub fn reset_root_state(&self) -> bool {
        self.reset_root_state
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.asset_name.is_empty() {
            return Err(ConfigError::EmptyAssetName);
        }
        if self.arm_length <= 0.0 || !self.arm_length.is_finite() {
            return Err(ConfigError::InvalidArmLength);
        }
        if self.thrust_coeff <= 0.0 || !self.thrust_coeff.is_finite() {
            return Err(ConfigError::InvalidThrustCoefficient);
        }
        if self.drag_coeff < 0.0 || !self.drag_coeff.is_finite() {
            return Err(ConfigError::InvalidDragCoefficient);
        }
        if self.omega_max <= 0.0 || !self.omega_max.is_finite() {
            return Err(ConfigError::InvalidMaxRotorSpeed);
        }
        validate_rotors(&self.taus, &self.init, &self.max_rate, &self.min_rate)
    }
}

/// Builder for [`ControlActionConfig`], starting from the default parameters.
///
/// ```rust
/// use drone_racer::config::{ConfigError, ControlActionConfigBuilder};
///
/// let config = ControlActionConfigBuilder::default()
///     .omega_max(4000.0)
///     .use_motor_model(true)
///     .taus([0.02; 4])
///     .build()
///     .expect("Invalid action config");
/// assert_eq!(config.omega_max(), 4000.0);
///
/// let invalid = ControlActionConfigBuilder::default().arm_length(-1.0).build();
/// assert_eq!(invalid, Err(ConfigError::InvalidArmLength));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ControlActionConfigBuilder {
    config: ControlActionConfig,
}

impl ControlActionConfigBuilder {
    /// Sets the name of the actuated asset.
    pub fn asset_name(mut self, asset_name: impl Into<String>) -> Self {
        self.config.asset_name = asset_name.into();
        self
    }

    /// Sets the arm length in meters.
    pub fn arm_length(mut self, arm_length: f64) -> Self {
        self.config.arm_length = arm_length;
        self
    }

    /// Sets the reaction torque coefficient.
    pub fn drag_coeff(mut self, drag_coeff: f64) -> Self {
        self.config.drag_coeff = drag_coeff;
        self
    }

    /// Sets the thrust coefficient.
    pub fn thrust_coeff(mut self, thrust_coeff: f64) -> Self {
        self.config.thrust_coeff = thrust_coeff;
        self
    }

    /// Sets the maximum rotor angular velocity in rad/s.
    pub fn omega_max(mut self, omega_max: f64) -> Self {
        self.config.omega_max = omega_max;
        self
    }

    /// Sets the time constant of each rotor in seconds.
    pub fn taus(mut self, taus: [f64; 4]) -> Self {
        self.config.taus = taus;
        self
    }

    /// Sets the initial angular velocity of each rotor in rad/s.
    pub fn init(mut self, init: [f64; 4]) -> Self {
        self.config.init = init;
        self
    }

    /// Sets the lower and upper bounds on the rotor acceleration in rad/s².
    pub fn rate_limits(mut self, min_rate: [f64; 4], max_rate: [f64; 4]) -> Self {
        self.config.min_rate = min_rate;
        self.config.max_rate = max_rate;
        self
    }

    /// Sets whether the rotors follow the lag/rate-limit model.
    pub fn use_motor_model(mut self, use_motor_model: bool) -> Self {
        self.config.use_motor_model = use_motor_model;
        self
    }

    /// Sets the rotor arrangement.
    pub fn frame_layout(mut self, frame_layout: FrameLayout) -> Self {
        self.config.frame_layout = frame_layout;
        self
    }

    /// Sets whether resets rewrite the root state of the asset.
    pub fn reset_root_state(mut self, reset_root_state: bool) -> Self {
        self.config.reset_root_state = reset_root_state;
        self
    }

    /// Validates the parameters and returns the configuration.
    ///
    /// # Errors
    /// The first invalid parameter found, as a [`ConfigError`].
    pub fn build(self) -> Result<ControlActionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
