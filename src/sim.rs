// Batched rigid-body quadrotor host for driving the action term in simulation
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

use crate::host::{Articulation, RootPoseBatch, RootStateBatch, RootVelocityBatch};
use crate::Vector3Batch;

/// Number of rotor joints of the quadrotor asset.
pub const NUM_ROTOR_JOINTS: usize = 4;

/// Advances `x` by one step of the classic fourth-order Runge-Kutta method for `ẋ = f(x)`.
pub fn rk4_step<T, F, const N: usize>(f: F, x: na::SVector<T, N>, dt: T) -> na::SVector<T, N>
where
    T: na::RealField + Copy,
    F: Fn(na::SVector<T, N>) -> na::SVector<T, N>,
{
    let two: T = na::convert(2.0);
    let six: T = na::convert(6.0);
    let k1 = f(x);
    let k2 = f(x + k1 * (dt / two));
    let k3 = f(x + k2 * (dt / two));
    let k4 = f(x + k3 * dt);
    x + (k1 + k2 * two + k3 * two + k4) * (dt / six)
}

/// A batch of rigid-body quadrotors, each living in its own environment.
///
/// The external wrench set through [`Articulation::set_external_force_and_torque`] is held
/// constant over a [`step`](QuadrotorBatch::step), like a physics engine applies it. Positions
/// and velocities are in the world frame (z up); body rates and the wrench are in the body frame.
#[derive(Clone, Debug)]
pub struct QuadrotorBatch<T: na::RealField + Copy> {
    name: String,
    mass: T,
    inertia: na::Matrix3<T>,
    inertia_inv: na::Matrix3<T>,
    gravity: na::Vector3<T>,

    position: Vector3Batch<T>,
    orientation: Vec<na::UnitQuaternion<T>>,
    velocity: Vector3Batch<T>,
    body_rate: Vector3Batch<T>,
    joint_pos: na::DMatrix<T>,
    joint_vel: na::DMatrix<T>,

    force: Vector3Batch<T>,
    torque: Vector3Batch<T>,

    default_root_state: RootStateBatch<T>,
    default_joint_pos: na::DMatrix<T>,
    default_joint_vel: na::DMatrix<T>,
    env_origins: Vector3Batch<T>,
}

impl<T: na::RealField + Copy> QuadrotorBatch<T> {
    /// Creates `num_envs` quadrotors resting at their default root state: level, at rest, at
    /// `spawn_height` above their environment origin.
    ///
    /// Environment origins are laid out on a square grid with `env_spacing` meters between
    /// neighbours.
    ///
    /// Returns `None` if the inertia matrix is not invertible.
    pub fn new(
        name: impl Into<String>,
        num_envs: usize,
        mass: f64,
        inertia: na::Matrix3<f64>,
        env_spacing: f64,
        spawn_height: f64,
    ) -> Option<Self> {
        let inertia: na::Matrix3<T> = inertia.map(na::convert);
        let inertia_inv = inertia.try_inverse()?;

        let num_cols = (num_envs as f64).sqrt().ceil().max(1.0) as usize;
        let env_origins = Vector3Batch::from_fn(num_envs, |env, axis| match axis {
            0 => na::convert((env / num_cols) as f64 * env_spacing),
            1 => na::convert((env % num_cols) as f64 * env_spacing),
            _ => T::zero(),
        });

        let mut default_root_state = RootStateBatch::zeros(num_envs);
        default_root_state.column_mut(2).fill(na::convert(spawn_height));
        default_root_state.column_mut(3).fill(T::one());

        let mut quads = Self {
            name: name.into(),
            mass: na::convert(mass),
            inertia,
            inertia_inv,
            gravity: na::Vector3::new(T::zero(), T::zero(), na::convert(-9.81)),
            position: Vector3Batch::zeros(num_envs),
            orientation: vec![na::UnitQuaternion::identity(); num_envs],
            velocity: Vector3Batch::zeros(num_envs),
            body_rate: Vector3Batch::zeros(num_envs),
            joint_pos: na::DMatrix::zeros(num_envs, NUM_ROTOR_JOINTS),
            joint_vel: na::DMatrix::zeros(num_envs, NUM_ROTOR_JOINTS),
            force: Vector3Batch::zeros(num_envs),
            torque: Vector3Batch::zeros(num_envs),
            default_root_state,
            default_joint_pos: na::DMatrix::zeros(num_envs, NUM_ROTOR_JOINTS),
            default_joint_vel: na::DMatrix::zeros(num_envs, NUM_ROTOR_JOINTS),
            env_origins,
        };

        let all: Vec<usize> = (0..num_envs).collect();
        let mut root_state = quads.default_root_state(&all);
        let mut position = root_state.fixed_columns_mut::<3>(0);
        position += &quads.env_origins;
        quads.write_root_pose(&root_state.fixed_columns::<7>(0).into_owned(), &all);
        Some(quads)
    }

    /// Returns the mass of each quadrotor.
    pub fn mass(&self) -> T {
        self.mass
    }

    /// Returns the world-frame gravity vector.
    pub fn gravity(&self) -> na::Vector3<T> {
        self.gravity
    }

    /// Returns the world-frame positions of every quadrotor.
    pub fn positions(&self) -> &Vector3Batch<T> {
        &self.position
    }

    /// Returns the world-frame linear velocities of every quadrotor.
    pub fn velocities(&self) -> &Vector3Batch<T> {
        &self.velocity
    }

    /// Returns the body rates of every quadrotor.
    pub fn body_rates(&self) -> &Vector3Batch<T> {
        &self.body_rate
    }

    /// Returns the orientation of one quadrotor.
    pub fn orientation(&self, env: usize) -> na::UnitQuaternion<T> {
        self.orientation[env]
    }

    /// Returns the joint positions and velocities of every quadrotor.
    pub fn joint_state(&self) -> (&na::DMatrix<T>, &na::DMatrix<T>) {
        (&self.joint_pos, &self.joint_vel)
    }

    /// Returns the body-frame external force and torque applied on the next step.
    pub fn external_wrench(&self) -> (&Vector3Batch<T>, &Vector3Batch<T>) {
        (&self.force, &self.torque)
    }

    /// Returns the root state of one quadrotor in the layout of [`RootStateBatch`].
    pub fn root_state(&self, env: usize) -> na::SVector<T, 13> {
        let q = self.orientation[env];
        let angular_velocity = q.transform_vector(&self.body_rate.row(env).transpose());

        let mut state = na::SVector::<T, 13>::zeros();
        state
            .fixed_rows_mut::<3>(0)
            .copy_from(&self.position.row(env).transpose());
        state
            .fixed_rows_mut::<4>(3)
            .copy_from(&na::Vector4::new(q.w, q.i, q.j, q.k));
        state
            .fixed_rows_mut::<3>(7)
            .copy_from(&self.velocity.row(env).transpose());
        state.fixed_rows_mut::<3>(10).copy_from(&angular_velocity);
        state
    }

    /// Overrides the default root state (relative to the environment origin) of one quadrotor.
    pub fn set_default_root_state(&mut self, env: usize, state: &na::SVector<T, 13>) {
        self.default_root_state
            .row_mut(env)
            .copy_from(&state.transpose());
    }

    /// Advances every quadrotor by `dt` seconds under gravity and the external wrench.
    ///
    /// Position, velocity and body rate are integrated with RK4; the orientation is then
    /// rotated by the updated body rate.
    pub fn step(&mut self, dt: T) {
        for env in 0..self.position.nrows() {
            let rotation = self.orientation[env];
            let force = self.force.row(env).transpose();
            let torque = self.torque.row(env).transpose();
            let acceleration = rotation.transform_vector(&force) / self.mass + self.gravity;

            let f = |x: na::SVector<T, 9>| -> na::SVector<T, 9> {
                let velocity = x.fixed_rows::<3>(3);
                let body_rate = x.fixed_rows::<3>(6).into_owned();
                let angular_acceleration = self.inertia_inv
                    * (torque - body_rate.cross(&(self.inertia * body_rate)));

                let mut dx = na::SVector::<T, 9>::zeros();
                dx.fixed_rows_mut::<3>(0).copy_from(&velocity);
                dx.fixed_rows_mut::<3>(3).copy_from(&acceleration);
                dx.fixed_rows_mut::<3>(6).copy_from(&angular_acceleration);
                dx
            };

            let mut x0 = na::SVector::<T, 9>::zeros();
            x0.fixed_rows_mut::<3>(0)
                .copy_from(&self.position.row(env).transpose());
            x0.fixed_rows_mut::<3>(3)
                .copy_from(&self.velocity.row(env).transpose());
            x0.fixed_rows_mut::<3>(6)
                .copy_from(&self.body_rate.row(env).transpose());
            let x = rk4_step(f, x0, dt);

            let body_rate = x.fixed_rows::<3>(6).into_owned();
            self.position
                .row_mut(env)
                .copy_from(&x.fixed_rows::<3>(0).transpose());
            self.velocity
                .row_mut(env)
                .copy_from(&x.fixed_rows::<3>(3).transpose());
            self.body_rate.row_mut(env).copy_from(&body_rate.transpose());
            self.orientation[env] = rotation * na::UnitQuaternion::from_scaled_axis(body_rate * dt);
        }
    }
}

impl<T: na::RealField + Copy> Articulation<T> for QuadrotorBatch<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_envs(&self) -> usize {
        self.position.nrows()
    }

    fn find_body(&self, name: &str) -> Option<usize> {
        (name == crate::action::BODY_NAME).then_some(0)
    }

    fn set_external_force_and_torque(
        &mut self,
        forces: &Vector3Batch<T>,
        torques: &Vector3Batch<T>,
        body_id: usize,
    ) {
        assert_eq!(body_id, 0, "Quadrotor has a single body");
        self.force.copy_from(forces);
        self.torque.copy_from(torques);
    }

    fn reset(&mut self, env_ids: &[usize]) {
        for &env in env_ids {
            self.force.row_mut(env).fill(T::zero());
            self.torque.row_mut(env).fill(T::zero());
        }
    }

    fn default_joint_state(&self, env_ids: &[usize]) -> (na::DMatrix<T>, na::DMatrix<T>) {
        (
            self.default_joint_pos.select_rows(env_ids),
            self.default_joint_vel.select_rows(env_ids),
        )
    }

    fn write_joint_state(
        &mut self,
        positions: &na::DMatrix<T>,
        velocities: &na::DMatrix<T>,
        env_ids: &[usize],
    ) {
        for (row, &env) in env_ids.iter().enumerate() {
            self.joint_pos.row_mut(env).copy_from(&positions.row(row));
            self.joint_vel.row_mut(env).copy_from(&velocities.row(row));
        }
    }

    fn default_root_state(&self, env_ids: &[usize]) -> RootStateBatch<T> {
        self.default_root_state.select_rows(env_ids)
    }

    fn env_origins(&self, env_ids: &[usize]) -> Vector3Batch<T> {
        self.env_origins.select_rows(env_ids)
    }

    fn write_root_pose(&mut self, poses: &RootPoseBatch<T>, env_ids: &[usize]) {
        for (row, &env) in env_ids.iter().enumerate() {
            self.position
                .row_mut(env)
                .copy_from(&poses.fixed_view::<1, 3>(row, 0));
            let q = na::Quaternion::new(
                poses[(row, 3)],
                poses[(row, 4)],
                poses[(row, 5)],
                poses[(row, 6)],
            );
            self.orientation[env] = na::UnitQuaternion::from_quaternion(q);
        }
    }

    fn write_root_velocity(&mut self, velocities: &RootVelocityBatch<T>, env_ids: &[usize]) {
        for (row, &env) in env_ids.iter().enumerate() {
            self.velocity
                .row_mut(env)
                .copy_from(&velocities.fixed_view::<1, 3>(row, 0));
            let angular_velocity = velocities.fixed_view::<1, 3>(row, 3).transpose();
            let body_rate = self.orientation[env].inverse_transform_vector(&angular_velocity);
            self.body_rate.row_mut(env).copy_from(&body_rate.transpose());
        }
    }
}
