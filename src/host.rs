// Interfaces to the simulation host: articulated assets and telemetry sinks
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

use std::collections::BTreeMap;
use std::fmt::Debug;

use nalgebra as na;

use crate::Vector3Batch;

/// Root state of every environment: position (3), orientation quaternion `[w, x, y, z]` (4),
/// linear velocity (3) and angular velocity (3), all in the world frame.
pub type RootStateBatch<T> = na::OMatrix<T, na::Dyn, na::Const<13>>;

/// Root pose of every environment: position (3) and orientation quaternion `[w, x, y, z]` (4).
pub type RootPoseBatch<T> = na::OMatrix<T, na::Dyn, na::Const<7>>;

/// Root velocity of every environment: linear (3) and angular (3), in the world frame.
pub type RootVelocityBatch<T> = na::OMatrix<T, na::Dyn, na::Const<6>>;

/// A batch of articulated assets managed by the physics engine, one instance per environment.
///
/// Every write addresses the rows of the environments listed in `env_ids`, in order; the
/// matrices passed in have exactly one row per listed environment.
pub trait Articulation<T: na::RealField + Copy> {
    /// Name under which the asset is registered in the scene.
    fn name(&self) -> &str;

    /// Number of environments in the batch.
    fn num_envs(&self) -> usize;

    /// Looks up the index of a rigid body of the asset.
    fn find_body(&self, name: &str) -> Option<usize>;

    /// Sets the external force and torque applied to `body_id` of every environment on the next
    /// physics step, expressed in the body frame.
    fn set_external_force_and_torque(
        &mut self,
        forces: &Vector3Batch<T>,
        torques: &Vector3Batch<T>,
        body_id: usize,
    );

    /// Clears internal buffers (such as external wrenches) of the given environments.
    fn reset(&mut self, env_ids: &[usize]);

    /// Returns the default joint positions and velocities of the given environments.
    fn default_joint_state(&self, env_ids: &[usize]) -> (na::DMatrix<T>, na::DMatrix<T>);

    /// Writes joint positions and velocities of the given environments into the simulation.
    fn write_joint_state(
        &mut self,
        positions: &na::DMatrix<T>,
        velocities: &na::DMatrix<T>,
        env_ids: &[usize],
    );

    /// Returns the default root state of the given environments, relative to their origins.
    fn default_root_state(&self, env_ids: &[usize]) -> RootStateBatch<T>;

    /// Returns the world-frame origins of the given environments.
    fn env_origins(&self, env_ids: &[usize]) -> Vector3Batch<T>;

    /// Writes root poses of the given environments into the simulation.
    fn write_root_pose(&mut self, poses: &RootPoseBatch<T>, env_ids: &[usize]);

    /// Writes root velocities of the given environments into the simulation.
    fn write_root_velocity(&mut self, velocities: &RootVelocityBatch<T>, env_ids: &[usize]);
}

/// A consumer of named telemetry channels, each carrying one value per environment.
///
/// Telemetry is purely observational; nothing recorded here feeds back into control.
pub trait TelemetrySink<T> {
    /// Records the latest values of `channel`.
    fn record(&mut self, channel: &str, values: &[T]);
}

impl<T, S: TelemetrySink<T> + ?Sized> TelemetrySink<T> for &mut S {
    fn record(&mut self, channel: &str, values: &[T]) {
        (**self).record(channel, values);
    }
}

/// Discards all telemetry.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl<T> TelemetrySink<T> for NullSink {
    fn record(&mut self, _channel: &str, _values: &[T]) {}
}

/// Forwards telemetry to the `log` facade at trace level.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogSink;

impl<T: Debug> TelemetrySink<T> for LogSink {
    fn record(&mut self, channel: &str, values: &[T]) {
        log::trace!(target: "drone_racer::telemetry", "{channel}: {values:?}");
    }
}

/// Keeps the latest values of every channel in memory.
#[derive(Clone, Debug)]
pub struct TelemetryLog<T> {
    channels: BTreeMap<String, Vec<T>>,
    num_records: usize,
}

impl<T> Default for TelemetryLog<T> {
    fn default() -> Self {
        Self {
            channels: BTreeMap::new(),
            num_records: 0,
        }
    }
}

impl<T> TelemetryLog<T> {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest values of `channel`, if it was ever recorded.
    pub fn latest(&self, channel: &str) -> Option<&[T]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Returns the names of all recorded channels, in lexicographic order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Returns the total number of `record` calls.
    pub fn num_records(&self) -> usize {
        self.num_records
    }
}

impl<T: Clone> TelemetrySink<T> for TelemetryLog<T> {
    fn record(&mut self, channel: &str, values: &[T]) {
        let entry = self.channels.entry(channel.to_owned()).or_default();
        entry.clear();
        entry.extend_from_slice(values);
        self.num_records += 1;
    }
}

/// Records every column of `values` as its own channel, named after `channels`.
///
/// Columns are handed out as slices of the column-major storage, so nothing is copied.
pub(crate) fn record_columns<T, C, S, K>(
    sink: &mut K,
    channels: &[&str],
    values: &na::Matrix<T, na::Dyn, C, S>,
) where
    T: na::RealField + Copy,
    C: na::Dim,
    S: na::RawStorage<T, na::Dyn, C> + na::IsContiguous,
    K: TelemetrySink<T> + ?Sized,
{
    debug_assert_eq!(channels.len(), values.ncols());
    let num_rows = values.nrows().max(1);
    for (channel, column) in channels.iter().zip(values.as_slice().chunks_exact(num_rows)) {
        sink.record(channel, column);
    }
}
