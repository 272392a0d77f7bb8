// Control allocation from rotor speeds to collective thrust and body torque
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

use core::f64::consts::FRAC_1_SQRT_2;

use nalgebra as na;

use crate::RotorBatch;

/// Direction in which a rotor spins, seen from above the airframe.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Spin {
    /// Clockwise rotors push the airframe to yaw counter-clockwise.
    Clockwise,
    /// Counter-clockwise rotors push the airframe to yaw clockwise.
    CounterClockwise,
}

impl Spin {
    /// Sign of the yaw reaction torque about the body z-axis (pointing up).
    pub fn reaction_sign(&self) -> f64 {
        match self {
            Spin::Clockwise => 1.0,
            Spin::CounterClockwise => -1.0,
        }
    }
}

/// Position and spin direction of a single rotor.
///
/// `direction` is the unit vector from the center of mass to the rotor hub, in the body x-y
/// plane (x forward, y left).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotorPlacement {
    /// Unit arm direction `[x, y]`.
    pub direction: [f64; 2],
    /// Spin direction of the rotor.
    pub spin: Spin,
}

/// Arrangement of the four rotors of a quadrotor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FrameLayout {
    /// Quadrotor "x" configuration
    /// ```text
    ///     front
    ///  R2       R0
    ///    \     /
    ///       +
    ///    /     \
    ///  R1       R3
    /// ```
    /// where `R0` (front-right) and `R1` (rear-left) spin CCW, `R2` (front-left) and `R3`
    /// (rear-right) spin CW.
    #[default]
    QuadX,
    /// Quadrotor "+" configuration
    /// ```text
    ///     front
    ///       R0
    ///       |
    /// R2 ---+--- R3
    ///       |
    ///       R1
    /// ```
    /// where `R0` (front) and `R1` (rear) spin CCW, `R2` (left) and `R3` (right) spin CW.
    QuadPlus,
}

impl FrameLayout {
    /// Returns the placement of each rotor, in rotor order.
    pub fn rotors(&self) -> [RotorPlacement; 4] {
        use Spin::{Clockwise as Cw, CounterClockwise as Ccw};

        let place = |direction, spin| RotorPlacement { direction, spin };
        let d = FRAC_1_SQRT_2;
        match self {
            FrameLayout::QuadX => [
                place([d, -d], Ccw),
                place([-d, d], Ccw),
                place([d, d], Cw),
                place([-d, -d], Cw),
            ],
            FrameLayout::QuadPlus => [
                place([1.0, 0.0], Ccw),
                place([-1.0, 0.0], Ccw),
                place([0.0, 1.0], Cw),
                place([0.0, -1.0], Cw),
            ],
        }
    }
}

/// Stateless batched control allocation.
///
/// Each rotor produces a thrust `k_t·ω²` along the body z-axis and a reaction torque `k_d·ω²`
/// about it. The mixing matrix sums these into the body wrench:
///
/// ```text
/// ┌    ┐   ┌                              ┐┌     ┐
/// │ T  │   │  k_t      k_t     ...        ││ ω₀² │
/// │ τx │ = │  k_t·l·y₀ k_t·l·y₁ ...       ││ ω₁² │
/// │ τy │   │ -k_t·l·x₀ -k_t·l·x₁ ...      ││ ω₂² │
/// │ τz │   │  k_d·s₀   k_d·s₁   ...       ││ ω₃² │
/// └    ┘   └                              ┘└     ┘
/// ```
///
/// where `(xᵢ, yᵢ)` is the unit arm direction of rotor `i`, `l` the arm length and `sᵢ` its
/// reaction torque sign.
#[derive(Clone, Debug)]
pub struct Allocation<T: na::RealField + Copy> {
    num_envs: usize,
    arm_length: T,
    thrust_coeff: T,
    drag_coeff: T,
    layout: FrameLayout,
    mixing: na::Matrix4<T>,
}

impl<T: na::RealField + Copy> Allocation<T> {
    /// Creates the allocation for a batch of `num_envs` identical airframes.
    ///
    /// # Arguments
    /// - `arm_length`: Distance from the center of mass to each rotor hub in meters.
    /// - `thrust_coeff`: Thrust per squared angular velocity, in N·s².
    /// - `drag_coeff`: Reaction torque per squared angular velocity, in N·m·s².
    /// - `layout`: Placement and spin direction of the rotors.
    pub fn new(
        num_envs: usize,
        arm_length: f64,
        thrust_coeff: f64,
        drag_coeff: f64,
        layout: FrameLayout,
    ) -> Self {
        let mut mixing = na::Matrix4::<f64>::zeros();
        for (i, rotor) in layout.rotors().iter().enumerate() {
            let [x, y] = rotor.direction;
            mixing[(0, i)] = thrust_coeff;
            mixing[(1, i)] = thrust_coeff * arm_length * y;
            mixing[(2, i)] = -thrust_coeff * arm_length * x;
            mixing[(3, i)] = drag_coeff * rotor.spin.reaction_sign();
        }

        Self {
            num_envs,
            arm_length: na::convert(arm_length),
            thrust_coeff: na::convert(thrust_coeff),
            drag_coeff: na::convert(drag_coeff),
            layout,
            mixing: mixing.map(na::convert),
        }
    }

    /// Returns the number of environments in the batch.
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Returns the arm length.
    pub fn arm_length(&self) -> T {
        self.arm_length
    }

    /// Returns the thrust coefficient.
    pub fn thrust_coeff(&self) -> T {
        self.thrust_coeff
    }

    /// Returns the drag (reaction torque) coefficient.
    pub fn drag_coeff(&self) -> T {
        self.drag_coeff
    }

    /// Returns the rotor arrangement.
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Returns the matrix mapping squared rotor speeds to `[thrust, τx, τy, τz]`.
    pub fn mixing_matrix(&self) -> &na::Matrix4<T> {
        &self.mixing
    }

    /// Maps rotor angular velocities to the body wrench of every environment.
    ///
    /// The returned columns are `[thrust, torque_x, torque_y, torque_z]`. No saturation is
    /// applied.
    ///
    /// # Panics
    /// If `omega` does not have one row per environment.
    pub fn compute(&self, omega: &RotorBatch<T>) -> RotorBatch<T> {
        let mut wrench = RotorBatch::zeros(self.num_envs);
        self.compute_into(omega, &mut wrench);
        wrench
    }

    /// Like [`compute`](Self::compute), but overwrites `wrench` instead of allocating.
    ///
    /// # Panics
    /// If `omega` or `wrench` does not have one row per environment.
    pub fn compute_into(&self, omega: &RotorBatch<T>, wrench: &mut RotorBatch<T>) {
        assert_eq!(
            omega.nrows(),
            self.num_envs,
            "Rotor speeds have the wrong batch size"
        );
        assert_eq!(
            wrench.nrows(),
            self.num_envs,
            "Wrench buffer has the wrong batch size"
        );

        // Static-size products keep the summation order fixed regardless of the batch size
        for (omega, mut out) in omega.row_iter().zip(wrench.row_iter_mut()) {
            let omega = omega.transpose();
            let squared = omega.component_mul(&omega);
            out.copy_from(&(self.mixing * squared).transpose());
        }
    }
}
