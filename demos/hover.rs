//! Altitude hold for a batch of quadrotors driven through the rotor-speed action term.
//! This example requires the `--features simulation` flag to be enabled.
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

#[cfg(feature = "simulation")]
mod simulation {
    use drone_racer::action::{ActionTerm, ControlAction};
    use drone_racer::config::{ControlActionConfig, ControlActionConfigBuilder};
    use drone_racer::host::TelemetryLog;
    use drone_racer::sim::QuadrotorBatch;
    use drone_racer::RotorBatch;
    use nalgebra as na;

    pub const NUM_ENVS: usize = 16;
    pub const PHYSICS_DT: f64 = 0.002;
    pub const NUM_STEPS: usize = 3000;
    pub const EPISODE_LENGTH: usize = 1000;
    const MASS: f64 = 0.8702;
    const GRAVITY: f64 = 9.81;
    const SPAWN_HEIGHT: f64 = 1.0;

    pub type HoverAction = ControlAction<f64, QuadrotorBatch<f64>, TelemetryLog<f64>>;

    /// Proportional-derivative altitude controller that outputs the same normalized action for
    /// every rotor.
    pub struct AltitudeController {
        pub kp: f64,
        pub kd: f64,
        pub thrust_coeff: f64,
        pub omega_max: f64,
    }

    impl AltitudeController {
        pub fn compute(&self, altitude: f64, climb_rate: f64, target: f64) -> f64 {
            let acceleration = self.kp * (target - altitude) - self.kd * climb_rate;
            let thrust = (MASS * (GRAVITY + acceleration)).max(0.0);
            let omega = (thrust / (4.0 * self.thrust_coeff)).sqrt();
            2.0 * omega / self.omega_max - 1.0
        }
    }

    pub fn make_action() -> HoverAction {
        let config = ControlActionConfigBuilder::default()
            .use_motor_model(true)
            .taus([0.02; 4])
            .init([hover_speed(&ControlActionConfig::default()); 4])
            .reset_root_state(true)
            .build()
            .expect("Invalid action configuration");

        let inertia = na::Matrix3::from_diagonal(&na::Vector3::new(4.9e-3, 4.9e-3, 8.8e-3));
        let quads = QuadrotorBatch::new("robot", NUM_ENVS, MASS, inertia, 2.0, SPAWN_HEIGHT)
            .expect("Inertia matrix must be invertible");
        ControlAction::new(config, quads, PHYSICS_DT, TelemetryLog::new())
            .expect("Failed to create control action")
    }

    /// Rotor speed at which the rotors carry the weight of the drone
    pub fn hover_speed(config: &ControlActionConfig) -> f64 {
        (MASS * GRAVITY / (4.0 * config.thrust_coeff())).sqrt()
    }

    /// Altitude targets are staggered so that every environment does something different
    pub fn altitude_target(env: usize) -> f64 {
        0.5 + 0.1 * env as f64
    }

    pub fn run_simulation(mut action: HoverAction) {
        let controller = AltitudeController {
            kp: 8.0,
            kd: 4.0,
            thrust_coeff: action.config().thrust_coeff(),
            omega_max: action.config().omega_max(),
        };
        let mut actions = RotorBatch::zeros(NUM_ENVS);

        println!("step  time[s]  mean |z err|[m]  worst env  mean w1[rad/s]");
        for step in 1..=NUM_STEPS {
            let quads = action.asset();
            for env in 0..NUM_ENVS {
                let command = controller.compute(
                    quads.positions()[(env, 2)],
                    quads.velocities()[(env, 2)],
                    altitude_target(env),
                );
                actions.row_mut(env).fill(command);
            }

            action.process_actions(&actions);
            action.apply_actions();
            action.asset_mut().step(PHYSICS_DT);

            if step % 250 == 0 {
                print_summary(&action, step);
            }

            // Even environments end their episode periodically, odd ones run to the end
            if step % EPISODE_LENGTH == 0 {
                let even: Vec<usize> = (0..NUM_ENVS).step_by(2).collect();
                action.reset(Some(&even[..]));
                println!("Reset environments {even:?} on step {step}");
            }
        }
    }

    fn print_summary(action: &HoverAction, step: usize) {
        let quads = action.asset();
        let errors: Vec<f64> = (0..NUM_ENVS)
            .map(|env| (quads.positions()[(env, 2)] - altitude_target(env)).abs())
            .collect();
        let mean_error = errors.iter().sum::<f64>() / NUM_ENVS as f64;
        let worst = errors
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(env, _)| env);
        let mean_w1 = action
            .sink()
            .latest("w1")
            .map_or(f64::NAN, |w| w.iter().sum::<f64>() / w.len() as f64);

        println!(
            "{step:>4}  {:>7.3}  {mean_error:>15.4}  {worst:>9}  {mean_w1:>14.1}",
            step as f64 * PHYSICS_DT
        );
    }
}

#[cfg(feature = "simulation")]
pub fn main() {
    let action = simulation::make_action();
    simulation::run_simulation(action);
}

#[cfg(not(feature = "simulation"))]
fn main() {
    eprintln!("This example requires `--features simulation` to run.");
}
