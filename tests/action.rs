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

use fixtures::test_action::*;

use drone_racer::action::{ActionError, ActionTerm, ControlAction};
use drone_racer::config::{ConfigError, ControlActionConfig, ControlActionConfigBuilder};
use drone_racer::host::{NullSink, TelemetryLog};
use drone_racer::RotorBatch;

use approx::assert_relative_eq;

mod test_action_construction {
    use super::*;

    fn try_make_action(
        asset: MockArticulation,
        physics_dt: f64,
    ) -> Result<ControlAction<f64, MockArticulation, NullSink>, ActionError> {
        ControlAction::new(ControlActionConfig::default(), asset, physics_dt, NullSink)
    }

    #[test]
    fn test_new_resolves_body_and_batch() {
        let action = make_action(bypass_config());
        assert_eq!(action.num_envs(), NUM_ENVS);
        assert_eq!(action.action_dim(), 4);
        assert_eq!(action.body_id(), 1);
        assert_eq!(*action.raw_actions(), RotorBatch::zeros(NUM_ENVS));
        assert_eq!(*action.processed_actions(), RotorBatch::zeros(NUM_ENVS));
        assert!(action.elapsed_time().iter().all(|&t| t == 0.0));
        assert_eq!(action.motor().dt(), PHYSICS_DT);
        assert_eq!(action.allocation().num_envs(), NUM_ENVS);
    }

    #[test]
    fn test_new_rejects_other_asset() {
        let asset = MockArticulation::new("gate", NUM_ENVS);
        let result = try_make_action(asset, PHYSICS_DT);
        assert_eq!(
            result.err(),
            Some(ActionError::AssetNameMismatch {
                expected: "robot".to_owned(),
                found: "gate".to_owned(),
            })
        );
    }

    #[test]
    fn test_new_rejects_empty_batch() {
        let asset = MockArticulation::new("robot", 0);
        let result = try_make_action(asset, PHYSICS_DT);
        assert_eq!(result.err(), Some(ActionError::EmptyBatch("robot".to_owned())));
    }

    #[test]
    fn test_new_rejects_asset_without_body() {
        let mut asset = MockArticulation::new("robot", NUM_ENVS);
        asset.body_name = "base_link".to_owned();
        let result = try_make_action(asset, PHYSICS_DT);
        assert_eq!(
            result.err(),
            Some(ActionError::BodyNotFound {
                asset: "robot".to_owned(),
                body: "body".to_owned(),
            })
        );
    }

    #[test]
    fn test_new_rejects_invalid_timestep() {
        for dt in [0.0, -0.01, f64::INFINITY] {
            let asset = MockArticulation::new("robot", NUM_ENVS);
            let result = try_make_action(asset, dt);
            assert_eq!(result.err(), Some(ActionError::InvalidTimestep(dt)));
        }
    }

    #[test]
    fn test_rotor_model_errors_pass_through() {
        let error = ActionError::from(ConfigError::InvalidTimeConstant(2));
        assert_eq!(error, ActionError::Config(ConfigError::InvalidTimeConstant(2)));
        assert_eq!(
            error.to_string(),
            "Time constant of rotor 2 must be positive and finite"
        );
    }

    #[test]
    fn test_new_uses_configured_asset_name() {
        let config = ControlActionConfigBuilder::default()
            .asset_name("racer")
            .build()
            .unwrap();
        let asset = MockArticulation::new("racer", NUM_ENVS);
        assert!(ControlAction::<f64, _, _>::new(config, asset, PHYSICS_DT, NullSink).is_ok());
    }
}

mod test_action_processing {
    use super::*;

    /// Full throttle on every rotor yields thrust 4·k_t·ω_max² and no torque
    #[test]
    fn test_full_throttle_wrench() {
        let mut action = make_action(bypass_config());
        action.process_actions(&uniform_actions(1.0));

        let config = ControlActionConfig::default();
        let omega_max = config.omega_max();
        let expected_thrust = 4.0 * config.thrust_coeff() * omega_max * omega_max;
        for env in 0..NUM_ENVS {
            let wrench = action.processed_actions().row(env);
            assert_relative_eq!(wrench[0], expected_thrust, max_relative = 1e-12);
            assert_relative_eq!(wrench[1], 0.0, epsilon = 1e-12);
            assert_relative_eq!(wrench[2], 0.0, epsilon = 1e-12);
            assert_relative_eq!(wrench[3], 0.0, epsilon = 1e-12);
        }
    }

    /// -1 commands a standstill, 0 half the maximum speed
    #[test]
    fn test_action_to_speed_mapping() {
        let mut action = make_action(bypass_config());
        let actions = RotorBatch::from_fn(NUM_ENVS, |_, rotor| [-1.0, 0.0, 0.5, 1.0][rotor]);
        action.process_actions(&actions);

        let omega_max = ControlActionConfig::default().omega_max();
        let omega = action.motor().omega();
        for env in 0..NUM_ENVS {
            assert_eq!(omega[(env, 0)], 0.0);
            assert_eq!(omega[(env, 1)], omega_max * 0.5);
            assert_eq!(omega[(env, 2)], omega_max * 0.75);
            assert_eq!(omega[(env, 3)], omega_max);
        }
    }

    /// Out-of-range actions are clamped before anything else happens
    #[test]
    fn test_out_of_range_actions_are_clamped() {
        let mut clamped = make_action(bypass_config());
        let mut saturated = make_action(bypass_config());
        clamped.process_actions(&uniform_actions(1.0));
        saturated.process_actions(&uniform_actions(5.0));

        assert_eq!(saturated.raw_actions(), clamped.raw_actions());
        assert_eq!(saturated.processed_actions(), clamped.processed_actions());
        assert!(saturated.raw_actions().iter().all(|&a| a == 1.0));

        saturated.process_actions(&uniform_actions(-3.0));
        assert!(saturated.raw_actions().iter().all(|&a| a == -1.0));
        assert!(saturated.processed_actions().iter().all(|&w| w == 0.0));
    }

    /// Without the motor model the pipeline is a pure function of the actions
    #[test]
    fn test_bypass_is_repeatable() {
        let mut action = make_action(bypass_config());
        let actions = RotorBatch::from_fn(NUM_ENVS, |env, rotor| {
            (env as f64 - 1.5) * 0.3 + rotor as f64 * 0.1
        });

        action.process_actions(&actions);
        action.apply_actions();
        let first = action.processed_actions().clone();
        let first_torques = action.asset().torques.clone();

        action.process_actions(&actions);
        action.apply_actions();
        assert_eq!(*action.processed_actions(), first);
        assert_eq!(action.asset().torques, first_torques);
    }

    /// Every tick writes into the same buffers instead of allocating new ones
    #[test]
    fn test_ticks_reuse_buffers() {
        let mut action = make_action(motor_model_config());
        let raw = action.raw_actions().as_ptr();
        let processed = action.processed_actions().as_ptr();
        let omega = action.motor().omega().as_ptr();

        for tick in 0..10 {
            action.process_actions(&uniform_actions(0.1 * tick as f64 - 0.5));
            action.apply_actions();
            assert_eq!(action.raw_actions().as_ptr(), raw);
            assert_eq!(action.processed_actions().as_ptr(), processed);
            assert_eq!(action.motor().omega().as_ptr(), omega);
        }

        let expected = action.allocation().compute(action.motor().omega());
        assert_eq!(*action.processed_actions(), expected);
    }

    /// With the motor model the wrench lags behind the commanded actions
    #[test]
    fn test_motor_model_lags() {
        let mut action = make_action(motor_model_config());
        let hover = ControlActionConfig::default().init()[0];

        action.process_actions(&uniform_actions(1.0));
        let omega = action.motor().omega();
        assert!(omega.iter().all(|&w| w > hover && w < 5541.0));

        // Each step is bounded by the rate limit
        assert!(omega.iter().all(|&w| w - hover <= 50000.0 * PHYSICS_DT + 1e-9));
    }

    #[test]
    #[should_panic(expected = "wrong batch size")]
    fn test_batch_size_mismatch_panics() {
        let mut action = make_action(bypass_config());
        action.process_actions(&RotorBatch::zeros(NUM_ENVS + 1));
    }
}

mod test_action_application {
    use super::*;

    /// Thrust goes along the body z-axis, the torques are passed through
    #[test]
    fn test_wrench_split() {
        let mut action = make_action(bypass_config());
        let actions = RotorBatch::from_fn(NUM_ENVS, |env, rotor| {
            if rotor == env {
                0.8
            } else {
                -0.2
            }
        });
        action.process_actions(&actions);
        action.apply_actions();

        let processed = action.processed_actions().clone();
        let asset = action.asset();
        assert_eq!(asset.num_wrench_writes, 1);
        for env in 0..NUM_ENVS {
            assert_eq!(asset.forces[(env, 0)], 0.0);
            assert_eq!(asset.forces[(env, 1)], 0.0);
            assert_eq!(asset.forces[(env, 2)], processed[(env, 0)]);
            for axis in 0..3 {
                assert_eq!(asset.torques[(env, axis)], processed[(env, axis + 1)]);
            }
        }
    }

    #[test]
    fn test_elapsed_time_accumulates() {
        let mut action = make_action(bypass_config());
        for _ in 0..5 {
            action.process_actions(&uniform_actions(0.0));
            action.apply_actions();
        }
        for &t in action.elapsed_time().iter() {
            assert_relative_eq!(t, 5.0 * PHYSICS_DT, epsilon = 1e-15);
        }
    }

    /// Every tick publishes the actions, the rotor speeds and the time
    #[test]
    fn test_telemetry_channels() {
        let mut action = make_action(bypass_config());
        action.process_actions(&uniform_actions(5.0));
        action.apply_actions();

        let telemetry: &TelemetryLog<f64> = action.sink();
        assert_eq!(
            telemetry.channels().collect::<Vec<_>>(),
            ["a1", "a2", "a3", "a4", "time", "w1", "w2", "w3", "w4"]
        );
        assert_eq!(telemetry.num_records(), 9);
        assert_eq!(telemetry.latest("a2"), Some(&[1.0; NUM_ENVS][..]));
        assert_eq!(telemetry.latest("w4"), Some(&[5541.0; NUM_ENVS][..]));
        assert_eq!(telemetry.latest("time"), Some(&[PHYSICS_DT; NUM_ENVS][..]));
    }
}

mod test_action_reset {
    use super::*;

    fn run_ticks(action: &mut TestAction, ticks: usize) {
        for _ in 0..ticks {
            action.process_actions(&uniform_actions(0.7));
            action.apply_actions();
        }
    }

    #[test]
    fn test_reset_all_restores_initial_state() {
        let mut action = make_action(motor_model_config());
        let initial_omega = action.motor().omega().clone();
        run_ticks(&mut action, 10);

        action.reset(None);
        assert_eq!(*action.raw_actions(), RotorBatch::zeros(NUM_ENVS));
        assert_eq!(*action.processed_actions(), RotorBatch::zeros(NUM_ENVS));
        assert!(action.elapsed_time().iter().all(|&t| t == 0.0));
        assert_eq!(*action.motor().omega(), initial_omega);

        let asset = action.asset();
        assert_eq!(asset.reset_calls, vec![vec![0, 1, 2, 3]]);
        assert!(asset.joint_pos.iter().all(|&q| q == 0.5));
        assert!(asset.joint_vel.iter().all(|&q| q == -0.5));
    }

    /// A list covering the whole batch is the same as resetting everything
    #[test]
    fn test_reset_none_equals_reset_all_indices() {
        let mut by_none = make_action(motor_model_config());
        let mut by_list = make_action(motor_model_config());
        run_ticks(&mut by_none, 7);
        run_ticks(&mut by_list, 7);

        by_none.reset(None);
        by_list.reset(Some(&[3, 2, 1, 0][..]));
        assert_eq!(by_none.raw_actions(), by_list.raw_actions());
        assert_eq!(by_none.processed_actions(), by_list.processed_actions());
        assert_eq!(by_none.elapsed_time(), by_list.elapsed_time());
        assert_eq!(by_none.motor().omega(), by_list.motor().omega());
        assert_eq!(by_list.asset().reset_calls, vec![vec![0, 1, 2, 3]]);
    }

    /// Environments outside the reset set keep their exact state
    #[test]
    fn test_reset_subset_leaves_others_untouched() {
        let mut action = make_action(motor_model_config());
        let initial_omega = action.motor().omega().clone();
        run_ticks(&mut action, 10);

        let raw = action.raw_actions().clone();
        let processed = action.processed_actions().clone();
        let time = action.elapsed_time().clone();
        let omega = action.motor().omega().clone();

        action.reset(Some(&[2][..]));
        for env in [0, 1, 3] {
            assert_eq!(action.raw_actions().row(env), raw.row(env));
            assert_eq!(action.processed_actions().row(env), processed.row(env));
            assert_eq!(action.elapsed_time()[env].to_bits(), time[env].to_bits());
            assert_eq!(action.motor().omega().row(env), omega.row(env));
            assert!(action.asset().joint_pos.row(env).iter().all(|&q| q == 7.0));
        }
        assert!(action.raw_actions().row(2).iter().all(|&a| a == 0.0));
        assert!(action.processed_actions().row(2).iter().all(|&w| w == 0.0));
        assert_eq!(action.elapsed_time()[2], 0.0);
        assert_eq!(action.motor().omega().row(2), initial_omega.row(2));
        assert!(action.asset().joint_pos.row(2).iter().all(|&q| q == 0.5));
        assert_eq!(action.asset().reset_calls, vec![vec![2]]);
    }

    /// Root state is left alone unless the configuration asks for it
    #[test]
    fn test_root_state_untouched_by_default() {
        let mut action = make_action(bypass_config());
        run_ticks(&mut action, 2);
        action.reset(None);

        let asset = action.asset();
        assert!(asset.root_pose_writes.is_empty());
        assert!(asset.root_velocity_writes.is_empty());
        assert!(asset.root_pose.iter().all(|&x| x == 9.0));
    }

    #[test]
    fn test_root_state_resync_when_enabled() {
        let config = ControlActionConfigBuilder::default()
            .reset_root_state(true)
            .build()
            .unwrap();
        let mut action = make_action(config);
        run_ticks(&mut action, 2);
        action.reset(Some(&[1, 3][..]));

        let asset = action.asset();
        assert_eq!(asset.root_pose_writes, vec![vec![1, 3]]);
        assert_eq!(asset.root_velocity_writes, vec![vec![1, 3]]);

        // Default pose is one meter above the environment origin, level
        for env in [1, 3] {
            let pose = asset.root_pose.row(env);
            assert_eq!(pose[0], env as f64 * 10.0);
            assert_eq!(pose[1], 0.0);
            assert_eq!(pose[2], 1.0);
            assert_eq!(pose[3], 1.0);
            assert!(asset.root_velocity.row(env).iter().all(|&v| v == 0.0));
        }
        for env in [0, 2] {
            assert!(asset.root_pose.row(env).iter().all(|&x| x == 9.0));
        }
    }

    /// After a reset the next tick starts from the initial rotor speeds again
    #[test]
    fn test_tick_after_reset_matches_fresh_start() {
        let mut fresh = make_action(motor_model_config());
        let mut reused = make_action(motor_model_config());
        run_ticks(&mut reused, 25);
        reused.reset(None);

        run_ticks(&mut fresh, 1);
        run_ticks(&mut reused, 1);
        assert_eq!(fresh.processed_actions(), reused.processed_actions());
        assert_eq!(fresh.elapsed_time(), reused.elapsed_time());
    }
}
