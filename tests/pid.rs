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

use fixtures::test_loop::{make_loop, make_stateful_loop, secs};

use approx::assert_relative_eq;
use pid_control_loop::pid::{ControlOutput, LoopStatus};

mod test_bootstrap {
    use super::*;

    #[test]
    fn test_first_sample_seeds_state() {
        let (pid, ctx) = make_loop();
        assert!(!ctx.is_initialized());

        let (output, ctx) = pid.update(ctx, 50.0, secs(0));

        assert!(ctx.is_initialized());
        assert_eq!(ctx.last_time(), Some(secs(0)));
        assert_eq!(output.status, LoopStatus::Starting);
        assert_eq!(output.smoothed_value, 50.0);
        assert_eq!(output.integral, 0.0);
        assert_eq!(output.derivative, 0.0);
        assert_eq!(output.proportional, 0.0);
        assert_eq!(output.power, 0.5);
        assert_eq!(ctx.last_power(), 0.5);
    }

    #[test]
    fn test_first_sample_ignores_timestamp() {
        // Any timestamp is acceptable for the first sample, however far from zero
        let (pid, ctx) = make_loop();
        let (output, ctx) = pid.update(ctx, 50.0, secs(1_000_000_000));
        assert_eq!(output.status, LoopStatus::Starting);
        assert_eq!(output.derivative, 0.0);
        assert_eq!(ctx.last_time(), Some(secs(1_000_000_000)));
    }

    #[test]
    fn test_seeded_power_matches_integral_default() {
        for integral_default in [0.0, 0.2, 0.5, 0.8, 1.0] {
            let (mut pid, ctx) = make_loop();
            pid.params_mut().set_integral_default(integral_default);

            let (output, _) = pid.update(ctx, 50.0, secs(0));

            assert_relative_eq!(output.integral, (0.5 - integral_default) * 10.0);
            assert_relative_eq!(output.power, integral_default, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bad_first_sample_does_not_seed() {
        let (pid, ctx) = make_loop();

        let (output, ctx) = pid.update(ctx, f64::NAN, secs(0));
        assert!(!ctx.is_initialized());
        assert_eq!(output.status, LoopStatus::BadPv);
        assert_eq!(output.power, 0.0);

        let (output, ctx) = pid.update(ctx, 48.0, secs(1));
        assert_eq!(output.status, LoopStatus::Starting);
        assert_eq!(ctx.smoothed_value(), 48.0);
    }
}

mod test_fail_safe {
    use super::*;

    const BAD_PVS: [f64; 3] = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY];

    #[test]
    fn test_bad_pv_yields_disabled_output() {
        for proportional_band in [0.0, 10.0] {
            for enabled in [true, false] {
                let (mut pid, ctx) = make_loop();
                pid.params_mut().set_proportional_band(proportional_band);
                pid.params_mut().set_enabled(enabled);
                pid.params_mut().set_disabled_output(0.25);

                let (_, mut ctx) = pid.update(ctx, 20.0, secs(0));
                for (i, pv) in BAD_PVS.into_iter().enumerate() {
                    let output: ControlOutput<f64>;
                    (output, ctx) = pid.update(ctx, pv, secs(5 * (i as u64 + 1)));
                    assert_eq!(output.power, 0.25);
                    assert_eq!(output.status, LoopStatus::BadPv);
                }
            }
        }
    }

    #[test]
    fn test_bad_pv_leaves_state_alone() {
        let (pid, ctx) = make_loop();
        let (_, ctx) = pid.update(ctx, 51.0, secs(0));
        let (_, before) = pid.update(ctx, 51.0, secs(5));

        let (_, after) = pid.update(before, f64::NAN, secs(10));

        assert_eq!(after.integral(), before.integral());
        assert_eq!(after.smoothed_value(), before.smoothed_value());
        assert_eq!(after.last_time(), before.last_time());
    }

    #[test]
    fn test_disabled_loop_emits_disabled_output() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_enabled(false);
        pid.params_mut().set_derivative_time(10.0);
        pid.params_mut().set_disabled_output(0.3);

        let (output, ctx) = pid.update(ctx, 50.0, secs(0));
        assert_eq!(output.status, LoopStatus::Disabled);
        assert_eq!(output.power, 0.3);

        let (output, ctx) = pid.update(ctx, 60.0, secs(5));
        assert_eq!(output.status, LoopStatus::Disabled);
        assert_eq!(output.power, 0.3);

        // Derivative bookkeeping continues but the integral is locked
        assert_eq!(output.smoothed_value, 60.0);
        assert_eq!(output.derivative, 20.0);
        assert_eq!(output.integral, 0.0);
        assert_eq!(ctx.last_status(), Some(LoopStatus::Disabled));
    }

    #[test]
    fn test_nan_parameters_yield_disabled_output() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_disabled_output(0.4);
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));

        pid.params_mut().set_setpoint(f64::NAN);
        let (output, ctx) = pid.update(ctx, 50.0, secs(5));
        assert_eq!(output.power, 0.4);
        assert_eq!(output.status, LoopStatus::BadParams);

        pid.params_mut().set_setpoint(50.0);
        pid.params_mut().set_proportional_band(f64::NAN);
        let (output, ctx) = pid.update(ctx, 50.0, secs(10));
        assert_eq!(output.power, 0.4);
        assert_eq!(output.status, LoopStatus::BadParams);

        pid.params_mut().set_proportional_band(10.0);
        let (output, _) = pid.update(ctx, 50.0, secs(15));
        assert_eq!(output.status, LoopStatus::Running);
        assert_eq!(output.power, 0.5);
    }

    #[test]
    fn test_disabled_output_is_clamped() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_enabled(false);

        pid.params_mut().set_disabled_output(1.7);
        let (output, ctx) = pid.update(ctx, 50.0, secs(0));
        assert_eq!(output.power, 1.0);

        pid.params_mut().set_disabled_output(-0.5);
        let (output, _) = pid.update(ctx, 50.0, secs(5));
        assert_eq!(output.power, 0.0);
    }

    #[test]
    fn test_power_and_integral_stay_bounded() {
        const PVS: [f64; 9] = [
            20.0,
            49.9,
            50.0,
            50.1,
            80.0,
            f64::NAN,
            f64::INFINITY,
            1e9,
            -1e9,
        ];
        const STEPS_S: [u64; 5] = [0, 1, 5, 45, 2];

        for proportional_band in [0.0, 0.5, 10.0, 100.0] {
            for integral_time in [-1.0, 0.0, 60.0] {
                for derivative_time in [0.0, 30.0] {
                    for smoothing_factor in [0.0, 3.0] {
                        let (mut pid, mut ctx) = make_loop();
                        let params = pid.params_mut();
                        params.set_proportional_band(proportional_band);
                        params.set_integral_time(integral_time);
                        params.set_derivative_time(derivative_time);
                        params.set_smoothing_factor(smoothing_factor);

                        let mut now = 0;
                        for k in 0..100 {
                            let output: ControlOutput<f64>;
                            now += STEPS_S[k % STEPS_S.len()];
                            (output, ctx) = pid.update(ctx, PVS[k % PVS.len()], secs(now));

                            assert!((0.0..=1.0).contains(&output.power));
                            assert!(output.integral.abs() <= proportional_band / 2.0);
                        }
                    }
                }
            }
        }
    }
}

mod test_integral {
    use super::*;

    use crate::fixtures::test_loop::example_config;
    use pid_control_loop::params::LoopParams;
    use pid_control_loop::pid::{FuncPidControlLoop, LoopContext};
    use pid_control_loop::time::TimeF64;

    #[test]
    fn test_integral_locks_on_band_edge() {
        // |error + integral| == pb / 2 counts as saturated
        let (pid, ctx) = make_loop();
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));

        let (output, _) = pid.update(ctx, 55.0, secs(5));

        assert_eq!(output.status, LoopStatus::IntegralLocked);
        assert_eq!(output.proportional, 5.0);
        assert_eq!(output.integral, 0.0);
        assert_eq!(output.power, 0.0);
    }

    #[test]
    fn test_integral_unlocked_inside_band() {
        let (pid, ctx) = make_loop();
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));

        let (output, _) = pid.update(ctx, 54.9, secs(5));

        assert_eq!(output.status, LoopStatus::Running);
        assert_relative_eq!(output.integral, 4.9 * 5.0 / 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_integral_accumulates_over_interval() {
        let (pid, mut ctx) = make_loop();
        (_, ctx) = pid.update(ctx, 50.0, secs(0));

        let mut integrals = vec![];
        for i in 1..=3 {
            let output: ControlOutput<f64>;
            (output, ctx) = pid.update(ctx, 51.0, secs(5 * i));
            integrals.push(output.integral);
        }

        assert_relative_eq!(integrals[0], 5.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(integrals[2], 15.0 / 60.0, epsilon = 1e-12);
        assert!(integrals.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_repeated_timestamp_is_not_applied_twice() {
        let (pid, ctx) = make_loop();
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));
        let (first, ctx) = pid.update(ctx, 51.0, secs(5));

        let (second, _) = pid.update(ctx, 51.0, secs(5));

        assert_eq!(second.status, LoopStatus::StaleInterval);
        assert_eq!(second.integral, first.integral);
        assert_eq!(second.derivative, 0.0);
    }

    #[test]
    fn test_stale_interval_freezes_integral() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_derivative_time(10.0);
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));
        let (before, ctx) = pid.update(ctx, 51.0, secs(5));
        assert_ne!(before.derivative, 0.0);

        // 35s exceeds the 30s max interval
        let (output, ctx) = pid.update(ctx, 53.0, secs(40));
        assert_eq!(output.status, LoopStatus::StaleInterval);
        assert_eq!(output.derivative, 0.0);
        assert_eq!(output.integral, before.integral);
        assert_eq!(output.smoothed_value, before.smoothed_value);

        // The stale sample still restarts interval timing
        let (output, _) = pid.update(ctx, 53.0, secs(45));
        assert_eq!(output.status, LoopStatus::Running);
        assert_eq!(output.smoothed_value, 53.0);
        assert_relative_eq!(output.integral, before.integral + 3.0 * 5.0 / 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_backwards_timestamp_is_stale() {
        let (pid, ctx) = make_loop();
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));
        let (before, ctx) = pid.update(ctx, 51.0, secs(5));

        let (output, _) = pid.update(ctx, 52.0, secs(3));

        assert_eq!(output.status, LoopStatus::StaleInterval);
        assert_eq!(output.integral, before.integral);
    }

    #[test]
    fn test_degenerate_integral_time_snaps_to_rail() {
        for integral_time in [0.0, -1.0] {
            let (mut pid, ctx) = make_loop();
            pid.params_mut().set_integral_time(integral_time);
            let (_, ctx) = pid.update(ctx, 50.0, secs(0));

            let (output, ctx) = pid.update(ctx, 51.0, secs(5));
            assert_eq!(output.integral, 5.0);

            // |-1 + 5| < 5, so the integral is free to swing to the other rail
            let (output, _) = pid.update(ctx, 49.0, secs(10));
            assert_eq!(output.integral, -5.0);
        }
    }

    #[test]
    fn test_degenerate_integral_time_on_setpoint_centres_integral() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_integral_time(0.0);
        pid.params_mut().set_integral_default(0.6);
        let (seeded, ctx) = pid.update(ctx, 50.0, secs(0));
        assert_relative_eq!(seeded.integral, -1.0, epsilon = 1e-12);

        let (output, _) = pid.update(ctx, 50.0, secs(5));

        assert_eq!(output.status, LoopStatus::Running);
        assert_eq!(output.integral, 0.0);
        assert_eq!(output.power, 0.5);
    }

    #[test]
    fn test_narrowed_band_clamps_integral() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_integral_time(0.0);
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));
        let (output, ctx) = pid.update(ctx, 51.0, secs(5));
        assert_eq!(output.integral, 5.0);

        pid.params_mut().set_proportional_band(4.0);
        let (output, _) = pid.update(ctx, 51.0, secs(10));

        assert_eq!(output.status, LoopStatus::IntegralLocked);
        assert_eq!(output.integral, 2.0);
        assert_eq!(output.power, 0.0);
    }

    #[test]
    fn test_narrowed_band_clamps_integral_on_stale_sample() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_integral_time(0.0);
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));
        let (output, ctx) = pid.update(ctx, 51.0, secs(5));
        assert_eq!(output.integral, 5.0);

        // A stale sample freezes the integral, but never outside the new band
        pid.params_mut().set_proportional_band(4.0);
        let (output, ctx) = pid.update(ctx, 51.0, secs(40));

        assert_eq!(output.status, LoopStatus::StaleInterval);
        assert_eq!(output.integral, 2.0);
        assert_eq!(ctx.integral(), 2.0);
    }

    fn make_float_time_loop() -> (FuncPidControlLoop<f64>, LoopContext<TimeF64, f64>) {
        let pid = FuncPidControlLoop::new(LoopParams::from_config(&example_config()));
        (pid, LoopContext::new_uninit())
    }

    #[test]
    fn test_unusable_timestamp_is_stale_and_not_recorded() {
        let (pid, ctx) = make_float_time_loop();
        let (_, ctx) = pid.update(ctx, 50.0, TimeF64(0.0));

        for bad_time in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let (output, next) = pid.update(ctx, 49.0, TimeF64(bad_time));
            assert_eq!(output.status, LoopStatus::StaleInterval);
            assert_eq!(output.smoothed_value, 50.0);
            assert_eq!(output.derivative, 0.0);
            assert_eq!(output.integral, 0.0);
            assert_eq!(next.last_time(), Some(TimeF64(0.0)));
        }

        // The next good sample is measured against the last good one
        let (_, ctx) = pid.update(ctx, 49.0, TimeF64(f64::NAN));
        let (output, ctx) = pid.update(ctx, 49.0, TimeF64(5.0));
        assert_eq!(output.status, LoopStatus::Running);
        assert_eq!(output.smoothed_value, 49.0);
        assert_relative_eq!(output.integral, -5.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(output.power, 0.5 + (1.0 + 5.0 / 60.0) / 10.0, epsilon = 1e-12);

        let (output, _) = pid.update(ctx, 49.0, TimeF64(10.0));
        assert_eq!(output.status, LoopStatus::Running);
        assert_relative_eq!(output.integral, -10.0 / 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unusable_first_timestamp_does_not_seed() {
        let (pid, ctx) = make_float_time_loop();

        let (output, ctx) = pid.update(ctx, 50.0, TimeF64(f64::NAN));
        assert_eq!(output.status, LoopStatus::StaleInterval);
        assert_eq!(output.power, 0.0);
        assert!(!ctx.is_initialized());

        let (output, ctx) = pid.update(ctx, 50.0, TimeF64(1.0));
        assert_eq!(output.status, LoopStatus::Starting);
        assert_eq!(output.power, 0.5);
        assert_eq!(ctx.last_time(), Some(TimeF64(1.0)));
    }
}

mod test_derivative {
    use super::*;

    #[test]
    fn test_unsmoothed_derivative() {
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_derivative_time(10.0);
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));

        let (output, _) = pid.update(ctx, 52.0, secs(5));

        assert_eq!(output.smoothed_value, 52.0);
        assert_eq!(output.derivative, 4.0);
    }

    #[test]
    fn test_smoothed_derivative() {
        // ts = max(60 / 3, 5) = 20, so the baseline moves a quarter of the way to the sample
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_derivative_time(60.0);
        pid.params_mut().set_smoothing_factor(3.0);
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));

        let (output, _) = pid.update(ctx, 54.0, secs(5));

        assert_eq!(output.smoothed_value, 51.0);
        assert_eq!(output.derivative, 12.0);
    }

    #[test]
    fn test_smoothing_never_shorter_than_interval() {
        // ts = max(10 / 5, 5) = 5, i.e. no smoothing at all
        let (mut pid, ctx) = make_loop();
        pid.params_mut().set_derivative_time(10.0);
        pid.params_mut().set_smoothing_factor(5.0);
        let (_, ctx) = pid.update(ctx, 50.0, secs(0));

        let (output, _) = pid.update(ctx, 54.0, secs(5));

        assert_eq!(output.smoothed_value, 54.0);
        assert_eq!(output.derivative, 8.0);
    }

    #[test]
    fn test_derivative_damps_rising_process_value() {
        let (mut damped, ctx) = make_loop();
        damped.params_mut().set_derivative_time(30.0);
        let (undamped, _) = make_loop();

        let (_, damped_ctx) = damped.update(ctx, 48.0, secs(0));
        let (_, undamped_ctx) = undamped.update(ctx, 48.0, secs(0));

        let (with_derivative, _) = damped.update(damped_ctx, 49.0, secs(5));
        let (without_derivative, _) = undamped.update(undamped_ctx, 49.0, secs(5));

        assert!(with_derivative.power < without_derivative.power);
    }
}

mod test_on_off {
    use super::*;

    #[test]
    fn test_zero_band_switches_and_holds() {
        let (mut pid, mut ctx) = make_loop();
        pid.params_mut().set_proportional_band(0.0);

        let expected = [
            (50.0, 0.0), // on the setpoint at start-up: previous power is zero
            (49.0, 1.0),
            (50.0, 1.0),
            (51.0, 0.0),
            (50.0, 0.0),
        ];
        for (i, (pv, power)) in expected.into_iter().enumerate() {
            let output: ControlOutput<f64>;
            (output, ctx) = pid.update(ctx, pv, secs(5 * i as u64));
            assert_eq!(output.power, power, "sample {i}");
            assert_eq!(output.integral, 0.0);
        }
    }
}

mod test_stateful {
    use super::*;

    use pid_control_loop::config::LoopConfig;
    use pid_control_loop::observer::OutputObserver;
    use pid_control_loop::pid::PidControlLoop;
    use pid_control_loop::time::Millis;

    #[test]
    fn test_set_pv_notifies_observer() {
        let mut seen = vec![];
        let mut returned = vec![];
        {
            let mut pid = make_stateful_loop()
                .with_observer(|output: &ControlOutput<f64>| seen.push(*output));

            for (i, pv) in [50.0, 52.0, 49.0].into_iter().enumerate() {
                returned.push(pid.set_pv(pv, secs(5 * i as u64)));
            }

            // update alone does not notify
            pid.update(49.5, secs(15));
        }

        assert_eq!(seen, returned);
    }

    #[derive(Default)]
    struct BadPvCounter {
        count: usize,
    }

    impl OutputObserver<f64> for BadPvCounter {
        fn on_output(&mut self, output: &ControlOutput<f64>) {
            if output.status == LoopStatus::BadPv {
                self.count += 1;
            }
        }
    }

    #[test]
    fn test_custom_observer() {
        let mut pid = make_stateful_loop().with_observer(BadPvCounter::default());

        pid.set_pv(50.0, secs(0));
        pid.set_pv(f64::NAN, secs(5));
        pid.set_pv(f64::INFINITY, secs(10));
        pid.set_pv(50.0, secs(15));

        assert_eq!(pid.observer().count, 2);
        pid.observer_mut().count = 0;
        assert_eq!(pid.observer().count, 0);
    }

    #[test]
    fn test_stateful_matches_functional() {
        let (func, mut ctx) = make_loop();
        let mut pid = make_stateful_loop();

        for (i, pv) in [50.0, 53.0, 51.0, f64::NAN, 49.0].into_iter().enumerate() {
            let expected: ControlOutput<f64>;
            (expected, ctx) = func.update(ctx, pv, secs(5 * i as u64));
            let output = pid.update(pv, secs(5 * i as u64));
            assert_eq!(output.power, expected.power);
            assert_eq!(output.status, expected.status);
        }
        assert_eq!(pid.context(), &ctx);
    }

    #[test]
    fn test_pv_and_payload() {
        let mut pid = make_stateful_loop();
        assert_eq!(pid.pv(), None);

        let output = pid.update(47.0, secs(0));

        assert_eq!(pid.pv(), Some(47.0));
        assert_eq!(output.payload(), output.power);
        assert_eq!(output.pv, 47.0);
        assert_eq!(output.setpoint, 50.0);
    }

    #[test]
    fn test_reset_reseeds() {
        let mut pid = make_stateful_loop();
        pid.update(50.0, secs(0));
        pid.update(51.0, secs(5));

        pid.reset();
        assert!(!pid.context().is_initialized());
        assert_eq!(pid.pv(), None);

        let output = pid.update(45.0, secs(10));
        assert_eq!(output.status, LoopStatus::Starting);
        assert_eq!(output.smoothed_value, 45.0);
        assert_eq!(output.integral, 0.0);
    }

    #[test]
    fn test_apply_config_changes_only_present_fields() {
        let mut pid = make_stateful_loop();
        pid.update(50.0, secs(0));

        pid.apply_config(&LoopConfig {
            setpoint: Some(60.0),
            ..Default::default()
        });

        assert_eq!(pid.params().setpoint(), 60.0);
        assert_eq!(pid.params().proportional_band(), 10.0);

        // Parameters are read afresh on the next update
        let output = pid.update(50.0, secs(5));
        assert_eq!(output.setpoint, 60.0);
        assert_eq!(output.proportional, -10.0);
        assert_eq!(output.power, 1.0);
    }

    #[test]
    fn test_single_precision_loop() {
        let mut pid = PidControlLoop::<Millis, f32>::from_config(&crate::fixtures::test_loop::example_config());

        assert_eq!(pid.update(50.0, Millis(0)).power, 0.5);
        assert_eq!(pid.update(55.0, Millis(5000)).power, 0.0);
        assert_eq!(pid.update(f32::NAN, Millis(10_000)).power, 0.0);
    }
}
