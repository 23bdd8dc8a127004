//! Closed-loop response of a water heater to setpoint steps, printed as CSV
//! This demo requires the `--features simulation` flag to be enabled.
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
pub fn main() {
    use std::io::Write;

    use pid_control_loop::{
        params::LoopParamsBuilder,
        pid::{ControlOutput, PidControlLoop},
        sim::{self, SignalGenerator, TwoMassThermal, WaveForm},
        time::Millis,
    };

    const FIXED_STEP_SIZE_MS: u64 = 1000;
    const FIXED_STEP_SIZE_S: f64 = FIXED_STEP_SIZE_MS as f64 * 0.001;
    const DURATION_S: u64 = 6 * 3600;

    let params = LoopParamsBuilder::default()
        .setpoint(60.0)
        .proportional_band(10.0)
        .integral_time(600.0)
        .derivative_time(60.0)
        .integral_default(0.3)
        .smoothing_factor(3.0)
        .max_interval(30.0)
        .build()
        .expect("Invalid loop parameters");

    // Alternate between 55°C and 65°C every two hours
    let setpoint = SignalGenerator::new(WaveForm::Square, Millis(0), 4.0 * 3600.0, 5.0, 60.0);
    let plant = TwoMassThermal::default();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "time_s,setpoint,temperature,power,status").expect("stdout closed");

    let mut rows = vec![];
    let mut pid = PidControlLoop::<Millis, f64>::new(params)
        .with_observer(|output: &ControlOutput<f64>| rows.push(*output));

    let mut state = plant.rest_state();
    for step in 0..DURATION_S {
        let timestamp = Millis(step * FIXED_STEP_SIZE_MS);
        pid.params_mut().set_setpoint(setpoint.generate(timestamp));

        let power = pid.set_pv(plant.h(state), timestamp).power;
        state = sim::rk4_step(|x| plant.f(x, power), state, FIXED_STEP_SIZE_S);
    }
    drop(pid);

    for (step, row) in rows.iter().enumerate().step_by(60) {
        writeln!(
            out,
            "{},{:.1},{:.3},{:.4},{:?}",
            step as u64 * FIXED_STEP_SIZE_MS / 1000,
            row.setpoint,
            row.pv,
            row.power,
            row.status
        )
        .expect("stdout closed");
    }
}

#[cfg(not(feature = "simulation"))]
fn main() {
    eprintln!("This demo requires `--features simulation` to run.");
}
