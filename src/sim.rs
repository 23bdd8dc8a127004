use crate::time::InstantLike;
use nalgebra as na;

pub enum WaveForm {
    Sine,
    Square,
}

/// Periodic signal used as a setpoint profile or as sensor noise
pub struct SignalGenerator<I: InstantLike> {
    fcn: fn(f64) -> f64,
    initial_time: I,
    period: f64,
    amplitude: f64,
    offset: f64,
}

impl<I: InstantLike> SignalGenerator<I> {
    pub fn new(waveform: WaveForm, initial_time: I, period: f64, amplitude: f64, offset: f64) -> Self {
        Self {
            fcn: match waveform {
                WaveForm::Sine => f64::sin,
                WaveForm::Square => |x| x.sin().signum(),
            },
            initial_time,
            period,
            amplitude,
            offset,
        }
    }

    pub fn generate(&self, time: I) -> f64 {
        let phase = 2.0 * core::f64::consts::PI * time.secs_since(self.initial_time) / self.period;
        self.amplitude * (self.fcn)(phase) + self.offset
    }
}

/// Classic fourth-order Runge-Kutta step of `x' = f(x)`
pub fn rk4_step<F>(f: F, x: na::Vector2<f64>, h: f64) -> na::Vector2<f64>
where
    F: Fn(na::Vector2<f64>) -> na::Vector2<f64>,
{
    let k1 = f(x);
    let k2 = f(x + k1 * (h / 2.0));
    let k3 = f(x + k2 * (h / 2.0));
    let k4 = f(x + k3 * h);
    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

/// An electric heater element immersed in a vessel that loses heat to its surroundings.
///
/// Temperatures are in °C, powers in W, heat capacities in J/K and conductances in W/K.
pub struct TwoMassThermal {
    pub heater_power: f64,
    pub element_capacity: f64,
    pub vessel_capacity: f64,
    pub element_to_vessel: f64,
    pub vessel_to_ambient: f64,
    pub ambient: f64,
}

impl Default for TwoMassThermal {
    /// A 1kW element in about five litres of water
    fn default() -> Self {
        Self {
            heater_power: 1000.0,
            element_capacity: 500.0,
            vessel_capacity: 20_000.0,
            element_to_vessel: 50.0,
            vessel_to_ambient: 5.0,
            ambient: 20.0,
        }
    }
}

impl TwoMassThermal {
    /// Implements the heat balance of the element and vessel, with `u` the heater duty cycle:
    /// ┌     ┐   ┌                              ┐┌    ┐   ┌         ┐     ┌        ┐
    /// │ Tₑ' │ = │ -kₑᵥ/Cₑ   kₑᵥ/Cₑ             ││ Tₑ │ + │ P/Cₑ    │ u + │ 0      │
    /// │ Tᵥ' │   │  kₑᵥ/Cᵥ  -(kₑᵥ + kᵥₐ)/Cᵥ     ││ Tᵥ │   │ 0       │     │ kᵥₐTₐ/Cᵥ │
    /// └     ┘   └                              ┘└    ┘   └         ┘     └        ┘
    /// The measured temperature is the vessel's, Tᵥ.
    pub fn f(&self, x: na::Vector2<f64>, u: f64) -> na::Vector2<f64> {
        let k_ev = self.element_to_vessel;
        let k_va = self.vessel_to_ambient;
        let c_e = self.element_capacity;
        let c_v = self.vessel_capacity;

        let mat_a = na::Matrix2::new(-k_ev / c_e, k_ev / c_e, k_ev / c_v, -(k_ev + k_va) / c_v);
        let mat_b = na::Vector2::new(self.heater_power / c_e, 0.0);
        let ambient = na::Vector2::new(0.0, k_va * self.ambient / c_v);

        mat_a * x + mat_b * u + ambient
    }

    pub fn h(&self, x: na::Vector2<f64>) -> f64 {
        x[1]
    }

    /// Both masses at ambient temperature
    pub fn rest_state(&self) -> na::Vector2<f64> {
        na::Vector2::new(self.ambient, self.ambient)
    }

    /// Duty cycle that holds the vessel at `temperature` in steady state
    pub fn holding_duty(&self, temperature: f64) -> f64 {
        self.vessel_to_ambient * (temperature - self.ambient) / self.heater_power
    }
}
