// Tuning parameters of the control loop, their validation and a builder
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

use num_traits::float::FloatCore;
use num_traits::NumCast;

use crate::config::LoopConfig;

/// Errors reported by [`LoopParams::validate`] and [`LoopParamsBuilder::build`].
///
/// The control loop itself never fails on bad parameters; it falls back to the disabled output.
/// These errors exist for integrators that want to reject a configuration up front.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ParamsError {
    /// The setpoint is not finite
    #[cfg_attr(feature = "std", error("setpoint must be finite"))]
    InvalidSetpoint,

    /// The proportional band is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("proportional band must be finite and non-negative")
    )]
    InvalidProportionalBand,

    /// The integral time is NaN
    #[cfg_attr(feature = "std", error("integral time must not be NaN"))]
    InvalidIntegralTime,

    /// The derivative time is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("derivative time must be finite and non-negative")
    )]
    InvalidDerivativeTime,

    /// The integral default lies outside `[0, 1]`
    #[cfg_attr(feature = "std", error("integral default must lie within [0, 1]"))]
    InvalidIntegralDefault,

    /// The smoothing factor is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("smoothing factor must be finite and non-negative")
    )]
    InvalidSmoothingFactor,

    /// The maximum sample interval is not strictly positive
    #[cfg_attr(feature = "std", error("max interval must be greater than zero"))]
    InvalidMaxInterval,

    /// The disabled output lies outside `[0, 1]`
    #[cfg_attr(feature = "std", error("disabled output must lie within [0, 1]"))]
    InvalidDisabledOutput,
}

/// Converts a configuration number into the loop's float type, mapping failures to NaN
pub(crate) fn cast<F: FloatCore>(value: f64) -> F {
    <F as NumCast>::from(value).unwrap_or_else(F::nan)
}

/// Replaces NaN with zero; the disabled output is the value of last resort and must be a number
fn sanitize_disabled_output<F: FloatCore>(value: F) -> F {
    if value.is_nan() {
        F::zero()
    } else {
        value
    }
}

/// Truthiness of a coerced number: zero and NaN are false
fn truthy(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

/// Tuning parameters of a duty-cycle PID loop.
///
/// All fields are read afresh on every update, so any of them may be changed between samples.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoopParams<F> {
    /// Target value for the process value.
    /// Defaults to 20.0.
    setpoint: F,

    /// Whether the loop drives its output. A disabled loop still tracks the derivative baseline
    /// but locks the integral and emits the disabled output.
    /// Defaults to true.
    enabled: bool,

    /// Width of the band around the setpoint in which the output varies linearly from 1 to 0.
    /// Zero selects on/off control.
    /// Defaults to 10.0.
    proportional_band: F,

    /// Integral time constant in seconds. Values <= 0 snap the integral to one end of the band.
    /// Defaults to 600s.
    integral_time: F,

    /// Derivative time constant in seconds.
    /// Defaults to 60s.
    derivative_time: F,

    /// Power emitted at steady state when the process value sits on the setpoint; seeds the
    /// integral on the first sample.
    /// Defaults to 0.5.
    integral_default: F,

    /// Strength of the low-pass filter on the derivative baseline. Zero disables smoothing.
    /// Defaults to 3.0.
    smoothing_factor: F,

    /// Longest interval in seconds between samples that still updates the integral and derivative.
    /// Defaults to 600s.
    max_interval: F,

    /// Output used when the loop is disabled or cannot compute a valid power.
    /// Defaults to 0.0.
    disabled_output: F,
}

impl<F: FloatCore> Default for LoopParams<F> {
    fn default() -> Self {
        LoopParams {
            setpoint: cast(20.0),
            enabled: true,
            proportional_band: cast(10.0),
            integral_time: cast(600.0),
            derivative_time: cast(60.0),
            integral_default: cast(0.5),
            smoothing_factor: cast(3.0),
            max_interval: cast(600.0),
            disabled_output: F::zero(),
        }
    }
}

impl<F: FloatCore> LoopParams<F> {
    /// Constructs parameters from a loosely-typed configuration value.
    ///
    /// Every missing field becomes NaN except `disabled_op`, which becomes zero; a missing or zero
    /// `enable` leaves the loop disabled. No validation takes place: the loop degrades to its
    /// disabled output whenever the parameters cannot produce a valid power.
    pub fn from_config(config: &LoopConfig) -> Self {
        let number = |field: Option<f64>| cast::<F>(field.unwrap_or(f64::NAN));
        LoopParams {
            setpoint: number(config.setpoint),
            enabled: truthy(config.enable.unwrap_or(f64::NAN)),
            proportional_band: number(config.pb),
            integral_time: number(config.ti),
            derivative_time: number(config.td),
            integral_default: number(config.integral_default),
            smoothing_factor: number(config.smooth_factor),
            max_interval: number(config.max_interval),
            disabled_output: sanitize_disabled_output(number(config.disabled_op)),
        }
    }

    /// Updates every parameter present in `config`, leaving the others untouched.
    pub fn apply(&mut self, config: &LoopConfig) {
        if let Some(setpoint) = config.setpoint {
            self.set_setpoint(cast(setpoint));
        }
        if let Some(enable) = config.enable {
            self.set_enabled(truthy(enable));
        }
        if let Some(pb) = config.pb {
            self.set_proportional_band(cast(pb));
        }
        if let Some(ti) = config.ti {
            self.set_integral_time(cast(ti));
        }
        if let Some(td) = config.td {
            self.set_derivative_time(cast(td));
        }
        if let Some(integral_default) = config.integral_default {
            self.set_integral_default(cast(integral_default));
        }
        if let Some(smooth_factor) = config.smooth_factor {
            self.set_smoothing_factor(cast(smooth_factor));
        }
        if let Some(max_interval) = config.max_interval {
            self.set_max_interval(cast(max_interval));
        }
        if let Some(disabled_op) = config.disabled_op {
            self.set_disabled_output(cast(disabled_op));
        }
    }

    /// Snapshot of the parameters as a configuration value, suitable for [`LoopParams::apply`]
    pub fn to_config(&self) -> LoopConfig {
        let number = |value: F| value.to_f64();
        LoopConfig {
            setpoint: number(self.setpoint),
            enable: Some(if self.enabled { 1.0 } else { 0.0 }),
            pb: number(self.proportional_band),
            ti: number(self.integral_time),
            td: number(self.derivative_time),
            integral_default: number(self.integral_default),
            smooth_factor: number(self.smoothing_factor),
            max_interval: number(self.max_interval),
            disabled_op: number(self.disabled_output),
        }
    }

    /// Checks every parameter against its meaningful range.
    ///
    /// Reports the first offending parameter in declaration order.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let zero = F::zero();
        let one = F::one();
        let finite_non_negative = |value: F| value.is_finite() && value >= zero;
        let unit_interval = |value: F| value >= zero && value <= one;

        if !self.setpoint.is_finite() {
            return Err(ParamsError::InvalidSetpoint);
        }
        if !finite_non_negative(self.proportional_band) {
            return Err(ParamsError::InvalidProportionalBand);
        }
        if self.integral_time.is_nan() {
            return Err(ParamsError::InvalidIntegralTime);
        }
        if !finite_non_negative(self.derivative_time) {
            return Err(ParamsError::InvalidDerivativeTime);
        }
        if !unit_interval(self.integral_default) {
            return Err(ParamsError::InvalidIntegralDefault);
        }
        if !finite_non_negative(self.smoothing_factor) {
            return Err(ParamsError::InvalidSmoothingFactor);
        }
        if !(self.max_interval > zero) {
            return Err(ParamsError::InvalidMaxInterval);
        }
        if !unit_interval(self.disabled_output) {
            return Err(ParamsError::InvalidDisabledOutput);
        }
        Ok(())
    }

    /// Returns the setpoint.
    pub fn setpoint(&self) -> F {
        self.setpoint
    }

    /// Returns whether the loop is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the proportional band.
    pub fn proportional_band(&self) -> F {
        self.proportional_band
    }

    /// Returns the integral time constant in seconds.
    pub fn integral_time(&self) -> F {
        self.integral_time
    }

    /// Returns the derivative time constant in seconds.
    pub fn derivative_time(&self) -> F {
        self.derivative_time
    }

    /// Returns the steady-state power used to seed the integral.
    pub fn integral_default(&self) -> F {
        self.integral_default
    }

    /// Returns the derivative smoothing factor.
    pub fn smoothing_factor(&self) -> F {
        self.smoothing_factor
    }

    /// Returns the longest accepted interval between samples, in seconds.
    pub fn max_interval(&self) -> F {
        self.max_interval
    }

    /// Returns the output used when the loop is disabled or the power is invalid.
    pub fn disabled_output(&self) -> F {
        self.disabled_output
    }

    /// Sets the setpoint.
    pub fn set_setpoint(&mut self, setpoint: F) {
        self.setpoint = setpoint;
    }

    /// Enables or disables the loop.
    ///
    /// Disabling takes effect on the next update: the integral is locked and the output becomes
    /// the disabled output, while the smoothed value and derivative keep tracking the process.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Sets the proportional band. Zero selects on/off control.
    ///
    /// A narrower band takes effect on the next update, where the integral is clamped to it.
    pub fn set_proportional_band(&mut self, proportional_band: F) {
        self.proportional_band = proportional_band;
    }

    /// Sets the integral time constant in seconds.
    pub fn set_integral_time(&mut self, integral_time: F) {
        self.integral_time = integral_time;
    }

    /// Sets the derivative time constant in seconds.
    pub fn set_derivative_time(&mut self, derivative_time: F) {
        self.derivative_time = derivative_time;
    }

    /// Sets the steady-state power used to seed the integral. Only the first sample after
    /// construction or a reset reads this value.
    pub fn set_integral_default(&mut self, integral_default: F) {
        self.integral_default = integral_default;
    }

    /// Sets the derivative smoothing factor.
    pub fn set_smoothing_factor(&mut self, smoothing_factor: F) {
        self.smoothing_factor = smoothing_factor;
    }

    /// Sets the longest accepted interval between samples, in seconds.
    pub fn set_max_interval(&mut self, max_interval: F) {
        self.max_interval = max_interval;
    }

    /// Sets the disabled output. NaN is replaced by zero.
    pub fn set_disabled_output(&mut self, disabled_output: F) {
        self.disabled_output = sanitize_disabled_output(disabled_output);
    }
}

/// Builder for [`LoopParams`] that validates the result.
///
/// Unspecified parameters take their [`Default`] values.
#[derive(Copy, Clone, Debug)]
pub struct LoopParamsBuilder<F> {
    params: LoopParams<F>,
}

impl<F: FloatCore> Default for LoopParamsBuilder<F> {
    fn default() -> Self {
        LoopParamsBuilder {
            params: LoopParams::default(),
        }
    }
}

impl<F: FloatCore> LoopParamsBuilder<F> {
    /// Sets the setpoint
    pub fn setpoint(mut self, setpoint: F) -> Self {
        self.params.setpoint = setpoint;
        self
    }

    /// Sets whether the loop is enabled
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.params.enabled = enabled;
        self
    }

    /// Sets the proportional band
    pub fn proportional_band(mut self, proportional_band: F) -> Self {
        self.params.proportional_band = proportional_band;
        self
    }

    /// Sets the integral time constant
    pub fn integral_time(mut self, integral_time: F) -> Self {
        self.params.integral_time = integral_time;
        self
    }

    /// Sets the derivative time constant
    pub fn derivative_time(mut self, derivative_time: F) -> Self {
        self.params.derivative_time = derivative_time;
        self
    }

    /// Sets the steady-state power at the setpoint
    pub fn integral_default(mut self, integral_default: F) -> Self {
        self.params.integral_default = integral_default;
        self
    }

    /// Sets the derivative smoothing factor
    pub fn smoothing_factor(mut self, smoothing_factor: F) -> Self {
        self.params.smoothing_factor = smoothing_factor;
        self
    }

    /// Sets the longest accepted sample interval
    pub fn max_interval(mut self, max_interval: F) -> Self {
        self.params.max_interval = max_interval;
        self
    }

    /// Sets the disabled output. Unlike [`LoopParams::set_disabled_output`], NaN is rejected
    /// rather than replaced.
    pub fn disabled_output(mut self, disabled_output: F) -> Self {
        self.params.disabled_output = disabled_output;
        self
    }

    /// Validates and returns the parameters
    pub fn build(self) -> Result<LoopParams<F>, ParamsError> {
        self.params.validate()?;
        Ok(self.params)
    }
}
