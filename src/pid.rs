// Duty-cycle PID control loop with integral locking and derivative smoothing
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

use crate::config::LoopConfig;
use crate::observer::{NoObserver, OutputObserver};
use crate::params::{cast, LoopParams};
use crate::time::InstantLike;

/// What the loop did on a given update, in decreasing order of precedence
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopStatus {
    /// The process value was NaN or infinite; the output is the disabled output
    BadPv,

    /// The loop is disabled; the output is the disabled output
    Disabled,

    /// The parameters produced no usable power (e.g. a NaN setpoint or band); the output is the
    /// disabled output
    BadParams,

    /// First valid sample; the loop state was seeded from it
    Starting,

    /// The interval since the previous sample was non-positive, not finite or longer than the max
    /// interval, or the timestamp itself was unusable; the integral was frozen and the derivative
    /// zeroed
    StaleInterval,

    /// Proportional plus integral already saturate the output, so the integral was not updated
    IntegralLocked,

    /// Normal operation
    Running,
}

/// Result of one control loop update
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlOutput<F> {
    /// Duty cycle to apply, always within `[0, 1]`
    #[cfg_attr(feature = "serde", serde(rename = "payload", alias = "power"))]
    pub power: F,
    /// Process value this output was computed from
    pub pv: F,
    /// Setpoint at the time of the update
    pub setpoint: F,
    /// `pv - setpoint`
    pub proportional: F,
    /// Integral term after the update
    pub integral: F,
    /// Derivative term after the update
    pub derivative: F,
    /// Low-pass filtered process value used as the derivative baseline
    pub smoothed_value: F,
    /// What the loop did on this update
    pub status: LoopStatus,
}

impl<F: Copy> ControlOutput<F> {
    /// Alias of `power`, the value to forward to the actuator
    pub fn payload(&self) -> F {
        self.power
    }
}

/// Runtime state of the control loop.
///
/// A context starts uninitialized; the first update with a finite process value seeds it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoopContext<I, F> {
    smoothed_value: F,
    integral: F,
    derivative: F,
    last_power: F,
    last_time: Option<I>,
    last_status: Option<LoopStatus>,
}

impl<I: InstantLike, F: FloatCore> Default for LoopContext<I, F> {
    fn default() -> Self {
        Self::new_uninit()
    }
}

impl<I: InstantLike, F: FloatCore> LoopContext<I, F> {
    /// Creates a context that will be seeded by the next valid sample
    pub fn new_uninit() -> Self {
        Self {
            smoothed_value: F::zero(),
            integral: F::zero(),
            derivative: F::zero(),
            last_power: F::zero(),
            last_time: None,
            last_status: None,
        }
    }

    /// Whether a valid sample has been seen since construction
    pub fn is_initialized(&self) -> bool {
        self.last_time.is_some()
    }

    /// Low-pass filtered process value
    pub fn smoothed_value(&self) -> F {
        self.smoothed_value
    }

    /// Integral term
    pub fn integral(&self) -> F {
        self.integral
    }

    /// Derivative term from the last update
    pub fn derivative(&self) -> F {
        self.derivative
    }

    /// Power emitted by the last update
    pub fn last_power(&self) -> F {
        self.last_power
    }

    /// Timestamp of the last valid sample
    pub fn last_time(&self) -> Option<I> {
        self.last_time
    }

    /// Status reported by the last update
    pub fn last_status(&self) -> Option<LoopStatus> {
        self.last_status
    }

    // Position the integral so that the loop emits `integral_default` while pv == setpoint
    fn seed(&mut self, pv: F, now: I, params: &LoopParams<F>) {
        self.smoothed_value = pv;
        self.integral = (half::<F>() - params.integral_default()) * params.proportional_band();
        self.derivative = F::zero();
        self.last_power = F::zero();
        self.last_time = Some(now);
    }
}

/// Whether `now` can be measured against, i.e. it is neither NaN nor infinite
fn usable_timestamp<I: InstantLike>(now: I) -> bool {
    now.secs_since(now) == 0.0
}

fn half<F: FloatCore>() -> F {
    F::one() / (F::one() + F::one())
}

/// Sign of `value`, with zero mapping to zero
fn sign_or_zero<F: FloatCore>(value: F) -> F {
    if value > F::zero() {
        F::one()
    } else if value < F::zero() {
        -F::one()
    } else {
        F::zero()
    }
}

/// Clamps the integral to `[-half_band, half_band]`. Written with comparisons rather than
/// `clamp` so NaN bounds leave the value untouched instead of panicking.
fn clamp_integral<F: FloatCore>(integral: F, half_band: F) -> F {
    if integral < -half_band {
        -half_band
    } else if integral > half_band {
        half_band
    } else {
        integral
    }
}

fn clamp_unit<F: FloatCore>(power: F) -> F {
    if power < F::zero() {
        F::zero()
    } else if power > F::one() {
        F::one()
    } else {
        power
    }
}

#[cfg(feature = "tracing")]
fn as_f64<F: FloatCore>(value: F) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// A functional implementation of the duty-cycle PID loop.
///
/// The loop holds only its tuning parameters. The runtime state lives in a [`LoopContext`] that is
/// passed into and returned from every call to [`update`](Self::update), which makes the update a
/// pure function of its arguments.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FuncPidControlLoop<F> {
    params: LoopParams<F>,
}

impl<F: FloatCore> FuncPidControlLoop<F> {
    /// Wraps a set of tuning parameters
    pub fn new(params: LoopParams<F>) -> Self {
        FuncPidControlLoop { params }
    }

    /// Returns the tuning parameters
    pub fn params(&self) -> &LoopParams<F> {
        &self.params
    }

    /// Returns the tuning parameters for modification between updates
    pub fn params_mut(&mut self) -> &mut LoopParams<F> {
        &mut self.params
    }

    /// Computes the power for a new process value sample.
    ///
    /// Never fails: a non-finite process value, a disabled loop or parameters that produce NaN
    /// all yield the disabled output, and the returned power is always clamped to `[0, 1]`.
    /// Calling this twice with the same timestamp does not apply the integral or derivative
    /// twice, since a zero interval is rejected as stale. A NaN or infinite timestamp is treated
    /// as stale and is not recorded, so the next sample is measured against the last good one.
    ///
    /// # Arguments
    /// - `ctx`: The state returned by the previous update, or a fresh uninitialized context.
    /// - `pv`: The process value sample. May be NaN.
    /// - `now`: The time at which `pv` was sampled.
    ///
    /// # Returns
    /// The output record and the updated state
    pub fn update<I: InstantLike>(
        &self,
        mut ctx: LoopContext<I, F>,
        pv: F,
        now: I,
    ) -> (ControlOutput<F>, LoopContext<I, F>) {
        let params = &self.params;
        let half_band = params.proportional_band() * half();
        let proportional = pv - params.setpoint();

        let mut status = if !pv.is_finite() {
            LoopStatus::BadPv
        } else if !usable_timestamp(now) {
            // No interval can be measured from a NaN or infinite timestamp, so it is never recorded
            ctx.derivative = F::zero();
            LoopStatus::StaleInterval
        } else {
            let status = match ctx.last_time {
                Some(last_time) => self.advance(&mut ctx, pv, cast(now.secs_since(last_time))),
                None => {
                    ctx.seed(pv, now, params);
                    LoopStatus::Starting
                }
            };
            ctx.last_time = Some(now);
            status
        };

        // The band may have narrowed since the integral was last updated
        if ctx.is_initialized() {
            ctx.integral = clamp_integral(ctx.integral, half_band);
        }

        let mut power = if status == LoopStatus::BadPv || !ctx.is_initialized() {
            params.disabled_output()
        } else {
            self.raw_power(&ctx, proportional)
        };

        if !params.enabled() && status != LoopStatus::BadPv {
            power = params.disabled_output();
            status = LoopStatus::Disabled;
        }

        if power.is_nan() {
            power = params.disabled_output();
            status = LoopStatus::BadParams;
        }
        power = clamp_unit(power);
        ctx.last_power = power;

        #[cfg(feature = "tracing")]
        {
            if ctx.last_status != Some(status) {
                tracing::debug!(?status, previous = ?ctx.last_status, "control loop status changed");
            }
            tracing::trace!(
                pv = as_f64(pv),
                power = as_f64(power),
                integral = as_f64(ctx.integral),
                derivative = as_f64(ctx.derivative),
                smoothed_value = as_f64(ctx.smoothed_value),
                "control loop updated"
            );
        }
        ctx.last_status = Some(status);

        let output = ControlOutput {
            power,
            pv,
            setpoint: params.setpoint(),
            proportional,
            integral: ctx.integral,
            derivative: ctx.derivative,
            smoothed_value: ctx.smoothed_value,
            status,
        };
        (output, ctx)
    }

    // Steady-state update of the smoothed value, derivative and integral for a finite pv
    fn advance<I: InstantLike>(&self, ctx: &mut LoopContext<I, F>, pv: F, delta_t: F) -> LoopStatus {
        let params = &self.params;
        let zero = F::zero();

        if !delta_t.is_finite() || delta_t <= zero || delta_t > params.max_interval() {
            ctx.derivative = zero;
            return LoopStatus::StaleInterval;
        }

        // Smoothing time constant is td / factor, but never shorter than the sample interval
        let factor = if params.smoothing_factor() > zero {
            let ts = (params.derivative_time() / params.smoothing_factor()).max(delta_t);
            delta_t / ts
        } else {
            F::one()
        };

        let delta_v = (pv - ctx.smoothed_value) * factor;
        ctx.smoothed_value = ctx.smoothed_value + delta_v;
        ctx.derivative = params.derivative_time() * delta_v / delta_t;

        // Locked while P + I sit outside the linear region, i.e. the output is already at a rail
        let error = pv - params.setpoint();
        let half_band = params.proportional_band() * half();
        let unlocked = params.enabled() && (error + ctx.integral).abs() < half_band;
        if !unlocked {
            return LoopStatus::IntegralLocked;
        }

        let integral = if params.integral_time() <= zero {
            sign_or_zero(error) * half_band
        } else {
            ctx.integral + error * delta_t / params.integral_time()
        };
        if !integral.is_nan() {
            ctx.integral = integral;
        }
        LoopStatus::Running
    }

    fn raw_power<I>(&self, ctx: &LoopContext<I, F>, proportional: F) -> F {
        let proportional_band = self.params.proportional_band();
        if proportional_band == F::zero() {
            // On/off control without hysteresis; hold the previous power exactly on the setpoint
            if proportional > F::zero() {
                F::zero()
            } else if proportional < F::zero() {
                F::one()
            } else {
                ctx.last_power
            }
        } else {
            -(proportional + ctx.integral + ctx.derivative) / proportional_band + half()
        }
    }
}

/// A stateful implementation of the duty-cycle PID loop.
///
/// Owns its [`LoopContext`] and an [`OutputObserver`] that is notified by [`set_pv`](Self::set_pv).
/// The loop does no locking of its own; `&mut self` serializes sampling and retuning.
#[derive(Clone, Debug)]
pub struct PidControlLoop<I, F, O = NoObserver> {
    ctx: LoopContext<I, F>,
    controller: FuncPidControlLoop<F>,
    observer: O,
    pv: Option<F>,
}

impl<I: InstantLike, F: FloatCore> PidControlLoop<I, F> {
    /// Creates a loop without an observer. The first sample seeds its state.
    pub fn new(params: LoopParams<F>) -> Self {
        Self {
            ctx: LoopContext::new_uninit(),
            controller: FuncPidControlLoop::new(params),
            observer: NoObserver,
            pv: None,
        }
    }

    /// Creates a loop from a loosely-typed configuration value.
    ///
    /// See [`LoopParams::from_config`] for how absent fields are treated.
    pub fn from_config(config: &LoopConfig) -> Self {
        Self::new(LoopParams::from_config(config))
    }
}

impl<I: InstantLike, F: FloatCore, O: OutputObserver<F>> PidControlLoop<I, F, O> {
    /// Replaces the observer, keeping the parameters and state
    pub fn with_observer<P: OutputObserver<F>>(self, observer: P) -> PidControlLoop<I, F, P> {
        PidControlLoop {
            ctx: self.ctx,
            controller: self.controller,
            observer,
            pv: self.pv,
        }
    }

    /// Returns the tuning parameters
    pub fn params(&self) -> &LoopParams<F> {
        self.controller.params()
    }

    /// Returns the tuning parameters for modification between updates
    pub fn params_mut(&mut self) -> &mut LoopParams<F> {
        self.controller.params_mut()
    }

    /// Updates every parameter present in `config`
    pub fn apply_config(&mut self, config: &LoopConfig) {
        self.controller.params_mut().apply(config);
    }

    /// Returns the runtime state
    pub fn context(&self) -> &LoopContext<I, F> {
        &self.ctx
    }

    /// Returns the observer
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Returns the observer mutably
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// The most recent process value passed to [`update`](Self::update) or [`set_pv`](Self::set_pv)
    pub fn pv(&self) -> Option<F> {
        self.pv
    }

    /// Forgets all state so the next sample seeds the loop again. Parameters are kept.
    pub fn reset(&mut self) {
        self.ctx = LoopContext::new_uninit();
        self.pv = None;
    }

    /// Computes the power for a new process value sample without notifying the observer.
    ///
    /// See [`FuncPidControlLoop::update`].
    pub fn update(&mut self, pv: F, now: I) -> ControlOutput<F> {
        let (output, ctx) = self.controller.update(self.ctx, pv, now);
        self.ctx = ctx;
        self.pv = Some(pv);
        output
    }

    /// Records a new process value sample, runs the loop and hands the output to the observer.
    pub fn set_pv(&mut self, pv: F, now: I) -> ControlOutput<F> {
        let output = self.update(pv, now);
        self.observer.on_output(&output);
        output
    }
}
