#![warn(missing_docs)]

//! # Duty-Cycle PID Control Loop
//!
//! This library provides a PID (Proportional-Integral-Derivative) control loop that turns a
//! sampled process value, such as a temperature, into an actuator duty cycle between 0 and 1.
//!
//! It includes both functional and stateful implementations, allowing users to choose the approach
//! that best suits their needs.
//!
//! ## Features
//!
//! - Proportional band tuning: the output swings from full to zero power across a band of width
//!   `proportional_band` centred on the setpoint, with on/off control when the band is zero.
//! - Anti-windup: the integral is locked while proportional plus integral saturate the output,
//!   and always clamped to half a band either side of zero.
//! - Derivative on measurement with a low-pass smoothed baseline.
//! - Irregular sampling: each update uses the actual interval since the previous sample, and
//!   intervals that are non-positive or longer than `max_interval` freeze the integral.
//! - Fail-safe output: NaN process values, NaN parameters and a disabled loop all produce the
//!   configured disabled output. The power is never NaN and never leaves `[0, 1]`.
//!
//! ## Usage
//!
//! ### Functional control loop
//!
//! The functional loop holds only its parameters, and `update` is **functionally pure**.
//!
//! ```rust
//! use pid_control_loop::params::LoopParamsBuilder;
//! use pid_control_loop::pid::{FuncPidControlLoop, LoopContext};
//! use pid_control_loop::time::Millis;
//!
//! let params = LoopParamsBuilder::default()
//!     .setpoint(65.0)
//!     .proportional_band(10.0)
//!     .integral_time(600.0)
//!     .derivative_time(0.0)
//!     .build()
//!     .expect("Invalid loop parameters");
//! let pid = FuncPidControlLoop::new(params);
//! let ctx = LoopContext::<Millis, f64>::new_uninit();
//!
//! let (output, ctx) = pid.update(ctx, 20.0, Millis(0));
//! assert_eq!(output.power, 1.0); // far below the setpoint: full power
//!
//! let (output, _ctx) = pid.update(ctx, 64.0, Millis(1_000));
//! assert!(output.power > 0.0 && output.power < 1.0);
//! ```
//!
//! ### Stateful control loop
//!
//! The stateful loop manages a `LoopContext` internally, and can notify an observer of every
//! output produced through `set_pv`.
//!
//! ```rust
//! use pid_control_loop::params::LoopParams;
//! use pid_control_loop::pid::PidControlLoop;
//! use pid_control_loop::time::StdInstant;
//!
//! let mut pid = PidControlLoop::new(LoopParams::<f64>::default());
//! pid.params_mut().set_setpoint(21.0);
//!
//! let output = pid.update(f64::NAN, StdInstant::now());
//! assert_eq!(output.power, pid.params().disabled_output());
//! ```
//!
//! ### Plugging in your Instant type
//!
//! ``` rust
//! use core::ops::Add;
//! use core::time::Duration;
//! use pid_control_loop::params::LoopParams;
//! use pid_control_loop::pid::PidControlLoop;
//! use pid_control_loop::time::InstantLike;
//!
//! #[derive(Copy, Clone, Debug, PartialEq)]
//! struct Ticks(i64); // 100Hz scheduler ticks
//!
//! impl InstantLike for Ticks {
//!     fn secs_since(&self, earlier: Self) -> f64 {
//!         (self.0 - earlier.0) as f64 / 100.0
//!     }
//! }
//!
//! impl Add<Duration> for Ticks {
//!     type Output = Self;
//!
//!     fn add(self, rhs: Duration) -> Self {
//!         Ticks(self.0 + (rhs.as_millis() / 10) as i64)
//!     }
//! }
//!
//! let mut pid = PidControlLoop::<Ticks, f64>::new(LoopParams::default());
//! let output = pid.update(20.0, Ticks(0));
//! assert_eq!(output.power, 0.5);
//! ```
//!
//! ## Cargo features
//!
//! - `std` (default): `StdInstant` and `std::error::Error` implementations for the error types.
//! - `serde`: serialization of parameters and outputs, and lenient JSON configuration parsing.
//! - `tracing`: status transitions at debug level and every update at trace level.
//! - `simulation`: a thermal plant model for closed-loop testing.
#![no_std]

#[cfg(feature = "std")]
extern crate std;

/// Loosely-typed configuration values for constructing and retuning a loop
pub mod config;

/// Observer seam notified of each output of the stateful loop
pub mod observer;

/// Tuning parameters, their validation and builder
pub mod params;

/// The control loop itself
pub mod pid;

/// The module containing time-related utilities to support irregular sampling
pub mod time;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
