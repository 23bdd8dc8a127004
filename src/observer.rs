// Notification seam for consumers of control loop outputs
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

use crate::pid::ControlOutput;

/// Receives every output produced through [`PidControlLoop::set_pv`](crate::pid::PidControlLoop::set_pv).
///
/// Any `FnMut(&ControlOutput<F>)` closure is an observer, so an actuator driver can be wired in
/// without a dedicated type:
///
/// ```rust
/// use pid_control_loop::params::LoopParams;
/// use pid_control_loop::pid::{ControlOutput, PidControlLoop};
/// use pid_control_loop::time::Millis;
///
/// let mut duty_cycles = Vec::new();
/// let mut pid = PidControlLoop::<Millis, f64>::new(LoopParams::default())
///     .with_observer(|output: &ControlOutput<f64>| duty_cycles.push(output.power));
///
/// pid.set_pv(18.0, Millis(0));
/// pid.set_pv(18.5, Millis(1000));
/// drop(pid);
///
/// assert_eq!(duty_cycles.len(), 2);
/// ```
pub trait OutputObserver<F> {
    /// Called once per update, after the loop state has been committed
    fn on_output(&mut self, output: &ControlOutput<F>);
}

/// Observer that discards every output
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NoObserver;

impl<F> OutputObserver<F> for NoObserver {
    fn on_output(&mut self, _output: &ControlOutput<F>) {}
}

impl<F, T> OutputObserver<F> for T
where
    T: FnMut(&ControlOutput<F>),
{
    fn on_output(&mut self, output: &ControlOutput<F>) {
        self(output)
    }
}
