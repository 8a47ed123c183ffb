// SPDX-License-Identifier: Apache-2.0

//! A closed-loop PID controller used by the CPU generator's system-wide mode
//! (spec.md section 4.3.2) and available to any worker needing rate feedback.
//!
//! The calculations follow the pseudocode in Chapter 10 of *Feedback Systems: An
//! Introduction for Scientists and Engineers* (Astrom and Murray): a setpoint-weighted
//! proportional term, a filtered derivative, and an integral with back-calculation
//! anti-windup (`m_integral += kt * (saturated - raw)`, spec.md section 9).

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Ready,
    Control,
}

/// A PID controller operating on a single scalar process variable.
///
/// Call [`PidController::reset`] to set (or change) the setpoint, [`PidController::start`]
/// to begin a control cycle, feed it observations of the setpoint via [`PidController::update`]
/// while idle, and call [`PidController::stop`] with the latest process-variable observation
/// to compute the next output and end the cycle.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,

    kt: f64,
    n: f64,
    beta: f64,
    setpoint_min: f64,
    setpoint_max: f64,

    start_ts: Instant,
    update_ts: Instant,
    state: State,

    accumulator: f64,
    integral: f64,
    derivative: f64,
    last_y: f64,
    setpoint: f64,
}

impl PidController {
    /// Creates a new controller with the given proportional, integral, and derivative
    /// gains. The controller is not usable until [`reset`](Self::reset) establishes a
    /// setpoint.
    #[must_use]
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        let now = Instant::now();
        Self {
            kp,
            ki,
            kd,
            kt: 1.0,
            n: 10.0,
            beta: 1.0,
            setpoint_min: 0.0,
            setpoint_max: f64::MAX,
            start_ts: now,
            update_ts: now,
            state: State::Init,
            accumulator: 0.0,
            integral: 0.0,
            derivative: 0.0,
            last_y: 0.0,
            setpoint: 0.0,
        }
    }

    /// Sets the output clamp range. spec.md section 4.3.2 requires `[0, 1]` for the
    /// CPU generator's utilization setpoint.
    pub fn set_output_range(&mut self, min: f64, max: f64) {
        self.setpoint_min = min;
        self.setpoint_max = max;
    }

    /// Sets the derivative low-pass filter coefficient `N`.
    pub fn set_derivative_filter(&mut self, n: f64) {
        self.n = n;
    }

    /// Sets the setpoint weighting factor `beta` applied to the proportional term.
    pub fn set_setpoint_weight(&mut self, beta: f64) {
        self.beta = beta;
    }

    /// Resets the controller's integral/derivative state and establishes a new
    /// setpoint. Per spec.md section 9, changing the setpoint always clears the
    /// accumulated integral and derivative state.
    pub fn reset(&mut self, setpoint: f64) {
        self.integral = 0.0;
        self.derivative = 0.0;
        self.accumulator = 0.0;
        self.last_y = setpoint;
        self.setpoint = setpoint;
        let now = Instant::now();
        self.start_ts = now;
        self.update_ts = now;
        self.state = State::Ready;
    }

    /// Begins a new control cycle. Panics if the controller is not in the `ready`
    /// state (i.e. [`reset`](Self::reset) was never called, or a cycle is already
    /// in progress) — this mirrors the original implementation's `assert`, which
    /// is appropriate here since it signals a programming error in the caller,
    /// not a runtime condition.
    pub fn start(&mut self) {
        assert_eq!(self.state, State::Ready, "PidController::start called out of order");
        self.accumulator = 0.0;
        let now = Instant::now();
        self.start_ts = now;
        self.update_ts = now;
        self.state = State::Control;
    }

    /// Feeds an updated setpoint while a control cycle is idle-running (i.e. between
    /// [`start`](Self::start) and [`stop`](Self::stop)). No-op if no cycle is active.
    pub fn update(&mut self, setpoint: f64) {
        if self.state == State::Control {
            let now = Instant::now();
            self.accumulate(now);
            self.update_ts = now;
            self.last_y = setpoint;
            self.setpoint = setpoint;
        }
    }

    /// Ends the control cycle given the latest observed process variable `y`
    /// (e.g. measured utilization), returning the output delta to apply to the
    /// setpoint for the next tick. Panics if no cycle is active (see
    /// [`start`](Self::start)).
    pub fn stop(&mut self, y: f64) -> f64 {
        assert_eq!(self.state, State::Control, "PidController::stop called out of order");
        let now = Instant::now();
        self.accumulate(now);

        let dtime = (now - self.start_ts).as_secs_f64();
        let tf = if self.kp != 0.0 { (self.kd / self.kp) / self.n } else { 0.0 };
        let bi = self.ki * dtime;
        let ad = tf / (tf + dtime);
        let bd = self.kd / (tf + dtime);

        let p = self.kp * (self.beta * self.accumulator - y);
        self.derivative = ad * self.derivative - bd * (y - self.last_y);
        let v = p + self.derivative + self.integral;
        let u = self.saturate(v);
        self.integral += bi * (self.accumulator - y) + self.kt * (u - v);
        self.last_y = y;
        self.state = State::Ready;
        u
    }

    fn accumulate(&mut self, now: Instant) {
        self.accumulator += (now - self.update_ts).as_secs_f64() * self.setpoint;
    }

    fn saturate(&self, v: f64) -> f64 {
        if self.setpoint + v > self.setpoint_max {
            self.setpoint_max - self.setpoint
        } else if self.setpoint + v < self.setpoint_min {
            self.setpoint_min - self.setpoint
        } else {
            v
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn cpu_mode_controller() -> PidController {
        let mut pid = PidController::new(0.9, 5e-4, 0.0);
        pid.set_derivative_filter(10.0);
        pid.set_output_range(0.0, 1.0);
        pid
    }

    #[test]
    fn output_is_clamped_to_configured_range() {
        let mut pid = cpu_mode_controller();
        pid.reset(0.25);
        pid.start();
        let u = pid.stop(10.0);
        assert!((0.0..=1.0).contains(&(pid_apply(0.25, u))));
    }

    fn pid_apply(setpoint: f64, u: f64) -> f64 {
        (setpoint + u).clamp(0.0, 1.0)
    }

    #[test]
    fn converges_toward_setpoint_over_several_cycles() {
        let mut pid = cpu_mode_controller();
        let mut setpoint = 0.25;
        pid.reset(setpoint);

        // Simulate a process that overshoots high (0.5) and let the controller
        // pull the next setpoint down several cycles in a row.
        let mut last_u = 0.0;
        for _ in 0..5 {
            pid.start();
            sleep(Duration::from_millis(1));
            last_u = pid.stop(0.5);
            setpoint = (setpoint + last_u).clamp(0.0, 1.0);
            pid.reset(setpoint);
        }

        // A controller driving a persistently-high observation down should never
        // push the setpoint up.
        assert!(last_u <= 0.0);
    }

    #[test]
    #[should_panic]
    fn stop_without_start_panics() {
        let mut pid = cpu_mode_controller();
        pid.reset(0.5);
        let _ = pid.stop(0.5);
    }
}
