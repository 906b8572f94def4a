//! Fixed-step classic Runge-Kutta integration over a closed interval.

use crate::model::State;

/// Upper bound on integration steps for a single point.
pub const MAX_STEPS: u64 = 100_000_000;

const STEP_TOLERANCE: f64 = 1e-9;

/// How `[0, tmax]` is covered by steps of size `dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSchedule {
    pub full_steps: u64,
    /// Length of a trailing partial step, zero when `tmax` is a multiple of `dt`.
    pub remainder: f64,
}

impl StepSchedule {
    pub fn total_steps(&self) -> u64 {
        self.full_steps + u64::from(self.remainder > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("invalid step schedule: {0}")]
    InvalidSchedule(String),
    #[error("state became non-finite at t={time}")]
    NonFinite { time: f64 },
}

pub fn step_schedule(tmax: f64, dt: f64) -> Result<StepSchedule, IntegrationError> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(IntegrationError::InvalidSchedule(
            "dt must be a positive number".to_string(),
        ));
    }
    if !tmax.is_finite() || tmax < 0.0 {
        return Err(IntegrationError::InvalidSchedule(
            "tmax must be a non-negative number".to_string(),
        ));
    }

    let ratio = tmax / dt;
    if ratio > MAX_STEPS as f64 {
        return Err(IntegrationError::InvalidSchedule(format!(
            "tmax/dt exceeds MAX_STEPS={MAX_STEPS}"
        )));
    }

    let rounded = ratio.round();
    if (ratio - rounded).abs() <= STEP_TOLERANCE * ratio.max(1.0) {
        return Ok(StepSchedule {
            full_steps: rounded as u64,
            remainder: 0.0,
        });
    }

    let full_steps = ratio.floor() as u64;
    Ok(StepSchedule {
        full_steps,
        remainder: tmax - full_steps as f64 * dt,
    })
}

pub fn rk4_step<F>(deriv: &F, state: &State, h: f64) -> State
where
    F: Fn(&State) -> State,
{
    let k1 = deriv(state);
    let k2 = deriv(&offset(state, &k1, h / 2.0));
    let k3 = deriv(&offset(state, &k2, h / 2.0));
    let k4 = deriv(&offset(state, &k3, h));

    let mut next = *state;
    for idx in 0..next.len() {
        next[idx] += h / 6.0 * (k1[idx] + 2.0 * k2[idx] + 2.0 * k3[idx] + k4[idx]);
    }
    next
}

fn offset(state: &State, slope: &State, h: f64) -> State {
    let mut shifted = *state;
    for idx in 0..shifted.len() {
        shifted[idx] += h * slope[idx];
    }
    shifted
}

/// Integrates an autonomous system from `t = 0` to `t = tmax` and returns
/// the final state.
///
/// Every intermediate state is checked, so a blow-up is reported at the time
/// it happens rather than surfacing as NaN at the end.
pub fn integrate_final_state<F>(
    deriv: F,
    initial: State,
    tmax: f64,
    dt: f64,
) -> Result<State, IntegrationError>
where
    F: Fn(&State) -> State,
{
    let schedule = step_schedule(tmax, dt)?;
    ensure_finite(&initial, 0.0)?;

    let mut state = initial;
    for step in 1..=schedule.full_steps {
        state = rk4_step(&deriv, &state, dt);
        ensure_finite(&state, step as f64 * dt)?;
    }

    if schedule.remainder > 0.0 {
        state = rk4_step(&deriv, &state, schedule.remainder);
        ensure_finite(&state, tmax)?;
    }

    Ok(state)
}

fn ensure_finite(state: &State, time: f64) -> Result<(), IntegrationError> {
    if state.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(IntegrationError::NonFinite { time })
    }
}
