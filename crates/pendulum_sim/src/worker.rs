use pendulum_sweep_core::contract::{ParameterPoint, SimulationResult};

use crate::integrator::{integrate_final_state, IntegrationError};
use crate::model::{bob_positions, derivatives};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkerError {
    #[error(
        "numeric divergence for theta1_init={theta1_init}, theta2_init={theta2_init} at t={time}"
    )]
    NumericDivergence {
        theta1_init: f64,
        theta2_init: f64,
        time: f64,
    },
    #[error("invalid parameter point: {0}")]
    InvalidPoint(String),
    #[error("worker crashed: {0}")]
    Crashed(String),
}

impl WorkerError {
    /// Whether re-running the same point could succeed.
    ///
    /// Integration is deterministic, so only crashes are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Crashed(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NumericDivergence { .. } => "numeric_divergence",
            Self::InvalidPoint(_) => "invalid_point",
            Self::Crashed(_) => "worker_crashed",
        }
    }
}

/// Turns one parameter point into its final-timestep result.
///
/// Implementations must be stateless across calls: the queue may run the same
/// point more than once.
pub trait SimulationWorker: Send + Sync {
    fn simulate(&self, point: &ParameterPoint) -> Result<SimulationResult, WorkerError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PendulumWorker;

impl SimulationWorker for PendulumWorker {
    fn simulate(&self, point: &ParameterPoint) -> Result<SimulationResult, WorkerError> {
        simulate_point(point)
    }
}

pub fn simulate_point(point: &ParameterPoint) -> Result<SimulationResult, WorkerError> {
    let constants = point.constants();
    for (name, value) in [
        ("l1", constants.l1),
        ("l2", constants.l2),
        ("m1", constants.m1),
        ("m2", constants.m2),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(WorkerError::InvalidPoint(format!(
                "'{name}' must be a positive number"
            )));
        }
    }

    let initial = [point.theta1_init, 0.0, point.theta2_init, 0.0];
    let divergence = |time: f64| WorkerError::NumericDivergence {
        theta1_init: point.theta1_init,
        theta2_init: point.theta2_init,
        time,
    };

    let [theta1, _, theta2, _] = integrate_final_state(
        |state| derivatives(&constants, state),
        initial,
        point.tmax,
        point.dt,
    )
    .map_err(|error| match error {
        IntegrationError::InvalidSchedule(message) => WorkerError::InvalidPoint(message),
        IntegrationError::NonFinite { time } => divergence(time),
    })?;

    let positions = bob_positions(&constants, theta1, theta2);
    let result = SimulationResult {
        theta1_init: point.theta1_init,
        theta2_init: point.theta2_init,
        theta1_final: theta1,
        theta2_final: theta2,
        x1_final: positions.x1,
        y1_final: positions.y1,
        x2_final: positions.x2,
        y2_final: positions.y2,
    };

    let outputs = [
        result.x1_final,
        result.y1_final,
        result.x2_final,
        result.y2_final,
    ];
    if outputs.iter().any(|value| !value.is_finite()) {
        return Err(divergence(point.tmax));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    fn point(theta1_init: f64, theta2_init: f64, tmax: f64, dt: f64) -> ParameterPoint {
        ParameterPoint {
            l1: 1.0,
            l2: 1.0,
            m1: 1.0,
            m2: 1.0,
            tmax,
            dt,
            theta1_init,
            theta2_init,
        }
    }

    #[test]
    fn equilibrium_stays_at_rest_for_any_horizon() {
        for (tmax, dt) in [(1.0, 0.5), (30.0, 0.01), (2.5, 0.3), (0.0, 0.1)] {
            let result = simulate_point(&point(0.0, 0.0, tmax, dt)).expect("equilibrium integrates");

            assert_eq!(result.theta1_final, 0.0);
            assert_eq!(result.theta2_final, 0.0);
            assert_eq!(result.x1_final, 0.0);
            assert_eq!(result.y1_final, -1.0);
            assert_eq!(result.x2_final, 0.0);
            assert_eq!(result.y2_final, -2.0);
        }
    }

    #[test]
    fn result_echoes_initial_angles() {
        let result = simulate_point(&point(PI, 0.5, 1.0, 0.5)).expect("point integrates");
        assert_eq!(result.initial_angles(), (PI, 0.5));
    }

    #[test]
    fn positions_agree_with_final_angles() {
        let result = simulate_point(&point(1.2, -0.7, 1.0, 0.01)).expect("point integrates");

        assert!((result.x1_final - result.theta1_final.sin()).abs() < 1e-12);
        assert!((result.y1_final + result.theta1_final.cos()).abs() < 1e-12);
        assert!(
            (result.x2_final - result.x1_final - result.theta2_final.sin()).abs() < 1e-12
        );
        assert!(
            (result.y2_final - result.y1_final + result.theta2_final.cos()).abs() < 1e-12
        );
    }

    #[test]
    fn integration_is_deterministic() {
        let target = point(2.0, 1.0, 3.0, 0.01);
        assert_eq!(simulate_point(&target), simulate_point(&target));
    }

    #[test]
    fn non_finite_initial_state_is_reported_as_divergence() {
        let error = simulate_point(&point(f64::INFINITY, 0.0, 1.0, 0.5))
            .expect_err("point should diverge");

        assert!(matches!(error, WorkerError::NumericDivergence { .. }));
        assert!(!error.is_retryable());
        assert_eq!(error.code(), "numeric_divergence");
    }

    #[test]
    fn rejects_non_positive_step_as_invalid_point() {
        let error = simulate_point(&point(0.0, 0.0, 1.0, 0.0)).expect_err("point should fail");
        assert!(matches!(error, WorkerError::InvalidPoint(_)));
    }

    #[test]
    fn only_crashes_are_retryable() {
        assert!(WorkerError::Crashed("panic".to_string()).is_retryable());
        assert!(!WorkerError::InvalidPoint("dt".to_string()).is_retryable());
    }
}
