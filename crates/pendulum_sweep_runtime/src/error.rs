use pendulum_sim::WorkerError;
use pendulum_sweep_core::contract::ValidationError;

pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// The `started` marker already exists. Resetting it is an operator action.
    #[error("computations have already been seeded{}", recorded_at_suffix(.recorded_at))]
    AlreadySeeded { recorded_at: Option<String> },

    #[error("numeric divergence: {0}")]
    NumericDivergence(#[source] WorkerError),

    #[error("incomplete sweep: {completed}/{expected} jobs completed ({reason})")]
    IncompleteSweep {
        expected: usize,
        completed: usize,
        reason: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadySeeded { .. } => "already_seeded",
            Self::NumericDivergence(_) => "numeric_divergence",
            Self::IncompleteSweep { .. } => "incomplete_sweep",
            Self::Transport(_) => "transport_error",
            Self::Validation(_) => "validation_error",
            Self::Io(_) => "io_error",
            Self::Csv(_) => "csv_error",
            Self::Json(_) => "json_error",
        }
    }

    pub fn incomplete(expected: usize, completed: usize, reason: impl Into<String>) -> Self {
        Self::IncompleteSweep {
            expected,
            completed,
            reason: reason.into(),
        }
    }

    /// Maps a worker failure that ended a sweep of `expected` points.
    pub fn from_worker(error: WorkerError, expected: usize, completed: usize) -> Self {
        match error {
            WorkerError::NumericDivergence { .. } => Self::NumericDivergence(error),
            other => Self::incomplete(expected, completed, other.to_string()),
        }
    }
}

fn recorded_at_suffix(recorded_at: &Option<String>) -> String {
    match recorded_at {
        Some(timestamp) => format!(" (started at {timestamp})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_seeded_message_includes_timestamp_when_known() {
        let error = SweepError::AlreadySeeded {
            recorded_at: Some("2026-10-14T09:30:00".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "computations have already been seeded (started at 2026-10-14T09:30:00)"
        );

        let unknown = SweepError::AlreadySeeded { recorded_at: None };
        assert_eq!(unknown.to_string(), "computations have already been seeded");
    }

    #[test]
    fn worker_divergence_maps_to_numeric_divergence() {
        let error = SweepError::from_worker(
            WorkerError::NumericDivergence {
                theta1_init: 1.0,
                theta2_init: 2.0,
                time: 0.5,
            },
            4,
            0,
        );
        assert_eq!(error.code(), "numeric_divergence");

        let crashed = SweepError::from_worker(WorkerError::Crashed("boom".to_string()), 4, 1);
        assert_eq!(crashed.code(), "incomplete_sweep");
    }

    #[test]
    fn incomplete_sweep_reports_progress() {
        let error = SweepError::incomplete(4, 3, "sweep deadline elapsed");
        assert_eq!(
            error.to_string(),
            "incomplete sweep: 3/4 jobs completed (sweep deadline elapsed)"
        );
    }
}
