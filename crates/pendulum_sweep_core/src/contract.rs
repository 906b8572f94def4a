use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const CONTRACT_SCHEMA_VERSION: &str = "v1";
pub const MAX_THETA_RESOLUTION: usize = 500;
pub const MAX_TOTAL_PARAMETER_POINTS: usize = MAX_THETA_RESOLUTION * MAX_THETA_RESOLUTION;
pub const DEFAULT_THETA_RESOLUTION: usize = 2;
pub const DEFAULT_TIME_MAX: f64 = 30.0;
pub const DEFAULT_DTIME: f64 = 0.01;

/// Rod lengths (m) and bob masses (kg) shared by every point of a sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PendulumConstants {
    pub l1: f64,
    pub l2: f64,
    pub m1: f64,
    pub m2: f64,
}

impl Default for PendulumConstants {
    fn default() -> Self {
        Self {
            l1: 1.0,
            l2: 1.0,
            m1: 1.0,
            m2: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepConfig {
    pub theta_resolution: usize,
    pub tmax: f64,
    pub dt: f64,
    #[serde(default)]
    pub constants: PendulumConstants,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            theta_resolution: DEFAULT_THETA_RESOLUTION,
            tmax: DEFAULT_TIME_MAX,
            dt: DEFAULT_DTIME,
            constants: PendulumConstants::default(),
        }
    }
}

impl SweepConfig {
    pub fn total_points(&self) -> usize {
        self.theta_resolution.saturating_mul(self.theta_resolution)
    }
}

/// One independent simulation job. Identity is the full tuple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ParameterPoint {
    pub l1: f64,
    pub l2: f64,
    pub m1: f64,
    pub m2: f64,
    pub tmax: f64,
    pub dt: f64,
    pub theta1_init: f64,
    pub theta2_init: f64,
}

impl ParameterPoint {
    pub fn constants(&self) -> PendulumConstants {
        PendulumConstants {
            l1: self.l1,
            l2: self.l2,
            m1: self.m1,
            m2: self.m2,
        }
    }
}

/// Final-timestep state of one integrated point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub theta1_init: f64,
    pub theta2_init: f64,
    pub theta1_final: f64,
    pub theta2_final: f64,
    pub x1_final: f64,
    pub y1_final: f64,
    pub x2_final: f64,
    pub y2_final: f64,
}

impl SimulationResult {
    pub fn initial_angles(&self) -> (f64, f64) {
        (self.theta1_init, self.theta2_init)
    }
}

/// All results collected for one sweep request.
///
/// Results arrive in completion order, which is arbitrary. Consumers must
/// treat the set as a multiset.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    expected: usize,
    results: Vec<SimulationResult>,
}

impl ResultSet {
    pub fn with_expected(expected: usize) -> Self {
        Self {
            expected,
            results: Vec::with_capacity(expected),
        }
    }

    pub fn from_results(expected: usize, results: Vec<SimulationResult>) -> Self {
        Self { expected, results }
    }

    pub fn push(&mut self, result: SimulationResult) {
        self.results.push(result);
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() == self.expected
    }

    pub fn results(&self) -> &[SimulationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<SimulationResult> {
        self.results
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn validate_config(config: SweepConfig) -> Result<SweepConfig, ValidationError> {
    if config.theta_resolution == 0 {
        return Err(ValidationError::new(
            "theta_resolution must be a positive integer",
        ));
    }

    if config.theta_resolution > MAX_THETA_RESOLUTION {
        return Err(ValidationError::new(format!(
            "theta_resolution exceeds MAX_THETA_RESOLUTION={MAX_THETA_RESOLUTION} (>{MAX_TOTAL_PARAMETER_POINTS} points)"
        )));
    }

    if !config.tmax.is_finite() || config.tmax <= 0.0 {
        return Err(ValidationError::new("tmax must be a positive number"));
    }

    if !config.dt.is_finite() || config.dt <= 0.0 {
        return Err(ValidationError::new("dt must be a positive number"));
    }

    let constants = config.constants;
    for (name, value) in [
        ("l1", constants.l1),
        ("l2", constants.l2),
        ("m1", constants.m1),
        ("m2", constants.m2),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::new(format!(
                "Pendulum constant '{name}' must be a positive number"
            )));
        }
    }

    Ok(config)
}

pub fn config_fingerprint(config: &SweepConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CONTRACT_SCHEMA_VERSION);
    hasher.update(stable_contract_json(config));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
