//! Equations of motion for a planar double pendulum.

use pendulum_sweep_core::contract::PendulumConstants;

/// Gravitational acceleration (m.s-2).
pub const GRAVITY: f64 = 9.81;

/// `[theta1, z1, theta2, z2]`, where `z` is the angular velocity.
pub type State = [f64; 4];

/// First derivatives of `[theta1, z1, theta2, z2]`.
pub fn derivatives(constants: &PendulumConstants, state: &State) -> State {
    let PendulumConstants { l1, l2, m1, m2 } = *constants;
    let [theta1, z1, theta2, z2] = *state;

    let delta = theta1 - theta2;
    let (s, c) = delta.sin_cos();
    let denominator = m1 + m2 * s * s;

    let z1_dot = (m2 * GRAVITY * theta2.sin() * c
        - m2 * s * (l1 * z1 * z1 * c + l2 * z2 * z2)
        - (m1 + m2) * GRAVITY * theta1.sin())
        / (l1 * denominator);
    let z2_dot = ((m1 + m2) * (l1 * z1 * z1 * s - GRAVITY * theta2.sin()
        + GRAVITY * theta1.sin() * c)
        + m2 * l2 * z2 * z2 * s * c)
        / (l2 * denominator);

    [z1, z1_dot, z2, z2_dot]
}

/// Cartesian bob positions with the pivot at the origin and `y` pointing up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BobPositions {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

pub fn bob_positions(constants: &PendulumConstants, theta1: f64, theta2: f64) -> BobPositions {
    let x1 = constants.l1 * theta1.sin();
    let y1 = -constants.l1 * theta1.cos();
    BobPositions {
        x1,
        y1,
        x2: x1 + constants.l2 * theta2.sin(),
        y2: y1 - constants.l2 * theta2.cos(),
    }
}

/// Total mechanical energy, used to check integrator drift.
pub fn total_energy(constants: &PendulumConstants, state: &State) -> f64 {
    let PendulumConstants { l1, l2, m1, m2 } = *constants;
    let [theta1, z1, theta2, z2] = *state;

    let kinetic = 0.5 * (m1 + m2) * l1 * l1 * z1 * z1
        + 0.5 * m2 * l2 * l2 * z2 * z2
        + m2 * l1 * l2 * z1 * z2 * (theta1 - theta2).cos();
    let potential = -(m1 + m2) * l1 * GRAVITY * theta1.cos() - m2 * l2 * GRAVITY * theta2.cos();
    kinetic + potential
}
