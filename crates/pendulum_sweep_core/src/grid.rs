use std::f64::consts::TAU;

use crate::contract::{ParameterPoint, PendulumConstants, SweepConfig};

/// Evenly spaced samples over `[start, stop]`, inclusive of both endpoints.
///
/// A single sample yields `start`. The final sample is exactly `stop`.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|idx| start + idx as f64 * step).collect();
            values[count - 1] = stop;
            values
        }
    }
}

/// Lazy, restartable iterator over the initial-angle grid.
///
/// Points are produced with `theta1_init` in the outer loop and
/// `theta2_init` in the inner loop, both ascending.
#[derive(Debug, Clone)]
pub struct ThetaGrid {
    constants: PendulumConstants,
    tmax: f64,
    dt: f64,
    thetas: Vec<f64>,
    cursor: usize,
}

impl ThetaGrid {
    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    pub fn total_points(&self) -> usize {
        self.thetas.len() * self.thetas.len()
    }

    /// Returns a fresh iterator positioned at the first point.
    pub fn restart(&self) -> Self {
        Self {
            cursor: 0,
            ..self.clone()
        }
    }

    fn point_at(&self, index: usize) -> ParameterPoint {
        let resolution = self.thetas.len();
        ParameterPoint {
            l1: self.constants.l1,
            l2: self.constants.l2,
            m1: self.constants.m1,
            m2: self.constants.m2,
            tmax: self.tmax,
            dt: self.dt,
            theta1_init: self.thetas[index / resolution],
            theta2_init: self.thetas[index % resolution],
        }
    }
}

impl Iterator for ThetaGrid {
    type Item = ParameterPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.total_points() {
            return None;
        }
        let point = self.point_at(self.cursor);
        self.cursor += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_points().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ThetaGrid {}

pub fn parameter_sweep(
    constants: PendulumConstants,
    tmax: f64,
    dt: f64,
    theta_resolution: usize,
) -> ThetaGrid {
    ThetaGrid {
        constants,
        tmax,
        dt,
        thetas: linspace(0.0, TAU, theta_resolution),
        cursor: 0,
    }
}

pub fn theta_grid(config: &SweepConfig) -> ThetaGrid {
    parameter_sweep(
        config.constants,
        config.tmax,
        config.dt,
        config.theta_resolution,
    )
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use proptest::prelude::*;

    use super::*;

    fn config(theta_resolution: usize) -> SweepConfig {
        SweepConfig {
            theta_resolution,
            tmax: 1.0,
            dt: 0.5,
            constants: PendulumConstants::default(),
        }
    }

    #[test]
    fn linspace_includes_both_endpoints() {
        assert_eq!(linspace(0.0, TAU, 2), vec![0.0, TAU]);
        assert_eq!(linspace(0.0, TAU, 3), vec![0.0, PI, TAU]);
        assert_eq!(linspace(0.0, TAU, 1), vec![0.0]);
        assert!(linspace(0.0, TAU, 0).is_empty());
    }

    #[test]
    fn grid_order_is_theta1_outer_theta2_inner() {
        let pairs: Vec<(f64, f64)> = theta_grid(&config(2))
            .map(|point| (point.theta1_init, point.theta2_init))
            .collect();

        assert_eq!(pairs, vec![(0.0, 0.0), (0.0, TAU), (TAU, 0.0), (TAU, TAU)]);
    }

    #[test]
    fn grid_carries_constants_and_timing() {
        let point = theta_grid(&config(2)).next().expect("grid should not be empty");

        assert_eq!(point.tmax, 1.0);
        assert_eq!(point.dt, 0.5);
        assert_eq!(point.constants(), PendulumConstants::default());
    }

    #[test]
    fn grid_is_restartable_and_reproducible() {
        let mut grid = theta_grid(&config(3));
        let first_pass: Vec<ParameterPoint> = grid.by_ref().collect();
        assert_eq!(grid.len(), 0);

        let second_pass: Vec<ParameterPoint> = grid.restart().collect();
        assert_eq!(first_pass, second_pass);
    }

    proptest! {
        #[test]
        fn grid_yields_resolution_squared_distinct_points(resolution in 1usize..24) {
            let grid = theta_grid(&config(resolution));
            prop_assert_eq!(grid.len(), resolution * resolution);

            let thetas = linspace(0.0, TAU, resolution);
            let points: Vec<ParameterPoint> = grid.collect();
            prop_assert_eq!(points.len(), resolution * resolution);

            let mut keys: Vec<(u64, u64)> = points
                .iter()
                .map(|point| (point.theta1_init.to_bits(), point.theta2_init.to_bits()))
                .collect();
            keys.sort_unstable();
            keys.dedup();
            prop_assert_eq!(keys.len(), resolution * resolution);

            for point in &points {
                prop_assert!(thetas.contains(&point.theta1_init));
                prop_assert!(thetas.contains(&point.theta2_init));
            }
        }
    }
}
