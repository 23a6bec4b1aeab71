use log::{debug, warn};
use serde::Deserialize;

use super::boundary::{EdgePressure, EdgePressures};
use crate::error::{FlowError, FlowResult};
use crate::flags::{CellKind, FlagField, NeighborPattern};
use crate::state::Field;

/// Visiting order of the relaxation sweep.
///
/// The order is part of the algorithm: with in-place updates each cell reads
/// neighbours already relaxed in the same sweep, so the two orders follow
/// different iteration trajectories and are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOrder {
    /// `i` outer, `j` inner, every interior cell once.
    #[default]
    Lexicographic,
    /// Fluid cells with even `i + j`, then odd, then the obstacle cells.
    RedBlack,
}

/// Settings of the pressure iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSolver {
    pub omega: f64,
    pub eps: f64,
    pub itermax: usize,
    pub order: SweepOrder,
}

/// Outcome of one pressure solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

fn check_shapes(p: &Field, rhs: &Field, flags: &FlagField) -> FlowResult<()> {
    for f in [p, rhs] {
        if !flags.covers(f) {
            return Err(FlowError::ShapeMismatch {
                expected: (flags.imax(), flags.jmax()),
                actual: (f.imax(), f.jmax()),
            });
        }
    }
    if flags.fluid_count() == 0 {
        return Err(FlowError::NoFluidCells);
    }
    Ok(())
}

#[inline(always)]
fn relax(p: &mut Field, rhs: &Field, i: usize, j: usize, omega: f64, coeff: f64, dx2: f64, dy2: f64) {
    p[(i, j)] = (1.0 - omega) * p[(i, j)]
        + coeff
            * ((p[(i + 1, j)] + p[(i - 1, j)]) / dx2 + (p[(i, j + 1)] + p[(i, j - 1)]) / dy2
                - rhs[(i, j)]);
}

/// Pressure of an obstacle cell from its fluid neighbours.
#[inline]
fn extrapolate(p: &mut Field, i: usize, j: usize, pattern: NeighborPattern) {
    use NeighborPattern::*;
    p[(i, j)] = match pattern {
        North => p[(i, j + 1)],
        South => p[(i, j - 1)],
        West => p[(i - 1, j)],
        East => p[(i + 1, j)],
        NorthEast => (p[(i + 1, j)] + p[(i, j + 1)]) / 2.0,
        NorthWest => (p[(i, j + 1)] + p[(i - 1, j)]) / 2.0,
        SouthEast => (p[(i, j - 1)] + p[(i + 1, j)]) / 2.0,
        SouthWest => (p[(i, j - 1)] + p[(i - 1, j)]) / 2.0,
        Invalid(_) => return,
    };
}

/// One SOR iteration in lexicographic order: relaxation sweep, edge pressure
/// pass and residual. Returns the residual normalised by the fluid-cell count.
pub fn sor_step(
    omega: f64,
    dx: f64,
    dy: f64,
    p: &mut Field,
    rhs: &Field,
    flags: &FlagField,
    edges: &EdgePressures,
) -> FlowResult<f64> {
    check_shapes(p, rhs, flags)?;
    let dx2 = dx * dx;
    let dy2 = dy * dy;
    let coeff = omega / (2.0 * (1.0 / dx2 + 1.0 / dy2));

    let mut count = 0usize;
    for i in 1..=flags.imax() {
        for j in 1..=flags.jmax() {
            match flags.kind(i, j) {
                CellKind::Fluid => {
                    relax(p, rhs, i, j, omega, coeff, dx2, dy2);
                    count += 1;
                }
                CellKind::Obstacle(pattern) => extrapolate(p, i, j, pattern),
                CellKind::Solid => {}
            }
        }
    }

    set_pressure_boundaries(p, flags, edges);
    normalized_residual(p, rhs, flags, dx, dy, count)
}

/// Red-black variant of [`sor_step`]. Within one colour no fluid cell reads
/// another cell of the same colour, so each pass is order independent.
pub fn red_black_step(
    omega: f64,
    dx: f64,
    dy: f64,
    p: &mut Field,
    rhs: &Field,
    flags: &FlagField,
    edges: &EdgePressures,
) -> FlowResult<f64> {
    check_shapes(p, rhs, flags)?;
    let dx2 = dx * dx;
    let dy2 = dy * dy;
    let coeff = omega / (2.0 * (1.0 / dx2 + 1.0 / dy2));

    let mut count = 0usize;
    for parity in 0..2 {
        for i in 1..=flags.imax() {
            for j in 1..=flags.jmax() {
                if (i + j) % 2 == parity && flags.kind(i, j) == CellKind::Fluid {
                    relax(p, rhs, i, j, omega, coeff, dx2, dy2);
                    count += 1;
                }
            }
        }
    }
    for i in 1..=flags.imax() {
        for j in 1..=flags.jmax() {
            if let CellKind::Obstacle(pattern) = flags.kind(i, j) {
                extrapolate(p, i, j, pattern);
            }
        }
    }

    set_pressure_boundaries(p, flags, edges);
    normalized_residual(p, rhs, flags, dx, dy, count)
}

/// Ghost pressure on the four outer edges. Top and bottom copy the interior;
/// left and right copy unless the flag field marks a pressure condition.
pub fn set_pressure_boundaries(p: &mut Field, flags: &FlagField, edges: &EdgePressures) {
    let imax = flags.imax();
    let jmax = flags.jmax();
    for i in 1..=imax {
        p[(i, 0)] = p[(i, 1)];
        p[(i, jmax + 1)] = p[(i, jmax)];
    }
    for j in 1..=jmax {
        p[(0, j)] = if flags.has_pressure_left(j) {
            match edges.left {
                EdgePressure::Dirichlet(lp) => 2.0 * lp - p[(1, j)],
                EdgePressure::Difference(dp) => 2.0 * dp - p[(1, j)],
                EdgePressure::ZeroGradient => p[(1, j)],
            }
        } else {
            p[(1, j)]
        };
        p[(imax + 1, j)] = if flags.has_pressure_right(j) {
            match edges.right {
                EdgePressure::Dirichlet(rp) => 2.0 * rp - p[(imax, j)],
                EdgePressure::Difference(_) => -p[(imax, j)],
                EdgePressure::ZeroGradient => p[(imax, j)],
            }
        } else {
            p[(imax, j)]
        };
    }
}

fn laplacian_defect(p: &Field, rhs: &Field, i: usize, j: usize, rdx2: f64, rdy2: f64) -> f64 {
    (p[(i + 1, j)] - 2.0 * p[(i, j)] + p[(i - 1, j)]) * rdx2
        + (p[(i, j + 1)] - 2.0 * p[(i, j)] + p[(i, j - 1)]) * rdy2
        - rhs[(i, j)]
}

fn normalized_residual(p: &Field, rhs: &Field, flags: &FlagField, dx: f64, dy: f64, count: usize) -> FlowResult<f64> {
    if count == 0 {
        return Err(FlowError::NoFluidCells);
    }
    let rdx2 = 1.0 / (dx * dx);
    let rdy2 = 1.0 / (dy * dy);
    let mut sum = 0.0;
    for i in 1..=flags.imax() {
        for j in 1..=flags.jmax() {
            if flags.is_fluid(i, j) {
                let r = laplacian_defect(p, rhs, i, j, rdx2, rdy2);
                sum += r * r;
            }
        }
    }
    Ok((sum / count as f64).sqrt())
}

/// Root-mean-square residual of the pressure equation over the fluid cells.
pub fn pressure_residual(p: &Field, rhs: &Field, flags: &FlagField, dx: f64, dy: f64) -> FlowResult<f64> {
    check_shapes(p, rhs, flags)?;
    normalized_residual(p, rhs, flags, dx, dy, flags.fluid_count())
}

impl PressureSolver {
    pub fn step(&self, dx: f64, dy: f64, p: &mut Field, rhs: &Field, flags: &FlagField, edges: &EdgePressures) -> FlowResult<f64> {
        match self.order {
            SweepOrder::Lexicographic => sor_step(self.omega, dx, dy, p, rhs, flags, edges),
            SweepOrder::RedBlack => red_black_step(self.omega, dx, dy, p, rhs, flags, edges),
        }
    }

    /// Iterate until the residual drops to `eps` or `itermax` sweeps ran.
    /// Hitting the iteration cap is reported, not treated as an error.
    pub fn solve(&self, dx: f64, dy: f64, p: &mut Field, rhs: &Field, flags: &FlagField, edges: &EdgePressures) -> FlowResult<SolveReport> {
        let mut residual = f64::INFINITY;
        let mut iterations = 0;
        while iterations < self.itermax && residual > self.eps {
            residual = self.step(dx, dy, p, rhs, flags, edges)?;
            iterations += 1;
        }
        let converged = residual <= self.eps;
        if converged {
            debug!("pressure converged after {} iterations, res={:.3e}", iterations, residual);
        } else {
            warn!(
                "pressure did not converge: res={:.3e} > eps={:.3e} after {} iterations",
                residual, self.eps, iterations
            );
        }
        Ok(SolveReport {
            iterations,
            residual,
            converged,
        })
    }
}
