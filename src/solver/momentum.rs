use super::params::SolverParams;
use crate::flags::FlagField;
use crate::state::{Field, SimState};

/// Adaptive time step from the diffusive and CFL limits, scaled by `tau`.
/// A non-positive `tau` keeps the configured `dt`.
pub fn compute_dt(params: &SolverParams, dx: f64, dy: f64, u: &Field, v: &Field) -> f64 {
    if params.tau <= 0.0 {
        return params.dt;
    }
    let umax = u.as_slice().iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let vmax = v.as_slice().iter().fold(0.0_f64, |m, x| m.max(x.abs()));

    let mut limit = params.re / 2.0 / (1.0 / (dx * dx) + 1.0 / (dy * dy));
    if umax > 0.0 {
        limit = limit.min(dx / umax);
    }
    if vmax > 0.0 {
        limit = limit.min(dy / vmax);
    }
    params.tau * limit
}

/// Tentative velocities F and G: explicit diffusion, donor-cell convection
/// blended by `alpha`, and body forces. Only faces between two fluid cells
/// are integrated; every other face keeps its current velocity.
pub fn compute_fg(params: &SolverParams, dt: f64, dx: f64, dy: f64, flags: &FlagField, state: &mut SimState) {
    let imax = state.imax;
    let jmax = state.jmax;
    let alpha = params.alpha;
    let re = params.re;
    let SimState { u, v, f, g, .. } = state;

    for j in 1..=jmax {
        f[(0, j)] = u[(0, j)];
        f[(imax, j)] = u[(imax, j)];
    }
    for i in 1..=imax {
        g[(i, 0)] = v[(i, 0)];
        g[(i, jmax)] = v[(i, jmax)];
    }

    for i in 1..imax {
        for j in 1..=jmax {
            if !(flags.is_fluid(i, j) && flags.is_fluid(i + 1, j)) {
                f[(i, j)] = u[(i, j)];
                continue;
            }
            let uc = u[(i, j)];
            let d2udx2 = (u[(i + 1, j)] - 2.0 * uc + u[(i - 1, j)]) / (dx * dx);
            let d2udy2 = (u[(i, j + 1)] - 2.0 * uc + u[(i, j - 1)]) / (dy * dy);

            let ue = uc + u[(i + 1, j)];
            let uw = u[(i - 1, j)] + uc;
            let du2dx = ((ue / 2.0).powi(2) - (uw / 2.0).powi(2)) / dx
                + alpha / dx
                    * (ue.abs() / 2.0 * (uc - u[(i + 1, j)]) / 2.0
                        - uw.abs() / 2.0 * (u[(i - 1, j)] - uc) / 2.0);

            let vn = v[(i, j)] + v[(i + 1, j)];
            let vs = v[(i, j - 1)] + v[(i + 1, j - 1)];
            let duvdy = (vn / 2.0 * (uc + u[(i, j + 1)]) / 2.0 - vs / 2.0 * (u[(i, j - 1)] + uc) / 2.0) / dy
                + alpha / dy
                    * (vn.abs() / 2.0 * (uc - u[(i, j + 1)]) / 2.0
                        - vs.abs() / 2.0 * (u[(i, j - 1)] - uc) / 2.0);

            f[(i, j)] = uc + dt * ((d2udx2 + d2udy2) / re - du2dx - duvdy + params.gx);
        }
    }

    for i in 1..=imax {
        for j in 1..jmax {
            if !(flags.is_fluid(i, j) && flags.is_fluid(i, j + 1)) {
                g[(i, j)] = v[(i, j)];
                continue;
            }
            let vc = v[(i, j)];
            let d2vdx2 = (v[(i + 1, j)] - 2.0 * vc + v[(i - 1, j)]) / (dx * dx);
            let d2vdy2 = (v[(i, j + 1)] - 2.0 * vc + v[(i, j - 1)]) / (dy * dy);

            let ue = u[(i, j)] + u[(i, j + 1)];
            let uw = u[(i - 1, j)] + u[(i - 1, j + 1)];
            let duvdx = (ue / 2.0 * (vc + v[(i + 1, j)]) / 2.0 - uw / 2.0 * (v[(i - 1, j)] + vc) / 2.0) / dx
                + alpha / dx
                    * (ue.abs() / 2.0 * (vc - v[(i + 1, j)]) / 2.0
                        - uw.abs() / 2.0 * (v[(i - 1, j)] - vc) / 2.0);

            let vn = vc + v[(i, j + 1)];
            let vs = v[(i, j - 1)] + vc;
            let dv2dy = ((vn / 2.0).powi(2) - (vs / 2.0).powi(2)) / dy
                + alpha / dy
                    * (vn.abs() / 2.0 * (vc - v[(i, j + 1)]) / 2.0
                        - vs.abs() / 2.0 * (v[(i, j - 1)] - vc) / 2.0);

            g[(i, j)] = vc + dt * ((d2vdx2 + d2vdy2) / re - duvdx - dv2dy + params.gy);
        }
    }
}

/// Right-hand side of the pressure equation on fluid cells.
pub fn compute_rhs(dt: f64, dx: f64, dy: f64, flags: &FlagField, state: &mut SimState) {
    let SimState { f, g, rhs, .. } = state;
    for i in 1..=flags.imax() {
        for j in 1..=flags.jmax() {
            rhs[(i, j)] = if flags.is_fluid(i, j) {
                ((f[(i, j)] - f[(i - 1, j)]) / dx + (g[(i, j)] - g[(i, j - 1)]) / dy) / dt
            } else {
                0.0
            };
        }
    }
}

/// Project F and G onto the new pressure gradient.
pub fn update_velocity(dt: f64, dx: f64, dy: f64, flags: &FlagField, state: &mut SimState) {
    let imax = state.imax;
    let jmax = state.jmax;
    let SimState { u, v, p, f, g, .. } = state;
    for i in 1..imax {
        for j in 1..=jmax {
            if flags.is_fluid(i, j) && flags.is_fluid(i + 1, j) {
                u[(i, j)] = f[(i, j)] - dt / dx * (p[(i + 1, j)] - p[(i, j)]);
            }
        }
    }
    for i in 1..=imax {
        for j in 1..jmax {
            if flags.is_fluid(i, j) && flags.is_fluid(i, j + 1) {
                v[(i, j)] = g[(i, j)] - dt / dy * (p[(i, j + 1)] - p[(i, j)]);
            }
        }
    }
}
