use super::sor::{PressureSolver, SweepOrder};

/// Numerical parameters of the time loop.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverParams {
    /// Reynolds number.
    pub re: f64,
    pub gx: f64,
    pub gy: f64,
    /// Donor-cell blending factor in `[0, 1]`.
    pub alpha: f64,
    /// Safety factor of the adaptive time step; `<= 0` keeps `dt` fixed.
    pub tau: f64,
    pub dt: f64,
    /// SOR relaxation factor in `(0, 2)`.
    pub omega: f64,
    pub eps: f64,
    pub itermax: usize,
    pub order: SweepOrder,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            re: 100.0,
            gx: 0.0,
            gy: 0.0,
            alpha: 0.9,
            tau: 0.5,
            dt: 0.05,
            omega: 1.7,
            eps: 0.001,
            itermax: 100,
            order: SweepOrder::Lexicographic,
        }
    }
}

impl SolverParams {
    /// Lid-driven cavity at Re=1000.
    pub fn default_cavity() -> Self {
        Self {
            re: 1000.0,
            ..Self::default()
        }
    }

    /// Channel flows (step, obstacle) need more pressure iterations.
    pub fn default_channel() -> Self {
        Self {
            re: 100.0,
            itermax: 500,
            eps: 0.0001,
            ..Self::default()
        }
    }

    pub fn pressure_solver(&self) -> PressureSolver {
        PressureSolver {
            omega: self.omega,
            eps: self.eps,
            itermax: self.itermax,
            order: self.order,
        }
    }
}
