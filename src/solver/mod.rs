mod boundary;
pub mod diagnostics;
mod momentum;
mod params;
mod sor;

// Re-export public API
pub use boundary::{
    apply_obstacle_velocity, apply_special_boundary, apply_velocity_boundaries, BoundaryConfig, EdgePressure,
    EdgePressures, InflowProfile, SpecialBoundary, WallType, Walls,
};
pub use momentum::{compute_dt, compute_fg, compute_rhs, update_velocity};
pub use params::SolverParams;
pub use sor::{
    pressure_residual, red_black_step, set_pressure_boundaries, sor_step, PressureSolver, SolveReport, SweepOrder,
};

use log::{debug, error};

use crate::config::Config;
use crate::error::{FlowError, FlowResult};
use crate::flags::FlagField;
use crate::geometry::Geometry;
use crate::state::SimState;

/// How forbidden obstacle cells are handled when building the flag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryPolicy {
    /// Reject the geometry with [`FlowError::InvalidGeometry`].
    #[default]
    Strict,
    /// Log each offending cell and run without a stencil for it.
    BestEffort,
}

/// Summary of one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: u64,
    pub time: f64,
    pub dt: f64,
    pub solve: SolveReport,
}

/// Owns the fields, the flag field and the parameters of one run.
pub struct Simulation {
    pub state: SimState,
    flags: FlagField,
    params: SolverParams,
    boundary: BoundaryConfig,
    dx: f64,
    dy: f64,
    time: f64,
    steps: u64,
}

impl Simulation {
    /// Build the flag field and initialise U, V, P on the fluid cells.
    pub fn new(
        geometry: &Geometry,
        dx: f64,
        dy: f64,
        params: SolverParams,
        boundary: BoundaryConfig,
        policy: GeometryPolicy,
        initial: (f64, f64, f64),
    ) -> FlowResult<Self> {
        let flags = match policy {
            GeometryPolicy::Strict => FlagField::build(geometry, &boundary.pressure)?,
            GeometryPolicy::BestEffort => {
                let flags = FlagField::compile_lenient(geometry, &boundary.pressure);
                if flags.fluid_count() == 0 {
                    return Err(FlowError::NoFluidCells);
                }
                flags
            }
        };
        let mut state = SimState::new(geometry.imax(), geometry.jmax());
        let (ui, vi, pi) = initial;
        state.init_uvp(ui, vi, pi, |i, j| flags.is_fluid(i, j));
        debug!(
            "flag field ready: {}x{} cells, {} fluid, {} forbidden",
            flags.imax(),
            flags.jmax(),
            flags.fluid_count(),
            flags.invalid_cells().len()
        );
        Ok(Self {
            state,
            flags,
            params,
            boundary,
            dx,
            dy,
            time: 0.0,
            steps: 0,
        })
    }

    /// Build from a validated configuration and a resolved geometry.
    pub fn from_config(config: &Config, geometry: &Geometry, policy: GeometryPolicy) -> FlowResult<Self> {
        if (geometry.imax(), geometry.jmax()) != (config.domain.imax, config.domain.jmax) {
            return Err(FlowError::ShapeMismatch {
                expected: (config.domain.imax, config.domain.jmax),
                actual: (geometry.imax(), geometry.jmax()),
            });
        }
        let (dx, dy) = config.spacing();
        let ph = &config.physics;
        Self::new(
            geometry,
            dx,
            dy,
            config.solver_params(),
            config.boundary_config(),
            policy,
            (ph.ui, ph.vi, ph.pi),
        )
    }

    pub fn flags(&self) -> &FlagField {
        &self.flags
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn boundary(&self) -> &BoundaryConfig {
        &self.boundary
    }

    pub fn spacing(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advance one time step.
    pub fn step(&mut self) -> FlowResult<StepReport> {
        let (dx, dy) = (self.dx, self.dy);
        let flags = &self.flags;
        let state = &mut self.state;

        // 1. Time step size
        let dt = compute_dt(&self.params, dx, dy, &state.u, &state.v);

        // 2. Outer walls and obstacles, then the problem-specific override
        apply_velocity_boundaries(flags, &self.boundary, &mut state.u, &mut state.v);
        apply_special_boundary(flags, &self.boundary.special, &mut state.u, &mut state.v);

        // 3. Tentative velocities and pressure right-hand side
        compute_fg(&self.params, dt, dx, dy, flags, state);
        compute_rhs(dt, dx, dy, flags, state);

        // 4. Pressure
        let solve = self
            .params
            .pressure_solver()
            .solve(dx, dy, &mut state.p, &state.rhs, flags, &self.boundary.pressure)?;

        // 5. New velocities
        update_velocity(dt, dx, dy, flags, state);

        self.time += dt;
        self.steps += 1;

        if state.has_non_finite() {
            error!("non-finite values after step {} (t={:.4})", self.steps, self.time);
            return Err(FlowError::Diverged { step: self.steps });
        }

        Ok(StepReport {
            step: self.steps,
            time: self.time,
            dt,
            solve,
        })
    }

    /// Step until `t_end` or `max_steps`, handing each report to `observer`.
    pub fn run(
        &mut self,
        t_end: f64,
        max_steps: Option<u64>,
        mut observer: impl FnMut(&Simulation, &StepReport) -> FlowResult<()>,
    ) -> FlowResult<u64> {
        let mut taken = 0;
        while self.time < t_end && max_steps.map_or(true, |m| taken < m) {
            let report = self.step()?;
            observer(self, &report)?;
            taken += 1;
        }
        Ok(taken)
    }
}
