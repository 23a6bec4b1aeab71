use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FlowError, FlowResult};
use crate::geometry::{Geometry, Preset};
use crate::solver::{BoundaryConfig, EdgePressures, SolverParams, SpecialBoundary, SweepOrder, WallType, Walls};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name written into the run manifest and output file names.
    pub problem: String,
    pub domain: DomainConfig,
    pub physics: PhysicsConfig,
    pub time: TimeConfig,
    pub solver: SolverConfig,
    pub boundary: BoundarySection,
    pub geometry: GeometryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub xlength: f64,
    pub ylength: f64,
    pub imax: usize,
    pub jmax: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub re: f64,
    pub gx: f64,
    pub gy: f64,
    /// Initial values on fluid cells.
    pub ui: f64,
    pub vi: f64,
    pub pi: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub t_end: f64,
    pub dt: f64,
    /// Safety factor of the adaptive step; `<= 0` uses `dt` as is.
    pub tau: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub omega: f64,
    pub eps: f64,
    pub itermax: usize,
    pub alpha: f64,
    pub sweep: SweepOrder,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BoundarySection {
    pub left: WallType,
    pub right: WallType,
    pub top: WallType,
    pub bottom: WallType,
    /// Fixed pressure on the left edge; negative or absent means unset.
    pub left_pressure: Option<f64>,
    pub right_pressure: Option<f64>,
    pub pressure_difference: f64,
    pub special: SpecialBoundary,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub preset: Preset,
    /// PGM bitmap; takes precedence over `preset`.
    pub pgm: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write a VTK frame every this many steps; 0 writes only the final state.
    pub every: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            problem: "cavity".to_string(),
            domain: DomainConfig::default(),
            physics: PhysicsConfig::default(),
            time: TimeConfig::default(),
            solver: SolverConfig::default(),
            boundary: BoundarySection::default(),
            geometry: GeometryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            xlength: 1.0,
            ylength: 1.0,
            imax: 50,
            jmax: 50,
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            re: 1000.0,
            gx: 0.0,
            gy: 0.0,
            ui: 0.0,
            vi: 0.0,
            pi: 0.0,
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            t_end: 5.0,
            dt: 0.02,
            tau: 0.5,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            omega: 1.7,
            eps: 0.001,
            itermax: 100,
            alpha: 0.9,
            sweep: SweepOrder::Lexicographic,
        }
    }
}

impl Default for BoundarySection {
    fn default() -> Self {
        Self {
            left: WallType::NoSlip,
            right: WallType::NoSlip,
            top: WallType::NoSlip,
            bottom: WallType::NoSlip,
            left_pressure: None,
            right_pressure: None,
            pressure_difference: 0.0,
            special: SpecialBoundary::MovingLid { velocity: 1.0 },
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            preset: Preset::Open,
            pgm: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { every: 0 }
    }
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> FlowResult<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> FlowResult<()> {
        let d = &self.domain;
        if d.imax < 1 || d.jmax < 1 {
            return Err(FlowError::config(format!(
                "grid must have at least one interior cell, got {}x{}",
                d.imax, d.jmax
            )));
        }
        if !(d.xlength > 0.0 && d.ylength > 0.0) {
            return Err(FlowError::config("domain lengths must be positive"));
        }
        if !(self.physics.re > 0.0) {
            return Err(FlowError::config("re must be positive"));
        }
        let s = &self.solver;
        if !(s.omega > 0.0 && s.omega < 2.0) {
            return Err(FlowError::config(format!("omega must lie in (0, 2), got {}", s.omega)));
        }
        if !(s.eps > 0.0) || s.itermax == 0 {
            return Err(FlowError::config("eps and itermax must be positive"));
        }
        if !(0.0..=1.0).contains(&s.alpha) {
            return Err(FlowError::config(format!("alpha must lie in [0, 1], got {}", s.alpha)));
        }
        if self.time.tau <= 0.0 && !(self.time.dt > 0.0) {
            return Err(FlowError::config("dt must be positive when tau is disabled"));
        }
        Ok(())
    }

    /// Cell size `(dx, dy)`.
    pub fn spacing(&self) -> (f64, f64) {
        (
            self.domain.xlength / self.domain.imax as f64,
            self.domain.ylength / self.domain.jmax as f64,
        )
    }

    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            re: self.physics.re,
            gx: self.physics.gx,
            gy: self.physics.gy,
            alpha: self.solver.alpha,
            tau: self.time.tau,
            dt: self.time.dt,
            omega: self.solver.omega,
            eps: self.solver.eps,
            itermax: self.solver.itermax,
            order: self.solver.sweep,
        }
    }

    pub fn boundary_config(&self) -> BoundaryConfig {
        let b = &self.boundary;
        BoundaryConfig {
            walls: Walls {
                left: b.left,
                right: b.right,
                top: b.top,
                bottom: b.bottom,
            },
            pressure: EdgePressures::from_values(b.left_pressure, b.right_pressure, b.pressure_difference),
            special: b.special,
        }
    }

    /// Resolve the obstacle bitmap: PGM file if configured, preset otherwise.
    pub fn geometry(&self) -> FlowResult<Geometry> {
        let (imax, jmax) = (self.domain.imax, self.domain.jmax);
        match &self.geometry.pgm {
            Some(path) => Geometry::from_pgm_file(path, imax, jmax),
            None => Ok(Geometry::preset(self.geometry.preset, imax, jmax)),
        }
    }
}

/// Read and validate a configuration file. Any failure is fatal.
pub fn load(path: &Path) -> FlowResult<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| FlowError::io(path, e))?;
    Config::from_yaml(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{EdgePressure, InflowProfile};

    #[test]
    fn test_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.problem, "cavity");
        assert_eq!(cfg.domain.xlength, 1.0);
        assert_eq!(cfg.domain.imax, 50);
        assert_eq!(cfg.domain.jmax, 50);
        assert_eq!(cfg.physics.re, 1000.0);
        assert_eq!(cfg.time.t_end, 5.0);
        assert_eq!(cfg.time.tau, 0.5);
        assert_eq!(cfg.solver.omega, 1.7);
        assert_eq!(cfg.solver.itermax, 100);
        assert_eq!(cfg.solver.sweep, SweepOrder::Lexicographic);
        assert_eq!(cfg.boundary.top, WallType::NoSlip);
        assert_eq!(cfg.boundary.special, SpecialBoundary::MovingLid { velocity: 1.0 });
        assert_eq!(cfg.geometry.preset, Preset::Open);
        assert!(cfg.geometry.pgm.is_none());
        assert_eq!(cfg.output.every, 0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "physics:\n  re: 100.0\nsolver:\n  omega: 1.5\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.physics.re, 100.0);
        assert_eq!(cfg.physics.gx, 0.0); // default
        assert_eq!(cfg.solver.omega, 1.5);
        assert_eq!(cfg.solver.eps, 0.001); // default
        assert_eq!(cfg.domain.imax, 50); // default
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
problem: step
domain:
  xlength: 15.0
  ylength: 1.5
  imax: 100
  jmax: 10
physics:
  re: 100.0
  gx: 0.0
  gy: 0.0
  ui: 1.0
  vi: 0.0
  pi: 0.0
time:
  t_end: 30.0
  dt: 0.02
  tau: 0.5
solver:
  omega: 1.8
  eps: 0.0001
  itermax: 500
  alpha: 0.5
  sweep: red_black
boundary:
  left: no_slip
  right: outflow
  top: free_slip
  bottom: no_slip
  right_pressure: 0.0
  pressure_difference: 0.0
  special:
    kind: inflow
    velocity: 1.0
    profile: parabolic
geometry:
  preset: step
output:
  every: 50
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.problem, "step");
        assert_eq!(cfg.domain.imax, 100);
        assert_eq!(cfg.physics.ui, 1.0);
        assert_eq!(cfg.time.t_end, 30.0);
        assert_eq!(cfg.solver.sweep, SweepOrder::RedBlack);
        assert_eq!(cfg.boundary.right, WallType::Outflow);
        assert_eq!(cfg.boundary.top, WallType::FreeSlip);
        assert_eq!(
            cfg.boundary.special,
            SpecialBoundary::Inflow {
                velocity: 1.0,
                profile: InflowProfile::Parabolic
            }
        );
        assert_eq!(cfg.geometry.preset, Preset::Step);
        assert_eq!(cfg.output.every, 50);

        let (dx, dy) = cfg.spacing();
        assert!((dx - 0.15).abs() < 1e-12);
        assert!((dy - 0.15).abs() < 1e-12);

        let bc = cfg.boundary_config();
        assert_eq!(bc.pressure.left, EdgePressure::ZeroGradient);
        assert_eq!(bc.pressure.right, EdgePressure::Dirichlet(0.0));

        let params = cfg.solver_params();
        assert_eq!(params.itermax, 500);
        assert_eq!(params.alpha, 0.5);
        assert_eq!(params.order, SweepOrder::RedBlack);
    }

    #[test]
    fn test_pressure_precedence() {
        let yaml = "boundary:\n  left_pressure: -1.0\n  right_pressure: 2.0\n  pressure_difference: 0.5\n";
        let bc = Config::from_yaml(yaml).unwrap().boundary_config();
        assert_eq!(bc.pressure.left, EdgePressure::Difference(0.5), "negative value means unset");
        assert_eq!(bc.pressure.right, EdgePressure::Dirichlet(2.0));
    }

    #[test]
    fn test_special_none() {
        let yaml = "boundary:\n  special:\n    kind: none\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.boundary.special, SpecialBoundary::None);
    }

    #[test]
    fn test_invalid_omega_rejected() {
        let err = Config::from_yaml("solver:\n  omega: 2.0\n").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_zero_grid_rejected() {
        let err = Config::from_yaml("domain:\n  imax: 0\n").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let err = Config::from_yaml("solver: [1, 2").unwrap_err();
        assert!(matches!(err, FlowError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = load(Path::new("/nonexistent/flagflow.yaml")).unwrap_err();
        assert!(matches!(err, FlowError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "domain:\n  imax: 8\n  jmax: 4\ngeometry:\n  preset: block\n").unwrap();
        let cfg = load(&path).unwrap();
        let g = cfg.geometry().unwrap();
        assert_eq!((g.imax(), g.jmax()), (8, 4));
        assert!(g.fluid_count() < 32);
    }
}
