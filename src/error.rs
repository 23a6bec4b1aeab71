use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type FlowResult<T> = Result<T, FlowError>;

/// Obstacle cell whose fluid-neighbour pattern has no boundary stencil.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidCell {
    pub i: usize,
    pub j: usize,
    /// Raw neighbour bits (N=1, S=2, W=4, E=8).
    pub bits: u8,
}

impl fmt::Display for InvalidCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) [{}]", self.i, self.j, describe_bits(self.bits))
    }
}

fn describe_bits(bits: u8) -> String {
    let names: Vec<&str> = [(1, "N"), (2, "S"), (4, "W"), (8, "E")]
        .iter()
        .filter(|(b, _)| bits & b != 0)
        .map(|(_, n)| *n)
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join("|")
    }
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid PGM image: {0}")]
    Pgm(String),

    #[error("flag field contains {} forbidden boundary cell(s): {}", .cells.len(), format_cells(.cells))]
    InvalidGeometry { cells: Vec<InvalidCell> },

    #[error("domain contains no fluid cells")]
    NoFluidCells,

    #[error("field shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("simulation diverged: non-finite values after step {step}")]
    Diverged { step: u64 },

    #[error("failed to write output: {0}")]
    Output(String),
}

fn format_cells(cells: &[InvalidCell]) -> String {
    const SHOWN: usize = 16;
    let mut s: Vec<String> = cells.iter().take(SHOWN).map(|c| c.to_string()).collect();
    if cells.len() > SHOWN {
        s.push(format!("... and {} more", cells.len() - SHOWN));
    }
    s.join(", ")
}

impl FlowError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn pgm(msg: impl Into<String>) -> Self {
        Self::Pgm(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_geometry_lists_coordinates() {
        let err = FlowError::InvalidGeometry {
            cells: vec![
                InvalidCell { i: 2, j: 3, bits: 3 },
                InvalidCell { i: 5, j: 1, bits: 12 },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 forbidden"), "got: {}", msg);
        assert!(msg.contains("(2, 3) [N|S]"), "got: {}", msg);
        assert!(msg.contains("(5, 1) [W|E]"), "got: {}", msg);
    }

    #[test]
    fn test_invalid_geometry_truncates_long_lists() {
        let cells = (0..20).map(|k| InvalidCell { i: k, j: 1, bits: 15 }).collect();
        let msg = FlowError::InvalidGeometry { cells }.to_string();
        assert!(msg.contains("... and 4 more"), "got: {}", msg);
    }
}
