// Legacy VTK frames and the JSON run manifest.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::flags::FlagField;
use crate::state::SimState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    pub imax: usize,
    pub jmax: usize,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub step: u64,
    pub time: f64,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub problem: String,
    pub grid: GridInfo,
    pub frames: Vec<FrameEntry>,
}

impl Manifest {
    pub fn write(&self, path: &Path) -> FlowResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| FlowError::Output(e.to_string()))?;
        fs::write(path, json).map_err(|e| FlowError::io(path, e))
    }
}

/// Write one frame as a legacy ASCII VTK structured-points file.
///
/// Velocity is interpolated to the `(imax+1) x (jmax+1)` cell corners; pressure
/// and the fluid mask are written per cell.
pub fn write_vtk(path: &Path, state: &SimState, flags: &FlagField, dx: f64, dy: f64) -> FlowResult<()> {
    let file = File::create(path).map_err(|e| FlowError::io(path, e))?;
    let mut w = BufWriter::new(file);
    write_vtk_to(&mut w, state, flags, dx, dy).map_err(|e| FlowError::io(path, e))?;
    w.flush().map_err(|e| FlowError::io(path, e))
}

fn write_vtk_to(w: &mut impl Write, state: &SimState, flags: &FlagField, dx: f64, dy: f64) -> std::io::Result<()> {
    let (imax, jmax) = (state.imax, state.jmax);
    let (u, v, p) = (&state.u, &state.v, &state.p);

    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "flagflow {}x{}", imax, jmax)?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET STRUCTURED_POINTS")?;
    writeln!(w, "DIMENSIONS {} {} 1", imax + 1, jmax + 1)?;
    writeln!(w, "ORIGIN 0 0 0")?;
    writeln!(w, "SPACING {} {} 1", dx, dy)?;

    writeln!(w, "POINT_DATA {}", (imax + 1) * (jmax + 1))?;
    writeln!(w, "VECTORS velocity double")?;
    for j in 0..=jmax {
        for i in 0..=imax {
            let un = 0.5 * (u[(i, j)] + u[(i, j + 1)]);
            let vn = 0.5 * (v[(i, j)] + v[(i + 1, j)]);
            writeln!(w, "{} {} 0", un, vn)?;
        }
    }

    writeln!(w, "CELL_DATA {}", imax * jmax)?;
    writeln!(w, "SCALARS pressure double 1")?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for j in 1..=jmax {
        for i in 1..=imax {
            writeln!(w, "{}", p[(i, j)])?;
        }
    }
    writeln!(w, "SCALARS fluid int 1")?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for j in 1..=jmax {
        for i in 1..=imax {
            writeln!(w, "{}", u8::from(flags.is_fluid(i, j)))?;
        }
    }
    Ok(())
}

/// Output directory of one run: numbered VTK frames plus `manifest.json`.
pub struct FrameWriter {
    dir: PathBuf,
    manifest: Manifest,
}

impl FrameWriter {
    pub fn create(dir: impl AsRef<Path>, problem: &str, grid: GridInfo) -> FlowResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| FlowError::io(&dir, e))?;
        Ok(Self {
            dir,
            manifest: Manifest {
                problem: problem.to_string(),
                grid,
                frames: Vec::new(),
            },
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn write_frame(&mut self, step: u64, time: f64, state: &SimState, flags: &FlagField) -> FlowResult<PathBuf> {
        let file = format!("{}_{:06}.vtk", self.manifest.problem, step);
        let path = self.dir.join(&file);
        write_vtk(&path, state, flags, self.manifest.grid.dx, self.manifest.grid.dy)?;
        self.manifest.frames.push(FrameEntry { step, time, file });
        Ok(path)
    }

    /// Write `manifest.json` and return its path.
    pub fn finish(&self) -> FlowResult<PathBuf> {
        let path = self.dir.join("manifest.json");
        self.manifest.write(&path)?;
        Ok(path)
    }
}
