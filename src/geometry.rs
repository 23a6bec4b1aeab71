// Fluid/obstacle bitmaps: PGM reader and built-in presets.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{FlowError, FlowResult};

/// Binary fluid/obstacle classification of the interior cells.
///
/// Indices are 1-based like the flag field: `(1, 1)` is the bottom-left
/// interior cell, `(imax, jmax)` the top-right one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    imax: usize,
    jmax: usize,
    fluid: Vec<bool>,
}

/// Built-in geometries selectable from the configuration file.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// No obstacles.
    Open,
    /// Backward-facing step occupying the lower half of the first `imax/8` columns
    /// (at least two).
    Step,
    /// Square 2x2-or-larger block centred at one fifth of the channel length.
    Block,
}

impl Geometry {
    pub fn all_fluid(imax: usize, jmax: usize) -> Self {
        Self {
            imax,
            jmax,
            fluid: vec![true; imax * jmax],
        }
    }

    pub fn imax(&self) -> usize {
        self.imax
    }

    pub fn jmax(&self) -> usize {
        self.jmax
    }

    /// Fluid test with 1-based interior indices. Anything outside the interior
    /// (ghost layer or beyond) is not fluid.
    pub fn is_fluid(&self, i: usize, j: usize) -> bool {
        if i == 0 || j == 0 || i > self.imax || j > self.jmax {
            return false;
        }
        self.fluid[(j - 1) * self.imax + (i - 1)]
    }

    pub fn set_fluid(&mut self, i: usize, j: usize, fluid: bool) {
        assert!(
            (1..=self.imax).contains(&i) && (1..=self.jmax).contains(&j),
            "geometry cell ({}, {}) outside interior",
            i,
            j
        );
        self.fluid[(j - 1) * self.imax + (i - 1)] = fluid;
    }

    /// Mark the closed rectangle `[i0, i1] x [j0, j1]` as obstacle.
    pub fn add_obstacle(&mut self, i0: usize, i1: usize, j0: usize, j1: usize) {
        for i in i0..=i1 {
            for j in j0..=j1 {
                self.set_fluid(i, j, false);
            }
        }
    }

    pub fn fluid_count(&self) -> usize {
        self.fluid.iter().filter(|&&f| f).count()
    }

    /// Build from text rows, top row first. `'.'` is fluid, `'#'` is obstacle.
    pub fn from_rows(rows: &[&str]) -> FlowResult<Self> {
        let jmax = rows.len();
        let imax = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if imax == 0 || jmax == 0 {
            return Err(FlowError::config("geometry rows must not be empty"));
        }
        let mut geom = Self::all_fluid(imax, jmax);
        for (row, line) in rows.iter().enumerate() {
            let j = jmax - row;
            if line.chars().count() != imax {
                return Err(FlowError::config(format!(
                    "geometry row {} has {} cells, expected {}",
                    row,
                    line.chars().count(),
                    imax
                )));
            }
            for (col, c) in line.chars().enumerate() {
                let fluid = match c {
                    '.' => true,
                    '#' => false,
                    other => {
                        return Err(FlowError::config(format!(
                            "unexpected geometry character {:?} at row {}",
                            other, row
                        )))
                    }
                };
                geom.set_fluid(col + 1, j, fluid);
            }
        }
        Ok(geom)
    }

    pub fn preset(preset: Preset, imax: usize, jmax: usize) -> Self {
        let mut geom = Self::all_fluid(imax, jmax);
        match preset {
            Preset::Open => {}
            Preset::Step => {
                let width = (imax / 8).max(2).min(imax);
                let height = (jmax / 2).max(2).min(jmax);
                geom.add_obstacle(1, width, 1, height);
            }
            Preset::Block => {
                let size = (jmax / 5).max(2);
                let ci = (imax / 5).max(1);
                let cj = jmax / 2;
                let i0 = ci.saturating_sub(size / 2).max(1);
                let j0 = cj.saturating_sub(size / 2).max(1);
                let i1 = (i0 + size - 1).min(imax);
                let j1 = (j0 + size - 1).min(jmax);
                geom.add_obstacle(i0, i1, j0, j1);
            }
        }
        geom
    }

    /// Read a PGM image (P2 or P5). The first image row is the top of the
    /// domain. Black (0) pixels are obstacles, pixels at the maximum value (or
    /// 1) are fluid; any other grey level is rejected.
    ///
    /// Images of exactly `(imax+2) x (jmax+2)` pixels are taken to include the
    /// ghost frame, which is dropped.
    pub fn from_pgm_file(path: impl AsRef<Path>, imax: usize, jmax: usize) -> FlowResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| FlowError::io(path, e))?;
        let image = PgmImage::parse(&bytes)?;
        image.to_geometry(imax, jmax)
    }
}

/// Decoded greyscale image, row 0 at the top.
#[derive(Debug, Clone)]
pub struct PgmImage {
    pub width: usize,
    pub height: usize,
    pub max_value: u16,
    pub pixels: Vec<u16>,
}

impl PgmImage {
    pub fn parse(bytes: &[u8]) -> FlowResult<Self> {
        let mut cursor = HeaderCursor { bytes, pos: 0 };
        let magic = cursor.token()?;
        let binary = match magic.as_str() {
            "P2" => false,
            "P5" => true,
            other => return Err(FlowError::pgm(format!("unsupported magic {:?}", other))),
        };
        let width = cursor.number()?;
        let height = cursor.number()?;
        let max_value = cursor.number()?;
        if width == 0 || height == 0 {
            return Err(FlowError::pgm("image has zero size"));
        }
        if max_value == 0 || max_value > u16::MAX as usize {
            return Err(FlowError::pgm(format!("invalid max value {}", max_value)));
        }
        let count = width
            .checked_mul(height)
            .ok_or_else(|| FlowError::pgm(format!("image size {}x{} overflows", width, height)))?;
        // Every pixel takes at least one byte in either encoding.
        let remaining = bytes.len().saturating_sub(cursor.pos);
        if count > remaining {
            return Err(FlowError::pgm(format!(
                "header declares {} pixels but only {} bytes follow",
                count, remaining
            )));
        }
        let pixels = if binary {
            // Exactly one whitespace byte separates the header from the raster.
            let start = cursor.pos + 1;
            let wide = max_value > 255;
            let needed = if wide { count.checked_mul(2) } else { Some(count) };
            let raster = needed
                .and_then(|n| start.checked_add(n))
                .and_then(|end| bytes.get(start..end))
                .ok_or_else(|| FlowError::pgm(format!("raster truncated: expected {} pixels", count)))?;
            if wide {
                raster
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect()
            } else {
                raster.iter().map(|&b| b as u16).collect()
            }
        } else {
            let mut pixels = Vec::with_capacity(count);
            for _ in 0..count {
                let v = cursor.number()?;
                if v > max_value {
                    return Err(FlowError::pgm(format!("pixel value {} exceeds max {}", v, max_value)));
                }
                pixels.push(v as u16);
            }
            pixels
        };
        Ok(Self {
            width,
            height,
            max_value: max_value as u16,
            pixels,
        })
    }

    pub fn to_geometry(&self, imax: usize, jmax: usize) -> FlowResult<Geometry> {
        let border = if self.width == imax && self.height == jmax {
            0
        } else if self.width == imax + 2 && self.height == jmax + 2 {
            1
        } else {
            return Err(FlowError::pgm(format!(
                "image is {}x{}, expected {}x{} or {}x{}",
                self.width,
                self.height,
                imax,
                jmax,
                imax + 2,
                jmax + 2
            )));
        };
        let mut geom = Geometry::all_fluid(imax, jmax);
        for j in 1..=jmax {
            let row = self.height - 1 - (j - 1 + border);
            for i in 1..=imax {
                let col = i - 1 + border;
                let value = self.pixels[row * self.width + col];
                let fluid = if value == 0 {
                    false
                } else if value == self.max_value || value == 1 {
                    true
                } else {
                    return Err(FlowError::pgm(format!(
                        "pixel at column {}, row {} has grey level {}; only 0 and {} are allowed",
                        col, row, value, self.max_value
                    )));
                };
                geom.set_fluid(i, j, fluid);
            }
        }
        Ok(geom)
    }
}

struct HeaderCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl HeaderCursor<'_> {
    fn skip_space_and_comments(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'#' {
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> FlowResult<String> {
        self.skip_space_and_comments();
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(FlowError::pgm("unexpected end of data"));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn number(&mut self) -> FlowResult<usize> {
        let tok = self.token()?;
        tok.parse()
            .map_err(|_| FlowError::pgm(format!("expected a number, found {:?}", tok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_top_row_is_jmax() {
        let g = Geometry::from_rows(&["..#", "...", "#.."]).unwrap();
        assert_eq!(g.imax(), 3);
        assert_eq!(g.jmax(), 3);
        assert!(!g.is_fluid(3, 3), "top-right should be obstacle");
        assert!(!g.is_fluid(1, 1), "bottom-left should be obstacle");
        assert!(g.is_fluid(2, 2));
        assert_eq!(g.fluid_count(), 7);
    }

    #[test]
    fn test_outside_interior_is_not_fluid() {
        let g = Geometry::all_fluid(2, 2);
        assert!(!g.is_fluid(0, 1));
        assert!(!g.is_fluid(3, 1));
        assert!(!g.is_fluid(1, 0));
        assert!(!g.is_fluid(1, 3));
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(Geometry::from_rows(&["...", ".."]).is_err());
        assert!(Geometry::from_rows(&["..x"]).is_err());
    }

    #[test]
    fn test_step_preset_blocks_lower_left() {
        let g = Geometry::preset(Preset::Step, 32, 8);
        assert!(!g.is_fluid(1, 1));
        assert!(!g.is_fluid(4, 4));
        assert!(g.is_fluid(5, 4));
        assert!(g.is_fluid(1, 5));
    }

    #[test]
    fn test_block_preset_is_at_least_two_cells() {
        let g = Geometry::preset(Preset::Block, 20, 5);
        let solid = 20 * 5 - g.fluid_count();
        assert!(solid >= 4, "block should cover at least 2x2 cells, got {}", solid);
    }

    #[test]
    fn test_parse_p2_interior_only() {
        let text = b"P2\n# obstacle in the corner\n3 2\n255\n255 255 255\n0 255 255\n";
        let img = PgmImage::parse(text).unwrap();
        let g = img.to_geometry(3, 2).unwrap();
        // bottom row of the image is j = 1
        assert!(!g.is_fluid(1, 1));
        assert!(g.is_fluid(2, 1));
        assert!(g.is_fluid(1, 2));
    }

    #[test]
    fn test_parse_p2_with_ghost_frame() {
        let text = b"P2 4 3 1\n0 0 0 0\n0 1 0 0\n0 0 0 0\n";
        let img = PgmImage::parse(text).unwrap();
        let g = img.to_geometry(2, 1).unwrap();
        assert!(g.is_fluid(1, 1));
        assert!(!g.is_fluid(2, 1));
    }

    #[test]
    fn test_parse_p5_binary() {
        let mut data = b"P5\n2 2\n255\n".to_vec();
        data.extend_from_slice(&[255, 0, 255, 255]);
        let img = PgmImage::parse(&data).unwrap();
        assert_eq!(img.pixels, vec![255, 0, 255, 255]);
        let g = img.to_geometry(2, 2).unwrap();
        assert!(!g.is_fluid(2, 2));
        assert_eq!(g.fluid_count(), 3);
    }

    #[test]
    fn test_rejects_intermediate_grey() {
        let text = b"P2 2 1 255\n128 255\n";
        let img = PgmImage::parse(text).unwrap();
        let err = img.to_geometry(2, 1).unwrap_err();
        assert!(err.to_string().contains("grey level 128"), "got: {}", err);
    }

    #[test]
    fn test_rejects_wrong_size_and_magic() {
        let img = PgmImage::parse(b"P2 2 2 1\n1 1 1 1\n").unwrap();
        assert!(img.to_geometry(3, 3).is_err());
        assert!(PgmImage::parse(b"P6 1 1 255\n").is_err());
        assert!(PgmImage::parse(b"P5 4 4 255\n\x00").is_err());
    }

    #[test]
    fn test_overflowing_header_is_error() {
        let err = PgmImage::parse(b"P2 18446744073709551615 2 255\n0 0\n").unwrap_err();
        assert!(matches!(err, FlowError::Pgm(_)), "got {:?}", err);
        let err = PgmImage::parse(b"P5 9223372036854775807 1 65535\n\x00\x00").unwrap_err();
        assert!(matches!(err, FlowError::Pgm(_)), "got {:?}", err);
    }

    #[test]
    fn test_oversized_header_is_error() {
        let err = PgmImage::parse(b"P2 100000 100000 255\n0 0 0\n").unwrap_err();
        assert!(err.to_string().contains("10000000000 pixels"), "got: {}", err);
        assert!(PgmImage::parse(b"P5 100000 100000 255\n\x00\x00").is_err());
    }

    #[test]
    fn test_from_pgm_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.pgm");
        fs::write(&path, "P2\n2 2\n1\n1 1\n0 1\n").unwrap();
        let g = Geometry::from_pgm_file(&path, 2, 2).unwrap();
        assert!(!g.is_fluid(1, 1));
        assert_eq!(g.fluid_count(), 3);

        let missing = Geometry::from_pgm_file(dir.path().join("nope.pgm"), 2, 2);
        assert!(matches!(missing, Err(FlowError::Io { .. })));
    }
}
