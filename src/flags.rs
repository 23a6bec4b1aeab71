//! Flag field: per-cell bitmask and resolved cell classification.
//!
//! The bitmask is built once from a [`Geometry`] and the edge pressure
//! configuration, then resolved into a [`CellKind`] per interior cell so the
//! solver and the boundary passes can match on a closed enum instead of
//! re-testing bits.

use log::warn;

use crate::error::{FlowError, FlowResult, InvalidCell};
use crate::geometry::Geometry;
use crate::solver::EdgePressures;
use crate::state::Grid2;

/// Bit layout of a flag cell.
pub mod bits {
    /// Neighbour at `j + 1` is fluid.
    pub const NORTH: u8 = 1;
    /// Neighbour at `j - 1` is fluid.
    pub const SOUTH: u8 = 2;
    /// Neighbour at `i - 1` is fluid.
    pub const WEST: u8 = 4;
    /// Neighbour at `i + 1` is fluid.
    pub const EAST: u8 = 8;
    /// Cell takes part in the pressure equation.
    pub const FLUID: u8 = 16;
    /// Left ghost cell carries a Dirichlet or pressure-difference condition.
    pub const PRESSURE_LEFT: u8 = 32;
    /// Right ghost cell carries a Dirichlet or pressure-difference condition.
    pub const PRESSURE_RIGHT: u8 = 64;

    pub const NEIGHBORS: u8 = NORTH | SOUTH | WEST | EAST;
}

/// Which neighbours of an obstacle cell are fluid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NeighborPattern {
    North,
    South,
    West,
    East,
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
    /// Opposing pair or three and more fluid neighbours. Holds the raw bits.
    Invalid(u8),
}

impl NeighborPattern {
    /// Classify the neighbour bits of an obstacle cell. Returns `None` when no
    /// neighbour is fluid.
    pub fn from_bits(b: u8) -> Option<Self> {
        use bits::*;
        let pattern = match b & NEIGHBORS {
            0 => return None,
            NORTH => Self::North,
            SOUTH => Self::South,
            WEST => Self::West,
            EAST => Self::East,
            x if x == NORTH | WEST => Self::NorthWest,
            x if x == NORTH | EAST => Self::NorthEast,
            x if x == SOUTH | WEST => Self::SouthWest,
            x if x == SOUTH | EAST => Self::SouthEast,
            x => Self::Invalid(x),
        };
        Some(pattern)
    }

    pub fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

/// Resolved classification of an interior cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Fluid,
    /// Obstacle cell with at least one fluid neighbour.
    Obstacle(NeighborPattern),
    /// Obstacle cell enclosed by other obstacle cells.
    Solid,
}

#[derive(Clone, Debug)]
pub struct FlagField {
    bits: Grid2<u8>,
    kinds: Grid2<CellKind>,
    fluid_count: usize,
    invalid: Vec<InvalidCell>,
}

impl FlagField {
    /// Compile and validate. Fails if any obstacle cell has a forbidden
    /// neighbour pattern (all such cells are listed) or if the domain has no
    /// fluid cell.
    pub fn build(geometry: &Geometry, pressure: &EdgePressures) -> FlowResult<Self> {
        let flags = Self::compile(geometry, pressure);
        if !flags.invalid.is_empty() {
            return Err(FlowError::InvalidGeometry {
                cells: flags.invalid.clone(),
            });
        }
        if flags.fluid_count == 0 {
            return Err(FlowError::NoFluidCells);
        }
        Ok(flags)
    }

    /// Compile without rejecting forbidden cells. Such cells are logged,
    /// kept in [`FlagField::invalid_cells`] and receive no boundary stencil.
    pub fn compile_lenient(geometry: &Geometry, pressure: &EdgePressures) -> Self {
        let flags = Self::compile(geometry, pressure);
        for cell in &flags.invalid {
            warn!("forbidden boundary cell at i={} j={}; no stencil applied", cell.i, cell.j);
        }
        flags
    }

    fn compile(geometry: &Geometry, pressure: &EdgePressures) -> Self {
        use bits::*;
        let imax = geometry.imax();
        let jmax = geometry.jmax();
        let mut flag = Grid2::new(imax, jmax, 0u8);

        // Outer ghost layers; the four corners stay zero.
        for j in 1..=jmax {
            if geometry.is_fluid(1, j) {
                flag[(0, j)] |= EAST;
            }
            if geometry.is_fluid(imax, j) {
                flag[(imax + 1, j)] |= WEST;
            }
            if pressure.left.is_active() {
                flag[(0, j)] |= PRESSURE_LEFT;
            }
            if pressure.right.is_active() {
                flag[(imax + 1, j)] |= PRESSURE_RIGHT;
            }
        }
        for i in 1..=imax {
            if geometry.is_fluid(i, 1) {
                flag[(i, 0)] |= NORTH;
            }
            if geometry.is_fluid(i, jmax) {
                flag[(i, jmax + 1)] |= SOUTH;
            }
        }

        let mut kinds = Grid2::new(imax, jmax, CellKind::Solid);
        let mut fluid_count = 0;
        let mut invalid = Vec::new();
        for i in 1..=imax {
            for j in 1..=jmax {
                let mut b = 0u8;
                if geometry.is_fluid(i, j) {
                    b |= FLUID;
                }
                if geometry.is_fluid(i, j + 1) {
                    b |= NORTH;
                }
                if geometry.is_fluid(i, j - 1) {
                    b |= SOUTH;
                }
                if geometry.is_fluid(i - 1, j) {
                    b |= WEST;
                }
                if geometry.is_fluid(i + 1, j) {
                    b |= EAST;
                }
                flag[(i, j)] = b;

                kinds[(i, j)] = if b & FLUID != 0 {
                    fluid_count += 1;
                    CellKind::Fluid
                } else {
                    match NeighborPattern::from_bits(b) {
                        None => CellKind::Solid,
                        Some(pattern) => {
                            if !pattern.is_valid() {
                                invalid.push(InvalidCell { i, j, bits: b & NEIGHBORS });
                            }
                            CellKind::Obstacle(pattern)
                        }
                    }
                };
            }
        }

        Self {
            bits: flag,
            kinds,
            fluid_count,
            invalid,
        }
    }

    pub fn imax(&self) -> usize {
        self.bits.imax()
    }

    pub fn jmax(&self) -> usize {
        self.bits.jmax()
    }

    /// Raw bitmask, including ghost cells.
    pub fn bits(&self, i: usize, j: usize) -> u8 {
        self.bits[(i, j)]
    }

    /// Classification of an interior cell. Ghost cells report `Solid`.
    pub fn kind(&self, i: usize, j: usize) -> CellKind {
        self.kinds[(i, j)]
    }

    /// Whether `grid` spans the same cells as this flag field.
    pub fn covers<T>(&self, grid: &Grid2<T>) -> bool {
        self.bits.same_shape(grid)
    }

    pub fn is_fluid(&self, i: usize, j: usize) -> bool {
        self.bits[(i, j)] & bits::FLUID != 0
    }

    pub fn fluid_count(&self) -> usize {
        self.fluid_count
    }

    pub fn invalid_cells(&self) -> &[InvalidCell] {
        &self.invalid
    }

    pub fn has_pressure_left(&self, j: usize) -> bool {
        self.bits[(0, j)] & bits::PRESSURE_LEFT != 0
    }

    pub fn has_pressure_right(&self, j: usize) -> bool {
        self.bits[(self.imax() + 1, j)] & bits::PRESSURE_RIGHT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::bits::*;
    use super::*;
    use crate::solver::EdgePressure;

    fn neumann() -> EdgePressures {
        EdgePressures::default()
    }

    #[test]
    fn test_open_domain_all_fluid() {
        let g = Geometry::all_fluid(4, 3);
        let flags = FlagField::build(&g, &neumann()).unwrap();
        assert_eq!(flags.fluid_count(), 12);
        for i in 1..=4 {
            for j in 1..=3 {
                assert_eq!(flags.kind(i, j), CellKind::Fluid);
                assert!(flags.is_fluid(i, j));
            }
        }
        // Interior corner cell sees two fluid neighbours, walls are not fluid.
        assert_eq!(flags.bits(1, 1), FLUID | NORTH | EAST);
        assert_eq!(flags.bits(2, 2), FLUID | NEIGHBORS);
    }

    #[test]
    fn test_ghost_layer_bits_point_inward() {
        let g = Geometry::all_fluid(3, 2);
        let flags = FlagField::build(&g, &neumann()).unwrap();
        for j in 1..=2 {
            assert_eq!(flags.bits(0, j), EAST, "left ghost j={}", j);
            assert_eq!(flags.bits(4, j), WEST, "right ghost j={}", j);
        }
        for i in 1..=3 {
            assert_eq!(flags.bits(i, 0), NORTH, "bottom ghost i={}", i);
            assert_eq!(flags.bits(i, 3), SOUTH, "top ghost i={}", i);
        }
        for (i, j) in [(0, 0), (4, 0), (0, 3), (4, 3)] {
            assert_eq!(flags.bits(i, j), 0, "corner ({}, {}) must be zero", i, j);
        }
    }

    #[test]
    fn test_ghost_next_to_obstacle_has_no_neighbor_bit() {
        let g = Geometry::from_rows(&["...", "#.."]).unwrap();
        let flags = FlagField::build(&g, &neumann()).unwrap();
        assert_eq!(flags.bits(0, 1), 0);
        assert_eq!(flags.bits(1, 0), 0);
        assert_eq!(flags.bits(0, 2), EAST);
    }

    #[test]
    fn test_pressure_bits_cover_whole_column() {
        let g = Geometry::from_rows(&["...", "#.#"]).unwrap();
        let pressure = EdgePressures {
            left: EdgePressure::Dirichlet(1.0),
            right: EdgePressure::Difference(0.5),
        };
        let flags = FlagField::build(&g, &pressure).unwrap();
        for j in 1..=2 {
            assert!(flags.has_pressure_left(j));
            assert!(flags.has_pressure_right(j));
        }
        // Independent of the obstacle next to the ghost cell.
        assert_eq!(flags.bits(0, 1), PRESSURE_LEFT);
        assert_eq!(flags.bits(0, 2), PRESSURE_LEFT | EAST);
        assert_eq!(flags.bits(0, 0), 0);
        assert_eq!(flags.bits(4, 3), 0);
    }

    #[test]
    fn test_zero_gradient_edges_set_no_pressure_bits() {
        let g = Geometry::all_fluid(2, 2);
        let flags = FlagField::build(&g, &neumann()).unwrap();
        assert!(!flags.has_pressure_left(1));
        assert!(!flags.has_pressure_right(2));
    }

    #[test]
    fn test_single_side_and_corner_patterns() {
        // 2x2 block in the middle of a 4x4 fluid domain: every block cell is a
        // convex corner.
        let g = Geometry::from_rows(&["....", ".##.", ".##.", "...."]).unwrap();
        let flags = FlagField::build(&g, &neumann()).unwrap();
        assert_eq!(flags.kind(2, 3), CellKind::Obstacle(NeighborPattern::NorthWest));
        assert_eq!(flags.kind(3, 3), CellKind::Obstacle(NeighborPattern::NorthEast));
        assert_eq!(flags.kind(2, 2), CellKind::Obstacle(NeighborPattern::SouthWest));
        assert_eq!(flags.kind(3, 2), CellKind::Obstacle(NeighborPattern::SouthEast));
        assert_eq!(flags.fluid_count(), 12);

        // Wide wall along the bottom: single-side north cells.
        let g = Geometry::from_rows(&["...", "...", "###"]).unwrap();
        let flags = FlagField::build(&g, &neumann()).unwrap();
        for i in 1..=3 {
            assert_eq!(flags.kind(i, 1), CellKind::Obstacle(NeighborPattern::North));
        }
    }

    #[test]
    fn test_enclosed_obstacle_cells_are_solid() {
        let g = Geometry::from_rows(&[".....", ".###.", ".###.", ".###.", "....."]).unwrap();
        let flags = FlagField::build(&g, &neumann()).unwrap();
        assert_eq!(flags.kind(3, 3), CellKind::Solid);
        assert_eq!(flags.kind(3, 4), CellKind::Obstacle(NeighborPattern::North));
        assert_eq!(flags.kind(2, 3), CellKind::Obstacle(NeighborPattern::West));
        assert_eq!(flags.kind(4, 3), CellKind::Obstacle(NeighborPattern::East));
        assert_eq!(flags.kind(3, 2), CellKind::Obstacle(NeighborPattern::South));
    }

    #[test]
    fn test_every_obstacle_cell_has_legal_pattern() {
        let g = Geometry::preset(crate::geometry::Preset::Step, 40, 12);
        let flags = FlagField::build(&g, &neumann()).unwrap();
        for i in 1..=40 {
            for j in 1..=12 {
                if let CellKind::Obstacle(p) = flags.kind(i, j) {
                    assert!(p.is_valid(), "cell ({}, {}) has pattern {:?}", i, j, p);
                }
            }
        }
    }

    #[test]
    fn test_thin_obstacles_are_rejected_with_all_coordinates() {
        // (2,2) single cell: four fluid neighbours.
        // (4,2)-(4,3) one-cell-wide column: west and east both fluid.
        let g = Geometry::from_rows(&[".....", "...#.", ".#.#.", "....."]).unwrap();
        let err = FlagField::build(&g, &neumann()).unwrap_err();
        match err {
            FlowError::InvalidGeometry { cells } => {
                let coords: Vec<(usize, usize)> = cells.iter().map(|c| (c.i, c.j)).collect();
                assert_eq!(coords, vec![(2, 2), (4, 2), (4, 3)]);
                assert_eq!(cells[0].bits, NEIGHBORS);
                assert_eq!(cells[1].bits & (WEST | EAST), WEST | EAST);
            }
            other => panic!("expected InvalidGeometry, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_compile_keeps_invalid_cells() {
        let g = Geometry::from_rows(&["...", ".#.", "..."]).unwrap();
        let flags = FlagField::compile_lenient(&g, &neumann());
        assert_eq!(flags.invalid_cells().len(), 1);
        assert_eq!(flags.kind(2, 2), CellKind::Obstacle(NeighborPattern::Invalid(NEIGHBORS)));
    }

    #[test]
    fn test_all_obstacle_domain_is_rejected() {
        let g = Geometry::from_rows(&["##", "##"]).unwrap();
        assert!(matches!(FlagField::build(&g, &neumann()), Err(FlowError::NoFluidCells)));
    }

    #[test]
    fn test_pattern_from_bits() {
        assert_eq!(NeighborPattern::from_bits(0), None);
        assert_eq!(NeighborPattern::from_bits(FLUID), None);
        assert_eq!(NeighborPattern::from_bits(NORTH), Some(NeighborPattern::North));
        assert_eq!(NeighborPattern::from_bits(SOUTH | EAST), Some(NeighborPattern::SouthEast));
        assert_eq!(NeighborPattern::from_bits(NORTH | SOUTH), Some(NeighborPattern::Invalid(3)));
        assert_eq!(NeighborPattern::from_bits(NORTH | SOUTH | WEST), Some(NeighborPattern::Invalid(7)));
        for b in 11..16u8 {
            assert!(!NeighborPattern::from_bits(b).unwrap().is_valid(), "bits {} should be invalid", b);
        }
        assert!(!NeighborPattern::from_bits(WEST | EAST).unwrap().is_valid());
    }
}
