use serde::Deserialize;

use crate::flags::{bits, CellKind, FlagField, NeighborPattern};
use crate::state::Field;

/// Velocity condition on one outer edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallType {
    /// Zero velocity at the wall.
    NoSlip,
    /// Zero normal velocity, zero normal gradient of the tangential velocity.
    FreeSlip,
    /// Zero normal gradient of both components.
    Outflow,
}

/// Pressure condition on the left or right edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EdgePressure {
    /// Ghost copies the adjacent interior value.
    #[default]
    ZeroGradient,
    /// Fixed pressure on the edge, mirrored into the ghost cell.
    Dirichlet(f64),
    /// Fixed pressure drop between the left and right edges.
    Difference(f64),
}

impl EdgePressure {
    /// Explicit non-negative edge pressure wins over a non-zero pressure
    /// difference, which wins over zero gradient.
    pub fn resolve(explicit: Option<f64>, difference: f64) -> Self {
        match explicit {
            Some(p) if p >= 0.0 => Self::Dirichlet(p),
            _ if difference != 0.0 => Self::Difference(difference),
            _ => Self::ZeroGradient,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::ZeroGradient)
    }
}

/// Left and right edge pressure conditions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgePressures {
    pub left: EdgePressure,
    pub right: EdgePressure,
}

impl EdgePressures {
    pub fn from_values(left: Option<f64>, right: Option<f64>, difference: f64) -> Self {
        Self {
            left: EdgePressure::resolve(left, difference),
            right: EdgePressure::resolve(right, difference),
        }
    }
}

/// Wall types of the four outer edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Walls {
    pub left: WallType,
    pub right: WallType,
    pub top: WallType,
    pub bottom: WallType,
}

impl Walls {
    pub fn uniform(wall: WallType) -> Self {
        Self {
            left: wall,
            right: wall,
            top: wall,
            bottom: wall,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InflowProfile {
    #[default]
    Uniform,
    Parabolic,
}

/// Problem-specific override applied after the generic wall rules.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecialBoundary {
    #[default]
    None,
    /// Prescribed x-velocity on the left edge wherever the adjacent cell is fluid.
    Inflow {
        velocity: f64,
        #[serde(default)]
        profile: InflowProfile,
    },
    /// Top wall moving tangentially (driven cavity).
    MovingLid { velocity: f64 },
}

/// Complete boundary description of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryConfig {
    pub walls: Walls,
    pub pressure: EdgePressures,
    pub special: SpecialBoundary,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            walls: Walls::uniform(WallType::NoSlip),
            pressure: EdgePressures::default(),
            special: SpecialBoundary::None,
        }
    }
}

/// Set U and V on the outer edges and around obstacles.
///
/// Outer edges run first in the order left, right, top, bottom; the obstacle
/// pass runs last so obstacle cells touching the outer wall overwrite the
/// generic wall values on their faces.
pub fn apply_velocity_boundaries(flags: &FlagField, bc: &BoundaryConfig, u: &mut Field, v: &mut Field) {
    let imax = flags.imax();
    let jmax = flags.jmax();

    for j in 1..=jmax {
        match bc.walls.left {
            WallType::NoSlip => {
                u[(0, j)] = 0.0;
                v[(0, j)] = -v[(1, j)];
            }
            WallType::FreeSlip => {
                u[(0, j)] = 0.0;
                v[(0, j)] = v[(1, j)];
            }
            WallType::Outflow => {
                u[(0, j)] = u[(1, j)];
                v[(0, j)] = v[(1, j)];
            }
        }
        match bc.walls.right {
            WallType::NoSlip => {
                u[(imax, j)] = 0.0;
                v[(imax + 1, j)] = -v[(imax, j)];
            }
            WallType::FreeSlip => {
                u[(imax, j)] = 0.0;
                v[(imax + 1, j)] = v[(imax, j)];
            }
            WallType::Outflow => {
                u[(imax, j)] = u[(imax - 1, j)];
                v[(imax + 1, j)] = v[(imax, j)];
            }
        }
    }

    for i in 1..=imax {
        match bc.walls.top {
            WallType::NoSlip => {
                v[(i, jmax)] = 0.0;
                u[(i, jmax + 1)] = -u[(i, jmax)];
            }
            WallType::FreeSlip => {
                v[(i, jmax)] = 0.0;
                u[(i, jmax + 1)] = u[(i, jmax)];
            }
            WallType::Outflow => {
                v[(i, jmax)] = v[(i, jmax - 1)];
                u[(i, jmax + 1)] = u[(i, jmax)];
            }
        }
        match bc.walls.bottom {
            WallType::NoSlip => {
                v[(i, 0)] = 0.0;
                u[(i, 0)] = -u[(i, 1)];
            }
            WallType::FreeSlip => {
                v[(i, 0)] = 0.0;
                u[(i, 0)] = u[(i, 1)];
            }
            WallType::Outflow => {
                v[(i, 0)] = v[(i, 1)];
                u[(i, 0)] = u[(i, 1)];
            }
        }
    }

    apply_obstacle_velocity(flags, u, v);
}

/// No-slip reflection on every obstacle cell that borders fluid.
pub fn apply_obstacle_velocity(flags: &FlagField, u: &mut Field, v: &mut Field) {
    use NeighborPattern::*;
    for i in 1..=flags.imax() {
        for j in 1..=flags.jmax() {
            let pattern = match flags.kind(i, j) {
                CellKind::Obstacle(p) => p,
                _ => continue,
            };
            match pattern {
                North => {
                    v[(i, j)] = 0.0;
                    u[(i, j)] = -u[(i, j + 1)];
                    u[(i - 1, j)] = -u[(i - 1, j + 1)];
                }
                South => {
                    v[(i, j - 1)] = 0.0;
                    u[(i, j)] = -u[(i, j - 1)];
                    u[(i - 1, j)] = -u[(i - 1, j - 1)];
                }
                West => {
                    u[(i - 1, j)] = 0.0;
                    v[(i, j)] = -v[(i - 1, j)];
                    v[(i, j - 1)] = -v[(i - 1, j - 1)];
                }
                East => {
                    u[(i, j)] = 0.0;
                    v[(i, j)] = -v[(i + 1, j)];
                    v[(i, j - 1)] = -v[(i + 1, j - 1)];
                }
                NorthEast => {
                    u[(i, j)] = 0.0;
                    v[(i, j)] = 0.0;
                    u[(i - 1, j)] = -u[(i - 1, j + 1)];
                    v[(i, j - 1)] = -v[(i + 1, j - 1)];
                }
                NorthWest => {
                    u[(i - 1, j)] = 0.0;
                    v[(i, j)] = 0.0;
                    u[(i, j)] = -u[(i, j + 1)];
                    v[(i, j - 1)] = -v[(i - 1, j - 1)];
                }
                SouthEast => {
                    u[(i, j)] = 0.0;
                    v[(i, j - 1)] = 0.0;
                    u[(i - 1, j)] = -u[(i - 1, j - 1)];
                    v[(i, j)] = -v[(i + 1, j)];
                }
                SouthWest => {
                    u[(i - 1, j)] = 0.0;
                    v[(i, j - 1)] = 0.0;
                    u[(i, j)] = -u[(i, j - 1)];
                    v[(i, j)] = -v[(i - 1, j)];
                }
                Invalid(_) => {}
            }
        }
    }
}

/// Apply the problem-specific override. Must run after
/// [`apply_velocity_boundaries`] so it wins on its edge.
pub fn apply_special_boundary(flags: &FlagField, special: &SpecialBoundary, u: &mut Field, v: &mut Field) {
    let imax = flags.imax();
    let jmax = flags.jmax();
    match *special {
        SpecialBoundary::None => {}
        SpecialBoundary::Inflow { velocity, profile } => {
            let inlet: Vec<usize> = (1..=jmax)
                .filter(|&j| flags.bits(0, j) & bits::EAST != 0)
                .collect();
            let (Some(&lo), Some(&hi)) = (inlet.first(), inlet.last()) else {
                return;
            };
            let height = (hi - lo + 1) as f64;
            for &j in &inlet {
                let speed = match profile {
                    InflowProfile::Uniform => velocity,
                    InflowProfile::Parabolic => {
                        let y = ((j - lo) as f64 + 0.5) / height;
                        4.0 * velocity * y * (1.0 - y)
                    }
                };
                u[(0, j)] = speed;
                v[(0, j)] = -v[(1, j)];
            }
        }
        SpecialBoundary::MovingLid { velocity } => {
            for i in 1..=imax {
                u[(i, jmax + 1)] = 2.0 * velocity - u[(i, jmax)];
            }
        }
    }
}
