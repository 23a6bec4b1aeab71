//! 2D incompressible flow on a staggered grid with arbitrary obstacles.
//!
//! An obstacle bitmap is compiled once into a [`flags::FlagField`]; the
//! boundary, pressure and momentum kernels in [`solver`] read it to pick the
//! stencil of every cell.

pub mod config;
pub mod error;
pub mod flags;
pub mod geometry;
pub mod output;
pub mod solver;
pub mod state;
