use std::ops::{Index, IndexMut};

/// Dense 2D grid covering the interior cells plus one ghost layer on each side.
///
/// Logical indices run over `0..=imax+1` horizontally and `0..=jmax+1`
/// vertically. Storage is a single row-major buffer: rows of constant `j`,
/// each `imax + 2` entries wide.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid2<T> {
    imax: usize,
    jmax: usize,
    data: Vec<T>,
}

/// Scalar field on the staggered grid (pressure, velocity components, RHS).
pub type Field = Grid2<f64>;

/// Row-major index into a buffer with `stride` columns.
#[inline(always)]
pub const fn idx(i: usize, j: usize, stride: usize) -> usize {
    j * stride + i
}

impl<T: Clone> Grid2<T> {
    pub fn new(imax: usize, jmax: usize, fill: T) -> Self {
        Self {
            imax,
            jmax,
            data: vec![fill; (imax + 2) * (jmax + 2)],
        }
    }

    pub fn fill(&mut self, value: T) {
        for v in self.data.iter_mut() {
            *v = value.clone();
        }
    }
}

impl<T> Grid2<T> {
    /// Number of interior cells in x.
    pub fn imax(&self) -> usize {
        self.imax
    }

    /// Number of interior cells in y.
    pub fn jmax(&self) -> usize {
        self.jmax
    }

    /// Whether `other` covers the same index space.
    pub fn same_shape<U>(&self, other: &Grid2<U>) -> bool {
        self.imax == other.imax && self.jmax == other.jmax
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline(always)]
    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            i <= self.imax + 1 && j <= self.jmax + 1,
            "grid index ({}, {}) out of range for {}x{} interior",
            i,
            j,
            self.imax,
            self.jmax
        );
        idx(i, j, self.imax + 2)
    }
}

impl<T> Index<(usize, usize)> for Grid2<T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self.data[self.offset(i, j)]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid2<T> {
    #[inline(always)]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        let k = self.offset(i, j);
        &mut self.data[k]
    }
}

/// All fields advanced by the time loop.
pub struct SimState {
    pub imax: usize,
    pub jmax: usize,
    /// x-velocity on east cell faces.
    pub u: Field,
    /// y-velocity on north cell faces.
    pub v: Field,
    /// Cell-centred pressure.
    pub p: Field,
    /// Right-hand side of the pressure equation.
    pub rhs: Field,
    /// Tentative x-velocity from the momentum kernel.
    pub f: Field,
    /// Tentative y-velocity from the momentum kernel.
    pub g: Field,
}

impl SimState {
    /// Zero-initialised state on an `imax x jmax` interior.
    pub fn new(imax: usize, jmax: usize) -> Self {
        let zero = Field::new(imax, jmax, 0.0);
        Self {
            imax,
            jmax,
            u: zero.clone(),
            v: zero.clone(),
            p: zero.clone(),
            rhs: zero.clone(),
            f: zero.clone(),
            g: zero,
        }
    }

    /// Set `U`, `V`, `P` to constant initial values on every cell for which
    /// `is_fluid` holds. Other cells stay zero.
    pub fn init_uvp(&mut self, ui: f64, vi: f64, pi: f64, is_fluid: impl Fn(usize, usize) -> bool) {
        for i in 1..=self.imax {
            for j in 1..=self.jmax {
                if is_fluid(i, j) {
                    self.u[(i, j)] = ui;
                    self.v[(i, j)] = vi;
                    self.p[(i, j)] = pi;
                }
            }
        }
    }

    /// True if any velocity or pressure value is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        [&self.u, &self.v, &self.p]
            .iter()
            .any(|f| f.as_slice().iter().any(|x| !x.is_finite()))
    }
}
