use crate::flags::FlagField;
use crate::state::Field;

/// Cell-centred velocity of cell `(i, j)` from the surrounding faces.
pub fn cell_velocity(u: &Field, v: &Field, i: usize, j: usize) -> (f64, f64) {
    (
        0.5 * (u[(i, j)] + u[(i - 1, j)]),
        0.5 * (v[(i, j)] + v[(i, j - 1)]),
    )
}

/// Average kinetic energy per fluid cell: KE = 0.5 * <u² + v²>.
pub fn compute_kinetic_energy(u: &Field, v: &Field, flags: &FlagField) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 1..=flags.imax() {
        for j in 1..=flags.jmax() {
            if flags.is_fluid(i, j) {
                let (uc, vc) = cell_velocity(u, v, i, j);
                sum += uc * uc + vc * vc;
                count += 1;
            }
        }
    }
    if count > 0 { 0.5 * sum / count as f64 } else { 0.0 }
}

/// Largest absolute discrete divergence over the fluid cells.
pub fn compute_max_divergence(u: &Field, v: &Field, flags: &FlagField, dx: f64, dy: f64) -> f64 {
    let mut max = 0.0_f64;
    for i in 1..=flags.imax() {
        for j in 1..=flags.jmax() {
            if flags.is_fluid(i, j) {
                let div = (u[(i, j)] - u[(i - 1, j)]) / dx + (v[(i, j)] - v[(i, j - 1)]) / dy;
                max = max.max(div.abs());
            }
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::solver::EdgePressures;

    fn open(imax: usize, jmax: usize) -> FlagField {
        FlagField::build(&Geometry::all_fluid(imax, jmax), &EdgePressures::default()).unwrap()
    }

    #[test]
    fn test_kinetic_energy_of_uniform_flow() {
        let flags = open(4, 4);
        let u = Field::new(4, 4, 2.0);
        let v = Field::new(4, 4, 0.0);
        let ke = compute_kinetic_energy(&u, &v, &flags);
        assert!((ke - 2.0).abs() < 1e-12, "KE should be 0.5 * 4, got {}", ke);
    }

    #[test]
    fn test_kinetic_energy_ignores_obstacles() {
        let g = Geometry::from_rows(&["..", "##"]).unwrap();
        let flags = FlagField::build(&g, &EdgePressures::default()).unwrap();
        let mut u = Field::new(2, 2, 0.0);
        u[(1, 1)] = 100.0;
        let v = Field::new(2, 2, 0.0);
        assert_eq!(compute_kinetic_energy(&u, &v, &flags), 0.0);
    }

    #[test]
    fn test_divergence_of_uniform_flow_is_zero() {
        let flags = open(5, 3);
        let u = Field::new(5, 3, 1.5);
        let v = Field::new(5, 3, -0.5);
        assert_eq!(compute_max_divergence(&u, &v, &flags, 0.1, 0.1), 0.0);
    }

    #[test]
    fn test_divergence_detects_source() {
        let flags = open(3, 3);
        let mut u = Field::new(3, 3, 0.0);
        u[(2, 2)] = 1.0;
        let v = Field::new(3, 3, 0.0);
        let div = compute_max_divergence(&u, &v, &flags, 0.5, 0.5);
        assert_eq!(div, 2.0);
    }
}
