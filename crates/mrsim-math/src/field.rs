//! Dense scalar fields sampled on the workpiece grid.

use nalgebra::DMatrix;
use rayon::prelude::*;

/// A dense 2D scalar field.
///
/// Rows run along Y and columns along X, so `field[(iy, ix)]` is the value at
/// grid column `ix`, row `iy`.
pub type Field = DMatrix<f64>;

/// Apply `f` to every cell of `a`.
pub fn map<F>(a: &Field, f: F) -> Field
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    let mut out = Field::zeros(a.nrows(), a.ncols());
    out.as_mut_slice()
        .par_iter_mut()
        .zip(a.as_slice().par_iter())
        .for_each(|(o, &v)| *o = f(v));
    out
}

/// Apply `f` to matching cells of `a` and `b`.
///
/// # Panics
///
/// Panics if the two fields differ in shape.
pub fn zip_map<F>(a: &Field, b: &Field, f: F) -> Field
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    assert_eq!(a.shape(), b.shape(), "field shapes differ");
    let mut out = Field::zeros(a.nrows(), a.ncols());
    out.as_mut_slice()
        .par_iter_mut()
        .zip(a.as_slice().par_iter().zip(b.as_slice().par_iter()))
        .for_each(|(o, (&x, &y))| *o = f(x, y));
    out
}

/// Riemann sum of a field over cells of area `cell_area`.
///
/// Summed sequentially so the result does not depend on the thread pool.
pub fn integrate(a: &Field, cell_area: f64) -> f64 {
    a.iter().sum::<f64>() * cell_area
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_map_squares_cells() {
        let a = Field::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let out = map(&a, |v| v * v);
        assert_eq!(out, Field::from_row_slice(2, 2, &[1.0, 4.0, 9.0, 16.0]));
    }

    #[test]
    fn test_zip_map_keeps_layout() {
        let a = Field::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Field::from_element(2, 3, 10.0);
        let out = zip_map(&a, &b, |x, y| x + y);
        assert_eq!(out[(1, 2)], 16.0);
        assert_eq!(out[(0, 1)], 12.0);
    }

    #[test]
    #[should_panic(expected = "field shapes differ")]
    fn test_zip_map_shape_mismatch() {
        let a = Field::zeros(2, 2);
        let b = Field::zeros(3, 2);
        zip_map(&a, &b, |x, y| x + y);
    }

    #[test]
    fn test_integrate() {
        let a = Field::from_element(4, 5, 2.0);
        assert_relative_eq!(integrate(&a, 0.25), 10.0);
    }
}
