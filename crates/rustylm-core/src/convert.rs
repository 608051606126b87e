// =============================================================================
// ndarray ↔ nalgebra Conversion Utilities
// =============================================================================
//
// Public APIs speak ndarray (Array1/Array2); the QR decomposition is done
// with nalgebra. Results come back through here.
//
// =============================================================================

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Convert a nalgebra DMatrix to an ndarray Array2.
#[inline]
pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    let (nrows, ncols) = m.shape();
    Array2::from_shape_fn((nrows, ncols), |(i, j)| m[(i, j)])
}

/// Convert a nalgebra DVector to an ndarray Array1.
#[inline]
pub fn to_array1(v: &DVector<f64>) -> Array1<f64> {
    Array1::from_vec(v.as_slice().to_vec())
}

/// Quadratic form xᵀ A x.
pub fn quadratic_form(x: &Array1<f64>, a: &Array2<f64>) -> f64 {
    x.dot(&a.dot(x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_matrix_layout_is_preserved() {
        // from_row_slice reads row-major; nalgebra stores column-major
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let a = to_array2(&m);
        assert_eq!(a, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_vector() {
        let v = DVector::from_vec(vec![1.0, -2.0]);
        assert_eq!(to_array1(&v), array![1.0, -2.0]);
    }

    #[test]
    fn test_quadratic_form() {
        let a = array![[2.0, 0.0], [0.0, 3.0]];
        let x = array![1.0, 2.0];
        assert_eq!(quadratic_form(&x, &a), 14.0);
    }
}
