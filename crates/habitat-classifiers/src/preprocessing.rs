//! Small preprocessing utilities shared by the gradient-based models.
//!
//! Provides a simple Scaler for mean/std standardization. Linear and neural
//! models train on standardized columns so that one learning rate fits every
//! raster layer regardless of its units.

use ndarray::{Array1, Array2, Axis};

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq)]
pub struct Scaler {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
}

impl Scaler {
    /// Columns with a smaller stddev are treated as constant and only centred.
    const MIN_STD: f32 = 1e-6;

    /// Transform all rows and return a new matrix.
    pub fn transform(&self, x: &Array2<f32>) -> Array2<f32> {
        (x - &self.mean) / &self.std
    }
}

/// Fit a `Scaler` from an `Array2<f32>` where rows are samples and
/// columns are features. An empty matrix yields an identity scaler.
pub fn fit_scaler(x: &Array2<f32>) -> Scaler {
    let ncols = x.ncols();
    if x.nrows() == 0 {
        return Scaler {
            mean: Array1::zeros(ncols),
            std: Array1::ones(ncols),
        };
    }
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(ncols));
    let std = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s.is_finite() && s > Scaler::MIN_STD { s } else { 1.0 });
    Scaler { mean, std }
}

/// Transform all rows using the provided `Scaler`.
pub fn transform_all(x: &Array2<f32>, sc: &Scaler) -> Array2<f32> {
    sc.transform(x)
}

/// Fit a scaler and return it together with the transformed matrix.
pub fn fit_transform(x: &Array2<f32>) -> (Scaler, Array2<f32>) {
    let sc = fit_scaler(x);
    let transformed = sc.transform(x);
    (sc, transformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn standardized_columns_have_zero_mean() {
        let x = array![[1.0f32, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let (sc, z) = fit_transform(&x);
        assert!((sc.mean[0] - 3.0).abs() < 1e-6);
        assert!(z.column(0).sum().abs() < 1e-5);
        // constant column stays finite
        assert!(z.column(1).iter().all(|v| v.is_finite() && v.abs() < 1e-3));
    }

    #[test]
    fn constant_column_is_centred_not_amplified() {
        let x = array![[2.0f32, 7.0], [4.0, 7.0]];
        let sc = fit_scaler(&x);
        assert_eq!(sc.std[1], 1.0);
        let z = sc.transform(&array![[3.0f32, 9.5]]);
        assert!((z[[0, 1]] - 2.5).abs() < 1e-6);
    }
}
