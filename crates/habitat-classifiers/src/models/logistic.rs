//! Multinomial logistic regression with an elastic-net penalty.
use ndarray::{Array1, Array2, Axis};

use crate::config::{ClassifierSpec, ModelType};
use crate::error::{HabitatError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::preprocessing::{fit_scaler, Scaler};

/// Softmax regression fitted by proximal gradient descent on standardized
/// features.
///
/// Minimises `mean cross-entropy + lambda * ((1 - l1_ratio) / 2 * |W|^2 +
/// l1_ratio * |W|_1)` with `lambda = 1 / (C * n_samples)`; the intercept is
/// not penalised.
pub struct LogisticRegressionClassifier {
    name: String,
    c: f64,
    l1_ratio: f64,
    max_iter: usize,
    tol: f64,
    scaler: Option<Scaler>,
    weights: Array2<f64>,
    intercept: Array1<f64>,
}

impl LogisticRegressionClassifier {
    pub fn new(spec: &ClassifierSpec) -> Self {
        let (c, l1_ratio, max_iter, tol) = match &spec.model_type {
            ModelType::LogisticRegression {
                c,
                l1_ratio,
                max_iter,
                tol,
            } => (*c, *l1_ratio, *max_iter, *tol),
            _ => (1.0, 0.5, 1000, 1e-4),
        };
        Self {
            name: spec.name.clone(),
            c,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter,
            tol,
            scaler: None,
            weights: Array2::zeros((0, 0)),
            intercept: Array1::zeros(0),
        }
    }

    fn logits(&self, z: &Array2<f64>) -> Array2<f64> {
        z.dot(&self.weights) + &self.intercept
    }
}

fn softmax_rows_f64(logits: &mut Array2<f64>) {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

fn soft_threshold(v: f64, t: f64) -> f64 {
    if v > t {
        v - t
    } else if v < -t {
        v + t
    } else {
        0.0
    }
}

impl ClassifierModel for LogisticRegressionClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(HabitatError::model_fit(
                &self.name,
                format!("{} rows and {} labels", n, y.len()),
            ));
        }
        if self.c <= 0.0 {
            return Err(HabitatError::model_fit(&self.name, "C must be positive"));
        }

        let scaler = fit_scaler(x);
        let z = scaler.transform(x).mapv(f64::from);
        let d = z.ncols();

        let mut onehot = Array2::<f64>::zeros((n, n_classes));
        for (i, &class) in y.iter().enumerate() {
            onehot[[i, class]] = 1.0;
        }

        let lambda = 1.0 / (self.c * n as f64);
        let l2 = lambda * (1.0 - self.l1_ratio);
        let l1 = lambda * self.l1_ratio;

        let max_sq_norm = z
            .axis_iter(Axis(0))
            .map(|row| row.dot(&row))
            .fold(0.0, f64::max);
        let step = 1.0 / (0.5 * (max_sq_norm + 1.0) + l2);

        self.weights = Array2::zeros((d, n_classes));
        self.intercept = Array1::zeros(n_classes);

        let mut converged = false;
        for iter in 0..self.max_iter {
            let mut proba = self.logits(&z);
            softmax_rows_f64(&mut proba);
            let residual = (proba - &onehot) / n as f64;

            let grad_w = z.t().dot(&residual) + &(&self.weights * l2);
            let grad_b = residual.sum_axis(Axis(0));

            let mut max_change: f64 = 0.0;
            for (w, g) in self.weights.iter_mut().zip(grad_w.iter()) {
                let updated = soft_threshold(*w - step * g, step * l1);
                max_change = max_change.max((updated - *w).abs());
                *w = updated;
            }
            for (b, g) in self.intercept.iter_mut().zip(grad_b.iter()) {
                let updated = *b - step * g;
                max_change = max_change.max((updated - *b).abs());
                *b = updated;
            }

            let scale = self
                .weights
                .iter()
                .chain(self.intercept.iter())
                .fold(1.0f64, |m, v| m.max(v.abs()));
            if max_change <= self.tol * scale {
                log::debug!("{} converged after {} iterations", self.name, iter + 1);
                converged = true;
                break;
            }
        }
        if !converged {
            log::debug!(
                "{} reached max_iter={} before converging",
                self.name,
                self.max_iter
            );
        }

        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| HabitatError::model_fit(&self.name, "model has not been fitted"))?;
        let z = scaler.transform(x).mapv(f64::from);
        let mut proba = self.logits(&z);
        softmax_rows_f64(&mut proba);
        Ok(proba.mapv(|v| v as f32))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
