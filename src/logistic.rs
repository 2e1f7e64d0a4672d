use ndarray::{Array1, ArrayView1, ArrayView2};

/// Logistic link `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Score every row of `contexts` under the logistic link: `sigmoid(X theta)`.
pub fn scores(contexts: ArrayView2<'_, f64>, theta: ArrayView1<'_, f64>) -> Array1<f64> {
    contexts.dot(&theta).mapv_into(sigmoid)
}

/// Gradient of the logistic negative log-likelihood summed over the rows of `x`.
///
/// Returns `X^T (sigmoid(X theta) - y)`, i.e. `sum_i (sigmoid(x_i . theta) - y_i) x_i`.
pub fn log_loss_gradient(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    theta: ArrayView1<'_, f64>,
) -> Array1<f64> {
    let residual = scores(x, theta) - &y;
    x.t().dot(&residual)
}

/// Batch gradient-descent logistic regression
///
/// Used once, at the end of warm-up, to seed the parameter estimate. The fit
/// starts from zeros and runs a fixed number of full-batch steps so that the
/// same data always reproduces the same coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticRegression {
    /// Gradient step size
    pub learning_rate: f64,
    /// Number of full-batch iterations
    pub iterations: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            iterations: 200,
        }
    }
}

impl LogisticRegression {
    /// Create a new logistic regression fitter
    #[must_use]
    pub fn new(learning_rate: f64, iterations: usize) -> Self {
        Self {
            learning_rate,
            iterations,
        }
    }

    /// Fit coefficients on `x` (n x d) and binary labels `y` (n)
    ///
    /// The gradient is averaged over the `n` rows. Returns zeros when `x` has no rows.
    pub fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Array1<f64> {
        let (n, d) = x.dim();
        let mut theta = Array1::<f64>::zeros(d);
        if n == 0 {
            return theta;
        }

        let step = self.learning_rate / n as f64;
        for _ in 0..self.iterations {
            let grad = log_loss_gradient(x, y, theta.view());
            theta.scaled_add(-step, &grad);
        }
        theta
    }
}
