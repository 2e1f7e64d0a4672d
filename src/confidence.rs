use ndarray::{Array1, ArrayView1};

/// Closed Euclidean ball used as the projection target for SGD iterates
///
/// The center is fixed when warm-up closes and never moves afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceBall {
    center: Array1<f64>,
    radius: f64,
}

impl ConfidenceBall {
    /// Create a ball around `center`. `radius` is validated by the estimator config.
    pub fn new(center: Array1<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn center(&self) -> ArrayView1<'_, f64> {
        self.center.view()
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Euclidean distance from `point` to the center
    pub fn distance(&self, point: ArrayView1<'_, f64>) -> f64 {
        (&point - &self.center).mapv(|v| v * v).sum().sqrt()
    }

    /// Whether `point` lies in the ball, up to `tolerance`
    pub fn contains(&self, point: ArrayView1<'_, f64>, tolerance: f64) -> bool {
        self.distance(point) <= self.radius + tolerance
    }

    /// Project `point` onto the ball
    ///
    /// Points already inside are returned unchanged; points outside are pulled
    /// back along the ray from the center to land on the boundary.
    pub fn project(&self, point: Array1<f64>) -> Array1<f64> {
        let offset = &point - &self.center;
        let norm = offset.mapv(|v| v * v).sum().sqrt();
        if norm <= self.radius {
            return point;
        }
        &self.center + &(offset * (self.radius / norm))
    }
}
