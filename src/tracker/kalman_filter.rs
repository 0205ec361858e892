//! Kalman filter for bounding box tracking using ndarray and nalgebra-based solves.

use ndarray::{Array1, Array2};

/// Chi-square 0.95 quantile for 4 degrees of freedom.
///
/// Gating threshold for the squared Mahalanobis distance of a 4-dim
/// (x, y, aspect, height) measurement against a track's predicted state.
pub const GATING_THRESHOLD: f64 = 9.4877;

/// Constant-velocity Kalman filter over the 8-dim state
/// `(cx, cy, aspect, height, vcx, vcy, va, vh)`.
///
/// Process and measurement noise are scaled by the current box height so
/// uncertainty grows with apparent object size.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let ndim = 4;
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Create a track state distribution from an unassociated measurement
    /// in XYAH format. Velocities start at zero with high uncertainty.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(8);
        for i in 0..4 {
            mean[i] = measurement[i];
        }

        let h = measurement[3];
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];

        let mut cov = Array2::zeros((8, 8));
        for i in 0..8 {
            cov[[i, i]] = std[i] * std[i];
        }

        (mean, cov)
    }

    /// Run the prediction step, advancing the state one time step under the
    /// constant-velocity model and inflating the covariance with
    /// height-scaled process noise.
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];

        let mut motion_cov = Array2::zeros((8, 8));
        for i in 0..8 {
            motion_cov[[i, i]] = std[i] * std[i];
        }

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    /// Project the state distribution into measurement space (XYAH),
    /// adding height-scaled measurement noise.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];

        let mut innovation_cov = Array2::zeros((4, 4));
        for i in 0..4 {
            innovation_cov[[i, i]] = std[i] * std[i];
        }

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Run the correction step for a matched measurement in XYAH format.
    ///
    /// Returns the prior unchanged if the innovation covariance is not
    /// invertible; a single skipped correction is preferable to aborting a
    /// video mid-stream.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> (Array1<f64>, Array2<f64>) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1
        // Since H is [I 0], P * H^T is the first 4 columns of P (8x4).
        // S is projected_cov (4x4).

        // nalgebra handles the 4x4 inversion to avoid BLAS/LAPACK.
        let Some(s_inv) = invert_4x4(&projected_cov) else {
            return (mean.clone(), covariance.clone());
        };

        let pht = covariance.dot(&self.update_mat.t()); // 8x4
        let kalman_gain = pht.dot(&s_inv); // 8x4

        let new_mean = mean + kalman_gain.dot(&innovation);
        let new_covariance = covariance - kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        (new_mean, new_covariance)
    }

    /// Squared Mahalanobis distance between the state distribution and a
    /// measurement in XYAH format.
    ///
    /// Computed via the Cholesky factor of the projected covariance; if the
    /// decomposition fails the pair is reported as infinitely far, which
    /// gates it out of association.
    pub fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> f64 {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let mut s = nalgebra::Matrix4::zeros();
        for i in 0..4 {
            for j in 0..4 {
                s[(i, j)] = projected_cov[[i, j]];
            }
        }

        let d = nalgebra::Vector4::new(
            measurement[0] - projected_mean[0],
            measurement[1] - projected_mean[1],
            measurement[2] - projected_mean[2],
            measurement[3] - projected_mean[3],
        );

        let Some(chol) = nalgebra::Cholesky::new(s) else {
            return f64::INFINITY;
        };
        // Solve L z = d; the squared Mahalanobis distance is |z|^2.
        let Some(z) = chol.l().solve_lower_triangular(&d) else {
            return f64::INFINITY;
        };
        z.norm_squared()
    }
}

/// Invert a 4x4 matrix using nalgebra (pure Rust).
fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }
    let inv = nm.try_inverse()?;
    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::new();
        let (mean, _) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        assert_eq!(mean[0], 100.0);
        assert_eq!(mean[4], 0.0); // zero initial velocity
    }

    #[test]
    fn test_predict_advances_under_velocity() {
        let kf = KalmanFilter::new();
        let (mut mean, mut cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        mean[4] = 3.0; // vx

        let (next, next_cov) = kf.predict(&mean, &cov);
        assert_abs_diff_eq!(next[0], 103.0, epsilon = 1e-9);
        assert_abs_diff_eq!(next[1], 200.0, epsilon = 1e-9);
        // covariance inflates
        assert!(next_cov[[0, 0]] > cov[[0, 0]]);
        cov = next_cov;
        let (_, cov2) = kf.predict(&next, &cov);
        assert!(cov2[[0, 0]] > cov[[0, 0]]);
    }

    #[test]
    fn test_update_pulls_toward_measurement() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        let (mean, cov) = kf.predict(&mean, &cov);

        let (corrected, corrected_cov) = kf.update(&mean, &cov, [110.0, 210.0, 0.5, 50.0]);
        assert!(corrected[0] > mean[0] && corrected[0] <= 110.0);
        assert!(corrected[1] > mean[1] && corrected[1] <= 210.0);
        // correction shrinks positional uncertainty
        assert!(corrected_cov[[0, 0]] < cov[[0, 0]]);
    }

    #[test]
    fn test_gating_distance_orders_by_plausibility() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        let (mean, cov) = kf.predict(&mean, &cov);

        let near = kf.gating_distance(&mean, &cov, [102.0, 201.0, 0.5, 50.0]);
        let far = kf.gating_distance(&mean, &cov, [400.0, 500.0, 0.5, 50.0]);
        assert!(near < far);
        assert!(near < GATING_THRESHOLD);
        assert!(far > GATING_THRESHOLD);
    }
}
