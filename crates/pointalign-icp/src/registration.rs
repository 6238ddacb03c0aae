//! Closed-form absolute orientation with unit quaternions.
//!
//! Reference: B. K. P. Horn, "Closed-form solution of absolute orientation
//! using unit quaternions", JOSA A, 1987.

use faer::{Mat, Side};
use pointalign_3d::{linalg, transforms::quaternion_to_rotation_matrix};

use crate::correspondence::CorrespondenceMap;
use crate::error::ICPError;
use crate::ops::RigidTransform;

/// Minimum number of pairs needed to determine a rotation.
pub const MIN_CORRESPONDENCES: usize = 3;

/// Spread of the pairs, relative to the distance of their centroid to the
/// origin, under which it is indistinguishable from rounding.
const SPREAD_EPSILON: f64 = 1e3 * f64::EPSILON;

/// Compute the centroids of the corresponded data points and of their model partners.
///
/// Only points present in `correspondences` contribute, each pair with equal weight.
///
/// # Returns
///
/// The data centroid and the model centroid.
pub fn compute_centroids(
    data: &[[f64; 3]],
    model: &[[f64; 3]],
    correspondences: &CorrespondenceMap,
) -> ([f64; 3], [f64; 3]) {
    let mut centroid_data = [0.0; 3];
    let mut centroid_model = [0.0; 3];

    for (&i, &j) in correspondences.iter() {
        centroid_data = linalg::add3(&centroid_data, &data[i]);
        centroid_model = linalg::add3(&centroid_model, &model[j]);
    }

    let n = correspondences.len() as f64;
    (
        centroid_data.map(|v| v / n),
        centroid_model.map(|v| v / n),
    )
}

/// Compute the cross-covariance `1/M * sum(d_i * m_i^T) - c_d * c_m^T` of the pairs.
///
/// Accumulated as `1/M * sum((d_i - c_d) * (m_i - c_m)^T)`, which is the same
/// matrix without the cancellation of the uncentered form.
pub fn cross_covariance(
    data: &[[f64; 3]],
    model: &[[f64; 3]],
    correspondences: &CorrespondenceMap,
    centroid_data: &[f64; 3],
    centroid_model: &[f64; 3],
) -> [[f64; 3]; 3] {
    let mut sigma = [[0.0; 3]; 3];
    for (&i, &j) in correspondences.iter() {
        let d = linalg::sub3(&data[i], centroid_data);
        let m = linalg::sub3(&model[j], centroid_model);
        let outer = linalg::outer3(&d, &m);
        for (row, outer_row) in sigma.iter_mut().zip(outer.iter()) {
            for (val, o) in row.iter_mut().zip(outer_row.iter()) {
                *val += o;
            }
        }
    }

    let n = correspondences.len() as f64;
    sigma.map(|row| row.map(|v| v / n))
}

/// Build the symmetric 4x4 matrix whose dominant eigenvector is the optimal quaternion.
pub fn quaternion_matrix(sigma: &[[f64; 3]; 3]) -> [[f64; 4]; 4] {
    let trace = linalg::trace33(sigma);
    let delta = [
        sigma[1][2] - sigma[2][1],
        sigma[2][0] - sigma[0][2],
        sigma[0][1] - sigma[1][0],
    ];

    let mut q = [[0.0; 4]; 4];
    q[0][0] = trace;
    for k in 0..3 {
        q[0][k + 1] = delta[k];
        q[k + 1][0] = delta[k];
    }
    for i in 0..3 {
        for j in 0..3 {
            let diag = if i == j { trace } else { 0.0 };
            q[i + 1][j + 1] = sigma[i][j] + sigma[j][i] - diag;
        }
    }
    q
}

/// Compute the rigid transform mapping the corresponded data points onto the model points.
///
/// The rotation is read from the eigenvector of the largest eigenvalue of
/// [`quaternion_matrix`] and the translation aligns the two centroids.
/// Largest means most positive, not largest in magnitude.
///
/// # Arguments
///
/// * `data` - The data points.
/// * `model` - The model points.
/// * `correspondences` - Accepted pairs, data index to model index.
/// * `degeneracy_tolerance` - Minimum gap between the two largest eigenvalues,
///   relative to the sum of the absolute eigenvalues.
///
/// # Errors
///
/// Returns [`ICPError::NumericalDegeneracy`] with the iteration left at zero if
/// there are fewer than [`MIN_CORRESPONDENCES`] pairs, the pairs have no
/// spread beyond the rounding of their coordinates, or the dominant eigenvalue
/// is not isolated, e.g. when every pair lies on one line.
pub fn fit_transformation(
    data: &[[f64; 3]],
    model: &[[f64; 3]],
    correspondences: &CorrespondenceMap,
    degeneracy_tolerance: f64,
) -> Result<RigidTransform, ICPError> {
    if correspondences.len() < MIN_CORRESPONDENCES {
        return Err(degeneracy(format!(
            "{} correspondences, at least {} required",
            correspondences.len(),
            MIN_CORRESPONDENCES
        )));
    }

    let (centroid_data, centroid_model) = compute_centroids(data, model, correspondences);

    // a spread lost in the rounding of the coordinates counts as no spread at all
    let spread_data = rms_spread(correspondences.keys().map(|&i| &data[i]), &centroid_data);
    let spread_model = rms_spread(correspondences.values().map(|&j| &model[j]), &centroid_model);
    let magnitude = linalg::norm3(&centroid_data).max(linalg::norm3(&centroid_model));
    if spread_data.min(spread_model) <= SPREAD_EPSILON * magnitude {
        return Err(degeneracy(format!(
            "correspondences have no spread ({:e} around a centroid at distance {:e})",
            spread_data.min(spread_model),
            magnitude
        )));
    }

    let sigma = cross_covariance(data, model, correspondences, &centroid_data, &centroid_model);
    let q = quaternion_matrix(&sigma);

    // eigenvalues come back in ascending order, but do not rely on it
    let q_mat = Mat::<f64>::from_fn(4, 4, |i, j| q[i][j]);
    let eig = q_mat.selfadjoint_eigendecomposition(Side::Lower);
    let eigenvalues = eig.s().column_vector();
    let eigenvectors = eig.u();

    let mut order = (0..4).collect::<Vec<_>>();
    order.sort_by(|&a, &b| eigenvalues.read(b).total_cmp(&eigenvalues.read(a)));
    let (lambda_max, lambda_next) = (eigenvalues.read(order[0]), eigenvalues.read(order[1]));

    let scale = (0..4).map(|k| eigenvalues.read(k).abs()).sum::<f64>();
    if !scale.is_finite() || scale == 0.0 {
        return Err(degeneracy("zero cross-covariance".to_string()));
    }
    if lambda_max - lambda_next <= degeneracy_tolerance * scale {
        return Err(degeneracy(format!(
            "dominant eigenvalue {lambda_max:e} is not separated from {lambda_next:e}"
        )));
    }

    let quat = [
        eigenvectors.read(0, order[0]),
        eigenvectors.read(1, order[0]),
        eigenvectors.read(2, order[0]),
        eigenvectors.read(3, order[0]),
    ];
    if !quat.iter().all(|v| v.is_finite()) {
        return Err(degeneracy("non-finite eigenvector".to_string()));
    }

    let rotation = quaternion_to_rotation_matrix(&quat).map_err(|e| degeneracy(e.to_string()))?;
    let translation = linalg::sub3(&centroid_model, &linalg::matvec33(&rotation, &centroid_data));

    Ok(RigidTransform::new(rotation, translation))
}

/// Root mean square distance of `points` to `centroid`.
fn rms_spread<'a>(points: impl Iterator<Item = &'a [f64; 3]>, centroid: &[f64; 3]) -> f64 {
    let (sum, n) = points.fold((0.0, 0usize), |(sum, n), p| {
        let d = linalg::sub3(p, centroid);
        (sum + linalg::dot3(&d, &d), n + 1)
    });
    if n == 0 {
        return 0.0;
    }
    (sum / n as f64).sqrt()
}

fn degeneracy(reason: String) -> ICPError {
    ICPError::NumericalDegeneracy {
        iteration: 0,
        reason,
    }
}
