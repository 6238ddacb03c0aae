use pointalign_3d::linalg;
use serde::{Deserialize, Serialize};

use crate::correspondence::CorrespondenceMap;

/// Drift of `R^T * R` from the identity above which a composed rotation is re-orthonormalized.
const ORTHONORMALITY_DRIFT: f64 = 1e-10;

/// A rotation followed by a translation, `p -> R * p + t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Rotation matrix, row major.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Create a transform from a rotation matrix and a translation vector.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(linalg::IDENTITY33, [0.0; 3])
    }

    /// Transform a single point.
    #[inline]
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point(point, &self.rotation, &self.translation)
    }

    /// The transform applying `self` first and then `next`.
    ///
    /// R = R_next * R_self, t = R_next * t_self + t_next. The rotation is
    /// projected back onto SO(3) once it drifts.
    /// The translation is rotated, unlike the plain sum `t_self + t_next`.
    pub fn then(&self, next: &RigidTransform) -> RigidTransform {
        let mut rotation = linalg::matmul33(&next.rotation, &self.rotation);
        if linalg::orthonormality_error(&rotation) > ORTHONORMALITY_DRIFT {
            rotation = linalg::orthonormalize(&rotation);
        }
        let translation = linalg::add3(
            &linalg::matvec33(&next.rotation, &self.translation),
            &next.translation,
        );
        RigidTransform::new(rotation, translation)
    }

    /// The inverse transform, `p -> R^T * (p - t)`.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = linalg::transpose33(&self.rotation);
        let translation = linalg::scale3(&linalg::matvec33(&rotation, &self.translation), -1.0);
        RigidTransform::new(rotation, translation)
    }
}

/// Mean Euclidean distance between each model point and its transformed data partner.
///
/// This is the mean of the norms, not a root mean square.
pub(crate) fn mean_residual(
    data: &[[f64; 3]],
    model: &[[f64; 3]],
    correspondences: &CorrespondenceMap,
    transform: &RigidTransform,
) -> f64 {
    if correspondences.is_empty() {
        return 0.0;
    }
    let sum = correspondences
        .iter()
        .map(|(&i, &j)| linalg::euclidean_distance(&model[j], &transform.apply(&data[i])))
        .sum::<f64>();
    sum / correspondences.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pointalign_3d::transforms::axis_angle_to_rotation_matrix;

    fn assert_transform_eq(a: &RigidTransform, b: &RigidTransform, epsilon: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(a.rotation[i][j], b.rotation[i][j], epsilon = epsilon);
            }
            assert_relative_eq!(a.translation[i], b.translation[i], epsilon = epsilon);
        }
    }

    #[test]
    fn test_then_matches_sequential_application() -> Result<(), Box<dyn std::error::Error>> {
        let first = RigidTransform::new(
            axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.3)?,
            [1.0, -2.0, 0.5],
        );
        let second = RigidTransform::new(
            axis_angle_to_rotation_matrix(&[1.0, 1.0, 0.0], -0.8)?,
            [0.2, 0.0, 3.0],
        );
        let composed = first.then(&second);

        let p = [0.3, 0.7, -1.2];
        let expected = second.apply(&first.apply(&p));
        let actual = composed.apply(&p);
        for i in 0..3 {
            assert_relative_eq!(actual[i], expected[i], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_inverse() -> Result<(), Box<dyn std::error::Error>> {
        let t = RigidTransform::new(
            axis_angle_to_rotation_matrix(&[0.2, -1.0, 0.4], 1.1)?,
            [4.0, 5.0, -6.0],
        );
        assert_transform_eq(&t.then(&t.inverse()), &RigidTransform::identity(), 1e-12);
        assert_transform_eq(&t.inverse().then(&t), &RigidTransform::identity(), 1e-12);
        Ok(())
    }

    #[test]
    fn test_mean_residual() {
        let data = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [5.0, 5.0, 5.0]];
        let model = vec![[1.0, 0.0, 0.0], [2.0, 3.0, 0.0]];
        let correspondences = CorrespondenceMap::from([(0, 0), (1, 1)]);
        let shift = RigidTransform::new(linalg::IDENTITY33, [1.0, 0.0, 0.0]);

        // distances 0 and 3, the unmatched point is ignored
        assert_relative_eq!(mean_residual(&data, &model, &correspondences, &shift), 1.5);
    }
}
