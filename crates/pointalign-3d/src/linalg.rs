/// The 3x3 identity matrix.
pub const IDENTITY33: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated vector to store the transformed points.
///
/// PRECONDITION: dst_points is a pre-allocated vector of the same size as source.
///
/// Example:
///
/// ```
/// use pointalign_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &rotation, &translation, &mut dst_points);
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) {
    assert_eq!(src_points.len(), dst_points.len());

    for (point_dst, point_src) in dst_points.iter_mut().zip(src_points.iter()) {
        *point_dst = transform_point(point_src, dst_r_src, dst_t_src);
    }
}

/// Transform a set of points in place using a rotation and translation.
pub fn transform_points_inplace(
    points: &mut [[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
) {
    for point in points.iter_mut() {
        *point = transform_point(point, dst_r_src, dst_t_src);
    }
}

/// Compute `R * p + t` for a single point.
#[inline]
pub fn transform_point(p: &[f64; 3], r: &[[f64; 3]; 3], t: &[f64; 3]) -> [f64; 3] {
    add3(&matvec33(r, p), t)
}

/// Multiply two 3x3 matrices.
///
/// # Arguments
///
/// * `a` - The left hand side matrix.
/// * `b` - The right hand side matrix.
///
/// # Returns
///
/// The product `a * b`.
pub fn matmul33(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    m
}

/// Multiply a 3x3 matrix by a 3d vector.
#[inline]
pub fn matvec33(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [dot3(&m[0], v), dot3(&m[1], v), dot3(&m[2], v)]
}

/// Transpose a 3x3 matrix.
pub fn transpose33(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Compute the determinant of a 3x3 matrix.
pub fn det33(m: &[[f64; 3]; 3]) -> f64 {
    dot3(&m[0], &cross3(&m[1], &m[2]))
}

/// Compute the trace of a 3x3 matrix.
#[inline]
pub fn trace33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] + m[1][1] + m[2][2]
}

/// Compute the outer product `a * b^T`.
pub fn outer3(a: &[f64; 3], b: &[f64; 3]) -> [[f64; 3]; 3] {
    [scale3(b, a[0]), scale3(b, a[1]), scale3(b, a[2])]
}

/// Add two 3d vectors.
#[inline]
pub fn add3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Subtract two 3d vectors.
#[inline]
pub fn sub3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Scale a 3d vector.
#[inline]
pub fn scale3(a: &[f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Dot product of two 3d vectors.
#[inline]
pub fn dot3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product of two 3d vectors.
#[inline]
pub fn cross3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Euclidean norm of a 3d vector.
#[inline]
pub fn norm3(a: &[f64; 3]) -> f64 {
    dot3(a, a).sqrt()
}

/// Utility function to compute the Euclidean distance between two points.
///
/// Example:
/// ```
/// use pointalign_3d::linalg::euclidean_distance;
///
/// let a = [1.0, 2.0, 3.0];
/// let b = [4.0, 5.0, 6.0];
/// let dst = euclidean_distance(&a, &b);
/// assert!((dst - 27f64.sqrt()).abs() < 1e-12);
/// ```
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm3(&sub3(a, b))
}

/// Frobenius norm of `R^T * R - I`.
///
/// Zero for an orthonormal matrix.
pub fn orthonormality_error(r: &[[f64; 3]; 3]) -> f64 {
    let rtr = matmul33(&transpose33(r), r);
    let mut sum = 0.0;
    for (i, row) in rtr.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            sum += (val - IDENTITY33[i][j]).powi(2);
        }
    }
    sum.sqrt()
}

/// Project a nearly orthonormal matrix back onto the rotation group.
///
/// Gram-Schmidt on the columns; the third column is rebuilt as the cross
/// product of the first two so the determinant stays at +1.
pub fn orthonormalize(r: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let cols = transpose33(r);

    let c0 = scale3(&cols[0], 1.0 / norm3(&cols[0]));
    let c1 = sub3(&cols[1], &scale3(&c0, dot3(&c0, &cols[1])));
    let c1 = scale3(&c1, 1.0 / norm3(&c1));
    let c2 = cross3(&c0, &c1);

    transpose33(&[c0, c1, c2])
}
