//! Two-view relative pose recovery.
//!
//! Normalized 8-point essential-matrix estimation followed by the standard
//! four-way decomposition with a cheirality check. Image coordinates are
//! treated as normalized camera coordinates (focal 1.0, principal point at
//! the origin), so the fundamental and essential matrices coincide.
//!
//! Translation is recovered up to scale; callers get a unit-norm vector.

use nalgebra::{DMatrix, Matrix3, Matrix4, Point2, RowVector4, SymmetricEigen, Vector2, Vector3};

/// Minimum correspondences for the linear essential-matrix solve.
pub const MIN_POINTS: usize = 8;

/// Homogeneous scale below which a triangulated point is considered at
/// infinity and ignored by the cheirality count.
const HOMOGENEOUS_EPS: f64 = 1e-12;

/// Recover the unit translation between two views from point
/// correspondences.
///
/// Rotation is estimated internally (it is needed to disambiguate the four
/// decomposition candidates) but discarded: this odometry tracks position
/// only.
///
/// Returns `None` when fewer than [`MIN_POINTS`] correspondences are given
/// or the geometry is degenerate (coincident points, rank-deficient system,
/// no candidate passing the cheirality check).
pub fn recover_translation(
    pts1: &[Point2<f64>],
    pts2: &[Point2<f64>],
) -> Option<Vector3<f64>> {
    recover_pose(pts1, pts2).map(|(_rotation, translation)| translation)
}

/// Recover the full relative pose `(R, t)` mapping view-1 camera
/// coordinates into view-2 camera coordinates, with `t` unit-norm.
pub fn recover_pose(
    pts1: &[Point2<f64>],
    pts2: &[Point2<f64>],
) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    if pts1.len() != pts2.len() || pts1.len() < MIN_POINTS {
        return None;
    }
    let essential = estimate_essential(pts1, pts2)?;
    decompose_essential(&essential, pts1, pts2)
}

/// Hartley normalization: translate the centroid to the origin and scale so
/// the mean distance from it is sqrt(2).
fn normalize_points(pts: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    let n = pts.len() as f64;
    let centroid = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = pts.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if mean_dist <= f64::EPSILON {
        return None;
    }
    let scale = std::f64::consts::SQRT_2 / mean_dist;

    let normalized = pts
        .iter()
        .map(|p| Point2::from((p.coords - centroid) * scale))
        .collect();

    #[rustfmt::skip]
    let transform = Matrix3::new(
        scale, 0.0,   -scale * centroid.x,
        0.0,   scale, -scale * centroid.y,
        0.0,   0.0,   1.0,
    );
    Some((normalized, transform))
}

/// Linear 8-point estimate of the essential matrix satisfying
/// `x2^T E x1 = 0` for all correspondences.
fn estimate_essential(pts1: &[Point2<f64>], pts2: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let (norm1, t1) = normalize_points(pts1)?;
    let (norm2, t2) = normalize_points(pts2)?;

    let mut a = DMatrix::<f64>::zeros(norm1.len(), 9);
    for (i, (p1, p2)) in norm1.iter().zip(&norm2).enumerate() {
        let (x1, y1) = (p1.x, p1.y);
        let (x2, y2) = (p2.x, p2.y);
        let row = [
            x2 * x1,
            x2 * y1,
            x2,
            y2 * x1,
            y2 * y1,
            y2,
            x1,
            y1,
            1.0,
        ];
        for (j, v) in row.iter().enumerate() {
            a[(i, j)] = *v;
        }
    }

    // The null vector of A is the eigenvector of A^T A with the smallest
    // eigenvalue. Going through the 9x9 Gram matrix also covers the minimal
    // 8-correspondence case, where a thin SVD of A would not expose the
    // null space.
    let gram = a.transpose() * &a;
    let eigen = SymmetricEigen::new(gram);
    let mut min_idx = 0;
    for i in 1..eigen.eigenvalues.len() {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }
    let f = eigen.eigenvectors.column(min_idx);

    #[rustfmt::skip]
    let e_normalized = Matrix3::new(
        f[0], f[1], f[2],
        f[3], f[4], f[5],
        f[6], f[7], f[8],
    );

    // Undo the normalizing transforms.
    Some(t2.transpose() * e_normalized * t1)
}

/// Decompose an essential matrix into the four (R, t) candidates and pick
/// the one placing the most triangulated points in front of both cameras.
fn decompose_essential(
    essential: &Matrix3<f64>,
    pts1: &[Point2<f64>],
    pts2: &[Point2<f64>],
) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    let svd = essential.svd(true, true);
    let mut u = svd.u?;
    let mut v_t = svd.v_t?;

    // Proper rotations require positive determinants.
    if u.determinant() < 0.0 {
        u = -u;
    }
    if v_t.determinant() < 0.0 {
        v_t = -v_t;
    }

    #[rustfmt::skip]
    let w = Matrix3::new(
        0.0, -1.0, 0.0,
        1.0,  0.0, 0.0,
        0.0,  0.0, 1.0,
    );

    let r1 = u * w * v_t;
    let r2 = u * w.transpose() * v_t;
    let t: Vector3<f64> = u.column(2).into_owned();

    let candidates = [(r1, t), (r1, -t), (r2, t), (r2, -t)];

    let mut best: Option<(usize, Matrix3<f64>, Vector3<f64>)> = None;
    for (rotation, translation) in candidates {
        let mut in_front = 0;
        for (p1, p2) in pts1.iter().zip(pts2) {
            if let Some(point) = triangulate(p1, p2, &rotation, &translation) {
                let depth1 = point.z;
                let depth2 = (rotation * point + translation).z;
                if depth1 > 0.0 && depth2 > 0.0 {
                    in_front += 1;
                }
            }
        }
        if best.map_or(true, |(count, _, _)| in_front > count) {
            best = Some((in_front, rotation, translation));
        }
    }

    let (count, rotation, translation) = best?;
    if count == 0 {
        return None;
    }
    let norm = translation.norm();
    if norm <= f64::EPSILON {
        return None;
    }
    Some((rotation, translation / norm))
}

/// Linear (DLT) triangulation of a single correspondence given
/// `P1 = [I | 0]` and `P2 = [R | t]`.
fn triangulate(
    p1: &Point2<f64>,
    p2: &Point2<f64>,
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let p2_row0 = RowVector4::new(
        rotation[(0, 0)],
        rotation[(0, 1)],
        rotation[(0, 2)],
        translation.x,
    );
    let p2_row1 = RowVector4::new(
        rotation[(1, 0)],
        rotation[(1, 1)],
        rotation[(1, 2)],
        translation.y,
    );
    let p2_row2 = RowVector4::new(
        rotation[(2, 0)],
        rotation[(2, 1)],
        rotation[(2, 2)],
        translation.z,
    );

    let mut a = Matrix4::zeros();
    a.set_row(0, &RowVector4::new(-1.0, 0.0, p1.x, 0.0));
    a.set_row(1, &RowVector4::new(0.0, -1.0, p1.y, 0.0));
    a.set_row(2, &(p2_row2 * p2.x - p2_row0));
    a.set_row(3, &(p2_row2 * p2.y - p2_row1));

    let svd = a.svd(true, true);
    let v_t = svd.v_t?;
    // Singular values are sorted descending; the null vector is the last row.
    let x = v_t.row(3);
    if x[3].abs() < HOMOGENEOUS_EPS {
        return None;
    }
    Some(Vector3::new(x[0] / x[3], x[1] / x[3], x[2] / x[3]))
}
