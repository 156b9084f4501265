//! Translation/rotation/scale transforms and matrix decomposition.

use std::ops::Mul;

use cgmath::{InnerSpace, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

/// A transform stored as position, rotation (quaternion) and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// The identity transform.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// `T * R * S`.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        compose(self.position, self.rotation, self.scale)
    }

    pub fn from_matrix(matrix: &Matrix4<f32>) -> Self {
        let (position, rotation, scale) = decompose(matrix);
        Self {
            position,
            rotation,
            scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    /// Parent-child composition. Exact for uniform scales.
    fn mul(self, rhs: &'b Transform) -> Self::Output {
        let new_rotation = self.rotation * rhs.rotation;

        let new_scale = Vector3::new(
            self.scale.x * rhs.scale.x,
            self.scale.y * rhs.scale.y,
            self.scale.z * rhs.scale.z,
        );
        let scaled_rhs_pos = Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        let new_position = self.position + (self.rotation * scaled_rhs_pos);

        Transform {
            position: new_position,
            rotation: new_rotation,
            scale: new_scale,
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Self::Output {
        &self * &rhs
    }
}

pub fn compose(position: Vector3<f32>, rotation: Quaternion<f32>, scale: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_translation(position)
        * Matrix4::from(rotation)
        * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
}

/// Split an affine matrix into translation, rotation and scale.
///
/// A negative determinant is attributed to the x axis. Columns of zero
/// length leave the rotation undefined.
pub fn decompose(matrix: &Matrix4<f32>) -> (Vector3<f32>, Quaternion<f32>, Vector3<f32>) {
    let x_axis = matrix.x.truncate();
    let y_axis = matrix.y.truncate();
    let z_axis = matrix.z.truncate();

    let mut sx = x_axis.magnitude();
    let sy = y_axis.magnitude();
    let sz = z_axis.magnitude();
    if matrix.determinant() < 0.0 {
        sx = -sx;
    }

    let position = matrix.w.truncate();
    let rotation = Matrix3::from_cols(x_axis / sx, y_axis / sy, z_axis / sz);
    let rotation = Quaternion::from(rotation).normalize();

    (position, rotation, Vector3::new(sx, sy, sz))
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Rotation3};

    use super::*;

    fn matrices_close(a: &Matrix4<f32>, b: &Matrix4<f32>) -> bool {
        let a: &[f32; 16] = a.as_ref();
        let b: &[f32; 16] = b.as_ref();
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn decompose_inverts_compose() {
        let position = Vector3::new(1.0, -2.0, 3.5);
        let rotation = Quaternion::from_axis_angle(Vector3::new(0.0, 1.0, 1.0).normalize(), Deg(40.0));
        let scale = Vector3::new(2.0, 0.5, 1.5);
        let matrix = compose(position, rotation, scale);

        let (p, r, s) = decompose(&matrix);
        assert!((p - position).magnitude() < 1e-5);
        assert!((s - scale).magnitude() < 1e-5);
        assert!(matrices_close(&compose(p, r, s), &matrix));
    }

    #[test]
    fn mirrored_matrices_get_negative_x_scale() {
        let matrix = Matrix4::from_nonuniform_scale(-1.0, 1.0, 1.0);
        let (_, r, s) = decompose(&matrix);
        assert!((s.x + 1.0).abs() < 1e-6);
        assert!(matrices_close(&compose(Vector3::new(0.0, 0.0, 0.0), r, s), &matrix));
    }

    #[test]
    fn composition_matches_matrix_product_for_uniform_scale() {
        let parent = Transform {
            position: Vector3::new(0.0, 1.0, 0.0),
            rotation: Quaternion::from_angle_z(Deg(90.0)),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let child = Transform {
            position: Vector3::new(1.0, 0.0, 0.0),
            ..Transform::new()
        };
        let combined = &parent * &child;
        assert!(matrices_close(
            &combined.to_matrix(),
            &(parent.to_matrix() * child.to_matrix())
        ));
    }
}
