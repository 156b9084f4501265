use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3};

/// A plane `normal · p + constant = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub constant: f32,
}

impl Plane {
    pub fn new(normal: Vector3<f32>, constant: f32) -> Self {
        Self { normal, constant }
    }

    pub fn set(&mut self, normal: Vector3<f32>, constant: f32) -> &mut Self {
        self.normal = normal;
        self.constant = constant;
        self
    }

    pub fn set_components(&mut self, x: f32, y: f32, z: f32, w: f32) -> &mut Self {
        self.normal = Vector3::new(x, y, z);
        self.constant = w;
        self
    }

    pub fn from_normal_and_coplanar_point(normal: Vector3<f32>, point: Vector3<f32>) -> Self {
        Self {
            normal,
            constant: -point.dot(normal),
        }
    }

    /// Scale to a unit normal.
    ///
    /// The normal must not be zero; a zero normal divides by zero and leaves
    /// the plane full of non-finite values.
    pub fn normalize(&mut self) -> &mut Self {
        let inverse_length = 1.0 / self.normal.magnitude();
        self.normal *= inverse_length;
        self.constant *= inverse_length;
        self
    }

    /// Signed distance, exact for normalized planes.
    pub fn distance_to_point(&self, point: Vector3<f32>) -> f32 {
        self.normal.dot(point) + self.constant
    }

    pub fn coplanar_point(&self) -> Vector3<f32> {
        self.normal * -self.constant
    }

    /// Transform the plane by `matrix`. `normal_matrix` defaults to the
    /// inverse transpose of the upper 3x3 of `matrix`.
    pub fn apply_matrix4(
        &mut self,
        matrix: &Matrix4<f32>,
        normal_matrix: Option<&Matrix3<f32>>,
    ) -> &mut Self {
        let normal_matrix = match normal_matrix {
            Some(normal_matrix) => *normal_matrix,
            None => normal_matrix_of(matrix),
        };
        let reference_point = (*matrix * self.coplanar_point().extend(1.0)).truncate();
        let normal = (normal_matrix * self.normal).normalize();

        self.normal = normal;
        self.constant = -reference_point.dot(normal);
        self
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::new(Vector3::unit_x(), 0.0)
    }
}

/// Inverse transpose of the upper 3x3. Singular matrices have no inverse;
/// their upper 3x3 is used as is.
fn normal_matrix_of(matrix: &Matrix4<f32>) -> Matrix3<f32> {
    let upper = Matrix3::from_cols(
        matrix.x.truncate(),
        matrix.y.truncate(),
        matrix.z.truncate(),
    );
    upper.invert().unwrap_or(upper).transpose()
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Matrix4};

    use super::*;

    #[test]
    fn distance_is_signed() {
        let plane = Plane::new(Vector3::unit_y(), -2.0);
        assert!((plane.distance_to_point(Vector3::new(0.0, 5.0, 0.0)) - 3.0).abs() < 1e-6);
        assert!((plane.distance_to_point(Vector3::new(4.0, 0.0, 0.0)) + 2.0).abs() < 1e-6);
    }

    #[test]
    fn coplanar_point_lies_on_the_plane() {
        let plane = Plane::from_normal_and_coplanar_point(
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(3.0, 1.0, 7.0),
        );
        assert!(plane.distance_to_point(plane.coplanar_point()).abs() < 1e-6);
        assert_eq!(plane.constant, -7.0);
    }

    #[test]
    fn normalize_scales_constant_too() {
        let mut plane = Plane::default();
        plane.set_components(0.0, 2.0, 0.0, 4.0).normalize();
        assert!((plane.normal - Vector3::unit_y()).magnitude() < 1e-6);
        assert!((plane.constant - 2.0).abs() < 1e-6);
    }

    #[test]
    fn translation_moves_the_plane() {
        let mut plane = Plane::new(Vector3::unit_y(), 0.0);
        plane.apply_matrix4(&Matrix4::from_translation(Vector3::new(0.0, 3.0, 0.0)), None);
        assert!((plane.normal - Vector3::unit_y()).magnitude() < 1e-6);
        assert!((plane.constant + 3.0).abs() < 1e-6);
    }

    #[test]
    fn rotation_turns_the_normal() {
        let mut plane = Plane::new(Vector3::unit_x(), -1.0);
        plane.apply_matrix4(&Matrix4::from_angle_z(Deg(90.0)), None);
        assert!((plane.normal - Vector3::unit_y()).magnitude() < 1e-5);
        assert!((plane.constant + 1.0).abs() < 1e-5);
    }
}
