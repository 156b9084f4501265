//! Bones and skeletons for skinned meshes.
//!
//! A [`Skeleton`] owns its bones in a flat array; parents are referenced by
//! index and must appear before their children. Skinning matrices are
//! written into a flat `f32` buffer, 16 floats per bone in column-major
//! order, and optionally mirrored into an RGBA32F texture for vertex
//! texture fetch.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    data_structures::texture::{Image, Texture2D, TextureDescriptor},
    gl::{PixelFormat, PixelType, TextureFilter, WrapMode},
    math::transform::Transform,
};

const FLOATS_PER_BONE: usize = 16;
const TEXELS_PER_BONE: u32 = 4;

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone in the owning skeleton.
    pub parent: Option<usize>,
    /// Parent-relative transform.
    pub transform: Transform,
    /// `transform` as a matrix.
    pub matrix: Matrix4<f32>,
    pub world_matrix: Matrix4<f32>,
    /// Inverse bind matrix.
    pub offset_matrix: Matrix4<f32>,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, offset_matrix: Matrix4<f32>) -> Self {
        Self {
            name: name.into(),
            parent,
            transform: Transform::new(),
            matrix: Matrix4::identity(),
            world_matrix: Matrix4::identity(),
            offset_matrix,
        }
    }
}

#[derive(Debug)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    bone_matrices: Vec<f32>,
    bone_texture: Option<Texture2D>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Self {
        let bone_matrices = vec![0.0; FLOATS_PER_BONE * bones.len()];
        Self {
            bones,
            bone_matrices,
            bone_texture: None,
        }
    }

    /// Mirror the bone matrices into a float texture. The texture is the
    /// smallest power-of-two square with room for four texels per bone.
    pub fn with_bone_texture(mut self) -> Self {
        let size = bone_texture_size(self.bones.len());
        let desc = TextureDescriptor {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            mag_filter: TextureFilter::Nearest,
            min_filter: TextureFilter::Nearest,
            format: PixelFormat::Rgba,
            internal_format: None,
            pixel_type: PixelType::Float,
            generate_mipmaps: false,
            flip_y: false,
            ..TextureDescriptor::default()
        };
        let texture = Texture2D::from_image(Image::Raw {
            width: size,
            height: size,
            data: vec![0; bone_texture_bytes(size)],
        })
        .with_descriptor(desc);
        self.bone_texture = Some(texture);
        self
    }

    pub fn bone_texture(&self) -> Option<&Texture2D> {
        self.bone_texture.as_ref()
    }

    pub fn bone_texture_mut(&mut self) -> Option<&mut Texture2D> {
        self.bone_texture.as_mut()
    }

    /// Skinning matrices, 16 floats per bone.
    pub fn bone_matrices(&self) -> &[f32] {
        &self.bone_matrices
    }

    /// Skinning matrices as bytes, ready for a uniform or storage buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bone_matrices)
    }

    /// Return every bone to the bind pose.
    ///
    /// World matrices are reset from the inverse bind matrices first; only
    /// then are the local transforms derived, so a child always sees its
    /// parent's bind-pose world matrix.
    pub fn pose(&mut self) {
        for bone in &mut self.bones {
            bone.world_matrix = bone.offset_matrix.invert().unwrap_or_else(|| {
                log::warn!("offset matrix of bone {} is not invertible", bone.name);
                Matrix4::identity()
            });
        }

        for index in 0..self.bones.len() {
            let parent_world = self.bones[index]
                .parent
                .and_then(|parent| self.bones.get(parent))
                .map(|parent| parent.world_matrix);

            let bone = &mut self.bones[index];
            bone.matrix = match parent_world {
                Some(parent_world) => {
                    parent_world.invert().unwrap_or_else(Matrix4::identity) * bone.world_matrix
                }
                None => bone.world_matrix,
            };
            bone.transform = Transform::from_matrix(&bone.matrix);
        }
    }

    /// Recompute local and world matrices from the bones' transforms.
    pub fn update_world_matrices(&mut self) {
        for index in 0..self.bones.len() {
            let parent_world = self.bones[index]
                .parent
                .filter(|&parent| parent < index)
                .map(|parent| self.bones[parent].world_matrix);

            let bone = &mut self.bones[index];
            bone.matrix = bone.transform.to_matrix();
            bone.world_matrix = match parent_world {
                Some(parent_world) => parent_world * bone.matrix,
                None => bone.matrix,
            };
        }
    }

    /// Write `world * offset` of every bone into the matrix buffer. The bone
    /// texture, if any, gets the new data and exactly one version bump.
    ///
    /// The buffer always holds 16 floats per current bone; bones added or
    /// removed since the last update resize it, and the texture grows with it.
    pub fn update_gpu_buffer(&mut self) {
        let floats = FLOATS_PER_BONE * self.bones.len();
        if self.bone_matrices.len() != floats {
            log::debug!(
                "bone count changed, resizing bone matrices from {} to {floats} floats",
                self.bone_matrices.len()
            );
            self.bone_matrices.resize(floats, 0.0);
        }

        for (bone, slot) in self
            .bones
            .iter()
            .zip(self.bone_matrices.chunks_exact_mut(FLOATS_PER_BONE))
        {
            let skinning = bone.world_matrix * bone.offset_matrix;
            let values: &[f32; 16] = skinning.as_ref();
            slot.copy_from_slice(values);
        }

        if let Some(texture) = self.bone_texture.as_mut() {
            let bytes: &[u8] = bytemuck::cast_slice(&self.bone_matrices);
            match texture.image.as_mut() {
                Some(Image::Raw { data, .. }) if data.len() >= bytes.len() => {
                    data[..bytes.len()].copy_from_slice(bytes);
                }
                _ => {
                    let size = bone_texture_size(self.bones.len());
                    let mut data = vec![0; bone_texture_bytes(size)];
                    data[..bytes.len()].copy_from_slice(bytes);
                    // assigned directly so the version moves only once below
                    texture.image = Some(Image::Raw {
                        width: size,
                        height: size,
                        data,
                    });
                }
            }
            texture.bump_version();
        }
    }

    /// The first bone called `name`.
    pub fn get_bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|bone| bone.name == name)
    }
}

/// Side of the smallest power-of-two square holding four texels per bone.
pub fn bone_texture_size(bones: usize) -> u32 {
    let texels = (bones as u32).max(1) * TEXELS_PER_BONE;
    let mut size = 1;
    while size * size < texels {
        size *= 2;
    }
    size
}

/// Byte length of an RGBA32F bone texture with the given side.
fn bone_texture_bytes(size: u32) -> usize {
    (size * size * 4) as usize * std::mem::size_of::<f32>()
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, Quaternion, Rotation3, Vector3};

    use super::*;
    use crate::math::transform::compose;

    fn close(a: &Matrix4<f32>, b: &Matrix4<f32>) -> bool {
        let a: &[f32; 16] = a.as_ref();
        let b: &[f32; 16] = b.as_ref();
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    fn bind_matrix() -> Matrix4<f32> {
        compose(
            Vector3::new(1.0, 2.0, -3.0),
            Quaternion::from_angle_y(Deg(30.0)),
            Vector3::new(2.0, 2.0, 2.0),
        )
    }

    #[test]
    fn pose_on_root_bone_uses_inverse_offset() {
        let world = bind_matrix();
        let offset = world.invert().unwrap();
        let mut skeleton = Skeleton::new(vec![Bone::new("root", None, offset)]);
        skeleton.pose();

        let bone = &skeleton.bones[0];
        assert!(close(&bone.world_matrix, &world));
        assert!(close(&bone.matrix, &bone.world_matrix));
        assert!(close(&bone.transform.to_matrix(), &world));
    }

    #[test]
    fn pose_makes_children_parent_relative() {
        let root_world = bind_matrix();
        let child_world = root_world * Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0));
        let mut skeleton = Skeleton::new(vec![
            Bone::new("root", None, root_world.invert().unwrap()),
            Bone::new("child", Some(0), child_world.invert().unwrap()),
        ]);
        skeleton.pose();

        let child = &skeleton.bones[1];
        assert!((child.transform.position - Vector3::new(0.0, 1.0, 0.0)).magnitude2() < 1e-6);

        skeleton.update_world_matrices();
        assert!(close(&skeleton.bones[1].world_matrix, &child_world));
    }

    #[test]
    fn gpu_buffer_holds_sixteen_floats_per_bone() {
        let mut bones = vec![
            Bone::new("a", None, Matrix4::from_scale(2.0)),
            Bone::new("b", Some(0), Matrix4::identity()),
            Bone::new("c", Some(1), Matrix4::identity()),
        ];
        bones[2].world_matrix = Matrix4::from_translation(Vector3::new(4.0, 5.0, 6.0));
        let mut skeleton = Skeleton::new(bones);
        skeleton.update_gpu_buffer();

        assert_eq!(skeleton.bone_matrices().len(), 48);
        for (index, bone) in skeleton.bones.iter().enumerate() {
            let expected = bone.world_matrix * bone.offset_matrix;
            let expected: &[f32; 16] = expected.as_ref();
            assert_eq!(&skeleton.bone_matrices()[index * 16..(index + 1) * 16], expected);
        }
        assert_eq!(skeleton.as_bytes().len(), 48 * 4);
    }

    #[test]
    fn bone_texture_version_moves_once_per_update() {
        let bones = (0..5)
            .map(|i| Bone::new(format!("bone{i}"), None, Matrix4::identity()))
            .collect();
        let mut skeleton = Skeleton::new(bones).with_bone_texture();
        let texture = skeleton.bone_texture().unwrap();
        assert_eq!(texture.width(), 8);
        let before = texture.version();

        skeleton.update_gpu_buffer();
        assert_eq!(skeleton.bone_texture().unwrap().version(), before + 1);

        let data = skeleton.bone_texture().unwrap().image.as_ref().unwrap().data().unwrap();
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(data);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[5], 1.0);
    }

    #[test]
    fn buffer_follows_bones_added_after_creation() {
        let mut skeleton = Skeleton::new(vec![
            Bone::new("a", None, Matrix4::identity()),
            Bone::new("b", Some(0), Matrix4::identity()),
        ])
        .with_bone_texture();
        assert_eq!(skeleton.bone_texture().unwrap().width(), 4);

        let mut extra = Bone::new("c", Some(1), Matrix4::from_scale(3.0));
        extra.world_matrix = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        skeleton.bones.push(extra);
        skeleton.bones.extend((0..2).map(|i| Bone::new(format!("d{i}"), None, Matrix4::identity())));
        let before = skeleton.bone_texture().unwrap().version();
        skeleton.update_gpu_buffer();

        assert_eq!(skeleton.bone_matrices().len(), 16 * 5);
        let expected = skeleton.bones[2].world_matrix * skeleton.bones[2].offset_matrix;
        let expected: &[f32; 16] = expected.as_ref();
        assert_eq!(&skeleton.bone_matrices()[32..48], expected);

        let texture = skeleton.bone_texture().unwrap();
        assert_eq!(texture.width(), bone_texture_size(5));
        assert_eq!(texture.version(), before + 1);
        let floats: Vec<f32> =
            bytemuck::pod_collect_to_vec(texture.image.as_ref().unwrap().data().unwrap());
        assert_eq!(&floats[32..48], expected);

        skeleton.bones.truncate(1);
        skeleton.update_gpu_buffer();
        assert_eq!(skeleton.bone_matrices().len(), 16);
    }

    #[test]
    fn bone_texture_sizes() {
        assert_eq!(bone_texture_size(0), 2);
        assert_eq!(bone_texture_size(1), 2);
        assert_eq!(bone_texture_size(4), 4);
        assert_eq!(bone_texture_size(5), 8);
        assert_eq!(bone_texture_size(64), 16);
    }

    #[test]
    fn lookup_by_name_returns_first_match() {
        let mut skeleton = Skeleton::new(vec![
            Bone::new("arm", None, Matrix4::identity()),
            Bone::new("arm", Some(0), Matrix4::from_scale(3.0)),
        ]);
        assert_eq!(skeleton.get_bone_by_name("arm").unwrap().parent, None);
        assert!(skeleton.get_bone_by_name("leg").is_none());
        skeleton.bones.clear();
        assert!(skeleton.get_bone_by_name("arm").is_none());
    }
}
