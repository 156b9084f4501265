//! Light definitions and their GPU uniform layout.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector3};

use crate::math::color::Color3;

/// Color and strength shared by every light type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub color: Color3,
    pub intensity: f32,
}

impl Light {
    pub fn new(color: Color3, intensity: f32) -> Self {
        Self { color, intensity }
    }

    pub fn copy_from(&mut self, source: &Light) -> &mut Self {
        self.color = source.color;
        self.intensity = source.intensity;
        self
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new(Color3::WHITE, 1.0)
    }
}

/// Shadow map settings of a light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightShadow {
    pub bias: f32,
    /// Blur radius in texels for soft shadows.
    pub radius: f32,
    pub map_size: (u32, u32),
    pub camera_near: f32,
    pub camera_far: f32,
}

impl LightShadow {
    pub fn copy_from(&mut self, source: &LightShadow) -> &mut Self {
        *self = *source;
        self
    }
}

impl Default for LightShadow {
    fn default() -> Self {
        Self {
            bias: 0.0,
            radius: 1.0,
            map_size: (512, 512),
            camera_near: 1.0,
            camera_far: 500.0,
        }
    }
}

/// A cone of light from a point towards a direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub light: Light,
    /// How fast the light dims with distance.
    pub decay: f32,
    /// Range beyond which the light contributes nothing.
    pub distance: f32,
    /// Fraction of the cone attenuated at its edge, `0.0..=1.0`.
    pub penumbra: f32,
    /// Half-angle of the cone in radians, at most π/2.
    pub angle: f32,
    pub shadow: LightShadow,
}

impl SpotLight {
    pub fn new(color: Color3, intensity: f32) -> Self {
        Self {
            light: Light::new(color, intensity),
            ..Self::default()
        }
    }

    /// Copy the color, the intensity and the shadow settings of `source`.
    /// Cone and attenuation settings are left as they are.
    pub fn copy_from(&mut self, source: &SpotLight) -> &mut Self {
        self.light.copy_from(&source.light);
        self.shadow.copy_from(&source.shadow);
        self
    }

    /// Pack the light for a shader, given its world position and direction.
    pub fn to_uniform(&self, position: Vector3<f32>, direction: Vector3<f32>) -> SpotLightUniform {
        let color = self.light.color.to_array().map(|c| c * self.light.intensity);
        let cone_cos = self.angle.cos();
        let penumbra_cos = (self.angle * (1.0 - self.penumbra)).cos();
        SpotLightUniform {
            position: position.into(),
            distance: self.distance,
            direction: direction.normalize().into(),
            decay: self.decay,
            color,
            cone_cos,
            penumbra_cos,
            _padding: [0; 3],
        }
    }
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            light: Light::default(),
            decay: 1.0,
            distance: 200.0,
            penumbra: 0.0,
            angle: PI / 6.0,
            shadow: LightShadow::default(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotLightUniform {
    position: [f32; 3],
    distance: f32,
    direction: [f32; 3],
    decay: f32,
    color: [f32; 3],
    cone_cos: f32,
    penumbra_cos: f32,
    // Uniforms are laid out in 16 byte rows
    _padding: [u32; 3],
}
