#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use flow_gl::{
    core::GlCore,
    data_structures::texture::Image,
    gl::{
        GraphicsApi, ImageTarget, TexParameter, TextureTarget,
        headless::{GlCall, HeadlessGl},
    },
    render::{DrawPass, Scene, ShadowPass},
};
use image::{Rgba, RgbaImage};

/// Marker the test shadow pass leaves in the call log.
pub const SHADOW_MARK: [f32; 4] = [7.0, 7.0, 7.0, 7.0];
/// Marker the test draw pass leaves in the call log.
pub const DRAW_MARK: [f32; 4] = [9.0, 9.0, 9.0, 9.0];

pub fn surface(width: u32, height: u32) -> Image {
    Image::Surface(RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255])))
}

pub fn raw(width: u32, height: u32) -> Image {
    Image::Raw {
        width,
        height,
        data: vec![0; (width * height * 4) as usize],
    }
}

pub fn core(gl: HeadlessGl) -> GlCore<HeadlessGl> {
    GlCore::new(gl)
}

/// `(target, level, width, height)` of every recorded upload.
pub fn uploads(gl: &HeadlessGl) -> Vec<(ImageTarget, u32, u32, u32)> {
    gl.calls()
        .iter()
        .filter_map(|call| match call {
            GlCall::TexImage2D {
                target,
                level,
                width,
                height,
                ..
            } => Some((*target, *level, *width, *height)),
            _ => None,
        })
        .collect()
}

/// Integer parameters set on `target`, in call order.
pub fn parameters(gl: &HeadlessGl, target: TextureTarget) -> Vec<(TexParameter, u32)> {
    gl.calls()
        .iter()
        .filter_map(|call| match call {
            GlCall::TexParameterI(t, parameter, value) if *t == target => Some((*parameter, *value)),
            _ => None,
        })
        .collect()
}

pub fn count(gl: &HeadlessGl, wanted: &GlCall) -> usize {
    gl.count(|call| call == wanted)
}

/// Shared log of collaborator invocations.
pub type Events = Rc<RefCell<Vec<&'static str>>>;

pub struct TestScene {
    pub events: Events,
}

impl Scene for TestScene {
    fn update_matrix(&mut self) {
        self.events.borrow_mut().push("update_matrix");
    }

    fn update_lights(&mut self) {
        self.events.borrow_mut().push("update_lights");
    }
}

pub struct TestShadowPass {
    pub events: Events,
}

impl<G: GraphicsApi> ShadowPass<G, TestScene> for TestShadowPass {
    fn render(&mut self, core: &mut GlCore<G>, _: &TestScene) -> anyhow::Result<()> {
        self.events.borrow_mut().push("shadow");
        core.set_clear_color(SHADOW_MARK);
        Ok(())
    }
}

pub struct TestDrawPass {
    pub events: Events,
    pub fail: bool,
}

impl<G: GraphicsApi> DrawPass<G, TestScene, ()> for TestDrawPass {
    fn render(&mut self, core: &mut GlCore<G>, _: &TestScene, _: &()) -> anyhow::Result<()> {
        self.events.borrow_mut().push("draw");
        core.set_clear_color(DRAW_MARK);
        if self.fail {
            anyhow::bail!("draw pass refused to draw");
        }
        Ok(())
    }
}
