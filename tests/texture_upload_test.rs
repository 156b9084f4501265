mod common;

use common::test_utils::*;
use flow_gl::{
    data_structures::texture::{Texture2D, TextureCube, TextureDescriptor},
    gl::{
        CubeFace, ImageTarget, PixelFormat, PixelType, TexParameter, TextureFilter, TextureTarget,
        WrapMode, extension,
        headless::{GlCall, HeadlessGl},
    },
};

#[test]
fn unchanged_texture_is_only_rebound() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(64, 64));

    let handle = core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    assert_eq!(core.gl.upload_count(), 1);

    core.gl.take_calls();
    let again = core.bind_texture_2d(&mut texture, Some(3)).unwrap();
    assert_eq!(again, handle);
    assert_eq!(
        core.gl.calls(),
        &[
            GlCall::ActiveTexture(3),
            GlCall::BindTexture(TextureTarget::Texture2D, Some(handle)),
        ]
    );
    assert_eq!(core.state().current_texture_slot, Some(3));
}

#[test]
fn version_bump_uploads_again() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(16, 16));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    texture.bump_version();
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_eq!(core.gl.upload_count(), 2);
    assert_eq!(core.gl.count(|call| matches!(call, GlCall::CreateTexture(_))), 1);
}

#[test]
fn webgl1_resizes_npot_surface_to_nearest_power_of_two() {
    let mut core = core(HeadlessGl::webgl1());
    let mut texture = Texture2D::from_image(surface(300, 450));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_eq!(uploads(&core.gl), vec![(ImageTarget::Texture2D, 0, 256, 512)]);
    // the resize removes the incompatibility, requested settings stay
    assert_eq!(
        parameters(&core.gl, TextureTarget::Texture2D),
        vec![
            (TexParameter::WrapS, WrapMode::Repeat.gl_enum()),
            (TexParameter::WrapT, WrapMode::Repeat.gl_enum()),
            (TexParameter::MagFilter, TextureFilter::Linear.gl_enum()),
            (TexParameter::MinFilter, TextureFilter::LinearMipmapLinear.gl_enum()),
        ]
    );
    assert_eq!(count(&core.gl, &GlCall::GenerateMipmap(TextureTarget::Texture2D)), 1);
}

#[test]
fn webgl1_uploads_npot_clamped_texture_at_native_size() {
    let mut core = core(HeadlessGl::webgl1());
    let desc = TextureDescriptor {
        wrap_s: WrapMode::ClampToEdge,
        wrap_t: WrapMode::ClampToEdge,
        mag_filter: TextureFilter::Linear,
        min_filter: TextureFilter::Linear,
        ..TextureDescriptor::default()
    };
    let mut texture = Texture2D::from_image(surface(300, 450)).with_descriptor(desc);
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_eq!(uploads(&core.gl), vec![(ImageTarget::Texture2D, 0, 300, 450)]);
    assert_eq!(
        parameters(&core.gl, TextureTarget::Texture2D),
        vec![
            (TexParameter::WrapS, WrapMode::ClampToEdge.gl_enum()),
            (TexParameter::WrapT, WrapMode::ClampToEdge.gl_enum()),
            (TexParameter::MagFilter, TextureFilter::Linear.gl_enum()),
            (TexParameter::MinFilter, TextureFilter::Linear.gl_enum()),
        ]
    );
    assert_eq!(count(&core.gl, &GlCall::GenerateMipmap(TextureTarget::Texture2D)), 0);
}

#[test]
fn webgl2_keeps_npot_images() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(300, 450));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_eq!(uploads(&core.gl), vec![(ImageTarget::Texture2D, 0, 300, 450)]);
    assert_eq!(count(&core.gl, &GlCall::GenerateMipmap(TextureTarget::Texture2D)), 1);
}

#[test]
fn webgl1_raw_npot_data_falls_back_to_clamp_and_linear() {
    let mut core = core(HeadlessGl::webgl1());
    let mut texture = Texture2D::from_image(raw(3, 5));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_eq!(uploads(&core.gl), vec![(ImageTarget::Texture2D, 0, 3, 5)]);
    assert_eq!(
        parameters(&core.gl, TextureTarget::Texture2D),
        vec![
            (TexParameter::WrapS, WrapMode::ClampToEdge.gl_enum()),
            (TexParameter::WrapT, WrapMode::ClampToEdge.gl_enum()),
            (TexParameter::MagFilter, TextureFilter::Linear.gl_enum()),
            (TexParameter::MinFilter, TextureFilter::Linear.gl_enum()),
        ]
    );
    assert_eq!(count(&core.gl, &GlCall::GenerateMipmap(TextureTarget::Texture2D)), 0);
}

#[test]
fn oversized_surface_is_clamped_to_max_size() {
    let mut core = core(HeadlessGl::new().with_max_texture_size(128));
    let mut texture = Texture2D::from_image(surface(300, 100));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    assert_eq!(uploads(&core.gl), vec![(ImageTarget::Texture2D, 0, 128, 42)]);
}

#[test]
fn oversized_raw_data_is_uploaded_as_is() {
    let mut core = core(HeadlessGl::new().with_max_texture_size(4));
    let mut texture = Texture2D::from_image(raw(8, 8));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    assert_eq!(uploads(&core.gl), vec![(ImageTarget::Texture2D, 0, 8, 8)]);
}

#[test]
fn precomputed_mipmaps_replace_generated_ones() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(4, 4));
    texture.mipmaps = vec![surface(4, 4), surface(2, 2), surface(1, 1)];
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_eq!(
        uploads(&core.gl),
        vec![
            (ImageTarget::Texture2D, 0, 4, 4),
            (ImageTarget::Texture2D, 1, 2, 2),
            (ImageTarget::Texture2D, 2, 1, 1),
        ]
    );
    assert_eq!(count(&core.gl, &GlCall::GenerateMipmap(TextureTarget::Texture2D)), 0);
    assert!(!texture.desc.generate_mipmaps);
}

#[test]
fn texture_without_image_is_only_allocated_and_bound() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::new();
    let handle = core.bind_texture_2d(&mut texture, Some(1)).unwrap();

    assert_eq!(
        core.gl.calls(),
        &[
            GlCall::CreateTexture(handle),
            GlCall::ActiveTexture(1),
            GlCall::BindTexture(TextureTarget::Texture2D, Some(handle)),
        ]
    );
}

#[test]
fn flip_y_is_set_before_upload() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(2, 2));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    let mut target_texture = Texture2D::render_target(2, 2);
    core.bind_texture_2d(&mut target_texture, None).unwrap();

    let flips: Vec<_> = core
        .gl
        .calls()
        .iter()
        .filter_map(|call| match call {
            GlCall::PixelStoreFlipY(flip) => Some(*flip),
            _ => None,
        })
        .collect();
    assert_eq!(flips, vec![true, false]);
}

#[test]
fn releasing_twice_deletes_once() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(8, 8));
    let handle = core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert!(core.release_texture(texture.id()));
    assert!(!core.release_texture(texture.id()));
    assert_eq!(count(&core.gl, &GlCall::DeleteTexture(handle)), 1);
    assert_eq!(core.gl.live_texture_count(), 0);
    assert!(core.texture_handle(texture.id()).is_none());
}

#[test]
fn released_texture_is_recreated_on_next_bind() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(8, 8));
    let first = core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    core.release_texture(texture.id());
    let second = core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_ne!(first, second);
    assert_eq!(core.gl.upload_count(), 2);
}

#[test]
fn anisotropy_is_clamped_to_the_context_maximum() {
    let gl = HeadlessGl::new()
        .with_extension(extension::TEXTURE_FILTER_ANISOTROPIC)
        .with_max_anisotropy(8.0);
    let mut core = core(gl);
    let desc = TextureDescriptor {
        anisotropy: 16.0,
        ..TextureDescriptor::default()
    };
    let mut texture = Texture2D::from_image(surface(4, 4)).with_descriptor(desc);
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    assert_eq!(
        count(
            &core.gl,
            &GlCall::TexParameterF(TextureTarget::Texture2D, TexParameter::MaxAnisotropy, 8.0)
        ),
        1
    );
}

#[test]
fn no_anisotropy_without_the_extension() {
    let mut core = core(HeadlessGl::new());
    let mut texture = Texture2D::from_image(surface(4, 4));
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    assert_eq!(core.gl.count(|call| matches!(call, GlCall::TexParameterF(..))), 0);
}

#[test]
fn webgl1_float_support_is_queried_once() {
    let mut core = core(HeadlessGl::webgl1().with_extension(extension::TEXTURE_FLOAT));
    let desc = TextureDescriptor {
        pixel_type: PixelType::Float,
        ..TextureDescriptor::render_target()
    };
    for _ in 0..2 {
        let mut texture = Texture2D::render_target(4, 4).with_descriptor(desc);
        core.bind_texture_2d(&mut texture, None).unwrap();
    }

    let queries = core
        .gl
        .extension_queries()
        .into_iter()
        .filter(|name| name == extension::TEXTURE_FLOAT)
        .count();
    assert_eq!(queries, 1);
    assert_eq!(core.gl.upload_count(), 2);
}

#[test]
fn half_float_type_code_follows_the_context_version() {
    let desc = TextureDescriptor {
        pixel_type: PixelType::HalfFloat,
        ..TextureDescriptor::render_target()
    };
    let pixel_types = |gl: HeadlessGl| {
        let mut core = core(gl);
        let mut texture = Texture2D::render_target(4, 4).with_descriptor(desc);
        core.bind_texture_2d(&mut texture, None).unwrap();
        core.gl
            .calls()
            .iter()
            .find_map(|call| match call {
                GlCall::TexImage2D { pixel_type, .. } => Some(*pixel_type),
                _ => None,
            })
            .unwrap()
    };

    assert_eq!(pixel_types(HeadlessGl::new()), PixelType::HalfFloatCore);
    assert_eq!(pixel_types(HeadlessGl::webgl1()), PixelType::HalfFloat);
}

#[test]
fn internal_format_defaults_to_format() {
    let mut core = core(HeadlessGl::new());
    let desc = TextureDescriptor {
        format: PixelFormat::Rgb,
        ..TextureDescriptor::default()
    };
    let mut texture = Texture2D::from_image(raw(2, 2)).with_descriptor(desc);
    core.bind_texture_2d(&mut texture, Some(0)).unwrap();

    let formats = core.gl.calls().iter().find_map(|call| match call {
        GlCall::TexImage2D {
            internal_format,
            format,
            ..
        } => Some((*internal_format, *format)),
        _ => None,
    });
    assert_eq!(formats, Some((PixelFormat::Rgb, PixelFormat::Rgb)));
}

#[test]
fn incomplete_cube_is_only_bound() {
    let mut core = core(HeadlessGl::new());
    let mut cube = TextureCube::new();
    let handle = core.bind_texture_cube(&mut cube, Some(0)).unwrap();

    assert_eq!(core.gl.upload_count(), 0);
    assert_eq!(count(&core.gl, &GlCall::BindTexture(TextureTarget::CubeMap, Some(handle))), 1);
}

#[test]
fn cube_faces_are_uploaded_in_order() {
    let mut core = core(HeadlessGl::new());
    let mut cube = TextureCube::from_images(std::array::from_fn(|_| surface(8, 8)));
    core.bind_texture_cube(&mut cube, Some(0)).unwrap();

    let targets: Vec<_> = uploads(&core.gl).into_iter().map(|(target, ..)| target).collect();
    let expected: Vec<_> = CubeFace::ALL.iter().map(|face| ImageTarget::CubeFace(*face)).collect();
    assert_eq!(targets, expected);
    assert_eq!(count(&core.gl, &GlCall::GenerateMipmap(TextureTarget::CubeMap)), 1);

    core.gl.take_calls();
    core.bind_texture_cube(&mut cube, Some(0)).unwrap();
    assert_eq!(core.gl.upload_count(), 0);
}

#[test]
fn one_npot_face_puts_the_whole_cube_on_fallback() {
    let mut core = core(HeadlessGl::webgl1());
    let mut faces: [_; 6] = std::array::from_fn(|_| raw(4, 4));
    faces[4] = raw(3, 4);
    let mut cube = TextureCube::from_images(faces);
    core.bind_texture_cube(&mut cube, Some(0)).unwrap();

    let parameters = parameters(&core.gl, TextureTarget::CubeMap);
    assert!(parameters.contains(&(TexParameter::WrapS, WrapMode::ClampToEdge.gl_enum())));
    assert!(parameters.contains(&(TexParameter::MinFilter, TextureFilter::Linear.gl_enum())));
    assert_eq!(count(&core.gl, &GlCall::GenerateMipmap(TextureTarget::CubeMap)), 0);
}

#[test]
fn allocation_failure_is_an_error() {
    let mut core = core(HeadlessGl::new().failing_allocations());
    let mut texture = Texture2D::from_image(surface(4, 4));
    assert!(core.bind_texture_2d(&mut texture, Some(0)).is_err());
    assert_eq!(core.gl.upload_count(), 0);
}

#[test]
fn failed_allocation_uploads_on_retry() {
    let mut core = core(HeadlessGl::new().failing_allocations());
    let mut texture = Texture2D::from_image(surface(4, 4));
    assert!(core.bind_texture_2d(&mut texture, Some(0)).is_err());

    core.gl.allow_allocations();
    let handle = core.bind_texture_2d(&mut texture, Some(0)).unwrap();
    assert_eq!(core.texture_handle(texture.id()), Some(handle));
    assert_eq!(core.gl.upload_count(), 1);
    assert_eq!(core.gl.live_texture_count(), 1);
}
