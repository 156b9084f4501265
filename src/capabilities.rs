//! What the context can do.
//!
//! [`Capabilities`] is filled once from a [`GraphicsApi`] and afterwards only
//! answers questions. Extensions are loaded lazily: the first request for a
//! name queries the context, every later request for the same name is
//! served from the cache, failures included.

use std::collections::HashMap;

use crate::gl::{Extension, GraphicsApi, extension};

#[derive(Clone, Debug)]
pub struct Capabilities {
    version: u32,
    max_texture_size: u32,
    max_anisotropy: f32,
    anisotropy_supported: bool,
    extensions: HashMap<String, Option<Extension>>,
}

impl Capabilities {
    pub fn new<G: GraphicsApi + ?Sized>(gl: &G) -> Self {
        let mut capabilities = Self {
            version: gl.context_version(),
            max_texture_size: gl.max_texture_size(),
            max_anisotropy: 1.0,
            anisotropy_supported: false,
            extensions: HashMap::new(),
        };
        if capabilities
            .get_extension(gl, extension::TEXTURE_FILTER_ANISOTROPIC)
            .is_some()
        {
            capabilities.anisotropy_supported = true;
            capabilities.max_anisotropy = gl.max_anisotropy();
        }
        capabilities
    }

    /// Major API version, `1` or `2`.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    /// `1.0` unless anisotropic filtering is available.
    pub fn max_anisotropy(&self) -> f32 {
        self.max_anisotropy
    }

    pub fn anisotropy_supported(&self) -> bool {
        self.anisotropy_supported
    }

    /// Loads an extension, querying the context at most once per name.
    pub fn get_extension<G: GraphicsApi + ?Sized>(
        &mut self,
        gl: &G,
        name: &str,
    ) -> Option<Extension> {
        if let Some(cached) = self.extensions.get(name) {
            return cached.clone();
        }
        let loaded = gl.query_extension(name).then(|| Extension::new(name));
        if loaded.is_none() {
            log::debug!("extension {name} is not available");
        }
        self.extensions.insert(name.to_string(), loaded.clone());
        loaded
    }

    /// Whether `name` was already requested, and with which outcome.
    pub fn cached_extension(&self, name: &str) -> Option<Option<&Extension>> {
        self.extensions.get(name).map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::headless::HeadlessGl;

    #[test]
    fn snapshot_reads_context_limits() {
        let gl = HeadlessGl::webgl1().with_max_texture_size(2048);
        let capabilities = Capabilities::new(&gl);
        assert_eq!(capabilities.version(), 1);
        assert_eq!(capabilities.max_texture_size(), 2048);
        assert!(!capabilities.anisotropy_supported());
        assert_eq!(capabilities.max_anisotropy(), 1.0);
    }

    #[test]
    fn anisotropy_is_read_when_the_extension_exists() {
        let gl = HeadlessGl::new()
            .with_extension(extension::TEXTURE_FILTER_ANISOTROPIC)
            .with_max_anisotropy(8.0);
        let capabilities = Capabilities::new(&gl);
        assert!(capabilities.anisotropy_supported());
        assert_eq!(capabilities.max_anisotropy(), 8.0);
    }

    #[test]
    fn misses_are_cached_and_never_queried_again() {
        let gl = HeadlessGl::webgl1();
        let mut capabilities = Capabilities::new(&gl);
        let before = gl.extension_queries().len();

        assert!(capabilities.get_extension(&gl, extension::TEXTURE_FLOAT).is_none());
        assert!(capabilities.get_extension(&gl, extension::TEXTURE_FLOAT).is_none());
        assert!(capabilities.get_extension(&gl, extension::TEXTURE_FLOAT).is_none());

        assert_eq!(gl.extension_queries().len(), before + 1);
        assert_eq!(capabilities.cached_extension(extension::TEXTURE_FLOAT), Some(None));
    }

    #[test]
    fn hits_return_the_cached_object() {
        let gl = HeadlessGl::webgl1().with_extension(extension::DRAW_BUFFERS);
        let mut capabilities = Capabilities::new(&gl);

        let first = capabilities.get_extension(&gl, extension::DRAW_BUFFERS);
        let second = capabilities.get_extension(&gl, extension::DRAW_BUFFERS);
        assert_eq!(first, second);
        assert_eq!(first.map(|ext| ext.name().to_string()).as_deref(), Some(extension::DRAW_BUFFERS));
        assert_eq!(
            gl.extension_queries()
                .iter()
                .filter(|name| name.as_str() == extension::DRAW_BUFFERS)
                .count(),
            1
        );
    }
}
