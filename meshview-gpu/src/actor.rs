//! Render item shaded by a 3D texture sampled at object-space positions

use crate::shader::{ShaderDevice, ShaderFallback, ShaderProgramCache};

/// WGSL program sampling the volume at `position * scale`
pub const TEXCOORD_SHADER: &str = include_str!("shaders/texcoord.wgsl");

/// How the renderer should draw an actor this frame
#[derive(Debug, PartialEq)]
pub enum ActorDraw<'a, P> {
    /// Draw with the texture-coordinate program and this scale uniform
    Custom { program: &'a P, scale: f32 },
    /// Draw with the default shading
    Default,
    /// Leave the item out
    Skip,
}

/// Wraps a render item with the texture-coordinate program
///
/// The program is compiled lazily, once per device context. What happens
/// when compilation fails is decided by [`ShaderFallback`].
pub struct TextureCoordActor<P> {
    texture_scale: f32,
    fallback: ShaderFallback,
    programs: ShaderProgramCache<P>,
}

impl<P> TextureCoordActor<P> {
    pub fn new(texture_scale: f32, fallback: ShaderFallback) -> Self {
        Self::with_source(texture_scale, fallback, TEXCOORD_SHADER)
    }

    /// Actor using a custom program source
    pub fn with_source(texture_scale: f32, fallback: ShaderFallback, source: &str) -> Self {
        Self {
            texture_scale,
            fallback,
            programs: ShaderProgramCache::new("texcoord", source),
        }
    }

    pub fn texture_scale(&self) -> f32 {
        self.texture_scale
    }

    pub fn set_texture_scale(&mut self, scale: f32) {
        self.texture_scale = scale;
    }

    pub fn fallback(&self) -> ShaderFallback {
        self.fallback
    }

    pub fn programs(&self) -> &ShaderProgramCache<P> {
        &self.programs
    }

    pub fn programs_mut(&mut self) -> &mut ShaderProgramCache<P> {
        &mut self.programs
    }

    /// Decide how to draw for the device's current context
    pub fn prepare<D>(&mut self, device: &mut D) -> ActorDraw<'_, P>
    where
        D: ShaderDevice<Program = P>,
    {
        let scale = self.texture_scale;
        match self.programs.get_or_compile(device) {
            Some(program) => ActorDraw::Custom { program, scale },
            None => match self.fallback {
                ShaderFallback::DefaultShading => ActorDraw::Default,
                ShaderFallback::SkipItem => ActorDraw::Skip,
            },
        }
    }
}
