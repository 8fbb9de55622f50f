//! # meshview GPU
//!
//! wgpu resources behind the viewer window.
//!
//! This crate owns the device context, uploads volume fields as 3D
//! textures, caches per-context shader programs for the texture-coordinate
//! actor, and renders scenes in mono or in one of the stereo modes.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use meshview_gpu::{GpuContext, Texture3D, TextureOptions};
//! use meshview_core::{DataArray, VolumeField};
//!
//! fn example() -> meshview_core::Result<()> {
//!     let mut context = pollster::block_on(GpuContext::new())?;
//!     let field = VolumeField::with_scalars([3, 3, 3], DataArray::scalars("s", vec![0.5; 27]))?;
//!
//!     let mut texture = Texture3D::new(TextureOptions::default());
//!     texture.load(&mut context, &field, None)?;
//!     assert_eq!(texture.max_texture_coordinates(), [0.75, 0.75, 0.75]);
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod buffers;
pub mod device;
pub mod scene;
pub mod shader;
pub mod stereo;
pub mod texture3d;

// Re-export commonly used items
pub use actor::{ActorDraw, TextureCoordActor, TEXCOORD_SHADER};
pub use buffers::{MeshBuffers, MeshVertex};
pub use device::{ContextId, GpuContext};
pub use scene::{DrawItem, EyeView, Frame, ItemId, Representation, SceneRenderConfig, SceneRenderer};
pub use shader::{ProgramState, ShaderDevice, ShaderFallback, ShaderProgramCache};
pub use stereo::StereoMode;
pub use texture3d::{
    GpuTexture, TexelFormat, Texture3D, TextureCapabilities, TextureDevice, TextureOptions, TextureQuality,
    TextureState, TextureUpload,
};
