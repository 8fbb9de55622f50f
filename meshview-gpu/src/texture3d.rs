//! 3D texture resource for volumetric scalar fields
//!
//! The resource uploads a [`VolumeField`] padded to power-of-two dimensions
//! and re-uploads only when the resource, the field or the lookup table was
//! modified after the last upload, or when the device context changes.
//! Device access goes through [`TextureDevice`], which `GpuContext`
//! implements for wgpu.

use crate::device::{ContextId, GpuContext};
use half::f16;
use meshview_algorithms::pad_to_power_of_two;
use meshview_core::{ColorTransferFunction, Error, Modified, Result, TimeStamp, VolumeField};
use std::collections::HashMap;

/// Floating point precision of uploaded texels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureQuality {
    #[default]
    Half,
    Full,
}

impl TextureQuality {
    /// Quality from a bit count, 16 or 32
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(TextureQuality::Half),
            32 => Some(TextureQuality::Full),
            _ => None,
        }
    }
}

/// Upload settings
#[derive(Debug, Clone, PartialEq)]
pub struct TextureOptions {
    pub quality: TextureQuality,
    /// Linear filtering instead of nearest
    pub interpolate: bool,
    /// Repeat addressing instead of clamping to the edge
    pub repeat: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            quality: TextureQuality::Half,
            interpolate: true,
            repeat: false,
        }
    }
}

/// Device-side texel layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    R16Float,
    R32Float,
    Rgba16Float,
    Rgba32Float,
}

impl TexelFormat {
    /// Pick a format for `components`-sized samples
    ///
    /// RGB data is uploaded as RGBA. Full quality falls back to half when
    /// the device cannot filter 32-bit floats and filtering is requested.
    pub fn select(components: usize, options: &TextureOptions, capabilities: &TextureCapabilities) -> Result<Self> {
        let full = match options.quality {
            TextureQuality::Full if options.interpolate && !capabilities.float32_filterable => {
                log::warn!("device cannot filter 32-bit float textures, using 16-bit");
                false
            }
            TextureQuality::Full => true,
            TextureQuality::Half => false,
        };
        match (components, full) {
            (1, false) => Ok(TexelFormat::R16Float),
            (1, true) => Ok(TexelFormat::R32Float),
            (3 | 4, false) => Ok(TexelFormat::Rgba16Float),
            (3 | 4, true) => Ok(TexelFormat::Rgba32Float),
            (n, _) => Err(Error::Unsupported(format!("{}-component volume textures", n))),
        }
    }

    pub fn channels(self) -> usize {
        match self {
            TexelFormat::R16Float | TexelFormat::R32Float => 1,
            TexelFormat::Rgba16Float | TexelFormat::Rgba32Float => 4,
        }
    }

    pub fn is_full_precision(self) -> bool {
        matches!(self, TexelFormat::R32Float | TexelFormat::Rgba32Float)
    }

    pub fn bytes_per_texel(self) -> usize {
        match self {
            TexelFormat::R16Float => 2,
            TexelFormat::R32Float => 4,
            TexelFormat::Rgba16Float => 8,
            TexelFormat::Rgba32Float => 16,
        }
    }

    pub fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            TexelFormat::R16Float => wgpu::TextureFormat::R16Float,
            TexelFormat::R32Float => wgpu::TextureFormat::R32Float,
            TexelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TexelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Encode `components`-sized samples as texel bytes
    pub fn encode(self, values: &[f32], components: usize) -> Vec<u8> {
        let channels = self.channels();
        let mut texels: Vec<f32> = Vec::with_capacity(values.len() / components.max(1) * channels);
        for sample in values.chunks_exact(components.max(1)) {
            texels.extend(sample.iter().take(channels));
            // Missing alpha is opaque
            texels.extend(std::iter::repeat(1.0).take(channels.saturating_sub(sample.len())));
        }
        match self {
            TexelFormat::R16Float | TexelFormat::Rgba16Float => {
                let bits: Vec<u16> = texels.iter().map(|&v| f16::from_f32(v).to_bits()).collect();
                bytemuck::cast_slice(&bits).to_vec()
            }
            TexelFormat::R32Float | TexelFormat::Rgba32Float => bytemuck::cast_slice(&texels).to_vec(),
        }
    }
}

/// What a device context can do with 3D textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCapabilities {
    pub max_dimension_3d: u32,
    pub float32_filterable: bool,
}

/// One upload request
#[derive(Debug)]
pub struct TextureUpload<'a> {
    pub dimensions: [u32; 3],
    pub format: TexelFormat,
    pub texels: &'a [u8],
    pub interpolate: bool,
    pub repeat: bool,
}

/// Device operations needed by [`Texture3D`]
pub trait TextureDevice {
    type Handle;

    /// Context the device is currently rendering with
    fn context_id(&self) -> ContextId;

    /// Query 3D texture support
    fn probe_capabilities(&mut self) -> Result<TextureCapabilities>;

    /// Create a texture and transfer texels into it
    fn upload(&mut self, upload: &TextureUpload<'_>) -> Result<Self::Handle>;

    /// Free a texture created by [`TextureDevice::upload`]
    fn release(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    Unloaded,
    Bound,
}

struct LoadedTexture<H> {
    handle: H,
    context: ContextId,
    format: TexelFormat,
}

/// A volume uploaded as a 3D texture
pub struct Texture3D<H> {
    options: TextureOptions,
    loaded: Option<LoadedTexture<H>>,
    state: TextureState,
    max_texture_coordinates: [f32; 3],
    components: usize,
    load_time: TimeStamp,
    mtime: TimeStamp,
    capabilities: HashMap<ContextId, TextureCapabilities>,
    // Context and time of the last failed upload; retried only after a change
    failure: Option<(ContextId, TimeStamp)>,
}

impl<H> Texture3D<H> {
    pub fn new(options: TextureOptions) -> Self {
        Self {
            options,
            loaded: None,
            state: TextureState::Unloaded,
            max_texture_coordinates: [1.0; 3],
            components: 0,
            load_time: TimeStamp::NEVER,
            mtime: TimeStamp::now(),
            capabilities: HashMap::new(),
            failure: None,
        }
    }

    pub fn options(&self) -> &TextureOptions {
        &self.options
    }

    /// Change upload settings; takes effect at the next use
    pub fn set_options(&mut self, options: TextureOptions) {
        if options != self.options {
            self.options = options;
            self.mtime.modified();
        }
    }

    pub fn state(&self) -> TextureState {
        self.state
    }

    /// Fraction of the padded texture covered by real samples, per axis
    pub fn max_texture_coordinates(&self) -> [f32; 3] {
        self.max_texture_coordinates
    }

    /// Components per sample of the last upload
    pub fn components(&self) -> usize {
        self.components
    }

    /// Device handle of the current upload
    pub fn handle(&self) -> Option<&H> {
        self.loaded.as_ref().map(|l| &l.handle)
    }

    pub fn format(&self) -> Option<TexelFormat> {
        self.loaded.as_ref().map(|l| l.format)
    }

    /// Whether the last upload attempt failed
    pub fn is_unusable(&self) -> bool {
        self.failure.is_some()
    }

    /// Whether using the texture now would upload
    pub fn needs_upload(&self, context: ContextId, field: &VolumeField, lookup_table: Option<&ColorTransferFunction>) -> bool {
        let newest = [Some(self.mtime), Some(field.mtime()), lookup_table.map(|l| l.mtime())]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(TimeStamp::NEVER);
        match &self.loaded {
            Some(loaded) => loaded.context != context || newest > self.load_time,
            None => match self.failure {
                // Do not retry a failed upload until something changes
                Some((failed_context, failed_at)) => failed_context != context || newest > failed_at,
                None => true,
            },
        }
    }

    /// Upload `field` if stale
    ///
    /// Returns `Ok(true)` when a transfer happened. On error the resource
    /// stays unloaded and unusable until the field, the lookup table, the
    /// options or the context change.
    pub fn load<D>(&mut self, device: &mut D, field: &VolumeField, lookup_table: Option<&ColorTransferFunction>) -> Result<bool>
    where
        D: TextureDevice<Handle = H>,
    {
        let context = device.context_id();
        if !self.needs_upload(context, field, lookup_table) {
            return match &self.failure {
                Some(_) => Err(Error::Capability("3D texture is unusable".to_string())),
                None => Ok(false),
            };
        }

        match self.upload(device, field) {
            Ok(()) => {
                self.failure = None;
                Ok(true)
            }
            Err(e) => {
                self.failure = Some((context, TimeStamp::now()));
                Err(e)
            }
        }
    }

    fn upload<D>(&mut self, device: &mut D, field: &VolumeField) -> Result<()>
    where
        D: TextureDevice<Handle = H>,
    {
        self.release(device);

        let context = device.context_id();
        let capabilities = match self.capabilities.get(&context) {
            Some(caps) => *caps,
            None => {
                let caps = device.probe_capabilities().map_err(|e| {
                    log::error!("{}: 3D textures unavailable: {}", context, e);
                    e
                })?;
                self.capabilities.insert(context, caps);
                caps
            }
        };

        let padded = pad_to_power_of_two(field)?;
        if let Some(&too_big) = padded
            .dimensions
            .iter()
            .find(|&&d| d as u64 > capabilities.max_dimension_3d as u64)
        {
            return Err(Error::Capability(format!(
                "volume dimension {} exceeds the device maximum of {}",
                too_big, capabilities.max_dimension_3d
            )));
        }

        let format = TexelFormat::select(padded.components, &self.options, &capabilities)?;
        let texels = format.encode(&padded.data, padded.components);
        let dimensions = padded.dimensions.map(|d| d as u32);
        log::debug!(
            "uploading {:?} volume (source {:?}) as {:?}",
            dimensions,
            padded.source_dimensions,
            format
        );

        let handle = device.upload(&TextureUpload {
            dimensions,
            format,
            texels: &texels,
            interpolate: self.options.interpolate,
            repeat: self.options.repeat,
        })?;

        self.loaded = Some(LoadedTexture { handle, context, format });
        self.max_texture_coordinates = padded.max_texture_coordinates;
        self.components = padded.components;
        self.load_time = TimeStamp::now();
        Ok(())
    }

    /// Make the texture current for drawing, uploading first if stale
    ///
    /// Returns `None` when the texture cannot be used; the error has been
    /// logged and drawing continues without it.
    pub fn bind<D>(&mut self, device: &mut D, field: &VolumeField, lookup_table: Option<&ColorTransferFunction>) -> Option<&H>
    where
        D: TextureDevice<Handle = H>,
    {
        let retry = self.needs_upload(device.context_id(), field, lookup_table);
        if let Err(e) = self.load(device, field, lookup_table) {
            if retry {
                log::warn!("3D texture upload failed: {}", e);
            } else {
                log::debug!("3D texture skipped: {}", e);
            }
            return None;
        }
        self.state = TextureState::Bound;
        self.loaded.as_ref().map(|l| &l.handle)
    }

    /// Stop drawing with the texture; the device handle is kept
    pub fn unbind(&mut self) {
        self.state = TextureState::Unloaded;
    }

    /// Free the device handle
    pub fn release<D>(&mut self, device: &mut D)
    where
        D: TextureDevice<Handle = H>,
    {
        if let Some(loaded) = self.loaded.take() {
            device.release(loaded.handle);
        }
        self.state = TextureState::Unloaded;
        self.load_time = TimeStamp::NEVER;
    }

    /// Mark the resource modified so the next use re-uploads
    pub fn modified(&mut self) {
        self.mtime.modified();
    }
}

impl<H> Modified for Texture3D<H> {
    fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}

/// wgpu texture with its view and sampler
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl TextureDevice for GpuContext {
    type Handle = GpuTexture;

    fn context_id(&self) -> ContextId {
        self.id
    }

    fn probe_capabilities(&mut self) -> Result<TextureCapabilities> {
        let limits = self.device.limits();
        if limits.max_texture_dimension_3d == 0 {
            return Err(Error::Capability("no 3D texture support".to_string()));
        }
        let half = self.adapter.get_texture_format_features(wgpu::TextureFormat::R16Float);
        if !half.flags.contains(wgpu::TextureFormatFeatureFlags::FILTERABLE) {
            return Err(Error::Capability("16-bit float textures are not filterable".to_string()));
        }
        Ok(TextureCapabilities {
            max_dimension_3d: limits.max_texture_dimension_3d,
            float32_filterable: self.device.features().contains(wgpu::Features::FLOAT32_FILTERABLE),
        })
    }

    fn upload(&mut self, upload: &TextureUpload<'_>) -> Result<GpuTexture> {
        let [width, height, depth] = upload.dimensions;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volume texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: upload.format.wgpu_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            upload.texels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * upload.format.bytes_per_texel() as u32),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("volume texture view"),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });
        let address_mode = if upload.repeat {
            wgpu::AddressMode::Repeat
        } else {
            wgpu::AddressMode::ClampToEdge
        };
        let filter = if upload.interpolate {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Ok(GpuTexture { texture, view, sampler })
    }

    fn release(&mut self, handle: GpuTexture) {
        handle.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::DataArray;

    /// Records every device call
    struct MockDevice {
        context: ContextId,
        capabilities: Option<TextureCapabilities>,
        probes: usize,
        uploads: Vec<([u32; 3], TexelFormat, usize)>,
        released: usize,
        next_handle: u32,
    }

    impl MockDevice {
        fn new() -> Self {
            Self {
                context: ContextId::next(),
                capabilities: Some(TextureCapabilities {
                    max_dimension_3d: 256,
                    float32_filterable: false,
                }),
                probes: 0,
                uploads: Vec::new(),
                released: 0,
                next_handle: 0,
            }
        }
    }

    impl TextureDevice for MockDevice {
        type Handle = u32;

        fn context_id(&self) -> ContextId {
            self.context
        }

        fn probe_capabilities(&mut self) -> Result<TextureCapabilities> {
            self.probes += 1;
            self.capabilities
                .ok_or_else(|| Error::Capability("no 3D textures".to_string()))
        }

        fn upload(&mut self, upload: &TextureUpload<'_>) -> Result<u32> {
            self.uploads.push((upload.dimensions, upload.format, upload.texels.len()));
            self.next_handle += 1;
            Ok(self.next_handle)
        }

        fn release(&mut self, _handle: u32) {
            self.released += 1;
        }
    }

    fn field(dims: [usize; 3], components: usize) -> VolumeField {
        let n = dims[0] * dims[1] * dims[2] * components;
        let values = (0..n).map(|i| i as f32).collect();
        VolumeField::with_scalars(dims, DataArray::new("s", components, values)).unwrap()
    }

    #[test]
    fn test_no_reupload_while_fresh() {
        let mut device = MockDevice::new();
        let volume = field([4, 4, 4], 1);
        let mut texture = Texture3D::new(TextureOptions::default());

        assert!(texture.load(&mut device, &volume, None).unwrap());
        for _ in 0..5 {
            assert!(!texture.load(&mut device, &volume, None).unwrap());
        }
        assert_eq!(device.uploads.len(), 1);
        assert_eq!(device.probes, 1);
    }

    #[test]
    fn test_modified_source_reuploads_once() {
        let mut device = MockDevice::new();
        let mut volume = field([4, 4, 4], 1);
        let mut texture = Texture3D::new(TextureOptions::default());
        texture.load(&mut device, &volume, None).unwrap();

        volume.modified();
        texture.load(&mut device, &volume, None).unwrap();
        texture.load(&mut device, &volume, None).unwrap();
        assert_eq!(device.uploads.len(), 2);
        assert_eq!(device.released, 1);
    }

    #[test]
    fn test_lookup_table_and_options_are_tracked() {
        let mut device = MockDevice::new();
        let volume = field([2, 2, 2], 1);
        let mut lut = ColorTransferFunction::scalar_ramp([0.0, 1.0]);
        let mut texture = Texture3D::new(TextureOptions::default());
        texture.load(&mut device, &volume, Some(&lut)).unwrap();

        lut.add_rgb_point(0.5, [0.0, 1.0, 0.0]);
        assert!(texture.load(&mut device, &volume, Some(&lut)).unwrap());

        texture.set_options(TextureOptions {
            interpolate: false,
            ..Default::default()
        });
        assert!(texture.load(&mut device, &volume, Some(&lut)).unwrap());
        assert_eq!(device.uploads.len(), 3);
    }

    #[test]
    fn test_context_change_releases_and_reuploads() {
        let mut device = MockDevice::new();
        let volume = field([2, 2, 2], 1);
        let mut texture = Texture3D::new(TextureOptions::default());
        texture.load(&mut device, &volume, None).unwrap();

        device.context = ContextId::next();
        assert!(texture.load(&mut device, &volume, None).unwrap());
        assert_eq!(device.released, 1);
        assert_eq!(device.probes, 2);
    }

    #[test]
    fn test_padding_and_format_selection() {
        let mut device = MockDevice::new();
        let volume = field([3, 4, 5], 3);
        let mut texture = Texture3D::new(TextureOptions::default());
        texture.load(&mut device, &volume, None).unwrap();

        let (dims, format, bytes) = device.uploads[0];
        assert_eq!(dims, [4, 4, 8]);
        assert_eq!(format, TexelFormat::Rgba16Float);
        assert_eq!(bytes, 4 * 4 * 8 * 8);
        assert_eq!(texture.max_texture_coordinates(), [0.75, 1.0, 0.625]);
    }

    #[test]
    fn test_full_quality_falls_back_without_float32_filtering() {
        let caps = TextureCapabilities {
            max_dimension_3d: 64,
            float32_filterable: false,
        };
        let mut options = TextureOptions {
            quality: TextureQuality::Full,
            ..Default::default()
        };
        assert_eq!(TexelFormat::select(1, &options, &caps).unwrap(), TexelFormat::R16Float);
        options.interpolate = false;
        assert_eq!(TexelFormat::select(1, &options, &caps).unwrap(), TexelFormat::R32Float);
        assert_eq!(TexelFormat::select(4, &options, &caps).unwrap(), TexelFormat::Rgba32Float);
        assert!(TexelFormat::select(2, &options, &caps).is_err());
    }

    #[test]
    fn test_missing_scalars_leave_resource_unusable() {
        let mut device = MockDevice::new();
        let mut volume = VolumeField::new([2, 2, 2]);
        let mut texture = Texture3D::<u32>::new(TextureOptions::default());

        let err = texture.load(&mut device, &volume, None).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute(_)));
        assert!(texture.is_unusable());
        assert!(texture.bind(&mut device, &volume, None).is_none());
        assert!(device.uploads.is_empty());

        volume.set_scalars(DataArray::scalars("s", vec![1.0; 8])).unwrap();
        assert!(texture.bind(&mut device, &volume, None).is_some());
        assert!(!texture.is_unusable());
        assert_eq!(texture.state(), TextureState::Bound);
    }

    #[test]
    fn test_capability_failure_is_not_retried() {
        let mut device = MockDevice::new();
        device.capabilities = None;
        let volume = field([2, 2, 2], 1);
        let mut texture = Texture3D::new(TextureOptions::default());

        assert!(texture.load(&mut device, &volume, None).is_err());
        assert!(texture.load(&mut device, &volume, None).is_err());
        assert_eq!(device.probes, 1);
    }

    #[test]
    fn test_oversized_volume_is_rejected() {
        let mut device = MockDevice::new();
        device.capabilities = Some(TextureCapabilities {
            max_dimension_3d: 4,
            float32_filterable: true,
        });
        let volume = field([5, 1, 1], 1);
        let mut texture = Texture3D::new(TextureOptions::default());
        assert!(matches!(
            texture.load(&mut device, &volume, None),
            Err(Error::Capability(_))
        ));
    }

    #[test]
    fn test_unbind_keeps_handle() {
        let mut device = MockDevice::new();
        let volume = field([2, 2, 2], 1);
        let mut texture = Texture3D::new(TextureOptions::default());
        assert_eq!(texture.bind(&mut device, &volume, None), Some(&1));
        texture.unbind();
        assert_eq!(texture.state(), TextureState::Unloaded);
        assert_eq!(texture.bind(&mut device, &volume, None), Some(&1));
        assert_eq!(device.uploads.len(), 1);
    }

    #[test]
    fn test_rgb_is_expanded_to_rgba() {
        let bytes = TexelFormat::Rgba32Float.encode(&[0.1, 0.2, 0.3], 3);
        let texels: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(texels, &[0.1, 0.2, 0.3, 1.0]);
        assert_eq!(TexelFormat::R16Float.encode(&[1.0, 2.0], 1).len(), 4);
    }
}
