//! Viewer state: loaded items, camera, rotation and stereo settings
//!
//! Nothing here touches the GPU. The window loop in
//! [`crate::interactive_viewer`] reads this state every frame.

use crate::camera::Camera;
use crate::render_item::{RenderItem, DEFAULT_POINT_SIZE};
use crate::scheduler::RotationScheduler;
use meshview_algorithms::{ensure_normals, DEFAULT_FEATURE_ANGLE};
use meshview_core::{Bounds, PolyMesh, Result, VolumeField};
use meshview_gpu::{EyeView, Representation, SceneRenderConfig, ShaderFallback, StereoMode, TextureOptions};
use meshview_io::{MeshFormat, MeshRegistry, PdbGeometryOptions, PdbReader};
use std::path::Path;
use std::time::{Duration, Instant};

/// Viewer settings
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Initial window size in logical pixels
    pub window_size: [u32; 2],
    pub min_window_size: [u32; 2],
    /// Rotation period at startup
    pub rotation_period: Duration,
    /// Rotation period after rotation is switched back on
    pub restart_rotation_period: Duration,
    /// Azimuth per rotation tick, in degrees
    pub rotation_step: f32,
    pub rotate: bool,
    pub point_size: f32,
    pub feature_angle: f32,
    pub stereo: bool,
    pub stereo_mode: StereoMode,
    /// Shortcuts only fire with Ctrl held
    pub require_modifier: bool,
    pub scene: SceneRenderConfig,
    pub texture: TextureOptions,
    pub texture_scale: f32,
    pub shader_fallback: ShaderFallback,
    pub pdb: PdbGeometryOptions,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_size: [480, 480],
            min_window_size: [480, 360],
            rotation_period: Duration::from_millis(66),
            restart_rotation_period: Duration::from_millis(33),
            rotation_step: 1.0,
            rotate: true,
            point_size: DEFAULT_POINT_SIZE,
            feature_angle: DEFAULT_FEATURE_ANGLE,
            stereo: false,
            stereo_mode: StereoMode::RedBlue,
            require_modifier: true,
            scene: SceneRenderConfig::default(),
            texture: TextureOptions::default(),
            texture_scale: 1.0,
            shader_fallback: ShaderFallback::default(),
            pdb: PdbGeometryOptions::default(),
        }
    }
}

/// Volume sampled by textured items
#[derive(Debug, Clone)]
pub struct VolumeAttachment {
    pub field: VolumeField,
    pub texture_scale: f32,
}

/// Scene contents and view state
pub struct Viewer {
    config: ViewerConfig,
    registry: MeshRegistry,
    camera: Camera,
    items: Vec<RenderItem>,
    representation: Representation,
    rotation: RotationScheduler,
    stereo: bool,
    stereo_mode: StereoMode,
    volume: Option<VolumeAttachment>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let mut registry = MeshRegistry::with_default_readers();
        registry.register(MeshFormat::Pdb, Box::new(PdbReader::new(config.pdb.clone())));

        let rotation = if config.rotate {
            RotationScheduler::new(Instant::now(), config.rotation_period, config.restart_rotation_period)
        } else {
            RotationScheduler::stopped(config.rotation_period, config.restart_rotation_period)
        };
        let mut camera = Camera::default();
        camera.set_viewport(config.window_size[0], config.window_size[1]);

        Self {
            stereo: config.stereo,
            stereo_mode: config.stereo_mode,
            config,
            registry,
            camera,
            items: Vec::new(),
            representation: Representation::default(),
            rotation,
            volume: None,
        }
    }

    /// Add a mesh colored by its scalar range; returns its index
    pub fn add_mesh(&mut self, mesh: PolyMesh) -> usize {
        let mesh = ensure_normals(mesh, self.config.feature_angle);
        let mut item = RenderItem::new(mesh);
        item.point_size = self.config.point_size;
        item.representation = self.representation;
        item.textured = self.volume.is_some();

        log::info!(
            "added mesh: {} points, {} cells, scalar range [{}, {}]",
            item.mesh.point_count(),
            item.mesh.cell_count(),
            item.mesh.scalar_range()[0],
            item.mesh.scalar_range()[1],
        );
        self.items.push(item);
        if self.items.len() == 1 {
            self.reset_camera();
        }
        self.items.len() - 1
    }

    /// Read `path` with the reader for its extension and add the mesh
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let mesh = self.registry.read_mesh(path.as_ref())?;
        Ok(self.add_mesh(mesh))
    }

    /// Attach a volume sampled by items added from now on
    pub fn attach_volume(&mut self, field: VolumeField, texture_scale: f32) {
        if field.scalars().is_none() {
            log::warn!("volume {:?} has no scalars, textured items will draw untextured", field.dimensions);
        }
        self.volume = Some(VolumeAttachment { field, texture_scale });
    }

    /// Frame the union of all item bounds
    pub fn reset_camera(&mut self) {
        let bounds = self
            .items
            .iter()
            .filter_map(RenderItem::bounds)
            .reduce(|a, b| a.union(&b));
        if let Some(bounds) = bounds {
            self.camera.reset_to_bounds(&bounds);
            log::debug!("camera reset to {:?}", bounds);
        }
    }

    pub fn set_representation(&mut self, representation: Representation) {
        self.representation = representation;
        for item in &mut self.items {
            item.representation = representation;
        }
        log::info!("representation: {:?}", representation);
    }

    /// Switch rotation off, or back on at the restart period
    pub fn toggle_rotation(&mut self, now: Instant) -> bool {
        let enabled = self.rotation.toggle(now);
        log::info!("rotation {}", if enabled { "on" } else { "off" });
        enabled
    }

    /// Anchor the rotation clock at `now`, once the window is showing
    pub fn start_rotation_clock(&mut self, now: Instant) {
        self.rotation.restart_clock(now);
    }

    /// Advance rotation; returns whether the camera moved
    pub fn tick(&mut self, now: Instant) -> bool {
        let ticks = self.rotation.poll(now);
        if ticks == 0 {
            return false;
        }
        self.camera.azimuth(ticks as f32 * self.config.rotation_step);
        true
    }

    pub fn toggle_stereo(&mut self) -> bool {
        self.stereo = !self.stereo;
        log::info!("stereo {}", if self.stereo { "on" } else { "off" });
        self.stereo
    }

    pub fn cycle_stereo_mode(&mut self) -> StereoMode {
        self.stereo_mode = self.stereo_mode.next();
        log::info!("stereo type: {}", self.stereo_mode.name());
        self.stereo_mode
    }

    /// Left eye, plus the right eye when stereo is on
    pub fn eye_views(&self) -> (EyeView, Option<EyeView>) {
        if self.stereo {
            let (left, right) = self.camera.stereo_views(self.config.scene.eye_angle);
            (left, Some(right))
        } else {
            (self.camera.eye_view(), None)
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.items
            .iter()
            .filter_map(RenderItem::bounds)
            .reduce(|a, b| a.union(&b))
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    pub fn stereo_mode(&self) -> StereoMode {
        self.stereo_mode
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation.is_enabled()
    }

    /// When the next rotation tick is due
    pub fn next_tick(&self) -> Option<Instant> {
        self.rotation.deadline()
    }

    pub fn volume(&self) -> Option<&VolumeAttachment> {
        self.volume.as_ref()
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use meshview_core::{CellArray, DataArray, Point3f};
    use std::io::Write;

    fn triangle() -> PolyMesh {
        let mut polys = CellArray::new();
        polys.push(&[0, 1, 2]);
        PolyMesh::from_points_and_polys(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(2.0, 0.0, 0.0),
                Point3f::new(0.0, 2.0, 0.0),
            ],
            polys,
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.window_size, [480, 480]);
        assert_eq!(config.min_window_size, [480, 360]);
        assert_eq!(config.rotation_period, Duration::from_millis(66));
        assert_eq!(config.restart_rotation_period, Duration::from_millis(33));
        assert_eq!(config.point_size, 3.0);
        assert_eq!(config.stereo_mode, StereoMode::RedBlue);
        assert!(config.require_modifier);
    }

    #[test]
    fn test_add_mesh_builds_ramp_and_normals() {
        let mut viewer = Viewer::default();
        let mut mesh = triangle();
        mesh.set_point_scalars(DataArray::scalars("p", vec![1.0, 4.0, 2.0]));
        let index = viewer.add_mesh(mesh);

        let item = &viewer.items()[index];
        let stops = item.lookup_table.stops();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].value, 1.0);
        assert_eq!(stops[1].value, 4.0);
        assert!(item.mesh.normals.is_some());
        assert_eq!(item.point_size, 3.0);
    }

    #[test]
    fn test_first_item_resets_camera() {
        let mut viewer = Viewer::default();
        viewer.add_mesh(triangle());
        assert_eq!(viewer.camera().target, Point3f::new(1.0, 1.0, 0.0));

        // A second item leaves the camera alone until asked
        viewer.add_mesh(PolyMesh::from_points(vec![Point3f::new(10.0, 0.0, 0.0)]));
        assert_eq!(viewer.camera().target, Point3f::new(1.0, 1.0, 0.0));
        viewer.reset_camera();
        assert_eq!(viewer.camera().target, Point3f::new(5.0, 1.0, 0.0));
    }

    #[test]
    fn test_stereo_mode_cycle() {
        let mut viewer = Viewer::default();
        assert!(!viewer.is_stereo());
        assert!(viewer.toggle_stereo());
        assert_eq!(viewer.cycle_stereo_mode(), StereoMode::Interlaced);
        let mut seen = vec![StereoMode::Interlaced];
        for _ in 0..8 {
            seen.push(viewer.cycle_stereo_mode());
        }
        // Nine modes, so eight more steps wrap past CrystalEyes to the default
        assert_eq!(viewer.stereo_mode(), StereoMode::RedBlue);
        assert_eq!(seen[6], StereoMode::SplitViewportHorizontal);
        assert_eq!(seen[7], StereoMode::CrystalEyes);
        assert_eq!(viewer.cycle_stereo_mode(), StereoMode::Interlaced);
        assert!(viewer.eye_views().1.is_some());
    }

    #[test]
    fn test_rotation_ticks_rotate_camera() {
        let mut viewer = Viewer::default();
        viewer.add_mesh(triangle());
        assert!(viewer.is_rotating());

        let start = Instant::now();
        assert!(!viewer.toggle_rotation(start));
        assert!(!viewer.tick(start + Duration::from_secs(1)));

        assert!(viewer.toggle_rotation(start));
        let before = viewer.camera().position;
        assert!(viewer.tick(start + Duration::from_millis(66)));
        let after = viewer.camera().position;
        assert_relative_eq!(viewer.camera().distance(), (before - viewer.camera().target).norm(), epsilon = 1e-4);
        assert!((after - before).norm() > 0.0);
    }

    #[test]
    fn test_rotation_clock_starts_with_window() {
        let mut viewer = Viewer::default();
        viewer.add_mesh(triangle());
        let opened = Instant::now() + Duration::from_secs(3);
        viewer.start_rotation_clock(opened);
        assert_eq!(viewer.next_tick(), Some(opened + Duration::from_millis(66)));

        let before = viewer.camera().position;
        assert!(!viewer.tick(opened + Duration::from_millis(10)));
        assert!(viewer.tick(opened + Duration::from_millis(66)));
        // One step, not the backlog since construction
        let step = (viewer.camera().position - before).norm();
        assert!(step > 0.0 && step < viewer.camera().distance() * 0.05);
    }

    #[test]
    fn test_representation_applies_to_items() {
        let mut viewer = Viewer::default();
        viewer.add_mesh(triangle());
        viewer.set_representation(Representation::Wireframe);
        viewer.add_mesh(triangle());
        assert!(viewer
            .items()
            .iter()
            .all(|item| item.representation == Representation::Wireframe));
    }

    #[test]
    fn test_volume_marks_later_items_textured() {
        let mut viewer = Viewer::default();
        viewer.add_mesh(triangle());
        viewer.attach_volume(VolumeField::new([2, 2, 2]), 0.5);
        viewer.add_mesh(triangle());
        assert!(!viewer.items()[0].textured);
        assert!(viewer.items()[1].textured);
        assert_eq!(viewer.volume().map(|v| v.texture_scale), Some(0.5));
    }

    #[test]
    fn test_add_file_rejects_unknown_extension() {
        let mut viewer = Viewer::default();
        assert!(viewer.add_file("missing.xyz").is_err());
        assert!(viewer.items().is_empty());
    }

    #[test]
    fn test_add_file_reads_obj() {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3").unwrap();

        let mut viewer = Viewer::default();
        let index = viewer.add_file(file.path()).unwrap();
        assert!(viewer.items()[index].mesh.point_count() > 0);
    }
}
