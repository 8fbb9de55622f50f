//! Window, event loop and keyboard shortcuts
//!
//! The loop owns a [`Viewer`] and a [`SceneRenderer`]. Items added to the
//! viewer are uploaded on the next redraw.

use std::sync::Arc;
use std::time::Instant;
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, ModifiersState},
    window::WindowBuilder,
};

use crate::viewer::Viewer;
use meshview_core::{Error, Result};
use meshview_gpu::{DrawItem, Frame, GpuContext, ItemId, MeshBuffers, Representation, SceneRenderer, TextureCoordActor};

/// Camera rotation per dragged pixel, in degrees
const ORBIT_DEGREES_PER_PIXEL: f32 = 0.4;

/// Zoom factor per wheel line
const ZOOM_PER_LINE: f32 = 1.1;

/// What a shortcut does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    Quit,
    ToggleRotation,
    ToggleStereo,
    CycleStereoMode,
    ResetCamera,
    Surface,
    Wireframe,
}

/// Map a key press to an action
///
/// Ctrl-Q, Ctrl-R, Ctrl-S and Ctrl-T always work. Without Ctrl, `r`, `s`
/// and `w` reset the camera and pick surface or wireframe. When
/// `require_modifier` is off the four main actions take plain `q`, `r`, `s`
/// and `t`, so camera reset and surface move to `c` and `f`.
pub fn shortcut_for(key: &str, ctrl: bool, require_modifier: bool) -> Option<ViewerAction> {
    let key = key.to_lowercase();
    let main = match key.as_str() {
        "q" => Some(ViewerAction::Quit),
        "r" => Some(ViewerAction::ToggleRotation),
        "s" => Some(ViewerAction::ToggleStereo),
        "t" => Some(ViewerAction::CycleStereoMode),
        _ => None,
    };
    if ctrl {
        return main;
    }
    if require_modifier {
        match key.as_str() {
            "r" => Some(ViewerAction::ResetCamera),
            "s" => Some(ViewerAction::Surface),
            "w" => Some(ViewerAction::Wireframe),
            _ => None,
        }
    } else {
        main.or(match key.as_str() {
            "c" => Some(ViewerAction::ResetCamera),
            "f" => Some(ViewerAction::Surface),
            "w" => Some(ViewerAction::Wireframe),
            _ => None,
        })
    }
}

/// Apply `action`; returns false when the viewer should close
pub fn apply_action(viewer: &mut Viewer, action: ViewerAction, now: Instant) -> bool {
    match action {
        ViewerAction::Quit => return false,
        ViewerAction::ToggleRotation => {
            viewer.toggle_rotation(now);
        }
        ViewerAction::ToggleStereo => {
            viewer.toggle_stereo();
        }
        ViewerAction::CycleStereoMode => {
            viewer.cycle_stereo_mode();
        }
        ViewerAction::ResetCamera => viewer.reset_camera(),
        ViewerAction::Surface => viewer.set_representation(Representation::Surface),
        ViewerAction::Wireframe => viewer.set_representation(Representation::Wireframe),
    }
    true
}

/// Some platforms report Ctrl-letter as an ASCII control character
fn key_text(text: &str) -> String {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ '\u{1}'..='\u{1a}'), None) => char::from(c as u8 - 1 + b'a').to_string(),
        _ => text.to_string(),
    }
}

/// The interactive window around a [`Viewer`]
pub struct InteractiveViewer {
    viewer: Viewer,
}

impl InteractiveViewer {
    pub fn new(viewer: Viewer) -> Self {
        Self { viewer }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut Viewer {
        &mut self.viewer
    }

    /// Open the window and run until it closes
    pub fn run(self) -> Result<()> {
        let mut viewer = self.viewer;
        let config = viewer.config().clone();

        let event_loop = EventLoop::new()
            .map_err(|e| Error::Visualization(format!("Failed to create event loop: {}", e)))?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title("meshview")
                .with_inner_size(LogicalSize::new(config.window_size[0], config.window_size[1]))
                .with_min_inner_size(LogicalSize::new(config.min_window_size[0], config.min_window_size[1]))
                .build(&event_loop)
                .map_err(|e| Error::Visualization(format!("Failed to create window: {}", e)))?,
        );

        let (context, surface) = pollster::block_on(GpuContext::for_window(window.clone()))?;
        let size = window.inner_size();
        viewer.camera_mut().set_viewport(size.width, size.height);
        let mut scene = SceneRenderer::new(context, surface, size, config.scene.clone())?;

        if let Some(volume) = viewer.volume() {
            scene.set_volume(
                volume.field.clone(),
                config.texture.clone(),
                TextureCoordActor::new(volume.texture_scale, config.shader_fallback),
            );
        }

        let mut uploaded: Vec<ItemId> = Vec::new();
        let mut modifiers = ModifiersState::empty();
        let mut dragging = false;
        let mut last_cursor: Option<PhysicalPosition<f64>> = None;

        viewer.start_rotation_clock(Instant::now());
        log::info!("viewer window open with {} items", viewer.items().len());

        event_loop
            .run(move |event, target| match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => target.exit(),
                    WindowEvent::ModifiersChanged(new_modifiers) => {
                        modifiers = new_modifiers.state();
                    }
                    WindowEvent::Resized(new_size) => {
                        viewer.camera_mut().set_viewport(new_size.width, new_size.height);
                        scene.resize(new_size);
                        window.request_redraw();
                    }
                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        dragging = state == ElementState::Pressed;
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if let (true, Some(last)) = (dragging, last_cursor) {
                            let dx = (position.x - last.x) as f32;
                            let dy = (position.y - last.y) as f32;
                            viewer
                                .camera_mut()
                                .orbit(dx * ORBIT_DEGREES_PER_PIXEL, -dy * ORBIT_DEGREES_PER_PIXEL);
                            window.request_redraw();
                        }
                        last_cursor = Some(position);
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        let lines = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                        };
                        viewer.camera_mut().zoom(ZOOM_PER_LINE.powf(lines));
                        window.request_redraw();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state != ElementState::Pressed || event.repeat {
                            return;
                        }
                        if let Key::Character(text) = &event.logical_key {
                            let key = key_text(text.as_str());
                            if let Some(action) = shortcut_for(&key, modifiers.control_key(), config.require_modifier) {
                                log::debug!("shortcut {:?}", action);
                                if !apply_action(&mut viewer, action, Instant::now()) {
                                    target.exit();
                                }
                                window.request_redraw();
                            }
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        for item in &viewer.items()[uploaded.len()..] {
                            let buffers = MeshBuffers::from_mesh(&item.mesh, &item.lookup_table);
                            uploaded.push(scene.add_item(&buffers, item.point_size));
                        }
                        let items: Vec<DrawItem> = viewer
                            .items()
                            .iter()
                            .zip(&uploaded)
                            .map(|(item, &id)| DrawItem {
                                id,
                                representation: item.representation,
                                textured: item.textured,
                            })
                            .collect();
                        let (left, right) = viewer.eye_views();
                        let frame = Frame {
                            left,
                            right,
                            mode: viewer.stereo_mode(),
                            items: &items,
                        };
                        if let Err(e) = scene.render(&frame) {
                            log::error!("render failed: {}", e);
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    if viewer.tick(Instant::now()) {
                        window.request_redraw();
                    }
                    match viewer.next_tick() {
                        Some(deadline) => target.set_control_flow(ControlFlow::WaitUntil(deadline)),
                        None => target.set_control_flow(ControlFlow::Wait),
                    }
                }
                _ => {}
            })
            .map_err(|e| Error::Visualization(format!("Event loop error: {}", e)))?;

        Ok(())
    }
}
