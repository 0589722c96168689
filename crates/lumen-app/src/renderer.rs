//! Renderer ownership hierarchy.

use std::sync::Arc;

use anyhow::Context;
use glam::Vec2;
use lumen_core::constants::MAX_FRAMES_IN_FLIGHT;
use lumen_core::{Extent, ResizeEvents, WindowSurface};
use lumen_gpu::{CommandPool, GpuContext, GpuContextBuilder, GraphicsPipeline, SurfaceContext};
use lumen_platform::{PlatformWindow, Window};
use lumen_render::{
    create_mesh_pipeline, DrawBindings, FrameDescriptors, FrameOutcome, FrameScheduler,
    FrameSlotPool, Mesh, MeshData, MovementInput, ResizeCoordinator, Scene, SwapchainTarget,
    Texture, TexturePixels, UniformBuffers, VulkanDevice,
};
use tracing::{error, info};

use crate::runner::AppConfig;
use crate::teardown::Teardown;

/// Size of the generated fallback texture.
const CHECKERBOARD_SIZE: u32 = 256;
const CHECKERBOARD_CELLS: u32 = 8;

/// CPU-side mesh and texture data, read before any GPU object exists.
pub(crate) struct Assets {
    pub mesh: MeshData,
    pub pixels: TexturePixels,
}

impl Assets {
    /// Load the configured model and texture, or the built-in fallbacks.
    pub(crate) fn load(config: &AppConfig) -> anyhow::Result<Self> {
        let mesh = match &config.model_path {
            Some(path) => MeshData::load_obj(path, true)?,
            None => MeshData::demo_quads(),
        };
        let pixels = match &config.texture_path {
            Some(path) => TexturePixels::load(path)?,
            None => TexturePixels::checkerboard(CHECKERBOARD_SIZE, CHECKERBOARD_CELLS),
        };
        Ok(Self { mesh, pixels })
    }
}

/// Device objects in construction order.
///
/// Every field is optional so that a renderer that failed halfway through
/// [`Renderer::new`] unwinds through the same code as a finished one.
#[derive(Default)]
struct Resources {
    target: Option<SwapchainTarget>,
    command_pool: Option<CommandPool>,
    mesh: Option<Mesh>,
    texture: Option<Texture>,
    scene: Option<Scene>,
    descriptors: Option<FrameDescriptors>,
    pipeline: Option<GraphicsPipeline>,
}

impl Resources {
    /// Create everything up to and including the pipeline.
    fn build(
        &mut self,
        gpu: &Arc<GpuContext>,
        surface: SurfaceContext,
        extent: Extent,
        config: &AppConfig,
        assets: &Assets,
    ) -> anyhow::Result<()> {
        let target = self.target.insert(
            SwapchainTarget::new(Arc::clone(gpu), surface, extent, config.vsync)
                .context("failed to create swapchain")?,
        );

        // SAFETY: Device is valid and the graphics family exists
        let command_pool = self.command_pool.insert(unsafe {
            CommandPool::resettable(gpu.device(), gpu.graphics_queue_family())?
        });

        self.mesh = Some(
            Mesh::upload(gpu, command_pool, &assets.mesh).context("failed to upload mesh")?,
        );
        let texture = self.texture.insert(
            Texture::upload(gpu, command_pool, &assets.pixels)
                .context("failed to upload texture")?,
        );
        let scene = self
            .scene
            .insert(Scene::new(UniformBuffers::new(gpu, MAX_FRAMES_IN_FLIGHT)?));

        let descriptors = self.descriptors.insert(FrameDescriptors::new(gpu)?);
        descriptors.allocate(gpu, scene.uniforms(), texture)?;

        self.pipeline = Some(
            create_mesh_pipeline(gpu.device(), target.render_pass(), descriptors.layout())
                .context("failed to create mesh pipeline")?,
        );

        Ok(())
    }

    /// Destroy whatever exists, newest first, recording failures.
    ///
    /// # Safety
    /// The device must be idle.
    unsafe fn destroy(mut self, gpu: &GpuContext, teardown: &mut Teardown) {
        let device = gpu.device();
        if let Some(pipeline) = self.pipeline.take() {
            unsafe { pipeline.destroy(device) };
        }
        if let Some(mut descriptors) = self.descriptors.take() {
            unsafe { descriptors.destroy(device) };
        }
        if let Some(mut scene) = self.scene.take() {
            teardown.step("uniform buffers", scene.destroy(gpu));
        }
        if let Some(mut texture) = self.texture.take() {
            teardown.step("texture", texture.destroy(gpu));
        }
        if let Some(mut mesh) = self.mesh.take() {
            teardown.step("mesh", mesh.destroy(gpu));
        }
        if let Some(command_pool) = self.command_pool.take() {
            unsafe { command_pool.destroy(device) };
        }
        if let Some(target) = self.target.take() {
            teardown.step("swapchain", unsafe { target.destroy() });
        }
    }
}

/// Everything needed to draw the scene.
///
/// [`Renderer::destroy`] tears it down in reverse construction order: frame
/// slots, pipeline, descriptors, uniforms, texture, mesh, command pool, then
/// the swapchain set, render pass and surface. The device and instance go
/// last when the final [`GpuContext`] reference drops.
pub struct Renderer {
    gpu: Arc<GpuContext>,
    resources: Resources,
    scheduler: FrameScheduler<VulkanDevice, VulkanDevice>,
    bindings: DrawBindings,
}

impl Renderer {
    /// Build the renderer for `window`.
    ///
    /// Blocks while the window is minimized. Returns `None` if the window is
    /// closed before it ever becomes drawable.
    pub fn new(
        config: &AppConfig,
        window: &mut PlatformWindow,
        resize_events: ResizeEvents,
    ) -> anyhow::Result<Option<Self>> {
        let assets = Assets::load(config)?;

        let mut extent = window.framebuffer_extent();
        while extent.is_zero_area() {
            if window.close_requested() {
                return Ok(None);
            }
            window.wait_events();
            extent = window.framebuffer_extent();
        }

        let handle: &Window = window.window();
        let (gpu, surface) = GpuContextBuilder::new()
            .app_name(&config.title)
            .validation(config.validation)
            .build(handle)
            .context("failed to create GPU context")?;
        let gpu = Arc::new(gpu);
        info!("GPU: {}", gpu.capabilities());

        let mut resources = Resources::default();
        let built = resources
            .build(&gpu, surface, extent, config, &assets)
            .and_then(|()| {
                let pool = resources
                    .command_pool
                    .as_ref()
                    .context("command pool missing")?;
                Ok(FrameSlotPool::new(&gpu, pool, MAX_FRAMES_IN_FLIGHT)?)
            });
        let slots = match built {
            Ok(slots) => slots,
            Err(e) => {
                error!("Renderer setup failed: {e:#}");
                let mut teardown = Teardown::new();
                teardown.step("device idle", gpu.wait_idle());
                // SAFETY: The device is idle and no frame was ever submitted
                unsafe { resources.destroy(&gpu, &mut teardown) };
                if teardown.failures() > 0 {
                    error!("{} teardown steps failed after setup error", teardown.failures());
                }
                return Err(e);
            }
        };

        let device = VulkanDevice::new(&gpu);
        let scheduler = FrameScheduler::new(
            device.clone(),
            device,
            slots,
            ResizeCoordinator::new(resize_events),
        );

        let bindings = match (&resources.pipeline, &resources.mesh, &resources.descriptors) {
            (Some(pipeline), Some(mesh), Some(descriptors)) => DrawBindings {
                pipeline: pipeline.pipeline,
                pipeline_layout: pipeline.layout,
                vertex_buffer: mesh.vertex_buffer.buffer,
                index_buffer: mesh.index_buffer.buffer,
                index_count: mesh.index_count,
                descriptor_sets: descriptors.sets().to_vec(),
            },
            _ => DrawBindings::default(),
        };

        info!(
            "Renderer ready: {} indices, {} frames in flight",
            bindings.index_count, MAX_FRAMES_IN_FLIGHT
        );

        Ok(Some(Self {
            gpu,
            resources,
            scheduler,
            bindings,
        }))
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.resources.scene.as_ref()
    }

    /// Frames submitted so far.
    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame_count()
    }

    /// Swapchain rebuilds so far.
    pub fn rebuild_count(&self) -> u64 {
        self.scheduler.resize_coordinator().rebuild_count()
    }

    /// Apply one frame of camera input.
    pub fn update_camera(&mut self, movement: &MovementInput, mouse_delta: Option<Vec2>, dt: f32) {
        let Some(scene) = self.resources.scene.as_mut() else {
            return;
        };
        let camera = &mut scene.camera;
        if let Some(delta) = mouse_delta {
            camera.rotate(delta);
        }
        camera.translate(movement, dt);
    }

    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn draw_frame(&mut self, window: &mut PlatformWindow) -> anyhow::Result<FrameOutcome> {
        let (Some(target), Some(scene)) =
            (self.resources.target.as_mut(), self.resources.scene.as_mut())
        else {
            anyhow::bail!("renderer has no swapchain or scene");
        };
        let outcome = self
            .scheduler
            .draw_frame(target, window, scene, &self.bindings)?;
        Ok(outcome)
    }

    /// Wait for the GPU and destroy everything in reverse construction order.
    ///
    /// Every step runs even if an earlier one fails. The first failure is
    /// returned.
    pub fn destroy(self) -> anyhow::Result<()> {
        let Self {
            gpu,
            resources,
            scheduler,
            bindings: _,
        } = self;

        info!("Starting cleanup...");
        let mut teardown = Teardown::new();
        teardown.step("device idle", gpu.wait_idle());

        // SAFETY: The device is idle and nothing below is referenced by
        // pending work.
        unsafe {
            scheduler.slots().destroy(gpu.device());
            resources.destroy(&gpu, &mut teardown);
        }
        drop(scheduler);

        match Arc::try_unwrap(gpu) {
            Ok(gpu) => drop(gpu),
            Err(gpu) => error!(
                "GPU context still has {} other owners at shutdown",
                Arc::strong_count(&gpu) - 1
            ),
        }

        info!("Cleanup complete");
        teardown.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_fails_before_any_gpu_work() {
        let config = AppConfig::new("Test").with_model("does/not/exist.obj");
        let err = Assets::load(&config).err().unwrap();
        assert!(format!("{err:#}").contains("does/not/exist.obj"));
    }

    #[test]
    fn missing_texture_fails_before_any_gpu_work() {
        let config = AppConfig::new("Test").with_texture("does/not/exist.png");
        assert!(Assets::load(&config).is_err());
    }

    #[test]
    fn fallback_assets_need_no_files() {
        let assets = Assets::load(&AppConfig::new("Test")).unwrap();
        assert!(!assets.mesh.indices.is_empty());
        assert_eq!(assets.pixels.width, CHECKERBOARD_SIZE);
    }
}
