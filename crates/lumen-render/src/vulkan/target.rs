//! [`PresentationSurface`] backed by a real swapchain.

use std::sync::Arc;

use ash::vk;
use lumen_core::Extent;
use lumen_gpu::depth::find_depth_format;
use lumen_gpu::render_pass::{create_framebuffers, create_render_pass, destroy_framebuffers};
use lumen_gpu::{
    DepthBuffer, GpuContext, GpuError, Result, SurfaceContext, SurfaceStatus, Swapchain,
};

use tracing::warn;

use crate::backend::{PresentationSurface, RenderTarget};

/// Swapchain, depth buffer, render pass and one framebuffer per image.
///
/// Owns the window surface so teardown can destroy the swapchain before it.
/// Call [`SwapchainTarget::destroy`] before the GPU context goes away.
pub struct SwapchainTarget {
    gpu: Arc<GpuContext>,
    surface: SurfaceContext,
    vsync: bool,
    color_format: vk::Format,
    depth_format: vk::Format,
    render_pass: vk::RenderPass,
    // Empty between teardown and re-creation during a rebuild
    swapchain: Option<Swapchain>,
    depth: Option<DepthBuffer>,
    framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainTarget {
    /// Create the swapchain and everything sized to it.
    ///
    /// The depth format and the render pass are fixed here and survive
    /// [`rebuild`](PresentationSurface::rebuild). The surface is destroyed
    /// together with anything already built if a step fails.
    pub fn new(
        gpu: Arc<GpuContext>,
        surface: SurfaceContext,
        extent: Extent,
        vsync: bool,
    ) -> Result<Self> {
        let passes = find_depth_format(&gpu).and_then(|depth_format| {
            let color_format = surface.query_support(&gpu)?.color_format().format;
            let render_pass =
                unsafe { create_render_pass(gpu.device(), color_format, depth_format)? };
            Ok((depth_format, color_format, render_pass))
        });
        let (depth_format, color_format, render_pass) = match passes {
            Ok(passes) => passes,
            Err(e) => {
                // SAFETY: No swapchain was created for the surface yet
                unsafe { surface.destroy() };
                return Err(e);
            }
        };

        let mut target = Self {
            gpu,
            surface,
            vsync,
            color_format,
            depth_format,
            render_pass,
            swapchain: None,
            depth: None,
            framebuffers: Vec::new(),
        };
        if let Err(e) = target.create_swapchain_set(extent) {
            // SAFETY: Nothing has been submitted against the partial set
            if let Err(cleanup) = unsafe { target.destroy() } {
                warn!("Failed to clean up after swapchain creation error: {cleanup}");
            }
            return Err(e);
        }
        Ok(target)
    }

    /// Render pass compatible with every framebuffer, for pipeline creation.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    fn create_swapchain_set(&mut self, extent: Extent) -> Result<()> {
        let requested = vk::Extent2D {
            width: extent.width,
            height: extent.height,
        };
        let swapchain = unsafe { self.surface.create_swapchain(&self.gpu, requested, self.vsync)? };
        let swapchain = self.swapchain.insert(swapchain);
        if swapchain.format != self.color_format {
            return Err(GpuError::Swapchain(format!(
                "surface format changed from {:?} to {:?}",
                self.color_format, swapchain.format
            )));
        }

        let depth = self.depth.insert(DepthBuffer::new(
            &self.gpu,
            self.depth_format,
            swapchain.extent,
        )?);

        self.framebuffers = unsafe {
            create_framebuffers(
                self.gpu.device(),
                self.render_pass,
                &swapchain.image_views,
                depth.view,
                swapchain.extent,
            )?
        };
        Ok(())
    }

    /// Destroy framebuffers, depth buffer and swapchain.
    ///
    /// The swapchain is destroyed even when freeing the depth buffer fails.
    unsafe fn destroy_swapchain_set(&mut self) -> Result<()> {
        let device = self.gpu.device();
        destroy_framebuffers(device, &self.framebuffers);
        self.framebuffers.clear();
        let depth = self
            .depth
            .take()
            .map_or(Ok(()), |mut depth| depth.destroy(&self.gpu));
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(device, self.surface.swapchain_loader());
        }
        depth
    }

    fn swapchain(&self) -> Result<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("swapchain not created".to_string()))
    }

    /// Destroy everything, including the render pass and the window surface.
    ///
    /// # Safety
    /// The device must be idle and no pipeline created against the render
    /// pass may be used afterwards.
    pub unsafe fn destroy(mut self) -> Result<()> {
        let result = self.destroy_swapchain_set();
        self.gpu.device().destroy_render_pass(self.render_pass, None);
        self.surface.destroy();
        result
    }
}

impl PresentationSurface for SwapchainTarget {
    fn acquire(&mut self, timeout_ns: u64, signal: vk::Semaphore) -> Result<(u32, SurfaceStatus)> {
        let swapchain = self.swapchain()?;
        unsafe { swapchain.acquire(self.surface.swapchain_loader(), signal, timeout_ns) }
    }

    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> Result<SurfaceStatus> {
        let swapchain = self.swapchain()?;
        unsafe {
            swapchain.present(
                self.surface.swapchain_loader(),
                self.gpu.present_queue(),
                image_index,
                wait,
            )
        }
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map(|s| s.extent)
            .unwrap_or_default()
    }

    fn render_target(&self, image_index: u32) -> Option<RenderTarget> {
        let extent = self.swapchain.as_ref()?.extent;
        self.framebuffers
            .get(image_index as usize)
            .map(|&framebuffer| RenderTarget {
                render_pass: self.render_pass,
                framebuffer,
                extent,
            })
    }

    fn image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, Swapchain::image_count)
    }

    fn rebuild(&mut self, extent: Extent) -> Result<()> {
        unsafe { self.destroy_swapchain_set()? };
        self.create_swapchain_set(extent)
    }
}
