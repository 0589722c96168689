//! The window surface and what it supports.
//!
//! The surface is created by [`GpuContextBuilder::build`](crate::context::GpuContextBuilder::build)
//! because picking a physical device needs it. After that it is owned by
//! whoever presents to it.

use ash::vk;

use crate::context::GpuContext;
use crate::error::Result;
use crate::swapchain::{
    calculate_extent, select_present_mode, select_surface_format, Swapchain, SwapchainDesc,
};

/// A window surface plus the two extension loaders needed to present to it.
pub struct SurfaceContext {
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
}

impl SurfaceContext {
    pub(crate) const fn new(
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        swapchain_loader: ash::khr::swapchain::Device,
    ) -> Self {
        Self {
            surface,
            surface_loader,
            swapchain_loader,
        }
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Ask the driver what this surface supports on the context's device.
    ///
    /// The answer changes with the window size, so it is re-queried for
    /// every swapchain.
    pub fn query_support(&self, gpu: &GpuContext) -> Result<SurfaceSupport> {
        let physical = gpu.physical_device();
        let loader = &self.surface_loader;
        unsafe {
            Ok(SurfaceSupport {
                capabilities: loader
                    .get_physical_device_surface_capabilities(physical, self.surface)?,
                formats: loader.get_physical_device_surface_formats(physical, self.surface)?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(physical, self.surface)?,
            })
        }
    }

    /// Build a swapchain as close to `requested` as the surface allows.
    ///
    /// # Safety
    /// Any previous swapchain for this surface must already be destroyed.
    pub unsafe fn create_swapchain(
        &self,
        gpu: &GpuContext,
        requested: vk::Extent2D,
        vsync: bool,
    ) -> Result<Swapchain> {
        let support = self.query_support(gpu)?;
        let extent = calculate_extent(&support.capabilities, requested.width, requested.height);

        let desc = SwapchainDesc {
            surface: self.surface,
            capabilities: &support.capabilities,
            format: support.color_format(),
            present_mode: support.present_mode(vsync),
            extent,
            queue_families: [gpu.graphics_queue_family(), gpu.present_queue_family()],
        };
        unsafe { Swapchain::new(gpu.device(), &self.swapchain_loader, &desc) }
    }

    /// # Safety
    /// Every swapchain created from this surface must already be destroyed.
    pub unsafe fn destroy(&self) {
        unsafe { self.surface_loader.destroy_surface(self.surface, None) };
        tracing::debug!("window surface destroyed");
    }
}

/// Capabilities, formats and present modes reported for one surface.
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Colour format swapchain images will use: sRGB BGRA8 when offered.
    pub fn color_format(&self) -> vk::SurfaceFormatKHR {
        select_surface_format(&self.formats)
    }

    pub fn present_mode(&self, vsync: bool) -> vk::PresentModeKHR {
        select_present_mode(&self.present_modes, vsync)
    }
}
