//! Swapchain management.

use crate::error::{GpuError, Result};
use crate::image::create_image_view;
use ash::vk;

/// Outcome of an acquire or present that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// The swapchain matches the surface.
    Optimal,
    /// Still usable, but no longer matches the surface exactly.
    Suboptimal,
    /// Out of date. No image was acquired or presented.
    Stale,
}

impl SurfaceStatus {
    /// Map a raw acquire/present result. Anything other than success,
    /// suboptimal or out-of-date is an error.
    pub fn from_vk(result: std::result::Result<bool, vk::Result>) -> Result<Self> {
        match result {
            Ok(false) => Ok(Self::Optimal),
            Ok(true) => Ok(Self::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Self::Stale),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Whether the swapchain should be rebuilt.
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Parameters for [`Swapchain::new`], already resolved against the surface.
pub struct SwapchainDesc<'a> {
    pub surface: vk::SurfaceKHR,
    pub capabilities: &'a vk::SurfaceCapabilitiesKHR,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    /// Graphics then present family. Equal entries mean exclusive sharing.
    pub queue_families: [u32; 2],
}

/// Presentable images and one colour view per image.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// # Safety
    /// `loader` must come from `device`, and the surface must not have
    /// another live swapchain.
    pub unsafe fn new(
        device: &ash::Device,
        loader: &ash::khr::swapchain::Device,
        desc: &SwapchainDesc<'_>,
    ) -> Result<Self> {
        let families = desc.queue_families;
        let info = vk::SwapchainCreateInfoKHR::default()
            .surface(desc.surface)
            .min_image_count(select_image_count(desc.capabilities))
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(desc.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true);
        let info = if families[0] == families[1] {
            info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            info.image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        };

        let swapchain = unsafe { loader.create_swapchain(&info, None) }
            .map_err(|e| GpuError::Swapchain(format!("create: {e}")))?;
        let mut this = Self {
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format: desc.format.format,
            extent: desc.extent,
        };
        if let Err(e) = unsafe { this.create_views(device, loader) } {
            unsafe { this.destroy(device, loader) };
            return Err(e);
        }

        tracing::info!(
            width = desc.extent.width,
            height = desc.extent.height,
            images = this.images.len(),
            format = ?desc.format.format,
            present_mode = ?desc.present_mode,
            "swapchain created"
        );
        Ok(this)
    }

    unsafe fn create_views(
        &mut self,
        device: &ash::Device,
        loader: &ash::khr::swapchain::Device,
    ) -> Result<()> {
        self.images = unsafe { loader.get_swapchain_images(self.swapchain)? };
        for &image in &self.images {
            let view = unsafe {
                create_image_view(device, image, self.format, vk::ImageAspectFlags::COLOR)?
            };
            self.image_views.push(view);
        }
        Ok(())
    }

    /// Acquire the next image; `signal` fires once it can be rendered to.
    ///
    /// The index is only meaningful when the status is not
    /// [`SurfaceStatus::Stale`].
    ///
    /// # Safety
    /// `signal` must be unsignaled with no pending signal operation.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub unsafe fn acquire(
        &self,
        loader: &ash::khr::swapchain::Device,
        signal: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<(u32, SurfaceStatus)> {
        let acquired = unsafe {
            loader.acquire_next_image(self.swapchain, timeout_ns, signal, vk::Fence::null())
        };
        match acquired {
            Ok((index, suboptimal)) => Ok((index, SurfaceStatus::from_vk(Ok(suboptimal))?)),
            Err(e) => SurfaceStatus::from_vk(Err(e)).map(|status| (0, status)),
        }
    }

    /// Queue `image_index` for presentation once `wait` is signaled.
    ///
    /// # Safety
    /// `image_index` must have been acquired and not yet presented.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub unsafe fn present(
        &self,
        loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<SurfaceStatus> {
        let wait = [wait];
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);
        SurfaceStatus::from_vk(unsafe { loader.queue_present(queue, &info) })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// # Safety
    /// No image may still be in use by the device.
    pub unsafe fn destroy(&self, device: &ash::Device, loader: &ash::khr::swapchain::Device) {
        unsafe {
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// One image beyond the minimum so acquire rarely blocks, capped by the
/// surface maximum (zero means unbounded).
pub fn select_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    match caps.max_image_count {
        0 => wanted,
        max => wanted.min(max),
    }
}

/// sRGB BGRA8 when offered, else whatever the surface lists first.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    const PREFERRED: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    available
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED.format && f.color_space == PREFERRED.color_space)
        .or_else(|| available.first().copied())
        .unwrap_or(PREFERRED)
}

/// FIFO with vsync. Without it, mailbox then immediate; FIFO is the
/// guaranteed fallback.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    let unsynced = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    unsynced
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's own extent when it dictates one, else `requested` clamped
/// to the allowed range.
pub fn calculate_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    requested_width: u32,
    requested_height: u32,
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    let (min, max) = (caps.min_image_extent, caps.max_image_extent);
    vk::Extent2D {
        width: requested_width.clamp(min.width, max.width),
        height: requested_height.clamp(min.height, max.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn prefers_srgb_format() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            select_surface_format(&available).format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    #[test]
    fn falls_back_to_first_format() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            select_surface_format(&available).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn vsync_always_uses_fifo() {
        let available = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&available, true),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn no_vsync_prefers_mailbox_then_immediate() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(
            select_present_mode(&all, false),
            vk::PresentModeKHR::MAILBOX
        );

        let no_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            select_present_mode(&no_mailbox, false),
            vk::PresentModeKHR::IMMEDIATE
        );

        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&fifo_only, false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_current_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };
        let extent = calculate_extent(&caps, 800, 600);
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn extent_clamps_when_flexible() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1000,
                height: 1000,
            },
            ..Default::default()
        };
        let extent = calculate_extent(&caps, 4000, 50);
        assert_eq!((extent.width, extent.height), (1000, 100));
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(select_image_count(&caps), 3);
        caps.max_image_count = 2;
        assert_eq!(select_image_count(&caps), 2);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(SurfaceStatus::from_vk(Ok(false)).unwrap(), SurfaceStatus::Optimal);
        assert_eq!(SurfaceStatus::from_vk(Ok(true)).unwrap(), SurfaceStatus::Suboptimal);
        assert_eq!(
            SurfaceStatus::from_vk(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            SurfaceStatus::Stale
        );
        assert!(SurfaceStatus::from_vk(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
        assert!(!SurfaceStatus::Optimal.needs_rebuild());
        assert!(SurfaceStatus::Stale.needs_rebuild());
    }
}
