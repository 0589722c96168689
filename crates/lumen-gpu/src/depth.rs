//! Depth buffer.
//!
//! The depth format is chosen once at startup. Rebuilding for a new
//! swapchain extent only changes the image dimensions.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::image::create_image_view;
use crate::memory::GpuImage;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate whose optimal-tiling features include depth attachment use.
pub fn pick_depth_format(
    candidates: &[vk::Format],
    optimal_tiling_features: impl Fn(vk::Format) -> vk::FormatFeatureFlags,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        optimal_tiling_features(format).contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

/// Whether a depth format carries a stencil aspect.
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

/// Query the device for a usable depth format.
pub fn find_depth_format(gpu: &GpuContext) -> Result<vk::Format> {
    let format = pick_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| unsafe {
        gpu.instance()
            .get_physical_device_format_properties(gpu.physical_device(), format)
            .optimal_tiling_features
    })
    .ok_or_else(|| GpuError::UnsupportedFormat("no depth attachment format".to_string()))?;

    tracing::debug!(
        "Depth format {:?} (stencil: {})",
        format,
        has_stencil_component(format)
    );
    Ok(format)
}

/// Depth image, its memory and view.
pub struct DepthBuffer {
    pub image: GpuImage,
    pub view: vk::ImageView,
    pub format: vk::Format,
}

impl DepthBuffer {
    /// Create a depth buffer of the given size.
    pub fn new(gpu: &GpuContext, format: vk::Format, extent: vk::Extent2D) -> Result<Self> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let mut image =
            gpu.allocator()
                .lock()
                .create_image(&create_info, MemoryLocation::GpuOnly, "depth buffer")?;

        let view = match unsafe {
            create_image_view(gpu.device(), image.image, format, vk::ImageAspectFlags::DEPTH)
        } {
            Ok(view) => view,
            Err(e) => {
                gpu.allocator().lock().free_image(&mut image)?;
                return Err(e);
            }
        };

        Ok(Self {
            image,
            view,
            format,
        })
    }

    /// Destroy the view and free the image.
    ///
    /// # Safety
    /// The depth buffer must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) -> Result<()> {
        gpu.device().destroy_image_view(self.view, None);
        self.view = vk::ImageView::null();
        gpu.allocator().lock().free_image(&mut self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support(supported: &'static [vk::Format]) -> impl Fn(vk::Format) -> vk::FormatFeatureFlags {
        move |format| {
            if supported.contains(&format) {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::SAMPLED_IMAGE
            }
        }
    }

    #[test]
    fn picks_first_supported_candidate() {
        let all = support(&[
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D32_SFLOAT,
        ]);
        assert_eq!(
            pick_depth_format(&DEPTH_FORMAT_CANDIDATES, all),
            Some(vk::Format::D32_SFLOAT)
        );

        let only_d24 = support(&[vk::Format::D24_UNORM_S8_UINT]);
        assert_eq!(
            pick_depth_format(&DEPTH_FORMAT_CANDIDATES, only_d24),
            Some(vk::Format::D24_UNORM_S8_UINT)
        );
    }

    #[test]
    fn none_when_nothing_supported() {
        assert_eq!(pick_depth_format(&DEPTH_FORMAT_CANDIDATES, support(&[])), None);
    }

    #[test]
    fn stencil_detection() {
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
    }
}
