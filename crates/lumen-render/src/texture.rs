//! Sampled 2D textures.

use std::path::Path;

use ash::vk;
use gpu_allocator::MemoryLocation;
use lumen_gpu::command::run_one_shot;
use lumen_gpu::image::{cmd_copy_buffer_to_image, cmd_transition_image_layout, create_image_view};
use lumen_gpu::memory::create_staging_buffer;
use lumen_gpu::{CommandPool, GpuBuffer, GpuContext, GpuImage};
use tracing::{debug, info};

use crate::error::{RenderError, Result};

/// Texture format; pixels are treated as sRGB encoded.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TexturePixels {
    /// Decode any format the `image` crate understands into RGBA8.
    pub fn load(path: &Path) -> Result<Self> {
        let decoded = image::open(path)
            .map_err(|e| RenderError::Asset {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .into_rgba8();

        let (width, height) = decoded.dimensions();
        info!("Loaded texture {} ({}x{})", path.display(), width, height);
        Ok(Self {
            width,
            height,
            rgba: decoded.into_raw(),
        })
    }

    /// Grey and white checkerboard with `cells` squares per side.
    pub fn checkerboard(size: u32, cells: u32) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let shade = if (x / cell + y / cell) % 2 == 0 { 255 } else { 96 };
                rgba.extend_from_slice(&[shade, shade, shade, 255]);
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }
}

/// Device-local image with its view and sampler.
pub struct Texture {
    pub image: GpuImage,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
}

impl Texture {
    /// Upload pixels and leave the image in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn upload(gpu: &GpuContext, pool: &CommandPool, pixels: &TexturePixels) -> Result<Self> {
        let expected = (pixels.width * pixels.height * 4) as usize;
        if pixels.width == 0 || pixels.height == 0 || pixels.rgba.len() != expected {
            return Err(RenderError::Config(format!(
                "texture data is {} bytes, expected {} for {}x{}",
                pixels.rgba.len(),
                expected,
                pixels.width,
                pixels.height
            )));
        }

        let mut staging = create_staging_buffer(gpu, &pixels.rgba, "Texture staging")?;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .extent(vk::Extent3D {
                width: pixels.width,
                height: pixels.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = gpu
            .allocator()
            .lock()
            .create_image(&image_info, MemoryLocation::GpuOnly, "Texture");
        let mut image = match image {
            Ok(image) => image,
            Err(e) => {
                gpu.allocator().lock().free_buffer(&mut staging)?;
                return Err(e.into());
            }
        };

        let copied = unsafe { Self::record_upload(gpu, pool, &staging, &image, pixels) };
        gpu.allocator().lock().free_buffer(&mut staging)?;

        let view = copied.and_then(|()| unsafe {
            create_image_view(
                gpu.device(),
                image.image,
                TEXTURE_FORMAT,
                vk::ImageAspectFlags::COLOR,
            )
        });
        let view = match view {
            Ok(view) => view,
            Err(e) => {
                gpu.allocator().lock().free_image(&mut image)?;
                return Err(e.into());
            }
        };

        let sampler = match unsafe { create_sampler(gpu) } {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe { gpu.device().destroy_image_view(view, None) };
                gpu.allocator().lock().free_image(&mut image)?;
                return Err(e.into());
            }
        };

        debug!("Uploaded {}x{} texture", pixels.width, pixels.height);
        Ok(Self {
            image,
            view,
            sampler,
        })
    }

    unsafe fn record_upload(
        gpu: &GpuContext,
        pool: &CommandPool,
        staging: &GpuBuffer,
        image: &GpuImage,
        pixels: &TexturePixels,
    ) -> lumen_gpu::Result<()> {
        let mut recorded = Ok(());
        run_one_shot(gpu.device(), pool, gpu.graphics_queue(), |device, cmd| {
            recorded = cmd_transition_image_layout(
                device,
                cmd,
                image.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )
            .map(|()| {
                cmd_copy_buffer_to_image(
                    device,
                    cmd,
                    staging.buffer,
                    image.image,
                    pixels.width,
                    pixels.height,
                );
            })
            .and_then(|()| {
                cmd_transition_image_layout(
                    device,
                    cmd,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )
            });
        })?;
        recorded
    }

    /// Destroy the sampler, view and image. The device must be idle.
    pub fn destroy(&mut self, gpu: &GpuContext) -> Result<()> {
        unsafe {
            gpu.device().destroy_sampler(self.sampler, None);
            gpu.device().destroy_image_view(self.view, None);
        }
        self.sampler = vk::Sampler::null();
        self.view = vk::ImageView::null();
        gpu.allocator().lock().free_image(&mut self.image)?;
        Ok(())
    }
}

unsafe fn create_sampler(gpu: &GpuContext) -> lumen_gpu::Result<vk::Sampler> {
    let anisotropy = gpu.capabilities().sampler_anisotropy();

    let info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(anisotropy.is_some())
        .max_anisotropy(anisotropy.unwrap_or(1.0))
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(0.0);

    Ok(gpu.device().create_sampler(&info, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_cells() {
        let pixels = TexturePixels::checkerboard(8, 2);
        assert_eq!(pixels.rgba.len(), 8 * 8 * 4);

        let at = |x: u32, y: u32| pixels.rgba[((y * 8 + x) * 4) as usize];
        assert_eq!(at(0, 0), 255);
        assert_eq!(at(4, 0), 96);
        assert_eq!(at(0, 4), 96);
        assert_eq!(at(4, 4), 255);
        assert!(pixels.rgba.chunks(4).all(|p| p[3] == 255));
    }

    #[test]
    fn checkerboard_tolerates_zero_cells() {
        let pixels = TexturePixels::checkerboard(4, 0);
        assert_eq!(pixels.width, 4);
        assert_eq!(pixels.rgba.len(), 64);
    }

    #[test]
    fn missing_image_is_an_asset_error() {
        let err = TexturePixels::load(Path::new("does/not/exist.png")).unwrap_err();
        assert!(matches!(err, RenderError::Asset { .. }));
    }
}
