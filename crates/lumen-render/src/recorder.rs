//! Per-frame command recording.

use ash::vk;

use crate::backend::{CommandEncoder, DrawBindings, RenderTarget};
use crate::error::{RenderError, Result};

/// Color attachment clear value.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
/// Depth attachment clear value (far plane, stencil 0).
pub const CLEAR_DEPTH: f32 = 1.0;

/// Clear values in attachment order: color first, then depth/stencil.
pub fn clear_values() -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: CLEAR_DEPTH,
                stencil: 0,
            },
        },
    ]
}

/// Viewport covering the whole target with the full depth range.
#[allow(clippy::cast_precision_loss)]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor covering the whole target.
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Records the single render pass that draws the mesh.
///
/// Recording has no side effects beyond the command buffer, so recording the
/// same slot twice produces the same commands.
pub struct CommandRecorder<E> {
    encoder: E,
}

impl<E: CommandEncoder> CommandRecorder<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Record one frame into `cmd`, which must already be reset.
    ///
    /// Viewport and scissor are set from `target.extent` on every call so
    /// that a rebuilt swapchain needs no pipeline changes.
    pub fn record(
        &self,
        cmd: vk::CommandBuffer,
        target: &RenderTarget,
        bindings: &DrawBindings,
        slot: usize,
    ) -> Result<()> {
        let descriptor_set = *bindings
            .descriptor_sets
            .get(slot)
            .ok_or(RenderError::MissingDescriptorSet(slot))?;

        self.encoder.begin(cmd).map_err(RenderError::Recording)?;

        let enc = &self.encoder;
        enc.begin_render_pass(cmd, target, &clear_values());
        enc.bind_pipeline(cmd, bindings.pipeline);
        enc.bind_vertex_buffer(cmd, bindings.vertex_buffer);
        enc.bind_index_buffer(cmd, bindings.index_buffer);
        enc.set_viewport(cmd, full_viewport(target.extent));
        enc.set_scissor(cmd, full_scissor(target.extent));
        enc.bind_descriptor_set(cmd, bindings.pipeline_layout, descriptor_set);
        enc.draw_indexed(cmd, bindings.index_count);
        enc.end_render_pass(cmd);

        enc.end(cmd).map_err(RenderError::Recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_to_opaque_black_and_far_depth() {
        let [color, depth] = clear_values();
        // SAFETY: Each value was built through the member read here
        let (color, depth) = unsafe { (color.color.float32, depth.depth_stencil) };
        assert_eq!(color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(depth.depth, 1.0);
        assert_eq!(depth.stencil, 0);
    }

    #[test]
    fn viewport_matches_extent() {
        let extent = vk::Extent2D {
            width: 1024,
            height: 768,
        };
        let viewport = full_viewport(extent);
        assert_eq!(viewport.width, 1024.0);
        assert_eq!(viewport.height, 768.0);
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

        let scissor = full_scissor(extent);
        assert_eq!(scissor.extent, extent);
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
    }
}
