//! [`FrameDevice`] and [`CommandEncoder`] on a real device.

use ash::vk;
use lumen_gpu::{GpuContext, Result};

use crate::backend::{CommandEncoder, FrameDevice, FrameSubmission, RenderTarget};

/// Logical device plus the graphics queue frames are submitted to.
#[derive(Clone)]
pub struct VulkanDevice {
    device: ash::Device,
    graphics_queue: vk::Queue,
}

impl VulkanDevice {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            device: gpu.device().clone(),
            graphics_queue: gpu.graphics_queue(),
        }
    }
}

impl FrameDevice for VulkanDevice {
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns)? };
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe { self.device.reset_fences(&[fence])? };
        Ok(())
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    fn submit(&self, submission: &FrameSubmission) -> Result<()> {
        let command_buffers = [submission.command_buffer];
        let wait = [submission.wait_semaphore];
        let stages = [submission.wait_stage];
        let signal = [submission.signal_semaphore];
        let info = vk::SubmitInfo::default()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal);
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[info], submission.fence)?;
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl CommandEncoder for VulkanDevice {
    fn begin(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::default();
        unsafe { self.device.begin_command_buffer(cmd, &info)? };
        Ok(())
    }

    fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        target: &RenderTarget,
        clear_values: &[vk::ClearValue],
    ) {
        let info = vk::RenderPassBeginInfo::default()
            .render_pass(target.render_pass)
            .framebuffer(target.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            })
            .clear_values(clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &info, vk::SubpassContents::INLINE);
        }
    }

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe { self.device.cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]) };
    }

    fn bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(cmd, buffer, 0, vk::IndexType::UINT32);
        }
    }

    fn set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(cmd, 0, &[viewport]) };
    }

    fn set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(cmd, 0, &[scissor]) };
    }

    fn bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        unsafe { self.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0) };
    }

    fn end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) };
    }

    fn end(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { self.device.end_command_buffer(cmd)? };
        Ok(())
    }
}
