//! Shared call log.

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use lumen_core::Extent;

/// One recorded call on a mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A fence wait that returned because the fence was signaled.
    FenceObserved(vk::Fence),
    ResetFence(vk::Fence),
    ResetCommandBuffer(vk::CommandBuffer),
    Submit {
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    },
    WaitIdle,

    Begin(vk::CommandBuffer),
    BeginRenderPass {
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: Extent,
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    },
    BindPipeline(vk::Pipeline),
    BindVertexBuffer(vk::Buffer),
    BindIndexBuffer(vk::Buffer),
    SetViewport(Extent),
    SetScissor(Extent),
    BindDescriptorSet(vk::DescriptorSet),
    DrawIndexed(u32),
    EndRenderPass,
    End(vk::CommandBuffer),

    Acquire {
        signal: vk::Semaphore,
        image: u32,
    },
    Present {
        image: u32,
        wait: vk::Semaphore,
    },
    Rebuild(Extent),

    WaitEvents,
    Update {
        slot: usize,
        extent: Extent,
    },
}

/// Ordered log shared by every mock of one rig.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    /// Events recorded from index `start` on.
    pub fn since(&self, start: usize) -> Vec<Event> {
        self.events.borrow().get(start..).map(<[Event]>::to_vec).unwrap_or_default()
    }
}

/// Matches any [`Event::Submit`].
pub fn is_submit(event: &Event) -> bool {
    matches!(event, Event::Submit { .. })
}

/// Matches any [`Event::Present`].
pub fn is_present(event: &Event) -> bool {
    matches!(event, Event::Present { .. })
}

/// Matches any [`Event::Rebuild`].
pub fn is_rebuild(event: &Event) -> bool {
    matches!(event, Event::Rebuild(_))
}
