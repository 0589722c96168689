//! A frame scheduler wired to mocks.

use ash::vk::{self, Handle};
use lumen_core::{resize_channel, Extent, ResizeNotifier};
use lumen_render::{
    DrawBindings, FrameOutcome, FrameScheduler, FrameSlot, FrameSlotPool, ResizeCoordinator,
    Result,
};

use crate::events::EventLog;
use crate::mocks::{MockDevice, MockState, MockSurface, MockWindow};

/// Index count of the mock draw.
pub const MOCK_INDEX_COUNT: u32 = 12;

/// `count` slots with distinct, non-null handles.
pub fn mock_slots(count: usize) -> Vec<FrameSlot> {
    (1..=count as u64)
        .map(|n| FrameSlot {
            image_available: vk::Semaphore::from_raw(n * 10 + 1),
            render_finished: vk::Semaphore::from_raw(n * 10 + 2),
            in_flight: vk::Fence::from_raw(n * 10 + 3),
            command_buffer: vk::CommandBuffer::from_raw(n * 10 + 4),
        })
        .collect()
}

/// Shape of a rig.
#[derive(Debug, Clone, Copy)]
pub struct RigConfig {
    pub slots: usize,
    pub image_count: u32,
    pub extent: Extent,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            slots: lumen_core::constants::MAX_FRAMES_IN_FLIGHT,
            image_count: 3,
            extent: Extent::new(800, 600),
        }
    }
}

/// Scheduler, mocks and the log they share.
pub struct FrameRig {
    pub log: EventLog,
    pub device: MockDevice,
    pub surface: MockSurface,
    pub window: MockWindow,
    pub state: MockState,
    pub bindings: DrawBindings,
    pub resize: ResizeNotifier,
    pub scheduler: FrameScheduler<MockDevice, MockDevice>,
    slots: Vec<FrameSlot>,
}

impl FrameRig {
    pub fn new(config: RigConfig) -> Result<Self> {
        let log = EventLog::new();
        let device = MockDevice::new(log.clone());

        let slots = mock_slots(config.slots);
        for slot in &slots {
            device.add_fence(slot.in_flight, true);
        }

        let bindings = DrawBindings {
            pipeline: vk::Pipeline::from_raw(1),
            pipeline_layout: vk::PipelineLayout::from_raw(2),
            vertex_buffer: vk::Buffer::from_raw(3),
            index_buffer: vk::Buffer::from_raw(4),
            index_count: MOCK_INDEX_COUNT,
            descriptor_sets: (0..slots.len() as u64)
                .map(|i| vk::DescriptorSet::from_raw(100 + i))
                .collect(),
        };

        let (resize, events) = resize_channel();
        let scheduler = FrameScheduler::new(
            device.clone(),
            device.clone(),
            FrameSlotPool::from_slots(slots.clone())?,
            ResizeCoordinator::new(events),
        );

        Ok(Self {
            surface: MockSurface::new(log.clone(), config.extent, config.image_count),
            window: MockWindow::new(log.clone(), config.extent),
            state: MockState::new(log.clone()),
            log,
            device,
            bindings,
            resize,
            scheduler,
            slots,
        })
    }

    /// A rig with the default shape.
    pub fn standard() -> Result<Self> {
        Self::new(RigConfig::default())
    }

    /// Run one `draw_frame`.
    pub fn draw(&mut self) -> Result<FrameOutcome> {
        self.scheduler.draw_frame(
            &mut self.surface,
            &mut self.window,
            &mut self.state,
            &self.bindings,
        )
    }

    /// Run `n` frames, stopping at the first error.
    pub fn draw_n(&mut self, n: usize) -> Result<Vec<FrameOutcome>> {
        (0..n).map(|_| self.draw()).collect()
    }

    pub fn slot(&self, index: usize) -> FrameSlot {
        self.slots[index]
    }

    /// Simulate the windowing layer observing a resize.
    pub fn resize_window(&mut self, extent: Extent) {
        self.window.set_extent(extent);
        self.resize.notify(extent);
    }
}
