//! Fence, semaphore and slot ordering of the frame scheduler.

use ash::vk::{self, Handle};
use lumen_core::Extent;
use lumen_gpu::GpuError;
use lumen_render::{FrameOutcome, RenderError};
use lumen_test::{is_present, is_submit, Event, FrameRig, RigConfig, MOCK_INDEX_COUNT};

/// Every fence reset happens after the fence was observed signaled since
/// its previous submit, and before the submit that signals it again.
fn assert_fence_protocol(events: &[Event]) {
    for (i, event) in events.iter().enumerate() {
        match event {
            Event::ResetFence(fence) => {
                let previous_submit = events[..i]
                    .iter()
                    .rposition(|e| matches!(e, Event::Submit { fence: f, .. } if f == fence));
                let observed = events[..i]
                    .iter()
                    .rposition(|e| *e == Event::FenceObserved(*fence));
                match (previous_submit, observed) {
                    (_, None) => panic!("fence {fence:?} reset without being observed"),
                    (Some(s), Some(o)) => assert!(o > s, "fence {fence:?} reused before it signaled"),
                    (None, Some(_)) => {}
                }
            }
            Event::Submit { fence, .. } => {
                let reset = events[..i]
                    .iter()
                    .rposition(|e| *e == Event::ResetFence(*fence))
                    .unwrap_or_else(|| panic!("fence {fence:?} submitted without a reset"));
                let previous_submit = events[..i]
                    .iter()
                    .rposition(|e| matches!(e, Event::Submit { fence: f, .. } if f == fence));
                if let Some(s) = previous_submit {
                    assert!(reset > s, "fence {fence:?} submitted twice without a reset");
                }
            }
            _ => {}
        }
    }
}

#[test]
fn first_frame_records_the_full_sequence() {
    let mut rig = FrameRig::standard().unwrap();
    let slot = rig.slot(0);

    assert_eq!(rig.draw().unwrap(), FrameOutcome::Presented);

    let extent = Extent::new(800, 600);
    assert_eq!(
        rig.log.events(),
        vec![
            Event::FenceObserved(slot.in_flight),
            Event::Acquire {
                signal: slot.image_available,
                image: 0,
            },
            Event::ResetFence(slot.in_flight),
            Event::Update { slot: 0, extent },
            Event::ResetCommandBuffer(slot.command_buffer),
            Event::Begin(slot.command_buffer),
            Event::BeginRenderPass {
                command_buffer: slot.command_buffer,
                framebuffer: vk::Framebuffer::from_raw(1_000),
                extent,
                color: [0.0, 0.0, 0.0, 1.0],
                depth: 1.0,
                stencil: 0,
            },
            Event::BindPipeline(rig.bindings.pipeline),
            Event::BindVertexBuffer(rig.bindings.vertex_buffer),
            Event::BindIndexBuffer(rig.bindings.index_buffer),
            Event::SetViewport(extent),
            Event::SetScissor(extent),
            Event::BindDescriptorSet(rig.bindings.descriptor_sets[0]),
            Event::DrawIndexed(MOCK_INDEX_COUNT),
            Event::EndRenderPass,
            Event::End(slot.command_buffer),
            Event::Submit {
                command_buffer: slot.command_buffer,
                wait: slot.image_available,
                signal: slot.render_finished,
                fence: slot.in_flight,
            },
            Event::Present {
                image: 0,
                wait: slot.render_finished,
            },
        ]
    );
}

#[test]
fn two_frames_cycle_through_both_slots() {
    let mut rig = FrameRig::standard().unwrap();
    let (first, second) = (rig.slot(0), rig.slot(1));

    assert_eq!(rig.scheduler.current_slot(), 0);
    rig.draw().unwrap();
    assert_eq!(rig.scheduler.current_slot(), 1);
    rig.draw().unwrap();
    assert_eq!(rig.scheduler.current_slot(), 0);
    assert_eq!(rig.scheduler.frame_count(), 2);

    for slot in [first, second] {
        let fence = slot.in_flight;
        assert_eq!(rig.log.count(|e| *e == Event::ResetFence(fence)), 1);
        assert_eq!(
            rig.log
                .count(|e| matches!(e, Event::Submit { fence: f, .. } if *f == fence)),
            1
        );
        assert!(rig.device.is_signaled(fence));
    }

    let submits: Vec<_> = rig
        .log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Submit { command_buffer, .. } => Some(command_buffer),
            _ => None,
        })
        .collect();
    assert_eq!(submits, vec![first.command_buffer, second.command_buffer]);
}

#[test]
fn fences_follow_the_protocol_over_many_frames() {
    let mut rig = FrameRig::standard().unwrap();
    rig.draw_n(12).unwrap();

    assert_eq!(rig.log.count(is_submit), 12);
    assert_fence_protocol(&rig.log.events());
}

#[test]
fn fences_follow_the_protocol_with_three_slots() {
    let mut rig = FrameRig::new(RigConfig {
        slots: 3,
        image_count: 2,
        ..RigConfig::default()
    })
    .unwrap();
    rig.draw_n(9).unwrap();

    assert_eq!(rig.scheduler.current_slot(), 0);
    assert_fence_protocol(&rig.log.events());
}

#[test]
fn image_index_is_independent_of_slot_index() {
    let mut rig = FrameRig::standard().unwrap();
    rig.draw_n(4).unwrap();

    let acquired: Vec<(vk::Semaphore, u32)> = rig
        .log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Acquire { signal, image } => Some((signal, image)),
            _ => None,
        })
        .collect();
    let (a, b) = (rig.slot(0).image_available, rig.slot(1).image_available);
    assert_eq!(acquired, vec![(a, 0), (b, 1), (a, 2), (b, 0)]);
}

#[test]
fn unsignaled_fence_blocks_the_slot() {
    let mut rig = FrameRig::standard().unwrap();
    rig.device.add_fence(rig.slot(0).in_flight, false);

    let err = rig.draw().unwrap_err();
    assert!(matches!(err, RenderError::Sync(GpuError::Vulkan(vk::Result::TIMEOUT))));
    assert!(rig.log.is_empty());
    assert_eq!(rig.surface.acquire_calls(), 0);
}

#[test]
fn failed_submit_does_not_advance_the_slot() {
    let mut rig = FrameRig::standard().unwrap();
    rig.draw().unwrap();
    rig.device
        .fail_next_submit(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);

    let err = rig.draw().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Submit(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
    ));
    assert_eq!(rig.scheduler.current_slot(), 1);
    assert_eq!(rig.scheduler.frame_count(), 1);
    assert_eq!(rig.log.count(is_present), 1);
}

#[test]
fn failed_present_is_fatal_after_the_slot_advanced() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface.script_present(
        0,
        lumen_test::Scripted::Error(vk::Result::ERROR_SURFACE_LOST_KHR),
    );

    let err = rig.draw().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Present(GpuError::Vulkan(vk::Result::ERROR_SURFACE_LOST_KHR))
    ));
    assert_eq!(rig.log.count(is_submit), 1);
    assert_eq!(rig.scheduler.current_slot(), 1);
}

#[test]
fn failed_acquire_is_fatal() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface.script_acquire(
        0,
        lumen_test::Scripted::Error(vk::Result::ERROR_DEVICE_LOST),
    );

    let err = rig.draw().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Acquire(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST))
    ));
    assert_eq!(rig.log.count(is_submit), 0);
    assert_eq!(rig.scheduler.current_slot(), 0);
    // The fence was never reset, so the slot is still usable
    assert!(rig.device.is_signaled(rig.slot(0).in_flight));
}

#[test]
fn failed_begin_is_a_recording_error() {
    let mut rig = FrameRig::standard().unwrap();
    rig.device
        .fail_next_begin(vk::Result::ERROR_OUT_OF_HOST_MEMORY);

    let err = rig.draw().unwrap_err();
    assert!(matches!(err, RenderError::Recording(_)));
    assert_eq!(rig.log.count(is_submit), 0);
    assert_eq!(rig.scheduler.frame_count(), 0);
}

#[test]
fn missing_descriptor_set_is_reported() {
    let mut rig = FrameRig::standard().unwrap();
    rig.bindings.descriptor_sets.clear();

    let err = rig.draw().unwrap_err();
    assert!(matches!(err, RenderError::MissingDescriptorSet(0)));
    assert_eq!(rig.log.count(is_submit), 0);
}

#[test]
fn state_update_failure_propagates() {
    let mut rig = FrameRig::standard().unwrap();
    rig.state.fail_next_update();

    assert!(matches!(rig.draw(), Err(RenderError::Config(_))));
    assert_eq!(rig.log.count(is_submit), 0);
}

#[test]
fn recording_is_identical_for_repeated_frames_on_a_slot() {
    let mut rig = FrameRig::new(RigConfig {
        image_count: 2,
        ..RigConfig::default()
    })
    .unwrap();

    let frame = |rig: &mut FrameRig| {
        let start = rig.log.len();
        rig.draw().unwrap();
        rig.log.since(start)
    };

    let first = frame(&mut rig);
    frame(&mut rig);
    let third = frame(&mut rig);
    assert_eq!(first, third);
}
