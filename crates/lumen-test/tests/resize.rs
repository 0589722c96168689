//! Stale and suboptimal surfaces, window resizes and minimization.

use ash::vk;
use lumen_core::Extent;
use lumen_gpu::{GpuError, SurfaceStatus};
use lumen_render::{FrameOutcome, PresentationSurface, RenderError};
use lumen_test::{is_present, is_rebuild, is_submit, Event, FrameRig, Scripted};

fn assert_wait_idle_before_every_rebuild(events: &[Event]) {
    for (i, event) in events.iter().enumerate() {
        if let Event::Rebuild(_) = event {
            assert!(i > 0, "rebuild without a preceding wait-idle");
            assert_eq!(events[i - 1], Event::WaitIdle, "event before rebuild #{i}");
        }
    }
}

#[test]
fn stale_acquire_skips_the_frame_and_keeps_the_slot() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_acquire(4, Scripted::Status(SurfaceStatus::Stale));

    let outcomes = rig.draw_n(4).unwrap();
    assert!(outcomes.iter().all(|o| *o == FrameOutcome::Presented));
    let slot_before = rig.scheduler.current_slot();
    let start = rig.log.len();

    assert_eq!(rig.draw().unwrap(), FrameOutcome::Skipped);

    let slot = rig.slot(slot_before);
    assert_eq!(
        rig.log.since(start),
        vec![
            Event::FenceObserved(slot.in_flight),
            Event::WaitIdle,
            Event::Rebuild(Extent::new(800, 600)),
        ]
    );
    assert_eq!(rig.scheduler.current_slot(), slot_before);
    assert_eq!(rig.scheduler.frame_count(), 4);
    assert_eq!(rig.log.count(is_submit), 4);
    assert_eq!(rig.log.count(is_present), 4);
    assert_eq!(rig.scheduler.resize_coordinator().rebuild_count(), 1);

    // The retry uses the same slot and its untouched fence
    let start = rig.log.len();
    assert_eq!(rig.draw().unwrap(), FrameOutcome::Presented);
    let retry = rig.log.since(start);
    assert_eq!(retry[0], Event::FenceObserved(slot.in_flight));
    assert_eq!(
        retry[1],
        Event::Acquire {
            signal: slot.image_available,
            image: 0,
        }
    );
    assert_eq!(rig.scheduler.current_slot(), (slot_before + 1) % 2);
}

#[test]
fn suboptimal_present_finishes_the_frame_then_rebuilds() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_present(9, Scripted::Status(SurfaceStatus::Suboptimal));

    rig.draw_n(9).unwrap();
    let start = rig.log.len();
    assert_eq!(rig.draw().unwrap(), FrameOutcome::PresentedAndRebuilt);

    let tail = rig.log.since(start);
    let n = tail.len();
    assert!(matches!(tail[n - 3], Event::Present { .. }));
    assert_eq!(tail[n - 2], Event::WaitIdle);
    assert_eq!(tail[n - 1], Event::Rebuild(Extent::new(800, 600)));

    assert_eq!(rig.log.count(is_submit), 10);
    assert_eq!(rig.log.count(is_present), 10);
    assert_eq!(rig.log.count(is_rebuild), 1);
    assert_eq!(rig.scheduler.frame_count(), 10);
    assert_eq!(rig.scheduler.current_slot(), 0);

    assert_eq!(rig.draw().unwrap(), FrameOutcome::Presented);
    assert_eq!(rig.log.count(is_rebuild), 1);
}

#[test]
fn stale_present_rebuilds_after_presenting() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_present(0, Scripted::Status(SurfaceStatus::Stale));

    assert_eq!(rig.draw().unwrap(), FrameOutcome::PresentedAndRebuilt);
    assert_eq!(rig.scheduler.current_slot(), 1);
    assert_eq!(rig.surface.generation(), 1);
}

#[test]
fn suboptimal_acquire_still_renders() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_acquire(0, Scripted::Status(SurfaceStatus::Suboptimal));

    assert_eq!(rig.draw().unwrap(), FrameOutcome::PresentedAndRebuilt);
    assert_eq!(rig.log.count(is_submit), 1);
    assert_eq!(rig.log.count(is_present), 1);
    assert_eq!(rig.log.count(is_rebuild), 1);
    assert_eq!(rig.scheduler.current_slot(), 1);
}

#[test]
fn window_resize_rebuilds_after_present() {
    let mut rig = FrameRig::standard().unwrap();
    rig.draw().unwrap();

    let new_size = Extent::new(1280, 720);
    rig.resize_window(new_size);
    let start = rig.log.len();
    assert_eq!(rig.draw().unwrap(), FrameOutcome::PresentedAndRebuilt);

    // The frame in flight still used the old size
    let frame = rig.log.since(start);
    assert!(frame.contains(&Event::SetViewport(Extent::new(800, 600))));
    assert_eq!(frame.last(), Some(&Event::Rebuild(new_size)));
    assert_eq!(rig.surface.current_extent(), new_size);

    // The flag was cleared by the rebuild
    let start = rig.log.len();
    assert_eq!(rig.draw().unwrap(), FrameOutcome::Presented);
    let frame = rig.log.since(start);
    assert!(frame.contains(&Event::SetViewport(new_size)));
    assert!(frame.contains(&Event::SetScissor(new_size)));
    assert!(frame.contains(&Event::Update {
        slot: 0,
        extent: new_size,
    }));
}

#[test]
fn bursts_of_resize_events_cause_one_rebuild() {
    let mut rig = FrameRig::standard().unwrap();
    for width in [900, 1000, 1100] {
        rig.resize_window(Extent::new(width, 700));
    }

    assert_eq!(rig.draw().unwrap(), FrameOutcome::PresentedAndRebuilt);
    assert_eq!(rig.log.count(is_rebuild), 1);
    assert_eq!(rig.surface.current_extent(), Extent::new(1100, 700));
    assert_eq!(rig.draw().unwrap(), FrameOutcome::Presented);
}

#[test]
fn minimized_window_stalls_until_both_dimensions_are_positive() {
    let mut rig = FrameRig::standard().unwrap();
    rig.window.script_extents([
        Extent::new(0, 600),
        Extent::new(800, 0),
        Extent::new(1024, 768),
    ]);
    rig.resize.notify(Extent::new(0, 600));

    let start = rig.log.len();
    assert_eq!(rig.draw().unwrap(), FrameOutcome::PresentedAndRebuilt);
    assert_eq!(rig.window.wait_calls(), 2);

    let frame = rig.log.since(start);
    let n = frame.len();
    assert_eq!(
        frame[n - 4..],
        [
            Event::WaitEvents,
            Event::WaitEvents,
            Event::WaitIdle,
            Event::Rebuild(Extent::new(1024, 768)),
        ]
    );
}

#[test]
fn stale_acquire_while_minimized_waits_before_rebuilding() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_acquire(0, Scripted::Status(SurfaceStatus::Stale));
    rig.window
        .script_extents([Extent::new(0, 0), Extent::new(640, 480)]);

    assert_eq!(rig.draw().unwrap(), FrameOutcome::Skipped);
    assert_eq!(rig.window.wait_calls(), 1);
    assert_eq!(rig.surface.current_extent(), Extent::new(640, 480));
    assert_eq!(rig.log.count(is_submit), 0);
}

#[test]
fn closing_while_minimized_abandons_the_rebuild() {
    let mut rig = FrameRig::standard().unwrap();
    rig.window.script_extents([Extent::new(0, 0)]);
    rig.window.close_after_waits(2);
    rig.resize.notify(Extent::new(0, 0));

    let start = rig.log.len();
    assert_eq!(rig.draw().unwrap(), FrameOutcome::Presented);
    assert_eq!(rig.window.wait_calls(), 2);
    assert_eq!(rig.scheduler.current_slot(), 1);

    let frame = rig.log.since(start);
    assert!(!frame.iter().any(is_rebuild));
    assert!(!frame.contains(&Event::WaitIdle));
    assert_eq!(rig.scheduler.resize_coordinator().rebuild_count(), 0);
    assert_eq!(rig.surface.generation(), 0);
}

#[test]
fn stale_acquire_while_minimized_and_closing_keeps_the_slot() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_acquire(0, Scripted::Status(SurfaceStatus::Stale));
    rig.window.script_extents([Extent::new(0, 0)]);
    rig.window.close_after_waits(0);

    assert_eq!(rig.draw().unwrap(), FrameOutcome::Skipped);
    assert_eq!(rig.window.wait_calls(), 0);
    assert_eq!(rig.scheduler.current_slot(), 0);
    assert_eq!(rig.log.count(is_rebuild), 0);
    assert_eq!(rig.log.count(is_submit), 0);
}

#[test]
fn wait_idle_immediately_precedes_every_rebuild() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_acquire(1, Scripted::Status(SurfaceStatus::Stale));
    rig.surface
        .script_acquire(3, Scripted::Status(SurfaceStatus::Suboptimal));
    rig.surface
        .script_present(4, Scripted::Status(SurfaceStatus::Stale));

    rig.draw_n(4).unwrap();
    rig.window
        .script_extents([Extent::new(0, 0), Extent::new(300, 200)]);
    rig.resize.notify(Extent::new(0, 0));
    rig.draw_n(3).unwrap();

    let events = rig.log.events();
    assert!(events.iter().filter(|e| is_rebuild(e)).count() >= 4);
    assert_wait_idle_before_every_rebuild(&events);
}

#[test]
fn rebuilding_twice_at_the_same_size_is_stable() {
    let mut rig = FrameRig::standard().unwrap();

    rig.scheduler
        .rebuild(&mut rig.surface, &mut rig.window)
        .unwrap();
    let first_count = rig.surface.framebuffers().len();
    let first_extent = rig.surface.extent();

    rig.scheduler
        .rebuild(&mut rig.surface, &mut rig.window)
        .unwrap();
    assert_eq!(rig.surface.framebuffers().len(), first_count);
    assert_eq!(rig.surface.extent(), first_extent);
    assert_eq!(rig.surface.image_count(), 3);
    assert_eq!(rig.scheduler.resize_coordinator().rebuild_count(), 2);
    assert_eq!(rig.surface.generation(), 2);
}

#[test]
fn rebuild_leaves_pipeline_state_alone() {
    let mut rig = FrameRig::standard().unwrap();
    let bindings = rig.bindings.clone();
    rig.surface
        .script_acquire(0, Scripted::Status(SurfaceStatus::Stale));

    rig.draw().unwrap();
    rig.draw().unwrap();

    let events = rig.log.events();
    assert!(events.contains(&Event::BindPipeline(bindings.pipeline)));
    assert!(events.contains(&Event::BindDescriptorSet(bindings.descriptor_sets[0])));
    assert_eq!(rig.bindings.pipeline, bindings.pipeline);
}

#[test]
fn failed_rebuild_is_fatal() {
    let mut rig = FrameRig::standard().unwrap();
    rig.surface
        .script_acquire(0, Scripted::Status(SurfaceStatus::Stale));
    rig.surface
        .fail_next_rebuild(vk::Result::ERROR_OUT_OF_HOST_MEMORY);

    let err = rig.draw().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Rebuild(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY))
    ));
    assert_eq!(rig.scheduler.resize_coordinator().rebuild_count(), 0);
}
