//! End-to-end tests of graph recording, dependency tracking, and flushing
//! on the dummy backend.

use std::sync::Arc;

use rstest::rstest;

use opal_graphics::backend::{DummyBackend, FramebufferHandle, ReplayedCommand};
use opal_graphics::context::RecordingContext;
use opal_graphics::render_pass::RenderPassDescriptor;
use opal_graphics::resource::ResourceTracker;
use opal_graphics::submit::SubmitQueue;
use opal_graphics::types::{ClearValue, Rect2D, TextureFormat};
use opal_graphics::PrimaryCommands;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_context() -> RecordingContext {
    init_logging();
    RecordingContext::new(Arc::new(DummyBackend::new()))
}

fn color_pass() -> RenderPassDescriptor {
    RenderPassDescriptor::new().with_color(TextureFormat::Bgra8Unorm)
}

/// Flattened markers of every ExecuteCommands instruction, in replay order.
fn execution_order(primary: &PrimaryCommands) -> Vec<String> {
    primary
        .replayed()
        .iter()
        .flat_map(|command| match command {
            ReplayedCommand::ExecuteCommands(markers) => markers.clone(),
            _ => Vec::new(),
        })
        .collect()
}

#[test]
fn test_unrelated_work_keeps_dependency_order() {
    let mut context = test_context();
    let mut first = ResourceTracker::new();
    let mut second = ResourceTracker::new();
    let mut unrelated = ResourceTracker::new();

    first.begin_write(&mut context).unwrap().record("a");
    unrelated.begin_write(&mut context).unwrap().record("c");
    second.begin_write(&mut context).unwrap().record("b");
    first
        .add_read_dependency(&mut context, &mut second)
        .unwrap();

    let primary = context.submit_commands().unwrap();
    let order = execution_order(&primary);

    let a = order.iter().position(|m| m == "a").unwrap();
    let b = order.iter().position(|m| m == "b").unwrap();
    assert!(a < b);
    assert!(order.contains(&"c".to_string()));
}

#[test]
fn test_diamond_dependency_executes_once() {
    let mut context = test_context();
    let mut source = ResourceTracker::new();
    let mut left = ResourceTracker::new();
    let mut right = ResourceTracker::new();
    let mut sink = ResourceTracker::new();

    source.begin_write(&mut context).unwrap().record("source");
    left.begin_write(&mut context).unwrap().record("left");
    right.begin_write(&mut context).unwrap().record("right");
    source.add_read_dependency(&mut context, &mut left).unwrap();
    source
        .add_read_dependency(&mut context, &mut right)
        .unwrap();

    sink.begin_write(&mut context).unwrap().record("sink");
    left.add_read_dependency(&mut context, &mut sink).unwrap();
    right.add_read_dependency(&mut context, &mut sink).unwrap();

    let primary = context.submit_commands().unwrap();
    let order = execution_order(&primary);

    assert_eq!(order.len(), 4);
    assert_eq!(order.first().map(String::as_str), Some("source"));
    assert_eq!(order.last().map(String::as_str), Some("sink"));
}

#[test]
fn test_render_pass_draws_merge_into_one_pass() {
    let mut context = test_context();
    let mut target = ResourceTracker::new();

    target.begin_write(&mut context).unwrap().record("clear prep");
    target
        .begin_render_pass(
            &mut context,
            FramebufferHandle::Dummy(7),
            Rect2D::new(0, 0, 128, 128),
            color_pass(),
            vec![ClearValue::color(0.0, 0.0, 0.0, 1.0)],
        )
        .unwrap()
        .record("draw 1");
    target
        .append_to_started_render_pass(&mut context)
        .unwrap()
        .unwrap()
        .record("draw 2");

    let primary = context.submit_commands().unwrap();
    let replayed = primary.replayed();

    // Outside commands, then exactly one begin/execute/end triple.
    assert_eq!(replayed.len(), 4);
    assert!(matches!(replayed[0], ReplayedCommand::ExecuteCommands(_)));
    assert!(matches!(
        replayed[1],
        ReplayedCommand::BeginRenderPass { .. }
    ));
    assert_eq!(
        replayed[2],
        ReplayedCommand::ExecuteCommands(vec!["draw 1".to_string(), "draw 2".to_string()])
    );
    assert_eq!(replayed[3], ReplayedCommand::EndRenderPass);
}

#[test]
fn test_append_write_accumulates_in_one_buffer() {
    let mut context = test_context();
    let mut buffer = ResourceTracker::new();

    buffer.begin_write(&mut context).unwrap().record("upload 1");
    buffer.append_write(&mut context).unwrap().record("upload 2");
    buffer.append_write(&mut context).unwrap().record("upload 3");

    let primary = context.submit_commands().unwrap();
    assert_eq!(
        primary.replayed(),
        [ReplayedCommand::ExecuteCommands(vec![
            "upload 1".to_string(),
            "upload 2".to_string(),
            "upload 3".to_string(),
        ])]
    );
}

#[test]
fn test_append_to_render_pass_lifecycle() {
    let mut context = test_context();
    let mut target = ResourceTracker::new();

    // No writer yet: nothing to append to.
    assert!(target
        .append_to_started_render_pass(&mut context)
        .unwrap()
        .is_none());

    target.begin_write(&mut context).unwrap();
    assert!(target
        .append_to_started_render_pass(&mut context)
        .unwrap()
        .is_none());

    target
        .begin_render_pass(
            &mut context,
            FramebufferHandle::Dummy(1),
            Rect2D::new(0, 0, 64, 64),
            color_pass(),
            Vec::new(),
        )
        .unwrap();
    assert!(target
        .append_to_started_render_pass(&mut context)
        .unwrap()
        .is_some());

    // A flush invalidates the writer, so appending stops again.
    context.submit_commands().unwrap();
    assert!(target
        .append_to_started_render_pass(&mut context)
        .unwrap()
        .is_none());
}

#[test]
fn test_frozen_writer_forces_new_node() {
    let mut context = test_context();
    let mut texture = ResourceTracker::new();
    let mut sampler_pass = ResourceTracker::new();

    texture.begin_write(&mut context).unwrap().record("init");
    sampler_pass.begin_write(&mut context).unwrap().record("sample");
    texture
        .add_read_dependency(&mut context, &mut sampler_pass)
        .unwrap();

    // The read froze the writer; further writes branch into a new node
    // ordered after both.
    texture.append_write(&mut context).unwrap().record("update");

    let primary = context.submit_commands().unwrap();
    let order = execution_order(&primary);
    let init = order.iter().position(|m| m == "init").unwrap();
    let sample = order.iter().position(|m| m == "sample").unwrap();
    let update = order.iter().position(|m| m == "update").unwrap();
    assert!(init < sample);
    assert!(sample < update);
}

#[test]
fn test_write_dependency_orders_copy_before_use() {
    let mut context = test_context();
    let mut staging = ResourceTracker::new();
    let mut destination = ResourceTracker::new();
    let mut consumer = ResourceTracker::new();

    staging.begin_write(&mut context).unwrap().record("copy");
    destination
        .add_write_dependency(&mut context, &mut staging)
        .unwrap();

    consumer.begin_write(&mut context).unwrap().record("use");
    destination
        .add_read_dependency(&mut context, &mut consumer)
        .unwrap();

    let primary = context.submit_commands().unwrap();
    let order = execution_order(&primary);
    let copy = order.iter().position(|m| m == "copy").unwrap();
    let used = order.iter().position(|m| m == "use").unwrap();
    assert!(copy < used);
}

#[test]
fn test_tracker_in_use_until_serial_retires() {
    let mut context = test_context();
    let mut queue = SubmitQueue::new();
    let mut buffer = ResourceTracker::new();

    buffer.begin_write(&mut context).unwrap().record("write");
    let serial = buffer.stored_serial();
    let primary = context.submit_commands().unwrap();
    let fence = queue.enqueue(serial, primary);

    assert!(buffer.is_in_use(&context));
    queue.retire_up_to(serial);
    context.on_serial_completed(queue.last_completed());

    assert!(fence.is_signaled());
    assert!(!buffer.is_in_use(&context));
}

#[rstest]
#[case(2)]
#[case(8)]
#[case(64)]
fn test_write_chain_preserves_order(#[case] length: usize) {
    let mut context = test_context();
    let mut trackers: Vec<ResourceTracker> =
        (0..length).map(|_| ResourceTracker::new()).collect();

    for index in 0..length {
        let marker = format!("step {index}");
        trackers[index]
            .begin_write(&mut context)
            .unwrap()
            .record(marker);
        if index > 0 {
            let (previous, rest) = trackers.split_at_mut(index);
            previous[index - 1]
                .add_read_dependency(&mut context, &mut rest[0])
                .unwrap();
        }
    }

    let primary = context.submit_commands().unwrap();
    let order = execution_order(&primary);
    let expected: Vec<String> = (0..length).map(|index| format!("step {index}")).collect();
    assert_eq!(order, expected);
}
