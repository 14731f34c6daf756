// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Execution Integration Tests
//!
//! End-to-end coverage of the orchestrator's core walk: linear pipelines,
//! parameter-bus hand-off, target reconciliation, mode gating, output
//! folding, parameter resolution precedence, and error surfacing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use frameflow::{
    ExecutionMode, Frame, MultiExtractor, Pipeline, PipelineError, PipelineStep, StepOutput,
    CANCEL_KEY,
};

/// Extractor producing one frame with a JSON-object payload.
fn frame_extractor(step_name: &str, frame_name: &'static str, rows: u64) -> PipelineStep {
    PipelineStep::extract(step_name)
        .with_context()
        .body(move |args| {
            let mut ctx = args.take_context().expect("extractor subcontext");
            ctx.add_frame(
                frame_name,
                Frame::new(frame_name, rows, json!({ "rows": rows }))?,
            );
            Ok(StepOutput::Ctx(ctx))
        })
        .build()
        .unwrap()
}

#[test]
fn test_linear_pipeline_dev_mode_skips_loader() {
    // Extract -> transform -> load in DEV; the transform's change is
    // visible in the global context and the loader body never runs.
    let loader_called = Arc::new(AtomicBool::new(false));
    let loader_flag = Arc::clone(&loader_called);

    let mut pipeline = Pipeline::new();
    pipeline
        .set_target_extractor(frame_extractor("pull", "t", 3))
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("append_flag")
                .with_context()
                .frame("t")
                .body(|args| {
                    let mut ctx = args.take_context().expect("transform subcontext");
                    let frame = ctx.frame("t").expect("declared frame").clone();
                    let mut payload = frame.payload().clone();
                    payload["flag"] = json!(true);
                    let updated = Frame::new("t", frame.row_count(), payload)?;
                    ctx.set_frame("t", updated);
                    Ok(StepOutput::Ctx(ctx))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .set_target_loader(
            PipelineStep::load("push")
                .with_context()
                .body(move |_args| {
                    loader_flag.store(true, Ordering::SeqCst);
                    Ok(StepOutput::None)
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    pipeline.execute().unwrap();

    let frame = pipeline.globalcontext().frame("t").expect("frame t");
    assert_eq!(frame.payload()["flag"], json!(true));
    assert_eq!(frame.payload()["rows"], json!(3));
    assert_eq!(pipeline.globalcontext().num_frames(), 1);
    assert!(!loader_called.load(Ordering::SeqCst), "DEV must skip loaders");
}

#[test]
fn test_prod_mode_runs_loader() {
    let loader_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loader_calls);

    let mut pipeline = Pipeline::with_mode(ExecutionMode::Prod);
    pipeline
        .set_target_extractor(frame_extractor("pull", "t", 1))
        .unwrap();
    pipeline
        .set_target_loader(
            PipelineStep::load("push")
                .with_context()
                .body(move |args| {
                    assert!(args.context().is_some_and(|c| c.contains_frame("t")));
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(StepOutput::None)
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    pipeline.execute().unwrap();
    assert_eq!(loader_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_prod_mode_requires_target_extractor() {
    let mut pipeline = Pipeline::with_mode(ExecutionMode::Prod);
    pipeline
        .add_step(
            PipelineStep::transform("noop")
                .body(|_args| Ok(StepOutput::None))
                .build()
                .unwrap(),
        )
        .unwrap();
    let err = pipeline.execute().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
}

#[test]
fn test_parameter_bus_hand_off() {
    // make_x() -> x = 42; use_x(x) -> y = x + 1.
    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("make_x")
                .returns(["x"])
                .body(|_args| Ok(StepOutput::scalar(json!(42))))
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("use_x")
                .param("x")
                .returns(["y"])
                .body(|args| {
                    let x = args.value("x").and_then(|v| v.as_i64()).expect("x bound");
                    Ok(StepOutput::scalar(json!(x + 1)))
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    pipeline.execute().unwrap();
    assert_eq!(pipeline.bus().get("x"), Some(&json!(42)));
    assert_eq!(pipeline.bus().get("y"), Some(&json!(43)));
}

#[test]
fn test_tuple_output_aligns_by_position() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("stats")
                .returns(["lo", "hi"])
                .body(|_args| Ok(StepOutput::Tuple(vec![json!(1), json!(9)])))
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline.execute().unwrap();
    assert_eq!(pipeline.bus().get("lo"), Some(&json!(1)));
    assert_eq!(pipeline.bus().get("hi"), Some(&json!(9)));
}

#[test]
fn test_targets_are_reconciled_to_front_and_back() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let tracking = |name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>| {
        let log = Arc::clone(log);
        move |_args: &mut frameflow::StepArgs| {
            log.lock().unwrap().push(name);
            Ok(StepOutput::None)
        }
    };

    let mut pipeline = Pipeline::with_mode(ExecutionMode::Prod);
    // Transform registered first; targets must still bracket it.
    pipeline
        .add_step(
            PipelineStep::transform("middle")
                .body(tracking("middle", &order))
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .set_target_extractor(
            PipelineStep::extract("first")
                .body(tracking("first", &order))
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .set_target_loader(
            PipelineStep::load("last")
                .body(tracking("last", &order))
                .build()
                .unwrap(),
        )
        .unwrap();

    pipeline.execute().unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "middle", "last"]);
}

#[test]
fn test_multi_extractor_members_lead_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let member = |name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>| {
        let log = Arc::clone(log);
        PipelineStep::extract(name)
            .body(move |_args| {
                log.lock().unwrap().push(name);
                Ok(StepOutput::None)
            })
            .build()
            .unwrap()
    };

    let mut multi = MultiExtractor::new("sources").unwrap();
    multi.push(member("src_a", &order)).unwrap();
    multi.push(member("src_b", &order)).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("after")
                .body({
                    let log = Arc::clone(&order);
                    move |_args| {
                        log.lock().unwrap().push("after");
                        Ok(StepOutput::None)
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline.set_target_extractor(multi).unwrap();

    pipeline.execute().unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["src_a", "src_b", "after"]);
}

#[test]
fn test_resolution_precedence_override_bus_default() {
    // The override wins over the bus value, the bus value over the default.
    let seen = Arc::new(Mutex::new(Vec::new()));

    let observer = |name: &'static str, log: &Arc<Mutex<Vec<i64>>>| {
        let log = Arc::clone(log);
        PipelineStep::transform(name)
            .param("p")
            .default_value("p", json!(3))
            .body(move |args| {
                log.lock()
                    .unwrap()
                    .push(args.value("p").and_then(|v| v.as_i64()).unwrap());
                Ok(StepOutput::None)
            })
    };

    let mut pipeline = Pipeline::new();
    // Only the default binds p.
    pipeline
        .add_step(observer("default_wins", &seen).build().unwrap())
        .unwrap();
    // A producer puts p on the bus.
    pipeline
        .add_step(
            PipelineStep::transform("produce_p")
                .returns(["p"])
                .body(|_args| Ok(StepOutput::scalar(json!(7))))
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .add_step(observer("bus_wins", &seen).build().unwrap())
        .unwrap();
    // An input override beats both.
    pipeline
        .add_step(
            observer("override_wins", &seen)
                .input("p", json!(11))
                .build()
                .unwrap(),
        )
        .unwrap();

    pipeline.execute().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![3, 7, 11]);
}

#[test]
fn test_missing_parameter_aborts() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("consumer")
                .param("never_produced")
                .body(|_args| Ok(StepOutput::None))
                .build()
                .unwrap(),
        )
        .unwrap();

    let err = pipeline.execute().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingParameter { ref parameter, .. } if parameter == "never_produced"
    ));
}

#[test]
fn test_arity_mismatch_aborts() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("two_returns")
                .returns(["a", "b"])
                .body(|_args| Ok(StepOutput::scalar(json!(1))))
                .build()
                .unwrap(),
        )
        .unwrap();

    let err = pipeline.execute().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ArityMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));
}

#[test]
fn test_step_failure_is_annotated() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("ok_step")
                .body(|_args| Ok(StepOutput::None))
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("exploder")
                .body(|_args| Err(PipelineError::internal_error("boom")) )
                .build()
                .unwrap(),
        )
        .unwrap();

    let err = pipeline.execute().unwrap_err();
    match err {
        PipelineError::StepFailed {
            step_name,
            ordinal,
            message,
            ..
        } => {
            assert_eq!(step_name, "exploder");
            assert_eq!(ordinal, 1);
            assert!(message.contains("boom"));
        }
        other => panic!("expected StepFailed, got {}", other),
    }
}

#[test]
fn test_subcontext_contains_only_declared_frames() {
    let mut pipeline = Pipeline::new();
    pipeline
        .set_target_extractor(frame_extractor("pull_t", "t", 1))
        .unwrap();
    pipeline
        .add_step(frame_extractor("pull_u", "u", 2))
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("sees_only_u")
                .with_context()
                .frame("u")
                .body(|args| {
                    let ctx = args.context().expect("subcontext");
                    assert!(ctx.contains_frame("u"));
                    assert!(!ctx.contains_frame("t"));
                    assert_eq!(ctx.num_frames(), 1);
                    Ok(StepOutput::None)
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("sees_everything")
                .with_context()
                .body(|args| {
                    let ctx = args.context().expect("subcontext");
                    assert!(ctx.contains_frame("t"));
                    assert!(ctx.contains_frame("u"));
                    Ok(StepOutput::None)
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    pipeline.execute().unwrap();
}

#[test]
fn test_whole_context_passthrough_is_read_write() {
    // A transform declaring a context but no frames holds the global
    // context read/write: in-place edits land even when the body returns
    // nothing at all.
    let mut pipeline = Pipeline::new();
    pipeline
        .set_target_extractor(frame_extractor("pull", "t", 2))
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("annotate_in_place")
                .with_context()
                .body(|args| {
                    let ctx = args.context_mut().expect("passthrough context");
                    ctx.add_frame("extra", Frame::new("extra", 1, json!([1]))?);
                    ctx.set_metadata("touched", json!(true));
                    Ok(StepOutput::None)
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("observe")
                .with_context()
                .frame("extra")
                .body(|args| {
                    let ctx = args.context().expect("subcontext");
                    assert_eq!(ctx.frame("extra").map(|f| f.row_count()), Some(1));
                    Ok(StepOutput::None)
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    pipeline.execute().unwrap();
    assert!(pipeline.globalcontext().contains_frame("extra"));
    assert!(pipeline.globalcontext().contains_frame("t"));
    assert_eq!(
        pipeline.globalcontext().metadata("touched"),
        Some(&json!(true))
    );
}

#[test]
fn test_undeclared_frame_is_configuration_error() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("wants_ghost_frame")
                .with_context()
                .frame("ghost")
                .body(|_args| Ok(StepOutput::None))
                .build()
                .unwrap(),
        )
        .unwrap();
    let err = pipeline.execute().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
}

#[test]
fn test_cancellation_between_steps() {
    let second_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&second_ran);

    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("request_cancel")
                .with_context()
                .body(|args| {
                    let mut ctx = args.take_context().expect("subcontext");
                    ctx.set_metadata(CANCEL_KEY, json!(true));
                    Ok(StepOutput::Ctx(ctx))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    pipeline
        .add_step(
            PipelineStep::transform("never_reached")
                .body(move |_args| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(StepOutput::None)
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    let err = pipeline.execute().unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled(_)));
    assert!(!second_ran.load(Ordering::SeqCst));
}

#[test]
fn test_type_violation_at_target_setters() {
    let transform = PipelineStep::transform("not_an_extractor")
        .body(|_args| Ok(StepOutput::None))
        .build()
        .unwrap();
    let mut pipeline = Pipeline::new();
    let err = pipeline.set_target_extractor(transform).unwrap_err();
    assert!(matches!(err, PipelineError::TypeViolation(_)));

    let extract = PipelineStep::extract("not_a_loader")
        .body(|_args| Ok(StepOutput::None))
        .build()
        .unwrap();
    let err = pipeline.set_target_loader(extract).unwrap_err();
    assert!(matches!(err, PipelineError::TypeViolation(_)));
}

#[test]
fn test_display_summarizes_pipeline() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_step(
            PipelineStep::transform("make_x")
                .returns(["x"])
                .body(|_args| Ok(StepOutput::scalar(json!(1))))
                .build()
                .unwrap(),
        )
        .unwrap();
    let rendered = pipeline.to_string();
    assert!(rendered.contains("1 step(s)"));
    assert!(rendered.contains("make_x"));
}
