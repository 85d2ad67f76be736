#![cfg(feature = "io-jsonl")]

//! Tests for cursor-driven incremental runs.

use anyhow::{Result, bail};
use ironflow::incremental::infallible;
use ironflow::io::{InMemoryStateStore, JsonlEncoder, SliceCollector, decode_jsonl};
use ironflow::testing::*;
use ironflow::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn numbers() -> SliceCollector<u32> {
    SliceCollector::new((0..20).collect(), 5)
}

#[test]
fn test_successful_run_advances_cursor() -> Result<()> {
    let store = InMemoryStateStore::with_entries([("numbers", "5")]);
    let collector = RecordingCollector::new(numbers());
    let emitter = RecordingEmitter::new();

    let pipeline = IncrementalPipeline::new(
        store.clone(),
        collector.clone(),
        infallible(|n: u32| n * 100),
        JsonlEncoder::new(),
        emitter.clone(),
    );

    let outcome = pipeline.execute("numbers")?;
    assert_eq!(outcome.cursor_read, "5");
    assert_eq!(outcome.cursor_written, "10");
    assert_eq!(outcome.records, 5);
    assert_eq!(store.get("numbers")?, "10");

    let emitted: Vec<u32> = decode_jsonl(&emitter.payloads()[0])?;
    assert_eq!(emitted, vec![500, 600, 700, 800, 900]);
    assert_eq!(outcome.bytes, emitter.payloads()[0].len());

    pipeline.execute("numbers")?;
    assert_eq!(collector.cursors(), vec!["5", "10"]);
    assert_eq!(store.get("numbers")?, "15");
    Ok(())
}

#[test]
fn test_emit_failure_leaves_cursor_untouched() {
    let store = InMemoryStateStore::with_entries([("numbers", "5")]);
    let emitter = FailingEmitter::new();

    let pipeline = IncrementalPipeline::new(
        store.clone(),
        numbers(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        emitter.clone(),
    );

    let err = pipeline.execute("numbers").unwrap_err();
    assert!(matches!(err, EtlError::Emit(_)));
    assert!(!err.data_was_emitted());
    assert_eq!(emitter.calls(), 1);
    assert_eq!(store.get("numbers").unwrap(), "5");
}

#[test]
fn test_retry_after_emit_failure_collects_same_batch() -> Result<()> {
    let store = InMemoryStateStore::with_entries([("numbers", "5")]);
    let collector = RecordingCollector::new(numbers());

    let failing = IncrementalPipeline::new(
        store.clone(),
        collector.clone(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        FailingEmitter::new(),
    );
    assert!(failing.execute("numbers").is_err());

    let emitter = RecordingEmitter::new();
    let healthy = IncrementalPipeline::new(
        store.clone(),
        collector.clone(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        emitter.clone(),
    );
    healthy.execute("numbers")?;

    assert_eq!(collector.cursors(), vec!["5", "5"]);
    assert_eq!(decode_jsonl::<u32>(&emitter.payloads()[0])?, vec![5, 6, 7, 8, 9]);
    assert_eq!(store.get("numbers")?, "10");
    Ok(())
}

#[test]
fn test_missing_cursor_uses_initial_cursor() -> Result<()> {
    let store = InMemoryStateStore::new();
    let collector = RecordingCollector::new(numbers());

    let pipeline = IncrementalPipeline::new(
        store.clone(),
        collector.clone(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        RecordingEmitter::new(),
    )
    .with_initial_cursor("15");

    let outcome = pipeline.execute("fresh")?;
    assert_eq!(outcome.cursor_read, "15");
    assert_eq!(collector.cursors(), vec!["15"]);
    assert_eq!(store.get("fresh")?, "20");
    Ok(())
}

#[test]
fn test_default_initial_cursor_is_empty() -> Result<()> {
    let store = InMemoryStateStore::new();
    let collector = RecordingCollector::new(numbers());
    IncrementalPipeline::new(
        store.clone(),
        collector.clone(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        RecordingEmitter::new(),
    )
    .execute("fresh")?;

    assert_eq!(collector.cursors(), vec![""]);
    assert_eq!(store.get("fresh")?, "5");
    Ok(())
}

#[test]
fn test_run_ids_have_independent_cursors() -> Result<()> {
    let store = InMemoryStateStore::with_entries([("a", "0"), ("b", "10")]);
    let pipeline = IncrementalPipeline::new(
        store.clone(),
        numbers(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        RecordingEmitter::new(),
    );

    pipeline.execute("a")?;
    pipeline.execute("b")?;
    pipeline.execute("a")?;
    assert_eq!(store.get("a")?, "10");
    assert_eq!(store.get("b")?, "15");
    Ok(())
}

#[test]
fn test_cursor_read_failure_stops_before_collect() {
    let store = FailingStateStore::new(InMemoryStateStore::new(), FailOn::Get);
    let collector = RecordingCollector::new(numbers());
    let emitter = RecordingEmitter::new();

    let err = IncrementalPipeline::new(
        store,
        collector.clone(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        emitter.clone(),
    )
    .execute("numbers")
    .unwrap_err();

    assert!(matches!(err, EtlError::CursorRead { .. }));
    assert!(collector.cursors().is_empty());
    assert_eq!(emitter.calls(), 0);
}

#[test]
fn test_cursor_write_failure_is_reported_after_emit() {
    let inner = InMemoryStateStore::with_entries([("numbers", "5")]);
    let store = FailingStateStore::new(inner.clone(), FailOn::Set);
    let emitter = RecordingEmitter::new();

    let err = IncrementalPipeline::new(
        store,
        numbers(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        emitter.clone(),
    )
    .execute("numbers")
    .unwrap_err();

    match &err {
        EtlError::CursorWrite { run_id, cursor, .. } => {
            assert_eq!(run_id, "numbers");
            assert_eq!(cursor, "10");
        }
        other => panic!("expected CursorWrite, got {other:?}"),
    }
    assert!(err.data_was_emitted());
    assert_eq!(emitter.calls(), 1);
    assert_eq!(inner.get("numbers").unwrap(), "5");
}

#[test]
fn test_translation_failure_emits_nothing() {
    let store = InMemoryStateStore::with_entries([("numbers", "0")]);
    let emitter = RecordingEmitter::new();
    let translated = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&translated);

    let err = IncrementalPipeline::new(
        store.clone(),
        numbers(),
        move |n: u32| -> Result<u32> {
            t.fetch_add(1, Ordering::SeqCst);
            if n == 2 {
                bail!("record {n} is malformed");
            }
            Ok(n)
        },
        JsonlEncoder::new(),
        emitter.clone(),
    )
    .execute("numbers")
    .unwrap_err();

    assert!(matches!(err, EtlError::Transform(_)));
    assert!(err.to_string().contains("record 2 is malformed"));
    assert_eq!(translated.load(Ordering::SeqCst), 3);
    assert_eq!(emitter.calls(), 0);
    assert_eq!(store.get("numbers").unwrap(), "0");
}

#[test]
fn test_collect_failure_keeps_cursor() {
    let store = InMemoryStateStore::with_entries([("numbers", "not-a-number")]);
    let err = IncrementalPipeline::new(
        store.clone(),
        numbers(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        RecordingEmitter::new(),
    )
    .execute("numbers")
    .unwrap_err();

    assert!(matches!(err, EtlError::Collect(_)));
    assert_eq!(store.get("numbers").unwrap(), "not-a-number");
}

#[test]
fn test_exhausted_source_emits_empty_payload() -> Result<()> {
    let store = InMemoryStateStore::with_entries([("numbers", "20")]);
    let emitter = RecordingEmitter::new();
    let outcome = IncrementalPipeline::new(
        store.clone(),
        numbers(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        emitter.clone(),
    )
    .with_config(PipelineConfig::named("drained"))
    .execute("numbers")?;

    assert_eq!(outcome.records, 0);
    assert_eq!(emitter.payloads(), vec![Vec::<u8>::new()]);
    assert_eq!(store.get("numbers")?, "20");
    Ok(())
}

#[test]
fn test_shared_store_through_arc() -> Result<()> {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let pipeline = IncrementalPipeline::new(
        Arc::clone(&store),
        numbers(),
        infallible(|n: u32| n),
        JsonlEncoder::new(),
        RecordingEmitter::new(),
    );
    pipeline.execute("x")?;
    assert_eq!(store.get("x")?, "5");
    assert_eq!(pipeline.store().get("x")?, "5");
    Ok(())
}
