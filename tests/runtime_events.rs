// tests/runtime_events.rs

mod common;
use crate::common::recorder::Recorder;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use triggerdag::engine::{Engine, Registration, Runtime, RuntimeEvent};

type TestResult = Result<(), Box<dyn Error>>;

fn signal(name: &str, value: i64) -> RuntimeEvent<i64> {
    RuntimeEvent::Signal {
        name: name.to_string(),
        value: Some(value),
        check_changed: false,
    }
}

fn engine(rec: &Recorder, signals: &str) -> Engine<i64> {
    Engine::new(None, vec![Registration::new(signals, rec.done()).named("t")])
        .expect("engine should build")
}

#[tokio::test]
async fn buffered_burst_is_evaluated_as_one_batch() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let (tx, rx) = mpsc::channel(16);

    for (name, value) in [("a", 1), ("a", 2), ("b", 3), ("a", 4)] {
        tx.send(signal(name, value)).await?;
    }
    tx.send(RuntimeEvent::ShutdownRequested).await?;

    let engine = with_timeout(Runtime::new(engine(&rec, "a,b"), rx).run()).await?;

    assert_eq!(rec.count("t"), 1);
    assert_eq!(rec.calls()[0].signal("a"), Some(4));
    assert_eq!(rec.calls()[0].signal("b"), Some(3));
    assert!(engine.is_resolved("t"));
    Ok(())
}

#[tokio::test]
async fn closing_the_channel_returns_the_engine() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let (tx, rx) = mpsc::channel(4);

    tx.send(signal("a", 1)).await?;
    drop(tx);

    let engine = with_timeout(Runtime::new(engine(&rec, "a,b"), rx).run()).await?;

    assert!(rec.fired().is_empty());
    assert_eq!(engine.get_data("a"), Some(&1));
    assert_eq!(engine.trigger("t").unwrap().wait(), Some(1));
    Ok(())
}

#[tokio::test]
async fn separate_ticks_fire_separately() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let (tx, rx) = mpsc::channel(4);
    let runtime = Runtime::new(engine(&rec, "a"), rx);

    let producer = async move {
        tx.send(signal("a", 1)).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(signal("a", 2)).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(RuntimeEvent::ShutdownRequested).await?;
        Ok::<_, mpsc::error::SendError<RuntimeEvent<i64>>>(())
    };

    let (engine, sent) = with_timeout(async move { tokio::join!(runtime.run(), producer) }).await;
    sent?;
    engine?;

    assert_eq!(rec.count("t"), 2);
    let values: Vec<_> = rec.calls().iter().map(|c| c.signal("a")).collect();
    assert_eq!(values, vec![Some(1), Some(2)]);
    Ok(())
}

#[tokio::test]
async fn clear_in_the_same_tick_cancels_the_firing() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let (tx, rx) = mpsc::channel(8);

    tx.send(signal("a", 1)).await?;
    tx.send(RuntimeEvent::Clear { trigger: None }).await?;
    tx.send(RuntimeEvent::ShutdownRequested).await?;

    let engine = with_timeout(Runtime::new(engine(&rec, "a"), rx).run()).await?;

    assert!(rec.fired().is_empty());
    assert!(!engine.has_pending_run());
    assert_eq!(engine.get_data("a"), Some(&1));
    Ok(())
}

#[tokio::test]
async fn resolve_event_satisfies_an_external_dependency() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let (tx, rx) = mpsc::channel(8);

    tx.send(RuntimeEvent::Resolve {
        trigger: "upstream".to_string(),
        value: Some(10),
    })
    .await?;
    tx.send(signal("a", 1)).await?;
    tx.send(RuntimeEvent::ShutdownRequested).await?;

    let engine = with_timeout(Runtime::new(engine(&rec, "a,@upstream"), rx).run()).await?;

    assert_eq!(rec.fired(), vec!["t"]);
    assert_eq!(rec.calls()[0].dependency("upstream"), Some(10));
    assert!(engine.is_resolved("upstream"));
    Ok(())
}

#[tokio::test]
async fn set_data_and_reject_events_reach_the_engine() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let (tx, rx) = mpsc::channel(8);

    tx.send(RuntimeEvent::SetData {
        name: "b".to_string(),
        value: 5,
    })
    .await?;
    tx.send(RuntimeEvent::Reject {
        trigger: "t".to_string(),
    })
    .await?;
    tx.send(RuntimeEvent::ShutdownRequested).await?;

    let engine = with_timeout(Runtime::new(engine(&rec, "a,b"), rx).run()).await?;

    assert!(rec.fired().is_empty());
    assert_eq!(engine.get_data("b"), Some(&5));
    assert_eq!(engine.state("t"), Some(false));
    Ok(())
}
