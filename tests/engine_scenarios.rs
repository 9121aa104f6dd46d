// tests/engine_scenarios.rs

mod common;
use crate::common::init_tracing;
use crate::common::recorder::Recorder;

use std::error::Error;
use std::rc::Rc;

use triggerdag::config::{EngineConfig, UnresolvedHandlerPolicy};
use triggerdag::engine::{
    Engine, EventRef, Firing, HandlerRegistry, Outcome, Payload, Registration, Scope,
};
use triggerdag::errors::TriggerdagError;

type TestResult = Result<(), Box<dyn Error>>;

fn engine(registrations: Vec<Registration<i64>>) -> Engine<i64> {
    Engine::new(None, registrations).expect("engine should build")
}

#[test]
fn sum_trigger_resolves_with_sum_of_signals() -> TestResult {
    init_tracing();

    let mut e = engine(vec![Registration::new(
        "a,b",
        EventRef::callable(|_, p: &Payload<i64>, _| {
            let a = p.signal("a").copied().unwrap_or(0);
            let b = p.signal("b").copied().unwrap_or(0);
            Ok(Outcome::resolved(a + b))
        }),
    )
    .named("sum")]);

    e.signal("a", Some(2), false).signal("b", Some(3), false);
    assert!(e.has_pending_run());
    assert!(!e.is_resolved("sum"));

    let passes = e.run_until_idle()?;
    assert_eq!(passes, 1);
    assert_eq!(e.dependency_value("sum"), Some(&5));
    assert_eq!(e.state("sum"), Some(true));
    Ok(())
}

#[test]
fn required_signals_fire_exactly_once_per_round() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![Registration::new("a,b", rec.done()).named("t")]);

    e.signal("a", Some(1), false);
    assert_eq!(e.run_until_idle()?, 0);
    assert_eq!(rec.count("t"), 0);

    e.signal("b", Some(2), false);
    e.run_until_idle()?;
    assert_eq!(rec.count("t"), 1);
    assert_eq!(e.trigger("t").unwrap().wait(), Some(2));

    // Only one of the two arrives again: no second firing.
    e.signal("a", Some(3), false);
    e.run_until_idle()?;
    assert_eq!(rec.count("t"), 1);

    e.signal("b", Some(4), false);
    e.run_until_idle()?;
    assert_eq!(rec.count("t"), 2);
    assert_eq!(rec.calls()[1].signal("a"), Some(3));
    assert_eq!(rec.calls()[1].signal("b"), Some(4));
    Ok(())
}

#[test]
fn optional_only_trigger_fires_iff_an_optional_signal_arrived() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![Registration::new("*p,*q", rec.done()).named("opt")]);

    e.set_data("p", 10);
    assert!(!e.has_pending_run());

    e.signal("q", Some(1), false);
    e.run_until_idle()?;
    assert_eq!(rec.count("opt"), 1);

    let call = &rec.calls()[0];
    assert_eq!(call.changed.get("q"), Some(&true));
    assert_eq!(call.changed.get("p"), Some(&false));
    assert_eq!(call.signal("p"), Some(10));

    // Nothing new arrived: nothing fires.
    e.resolve("unrelated", None, false);
    e.run_until_idle()?;
    assert_eq!(rec.count("opt"), 1);

    e.signal("p", Some(11), false);
    e.run_until_idle()?;
    assert_eq!(rec.count("opt"), 2);
    Ok(())
}

#[test]
fn changed_map_separates_fresh_and_stale_fields() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![Registration::new("a,*o", rec.done()).named("t")]);

    e.signal("o", Some(1), false);
    assert!(!e.has_pending_run());
    e.signal("a", Some(2), false);
    e.run_until_idle()?;

    e.signal("a", Some(3), false);
    e.run_until_idle()?;

    let calls = rec.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].changed.get("o"), Some(&true));
    assert_eq!(calls[1].changed.get("a"), Some(&true));
    assert_eq!(calls[1].changed.get("o"), Some(&false));
    assert_eq!(calls[1].signal("o"), Some(1));
    Ok(())
}

#[test]
fn dependency_fires_first_and_publishes_its_value() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new("go,@B", rec.done()).named("A"),
        Registration::new("go", rec.with_outcome(|_| Outcome::resolved(42))).named("B"),
    ]);
    assert_eq!(e.queue(), ["B".to_string(), "A".to_string()]);

    e.signal("go", Some(1), false);
    let passes = e.run_until_idle()?;

    assert_eq!(passes, 1);
    assert_eq!(rec.fired(), vec!["B", "A"]);
    assert_eq!(rec.calls()[1].dependency("B"), Some(42));
    Ok(())
}

#[test]
fn rejected_dependency_blocks_until_resolved_elsewhere() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new("go,@B", rec.done()).named("A"),
        Registration::new("go", rec.hold()).named("B"),
    ]);

    e.signal("go", Some(1), false);
    e.run_until_idle()?;
    assert_eq!(rec.fired(), vec!["B"]);
    assert_eq!(e.state("B"), Some(false));

    e.resolve("B", Some(7), false);
    e.run_until_idle()?;
    assert_eq!(rec.fired(), vec!["B", "A"]);
    assert_eq!(rec.calls()[1].dependency("B"), Some(7));
    Ok(())
}

#[test]
fn mutual_dependency_does_not_crash_and_stays_inert() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new("s,@Y", rec.done()).named("X"),
        Registration::new("s,@X", rec.done()).named("Y"),
    ]);

    assert_eq!(e.queue().len(), 2);
    assert!(e.queue().contains(&"X".to_string()));
    assert!(e.queue().contains(&"Y".to_string()));
    assert_eq!(e.cycles(), [vec!["X".to_string(), "Y".to_string()]]);

    e.signal("s", Some(1), false);
    e.run_until_idle()?;
    e.signal("s", Some(2), false);
    e.run_until_idle()?;
    assert!(rec.fired().is_empty());
    Ok(())
}

#[test]
fn synchronous_burst_coalesces_into_one_pass() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new("x,y,z", rec.done()).named("xyz"),
        Registration::new("x", rec.done()).named("only_x"),
    ]);

    e.signal("x", Some(1), false);
    e.signal("y", Some(2), false);
    e.signal("z", Some(3), false);

    assert_eq!(e.run_until_idle()?, 1);
    assert_eq!(rec.count("xyz"), 1);
    assert_eq!(rec.count("only_x"), 1);

    let call = rec.calls().into_iter().find(|c| c.trigger == "xyz").unwrap();
    assert_eq!(call.signal("x"), Some(1));
    assert_eq!(call.signal("y"), Some(2));
    assert_eq!(call.signal("z"), Some(3));
    Ok(())
}

fn reset_fixture(rec: &Recorder) -> Vec<Registration<i64>> {
    vec![
        Registration::new("a,*o,@gate", rec.done()).named("main"),
        Registration::new("b", rec.with_outcome(|p| Outcome::resolved(p.signal("b").copied().unwrap_or(0))))
            .named("gate")
            .with_state(true),
    ]
}

fn drive(e: &mut Engine<i64>) -> Result<(), TriggerdagError> {
    e.signal("a", Some(1), false);
    e.run_until_idle()?;
    e.signal("b", Some(2), false);
    e.signal("o", Some(3), false);
    e.run_until_idle()?;
    Ok(())
}

#[test]
fn reset_reproduces_fresh_engine_behaviour() -> TestResult {
    init_tracing();

    let fresh_rec = Recorder::new();
    let mut fresh = engine(reset_fixture(&fresh_rec));
    drive(&mut fresh)?;

    let rec = Recorder::new();
    let mut e = engine(reset_fixture(&rec));
    drive(&mut e)?;
    e.signal("a", Some(99), false);
    e.reset();
    rec.clear();
    drive(&mut e)?;

    assert_eq!(rec.calls(), fresh_rec.calls());
    assert!(!rec.calls().is_empty());
    Ok(())
}

#[test]
fn earlier_queue_entry_waits_for_the_follow_up_pass() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let calls = rec.clone();
    let mut e = engine(vec![
        Registration::new("next", rec.done()).named("second"),
        Registration::new(
            "go",
            EventRef::callable(move |engine: &mut Engine<i64>, _, _| {
                engine.signal("next", Some(7), false);
                Ok(Outcome::done())
            }),
        )
        .named("first"),
    ]);
    assert_eq!(e.queue(), ["second".to_string(), "first".to_string()]);

    e.signal("go", None, false);
    let first_pass = e.run_pending()?;
    assert_eq!(first_pass.names(), vec!["first"]);
    assert!(e.has_pending_run());
    assert_eq!(calls.count("second"), 0);

    let second_pass = e.run_pending()?;
    assert_eq!(second_pass.names(), vec!["second"]);
    assert_eq!(calls.calls()[0].signal("next"), Some(7));
    Ok(())
}

#[test]
fn registering_during_a_pass_does_not_revisit_fired_triggers() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let calls = rec.clone();
    let mut e = engine(vec![
        Registration::new(
            "b,@A",
            EventRef::callable(move |engine: &mut Engine<i64>, _, _| {
                engine.register(Registration::new("z", calls.done()).named("C"), false)?;
                engine.signal("b", Some(2), false);
                Ok(Outcome::done())
            }),
        )
        .named("B"),
        Registration::new("a", rec.done()).named("A"),
    ]);
    assert_eq!(e.queue(), ["A".to_string(), "B".to_string()]);

    e.signal("a", Some(1), false).signal("b", Some(1), false);
    let report = e.run_pending()?;

    assert_eq!(report.names(), vec!["A", "B"]);
    assert_eq!(e.queue().len(), 3);
    assert!(e.queue().contains(&"C".to_string()));
    assert!(e.has_pending_run());

    // B was re-signalled by its own handler, so it fires again next pass.
    let next = e.run_pending()?;
    assert_eq!(next.names(), vec!["B"]);
    Ok(())
}

#[test]
fn handler_error_aborts_the_rest_of_the_pass() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new(
            "go",
            EventRef::callable(|_, _, _| Err(anyhow::anyhow!("boom"))),
        )
        .named("broken"),
        Registration::new("go", rec.done()).named("after"),
    ]);

    e.signal("go", Some(1), false);
    match e.run_pending() {
        Err(TriggerdagError::Handler { trigger, source }) => {
            assert_eq!(trigger, "broken");
            assert!(source.to_string().contains("boom"));
        }
        other => panic!("expected handler error, got {other:?}"),
    }

    assert!(rec.fired().is_empty());
    assert_eq!(e.state("broken"), Some(false));
    assert!(!e.has_pending_run());

    // The untouched trigger is still armed and fires on the next pass.
    e.resolve("unrelated", None, false);
    e.run_pending()?;
    assert_eq!(rec.fired(), vec!["after"]);
    Ok(())
}

#[test]
fn unnamed_registrations_get_smallest_free_integer_names() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new("a", rec.done()),
        Registration::new("a", rec.done()).named("1"),
        Registration::new("a", rec.done()),
    ]);

    let mut names: Vec<String> = e.queue().to_vec();
    names.sort();
    assert_eq!(names, vec!["0", "1", "2"]);

    e.register(Registration::new("b", rec.done()), false)?;
    assert!(e.trigger("3").is_some());
    Ok(())
}

#[test]
fn reregistering_a_name_replaces_the_trigger() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![Registration::new("a", rec.done()).named("t")]);

    e.register(Registration::new("b", rec.done()).named("t"), false)?;
    assert_eq!(e.len(), 1);
    assert_eq!(e.queue(), ["t".to_string()]);

    e.signal("a", Some(1), false);
    assert!(!e.has_pending_run());
    e.signal("b", Some(1), false);
    e.run_until_idle()?;
    assert_eq!(rec.fired(), vec!["t"]);
    Ok(())
}

#[test]
fn external_dependency_is_satisfied_by_resolve() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![Registration::new("a,@ext", rec.done()).named("t")]);

    e.signal("a", Some(1), false);
    e.run_until_idle()?;
    assert!(rec.fired().is_empty());

    e.resolve("ext", Some(10), false);
    e.run_until_idle()?;
    assert_eq!(rec.fired(), vec!["t"]);
    assert_eq!(rec.calls()[0].dependency("ext"), Some(10));
    Ok(())
}

#[test]
fn transitive_dependencies_gate_firing() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new("c,@B", rec.done()).named("C"),
        Registration::new("b,@ext", rec.done()).named("B").with_state(true),
    ]);
    assert_eq!(e.trigger("C").unwrap().depends(), ["B".to_string(), "ext".to_string()]);
    assert_eq!(e.trigger("C").unwrap().declared_depends(), ["B".to_string()]);

    e.signal("c", Some(1), false);
    e.run_until_idle()?;
    assert!(rec.fired().is_empty());

    e.resolve("ext", Some(5), false);
    e.run_until_idle()?;
    assert_eq!(rec.fired(), vec!["C"]);
    assert_eq!(rec.calls()[0].dependency("ext"), Some(5));
    Ok(())
}

#[test]
fn unresolved_handler_is_stored_inert_by_default() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new("a", EventRef::method("missing")).named("ghost"),
        Registration::new("a,@ghost", rec.done()).named("dependent"),
    ]);

    assert!(!e.trigger("ghost").unwrap().has_handler());
    assert_eq!(e.queue(), ["ghost".to_string(), "dependent".to_string()]);

    e.signal("a", Some(1), false);
    let report = e.run_pending()?;
    assert!(report.is_empty());
    assert!(!e.is_resolved("ghost"));

    e.resolve("ghost", None, false);
    e.run_until_idle()?;
    assert_eq!(rec.fired(), vec!["dependent"]);
    Ok(())
}

#[test]
fn unresolved_handler_can_be_rejected_by_policy() {
    init_tracing();
    let config = EngineConfig {
        unresolved_handler: UnresolvedHandlerPolicy::Reject,
        ..EngineConfig::default()
    };

    let result = Engine::<i64>::with_config(
        config,
        None,
        vec![Registration::new("a", EventRef::method("missing")).named("ghost")],
    );

    match result {
        Err(TriggerdagError::UnresolvedHandler { trigger, reference }) => {
            assert_eq!(trigger, "ghost");
            assert_eq!(reference, "missing");
        }
        other => panic!("expected UnresolvedHandler, got {other:?}"),
    }
}

#[test]
fn method_names_resolve_on_the_default_scope() -> TestResult {
    init_tracing();
    let math: Rc<dyn Scope<i64>> = Rc::new(HandlerRegistry::<i64>::new("math").with_handler(
        "double",
        |_, p: &Payload<i64>, _| Ok(Outcome::resolved(p.signal("n").copied().unwrap_or(0) * 2)),
    ));
    let contexts = Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = Rc::clone(&contexts);
    let other: Rc<dyn Scope<i64>> = Rc::new(HandlerRegistry::<i64>::new("other").with_handler(
        "note",
        move |_, _, firing: &Firing| {
            seen.borrow_mut().push(firing.context.clone());
            Ok(Outcome::done())
        },
    ));

    let mut e = Engine::new(
        Some(math),
        vec![
            Registration::new("n", EventRef::method("double")).named("d"),
            Registration::new("n", EventRef::Scoped(Rc::clone(&other), "note".to_string()))
                .named("noted"),
        ],
    )?;

    e.signal("n", Some(4), false);
    e.run_until_idle()?;
    assert_eq!(e.dependency_value("d"), Some(&8));
    assert_eq!(*contexts.borrow(), vec![Some("other".to_string())]);
    assert_eq!(e.trigger("noted").unwrap().context(), Some("other"));
    Ok(())
}

#[test]
fn set_scope_affects_only_later_registrations() -> TestResult {
    init_tracing();
    let first: Rc<dyn Scope<i64>> = Rc::new(
        HandlerRegistry::<i64>::new("first").with_handler("h", |_, _, _| Ok(Outcome::resolved(1))),
    );
    let second: Rc<dyn Scope<i64>> = Rc::new(
        HandlerRegistry::<i64>::new("second").with_handler("h", |_, _, _| Ok(Outcome::resolved(2))),
    );

    let mut e = Engine::new(
        Some(first),
        vec![Registration::new("s", EventRef::method("h")).named("old")],
    )?;
    e.set_scope(Some(second));
    e.register(Registration::new("s", EventRef::method("h")).named("new"), false)?;

    e.signal("s", None, false);
    e.run_until_idle()?;
    assert_eq!(e.dependency_value("old"), Some(&1));
    assert_eq!(e.dependency_value("new"), Some(&2));

    e.set_scope(None);
    assert_eq!(e.scope().label(), "default");
    Ok(())
}

#[test]
fn runaway_handler_chain_hits_the_pass_limit() {
    init_tracing();
    let config = EngineConfig {
        max_passes: 5,
        ..EngineConfig::default()
    };
    let mut e = Engine::<i64>::with_config(
        config,
        None,
        vec![
            Registration::new(
                "*tick",
                EventRef::callable(|engine: &mut Engine<i64>, _, _| {
                    engine.signal("tick", None, false);
                    Ok(Outcome::done())
                }),
            )
            .named("loop"),
        ],
    )
    .expect("engine should build");

    e.signal("tick", Some(0), false);
    match e.run_until_idle() {
        Err(TriggerdagError::PassLimitExceeded(passes)) => assert_eq!(passes, 5),
        other => panic!("expected PassLimitExceeded, got {other:?}"),
    }
}

#[test]
fn run_pending_inside_a_handler_does_not_nest() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![
        Registration::new(
            "go",
            EventRef::callable(|engine: &mut Engine<i64>, _, _| {
                engine.signal("more", Some(1), false);
                let nested = engine.run_pending()?;
                assert!(nested.is_empty());
                Ok(Outcome::done())
            }),
        )
        .named("outer"),
        Registration::new("more", rec.done()).named("inner"),
    ]);

    e.signal("go", None, false);
    e.run_until_idle()?;
    assert_eq!(rec.fired(), vec!["inner"]);
    Ok(())
}

#[test]
fn dependency_only_trigger_never_fires() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let mut e = engine(vec![Registration::new("@up", rec.done()).named("t")]);

    e.resolve("up", Some(1), false);
    e.run_until_idle()?;
    assert!(rec.fired().is_empty());
    assert_eq!(e.trigger("t").unwrap().wait(), None);
    Ok(())
}

#[test]
fn invalid_signal_list_is_a_registration_error() {
    init_tracing();
    let rec = Recorder::new();
    let result = Engine::new(None, vec![Registration::new("a,,b", rec.done()).named("bad")]);
    assert!(matches!(
        result,
        Err(TriggerdagError::InvalidSignalList { ref trigger, .. }) if trigger == "bad"
    ));
}
