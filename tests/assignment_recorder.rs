use std::rc::Rc;

use pagewatch::config::{ObserverConfig, CONSOLE_COMPLETION_ORIGIN};
use pagewatch::host::trace::within;
use pagewatch::host::{CallTrace, ObjectRef, Value};
use pagewatch::observer::recorder::ObservedWrite;
use pagewatch::observer::{
    AssignmentFilter, AssignmentRecorder, EventValue, InterceptionEngine, NoiseFilter, ShadowStore,
};

fn setup() -> (InterceptionEngine, Rc<AssignmentRecorder>) {
    let config = ObserverConfig::default();
    let recorder = Rc::new(AssignmentRecorder::new(NoiseFilter::new(config.noise_deny_list.clone())));
    let engine = InterceptionEngine::new(
        Rc::new(ShadowStore::new()),
        Rc::clone(&recorder),
        config.field_deny_list,
    );
    (engine, recorder)
}

#[test]
fn test_console_completion_writes_are_noise() {
    let (engine, recorder) = setup();
    let global = ObjectRef::new();
    global.define_value("a", 1).unwrap();
    engine.instrument([global.clone()]);

    within("InjectedScript.getCompletions (console)", || global.set("a", Value::from(2))).unwrap();

    assert!(recorder.is_empty(), "Console completion writes must not be logged");
    assert_eq!(recorder.suppressed(), 1);
    assert_eq!(global.get("a").unwrap(), Value::from(2), "Noise is dropped from the log, not from the page");
}

#[test]
fn test_write_carries_its_call_context() {
    let (engine, recorder) = setup();
    let global = ObjectRef::new();
    global.define_value("a", 1).unwrap();
    engine.instrument([global.clone()]);

    within("https://ads.example/tag.js:3", || global.set("a", Value::from(2))).unwrap();

    let event = &recorder.assignments(None)[0];
    assert_eq!(event.context.origin(), Some("https://ads.example/tag.js:3"));
    assert_eq!(event.context.to_string(), "at https://ads.example/tag.js:3");
}

#[test]
fn test_sequences_and_timestamps_follow_write_order() {
    let (engine, recorder) = setup();
    let global = ObjectRef::new();
    global.define_value("a", 0).unwrap();
    global.define_value("b", 0).unwrap();
    engine.instrument([global.clone()]);

    for i in 1..=5 {
        let field = if i % 2 == 0 { "a" } else { "b" };
        global.set(field, Value::from(i)).unwrap();
    }

    let events = recorder.assignments(None);
    let sequences: Vec<u64> = events.iter().map(|event| event.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    assert!(events.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
    assert_eq!(events[4].new_value, Value::from(5));
}

#[test]
fn test_filters_select_by_target_and_field() {
    let (engine, recorder) = setup();
    let first = ObjectRef::new();
    let second = ObjectRef::new();
    for object in [&first, &second] {
        object.define_value("x", 0).unwrap();
        object.define_value("y", 0).unwrap();
    }
    engine.instrument([first.clone(), second.clone()]);

    first.set("x", Value::from(1)).unwrap();
    second.set("x", Value::from(2)).unwrap();
    first.set("y", Value::from(3)).unwrap();

    assert_eq!(recorder.assignments(Some(&AssignmentFilter::target(&first))).len(), 2);
    assert_eq!(recorder.assignments(Some(&AssignmentFilter::field("x"))).len(), 2);

    let both = recorder.assignments(Some(&AssignmentFilter::target(&first).with_field("y")));
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].new_value, Value::from(3));
    assert_eq!(recorder.len(), 3, "Querying must not change the log");
}

#[test]
fn test_event_target_is_held_weakly() {
    let recorder = AssignmentRecorder::new(NoiseFilter::default());
    let object = ObjectRef::new();
    recorder.record(ObservedWrite {
        target: &object,
        target_label: "temp",
        field: "f",
        new_value: &Value::from(1),
        old_value: None,
        context: CallTrace::default(),
    });

    assert!(recorder.assignments(None)[0].target().is_some());
    drop(object);
    assert!(recorder.assignments(None)[0].target().is_none());
}

#[test]
fn test_assigned_objects_are_not_kept_alive_by_the_log() {
    let (engine, recorder) = setup();
    let global = ObjectRef::new();
    global.define_value("slot", Value::Null).unwrap();
    engine.instrument([global.clone()]);
    let late = ObjectRef::new();
    let handle = late.downgrade();

    global.set("slot", Value::from(&late)).unwrap();
    assert!(recorder.assignments(None)[0].new_value == Value::from(&late));
    assert_eq!(recorder.assignments(None)[0].new_value.object_id(), Some(late.id()));
    drop(late);
    global.set("slot", Value::Null).unwrap();

    assert!(!handle.is_alive(), "Only the host may keep an assigned object alive");
    let events = recorder.assignments(None);
    assert_eq!(events.len(), 2);
    assert!(events[0].new_value.upgrade().is_none());
    assert_eq!(events[1].old_value.as_ref().and_then(EventValue::object_id), Some(handle.id()));
    assert_eq!(events[1].new_value.upgrade(), Some(Value::Null));
}

#[test]
fn test_empty_noise_origins_are_ignored() {
    let recorder = AssignmentRecorder::new(NoiseFilter::new([""]));
    let object = ObjectRef::new();

    let logged = recorder.record(ObservedWrite {
        target: &object,
        target_label: "page",
        field: "f",
        new_value: &Value::Null,
        old_value: None,
        context: CallTrace::from_frames(["main.js:1"]),
    });

    assert!(logged);
    assert_eq!(recorder.suppressed(), 0);
}

#[test]
fn test_event_serialises_to_camel_case_json() {
    let (engine, recorder) = setup();
    let global = ObjectRef::new();
    global.define_value("a", 1).unwrap();
    engine.instrument([global.clone()]);
    global.set("a", Value::from(2)).unwrap();

    let json = serde_json::to_value(&recorder.assignments(None)[0]).unwrap();
    assert_eq!(json["kind"], "assignment");
    assert_eq!(json["field"], "a");
    assert_eq!(json["newValue"], serde_json::json!(2.0));
    assert_eq!(json["oldValue"], serde_json::json!(1.0));
    assert_eq!(json["target"], serde_json::json!(global.id().0));
    assert!(json.get("targetRef").is_none());
    assert!(json["timestamp"]["millis"].is_number());
}

#[test]
fn test_config_loads_from_partial_json() {
    let config = ObserverConfig::from_json(r#"{ "log_writes": true }"#).unwrap();

    assert!(config.log_writes);
    assert!(config.wrap_late_values);
    assert_eq!(config.noise_deny_list, vec![CONSOLE_COMPLETION_ORIGIN.to_string()]);
    assert!(config.field_deny_list.contains(&"toString".to_string()));

    let custom = ObserverConfig::default()
        .with_denied_field("secret")
        .with_noise_origin("extension://")
        .with_late_wrapping(false);
    assert!(custom.field_deny_list.contains(&"secret".to_string()));
    assert_eq!(custom.noise_deny_list.len(), 2);
    assert!(!custom.wrap_late_values);
    assert!(ObserverConfig::from_json("42").is_err());
}
