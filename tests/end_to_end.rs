use pagewatch::host::{Document, ObjectRef, Reflect, Value};
use pagewatch::observer::{AssignmentFilter, MutationQuery};
use pagewatch::{HostContext, ObserverConfig, PageObserver};

/// `{ a: 1, b: { c: 2 } }`
fn page() -> (ObjectRef, ObjectRef, Document) {
    let global = ObjectRef::new();
    let inner = ObjectRef::new();
    inner.define_value("c", 2).unwrap();
    global.define_value("a", 1).unwrap();
    global.define_value("b", &inner).unwrap();
    (global, inner, Document::new())
}

#[test]
fn test_nested_graph_writes_are_all_observed() {
    let (global, inner, document) = page();
    let observer = PageObserver::attach(&HostContext::new(global.clone(), document));

    global.set("a", Value::from(5)).unwrap();
    let b = global.get("b").unwrap();
    b.as_object().unwrap().set("c", Value::from(3)).unwrap();

    let events = observer.assignments();
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].target, events[0].field.as_str()), (global.id(), "a"));
    assert_eq!((events[1].target, events[1].field.as_str()), (inner.id(), "c"));
    assert_eq!(global.get("a").unwrap(), Value::from(5));
    assert_eq!(inner.get("c").unwrap(), Value::from(3));
    assert_eq!(observer.property_value(&global, "a"), Some(Value::from(5)));
    assert_eq!(observer.property_value(&global, "missing"), None);
}

#[test]
fn test_attach_walks_global_then_prototypes() {
    let (global, _inner, document) = page();
    let proto = ObjectRef::new();
    proto.define_value("method", Value::Null).unwrap();
    let context = HostContext::new(global.clone(), document).with_prototype(proto.clone());

    let observer = PageObserver::attach(&context);

    assert_eq!(observer.initial_walk().objects_visited, 3);
    assert!(observer.is_instrumented(&proto));
    let instance = ObjectRef::with_prototype(&proto);
    instance.set("method", Value::from("patched")).unwrap();
    assert_eq!(observer.assignments_matching(&AssignmentFilter::target(&proto)).len(), 1);
}

#[test]
fn test_mutations_and_assignments_share_one_observer() {
    let (global, _inner, document) = page();
    let observer = PageObserver::attach(&HostContext::new(global.clone(), document.clone()));

    let root = document.root();
    let script = document.create_element("script");
    root.append_child(&script).unwrap();
    script.set_attribute("src", "https://cdn.example/x.js").unwrap();
    document.deliver();
    global.set("a", Value::from(2)).unwrap();

    assert_eq!(observer.mutation_sequence(&MutationQuery::all()).len(), 2);
    assert_eq!(observer.mutation_sequence(&MutationQuery::node(&script)).len(), 2);

    let summary = observer.summary();
    assert_eq!(summary.total_assignments, 1);
    assert_eq!(summary.total_mutations, 2);
    assert_eq!(summary.assignments_to(global.id()), 1);
    assert_eq!(summary.assignments_by_field.get("a"), Some(&1));
    assert_eq!(summary.mutations_of(script.id()), 2);
    assert_eq!(summary.mutations_of(root.id()), 1);
}

#[test]
fn test_report_json_contains_everything_collected() {
    let (global, _inner, document) = page();
    let observer = PageObserver::attach(&HostContext::new(global.clone(), document.clone()));
    global.set("a", Value::from("x")).unwrap();
    document.root().set_attribute("class", "dark").unwrap();
    document.deliver();

    let report: serde_json::Value = serde_json::from_str(&observer.report_json().unwrap()).unwrap();

    assert_eq!(report["summary"]["totalAssignments"], 1);
    assert_eq!(report["summary"]["totalMutations"], 1);
    assert_eq!(report["assignments"][0]["newValue"], "x");
    assert_eq!(report["mutations"][0]["attributeName"], "class");
    assert_eq!(report["initialWalk"]["objectsVisited"], 2);
    assert_eq!(report["suppressedWrites"], 0);
}

#[test]
fn test_custom_config_is_honoured() {
    let (global, inner, document) = page();
    let config = ObserverConfig::default().with_denied_field("b");
    let observer = PageObserver::attach_with_config(&HostContext::new(global.clone(), document), config);

    assert!(global.own_field("b").unwrap().unwrap().is_data());
    inner.set("c", Value::from(9)).unwrap();
    assert_eq!(observer.assignments().len(), 1, "Values of denied fields are still walked");
    assert!(observer.config().field_deny_list.contains(&"b".to_string()));
}

#[test]
fn test_later_roots_can_be_added() {
    let (global, _inner, document) = page();
    let observer = PageObserver::attach(&HostContext::new(global, document));
    let frame = ObjectRef::new();
    frame.define_value("name", "child").unwrap();

    let report = observer.instrument([frame.clone()]);
    frame.set("name", Value::from("renamed")).unwrap();

    assert_eq!(report.fields_hooked, 1);
    assert_eq!(observer.assignments_matching(&AssignmentFilter::field("name")).len(), 1);
}
