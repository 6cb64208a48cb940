use pagewatch::host::{Document, MutationKind};
use pagewatch::observer::{MutationQuery, MutationSequencer};

fn sequences(events: &[pagewatch::observer::MutationEvent]) -> Vec<u64> {
    events.iter().map(|event| event.sequence).collect()
}

#[test]
fn test_two_batches_are_sequenced_in_delivery_order() {
    let document = Document::new();
    let sequencer = MutationSequencer::arm(&document);
    let root = document.root();
    let div = document.create_element("div");
    let text = document.create_text("a");

    root.append_child(&div).unwrap();
    div.set_attribute("id", "main").unwrap();
    assert!(sequencer.is_empty(), "Nothing is sequenced before the checkpoint");
    assert_eq!(document.deliver(), 2);

    div.append_child(&text).unwrap();
    text.set_text("b").unwrap();
    div.remove_attribute("id").unwrap();
    assert_eq!(document.deliver(), 3);

    let all = sequencer.query(&MutationQuery::all());
    assert_eq!(sequences(&all), vec![0, 1, 2, 3, 4]);
    let kinds: Vec<MutationKind> = all.iter().map(|event| event.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MutationKind::ChildList,
            MutationKind::Attributes,
            MutationKind::ChildList,
            MutationKind::CharacterData,
            MutationKind::Attributes,
        ]
    );
    assert_eq!(all[0].added, vec![div.id()]);
    assert_eq!(all[3].old_value.as_deref(), Some("a"));
    assert_eq!(all[4].attribute_name.as_deref(), Some("id"));
    assert_eq!(all[0].timestamp, all[1].timestamp, "A batch shares one timestamp");
}

#[test]
fn test_node_query_returns_the_subset_that_touched_it() {
    let document = Document::new();
    let sequencer = MutationSequencer::arm(&document);
    let root = document.root();
    let div = document.create_element("div");
    let text = document.create_text("a");

    root.append_child(&div).unwrap();
    div.set_attribute("id", "main").unwrap();
    document.deliver();
    div.append_child(&text).unwrap();
    text.set_text("b").unwrap();
    div.remove_attribute("id").unwrap();
    document.deliver();

    assert_eq!(sequences(&sequencer.query(&MutationQuery::node(&div))), vec![0, 1, 2, 4]);
    assert_eq!(sequences(&sequencer.query(&MutationQuery::node(&text))), vec![2, 3]);
    assert_eq!(sequences(&sequencer.query(&MutationQuery::node(&root))), vec![0]);
    assert_eq!(
        sequences(&sequencer.query(&MutationQuery::node(&root).with_descendants())),
        vec![0, 1, 2, 3, 4]
    );
}

#[test]
fn test_descendant_query_follows_the_current_tree() {
    let document = Document::new();
    let sequencer = MutationSequencer::arm(&document);
    let root = document.root();
    let list = document.create_element("ul");
    let item = document.create_element("li");
    root.append_child(&list).unwrap();
    list.append_child(&item).unwrap();
    item.set_attribute("class", "active").unwrap();
    document.deliver();

    assert_eq!(sequences(&sequencer.query(&MutationQuery::node(&list).with_descendants())), vec![0, 1, 2]);

    list.remove_child(&item).unwrap();
    document.deliver();

    assert_eq!(
        sequences(&sequencer.query(&MutationQuery::node(&list).with_descendants())),
        vec![0, 1, 3],
        "A detached node no longer counts as a descendant"
    );
    assert_eq!(sequences(&sequencer.query(&MutationQuery::node(&item))), vec![1, 2, 3]);
}

#[test]
fn test_descriptions_are_taken_when_the_batch_is_handled() {
    let document = Document::new();
    let sequencer = MutationSequencer::arm(&document);
    let link = document.create_element("a");
    let label = document.create_text("Home");
    document.root().append_child(&link).unwrap();
    link.append_child(&label).unwrap();
    link.set_attribute("href", "/home").unwrap();
    label.set_text("Start").unwrap();
    document.deliver();

    let all = sequencer.query(&MutationQuery::all());
    assert_eq!(all[0].description, "<html>");
    assert_eq!(all[1].description, "<a href=\"/home\">");
    assert_eq!(all[3].description, "textNode: \"Start\"");
}

#[test]
fn test_index_does_not_keep_dropped_nodes() {
    let document = Document::new();
    let sequencer = MutationSequencer::arm(&document);
    let root = document.root();
    let banner = document.create_element("div");
    root.append_child(&banner).unwrap();
    root.remove_child(&banner).unwrap();
    document.deliver();
    assert_eq!(sequencer.indexed_nodes(), 2);

    drop(banner);
    root.set_attribute("lang", "en").unwrap();
    document.deliver();

    assert_eq!(sequencer.indexed_nodes(), 1, "Dropped node's entry must be pruned");
    assert_eq!(sequencer.len(), 3, "Pruning never removes log events");
}

#[test]
fn test_dropping_the_sequencer_unsubscribes_it() {
    let document = Document::new();
    let sequencer = MutationSequencer::arm(&document);
    drop(sequencer);

    document.root().set_attribute("dir", "rtl").unwrap();
    assert_eq!(document.deliver(), 1);
}

#[test]
fn test_event_serialises_without_empty_optionals() {
    let document = Document::new();
    let sequencer = MutationSequencer::arm(&document);
    document.root().append_child(&document.create_element("p")).unwrap();
    document.deliver();

    let json = serde_json::to_value(&sequencer.query(&MutationQuery::all())[0]).unwrap();
    assert_eq!(json["kind"], "childList");
    assert_eq!(json["sequence"], 0);
    assert!(json.get("attributeName").is_none());
    assert_eq!(json["added"].as_array().map(Vec::len), Some(1));
}
