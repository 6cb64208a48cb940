use std::rc::Rc;

use serde::Serialize;
use tracing::info;

use super::engine::{InterceptionEngine, WalkReport};
use super::recorder::{AssignmentEvent, AssignmentFilter, AssignmentRecorder, NoiseFilter};
use super::sequencer::{MutationEvent, MutationQuery, MutationSequencer};
use super::shadow::ShadowStore;
use super::summary::{compute_summary, Summary};
use crate::config::ObserverConfig;
use crate::host::{Document, ObjectRef, Value};

/// The environment an observer attaches to.
#[derive(Clone)]
pub struct HostContext {
    /// Top-level environment object.
    pub global: ObjectRef,
    /// Shared behaviour templates, walked after `global`.
    pub prototypes: Vec<ObjectRef>,
    pub document: Document,
}

impl HostContext {
    pub fn new(global: ObjectRef, document: Document) -> Self {
        Self {
            global,
            prototypes: Vec::new(),
            document,
        }
    }

    #[must_use]
    pub fn with_prototype(mut self, prototype: ObjectRef) -> Self {
        self.prototypes.push(prototype);
        self
    }

    fn roots(&self) -> Vec<ObjectRef> {
        std::iter::once(self.global.clone())
            .chain(self.prototypes.iter().cloned())
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    initial_walk: &'a WalkReport,
    summary: Summary,
    suppressed_writes: u64,
    assignments: Vec<AssignmentEvent>,
    mutations: Vec<MutationEvent>,
}

/// Instrumented environment plus armed mutation sequencer.
///
/// Attaching walks the roots once; from then on writes and tree changes
/// flow into the logs without further calls. Every query is read-only.
pub struct PageObserver {
    config: ObserverConfig,
    recorder: Rc<AssignmentRecorder>,
    engine: InterceptionEngine,
    sequencer: MutationSequencer,
    initial_walk: WalkReport,
}

impl PageObserver {
    pub fn attach(context: &HostContext) -> Self {
        Self::attach_with_config(context, ObserverConfig::default())
    }

    pub fn attach_with_config(context: &HostContext, config: ObserverConfig) -> Self {
        let recorder = Rc::new(
            AssignmentRecorder::new(NoiseFilter::new(config.noise_deny_list.iter().cloned()))
                .with_write_logging(config.log_writes),
        );
        let engine = InterceptionEngine::new(
            Rc::new(ShadowStore::new()),
            Rc::clone(&recorder),
            config.field_deny_list.iter().cloned(),
        )
        .with_late_wrapping(config.wrap_late_values);

        let sequencer = MutationSequencer::arm(&context.document);
        let initial_walk = engine.instrument(context.roots());
        info!(
            roots = 1 + context.prototypes.len(),
            objects = initial_walk.objects_visited,
            "page observer attached"
        );

        Self {
            config,
            recorder,
            engine,
            sequencer,
            initial_walk,
        }
    }

    /// Walk additional roots. Objects already instrumented are skipped.
    pub fn instrument<I>(&self, roots: I) -> WalkReport
    where
        I: IntoIterator<Item = ObjectRef>,
    {
        self.engine.instrument(roots)
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn initial_walk(&self) -> &WalkReport {
        &self.initial_walk
    }

    pub fn is_instrumented(&self, object: &ObjectRef) -> bool {
        self.engine.is_visited(object)
    }

    pub fn assignments(&self) -> Vec<AssignmentEvent> {
        self.recorder.assignments(None)
    }

    pub fn assignments_matching(&self, filter: &AssignmentFilter) -> Vec<AssignmentEvent> {
        self.recorder.assignments(Some(filter))
    }

    pub fn suppressed_writes(&self) -> u64 {
        self.recorder.suppressed()
    }

    pub fn mutation_sequence(&self, query: &MutationQuery) -> Vec<MutationEvent> {
        self.sequencer.query(query)
    }

    pub fn summary(&self) -> Summary {
        compute_summary(
            &self.recorder.assignments(None),
            &self.sequencer.query(&MutationQuery::all()),
        )
    }

    /// Shadowed value of an instrumented data field, read without going
    /// through the field's getter. `None` for fields the observer does not
    /// shadow.
    pub fn property_value(&self, owner: &ObjectRef, field: &str) -> Option<Value> {
        let shadow = self.engine.shadow();
        shadow
            .contains(owner, field)
            .then(|| shadow.get(owner, field))
    }

    /// Everything collected so far, as pretty-printed JSON.
    pub fn report_json(&self) -> serde_json::Result<String> {
        let report = Report {
            initial_walk: &self.initial_walk,
            summary: self.summary(),
            suppressed_writes: self.recorder.suppressed(),
            assignments: self.recorder.assignments(None),
            mutations: self.sequencer.query(&MutationQuery::all()),
        };
        serde_json::to_string_pretty(&report)
    }
}
