pub mod engine;
pub mod index;
pub mod page;
pub mod recorder;
pub mod sequencer;
pub mod shadow;
pub mod summary;
pub mod time;
pub mod wrapper;

pub use engine::{InterceptionEngine, VisitedSet, WalkReport, UNLABELLED};
pub use page::{HostContext, PageObserver};
pub use recorder::{AssignmentEvent, AssignmentFilter, AssignmentRecorder, EventKind, EventValue, NoiseFilter};
pub use sequencer::{MutationEvent, MutationQuery, MutationSequencer};
pub use shadow::ShadowStore;
pub use summary::{NodeSummary, Summary, TargetSummary};
pub use time::Timestamp;
pub use wrapper::NestedValueWrapper;
