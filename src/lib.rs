pub mod config;
pub mod delivery;
pub mod error;
pub mod host;
pub mod observer;

pub use config::ObserverConfig;
pub use error::{HostError, HostResult, RenderError, TreeError};
pub use observer::{HostContext, PageObserver};
