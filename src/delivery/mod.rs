//! Packaging of the observer payload into a loader document.

pub mod cli;
pub mod pipeline;
pub mod template;

pub use cli::BuildArgs;
pub use pipeline::{build_document, write_document};
pub use template::{escape_html, render, OBSERVER_SCRIPT_SLOT};
