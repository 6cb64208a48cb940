use std::path::PathBuf;

use clap::Parser;

/// Command line of the `pagewatch-build` binary.
#[derive(Debug, Parser)]
#[command(name = "pagewatch-build")]
#[command(about = "Insert the observer payload into a page template", long_about = None)]
pub struct BuildArgs {
    /// Page template containing the observer-script slot
    pub template: PathBuf,

    /// Script inserted verbatim into the slot
    pub payload: PathBuf,

    /// Where to write the document; stdout when omitted
    pub output: Option<PathBuf>,
}
