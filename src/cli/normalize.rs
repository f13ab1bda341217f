//! ocwatch normalize command implementation

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::status::{RawStatus, StatusNormalizer};

/// Options for the normalize command
pub struct NormalizeOptions {
    pub description: String,
    pub state: String,
    pub details: Option<String>,
    pub revive: String,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct NormalizeReport<'a> {
    description: &'a str,
    state: &'a str,
    token: String,
}

pub fn run(options: NormalizeOptions) -> Result<()> {
    let normalizer = StatusNormalizer::standard()?;
    let raw = RawStatus {
        description: &options.description,
        details: options.details.as_deref(),
        state: &options.state,
        revive_setting: &options.revive,
    };
    let report = NormalizeReport {
        description: &options.description,
        state: &options.state,
        token: normalizer.normalize(&raw),
    };

    let human = HumanOutput::new(report.token.clone());
    emit_success(options.output, "normalize", &report, Some(&human))
}
