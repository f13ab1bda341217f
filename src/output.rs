//! Shared output formatting for ocwatch CLI commands.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "ocwatch.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Plain-text report: a header line, then optional bulleted blocks.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    blocks: [Vec<String>; 3],
}

#[derive(Debug, Clone, Copy)]
enum Block {
    Details,
    Warnings,
    NextSteps,
}

impl Block {
    const ORDER: [Block; 3] = [Block::Details, Block::Warnings, Block::NextSteps];

    fn title(self) -> &'static str {
        match self {
            Block::Details => "Details",
            Block::Warnings => "Warnings",
            Block::NextSteps => "Next steps",
        }
    }
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            blocks: Default::default(),
        }
    }

    /// Key/value line under `Summary:`; an empty value prints the key alone.
    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.push(Block::Details, value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.push(Block::Warnings, value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.push(Block::NextSteps, value.into());
    }

    fn push(&mut self, block: Block, line: String) {
        self.blocks[block as usize].push(line);
    }

    fn block(&self, block: Block) -> &[String] {
        &self.blocks[block as usize]
    }
}

impl fmt::Display for HumanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;

        if !self.summary.is_empty() {
            f.write_str("\n\nSummary:")?;
            for (key, value) in &self.summary {
                match value.as_str() {
                    "" => write!(f, "\n- {key}")?,
                    value => write!(f, "\n- {key}: {value}")?,
                }
            }
        }

        for block in Block::ORDER {
            let lines = self.block(block);
            if lines.is_empty() {
                continue;
            }
            write!(f, "\n\n{}:", block.title())?;
            for line in lines {
                write!(f, "\n- {line}")?;
            }
        }
        Ok(())
    }
}

/// Machine-readable wrapper shared by every command's `--json` output.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    #[serde(flatten)]
    outcome: Outcome<'a, T>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Outcome<'a, T: Serialize> {
    Success { data: &'a T },
    Error { error: ErrorBody },
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl<T: Serialize> Envelope<'_, T> {
    fn print(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let none: &[String] = &[];
        return Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            outcome: Outcome::Success { data },
            warnings: human.map_or(none, |h| h.block(Block::Warnings)),
            next_steps: human.map_or(none, |h| h.block(Block::NextSteps)),
        }
        .print();
    }

    if let Some(human) = human.filter(|_| !options.quiet) {
        println!("{human}");
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        return Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command,
            outcome: Outcome::Error {
                error: ErrorBody {
                    message: err.to_string(),
                    code: err.exit_code(),
                    kind: error_kind(err),
                    details: err.details(),
                },
            },
            warnings: &[],
            next_steps: &next_steps,
        }
        .print();
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    output.to_string()
}

/// First positional argument, or `ocwatch` when there is none.
///
/// Used to label errors raised before (or by) argument parsing.
pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl Iterator<Item = String>) -> String {
    let mut args = args;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "ocwatch".to_string()
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "blocked",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::InvalidConfig(_) | Error::TomlParse(_) => {
            vec!["fix ocwatch.toml then retry".to_string()]
        }
        Error::MissingCredential(name) => vec![format!("export {name}=<value> then retry")],
        Error::UserNotFound(_) => vec!["ocwatch run".to_string()],
        Error::LockFailed(_) => vec!["wait for the running poll to finish".to_string()],
        Error::PartialPersist(_) => {
            vec!["check the error log; the next run rewrites the stores".to_string()]
        }
        _ => Vec::new(),
    }
}
