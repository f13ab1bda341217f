//! ocwatch - faction activity and crime compliance library
//!
//! Turns periodic polls of a Torn faction into two derived records: a
//! continuous activity timeline per member, and a naughty list of organized
//! crimes that were held up by participants who were not available.
//!
//! # Core Concepts
//!
//! - **Status tokens**: one canonical string per observed member status
//! - **Timelines**: contiguous activity intervals per member
//! - **Roster actions**: `joined`/`left` events from successive slot snapshots
//! - **Compliance scan**: minute-stepped replay of participant timelines over
//!   a crime's pending window
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `ocwatch.toml`
//! - `error`: Error types and result aliases
//! - `status`: Status normalization
//! - `timeline`: Activity timeline folding
//! - `roster`: Slot occupancy diffing
//! - `crimes`: Crime store updates
//! - `naughty`: Compliance scanning and the naughty list
//! - `torn`: Faction API client
//! - `storage`: Document stores (local files)
//! - `github`: Document stores (GitHub contents API)
//! - `pipeline`: One ordered batch run
//! - `diagnostics`: Append-only error log
//! - `lock`: Run lock and atomic writes

pub mod cli;
pub mod config;
pub mod crimes;
pub mod diagnostics;
pub mod error;
pub mod github;
pub mod lock;
pub mod naughty;
pub mod output;
pub mod pipeline;
pub mod roster;
pub mod status;
pub mod storage;
pub mod timeline;
pub mod torn;

pub use error::{Error, Result};
