// Library root
// -----------
// This crate exposes the upload machinery behind the `papra-share` CLI.
// The binary (`main.rs`) only parses arguments and calls into `cli`.
//
// Module responsibilities:
// - `api`: HTTP client for the Papra documents endpoint.
// - `session`: the per-share state machine (sweep, check settings,
//   stage and upload each file in order).
// - `cache`: staged temp files and the janitor for crashed runs.
// - `share`: turns arguments into named byte sources.
// - `settings` / `store`: the four connection settings on top of an
//   encrypted key-value store with a plain fallback.
// - `ui` / `cli`: prompts, progress and argument parsing.
pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod session;
pub mod settings;
pub mod share;
pub mod store;
pub mod ui;

pub use error::{ShareError, StoreError};
