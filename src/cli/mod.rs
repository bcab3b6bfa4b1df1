//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `index` | Record an image's libraries in the index |
//! | `resolve` | Find the image that contains all given libraries |
//! | `lookup` | List the records stored for one digest |
//! | `tags` | Show an image's tag history |
//! | `status` | Show where the index lives and how large it is |
//! | `config` | Show configuration location and values |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Logging
//!
//! Diagnostics go to stderr. Use `--verbose` (`-v`) for debug output,
//! `--quiet` (`-q`) for warnings only, or set `RUST_LOG`:
//! ```bash
//! preplib --verbose resolve ./libc.so.6 ./ld-linux-x86-64.so.2
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod config_cmd;
mod index_cmd;
mod lookup;
mod output;
mod resolve_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
