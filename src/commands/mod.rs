//! Command handlers module.
//!
//! - `articles.rs`: evaluate, ingest, fingerprint
//! - `admin.rs`: reset, keys, status
//! - `throttle.rs`: crosspost and topics
//! - `completions.rs`: shell completions

mod admin;
mod articles;
mod completions;
mod throttle;

use clap::Subcommand;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

pub use admin::{cmd_keys, cmd_reset, cmd_status};
pub use articles::{cmd_evaluate, cmd_fingerprint, cmd_ingest};
pub use completions::cmd_completions;
pub use throttle::{cmd_crosspost, cmd_topics};

/// Crosspost subcommands.
#[derive(Subcommand)]
pub enum CrosspostAction {
    /// Show whether a relay may go out now.
    Check {
        /// Destination name.
        destination: String,
    },
    /// Record a relay as sent now.
    Mark {
        /// Destination name.
        destination: String,
    },
}

/// Topics subcommands.
#[derive(Subcommand)]
pub enum TopicsAction {
    /// Record a covered topic.
    Record {
        /// Topic label.
        label: String,
    },
    /// Show the pressure of a topic.
    Pressure {
        /// Topic label.
        label: String,
    },
    /// Show the topic distribution over the window.
    Show,
}

/// Reads an input file, or stdin for `-`.
fn read_input(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()).into())
}

/// Prints a value as pretty JSON on stdout.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
