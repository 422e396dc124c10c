//! Targets used to group trace output.

/// Command resolution and execution.
pub const COMMANDS: &str = "commands";
/// Tab completion.
pub const COMPLETION: &str = "completion";
/// Keystroke handling in the line reader.
pub const INPUT: &str = "input";
/// Child process bookkeeping.
pub const JOBS: &str = "jobs";
/// Line parsing.
pub const PARSE: &str = "parse";
