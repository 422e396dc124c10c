//! A small interactive command interpreter.
//!
//! A line is read keystroke by keystroke from an uncooked terminal
//! ([`reader`]), with tab completion of command names ([`completion`]),
//! parsed into pipeline stages ([`parser`]) and run as child processes with
//! pipes and redirects ([`eval`]).

pub mod builtin;
pub mod completion;
pub mod eval;
pub mod events;
pub mod global;
pub mod job;
pub mod parser;
pub mod prompt;
pub mod reader;
pub mod search;
pub mod term;
pub mod trace_categories;
pub mod types;
