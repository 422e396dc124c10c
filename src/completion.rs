use std::io::{self, Write};
use std::path::PathBuf;

use crate::parser::COMPLETION_MARKER;
use crate::search::{self, SearchPath};
use crate::trace_categories;
use crate::types::LineBuffer;

/// What a completion attempt did to the line.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
	/// The single match was completed; holds the appended suffix.
	Extended(String),
	/// Several matches were printed and the line was cleared.
	Listed(Vec<String>),
	/// Nothing matched and the line was cleared.
	NoMatches,
	/// The prefix was empty; the directory was listed and the line cleared.
	DirectoryListing(Vec<String>),
}

impl Completion {
	/// Whether the line was cleared and the prompt needs redrawing.
	pub fn cleared_line(&self) -> bool {
		!matches!(self, Completion::Extended(_))
	}
}

pub struct Completer {
	search_path: SearchPath,
	listing_dir: PathBuf,
}

impl Default for Completer {
	fn default() -> Completer {
		Completer::new(SearchPath::Environment)
	}
}

impl Completer {
	pub fn new(search_path: SearchPath) -> Completer {
		Completer { search_path, listing_dir: PathBuf::from(".") }
	}

	/// Directory listed when completing an empty prefix.
	pub fn with_listing_dir(mut self, dir: PathBuf) -> Completer {
		self.listing_dir = dir;
		self
	}

	/// Completes the token in front of the trailing completion marker,
	/// rewriting `line` in place and writing what the user should see to
	/// `out`.
	pub fn complete<W: Write>(&self, line: &mut LineBuffer, out: &mut W) -> io::Result<Completion> {
		let text = line.as_str();
		let head = text.strip_suffix(COMPLETION_MARKER).unwrap_or(text);
		let token_start = head.rfind(char::is_whitespace).map_or(0, |i| i + 1);
		let head_len = head.len();
		let prefix = head[token_start..].to_string();
		tracing::debug!(target: trace_categories::COMPLETION, "completing {:?}", prefix);

		if prefix.is_empty() {
			let entries = match search::sorted_entries(&self.listing_dir) {
				Ok(entries) => entries,
				Err(e) => {
					tracing::warn!(target: trace_categories::COMPLETION, "cannot list {}: {}", self.listing_dir.display(), e);
					vec![]
				},
			};
			writeln!(out)?;
			for entry in &entries {
				writeln!(out, " {}", entry)?;
			}
			line.clear();
			return Ok(Completion::DirectoryListing(entries));
		}

		let mut matches = self.search_path.commands_with_prefix(&prefix);
		let completion = match matches.len() {
			0 => {
				write!(out, "\nNo matches found\n")?;
				line.clear();
				Completion::NoMatches
			},
			1 => {
				let found = matches.remove(0);
				line.truncate(head_len);
				let suffix = line.push_str(&found[prefix.len()..]).to_string();
				write!(out, "{}", suffix)?;
				Completion::Extended(suffix)
			},
			_ => {
				writeln!(out)?;
				for m in &matches {
					writeln!(out, "{}", m)?;
				}
				line.clear();
				Completion::Listed(matches)
			},
		};
		out.flush()?;
		Ok(completion)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Result;
	use assert_fs::prelude::*;
	use pretty_assertions::assert_eq;

	fn fixture(names: &[&str]) -> Result<assert_fs::TempDir> {
		let dir = assert_fs::TempDir::new()?;
		for name in names {
			dir.child(name).touch()?;
		}
		Ok(dir)
	}

	fn line(text: &str) -> LineBuffer {
		let mut buf = LineBuffer::default();
		buf.push_str(text);
		buf
	}

	fn completer(dir: &assert_fs::TempDir) -> Completer {
		Completer::new(SearchPath::Fixed(vec![dir.path().to_path_buf()]))
	}

	#[test]
	fn unique_match_appends_suffix() -> Result<()> {
		let dir = fixture(&["gitlog"])?;
		let mut buf = line("git?");
		let mut out = vec![];
		let result = completer(&dir).complete(&mut buf, &mut out)?;

		assert_eq!(result, Completion::Extended("log".to_string()));
		assert_eq!(buf.as_str(), "gitlog");
		assert_eq!(out, b"log");
		Ok(())
	}

	#[test]
	fn unique_match_keeps_earlier_words() -> Result<()> {
		let dir = fixture(&["gitlog", "ls"])?;
		let mut buf = line("sudo  git?");
		let mut out = vec![];
		completer(&dir).complete(&mut buf, &mut out)?;
		assert_eq!(buf.as_str(), "sudo  gitlog");
		Ok(())
	}

	#[test]
	fn multiple_matches_are_listed() -> Result<()> {
		let dir = fixture(&["gitk", "gitlog", "ls"])?;
		let mut buf = line("git?");
		let mut out = vec![];
		let result = completer(&dir).complete(&mut buf, &mut out)?;

		assert_eq!(result, Completion::Listed(vec!["gitk".to_string(), "gitlog".to_string()]));
		assert!(buf.is_empty());
		assert_eq!(String::from_utf8(out)?, "\ngitk\ngitlog\n");
		Ok(())
	}

	#[test]
	fn no_match_clears_line() -> Result<()> {
		let dir = fixture(&["ls"])?;
		let mut buf = line("zzz?");
		let mut out = vec![];
		let result = completer(&dir).complete(&mut buf, &mut out)?;

		assert_eq!(result, Completion::NoMatches);
		assert!(result.cleared_line());
		assert!(buf.is_empty());
		assert_eq!(String::from_utf8(out)?, "\nNo matches found\n");
		Ok(())
	}

	#[test]
	fn empty_prefix_lists_directory() -> Result<()> {
		let path_dir = fixture(&["gitlog"])?;
		let cwd = fixture(&["b.txt", "a.txt"])?;
		let mut buf = line("?");
		let mut out = vec![];
		let result = completer(&path_dir)
			.with_listing_dir(cwd.path().to_path_buf())
			.complete(&mut buf, &mut out)?;

		assert_eq!(result, Completion::DirectoryListing(vec!["a.txt".to_string(), "b.txt".to_string()]));
		assert!(buf.is_empty());
		assert_eq!(String::from_utf8(out)?, "\n a.txt\n b.txt\n");
		Ok(())
	}

	#[test]
	fn unreadable_listing_dir_only_clears_line() -> Result<()> {
		let cwd = assert_fs::TempDir::new()?;
		let mut buf = line("?");
		let mut out = vec![];
		let result = Completer::new(SearchPath::Fixed(vec![]))
			.with_listing_dir(cwd.path().join("missing"))
			.complete(&mut buf, &mut out)?;

		assert_eq!(result, Completion::DirectoryListing(vec![]));
		assert!(buf.is_empty());
		assert_eq!(String::from_utf8(out)?, "\n");
		Ok(())
	}
}
