use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use nix::unistd::{self, AccessFlags};

use crate::trace_categories;

const PATH_KEY: &str = "PATH";

/// Why a command name did not resolve. The message leaves out the name;
/// callers prefix it when reporting.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
	#[error("command not found")]
	NotFound(String),
	#[error("Permission denied")]
	NotExecutable(PathBuf),
}

/// Where executables are looked up. `Environment` re-reads `PATH` on every
/// call so changes take effect immediately.
#[derive(Debug, Clone, Default)]
pub enum SearchPath {
	#[default]
	Environment,
	Fixed(Vec<PathBuf>),
}

fn is_executable(path: &Path) -> bool {
	unistd::access(path, AccessFlags::X_OK).is_ok()
}

impl SearchPath {
	pub fn dirs(&self) -> Vec<PathBuf> {
		match self {
			SearchPath::Environment => env::var_os(PATH_KEY)
				.map(|paths| env::split_paths(&paths).collect())
				.unwrap_or_default(),
			SearchPath::Fixed(dirs) => dirs.clone(),
		}
	}

	/// Finds the executable `name` refers to. Names containing a slash are
	/// taken as paths; anything else is looked up in each directory in order.
	pub fn resolve(&self, name: &str) -> Result<PathBuf, ResolveError> {
		if name.contains('/') {
			let path = PathBuf::from(name);
			return match fs::metadata(&path) {
				Ok(meta) if meta.is_file() && is_executable(&path) => Ok(path),
				Ok(_) => Err(ResolveError::NotExecutable(path)),
				Err(_) => Err(ResolveError::NotFound(name.to_string())),
			};
		}

		let mut not_executable = None;
		for dir in self.dirs() {
			let candidate = dir.join(name);
			match fs::metadata(&candidate) {
				Ok(meta) if meta.is_file() => {
					if is_executable(&candidate) {
						tracing::debug!(target: trace_categories::COMMANDS, "resolved {} to {}", name, candidate.display());
						return Ok(candidate);
					}
					not_executable.get_or_insert(candidate);
				},
				_ => continue,
			}
		}
		Err(match not_executable {
			Some(path) => ResolveError::NotExecutable(path),
			None => ResolveError::NotFound(name.to_string()),
		})
	}

	/// Entry names starting with `prefix` across all directories. Each
	/// directory contributes its names sorted; a name already seen in an
	/// earlier directory is skipped.
	pub fn commands_with_prefix(&self, prefix: &str) -> Vec<String> {
		let mut seen = HashSet::new();
		let mut matches = vec![];
		for dir in self.dirs() {
			let mut names = match sorted_entries(&dir) {
				Ok(names) => names,
				Err(e) => {
					tracing::debug!(target: trace_categories::COMPLETION, "skipping {}: {}", dir.display(), e);
					continue;
				},
			};
			names.retain(|name| name.starts_with(prefix));
			for name in names {
				if seen.insert(name.clone()) {
					matches.push(name);
				}
			}
		}
		matches
	}
}

/// Names of the entries of `dir`, sorted. Names that are not valid UTF-8 are
/// left out.
pub fn sorted_entries(dir: &Path) -> io::Result<Vec<String>> {
	let mut names = vec![];
	for entry in fs::read_dir(dir)? {
		if let Ok(name) = entry?.file_name().into_string() {
			if name != "." && name != ".." {
				names.push(name);
			}
		}
	}
	names.sort();
	Ok(names)
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Result;
	use assert_fs::prelude::*;
	use pretty_assertions::assert_eq;
	use std::os::unix::fs::PermissionsExt;

	fn make_file(dir: &assert_fs::TempDir, name: &str, mode: u32) -> Result<PathBuf> {
		let child = dir.child(name);
		child.touch()?;
		fs::set_permissions(child.path(), fs::Permissions::from_mode(mode))?;
		Ok(child.path().to_path_buf())
	}

	#[test]
	fn resolves_first_executable_in_order() -> Result<()> {
		let first = assert_fs::TempDir::new()?;
		let second = assert_fs::TempDir::new()?;
		make_file(&second, "tool", 0o755)?;
		let expected = make_file(&first, "tool", 0o755)?;

		let search = SearchPath::Fixed(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
		assert_eq!(search.resolve("tool")?, expected);
		Ok(())
	}

	#[test]
	fn skips_non_executable_and_directories() -> Result<()> {
		let first = assert_fs::TempDir::new()?;
		let second = assert_fs::TempDir::new()?;
		make_file(&first, "tool", 0o644)?;
		first.child("other").create_dir_all()?;
		let expected = make_file(&second, "tool", 0o755)?;

		let search = SearchPath::Fixed(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
		assert_eq!(search.resolve("tool")?, expected);
		assert!(matches!(search.resolve("other"), Err(ResolveError::NotFound(_))));
		Ok(())
	}

	#[test]
	fn distinguishes_not_found_from_not_executable() -> Result<()> {
		let dir = assert_fs::TempDir::new()?;
		let plain = make_file(&dir, "plain", 0o644)?;
		let search = SearchPath::Fixed(vec![dir.path().to_path_buf()]);

		match search.resolve("plain") {
			Err(ResolveError::NotExecutable(path)) => assert_eq!(path, plain),
			other => panic!("unexpected {:?}", other),
		}
		match search.resolve("missing") {
			Err(e @ ResolveError::NotFound(_)) => assert_eq!(e.to_string(), "command not found"),
			other => panic!("unexpected {:?}", other),
		}
		Ok(())
	}

	#[test]
	fn slash_names_are_paths() -> Result<()> {
		let dir = assert_fs::TempDir::new()?;
		let tool = make_file(&dir, "tool", 0o755)?;
		let search = SearchPath::Fixed(vec![]);
		let name = tool.to_str().expect("utf-8 temp path");
		assert_eq!(search.resolve(name)?, tool);
		Ok(())
	}

	#[test]
	fn prefix_matches_are_sorted_and_deduplicated() -> Result<()> {
		let first = assert_fs::TempDir::new()?;
		let second = assert_fs::TempDir::new()?;
		for name in ["gitk", "git", "grep"] {
			first.child(name).touch()?;
		}
		for name in ["git", "gitlog", "ls"] {
			second.child(name).touch()?;
		}
		let search = SearchPath::Fixed(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
		assert_eq!(search.commands_with_prefix("git"), ["git", "gitk", "gitlog"]);
		assert!(search.commands_with_prefix("zz").is_empty());
		Ok(())
	}

	#[test]
	fn missing_directories_are_skipped() -> Result<()> {
		let dir = assert_fs::TempDir::new()?;
		dir.child("gitlog").touch()?;
		let search = SearchPath::Fixed(vec![dir.path().join("nope"), dir.path().to_path_buf()]);
		assert_eq!(search.commands_with_prefix("git"), ["gitlog"]);
		Ok(())
	}
}
