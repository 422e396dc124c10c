use std::env;
use std::path::PathBuf;

use nix::unistd::{self, User};

use crate::eval::SYSNAME;

/// The interpreter's working directory.
pub fn current_dir() -> nix::Result<PathBuf> {
	unistd::getcwd()
}

fn user_name() -> String {
	if let Some(user) = env::var_os("USER") {
		return user.to_string_lossy().into_owned();
	}
	match User::from_uid(unistd::getuid()) {
		Ok(Some(user)) => user.name,
		_ => unistd::getuid().to_string(),
	}
}

fn host_name() -> String {
	unistd::gethostname()
		.map(|h| h.to_string_lossy().into_owned())
		.unwrap_or_default()
}

/// `user@host:cwd dash$ `
pub fn render() -> String {
	let cwd = current_dir()
		.map(|p| p.display().to_string())
		.unwrap_or_else(|_| "?".to_string());
	format!("{}@{}:{} {}$ ", user_name(), host_name(), cwd, SYSNAME)
}
