use std::env;
use std::path::PathBuf;

use nix::unistd;

use crate::eval::ExitSignal;

#[derive(Debug, thiserror::Error)]
pub enum BuiltinError {
	#[error("{}: {}", .path.display(), .source.desc())]
	ChangeDir { path: PathBuf, source: nix::Error },
	#[error("HOME not set")]
	NoHome,
}

pub type Builtin = fn(&[String]) -> Result<ExitSignal, BuiltinError>;

/// Changes the working directory to the first argument, or to `$HOME`
/// without one.
pub fn builtin_cd(args: &[String]) -> Result<ExitSignal, BuiltinError> {
	let path = match args.first() {
		Some(dir) => PathBuf::from(dir),
		None => env::var_os("HOME").map(PathBuf::from).ok_or(BuiltinError::NoHome)?,
	};
	unistd::chdir(&path).map_err(|source| BuiltinError::ChangeDir { path, source })?;
	Ok(ExitSignal::Success)
}

pub fn builtin_exit(_: &[String]) -> Result<ExitSignal, BuiltinError> {
	Ok(ExitSignal::Exit)
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd),
		"exit" => Some(builtin_exit),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cd_to_missing_directory_fails_and_stays() {
		let before = env::current_dir().expect("cwd");
		let missing = "/nonexistent/dash-cd-target".to_string();
		let err = builtin_cd(&[missing.clone()]).expect_err("chdir should fail");
		assert!(err.to_string().contains(&missing), "message was {:?}", err.to_string());
		assert!(err.to_string().contains("No such file or directory"));
		assert_eq!(env::current_dir().expect("cwd"), before);
	}

	#[test]
	fn matches_only_known_builtins() {
		assert!(match_builtin("cd").is_some());
		assert!(match_builtin("exit").is_some());
		assert!(match_builtin("ls").is_none());
		assert!(match_builtin("").is_none());
	}

	#[test]
	fn exit_requests_termination() {
		assert!(matches!(builtin_exit(&[]), Ok(ExitSignal::Exit)));
	}
}
