use std::ffi::{CString, NulError};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, IntoRawFd, OwnedFd};
use std::{fs, path::PathBuf};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};

use crate::builtin::{self, Builtin};
use crate::global;
use crate::job::JobBuilder;
use crate::search::ResolveError;
use crate::trace_categories;
use crate::types::{Pipeline, RedirectType, Redirects, Stage};

/// Name used as the prefix of every diagnostic.
pub const SYSNAME: &str = "dash";

/// What the driver loop should do after a line has been executed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExitSignal {
	Success,
	Exit,
	/// A command could not be found or the line was malformed.
	Unknown,
}

/// Failures of the interpreter itself. The driver cannot go on after one.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
	#[error("failed to create pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("failed to fork: {0}")]
	Fork(#[source] nix::Error),
	#[error("failed to wait for process {0}: {1}")]
	Wait(Pid, #[source] nix::Error),
}

/// Failures inside a forked child, reported there before it exits.
#[derive(Debug, thiserror::Error)]
enum ChildError {
	#[error("missing redirect target")]
	MissingRedirectTarget,
	#[error("{path}: {source}")]
	Redirect { path: String, source: io::Error },
	#[error("failed to duplicate descriptor: {0}")]
	Dup(#[source] nix::Error),
	#[error("{}: {}", .path.display(), .source.desc())]
	Exec { path: PathBuf, source: nix::Error },
}

impl ChildError {
	fn status(&self) -> i32 {
		match self {
			ChildError::Exec { source: Errno::ENOENT, .. } => 127,
			ChildError::Exec { .. } => 126,
			_ => 1,
		}
	}
}

/// Why a stage could not be prepared for launch.
#[derive(Debug, thiserror::Error)]
enum PrepareError {
	#[error(transparent)]
	Resolve(#[from] ResolveError),
	#[error("argument contains a NUL byte")]
	Nul(#[source] NulError),
}

enum Program {
	Builtin(Builtin),
	External { path: PathBuf, c_path: CString, argv: Vec<CString> },
}

/// A stage with everything the child needs computed before the fork.
struct Prepared<'a> {
	stage: &'a Stage,
	program: Program,
}

fn diagnostic(name: &str, message: &dyn std::fmt::Display) -> String {
	format!("-{}: {}: {}", SYSNAME, name, message)
}

fn report(name: &str, message: &dyn std::fmt::Display) {
	let _ = writeln!(io::stderr(), "{}", diagnostic(name, message));
}

fn prepare<'a>(state: &global::State, stage: &'a Stage) -> Result<Prepared<'a>, PrepareError> {
	if let Some(builtin) = builtin::match_builtin(&stage.name) {
		return Ok(Prepared { stage, program: Program::Builtin(builtin) });
	}
	let path = state.search_path.resolve(&stage.name)?;
	let c_path = CString::new(path.as_os_str().as_bytes()).map_err(PrepareError::Nul)?;
	let argv: Result<Vec<CString>, NulError> = stage.arguments.iter().map(|s| CString::new(s.as_str())).collect();
	let argv = argv.map_err(PrepareError::Nul)?;
	Ok(Prepared { stage, program: Program::External { path, c_path, argv } })
}

fn open_redirect(typ: RedirectType, target: &str) -> Result<fs::File, ChildError> {
	let mut oopt = fs::OpenOptions::new();
	let _ = match typ {
		RedirectType::Input => oopt.read(true),
		RedirectType::Output => oopt.write(true).create(true).truncate(true),
		RedirectType::Append => oopt.append(true).create(true),
	};
	oopt.open(target).map_err(|source| ChildError::Redirect { path: target.to_string(), source })
}

/// Installs the redirects over stdin/stdout. Append is installed after
/// truncate and so wins when both are present.
fn apply_redirects(redirects: &Redirects) -> Result<(), ChildError> {
	for (typ, target) in redirects.iter() {
		if target.is_empty() {
			return Err(ChildError::MissingRedirectTarget);
		}
		let file = open_redirect(typ, target)?;
		let to = match typ {
			RedirectType::Input => libc::STDIN_FILENO,
			RedirectType::Output | RedirectType::Append => libc::STDOUT_FILENO,
		};
		let fd = file.into_raw_fd();
		unistd::dup2(fd, to).map_err(ChildError::Dup)?;
		unistd::close(fd).map_err(ChildError::Dup)?;
	}
	Ok(())
}

fn do_exec_stage(prepared: &Prepared<'_>) -> Result<i32, ChildError> {
	apply_redirects(&prepared.stage.redirects)?;
	match &prepared.program {
		Program::Builtin(builtin) => Ok(match builtin(prepared.stage.args()) {
			Ok(_) => 0,
			Err(e) => {
				report(&prepared.stage.name, &e);
				1
			},
		}),
		Program::External { path, c_path, argv } => match unistd::execv(c_path, argv) {
			Ok(never) => match never {},
			Err(source) => Err(ChildError::Exec { path: path.clone(), source }),
		},
	}
}

fn exec_stage(prepared: &Prepared<'_>) -> ! {
	let status = do_exec_stage(prepared).unwrap_or_else(|e| {
		report(&prepared.stage.name, &e);
		e.status()
	});
	let _ = io::stdout().flush();
	// SAFETY: `_exit` skips destructors and atexit handlers that belong to
	// the parent's copy of the process state.
	unsafe { libc::_exit(status) }
}

fn wire_pipes(stdin: Option<&OwnedFd>, stdout: Option<&OwnedFd>) -> Result<(), ChildError> {
	if let Some(read) = stdin {
		unistd::dup2(read.as_raw_fd(), libc::STDIN_FILENO).map_err(ChildError::Dup)?;
	}
	if let Some(write) = stdout {
		unistd::dup2(write.as_raw_fd(), libc::STDOUT_FILENO).map_err(ChildError::Dup)?;
	}
	Ok(())
}

/// Forks one child per stage in textual order, connecting neighbours with
/// pipes. Each pipe end is closed in the parent once both of its children
/// exist.
fn spawn_stages(stages: &[Prepared<'_>], job_builder: &mut JobBuilder) -> Result<(), ExecError> {
	let last = stages.len().saturating_sub(1);
	let mut pipe_stdin: Option<OwnedFd> = None;
	for (i, prepared) in stages.iter().enumerate() {
		let pipe: Option<(OwnedFd, OwnedFd)> = if i < last {
			Some(unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?)
		} else {
			None
		};
		let _ = io::stdout().flush();
		// SAFETY: the child only duplicates descriptors, opens redirect files
		// and then execs or exits.
		match unsafe { job_builder.push_fork() }? {
			ForkResult::Parent { .. } => {},
			ForkResult::Child => {
				let stdout = pipe.as_ref().map(|(_, write)| write);
				if let Err(e) = wire_pipes(pipe_stdin.as_ref(), stdout) {
					report(&prepared.stage.name, &e);
					// SAFETY: see `exec_stage`.
					unsafe { libc::_exit(e.status()) }
				}
				exec_stage(prepared);
			},
		}
		// Dropping closes the previous read end and this pipe's write end.
		pipe_stdin = pipe.map(|(read, _write)| read);
	}
	Ok(())
}

/// Runs a builtin in the interpreter process itself.
fn run_builtin(builtin: Builtin, stage: &Stage) -> ExitSignal {
	match builtin(stage.args()) {
		Ok(signal) => signal,
		Err(e) => {
			report(&stage.name, &e);
			ExitSignal::Success
		},
	}
}

fn eval_pipeline(state: &mut global::State, pipeline: &Pipeline) -> Result<ExitSignal, ExecError> {
	let stages = &pipeline.stages;
	if stages.len() == 1 {
		let stage = &stages[0];
		if stage.name.is_empty() {
			return Ok(ExitSignal::Success);
		}
		if let Some(builtin) = builtin::match_builtin(&stage.name) {
			return Ok(run_builtin(builtin, stage));
		}
	}
	if stages.is_empty() || stages.iter().any(|stage| stage.name.is_empty()) {
		report("syntax error", &"empty command in pipeline");
		return Ok(ExitSignal::Unknown);
	}

	let mut prepared = Vec::with_capacity(stages.len());
	let mut unresolved = false;
	for stage in stages {
		match prepare(state, stage) {
			Ok(p) => prepared.push(p),
			Err(e) => {
				report(&stage.name, &e);
				unresolved = true;
			},
		}
	}
	if unresolved {
		return Ok(ExitSignal::Unknown);
	}

	let mut job_builder = JobBuilder::new(prepared.len());
	let spawned = spawn_stages(&prepared, &mut job_builder);
	let mut job = job_builder.build(pipeline.to_string());
	if let Err(e) = spawned {
		// Collect what was started before giving up.
		let _ = job.wait();
		return Err(e);
	}

	if pipeline.is_background() {
		let job = state.job_set.push(job);
		if let Some(pid) = job.leader() {
			let _ = writeln!(io::stderr(), "[{}] {}", job.id, pid);
		}
	} else {
		job.wait()?;
		for pr in &job.processes {
			tracing::debug!(target: trace_categories::JOBS, "{} exited with {:?}", pr.pid, pr.status);
		}
	}
	Ok(ExitSignal::Success)
}

/// Executes one parsed line.
///
/// Errors are returned only when the interpreter itself cannot continue
/// (a pipe or fork failed); everything a command does wrong is reported and
/// isolated.
pub fn eval(state: &mut global::State, pipeline: &Pipeline) -> Result<ExitSignal, ExecError> {
	tracing::debug!(target: trace_categories::COMMANDS, "executing {}", pipeline);
	eval_pipeline(state, pipeline)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser::parse;

	#[test]
	fn empty_line_is_a_no_op() {
		let mut state = global::State::new();
		assert_eq!(eval(&mut state, &parse("   ")).expect("eval"), ExitSignal::Success);
	}

	#[test]
	fn exit_signals_termination() {
		let mut state = global::State::new();
		assert_eq!(eval(&mut state, &parse("exit")).expect("eval"), ExitSignal::Exit);
	}

	#[test]
	fn unknown_command_is_reported() {
		let mut state = global::State::new();
		let signal = eval(&mut state, &parse("dash-no-such-command --flag")).expect("eval");
		assert_eq!(signal, ExitSignal::Unknown);
		assert!(state.job_set.is_empty());
	}

	#[test]
	fn empty_stage_in_pipeline_is_rejected() {
		let mut state = global::State::new();
		assert_eq!(eval(&mut state, &parse("ls |")).expect("eval"), ExitSignal::Unknown);
	}

	#[test]
	fn failed_cd_is_not_fatal() {
		let mut state = global::State::new();
		let signal = eval(&mut state, &parse("cd /nonexistent/dash-cd-target")).expect("eval");
		assert_eq!(signal, ExitSignal::Success);
	}

	#[test]
	fn resolution_failures_share_diagnostic_format() {
		let missing = PrepareError::from(ResolveError::NotFound("frob".to_string()));
		let denied = PrepareError::from(ResolveError::NotExecutable(PathBuf::from("/bin/frob")));
		assert_eq!(diagnostic("frob", &missing), "-dash: frob: command not found");
		assert_eq!(diagnostic("./frob", &denied), "-dash: ./frob: Permission denied");
		assert_eq!(diagnostic("cd", &"HOME not set"), "-dash: cd: HOME not set");
	}

	#[test]
	fn exec_failure_statuses() {
		let missing = ChildError::Exec { path: PathBuf::from("/x"), source: Errno::ENOENT };
		let denied = ChildError::Exec { path: PathBuf::from("/x"), source: Errno::EACCES };
		assert_eq!(missing.status(), 127);
		assert_eq!(denied.status(), 126);
		assert_eq!(ChildError::MissingRedirectTarget.status(), 1);
	}
}
