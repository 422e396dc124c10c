use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::eval::ExecError;
use crate::trace_categories;

trait WaitStatusExt {
	fn is_terminated(self) -> bool;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(self) -> bool {
		matches!(self, WaitStatus::Exited(..) | WaitStatus::Signaled(..))
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	/// `None` until the process has been reaped.
	pub status: Option<WaitStatus>,
}

impl Process {
	fn is_done(&self) -> bool {
		self.status.is_some()
	}

	/// Collects the process's exit status, blocking unless `nohang`.
	fn wait(&mut self, nohang: bool) -> Result<(), ExecError> {
		if self.is_done() {
			return Ok(());
		}
		let flags = if nohang { Some(WaitPidFlag::WNOHANG) } else { None };
		loop {
			match wait::waitpid(self.pid, flags) {
				Ok(WaitStatus::StillAlive) => return Ok(()),
				Ok(status) if status.is_terminated() => {
					tracing::debug!(target: trace_categories::JOBS, "process {} finished: {:?}", self.pid, status);
					self.status = Some(status);
					return Ok(());
				},
				Ok(_) => {
					if nohang {
						return Ok(());
					}
				},
				Err(Errno::EINTR) => continue,
				Err(Errno::ECHILD) => {
					// Already reaped elsewhere.
					self.status = Some(WaitStatus::Exited(self.pid, 0));
					return Ok(());
				},
				Err(e) => return Err(ExecError::Wait(self.pid, e)),
			}
		}
	}
}

/// The processes spawned for one pipeline.
#[derive(Debug)]
pub struct Job {
	pub id: usize,
	pub command: String,
	pub processes: Vec<Process>,
}

impl Job {
	pub fn is_done(&self) -> bool {
		self.processes.iter().all(Process::is_done)
	}

	/// Pid of the last stage, the one reported when a job is backgrounded.
	pub fn leader(&self) -> Option<Pid> {
		self.processes.last().map(|pr| pr.pid)
	}

	/// Blocks until every process of the job has terminated.
	pub fn wait(&mut self) -> Result<(), ExecError> {
		for pr in &mut self.processes {
			pr.wait(false)?;
		}
		Ok(())
	}

	/// Collects whatever has finished without blocking; returns whether the
	/// whole job is done.
	pub fn poll(&mut self) -> Result<bool, ExecError> {
		for pr in &mut self.processes {
			pr.wait(true)?;
		}
		Ok(self.is_done())
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	processes: Vec<Process>,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder { processes: Vec::with_capacity(size_hint) }
	}

	/// Forks, recording the child in the parent.
	///
	/// # Safety
	///
	/// The child may only perform async-signal-safe work before it execs or
	/// calls `_exit`; see [`nix::unistd::fork`].
	pub unsafe fn push_fork(&mut self) -> Result<ForkResult, ExecError> {
		let r = unsafe { unistd::fork() }.map_err(ExecError::Fork)?;
		if let ForkResult::Parent { child } = r {
			tracing::debug!(target: trace_categories::JOBS, "forked {}", child);
			self.processes.push(Process { pid: child, status: None });
		}
		Ok(r)
	}

	pub fn build(self, command: String) -> Job {
		Job { id: 0, command, processes: self.processes }
	}
}

/// Background jobs that have not been reaped yet.
#[derive(Debug, Default)]
pub struct JobSet {
	jobs: Vec<Job>,
}

impl JobSet {
	pub fn new() -> JobSet {
		JobSet::default()
	}

	/// Takes ownership of a background job and assigns it the lowest free id.
	pub fn push(&mut self, mut job: Job) -> &Job {
		job.id = (1 ..).find(|id| self.jobs.iter().all(|j| j.id != *id)).unwrap_or(1);
		self.jobs.push(job);
		let last = self.jobs.len() - 1;
		&self.jobs[last]
	}

	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	/// Removes and returns the jobs whose processes have all terminated.
	pub fn reap(&mut self) -> Result<Vec<Job>, ExecError> {
		let mut finished = vec![];
		let mut i = 0;
		while i < self.jobs.len() {
			if self.jobs[i].poll()? {
				let job = self.jobs.remove(i);
				tracing::debug!(target: trace_categories::JOBS, "reaped job {}: {}", job.id, job.command);
				finished.push(job);
			} else {
				i += 1;
			}
		}
		Ok(finished)
	}
}
