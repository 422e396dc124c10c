use std::os::fd::AsFd;

use nix::sys::termios::{self, LocalFlags, SetArg, Termios};

/// Puts a terminal into uncooked mode (no line buffering, no echo) and
/// restores the saved settings when dropped.
pub struct RawMode<F: AsFd> {
	fd: F,
	initial: Termios,
}

impl<F: AsFd> RawMode<F> {
	pub fn enter(fd: F) -> nix::Result<RawMode<F>> {
		let initial = termios::tcgetattr(fd.as_fd())?;
		let mut raw = initial.clone();
		raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
		termios::tcsetattr(fd.as_fd(), SetArg::TCSANOW, &raw)?;
		Ok(RawMode { fd, initial })
	}
}

impl<F: AsFd> Drop for RawMode<F> {
	fn drop(&mut self) {
		let _ = termios::tcsetattr(self.fd.as_fd(), SetArg::TCSANOW, &self.initial);
	}
}
