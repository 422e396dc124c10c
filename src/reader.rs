//! Keystroke-level line editing on an uncooked terminal.
//!
//! The reader echoes what it accepts itself, erases characters on
//! backspace, recalls the previous line on up-arrow and hands tab over to
//! the [`Completer`].

use std::io::{self, IsTerminal, Read, Write};
use std::os::fd::{AsFd, OwnedFd};

use crate::completion::Completer;
use crate::parser::COMPLETION_MARKER;
use crate::term::RawMode;
use crate::trace_categories;
use crate::types::{LineBuffer, LINE_CAPACITY};

const EOT: u8 = 0x04;
const BS: u8 = 0x08;
const ESC: u8 = 0x1b;
const DEL: u8 = 0x7f;
const ERASE: &str = "\x08 \x08";

/// Result of one [`Reader::read_line`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
	Line(String),
	/// Ctrl-D or end of input: the interpreter should stop.
	Eof,
}

pub struct Reader<R, W> {
	input: R,
	output: W,
	completer: Completer,
	/// The previously accepted line, swapped in by up-arrow.
	history: String,
	interactive: bool,
	/// Switched to uncooked mode while a line is read.
	terminal: Option<OwnedFd>,
	capacity: usize,
	/// A line cut short by end of input is returned before `Eof`.
	at_eof: bool,
	/// A byte read ahead that ended a malformed UTF-8 sequence.
	pending: Option<u8>,
}

impl Reader<io::Stdin, io::Stdout> {
	/// A reader over the process's terminal. When stdin is not a terminal
	/// nothing is echoed and the terminal mode is left alone.
	pub fn stdio(completer: Completer) -> io::Result<Self> {
		let stdin = io::stdin();
		let mut reader = Reader::new(io::stdin(), io::stdout(), completer);
		reader.interactive = stdin.is_terminal();
		if reader.interactive {
			reader.terminal = Some(stdin.as_fd().try_clone_to_owned()?);
		}
		Ok(reader)
	}
}

impl<R: Read, W: Write> Reader<R, W> {
	pub fn new(input: R, output: W, completer: Completer) -> Self {
		Reader {
			input,
			output,
			completer,
			history: String::new(),
			interactive: true,
			terminal: None,
			capacity: LINE_CAPACITY,
			at_eof: false,
			pending: None,
		}
	}

	/// Terminal whose settings are switched for the duration of each
	/// [`Reader::read_line`] call.
	pub fn with_terminal(mut self, terminal: OwnedFd) -> Self {
		self.terminal = Some(terminal);
		self
	}

	pub fn with_capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity;
		self
	}

	pub fn is_interactive(&self) -> bool {
		self.interactive
	}

	/// Reads one line, printing `prompt` first. The terminal is switched to
	/// uncooked mode for the duration of the call.
	pub fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
		if self.at_eof {
			return Ok(Input::Eof);
		}
		let _raw = match &self.terminal {
			Some(fd) => Some(RawMode::enter(fd.try_clone()?)?),
			None => None,
		};

		self.echo(prompt)?;
		let mut line = LineBuffer::with_capacity(self.capacity);
		loop {
			let byte = match self.read_byte()? {
				Some(byte) => byte,
				None if line.is_empty() => return Ok(Input::Eof),
				None => {
					self.at_eof = true;
					break;
				},
			};
			match byte {
				EOT => return Ok(Input::Eof),
				b'\n' | b'\r' => {
					self.echo("\n")?;
					break;
				},
				b'\t' => {
					if !line.push(COMPLETION_MARKER) {
						tracing::debug!(target: trace_categories::INPUT, "no room for completion");
						continue;
					}
					let completion = self.completer.complete(&mut line, &mut self.output)?;
					if completion.cleared_line() {
						self.echo(prompt)?;
					}
				},
				DEL | BS => {
					if line.pop().is_some() {
						self.echo(ERASE)?;
					}
				},
				ESC => self.read_escape(&mut line)?,
				b if b < 0x20 => {},
				b => {
					let c = match self.read_char(b)? {
						Some(c) => c,
						None => continue,
					};
					if line.push(c) {
						let mut utf8 = [0; 4];
						self.echo(c.encode_utf8(&mut utf8))?;
					}
				},
			}
			if line.is_full() {
				tracing::warn!(target: trace_categories::INPUT, "line reached {} bytes; ending it early", line.len());
				self.echo("\n")?;
				break;
			}
		}

		let line = line.into_string();
		self.history = line.clone();
		Ok(Input::Line(line))
	}

	fn echo(&mut self, s: &str) -> io::Result<()> {
		if self.interactive {
			self.output.write_all(s.as_bytes())?;
			self.output.flush()?;
		}
		Ok(())
	}

	fn read_byte(&mut self) -> io::Result<Option<u8>> {
		if let Some(b) = self.pending.take() {
			return Ok(Some(b));
		}
		let mut buf = [0u8; 1];
		loop {
			match self.input.read(&mut buf) {
				Ok(0) => return Ok(None),
				Ok(_) => return Ok(Some(buf[0])),
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			}
		}
	}

	/// Collects the rest of a UTF-8 sequence starting with `lead`. A sequence
	/// cut short is dropped; the byte that cut it is read again next.
	fn read_char(&mut self, lead: u8) -> io::Result<Option<char>> {
		let width = match lead {
			0x00 ..= 0x7f => 1,
			0xc0 ..= 0xdf => 2,
			0xe0 ..= 0xef => 3,
			0xf0 ..= 0xf7 => 4,
			_ => return Ok(None),
		};
		let mut bytes = [lead, 0, 0, 0];
		for slot in bytes.iter_mut().take(width).skip(1) {
			match self.read_byte()? {
				Some(b @ 0x80 ..= 0xbf) => *slot = b,
				Some(b) => {
					tracing::debug!(target: trace_categories::INPUT, "dropping truncated UTF-8 sequence");
					self.pending = Some(b);
					return Ok(None);
				},
				None => return Ok(None),
			}
		}
		Ok(std::str::from_utf8(&bytes[..width]).ok().and_then(|s| s.chars().next()))
	}

	/// Consumes an escape sequence. Only up-arrow has an effect.
	fn read_escape(&mut self, line: &mut LineBuffer) -> io::Result<()> {
		match self.read_byte()? {
			Some(b'[') | Some(b'O') => {},
			_ => return Ok(()),
		}
		while let Some(b) = self.read_byte()? {
			if (0x40 ..= 0x7e).contains(&b) {
				if b == b'A' {
					self.recall_history(line)?;
				} else {
					tracing::debug!(target: trace_categories::INPUT, "ignoring escape sequence ending in {:?}", b as char);
				}
				break;
			}
		}
		Ok(())
	}

	/// Swaps the line being edited with the history slot and redraws it.
	fn recall_history(&mut self, line: &mut LineBuffer) -> io::Result<()> {
		for _ in line.as_str().chars() {
			self.echo(ERASE)?;
		}
		line.swap(&mut self.history);
		let shown = line.as_str().to_string();
		self.echo(&shown)
	}
}
