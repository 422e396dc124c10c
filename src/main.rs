use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use dash::completion::Completer;
use dash::eval::{self, ExitSignal, SYSNAME};
use dash::events::{self, TraceEvent};
use dash::global::State;
use dash::reader::{Input, Reader};
use dash::{parser, prompt};

#[derive(Parser, Debug)]
#[clap(name = "dash", about = "A small interactive command interpreter")]
struct Options {
	/// Execute the given line and exit.
	#[clap(short = 'c', value_name = "COMMAND")]
	command: Option<String>,

	/// Enable debug output for a category.
	#[clap(long = "trace", value_name = "CATEGORY")]
	trace: Vec<TraceEvent>,
}

fn report_reaped(state: &mut State) -> Result<(), eval::ExecError> {
	for job in state.job_set.reap()? {
		let _ = writeln!(io::stderr(), "[{}] Done\t{}", job.id, job.command);
	}
	Ok(())
}

fn run_interactive(state: &mut State) -> Result<(), Box<dyn std::error::Error>> {
	let mut reader = Reader::stdio(Completer::default())?;
	loop {
		report_reaped(state)?;
		let prompt = if reader.is_interactive() { prompt::render() } else { String::new() };
		let line = match reader.read_line(&prompt)? {
			Input::Line(line) => line,
			Input::Eof => break,
		};
		if eval::eval(state, &parser::parse(&line))? == ExitSignal::Exit {
			break;
		}
	}
	if reader.is_interactive() {
		println!();
	}
	Ok(())
}

fn main() -> ExitCode {
	let options = Options::parse();
	events::init(&options.trace);

	let mut state = State::new();
	let result: Result<(), Box<dyn std::error::Error>> = match &options.command {
		Some(line) => eval::eval(&mut state, &parser::parse(line))
			.map(|_| ())
			.map_err(Into::into),
		None => run_interactive(&mut state),
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			let _ = writeln!(io::stderr(), "-{}: {}", SYSNAME, e);
			ExitCode::FAILURE
		},
	}
}
