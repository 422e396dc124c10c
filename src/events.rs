use std::fmt::Display;

use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::trace_categories;

/// Category of debug output that can be switched on from the command line.
#[derive(Clone, Debug, Eq, Hash, PartialEq, clap::ValueEnum)]
pub enum TraceEvent {
	/// Command resolution and execution.
	#[clap(name = "commands")]
	Commands,
	/// Tab completion.
	#[clap(name = "complete")]
	Complete,
	/// Keystroke handling.
	#[clap(name = "input")]
	Input,
	/// Child process bookkeeping.
	#[clap(name = "jobs")]
	Jobs,
	/// Line parsing.
	#[clap(name = "parse")]
	Parse,
}

impl TraceEvent {
	fn target(&self) -> &'static str {
		match self {
			TraceEvent::Commands => trace_categories::COMMANDS,
			TraceEvent::Complete => trace_categories::COMPLETION,
			TraceEvent::Input => trace_categories::INPUT,
			TraceEvent::Jobs => trace_categories::JOBS,
			TraceEvent::Parse => trace_categories::PARSE,
		}
	}
}

impl Display for TraceEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.target())
	}
}

fn compose_filter(enabled: &[TraceEvent]) -> Targets {
	let filter = Targets::new().with_default(tracing_subscriber::filter::LevelFilter::WARN);
	filter.with_targets(enabled.iter().map(|event| (event.target(), tracing::Level::DEBUG)))
}

/// Installs a stderr subscriber: warnings everywhere, debug output for the
/// enabled categories.
pub fn init(enabled: &[TraceEvent]) {
	let layer = tracing_subscriber::fmt::layer()
		.with_writer(std::io::stderr)
		.without_time()
		.with_filter(compose_filter(enabled));

	if tracing_subscriber::registry().with(layer).try_init().is_err() {
		eprintln!("warning: failed to initialize tracing.");
	}
}
