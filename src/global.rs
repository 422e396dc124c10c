use crate::job;
use crate::search;

/// State carried from one interactive cycle to the next.
pub struct State {
	pub search_path: search::SearchPath,
	pub job_set: job::JobSet,
}

impl State {
	pub fn new() -> State {
		State::with_search_path(search::SearchPath::Environment)
	}

	pub fn with_search_path(search_path: search::SearchPath) -> State {
		State { search_path, job_set: job::JobSet::new() }
	}
}

impl Default for State {
	fn default() -> State {
		State::new()
	}
}
