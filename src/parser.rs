use crate::trace_categories;
use crate::types::*;

pub const COMPLETION_MARKER: char = '?';
pub const BACKGROUND_MARKER: char = '&';
const PIPE: &str = "|";

struct Parser<'a> {
	line: &'a str,
	i: usize,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<char> {
		self.line[self.i..].chars().next()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(char) -> bool {
		while let Some(c) = self.peek() {
			if !f(c) { break; }
			self.i += c.len_utf8();
		}
	}

	fn is_whitespace(c: char) -> bool {
		matches!(c, ' ' | '\t' | '\n' | '\r')
	}

	fn is_quote(c: char) -> bool {
		c == '"' || c == '\''
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	/// Reads one raw token. A quote opens a region that runs to the matching
	/// quote (or the end of the line) and may contain whitespace.
	fn read_word(&mut self) -> Option<&'a str> {
		self.skip_whitespaces();
		let orig = self.i;
		while let Some(c) = self.peek() {
			if Parser::is_whitespace(c) { break; }
			self.i += c.len_utf8();
			if Parser::is_quote(c) {
				self.proceed_while(|d| d != c);
				if self.peek() == Some(c) {
					self.i += c.len_utf8();
				}
			}
		}
		if orig == self.i {
			None
		} else {
			Some(&self.line[orig .. self.i])
		}
	}

	/// Reads the target of a redirect operator written apart from its target.
	fn read_target(&mut self) -> String {
		let orig = self.i;
		match self.read_word() {
			Some(PIPE) | None => {
				self.i = orig;
				String::new()
			},
			Some(word) => strip_quotes(word).to_string(),
		}
	}

	fn parse_redirect(&mut self, word: &str, redirects: &mut Redirects) -> bool {
		let (typ, rest) = if let Some(rest) = word.strip_prefix(">>") {
			(RedirectType::Append, rest)
		} else if let Some(rest) = word.strip_prefix('>') {
			(RedirectType::Output, rest)
		} else if let Some(rest) = word.strip_prefix('<') {
			(RedirectType::Input, rest)
		} else {
			return false;
		};
		let target = if rest.is_empty() {
			self.read_target()
		} else {
			strip_quotes(rest).to_string()
		};
		redirects.set(typ, target);
		true
	}

	/// Parses one stage, stopping after a `|` token. Returns the stage and
	/// whether a pipe followed it.
	fn parse_stage(&mut self) -> (Stage, bool) {
		let mut redirects = Redirects::default();
		let mut arguments: Vec<String> = vec![];

		let name = match self.read_word() {
			None => return (Stage::new(String::new(), arguments), false),
			Some(PIPE) => return (Stage::new(String::new(), arguments), true),
			Some(word) => strip_quotes(word).to_string(),
		};

		let mut piped = false;
		while let Some(word) = self.read_word() {
			if word == PIPE {
				piped = true;
				break;
			}
			if word.len() == 1 && word.starts_with(BACKGROUND_MARKER) {
				continue;
			}
			if self.parse_redirect(word, &mut redirects) {
				continue;
			}
			arguments.push(strip_quotes(word).to_string());
		}

		let mut stage = Stage::new(name, arguments);
		stage.redirects = redirects;
		(stage, piped)
	}

	fn parse_pipeline(&mut self) -> Vec<Stage> {
		let mut stages = vec![];
		loop {
			let (stage, piped) = self.parse_stage();
			stages.push(stage);
			if !piped {
				break;
			}
		}
		stages
	}
}

/// Removes one pair of matching quotes wrapping the whole token.
fn strip_quotes(word: &str) -> &str {
	let bytes = word.as_bytes();
	let len = bytes.len();
	if len > 2 && bytes[0] == bytes[len - 1] && (bytes[0] == b'"' || bytes[0] == b'\'') {
		&word[1 .. len - 1]
	} else {
		word
	}
}

/// Parses a finished input line into its pipeline stages.
///
/// Never fails: an empty line yields a single stage with an empty name, and
/// stray pipes yield stages with empty names.
pub fn parse(line: &str) -> Pipeline {
	let line = line.trim_matches(Parser::is_whitespace);
	let wants_completion = line.ends_with(COMPLETION_MARKER);
	let background = line.ends_with(BACKGROUND_MARKER);
	let body = if background {
		&line[.. line.len() - BACKGROUND_MARKER.len_utf8()]
	} else {
		line
	};

	let mut parser = Parser { line: body, i: 0 };
	let mut stages = parser.parse_pipeline();
	for stage in &mut stages {
		stage.background = background;
		stage.wants_completion = wants_completion;
	}
	let pipeline = Pipeline { stages };
	tracing::debug!(target: trace_categories::PARSE, "parsed {:?} as {:?}", line, pipeline);
	pipeline
}
