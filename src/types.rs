use std::fmt;

/// Maximum number of bytes a single input line may hold, including the
/// byte reserved for the terminator the line would have had in a C buffer.
pub const LINE_CAPACITY: usize = 4096;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output, Append }

impl RedirectType {
	/// Installation order: an append redirect overrides a truncating one.
	pub const ALL: [RedirectType; 3] = [RedirectType::Input, RedirectType::Output, RedirectType::Append];

	fn index(self) -> usize {
		match self {
			RedirectType::Input => 0,
			RedirectType::Output => 1,
			RedirectType::Append => 2,
		}
	}

	fn operator(self) -> &'static str {
		match self {
			RedirectType::Input => "<",
			RedirectType::Output => ">",
			RedirectType::Append => ">>",
		}
	}
}

/// The three redirect slots of a stage: stdin source, stdout truncate
/// target and stdout append target.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Redirects {
	slots: [Option<String>; 3],
}

impl Redirects {
	pub fn get(&self, typ: RedirectType) -> Option<&str> {
		self.slots[typ.index()].as_deref()
	}

	pub fn set(&mut self, typ: RedirectType, target: String) {
		self.slots[typ.index()] = Some(target);
	}

	pub fn is_empty(&self) -> bool {
		self.slots.iter().all(Option::is_none)
	}

	/// Set slots in installation order.
	pub fn iter(&self) -> impl Iterator<Item = (RedirectType, &str)> {
		RedirectType::ALL.into_iter().filter_map(move |typ| self.get(typ).map(|target| (typ, target)))
	}
}

/// One command of a pipeline.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Stage {
	pub name: String,
	/// `arguments[0]` is always `name`; the positional arguments follow.
	pub arguments: Vec<String>,
	pub background: bool,
	pub wants_completion: bool,
	pub redirects: Redirects,
}

impl Stage {
	pub fn new(name: String, args: Vec<String>) -> Stage {
		let mut arguments = Vec::with_capacity(args.len() + 1);
		arguments.push(name.clone());
		arguments.extend(args);
		Stage { name, arguments, ..Default::default() }
	}

	/// Positional arguments, without the leading name.
	pub fn args(&self) -> &[String] {
		self.arguments.get(1..).unwrap_or(&[])
	}
}

/// Whether `word` written bare would read back as something else: a split
/// word, an operator, a redirect or an open quoted region.
fn needs_quotes(word: &str) -> bool {
	word == "|"
		|| word.ends_with('&')
		|| word.starts_with(|c| c == '<' || c == '>')
		|| word.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'')
}

/// Writes one word so that the parser reads it back unchanged. The empty
/// word stays bare: it only occurs as the name of an empty stage or as a
/// missing redirect target, and both read back from nothing. A word holding
/// both quote characters has no faithful rendering.
fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
	if !needs_quotes(word) {
		f.write_str(word)
	} else if word.contains('"') {
		write!(f, "'{}'", word)
	} else {
		write!(f, "\"{}\"", word)
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write_word(f, &self.name)?;
		for arg in self.args() {
			f.write_str(" ")?;
			write_word(f, arg)?;
		}
		for (typ, target) in self.redirects.iter() {
			write!(f, " {}", typ.operator())?;
			write_word(f, target)?;
		}
		Ok(())
	}
}

/// All stages of one input line, in textual order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
}

impl Pipeline {
	pub fn is_background(&self) -> bool {
		self.stages.iter().any(|stage| stage.background)
	}
}

impl fmt::Display for Pipeline {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, stage) in self.stages.iter().enumerate() {
			if i > 0 {
				f.write_str(" | ")?;
			}
			write!(f, "{}", stage)?;
		}
		if self.is_background() {
			f.write_str(" &")?;
		}
		Ok(())
	}
}

/// The line being edited by the reader. The cursor always sits at the end.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LineBuffer {
	text: String,
	capacity: usize,
}

impl Default for LineBuffer {
	fn default() -> LineBuffer {
		LineBuffer::with_capacity(LINE_CAPACITY)
	}
}

impl LineBuffer {
	pub fn with_capacity(capacity: usize) -> LineBuffer {
		LineBuffer { text: String::new(), capacity }
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	/// Cursor position, in bytes.
	pub fn len(&self) -> usize {
		self.text.len()
	}

	pub fn is_empty(&self) -> bool {
		self.text.is_empty()
	}

	/// True once no further byte fits; the reader ends the line at that point.
	pub fn is_full(&self) -> bool {
		self.text.len() + 1 >= self.capacity
	}

	/// Appends `c` if it fits; returns whether it did.
	pub fn push(&mut self, c: char) -> bool {
		if self.text.len() + c.len_utf8() + 1 > self.capacity {
			return false;
		}
		self.text.push(c);
		true
	}

	/// Appends as much of `s` as fits, returning the part that was appended.
	pub fn push_str<'s>(&mut self, s: &'s str) -> &'s str {
		let mut end = 0;
		for (i, c) in s.char_indices() {
			if self.text.len() + i + c.len_utf8() + 1 > self.capacity {
				break;
			}
			end = i + c.len_utf8();
		}
		self.text.push_str(&s[..end]);
		&s[..end]
	}

	pub fn pop(&mut self) -> Option<char> {
		self.text.pop()
	}

	pub fn truncate(&mut self, len: usize) {
		self.text.truncate(len);
	}

	pub fn clear(&mut self) {
		self.text.clear();
	}

	/// Swaps the buffer contents with `other`.
	pub fn swap(&mut self, other: &mut String) {
		std::mem::swap(&mut self.text, other);
	}

	pub fn into_string(self) -> String {
		self.text
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn stage_arguments_lead_with_name() {
		let stage = Stage::new("ls".to_string(), vec!["-l".to_string(), "/tmp".to_string()]);
		assert_eq!(stage.arguments, ["ls", "-l", "/tmp"]);
		assert_eq!(stage.args(), ["-l", "/tmp"]);
		assert_eq!(stage.arguments.len(), stage.args().len() + 1);
	}

	#[test]
	fn redirects_iterate_in_installation_order() {
		let mut redirects = Redirects::default();
		redirects.set(RedirectType::Append, "b".to_string());
		redirects.set(RedirectType::Input, "a".to_string());
		let order: Vec<_> = redirects.iter().collect();
		assert_eq!(order, [(RedirectType::Input, "a"), (RedirectType::Append, "b")]);
		assert_eq!(redirects.get(RedirectType::Output), None);
	}

	#[test]
	fn display_quotes_words_with_whitespace() {
		let mut stage = Stage::new("echo".to_string(), vec!["hello world".to_string()]);
		stage.redirects.set(RedirectType::Append, "log.txt".to_string());
		assert_eq!(stage.to_string(), "echo \"hello world\" >>log.txt");
	}

	#[test]
	fn display_quotes_operators_and_quote_characters() {
		let args = ["|", "&", "<in", ">out", "a&", "say \"hi\"", "it's"];
		let stage = Stage::new("echo".to_string(), args.iter().map(|a| a.to_string()).collect());
		assert_eq!(stage.to_string(), r#"echo "|" "&" "<in" ">out" "a&" 'say "hi"' "it's""#);
	}

	#[test]
	fn line_buffer_stops_below_capacity() {
		let mut buf = LineBuffer::with_capacity(4);
		assert!(buf.push('a'));
		assert!(buf.push('b'));
		assert!(!buf.is_full());
		assert!(buf.push('c'));
		assert!(buf.is_full());
		assert!(!buf.push('d'));
		assert_eq!(buf.as_str(), "abc");
	}

	#[test]
	fn line_buffer_push_str_truncates_on_char_boundary() {
		let mut buf = LineBuffer::with_capacity(5);
		buf.push('x');
		assert_eq!(buf.push_str("éé"), "é");
		assert_eq!(buf.as_str(), "xé");
	}
}
