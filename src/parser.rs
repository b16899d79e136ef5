//! Token-free recursive descent parser.
//!
//! ```text
//! sequence  := atom*
//! atom      := list | vector | map | string | word
//! list      := '(' sequence ')'
//! vector    := '[' sequence ']'
//! map       := '{' sequence '}'
//! string    := '"' ... '"' | "'" ... "'"       (with '\' as escape)
//! word      := any run of non-whitespace, non-delimiter bytes
//! ```
//!
//! There is no separate tokenizer: the parser reads bytes directly off the
//! [`Reader`] and decides what it's looking at from the leading byte alone.
//! Error recovery is explicitly out of scope — a malformed delimiter or an
//! unterminated string aborts the whole parse.

use crate::ast::{list, mapify, sym, Ast};
use crate::error::{Error, Result};
use crate::reader::Reader;

fn is_whitespace(b: u8) -> bool {
	matches!(b, 9..=13 | 32)
}

fn is_delimiter(b: u8) -> bool {
	matches!(b, 40 | 41 | 91 | 93 | 123 | 125)
}

fn closing_for(open: u8) -> u8 {
	match open {
		b'(' => b')',
		b'[' => b']',
		b'{' => b'}',
		_ => unreachable!("closing_for called with a non-opening byte"),
	}
}

fn delimiter_name(b: u8) -> &'static str {
	match b {
		b'(' | b')' => "parenthesis",
		b'[' | b']' => "bracket",
		b'{' | b'}' => "brace",
		_ => "delimiter",
	}
}

pub struct Parser<'r> {
	reader: &'r mut Reader,
	pos: usize,
}

impl<'r> Parser<'r> {
	pub fn new(reader: &'r mut Reader) -> Self {
		Parser { reader, pos: 1 }
	}

	fn peek(&mut self) -> Option<u8> {
		self.reader.byte(self.pos).ok()
	}

	fn advance(&mut self) -> Option<u8> {
		let b = self.peek()?;
		self.pos += 1;
		Some(b)
	}

	fn skip_whitespace(&mut self) {
		while let Some(b) = self.peek() {
			if is_whitespace(b) {
				self.advance();
			} else {
				break;
			}
		}
	}

	/// Releases everything parsed so far back to the reader. Called by the
	/// driver after each top-level form so long streaming inputs don't pile
	/// up in memory.
	fn free_consumed(&mut self) {
		self.reader.free(self.pos.saturating_sub(1));
	}

	/// Parses the next top-level form, or returns `Ok(None)` at end of
	/// input.
	pub fn parse_top_level(&mut self) -> Result<Option<Ast>> {
		self.skip_whitespace();
		if self.peek().is_none() {
			return Ok(None);
		}
		let form = self.parse_atom()?;
		self.free_consumed();
		Ok(Some(form))
	}

	fn parse_atom(&mut self) -> Result<Ast> {
		self.skip_whitespace();
		let start = self.pos;
		match self.peek() {
			Some(b @ (b'(' | b'[' | b'{')) => {
				self.advance();
				let close = closing_for(b);
				let items = self.parse_sequence(close, start)?;
				Ok(if b == b'{' { mapify(items) } else { list(items) })
			}
			Some(b'"') => self.parse_string(b'"'),
			Some(b'\'') => self.parse_string(b'\''),
			Some(b) if is_delimiter(b) => Err(Error::parse(
				format!("unexpected closing {}", delimiter_name(b)),
				start,
			)),
			Some(_) => self.parse_word(),
			None => Err(Error::parse("unexpected end of input", start)),
		}
	}

	fn parse_sequence(&mut self, close: u8, opener_pos: usize) -> Result<Vec<Ast>> {
		let mut items = Vec::new();
		loop {
			self.skip_whitespace();
			match self.peek() {
				None => {
					return Err(Error::parse(
						format!(
							"unterminated {} starting here, reached end of input",
							delimiter_name(close)
						),
						opener_pos,
					))
				}
				Some(b) if b == close => {
					self.advance();
					return Ok(items);
				}
				Some(b) if is_delimiter(b) => {
					return Err(Error::parse(
						format!(
							"mismatched closing {}: expected {}",
							delimiter_name(b),
							delimiter_name(close)
						),
						self.pos,
					))
				}
				_ => items.push(self.parse_atom()?),
			}
		}
	}

	fn parse_string(&mut self, quote: u8) -> Result<Ast> {
		let start = self.pos;
		self.advance(); // opening quote
		let mut bytes = Vec::new();
		loop {
			match self.advance() {
				None => {
					return Err(Error::parse("unterminated string literal", start));
				}
				Some(b'\\') => match self.advance() {
					None => return Err(Error::parse("unterminated string literal", start)),
					Some(escaped) => bytes.push(decode_escape(escaped)),
				},
				Some(b) if b == quote => {
					let text = String::from_utf8(bytes)
						.map_err(|_| Error::parse("string literal is not valid UTF-8", start))?;
					return Ok(Ast::Str(text.into()));
				}
				Some(b) => bytes.push(b),
			}
		}
	}

	fn parse_word(&mut self) -> Result<Ast> {
		let start = self.pos;
		let mut bytes = Vec::new();
		while let Some(b) = self.peek() {
			if is_whitespace(b) || is_delimiter(b) {
				break;
			}
			bytes.push(b);
			self.advance();
		}
		let word = String::from_utf8(bytes)
			.map_err(|_| Error::parse("word is not valid UTF-8", start))?;
		Ok(resolve_word(&word))
	}
}

fn decode_escape(b: u8) -> u8 {
	match b {
		b'n' => b'\n',
		b't' => b'\t',
		b'r' => b'\r',
		b'0' => 0,
		other => other,
	}
}

fn resolve_word(word: &str) -> Ast {
	match word {
		"nil" => Ast::Nil,
		"true" => Ast::Bool(true),
		"false" => Ast::Bool(false),
		_ => {
			if let Ok(n) = word.parse::<f64>() {
				Ast::Number(n)
			} else {
				sym(word)
			}
		}
	}
}

/// Parses every top-level form from `reader`. If `dispatch` is given, it is
/// invoked once per form as soon as that form is complete; the full list of
/// parsed forms is returned either way.
pub fn parse_all(reader: &mut Reader, mut dispatch: Option<&mut dyn FnMut(Ast)>) -> Result<Vec<Ast>> {
	let mut parser = Parser::new(reader);
	let mut forms = Vec::new();
	while let Some(form) = parser.parse_top_level()? {
		if let Some(cb) = dispatch.as_deref_mut() {
			cb(form.clone());
		}
		forms.push(form);
	}
	Ok(forms)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse_one(src: &str) -> Ast {
		let mut reader = Reader::from_str(src);
		let forms = parse_all(&mut reader, None).unwrap();
		assert_eq!(forms.len(), 1, "expected exactly one top-level form in {src:?}");
		forms.into_iter().next().unwrap()
	}

	#[test]
	fn parses_scalars() {
		assert_eq!(parse_one("nil"), Ast::Nil);
		assert_eq!(parse_one("true"), Ast::Bool(true));
		assert_eq!(parse_one("false"), Ast::Bool(false));
		assert_eq!(parse_one("42"), Ast::Number(42.0));
		assert_eq!(parse_one("3.5"), Ast::Number(3.5));
		assert_eq!(parse_one("foo"), sym("foo"));
	}

	#[test]
	fn parses_nested_list() {
		let ast = parse_one("(+ 1 (- 2 3))");
		let items = ast.as_list().unwrap();
		assert_eq!(items[0], sym("+"));
		assert_eq!(items[1], Ast::Number(1.0));
		assert!(items[2].is_list());
	}

	#[test]
	fn parses_vector_as_list() {
		let ast = parse_one("[a b]");
		assert_eq!(ast.as_list().unwrap().len(), 2);
	}

	#[test]
	fn parses_map_with_trailing_key_dropped() {
		let ast = parse_one("{:a 1 :b 2 :dangling}");
		let pairs = ast.as_map().unwrap();
		assert_eq!(pairs.len(), 2);
	}

	#[test]
	fn parses_string_with_escapes() {
		let ast = parse_one(r#""a\nb\"c""#);
		assert_eq!(ast.as_str().unwrap(), "a\nb\"c");
	}

	#[test]
	fn odd_backslashes_escape_closing_quote() {
		// \\\" is an escaped backslash followed by an escaped quote, so the
		// string does not end there.
		let ast = parse_one(r#""x\\\"y""#);
		assert_eq!(ast.as_str().unwrap(), "x\\\"y");
	}

	#[test]
	fn unmatched_closing_delimiter_is_an_error() {
		let mut reader = Reader::from_str(")");
		assert!(parse_all(&mut reader, None).is_err());
	}

	#[test]
	fn unterminated_list_is_an_error() {
		let mut reader = Reader::from_str("(+ 1 2");
		assert!(parse_all(&mut reader, None).is_err());
	}

	#[test]
	fn mismatched_delimiter_is_an_error() {
		let mut reader = Reader::from_str("(+ 1 2]");
		assert!(parse_all(&mut reader, None).is_err());
	}

	#[test]
	fn dispatch_mode_invokes_callback_per_form() {
		let mut reader = Reader::from_str("1 2 3");
		let mut seen = Vec::new();
		let mut cb = |ast: Ast| seen.push(ast);
		let forms = parse_all(&mut reader, Some(&mut cb)).unwrap();
		assert_eq!(forms.len(), 3);
		assert_eq!(seen.len(), 3);
	}
}
