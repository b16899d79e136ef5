//! The reader: a uniform, byte-addressable view over either a complete
//! string or a pull-based chunk source.
//!
//! This is `{buffer, offset, more?}` from the design: `offset` is the
//! absolute index of the byte that immediately precedes `buffer[0]`, so the
//! byte at absolute index `i` lives at `buffer[i - offset - 1]`. `offset`
//! only ever grows (via [`Reader::free`]), which is what lets the parser
//! release memory for fully-parsed regions of very long, or effectively
//! infinite, streaming input.

use crate::error::{Error, Result};

/// A pull callback supplying the next chunk of bytes, or `None` at the end
/// of the stream. Boxed so a [`Reader`] can be built over any closure,
/// including one that blocks on stdin — the reader itself never blocks; any
/// blocking happens inside the callback and is not the reader's concern.
pub type Pull = Box<dyn FnMut() -> Option<Vec<u8>>>;

pub struct Reader {
	buffer: Vec<u8>,
	offset: usize,
	more: Option<Pull>,
	exhausted: bool,
}

impl Reader {
	/// Builds a reader over a complete, already-available string.
	pub fn from_str(source: impl AsRef<str>) -> Self {
		Reader {
			buffer: source.as_ref().as_bytes().to_vec(),
			offset: 0,
			more: None,
			exhausted: true,
		}
	}

	/// Builds a reader over a pull callback, used by streaming callers
	/// (`create_reader`) that feed input incrementally.
	pub fn from_pull(pull: impl FnMut() -> Option<Vec<u8>> + 'static) -> Self {
		Reader { buffer: Vec::new(), offset: 0, more: Some(Box::new(pull)), exhausted: false }
	}

	/// Current `offset`: the absolute index of the last byte that has been
	/// freed (or zero if nothing has been freed yet).
	pub fn offset(&self) -> usize {
		self.offset
	}

	/// Pulls chunks from `more` until the buffer covers absolute index `i`
	/// or the stream is exhausted.
	fn fill_to(&mut self, i: usize) {
		while self.offset + self.buffer.len() < i {
			let Some(more) = self.more.as_mut() else {
				self.exhausted = true;
				break;
			};
			match more() {
				Some(chunk) if !chunk.is_empty() => self.buffer.extend(chunk),
				_ => {
					self.exhausted = true;
					break;
				}
			}
		}
	}

	/// Returns the byte at absolute index `i`, extending the buffer from
	/// `more` as needed. Fails if `i` addresses a byte that has already
	/// been freed (`i <= offset`) or if the stream ends before `i`.
	pub fn byte(&mut self, i: usize) -> Result<u8> {
		if i <= self.offset {
			return Err(Error::parse(
				format!("reader index {i} has already been freed (offset is {})", self.offset),
				i,
			));
		}
		self.fill_to(i);
		let local = i - self.offset - 1;
		self.buffer
			.get(local)
			.copied()
			.ok_or_else(|| Error::parse("unexpected end of input", i))
	}

	/// Returns whether a byte is available at absolute index `i` without
	/// treating the lack of one as an error — the idiomatic streaming-reader
	/// replacement for "index < length" from a bounded buffer.
	pub fn has_byte(&mut self, i: usize) -> bool {
		self.byte(i).is_ok()
	}

	/// Returns the inclusive byte range `[a, b]` as a string. Both bounds
	/// must be positive and at least `offset`.
	pub fn sub(&mut self, a: usize, b: usize) -> Result<String> {
		if a == 0 || b == 0 || a < self.offset || b < self.offset {
			return Err(Error::parse(
				format!("invalid reader range [{a}, {b}] (offset is {})", self.offset),
				a,
			));
		}
		if b < a {
			return Ok(String::new());
		}
		self.fill_to(b);
		let start = a.saturating_sub(self.offset + 1);
		let end = (b - self.offset).min(self.buffer.len());
		let bytes = self.buffer.get(start..end).unwrap_or(&[]);
		Ok(String::from_utf8_lossy(bytes).into_owned())
	}

	/// Discards bytes `[offset, i)` and advances `offset` to `i`. Idempotent
	/// for any `i` at or below the current offset.
	pub fn free(&mut self, i: usize) {
		if i > self.offset {
			let drop = (i - self.offset).min(self.buffer.len());
			self.buffer.drain(0..drop);
			self.offset = i;
		}
	}

	/// Whether the stream has signalled end-of-input beyond the currently
	/// buffered bytes. A string-backed reader is exhausted immediately; a
	/// streaming reader is conceptually unbounded until `more?` returns
	/// `None`.
	pub fn is_exhausted_at(&mut self, i: usize) -> bool {
		self.fill_to(i);
		self.exhausted && self.offset + self.buffer.len() < i
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn byte_reads_in_order() {
		let mut r = Reader::from_str("abc");
		assert_eq!(r.byte(1).unwrap(), b'a');
		assert_eq!(r.byte(2).unwrap(), b'b');
		assert_eq!(r.byte(3).unwrap(), b'c');
		assert!(r.byte(4).is_err());
	}

	#[test]
	fn free_advances_offset_and_rejects_stale_reads() {
		let mut r = Reader::from_str("hello");
		assert_eq!(r.sub(1, 5).unwrap(), "hello");
		r.free(3);
		assert_eq!(r.offset(), 3);
		assert!(r.byte(2).is_err());
		assert_eq!(r.byte(4).unwrap(), b'l');
		assert_eq!(r.sub(4, 5).unwrap(), "lo");
	}

	#[test]
	fn streaming_reader_pulls_chunks_lazily() {
		let mut chunks = vec!["ab".to_string(), "cd".to_string()].into_iter();
		let mut r = Reader::from_pull(move || chunks.next().map(|s| s.into_bytes()));
		assert_eq!(r.byte(1).unwrap(), b'a');
		assert_eq!(r.byte(4).unwrap(), b'd');
		assert!(r.byte(5).is_err());
	}
}
