//! Error model for the compiler.
//!
//! Every failure the compiler can produce is fatal to the current
//! `parse`/`compile`/`eval_source` call: there is no partial recovery (the
//! parser in particular does not attempt error recovery on malformed input).
//! Each variant carries enough context — a byte offset or an offending
//! symbol name — to produce a human-readable message.

/// Alias used throughout the crate; every fallible operation returns this.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
	/// Unexpected or unmatched delimiter, or an unterminated string.
	#[error("parse error at byte {offset}: {message}")]
	ParseError { message: String, offset: usize },

	/// A macro expansion produced a non-list form, or its head was not a
	/// symbol.
	#[error("macro error: {message}")]
	MacroError { message: String },

	/// A special form received arguments of the wrong shape.
	#[error("`{form}`: {message}")]
	FormError { form: String, message: String },

	/// `...` was referenced outside of a variadic scope.
	#[error("'...' is not allowed here (near `{name}`): scope is not variadic")]
	VarargNotAllowed { name: String },

	/// The reflective `*compiler` bridge failed to load or run its
	/// generated source.
	#[error("*compiler failed to load generated source: {message}")]
	BridgeError { message: String },

	/// Wraps another error with additional context, mirroring the
	/// `.at(context)` wrapper the teacher's compiler used to attach the
	/// name of the enclosing form to a lower-level failure.
	#[error("{context}: {source}")]
	Context {
		context: String,
		#[source]
		source: Box<Error>,
	},
}

impl Error {
	pub fn parse(message: impl Into<String>, offset: usize) -> Error {
		Error::ParseError { message: message.into(), offset }
	}

	pub fn macro_error(message: impl Into<String>) -> Error {
		Error::MacroError { message: message.into() }
	}

	pub fn form(form: impl Into<String>, message: impl Into<String>) -> Error {
		Error::FormError { form: form.into(), message: message.into() }
	}

	pub fn vararg_not_allowed(name: impl Into<String>) -> Error {
		Error::VarargNotAllowed { name: name.into() }
	}

	pub fn bridge(message: impl Into<String>) -> Error {
		Error::BridgeError { message: message.into() }
	}

	/// Attaches additional context (typically the name of the enclosing
	/// form or file) to an existing error.
	pub fn at(self, context: impl Into<String>) -> Error {
		Error::Context { context: context.into(), source: Box::new(self) }
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::ParseError { .. } => ErrorKind::Parse,
			Error::MacroError { .. } => ErrorKind::Macro,
			Error::FormError { .. } => ErrorKind::Form,
			Error::VarargNotAllowed { .. } => ErrorKind::Name,
			Error::BridgeError { .. } => ErrorKind::Bridge,
			Error::Context { .. } => ErrorKind::Context,
		}
	}
}

/// Convenience trait mirroring the teacher's `.at(context)` pattern, but
/// usable directly on a `Result` instead of only on an `Error`.
pub trait ResultExt<T> {
	fn at(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
	fn at(self, context: impl Into<String>) -> Result<T> {
		self.map_err(|e| e.at(context))
	}
}

/// Coarse classification used by callers (e.g. the CLI) that want to branch
/// on the kind of failure without matching the full [`Error`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Parse,
	Macro,
	Form,
	Name,
	Bridge,
	Context,
}
