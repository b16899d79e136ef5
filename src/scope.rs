//! Scope and identifier mangling.
//!
//! A [`Scope`] is a cheap, cloneable handle (`Rc<RefCell<..>>`) onto a
//! record of `{manglings, unmanglings, macros, specials, parent, vararg,
//! depth}`. Every lookup on `manglings`, `unmanglings`, `macros`, or
//! `specials` walks the parent chain until it finds an entry or runs out of
//! scopes; writes always land in the *current* scope only. This mirrors the
//! teacher's inherited-scope-chain pattern (`ScopeData`/`Scope` in
//! `byte/scope.rs`), generalized from "lexer matcher state" to "mangling +
//! macro + special-form tables".

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::Ast;
use crate::chunk::Chunk;
use crate::compiler::CompileResult;
use crate::error::{Error, Result};

pub const RESERVED_WORDS: &[&str] = &[
	"and", "break", "do", "else", "elseif", "end", "false", "for", "function", "if", "in", "local",
	"nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// A user-defined macro transformer: a compile-time function from the
/// call's argument forms to a replacement AST.
pub type MacroFn = Rc<dyn Fn(&[Ast]) -> Result<Ast>>;

/// A built-in special form's emitter. Receives the form's argument list
/// (everything after the head symbol), the scope it was called in, and the
/// chunk it should emit lines into.
pub type SpecialFn = fn(&[Ast], &Scope, &mut Chunk) -> Result<CompileResult>;

struct ScopeData {
	manglings: HashMap<Rc<str>, Rc<str>>,
	/// Target identifier -> source name, plus fresh names with no source
	/// counterpart. Used purely as a collision set: "does this target
	/// identifier already exist in this scope chain".
	unmanglings: HashMap<Rc<str>, Option<Rc<str>>>,
	macros: HashMap<Rc<str>, MacroFn>,
	specials: HashMap<&'static str, SpecialFn>,
	parent: Option<Scope>,
	vararg: bool,
	depth: usize,
}

#[derive(Clone)]
pub struct Scope(Rc<RefCell<ScopeData>>);

impl Scope {
	/// Builds a root scope. `specials` is the built-in set, constructed
	/// once by the caller (see [`crate::specials::builtin_specials`]) and
	/// installed here; every child scope inherits it by lookup rather than
	/// through any process-wide mutable table.
	pub fn root(specials: HashMap<&'static str, SpecialFn>) -> Scope {
		Scope(Rc::new(RefCell::new(ScopeData {
			manglings: HashMap::new(),
			unmanglings: HashMap::new(),
			macros: HashMap::new(),
			specials,
			parent: None,
			vararg: false,
			depth: 0,
		})))
	}

	/// Opens a child scope. Inherits the parent's `vararg` flag so nested
	/// `do`/`block`/branch-arm scopes within a variadic function can still
	/// reference `...`; `fn` overrides this explicitly based on its own
	/// parameter list.
	pub fn child(&self) -> Scope {
		let (vararg, depth) = {
			let data = self.0.borrow();
			(data.vararg, data.depth + 1)
		};
		Scope(Rc::new(RefCell::new(ScopeData {
			manglings: HashMap::new(),
			unmanglings: HashMap::new(),
			macros: HashMap::new(),
			specials: HashMap::new(),
			parent: Some(self.clone()),
			vararg,
			depth,
		})))
	}

	pub fn child_with_vararg(&self, vararg: bool) -> Scope {
		let scope = self.child();
		scope.0.borrow_mut().vararg = vararg;
		scope
	}

	pub fn depth(&self) -> usize {
		self.0.borrow().depth
	}

	pub fn is_vararg(&self) -> bool {
		self.0.borrow().vararg
	}

	pub fn lookup_special(&self, name: &str) -> Option<SpecialFn> {
		let data = self.0.borrow();
		if let Some(f) = data.specials.get(name) {
			return Some(*f);
		}
		data.parent.as_ref().and_then(|p| p.lookup_special(name))
	}

	pub fn lookup_macro(&self, name: &str) -> Option<MacroFn> {
		let data = self.0.borrow();
		if let Some(f) = data.macros.get(name) {
			return Some(f.clone());
		}
		data.parent.as_ref().and_then(|p| p.lookup_macro(name))
	}

	/// Installs a macro transformer in *this* scope (the reflective bridge
	/// is the only built-in form that calls this; user code never installs
	/// macros except through it).
	pub fn define_macro(&self, name: impl Into<Rc<str>>, transformer: MacroFn) {
		self.0.borrow_mut().macros.insert(name.into(), transformer);
	}

	fn lookup_mangling(&self, name: &str) -> Option<Rc<str>> {
		let data = self.0.borrow();
		if let Some(m) = data.manglings.get(name) {
			return Some(m.clone());
		}
		data.parent.as_ref().and_then(|p| p.lookup_mangling(name))
	}

	fn unmangling_taken(&self, candidate: &str) -> bool {
		let data = self.0.borrow();
		if data.unmanglings.contains_key(candidate) {
			return true;
		}
		data.parent.as_ref().map_or(false, |p| p.unmangling_taken(candidate))
	}

	/// Mangles a source identifier into a legal, unique target identifier,
	/// following the six-step algorithm from the design.
	pub fn mangle(&self, source_name: &str) -> Result<Rc<str>> {
		if source_name == "..." {
			return if self.is_vararg() {
				Ok(Rc::from("..."))
			} else {
				Err(Error::vararg_not_allowed(source_name))
			};
		}

		if let Some(existing) = self.lookup_mangling(source_name) {
			return Ok(existing);
		}

		let mut candidate = mangle_bytes(source_name);
		if RESERVED_WORDS.contains(&candidate.as_str()) || starts_with_non_identifier_char(&candidate) {
			candidate = format!("_{candidate}");
		}

		if self.unmangling_taken(&candidate) {
			let base = candidate.clone();
			let mut suffix = 0usize;
			loop {
				let attempt = format!("{base}{suffix}");
				if !self.unmangling_taken(&attempt) {
					candidate = attempt;
					break;
				}
				suffix += 1;
			}
		}

		let mangled: Rc<str> = Rc::from(candidate);
		let mut data = self.0.borrow_mut();
		data.manglings.insert(Rc::from(source_name), mangled.clone());
		data.unmanglings.insert(mangled.clone(), Some(Rc::from(source_name)));
		Ok(mangled)
	}

	/// Generates a fresh, never-before-used target identifier with no
	/// corresponding source name (used for compiler-internal temporaries).
	pub fn gensym(&self) -> Rc<str> {
		let mut n = 0usize;
		loop {
			let candidate = format!("_{n}");
			if !self.unmangling_taken(&candidate) {
				let name: Rc<str> = Rc::from(candidate);
				self.0.borrow_mut().unmanglings.insert(name.clone(), None);
				return name;
			}
			n += 1;
		}
	}
}

fn starts_with_non_identifier_char(s: &str) -> bool {
	s.chars().next().map_or(true, |c| !(c.is_ascii_alphabetic() || c == '_'))
}

/// Replaces every byte outside `[0-9A-Za-z_]` with a deterministic base-36
/// encoding of its byte value, so the result is always a legal identifier
/// body (modulo the reserved-word/leading-character fixups applied by the
/// caller).
fn mangle_bytes(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for byte in s.bytes() {
		let c = byte as char;
		if c.is_ascii_alphanumeric() || c == '_' {
			out.push(c);
		} else {
			out.push('_');
			out.push_str(&to_base36(byte));
		}
	}
	out
}

fn to_base36(mut value: u8) -> String {
	const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
	if value == 0 {
		return "0".to_string();
	}
	let mut digits = Vec::new();
	while value > 0 {
		digits.push(DIGITS[(value % 36) as usize]);
		value /= 36;
	}
	digits.reverse();
	String::from_utf8(digits).unwrap()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_scope() -> Scope {
		Scope::root(HashMap::new())
	}

	#[test]
	fn mangling_is_stable_and_reused() {
		let scope = test_scope();
		let a = scope.mangle("x").unwrap();
		let b = scope.mangle("x").unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn mangling_is_bijective_within_a_chain() {
		let scope = test_scope();
		let names = ["x", "end", "x-y", "x_y", "3d"];
		let mut mangled = HashSet::new();
		for name in names {
			let m = scope.mangle(name).unwrap();
			assert!(mangled.insert(m), "mangling produced a collision for {name}");
		}
	}

	#[test]
	fn reserved_words_are_prefixed() {
		let scope = test_scope();
		let m = scope.mangle("end").unwrap();
		assert!(!RESERVED_WORDS.contains(&m.as_ref()));
		assert!(m.starts_with('_'));
	}

	#[test]
	fn child_scope_reuses_parent_mangling() {
		let parent = test_scope();
		let m = parent.mangle("x").unwrap();
		let child = parent.child();
		assert_eq!(child.mangle("x").unwrap(), m);
	}

	#[test]
	fn gensym_never_collides_with_existing_manglings() {
		let scope = test_scope();
		// Force the scope to have already minted "_0" via mangling a name
		// that collides down to it, then make sure gensym skips past it.
		scope.mangle("_0").unwrap();
		let g = scope.gensym();
		assert_ne!(g.as_ref(), "_0");
	}

	#[test]
	fn vararg_rejected_outside_variadic_scope() {
		let scope = test_scope();
		assert!(scope.mangle("...").is_err());
		let variadic = scope.child_with_vararg(true);
		assert_eq!(variadic.mangle("...").unwrap().as_ref(), "...");
	}

	#[test]
	fn vararg_inherited_by_plain_child_scopes() {
		let scope = test_scope().child_with_vararg(true);
		let block = scope.child();
		assert!(block.is_vararg());
	}
}
