//! The reflective `*compiler` special form (§4.J).
//!
//! `(*compiler <code>)` runs `<code>` immediately, at compile time, against
//! the embedded interpreter in [`crate::interp`], in an environment that
//! can reach back into the active [`Scope`] through `define-macro`. This
//! stands in for the original design's "compile, load through the host,
//! and invoke" bridge: there is no host loader here, so the code runs
//! directly rather than being round-tripped through emitted target text
//! first. It never produces expression fragments of its own.

use crate::ast::Ast;
use crate::chunk::Chunk;
use crate::compiler::CompileResult;
use crate::error::{Error, Result};
use crate::interp::{self, Env};
use crate::scope::Scope;

pub fn compiler_special(args: &[Ast], scope: &Scope, _chunk: &mut Chunk) -> Result<CompileResult> {
	let [code] = args else {
		return Err(Error::form("*compiler", "expects exactly 1 argument"));
	};
	let _span = tracing::debug_span!("compiler_bridge").entered();
	let env = Env::root_with_builtins();
	interp::eval(code, &env, scope).map_err(|e| Error::bridge(e.to_string()))?;
	Ok(CompileResult::nil())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{list, sym};
	use crate::specials::builtin_specials;

	#[test]
	fn compiler_bridge_installs_a_macro_into_the_active_scope() {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		let code = list(vec![
			sym("define-macro"),
			sym("double"),
			list(vec![sym("fn"), list(vec![sym("x")]), list(vec![sym("quote"), sym("doubled")])]),
		]);
		compiler_special(&[code], &scope, &mut chunk).unwrap();
		assert!(scope.lookup_macro("double").is_some());
	}

	#[test]
	fn compiler_bridge_emits_no_fragments() {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		let result = compiler_special(&[Ast::Nil], &scope, &mut chunk).unwrap();
		assert_eq!(result.expr, vec!["nil".to_string()]);
	}
}
