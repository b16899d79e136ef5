//! A source-to-source compiler from a parenthesized S-expression language
//! into a Lua dialect.
//!
//! The pipeline mirrors §2 of the design: [`reader`] → [`parser`] →
//! (macro expansion + [`compiler`], consulting [`scope`]; [`specials`]
//! emit into a [`chunk`] tree) → [`chunk::assemble`] → target text. See
//! [`bridge`] for the compile-time reflective escape hatch and [`interp`]
//! for the small evaluator it and [`eval_source`] run against.

pub mod ast;
pub mod bridge;
pub mod chunk;
pub mod compiler;
pub mod error;
pub mod interp;
pub mod parser;
pub mod reader;
pub mod scope;
pub mod serializer;
pub mod specials;

pub use ast::{list, mapify, sym, Ast};
pub use error::{Error, Result};
pub use reader::Reader;
pub use scope::Scope;
pub use serializer::ast_to_string;

use std::rc::Rc;

use chunk::Chunk;
use compiler::compile_statement;

/// Options accepted by [`compile`] and [`compile_ast`].
#[derive(Clone, Default)]
pub struct CompileOptions {
	/// A pre-built scope to compile against (e.g. one seeded by a prior
	/// `*compiler` invocation). Defaults to a fresh root scope over the
	/// built-in specials.
	pub scope: Option<Scope>,
	/// The assembler's per-level indent string. Defaults to two spaces.
	pub tab: String,
}

impl CompileOptions {
	fn resolve_scope(&self) -> Scope {
		self.scope.clone().unwrap_or_else(|| Scope::root(specials::builtin_specials()))
	}

	fn resolve_tab(&self) -> String {
		if self.tab.is_empty() {
			chunk::DEFAULT_INDENT.to_string()
		} else {
			self.tab.clone()
		}
	}
}

/// Parses every top-level form out of `source`. If `dispatch` is given, it
/// is invoked once per form as soon as it is complete; either way the full
/// list of parsed forms is returned.
pub fn parse(source: &str, dispatch: Option<&mut dyn FnMut(Ast)>) -> Result<Vec<Ast>> {
	let _span = tracing::debug_span!("parse", bytes = source.len()).entered();
	let mut reader = Reader::from_str(source);
	parser::parse_all(&mut reader, dispatch)
}

/// Parses every top-level form out of a streaming [`Reader`] built from a
/// pull callback (see [`create_reader`]).
pub fn parse_reader(reader: &mut Reader, dispatch: Option<&mut dyn FnMut(Ast)>) -> Result<Vec<Ast>> {
	parser::parse_all(reader, dispatch)
}

/// Compiles a full source string: each top-level form is compiled
/// independently, in order, and the last is compiled with its value
/// returned from the emitted chunk.
pub fn compile(source: &str, options: &CompileOptions) -> Result<String> {
	let _span = tracing::debug_span!("compile").entered();
	let forms = parse(source, None)?;
	compile_forms(&forms, options)
}

/// Compiles a single, already-parsed top-level form the same way
/// [`compile`] would treat the sole form of a source unit.
pub fn compile_ast(ast: &Ast, options: &CompileOptions) -> Result<String> {
	compile_forms(std::slice::from_ref(ast), options)
}

fn compile_forms(forms: &[Ast], options: &CompileOptions) -> Result<String> {
	let _span = tracing::debug_span!("compile_forms", forms = forms.len()).entered();
	let scope = options.resolve_scope();
	let mut root = Chunk::new();

	if forms.is_empty() {
		return Ok(String::new());
	}

	let (leading, tail) = forms.split_at(forms.len() - 1);
	for form in leading {
		compile_statement(form, &scope, &mut root)?;
	}
	let tail_result = compiler::compile_expr(&tail[0], &scope, &mut root)?;
	let rhs = if tail_result.expr.is_empty() {
		"nil".to_string()
	} else {
		tail_result.expr.join(", ")
	};
	root.push_line(format!("return {rhs}"));

	Ok(chunk::assemble(&root, &options.resolve_tab()))
}

/// Compiles `source` and interprets it directly against the embedded
/// evaluator in [`interp`], returning the last form's value. This stands
/// in for the original design's "compile, load through the host, and run"
/// `eval`: there is no host loader to hand emitted target text to, so the
/// parsed forms run straight through the interpreter instead.
pub fn eval_source(source: &str, options: &CompileOptions) -> Result<interp::Value> {
	let forms = parse(source, None)?;
	let scope = options.resolve_scope();
	let env = interp::Env::root_with_builtins();
	let mut result = interp::Value::Ast(Ast::Nil);
	for form in &forms {
		result = interp::eval(form, &env, &scope)?;
	}
	Ok(result)
}

/// Builds a scope: a fresh root scope if `parent` is `None`, otherwise a
/// child of `parent`.
pub fn scope(parent: Option<&Scope>) -> Scope {
	match parent {
		Some(p) => p.child(),
		None => Scope::root(specials::builtin_specials()),
	}
}

/// Generates a fresh, never-before-used target identifier in `scope`.
pub fn gensym(scope: &Scope) -> Rc<str> {
	scope.gensym()
}

/// Builds a streaming [`Reader`] over a pull callback, for inputs that
/// can't be materialized as a single string up front.
pub fn create_reader(pull: impl FnMut() -> Option<Vec<u8>> + 'static) -> Reader {
	Reader::from_pull(pull)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn compiles_simple_arithmetic() {
		let text = compile("(+ 1 2)", &CompileOptions::default()).unwrap();
		assert_eq!(text.trim(), "return (1 + 2)");
	}

	#[test]
	fn compiles_var_set_sequence() {
		let text = compile("(var x 10) (set x (+ x 1)) x", &CompileOptions::default()).unwrap();
		assert!(text.contains("local x = 10"));
		assert!(text.contains("x = (x + 1)"));
		assert!(text.trim_end().ends_with("return x"));
	}

	#[test]
	fn compiles_branch_example() {
		let text = compile(
			r#"(*branch (= x 0) "zero" *branch else "nonzero")"#,
			&CompileOptions::default(),
		)
		.unwrap();
		assert!(text.contains("if"));
		assert!(text.contains("== (0)"));
		assert!(text.contains("else"));
	}

	#[test]
	fn compiles_for_loop_example() {
		let text = compile("(*for i [1 10] (set s (+ s i)))", &CompileOptions::default()).unwrap();
		assert!(text.contains("for "));
		assert!(text.contains(" = 1, 10 do"));
		assert!(text.contains("s = (s + i)"));
	}

	#[test]
	fn compiles_fn_definition_example() {
		let text = compile(
			"(fn add [a b] (+ a b))",
			&CompileOptions::default(),
		)
		.unwrap();
		assert!(text.contains("local function"));
		assert!(text.contains("(a + b)"));
		assert!(text.trim_end().ends_with("return add"));
	}

	#[test]
	fn compiles_do_block_example() {
		let text = compile("(do (var a 1) (+ a 2))", &CompileOptions::default()).unwrap();
		assert!(text.contains("do"));
		assert!(text.contains("local a = 1"));
		assert!(text.trim_end().starts_with("local "));
	}

	#[test]
	fn eval_source_runs_compile_time_code_through_the_interpreter() {
		let value = eval_source("(+ 1 (- 5 2))", &CompileOptions::default()).unwrap();
		assert_eq!(value.into_ast().unwrap(), Ast::Number(4.0));
	}

	#[test]
	fn gensym_names_are_unique_across_calls() {
		let scope = scope(None);
		let a = gensym(&scope);
		let b = gensym(&scope);
		assert_ne!(a, b);
	}
}
