//! The expression compiler: recursive emission of target fragments,
//! threading compile-time metadata (§4.F) through every step.

use crate::ast::Ast;
use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::scope::Scope;

/// The metadata threaded through every call to [`compile_expr`]. `expr` is
/// the list of emitted target-language expression fragments — usually one,
/// sometimes many (a multi-value call, `values`, a multi-target
/// assignment).
#[derive(Clone, Debug, Default)]
pub struct CompileResult {
	pub expr: Vec<String>,
	pub side_effects: bool,
	pub single_eval: bool,
	pub valid_statement: bool,
	pub scoped: bool,
	pub unknown_expr_count: bool,
}

impl CompileResult {
	pub fn literal(fragment: impl Into<String>) -> CompileResult {
		CompileResult {
			expr: vec![fragment.into()],
			side_effects: false,
			single_eval: true,
			valid_statement: false,
			scoped: false,
			unknown_expr_count: false,
		}
	}

	pub fn call(fragment: impl Into<String>) -> CompileResult {
		CompileResult {
			expr: vec![fragment.into()],
			side_effects: true,
			single_eval: true,
			valid_statement: true,
			scoped: false,
			unknown_expr_count: true,
		}
	}

	pub fn nil() -> CompileResult {
		CompileResult::literal("nil")
	}

	fn single_fragment(&self) -> &str {
		self.expr.first().map(String::as_str).unwrap_or("nil")
	}
}

/// Compiles `ast` in the given scope, emitting any statements it needs into
/// `chunk`, and returns the resulting metadata. This is the single entry
/// point every special form and the top-level driver call back into.
pub fn compile_expr(ast: &Ast, scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let expanded = expand_macros(ast, scope)?;

	let Some(items) = expanded.as_list() else {
		return Ok(literal_result(&expanded, scope, chunk)?);
	};

	let Some(head) = items.first() else {
		return Ok(CompileResult::nil());
	};

	if let Some(name) = head.as_symbol() {
		if let Some(special) = scope.lookup_special(name) {
			// An empty `expr` from the emitter stays empty here — it means
			// the special form is purely a statement (`var`, `*branch`, ...)
			// with nothing further to emit as a value. Callers that need a
			// value regardless (`toss_rest`, argument lists) already treat
			// an empty list as `nil`.
			return special(&items[1..], scope, chunk);
		}
	}

	compile_application(items, scope, chunk)
}

/// Iteratively expands a macro-headed call until the head is no longer a
/// macro. Does not descend into sub-forms — those are expanded lazily the
/// next time `compile_expr` visits them.
fn expand_macros(ast: &Ast, scope: &Scope) -> Result<Ast> {
	let mut current = ast.clone();
	loop {
		let Some(items) = current.as_list() else {
			return Ok(current);
		};
		let Some(name) = items.first().and_then(Ast::as_symbol) else {
			return Ok(current);
		};
		let Some(transformer) = scope.lookup_macro(name) else {
			return Ok(current);
		};
		tracing::trace!(macro_name = name, "expanding macro");
		let expanded = transformer(&items[1..])?;
		if !expanded.is_list() {
			return Err(Error::macro_error(format!(
				"macro `{name}` produced a non-list form"
			)));
		}
		current = expanded;
	}
}

fn literal_result(ast: &Ast, scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	match ast {
		Ast::Symbol(name) => {
			let mangled = scope.mangle(name)?;
			Ok(CompileResult::literal(mangled.to_string()))
		}
		Ast::Number(n) => Ok(CompileResult::literal(format_number(*n))),
		Ast::Str(s) => Ok(CompileResult::literal(format_string(s))),
		Ast::Bool(true) => Ok(CompileResult::literal("true")),
		Ast::Bool(false) => Ok(CompileResult::literal("false")),
		Ast::Nil => Ok(CompileResult::literal("nil")),
		Ast::Map(pairs) => format_table(pairs, scope, chunk),
		Ast::List(_) => unreachable!("literal_result called on a List"),
	}
}

/// Round-trippable decimal rendering; Lua accepts both `42` and `42.0` as
/// numbers, so integral values are emitted without a decimal tail purely
/// for readability of the generated source.
pub fn format_number(n: f64) -> String {
	if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
		format!("{}", n as i64)
	} else {
		format!("{n:.17}")
			.trim_end_matches('0')
			.trim_end_matches('.')
			.to_string()
	}
}

pub fn format_string(s: &str) -> String {
	let mut out = String::with_capacity(s.len() + 2);
	out.push('"');
	for byte in s.bytes() {
		match byte {
			b'"' => out.push_str("\\\""),
			b'\\' => out.push_str("\\\\"),
			b'\n' => out.push_str("\\n"),
			b'\t' => out.push_str("\\t"),
			b'\r' => out.push_str("\\r"),
			0..=31 | 128..=255 => out.push_str(&format!("\\{byte}")),
			_ => out.push(byte as char),
		}
	}
	out.push('"');
	out
}

fn format_table(pairs: &[(Ast, Ast)], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let mut fields = Vec::with_capacity(pairs.len());
	for (key, value) in pairs {
		let value_frag = toss_rest_emitting(compile_expr(value, scope, chunk)?, scope, chunk)?;
		match key.as_number() {
			Some(n) if n.fract() == 0.0 && n >= 1.0 => {
				fields.push(value_frag);
			}
			_ => {
				let key_frag = toss_rest_emitting(literal_result(key, scope, chunk)?, scope, chunk)?;
				fields.push(format!("[{key_frag}] = {value_frag}"));
			}
		}
	}
	Ok(CompileResult::literal(format!("{{{}}}", fields.join(", "))))
}

/// Compiles a function-application form: callee and all but the last
/// argument under toss-rest, the last argument in full arity so its
/// multi-value tail can flow into the call.
fn compile_application(items: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let callee = toss_rest_emitting(compile_expr(&items[0], scope, chunk)?, scope, chunk)?;
	let args = items[1..].to_vec();
	let rendered = render_args(&args, scope, chunk)?;
	Ok(CompileResult::call(format!("{callee}({rendered})")))
}

/// Renders an argument list with toss-rest applied to every element except
/// the last, which is compiled in full arity. Every dropped fragment's side
/// effects are emitted as statements before the call, preserving source
/// evaluation order (§8 invariant 4).
pub fn render_args(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<String> {
	if args.is_empty() {
		return Ok(String::new());
	}
	let mut fragments = Vec::new();
	for arg in &args[..args.len() - 1] {
		fragments.push(toss_rest_emitting(compile_expr(arg, scope, chunk)?, scope, chunk)?);
	}
	let tail = compile_expr(&args[args.len() - 1], scope, chunk)?;
	fragments.extend(tail.expr);
	Ok(fragments.join(", "))
}

/// Collapses a compile result to exactly one expression fragment,
/// preserving left-to-right evaluation order and side effects (§4.F
/// toss-rest semantics). Any statements this needs to emit (binding the
/// first fragment to a fresh name, running the remaining fragments for
/// their side effects) should already be in the chunk the result was
/// produced against; this function only ever touches `result.expr`.
pub fn toss_rest(result: CompileResult) -> String {
	match result.expr.len() {
		0 => "nil".to_string(),
		1 => result.expr.into_iter().next().unwrap(),
		_ => result.single_fragment().to_string(),
	}
}

/// Like [`toss_rest`] but also emits the side-effect statements for the
/// dropped fragments into `chunk`, naming the first fragment with a fresh
/// local when there is more than one and any of them has side effects.
/// This is the full version of toss-rest used wherever the statement
/// emission actually matters (arithmetic operands, `values`, assignment
/// targets); [`toss_rest`] alone suffices for pure literal collapsing.
pub fn toss_rest_emitting(result: CompileResult, scope: &Scope, chunk: &mut Chunk) -> Result<String> {
	if result.expr.len() <= 1 {
		return Ok(toss_rest(result));
	}
	let mut fragments = result.expr.into_iter();
	let first = fragments.next().unwrap();
	let name = if result.side_effects {
		let name = scope.gensym();
		chunk.push_line(format!("local {name} = {first}"));
		name.to_string()
	} else {
		return Ok(first);
	};
	for extra in fragments {
		compile_do(&extra, true, chunk);
	}
	Ok(name)
}

fn compile_do(fragment: &str, side_effects: bool, chunk: &mut Chunk) {
	if !side_effects {
		return;
	}
	chunk.push_line(format!("do local _ = {fragment} end"));
}

/// Emits a compile result as a statement in `chunk`: if it has fragments
/// and side effects, emit them; wrap in a `do local _ = … end` guard when
/// the fragment isn't already a legal standalone statement.
pub fn compile_statement(ast: &Ast, scope: &Scope, chunk: &mut Chunk) -> Result<()> {
	let result = compile_expr(ast, scope, chunk)?;
	if result.expr.is_empty() || !result.side_effects {
		return Ok(());
	}
	for fragment in &result.expr {
		if result.valid_statement {
			chunk.push_line(fragment.clone());
		} else {
			chunk.push_line(format!("do local _ = {fragment} end"));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{list, sym};
	use crate::specials::builtin_specials;

	fn root_scope() -> Scope {
		Scope::root(builtin_specials())
	}

	#[test]
	fn literal_number_compiles_to_itself() {
		let scope = root_scope();
		let mut chunk = Chunk::new();
		let result = compile_expr(&Ast::Number(42.0), &scope, &mut chunk).unwrap();
		assert_eq!(result.expr, vec!["42".to_string()]);
	}

	#[test]
	fn symbol_compiles_to_its_mangling() {
		let scope = root_scope();
		let mangled = scope.mangle("end").unwrap();
		let mut chunk = Chunk::new();
		let result = compile_expr(&sym("end"), &scope, &mut chunk).unwrap();
		assert_eq!(result.expr, vec![mangled.to_string()]);
	}

	#[test]
	fn application_preserves_argument_order() {
		let scope = root_scope();
		let mut chunk = Chunk::new();
		let form = list(vec![sym("f"), sym("a"), sym("b")]);
		let result = compile_expr(&form, &scope, &mut chunk).unwrap();
		assert_eq!(result.expr.len(), 1);
		assert!(result.expr[0].starts_with("f("));
		assert!(result.expr[0].contains(", "));
	}

	#[test]
	fn toss_rest_collapses_to_one_fragment() {
		let result = CompileResult {
			expr: vec!["a".to_string(), "b".to_string(), "c".to_string()],
			..CompileResult::default()
		};
		assert_eq!(toss_rest(result), "a");
	}

	#[test]
	fn string_literal_escapes_high_bytes() {
		let s = format_string("caf\u{e9}");
		assert!(s.contains("\\"));
	}

	#[test]
	fn non_final_argument_with_multiple_values_keeps_dropped_side_effects() {
		use crate::chunk::assemble;

		let scope = root_scope();
		let mut chunk = Chunk::new();
		// (f (values (g) (h)) b) — the dropped "(h)" fragment must still be
		// emitted as a statement before the call, not silently discarded.
		let form = list(vec![
			sym("f"),
			list(vec![sym("values"), list(vec![sym("g")]), list(vec![sym("h")])]),
			sym("b"),
		]);
		let result = compile_expr(&form, &scope, &mut chunk).unwrap();
		let text = assemble(&chunk, "  ");
		assert!(text.contains("= g()"), "expected the first value bound to a local, got: {text}");
		assert!(text.contains("h()"), "expected the dropped fragment's call to still appear, got: {text}");
		assert_eq!(result.expr.len(), 1);
	}
}
