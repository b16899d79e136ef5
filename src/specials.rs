//! One emitter per primitive construct (§4.G). Each function matches the
//! [`SpecialFn`] signature and is installed into the root scope's table by
//! [`builtin_specials`]; child scopes inherit the whole table through
//! [`Scope::lookup_special`]'s parent-chain walk, so nothing here is
//! process-wide mutable state.

use std::collections::HashMap;

use crate::ast::Ast;
use crate::bridge::compiler_special;
use crate::chunk::Chunk;
use crate::compiler::{compile_expr, compile_statement, toss_rest, toss_rest_emitting, CompileResult};
use crate::error::{Error, Result};
use crate::scope::{Scope, SpecialFn};

pub fn builtin_specials() -> HashMap<&'static str, SpecialFn> {
	let mut specials: HashMap<&'static str, SpecialFn> = HashMap::new();
	specials.insert("fn", fn_special);
	specials.insert(".", dot_special);
	specials.insert("var", var_special);
	specials.insert("set", set_special);
	specials.insert("--", comment_special);
	specials.insert("block", block_special);
	specials.insert("do", do_special);
	specials.insert("values", values_special);
	specials.insert("*branch", branch_special);
	specials.insert("*while", while_special);
	specials.insert("*dowhile", dowhile_special);
	specials.insert("*for", for_special);
	specials.insert("*break", break_special);
	specials.insert("*compiler", compiler_special);

	specials.insert("+", plus_special);
	specials.insert("..", concat_special);
	specials.insert("^", pow_special);
	specials.insert("-", minus_special);
	specials.insert("*", times_special);
	specials.insert("%", mod_special);
	specials.insert("/", div_special);
	specials.insert("or", or_special);
	specials.insert("and", and_special);

	specials.insert(">", gt_special);
	specials.insert("<", lt_special);
	specials.insert(">=", ge_special);
	specials.insert("<=", le_special);
	specials.insert("=", eq_special);
	specials.insert("~=", ne_special);

	specials.insert("not", not_special);
	specials.insert("#", len_special);

	specials
}

fn form_error(form: &str, message: &str) -> Error {
	Error::form(form, message)
}

// ---------------------------------------------------------------- fn --

fn fn_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let mut idx = 0;
	let explicit_name = match args.first() {
		Some(Ast::Symbol(name)) => {
			idx = 1;
			Some(name.clone())
		}
		_ => None,
	};

	let params_ast = args.get(idx).ok_or_else(|| form_error("fn", "missing parameter vector"))?;
	let params = params_ast
		.as_list()
		.ok_or_else(|| form_error("fn", "second element must be a parameter vector"))?;
	idx += 1;
	let body = &args[idx..];

	let is_variadic = params.last().and_then(Ast::as_symbol) == Some("...");
	let func_scope = scope.child_with_vararg(is_variadic);

	let mangled_name = match explicit_name {
		Some(name) => scope.mangle(&name)?,
		None => scope.gensym(),
	};

	let mut param_names = Vec::with_capacity(params.len());
	for param in params {
		let name = param
			.as_symbol()
			.ok_or_else(|| form_error("fn", "parameters must be symbols"))?;
		param_names.push(func_scope.mangle(name)?.to_string());
	}

	chunk.push_line(format!("local function {mangled_name}({})", param_names.join(", ")));
	{
		let body_chunk = chunk.push_block();
		emit_function_body(body, &func_scope, body_chunk)?;
	}
	chunk.push_line("end");

	Ok(CompileResult::literal(mangled_name.to_string()))
}

fn emit_function_body(body: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<()> {
	if body.is_empty() {
		chunk.push_line("return nil");
		return Ok(());
	}
	for stmt in &body[..body.len() - 1] {
		compile_statement(stmt, scope, chunk)?;
	}
	let tail = compile_expr(&body[body.len() - 1], scope, chunk)?;
	if tail.expr.is_empty() {
		chunk.push_line("return nil");
	} else {
		chunk.push_line(format!("return {}", tail.expr.join(", ")));
	}
	Ok(())
}

// ----------------------------------------------------------------- . --

fn dot_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	Ok(CompileResult::literal(compile_index(args, scope, chunk)?))
}

fn compile_index(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<String> {
	if args.len() != 2 {
		return Err(form_error(".", "expects exactly 2 arguments: table and key"));
	}
	let table = toss_rest_emitting(compile_expr(&args[0], scope, chunk)?, scope, chunk)?;
	let key = toss_rest(compile_expr(&args[1], scope, chunk)?);
	Ok(format!("{table}[{key}]"))
}

// ----------------------------------------------------------- var / set --

fn var_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	assignment(args, scope, chunk, true)
}

fn set_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	assignment(args, scope, chunk, false)
}

fn assignment(args: &[Ast], scope: &Scope, chunk: &mut Chunk, declare: bool) -> Result<CompileResult> {
	if args.len() < 2 {
		let form = if declare { "var" } else { "set" };
		return Err(form_error(form, "expects one or more targets and a trailing expression"));
	}
	let (targets, expr_ast) = args.split_at(args.len() - 1);
	let expr_ast = &expr_ast[0];

	let mut mangled = Vec::with_capacity(targets.len());
	for target in targets {
		mangled.push(compile_target(target, scope, chunk)?);
	}

	let result = compile_expr(expr_ast, scope, chunk)?;
	let rhs = if result.expr.is_empty() {
		"nil".to_string()
	} else {
		result.expr.join(", ")
	};

	let prefix = if declare { "local " } else { "" };
	chunk.push_line(format!("{prefix}{} = {rhs}", mangled.join(", ")));

	// The assignment statement is already written above; `expr` is left
	// empty so a generic statement-position caller (`compile_statement`)
	// doesn't re-emit it as a second, bogus statement. `var`/`set` are not
	// used in expression position in the source language.
	Ok(CompileResult {
		expr: Vec::new(),
		side_effects: true,
		single_eval: false,
		valid_statement: true,
		scoped: declare,
		unknown_expr_count: false,
	})
}

/// Resolves an assignment target: a plain symbol, or a `(. t k)` index
/// form (so `(set (. t "x") 1)` lowers to `t["x"] = 1`).
fn compile_target(ast: &Ast, scope: &Scope, chunk: &mut Chunk) -> Result<String> {
	match ast {
		Ast::Symbol(name) => Ok(scope.mangle(name)?.to_string()),
		Ast::List(items) if items.first().and_then(Ast::as_symbol) == Some(".") => {
			compile_index(&items[1..], scope, chunk)
		}
		_ => Err(form_error("var/set", "target must be a symbol or a (. t k) form")),
	}
}

// ------------------------------------------------------------------ -- --

fn comment_special(args: &[Ast], _scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	for arg in args {
		let text = arg.as_str().ok_or_else(|| form_error("--", "every argument must be a string"))?;
		for line in text.lines() {
			chunk.push_line(format!("-- {line}"));
		}
	}
	Ok(CompileResult::nil())
}

// -------------------------------------------------------------- block --

fn block_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let child = scope.child();
	chunk.push_line("do");
	{
		let inner = chunk.push_block();
		for form in args {
			compile_statement(form, &child, inner)?;
		}
	}
	chunk.push_line("end");
	Ok(CompileResult::nil())
}

// ------------------------------------------------------------------ do --

fn do_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	if args.is_empty() {
		return Ok(CompileResult::nil());
	}

	let child = scope.child();
	let (leading, tail_ast) = args.split_at(args.len() - 1);
	let tail_ast = &tail_ast[0];

	let mut inner = Chunk::new();
	for stmt in leading {
		compile_statement(stmt, &child, &mut inner)?;
	}
	let tail = compile_expr(tail_ast, &child, &mut inner)?;

	if tail.unknown_expr_count {
		// Unknown arity can't survive being spliced into the parent chunk
		// as a plain expression, so wrap the whole body in an
		// immediately-invoked local function and forward `...` if the
		// enclosing scope is variadic.
		let fname = scope.gensym();
		let params = if scope.is_vararg() { "..." } else { "" };
		inner.push_line(format!("return {}", if tail.expr.is_empty() { "nil".to_string() } else { tail.expr.join(", ") }));
		chunk.push_line(format!("local function {fname}({params})"));
		chunk.push_chunk(inner);
		chunk.push_line("end");
		let call_args = if scope.is_vararg() { "..." } else { "" };
		return Ok(CompileResult::call(format!("{fname}({call_args})")));
	}

	if !leading.is_empty() || tail.scoped {
		// The tail's fragments may reference bindings introduced inside
		// this block's own scope, so they can't be read back once the
		// `do ... end` closes. Hoist fresh locals in the parent chunk and
		// assign the tail's values into them from inside the block.
		let targets: Vec<String> = if tail.expr.is_empty() {
			vec![scope.gensym().to_string()]
		} else {
			tail.expr.iter().map(|_| scope.gensym().to_string()).collect()
		};
		let rhs = if tail.expr.is_empty() { "nil".to_string() } else { tail.expr.join(", ") };
		inner.push_line(format!("{} = {rhs}", targets.join(", ")));

		chunk.push_line(format!("local {}", targets.join(", ")));
		chunk.push_line("do");
		chunk.push_chunk(inner);
		chunk.push_line("end");

		// The block's side effects already ran while assembling the chunk
		// above; reading `targets` back out is now just a local reference.
		return Ok(CompileResult {
			expr: targets,
			side_effects: false,
			single_eval: true,
			valid_statement: false,
			scoped: false,
			unknown_expr_count: false,
		});
	}

	// Nothing to hoist: the tail didn't touch any binding private to this
	// block, so its fragment text is safe to bubble straight up once the
	// block's own statements have run.
	if !inner.is_empty() {
		chunk.push_line("do");
		chunk.push_chunk(inner);
		chunk.push_line("end");
	}
	Ok(tail)
}

// -------------------------------------------------------------- values --

fn values_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	if args.is_empty() {
		return Ok(CompileResult::nil());
	}
	let (leading, tail_ast) = args.split_at(args.len() - 1);
	let mut exprs = Vec::with_capacity(args.len());
	for a in leading {
		// Each leading value's own side effects (if any) already ran as
		// part of binding it to a fresh name above; only the trailing
		// fragment's side effects are still pending for the caller.
		let result = compile_expr(a, scope, chunk)?;
		exprs.push(toss_rest_emitting(result, scope, chunk)?);
	}
	let tail = compile_expr(&tail_ast[0], scope, chunk)?;
	let side_effects = tail.side_effects;
	let unknown_expr_count = tail.unknown_expr_count;
	let single_eval = tail.single_eval;
	exprs.extend(tail.expr);

	Ok(CompileResult {
		expr: exprs,
		side_effects,
		single_eval,
		valid_statement: false,
		scoped: false,
		unknown_expr_count,
	})
}

// ----------------------------------------------------------- *branch --

fn branch_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let clauses = split_branch_clauses(args);
	let first = clauses
		.first()
		.ok_or_else(|| form_error("*branch", "expects at least one condition clause"))?;
	let (cond, body) = first
		.split_first()
		.ok_or_else(|| form_error("*branch", "first clause is missing a condition"))?;

	let cond_frag = toss_rest(compile_expr(cond, scope, chunk)?);
	chunk.push_line(format!("if {cond_frag} then"));
	{
		let child = scope.child();
		let inner = chunk.push_block();
		for stmt in body {
			compile_statement(stmt, &child, inner)?;
		}
	}

	for clause in &clauses[1..] {
		let (marker, rest) = clause
			.split_first()
			.ok_or_else(|| form_error("*branch", "clause is missing an else/elseif marker"))?;
		let marker_name = marker
			.as_symbol()
			.ok_or_else(|| form_error("*branch", "clause marker must be a symbol"))?;
		match marker_name {
			"else" => {
				chunk.push_line("else");
				let child = scope.child();
				let inner = chunk.push_block();
				for stmt in rest {
					compile_statement(stmt, &child, inner)?;
				}
			}
			"elseif" => {
				let (cond, body) = rest
					.split_first()
					.ok_or_else(|| form_error("*branch", "elseif is missing a condition"))?;
				let cond_frag = toss_rest(compile_expr(cond, scope, chunk)?);
				chunk.push_line(format!("elseif {cond_frag} then"));
				let child = scope.child();
				let inner = chunk.push_block();
				for stmt in body {
					compile_statement(stmt, &child, inner)?;
				}
			}
			other => return Err(form_error("*branch", &format!("expected `else` or `elseif`, got `{other}`"))),
		}
	}
	chunk.push_line("end");
	Ok(CompileResult::nil())
}

/// Splits a `*branch` form's argument list on the literal `*branch` marker
/// symbol that separates clauses. The first returned slice is the
/// `cond body...` clause; every slice after it starts with `else` or
/// `elseif`.
fn split_branch_clauses(args: &[Ast]) -> Vec<&[Ast]> {
	let mut clauses = Vec::new();
	let mut start = 0;
	for (i, a) in args.iter().enumerate() {
		if a.as_symbol() == Some("*branch") {
			clauses.push(&args[start..i]);
			start = i + 1;
		}
	}
	clauses.push(&args[start..]);
	clauses
}

// ------------------------------------------------------ *while/*dowhile --

fn while_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let (cond, body) = args.split_first().ok_or_else(|| form_error("*while", "expects a condition"))?;
	let cond_frag = toss_rest(compile_expr(cond, scope, chunk)?);
	chunk.push_line(format!("while {cond_frag} do"));
	{
		let child = scope.child();
		let inner = chunk.push_block();
		for stmt in body {
			compile_statement(stmt, &child, inner)?;
		}
	}
	chunk.push_line("end");
	Ok(CompileResult::nil())
}

fn dowhile_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let (cond, body) = args.split_first().ok_or_else(|| form_error("*dowhile", "expects a condition"))?;
	let child = scope.child();
	chunk.push_line("repeat");
	let mut inner = Chunk::new();
	for stmt in body {
		compile_statement(stmt, &child, &mut inner)?;
	}
	// `until`'s condition can see locals declared in the loop body, so it
	// is compiled in the child scope, with its own inner chunk.
	let cond_frag = toss_rest(compile_expr(cond, &child, &mut inner)?);
	chunk.push_chunk(inner);
	chunk.push_line(format!("until {cond_frag}"));
	Ok(CompileResult::nil())
}

// ------------------------------------------------------------- *for --

fn for_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	let (var_ast, rest) = args.split_first().ok_or_else(|| form_error("*for", "missing loop variable"))?;
	let name = var_ast.as_symbol().ok_or_else(|| form_error("*for", "loop variable must be a symbol"))?;
	let (bindings_ast, body) = rest.split_first().ok_or_else(|| form_error("*for", "missing bindings vector"))?;
	let bindings = bindings_ast
		.as_list()
		.ok_or_else(|| form_error("*for", "bindings must be a vector of start/end[/step]"))?;
	// A numeric `for` has no valid single-expression Lua rendering (`for i =
	// <expr> do` isn't legal Lua, which needs at least a comma-separated
	// start and end) — "one" expression in the bindings vector is treated
	// as the acknowledged typo for "two": the minimum is a start and an end.
	if bindings.len() < 2 || bindings.len() > 3 {
		return Err(form_error("*for", "bindings must supply start, end, and an optional step"));
	}

	let mut range_parts = Vec::with_capacity(bindings.len());
	for b in bindings {
		range_parts.push(toss_rest_emitting(compile_expr(b, scope, chunk)?, scope, chunk)?);
	}

	let child = scope.child();
	let mangled = child.mangle(name)?;

	chunk.push_line(format!("for {mangled} = {} do", range_parts.join(", ")));
	{
		let inner = chunk.push_block();
		for stmt in body {
			compile_statement(stmt, &child, inner)?;
		}
	}
	chunk.push_line("end");
	Ok(CompileResult::nil())
}

// ------------------------------------------------------------ *break --

fn break_special(_args: &[Ast], _scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	chunk.push_line("break");
	Ok(CompileResult::nil())
}

// ------------------------------------------------------- arithmetic --

fn arithmetic_op(
	args: &[Ast],
	scope: &Scope,
	chunk: &mut Chunk,
	lua_op: &str,
	identity: &str,
	unary_prefix: Option<&str>,
) -> Result<CompileResult> {
	if args.is_empty() {
		return Ok(CompileResult::literal(identity.to_string()));
	}
	if args.len() == 1 {
		let frag = toss_rest(compile_expr(&args[0], scope, chunk)?);
		let rendered = match unary_prefix {
			Some(prefix) => format!("({prefix}{frag})"),
			None => format!("({frag})"),
		};
		return Ok(CompileResult::literal(rendered));
	}
	let (leading, last) = args.split_at(args.len() - 1);
	let mut fragments = Vec::with_capacity(args.len());
	for a in leading {
		fragments.push(toss_rest_emitting(compile_expr(a, scope, chunk)?, scope, chunk)?);
	}
	fragments.push(toss_rest(compile_expr(&last[0], scope, chunk)?));
	Ok(CompileResult::literal(format!("({})", fragments.join(&format!(" {lua_op} ")))))
}

fn plus_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "+", "0", None)
}
fn concat_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "..", "\"\"", None)
}
fn pow_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "^", "1", None)
}
fn minus_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "-", "0", Some("-"))
}
fn times_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "*", "1", None)
}
fn mod_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "%", "0", None)
}
fn div_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "/", "1", None)
}
fn or_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "or", "false", None)
}
fn and_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	arithmetic_op(args, scope, chunk, "and", "true", None)
}

// ------------------------------------------------------- comparators --

fn comparator_op(args: &[Ast], scope: &Scope, chunk: &mut Chunk, form: &str, lua_op: &str) -> Result<CompileResult> {
	if args.len() != 2 {
		return Err(form_error(form, "expects exactly 2 operands"));
	}
	let lhs = toss_rest_emitting(compile_expr(&args[0], scope, chunk)?, scope, chunk)?;
	let rhs = toss_rest(compile_expr(&args[1], scope, chunk)?);
	Ok(CompileResult::literal(format!("(({lhs}) {lua_op} ({rhs}))")))
}

fn gt_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	comparator_op(args, scope, chunk, ">", ">")
}
fn lt_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	comparator_op(args, scope, chunk, "<", "<")
}
fn ge_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	comparator_op(args, scope, chunk, ">=", ">=")
}
fn le_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	comparator_op(args, scope, chunk, "<=", "<=")
}
fn eq_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	comparator_op(args, scope, chunk, "=", "==")
}
fn ne_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	comparator_op(args, scope, chunk, "~=", "~=")
}

// ------------------------------------------------------------- unary --

fn unary_op(args: &[Ast], scope: &Scope, chunk: &mut Chunk, form: &str, lua_op: &str) -> Result<CompileResult> {
	if args.len() != 1 {
		return Err(form_error(form, "expects exactly 1 operand"));
	}
	let frag = toss_rest(compile_expr(&args[0], scope, chunk)?);
	Ok(CompileResult::literal(format!("({lua_op} {frag})")))
}

fn not_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	unary_op(args, scope, chunk, "not", "not")
}
fn len_special(args: &[Ast], scope: &Scope, chunk: &mut Chunk) -> Result<CompileResult> {
	unary_op(args, scope, chunk, "#", "#")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{list, sym, Ast as A};
	use crate::chunk::assemble;

	fn compile_form(form: Ast) -> (CompileResult, String) {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		let result = compile_expr(&form, &scope, &mut chunk).unwrap();
		(result, assemble(&chunk, "  "))
	}

	#[test]
	fn plus_emits_infix_expression() {
		let (result, _) = compile_form(list(vec![sym("+"), A::Number(1.0), A::Number(2.0)]));
		assert_eq!(result.expr, vec!["(1 + 2)".to_string()]);
	}

	#[test]
	fn unary_minus_uses_prefix() {
		let (result, _) = compile_form(list(vec![sym("-"), A::Number(5.0)]));
		assert_eq!(result.expr, vec!["(-5)".to_string()]);
	}

	#[test]
	fn comparator_requires_exactly_two_operands() {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		let form = list(vec![sym("="), A::Number(1.0)]);
		assert!(compile_expr(&form, &scope, &mut chunk).is_err());
	}

	#[test]
	fn fn_emits_local_function_and_returns_its_name() {
		let (result, text) = compile_form(list(vec![
			sym("fn"),
			sym("add"),
			list(vec![sym("a"), sym("b")]),
			list(vec![sym("+"), sym("a"), sym("b")]),
		]));
		assert_eq!(result.expr.len(), 1);
		assert!(text.contains("local function"));
		assert!(text.contains("return (a + b)") || text.contains("return ("));
		assert!(text.trim_end().ends_with("end"));
	}

	#[test]
	fn var_then_set_reuses_mangling() {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		compile_expr(&list(vec![sym("var"), sym("x"), A::Number(10.0)]), &scope, &mut chunk).unwrap();
		compile_expr(
			&list(vec![sym("set"), sym("x"), list(vec![sym("+"), sym("x"), A::Number(1.0)])]),
			&scope,
			&mut chunk,
		)
		.unwrap();
		let text = assemble(&chunk, "  ");
		assert!(text.contains("local x = 10"));
		assert!(text.contains("x = (x + 1)"));
	}

	#[test]
	fn branch_emits_if_else_chain() {
		let (_, text) = compile_form(list(vec![
			sym("*branch"),
			list(vec![sym("="), sym("x"), A::Number(0.0)]),
			A::Str("zero".into()),
			sym("*branch"),
			sym("else"),
			A::Str("nonzero".into()),
		]));
		assert!(text.starts_with("if"));
		assert!(text.contains("else"));
		assert!(text.trim_end().ends_with("end"));
	}

	#[test]
	fn branch_with_trailing_marker_and_no_clause_is_a_form_error() {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		// A trailing `*branch` with nothing after it opens a clause with no
		// `else`/`elseif` marker to read — this must be a FormError, not a
		// silently-ignored no-op.
		let form = list(vec![
			sym("*branch"),
			list(vec![sym("="), sym("x"), A::Number(0.0)]),
			A::Str("zero".into()),
			sym("*branch"),
		]);
		let err = compile_expr(&form, &scope, &mut chunk).unwrap_err();
		assert!(err.to_string().contains("else"));
	}

	#[test]
	fn for_emits_numeric_for_loop() {
		let (_, text) = compile_form(list(vec![
			sym("*for"),
			sym("i"),
			list(vec![A::Number(1.0), A::Number(10.0)]),
			list(vec![sym("set"), sym("s"), list(vec![sym("+"), sym("s"), sym("i")])]),
		]));
		assert!(text.contains("for "));
		assert!(text.contains(" = 1, 10 do"));
	}

	#[test]
	fn for_emits_numeric_for_loop_with_step() {
		let (_, text) = compile_form(list(vec![
			sym("*for"),
			sym("i"),
			list(vec![A::Number(1.0), A::Number(10.0), A::Number(2.0)]),
			list(vec![sym("*break")]),
		]));
		assert!(text.contains(" = 1, 10, 2 do"));
	}

	#[test]
	fn for_with_a_single_binding_is_a_form_error() {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		let form = list(vec![
			sym("*for"),
			sym("i"),
			list(vec![A::Number(10.0)]),
			list(vec![sym("*break")]),
		]);
		assert!(compile_expr(&form, &scope, &mut chunk).is_err());
	}

	#[test]
	fn for_with_no_bindings_is_a_form_error() {
		let scope = Scope::root(builtin_specials());
		let mut chunk = Chunk::new();
		let form = list(vec![sym("*for"), sym("i"), list(vec![]), list(vec![sym("*break")])]);
		assert!(compile_expr(&form, &scope, &mut chunk).is_err());
	}

	#[test]
	fn do_with_preceding_statement_hoists_a_local() {
		let (result, text) = compile_form(list(vec![
			sym("do"),
			list(vec![sym("var"), sym("a"), A::Number(1.0)]),
			list(vec![sym("+"), sym("a"), A::Number(2.0)]),
		]));
		assert_eq!(result.expr.len(), 1);
		assert!(text.contains("local "));
		assert!(text.contains("do"));
	}
}
