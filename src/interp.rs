//! A small tree-walking interpreter over [`Ast`] values.
//!
//! The target language in this redesign is compiled to text, not loaded
//! back into the process — there is no embedded Lua VM to hand the
//! reflective `*compiler` bridge. Instead `*compiler` and [`crate::eval_source`]
//! run compile-time S-language code directly against this interpreter,
//! which is sandboxed to [`Ast`] data and a handful of builtins and never
//! touches the host filesystem or process. See [`crate::bridge`] for how
//! `*compiler` wires this into macro installation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Ast;
use crate::error::{Error, Result};
use crate::scope::Scope;

#[derive(Clone)]
pub enum Value {
	Ast(Ast),
	Builtin(Rc<dyn Fn(&[Value]) -> Result<Value>>),
	Closure { params: Vec<Rc<str>>, body: Rc<[Ast]>, env: Env },
}

impl Value {
	pub fn into_ast(self) -> Result<Ast> {
		match self {
			Value::Ast(ast) => Ok(ast),
			_ => Err(Error::bridge("expected a plain data value, found a function")),
		}
	}

	fn truthy(&self) -> bool {
		match self {
			Value::Ast(ast) => ast.is_truthy(),
			_ => true,
		}
	}
}

struct EnvData {
	vars: HashMap<Rc<str>, Value>,
	parent: Option<Env>,
}

#[derive(Clone)]
pub struct Env(Rc<RefCell<EnvData>>);

impl Env {
	fn new(parent: Option<Env>) -> Env {
		Env(Rc::new(RefCell::new(EnvData { vars: HashMap::new(), parent })))
	}

	/// A fresh environment stocked with the small builtin set available to
	/// every `*compiler` invocation and `eval_source` call: basic
	/// arithmetic and AST constructors. Nothing here can perform I/O.
	pub fn root_with_builtins() -> Env {
		let env = Env::new(None);
		env.define("list", Value::Builtin(Rc::new(builtin_list)));
		env.define("sym", Value::Builtin(Rc::new(builtin_sym)));
		env.define("+", Value::Builtin(Rc::new(|args| builtin_numeric_fold(args, 0.0, |a, b| a + b))));
		env.define("-", Value::Builtin(Rc::new(builtin_minus)));
		env.define("*", Value::Builtin(Rc::new(|args| builtin_numeric_fold(args, 1.0, |a, b| a * b))));
		env
	}

	fn define(&self, name: impl Into<Rc<str>>, value: Value) {
		self.0.borrow_mut().vars.insert(name.into(), value);
	}

	fn lookup(&self, name: &str) -> Option<Value> {
		let data = self.0.borrow();
		if let Some(v) = data.vars.get(name) {
			return Some(v.clone());
		}
		data.parent.as_ref().and_then(|p| p.lookup(name))
	}

	fn child(parent: &Env) -> Env {
		Env::new(Some(parent.clone()))
	}
}

fn as_number(value: &Value) -> Result<f64> {
	match value {
		Value::Ast(ast) => ast.as_number().ok_or_else(|| Error::bridge("expected a number")),
		_ => Err(Error::bridge("expected a number")),
	}
}

fn builtin_numeric_fold(args: &[Value], init: f64, op: impl Fn(f64, f64) -> f64) -> Result<Value> {
	let mut acc = init;
	for (i, a) in args.iter().enumerate() {
		let n = as_number(a)?;
		acc = if i == 0 && args.len() > 1 { n } else { op(acc, n) };
	}
	Ok(Value::Ast(Ast::Number(acc)))
}

fn builtin_minus(args: &[Value]) -> Result<Value> {
	match args {
		[] => Ok(Value::Ast(Ast::Number(0.0))),
		[single] => Ok(Value::Ast(Ast::Number(-as_number(single)?))),
		[first, rest @ ..] => {
			let mut acc = as_number(first)?;
			for a in rest {
				acc -= as_number(a)?;
			}
			Ok(Value::Ast(Ast::Number(acc)))
		}
	}
}

fn builtin_list(args: &[Value]) -> Result<Value> {
	let items = args.iter().cloned().map(|v| v.into_ast()).collect::<Result<Vec<_>>>()?;
	Ok(Value::Ast(crate::ast::list(items)))
}

fn builtin_sym(args: &[Value]) -> Result<Value> {
	let [only] = args else {
		return Err(Error::bridge("sym expects exactly 1 argument"));
	};
	match only {
		Value::Ast(Ast::Str(s)) => Ok(Value::Ast(crate::ast::sym(s.to_string()))),
		Value::Ast(Ast::Symbol(s)) => Ok(Value::Ast(crate::ast::sym(s.to_string()))),
		_ => Err(Error::bridge("sym expects a string or symbol argument")),
	}
}

/// Evaluates `ast` against `env`. `scope` is the active compile scope: it
/// is only consulted by `define-macro`, which is how compile-time code
/// reaches back into the compiler.
pub fn eval(ast: &Ast, env: &Env, scope: &Scope) -> Result<Value> {
	match ast {
		Ast::Number(_) | Ast::Str(_) | Ast::Bool(_) | Ast::Nil | Ast::Map(_) => Ok(Value::Ast(ast.clone())),
		Ast::Symbol(name) => env
			.lookup(name)
			.ok_or_else(|| Error::bridge(format!("undefined name `{name}` in compile-time code"))),
		Ast::List(items) => eval_list(items, env, scope),
	}
}

fn eval_list(items: &[Ast], env: &Env, scope: &Scope) -> Result<Value> {
	let Some(head) = items.first() else {
		return Ok(Value::Ast(Ast::Nil));
	};

	if let Some(name) = head.as_symbol() {
		match name {
			"quote" => {
				let [_, quoted] = items else {
					return Err(Error::bridge("quote expects exactly 1 argument"));
				};
				return Ok(Value::Ast(quoted.clone()));
			}
			"if" => return eval_if(&items[1..], env, scope),
			"do" => return eval_sequence(&items[1..], env, scope),
			"fn" | "lambda" => return eval_fn(&items[1..], env),
			"define-macro" => return eval_define_macro(&items[1..], env, scope),
			_ => {}
		}
	}

	let callee = eval(head, env, scope)?;
	let args = items[1..].iter().map(|a| eval(a, env, scope)).collect::<Result<Vec<_>>>()?;
	apply(callee, &args, scope)
}

fn eval_if(args: &[Ast], env: &Env, scope: &Scope) -> Result<Value> {
	let [cond, then_branch, rest @ ..] = args else {
		return Err(Error::bridge("if expects a condition and a then-branch"));
	};
	if eval(cond, env, scope)?.truthy() {
		eval(then_branch, env, scope)
	} else if let Some(else_branch) = rest.first() {
		eval(else_branch, env, scope)
	} else {
		Ok(Value::Ast(Ast::Nil))
	}
}

fn eval_sequence(body: &[Ast], env: &Env, scope: &Scope) -> Result<Value> {
	let mut result = Value::Ast(Ast::Nil);
	for expr in body {
		result = eval(expr, env, scope)?;
	}
	Ok(result)
}

fn eval_fn(args: &[Ast], env: &Env) -> Result<Value> {
	let (params_ast, body) = args.split_first().ok_or_else(|| Error::bridge("fn expects a parameter list"))?;
	let params_list = params_ast.as_list().ok_or_else(|| Error::bridge("fn's first argument must be a parameter list"))?;
	let params = params_list
		.iter()
		.map(|p| p.as_symbol().map(Rc::from).ok_or_else(|| Error::bridge("fn parameters must be symbols")))
		.collect::<Result<Vec<Rc<str>>>>()?;
	Ok(Value::Closure { params, body: Rc::from(body), env: env.clone() })
}

fn eval_define_macro(args: &[Ast], env: &Env, scope: &Scope) -> Result<Value> {
	let [name_ast, transformer_ast] = args else {
		return Err(Error::bridge("define-macro expects a name and a transformer"));
	};
	let name = name_ast
		.as_symbol()
		.ok_or_else(|| Error::bridge("define-macro's first argument must be a symbol"))?;
	let transformer = eval(transformer_ast, env, scope)?;
	scope.define_macro(name, wrap_as_macro(transformer, scope.clone()));
	Ok(Value::Ast(Ast::Nil))
}

/// Wraps an interpreted closure (or builtin) as a [`crate::scope::MacroFn`]:
/// a macro's call-time arguments arrive as plain `Ast` data, the closure
/// runs against them, and its result is taken back out as `Ast`.
fn wrap_as_macro(transformer: Value, scope: Scope) -> crate::scope::MacroFn {
	Rc::new(move |args: &[Ast]| -> Result<Ast> {
		let arg_values: Vec<Value> = args.iter().cloned().map(Value::Ast).collect();
		apply(transformer.clone(), &arg_values, &scope)?.into_ast()
	})
}

fn apply(callee: Value, args: &[Value], scope: &Scope) -> Result<Value> {
	match callee {
		Value::Builtin(f) => f(args),
		Value::Closure { params, body, env } => {
			if params.last().map(Rc::as_ref) != Some("...") && params.len() != args.len() {
				return Err(Error::bridge(format!(
					"compile-time function expected {} argument(s), got {}",
					params.len(),
					args.len()
				)));
			}
			let call_env = Env::child(&env);
			for (p, a) in params.iter().zip(args) {
				call_env.define(p.clone(), a.clone());
			}
			eval_sequence(&body, &call_env, scope)
		}
		Value::Ast(_) => Err(Error::bridge("attempt to call a non-function value")),
	}
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
	fn evaluates_quoted_data_literally() {
		let env = Env::root_with_builtins();
		let scope = root_scope();
		let form = list(vec![sym("quote"), list(vec![sym("a"), sym("b")])]);
		let result = eval(&form, &env, &scope).unwrap();
		assert_eq!(result.into_ast().unwrap(), list(vec![sym("a"), sym("b")]));
	}

	#[test]
	fn applies_a_closure() {
		let env = Env::root_with_builtins();
		let scope = root_scope();
		let form = list(vec![
			list(vec![sym("fn"), list(vec![sym("x")]), list(vec![sym("+"), sym("x"), Ast::Number(1.0)])]),
			Ast::Number(41.0),
		]);
		let result = eval(&form, &env, &scope).unwrap();
		assert_eq!(result.into_ast().unwrap(), Ast::Number(42.0));
	}

	#[test]
	fn define_macro_installs_into_scope() {
		let env = Env::root_with_builtins();
		let scope = root_scope();
		let form = list(vec![
			sym("define-macro"),
			sym("double"),
			list(vec![sym("fn"), list(vec![sym("x")]), list(vec![sym("quote"), sym("doubled")])]),
		]);
		eval(&form, &env, &scope).unwrap();
		assert!(scope.lookup_macro("double").is_some());
	}

	#[test]
	fn if_picks_the_right_branch() {
		let env = Env::root_with_builtins();
		let scope = root_scope();
		let form = list(vec![sym("if"), Ast::Bool(false), list(vec![sym("quote"), sym("yes")]), list(vec![sym("quote"), sym("no")])]);
		assert_eq!(eval(&form, &env, &scope).unwrap().into_ast().unwrap(), sym("no"));
	}
}
