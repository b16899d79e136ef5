//! AST → re-parseable source text.
//!
//! This is the contract from spec §6: `parse(ast_to_string(x))` must
//! structurally equal `x` for any AST built only from Lists, Symbols, Maps
//! (without key collisions across representations), 7-bit-safe Strings,
//! Numbers, and the three scalars. It exists only as that round-trip
//! contract — there is no pretty-printing product here, no indentation
//! heuristics, just a deterministic re-serialization.

use crate::ast::Ast;

pub fn ast_to_string(ast: &Ast) -> String {
	let mut out = String::new();
	write_ast(ast, &mut out);
	out
}

fn write_ast(ast: &Ast, out: &mut String) {
	match ast {
		Ast::Nil => out.push_str("nil"),
		Ast::Bool(true) => out.push_str("true"),
		Ast::Bool(false) => out.push_str("false"),
		Ast::Number(n) => out.push_str(&format_number(*n)),
		Ast::Symbol(name) => out.push_str(name),
		Ast::Str(s) => write_string(s, out),
		Ast::List(items) => {
			out.push('(');
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					out.push(' ');
				}
				write_ast(item, out);
			}
			out.push(')');
		}
		Ast::Map(pairs) => {
			out.push('{');
			for (i, (k, v)) in pairs.iter().enumerate() {
				if i > 0 {
					out.push(' ');
				}
				write_ast(k, out);
				out.push(' ');
				write_ast(v, out);
			}
			out.push('}');
		}
	}
}

fn format_number(n: f64) -> String {
	if n.fract() == 0.0 && n.abs() < 1e15 {
		format!("{}", n as i64)
	} else {
		format!("{}", n)
	}
}

fn write_string(s: &str, out: &mut String) {
	out.push('"');
	for ch in s.chars() {
		match ch {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\t' => out.push_str("\\t"),
			'\r' => out.push_str("\\r"),
			c => out.push(c),
		}
	}
	out.push('"');
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{list, mapify, sym};
	use crate::parser::parse_all;
	use crate::reader::Reader;

	fn roundtrip(ast: &Ast) -> Ast {
		let text = ast_to_string(ast);
		let mut reader = Reader::from_str(&text);
		let mut forms = parse_all(&mut reader, None).unwrap();
		assert_eq!(forms.len(), 1, "serialized form {text:?} did not parse back to one form");
		forms.remove(0)
	}

	#[test]
	fn scalars_roundtrip() {
		for ast in [Ast::Nil, Ast::Bool(true), Ast::Bool(false), Ast::Number(42.0), Ast::Number(-3.5)] {
			assert_eq!(roundtrip(&ast), ast);
		}
	}

	#[test]
	fn symbol_roundtrips() {
		assert_eq!(roundtrip(&sym("foo-bar?")), sym("foo-bar?"));
	}

	#[test]
	fn string_with_escapes_roundtrips() {
		let s = Ast::Str("a\nb\"c\\d".into());
		assert_eq!(roundtrip(&s), s);
	}

	#[test]
	fn nested_list_roundtrips() {
		let ast = list(vec![sym("+"), Ast::Number(1.0), list(vec![sym("-"), Ast::Number(2.0), Ast::Number(3.0)])]);
		assert_eq!(roundtrip(&ast), ast);
	}

	#[test]
	fn map_roundtrips() {
		let ast = mapify(vec![sym("a"), Ast::Number(1.0), sym("b"), Ast::Number(2.0)]);
		assert_eq!(roundtrip(&ast), ast);
	}
}
