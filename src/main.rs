use std::env;

use fennelrs::{compile, CompileOptions};

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.without_time()
		.init();

	let mut done = false;
	let mut files = Vec::new();
	let mut tab = String::new();
	let mut args = env::args().skip(1).peekable();
	while let Some(arg) = args.next() {
		done = done
			|| match arg.as_str() {
				"--version" | "-v" => {
					println!("\nfennelrs 0.1.0 - S-expression to Lua compiler\n");
					true
				}
				"--help" | "-h" => {
					print_usage();
					true
				}
				"--tab" => {
					tab = args.next().unwrap_or_default();
					false
				}
				_ => {
					files.push(arg);
					false
				}
			}
	}

	if done {
		return;
	}

	if files.len() != 1 {
		print_usage();
		if !files.is_empty() {
			eprintln!("[error] specify a single file\n");
		} else {
			eprintln!("[error] no arguments given\n");
		}
		std::process::exit(1);
	}

	let file = &files[0];
	let source = match std::fs::read_to_string(file) {
		Ok(content) => content,
		Err(msg) => {
			eprintln!("\n[error] reading {file}: {msg}\n");
			std::process::exit(1);
		}
	};

	let options = CompileOptions { scope: None, tab };
	match compile(&source, &options) {
		Ok(text) => println!("{text}"),
		Err(err) => {
			tracing::error!(file = %file, %err, "compilation failed");
			eprintln!("\n[compile error] {file}: {err}\n");
			std::process::exit(2);
		}
	}
}

fn print_usage() {
	println!("\nUSAGE:\n\n  fennelrs [--tab INDENT] {{FILE}}\n");
	println!("Compiles the given FILE to Lua and prints the result to stdout.\n");
}
