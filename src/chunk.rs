//! The chunk tree and its assembler.
//!
//! A [`Chunk`] is a rose tree whose leaves are lines of target source and
//! whose internal nodes are nested blocks. This models `do ... end`-style
//! nesting without premature string concatenation: special forms push
//! lines into whatever chunk they were handed, and open a fresh child chunk
//! (via [`Chunk::push_block`]) whenever they need an indented sub-region.
//! The assembler renders a tree by indenting every line of a block one
//! level; it is pure and deterministic — its output is a function of the
//! tree and the indent string alone.

#[derive(Clone, Debug, Default)]
pub struct Chunk {
	nodes: Vec<Node>,
}

#[derive(Clone, Debug)]
enum Node {
	Line(String),
	Block(Chunk),
}

impl Chunk {
	pub fn new() -> Self {
		Chunk::default()
	}

	/// Appends a single line of target source to this chunk.
	pub fn push_line(&mut self, line: impl Into<String>) {
		self.nodes.push(Node::Line(line.into()));
	}

	/// Appends several lines at once, in order.
	pub fn push_lines<I: IntoIterator<Item = String>>(&mut self, lines: I) {
		for line in lines {
			self.push_line(line);
		}
	}

	/// Opens a nested sub-chunk whose lines will be indented one extra
	/// level when assembled, and returns a handle to it for further
	/// writing.
	pub fn push_block(&mut self) -> &mut Chunk {
		self.nodes.push(Node::Block(Chunk::new()));
		match self.nodes.last_mut().unwrap() {
			Node::Block(c) => c,
			Node::Line(_) => unreachable!(),
		}
	}

	/// Appends an already-built chunk as a nested block, one indent level
	/// deeper. Lets a caller build a sub-block's contents off to the side
	/// (e.g. while deciding whether it's even needed) and splice it in
	/// afterward.
	pub fn push_chunk(&mut self, other: Chunk) {
		self.nodes.push(Node::Block(other));
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

/// Renders a chunk tree to text using `indent` as the per-level indent
/// string (the public default is two spaces).
pub fn assemble(chunk: &Chunk, indent: &str) -> String {
	let lines = render(chunk, indent, 0);
	lines.join("\n")
}

fn render(chunk: &Chunk, indent: &str, level: usize) -> Vec<String> {
	let prefix = indent.repeat(level);
	let mut out = Vec::new();
	for node in &chunk.nodes {
		match node {
			Node::Line(line) => {
				if line.is_empty() {
					out.push(String::new());
				} else {
					out.push(format!("{prefix}{line}"));
				}
			}
			Node::Block(inner) => out.extend(render(inner, indent, level + 1)),
		}
	}
	out
}

pub const DEFAULT_INDENT: &str = "  ";

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn indents_nested_blocks() {
		let mut root = Chunk::new();
		root.push_line("if cond then");
		{
			let body = root.push_block();
			body.push_line("x = 1");
		}
		root.push_line("end");
		assert_eq!(assemble(&root, "  "), "if cond then\n  x = 1\nend");
	}

	#[test]
	fn indent_string_is_configurable() {
		let mut root = Chunk::new();
		root.push_line("do");
		root.push_block().push_line("x = 1");
		root.push_line("end");
		assert_eq!(assemble(&root, "\t"), "do\n\tx = 1\nend");
	}

	#[test]
	fn rendering_is_pure_function_of_tree_and_indent() {
		let mut root = Chunk::new();
		root.push_line("a");
		root.push_block().push_line("b");
		let once = assemble(&root, "  ");
		let twice = assemble(&root, "  ");
		assert_eq!(once, twice);
	}
}
