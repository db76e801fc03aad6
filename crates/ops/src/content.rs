//! Rendering content trees to markdown and parsing them back.
//!
//! Rendering is a recursive fold: text leaves yield their literal text,
//! containers wrap their children's text in markdown delimiters. The
//! rendered form is the serialization contract between the operation
//! representation and the flat buffer, so `parse_markdown` must reconstruct
//! a tree whose rendering equals the input (`render(parse(render(t))) ==
//! render(t)`).

use vellum_proto::ContentNode;

/// Renders a list of nodes to markdown text.
///
/// Adjacent nodes are separated by a blank line unless both are plain text
/// runs, which concatenate directly.
#[must_use]
pub fn render_markdown(nodes: &[ContentNode]) -> String {
	let mut out = String::new();
	let mut prev_block = false;
	for (idx, node) in nodes.iter().enumerate() {
		if idx > 0 && (prev_block || node.is_block()) {
			out.push_str("\n\n");
		}
		out.push_str(&render_node(node));
		prev_block = node.is_block();
	}
	out
}

fn render_node(node: &ContentNode) -> String {
	match node {
		ContentNode::Text { text } => text.clone(),
		ContentNode::Paragraph { children } => render_inline(children),
		ContentNode::Heading { level, children } => {
			let level = (*level).clamp(1, 6) as usize;
			format!("{} {}", "#".repeat(level), render_inline(children))
		}
		ContentNode::CodeBlock { language, children } => {
			fenced("```", language.as_deref().unwrap_or(""), &render_inline(children), "```")
		}
		ContentNode::Diagram { children } => {
			fenced("```", "mermaid", &render_inline(children), "```")
		}
		ContentNode::MathBlock { children } => fenced("$$", "", &render_inline(children), "$$"),
	}
}

/// Concatenates children without block separators (inline context).
fn render_inline(children: &[ContentNode]) -> String {
	children.iter().map(render_node).collect()
}

fn fenced(open: &str, info: &str, body: &str, close: &str) -> String {
	let mut out = String::with_capacity(open.len() + info.len() + body.len() + close.len() + 2);
	out.push_str(open);
	out.push_str(info);
	out.push('\n');
	out.push_str(body);
	if !body.is_empty() && !body.ends_with('\n') {
		out.push('\n');
	}
	out.push_str(close);
	out
}

/// Parses markdown text into a block-level content tree.
///
/// Recognizes ATX headings, ``` fences (a `mermaid` info string maps back to
/// [`ContentNode::Diagram`]), `$$` math fences, and paragraphs. Inline
/// structure is not reconstructed; block bodies become single text runs.
#[must_use]
pub fn parse_markdown(text: &str) -> Vec<ContentNode> {
	let lines: Vec<&str> = text.split('\n').collect();
	let mut nodes = Vec::new();
	let mut i = 0;

	while i < lines.len() {
		let line = lines[i];
		if line.trim().is_empty() {
			i += 1;
			continue;
		}

		if let Some(info) = line.strip_prefix("```") {
			let (body, next) = collect_fence_body(&lines, i + 1, "```");
			let children = vec![ContentNode::text(body)];
			let info = info.trim();
			if info == "mermaid" {
				nodes.push(ContentNode::Diagram { children });
			} else {
				nodes.push(ContentNode::CodeBlock {
					language: (!info.is_empty()).then(|| info.to_string()),
					children,
				});
			}
			i = next;
		} else if line.trim_end() == "$$" {
			let (body, next) = collect_fence_body(&lines, i + 1, "$$");
			nodes.push(ContentNode::MathBlock {
				children: vec![ContentNode::text(body)],
			});
			i = next;
		} else if let Some((level, rest)) = parse_heading(line) {
			nodes.push(ContentNode::Heading {
				level,
				children: vec![ContentNode::text(rest)],
			});
			i += 1;
		} else {
			let mut para = vec![line];
			i += 1;
			while i < lines.len() && !lines[i].trim().is_empty() && !is_structural(lines[i]) {
				para.push(lines[i]);
				i += 1;
			}
			nodes.push(ContentNode::Paragraph {
				children: vec![ContentNode::text(para.join("\n"))],
			});
		}
	}

	nodes
}

/// Collects lines up to (excluding) the closing fence; returns the body and
/// the index just past the fence. An unterminated fence runs to the end.
fn collect_fence_body(lines: &[&str], mut i: usize, close: &str) -> (String, usize) {
	let mut body = Vec::new();
	while i < lines.len() && lines[i].trim_end() != close {
		body.push(lines[i]);
		i += 1;
	}
	(body.join("\n"), (i + 1).min(lines.len()))
}

fn parse_heading(line: &str) -> Option<(u8, String)> {
	let hashes = line.bytes().take_while(|b| *b == b'#').count();
	if !(1..=6).contains(&hashes) {
		return None;
	}
	let rest = line[hashes..].strip_prefix(' ')?;
	Some((hashes as u8, rest.to_string()))
}

fn is_structural(line: &str) -> bool {
	line.starts_with("```") || line.trim_end() == "$$" || parse_heading(line).is_some()
}
