//! Conversion of markup fragments to markdown text.

use roxmltree::Node;

/// The namespace of `xlink:href` link targets.
const XLINK: &str = "http://www.w3.org/1999/xlink";

/// Converts a document fragment to normalized text.
pub trait MarkupConverter {
    /// Converts the content of `node` to markdown, leaving out the node's own
    /// heading.
    fn convert(&self, node: Node<'_, '_>) -> String;
}

/// Converts DocBook fragments to markdown.
///
/// Paragraphs are separated by blank lines and never wrapped. Nested sections
/// become ATX headings, lists become `-` or `1.` items, and tables become pipe
/// tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocBookMarkdown;

impl MarkupConverter for DocBookMarkdown {
    fn convert(&self, node: Node<'_, '_>) -> String {
        let mut blocks = Vec::new();
        for child in node.children().filter(|child| !child.has_tag_name("title")) {
            block(child, 1, &mut blocks);
        }
        blocks.join("\n\n").trim().to_string()
    }
}

/// Collapses whitespace runs to single spaces.
fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The collapsed text of the `title` child of `node`.
pub(crate) fn title_of(node: Node<'_, '_>) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name("title"))
        .map(inline)
}

/// Renders a block-level node, appending the rendered blocks.
fn block(node: Node<'_, '_>, depth: usize, out: &mut Vec<String>) {
    if node.is_text() {
        let text = collapse(node.text().unwrap_or_default());
        if !text.is_empty() {
            out.push(text);
        }
        return;
    }
    if !node.is_element() {
        return;
    }

    match node.tag_name().name() {
        "para" | "simpara" | "formalpara" => {
            let text = inline(node);
            if !text.is_empty() {
                out.push(text);
            }
        }
        "section" | "sect1" | "sect2" | "sect3" | "simplesect" => {
            if let Some(title) = title_of(node).filter(|title| !title.is_empty()) {
                out.push(format!("{} {title}", "#".repeat(depth + 1)));
            }
            for child in node.children().filter(|child| !child.has_tag_name("title")) {
                block(child, depth + 1, out);
            }
        }
        "itemizedlist" | "orderedlist" => out.push(list(node, 0)),
        "informaltable" | "table" => {
            if let Some(table) = table(node) {
                out.push(table);
            }
        }
        "programlisting" | "screen" | "literallayout" => {
            let text: String = node.descendants().filter_map(|n| n.text()).collect();
            out.push(format!("```\n{}\n```", text.trim_end()));
        }
        "title" => {}
        _ => {
            let has_blocks = node.children().any(|child| {
                child.is_element() && is_block(child.tag_name().name())
            });
            if has_blocks {
                for child in node.children() {
                    block(child, depth, out);
                }
            } else {
                let text = inline(node);
                if !text.is_empty() {
                    out.push(text);
                }
            }
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "para"
            | "simpara"
            | "formalpara"
            | "section"
            | "sect1"
            | "sect2"
            | "sect3"
            | "simplesect"
            | "itemizedlist"
            | "orderedlist"
            | "informaltable"
            | "table"
            | "programlisting"
            | "screen"
            | "literallayout"
            | "note"
            | "warning"
            | "tip"
            | "important"
            | "caution"
    )
}

/// Renders a list, indenting nested lists by two spaces per level.
fn list(node: Node<'_, '_>, level: usize) -> String {
    let ordered = node.has_tag_name("orderedlist");
    let indent = "  ".repeat(level);
    let mut lines = Vec::new();

    for (index, item) in node
        .children()
        .filter(|child| child.has_tag_name("listitem"))
        .enumerate()
    {
        let marker = if ordered {
            format!("{}.", index + 1)
        } else {
            "-".to_string()
        };
        let mut text = Vec::new();
        let mut nested = Vec::new();
        for child in item.children() {
            if child.has_tag_name("itemizedlist") || child.has_tag_name("orderedlist") {
                nested.push(list(child, level + 1));
            } else {
                let rendered = if child.is_text() {
                    collapse(child.text().unwrap_or_default())
                } else {
                    inline(child)
                };
                if !rendered.is_empty() {
                    text.push(rendered);
                }
            }
        }
        lines.push(format!("{indent}{marker} {}", text.join(" ")));
        lines.extend(nested);
    }
    lines.join("\n")
}

/// Renders a CALS table as a pipe table, using the first row as header.
fn table(node: Node<'_, '_>) -> Option<String> {
    let rows: Vec<Vec<String>> = node
        .descendants()
        .filter(|n| n.has_tag_name("row") || n.has_tag_name("tr"))
        .map(|row| {
            row.children()
                .filter(|cell| {
                    cell.has_tag_name("entry") || cell.has_tag_name("td") || cell.has_tag_name("th")
                })
                .map(|cell| inline(cell).replace('|', "\\|"))
                .collect()
        })
        .collect();
    let width = rows.iter().map(Vec::len).max().filter(|&width| width > 0)?;

    let render = |cells: &[String]| {
        let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
        padded.resize(width, "");
        format!("| {} |", padded.join(" | "))
    };
    let mut lines = Vec::with_capacity(rows.len() + 1);
    let mut rows = rows.iter();
    lines.push(render(rows.next()?));
    lines.push(format!("|{}", " --- |".repeat(width)));
    lines.extend(rows.map(|row| render(row)));
    Some(lines.join("\n"))
}

/// Renders the inline content of a node as a single line.
fn inline(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    inline_into(node, &mut out);
    collapse(&out)
}

fn inline_into(node: Node<'_, '_>, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            out.push_str(child.text().unwrap_or_default());
            continue;
        }
        if !child.is_element() {
            continue;
        }

        match child.tag_name().name() {
            "emphasis" => {
                let text = inline(child);
                if !text.is_empty() {
                    let marker = match child.attribute("role") {
                        Some("bold" | "strong") => "**",
                        _ => "*",
                    };
                    out.push_str(&format!("{marker}{text}{marker}"));
                }
            }
            "link" | "ulink" => {
                let text = inline(child);
                let target = child
                    .attribute((XLINK, "href"))
                    .or_else(|| child.attribute("url"));
                match target {
                    Some(target) if text.is_empty() || text == target => {
                        out.push_str(&format!("<{target}>"));
                    }
                    Some(target) => out.push_str(&format!("[{text}]({target})")),
                    None => out.push_str(&text),
                }
            }
            "literal" | "code" | "filename" | "command" | "option" => {
                out.push_str(&format!("`{}`", inline(child)));
            }
            "footnote" => {
                let text = inline(child);
                if !text.is_empty() {
                    out.push_str(&format!(" ({text})"));
                }
            }
            "title" | "indexterm" | "remark" => {}
            "para" | "simpara" => {
                out.push(' ');
                inline_into(child, out);
                out.push(' ');
            }
            _ => inline_into(child, out),
        }
    }
}
