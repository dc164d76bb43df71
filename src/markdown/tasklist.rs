//! Task list items: `- [ ] todo` and `- [x] done`.

use comrak::Arena;
use comrak::arena_tree::Node;
use comrak::nodes::{Ast, AstNode, LineColumn, NodeValue};
use std::cell::RefCell;

/// Replaces checkbox markers at the start of list items with disabled
/// checkbox inputs.
///
/// `position` maps a 1-based (line, column) of the parsed source to the
/// byte offset reported in `data-source-position`.
pub fn mark_task_items<'a>(
    arena: &'a Arena<AstNode<'a>>,
    root: &'a AstNode<'a>,
    position: impl Fn(usize, usize) -> usize,
) {
    let items: Vec<&'a AstNode<'a>> = root
        .descendants()
        .filter(|n| matches!(n.data.borrow().value, NodeValue::Item(_)))
        .collect();

    for item in items {
        let Some(paragraph) = item.first_child() else {
            continue;
        };
        if !matches!(paragraph.data.borrow().value, NodeValue::Paragraph) {
            continue;
        }
        let Some(first) = paragraph.first_child() else {
            continue;
        };
        merge_following_text(first);

        let checked = {
            let mut data = first.data.borrow_mut();
            let NodeValue::Text(text) = &mut data.value else {
                continue;
            };
            let Some((checked, len)) = marker(text, first.next_sibling().is_none()) else {
                continue;
            };
            text.drain(..len);
            checked
        };

        let start = paragraph.data.borrow().sourcepos.start;
        let html = format!(
            r#"<input type="checkbox" disabled="" data-source-position="{}"{}/>"#,
            position(start.line, start.column),
            if checked { r#" checked="""# } else { "" }
        );
        let input = arena.alloc(Node::new(RefCell::new(Ast::new(
            NodeValue::HtmlInline(html),
            LineColumn {
                line: start.line,
                column: start.column,
            },
        ))));
        first.insert_before(input);
    }
}

/// Joins text siblings split by the inline parser at `[` and `]`.
fn merge_following_text<'a>(node: &'a AstNode<'a>) {
    while let Some(next) = node.next_sibling() {
        let text = match &next.data.borrow().value {
            NodeValue::Text(text) => text.clone(),
            _ => return,
        };
        match &mut node.data.borrow_mut().value {
            NodeValue::Text(existing) => existing.push_str(&text),
            _ => return,
        }
        next.detach();
    }
}

/// Checked state and marker length of a leading checkbox marker.
fn marker(text: &str, alone: bool) -> Option<(bool, usize)> {
    let checked = match text.get(..3)? {
        "[ ]" => false,
        "[x]" | "[X]" => true,
        _ => return None,
    };
    match text[3..].chars().next() {
        Some(' ') => Some((checked, 4)),
        None if !alone => Some((checked, 3)),
        _ => None,
    }
}
