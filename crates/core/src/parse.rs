//! Markdown parsing over markdown-rs.

use crate::{RichmarkError, SourceLocation};
use markdown::mdast::Node;
use markdown::message::{Message, Place};

/// Parser options for building markdown-rs parse options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Enable MDX constructs (JSX and expressions).
    pub mdx: bool,
    /// Enable the GitHub Flavored Markdown constructs this crate maps
    /// (tables, strikethrough, autolink literals).
    pub gfm: bool,
    /// Enable indented code blocks.
    pub code_indented: bool,
    /// Allow raw HTML nodes in the AST.
    pub raw_html: bool,
}

impl ParseOptions {
    /// Markdown defaults: raw HTML passes through, no JSX.
    pub const fn markdown() -> Self {
        Self {
            mdx: false,
            gfm: true,
            code_indented: true,
            raw_html: true,
        }
    }

    /// MDX defaults: JSX and expressions enabled, raw HTML and indented code off.
    pub const fn mdx() -> Self {
        Self {
            mdx: true,
            gfm: true,
            code_indented: false,
            raw_html: false,
        }
    }

    /// Convert to markdown-rs `ParseOptions`.
    ///
    /// Task list items and footnotes stay off: the document tree has no
    /// place for them, so their syntax is kept as literal text instead.
    pub fn to_markdown(self) -> markdown::ParseOptions {
        let mut constructs = markdown::Constructs {
            code_indented: self.code_indented,
            html_flow: self.raw_html,
            html_text: self.raw_html,
            frontmatter: false,
            ..Default::default()
        };

        if self.gfm {
            constructs.gfm_autolink_literal = true;
            constructs.gfm_strikethrough = true;
            constructs.gfm_table = true;
        }

        if self.mdx {
            constructs.autolink = false;
            constructs.mdx_expression_flow = true;
            constructs.mdx_expression_text = true;
            constructs.mdx_jsx_flow = true;
            constructs.mdx_jsx_text = true;
        }

        markdown::ParseOptions {
            constructs,
            ..markdown::ParseOptions::default()
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::mdx()
    }
}

/// Parse markdown into a markdown-rs mdast tree.
pub fn parse_mdast(input: &str, options: &ParseOptions) -> Result<Node, RichmarkError> {
    markdown::to_mdast(input, &options.to_markdown()).map_err(|err| {
        RichmarkError::MarkdownAdapter {
            message: err.to_string(),
            location: message_location(&err),
        }
    })
}

fn message_location(message: &Message) -> SourceLocation {
    match &message.place {
        Some(place) => match place.as_ref() {
            Place::Point(point) => SourceLocation::new(point.line, point.column),
            Place::Position(position) => {
                SourceLocation::new(position.start.line, position.start.column)
            }
        },
        None => SourceLocation::new(1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_mode_keeps_raw_html() {
        let tree = parse_mdast("<div>hi</div>", &ParseOptions::markdown()).unwrap();
        let Node::Root(root) = tree else {
            panic!("expected root");
        };
        assert!(matches!(root.children[0], Node::Html(_)));
    }

    #[test]
    fn mdx_mode_parses_jsx() {
        let tree = parse_mdast("<Hero title=\"x\" />", &ParseOptions::mdx()).unwrap();
        let Node::Root(root) = tree else {
            panic!("expected root");
        };
        assert!(matches!(root.children[0], Node::MdxJsxFlowElement(_)));
    }

    #[test]
    fn mdx_syntax_error_has_location() {
        let err = parse_mdast("<Hero", &ParseOptions::mdx()).unwrap_err();
        assert!(matches!(err, RichmarkError::MarkdownAdapter { .. }));
    }

    #[test]
    fn task_list_syntax_stays_text() {
        let tree = parse_mdast("- [ ] todo", &ParseOptions::markdown()).unwrap();
        let Node::Root(root) = tree else {
            panic!("expected root");
        };
        let Node::List(list) = &root.children[0] else {
            panic!("expected list");
        };
        let Node::ListItem(item) = &list.children[0] else {
            panic!("expected item");
        };
        assert_eq!(item.checked, None);
    }
}
