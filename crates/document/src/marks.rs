//! Mark engine: flat text flags ⇄ nested mark wrappers.
//!
//! Stringify ([`expand`]) merges runs of flagged text into the fewest
//! `strong`/`emphasis`/`inlineCode`/`delete` wrappers; parse ([`flatten`])
//! pushes wrapper marks back down onto the text leaves.

use crate::types::{Inline, Text};
use richmark_core::mdast::{Link, Literal, Node, Parent};
use richmark_core::{DepthGuard, RichmarkError};
use serde::{Deserialize, Serialize};

/// An inline mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mark {
    /// `**a**`
    Strong,
    /// `*a*`
    Emphasis,
    /// `` `a` ``
    InlineCode,
    /// `~~a~~`
    Delete,
}

/// Wrapper selection order on ties.
pub const PRIORITY: [Mark; 4] = [Mark::Strong, Mark::Emphasis, Mark::InlineCode, Mark::Delete];

/// A set of marks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marks {
    /// Strong.
    pub strong: bool,
    /// Emphasis.
    pub emphasis: bool,
    /// Inline code.
    pub code: bool,
    /// Delete.
    pub delete: bool,
}

impl Marks {
    /// Marks carried by a text leaf.
    pub fn of(text: &Text) -> Self {
        Self {
            strong: text.bold,
            emphasis: text.italic,
            code: text.code,
            delete: text.strikethrough,
        }
    }

    /// Whether `mark` is in the set.
    pub fn has(&self, mark: Mark) -> bool {
        match mark {
            Mark::Strong => self.strong,
            Mark::Emphasis => self.emphasis,
            Mark::InlineCode => self.code,
            Mark::Delete => self.delete,
        }
    }

    /// The set with `mark` added.
    pub fn with(mut self, mark: Mark) -> Self {
        self.set(mark, true);
        self
    }

    /// The set with `mark` removed.
    pub fn without(mut self, mark: Mark) -> Self {
        self.set(mark, false);
        self
    }

    fn set(&mut self, mark: Mark, on: bool) {
        match mark {
            Mark::Strong => self.strong = on,
            Mark::Emphasis => self.emphasis = on,
            Mark::InlineCode => self.code = on,
            Mark::Delete => self.delete = on,
        }
    }

    /// Whether no mark is set.
    pub fn is_empty(&self) -> bool {
        !(self.strong || self.emphasis || self.code || self.delete)
    }

    /// Whether the two sets share a mark.
    pub fn intersects(&self, other: &Marks) -> bool {
        PRIORITY.iter().any(|m| self.has(*m) && other.has(*m))
    }

    fn apply(&self, text: String) -> Text {
        Text {
            text,
            bold: self.strong,
            italic: self.emphasis,
            code: self.code,
            strikethrough: self.delete,
        }
    }
}

/// Link wrap applied when a markable text leaf is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLink {
    /// Destination.
    pub url: String,
    /// Title.
    pub title: Option<String>,
}

/// Text leaf taking part in mark merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedText {
    /// Content.
    pub text: String,
    /// Marks still to be turned into wrappers.
    pub marks: Marks,
    /// Set when the leaf came from a link holding only this text.
    pub pending_link: Option<PendingLink>,
}

enum Item<'a> {
    Text(MarkedText),
    Opaque(&'a Inline),
}

impl Item<'_> {
    fn marks(&self) -> Option<Marks> {
        match self {
            Item::Text(t) => Some(t.marks),
            Item::Opaque(_) => None,
        }
    }
}

/// Builds mdast phrasing content from document inlines.
///
/// Non-text inlines (and links that are not a single text leaf) go through
/// `opaque` and break mark runs.
pub fn expand<F>(
    inlines: &[Inline],
    guard: DepthGuard,
    opaque: &F,
) -> Result<Vec<Node>, RichmarkError>
where
    F: Fn(&Inline, DepthGuard) -> Result<Node, RichmarkError>,
{
    let items: Vec<Item<'_>> = inlines.iter().map(markable).collect();
    process(&items, guard, opaque)
}

fn markable(inline: &Inline) -> Item<'_> {
    match inline {
        Inline::Text(text) => Item::Text(MarkedText {
            text: text.text.clone(),
            marks: Marks::of(text),
            pending_link: None,
        }),
        Inline::Link {
            url,
            title,
            children,
        } => match children.as_slice() {
            [Inline::Text(text)] => Item::Text(MarkedText {
                text: text.text.clone(),
                marks: Marks::of(text),
                pending_link: Some(PendingLink {
                    url: url.clone(),
                    title: title.clone(),
                }),
            }),
            _ => Item::Opaque(inline),
        },
        other => Item::Opaque(other),
    }
}

fn process<F>(items: &[Item<'_>], guard: DepthGuard, opaque: &F) -> Result<Vec<Node>, RichmarkError>
where
    F: Fn(&Inline, DepthGuard) -> Result<Node, RichmarkError>,
{
    let mut out = Vec::with_capacity(items.len());
    let mut i = 0;

    while i < items.len() {
        let first = match &items[i] {
            Item::Opaque(inline) => {
                out.push(opaque(inline, guard)?);
                i += 1;
                continue;
            }
            Item::Text(text) if text.marks.is_empty() => {
                out.push(emit_leaf(text, Node::text(text.text.clone())));
                i += 1;
                continue;
            }
            Item::Text(text) => text.marks,
        };

        let run_end = i + items[i..]
            .iter()
            .take_while(|item| item.marks().is_some_and(|m| m.intersects(&first)))
            .count();
        let run = &items[i..run_end];

        let mut selected = None;
        let mut best = 0;
        for mark in PRIORITY.iter().copied().filter(|m| first.has(*m)) {
            let count = run
                .iter()
                .take_while(|item| item.marks().is_some_and(|m| m.has(mark)))
                .count();
            if count > best {
                best = count;
                selected = Some(mark);
            }
        }
        let Some(mark) = selected else {
            return Err(RichmarkError::InternalError(
                "marked text without a selectable mark".to_string(),
            ));
        };

        if mark == Mark::InlineCode {
            if best > 1 {
                return Err(RichmarkError::MarkConflict);
            }
            let Item::Text(text) = &items[i] else {
                return Err(RichmarkError::InternalError(
                    "inline code selected for a non-text node".to_string(),
                ));
            };
            out.push(code_leaf(text));
            i += 1;
            continue;
        }

        let stripped: Vec<Item<'_>> = run[..best]
            .iter()
            .map(|item| match item {
                Item::Text(t) => Item::Text(MarkedText {
                    marks: t.marks.without(mark),
                    ..t.clone()
                }),
                Item::Opaque(inline) => Item::Opaque(inline),
            })
            .collect();
        let children = process(&stripped, guard.descend()?, opaque)?;
        out.push(wrap(mark, children));
        i += best;
    }

    Ok(out)
}

fn wrap(mark: Mark, children: Vec<Node>) -> Node {
    let parent = Parent { children };
    match mark {
        Mark::Strong => Node::Strong(parent),
        Mark::Emphasis => Node::Emphasis(parent),
        Mark::Delete => Node::Delete(parent),
        Mark::InlineCode => Node::InlineCode(Literal {
            value: parent
                .children
                .iter()
                .filter_map(|n| match n {
                    Node::Text(t) => Some(t.value.as_str()),
                    _ => None,
                })
                .collect(),
        }),
    }
}

fn emit_leaf(text: &MarkedText, leaf: Node) -> Node {
    match &text.pending_link {
        Some(link) => Node::Link(Link {
            url: link.url.clone(),
            title: link.title.clone(),
            children: vec![leaf],
        }),
        None => leaf,
    }
}

/// Code stays innermost: remaining marks wrap the code node from outside.
fn code_leaf(text: &MarkedText) -> Node {
    let code = Node::InlineCode(Literal {
        value: text.text.clone(),
    });
    let mut node = emit_leaf(text, code);
    for mark in PRIORITY.iter().rev() {
        if *mark != Mark::InlineCode && text.marks.has(*mark) {
            node = wrap(*mark, vec![node]);
        }
    }
    node
}

/// Builds document inlines from mdast phrasing content, carrying `marks`
/// from enclosing wrappers down to every text leaf.
///
/// Nodes other than text, marks, inline code and links go through `opaque`,
/// which receives no marks.
pub fn flatten<F>(
    nodes: Vec<Node>,
    marks: Marks,
    guard: DepthGuard,
    opaque: &F,
) -> Result<Vec<Inline>, RichmarkError>
where
    F: Fn(Node, DepthGuard) -> Result<Inline, RichmarkError>,
{
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(text) => out.push(Inline::Text(marks.apply(text.value))),
            Node::InlineCode(code) => {
                out.push(Inline::Text(marks.with(Mark::InlineCode).apply(code.value)));
            }
            Node::Strong(p) => {
                out.extend(flatten(p.children, marks.with(Mark::Strong), guard.descend()?, opaque)?);
            }
            Node::Emphasis(p) => {
                out.extend(flatten(p.children, marks.with(Mark::Emphasis), guard.descend()?, opaque)?);
            }
            Node::Delete(p) => {
                out.extend(flatten(p.children, marks.with(Mark::Delete), guard.descend()?, opaque)?);
            }
            Node::Link(link) => out.push(Inline::Link {
                url: link.url,
                title: link.title,
                children: flatten(link.children, marks, guard.descend()?, opaque)?,
            }),
            other => out.push(opaque(other, guard)?),
        }
    }
    Ok(out)
}
