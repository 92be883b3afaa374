//! Generic mdast to markdown serializer.
//!
//! Output conventions are fixed so parse/serialize cycles settle: ATX
//! headings, `-` bullets with one space after the marker (`*` for a list
//! directly following another bullet list), `***` thematic breaks, fenced
//! code, `**`/`*`/`~~` marks.
//!
//! Directives are written in an internal delimiter form,
//! `U+E000 name attrs U+E001` and `U+E000 /name U+E001`, which
//! [`crate::shortcode::rewrite`] turns into the configured shortcode
//! delimiters. Text never contains those two characters: they are written as
//! character references.

use crate::RichmarkError;
use crate::mdast::{AlignKind, AttributeValue, Code, Directive, JsxElement, List, Node};

/// Opens a directive tag in serialized output.
pub const DIRECTIVE_OPEN: char = '\u{E000}';
/// Closes a directive tag in serialized output.
pub const DIRECTIVE_CLOSE: char = '\u{E001}';

/// Where a character must be escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafePosition {
    /// Everywhere in text.
    Anywhere,
    /// As the first character of a line, ignoring nothing.
    LineStart,
    /// Directly before a line ending.
    LineEnd,
    /// After the digits of a would-be ordered list marker (`1.`).
    OrderedListMarker,
    /// Inside a table cell.
    TableCell,
    /// The `:` of `http://`, `https://` (GFM autolink literal).
    AutolinkProtocol,
    /// The first `.` after `www` (GFM autolink literal).
    AutolinkWww,
    /// An `@` between address characters (GFM autolink literal).
    AutolinkEmail,
}

/// A character that has to be escaped in text to stay text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsafe {
    /// The character.
    pub character: char,
    /// Where it is unsafe.
    pub position: UnsafePosition,
    /// Only unsafe when followed by an ASCII alphanumeric or `#` (entities).
    pub before_alphanumeric: bool,
}

impl Unsafe {
    const fn at(character: char, position: UnsafePosition) -> Self {
        Self {
            character,
            position,
            before_alphanumeric: false,
        }
    }

    /// The default escaping list for markdown (`mdx == false`) or MDX output.
    pub fn defaults(mdx: bool) -> Vec<Unsafe> {
        use UnsafePosition::*;
        let mut list = vec![
            Unsafe::at('\\', Anywhere),
            Unsafe::at('*', Anywhere),
            Unsafe::at('_', Anywhere),
            Unsafe::at('`', Anywhere),
            Unsafe::at('[', Anywhere),
            Unsafe::at(']', Anywhere),
            Unsafe::at('~', Anywhere),
            Unsafe::at('<', Anywhere),
            Unsafe {
                character: '&',
                position: Anywhere,
                before_alphanumeric: true,
            },
            Unsafe::at('#', LineStart),
            Unsafe::at('>', LineStart),
            Unsafe::at('-', LineStart),
            Unsafe::at('+', LineStart),
            Unsafe::at('=', LineStart),
            Unsafe::at(' ', LineStart),
            Unsafe::at('\t', LineStart),
            Unsafe::at(' ', LineEnd),
            Unsafe::at('.', OrderedListMarker),
            Unsafe::at(')', OrderedListMarker),
            Unsafe::at('|', TableCell),
            Unsafe::at(':', AutolinkProtocol),
            Unsafe::at('.', AutolinkWww),
            Unsafe::at('@', AutolinkEmail),
        ];
        if mdx {
            list.push(Unsafe::at('{', Anywhere));
            list.push(Unsafe::at('}', Anywhere));
        }
        list
    }
}

/// Serializer options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Characters escaped in text. Empty disables text escaping.
    pub unsafe_chars: Vec<Unsafe>,
    /// Delimiters that must never appear verbatim in text (shortcode starts).
    /// Occurrences are written with every ASCII punctuation character escaped.
    pub literal_guards: Vec<String>,
}

impl SerializeOptions {
    /// Options with the default escaping list.
    pub fn new(mdx: bool) -> Self {
        Self {
            unsafe_chars: Unsafe::defaults(mdx),
            literal_guards: Vec::new(),
        }
    }
}

/// Serializes a generic tree to markdown.
///
/// A root yields its blocks separated by blank lines and a trailing newline;
/// any other flow node yields just that block.
pub fn to_markdown(node: &Node, options: &SerializeOptions) -> Result<String, RichmarkError> {
    let serializer = Serializer { options };
    match node {
        Node::Root(root) => {
            let mut out = serializer.flow(&root.children, FlowKind::Document)?;
            if !out.is_empty() {
                out.push('\n');
            }
            Ok(out)
        }
        other => serializer.block(other, false),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FlowKind {
    Document,
    ListItem,
}

struct Serializer<'a> {
    options: &'a SerializeOptions,
}

impl Serializer<'_> {
    fn flow(&self, nodes: &[Node], kind: FlowKind) -> Result<String, RichmarkError> {
        let mut out = String::new();
        let mut previous: Option<&Node> = None;
        let mut alternate = false;

        for node in nodes {
            // Adjacent lists of the same kind would merge on reparse.
            if let Node::List(list) = node {
                alternate = match previous {
                    Some(Node::List(prev)) if prev.ordered == list.ordered => !alternate,
                    _ => false,
                };
            }
            let text = self.block(node, alternate)?;
            if text.is_empty() {
                continue;
            }
            if !out.is_empty() {
                let tight = kind == FlowKind::ListItem && matches!(node, Node::List(_));
                out.push_str(if tight { "\n" } else { "\n\n" });
            }
            out.push_str(&text);
            previous = Some(node);
        }

        Ok(out)
    }

    fn block(&self, node: &Node, alternate: bool) -> Result<String, RichmarkError> {
        let text = match node {
            Node::Root(root) => self.flow(&root.children, FlowKind::Document)?,
            Node::Paragraph(p) => self.encode_edges(self.phrasing(&p.children, true, false)?),
            Node::Heading(h) => {
                let content = self
                    .encode_edges(self.phrasing(&h.children, false, false)?)
                    .replace('\n', "&#xA;");
                let content = if self.escaping() {
                    guard_closing_hashes(content)
                } else {
                    content
                };
                let hashes = "#".repeat(usize::from(h.depth.clamp(1, 6)));
                if content.is_empty() {
                    hashes
                } else {
                    format!("{hashes} {content}")
                }
            }
            Node::ThematicBreak => "***".to_string(),
            Node::Blockquote(q) => {
                let inner = self.flow(&q.children, FlowKind::Document)?;
                inner
                    .split('\n')
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Node::List(list) => self.list(list, alternate)?,
            Node::Code(code) => code_block(code),
            Node::Html(html) => html.value.clone(),
            Node::Table(table) => self.table(&table.align, &table.children)?,
            Node::MdxJsxFlowElement(el) => self.jsx_flow(el)?,
            Node::ContainerDirective(d) => {
                let open = directive_open(d);
                let close = format!("{DIRECTIVE_OPEN}/{}{DIRECTIVE_CLOSE}", d.name);
                let inner = self.flow(&d.children, FlowKind::Document)?;
                if inner.is_empty() {
                    format!("{open}\n{close}")
                } else {
                    format!("{open}\n{inner}\n{close}")
                }
            }
            Node::LeafDirective(d) => directive_open(d),
            other => return Err(RichmarkError::unsupported("flow", other.kind())),
        };
        Ok(text)
    }

    fn list(&self, list: &List, alternate: bool) -> Result<String, RichmarkError> {
        let start = list.start.unwrap_or(1);
        let mut items = Vec::with_capacity(list.children.len());

        for (index, child) in list.children.iter().enumerate() {
            let Node::ListItem(item) = child else {
                return Err(RichmarkError::unsupported("list", child.kind()));
            };
            let marker = if list.ordered {
                let number = start as usize + index;
                format!("{number}{}", if alternate { ')' } else { '.' })
            } else if alternate {
                "*".to_string()
            } else {
                "-".to_string()
            };
            let content = self.flow(&item.children, FlowKind::ListItem)?;
            items.push(indent_item(&marker, &content));
        }

        Ok(items.join(if list.spread { "\n\n" } else { "\n" }))
    }

    fn table(&self, align: &[AlignKind], rows: &[Node]) -> Result<String, RichmarkError> {
        let mut cells: Vec<Vec<String>> = Vec::with_capacity(rows.len());
        for row in rows {
            let Node::TableRow(row) = row else {
                return Err(RichmarkError::unsupported("table", row.kind()));
            };
            let mut rendered = Vec::with_capacity(row.children.len());
            for cell in &row.children {
                let Node::TableCell(cell) = cell else {
                    return Err(RichmarkError::unsupported("table row", cell.kind()));
                };
                let text = self.encode_edges(self.phrasing(&cell.children, false, true)?);
                rendered.push(text.replace('\n', " "));
            }
            cells.push(rendered);
        }

        if cells.is_empty() {
            return Ok(String::new());
        }

        let columns = cells
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(align.len()))
            .max()
            .unwrap_or(1)
            .max(1);

        let mut lines = Vec::with_capacity(cells.len() + 1);
        for (index, row) in cells.iter_mut().enumerate() {
            row.resize(columns, String::new());
            lines.push(format!("| {} |", row.join(" | ")));
            if index == 0 {
                let delimiters: Vec<&str> = (0..columns)
                    .map(|col| match align.get(col).copied().unwrap_or_default() {
                        AlignKind::Left => ":--",
                        AlignKind::Right => "--:",
                        AlignKind::Center => ":-:",
                        AlignKind::None => "---",
                    })
                    .collect();
                lines.push(format!("| {} |", delimiters.join(" | ")));
            }
        }
        Ok(lines.join("\n"))
    }

    fn jsx_flow(&self, el: &JsxElement) -> Result<String, RichmarkError> {
        let attrs = jsx_attributes(el);
        if el.children.is_empty() {
            return Ok(format!("<{}{attrs} />", el.name));
        }
        let inner = self.flow(&el.children, FlowKind::Document)?;
        Ok(format!("<{}{attrs}>\n{inner}\n</{}>", el.name, el.name))
    }

    /// Serializes phrasing content. `line_start` says whether the first
    /// character lands at the start of a line.
    fn phrasing(
        &self,
        nodes: &[Node],
        line_start: bool,
        in_table: bool,
    ) -> Result<String, RichmarkError> {
        let mut out = String::new();
        let mut after_text = false;
        // The previous wrapper closed right after punctuation.
        let mut punctuated_close = false;
        for node in nodes {
            let at_start = if out.is_empty() {
                line_start
            } else {
                out.ends_with('\n')
            };
            let mut closed = false;
            match node {
                Node::Text(text) => {
                    let mut escaped = self.escape(&text.value, at_start, in_table);
                    if punctuated_close {
                        encode_first_word_character(&mut escaped);
                    }
                    out.push_str(&escaped);
                }
                Node::Strong(s) => {
                    closed = self.wrap(&mut out, "**", &s.children, in_table, after_text)?;
                }
                Node::Emphasis(e) => {
                    closed = self.wrap(&mut out, "*", &e.children, in_table, after_text)?;
                }
                Node::Delete(d) => {
                    closed = self.wrap(&mut out, "~~", &d.children, in_table, after_text)?;
                }
                Node::InlineCode(code) if code.value.is_empty() => {}
                Node::InlineCode(code) if in_table => {
                    // GFM unescapes `\|` in code inside table cells.
                    out.push_str(&code_span(&code.value.replace('|', "\\|")));
                }
                Node::InlineCode(code) => out.push_str(&code_span(&code.value)),
                Node::Break if in_table => {
                    return Err(RichmarkError::unsupported("table cell", node.kind()));
                }
                Node::Break => out.push_str("\\\n"),
                Node::Html(html) => out.push_str(&html.value),
                Node::Link(link) => {
                    // `![` would open an image.
                    if self.escaping() && ends_with_unescaped(&out, '!') {
                        out.insert(out.len() - 1, '\\');
                    }
                    out.push('[');
                    out.push_str(&self.phrasing(&link.children, false, in_table)?);
                    out.push_str("](");
                    out.push_str(&destination(&link.url));
                    push_title(&mut out, link.title.as_deref());
                    out.push(')');
                }
                Node::Image(image) => {
                    out.push_str("![");
                    out.push_str(&escape_alt(&image.alt));
                    out.push_str("](");
                    out.push_str(&destination(&image.url));
                    push_title(&mut out, image.title.as_deref());
                    out.push(')');
                }
                Node::MdxJsxTextElement(el) => {
                    let attrs = jsx_attributes(el);
                    if el.children.is_empty() {
                        out.push_str(&format!("<{}{attrs} />", el.name));
                    } else {
                        let inner = self.phrasing(&el.children, false, in_table)?;
                        out.push_str(&format!("<{}{attrs}>{inner}</{}>", el.name, el.name));
                    }
                }
                Node::TextDirective(d) => out.push_str(&directive_open(d)),
                other => return Err(RichmarkError::unsupported("phrasing", other.kind())),
            }
            after_text = matches!(node, Node::Text(_));
            punctuated_close = closed;
        }
        Ok(out)
    }

    /// Writes `children` between `marker`s. Returns whether the closing
    /// marker follows punctuation, in which case a word character right
    /// after it must be encoded for the run to close.
    fn wrap(
        &self,
        out: &mut String,
        marker: &str,
        children: &[Node],
        in_table: bool,
        after_text: bool,
    ) -> Result<bool, RichmarkError> {
        let inner = self.encode_edges(self.phrasing(children, false, in_table)?);
        let (Some(first), Some(last)) = (inner.chars().next(), inner.chars().last()) else {
            return Ok(false);
        };
        // An opening run before punctuation only opens after whitespace or
        // punctuation.
        if after_text && self.escaping() && is_punctuation(first) {
            encode_last_word_character(out);
        }
        out.push_str(marker);
        out.push_str(&inner);
        out.push_str(marker);
        Ok(self.escaping() && is_punctuation(last))
    }

    fn escaping(&self) -> bool {
        !self.options.unsafe_chars.is_empty()
    }

    fn encodes_whitespace(&self) -> bool {
        self.options.unsafe_chars.iter().any(|u| u.character == ' ')
    }

    /// Leading and trailing whitespace would be trimmed by the parser (or
    /// break emphasis flanking), so it is written as character references.
    fn encode_edges(&self, text: String) -> String {
        if !self.encodes_whitespace() || text.is_empty() {
            return text;
        }
        let mut result = text;
        if let Some(last) = result.chars().last()
            && (last == ' ' || last == '\t')
        {
            result.pop();
            result.push_str(&char_ref(last));
        }
        if let Some(first) = result.chars().next()
            && (first == ' ' || first == '\t')
        {
            result.replace_range(..1, &char_ref(first));
        }
        result
    }

    fn escape(&self, value: &str, line_start: bool, in_table: bool) -> String {
        let chars: Vec<char> = value.chars().collect();
        let guarded = self.guarded_positions(&chars);
        let mut out = String::with_capacity(value.len());
        let mut at_line_start = line_start;
        let mut digit_run = false;

        for (i, &c) in chars.iter().enumerate() {
            let prev = if i == 0 { None } else { Some(chars[i - 1]) };
            let next = chars.get(i + 1).copied();

            if c == DIRECTIVE_OPEN || c == DIRECTIVE_CLOSE || (in_table && c == '\n') {
                out.push_str(&char_ref(c));
            } else if guarded[i] && c.is_ascii_punctuation() {
                out.push('\\');
                out.push(c);
            } else if self.is_unsafe(c, &chars, i, prev, next, at_line_start, digit_run, in_table) {
                if c.is_ascii_punctuation() {
                    out.push('\\');
                    out.push(c);
                } else {
                    out.push_str(&char_ref(c));
                }
            } else {
                out.push(c);
            }

            if c == '\n' {
                at_line_start = true;
                digit_run = false;
            } else {
                digit_run = c.is_ascii_digit() && (at_line_start || digit_run);
                at_line_start = false;
            }
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn is_unsafe(
        &self,
        c: char,
        chars: &[char],
        i: usize,
        prev: Option<char>,
        next: Option<char>,
        at_line_start: bool,
        digit_run: bool,
        in_table: bool,
    ) -> bool {
        self.options.unsafe_chars.iter().any(|u| {
            if u.character != c {
                return false;
            }
            if u.before_alphanumeric && !next.is_some_and(|n| n.is_ascii_alphanumeric() || n == '#') {
                return false;
            }
            match u.position {
                UnsafePosition::Anywhere => true,
                UnsafePosition::LineStart => at_line_start,
                UnsafePosition::LineEnd => next == Some('\n'),
                UnsafePosition::OrderedListMarker => digit_run,
                UnsafePosition::TableCell => in_table,
                UnsafePosition::AutolinkProtocol => {
                    matches!(prev, Some('p' | 's' | 'P' | 'S')) && next == Some('/')
                }
                UnsafePosition::AutolinkWww => {
                    i >= 3 && chars[i - 3..i].iter().all(|w| w.eq_ignore_ascii_case(&'w'))
                }
                UnsafePosition::AutolinkEmail => {
                    let address = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.' | '_');
                    prev.is_some_and(address) && next.is_some_and(address)
                }
            }
        })
    }

    fn guarded_positions(&self, chars: &[char]) -> Vec<bool> {
        let mut guarded = vec![false; chars.len()];
        for guard in &self.options.literal_guards {
            let needle: Vec<char> = guard.chars().collect();
            if needle.is_empty() || needle.len() > chars.len() {
                continue;
            }
            for start in 0..=chars.len() - needle.len() {
                if chars[start..start + needle.len()] == needle[..] {
                    guarded[start..start + needle.len()].fill(true);
                }
            }
        }
        guarded
    }
}

fn char_ref(c: char) -> String {
    format!("&#x{:X};", c as u32)
}

/// Punctuation as delimiter runs see it. Non-ASCII symbols count too.
fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || (!c.is_ascii() && !c.is_alphanumeric() && !c.is_whitespace())
}

fn is_word_character(c: char) -> bool {
    !c.is_whitespace() && !is_punctuation(c)
}

fn encode_last_word_character(out: &mut String) {
    if let Some(last) = out.chars().last()
        && is_word_character(last)
    {
        out.pop();
        out.push_str(&char_ref(last));
    }
}

fn encode_first_word_character(text: &mut String) {
    if let Some(first) = text.chars().next()
        && is_word_character(first)
    {
        text.replace_range(..first.len_utf8(), &char_ref(first));
    }
}

fn ends_with_unescaped(out: &str, c: char) -> bool {
    let Some(rest) = out.strip_suffix(c) else {
        return false;
    };
    let backslashes = rest.chars().rev().take_while(|&b| b == '\\').count();
    backslashes % 2 == 0
}

/// A trailing run of `#` after whitespace (or alone) would close the heading.
fn guard_closing_hashes(content: String) -> String {
    let head = content.trim_end_matches('#');
    if head.len() == content.len() || !(head.is_empty() || head.ends_with([' ', '\t'])) {
        return content;
    }
    format!("{head}\\{}", &content[head.len()..])
}

fn indent_item(marker: &str, content: &str) -> String {
    if content.is_empty() {
        return marker.to_string();
    }
    let indent = " ".repeat(marker.len() + 1);
    let mut out = String::with_capacity(content.len() + marker.len() + 1);
    for (index, line) in content.split('\n').enumerate() {
        if index == 0 {
            out.push_str(marker);
            out.push(' ');
            out.push_str(line);
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&indent);
                out.push_str(line);
            }
        }
    }
    out
}

fn code_block(code: &Code) -> String {
    let info = code.lang.as_deref().unwrap_or_default();
    let marker = if info.contains('`') { '~' } else { '`' };
    let longest = longest_run(&code.value, marker);
    let fence = marker.to_string().repeat((longest + 1).max(3));

    let mut out = fence.clone();
    out.push_str(info);
    if let Some(meta) = code.meta.as_deref()
        && !meta.is_empty()
    {
        out.push(' ');
        out.push_str(meta);
    }
    out.push('\n');
    if !code.value.is_empty() {
        out.push_str(&code.value);
        out.push('\n');
    }
    out.push_str(&fence);
    out
}

fn longest_run(value: &str, marker: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in value.chars() {
        if c == marker {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn code_span(value: &str) -> String {
    // Smallest backtick run that does not occur in the value.
    let mut size = 1;
    while value
        .split(|c| c != '`')
        .any(|run| run.len() == size)
    {
        size += 1;
    }
    let fence = "`".repeat(size);
    let pad = value.starts_with('`')
        || value.ends_with('`')
        || (value.starts_with(' ') && value.ends_with(' ') && !value.trim().is_empty());
    if pad {
        format!("{fence} {value} {fence}")
    } else {
        format!("{fence}{value}{fence}")
    }
}

fn destination(url: &str) -> String {
    if url.is_empty() {
        return "<>".to_string();
    }
    if url
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '(' | ')'))
    {
        let escaped = url.replace('<', "\\<").replace('>', "\\>");
        format!("<{escaped}>")
    } else {
        url.to_string()
    }
}

fn push_title(out: &mut String, title: Option<&str>) {
    if let Some(title) = title {
        out.push_str(" \"");
        out.push_str(&title.replace('\\', "\\\\").replace('"', "\\\""));
        out.push('"');
    }
}

fn escape_alt(alt: &str) -> String {
    let mut out = String::with_capacity(alt.len());
    for c in alt.chars() {
        if matches!(c, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn directive_open(directive: &Directive) -> String {
    let mut tag = format!("{DIRECTIVE_OPEN}{}", directive.name);
    for attribute in &directive.attributes {
        // Tags are matched one line at a time.
        let value = html_escape::encode_double_quoted_attribute(&attribute.value)
            .replace('\n', "&#xA;")
            .replace('\r', "&#xD;");
        if attribute.name == "_value" {
            tag.push_str(&format!(" \"{value}\""));
        } else {
            tag.push_str(&format!(" {}=\"{value}\"", attribute.name));
        }
    }
    tag.push(DIRECTIVE_CLOSE);
    tag
}

fn jsx_attributes(el: &JsxElement) -> String {
    let mut out = String::new();
    for attribute in &el.attributes {
        out.push(' ');
        out.push_str(&attribute.name);
        match &attribute.value {
            None => {}
            Some(AttributeValue::Literal(value)) if !value.contains('"') => {
                out.push_str(&format!("=\"{value}\""));
            }
            Some(AttributeValue::Literal(value)) if !value.contains('\'') => {
                out.push_str(&format!("='{value}'"));
            }
            Some(AttributeValue::Literal(value)) => {
                // Both quote kinds: a JS string expression needs no entities.
                let quoted = serde_json::Value::String(value.clone()).to_string();
                out.push_str(&format!("={{{quoted}}}"));
            }
            Some(AttributeValue::Expression(expr)) => {
                out.push_str(&format!("={{{expr}}}"));
            }
        }
    }
    out
}
