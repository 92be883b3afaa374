//! Shortcode syntax (`{{< name attr="v" >}}`), on top of markdown-rs.
//!
//! markdown-rs has no extension points, so shortcodes are handled around it:
//!
//! 1. [`preprocess`] scans the source line by line (skipping fenced code) and
//!    swaps every recognised tag for a private-use placeholder backed by a
//!    token table. Tags alone on a line get a paragraph of their own.
//! 2. The text is parsed and lowered as usual.
//! 3. [`Preprocessed::fold`] turns placeholder paragraphs into
//!    `containerDirective`/`leafDirective` nodes and inline placeholders into
//!    `textDirective` nodes. Tags that do not pair up, or that ended up in
//!    code, raw HTML or attribute values, get their source text back.
//!
//! [`rewrite`] is the stringify counterpart: it replaces the serializer's
//! internal directive delimiters with the configured ones.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::RichmarkError;
use crate::code_fence::{FenceState, advance_fence_state};
use crate::mdast::{Directive, DirectiveAttribute, Node, Parent};
use crate::serialize::{DIRECTIVE_CLOSE, DIRECTIVE_OPEN};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").unwrap());

static INTERNAL_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x{E000}(/?)([^\x{E000}\x{E001}\s]+)([^\x{E000}\x{E001}]*)\x{E001}").unwrap()
});

/// Whether a shortcode wraps content or stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Open and close tags around flow content.
    Block,
    /// A single tag, alone on a line or inside text.
    Leaf,
}

/// One shortcode recognised in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcodePattern {
    /// Opening delimiter, e.g. `{{<`.
    pub start: String,
    /// Closing delimiter, e.g. `>}}`.
    pub end: String,
    /// Name written between the delimiters, when it differs from the
    /// template name.
    pub name: Option<String>,
    /// Template name carried by the directive node.
    pub template_name: String,
    /// Block or leaf.
    pub placement: Placement,
}

impl ShortcodePattern {
    /// The name written between the delimiters.
    pub fn token_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.template_name)
    }
}

struct Compiled<'a> {
    pattern: &'a ShortcodePattern,
    open: Regex,
    close: Option<Regex>,
}

fn compile(patterns: &[ShortcodePattern]) -> Result<Vec<Compiled<'_>>, RichmarkError> {
    patterns
        .iter()
        .map(|pattern| {
            let start = regex::escape(&pattern.start);
            let end = regex::escape(&pattern.end);
            let name = regex::escape(pattern.token_name());
            let build = |source: String| {
                Regex::new(&source).map_err(|err| {
                    RichmarkError::Config(format!(
                        "shortcode `{}` cannot be matched: {err}",
                        pattern.template_name
                    ))
                })
            };
            let open = build(format!(r"^{start}\s*{name}(?:\s+(.*?))?\s*{end}"))?;
            let close = match pattern.placement {
                Placement::Block => Some(build(format!(r"^{start}\s*/\s*{name}\s*{end}"))?),
                Placement::Leaf => None,
            };
            Ok(Compiled {
                pattern,
                open,
                close,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Open,
    Close,
    Leaf,
    /// A private-use character from the source, restored wherever it lands.
    Literal,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    pattern: usize,
    kind: TagKind,
    name: String,
    attributes: Vec<DirectiveAttribute>,
    source: String,
}

/// Source text with shortcode tags replaced by placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    /// Text to hand to the markdown parser.
    pub text: String,
    tokens: Vec<Token>,
}

/// Replaces the shortcode tags in `input` with placeholders.
///
/// Patterns are tried in order and the first match wins; scanning resumes
/// after the matched tag. Fenced code is left untouched.
pub fn preprocess(input: &str, patterns: &[ShortcodePattern]) -> Result<Preprocessed, RichmarkError> {
    if patterns.is_empty() {
        return Ok(Preprocessed {
            text: input.to_string(),
            tokens: Vec::new(),
        });
    }

    let compiled = compile(patterns)?;
    let mut scanner = Scanner {
        compiled: &compiled,
        tokens: Vec::new(),
    };
    let mut fence_state = FenceState::default();
    let mut lines: Vec<String> = Vec::new();

    for line in input.split('\n') {
        let quote = container_prefix(line);
        let rest = &line[quote..];
        let outcome = advance_fence_state(rest, fence_state);
        fence_state = outcome.next_state;
        let line = scanner.literals(line);
        if outcome.in_code {
            lines.push(line);
            continue;
        }

        let rest = &line[quote..];
        let trimmed = rest.trim();
        if indent_columns(rest) <= 3
            && let Some(placeholder) = scanner.whole_line(trimmed)
        {
            let lead = &line[..quote + (rest.len() - rest.trim_start().len())];
            let blank = line[..quote].trim_end();
            lines.push(blank.to_string());
            lines.push(format!("{lead}{placeholder}"));
            lines.push(blank.to_string());
            continue;
        }

        lines.push(scanner.inline(&line));
    }

    Ok(Preprocessed {
        text: lines.join("\n"),
        tokens: scanner.tokens,
    })
}

struct Scanner<'a> {
    compiled: &'a [Compiled<'a>],
    tokens: Vec<Token>,
}

impl Scanner<'_> {
    fn whole_line(&mut self, trimmed: &str) -> Option<String> {
        for (index, compiled) in self.compiled.iter().enumerate() {
            if let Some(caps) = compiled.open.captures(trimmed)
                && caps.get(0).is_some_and(|m| m.end() == trimmed.len())
            {
                let kind = match compiled.pattern.placement {
                    Placement::Block => TagKind::Open,
                    Placement::Leaf => TagKind::Leaf,
                };
                let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                return Some(self.push(index, kind, attrs, trimmed));
            }
            if let Some(close) = &compiled.close
                && close.find(trimmed).is_some_and(|m| m.end() == trimmed.len())
            {
                return Some(self.push(index, TagKind::Close, "", trimmed));
            }
        }
        None
    }

    fn inline(&mut self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut pos = 0;
        'scan: while let Some(ch) = line[pos..].chars().next() {
            let rest = &line[pos..];
            for (index, compiled) in self.compiled.iter().enumerate() {
                if compiled.pattern.placement != Placement::Leaf
                    || !rest.starts_with(&compiled.pattern.start)
                {
                    continue;
                }
                if let Some(caps) = compiled.open.captures(rest)
                    && let Some(whole) = caps.get(0)
                {
                    let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let placeholder = self.push(index, TagKind::Leaf, attrs, whole.as_str());
                    out.push_str(&placeholder);
                    pos += whole.end();
                    continue 'scan;
                }
            }
            out.push(ch);
            pos += ch.len_utf8();
        }
        out
    }

    /// Source text must not forge placeholders.
    fn literals(&mut self, line: &str) -> String {
        if !line.contains([DIRECTIVE_OPEN, DIRECTIVE_CLOSE]) {
            return line.to_string();
        }
        let mut out = String::with_capacity(line.len());
        for c in line.chars() {
            if c != DIRECTIVE_OPEN && c != DIRECTIVE_CLOSE {
                out.push(c);
                continue;
            }
            let index = self.tokens.len();
            self.tokens.push(Token {
                pattern: usize::MAX,
                kind: TagKind::Literal,
                name: String::new(),
                attributes: Vec::new(),
                source: c.to_string(),
            });
            out.push_str(&format!("{DIRECTIVE_OPEN}{index}{DIRECTIVE_CLOSE}"));
        }
        out
    }

    fn push(&mut self, pattern: usize, kind: TagKind, attrs: &str, source: &str) -> String {
        let index = self.tokens.len();
        self.tokens.push(Token {
            pattern,
            kind,
            name: self.compiled[pattern].pattern.template_name.clone(),
            attributes: parse_attributes(attrs),
            source: source.to_string(),
        });
        format!("{DIRECTIVE_OPEN}{index}{DIRECTIVE_CLOSE}")
    }
}

/// Byte length of the block quote markers (`> > `) starting `line`.
fn container_prefix(line: &str) -> usize {
    let bytes = line.as_bytes();
    let mut end = 0;
    let mut i = 0;
    loop {
        let mut j = i;
        while j < bytes.len() && bytes[j] == b' ' && j - i < 3 {
            j += 1;
        }
        if j < bytes.len() && bytes[j] == b'>' {
            j += 1;
            if j < bytes.len() && bytes[j] == b' ' {
                j += 1;
            }
            end = j;
            i = j;
        } else {
            return end;
        }
    }
}

fn indent_columns(text: &str) -> usize {
    let mut columns = 0;
    for b in text.bytes() {
        match b {
            b' ' => columns += 1,
            b'\t' => columns += 4 - (columns % 4),
            _ => break,
        }
    }
    columns
}

/// Tokenize attributes respecting quoted values.
/// Splits on whitespace but keeps quoted strings intact.
fn tokenize_attrs(attrs: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut token_start: Option<usize> = None;
    let mut in_quotes = false;
    let mut quote_char = '"';

    for (i, c) in attrs.char_indices() {
        match c {
            '"' | '\'' if !in_quotes => {
                if token_start.is_none() {
                    token_start = Some(i);
                }
                in_quotes = true;
                quote_char = c;
            }
            c if c == quote_char && in_quotes => {
                in_quotes = false;
            }
            c if c.is_whitespace() && !in_quotes => {
                if let Some(start) = token_start.take() {
                    tokens.push(&attrs[start..i]);
                }
            }
            _ => {
                if token_start.is_none() {
                    token_start = Some(i);
                }
            }
        }
    }

    if let Some(start) = token_start {
        tokens.push(&attrs[start..]);
    }

    tokens
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parses `key="v" key='v' key=v "positional"` into directive attributes.
/// A token without `=` binds to `_value`.
fn parse_attributes(attrs: &str) -> Vec<DirectiveAttribute> {
    tokenize_attrs(attrs.trim())
        .into_iter()
        .map(|token| {
            let split = token
                .find('=')
                .filter(|eq| !token[..*eq].contains(['"', '\'']));
            let (name, raw) = match split {
                Some(eq) => (&token[..eq], &token[eq + 1..]),
                None => ("_value", token),
            };
            let value = html_escape::decode_html_entities(unquote(raw));
            DirectiveAttribute::new(name, value)
        })
        .collect()
}

impl Preprocessed {
    /// Whether any tag was replaced.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Folds placeholders in a lowered tree back into directive nodes.
    pub fn fold(&self, node: Node) -> Node {
        if self.tokens.is_empty() {
            return node;
        }
        self.fold_node(node)
    }

    fn token(&self, index: &str) -> Option<&Token> {
        index.parse::<usize>().ok().and_then(|i| self.tokens.get(i))
    }

    /// Puts back the source text of every placeholder in `value`.
    fn restore(&self, value: &str) -> String {
        if !value.contains(DIRECTIVE_OPEN) {
            return value.to_string();
        }
        PLACEHOLDER
            .replace_all(value, |caps: &regex::Captures<'_>| match self.token(&caps[1]) {
                Some(token) => token.source.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn restored_paragraph(&self, token: &Token) -> Node {
        log::debug!("shortcode tag `{}` has no counterpart, keeping it as text", token.source);
        Node::paragraph(vec![Node::text(token.source.clone())])
    }

    /// The token of a paragraph that holds nothing but one placeholder.
    fn solo_token(&self, node: &Node) -> Option<&Token> {
        let Node::Paragraph(p) = node else {
            return None;
        };
        let [Node::Text(text)] = p.children.as_slice() else {
            return None;
        };
        let caps = PLACEHOLDER.captures(text.value.trim())?;
        if caps.get(0)?.as_str().len() != text.value.trim().len() {
            return None;
        }
        self.token(&caps[1])
    }

    fn directive(token: &Token, children: Vec<Node>) -> Directive {
        Directive {
            name: token.name.clone(),
            attributes: token.attributes.clone(),
            children,
        }
    }

    fn fold_flow(&self, children: Vec<Node>) -> Vec<Node> {
        let mut out: Vec<Node> = Vec::with_capacity(children.len());
        let mut open: Vec<(&Token, Vec<Node>)> = Vec::new();

        for child in children {
            let Some(token) = self.solo_token(&child) else {
                out.push(self.fold_node(child));
                continue;
            };
            match token.kind {
                TagKind::Literal => out.push(self.fold_node(child)),
                TagKind::Open => open.push((token, std::mem::take(&mut out))),
                TagKind::Leaf => out.push(Node::LeafDirective(Self::directive(token, Vec::new()))),
                TagKind::Close => {
                    let Some(depth) = open.iter().rposition(|(o, _)| o.pattern == token.pattern)
                    else {
                        out.push(self.restored_paragraph(token));
                        continue;
                    };
                    // Opens above the match were never closed.
                    while open.len() > depth + 1 {
                        self.unwind(&mut open, &mut out);
                    }
                    if let Some((opener, saved)) = open.pop() {
                        let body = std::mem::replace(&mut out, saved);
                        out.push(Node::ContainerDirective(Self::directive(opener, body)));
                    }
                }
            }
        }

        while !open.is_empty() {
            self.unwind(&mut open, &mut out);
        }
        out
    }

    fn unwind(&self, open: &mut Vec<(&Token, Vec<Node>)>, out: &mut Vec<Node>) {
        if let Some((opener, saved)) = open.pop() {
            let body = std::mem::replace(out, saved);
            out.push(self.restored_paragraph(opener));
            out.extend(body);
        }
    }

    fn fold_phrasing(&self, children: Vec<Node>) -> Vec<Node> {
        let mut out: Vec<Node> = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Node::Text(text) if text.value.contains(DIRECTIVE_OPEN) => {
                    self.split_text(&text.value, &mut out);
                }
                other => out.push(self.fold_node(other)),
            }
        }
        out
    }

    fn split_text(&self, value: &str, out: &mut Vec<Node>) {
        let mut pending = String::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(value) {
            let Some(whole) = caps.get(0) else { continue };
            pending.push_str(&value[last..whole.start()]);
            last = whole.end();
            match self.token(&caps[1]) {
                Some(token) if token.kind == TagKind::Literal => pending.push_str(&token.source),
                Some(token) if token.kind == TagKind::Leaf => {
                    if !pending.is_empty() {
                        out.push(Node::text(std::mem::take(&mut pending)));
                    }
                    out.push(Node::TextDirective(Self::directive(token, Vec::new())));
                }
                Some(token) => {
                    log::debug!("shortcode tag `{}` inside text, keeping it as text", token.source);
                    pending.push_str(&token.source);
                }
                None => pending.push_str(whole.as_str()),
            }
        }
        pending.push_str(&value[last..]);
        if !pending.is_empty() {
            out.push(Node::text(pending));
        }
    }

    fn fold_node(&self, node: Node) -> Node {
        match node {
            Node::Root(mut root) => {
                root.children = self.fold_flow(root.children);
                Node::Root(root)
            }
            Node::Blockquote(q) => Node::Blockquote(Parent {
                children: self.fold_flow(q.children),
            }),
            Node::ListItem(mut item) => {
                item.children = self.fold_flow(item.children);
                Node::ListItem(item)
            }
            Node::ContainerDirective(mut d) => {
                d.children = self.fold_flow(d.children);
                Node::ContainerDirective(d)
            }
            Node::MdxJsxFlowElement(mut el) => {
                el.children = self.fold_flow(el.children);
                el.attributes = self.restore_attributes(el.attributes);
                Node::MdxJsxFlowElement(el)
            }
            Node::MdxJsxTextElement(mut el) => {
                el.children = self.fold_phrasing(el.children);
                el.attributes = self.restore_attributes(el.attributes);
                Node::MdxJsxTextElement(el)
            }
            Node::List(mut list) => {
                list.children = list.children.into_iter().map(|c| self.fold_node(c)).collect();
                Node::List(list)
            }
            Node::Table(mut table) => {
                table.children = table.children.into_iter().map(|c| self.fold_node(c)).collect();
                Node::Table(table)
            }
            Node::TableRow(row) => Node::TableRow(Parent {
                children: row.children.into_iter().map(|c| self.fold_node(c)).collect(),
            }),
            Node::Paragraph(p) => Node::paragraph(self.fold_phrasing(p.children)),
            Node::TableCell(p) => Node::TableCell(Parent {
                children: self.fold_phrasing(p.children),
            }),
            Node::Emphasis(p) => Node::Emphasis(Parent {
                children: self.fold_phrasing(p.children),
            }),
            Node::Strong(p) => Node::Strong(Parent {
                children: self.fold_phrasing(p.children),
            }),
            Node::Delete(p) => Node::Delete(Parent {
                children: self.fold_phrasing(p.children),
            }),
            Node::Heading(mut h) => {
                h.children = self.fold_phrasing(h.children);
                Node::Heading(h)
            }
            Node::Link(mut link) => {
                link.children = self.fold_phrasing(link.children);
                link.url = self.restore(&link.url);
                link.title = link.title.map(|t| self.restore(&t));
                Node::Link(link)
            }
            Node::Image(mut image) => {
                image.url = self.restore(&image.url);
                image.alt = self.restore(&image.alt);
                image.title = image.title.map(|t| self.restore(&t));
                Node::Image(image)
            }
            Node::Code(mut code) => {
                code.value = self.restore(&code.value);
                Node::Code(code)
            }
            Node::InlineCode(mut code) => {
                code.value = self.restore(&code.value);
                Node::InlineCode(code)
            }
            Node::Html(mut html) => {
                html.value = self.restore(&html.value);
                Node::Html(html)
            }
            Node::Text(mut text) => {
                text.value = self.restore(&text.value);
                Node::Text(text)
            }
            other => other,
        }
    }

    fn restore_attributes(
        &self,
        attributes: Vec<crate::mdast::JsxAttribute>,
    ) -> Vec<crate::mdast::JsxAttribute> {
        use crate::mdast::AttributeValue;
        attributes
            .into_iter()
            .map(|mut attribute| {
                attribute.value = attribute.value.map(|value| match value {
                    AttributeValue::Literal(s) => AttributeValue::Literal(self.restore(&s)),
                    AttributeValue::Expression(s) => AttributeValue::Expression(self.restore(&s)),
                });
                attribute
            })
            .collect()
    }
}

/// Replaces the serializer's internal directive tags with shortcode
/// delimiters: `{start} name attrs {end}` and `{start} /name {end}`.
///
/// Tags naming no pattern are left as they are; they come from code or raw
/// HTML holding private-use characters.
pub fn rewrite(text: &str, patterns: &[ShortcodePattern]) -> Result<String, RichmarkError> {
    if !text.contains(DIRECTIVE_OPEN) {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in INTERNAL_TAG.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let name = &caps[2];
        let Some(pattern) = patterns.iter().find(|p| p.template_name == name) else {
            out.push_str(whole.as_str());
            continue;
        };
        out.push_str(&pattern.start);
        out.push(' ');
        out.push_str(&caps[1]);
        out.push_str(pattern.token_name());
        out.push_str(&encode_delimiter(&caps[3], &pattern.end));
        out.push(' ');
        out.push_str(&pattern.end);
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// The end delimiter inside an attribute value would cut the tag short.
fn encode_delimiter(attrs: &str, end: &str) -> String {
    let Some(first) = end.chars().next() else {
        return attrs.to_string();
    };
    let encoded = format!("&#x{:X};{}", first as u32, &end[first.len_utf8()..]);
    attrs.replace(end, &encoded)
}

/// Start delimiters that must be escaped wherever they appear in text.
pub fn literal_guards(patterns: &[ShortcodePattern]) -> Vec<String> {
    let mut guards: Vec<String> = patterns.iter().map(|p| p.start.clone()).collect();
    guards.sort();
    guards.dedup();
    guards.retain(|g| !g.is_empty());
    guards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DepthGuard;
    use crate::mdast::from_markdown;
    use crate::parse::{ParseOptions, parse_mdast};

    fn pattern(name: &str, placement: Placement) -> ShortcodePattern {
        ShortcodePattern {
            start: "{{<".into(),
            end: ">}}".into(),
            name: None,
            template_name: name.into(),
            placement,
        }
    }

    fn fold(input: &str, patterns: &[ShortcodePattern]) -> Vec<Node> {
        let pre = preprocess(input, patterns).unwrap();
        let tree = parse_mdast(&pre.text, &ParseOptions::markdown()).unwrap();
        let lowered = from_markdown(tree, DepthGuard::default()).unwrap();
        match pre.fold(lowered) {
            Node::Root(root) => root.children,
            other => panic!("expected root, got {}", other.kind()),
        }
    }

    #[test]
    fn block_shortcode_becomes_container() {
        let children = fold(
            "{{< signature foo=\"bar123\" >}}\nSigned\n{{< /signature >}}",
            &[pattern("signature", Placement::Block)],
        );
        assert_eq!(
            children,
            vec![Node::ContainerDirective(Directive {
                name: "signature".into(),
                attributes: vec![DirectiveAttribute::new("foo", "bar123")],
                children: vec![Node::paragraph(vec![Node::text("Signed")])],
            })]
        );
    }

    #[test]
    fn leaf_shortcode_positional_value() {
        let children = fold("{{< sig \"bar\" >}}", &[pattern("sig", Placement::Leaf)]);
        assert_eq!(
            children,
            vec![Node::LeafDirective(Directive {
                name: "sig".into(),
                attributes: vec![DirectiveAttribute::new("_value", "bar")],
                children: Vec::new(),
            })]
        );
    }

    #[test]
    fn inline_shortcode_becomes_text_directive() {
        let children = fold("Hello {{< sig >}} world", &[pattern("sig", Placement::Leaf)]);
        let Node::Paragraph(p) = &children[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.children.len(), 3);
        assert_eq!(p.children[0], Node::text("Hello "));
        assert!(matches!(&p.children[1], Node::TextDirective(d) if d.name == "sig"));
        assert_eq!(p.children[2], Node::text(" world"));
    }

    #[test]
    fn name_override_maps_to_template() {
        let mut p = pattern("signature", Placement::Leaf);
        p.name = Some("sig".into());
        let children = fold("{{< sig >}}", &[p]);
        assert!(matches!(&children[0], Node::LeafDirective(d) if d.name == "signature"));
    }

    #[test]
    fn fenced_code_is_left_alone() {
        let children = fold("```\n{{< sig >}}\n```", &[pattern("sig", Placement::Leaf)]);
        let Node::Code(code) = &children[0] else {
            panic!("expected code");
        };
        assert_eq!(code.value, "{{< sig >}}");
    }

    #[test]
    fn inline_code_gets_source_back() {
        let children = fold("`{{< sig >}}`", &[pattern("sig", Placement::Leaf)]);
        let Node::Paragraph(p) = &children[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            p.children[0],
            Node::InlineCode(crate::mdast::Literal {
                value: "{{< sig >}}".into()
            })
        );
    }

    #[test]
    fn unmatched_close_is_text() {
        let children = fold("{{< /sig >}}", &[pattern("sig", Placement::Block)]);
        assert_eq!(children, vec![Node::paragraph(vec![Node::text("{{< /sig >}}")])]);
    }

    #[test]
    fn unclosed_open_is_text_and_keeps_following_blocks() {
        let children = fold("{{< sig >}}\n\nafter", &[pattern("sig", Placement::Block)]);
        assert_eq!(
            children,
            vec![
                Node::paragraph(vec![Node::text("{{< sig >}}")]),
                Node::paragraph(vec![Node::text("after")]),
            ]
        );
    }

    #[test]
    fn nested_containers_pair_up() {
        let children = fold(
            "{{< a >}}\n{{< b >}}\ninner\n{{< /b >}}\n{{< /a >}}",
            &[pattern("a", Placement::Block), pattern("b", Placement::Block)],
        );
        let [Node::ContainerDirective(outer)] = children.as_slice() else {
            panic!("expected one container, got {children:?}");
        };
        assert_eq!(outer.name, "a");
        assert!(matches!(&outer.children[0], Node::ContainerDirective(d) if d.name == "b"));
    }

    #[test]
    fn shortcode_inside_block_quote() {
        let children = fold("> {{< sig >}}", &[pattern("sig", Placement::Leaf)]);
        let Node::Blockquote(q) = &children[0] else {
            panic!("expected blockquote");
        };
        assert!(matches!(&q.children[0], Node::LeafDirective(_)));
    }

    #[test]
    fn first_declared_pattern_wins() {
        let mut other = pattern("sig", Placement::Leaf);
        other.name = Some("sig".into());
        other.template_name = "second".into();
        let children = fold(
            "{{< sig >}}",
            &[pattern("sig", Placement::Leaf), other],
        );
        assert!(matches!(&children[0], Node::LeafDirective(d) if d.name == "sig"));
    }

    #[test]
    fn tokenizes_quoted_attributes() {
        assert_eq!(
            tokenize_attrs("title=\"foo bar\" data='baz qux' n=3"),
            vec!["title=\"foo bar\"", "data='baz qux'", "n=3"]
        );
        assert_eq!(
            parse_attributes("a=\"say &quot;hi&quot;\" 'pos'"),
            vec![
                DirectiveAttribute::new("a", "say \"hi\""),
                DirectiveAttribute::new("_value", "pos"),
            ]
        );
    }

    #[test]
    fn rewrite_uses_configured_delimiters() {
        let text = "\u{E000}signature foo=\"bar123\"\u{E001}\n\u{E000}/signature\u{E001}\n";
        let out = rewrite(text, &[pattern("signature", Placement::Block)]).unwrap();
        assert_eq!(out, "{{< signature foo=\"bar123\" >}}\n{{< /signature >}}\n");
    }

    #[test]
    fn rewrite_uses_name_override() {
        let mut p = pattern("signature", Placement::Leaf);
        p.name = Some("sig".into());
        let out = rewrite("\u{E000}signature\u{E001}", &[p]).unwrap();
        assert_eq!(out, "{{< sig >}}");
    }

    #[test]
    fn rewrite_keeps_tags_without_pattern() {
        let out = rewrite("`\u{E000}ghost\u{E001}`", &[]).unwrap();
        assert_eq!(out, "`\u{E000}ghost\u{E001}`");
    }

    #[test]
    fn rewrite_encodes_end_delimiter_in_values() {
        let mut p = pattern("note", Placement::Leaf);
        p.start = "{{%".into();
        p.end = "%}}".into();
        let out = rewrite("\u{E000}note text=\"a %}} b\"\u{E001}", &[p.clone()]).unwrap();
        assert_eq!(out, "{{% note text=\"a &#x25;}} b\" %}}");

        let children = fold(&out, &[p]);
        assert_eq!(
            children,
            vec![Node::LeafDirective(Directive {
                name: "note".into(),
                attributes: vec![DirectiveAttribute::new("text", "a %}} b")],
                children: Vec::new(),
            })]
        );
    }

    #[test]
    fn private_use_characters_in_code_survive() {
        let children = fold(
            "`a\u{E000}b`\n\n```\nx\u{E001}\n```\n\n    y\u{E000}",
            &[pattern("sig", Placement::Leaf)],
        );
        let Node::Paragraph(p) = &children[0] else {
            panic!("expected paragraph, got {children:?}");
        };
        assert_eq!(
            p.children,
            vec![Node::InlineCode(crate::mdast::Literal {
                value: "a\u{E000}b".into()
            })]
        );
        assert!(matches!(&children[1], Node::Code(code) if code.value == "x\u{E001}"));
        assert!(matches!(&children[2], Node::Code(code) if code.value == "y\u{E000}"));
    }
}
