//! MDX parser for the legacy component vocabulary.
//!
//! Block level splits into flow elements (an element that starts a line and whose
//! closing tag ends one), flow expressions, fenced code and prose groups separated by
//! blank lines. Prose is kept as raw markdown; text-level elements inside it turn the
//! group into a [`Node::Paragraph`]. Code spans and fences are never scanned for tags.

use campus_core::MigrationError;

use crate::ast::{AttrValue, Attribute, Element, Node};

type ParseResult<T> = Result<T, MigrationError>;

pub fn parse(src: &str) -> ParseResult<Vec<Node>> {
    parse_blocks(src, 0)
}

fn syntax(offset: usize, reason: impl Into<String>) -> MigrationError {
    MigrationError::MarkupSyntax {
        offset,
        reason: reason.into(),
    }
}

struct OpenTag {
    name: String,
    attributes: Vec<Attribute>,
    self_closing: bool,
    end: usize,
}

struct RawElement<'a> {
    tag: OpenTag,
    content: Option<&'a str>,
    content_start: usize,
    end: usize,
}

fn parse_blocks(src: &str, base: usize) -> ParseResult<Vec<Node>> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while pos < src.len() {
        let end_of_line = line_end(src, pos);
        let line = &src[pos..end_of_line];
        if line.trim().is_empty() {
            pos = next_line(src, end_of_line);
            continue;
        }

        if let Some(fence_end) = fence_block_end(src, pos) {
            blocks.push(Node::Markdown(src[pos..fence_end].trim_end().to_string()));
            pos = next_line(src, fence_end);
            continue;
        }

        let at = pos + indentation(line);
        if let Some((node, end)) = flow_node_at(src, at, base)? {
            blocks.push(node);
            pos = next_line(src, line_end(src, end));
            continue;
        }

        let (node, end) = parse_prose_group(src, pos, base)?;
        if let Some(node) = node {
            blocks.push(node);
        }
        pos = end;
    }

    Ok(blocks)
}

/// A flow element or flow expression starting at `at`, if the rest of its last line is blank.
fn flow_node_at(src: &str, at: usize, base: usize) -> ParseResult<Option<(Node, usize)>> {
    let bytes = src.as_bytes();
    match bytes.get(at) {
        Some(b'<') => {
            if let Some((name, _)) = parse_closing_tag(src, at) {
                return Err(syntax(base + at, format!("unexpected closing tag </{name}>")));
            }
            let Some(raw) = parse_element(src, at, base)? else {
                return Ok(None);
            };
            if !rest_of_line_blank(src, raw.end) {
                return Ok(None);
            }
            let end = raw.end;
            let element = build_element(raw, true, base)?;
            Ok(Some((Node::Element(element), end)))
        }
        Some(b'{') => {
            let Some(end) = balanced_end(src, at) else {
                return Ok(None);
            };
            if !rest_of_line_blank(src, end) {
                return Ok(None);
            }
            Ok(Some((Node::Expression(src[at + 1..end - 1].to_string()), end)))
        }
        _ => Ok(None),
    }
}

fn build_element(raw: RawElement<'_>, flow: bool, base: usize) -> ParseResult<Element> {
    let children = match raw.content {
        None => Vec::new(),
        Some(content) if flow => parse_blocks(&dedent(content), base + raw.content_start)?,
        Some(content) => scan_prose(content, 0, base + raw.content_start, false)?.0,
    };
    Ok(Element {
        name: raw.tag.name,
        attributes: raw.tag.attributes,
        children,
        flow,
    })
}

fn parse_prose_group(src: &str, pos: usize, base: usize) -> ParseResult<(Option<Node>, usize)> {
    let (mut parts, end) = scan_prose(src, pos, base, true)?;

    if let Some(Node::Markdown(last)) = parts.last_mut() {
        let trimmed = last.trim_end().len();
        last.truncate(trimmed);
        if last.is_empty() {
            parts.pop();
        }
    }

    let node = if parts.iter().any(|part| matches!(part, Node::Element(_))) {
        Some(Node::Paragraph(parts))
    } else {
        parts.pop()
    };
    Ok((node, end))
}

/// Scan prose from `start`, splitting out text-level elements.
///
/// In block mode the scan stops before a blank line, a fence or a flow node; the
/// returned offset is where block parsing resumes.
fn scan_prose(src: &str, start: usize, base: usize, block_mode: bool) -> ParseResult<(Vec<Node>, usize)> {
    let bytes = src.as_bytes();
    let mut parts = Vec::new();
    let mut text_start = start;
    let mut i = start;
    let mut end = src.len();

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => i = skip_code_span(src, i),
            b'<' => {
                if let Some((name, _)) = parse_closing_tag(src, i) {
                    return Err(syntax(base + i, format!("unexpected closing tag </{name}>")));
                }
                match parse_element(src, i, base)? {
                    Some(raw) => {
                        if text_start < i {
                            parts.push(Node::Markdown(src[text_start..i].to_string()));
                        }
                        let next = raw.end;
                        parts.push(Node::Element(build_element(raw, false, base)?));
                        i = next;
                        text_start = i;
                    }
                    None => i += 1,
                }
            }
            b'\n' if block_mode => {
                let next = i + 1;
                let next_line_text = &src[next..line_end(src, next)];
                if next >= src.len()
                    || next_line_text.trim().is_empty()
                    || fence_block_end(src, next).is_some()
                    || flow_node_at(src, next + indentation(next_line_text), base)?.is_some()
                {
                    end = next;
                    break;
                }
                i = next;
            }
            _ => i += 1,
        }
    }

    let text_end = if block_mode { end.min(src.len()) } else { src.len() };
    if text_start < text_end {
        parts.push(Node::Markdown(src[text_start..text_end].to_string()));
    }
    Ok((parts, end))
}

fn parse_element<'a>(src: &'a str, at: usize, base: usize) -> ParseResult<Option<RawElement<'a>>> {
    let Some(tag) = parse_open_tag(src, at, base)? else {
        return Ok(None);
    };
    if tag.self_closing {
        let end = tag.end;
        return Ok(Some(RawElement {
            content_start: end,
            tag,
            content: None,
            end,
        }));
    }

    let (close_start, close_end) = find_close(src, tag.end, &tag.name, base, at)?;
    Ok(Some(RawElement {
        content: Some(&src[tag.end..close_start]),
        content_start: tag.end,
        end: close_end,
        tag,
    }))
}

fn is_name_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$'
}

fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'$' | b'-' | b'.' | b':')
}

fn scan_name(src: &str, start: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = start;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    i
}

/// `<https://...>` and `<someone@example.org>` are markdown autolinks, not tags.
fn is_autolink(src: &str, at: usize) -> bool {
    let rest = &src[at + 1..];
    let end = rest
        .find(|c: char| c == '>' || c.is_whitespace())
        .unwrap_or(rest.len());
    rest[end..].starts_with('>') && rest[..end].contains([':', '@'])
}

fn parse_open_tag(src: &str, at: usize, base: usize) -> ParseResult<Option<OpenTag>> {
    let bytes = src.as_bytes();
    let name_start = at + 1;
    if !bytes.get(name_start).copied().is_some_and(is_name_start) || is_autolink(src, at) {
        return Ok(None);
    }

    let name_end = scan_name(src, name_start);
    let name = src[name_start..name_end].to_string();
    let mut attributes = Vec::new();
    let mut i = name_end;

    loop {
        i = skip_whitespace(src, i);
        let Some(&byte) = bytes.get(i) else {
            return Err(syntax(base + at, format!("unterminated tag <{name}>")));
        };
        match byte {
            b'>' => {
                return Ok(Some(OpenTag {
                    name,
                    attributes,
                    self_closing: false,
                    end: i + 1,
                }))
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Ok(Some(OpenTag {
                    name,
                    attributes,
                    self_closing: true,
                    end: i + 2,
                }))
            }
            b'{' => {
                let end = balanced_end(src, i)
                    .ok_or_else(|| syntax(base + i, format!("unbalanced braces in <{name}>")))?;
                let inner = &src[i + 1..end - 1];
                if !inner.trim_start().starts_with("...") {
                    return Err(syntax(base + i, format!("expected spread attribute in <{name}>")));
                }
                attributes.push(Attribute {
                    name: String::new(),
                    value: AttrValue::Expression(inner.to_string()),
                });
                i = end;
            }
            b if is_name_start(b) => {
                let attr_end = scan_name(src, i);
                let attr_name = src[i..attr_end].to_string();
                i = skip_whitespace(src, attr_end);
                let value = if bytes.get(i) == Some(&b'=') {
                    i = skip_whitespace(src, i + 1);
                    match bytes.get(i) {
                        Some(&quote @ (b'"' | b'\'')) => {
                            let close = src[i + 1..]
                                .find(quote as char)
                                .map(|offset| i + 1 + offset)
                                .ok_or_else(|| {
                                    syntax(base + i, format!("unterminated value for `{attr_name}`"))
                                })?;
                            let value = AttrValue::Literal(src[i + 1..close].to_string());
                            i = close + 1;
                            value
                        }
                        Some(b'{') => {
                            let end = balanced_end(src, i).ok_or_else(|| {
                                syntax(base + i, format!("unbalanced braces in `{attr_name}`"))
                            })?;
                            let value = AttrValue::Expression(src[i + 1..end - 1].to_string());
                            i = end;
                            value
                        }
                        _ => {
                            return Err(syntax(
                                base + i,
                                format!("expected a value for `{attr_name}` in <{name}>"),
                            ))
                        }
                    }
                } else {
                    AttrValue::Boolean
                };
                attributes.push(Attribute {
                    name: attr_name,
                    value,
                });
            }
            _ => {
                return Err(syntax(
                    base + i,
                    format!("unexpected character `{}` in <{name}>", byte as char),
                ))
            }
        }
    }
}

fn parse_closing_tag(src: &str, at: usize) -> Option<(String, usize)> {
    if !src[at..].starts_with("</") {
        return None;
    }
    let name_start = skip_whitespace(src, at + 2);
    if !src.as_bytes().get(name_start).copied().is_some_and(is_name_start) {
        return None;
    }
    let name_end = scan_name(src, name_start);
    let close = skip_whitespace(src, name_end);
    (src.as_bytes().get(close) == Some(&b'>'))
        .then(|| (src[name_start..name_end].to_string(), close + 1))
}

/// Locate `</name>` for an element opened before `from`, checking nesting on the way.
fn find_close(
    src: &str,
    from: usize,
    name: &str,
    base: usize,
    open_at: usize,
) -> ParseResult<(usize, usize)> {
    let bytes = src.as_bytes();
    let mut stack: Vec<String> = Vec::new();
    let mut i = from;

    while i < bytes.len() {
        if i == 0 || bytes[i - 1] == b'\n' {
            if let Some(end) = fence_block_end(src, i) {
                i = end;
                continue;
            }
        }
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => i = skip_code_span(src, i),
            b'{' => i = balanced_end(src, i).unwrap_or(i + 1),
            b'<' => {
                if let Some((close_name, close_end)) = parse_closing_tag(src, i) {
                    match stack.pop() {
                        Some(open) if open == close_name => {}
                        Some(open) => {
                            return Err(syntax(
                                base + i,
                                format!("expected </{open}>, found </{close_name}>"),
                            ))
                        }
                        None if close_name == name => return Ok((i, close_end)),
                        None => {
                            return Err(syntax(
                                base + i,
                                format!("expected </{name}>, found </{close_name}>"),
                            ))
                        }
                    }
                    i = close_end;
                } else if let Some(tag) = parse_open_tag(src, i, base)? {
                    if !tag.self_closing {
                        stack.push(tag.name);
                    }
                    i = tag.end;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    Err(syntax(base + open_at, format!("unclosed <{name}>")))
}

/// Index just past the `}` matching the `{` at `open`. Strings and comments are skipped.
fn balanced_end(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = src[i + 2..].find("*/").map(|offset| i + 2 + offset + 1)?;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = line_end(src, i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Skip a backtick code span starting at `at`; unmatched runs are literal backticks.
fn skip_code_span(src: &str, at: usize) -> usize {
    let bytes = src.as_bytes();
    let run = bytes[at..].iter().take_while(|&&b| b == b'`').count();
    let limit = paragraph_limit(src, at);
    let mut i = at + run;
    while i < limit {
        if bytes[i] == b'`' {
            let close_run = bytes[i..limit].iter().take_while(|&&b| b == b'`').count();
            if close_run == run {
                return i + close_run;
            }
            i += close_run;
        } else {
            i += 1;
        }
    }
    at + run
}

/// Start of the next blank line after `from`, or the end of input.
fn paragraph_limit(src: &str, from: usize) -> usize {
    let mut pos = next_line(src, line_end(src, from));
    while pos < src.len() {
        let end = line_end(src, pos);
        if src[pos..end].trim().is_empty() {
            return pos;
        }
        pos = next_line(src, end);
    }
    src.len()
}

/// End of a fenced code block whose opening fence is the line at `pos`.
fn fence_block_end(src: &str, pos: usize) -> Option<usize> {
    let line = &src[pos..line_end(src, pos)];
    let fence = line.trim_start_matches([' ', '\t']);
    let marker = *fence.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let width = fence.bytes().take_while(|&b| b == marker).count();
    if width < 3 || (marker == b'`' && fence[width..].contains('`')) {
        return None;
    }

    let mut cursor = next_line(src, line_end(src, pos));
    while cursor < src.len() {
        let end = line_end(src, cursor);
        let candidate = src[cursor..end].trim_start_matches([' ', '\t']);
        let run = candidate.bytes().take_while(|&b| b == marker).count();
        if run >= width && candidate[run..].trim().is_empty() {
            return Some(end);
        }
        cursor = next_line(src, end);
    }
    Some(src.len())
}

/// Remove surrounding blank lines and the indentation shared by every non-blank line.
fn dedent(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(first);
    let lines = &lines[first..=last];

    let prefix = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..indentation(line)])
        .reduce(common_prefix)
        .unwrap_or("");

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(prefix).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn skip_whitespace(src: &str, from: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn line_end(src: &str, pos: usize) -> usize {
    src[pos..].find('\n').map(|i| pos + i).unwrap_or(src.len())
}

fn next_line(src: &str, line_end: usize) -> usize {
    (line_end + 1).min(src.len())
}

fn rest_of_line_blank(src: &str, from: usize) -> bool {
    src[from..line_end(src, from)].trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &Node) -> &Element {
        node.as_element().expect("element node")
    }

    #[test]
    fn splits_prose_flow_elements_and_expressions() {
        let src = "# Title\n\nIntro with *emphasis*.\n\n<SideNote type=\"info\" title='Heads up'>\n  Mind the gap.\n</SideNote>\n\n{/* editor note */}\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], Node::markdown("# Title"));
        assert_eq!(nodes[1], Node::markdown("Intro with *emphasis*."));

        let note = element(&nodes[2]);
        assert!(note.flow);
        assert_eq!(note.literal("type").as_deref(), Some("info"));
        assert_eq!(note.literal("title").as_deref(), Some("Heads up"));
        assert_eq!(note.children, vec![Node::markdown("Mind the gap.")]);

        assert_eq!(nodes[3], Node::Expression("/* editor note */".into()));
    }

    #[test]
    fn text_elements_make_paragraphs() {
        let nodes = parse("Get the <Download file=\"slides.pdf\">slides</Download> now.\n").unwrap();
        let Node::Paragraph(parts) = &nodes[0] else {
            panic!("expected paragraph, got {nodes:?}");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Node::markdown("Get the "));
        let download = element(&parts[1]);
        assert!(!download.flow);
        assert_eq!(download.children, vec![Node::markdown("slides")]);
        assert_eq!(parts[2], Node::markdown(" now."));
    }

    #[test]
    fn nested_flow_children_are_dedented() {
        let src = "<Tabs>\n\t<Tab title=\"One\">\n\t\tFirst\n\n\t\t* a\n\t\t* b\n\t</Tab>\n\t<Tab title=\"Two\" />\n</Tabs>";
        let nodes = parse(src).unwrap();
        let tabs = element(&nodes[0]);
        assert_eq!(tabs.children.len(), 2);
        let first = element(&tabs.children[0]);
        assert_eq!(
            first.children,
            vec![Node::markdown("First"), Node::markdown("* a\n* b")]
        );
        assert!(element(&tabs.children[1]).children.is_empty());
    }

    #[test]
    fn attribute_forms() {
        let nodes =
            parse("<Video id=\"x\" startTime={42} autoplay {...rest} link={{ kind: \"a\" }} />").unwrap();
        let video = element(&nodes[0]);
        assert_eq!(video.attr("startTime"), Some(&AttrValue::Expression("42".into())));
        assert_eq!(video.attr("autoplay"), Some(&AttrValue::Boolean));
        assert_eq!(video.attributes[3].name, "");
        assert_eq!(video.attributes[3].value, AttrValue::Expression("...rest".into()));
        assert_eq!(
            video.attr("link"),
            Some(&AttrValue::Expression("{ kind: \"a\" }".into()))
        );
    }

    #[test]
    fn code_and_autolinks_are_opaque() {
        let src = "Use `<table>` sparingly, see <https://example.org>.\n\n```html\n<table>\n\n</td>\n```\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[0],
            Node::markdown("Use `<table>` sparingly, see <https://example.org>.")
        );
        assert_eq!(nodes[1], Node::markdown("```html\n<table>\n\n</td>\n```"));
    }

    #[test]
    fn malformed_markup_is_a_syntax_error() {
        for src in [
            "<Panel title=\"x\">\nnever closed\n",
            "<Tabs>\n<Tab title=\"a\">\nx\n</Tabs>\n</Tab>\n",
            "stray </Panel> closing tag\n",
            "<Figure src=\"a.png\"\n",
        ] {
            let err = parse(src).unwrap_err();
            assert!(
                matches!(err, MigrationError::MarkupSyntax { .. }),
                "{src:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn dedent_keeps_relative_indentation() {
        assert_eq!(dedent("\n\t\tone\n\t\t\ttwo\n\n\t\tthree\n\t"), "one\n\ttwo\n\nthree");
        assert_eq!(dedent("  \n"), "");
    }
}
