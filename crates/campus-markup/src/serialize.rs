use crate::ast::{AttrValue, Attribute, Element, Node};

/// Render a document: blocks separated by one blank line, a single trailing newline.
pub fn serialize(nodes: &[Node]) -> String {
    let body = write_blocks(nodes);
    if body.is_empty() {
        body
    } else {
        format!("{body}\n")
    }
}

fn write_blocks(nodes: &[Node]) -> String {
    nodes
        .iter()
        .filter(|node| !node.is_blank())
        .map(write_block)
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn write_block(node: &Node) -> String {
    match node {
        Node::Markdown(text) => text.trim_start_matches('\n').trim_end().to_string(),
        Node::Paragraph(parts) => write_inline(parts).trim_end().to_string(),
        Node::Expression(inner) => format!("{{{inner}}}"),
        Node::Element(el) => write_flow_element(el),
    }
}

fn write_flow_element(el: &Element) -> String {
    let open = open_tag(el);
    let children = if el.flow {
        write_blocks(&el.children)
    } else {
        write_inline(&el.children).trim().to_string()
    };
    if children.is_empty() {
        return format!("{open} />");
    }
    format!("{open}>\n{}\n</{}>", indent(&children), el.name)
}

fn write_inline(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Markdown(text) => out.push_str(text),
            Node::Paragraph(parts) => out.push_str(&write_inline(parts)),
            Node::Expression(inner) => {
                out.push('{');
                out.push_str(inner);
                out.push('}');
            }
            Node::Element(el) => out.push_str(&write_inline_element(el)),
        }
    }
    out
}

fn write_inline_element(el: &Element) -> String {
    let open = open_tag(el);
    let children = if el.flow {
        write_blocks(&el.children)
    } else {
        write_inline(&el.children)
    };
    if children.is_empty() {
        format!("{open} />")
    } else {
        format!("{open}>{children}</{}>", el.name)
    }
}

fn open_tag(el: &Element) -> String {
    let mut tag = format!("<{}", el.name);
    for attr in &el.attributes {
        tag.push(' ');
        tag.push_str(&write_attribute(attr));
    }
    tag
}

fn write_attribute(attr: &Attribute) -> String {
    let name = &attr.name;
    match &attr.value {
        AttrValue::Expression(inner) if name.is_empty() => format!("{{{inner}}}"),
        AttrValue::Expression(inner) => format!("{name}={{{inner}}}"),
        AttrValue::Boolean => name.clone(),
        AttrValue::Literal(value) if !value.contains('"') => format!("{name}=\"{value}\""),
        AttrValue::Literal(value) if !value.contains('\'') => format!("{name}='{value}'"),
        AttrValue::Literal(value) => format!("{name}={{{}}}", js_string(value)),
    }
}

/// Double-quoted JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("\t{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn flow_elements_indent_children_with_tabs() {
        let callout = Element::flow("Callout")
            .with_literal("kind", "note")
            .with_children(vec![
                Node::markdown("First line"),
                Node::Element(Element::flow("LinkButton").with_literal("link", "/a")),
            ]);
        let text = serialize(&[Node::markdown("# Heading"), Node::Element(callout)]);
        assert_eq!(
            text,
            "# Heading\n\n<Callout kind=\"note\">\n\tFirst line\n\n\t<LinkButton link=\"/a\" />\n</Callout>\n"
        );
    }

    #[test]
    fn attribute_quoting_follows_content() {
        let el = Element::flow("Disclosure")
            .with_literal("a", "plain")
            .with_literal("b", "say \"hi\"")
            .with_literal("c", "it's \"odd\"")
            .with_attr("d", AttrValue::Boolean);
        assert_eq!(
            serialize(&[Node::Element(el)]),
            "<Disclosure a=\"plain\" b='say \"hi\"' c={\"it's \\\"odd\\\"\"} d />\n"
        );
    }

    #[test]
    fn serialized_output_reparses_to_the_same_text() {
        let src = "Intro <Link link={{ kind: \"download\", target: \"/a.pdf\" }}>file</Link> here.\n\n<Grid layout=\"two-columns\">\n\t<GridItem>\n\t\t```rust\n\t\tfn main() {}\n\n\t\t```\n\t</GridItem>\n</Grid>\n";
        let once = serialize(&parse(src).unwrap());
        assert_eq!(once, src);
        assert_eq!(serialize(&parse(&once).unwrap()), once);
    }

    #[test]
    fn empty_documents_stay_empty() {
        assert_eq!(serialize(&[]), "");
        assert_eq!(serialize(&[Node::markdown("  ")]), "");
    }
}
