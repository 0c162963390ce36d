//! Document tree for MDX bodies, scoped to what the legacy corpus uses.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Raw markdown. A whole block at block level, a text fragment inside inline content.
    Markdown(String),
    /// A prose block that interleaves markdown with text-level elements.
    Paragraph(Vec<Node>),
    /// `{...}` on its own line. Holds the text between the outer braces.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Flow elements own their lines and hold block children; text elements sit inside prose.
    pub flow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Empty for a spread attribute (`{...props}`).
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Literal(String),
    /// Text between the outer braces of `name={...}`.
    Expression(String),
    /// Bare attribute name, `<Option isCorrect>`.
    Boolean,
}

impl Node {
    pub fn markdown(text: impl Into<String>) -> Self {
        Node::Markdown(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element_named(&self, name: &str) -> bool {
        self.as_element().is_some_and(|el| el.name == name)
    }

    /// Prose that renders nothing; the parser never emits it, rules sometimes do.
    pub fn is_blank(&self) -> bool {
        match self {
            Node::Markdown(text) => text.trim().is_empty(),
            Node::Paragraph(parts) => parts.iter().all(Node::is_blank),
            _ => false,
        }
    }
}

impl Element {
    pub fn new(name: impl Into<String>, flow: bool) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            flow,
        }
    }

    pub fn flow(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_literal(self, name: &str, value: impl Into<String>) -> Self {
        self.with_attr(name, AttrValue::Literal(value.into()))
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    /// Literal value, or a plain string/number expression such as `{"x"}` or `{42}`.
    pub fn literal(&self, name: &str) -> Option<String> {
        match self.attr(name)? {
            AttrValue::Literal(value) => Some(value.clone()),
            AttrValue::Expression(expr) => expression_scalar(expr),
            AttrValue::Boolean => None,
        }
    }

    /// `name`, `name="true"` and `name={true}` are all set; anything else is not.
    pub fn flag(&self, name: &str) -> bool {
        match self.attr(name) {
            Some(AttrValue::Boolean) => true,
            Some(AttrValue::Literal(value)) => value.trim() == "true",
            Some(AttrValue::Expression(expr)) => expr.trim() == "true",
            None => false,
        }
    }

    /// Replace in place, or append when absent.
    pub fn set_attr(&mut self, name: &str, value: AttrValue) {
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<AttrValue> {
        let index = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }
}

/// `"text"`, `'text'` or a bare number inside an expression attribute.
pub(crate) fn expression_scalar(expr: &str) -> Option<String> {
    let expr = expr.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = expr
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            if !inner.contains(quote) {
                return Some(inner.to_string());
            }
        }
    }
    if !expr.is_empty() && expr.parse::<f64>().is_ok() {
        return Some(expr.to_string());
    }
    None
}

/// String literals of an array expression such as `["a", 'b']`.
pub(crate) fn expression_string_list(expr: &str) -> Option<Vec<String>> {
    let inner = expr.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        let quote = rest.chars().next()?;
        if !matches!(quote, '"' | '\'' | '`') {
            return None;
        }
        let close = rest[1..].find(quote)? + 1;
        items.push(rest[1..close].to_string());
        rest = rest[close + 1..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_reads_plain_expressions() {
        let el = Element::flow("Video")
            .with_literal("id", "abc")
            .with_attr("startTime", AttrValue::Expression("42".into()))
            .with_attr("title", AttrValue::Expression("\"Intro\"".into()))
            .with_attr("data", AttrValue::Expression("{ a: 1 }".into()));
        assert_eq!(el.literal("id").as_deref(), Some("abc"));
        assert_eq!(el.literal("startTime").as_deref(), Some("42"));
        assert_eq!(el.literal("title").as_deref(), Some("Intro"));
        assert_eq!(el.literal("data"), None);
    }

    #[test]
    fn flags_accept_the_common_spellings() {
        let el = Element::flow("Option")
            .with_attr("a", AttrValue::Boolean)
            .with_literal("b", "true")
            .with_attr("c", AttrValue::Expression("true".into()))
            .with_attr("d", AttrValue::Expression("false".into()));
        assert!(el.flag("a") && el.flag("b") && el.flag("c"));
        assert!(!el.flag("d") && !el.flag("missing"));
    }

    #[test]
    fn string_lists_parse_array_literals() {
        assert_eq!(
            expression_string_list(r#"["TEI", 'tei' , "Text Encoding"]"#),
            Some(vec!["TEI".to_string(), "tei".to_string(), "Text Encoding".to_string()])
        );
        assert_eq!(expression_string_list("[]"), Some(vec![]));
        assert_eq!(expression_string_list("answers"), None);
    }
}
