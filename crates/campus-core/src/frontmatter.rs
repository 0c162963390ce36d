//! Frontmatter header handling for legacy and migrated documents.

use serde::Serialize;

const FENCE: &str = "---";

/// Split `---\n<yaml>\n---\n<body>` into header and body. Documents without a header are all body.
pub fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(first_line_end) = text.find('\n') else {
        return (None, text);
    };
    if text[..first_line_end].trim_end() != FENCE {
        return (None, text);
    }

    let header_start = first_line_end + 1;
    let mut cursor = header_start;
    while cursor <= text.len() {
        let line_end = text[cursor..]
            .find('\n')
            .map(|i| cursor + i)
            .unwrap_or(text.len());
        let line = text[cursor..line_end].trim_end();
        if line == FENCE || line == "..." {
            let body_start = (line_end + 1).min(text.len());
            return (Some(&text[header_start..cursor]), &text[body_start..]);
        }
        if line_end == text.len() {
            break;
        }
        cursor = line_end + 1;
    }
    (None, text)
}

/// Render a migrated document: YAML header, closing fence, body.
pub fn render_document<T: Serialize>(frontmatter: &T, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("{FENCE}\n{yaml}{FENCE}\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn splits_header_and_body() {
        let (header, body) = split_frontmatter("---\ntitle: Hello\n---\n\n# Body\n");
        assert_eq!(header, Some("title: Hello\n"));
        assert_eq!(body, "\n# Body\n");
    }

    #[test]
    fn tolerates_crlf_and_missing_header() {
        let (header, body) = split_frontmatter("---\r\na: 1\r\n---\r\ntext");
        assert_eq!(header, Some("a: 1\r\n"));
        assert_eq!(body, "text");

        let (header, body) = split_frontmatter("# Just markdown\n");
        assert!(header.is_none());
        assert_eq!(body, "# Just markdown\n");
    }

    #[test]
    fn unterminated_header_is_body() {
        let (header, body) = split_frontmatter("---\ntitle: x\n");
        assert!(header.is_none());
        assert_eq!(body, "---\ntitle: x\n");
    }

    #[test]
    fn renders_header_then_body() {
        let mut fm = BTreeMap::new();
        fm.insert("name", "Jane Smith");
        let doc = render_document(&fm, "Bio.\n").unwrap();
        assert_eq!(doc, "---\nname: Jane Smith\n---\nBio.\n");
    }
}
