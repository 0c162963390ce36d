//! Markdown-level rewrites on prose fragments.
//!
//! The fragment is read with pulldown-cmark to locate list markers, emphasis
//! delimiters, thematic breaks, opaque-id links and image destinations by byte
//! offset. Edits are then applied back to the source text so everything the pass
//! does not touch stays byte-identical.

use std::ops::Range;
use std::sync::OnceLock;

use campus_core::MigrationError;
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;
use uuid::Uuid;

use crate::rewrite::{AssetUse, RewriteContext};

#[derive(Debug, Clone, PartialEq, Eq)]
enum EditKind {
    Fixed(&'static str),
    OpaqueLink { uuid: String, fragment: Option<String> },
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    range: Range<usize>,
    kind: EditKind,
}

/// A link or image whose parsed destination does not appear verbatim in the source,
/// usually because of escapes or entity references.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Unlocated {
    tag: &'static str,
    dest: String,
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

fn reference_definition() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^[ ]{0,3}\[[^\]\n]+\]:[ \t]*<?(/id/[0-9A-Fa-f-]{36}(?:#[^\s>]*)?)>?")
            .expect("reference definition pattern is valid")
    })
}

/// `/id/<uuid>` or `/id/<uuid>#fragment`.
pub(crate) fn opaque_id(dest: &str) -> Option<(String, Option<String>)> {
    let rest = dest.strip_prefix("/id/")?;
    let (id, fragment) = match rest.split_once('#') {
        Some((id, fragment)) => (id, Some(fragment.to_string())),
        None => (rest, None),
    };
    let id = id.trim_end_matches('/');
    Uuid::parse_str(id).ok()?;
    Some((id.to_string(), fragment))
}

pub(crate) async fn rewrite_prose(text: &str, ctx: &dyn RewriteContext) -> anyhow::Result<String> {
    let mut edits = collect_edits(text).map_err(|unlocated| {
        MigrationError::unexpected_markup(
            unlocated.tag,
            ctx.entry(),
            format!("destination `{}` is not written literally", unlocated.dest),
        )
    })?;
    if edits.is_empty() {
        return Ok(text.to_string());
    }
    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));

    let mut out = text.to_string();
    for edit in edits {
        let replacement = match edit.kind {
            EditKind::Fixed(value) => value.to_string(),
            EditKind::OpaqueLink { uuid, fragment } => {
                let path = ctx.resolve_uuid(&uuid)?;
                match fragment {
                    Some(fragment) => format!("{path}#{fragment}"),
                    None => path,
                }
            }
            EditKind::Image(dest) => {
                match ctx.relocate_asset(AssetUse::Image, &dest).await? {
                    Some(url) => url,
                    None => continue,
                }
            }
        };
        out.replace_range(edit.range, &replacement);
    }
    Ok(out)
}

fn collect_edits(text: &str) -> Result<Vec<Edit>, Unlocated> {
    let bytes = text.as_bytes();
    let mut edits = Vec::new();
    let mut lists: Vec<bool> = Vec::new();
    let mut code_blocks: Vec<Range<usize>> = Vec::new();

    for (event, range) in Parser::new_ext(text, parser_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::List(start)) => lists.push(start.is_none()),
            Event::End(TagEnd::List(_)) => {
                lists.pop();
            }
            Event::Start(Tag::Item) if lists.last() == Some(&true) => {
                let marker = range.start + leading_blanks(&text[range.clone()]);
                if matches!(bytes.get(marker), Some(b'-' | b'+')) {
                    edits.push(Edit {
                        range: marker..marker + 1,
                        kind: EditKind::Fixed("*"),
                    });
                }
            }
            Event::Start(Tag::Emphasis) => {
                let span = &text[range.clone()];
                if span.len() >= 2 && span.starts_with('_') && span.ends_with('_') {
                    edits.push(Edit {
                        range: range.start..range.start + 1,
                        kind: EditKind::Fixed("*"),
                    });
                    edits.push(Edit {
                        range: range.end - 1..range.end,
                        kind: EditKind::Fixed("*"),
                    });
                }
            }
            Event::Start(Tag::Strong) => {
                let span = &text[range.clone()];
                if span.len() >= 4 && span.starts_with("__") && span.ends_with("__") {
                    edits.push(Edit {
                        range: range.start..range.start + 2,
                        kind: EditKind::Fixed("**"),
                    });
                    edits.push(Edit {
                        range: range.end - 2..range.end,
                        kind: EditKind::Fixed("**"),
                    });
                }
            }
            Event::Rule => {
                let span = &text[range.clone()];
                let start = range.start + leading_blanks(span);
                let trimmed = span.trim();
                if trimmed != "---" && follows_blank_line(text, range.start) {
                    edits.push(Edit {
                        range: start..start + trimmed.len(),
                        kind: EditKind::Fixed("---"),
                    });
                }
            }
            Event::Start(Tag::Link {
                link_type: LinkType::Inline,
                dest_url,
                ..
            }) => {
                if let Some((uuid, fragment)) = opaque_id(&dest_url) {
                    let dest = locate_destination(text, &range, &dest_url).ok_or_else(|| Unlocated {
                        tag: "link",
                        dest: dest_url.to_string(),
                    })?;
                    edits.push(Edit {
                        range: dest,
                        kind: EditKind::OpaqueLink { uuid, fragment },
                    });
                }
            }
            Event::Start(Tag::Image {
                link_type: LinkType::Inline,
                dest_url,
                ..
            }) => {
                if !dest_url.is_empty() {
                    let dest = locate_destination(text, &range, &dest_url).ok_or_else(|| Unlocated {
                        tag: "image",
                        dest: dest_url.to_string(),
                    })?;
                    edits.push(Edit {
                        range: dest,
                        kind: EditKind::Image(dest_url.to_string()),
                    });
                }
            }
            Event::Start(Tag::CodeBlock(_)) => code_blocks.push(range),
            _ => {}
        }
    }

    for captures in reference_definition().captures_iter(text) {
        let Some(dest) = captures.get(1) else {
            continue;
        };
        if code_blocks.iter().any(|block| block.contains(&dest.start())) {
            continue;
        }
        if let Some((uuid, fragment)) = opaque_id(dest.as_str()) {
            edits.push(Edit {
                range: dest.range(),
                kind: EditKind::OpaqueLink { uuid, fragment },
            });
        }
    }

    Ok(edits)
}

/// Destination text inside `[label](dest "title")`; searched from the end so a label
/// that repeats the URL is left alone.
fn locate_destination(text: &str, range: &Range<usize>, dest: &str) -> Option<Range<usize>> {
    let span = &text[range.clone()];
    let offset = span.rfind(dest)?;
    let start = range.start + offset;
    Some(start..start + dest.len())
}

fn leading_blanks(text: &str) -> usize {
    text.len() - text.trim_start_matches([' ', '\t']).len()
}

fn follows_blank_line(text: &str, offset: usize) -> bool {
    let before = &text[..offset];
    let Some(line_start) = before.rfind('\n') else {
        return before.trim().is_empty();
    };
    if !before[line_start + 1..].trim().is_empty() {
        return false;
    }
    let previous = &before[..line_start];
    match previous.rfind('\n') {
        Some(prev_start) => previous[prev_start + 1..].trim().is_empty(),
        None => previous.trim().is_empty(),
    }
}
