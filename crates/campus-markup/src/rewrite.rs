use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use async_trait::async_trait;
use campus_core::MigrationError;
use tracing::warn;

use crate::ast::{AttrValue, Element, Node};
use crate::parse::parse;
use crate::prose::rewrite_prose;
use crate::quiz::flatten_quiz;
use crate::serialize::{js_string, serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetUse {
    Image,
    Download,
}

/// What the body rewrite needs from the surrounding migration.
#[async_trait]
pub trait RewriteContext: Send + Sync {
    /// Legacy entry label used in errors, e.g. `posts/intro-to-tei`.
    fn entry(&self) -> &str;

    /// Relocate an asset referenced from the body and return its public URL.
    /// `None` leaves the reference as written.
    async fn relocate_asset(&self, usage: AssetUse, reference: &str) -> anyhow::Result<Option<String>>;

    /// Public path of the resource behind a legacy opaque id.
    fn resolve_uuid(&self, uuid: &str) -> Result<String, MigrationError>;
}

/// Outcome of a rewrite rule for one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Replace(Node),
    /// Substitute zero or more nodes; an empty list deletes the element.
    Splice(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    PassThrough,
    Download,
    ExternalResource,
    Figure,
    Flex,
    Grid,
    Panel,
    SideNote,
    Video,
    YouTube,
    VideoCard,
    Quiz,
    InlineCode,
    RawHtml,
}

const DISPATCH: &[(&str, Rule)] = &[
    // legacy vocabulary
    ("Download", Rule::Download),
    ("Embed", Rule::PassThrough),
    ("ExternalResource", Rule::ExternalResource),
    ("Figure", Rule::Figure),
    ("Flex", Rule::Flex),
    ("Grid", Rule::Grid),
    ("Panel", Rule::Panel),
    ("Quiz", Rule::Quiz),
    ("SideNote", Rule::SideNote),
    ("Tab", Rule::PassThrough),
    ("Tabs", Rule::PassThrough),
    ("Video", Rule::Video),
    ("VideoCard", Rule::VideoCard),
    ("YouTube", Rule::YouTube),
    ("code", Rule::InlineCode),
    // target vocabulary
    ("Callout", Rule::PassThrough),
    ("Disclosure", Rule::PassThrough),
    ("Footnote", Rule::PassThrough),
    ("GridItem", Rule::PassThrough),
    ("HeadingId", Rule::PassThrough),
    ("Link", Rule::PassThrough),
    ("LinkButton", Rule::PassThrough),
    ("QuizChoice", Rule::PassThrough),
    ("QuizChoiceAnswer", Rule::PassThrough),
    ("QuizChoiceQuestion", Rule::PassThrough),
    ("QuizErrorMessage", Rule::PassThrough),
    ("QuizSuccessMessage", Rule::PassThrough),
    ("QuizTextInput", Rule::PassThrough),
    ("QuizTextInputAnswer", Rule::PassThrough),
    ("QuizTextInputQuestion", Rule::PassThrough),
    ("TableOfContents", Rule::PassThrough),
    // raw html
    ("a", Rule::RawHtml),
    ("abbr", Rule::RawHtml),
    ("br", Rule::RawHtml),
    ("details", Rule::RawHtml),
    ("div", Rule::RawHtml),
    ("em", Rule::RawHtml),
    ("figcaption", Rule::RawHtml),
    ("figure", Rule::RawHtml),
    ("iframe", Rule::RawHtml),
    ("img", Rule::RawHtml),
    ("kbd", Rule::RawHtml),
    ("li", Rule::RawHtml),
    ("ol", Rule::RawHtml),
    ("p", Rule::RawHtml),
    ("span", Rule::RawHtml),
    ("strong", Rule::RawHtml),
    ("sub", Rule::RawHtml),
    ("summary", Rule::RawHtml),
    ("sup", Rule::RawHtml),
    ("table", Rule::RawHtml),
    ("tbody", Rule::RawHtml),
    ("td", Rule::RawHtml),
    ("th", Rule::RawHtml),
    ("thead", Rule::RawHtml),
    ("tr", Rule::RawHtml),
    ("ul", Rule::RawHtml),
];

const CALLOUT_KINDS: &[(&str, &str)] = &[
    ("note", "note"),
    ("tip", "tip"),
    ("info", "important"),
    ("important", "important"),
    ("warning", "warning"),
    ("danger", "caution"),
    ("caution", "caution"),
];

fn rule_for(name: &str) -> Option<Rule> {
    DISPATCH
        .iter()
        .find(|(tag, _)| *tag == name)
        .map(|(_, rule)| *rule)
}

/// Rewrite one legacy MDX body into the target vocabulary.
pub async fn rewrite(body: &str, ctx: &dyn RewriteContext) -> anyhow::Result<String> {
    let cleaned = clean_legacy_text(body);
    let nodes = parse(&cleaned).with_context(|| format!("parsing body of {}", ctx.entry()))?;
    let nodes = walk_blocks(nodes, ctx).await?;
    Ok(serialize(&nodes))
}

fn clean_legacy_text(body: &str) -> String {
    body.replace("\r\n", "\n")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{a0}', " ")
}

type WalkFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

fn walk_blocks<'a>(nodes: Vec<Node>, ctx: &'a dyn RewriteContext) -> WalkFuture<'a, Vec<Node>> {
    Box::pin(async move {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Element(el) => {
                    for emitted in visit_element(el, ctx).await? {
                        out.push(descend_block(emitted, ctx).await?);
                    }
                }
                other => out.push(descend_block(other, ctx).await?),
            }
        }
        Ok(out)
    })
}

/// Walk a node produced by the parser or by a rule, without dispatching it again.
fn descend_block<'a>(node: Node, ctx: &'a dyn RewriteContext) -> WalkFuture<'a, Node> {
    Box::pin(async move {
        Ok(match node {
            Node::Markdown(text) => Node::Markdown(rewrite_prose(&text, ctx).await?),
            Node::Paragraph(parts) => Node::Paragraph(walk_inline(parts, ctx).await?),
            Node::Element(el) => Node::Element(descend_element(el, ctx).await?),
            Node::Expression(expr) => Node::Expression(expr),
        })
    })
}

fn descend_element<'a>(mut el: Element, ctx: &'a dyn RewriteContext) -> WalkFuture<'a, Element> {
    Box::pin(async move {
        let children = std::mem::take(&mut el.children);
        el.children = if el.flow {
            walk_blocks(children, ctx).await?
        } else {
            walk_inline(children, ctx).await?
        };
        Ok(el)
    })
}

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

/// Inline content: elements are rewritten first, then the prose around them gets a
/// single markdown pass with each element held by a placeholder.
fn walk_inline<'a>(parts: Vec<Node>, ctx: &'a dyn RewriteContext) -> WalkFuture<'a, Vec<Node>> {
    Box::pin(async move {
        let mut text = String::new();
        let mut elements = Vec::new();
        let mut pending = parts;
        pending.reverse();

        while let Some(node) = pending.pop() {
            match node {
                Node::Markdown(fragment) => text.push_str(&fragment),
                Node::Expression(expr) => {
                    text.push('{');
                    text.push_str(&expr);
                    text.push('}');
                }
                Node::Paragraph(inner) => pending.extend(inner.into_iter().rev()),
                Node::Element(el) => {
                    for emitted in visit_element(el, ctx).await? {
                        match emitted {
                            Node::Element(el) => {
                                let el = descend_element(el, ctx).await?;
                                text.push(PLACEHOLDER_OPEN);
                                text.push_str(&elements.len().to_string());
                                text.push(PLACEHOLDER_CLOSE);
                                elements.push(Some(el));
                            }
                            Node::Markdown(fragment) => text.push_str(&fragment),
                            Node::Paragraph(inner) => pending.extend(inner.into_iter().rev()),
                            Node::Expression(expr) => {
                                text.push('{');
                                text.push_str(&expr);
                                text.push('}');
                            }
                        }
                    }
                }
            }
        }

        let text = rewrite_prose(&text, ctx).await?;
        Ok(restore_placeholders(&text, elements))
    })
}

fn restore_placeholders(text: &str, mut elements: Vec<Option<Element>>) -> Vec<Node> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(PLACEHOLDER_OPEN) {
        let after = &rest[open + PLACEHOLDER_OPEN.len_utf8()..];
        let Some(close) = after.find(PLACEHOLDER_CLOSE) else {
            break;
        };
        let element = after[..close]
            .parse::<usize>()
            .ok()
            .and_then(|index| elements.get_mut(index))
            .and_then(Option::take);
        let Some(element) = element else {
            break;
        };
        if open > 0 {
            parts.push(Node::Markdown(rest[..open].to_string()));
        }
        parts.push(Node::Element(element));
        rest = &after[close + PLACEHOLDER_CLOSE.len_utf8()..];
    }
    if !rest.is_empty() {
        parts.push(Node::Markdown(rest.to_string()));
    }
    parts
}

async fn visit_element(el: Element, ctx: &dyn RewriteContext) -> anyhow::Result<Vec<Node>> {
    Ok(match apply_rule(&el, ctx).await? {
        Visit::Keep => vec![Node::Element(el)],
        Visit::Replace(node) => vec![node],
        Visit::Splice(nodes) => nodes,
    })
}

async fn apply_rule(el: &Element, ctx: &dyn RewriteContext) -> anyhow::Result<Visit> {
    let Some(rule) = rule_for(&el.name) else {
        return Err(unexpected(el, ctx, "no rewrite rule for this element").into());
    };

    match rule {
        Rule::PassThrough => Ok(Visit::Keep),
        Rule::Download => download(el, ctx).await,
        Rule::ExternalResource => external_resource(el, ctx),
        Rule::Figure => figure(el, ctx).await,
        Rule::Flex => Ok(flex(el)),
        Rule::Grid => Ok(grid(el)),
        Rule::Panel => Ok(panel(el)),
        Rule::SideNote => side_note(el).map_err(Into::into),
        Rule::Video => video(el, ctx),
        Rule::YouTube => youtube(el, ctx),
        Rule::VideoCard => video_card(el, ctx).await,
        Rule::Quiz => flatten_quiz(el, ctx.entry()).map_err(Into::into),
        Rule::InlineCode => Ok(inline_code(el)),
        Rule::RawHtml => Err(unexpected(el, ctx, "raw HTML element").into()),
    }
}

fn unexpected(el: &Element, ctx: &dyn RewriteContext, reason: &str) -> MigrationError {
    MigrationError::unexpected_markup(&el.name, ctx.entry(), reason)
}

fn caption_children(el: &mut Element) -> Vec<Node> {
    let caption = el.literal("caption");
    el.remove_attr("caption");
    match caption {
        Some(caption) if el.children.is_empty() && !caption.trim().is_empty() => {
            vec![Node::Markdown(caption)]
        }
        _ => std::mem::take(&mut el.children),
    }
}

async fn download(el: &Element, ctx: &dyn RewriteContext) -> anyhow::Result<Visit> {
    let target = el
        .literal("file")
        .or_else(|| el.literal("href"))
        .ok_or_else(|| unexpected(el, ctx, "download without a `file` attribute"))?;
    let url = ctx
        .relocate_asset(AssetUse::Download, &target)
        .await?
        .unwrap_or(target);

    let mut children = el.children.clone();
    if children.is_empty() {
        if let Some(title) = el.literal("title") {
            children.push(Node::Markdown(title));
        }
    }

    let link = Element::new("Link", el.flow)
        .with_attr(
            "link",
            AttrValue::Expression(format!("{{ kind: \"download\", target: {} }}", js_string(&url))),
        )
        .with_children(children);
    Ok(Visit::Replace(Node::Element(link)))
}

fn external_resource(el: &Element, ctx: &dyn RewriteContext) -> anyhow::Result<Visit> {
    let url = el
        .literal("url")
        .ok_or_else(|| unexpected(el, ctx, "external resource without a `url`"))?;
    let parsed = url::Url::parse(&url)
        .map_err(|err| MigrationError::invalid_field("ExternalResource url", format!("{url}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MigrationError::invalid_field(
            "ExternalResource url",
            format!("{url}: expected an http(s) URL"),
        )
        .into());
    }
    Ok(Visit::Keep)
}

async fn figure(el: &Element, ctx: &dyn RewriteContext) -> anyhow::Result<Visit> {
    let src = el
        .literal("src")
        .ok_or_else(|| unexpected(el, ctx, "figure without a `src`"))?;
    let mut figure = el.clone();
    if let Some(url) = ctx.relocate_asset(AssetUse::Image, &src).await? {
        figure.set_attr("src", AttrValue::Literal(url));
    }
    if figure.attr("caption").is_some() && !figure.children.is_empty() {
        warn!(entry = ctx.entry(), "figure has both a caption attribute and children; keeping children");
    }
    figure.children = caption_children(&mut figure);
    Ok(Visit::Replace(Node::Element(figure)))
}

fn wrap_grid_items(children: &[Node]) -> Vec<Node> {
    children
        .iter()
        .filter(|child| !child.is_blank())
        .map(|child| {
            if child.is_element_named("GridItem") {
                child.clone()
            } else {
                Node::Element(Element::flow("GridItem").with_children(vec![child.clone()]))
            }
        })
        .collect()
}

fn flex(el: &Element) -> Visit {
    let mut grid = Element::new("Grid", el.flow).with_literal("layout", "two-columns");
    if let Some(alignment) = el.attr("alignment") {
        grid.set_attr("alignment", alignment.clone());
    }
    Visit::Replace(Node::Element(grid.with_children(wrap_grid_items(&el.children))))
}

fn grid(el: &Element) -> Visit {
    let wrapped = el
        .children
        .iter()
        .all(|child| child.is_element_named("GridItem"));
    if wrapped && el.attr("layout").is_some() {
        return Visit::Keep;
    }
    let mut grid = el.clone();
    if grid.attr("layout").is_none() {
        grid.set_attr("layout", AttrValue::Literal("two-columns".into()));
    }
    grid.children = wrap_grid_items(&el.children);
    Visit::Replace(Node::Element(grid))
}

fn panel(el: &Element) -> Visit {
    let mut disclosure = Element::new("Disclosure", el.flow).with_children(el.children.clone());
    if let Some(title) = el.attr("title") {
        disclosure.set_attr("title", title.clone());
    }
    Visit::Replace(Node::Element(disclosure))
}

fn side_note(el: &Element) -> Result<Visit, MigrationError> {
    let legacy = el.literal("type").unwrap_or_else(|| "note".to_string());
    let kind = CALLOUT_KINDS
        .iter()
        .find(|(from, _)| *from == legacy)
        .map(|(_, to)| *to)
        .ok_or_else(|| {
            let allowed: Vec<&str> = CALLOUT_KINDS.iter().map(|(from, _)| *from).collect();
            MigrationError::invalid_enum("SideNote type", &legacy, &allowed)
        })?;

    let mut callout = Element::new("Callout", el.flow).with_literal("kind", kind);
    if let Some(title) = el.attr("title") {
        callout.set_attr("title", title.clone());
    }
    Ok(Visit::Replace(Node::Element(
        callout.with_children(el.children.clone()),
    )))
}

fn video(el: &Element, ctx: &dyn RewriteContext) -> anyhow::Result<Visit> {
    if el.literal("id").is_none() {
        return Err(unexpected(el, ctx, "video without an `id`").into());
    }
    let mut video = el.clone();
    if video.attr("provider").is_none() {
        video.set_attr("provider", AttrValue::Literal("youtube".into()));
    }
    video.children = caption_children(&mut video);
    Ok(Visit::Replace(Node::Element(video)))
}

fn youtube(el: &Element, ctx: &dyn RewriteContext) -> anyhow::Result<Visit> {
    let id = el
        .literal("id")
        .ok_or_else(|| unexpected(el, ctx, "YouTube embed without an `id`"))?;
    let mut video = Element::new("Video", el.flow)
        .with_literal("provider", "youtube")
        .with_literal("id", id);
    if let Some(start) = el.attr("startTime") {
        video.set_attr("startTime", start.clone());
    }

    // The shortcut unwraps: a caption attribute becomes the video caption and any
    // legacy children follow the video as siblings.
    let caption = el.literal("caption").filter(|c| !c.trim().is_empty());
    let trailing = match caption {
        Some(caption) => {
            video.children = vec![Node::Markdown(caption)];
            el.children.clone()
        }
        None => {
            video.children = el.children.clone();
            Vec::new()
        }
    };

    let mut nodes = vec![Node::Element(video)];
    nodes.extend(trailing);
    Ok(Visit::Splice(nodes))
}

async fn video_card(el: &Element, ctx: &dyn RewriteContext) -> anyhow::Result<Visit> {
    if el.literal("id").is_none() {
        return Err(unexpected(el, ctx, "video card without an `id`").into());
    }
    let mut card = el.clone();
    if card.attr("provider").is_none() {
        card.set_attr("provider", AttrValue::Literal("youtube".into()));
    }
    if let Some(image) = card.literal("image") {
        if let Some(url) = ctx.relocate_asset(AssetUse::Image, &image).await? {
            card.set_attr("image", AttrValue::Literal(url));
        }
    }
    Ok(Visit::Replace(Node::Element(card)))
}

/// `<code>x</code>` becomes a markdown code span.
fn inline_code(el: &Element) -> Visit {
    let text: String = el
        .children
        .iter()
        .map(|child| match child {
            Node::Markdown(text) => text.clone(),
            other => serialize(std::slice::from_ref(other))
                .trim_end()
                .to_string(),
        })
        .collect();

    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    let pad = if text.starts_with('`') || text.ends_with('`') { " " } else { "" };
    Visit::Replace(Node::Markdown(format!("{fence}{pad}{text}{pad}{fence}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticContext {
        uuids: HashMap<String, String>,
        relocated: Mutex<Vec<(AssetUse, String)>>,
    }

    impl StaticContext {
        fn new() -> Self {
            let mut uuids = HashMap::new();
            uuids.insert(
                "7c0e6a0e-1a4e-4a8e-9b8a-0d7c4b3f5e21".to_string(),
                "/resources/hosted/intro-to-tei".to_string(),
            );
            Self {
                uuids,
                relocated: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RewriteContext for StaticContext {
        fn entry(&self) -> &str {
            "posts/sample"
        }

        async fn relocate_asset(&self, usage: AssetUse, reference: &str) -> anyhow::Result<Option<String>> {
            self.relocated
                .lock()
                .unwrap()
                .push((usage, reference.to_string()));
            if reference.starts_with("http") {
                return Ok(None);
            }
            let name = reference.rsplit('/').next().unwrap_or(reference);
            Ok(Some(format!("/assets/content/sample/{name}")))
        }

        fn resolve_uuid(&self, uuid: &str) -> Result<String, MigrationError> {
            self.uuids
                .get(uuid)
                .cloned()
                .ok_or_else(|| MigrationError::missing("uuid", uuid))
        }
    }

    async fn run(src: &str) -> anyhow::Result<String> {
        rewrite(src, &StaticContext::new()).await
    }

    #[tokio::test]
    async fn legacy_components_map_to_the_new_vocabulary() {
        let src = "<SideNote type=\"danger\" title=\"Careful\">\n  Back up first.\n</SideNote>\n\n<Panel title=\"More\">\n  Details _here_.\n</Panel>\n\n<YouTube id=\"abc123\" startTime={30} />\n";
        assert_eq!(
            run(src).await.unwrap(),
            "<Callout kind=\"caution\" title=\"Careful\">\n\tBack up first.\n</Callout>\n\n<Disclosure title=\"More\">\n\tDetails *here*.\n</Disclosure>\n\n<Video provider=\"youtube\" id=\"abc123\" startTime={30} />\n"
        );
    }

    #[tokio::test]
    async fn youtube_shortcuts_unwrap_around_the_video() {
        let src = "<YouTube id=\"abc123\" caption=\"Intro\">\n  Watch the first minute.\n</YouTube>\n";
        let out = run(src).await.unwrap();
        let video = "<Video provider=\"youtube\" id=\"abc123\">\n\tIntro\n</Video>";
        let video_at = out.find(video).unwrap_or_else(|| panic!("no video in\n{out}"));
        let text_at = out.find("Watch the first minute.").unwrap();
        assert!(text_at > video_at + video.len(), "{out}");
        assert!(!out.contains("YouTube") && !out.contains("caption="));
    }

    #[tokio::test]
    async fn downloads_become_links_with_relocated_targets() {
        let ctx = StaticContext::new();
        let out = rewrite(
            "Grab the <Download file=\"./files/slides.pdf\">slides</Download> before class.\n",
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            "Grab the <Link link={{ kind: \"download\", target: \"/assets/content/sample/slides.pdf\" }}>slides</Link> before class.\n"
        );
        assert_eq!(
            ctx.relocated.lock().unwrap().as_slice(),
            &[(AssetUse::Download, "./files/slides.pdf".to_string())]
        );
    }

    #[tokio::test]
    async fn flex_becomes_a_grid_of_items() {
        let src = "<Flex>\n  <Figure src=\"a.png\" alt=\"A\" caption=\"First\" />\n\n  Some text.\n</Flex>\n";
        assert_eq!(
            run(src).await.unwrap(),
            "<Grid layout=\"two-columns\">\n\t<GridItem>\n\t\t<Figure src=\"/assets/content/sample/a.png\" alt=\"A\">\n\t\t\tFirst\n\t\t</Figure>\n\t</GridItem>\n\n\t<GridItem>\n\t\tSome text.\n\t</GridItem>\n</Grid>\n"
        );
    }

    #[tokio::test]
    async fn opaque_links_resolve_with_fragments() {
        let out = run("Read [the intro](/id/7c0e6a0e-1a4e-4a8e-9b8a-0d7c4b3f5e21#setup) first.\n")
            .await
            .unwrap();
        assert_eq!(out, "Read [the intro](/resources/hosted/intro-to-tei#setup) first.\n");

        let err = run("[gone](/id/00000000-0000-4000-8000-000000000000)\n")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::MissingMapping { .. })
        ));

        let err = run("[escaped](/id/7c0e6a0e-1a4e-4a8e-9b8a-0d7c4b3f5e21\\#setup)\n")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::UnexpectedMarkup { tag, entry, .. })
                if tag == "link" && entry == "posts/sample"
        ));
    }

    #[tokio::test]
    async fn links_inside_components_are_resolved() {
        let src = "<Callout kind=\"note\">\n\tSee [this](/id/7c0e6a0e-1a4e-4a8e-9b8a-0d7c4b3f5e21) and <code>x_y</code>.\n</Callout>\n";
        assert_eq!(
            run(src).await.unwrap(),
            "<Callout kind=\"note\">\n\tSee [this](/resources/hosted/intro-to-tei) and `x_y`.\n</Callout>\n"
        );
    }

    #[tokio::test]
    async fn raw_html_and_unknown_components_fail() {
        let err = run("<table>\n<tr><td>1</td></tr>\n</table>\n").await.unwrap_err();
        match err.downcast_ref::<MigrationError>() {
            Some(MigrationError::UnexpectedMarkup { tag, entry, .. }) => {
                assert_eq!(tag, "table");
                assert_eq!(entry, "posts/sample");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = run("<Carousel />\n").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::UnexpectedMarkup { tag, .. }) if tag == "Carousel"
        ));
    }

    #[tokio::test]
    async fn unknown_side_note_types_are_rejected() {
        let err = run("<SideNote type=\"fancy\">\n  x\n</SideNote>\n").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::InvalidEnumValue { value, .. }) if value == "fancy"
        ));
    }

    #[tokio::test]
    async fn unclosed_components_are_syntax_errors() {
        let err = run("<Panel title=\"x\">\n  never closed\n").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::MarkupSyntax { .. })
        ));
        assert!(format!("{err:#}").contains("posts/sample"));
    }

    #[tokio::test]
    async fn rewriting_output_again_changes_nothing() {
        let src = "# Intro\n\nA ‘quoted’ _word_ and\u{a0}more.\n\n- one\n- two\n\n***\n\n<Quiz>\n  <Quiz.Card>\n    <Quiz.MultipleChoice>\n      <Quiz.Question>Pick one</Quiz.Question>\n      <Quiz.MultipleChoice.Option isCorrect>A</Quiz.MultipleChoice.Option>\n      <Quiz.MultipleChoice.Option>B</Quiz.MultipleChoice.Option>\n      <Quiz.Message type=\"success\">Yes</Quiz.Message>\n    </Quiz.MultipleChoice>\n  </Quiz.Card>\n</Quiz>\n\n<Tabs>\n  <Tab title=\"One\">\n    ![chart](./chart.png)\n  </Tab>\n</Tabs>\n";
        let once = run(src).await.unwrap();
        assert!(once.starts_with("# Intro\n\nA 'quoted' *word* and more.\n\n* one\n* two\n\n---\n\n<Quiz>\n\t<QuizChoice variant=\"single\">\n\t\t<QuizChoiceQuestion>\n\t\t\tPick one\n"));
        assert!(once.contains("![chart](/assets/content/sample/chart.png)"));

        let twice = run(&once).await.unwrap();
        assert_eq!(twice, once);
    }
}
