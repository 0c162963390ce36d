//! Legacy record shapes (as authored in `content-source/`) and the target frontmatter shapes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ResourceKind;

pub const TARGET_LICENSE: &str = "cc-by-4.0";
pub const DEFAULT_AVATAR: &str = "/assets/images/default-avatar.svg";
pub const DEFAULT_SOURCE_IMAGE: &str = "/assets/images/default-source.svg";

/// Legacy YAML scalars that are sometimes numbers (`version: 1`) or booleans.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPerson {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacyTag {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacySource {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacyRemote {
    #[serde(default, deserialize_with = "scalar_string")]
    pub date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}

impl LegacyRemote {
    /// All three of date, publisher and url carry a non-blank value.
    pub fn is_complete(&self) -> bool {
        [&self.date, &self.publisher, &self.url]
            .iter()
            .all(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyResource {
    pub title: String,
    #[serde(default)]
    pub short_title: Option<String>,
    pub lang: String,
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub contributors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(rename = "abstract", default)]
    pub summary: String,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub remote: Option<LegacyRemote>,
    pub licence: String,
    #[serde(default)]
    pub toc: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEvent {
    pub title: String,
    #[serde(default)]
    pub short_title: Option<String>,
    pub lang: String,
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub contributors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub partners: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(rename = "abstract", default)]
    pub summary: String,
    pub licence: String,
    #[serde(default)]
    pub toc: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCurriculum {
    pub title: String,
    #[serde(default)]
    pub short_title: Option<String>,
    pub lang: String,
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Legacy resource keys (`posts/<key>`), in curriculum order.
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(rename = "abstract", default)]
    pub summary: String,
    pub licence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialKind {
    Email,
    Orcid,
    Twitter,
    Website,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub kind: SocialKind,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFrontmatter {
    pub name: String,
    pub image: String,
    pub social: Vec<SocialLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFrontmatter {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFrontmatter {
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteFrontmatter {
    pub publication_date: String,
    pub url: String,
    pub publisher: String,
}

/// Fields shared by the three resource shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceCommon {
    pub title: String,
    pub locale: String,
    pub publication_date: String,
    pub version: String,
    pub authors: Vec<String>,
    pub editors: Vec<String>,
    pub contributors: Vec<String>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    pub license: String,
    pub table_of_contents: bool,
    pub summary: Summary,
}

/// A resource in exactly one of the hosted/external/pathfinder shapes.
///
/// Only the constructors can build one, so `remote` is present iff the resource
/// is external and `content-type` is absent iff it is a pathfinder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFrontmatter {
    #[serde(flatten)]
    common: ResourceCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<RemoteFrontmatter>,
    #[serde(rename = "content-type", skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip)]
    kind: ResourceKind,
}

impl ResourceFrontmatter {
    pub fn hosted(common: ResourceCommon, content_type: String) -> Self {
        Self {
            common,
            remote: None,
            content_type: Some(content_type),
            kind: ResourceKind::Hosted,
        }
    }

    pub fn external(common: ResourceCommon, remote: RemoteFrontmatter, content_type: String) -> Self {
        Self {
            common,
            remote: Some(remote),
            content_type: Some(content_type),
            kind: ResourceKind::External,
        }
    }

    pub fn pathfinder(common: ResourceCommon) -> Self {
        Self {
            common,
            remote: None,
            content_type: None,
            kind: ResourceKind::Pathfinder,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn common(&self) -> &ResourceCommon {
        &self.common
    }

    pub fn common_mut(&mut self) -> &mut ResourceCommon {
        &mut self.common
    }

    pub fn remote(&self) -> Option<&RemoteFrontmatter> {
        self.remote.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventFrontmatter {
    pub title: String,
    pub locale: String,
    pub publication_date: String,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub authors: Vec<String>,
    pub contributors: Vec<String>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub partners: Vec<Partner>,
    pub license: String,
    pub table_of_contents: bool,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub collection: ResourceKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CurriculumFrontmatter {
    pub title: String,
    pub locale: String,
    pub publication_date: String,
    pub version: String,
    pub editors: Vec<String>,
    pub tags: Vec<String>,
    pub resources: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    pub license: String,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common() -> ResourceCommon {
        ResourceCommon {
            title: "Intro".into(),
            locale: "en".into(),
            publication_date: "2021-03-04".into(),
            version: "1.0.0".into(),
            authors: vec!["smith-jane".into()],
            editors: vec![],
            contributors: vec![],
            tags: vec![],
            sources: vec![],
            featured_image: None,
            license: TARGET_LICENSE.into(),
            table_of_contents: false,
            summary: Summary {
                title: None,
                content: "About.".into(),
            },
        }
    }

    #[test]
    fn legacy_resource_accepts_numeric_version_and_keyword_fields() {
        let yaml = "title: Intro\nlang: en\ndate: 2021-03-04\nversion: 1\nabstract: About.\ntype: training-module\nlicence: ccby-4.0\n";
        let legacy: LegacyResource = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(legacy.version.as_deref(), Some("1"));
        assert_eq!(legacy.date.as_deref(), Some("2021-03-04"));
        assert_eq!(legacy.content_type, "training-module");
        assert!(legacy.authors.is_empty());
        assert!(legacy.remote.is_none());
    }

    #[test]
    fn remote_block_needs_all_three_fields() {
        let full = LegacyRemote {
            date: Some("2020-01-01".into()),
            url: Some("https://example.org".into()),
            publisher: Some("ACME".into()),
        };
        assert!(full.is_complete());
        assert!(!LegacyRemote { publisher: Some("  ".into()), ..full.clone() }.is_complete());
        assert!(!LegacyRemote { url: None, ..full.clone() }.is_complete());
        assert!(!LegacyRemote { date: None, ..full }.is_complete());
    }

    #[test]
    fn pathfinder_shape_has_no_remote_or_content_type() {
        let yaml = serde_yaml::to_string(&ResourceFrontmatter::pathfinder(common())).unwrap();
        assert!(!yaml.contains("content-type"));
        assert!(!yaml.contains("remote"));
        assert!(yaml.contains("publication-date: 2021-03-04"));
        assert!(yaml.contains("table-of-contents: false"));
    }

    #[test]
    fn external_shape_serializes_remote_before_content_type() {
        let remote = RemoteFrontmatter {
            publication_date: "2020-01-01".into(),
            url: "https://example.org".into(),
            publisher: "ACME".into(),
        };
        let fm = ResourceFrontmatter::external(common(), remote, "video".into());
        assert_eq!(fm.kind(), ResourceKind::External);
        let yaml = serde_yaml::to_string(&fm).unwrap();
        let remote_at = yaml.find("remote:").unwrap();
        let type_at = yaml.find("content-type: video").unwrap();
        assert!(remote_at < type_at);
    }
}
