//! Legacy frontmatter → target frontmatter, one function per collection.
//!
//! Normalizers are synchronous and never touch the filesystem: asset references
//! are returned as [`PendingAsset`]s for the pipeline to relocate once the entry
//! has its new id, and bodies are passed through for the markup rewrite.

use std::collections::BTreeMap;

use campus_core::records::{
    CurriculumFrontmatter, EventFrontmatter, LegacyCurriculum, LegacyEvent, LegacyPerson,
    LegacyResource, LegacySource, LegacyTag, Partner, PersonFrontmatter, RemoteFrontmatter,
    ResourceCommon, ResourceFrontmatter, ResourceRef, SocialKind, SocialLink, SourceFrontmatter,
    Summary, TagFrontmatter, DEFAULT_AVATAR, DEFAULT_SOURCE_IMAGE, TARGET_LICENSE,
};
use campus_core::{
    normalize_date, slugify, Collection, IdentifierResolver, MappedId, MigrationError,
    Organisation, ResourceKind,
};
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use tracing::warn;

use crate::schema::{self, check_url, CONTENT_TYPES};

pub type OrganisationTable = BTreeMap<String, Organisation>;

/// Lookup tables an entry's references are resolved against.
#[derive(Debug, Clone, Copy)]
pub struct References<'a> {
    pub resolver: &'a IdentifierResolver,
    pub organisations: &'a OrganisationTable,
}

/// Frontmatter field that holds a relocated asset URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSlot {
    Avatar,
    Image,
    FeaturedImage,
    Logo,
    PartnerLogo(usize),
}

impl AssetSlot {
    /// Fixed destination stem; partner logos keep their own names.
    pub fn file_stem(self) -> Option<&'static str> {
        match self {
            AssetSlot::Avatar | AssetSlot::Image => Some("image"),
            AssetSlot::FeaturedImage => Some("featured-image"),
            AssetSlot::Logo => Some("logo"),
            AssetSlot::PartnerLogo(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAsset {
    pub slot: AssetSlot,
    /// As written in the legacy record: relative to the record, or rooted at the legacy tree.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    /// Slug the new id is allocated from.
    pub id_base: String,
    pub frontmatter: T,
    pub body: String,
    pub assets: Vec<PendingAsset>,
}

/// Frontmatter types that can receive relocated asset URLs.
pub trait AssetSlots {
    fn set_asset(&mut self, slot: AssetSlot, url: String);
}

impl AssetSlots for PersonFrontmatter {
    fn set_asset(&mut self, _slot: AssetSlot, url: String) {
        self.image = url;
    }
}

impl AssetSlots for TagFrontmatter {
    fn set_asset(&mut self, _slot: AssetSlot, _url: String) {}
}

impl AssetSlots for SourceFrontmatter {
    fn set_asset(&mut self, _slot: AssetSlot, url: String) {
        self.image = url;
    }
}

impl AssetSlots for ResourceFrontmatter {
    fn set_asset(&mut self, _slot: AssetSlot, url: String) {
        self.common_mut().featured_image = Some(url);
    }
}

impl AssetSlots for EventFrontmatter {
    fn set_asset(&mut self, slot: AssetSlot, url: String) {
        match slot {
            AssetSlot::Logo => self.logo = Some(url),
            AssetSlot::PartnerLogo(index) => {
                if let Some(partner) = self.partners.get_mut(index) {
                    partner.logo = Some(url);
                }
            }
            _ => self.featured_image = Some(url),
        }
    }
}

impl AssetSlots for CurriculumFrontmatter {
    fn set_asset(&mut self, _slot: AssetSlot, url: String) {
        self.featured_image = Some(url);
    }
}

fn typed<T: DeserializeOwned>(collection: Collection, raw: &Value) -> Result<T, MigrationError> {
    serde_yaml::from_value(raw.clone())
        .map_err(|err| MigrationError::invalid_field(collection.as_str(), err.to_string()))
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn description_body(description: Option<&str>) -> String {
    trimmed(description)
        .map(|text| format!("{text}\n"))
        .unwrap_or_default()
}

fn local_reference(value: Option<&str>) -> Option<String> {
    trimmed(value).filter(|v| !is_remote(v))
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

pub fn normalize_person(key: &str, raw: &Value) -> Result<Normalized<PersonFrontmatter>, MigrationError> {
    schema::validate(schema::PERSON_RULES, raw)?;
    let legacy: LegacyPerson = typed(Collection::People, raw)?;

    let first = legacy.first_name.trim();
    let last = legacy.last_name.trim();

    let social = [
        (SocialKind::Email, &legacy.email),
        (SocialKind::Orcid, &legacy.orcid),
        (SocialKind::Twitter, &legacy.twitter),
        (SocialKind::Website, &legacy.website),
    ]
    .into_iter()
    .filter_map(|(kind, value)| trimmed(value.as_deref()).map(|href| SocialLink { kind, href }))
    .collect();

    let mut assets = Vec::new();
    if let Some(avatar) = trimmed(legacy.avatar.as_deref()) {
        if is_remote(&avatar) {
            warn!(person = key, avatar = %avatar, "remote avatar url ignored");
        } else {
            assets.push(PendingAsset {
                slot: AssetSlot::Avatar,
                reference: avatar,
            });
        }
    }

    Ok(Normalized {
        id_base: slugify(&format!("{last}-{first}")),
        frontmatter: PersonFrontmatter {
            name: format!("{first} {last}"),
            image: DEFAULT_AVATAR.to_string(),
            social,
        },
        body: description_body(legacy.description.as_deref()),
        assets,
    })
}

pub fn normalize_tag(_key: &str, raw: &Value) -> Result<Normalized<TagFrontmatter>, MigrationError> {
    schema::validate(schema::TAG_RULES, raw)?;
    let legacy: LegacyTag = typed(Collection::Tags, raw)?;
    let name = legacy.name.trim().to_string();
    Ok(Normalized {
        id_base: slugify(&name),
        frontmatter: TagFrontmatter { name },
        body: description_body(legacy.description.as_deref()),
        assets: Vec::new(),
    })
}

pub fn normalize_source(key: &str, raw: &Value) -> Result<Normalized<SourceFrontmatter>, MigrationError> {
    schema::validate(schema::SOURCE_RULES, raw)?;
    let legacy: LegacySource = typed(Collection::Sources, raw)?;
    let name = legacy.name.trim().to_string();

    let mut assets = Vec::new();
    if let Some(image) = trimmed(legacy.image.as_deref()) {
        if is_remote(&image) {
            warn!(source = key, image = %image, "remote source image ignored");
        } else {
            assets.push(PendingAsset {
                slot: AssetSlot::Image,
                reference: image,
            });
        }
    }

    Ok(Normalized {
        id_base: slugify(&name),
        frontmatter: SourceFrontmatter {
            name,
            image: DEFAULT_SOURCE_IMAGE.to_string(),
        },
        body: description_body(legacy.description.as_deref()),
        assets,
    })
}

fn summary(short_title: Option<&str>, content: &str) -> Summary {
    Summary {
        title: trimmed(short_title),
        content: content.trim().to_string(),
    }
}

fn required_date(field: &str, value: Option<&str>) -> Result<String, MigrationError> {
    let value = value.ok_or_else(|| MigrationError::invalid_field(field, "required field is missing"))?;
    normalize_date(field, value)
}

fn featured_image(reference: Option<&str>) -> Vec<PendingAsset> {
    local_reference(reference)
        .map(|reference| PendingAsset {
            slot: AssetSlot::FeaturedImage,
            reference,
        })
        .into_iter()
        .collect()
}

pub fn normalize_resource(
    key: &str,
    raw: &Value,
    body: &str,
    refs: References<'_>,
) -> Result<Normalized<ResourceFrontmatter>, MigrationError> {
    schema::validate(schema::RESOURCE_RULES, raw)?;
    let legacy: LegacyResource = typed(Collection::Resources, raw)?;

    if legacy.authors.is_empty() {
        warn!(resource = key, "resource has no authors");
    }

    let resolver = refs.resolver;
    let common = ResourceCommon {
        title: legacy.title.trim().to_string(),
        locale: legacy.lang.trim().to_string(),
        publication_date: required_date("date", legacy.date.as_deref())?,
        version: legacy.version.clone().unwrap_or_default().trim().to_string(),
        authors: resolver.resolve_all(Collection::People, &legacy.authors)?,
        editors: resolver.resolve_all(Collection::People, &legacy.editors)?,
        contributors: resolver.resolve_all(Collection::People, &legacy.contributors)?,
        tags: resolver.resolve_all(Collection::Tags, &legacy.tags)?,
        sources: resolver.resolve_all(Collection::Sources, &legacy.categories)?,
        featured_image: None,
        license: TARGET_LICENSE.to_string(),
        table_of_contents: legacy.toc,
        summary: summary(legacy.short_title.as_deref(), &legacy.summary),
    };

    Ok(Normalized {
        id_base: slugify(key),
        frontmatter: classify(common, &legacy)?,
        body: body.to_string(),
        assets: featured_image(legacy.featured_image.as_deref()),
    })
}

/// External iff the remote block is complete; otherwise pathfinder iff the type says so; else hosted.
pub fn classify(common: ResourceCommon, legacy: &LegacyResource) -> Result<ResourceFrontmatter, MigrationError> {
    let content_type = legacy.content_type.trim().to_string();
    let is_pathfinder = content_type == "pathfinder";

    match legacy.remote.as_ref().filter(|remote| remote.is_complete()) {
        Some(remote) => {
            if is_pathfinder {
                let allowed: Vec<&str> = CONTENT_TYPES
                    .iter()
                    .copied()
                    .filter(|t| *t != "pathfinder")
                    .collect();
                return Err(MigrationError::invalid_enum("type", &content_type, &allowed));
            }
            let url = remote.url.as_deref().unwrap_or_default().trim().to_string();
            check_url("remote.url", &url)?;
            let remote = RemoteFrontmatter {
                publication_date: required_date("remote.date", remote.date.as_deref())?,
                url,
                publisher: remote.publisher.as_deref().unwrap_or_default().trim().to_string(),
            };
            Ok(ResourceFrontmatter::external(common, remote, content_type))
        }
        None if is_pathfinder => Ok(ResourceFrontmatter::pathfinder(common)),
        None => Ok(ResourceFrontmatter::hosted(common, content_type)),
    }
}

pub fn normalize_event(
    key: &str,
    raw: &Value,
    body: &str,
    refs: References<'_>,
) -> Result<Normalized<EventFrontmatter>, MigrationError> {
    schema::validate(schema::EVENT_RULES, raw)?;
    let legacy: LegacyEvent = typed(Collection::Events, raw)?;
    let resolver = refs.resolver;

    if legacy.authors.is_empty() {
        warn!(event = key, "event has no authors");
    }

    let mut assets = featured_image(legacy.featured_image.as_deref());
    if let Some(logo) = local_reference(legacy.logo.as_deref()) {
        assets.push(PendingAsset {
            slot: AssetSlot::Logo,
            reference: logo,
        });
    }

    let mut partners = Vec::with_capacity(legacy.partners.len());
    for (index, partner_key) in legacy.partners.iter().enumerate() {
        let partner_key = partner_key.trim();
        let organisation = refs
            .organisations
            .get(partner_key)
            .ok_or_else(|| MigrationError::missing("organisations", partner_key))?;
        let url = trimmed(organisation.url.as_deref());
        if let Some(url) = &url {
            check_url("partners.url", url)?;
        }
        if let Some(logo) = trimmed(organisation.logo.as_deref()) {
            if is_remote(&logo) {
                warn!(event = key, partner = partner_key, "remote partner logo ignored");
            } else {
                assets.push(PendingAsset {
                    slot: AssetSlot::PartnerLogo(index),
                    reference: logo,
                });
            }
        }
        partners.push(Partner {
            name: organisation.name.trim().to_string(),
            url,
            logo: None,
        });
    }

    let frontmatter = EventFrontmatter {
        title: legacy.title.trim().to_string(),
        locale: legacy.lang.trim().to_string(),
        publication_date: required_date("date", legacy.date.as_deref())?,
        start_date: required_date("startDate", legacy.start_date.as_deref())?,
        end_date: legacy
            .end_date
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| normalize_date("endDate", v))
            .transpose()?,
        location: trimmed(legacy.location.as_deref()),
        authors: resolver.resolve_all(Collection::People, &legacy.authors)?,
        contributors: resolver.resolve_all(Collection::People, &legacy.contributors)?,
        tags: resolver.resolve_all(Collection::Tags, &legacy.tags)?,
        sources: resolver.resolve_all(Collection::Sources, &legacy.categories)?,
        featured_image: None,
        logo: None,
        partners,
        license: TARGET_LICENSE.to_string(),
        table_of_contents: legacy.toc,
        summary: summary(legacy.short_title.as_deref(), &legacy.summary),
    };

    Ok(Normalized {
        id_base: slugify(key),
        frontmatter,
        body: body.to_string(),
        assets,
    })
}

pub fn normalize_curriculum(
    key: &str,
    raw: &Value,
    body: &str,
    refs: References<'_>,
) -> Result<Normalized<CurriculumFrontmatter>, MigrationError> {
    schema::validate(schema::CURRICULUM_RULES, raw)?;
    let legacy: LegacyCurriculum = typed(Collection::Curricula, raw)?;
    let resolver = refs.resolver;

    let resources = legacy
        .resources
        .iter()
        .map(|resource_key| match resolver.resolve(Collection::Resources, resource_key.trim())? {
            MappedId::Resource { collection, id } => Ok(ResourceRef {
                collection: *collection,
                id: id.clone(),
            }),
            MappedId::Slug(id) => Err(MigrationError::invalid_field(
                "resources",
                format!("`{resource_key}` maps to `{id}` without a resource collection"),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let frontmatter = CurriculumFrontmatter {
        title: legacy.title.trim().to_string(),
        locale: legacy.lang.trim().to_string(),
        publication_date: required_date("date", legacy.date.as_deref())?,
        version: legacy.version.clone().unwrap_or_default().trim().to_string(),
        editors: resolver.resolve_all(Collection::People, &legacy.editors)?,
        tags: resolver.resolve_all(Collection::Tags, &legacy.tags)?,
        resources,
        featured_image: None,
        license: TARGET_LICENSE.to_string(),
        summary: summary(legacy.short_title.as_deref(), &legacy.summary),
    };

    Ok(Normalized {
        id_base: slugify(key),
        frontmatter,
        body: body.to_string(),
        assets: featured_image(legacy.featured_image.as_deref()),
    })
}

/// Value recorded in the identifier mapping for a resource.
pub fn resource_mapping(kind: ResourceKind, id: &str) -> MappedId {
    MappedId::Resource {
        collection: kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn resolver() -> IdentifierResolver {
        let mut resolver = IdentifierResolver::new();
        for (collection, key, id) in [
            (Collection::People, "jsmith", "smith-jane"),
            (Collection::People, "mmuller", "muller-max"),
            (Collection::Tags, "tei", "tei"),
            (Collection::Sources, "dariah", "dariah"),
        ] {
            resolver
                .register(collection, key, MappedId::Slug(id.into()))
                .unwrap();
        }
        resolver
    }

    const HOSTED: &str = r#"
title: "  Intro to TEI "
shortTitle: TEI
lang: en
date: 2021-03-04T10:00:00
version: 1.0.0
authors: [jsmith]
editors: [mmuller]
tags: [tei]
categories: [dariah]
featuredImage: images/cover.png
abstract: |
  What TEI is.
type: training-module
licence: ccby-4.0
toc: true
"#;

    #[test]
    fn people_collect_social_links_in_order() {
        let raw = yaml("firstName: Jürgen\nlastName: Müller\nemail: j@example.org\nwebsite: https://example.org\navatar: images/jm.jpg\ndescription: Historian.\n");
        let person = normalize_person("jmuller", &raw).unwrap();
        assert_eq!(person.id_base, "muller-jurgen");
        assert_eq!(person.frontmatter.name, "Jürgen Müller");
        assert_eq!(person.frontmatter.image, DEFAULT_AVATAR);
        let kinds: Vec<_> = person.frontmatter.social.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SocialKind::Email, SocialKind::Website]);
        assert_eq!(person.assets[0].slot.file_stem(), Some("image"));
        assert_eq!(person.body, "Historian.\n");
    }

    #[test]
    fn remote_avatars_are_ignored() {
        let raw = yaml("firstName: A\nlastName: B\navatar: https://example.org/a.png\n");
        assert!(normalize_person("ab", &raw).unwrap().assets.is_empty());
    }

    #[test]
    fn hosted_resources_resolve_every_reference() {
        let resolver = resolver();
        let orgs = OrganisationTable::new();
        let refs = References {
            resolver: &resolver,
            organisations: &orgs,
        };
        let out = normalize_resource("intro-tei", &yaml(HOSTED), "Body\n", refs).unwrap();
        let fm = &out.frontmatter;
        assert_eq!(fm.kind(), ResourceKind::Hosted);
        assert_eq!(fm.content_type(), Some("training-module"));
        assert!(fm.remote().is_none());
        let common = fm.common();
        assert_eq!(common.title, "Intro to TEI");
        assert_eq!(common.publication_date, "2021-03-04");
        assert_eq!(common.authors, vec!["smith-jane"]);
        assert_eq!(common.editors, vec!["muller-max"]);
        assert_eq!(common.sources, vec!["dariah"]);
        assert_eq!(common.summary.title.as_deref(), Some("TEI"));
        assert_eq!(common.summary.content, "What TEI is.");
        assert_eq!(out.assets[0].slot, AssetSlot::FeaturedImage);
        assert_eq!(out.id_base, "intro-tei");
    }

    #[test]
    fn classification_follows_remote_then_type() {
        let resolver = resolver();
        let orgs = OrganisationTable::new();
        let refs = References {
            resolver: &resolver,
            organisations: &orgs,
        };

        let external = format!("{HOSTED}remote:\n  date: 2020-01-01\n  url: https://example.org/x\n  publisher: Example\n");
        let out = normalize_resource("x", &yaml(&external), "", refs).unwrap();
        assert_eq!(out.frontmatter.kind(), ResourceKind::External);
        assert_eq!(out.frontmatter.remote().unwrap().publication_date, "2020-01-01");

        let partial = format!("{HOSTED}remote:\n  url: https://example.org/x\n");
        let out = normalize_resource("x", &yaml(&partial), "", refs).unwrap();
        assert_eq!(out.frontmatter.kind(), ResourceKind::Hosted);

        let undated = format!("{HOSTED}remote:\n  url: https://example.org/x\n  publisher: Example\n");
        let out = normalize_resource("x", &yaml(&undated), "", refs).unwrap();
        assert_eq!(out.frontmatter.kind(), ResourceKind::Hosted);
        assert!(out.frontmatter.remote().is_none());
        let rendered = serde_yaml::to_string(&out.frontmatter).unwrap();
        assert!(!rendered.contains("remote"), "{rendered}");

        let pathfinder = HOSTED.replace("training-module", "pathfinder");
        let out = normalize_resource("x", &yaml(&pathfinder), "", refs).unwrap();
        assert_eq!(out.frontmatter.kind(), ResourceKind::Pathfinder);
        assert_eq!(out.frontmatter.content_type(), None);
        let rendered = serde_yaml::to_string(&out.frontmatter).unwrap();
        assert!(!rendered.contains("content-type") && !rendered.contains("remote"));

        let external_pathfinder = format!(
            "{pathfinder}remote:\n  date: 2020-01-01\n  url: https://example.org/x\n  publisher: Example\n"
        );
        assert!(matches!(
            normalize_resource("x", &yaml(&external_pathfinder), "", refs),
            Err(MigrationError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn unresolved_references_are_fatal() {
        let resolver = resolver();
        let orgs = OrganisationTable::new();
        let refs = References {
            resolver: &resolver,
            organisations: &orgs,
        };
        let raw = yaml(&HOSTED.replace("[jsmith]", "[ghost]"));
        match normalize_resource("x", &raw, "", refs) {
            Err(MigrationError::MissingMapping { collection, key }) => {
                assert_eq!(collection, "people");
                assert_eq!(key, "ghost");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn events_pull_partners_from_the_organisation_table() {
        let resolver = resolver();
        let mut orgs = OrganisationTable::new();
        orgs.insert(
            "dariah-eu".into(),
            Organisation {
                name: "DARIAH-EU".into(),
                url: Some("https://www.dariah.eu".into()),
                logo: Some("/assets/partners/dariah.svg".into()),
            },
        );
        let refs = References {
            resolver: &resolver,
            organisations: &orgs,
        };
        let raw = yaml("title: Summer School\nlang: de\ndate: 2022-06-01\nstartDate: 01.07.2022\nendDate: 2022-07-05\nauthors: [jsmith]\npartners: [dariah-eu]\nlicence: ccby-4.0\n");
        let mut event = normalize_event("summer-school-2022", &raw, "", refs).unwrap();
        assert_eq!(event.frontmatter.start_date, "2022-07-01");
        assert_eq!(event.frontmatter.end_date.as_deref(), Some("2022-07-05"));
        assert_eq!(event.frontmatter.partners[0].name, "DARIAH-EU");
        assert_eq!(event.assets[0].slot, AssetSlot::PartnerLogo(0));

        event
            .frontmatter
            .set_asset(AssetSlot::PartnerLogo(0), "/assets/x/dariah.svg".into());
        assert_eq!(event.frontmatter.partners[0].logo.as_deref(), Some("/assets/x/dariah.svg"));

        let missing = yaml("title: T\nlang: en\ndate: 2022-06-01\nstartDate: 2022-06-01\npartners: [nobody]\nlicence: ccby-4.0\n");
        assert!(matches!(
            normalize_event("t", &missing, "", refs),
            Err(MigrationError::MissingMapping { collection, .. }) if collection == "organisations"
        ));
    }

    #[test]
    fn curricula_reference_resources_by_collection() {
        let mut resolver = resolver();
        resolver
            .register(
                Collection::Resources,
                "intro-tei",
                resource_mapping(ResourceKind::Hosted, "intro-tei"),
            )
            .unwrap();
        let orgs = OrganisationTable::new();
        let refs = References {
            resolver: &resolver,
            organisations: &orgs,
        };
        let raw = yaml("title: Editions\nlang: en\ndate: 2023-01-01\nversion: 2\neditors: [jsmith]\nresources: [intro-tei]\nlicence: ccby-4.0\n");
        let out = normalize_curriculum("editions", &raw, "", refs).unwrap();
        assert_eq!(out.frontmatter.version, "2");
        assert_eq!(
            out.frontmatter.resources,
            vec![ResourceRef {
                collection: ResourceKind::Hosted,
                id: "intro-tei".into()
            }]
        );
    }
}
