//! Declarative validation of raw legacy frontmatter, run before typed deserialization.

use campus_core::{normalize_date, Collection, MigrationError};
use serde_yaml::Value;

pub const LEGACY_LICENSE: &str = "ccby-4.0";

pub const LOCALES: &[&str] = &["en", "de", "sv"];

pub const CONTENT_TYPES: &[&str] = &[
    "audio",
    "event",
    "pathfinder",
    "slides",
    "training-module",
    "video",
    "webinar-recording",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Present, not null, and not a blank string.
    Required,
    OneOf(&'static [&'static str]),
    Date,
    /// Absolute `http(s)` URL.
    Url,
    NonEmptyList,
}

/// One check on a dotted field path (`remote.url`). Checks other than
/// `Required`/`NonEmptyList` pass when the field is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub path: &'static str,
    pub check: Check,
}

const fn rule(path: &'static str, check: Check) -> FieldRule {
    FieldRule { path, check }
}

pub const PERSON_RULES: &[FieldRule] = &[
    rule("firstName", Check::Required),
    rule("lastName", Check::Required),
    rule("website", Check::Url),
];

pub const TAG_RULES: &[FieldRule] = &[rule("name", Check::Required)];

pub const SOURCE_RULES: &[FieldRule] = &[rule("name", Check::Required)];

pub const RESOURCE_RULES: &[FieldRule] = &[
    rule("title", Check::Required),
    rule("lang", Check::Required),
    rule("lang", Check::OneOf(LOCALES)),
    rule("date", Check::Required),
    rule("date", Check::Date),
    rule("version", Check::Required),
    rule("type", Check::Required),
    rule("type", Check::OneOf(CONTENT_TYPES)),
    rule("licence", Check::Required),
    rule("licence", Check::OneOf(&[LEGACY_LICENSE])),
    rule("remote.date", Check::Date),
    rule("remote.url", Check::Url),
];

pub const EVENT_RULES: &[FieldRule] = &[
    rule("title", Check::Required),
    rule("lang", Check::Required),
    rule("lang", Check::OneOf(LOCALES)),
    rule("date", Check::Required),
    rule("date", Check::Date),
    rule("startDate", Check::Required),
    rule("startDate", Check::Date),
    rule("endDate", Check::Date),
    rule("licence", Check::Required),
    rule("licence", Check::OneOf(&[LEGACY_LICENSE])),
];

pub const CURRICULUM_RULES: &[FieldRule] = &[
    rule("title", Check::Required),
    rule("lang", Check::Required),
    rule("lang", Check::OneOf(LOCALES)),
    rule("date", Check::Required),
    rule("date", Check::Date),
    rule("version", Check::Required),
    rule("resources", Check::NonEmptyList),
    rule("licence", Check::Required),
    rule("licence", Check::OneOf(&[LEGACY_LICENSE])),
];

pub fn rules_for(collection: Collection) -> &'static [FieldRule] {
    match collection {
        Collection::People => PERSON_RULES,
        Collection::Tags => TAG_RULES,
        Collection::Sources => SOURCE_RULES,
        Collection::Resources => RESOURCE_RULES,
        Collection::Events => EVENT_RULES,
        Collection::Curricula => CURRICULUM_RULES,
    }
}

pub fn validate(rules: &[FieldRule], raw: &Value) -> Result<(), MigrationError> {
    rules.iter().try_for_each(|rule| apply(rule, raw))
}

fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(raw, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn apply(rule: &FieldRule, raw: &Value) -> Result<(), MigrationError> {
    let value = lookup(raw, rule.path);
    match rule.check {
        Check::Required => {
            let present = value.is_some_and(|v| scalar_text(v).map_or(true, |s| !s.is_empty()));
            if !present {
                return Err(MigrationError::invalid_field(rule.path, "required field is missing"));
            }
        }
        Check::OneOf(allowed) => {
            if let Some(value) = value {
                let text = scalar_text(value).unwrap_or_default();
                if !allowed.contains(&text.as_str()) {
                    return Err(MigrationError::invalid_enum(rule.path, &text, allowed));
                }
            }
        }
        Check::Date => {
            if let Some(value) = value {
                let text = scalar_text(value)
                    .ok_or_else(|| MigrationError::invalid_field(rule.path, "expected a date"))?;
                normalize_date(rule.path, &text)?;
            }
        }
        Check::Url => {
            if let Some(text) = value.and_then(scalar_text).filter(|s| !s.is_empty()) {
                check_url(rule.path, &text)?;
            }
        }
        Check::NonEmptyList => {
            let non_empty = value
                .and_then(Value::as_sequence)
                .is_some_and(|items| !items.is_empty());
            if !non_empty {
                return Err(MigrationError::invalid_field(rule.path, "expected a non-empty list"));
            }
        }
    }
    Ok(())
}

/// Absolute `http`/`https` URL, or `InvalidField` naming `field`.
pub fn check_url(field: &str, text: &str) -> Result<(), MigrationError> {
    let parsed = url::Url::parse(text.trim())
        .map_err(|err| MigrationError::invalid_field(field, format!("`{text}` is not a URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MigrationError::invalid_field(
            field,
            format!("`{text}` is not an http(s) URL"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    const RESOURCE: &str = "title: Intro\nlang: en\ndate: 2021-03-04\nversion: 1.0.0\ntype: training-module\nlicence: ccby-4.0\n";

    #[test]
    fn complete_resources_pass() {
        validate(RESOURCE_RULES, &yaml(RESOURCE)).unwrap();
    }

    #[test]
    fn enum_fields_are_checked_exactly() {
        let raw = yaml(&RESOURCE.replace("ccby-4.0", "cc-by-4.0"));
        match validate(RESOURCE_RULES, &raw) {
            Err(MigrationError::InvalidEnumValue { field, value, .. }) => {
                assert_eq!(field, "licence");
                assert_eq!(value, "cc-by-4.0");
            }
            other => panic!("unexpected {other:?}"),
        }

        let raw = yaml(&RESOURCE.replace("training-module", "podcast"));
        assert!(matches!(
            validate(RESOURCE_RULES, &raw),
            Err(MigrationError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn nested_paths_and_urls() {
        let raw = yaml(&format!("{RESOURCE}remote:\n  url: ftp://example.org/x\n"));
        assert!(matches!(
            validate(RESOURCE_RULES, &raw),
            Err(MigrationError::InvalidField { field, .. }) if field == "remote.url"
        ));

        let raw = yaml(&format!("{RESOURCE}remote:\n  date: someday\n"));
        assert!(matches!(
            validate(RESOURCE_RULES, &raw),
            Err(MigrationError::InvalidField { field, .. }) if field == "remote.date"
        ));
    }

    #[test]
    fn required_and_list_checks() {
        assert!(matches!(
            validate(PERSON_RULES, &yaml("firstName: Jane\nlastName: '  '\n")),
            Err(MigrationError::InvalidField { field, .. }) if field == "lastName"
        ));
        let curriculum = "title: C\nlang: de\ndate: 01.02.2022\nversion: 1\nlicence: ccby-4.0\nresources: []\n";
        assert!(matches!(
            validate(CURRICULUM_RULES, &yaml(curriculum)),
            Err(MigrationError::InvalidField { field, .. }) if field == "resources"
        ));
    }
}
