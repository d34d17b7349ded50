//! `lovebrew.toml` parsing and validation.
//!
//! Checks run in a fixed order and the first defect wins:
//! sections → field presence → field types → field values.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use toml::{Table, Value};

use crate::target::Target;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Invalid TOML content: {0}")]
    InvalidContent(String),

    #[error("Missing required section [{0}]")]
    MissingSection(&'static str),

    #[error("Missing required field `{0}`")]
    MissingField(String),

    #[error("Field `{field}` must be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("Field `{0}` must not be empty")]
    EmptyField(String),

    #[error("Field `build.targets` must list at least one target")]
    EmptyTargets,

    #[error("Field `{field}` names unknown target `{value}`")]
    UnknownTarget { field: String, value: String },

    #[error("Field `metadata.version` is not a semantic version: {0}")]
    InvalidVersion(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub description: String,
    pub version: String,
    pub icons: BTreeMap<Target, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Build {
    pub targets: BTreeSet<Target>,
    pub source: String,
    pub packaged: bool,
}

/// A validated manifest. Immutable once parsed; keeps its source text for cache keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    metadata: Metadata,
    build: Build,
    text: String,
}

const METADATA_FIELDS: [&str; 4] = ["title", "author", "description", "version"];
const BUILD_FIELDS: [&str; 2] = ["targets", "source"];

impl Manifest {
    pub const FILENAME: &'static str = "lovebrew.toml";

    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let root: Table = text
            .parse()
            .map_err(|e: toml::de::Error| ManifestError::InvalidContent(e.message().to_string()))?;

        // sections
        let metadata = section(&root, "metadata")?;
        let build = section(&root, "build")?;

        // presence
        for name in METADATA_FIELDS {
            require(metadata, "metadata", name)?;
        }
        for name in BUILD_FIELDS {
            require(build, "build", name)?;
        }

        // types
        let title = string_field(metadata, "metadata", "title")?;
        let author = string_field(metadata, "metadata", "author")?;
        let description = string_field(metadata, "metadata", "description")?;
        let version = string_field(metadata, "metadata", "version")?;
        let icons = icons_field(metadata)?;

        let targets = string_list(build, "build", "targets")?;
        let source = string_field(build, "build", "source")?;
        let packaged = match build.get("packaged") {
            None => false,
            Some(Value::Boolean(b)) => *b,
            Some(_) => return Err(wrong_type("build", "packaged", "a boolean")),
        };

        // values
        for (name, value) in [
            ("metadata.title", title),
            ("metadata.author", author),
            ("metadata.description", description),
            ("metadata.version", version),
            ("build.source", source),
        ] {
            if value.trim().is_empty() {
                return Err(ManifestError::EmptyField(name.to_string()));
            }
        }

        semver::Version::parse(version.trim())
            .map_err(|e| ManifestError::InvalidVersion(e.to_string()))?;

        if targets.is_empty() {
            return Err(ManifestError::EmptyTargets);
        }
        let targets = targets
            .iter()
            .map(|t| parse_target("build.targets", t))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let icons = icons
            .into_iter()
            .map(|(k, v)| Ok((parse_target("metadata.icons", &k)?, v)))
            .collect::<Result<BTreeMap<_, _>, ManifestError>>()?;

        Ok(Self {
            metadata: Metadata {
                title: title.to_string(),
                author: author.to_string(),
                description: description.to_string(),
                version: version.trim().to_string(),
                icons,
            },
            build: Build {
                targets,
                source: source.to_string(),
                packaged,
            },
            text: text.to_string(),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn build(&self) -> &Build {
        &self.build
    }

    /// The exact text the manifest was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// BLAKE3 over the raw text: byte-identical manifests hash identically.
    pub fn content_hash(&self) -> [u8; 32] {
        blake3::hash(self.text.as_bytes()).into()
    }

    /// Archive path prefix of the source directory, always ending in `/`.
    pub fn source_prefix(&self) -> String {
        let trimmed = self
            .build
            .source
            .trim()
            .trim_start_matches("./")
            .trim_matches('/');
        format!("{trimmed}/")
    }

    pub fn icon_path(&self, target: Target) -> Option<&str> {
        self.metadata.icons.get(&target).map(String::as_str)
    }
}

fn section<'a>(root: &'a Table, name: &'static str) -> Result<&'a Table, ManifestError> {
    match root.get(name) {
        None => Err(ManifestError::MissingSection(name)),
        Some(Value::Table(t)) => Ok(t),
        Some(_) => Err(ManifestError::WrongType {
            field: name.to_string(),
            expected: "a table",
        }),
    }
}

fn require(table: &Table, section: &str, name: &str) -> Result<(), ManifestError> {
    if table.contains_key(name) {
        Ok(())
    } else {
        Err(ManifestError::MissingField(format!("{section}.{name}")))
    }
}

fn wrong_type(section: &str, name: &str, expected: &'static str) -> ManifestError {
    ManifestError::WrongType {
        field: format!("{section}.{name}"),
        expected,
    }
}

fn string_field<'a>(table: &'a Table, section: &str, name: &str) -> Result<&'a str, ManifestError> {
    match table.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(wrong_type(section, name, "a string")),
        None => Err(ManifestError::MissingField(format!("{section}.{name}"))),
    }
}

fn string_list<'a>(table: &'a Table, section: &str, name: &str) -> Result<Vec<&'a str>, ManifestError> {
    let Some(Value::Array(items)) = table.get(name) else {
        return Err(wrong_type(section, name, "an array of strings"));
    };
    items
        .iter()
        .map(|v| v.as_str().ok_or_else(|| wrong_type(section, name, "an array of strings")))
        .collect()
}

fn icons_field(metadata: &Table) -> Result<Vec<(String, String)>, ManifestError> {
    let icons = match metadata.get("icons") {
        None => return Ok(Vec::new()),
        Some(Value::Table(t)) => t,
        Some(_) => return Err(wrong_type("metadata", "icons", "a table")),
    };

    icons
        .iter()
        .map(|(k, v)| match v {
            Value::String(path) => Ok((k.clone(), path.clone())),
            _ => Err(wrong_type("metadata.icons", k, "a string")),
        })
        .collect()
}

fn parse_target(field: &str, value: &str) -> Result<Target, ManifestError> {
    value.parse().map_err(|_| ManifestError::UnknownTarget {
        field: field.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[metadata]
title = "Mario Kart"
author = "Someone"
description = "A racing game"
version = "0.1.0"

[build]
targets = ["ctr", "ctr", "hac"]
source = "game"
"#;

    fn with_build(build: &str) -> String {
        format!(
            "[metadata]\ntitle = \"t\"\nauthor = \"a\"\ndescription = \"d\"\nversion = \"1.0.0\"\n\n[build]\n{build}\n"
        )
    }

    #[test]
    fn test_targets_deduplicated() {
        let m = Manifest::parse(VALID).unwrap();
        let expected: BTreeSet<_> = [Target::Ctr, Target::Hac].into_iter().collect();
        assert_eq!(m.build().targets, expected);
        assert!(!m.build().packaged);
        assert_eq!(m.source_prefix(), "game/");
    }

    #[test]
    fn test_invalid_toml_is_content_error() {
        let err = Manifest::parse("[metadata\ntitle = ").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidContent(_)));
    }

    #[test]
    fn test_first_missing_section_reported() {
        let err = Manifest::parse("[build]\ntargets = [\"ctr\"]\nsource = \"g\"\n").unwrap_err();
        assert_eq!(err, ManifestError::MissingSection("metadata"));

        let err = Manifest::parse("[metadata]\ntitle = \"t\"\n").unwrap_err();
        assert_eq!(err, ManifestError::MissingSection("build"));
    }

    #[test]
    fn test_missing_field_named_with_section() {
        let text = VALID.replace("author = \"Someone\"\n", "");
        assert_eq!(
            Manifest::parse(&text).unwrap_err(),
            ManifestError::MissingField("metadata.author".into())
        );

        let err = Manifest::parse(&with_build("source = \"g\"")).unwrap_err();
        assert_eq!(err, ManifestError::MissingField("build.targets".into()));
    }

    #[test]
    fn test_presence_checked_before_types() {
        // wrong type on title, missing source: presence wins
        let text = "[metadata]\ntitle = 5\nauthor = \"a\"\ndescription = \"d\"\nversion = \"1.0.0\"\n[build]\ntargets = [\"ctr\"]\n";
        assert_eq!(
            Manifest::parse(text).unwrap_err(),
            ManifestError::MissingField("build.source".into())
        );
    }

    #[test]
    fn test_wrong_type_named() {
        let err = Manifest::parse(&with_build("targets = \"ctr\"\nsource = \"g\"")).unwrap_err();
        assert!(matches!(err, ManifestError::WrongType { ref field, .. } if field == "build.targets"));

        let err =
            Manifest::parse(&with_build("targets = [\"ctr\"]\nsource = \"g\"\npackaged = \"yes\"")).unwrap_err();
        assert!(matches!(err, ManifestError::WrongType { ref field, .. } if field == "build.packaged"));
    }

    #[test]
    fn test_empty_targets_is_own_error() {
        let err = Manifest::parse(&with_build("targets = []\nsource = \"g\"")).unwrap_err();
        assert_eq!(err, ManifestError::EmptyTargets);
    }

    #[test]
    fn test_unknown_target_rejected() {
        let err = Manifest::parse(&with_build("targets = [\"ctr\", \"ps2\"]\nsource = \"g\"")).unwrap_err();
        assert_eq!(
            err,
            ManifestError::UnknownTarget {
                field: "build.targets".into(),
                value: "ps2".into()
            }
        );
    }

    #[test]
    fn test_bad_semver_rejected() {
        let text = VALID.replace("0.1.0", "one point oh");
        assert!(matches!(Manifest::parse(&text).unwrap_err(), ManifestError::InvalidVersion(_)));
    }

    #[test]
    fn test_empty_title_rejected() {
        let text = VALID.replace("\"Mario Kart\"", "\"\"");
        assert_eq!(
            Manifest::parse(&text).unwrap_err(),
            ManifestError::EmptyField("metadata.title".into())
        );
    }

    #[test]
    fn test_icons_and_packaged() {
        let text = VALID.replace(
            "version = \"0.1.0\"",
            "version = \"0.1.0\"\nicons = { ctr = \"icons/ctr.png\", hac = \"icons/hac.jpg\" }",
        ) + "packaged = true\n";
        let m = Manifest::parse(&text).unwrap();
        assert!(m.build().packaged);
        assert_eq!(m.icon_path(Target::Ctr), Some("icons/ctr.png"));
        assert_eq!(m.icon_path(Target::Cafe), None);
    }

    #[test]
    fn test_identical_text_hashes_identically() {
        let a = Manifest::parse(VALID).unwrap();
        let b = Manifest::parse(VALID).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());

        let c = Manifest::parse(&VALID.replace("Someone", "Someone else")).unwrap();
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_source_prefix_normalized() {
        let m = Manifest::parse(&with_build("targets = [\"hac\"]\nsource = \"./game/\"")).unwrap();
        assert_eq!(m.source_prefix(), "game/");
    }
}
