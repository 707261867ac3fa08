//! Package manifest (nuspec) parsing.
//!
//! A manifest is the XML document embedded in a package archive. Parsing is
//! event-based and namespace-tolerant: elements are matched by local name so
//! documents with or without the feed namespace read the same.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::NufeedError;
use crate::version::Version;

/// Namespace of manifest documents produced by this feed generation.
pub const NUSPEC_XML_NAMESPACE: &str = "http://schemas.microsoft.com/packaging/2011/08/nuspec.xsd";

/// File extension of the manifest entry inside a package archive.
pub const NUSPEC_EXTENSION: &str = ".nuspec";

/// A dependency declaration: package id plus an opaque version-range string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub id: String,
    pub version_range: Option<String>,
}

/// An assembly reference declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub file: String,
}

/// Declared package metadata.
///
/// Collection accessors return empty collections when the corresponding tag
/// is absent; the license-acceptance flag defaults to false.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub id: String,
    pub version: Option<Version>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub owners: Option<String>,
    pub require_license_acceptance: bool,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub copyright: Option<String>,
    pub language: Option<String>,
    pub tags: Option<String>,
    pub references: Vec<Reference>,
    pub dependencies: Vec<Dependency>,
}

impl Manifest {
    /// Parses a manifest document.
    ///
    /// Unknown elements are skipped; a malformed document or an unparseable
    /// version is an error, never silently recovered.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, NufeedError> {
        let mut xml = Reader::from_reader(reader);
        xml.config_mut().trim_text(true);

        let mut manifest = Manifest::default();
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut buf = Vec::new();

        loop {
            match xml.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(e.local_name().as_ref());
                    if name == "dependency" || name == "reference" {
                        manifest.capture_attributes(&name, &e)?;
                    }
                    path.push(name);
                    text.clear();
                }
                Event::Empty(e) => {
                    let name = local_name(e.local_name().as_ref());
                    if name == "dependency" || name == "reference" {
                        manifest.capture_attributes(&name, &e)?;
                    }
                }
                Event::Text(e) => {
                    text.push_str(&e.unescape()?);
                }
                Event::CData(e) => {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Event::End(_) => {
                    let Some(name) = path.pop() else { continue };
                    if path.last().map(String::as_str) == Some("metadata") {
                        manifest.assign_field(&name, text.trim())?;
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(manifest)
    }

    fn assign_field(&mut self, name: &str, value: &str) -> Result<(), NufeedError> {
        if value.is_empty() {
            return Ok(());
        }
        match name {
            "id" => self.id = value.to_string(),
            "version" => self.version = Some(value.parse()?),
            "title" => self.title = Some(value.to_string()),
            "authors" => self.authors = Some(value.to_string()),
            "owners" => self.owners = Some(value.to_string()),
            "requirelicenseacceptance" => {
                self.require_license_acceptance = value.eq_ignore_ascii_case("true");
            }
            "description" => self.description = Some(value.to_string()),
            "summary" => self.summary = Some(value.to_string()),
            "copyright" => self.copyright = Some(value.to_string()),
            "language" => self.language = Some(value.to_string()),
            "tags" => self.tags = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    fn capture_attributes(
        &mut self,
        name: &str,
        element: &quick_xml::events::BytesStart<'_>,
    ) -> Result<(), NufeedError> {
        let mut id = None;
        let mut version_range = None;
        let mut file = None;
        for attr in element.attributes() {
            let attr = attr.map_err(|err| NufeedError::InvalidManifest(err.to_string()))?;
            let value = String::from_utf8_lossy(&attr.value).into_owned();
            match attr.key.local_name().as_ref() {
                b"id" => id = Some(value),
                b"version" => version_range = Some(value),
                b"file" => file = Some(value),
                _ => {}
            }
        }
        match name {
            "dependency" => {
                if let Some(id) = id {
                    self.dependencies.push(Dependency { id, version_range });
                }
            }
            "reference" => {
                if let Some(file) = file {
                    self.references.push(Reference { file });
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn set_tags(&mut self, tags: Option<String>) {
        self.tags = tags;
    }

    /// Comma-delimited tags as a list; absent tags read as empty.
    pub fn tags(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_NUSPEC: &str = r#"<?xml version="1.0"?>
<package xmlns="http://schemas.microsoft.com/packaging/2011/08/nuspec.xsd">
  <metadata>
    <id>NUnit</id>
    <version>2.5.9.10348</version>
    <title>NUnit testing framework</title>
    <authors>NUnit developers</authors>
    <owners>NUnit project</owners>
    <requireLicenseAcceptance>true</requireLicenseAcceptance>
    <description>Unit-testing framework for all .Net languages.</description>
    <summary>Unit-testing framework</summary>
    <copyright>Copyright 2002-2010</copyright>
    <language>en-US</language>
    <tags>test, unit, mock</tags>
    <references>
      <reference file="nunit.framework.dll" />
    </references>
    <dependencies>
      <dependency id="SomePackage" version="[1.0, 2.0)" />
      <dependency id="Bare" />
    </dependencies>
  </metadata>
</package>"#;

    #[test]
    fn parses_all_declared_fields() {
        let manifest = Manifest::parse(FULL_NUSPEC.as_bytes()).unwrap();
        assert_eq!(manifest.id, "NUnit");
        assert_eq!(manifest.version, Some("2.5.9.10348".parse().unwrap()));
        assert_eq!(manifest.title.as_deref(), Some("NUnit testing framework"));
        assert_eq!(manifest.authors.as_deref(), Some("NUnit developers"));
        assert_eq!(manifest.owners.as_deref(), Some("NUnit project"));
        assert!(manifest.require_license_acceptance);
        assert_eq!(
            manifest.description.as_deref(),
            Some("Unit-testing framework for all .Net languages.")
        );
        assert_eq!(manifest.summary.as_deref(), Some("Unit-testing framework"));
        assert_eq!(manifest.copyright.as_deref(), Some("Copyright 2002-2010"));
        assert_eq!(manifest.language.as_deref(), Some("en-US"));
        assert_eq!(manifest.tags(), ["test", "unit", "mock"]);
        assert_eq!(
            manifest.references,
            [Reference {
                file: "nunit.framework.dll".to_string()
            }]
        );
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies[0].id, "SomePackage");
        assert_eq!(
            manifest.dependencies[0].version_range.as_deref(),
            Some("[1.0, 2.0)")
        );
        assert_eq!(manifest.dependencies[1].version_range, None);
    }

    #[test]
    fn absent_collections_read_as_empty() {
        let manifest = Manifest::parse(
            r#"<package><metadata><id>Minimal</id><version>1.0</version></metadata></package>"#
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(manifest.id, "Minimal");
        assert!(manifest.tags().is_empty());
        assert!(manifest.references.is_empty());
        assert!(manifest.dependencies.is_empty());
        assert!(!manifest.require_license_acceptance);
    }

    #[test]
    fn unparseable_version_is_an_error() {
        let result = Manifest::parse(
            r#"<package><metadata><id>Broken</id><version>not.a.version</version></metadata></package>"#
                .as_bytes(),
        );
        assert!(matches!(result, Err(NufeedError::InvalidVersion(_))));
    }

    #[test]
    fn fields_outside_metadata_are_ignored() {
        let manifest = Manifest::parse(
            r#"<package><id>Outside</id><metadata><id>Inside</id></metadata></package>"#.as_bytes(),
        )
        .unwrap();
        assert_eq!(manifest.id, "Inside");
    }
}
