//! Helpers for building package archive fixtures and source doubles in
//! tests, here and in downstream crates.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::NufeedError;
use crate::package::manifest::NUSPEC_XML_NAMESPACE;
use crate::package::Package;
use crate::source::{keep_latest, PackageSource, PushStrategy, SimplePushStrategy};
use crate::version::Version;

/// Builder for a small but genuine package archive.
#[derive(Debug, Clone)]
pub struct FixtureNupkg {
    id: String,
    version: String,
    lib_paths: Vec<String>,
    description: Option<String>,
    with_manifest: bool,
}

impl FixtureNupkg {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            lib_paths: Vec::new(),
            description: None,
            with_manifest: true,
        }
    }

    pub fn with_lib_paths(mut self, paths: &[&str]) -> Self {
        self.lib_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.with_manifest = false;
        self
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}.nupkg", self.id, self.version)
    }

    pub fn manifest_xml(&self) -> String {
        let description = self.description.as_deref().unwrap_or("Test fixture package");
        format!(
            r#"<?xml version="1.0"?>
<package xmlns="{NUSPEC_XML_NAMESPACE}">
  <metadata>
    <id>{id}</id>
    <version>{version}</version>
    <authors>fixture</authors>
    <description>{description}</description>
  </metadata>
</package>"#,
            id = self.id,
            version = self.version,
        )
    }

    /// Renders the archive bytes.
    pub fn bytes(&self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        if self.with_manifest {
            writer
                .start_file(format!("{}.nuspec", self.id), options)
                .unwrap();
            writer.write_all(self.manifest_xml().as_bytes()).unwrap();
        }
        for path in &self.lib_paths {
            writer.start_file(path.as_str(), options).unwrap();
            writer.write_all(b"fixture entry").unwrap();
        }
        if !self.with_manifest && self.lib_paths.is_empty() {
            writer.start_file("content/readme.txt", options).unwrap();
            writer.write_all(b"fixture").unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    /// Writes the archive into `dir` under its canonical filename.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.bytes()).unwrap();
        path
    }
}

/// Read-only in-memory source serving a fixed package set. Pushes are
/// refused, removal is unsupported.
#[derive(Debug, Default)]
pub struct StaticSource {
    packages: Vec<Package>,
}

impl StaticSource {
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }
}

impl PackageSource for StaticSource {
    fn list_all(&self) -> Result<Vec<Package>, NufeedError> {
        Ok(self.packages.clone())
    }

    fn list_by_id(&self, id: &str) -> Result<Vec<Package>, NufeedError> {
        Ok(self
            .packages
            .iter()
            .filter(|p| p.id().eq_ignore_ascii_case(id))
            .cloned()
            .collect())
    }

    fn list_latest_all(&self) -> Result<Vec<Package>, NufeedError> {
        Ok(keep_latest(self.packages.clone()))
    }

    fn get_latest(&self, id: &str) -> Result<Option<Package>, NufeedError> {
        Ok(self
            .list_by_id(id)?
            .into_iter()
            .max_by(|a, b| a.version().cmp(b.version())))
    }

    fn get_exact(&self, id: &str, version: &Version) -> Result<Option<Package>, NufeedError> {
        Ok(self
            .list_by_id(id)?
            .into_iter()
            .find(|p| p.version() == version))
    }

    fn push(&self, _package: &Package, _api_key: Option<&str>) -> Result<bool, NufeedError> {
        Ok(false)
    }

    fn remove(&self, _id: &str, _version: &Version) -> Result<(), NufeedError> {
        Err(NufeedError::UnsupportedOperation("remove on a static source"))
    }

    fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError> {
        Ok(Arc::new(SimplePushStrategy::deny()))
    }

    fn set_push_strategy(&self, _strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError> {
        Err(NufeedError::UnsupportedOperation(
            "push strategy on a static source",
        ))
    }
}

/// Source whose every operation fails, for exercising degraded paths.
#[derive(Debug, Default)]
pub struct FailingSource;

impl FailingSource {
    fn fail<T>() -> Result<T, NufeedError> {
        Err(NufeedError::Custom("simulated source failure".to_string()))
    }
}

impl PackageSource for FailingSource {
    fn list_all(&self) -> Result<Vec<Package>, NufeedError> {
        Self::fail()
    }

    fn list_by_id(&self, _id: &str) -> Result<Vec<Package>, NufeedError> {
        Self::fail()
    }

    fn list_latest_all(&self) -> Result<Vec<Package>, NufeedError> {
        Self::fail()
    }

    fn get_latest(&self, _id: &str) -> Result<Option<Package>, NufeedError> {
        Self::fail()
    }

    fn get_exact(&self, _id: &str, _version: &Version) -> Result<Option<Package>, NufeedError> {
        Self::fail()
    }

    fn push(&self, _package: &Package, _api_key: Option<&str>) -> Result<bool, NufeedError> {
        Self::fail()
    }

    fn remove(&self, _id: &str, _version: &Version) -> Result<(), NufeedError> {
        Self::fail()
    }

    fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError> {
        Self::fail()
    }

    fn set_push_strategy(&self, _strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError> {
        Self::fail()
    }
}
