//! Command handlers.

use std::fs::File;
use std::path::Path;

use miette::{bail, miette, IntoDiagnostic};
use nufeed_core::{ErrorContext, Package, PackageSource, Version};
use nufeed_query::{And, Expression, IdIs, Latest};
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Authors")]
    authors: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl PackageRow {
    fn from_package(package: &Package) -> miette::Result<Self> {
        let manifest = package.manifest()?;
        Ok(Self {
            id: package.id().to_string(),
            version: package.version().to_string(),
            authors: manifest
                .and_then(|m| m.authors.clone())
                .unwrap_or_default(),
            description: manifest
                .and_then(|m| m.description.clone())
                .unwrap_or_default(),
        })
    }
}

fn parse_version(raw: &str) -> miette::Result<Version> {
    Ok(raw.parse::<Version>()?)
}

pub fn list(
    source: &dyn PackageSource,
    id: Option<&str>,
    latest: bool,
    json: bool,
) -> miette::Result<()> {
    // Listing filters are query expressions over the source.
    let packages = match (id, latest) {
        (Some(id), true) => And::new(IdIs::new(id), Latest).execute(source)?,
        (Some(id), false) => IdIs::new(id).execute(source)?,
        (None, true) => Latest.execute(source)?,
        (None, false) => source.list_all()?,
    };

    if json {
        let entries: Vec<_> = packages
            .iter()
            .map(|p| {
                json!({
                    "id": p.id(),
                    "version": p.version().to_string(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).into_diagnostic()?
        );
        return Ok(());
    }

    if packages.is_empty() {
        info!("No packages found");
        return Ok(());
    }
    let rows: Vec<PackageRow> = packages
        .iter()
        .map(PackageRow::from_package)
        .collect::<miette::Result<_>>()?;
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
    Ok(())
}

pub fn show(source: &dyn PackageSource, id: &str, version: &str, json: bool) -> miette::Result<()> {
    let version = parse_version(version)?;
    let Some(package) = source.get_exact(id, &version)? else {
        bail!("package {id}:{version} not found");
    };

    let hash = package.hash()?.to_string();
    let size = package.size()?;
    let frameworks: Vec<String> = package.frameworks().iter().map(|f| f.to_string()).collect();
    let manifest = package.manifest()?;

    if json {
        let value = json!({
            "id": package.id(),
            "version": package.version().to_string(),
            "hash": hash,
            "size": size,
            "frameworks": frameworks,
            "title": manifest.and_then(|m| m.title.clone()),
            "authors": manifest.and_then(|m| m.authors.clone()),
            "description": manifest.and_then(|m| m.description.clone()),
            "tags": manifest.map(|m| m.tags()).unwrap_or_default(),
            "dependencies": manifest
                .map(|m| {
                    m.dependencies
                        .iter()
                        .map(|d| {
                            json!({ "id": d.id, "versionRange": d.version_range })
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        });
        println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        return Ok(());
    }

    println!("Id:          {}", package.id());
    println!("Version:     {}", package.version());
    println!("Hash:        {hash}");
    println!("Size:        {size} bytes");
    println!("Frameworks:  {}", frameworks.join(", "));
    if let Some(manifest) = manifest {
        if let Some(title) = &manifest.title {
            println!("Title:       {title}");
        }
        if let Some(authors) = &manifest.authors {
            println!("Authors:     {authors}");
        }
        if let Some(description) = &manifest.description {
            println!("Description: {description}");
        }
        let tags = manifest.tags();
        if !tags.is_empty() {
            println!("Tags:        {}", tags.join(", "));
        }
        for dependency in &manifest.dependencies {
            match &dependency.version_range {
                Some(range) => println!("Depends on:  {} {range}", dependency.id),
                None => println!("Depends on:  {}", dependency.id),
            }
        }
    }
    Ok(())
}

pub fn fetch(
    source: &dyn PackageSource,
    id: &str,
    version: &str,
    output: &Path,
) -> miette::Result<()> {
    let version = parse_version(version)?;
    let Some(package) = source.get_exact(id, &version)? else {
        bail!("package {id}:{version} not found");
    };

    let mut reader = package.open()?;
    let mut file = File::create(output)
        .with_context(|| format!("creating '{}'", output.display()))?;
    std::io::copy(&mut reader, &mut file)
        .with_context(|| format!("writing '{}'", output.display()))?;
    info!("Fetched {package} to {}", output.display());
    Ok(())
}

pub fn push(source: &dyn PackageSource, file: &Path, api_key: Option<&str>) -> miette::Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("reading '{}'", file.display()))?;
    let package = Package::from_bytes(&bytes)?;
    if !source.push(&package, api_key)? {
        return Err(miette!("push of {package} was refused by the source"));
    }
    info!("Pushed {package}");
    Ok(())
}

pub fn remove(source: &dyn PackageSource, id: &str, version: &str) -> miette::Result<()> {
    let version = parse_version(version)?;
    source.remove(id, &version)?;
    info!("Removed {id}:{version}");
    Ok(())
}
