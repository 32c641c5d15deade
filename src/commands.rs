//! Read-only and scaffolding commands: `list`, `available`, `search`, `info`
//! and `create`.

use anyhow::{Context, Result};

use crate::environment::Environment;
use crate::index::{self, PackageIndex, PackageRecord};
use crate::repository::FetchPackages;
use crate::runtime::Runtime;
use crate::state::PersistentState;

/// Print the installed set.
pub fn list(state: &PersistentState) {
    if state.installed_packages.is_empty() {
        println!("No packages installed");
        return;
    }

    println!("Installed packages:");
    for (name, entry) in &state.installed_packages {
        println!("  {} v{} ({})", name, entry.version, entry.source);
    }
}

/// Print every package the repository advertises. Uses the cached index when
/// the repository is unreachable.
#[tracing::instrument(skip(runtime, source, env, state))]
pub async fn available<R: Runtime, S: FetchPackages>(
    runtime: &R,
    source: &S,
    env: &Environment,
    state: &PersistentState,
) -> Result<()> {
    let index = index::load_index(runtime, source, env, &state.repository).await;
    if index.is_empty() {
        println!("No packages available (repository unreachable and no cached index)");
        return Ok(());
    }

    println!("Available packages:");
    for (name, record) in &index {
        print_summary(name, record);
    }
    Ok(())
}

/// Case-insensitive substring search over names, descriptions and keywords.
#[tracing::instrument(skip(runtime, source, env, state))]
pub async fn search<R: Runtime, S: FetchPackages>(
    runtime: &R,
    source: &S,
    env: &Environment,
    state: &PersistentState,
    query: &str,
) -> Result<()> {
    let index = index::load_index(runtime, source, env, &state.repository).await;
    let matches = search_index(&index, query);

    if matches.is_empty() {
        println!("No packages matching '{}'", query);
        return Ok(());
    }

    for (name, record) in matches {
        print_summary(name, record);
    }
    Ok(())
}

fn search_index<'a>(index: &'a PackageIndex, query: &str) -> Vec<(&'a String, &'a PackageRecord)> {
    let query = query.to_lowercase();
    index
        .iter()
        .filter(|(name, record)| {
            name.to_lowercase().contains(&query)
                || record
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&query))
                || record
                    .keywords
                    .iter()
                    .flatten()
                    .any(|k| k.to_lowercase().contains(&query))
        })
        .collect()
}

fn print_summary(name: &str, record: &PackageRecord) {
    match &record.description {
        Some(description) => println!("  {} v{} - {}", name, record.version, description),
        None => println!("  {} v{}", name, record.version),
    }
}

/// Print the full index record for one package, plus its installed status.
#[tracing::instrument(skip(runtime, source, env, state))]
pub async fn info<R: Runtime, S: FetchPackages>(
    runtime: &R,
    source: &S,
    env: &Environment,
    state: &PersistentState,
    name: &str,
) -> Result<()> {
    let index = index::load_index(runtime, source, env, &state.repository).await;

    let Some(record) = index.get(name) else {
        println!("Package '{}' not found in repository", name);
        return Ok(());
    };

    println!("{} v{}", record.name, record.version);
    if let Some(description) = &record.description {
        println!("  description: {}", description);
    }
    if let Some(author) = &record.author {
        println!("  author: {}", author);
    }
    if let Some(license) = &record.license {
        println!("  license: {}", license);
    }
    if !record.dependencies.is_empty() {
        println!("  dependencies: {}", record.dependencies.join(", "));
    }
    if let Some(keywords) = &record.keywords {
        println!("  keywords: {}", keywords.join(", "));
    }
    match state.installed_packages.get(name) {
        Some(entry) => println!("  installed: yes (v{}, {})", entry.version, entry.source),
        None => println!("  installed: no"),
    }
    Ok(())
}

/// Scaffold a new local package: a starter `main.init` and a `package.json`.
/// An existing `main.init` is left alone so re-running `create` never
/// clobbers work in progress.
#[tracing::instrument(skip(runtime, env))]
pub fn create<R: Runtime>(runtime: &R, env: &Environment, name: &str, version: &str) -> Result<()> {
    let package_dir = env.package_dir(name);
    runtime
        .create_dir_all(&package_dir)
        .with_context(|| format!("Failed to create package directory {:?}", package_dir))?;

    let main_file = package_dir.join("main.init");
    if !runtime.exists(&main_file) {
        runtime.write(&main_file, starter_source(name, version).as_bytes())?;
    }

    let record = PackageRecord {
        name: name.to_string(),
        version: version.to_string(),
        description: Some(format!("Package {} for INITLANG", name)),
        author: None,
        license: None,
        dependencies: Vec::new(),
        keywords: None,
    };
    let json = serde_json::to_string_pretty(&record)?;
    runtime.write(&package_dir.join("package.json"), json.as_bytes())?;

    println!("Package '{}' created at {}", name, package_dir.display());
    Ok(())
}

fn starter_source(name: &str, version: &str) -> String {
    format!(
        r#"# Package {name}

init.log("Package {name} loaded!")

fi hello() {{
    init.ger("Hello from {name}!")
}}

let version ==> "{version}"
"#
    )
}
