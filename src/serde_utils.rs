use std::io::Write;
use std::path::Path;

use eyre::{Context, ContextCompat};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

pub fn from_str<T>(format: Format, content: &str) -> eyre::Result<T>
where
    T: DeserializeOwned,
{
    let value = match format {
        Format::Yaml => serde_yaml::from_str(content)?,
        Format::Toml => toml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };

    Ok(value)
}

pub fn to_string<T>(format: Format, value: &T) -> eyre::Result<String>
where
    T: Serialize,
{
    let content = match format {
        Format::Yaml => serde_yaml::to_string(value)?,
        Format::Toml => toml::to_string_pretty(value)?,
        Format::Json => serde_json::to_string_pretty(value)?,
    };

    Ok(content)
}

pub async fn read_deserialize<T>(path: impl AsRef<Path>) -> eyre::Result<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Reading from {}", path.display()))?;

    let value = from_str(Format::from_path(path), &content).with_context(|| {
        format!("Parsing {} content was {content}", path.display())
    })?;

    Ok(value)
}

/// Serializes `value` and atomically replaces the file at `path`.
///
/// The content goes to a temporary file in the same directory which is then
/// renamed over the target, so readers never observe a partial file.
pub async fn write_serialize<T>(
    path: impl AsRef<Path>,
    value: T,
) -> eyre::Result<()>
where
    T: Serialize,
{
    let path = path.as_ref().to_owned();

    let content = to_string(Format::from_path(&path), &value)
        .with_context(|| format!("Serializing {}", path.display()))?;

    tokio::task::spawn_blocking(move || write_atomic(&path, content.as_bytes()))
        .await??;

    Ok(())
}

pub fn write_atomic(path: &Path, content: &[u8]) -> eyre::Result<()> {
    let dir = path.parent().with_context(|| {
        format!("{} has no parent directory", path.display())
    })?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Creating {}", dir.display()))?;

    let mut file = tempfile::NamedTempFile::new_in(dir).with_context(|| {
        format!("Creating temporary file in {}", dir.display())
    })?;

    file.write_all(content)
        .and_then(|()| file.as_file().sync_all())
        .with_context(|| format!("Writing to {}", path.display()))?;

    file.persist(path)
        .with_context(|| format!("Writing to {}", path.display()))?;

    Ok(())
}
