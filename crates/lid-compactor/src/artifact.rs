//! File naming for layers and artifacts.
//!
//! Artifact: `<basename>-<tag>-.<artifact_ext>`, where `<tag>` is the
//! lowercase hex of the UTF-8 text `"<layers>|<extension>"`. The original
//! extension is stored without its dot; an empty one means the original file
//! had none.
//!
//! Intermediate layer: `<basename>.L<layer>.<artifact_ext>`.

use lid_core::{LidError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RE_ARTIFACT_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.+)-(?P<tag>(?:[0-9a-f]{2})+)-$").unwrap());
static RE_LAYER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.+)\.L(?P<layer>[0-9]+)\.(?P<ext>[A-Za-z0-9]+)$").unwrap());

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub layers: u32,
    pub extension: String,
}

impl ArtifactMeta {
    pub fn new(layers: u32, extension: impl Into<String>) -> Self {
        Self { layers, extension: extension.into() }
    }

    pub fn encode_tag(&self) -> String {
        hex::encode(format!("{}{SEPARATOR}{}", self.layers, self.extension))
    }

    pub fn decode_tag(tag: &str) -> Result<Self> {
        let bytes = hex::decode(tag)
            .map_err(|e| LidError::CorruptArtifact(format!("metadata tag {tag:?}: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| LidError::CorruptArtifact(format!("metadata tag {tag:?} is not UTF-8")))?;
        let (layers, extension) = text
            .split_once(SEPARATOR)
            .ok_or_else(|| LidError::CorruptArtifact(format!("metadata {text:?} lacks a separator")))?;
        let layers: u32 = layers
            .parse()
            .map_err(|_| LidError::CorruptArtifact(format!("layer count {layers:?} is not a number")))?;
        if layers == 0 {
            return Err(LidError::CorruptArtifact("layer count is zero".into()));
        }
        if !is_storable_extension(extension) {
            return Err(LidError::CorruptArtifact(format!("invalid original extension {extension:?}")));
        }
        Ok(Self::new(layers, extension))
    }
}

/// Whether `extension` survives the metadata tag unchanged.
fn is_storable_extension(extension: &str) -> bool {
    !extension.contains(['/', '\\', '.', SEPARATOR])
}

/// `dir/stem` of `path`, plus its extension (empty when absent).
///
/// Names whose extension could not be restored from an artifact are
/// rejected: a trailing dot, or an extension holding `|` or a separator.
pub fn split_original(path: &Path) -> Result<(PathBuf, String)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| LidError::Storage(format!("{} has no UTF-8 file name", path.display())))?;
    let extension = match path.extension() {
        Some(ext) => ext
            .to_str()
            .ok_or_else(|| LidError::Storage(format!("{} has a non UTF-8 extension", path.display())))?
            .to_string(),
        None => String::new(),
    };
    if path.extension().is_some() && extension.is_empty() {
        return Err(LidError::Storage(format!("{} ends in a bare dot", path.display())));
    }
    if !is_storable_extension(&extension) {
        return Err(LidError::Storage(format!(
            "{} has an extension that cannot be stored: {extension:?}",
            path.display()
        )));
    }
    Ok((path.with_file_name(stem), extension))
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    base.with_file_name(name)
}

pub fn layer_path(base: &Path, layer: u32, artifact_ext: &str) -> PathBuf {
    with_suffix(base, &format!(".L{layer}.{artifact_ext}"))
}

pub fn artifact_path(base: &Path, meta: &ArtifactMeta, artifact_ext: &str) -> PathBuf {
    with_suffix(base, &format!("-{}-.{artifact_ext}", meta.encode_tag()))
}

/// Where decompression puts the reconstructed file.
pub fn restored_path(base: &Path, meta: &ArtifactMeta) -> PathBuf {
    if meta.extension.is_empty() {
        base.to_path_buf()
    } else {
        with_suffix(base, &format!(".{}", meta.extension))
    }
}

/// Recover the base path and metadata from an artifact path.
pub fn parse_artifact_path(path: &Path, artifact_ext: &str) -> Result<(PathBuf, ArtifactMeta)> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if ext != artifact_ext {
        return Err(LidError::CorruptArtifact(format!(
            "{} does not have the .{artifact_ext} extension",
            path.display()
        )));
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let caps = RE_ARTIFACT_STEM.captures(stem).ok_or_else(|| {
        LidError::CorruptArtifact(format!("{} carries no metadata tag", path.display()))
    })?;
    let meta = ArtifactMeta::decode_tag(&caps["tag"])?;
    Ok((path.with_file_name(&caps["base"]), meta))
}

/// Layer number of `file_name` if it is a layer file of `base_name`.
pub fn layer_number(file_name: &str, base_name: &str, artifact_ext: &str) -> Option<u32> {
    let caps = RE_LAYER_NAME.captures(file_name)?;
    if &caps["base"] != base_name || &caps["ext"] != artifact_ext {
        return None;
    }
    caps["layer"].parse().ok()
}
