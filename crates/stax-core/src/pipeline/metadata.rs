//! Asset classification and size accounting.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::transcoder::Transcoder;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "exr", "dpx", "tif", "tiff", "jpg", "jpeg", "png", "tga", "bmp", "hdr",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mov", "mp4", "avi", "mxf", "mkv", "mpg", "mpeg", "wmv", "flv", "webm",
];

pub const GEOMETRY_EXTENSIONS: &[&str] = &[
    "abc", "obj", "fbx", "usd", "usda", "usdc", "glb", "gltf", "ply", "stl", "dae",
];

pub const TOOLSET_EXTENSIONS: &[&str] = &["nk"];

/// Library category of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    /// Images, sequences and video
    #[serde(rename = "2D")]
    TwoD,
    /// Geometry
    #[serde(rename = "3D")]
    ThreeD,
    /// Serialized node-graph snippet
    Toolset,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::TwoD => "2D",
            AssetType::ThreeD => "3D",
            AssetType::Toolset => "Toolset",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimensions and container of an image or clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

/// Classifies files and totals their sizes.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Classify by extension. Unknown extensions are `2D`.
    pub fn asset_type(path: &Path) -> AssetType {
        let Some(ext) = lower_extension(path) else {
            return AssetType::TwoD;
        };
        if TOOLSET_EXTENSIONS.contains(&ext.as_str()) {
            AssetType::Toolset
        } else if GEOMETRY_EXTENSIONS.contains(&ext.as_str()) {
            AssetType::ThreeD
        } else {
            AssetType::TwoD
        }
    }

    pub fn is_video_extension(path: &Path) -> bool {
        lower_extension(path).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn is_image_extension(path: &Path) -> bool {
        lower_extension(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Size in bytes, or 0 when the file cannot be stat'ed.
    pub fn file_size(path: &Path) -> u64 {
        std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }

    /// Summed size of a set of files, missing members counting as 0.
    pub fn sequence_size<P: AsRef<Path>>(files: &[P]) -> u64 {
        files.iter().map(|f| Self::file_size(f.as_ref())).sum()
    }

    /// Width, height and container via the transcoder's probe.
    pub async fn image_info(transcoder: &Transcoder, path: &Path) -> Option<ImageInfo> {
        let info = transcoder.probe(path).await?;
        Some(ImageInfo {
            width: info.width,
            height: info.height,
            format: info.format,
        })
    }
}

/// Lower-cased extension without the dot.
pub fn lower_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}
