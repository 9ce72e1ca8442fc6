//! Gesture image assets
//!
//! The images directory holds one picture per gesture id (`0.png` ..
//! `15.png`) plus `-1.png`, shown when no gesture is recognised and for any
//! id without its own picture. Missing files are reported and skipped.
//!
//! An optional `gestures.json` in the same directory replaces the default
//! id → file mapping and can give each gesture a caption:
//!
//! ```json
//! { "gestures": [ { "id": 0, "file": "fist.png", "label": "Fist" } ] }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;
use serde::Deserialize;
use thiserror::Error;

use crate::protocol::GestureId;

/// Edge length images are scaled to
pub const IMAGE_SIZE: u32 = 200;

/// Optional manifest file name inside the images directory
pub const MANIFEST_FILE: &str = "gestures.json";

/// Highest gesture id the firmware reports
pub const MAX_GESTURE_ID: i32 = 15;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("images folder {0:?} not found")]
    MissingDirectory(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize, Debug)]
struct ManifestJson {
    gestures: Vec<GestureEntryJson>,
}

#[derive(Deserialize, Debug)]
struct GestureEntryJson {
    id: i32,
    file: String,
    #[serde(default)]
    label: Option<String>,
}

/// Where to find a gesture's picture and how to caption it
#[derive(Clone, Debug, PartialEq)]
pub struct GestureAsset {
    pub id: GestureId,
    pub file: String,
    pub label: Option<String>,
}

/// The default mapping: `<id>.png` for every known id and `-1.png`
pub fn default_assets() -> Vec<GestureAsset> {
    (0..=MAX_GESTURE_ID)
        .chain(std::iter::once(GestureId::NONE.0))
        .map(|id| GestureAsset {
            id: GestureId(id),
            file: format!("{}.png", id),
            label: None,
        })
        .collect()
}

fn load_manifest(path: &Path) -> Result<Vec<GestureAsset>, AssetError> {
    let text = fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: ManifestJson =
        serde_json::from_str(&text).map_err(|source| AssetError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(manifest
        .gestures
        .into_iter()
        .map(|entry| GestureAsset {
            id: GestureId(entry.id),
            file: entry.file,
            label: entry.label,
        })
        .collect())
}

fn load_image(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(img) => Some(
            img.resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Lanczos3)
                .to_rgba8(),
        ),
        Err(e) => {
            log::warn!("Could not load image {:?}: {}", path, e);
            None
        }
    }
}

/// Decoded gesture pictures and captions
pub struct GestureImages {
    images: HashMap<GestureId, RgbaImage>,
    labels: HashMap<GestureId, String>,
}

impl GestureImages {
    /// Load every image listed for `dir`.
    ///
    /// Fails only if the directory itself is missing or the manifest is
    /// unreadable; individual images that are absent are logged and skipped.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, AssetError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AssetError::MissingDirectory(dir.to_path_buf()));
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let assets = if manifest_path.exists() {
            log::info!("Using gesture manifest {:?}", manifest_path);
            load_manifest(&manifest_path)?
        } else {
            default_assets()
        };

        let mut images = HashMap::new();
        let mut labels = HashMap::new();
        for asset in assets {
            if let Some(label) = asset.label {
                labels.insert(asset.id, label);
            }

            let path = dir.join(&asset.file);
            if !path.exists() {
                log::warn!("Image {:?} not found", path);
                continue;
            }
            if let Some(img) = load_image(&path) {
                images.insert(asset.id, img);
            }
        }

        log::info!("Loaded {} gesture images from {:?}", images.len(), dir);
        Ok(Self { images, labels })
    }

    /// An empty catalogue (nothing is drawn for any gesture)
    pub fn empty() -> Self {
        Self {
            images: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    /// Picture for `id`, falling back to the no-gesture picture.
    ///
    /// Returns the id the picture actually belongs to, which callers can use
    /// as a cache key.
    pub fn image_for(&self, id: GestureId) -> Option<(GestureId, &RgbaImage)> {
        self.images
            .get(&id)
            .map(|img| (id, img))
            .or_else(|| self.images.get(&GestureId::NONE).map(|img| (GestureId::NONE, img)))
    }

    /// Caption for `id`
    pub fn label_for(&self, id: GestureId) -> String {
        match self.labels.get(&id) {
            Some(label) => label.clone(),
            None if id.is_none() => "No gesture".to_string(),
            None => format!("Gesture {}", id),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str) {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn default_map_covers_known_ids() {
        let assets = default_assets();
        assert_eq!(assets.len(), 17);
        assert!(assets.iter().any(|a| a.id == GestureId::NONE && a.file == "-1.png"));
        assert!(assets.iter().any(|a| a.id == GestureId(15) && a.file == "15.png"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            GestureImages::load(&missing),
            Err(AssetError::MissingDirectory(_))
        ));
    }

    #[test]
    fn loads_and_scales_available_images() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "0.png");
        write_png(tmp.path(), "-1.png");

        let images = GestureImages::load(tmp.path()).unwrap();
        assert_eq!(images.len(), 2);

        let (id, img) = images.image_for(GestureId(0)).unwrap();
        assert_eq!(id, GestureId(0));
        assert_eq!(img.dimensions(), (IMAGE_SIZE, IMAGE_SIZE));
    }

    #[test]
    fn unknown_gesture_falls_back_to_no_gesture_image() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "-1.png");

        let images = GestureImages::load(tmp.path()).unwrap();
        let (id, _) = images.image_for(GestureId(7)).unwrap();
        assert_eq!(id, GestureId::NONE);
    }

    #[test]
    fn nothing_to_draw_without_fallback() {
        let tmp = TempDir::new().unwrap();
        let images = GestureImages::load(tmp.path()).unwrap();
        assert!(images.is_empty());
        assert!(images.image_for(GestureId(3)).is_none());
    }

    #[test]
    fn corrupt_image_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("1.png"), b"not a png").unwrap();
        write_png(tmp.path(), "2.png");

        let images = GestureImages::load(tmp.path()).unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn manifest_overrides_files_and_labels() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "fist.png");
        fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{"gestures": [{"id": 0, "file": "fist.png", "label": "Fist"}, {"id": -1, "file": "none.png"}]}"#,
        )
        .unwrap();

        let images = GestureImages::load(tmp.path()).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images.image_for(GestureId(0)).is_some());
        assert_eq!(images.label_for(GestureId(0)), "Fist");
        assert_eq!(images.label_for(GestureId(4)), "Gesture 4");
        assert_eq!(images.label_for(GestureId::NONE), "No gesture");
    }

    #[test]
    fn bad_manifest_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), "{").unwrap();
        assert!(matches!(
            GestureImages::load(tmp.path()),
            Err(AssetError::Manifest { .. })
        ));
    }
}
