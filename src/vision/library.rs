//! Startup scan of the reference image directories.
//!
//! Layout under the configured images directory:
//!   ads/     any number of .png/.jpg/.jpeg banner references
//!   volume/  volume.png (unmuted icon) and mute.png (muted icon)
//!
//! Everything here degrades instead of failing: a missing directory, an
//! empty scan, or an unreadable file is reported once and excluded, and the
//! watcher runs with whatever loaded. Zero ad references means ads are never
//! detected; missing volume references pin the mute-state read to Unknown.

use super::matcher::ReferenceImage;
use crate::log_debug;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub const ADS_SUBDIR: &str = "ads";
pub const VOLUME_SUBDIR: &str = "volume";
pub const UNMUTED_ICON_FILE: &str = "volume.png";
pub const MUTED_ICON_FILE: &str = "mute.png";

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Load status of one expected reference file, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub path: PathBuf,
    pub loaded: bool,
}

/// The two on-screen volume icon references. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct VolumeRefs {
    unmuted: Option<ReferenceImage>,
    muted: Option<ReferenceImage>,
}

impl VolumeRefs {
    pub fn unmuted(&self) -> Option<&ReferenceImage> {
        self.unmuted.as_ref()
    }

    pub fn muted(&self) -> Option<&ReferenceImage> {
        self.muted.as_ref()
    }
}

/// All reference images, loaded once at startup and shared read-only across
/// every poll cycle for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    ads: Vec<ReferenceImage>,
    volume: VolumeRefs,
    ad_records: Vec<ReferenceRecord>,
    volume_records: Vec<ReferenceRecord>,
}

impl ReferenceLibrary {
    /// Scan `images_dir` and load whatever is present.
    pub fn load(images_dir: &Path) -> Result<Self> {
        let mut library = Self::default();

        let ads_dir = images_dir.join(ADS_SUBDIR);
        for path in list_image_files(&ads_dir) {
            match load_reference(&path) {
                Some(reference) => {
                    library.ads.push(reference);
                    library.ad_records.push(ReferenceRecord { path, loaded: true });
                }
                None => library.ad_records.push(ReferenceRecord { path, loaded: false }),
            }
        }
        if library.ads.is_empty() {
            log_debug(&format!(
                "no ad reference images found in '{}'; ads will never be detected",
                ads_dir.display()
            ));
        } else {
            log_debug(&format!(
                "loaded {} ad reference image(s) from '{}'",
                library.ads.len(),
                ads_dir.display()
            ));
        }

        let volume_dir = images_dir.join(VOLUME_SUBDIR);
        let unmuted_path = volume_dir.join(UNMUTED_ICON_FILE);
        let muted_path = volume_dir.join(MUTED_ICON_FILE);
        library.volume.unmuted = load_reference(&unmuted_path);
        library.volume.muted = load_reference(&muted_path);
        library.volume_records = vec![
            ReferenceRecord {
                loaded: library.volume.unmuted.is_some(),
                path: unmuted_path,
            },
            ReferenceRecord {
                loaded: library.volume.muted.is_some(),
                path: muted_path,
            },
        ];
        if library.volume.unmuted.is_none() || library.volume.muted.is_none() {
            log_debug(&format!(
                "volume icon reference(s) missing under '{}'; on-screen mute state will read Unknown",
                volume_dir.display()
            ));
        }

        Ok(library)
    }

    /// Build a library directly from decoded references, bypassing the disk
    /// scan.
    pub fn from_parts(
        ads: Vec<ReferenceImage>,
        unmuted: Option<ReferenceImage>,
        muted: Option<ReferenceImage>,
    ) -> Self {
        Self {
            ads,
            volume: VolumeRefs { unmuted, muted },
            ad_records: Vec::new(),
            volume_records: Vec::new(),
        }
    }

    pub fn ads(&self) -> &[ReferenceImage] {
        &self.ads
    }

    pub fn volume(&self) -> &VolumeRefs {
        &self.volume
    }

    pub fn ad_records(&self) -> &[ReferenceRecord] {
        &self.ad_records
    }

    pub fn volume_records(&self) -> &[ReferenceRecord] {
        &self.volume_records
    }
}

fn list_image_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    IMAGE_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false)
        })
        .collect();
    // Deterministic match order regardless of directory iteration order.
    files.sort();
    files
}

fn load_reference(path: &Path) -> Option<ReferenceImage> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("reference")
        .to_string();
    match image::open(path) {
        Ok(decoded) => Some(ReferenceImage::from_image(name, &decoded.to_rgba8())),
        Err(err) => {
            log_debug(&format!(
                "skipping reference '{}': {err}",
                path.display()
            ));
            None
        }
    }
}
