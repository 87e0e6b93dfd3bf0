// ============================================================
// Layer 4 — Sample Directory Loader
// ============================================================
// Expected layout under the data root:
//
//   data/
//     train/images/0001.png   train/masks/0001.png
//     val/images/...          val/masks/...
//     test/images/...         (masks optional)
//
// Images and masks are paired by file stem, so 0001.jpg pairs
// with 0001.png. An image without a mask is an error in the
// train/val splits and allowed in the test split.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::sample::{SamplePaths, Split};
use crate::domain::traits::SampleSource;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub struct SampleDirLoader {
    root: PathBuf,
}

impl SampleDirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn split_dir(&self, split: Split) -> PathBuf {
        self.root.join(split.dir_name())
    }
}

impl SampleSource for SampleDirLoader {
    fn has_split(&self, split: Split) -> bool {
        self.split_dir(split).join("images").is_dir()
    }

    fn list(&self, split: Split) -> Result<Vec<SamplePaths>> {
        let dir = self.split_dir(split);
        let images = list_images(&dir.join("images"))
            .with_context(|| format!("Cannot list {split} images under '{}'", dir.display()))?;

        let mask_dir = dir.join("masks");
        let masks = if mask_dir.is_dir() {
            list_images(&mask_dir)?
        } else {
            HashMap::new()
        };

        let mut samples = Vec::with_capacity(images.len());
        for (id, image) in images {
            let mask = masks.get(&id).cloned();
            if mask.is_none() && split != Split::Test {
                anyhow::bail!(
                    "{split} image '{}' has no mask in '{}'",
                    image.display(),
                    mask_dir.display()
                );
            }
            samples.push(SamplePaths::new(id, image, mask));
        }
        samples.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!("Found {} {split} samples in '{}'", samples.len(), dir.display());
        Ok(samples)
    }
}

/// Map file stem → path for every image file directly inside `dir`.
fn list_images(dir: &Path) -> Result<HashMap<String, PathBuf>> {
    let mut out = HashMap::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!("Skipping '{}': non UTF-8 file name", path.display());
            continue;
        };
        if let Some(prev) = out.insert(stem.to_string(), path.clone()) {
            anyhow::bail!(
                "Duplicate sample id '{stem}': '{}' and '{}'",
                prev.display(),
                path.display()
            );
        }
    }
    Ok(out)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_pairs_by_stem_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("train/images/b.jpg"));
        touch(&root.join("train/images/a.png"));
        touch(&root.join("train/masks/a.png"));
        touch(&root.join("train/masks/b.png"));
        touch(&root.join("train/images/notes.txt"));

        let loader  = SampleDirLoader::new(root);
        let samples = loader.list(Split::Train).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].id, "a");
        assert_eq!(samples[1].id, "b");
        assert_eq!(samples[1].mask.as_deref(), Some(root.join("train/masks/b.png").as_path()));
    }

    #[test]
    fn test_missing_mask_is_error_outside_test_split() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("train/images/a.png"));
        let loader = SampleDirLoader::new(tmp.path());
        assert!(loader.list(Split::Train).is_err());
    }

    #[test]
    fn test_test_split_allows_unlabelled_images() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("test/images/a.png"));
        let loader  = SampleDirLoader::new(tmp.path());
        let samples = loader.list(Split::Test).unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].mask.is_none());
    }

    #[test]
    fn test_has_split() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("train/images/a.png"));
        let loader = SampleDirLoader::new(tmp.path());
        assert!(loader.has_split(Split::Train));
        assert!(!loader.has_split(Split::Val));
    }
}
