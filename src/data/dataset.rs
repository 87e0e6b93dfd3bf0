use anyhow::Result;
use burn::data::dataset::Dataset;

use crate::data::preprocessor::Preprocessor;
use crate::domain::sample::SamplePaths;

/// One decoded, resized training item.
/// `image` is CHW, `mask` is HW, both row-major.
#[derive(Debug, Clone)]
pub struct SegItem {
    pub image: Vec<f32>,
    pub mask:  Vec<i32>,
}

pub struct SegDataset {
    items: Vec<SegItem>,
}

impl SegDataset {
    pub fn new(items: Vec<SegItem>) -> Self { Self { items } }

    /// Decode every labelled sample up front.
    pub fn load(samples: &[SamplePaths], preprocessor: &Preprocessor) -> Result<Self> {
        let mut items = Vec::with_capacity(samples.len());
        for s in samples {
            let Some(mask_path) = &s.mask else {
                anyhow::bail!("sample '{}' has no mask and cannot be used for training", s.id);
            };
            items.push(SegItem {
                image: preprocessor.load_image(&s.image)?,
                mask:  preprocessor.load_mask(mask_path)?,
            });
        }
        Ok(Self::new(items))
    }
}

impl Dataset<SegItem> for SegDataset {
    fn get(&self, index: usize) -> Option<SegItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::path::PathBuf;

    #[test]
    fn test_load_decodes_pairs() {
        let tmp   = tempfile::tempdir().unwrap();
        let image = tmp.path().join("a.png");
        let mask  = tmp.path().join("a_mask.png");
        RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])).save(&image).unwrap();
        GrayImage::from_pixel(4, 4, Luma([1])).save(&mask).unwrap();

        let samples = vec![SamplePaths::new("a", image, Some(mask))];
        let ds = SegDataset::load(&samples, &Preprocessor::new(2, 3, 2)).unwrap();

        assert_eq!(ds.len(), 1);
        let item = ds.get(0).unwrap();
        assert_eq!(item.image.len(), 12);
        assert_eq!(item.mask, vec![1, 1, 1, 1]);
        assert!(ds.get(1).is_none());
    }

    #[test]
    fn test_unlabelled_sample_rejected() {
        let samples = vec![SamplePaths::new("a", PathBuf::from("a.png"), None)];
        assert!(SegDataset::load(&samples, &Preprocessor::new(2, 3, 2)).is_err());
    }
}
