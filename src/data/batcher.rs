// ============================================================
// Layer 4 — Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait to stack SegItems into
// tensors:
//
//   images: Vec of N × [C·H·W] f32  → [N, C, H, W]
//   masks:  Vec of N × [H·W]   i32  → [N, H, W]  (Int)
//
// All items were resized to the same side length by the
// Preprocessor, so flattening and reshaping is enough.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::SegItem;

/// A batch ready for the forward pass.
#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    /// Normalised pixels — shape: [batch, channels, height, width]
    pub images: Tensor<B, 4>,

    /// Class index per pixel — shape: [batch, height, width]
    pub masks: Tensor<B, 3, Int>,
}

#[derive(Clone, Debug)]
pub struct SegBatcher {
    channels: usize,
    side:     usize,
}

impl SegBatcher {
    pub fn new(channels: usize, side: usize) -> Self {
        Self { channels, side }
    }
}

impl<B: Backend> Batcher<B, SegItem, SegBatch<B>> for SegBatcher {
    fn batch(&self, items: Vec<SegItem>, device: &B::Device) -> SegBatch<B> {
        let batch_size = items.len();

        let image_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.image.iter().copied())
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.mask.iter().copied())
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(image_flat, [batch_size, self.channels, self.side, self.side]),
            device,
        );

        let masks = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), device)
            .reshape([batch_size, self.side, self.side]);

        SegBatch { images, masks }
    }
}
