// ============================================================
// Layer 5 — Loss Criterion
// ============================================================
// Per-pixel cross-entropy. Burn's CrossEntropyLoss works on
// [N, C] logits, so each pixel becomes one row:
//
//   logits [B, C, H, W] → permute → [B, H, W, C] → [B·H·W, C]
//   masks  [B, H, W]                            → [B·H·W]

use burn::{
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Everything needed to build the criterion on any backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionConfig {
    /// Optional per-class weights, one per class
    pub class_weights: Option<Vec<f32>>,
}

impl CriterionConfig {
    pub fn new(class_weights: Option<Vec<f32>>) -> Self {
        Self { class_weights }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> PixelCrossEntropy<B> {
        let loss = CrossEntropyLossConfig::new()
            .with_weights(self.class_weights.clone())
            .init(device);
        PixelCrossEntropy::new(loss)
    }
}

pub struct PixelCrossEntropy<B: Backend> {
    loss: CrossEntropyLoss<B>,
}

impl<B: Backend> PixelCrossEntropy<B> {
    pub fn new(loss: CrossEntropyLoss<B>) -> Self {
        Self { loss }
    }

    /// Mean loss over every pixel of the batch.
    pub fn forward(&self, logits: Tensor<B, 4>, masks: Tensor<B, 3, Int>) -> Tensor<B, 1> {
        let [batch, classes, height, width] = logits.dims();
        let pixels = batch * height * width;

        let logits = logits.permute([0, 2, 3, 1]).reshape([pixels, classes]);
        let targets = masks.reshape([pixels]);
        self.loss.forward(logits, targets)
    }
}
