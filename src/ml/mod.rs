// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
//   model.rs      — UNet architecture and its building blocks
//   criterion.rs  — per-pixel cross-entropy
//   trainer.rs    — epoch loop, validation, checkpointing
//   inferencer.rs — checkpoint loading and single-image segmentation
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

/// UNet encoder-decoder architecture
pub mod model;

/// Loss criterion over per-pixel class scores
pub mod criterion;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads a checkpoint and segments an image
pub mod inferencer;

/// Backend used for inference and validation (no autodiff).
/// NdArray on the CPU by default; WGPU with `--features wgpu`.
#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;
#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

/// Backend used for training.
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;
