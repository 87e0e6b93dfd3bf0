// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from image files on disk to tensor batches.
//
//   <data_dir>/<split>/{images,masks}
//       │
//       ▼
//   SampleDirLoader   → pairs images with masks by file stem
//       │
//       ▼
//   Preprocessor      → decode, resize, CHW f32 / class indices
//       │
//       ▼
//   SegDataset        → implements Burn's Dataset trait
//       │
//       ▼
//   SegBatcher        → stacks items into [B, C, H, W] / [B, H, W]
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Lists image/mask pairs from a split directory
pub mod loader;

/// Decodes and resizes images and masks
pub mod preprocessor;

/// Implements Burn's Dataset trait for segmentation items
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
