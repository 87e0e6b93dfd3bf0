// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
//   checkpoint.rs — model/optimizer weights (CompactRecorder),
//                   checkpoint meta and train_config.json
//   metrics.rs    — per-epoch metrics CSV
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
