// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no model math, no printing of
// results, no direct tensor code. Each use case tells the data,
// ml and infra layers what to do in which order.

// The training workflow (train + periodic validation)
pub mod train_use_case;

// Single-image segmentation with a trained checkpoint
pub mod test_use_case;
