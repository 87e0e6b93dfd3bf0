// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer asks for samples through SampleSource
// and never learns where they come from.

use anyhow::Result;

use crate::domain::sample::{SamplePaths, Split};

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can enumerate the samples of a dataset split.
///
/// Implementations:
///   - SampleDirLoader → images/ + masks/ directories on disk
pub trait SampleSource {
    /// Whether the source has anything for this split at all.
    fn has_split(&self, split: Split) -> bool;

    /// List every sample of the split, sorted by id.
    fn list(&self, split: Split) -> Result<Vec<SamplePaths>>;
}
