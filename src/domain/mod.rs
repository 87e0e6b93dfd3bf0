// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that describe the
// segmentation problem. No Burn types and no file I/O here.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// An image paired with its (optional) label mask on disk
pub mod sample;

// Checkpoint identity and bookkeeping
pub mod checkpoint;

// Core abstractions other layers implement
pub mod traits;
