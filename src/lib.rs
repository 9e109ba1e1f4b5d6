//! Purpose: Shared core library crate used by the `semanas` binary and tests.
//! Exports: `core` (PDF reading, value cleaning, table extraction, errors).
//! Role: Internal library backing the binary; not yet a stable public SDK.
//! Invariants: Treat the crate API as internal until a dedicated library release.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
