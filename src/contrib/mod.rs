//! Contribution dataset model and the deterministic synthetic generator.
//!
//! The chart core is agnostic to dataset provenance: a live source and the
//! generator in [`synth`] both produce the same [`model::ContributionDataset`]
//! shape.

/// Dataset types and validation.
pub mod model;
/// Deterministic synthetic dataset generation.
pub mod synth;
