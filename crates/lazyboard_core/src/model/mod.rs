//! Board-facing domain model.
//!
//! # Responsibility
//! - Define the note projection the board classifies.
//! - Define the mutation instructions the board emits for the store.
//!
//! # Invariants
//! - Records are never owned by a board; they are transient inputs/outputs.

pub mod mutation;
pub mod note;
