//! # braid-core
//!
//! Foundation types, errors, branded IDs, and utilities for the Braid
//! context engine.
//!
//! This crate provides the shared vocabulary that the other Braid crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::MessageId`], [`ids::EvidenceId`],
//!   [`ids::TruncationId`], [`ids::SnapshotId`], [`ids::CheckpointId`]
//!   as newtypes for type safety
//! - **Messages**: [`messages::ContextMessage`] — the conversation unit
//!   tracked, truncated, and checkpointed by the engine
//! - **Signals**: [`signal::Signal`] — typed, confidence-scored search
//!   keys extracted from user/error/diff input
//! - **Evidence**: [`evidence::Evidence`] — scored, located candidate
//!   snippets considered for prompt inclusion
//! - **Errors**: [`errors::ContextError`] hierarchy via `thiserror`
//! - **Token estimation**: [`tokens::estimate_tokens`] (chars/4)
//! - **Path patterns**: [`patterns::PatternSet`] compiled glob matching
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `braid-settings` and `braid-context`.

#![deny(unsafe_code)]

pub mod errors;
pub mod evidence;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod patterns;
pub mod signal;
pub mod tokens;
