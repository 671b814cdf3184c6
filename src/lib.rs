//! Campaign funding and escrow engine
//!
//! This crate implements the authoritative ledger and state machine behind a
//! crowdfunding service: campaigns with a funding goal and deadline, escrowed
//! contributions from many independent parties, and strict per-contributor
//! accounting through release or refund. The surrounding application (page
//! rendering, wallet connection, media pinning) talks to this engine through
//! the operations on [`node::CrowdfundNode`] and the notifications emitted by
//! [`notifier::EventNotifier`].

pub mod engine;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod models;
pub mod node;
pub mod notifier;
pub mod views;

use error::EngineError;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
