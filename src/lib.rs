//! LLM-driven spam triage for an email inbox.
//!
//! The pipeline fetches batches of unseen messages from a mail bridge,
//! classifies each against a durable spam-domain registry, queues
//! low-confidence messages as candidates, parks ambiguous domains for human
//! review, and reconciles approvals back into mailbox cleanup.

pub mod app;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod mail;
pub mod pipeline;
pub mod store;
