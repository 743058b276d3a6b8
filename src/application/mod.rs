//! Application layer containing the business logic orchestration.
//!
//! [`engine::FinanceEngine`] is the primary entry point for operator actions.
//! Inbound events flow through [`consumer::ConsumerPool`] into
//! [`ingestion::EventIngestor`]; outbound events leave through
//! [`publisher::OutboundPublisher`].

pub mod catalog;
pub mod consumer;
pub mod engine;
pub mod ingestion;
pub mod ledger;
pub mod payments;
pub mod publisher;
pub mod scheduler;
pub mod seed;
