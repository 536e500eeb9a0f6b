//! courier-core
//!
//! Asynchronous delivery pipeline for marketing campaigns: rule lists become
//! audience filters, queued jobs become pending send records, and delivery
//! receipts are reconciled back onto them.
//!
//! # Modules
//! - **domain**: rules, predicates, customers, receipts, log entries, campaigns, errors
//! - **filter**: rule translation and filter document normalization
//! - **ports**: work queue, stores, receipt sink, outcome, clock, id generator
//! - **impls**: in-memory stores and queue, HTTP receipt sink, outcome strategies
//! - **app**: resolver, vendor client, ingress, scheduler, progress, campaigns

pub mod app;
pub mod domain;
pub mod filter;
pub mod impls;
pub mod ports;
