//! Reconcile accounting invoices and bank transactions against CRM donations
//! that carry the record's reference as their DFK.

pub mod cancel;
pub mod cli;
pub mod db;
pub mod error;
pub mod fmt;
pub mod functions;
pub mod models;
pub mod reconciler;
pub mod registry;
pub mod settings;
pub mod sync;
pub mod template;
pub mod upsert;
