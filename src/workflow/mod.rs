//! Approval workflow: the closed state model, the transition guard, status
//! presentation and list filtering, independent of HTTP and storage.

pub mod error;
pub mod filter;
pub mod presenter;
pub mod principal;
pub mod service;
pub mod transition;
