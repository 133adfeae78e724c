//! Vigil Core
//!
//! Core types shared by the Vigil browser test worker and its tooling.
//!
//! This crate contains:
//! - Domain types: the validated job record, execution outcomes, script logs
//! - DTOs: wire representations exchanged with the queue and the backend

pub mod domain;
pub mod dto;
