//! Companies domain module.
//!
//! This crate contains the company record and the shapes used to write and
//! query it, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod company;

pub use company::{Company, CompanyDraft, CompanyField, CompanyFilter};
