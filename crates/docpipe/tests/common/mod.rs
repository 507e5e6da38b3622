//! Shared test utilities for docpipe integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temp storage root and database
//! - `pdf_with_pages` for building small PDFs in memory

pub mod harness;
pub mod pdf;

pub use harness::TestHarness;
pub use pdf::pdf_with_pages;
