// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Update Sync Server - Test Utilities
//!
//! Shared catalog fixtures for unit and integration tests.

pub mod fixtures;

pub use fixtures::{sample_digest, CatalogFixture};
