//! Tests for reservation counting and storage regions
//!
//! These tests verify:
//! - N reserves + N releases tear a resource down exactly once
//! - Releases past zero and by unknown owners are rejected
//! - Regions refuse access once released
//! - Concurrent reserve/release converges

mod counter_tests;
mod region_tests;
