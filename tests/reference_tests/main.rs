//! Tests for typed references stored in buffers
//!
//! These tests verify:
//! - The text long array layout survives a reopen of a mapped file
//! - The spin lock serialises writers from several threads

mod text_long_array_tests;
