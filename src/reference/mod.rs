//! Typed references into a buffer
//!
//! A reference is a small handle naming a fixed layout at an offset; it
//! reads and writes through whichever buffer holds that layout.

mod text_long_array;

pub use text_long_array::TextLongArray;
