//! Tagged generic values for the tidewire format.
//!
//! Everything a row cell or a settings entry can hold travels through one
//! closed tag table, so a reader that does not know the column type can still
//! decode, skip or forward the value.

pub mod value;

pub use value::Value;

#[cfg(test)]
mod proptest_tests;
