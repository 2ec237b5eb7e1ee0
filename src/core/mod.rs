//! Core value model shared by every layer of the bridge

pub mod value;

pub use value::Value;
