#![doc = include_str!("../README.md")]

pub mod bin;
pub mod codec;
pub mod hash;
pub mod json;
pub mod map;
pub mod prelude;
pub mod sync;
pub mod tree;
pub mod variant;
