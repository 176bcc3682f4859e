//! Cell type codes and light levels shared by every chunk crate.
#![forbid(unsafe_code)]

pub mod types;

pub use types::{Cell, MAX_LIGHT, MIN_LIGHT};
