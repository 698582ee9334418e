//! # banter-shared
//!
//! Domain types and pure helpers shared by every Banter crate: workspace /
//! channel / message models, input validation mirroring the public API
//! contract, rich-text rendering, and avatar derivation.

pub mod avatar;
pub mod richtext;
pub mod types;
pub mod validate;

mod error;

pub use error::SharedError;
pub use types::*;
