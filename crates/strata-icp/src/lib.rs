#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod ops;

mod registration;
pub use registration::*;

mod tracker;
pub use tracker::*;
