#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// I/O utilities for reading and writing point-set records.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Robust plane-model fitting.
pub mod plane;

/// Point cloud container.
pub mod pointcloud;

/// Rigid 3D transforms.
pub mod transforms;
