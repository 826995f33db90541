/// PLY point-set records, binary little endian.
pub mod ply;
