//! File format implementations.
//!
//! - [`gpu`]: GX register and display list layer
//! - [`gx`]: semantic fixed-function model (materials, vertex topology)
//! - [`g3d`]: MDL0 model container
//! - [`rhst`]: RHST exchange token stream

pub mod g3d;
pub mod gpu;
pub mod gx;
pub mod rhst;
