//! GX GPU command-processor layer.
//!
//! Register bit layouts and the display list virtual machine that replays
//! raw command streams.

pub mod display_list;
pub mod registers;

pub use display_list::{
    DisplayListHandler, DisplayListWriter, IndexedLoad, RegisterStateHandler, VertexSetupHandler,
    run_display_list,
};
