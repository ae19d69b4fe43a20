mod data;
mod fs;
mod io;
mod polygon;

pub(crate) use data::*;
pub(crate) use fs::*;
pub use io::*;
pub(crate) use polygon::*;
