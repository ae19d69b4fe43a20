mod decode;
mod index;
mod source;

pub use decode::*;
pub use index::*;
pub use source::*;
