pub mod compliance;
pub mod event;

pub use compliance::*;
pub use event::*;
