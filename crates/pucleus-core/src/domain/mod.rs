pub mod errors;

pub use errors::{PucleusError, PucleusErrorCategory, PucleusResult};
