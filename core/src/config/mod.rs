pub mod load;
mod types;

pub use load::load_from;
pub use types::*;
