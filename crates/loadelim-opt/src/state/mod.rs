mod base;
mod elements;
mod fields;

pub use base::*;
pub use elements::*;
pub use fields::*;
