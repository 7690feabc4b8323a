mod error;
mod pool;
mod tracker;

pub use crate::error::*;
pub use crate::pool::*;
