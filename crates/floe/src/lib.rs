mod backend;
mod error;
mod generator;
mod id;
mod layout;
mod pool;
mod response;
mod script;

pub use crate::backend::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::layout::*;
pub use crate::pool::*;
pub use crate::response::*;
pub use crate::script::*;
