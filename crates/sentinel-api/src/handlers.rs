//! Request handlers.

pub mod control;
pub mod health;
pub mod protection;
pub mod status;

pub use control::*;
pub use health::*;
pub use protection::*;
pub use status::*;
