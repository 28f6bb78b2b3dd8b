//! Core types for hearth.

mod engagement;
mod entry;
mod persona;
mod response;
mod user;

pub use engagement::*;
pub use entry::*;
pub use persona::*;
pub use response::*;
pub use user::*;
