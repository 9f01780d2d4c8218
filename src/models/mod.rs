pub mod catalog;
pub mod group;
pub mod listing;
pub mod message;

pub use catalog::*;
pub use group::*;
pub use listing::*;
pub use message::*;
