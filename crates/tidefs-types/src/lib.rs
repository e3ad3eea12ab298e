#[macro_use]
pub mod id_type;

pub mod ids;
pub mod time;

pub use ids::*;
pub use time::unix_seconds;
