pub mod enums;
pub mod models;
pub mod procedures;

pub use enums::*;
pub use models::*;
pub use procedures::*;
