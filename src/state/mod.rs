pub mod session;
pub mod table;

pub use session::*;
pub use table::*;
