pub mod controller;
pub mod error;
pub mod lines;
pub mod parser;
pub mod transport;

pub use controller::*;
pub use error::*;
pub use lines::*;
pub use parser::*;
pub use transport::*;
