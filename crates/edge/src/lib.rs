pub mod cli;
pub mod fs;
pub mod settings;

mod error;

pub use error::EdgeError;
