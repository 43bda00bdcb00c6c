pub mod cli;
pub mod error;

pub use cli::{parse_args, Args, Command, ColorMode, Config};
pub use error::{CheckpointError, CheckpointResult};
