pub mod codec;
pub mod constants;
pub mod errors;
pub mod types;

pub use codec::{decode, decode_with_limit, encode, read_exact, write_all, Frame};
pub use constants::*;
pub use errors::{ErrorKind, FramingError, ValidationError, WriteError};
pub use types::*;
