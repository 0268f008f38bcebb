//! # zipact-error
//!
//! One error type for every crate in the harness: an [`ErrorKind`] to match
//! on, a message, the operation that raised it, key/value context and the
//! wrapped source.
//!
//! ```rust
//! use zipact_error::{Error, ErrorKind};
//!
//! fn open(name: &str) -> Result<(), Error> {
//!     Err(Error::unknown_environment(name).with_operation("env::open"))
//! }
//!
//! let err = open("moon").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::UnknownEnvironment);
//! assert_eq!(err.to_string(), "UnknownEnvironment at env::open { env: moon }: unknown environment 'moon'");
//! ```

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

pub type Result<T> = std::result::Result<T, Error>;
