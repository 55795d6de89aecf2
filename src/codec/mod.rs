//! Codec module - the TDF tag/type/value format carried in packet payloads.
//!
//! - [`varint`] - signed variable-length integers
//! - [`Tag`] - 4-character member tags packed into 3 bytes
//! - [`Value`] / [`Struct`] - the value model
//! - [`TdfDecoder`] / [`TdfEncoder`] - cursor-based readers and writers
//!
//! # Example
//!
//! ```
//! use blaze_client::codec::{decode_struct, encode_struct, Struct};
//!
//! let body = Struct::new()
//!     .with("GAME", "tunguska").unwrap()
//!     .with("GID", 123456).unwrap();
//!
//! let bytes = encode_struct(&body).unwrap();
//! assert_eq!(decode_struct(&bytes).unwrap(), body);
//! ```

mod decode;
mod encode;
mod tag;
mod value;
pub mod varint;

pub use decode::{decode_struct, decode_value, TdfDecoder, MAX_NESTING_DEPTH};
pub use encode::{encode_struct, encode_value, TdfEncoder};
pub use tag::{Tag, TAG_SIZE};
pub use value::{List, Map, ObjectId, ObjectType, Struct, TdfType, Union, Value, UNION_EMPTY};
