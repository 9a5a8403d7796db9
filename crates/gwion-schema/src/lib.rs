//! Schema description and codec layer for gwion.
//!
//! Every value that crosses the model boundary — tool inputs and outputs,
//! thought fields, the result envelope — is described by an explicit
//! [`Schema`] and moved through the serde-backed [`codec`] functions.

pub mod codec;
pub mod schema;

pub use codec::{CodecError, Result, Schematic, decode, decode_value, encode, encode_pretty};
pub use schema::{ArraySchema, NumberSchema, ObjectSchema, Schema, StringSchema, UnionSchema};
