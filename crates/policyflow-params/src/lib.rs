//! String parameter protocol at the driver boundary.
//!
//! Drivers configured through `key=value;key=value` strings plug into the policy engine by
//! implementing [`ParameterDriver`] and being wrapped in a [`ParameterClient`].

mod client;
/// Parameter string encoding and decoding.
pub mod codec;

pub use client::{ParameterClient, ParameterDriver};
pub use codec::{decode_parameters, encode, encode_all, Direction, ParseError};
