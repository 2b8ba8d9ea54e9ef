//! Wire protocols spoken on the HAP control connection

#![allow(missing_docs)]

pub mod crypto;
pub mod http;
pub mod pairing;
