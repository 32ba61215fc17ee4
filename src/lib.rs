#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod client;
pub mod decode;
pub mod error;
pub mod request;
pub(crate) mod serde_helpers;
pub mod trace;
pub mod types;
#[cfg(feature = "ws")]
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub use client::{Client, Loading};
pub use request::{RequestSpec, WireRequest};
pub use types::{Method, Parameters};
