#![allow(
    dead_code,
    reason = "Each integration test binary uses a different subset of these helpers"
)]

use std::net::{SocketAddr, TcpListener};

use serde::{Deserialize, Serialize};

/// Response shape used across the HTTP tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
}

impl Item {
    #[must_use]
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
        }
    }
}

/// An address nothing is listening on.
///
/// # Panics
///
/// Panics if no local port can be bound.
#[must_use]
pub fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}
