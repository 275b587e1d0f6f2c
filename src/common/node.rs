//! Struct and implementation of the Peer entry in the Kademlia routing table
use std::{
    fmt::{self, Display, Formatter},
    net::SocketAddr,
};

use crate::common::Id;

#[derive(Debug, Clone)]
/// Peer entry in the Kademlia routing table.
///
/// Two peers are equal if they have the same [Id], regardless of their address.
pub struct Peer {
    pub id: Id,
    pub address: SocketAddr,
}

impl Peer {
    /// Creates a new Peer from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> Peer {
        Peer { id, address }
    }

    /// Returns a random peer with the given address, useful for tests.
    pub fn random(address: SocketAddr) -> Peer {
        Peer {
            id: Id::random(),
            address,
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Peer {}

impl Display for Peer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equality_ignores_address() {
        let id = Id::random();

        let a = Peer::new(id.clone(), "127.0.0.1:6881".parse().unwrap());
        let b = Peer::new(id, "10.0.0.1:1234".parse().unwrap());

        assert_eq!(a, b);
        assert_ne!(a, Peer::random("127.0.0.1:6881".parse().unwrap()));
    }
}
