//! Bounded selection of the peers closest to a target.

use crate::common::{Distance, Id, Peer, MAX_BUCKET_SIZE_K};
use crate::Result;

#[derive(Debug, Clone)]
/// The `capacity` closest peers to a target seen so far, sorted by ascending distance.
///
/// Once full, a new peer is only kept if it is closer than the farthest one,
/// which is then dropped.
pub struct ClosestPeers {
    target: Id,
    capacity: usize,
    peers: Vec<(Peer, Distance)>,
}

impl ClosestPeers {
    pub fn new(target: Id, capacity: usize) -> Self {
        Self {
            target,
            capacity,
            // `capacity` may come from a remote request.
            peers: Vec::with_capacity(capacity.min(MAX_BUCKET_SIZE_K)),
        }
    }

    // === Getters ===

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    // === Public Methods ===

    /// Consider a peer for the selection, fails if its id length doesn't match the target's.
    pub fn add(&mut self, peer: Peer) -> Result<()> {
        let distance = self.target.distance(&peer.id)?;

        if self.capacity == 0 || self.peers.iter().any(|(p, _)| p.id == peer.id) {
            return Ok(());
        }

        if self.peers.len() == self.capacity {
            match self.peers.last() {
                Some((_, farthest)) if distance < *farthest => {
                    self.peers.pop();
                }
                _ => return Ok(()),
            }
        }

        // Insert after any equally distant peer to keep insertion order stable.
        let index = self.peers.partition_point(|(_, d)| *d <= distance);
        self.peers.insert(index, (peer, distance));

        Ok(())
    }

    pub fn into_vec(self) -> Vec<(Peer, Distance)> {
        self.peers
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn peer(byte: u8) -> Peer {
        Peer::new(
            Id::from_bytes([byte]).unwrap(),
            "127.0.0.1:6881".parse().unwrap(),
        )
    }

    #[test]
    fn keeps_closest_sorted() {
        let target = Id::from_bytes([0u8]).unwrap();
        let mut closest = ClosestPeers::new(target, 3);

        for byte in [0b1111u8, 0b1, 0b111, 0b10000000, 0b11] {
            closest.add(peer(byte)).unwrap();
        }

        let ids = closest
            .into_vec()
            .into_iter()
            .map(|(p, _)| p.id.as_bytes()[0])
            .collect::<Vec<_>>();

        assert_eq!(ids, vec![0b1, 0b11, 0b111]);
    }

    #[test]
    fn ignores_duplicates() {
        let target = Id::from_bytes([0u8]).unwrap();
        let mut closest = ClosestPeers::new(target, 3);

        closest.add(peer(1)).unwrap();
        closest.add(peer(1)).unwrap();

        assert_eq!(closest.len(), 1);
    }

    #[test]
    fn length_mismatch() {
        let target = Id::from_bytes([0u8, 0]).unwrap();
        let mut closest = ClosestPeers::new(target, 3);

        assert!(closest.add(peer(1)).is_err());
        assert!(closest.is_empty());
    }

    #[test]
    fn huge_capacity() {
        let target = Id::from_bytes([0u8]).unwrap();
        let mut closest = ClosestPeers::new(target, usize::MAX);

        for byte in 1..=30u8 {
            closest.add(peer(byte)).unwrap();
        }

        assert_eq!(closest.len(), 30);
    }
}
