//! Simplified Kademlia routing table

use std::fmt::Debug;
use std::sync::{PoisonError, RwLock};

use crate::common::{ClosestPeers, Distance, Id, Peer};
use crate::{Error, Result};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;

/// Peers known to a node, and the distance metric over them.
///
/// Implementations are shared between every lookup running on a node,
/// so they synchronize internally.
pub trait PeerStore: Debug + Send + Sync {
    /// The [Id] of the local node, where distances are measured from.
    fn local_id(&self) -> &Id;

    /// Add a peer, a no-op if it is already known or is the local node itself.
    ///
    /// Fails with [Error::NoSpace] if the peer is new and its bucket is full,
    /// and with [Error::LengthMismatch] if its id length differs from the local id.
    fn add_peer(&self, peer: Peer) -> Result<()>;

    /// Remove a peer, a no-op if it isn't known.
    fn remove_peer(&self, peer: &Peer) -> Result<()>;

    /// All the known peers, in no particular order.
    fn peers(&self) -> Vec<Peer>;

    /// The `k` known peers closest to `key` with their distances, sorted ascending.
    fn closest_peers(&self, key: &Id, k: usize) -> Result<Vec<(Peer, Distance)>>;

    /// XOR distance between two ids.
    fn distance(&self, a: &Id, b: &Id) -> Result<Distance> {
        a.distance(b)
    }
}

#[derive(Debug)]
/// Simplified Kademlia routing table
///
/// Holds `8 * id.len()` [KBucket]s, where bucket `i` holds the peers sharing
/// exactly `i` leading bits with the local id. Full buckets reject new peers.
pub struct RoutingTable {
    id: Id,
    k: usize,
    buckets: RwLock<Vec<KBucket>>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given id and [MAX_BUCKET_SIZE_K] sized buckets.
    pub fn new(id: Id) -> Self {
        Self::with_bucket_size(id, MAX_BUCKET_SIZE_K)
    }

    /// Create a new [RoutingTable] with a given id and `k` sized buckets.
    pub fn with_bucket_size(id: Id, k: usize) -> Self {
        let buckets = (0..id.len() * 8).map(|_| KBucket::new(k)).collect();

        RoutingTable {
            id,
            k,
            buckets: RwLock::new(buckets),
        }
    }

    // === Getters ===

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Maximum number of peers per bucket.
    pub fn bucket_size(&self) -> usize {
        self.k
    }

    /// Returns a copy of the peers in the bucket at `index`, in insertion order.
    pub fn bucket(&self, index: usize) -> Vec<Peer> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .map(|bucket| bucket.peers.clone())
            .unwrap_or_default()
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .all(|bucket| bucket.is_empty())
    }

    /// Return the number of peers in this routing table.
    pub fn size(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .fold(0, |acc, bucket| acc + bucket.len())
    }

    /// Returns `true` if a peer with this id is in the routing table.
    pub fn contains(&self, id: &Id) -> bool {
        match self.bucket_index(id) {
            Ok(Some(index)) => self
                .buckets
                .read()
                .unwrap_or_else(PoisonError::into_inner)[index]
                .contains(id),
            _ => false,
        }
    }

    // === Private Methods ===

    /// Index of the bucket `id` belongs to, or None for the local id.
    fn bucket_index(&self, id: &Id) -> Result<Option<usize>> {
        let index = self.id.common_prefix_len(id)?;

        if index == self.id.len() * 8 {
            return Ok(None);
        }

        Ok(Some(index))
    }
}

impl PeerStore for RoutingTable {
    fn local_id(&self) -> &Id {
        &self.id
    }

    fn add_peer(&self, peer: Peer) -> Result<()> {
        let index = match self.bucket_index(&peer.id)? {
            Some(index) => index,
            // Do not add self to the routing_table
            None => return Ok(()),
        };

        self.buckets.write().unwrap_or_else(PoisonError::into_inner)[index].add(peer)
    }

    fn remove_peer(&self, peer: &Peer) -> Result<()> {
        if let Some(index) = self.bucket_index(&peer.id)? {
            self.buckets
                .write()
                .unwrap_or_else(PoisonError::into_inner)[index]
                .remove(&peer.id);
        }

        Ok(())
    }

    fn peers(&self) -> Vec<Peer> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flat_map(|bucket| bucket.peers.iter().cloned())
            .collect()
    }

    fn closest_peers(&self, key: &Id, k: usize) -> Result<Vec<(Peer, Distance)>> {
        if key.len() != self.id.len() {
            return Err(Error::LengthMismatch {
                expected: self.id.len(),
                actual: key.len(),
            });
        }

        let mut closest = ClosestPeers::new(key.clone(), k);

        for bucket in self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            for peer in &bucket.peers {
                closest.add(peer.clone())?;
            }
        }

        Ok(closest.into_vec())
    }
}

/// A fixed capacity list of peers at the same prefix length from the local id.
#[derive(Debug, Clone)]
pub struct KBucket {
    capacity: usize,
    /// Peers in the k-bucket, in the order they were added.
    peers: Vec<Peer>,
}

impl KBucket {
    pub fn new(capacity: usize) -> Self {
        KBucket {
            capacity,
            peers: Vec::new(),
        }
    }

    // === Public Methods ===

    /// Add a peer, a no-op if it is already present.
    pub fn add(&mut self, incoming: Peer) -> Result<()> {
        if self.contains(&incoming.id) {
            return Ok(());
        }

        if self.peers.len() >= self.capacity {
            return Err(Error::NoSpace);
        }

        self.peers.push(incoming);

        Ok(())
    }

    /// Remove a peer, shifting the ones after it to keep their relative order.
    pub fn remove(&mut self, id: &Id) {
        if let Some(index) = self.peers.iter().position(|peer| &peer.id == id) {
            self.peers.remove(index);
        }
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.peers.iter().any(|peer| &peer.id == id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
