//! Candidate peers shared by the workers of a single lookup.

use std::sync::{Mutex, PoisonError};

use crate::common::{Distance, Id, Peer};

#[derive(Debug, Clone, PartialEq)]
/// A peer considered during a lookup, and its distance to the lookup key.
pub struct SearchCandidate {
    pub peer: Peer,
    pub distance: Distance,
    /// Whether a worker already picked this candidate to query.
    pub searched: bool,
}

impl SearchCandidate {
    pub fn new(peer: Peer, distance: Distance) -> Self {
        SearchCandidate {
            peer,
            distance,
            searched: false,
        }
    }
}

#[derive(Debug)]
/// Mutex guarded candidates of one lookup.
///
/// - An unbounded session keeps every distinct peer it is given, used to find a value.
/// - A bounded session keeps at most `capacity` peers, and only accepts a new peer
///   in place of a farther one once full, used to find the peers to store a value at.
///
/// Neither holds two candidates with the same id.
pub struct LookupSession {
    capacity: Option<usize>,
    candidates: Mutex<Vec<SearchCandidate>>,
}

impl LookupSession {
    /// Create an unbounded session.
    pub fn unbounded() -> Self {
        LookupSession {
            capacity: None,
            candidates: Mutex::new(Vec::new()),
        }
    }

    /// Create a session holding at most `capacity` candidates.
    pub fn bounded(capacity: usize) -> Self {
        LookupSession {
            capacity: Some(capacity),
            candidates: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    // === Getters ===

    pub fn is_bounded(&self) -> bool {
        self.capacity.is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// A snapshot of the current candidates.
    pub fn candidates(&self) -> Vec<SearchCandidate> {
        self.lock().clone()
    }

    /// The peers of the current candidates.
    pub fn peers(&self) -> Vec<Peer> {
        self.lock().iter().map(|c| c.peer.clone()).collect()
    }

    // === Public Methods ===

    /// Append a candidate to an unbounded session, unless its peer is already present.
    ///
    /// Returns `true` if it was added.
    pub fn add(&self, candidate: SearchCandidate) -> bool {
        let mut candidates = self.lock();

        if already_added(&candidates, &candidate.peer) {
            return false;
        }

        candidates.push(candidate);
        true
    }

    /// Offer candidates to a bounded session, all under the same lock.
    ///
    /// Each new candidate fills a free slot if there is one, otherwise it
    /// replaces the farthest candidate if it is strictly closer than it.
    /// Candidates whose peer is already present are skipped.
    ///
    /// Returns how many slots were filled or replaced.
    pub fn add_if_closer(&self, new_candidates: Vec<SearchCandidate>) -> usize {
        let capacity = self.capacity.unwrap_or(usize::MAX);
        let mut candidates = self.lock();
        let mut changed = 0;

        for candidate in new_candidates {
            if already_added(&candidates, &candidate.peer) {
                continue;
            }

            if candidates.len() < capacity {
                candidates.push(candidate);
                changed += 1;
                continue;
            }

            let farthest = candidates
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.distance.cmp(&b.distance))
                .map(|(index, c)| (index, c.distance.clone()));

            if let Some((index, distance)) = farthest {
                if candidate.distance < distance {
                    candidates[index] = candidate;
                    changed += 1;
                }
            }
        }

        changed
    }

    /// Add candidates according to the kind of session, returning how many changed it.
    pub fn merge(&self, new_candidates: Vec<SearchCandidate>) -> usize {
        if self.is_bounded() {
            return self.add_if_closer(new_candidates);
        }

        new_candidates
            .into_iter()
            .filter(|candidate| self.add(candidate.clone()))
            .count()
    }

    /// Pick the closest candidate nobody searched yet, marking it searched.
    ///
    /// Returns None once every candidate was searched.
    pub fn next_unsearched(&self) -> Option<SearchCandidate> {
        let mut candidates = self.lock();

        let closest = candidates
            .iter_mut()
            .filter(|c| !c.searched)
            .min_by(|a, b| a.distance.cmp(&b.distance))?;

        closest.searched = true;

        Some(closest.clone())
    }

    /// Mark the candidate with this id as searched, if present.
    pub fn mark_searched(&self, id: &Id) {
        if let Some(candidate) = self.lock().iter_mut().find(|c| &c.peer.id == id) {
            candidate.searched = true;
        }
    }

    // === Private Methods ===

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SearchCandidate>> {
        self.candidates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn already_added(candidates: &[SearchCandidate], peer: &Peer) -> bool {
    candidates.iter().any(|c| c.peer.id == peer.id)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn candidate(byte: u8) -> SearchCandidate {
        let id = Id::from_bytes([byte]).unwrap();
        let key = Id::from_bytes([0u8]).unwrap();

        SearchCandidate::new(
            Peer::new(id.clone(), "127.0.0.1:6881".parse().unwrap()),
            id.distance(&key).unwrap(),
        )
    }

    fn ids(session: &LookupSession) -> Vec<u8> {
        let mut ids = session
            .peers()
            .iter()
            .map(|p| p.id.as_bytes()[0])
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn unbounded_dedup() {
        let session = LookupSession::unbounded();
        assert!(session.is_empty());

        assert!(session.add(candidate(1)));
        assert!(session.add(candidate(3)));
        assert!(!session.add(candidate(1)));

        assert_eq!(session.len(), 2);
        assert_eq!(session.merge(vec![candidate(3), candidate(7)]), 1);
        assert_eq!(ids(&session), vec![1, 3, 7]);
    }

    #[test]
    fn bounded_fills_then_replaces() {
        let session = LookupSession::bounded(2);

        assert_eq!(session.add_if_closer(vec![candidate(15), candidate(7)]), 2);
        // Farther than both
        assert_eq!(session.add_if_closer(vec![candidate(31)]), 0);
        // Duplicates are skipped
        assert_eq!(session.add_if_closer(vec![candidate(7)]), 0);
        // Replaces the farthest
        assert_eq!(session.add_if_closer(vec![candidate(3)]), 1);
        assert_eq!(ids(&session), vec![3, 7]);

        assert_eq!(session.add_if_closer(vec![candidate(1), candidate(0b10)]), 2);
        assert_eq!(ids(&session), vec![1, 2]);
    }

    #[test]
    fn bounded_duplicate_of_any_slot() {
        let session = LookupSession::bounded(2);

        session.add_if_closer(vec![candidate(7), candidate(1)]);

        // Closer than 7, but already present.
        assert_eq!(session.add_if_closer(vec![candidate(1)]), 0);
        assert_eq!(ids(&session), vec![1, 7]);
    }

    #[test]
    fn next_unsearched_is_closest() {
        let session = LookupSession::unbounded();

        session.merge(vec![candidate(7), candidate(1), candidate(3)]);

        let order = std::iter::from_fn(|| session.next_unsearched())
            .map(|c| c.peer.id.as_bytes()[0])
            .collect::<Vec<_>>();

        assert_eq!(order, vec![1, 3, 7]);
        assert!(session.next_unsearched().is_none());
        assert!(session.candidates().iter().all(|c| c.searched));
    }

    #[test]
    fn mark_searched() {
        let session = LookupSession::unbounded();

        session.merge(vec![candidate(1), candidate(3)]);
        session.mark_searched(&Id::from_bytes([1u8]).unwrap());

        assert_eq!(session.next_unsearched().map(|c| c.peer.id.as_bytes()[0]), Some(3));
        assert!(session.next_unsearched().is_none());
    }

    #[test]
    fn concurrent_workers_never_pick_the_same_candidate() {
        let session = Arc::new(LookupSession::unbounded());
        session.merge((1..=200).map(candidate).collect());

        let handles = (0..8)
            .map(|_| {
                let session = session.clone();
                thread::spawn(move || {
                    std::iter::from_fn(|| session.next_unsearched())
                        .map(|c| c.peer.id.as_bytes()[0])
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let mut picked = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        picked.sort_unstable();

        assert_eq!(picked, (1..=200).collect::<Vec<u8>>());
    }
}
