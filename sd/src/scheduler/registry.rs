//! Registry of in-flight requests
//!
//! The registry is the only owner of [`Request`] values. It keeps a flat
//! arena keyed by [`RequestId`] and an index from endpoint key to the id of
//! the request currently owning that key. Queues, buckets and the dispatch
//! engine refer to requests by id only.

use std::collections::HashMap;
use std::ops::Index;

use tracing::debug;

use crate::domain::{Request, RequestId, RequestStatus};

/// Outcome of [`Registry::try_register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// New endpoint key; the caller must schedule the request
    Accepted,
    /// Key already in flight; the request was attached to `owner`
    Linked { owner: RequestId },
}

/// Requests dropped by [`Registry::remove`]
#[derive(Debug)]
pub struct Removed {
    pub owner: Request,
    /// Linked duplicates, discarded together with their owner
    pub discarded: Vec<Request>,
}

/// Keyed store of in-flight requests
#[derive(Debug, Default)]
pub struct Registry {
    requests: HashMap<RequestId, Request>,
    by_key: HashMap<String, RequestId>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request under its endpoint key, or link it to the owner
    pub fn try_register(&mut self, mut request: Request) -> (RequestId, Registration) {
        let id = RequestId::new(self.next_id);
        self.next_id += 1;

        if let Some(&owner) = self.by_key.get(&request.endpoint_key) {
            debug!(%id, %owner, endpoint_key = %request.endpoint_key, "Registry::try_register: linking duplicate");
            request.status = RequestStatus::Linked;
            self.requests.insert(id, request);
            if let Some(owner_request) = self.requests.get_mut(&owner) {
                owner_request.linked_requests.push(id);
            }
            return (id, Registration::Linked { owner });
        }

        debug!(%id, endpoint_key = %request.endpoint_key, "Registry::try_register: accepted");
        request.status = RequestStatus::Registered;
        self.by_key.insert(request.endpoint_key.clone(), id);
        self.requests.insert(id, request);
        (id, Registration::Accepted)
    }

    /// Find the request currently owning an endpoint key
    pub fn lookup_by_key(&self, key: &str) -> Option<&Request> {
        self.by_key.get(key).and_then(|id| self.requests.get(id))
    }

    pub fn lookup_by_key_mut(&mut self, key: &str) -> Option<&mut Request> {
        let id = *self.by_key.get(key)?;
        self.requests.get_mut(&id)
    }

    /// Id of the request owning an endpoint key
    pub fn id_for_key(&self, key: &str) -> Option<RequestId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(&id)
    }

    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.requests.get_mut(&id)
    }

    /// Remove the owner of `key` together with every linked duplicate
    pub fn remove(&mut self, key: &str) -> Option<Removed> {
        let id = self.by_key.remove(key)?;
        let owner = self.requests.remove(&id)?;
        let discarded: Vec<Request> = owner
            .linked_requests
            .iter()
            .filter_map(|linked| self.requests.remove(linked))
            .collect();
        debug!(%id, endpoint_key = key, discarded = discarded.len(), "Registry::remove: removed");
        Some(Removed { owner, discarded })
    }

    /// Number of distinct endpoint keys in flight
    pub fn count(&self) -> usize {
        self.by_key.len()
    }

    /// Number of requests held, linked duplicates included
    #[cfg(test)]
    pub fn arena_len(&self) -> usize {
        self.requests.len()
    }
}

impl Index<RequestId> for Registry {
    type Output = Request;

    /// Panics if `id` is not registered
    fn index(&self, id: RequestId) -> &Request {
        &self.requests[&id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn request(endpoint: &str, priority: i8) -> Request {
        Request::new(priority, Url::parse(endpoint).unwrap(), 1, 0)
    }

    #[test]
    fn test_register_accepts_new_key() {
        let mut registry = Registry::new();
        let (id, reg) = registry.try_register(request("https://api.example.com/a", 0));
        assert_eq!(reg, Registration::Accepted);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get(id).unwrap().status, RequestStatus::Registered);
        assert_eq!(registry.id_for_key("/a"), Some(id));
    }

    #[test]
    fn test_duplicate_key_is_linked() {
        let mut registry = Registry::new();
        let (owner, _) = registry.try_register(request("https://api.example.com/a?x=1", 0));
        let (dup, reg) = registry.try_register(request("https://other.example.com/a?x=1", -20));

        assert_eq!(reg, Registration::Linked { owner });
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.arena_len(), 2);
        assert_eq!(registry.get(owner).unwrap().linked_requests, vec![dup]);
        assert_eq!(registry.get(dup).unwrap().status, RequestStatus::Linked);
    }

    #[test]
    fn test_different_query_is_distinct_key() {
        let mut registry = Registry::new();
        registry.try_register(request("https://api.example.com/a?x=1", 0));
        let (_, reg) = registry.try_register(request("https://api.example.com/a?x=2", 0));
        assert_eq!(reg, Registration::Accepted);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_ids_follow_arrival_order() {
        let mut registry = Registry::new();
        let (a, _) = registry.try_register(request("https://api.example.com/a", 0));
        let (b, _) = registry.try_register(request("https://api.example.com/b", 0));
        assert!(a < b);
    }

    #[test]
    fn test_remove_discards_linked() {
        let mut registry = Registry::new();
        registry.try_register(request("https://api.example.com/a", 0));
        registry.try_register(request("https://api.example.com/a", 0));
        registry.try_register(request("https://api.example.com/a", 0));

        let removed = registry.remove("/a").unwrap();
        assert_eq!(removed.owner.endpoint_key, "/a");
        assert_eq!(removed.discarded.len(), 2);
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.arena_len(), 0);
        assert!(registry.lookup_by_key("/a").is_none());
    }

    #[test]
    fn test_remove_missing_key() {
        let mut registry = Registry::new();
        assert!(registry.remove("/missing").is_none());
    }

    #[test]
    fn test_key_reusable_after_remove() {
        let mut registry = Registry::new();
        registry.try_register(request("https://api.example.com/a", 0));
        registry.remove("/a");
        let (_, reg) = registry.try_register(request("https://api.example.com/a", 0));
        assert_eq!(reg, Registration::Accepted);
    }

    #[test]
    fn test_lookup_by_key_mut() {
        let mut registry = Registry::new();
        registry.try_register(request("https://api.example.com/a", 0));
        registry.lookup_by_key_mut("/a").unwrap().remaining_retries = 9;
        assert_eq!(registry.lookup_by_key("/a").unwrap().remaining_retries, 9);
    }
}
