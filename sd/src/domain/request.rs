//! Request record and identifiers

use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Url;

use super::class::RequestClass;

/// Arena key for a request held by the registry
///
/// Ids are handed out in arrival order, so comparing two ids also tells
/// which request arrived first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Position of a request in its lifecycle
///
/// Terminal outcomes (completed, exhausted) are not represented here: a
/// request reaching one of them is removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Parsed, not yet registered
    Received,
    /// Owns its endpoint key in the registry
    Registered,
    /// Absorbed into an in-flight request with the same endpoint key
    Linked,
    /// Waiting in the owner's priority queue
    Queued,
    /// Holds a bucket slot, dispatch job emitted
    Admitted,
    /// Transfer started by the dispatch engine
    Dispatched,
}

/// A submitted API call
#[derive(Debug, Clone)]
pub struct Request {
    /// Niceness, lower is more urgent
    pub priority: i8,
    pub endpoint: Url,
    /// Path plus query, the de-duplication key
    pub endpoint_key: String,
    pub user_id: u32,
    pub remaining_retries: u8,
    /// Duplicates absorbed while this request was in flight
    pub linked_requests: Vec<RequestId>,
    pub received_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub class: RequestClass,
    pub status: RequestStatus,
}

impl Request {
    /// Create a freshly received request
    pub fn new(priority: i8, endpoint: Url, user_id: u32, max_retries: u8) -> Self {
        let endpoint_key = endpoint_key(&endpoint);
        Self {
            priority,
            endpoint,
            endpoint_key,
            user_id,
            remaining_retries: max_retries,
            linked_requests: Vec::new(),
            received_at: Utc::now(),
            scheduled_at: None,
            class: RequestClass::from_priority(priority),
            status: RequestStatus::Received,
        }
    }

    /// Set the niceness and re-derive the class
    pub fn set_priority(&mut self, priority: i8) {
        self.priority = priority;
        self.class = RequestClass::from_priority(priority);
    }

    /// Consume one retry, returning false once none are left
    pub fn take_retry(&mut self) -> bool {
        match self.remaining_retries.checked_sub(1) {
            Some(remaining) => {
                self.remaining_retries = remaining;
                true
            }
            None => false,
        }
    }
}

/// Canonical de-duplication key: path plus `?query`, without scheme or host
pub fn endpoint_key(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_endpoint_key_ignores_scheme_and_host() {
        let a = endpoint_key(&url("https://API.example.com/v2/user/?selections=basic"));
        let b = endpoint_key(&url("http://api.example.com/v2/user/?selections=basic"));
        assert_eq!(a, "/v2/user/?selections=basic");
        assert_eq!(a, b);
    }

    #[test]
    fn test_endpoint_key_without_query() {
        assert_eq!(endpoint_key(&url("https://api.example.com/v1/thing")), "/v1/thing");
        assert_eq!(endpoint_key(&url("https://api.example.com")), "/");
    }

    #[test]
    fn test_new_request_defaults() {
        let req = Request::new(3, url("https://api.example.com/a?b=1"), 7, 2);
        assert_eq!(req.endpoint_key, "/a?b=1");
        assert_eq!(req.class, RequestClass::GenericRequest);
        assert_eq!(req.status, RequestStatus::Received);
        assert!(req.scheduled_at.is_none());
        assert!(req.linked_requests.is_empty());
    }

    #[test]
    fn test_set_priority_rederives_class() {
        let mut req = Request::new(1, url("https://api.example.com/a"), 1, 0);
        req.set_priority(0);
        assert_eq!(req.class, RequestClass::HighPriorityRequest);
        req.set_priority(-10);
        assert_eq!(req.class, RequestClass::UserRequest);
    }

    #[test]
    fn test_take_retry_never_underflows() {
        let mut req = Request::new(0, url("https://api.example.com/a"), 1, 1);
        assert!(req.take_retry());
        assert_eq!(req.remaining_retries, 0);
        assert!(!req.take_retry());
        assert_eq!(req.remaining_retries, 0);
    }

    #[test]
    fn test_request_id_orders_by_arrival() {
        assert!(RequestId::new(1) < RequestId::new(2));
        assert_eq!(RequestId::new(42).to_string(), "req-42");
    }
}
