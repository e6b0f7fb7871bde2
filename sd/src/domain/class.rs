//! Request classes derived from niceness

use std::fmt;

/// Niceness at or below which a request counts as a user request
pub const USER_REQUEST_MAX_NICE: i8 = -10;

/// Niceness at or below which a request counts as high priority
pub const HIGH_PRIORITY_MAX_NICE: i8 = 0;

/// Scheduling class of a request
///
/// Only the two urgent classes may be admitted straight into a bucket or
/// displace an occupant. Generic requests always wait for a drain tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    UserRequest,
    HighPriorityRequest,
    GenericRequest,
}

impl RequestClass {
    /// Derive the class from a niceness value
    pub fn from_priority(priority: i8) -> Self {
        if priority <= USER_REQUEST_MAX_NICE {
            Self::UserRequest
        } else if priority <= HIGH_PRIORITY_MAX_NICE {
            Self::HighPriorityRequest
        } else {
            Self::GenericRequest
        }
    }

    /// Whether this class may be admitted into a bucket on arrival
    pub fn is_urgent(&self) -> bool {
        !matches!(self, Self::GenericRequest)
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRequest => write!(f, "user_request"),
            Self::HighPriorityRequest => write!(f, "high_priority_request"),
            Self::GenericRequest => write!(f, "generic_request"),
        }
    }
}
