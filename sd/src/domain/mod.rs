//! Domain types for scheduled API requests
//!
//! A [`Request`] is the unit of work submitted over the intake socket. Its
//! [`RequestClass`] is derived from the signed niceness value and decides
//! whether the request may claim a bucket slot on arrival.

mod class;
mod request;

pub use class::RequestClass;
pub use request::{Request, RequestId, RequestStatus, endpoint_key};
