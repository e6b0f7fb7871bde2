//! Work items handed from the scheduler to the dispatch engine

use reqwest::Url;

use crate::domain::{Request, RequestId};

/// One admitted request to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchJob {
    pub id: RequestId,
    pub user_id: u32,
    pub endpoint_key: String,
    pub endpoint: Url,
}

impl DispatchJob {
    pub fn new(id: RequestId, request: &Request) -> Self {
        Self {
            id,
            user_id: request.user_id,
            endpoint_key: request.endpoint_key.clone(),
            endpoint: request.endpoint.clone(),
        }
    }
}
