//! Vote service implementation.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument, warn};

use super::proto::sitevote::v1::{
    vote_service_server::VoteService, ListApprovedSitesRequest, ListApprovedSitesResponse,
    VoteIfAllowedRequest, VoteIfAllowedResponse,
};
use crate::ratelimit::{VoteLimiter, VoteStatus};

/// Implementation of the `sitevote.v1.VoteService` gRPC interface.
pub struct VoteServiceImpl {
    limiter: Arc<VoteLimiter>,
}

impl VoteServiceImpl {
    /// Create a new VoteServiceImpl over the given limiter.
    pub fn new(limiter: Arc<VoteLimiter>) -> Self {
        Self { limiter }
    }
}

#[tonic::async_trait]
impl VoteService for VoteServiceImpl {
    /// Run the atomic check-and-increment for one vote.
    #[instrument(
        skip(self, request),
        fields(
            item = %request.get_ref().item,
            window_minutes = request.get_ref().window_minutes
        )
    )]
    async fn vote_if_allowed(
        &self,
        request: Request<VoteIfAllowedRequest>,
    ) -> Result<Response<VoteIfAllowedResponse>, Status> {
        let req = request.into_inner();

        if req.item.is_empty() {
            warn!("Received vote with empty item");
            return Err(Status::invalid_argument("item is required"));
        }

        if req.ip_hash.is_empty() {
            warn!("Received vote with empty ip_hash");
            return Err(Status::invalid_argument("ip_hash is required"));
        }

        let status = self
            .limiter
            .vote_if_allowed(&req.ip_hash, &req.item, req.window_minutes)
            .map_err(|e| {
                debug!(error = %e, "Vote refused");
                Status::from(e)
            })?;

        info!(item = %req.item, status = status.as_str(), "Vote decision made");

        let votes = match status {
            VoteStatus::Ok { votes } => votes,
            VoteStatus::RateLimited => 0,
        };

        Ok(Response::new(VoteIfAllowedResponse {
            status: status.as_str().to_string(),
            votes,
        }))
    }

    async fn list_approved_sites(
        &self,
        _request: Request<ListApprovedSitesRequest>,
    ) -> Result<Response<ListApprovedSitesResponse>, Status> {
        let sites = self
            .limiter
            .directory()
            .list_approved()
            .iter()
            .map(Into::into)
            .collect();

        Ok(Response::new(ListApprovedSitesResponse { sites }))
    }
}
