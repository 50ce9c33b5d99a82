//! gRPC client for the remote vote procedure.

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;
use tracing::trace;

use super::proto::sitevote::v1::{
    vote_service_client::VoteServiceClient, ListApprovedSitesRequest, VoteIfAllowedRequest,
};
use crate::directory::Site;
use crate::error::{Result, SitevoteError};
use crate::ratelimit::{VoteBackend, VoteStatus};

/// Invokes `VoteIfAllowed` on a remote Sitevote server.
#[derive(Debug, Clone)]
pub struct GrpcVoteBackend {
    client: VoteServiceClient<Channel>,
}

impl GrpcVoteBackend {
    /// Create a backend for the server at `url`.
    ///
    /// The connection is opened lazily, so an unreachable server shows up as
    /// a network error on the first call rather than here.
    pub fn new(url: &str) -> Result<Self> {
        let endpoint = Endpoint::from_shared(url.to_string())
            .map_err(|e| SitevoteError::Config(format!("invalid server url {}: {}", url, e)))?;

        Ok(Self {
            client: VoteServiceClient::new(endpoint.connect_lazy()),
        })
    }

    /// Fetch the approved listing from the server.
    pub async fn list_approved_sites(&self) -> Result<Vec<Site>> {
        let mut client = self.client.clone();
        let response = client
            .list_approved_sites(ListApprovedSitesRequest {})
            .await
            .map_err(map_status)?;

        Ok(response.into_inner().sites.into_iter().map(Site::from).collect())
    }
}

#[async_trait]
impl VoteBackend for GrpcVoteBackend {
    async fn vote_if_allowed(
        &self,
        ip_hash: &str,
        item: &str,
        window_minutes: u32,
    ) -> Result<VoteStatus> {
        let mut client = self.client.clone();
        let response = client
            .vote_if_allowed(VoteIfAllowedRequest {
                ip_hash: ip_hash.to_string(),
                item: item.to_string(),
                window_minutes,
            })
            .await
            .map_err(map_status)?
            .into_inner();

        trace!(status = %response.status, votes = response.votes, "Vote procedure answered");

        VoteStatus::from_wire(&response.status, response.votes)
    }
}

/// Split transport failures from refusals by the server.
fn map_status(status: tonic::Status) -> SitevoteError {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled | Code::Unknown => {
            SitevoteError::Network(status.message().to_string())
        }
        _ => SitevoteError::Status(status),
    }
}
