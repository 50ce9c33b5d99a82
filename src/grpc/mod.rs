//! gRPC surface of the vote procedure.

mod client;
mod server;
mod service;

pub use client::GrpcVoteBackend;
pub use server::GrpcServer;
pub use service::VoteServiceImpl;

use chrono::DateTime;

use crate::directory::Site;

// Include the generated protobuf code
pub mod proto {
    pub mod sitevote {
        pub mod v1 {
            tonic::include_proto!("sitevote.v1");
        }
    }
}

// Re-export commonly used types
pub use proto::sitevote::v1::{
    vote_service_client::VoteServiceClient, vote_service_server::VoteServiceServer,
    ListApprovedSitesRequest, ListApprovedSitesResponse, VoteIfAllowedRequest,
    VoteIfAllowedResponse,
};

impl From<&Site> for proto::sitevote::v1::Site {
    fn from(site: &Site) -> Self {
        Self {
            id: site.id.clone(),
            name: site.name.clone(),
            url: site.url.clone(),
            description: site.description.clone(),
            image: site.image.clone(),
            votes: site.votes,
            created_at: Some(prost_types::Timestamp {
                seconds: site.created_at.timestamp(),
                nanos: site.created_at.timestamp_subsec_nanos() as i32,
            }),
        }
    }
}

impl From<proto::sitevote::v1::Site> for Site {
    fn from(msg: proto::sitevote::v1::Site) -> Self {
        let created_at = msg
            .created_at
            .and_then(|ts| DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32))
            .unwrap_or_default();

        Site {
            id: msg.id,
            name: msg.name,
            url: msg.url,
            description: msg.description,
            image: msg.image,
            // Only approved sites travel over the listing call.
            approved: true,
            votes: msg.votes,
            created_at,
        }
    }
}
