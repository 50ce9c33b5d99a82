//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::sitevote::v1::vote_service_server::VoteServiceServer;
use super::service::VoteServiceImpl;
use crate::error::{Result, SitevoteError};
use crate::ratelimit::VoteLimiter;

/// gRPC server hosting the vote service.
pub struct GrpcServer {
    /// Address to bind to
    addr: SocketAddr,
    limiter: Arc<VoteLimiter>,
}

impl GrpcServer {
    /// Create a new gRPC server.
    pub fn new(addr: SocketAddr, limiter: Arc<VoteLimiter>) -> Self {
        Self { addr, limiter }
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let service = VoteServiceImpl::new(self.limiter);

        info!(addr = %self.addr, "Starting gRPC server for VoteService");

        Server::builder()
            .add_service(VoteServiceServer::new(service))
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                SitevoteError::Grpc(e)
            })
    }

    /// Serve on an already bound listener, ignoring the configured address.
    pub async fn serve_listener_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let service = VoteServiceImpl::new(self.limiter);

        info!(addr = ?listener.local_addr().ok(), "Starting gRPC server for VoteService");

        Server::builder()
            .add_service(VoteServiceServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                SitevoteError::Grpc(e)
            })
    }
}
