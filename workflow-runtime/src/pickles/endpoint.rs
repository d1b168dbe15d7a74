use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use workflow_core::error::RehydrationError;
use workflow_core::pending::{LiveResource, PendingResource};
use workflow_core::placeholder::{
    Placeholder, PlaceholderRecord, PlaceholderState, RehydrationCell,
};

/// Stand-in for a TCP connection, reconnected by `host:port`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointPlaceholder {
    address: String,
    #[serde(skip)]
    cell: RehydrationCell,
}

impl EndpointPlaceholder {
    pub const KIND: &'static str = "tcp-endpoint";

    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            cell: RehydrationCell::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

fn has_port(address: &str) -> bool {
    address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}

impl Placeholder for EndpointPlaceholder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Result<PlaceholderRecord, serde_json::Error> {
        PlaceholderRecord::encode(Self::KIND, self)
    }

    fn begin_rehydrate(&self) -> PendingResource {
        let address = self.address.clone();
        self.cell.begin(|| async move {
            if !has_port(&address) {
                return Err(RehydrationError::Malformed(format!(
                    "endpoint '{}' has no port",
                    address
                )));
            }
            let unreachable = |e: std::io::Error| RehydrationError::Unreachable {
                resource: address.clone(),
                reason: e.to_string(),
            };
            let stream = TcpStream::connect(&address).await.map_err(unreachable)?;
            let peer = stream.peer_addr().map_err(unreachable)?;
            tracing::debug!(address = %address, peer = %peer, "Reconnected endpoint");
            Ok(LiveResource::new(LiveConnection {
                peer,
                stream: Mutex::new(stream),
            }))
        })
    }

    fn state(&self) -> PlaceholderState {
        self.cell.state()
    }
}

/// A re-established connection.
#[derive(Debug)]
pub struct LiveConnection {
    peer: SocketAddr,
    stream: Mutex<TcpStream>,
}

impl LiveConnection {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream(&self) -> &Mutex<TcpStream> {
        &self.stream
    }
}
