//! HTTP client for the Vault system API.
//!
//! Maps each [`NodeClient`] operation onto the corresponding `sys/` endpoint:
//!
//! | Operation              | Request                               |
//! |------------------------|---------------------------------------|
//! | `seal_status`          | `GET  /v1/sys/seal-status`            |
//! | `initialize`           | `PUT  /v1/sys/init`                   |
//! | `submit_unseal_shares` | `PUT  /v1/sys/unseal` (once per share) |
//! | `join_raft_cluster`    | `POST /v1/sys/storage/raft/join`      |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use sealwatch_types::{KeyMaterial, NodeClientConfig, NodeStatus};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::{ConfigSnafu, NodeError, Result},
    node::NodeClient,
};

#[derive(Serialize)]
struct InitRequest {
    secret_shares: u8,
    secret_threshold: u8,
}

#[derive(Serialize)]
struct UnsealRequest<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct JoinRequest<'a> {
    leader_api_addr: &'a str,
}

#[derive(Deserialize)]
struct JoinResponse {
    #[serde(default)]
    joined: bool,
}

/// Vault error response body.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Builds the HTTP client shared by every [`VaultClient`] in a registry.
///
/// # Errors
///
/// Returns [`NodeError::Config`] if the CA bundle cannot be read or parsed,
/// or the client cannot be constructed.
pub fn build_http_client(config: &NodeClientConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .danger_accept_invalid_certs(config.tls_skip_verify);

    if let Some(path) = &config.ca_cert {
        let pem = std::fs::read(path).map_err(|e| {
            ConfigSnafu { message: format!("failed to read CA bundle {}: {e}", path.display()) }
                .build()
        })?;
        let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
            ConfigSnafu { message: format!("invalid CA bundle {}: {e}", path.display()) }.build()
        })?;
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder.build().map_err(|e| ConfigSnafu { message: format!("http client: {e}") }.build())
}

/// [`NodeClient`] backed by a node's Vault HTTP API.
#[derive(Debug, Clone)]
pub struct VaultClient {
    addr: String,
    http: Client,
}

impl VaultClient {
    /// Creates a client for `addr` with its own HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Config`] if the HTTP client cannot be built.
    pub fn new(addr: impl Into<String>, config: &NodeClientConfig) -> Result<Self> {
        Ok(Self::with_http(addr, build_http_client(config)?))
    }

    /// Creates a client for `addr` reusing an existing HTTP client.
    pub fn with_http(addr: impl Into<String>, http: Client) -> Self {
        Self { addr: addr.into(), http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/sys/{}", self.addr.trim_end_matches('/'), path)
    }

    /// Sends a request and turns non-success statuses into [`NodeError::Api`].
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| NodeError::from_send(&self.addr, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let mut errors = serde_json::from_str::<ErrorBody>(&text).unwrap_or_default().errors;
        if errors.is_empty() && !text.trim().is_empty() {
            errors.push(text.trim().to_owned());
        }
        Err(NodeError::Api { addr: self.addr.clone(), status: status.as_u16(), errors })
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let bytes = response.bytes().await.map_err(|e| NodeError::from_send(&self.addr, e))?;
        serde_json::from_slice(&bytes).map_err(|e| NodeError::Decode {
            addr: self.addr.clone(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl NodeClient for VaultClient {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn seal_status(&self) -> Result<NodeStatus> {
        let response = self.send(self.http.get(self.url("seal-status"))).await?;
        self.decode(response).await
    }

    async fn initialize(&self, secret_shares: u8, secret_threshold: u8) -> Result<KeyMaterial> {
        let body = InitRequest { secret_shares, secret_threshold };
        let response = self.send(self.http.put(self.url("init")).json(&body)).await?;
        self.decode(response).await
    }

    async fn submit_unseal_shares(&self, shares: &[String]) -> Result<()> {
        for (index, share) in shares.iter().enumerate() {
            let body = UnsealRequest { key: share };
            let response = self.send(self.http.put(self.url("unseal")).json(&body)).await?;
            let status: NodeStatus = self.decode(response).await?;

            debug!(
                node = %self.addr,
                submitted = index + 1,
                progress = ?status.progress,
                sealed = status.sealed,
                "Submitted unseal share"
            );

            if !status.sealed {
                break;
            }
        }
        Ok(())
    }

    async fn join_raft_cluster(&self, leader_addr: &str) -> Result<()> {
        let body = JoinRequest { leader_api_addr: leader_addr };
        let response = self.send(self.http.post(self.url("storage/raft/join")).json(&body)).await?;
        let joined: JoinResponse = self.decode(response).await?;
        if joined.joined {
            Ok(())
        } else {
            Err(NodeError::Api {
                addr: self.addr.clone(),
                status: 200,
                errors: vec![format!("node did not join raft cluster led by {leader_addr}")],
            })
        }
    }
}
