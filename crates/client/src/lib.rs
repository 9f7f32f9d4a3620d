//! A conversational model backed by Dust agents.
//!
//! [`DustClient`] lists the agents configured in a workspace, and turns
//! each of them into a [`DustModel`]. A model keeps one remote
//! conversation alive for its whole lifetime and streams every reply
//! token by token.

#[macro_use]
extern crate tracing;

mod assembler;
mod config;
mod io;
mod model;
mod proto;
mod response;
mod router;
mod session;
mod transport;
mod upload;

use std::path::{Path, PathBuf};
use std::time::Duration;

use llm_dust_model::{ErrorKind, ModelError};
use reqwest::StatusCode;

pub use config::{DustConfig, DustConfigBuilder};
pub use io::EventStream;
pub use model::DustModel;
pub use proto::{
    AgentAction, AgentConfiguration, ContentFragment, ConversationEvent,
    MessageEvent,
};
pub use response::DustResponse;
pub use session::{Session, continue_conversation, start_conversation};
pub use transport::Transport;
pub use upload::{SUPPORTED_ATTACHMENT_TYPES, upload_attachment};

/// Error type for the Dust client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote service answered with a non-2xx status.
    #[error("remote service returned {status}: {body}")]
    Remote {
        /// The HTTP status code.
        status: StatusCode,
        /// The response body, as text.
        body: String,
    },
    /// The remote service could not be reached, or the connection broke.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    /// A successful response carried a body we don't understand.
    #[error("unexpected response payload: {0}")]
    UnexpectedPayload(String),
    /// A line of an event stream could not be decoded.
    #[error("malformed event line: {raw_line:?}")]
    MalformedEvent {
        /// The offending line.
        raw_line: String,
    },
    /// The agent did not finish its reply in time.
    #[error("no terminal event received within {0:?}")]
    StreamTimeout(Duration),
    /// The agent reported an error while generating its reply.
    #[error("agent error: {message}")]
    AgentExecution {
        /// The error message reported by the agent.
        message: String,
    },
    /// An attachment could not be uploaded.
    #[error("failed to upload {}: {message}", path.display())]
    Upload {
        /// Path of the attachment.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
    /// The client is misconfigured.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    #[inline]
    pub(crate) fn malformed(raw_line: impl Into<String>) -> Self {
        Self::MalformedEvent {
            raw_line: raw_line.into(),
        }
    }

    #[inline]
    pub(crate) fn upload(path: &Path, message: impl ToString) -> Self {
        Self::Upload {
            path: path.to_owned(),
            message: message.to_string(),
        }
    }
}

impl ModelError for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Remote { .. } | Error::Transport(_) => ErrorKind::Remote,
            Error::MalformedEvent { .. } => ErrorKind::MalformedEvent,
            Error::StreamTimeout(_) => ErrorKind::StreamTimeout,
            Error::AgentExecution { .. } => ErrorKind::AgentExecution,
            Error::Upload { .. } => ErrorKind::Upload,
            Error::Config(_) => ErrorKind::Config,
            Error::UnexpectedPayload(_) => ErrorKind::Other,
        }
    }
}

/// A specialized `Result` type for the Dust client.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Entry point to a Dust workspace.
#[derive(Clone, Debug)]
pub struct DustClient {
    transport: Transport,
}

impl DustClient {
    /// Creates a new `DustClient` with the given configuration.
    #[inline]
    pub fn new(config: DustConfig) -> Self {
        debug!(
            workspace_id = config.workspace_id(),
            space_id = config.space_id(),
            data_source_id = config.data_source_id(),
            "created dust client"
        );
        Self {
            transport: Transport::new(config),
        }
    }

    /// Fetches the agents configured in the workspace.
    pub async fn list_agents(&self) -> Result<Vec<AgentConfiguration>> {
        let resp: proto::AgentConfigurationsResponse = self
            .transport
            .get(proto::AGENT_CONFIGURATIONS_PATH, &[])
            .await?;
        debug!("listed {} agents", resp.agent_configurations.len());
        Ok(resp.agent_configurations)
    }

    /// Creates a model that talks to `agent` in a fresh conversation.
    #[inline]
    pub fn model(&self, agent: AgentConfiguration) -> DustModel {
        DustModel::new(self.transport.clone(), agent)
    }

    /// Creates one model for every agent in the workspace.
    pub async fn models(&self) -> Result<Vec<DustModel>> {
        let agents = self.list_agents().await?;
        Ok(agents.into_iter().map(|agent| self.model(agent)).collect())
    }
}
