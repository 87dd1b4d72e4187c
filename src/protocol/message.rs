//! Messages exchanged over a worker channel

use serde::{Deserialize, Serialize};

use super::command::{Command, StoreResponse};

/// Correlation token tying a command to its response
pub type RequestId = String;

/// Worker → coordinator: execute a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpcRequest {
    pub request_id: RequestId,
    pub command: Command,
}

/// Coordinator → worker: result of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpcResponse {
    pub request_id: RequestId,
    pub response: StoreResponse,
}

/// One-time port assignment sent right after spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignment {
    pub port: u16,
}

/// Everything the coordinator sends down a worker channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinatorMessage {
    Reply(IpcResponse),
    Assign(PortAssignment),
}

impl From<IpcResponse> for CoordinatorMessage {
    fn from(response: IpcResponse) -> Self {
        Self::Reply(response)
    }
}

impl From<PortAssignment> for CoordinatorMessage {
    fn from(assignment: PortAssignment) -> Self {
        Self::Assign(assignment)
    }
}

/// Encode a message as one line of newline-delimited JSON
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line of newline-delimited JSON
pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim_end())
}
