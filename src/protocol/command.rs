//! Store commands and responses

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::store::{User, UserData, UserId};

// ============================================================================
// Command
// ============================================================================

/// A store operation, as sent from a worker to the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    GetAll,
    GetById { id: UserId },
    Create { data: UserData },
    Update { id: UserId, data: UserData },
    Delete { id: UserId },
}

impl Command {
    /// Wire name of the command, used in log fields
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetAll => "GET_ALL",
            Self::GetById { .. } => "GET_BY_ID",
            Self::Create { .. } => "CREATE",
            Self::Update { .. } => "UPDATE",
            Self::Delete { .. } => "DELETE",
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Failure reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreFault {
    /// The identifier failed the format check
    InvalidUserId,

    /// Execution failed unexpectedly inside the coordinator
    #[serde(rename = "Internal Server Error", alias = "internal server error")]
    InternalServerError,
}

/// Data carried by a successful response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    List(Vec<User>),
    Record(User),
}

/// Result of executing a [`Command`]
///
/// Serialises as `{"success":true,"data":…}` or `{"success":false,"error":…}`.
/// `Success(None)` is how the store reports an absent record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawResponse")]
pub enum StoreResponse {
    Success(Option<Payload>),
    Failure(StoreFault),
}

impl StoreResponse {
    pub fn list(users: Vec<User>) -> Self {
        Self::Success(Some(Payload::List(users)))
    }

    pub fn record(user: Option<User>) -> Self {
        Self::Success(user.map(Payload::Record))
    }

    pub fn failure(fault: StoreFault) -> Self {
        Self::Failure(fault)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Classify the response for the HTTP layer
    pub fn into_outcome(self) -> Outcome {
        match self {
            Self::Success(Some(payload)) => Outcome::Found(payload),
            Self::Success(None) => Outcome::Missing,
            Self::Failure(fault) => Outcome::Rejected(fault),
        }
    }
}

impl Serialize for StoreResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StoreResponse", 2)?;
        match self {
            Self::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Failure(fault) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", fault)?;
            }
        }
        state.end()
    }
}

/// Wire shape of a response before the success/error invariant is checked
#[derive(Deserialize)]
struct RawResponse {
    success: bool,
    #[serde(default, deserialize_with = "present")]
    data: Option<Option<Payload>>,
    #[serde(default)]
    error: Option<StoreFault>,
}

/// Distinguish `"data": null` from a missing `data` field
fn present<'de, D>(deserializer: D) -> Result<Option<Option<Payload>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Payload>::deserialize(deserializer).map(Some)
}

impl TryFrom<RawResponse> for StoreResponse {
    type Error = String;

    fn try_from(raw: RawResponse) -> Result<Self, Self::Error> {
        match (raw.success, raw.data, raw.error) {
            (true, data, None) => Ok(Self::Success(data.flatten())),
            (false, None, Some(fault)) => Ok(Self::Failure(fault)),
            (false, _, None) => Err("failed response without error".to_string()),
            _ => Err("response carries both data and error".to_string()),
        }
    }
}

/// Typed view of a [`StoreResponse`] used at the HTTP boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found(Payload),
    Missing,
    Rejected(StoreFault),
}
