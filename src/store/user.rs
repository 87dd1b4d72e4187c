//! User record types and identifier rules

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// Identifier of a stored user (UUID v4 text)
pub type UserId = String;

/// A stored user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Generated by the store, never supplied by a caller
    pub id: UserId,

    pub username: String,

    pub age: i64,

    pub hobbies: Vec<String>,
}

impl User {
    /// Attach an identifier to a payload
    pub fn from_data(id: UserId, data: UserData) -> Self {
        Self {
            id,
            username: data.username,
            age: data.age,
            hobbies: data.hobbies,
        }
    }

    /// Replace every field except the identifier
    pub fn replace(&mut self, data: UserData) {
        self.username = data.username;
        self.age = data.age;
        self.hobbies = data.hobbies;
    }
}

/// User payload without an identifier, as carried by create/update commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub username: String,
    pub age: i64,
    pub hobbies: Vec<String>,
}

impl UserData {
    /// Validate an arbitrary JSON value as a user body
    ///
    /// Requires a string `username`, an integer `age` and an array of strings
    /// for `hobbies`. Unknown fields are dropped.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

/// Check whether `id` is a well-formed UUID v4 (case-insensitive)
pub fn is_valid_user_id(id: &str) -> bool {
    static USER_ID_RE: OnceLock<Regex> = OnceLock::new();

    let re = USER_ID_RE.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .expect("Invalid regex pattern")
    });

    re.is_match(id)
}

/// Allocate a fresh identifier
pub fn generate_user_id() -> UserId {
    Uuid::new_v4().to_string()
}
