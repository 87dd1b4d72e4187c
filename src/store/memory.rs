//! Command execution against the in-memory user table

use tracing::debug;

use crate::protocol::{Command, StoreFault, StoreResponse};

use super::user::{generate_user_id, is_valid_user_id, User, UserData};

/// Insertion-ordered table of users
#[derive(Debug, Default)]
pub struct UserStore {
    users: Vec<User>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Execute a command and describe the result
    ///
    /// Only a malformed identifier produces a failure. An absent record is
    /// reported as a success with no data.
    pub fn execute(&mut self, command: Command) -> StoreResponse {
        debug!(command = command.name(), "executing store command");

        match command {
            Command::GetAll => StoreResponse::list(self.users.clone()),
            Command::GetById { id } => {
                if !is_valid_user_id(&id) {
                    return StoreResponse::failure(StoreFault::InvalidUserId);
                }
                StoreResponse::record(self.find(&id).cloned())
            }
            Command::Create { data } => StoreResponse::record(Some(self.create(data))),
            Command::Update { id, data } => {
                if !is_valid_user_id(&id) {
                    return StoreResponse::failure(StoreFault::InvalidUserId);
                }
                StoreResponse::record(self.update(&id, data))
            }
            Command::Delete { id } => {
                if !is_valid_user_id(&id) {
                    return StoreResponse::failure(StoreFault::InvalidUserId);
                }
                StoreResponse::record(self.delete(&id))
            }
        }
    }

    fn find(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.users.iter().position(|u| u.id == id)
    }

    fn create(&mut self, data: UserData) -> User {
        let mut id = generate_user_id();
        while self.find(&id).is_some() {
            id = generate_user_id();
        }

        let user = User::from_data(id, data);
        self.users.push(user.clone());
        user
    }

    fn update(&mut self, id: &str, data: UserData) -> Option<User> {
        let index = self.position(id)?;
        let user = &mut self.users[index];
        user.replace(data);
        Some(user.clone())
    }

    fn delete(&mut self, id: &str) -> Option<User> {
        let index = self.position(id)?;
        Some(self.users.remove(index))
    }
}
