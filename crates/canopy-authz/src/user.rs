//! User provisioning.
//!
//! Users are identities only here; authentication happens elsewhere.

use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::user::{CreateUser, User};
use canopy_core::repository::{Stores, UserRepository};
use tracing::info;
use uuid::Uuid;

pub struct UserService<S: Stores> {
    stores: S,
}

impl<S: Stores> UserService<S> {
    pub fn new(stores: S) -> Self {
        Self { stores }
    }

    pub async fn create_user(&self, input: CreateUser) -> CanopyResult<User> {
        let username = input.username.trim();
        let email = input.email.trim();
        if username.is_empty() {
            return Err(CanopyError::validation("username is required"));
        }
        if !email.contains('@') {
            return Err(CanopyError::validation("email is not valid"));
        }

        let user = self
            .stores
            .users()
            .create(CreateUser {
                username: username.into(),
                email: email.into(),
            })
            .await?;
        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> CanopyResult<User> {
        self.stores.users().get_by_id(user_id).await
    }

    pub async fn get_by_username(&self, username: &str) -> CanopyResult<User> {
        self.stores.users().get_by_username(username).await
    }

    pub async fn set_enabled(&self, user_id: Uuid, enabled: bool) -> CanopyResult<User> {
        let user = self.stores.users().set_enabled(user_id, enabled).await?;
        info!(user_id = %user.id, enabled, "User status changed");
        Ok(user)
    }
}
