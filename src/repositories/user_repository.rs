use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::db::DbPool;
use crate::entities::user::{self, ActiveModel as UserActiveModel, Entity as User, UserRole};
use crate::entities::UserModel;
use crate::errors::ServiceError;

/// Opaque caller identity, as handed over by whatever authenticated the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Turns a caller identity into the stored user it belongs to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserResolver: Send + Sync {
    /// Fails with [`ServiceError::NotFound`] when no such user exists.
    async fn resolve(&self, identity: &Identity) -> Result<UserModel, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
}

/// Repository for user lookups
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Arc<DbPool>,
}

impl UserRepository {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?)
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<UserModel, ServiceError> {
        let model = UserActiveModel {
            username: Set(new_user.username),
            full_name: Set(new_user.full_name),
            email: Set(new_user.email),
            role: Set(new_user.role),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&*self.db).await?)
    }
}

#[async_trait]
impl UserResolver for UserRepository {
    async fn resolve(&self, identity: &Identity) -> Result<UserModel, ServiceError> {
        self.find_by_username(identity.username())
            .await?
            .ok_or_else(|| {
                warn!(username = %identity.username(), "No user matches caller identity");
                ServiceError::NotFound(format!("User '{}' not found", identity.username()))
            })
    }
}
