use chrono::Utc;
use uuid::Uuid;

use sea_orm::{ActiveModelTrait, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, User, users,
    util::normalize_required_name,
};

use super::{Engine, with_tx};

impl Engine {
    /// Register a new user. Emails are unique, compared case-insensitively.
    pub async fn create_user(&self, email: &str, name: &str) -> ResultEngine<User> {
        let email = normalize_required_name(email, "email", EngineError::InvalidUser)?
            .to_lowercase();
        let name = normalize_required_name(name, "user name", EngineError::InvalidUser)?;
        with_tx!(self, |db_tx| {
            let existing = users::Entity::find()
                .filter(users::Column::Email.eq(email.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(email));
            }

            let user = User {
                id: Uuid::new_v4(),
                email,
                name,
                created_at: Utc::now(),
            };
            users::ActiveModel::from(&user).insert(&db_tx).await?;
            tracing::info!(user_id = %user.id, "user created");
            Ok(user)
        })
    }

    pub async fn user(&self, user_id: Uuid) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let model = self.require_user(&db_tx, user_id).await?;
            Ok(User::from(model))
        })
    }
}
