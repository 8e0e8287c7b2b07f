use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, cards, categories, provider_integrations, transactions, users,
    util::ensure_owner,
};

use super::Engine;

/// Generates a `require_*` method that loads a row by id and checks it
/// belongs to the calling user.
macro_rules! impl_require_owned {
    ($require_fn:ident, $entity:path, $model:ty, $not_found:ident, $label:literal) => {
        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            user_id: Uuid,
            target_id: Uuid,
        ) -> ResultEngine<$model> {
            let model = <$entity>::find_by_id(target_id)
                .one(db)
                .await?
                .ok_or_else(|| EngineError::$not_found(target_id.to_string()))?;
            ensure_owner(model.user_id, user_id, $label)?;
            Ok(model)
        }
    };
}

impl Engine {
    impl_require_owned!(
        require_card,
        cards::Entity,
        cards::Model,
        CardNotFound,
        "card"
    );

    impl_require_owned!(
        require_category,
        categories::Entity,
        categories::Model,
        CategoryNotFound,
        "category"
    );

    impl_require_owned!(
        require_transaction,
        transactions::Entity,
        transactions::Model,
        TransactionNotFound,
        "transaction"
    );

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
    }

    pub(super) async fn find_integration(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<Option<provider_integrations::Model>> {
        provider_integrations::Entity::find()
            .filter(provider_integrations::Column::UserId.eq(user_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_integration(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<provider_integrations::Model> {
        self.find_integration(db, user_id)
            .await?
            .ok_or_else(|| EngineError::IntegrationNotFound(user_id.to_string()))
    }
}
