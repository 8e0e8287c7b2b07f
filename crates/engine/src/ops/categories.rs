use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    Category, CategoryNode, EngineError, NewCategory, ResultEngine, TransactionKind,
    categories::{self, build_tree, default_categories},
    transactions,
    util::{normalize_name_key, normalize_required_name},
};

use super::{Engine, with_tx};

fn to_categories(models: Vec<categories::Model>) -> ResultEngine<Vec<Category>> {
    models.into_iter().map(Category::try_from).collect()
}

impl Engine {
    async fn ensure_category_name_free(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        name: &str,
        kind: TransactionKind,
        except: Option<Uuid>,
    ) -> ResultEngine<()> {
        let mut query = categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .filter(categories::Column::NameNorm.eq(normalize_name_key(name)))
            .filter(categories::Column::Kind.eq(kind.as_str()));
        if let Some(id) = except {
            query = query.filter(categories::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            return Err(EngineError::ExistingKey(name.to_string()));
        }
        Ok(())
    }

    /// Rejects `new_parent` when it is `node` itself or one of its
    /// descendants.
    ///
    /// Walks the ancestor chain of `new_parent` up to a root. Revisiting a
    /// node means the stored hierarchy already contains a cycle, which is
    /// reported the same way instead of looping.
    async fn ensure_not_descendant(
        &self,
        db: &DatabaseTransaction,
        node: Uuid,
        new_parent: Uuid,
    ) -> ResultEngine<()> {
        let mut seen = HashSet::new();
        let mut current = Some(new_parent);
        while let Some(id) = current {
            if id == node || !seen.insert(id) {
                return Err(EngineError::CircularReference(format!(
                    "category {new_parent} is {node} or one of its descendants"
                )));
            }
            current = categories::Entity::find_by_id(id)
                .one(db)
                .await?
                .and_then(|model| model.parent_id);
        }
        Ok(())
    }

    /// Create a category, optionally under a parent of the same kind.
    pub async fn create_category(
        &self,
        user_id: Uuid,
        input: NewCategory,
    ) -> ResultEngine<Category> {
        let name =
            normalize_required_name(&input.name, "category name", EngineError::InvalidCategory)?;
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;

            if let Some(parent_id) = input.parent_id {
                let parent = self.require_category(&db_tx, user_id, parent_id).await?;
                if parent.kind != input.kind.as_str() {
                    return Err(EngineError::InvalidCategory(format!(
                        "parent kind is {}, got {}",
                        parent.kind, input.kind
                    )));
                }
            }
            self.ensure_category_name_free(&db_tx, user_id, &name, input.kind, None)
                .await?;

            let category = Category {
                id: Uuid::new_v4(),
                user_id,
                parent_id: input.parent_id,
                name,
                kind: input.kind,
                created_at: Utc::now(),
            };
            categories::ActiveModel::from(&category)
                .insert(&db_tx)
                .await?;
            Ok(category)
        })
    }

    pub async fn category(&self, user_id: Uuid, category_id: Uuid) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            let model = self.require_category(&db_tx, user_id, category_id).await?;
            Category::try_from(model)
        })
    }

    /// Every category of the user as a flat list ordered by name.
    pub async fn categories(&self, user_id: Uuid) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            let models = categories::Entity::find()
                .filter(categories::Column::UserId.eq(user_id))
                .order_by_asc(categories::Column::Name)
                .order_by_asc(categories::Column::Id)
                .all(&db_tx)
                .await?;
            to_categories(models)
        })
    }

    /// Direct children of a category, ordered by name.
    pub async fn category_children(
        &self,
        user_id: Uuid,
        category_id: Uuid,
    ) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, user_id, category_id).await?;
            let models = categories::Entity::find()
                .filter(categories::Column::ParentId.eq(category_id))
                .order_by_asc(categories::Column::Name)
                .order_by_asc(categories::Column::Id)
                .all(&db_tx)
                .await?;
            to_categories(models)
        })
    }

    pub async fn rename_category(
        &self,
        user_id: Uuid,
        category_id: Uuid,
        name: &str,
    ) -> ResultEngine<Category> {
        let name = normalize_required_name(name, "category name", EngineError::InvalidCategory)?;
        with_tx!(self, |db_tx| {
            let model = self.require_category(&db_tx, user_id, category_id).await?;
            let kind = TransactionKind::try_from(model.kind.as_str())?;
            self.ensure_category_name_free(&db_tx, user_id, &name, kind, Some(category_id))
                .await?;

            let mut active: categories::ActiveModel = model.into();
            active.name_norm = ActiveValue::Set(normalize_name_key(&name));
            active.name = ActiveValue::Set(name);
            let model = active.update(&db_tx).await?;
            Category::try_from(model)
        })
    }

    /// Re-parent a category. `None` moves it to the root.
    ///
    /// Rejects a parent owned by someone else, a parent of another kind, and
    /// any parent that would close a cycle.
    pub async fn move_category(
        &self,
        user_id: Uuid,
        category_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> ResultEngine<Category> {
        // hierarchy edits of one user are serialized so two moves cannot
        // each pass the cycle check and close a loop together
        let _guard = self.category_locks.lock(user_id).await;
        with_tx!(self, |db_tx| {
            let model = self.require_category(&db_tx, user_id, category_id).await?;

            if let Some(parent_id) = new_parent_id {
                if parent_id == category_id {
                    return Err(EngineError::CircularReference(
                        "a category cannot be its own parent".to_string(),
                    ));
                }
                let parent = self.require_category(&db_tx, user_id, parent_id).await?;
                if parent.kind != model.kind {
                    return Err(EngineError::InvalidCategory(format!(
                        "parent kind is {}, category kind is {}",
                        parent.kind, model.kind
                    )));
                }
                self.ensure_not_descendant(&db_tx, category_id, parent_id)
                    .await?;
            }

            let mut active: categories::ActiveModel = model.into();
            active.parent_id = ActiveValue::Set(new_parent_id);
            let model = active.update(&db_tx).await?;
            Category::try_from(model)
        })
    }

    /// Delete a category.
    ///
    /// Its direct children move to the root and transactions that referenced
    /// it become uncategorized.
    pub async fn delete_category(&self, user_id: Uuid, category_id: Uuid) -> ResultEngine<()> {
        let _guard = self.category_locks.lock(user_id).await;
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, user_id, category_id).await?;

            categories::Entity::update_many()
                .col_expr(categories::Column::ParentId, Expr::value(Option::<Uuid>::None))
                .filter(categories::Column::ParentId.eq(category_id))
                .exec(&db_tx)
                .await?;
            transactions::Entity::update_many()
                .col_expr(
                    transactions::Column::CategoryId,
                    Expr::value(Option::<Uuid>::None),
                )
                .filter(transactions::Column::CategoryId.eq(category_id))
                .exec(&db_tx)
                .await?;
            categories::Entity::delete_by_id(category_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// The user's categories as a forest, siblings ordered by name.
    pub async fn category_tree(&self, user_id: Uuid) -> ResultEngine<Vec<CategoryNode>> {
        let categories = self.categories(user_id).await?;
        Ok(build_tree(categories))
    }

    /// Persist [`default_categories`] for a user, skipping the ones already
    /// present. Returns the categories created by this call.
    pub async fn create_default_categories(&self, user_id: Uuid) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;

            let existing: HashSet<(String, String)> = categories::Entity::find()
                .filter(categories::Column::UserId.eq(user_id))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|model| (model.name_norm, model.kind))
                .collect();

            let now = Utc::now();
            let mut created = Vec::new();
            for default in default_categories() {
                let key = (
                    normalize_name_key(&default.name),
                    default.kind.as_str().to_string(),
                );
                if existing.contains(&key) {
                    continue;
                }
                let category = Category {
                    id: Uuid::new_v4(),
                    user_id,
                    parent_id: None,
                    name: default.name,
                    kind: default.kind,
                    created_at: now,
                };
                categories::ActiveModel::from(&category)
                    .insert(&db_tx)
                    .await?;
                created.push(category);
            }
            Ok(created)
        })
    }
}
