//! Category hierarchy per user.
//!
//! Categories form a forest: every category has at most one parent, the
//! parent belongs to the same user and has the same [`TransactionKind`].

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, TransactionKind, util::normalize_name_key};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

/// A category with its children, as returned by
/// [`Engine::category_tree`](crate::Engine::category_tree).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

#[derive(Clone, Debug)]
pub struct NewCategory {
    pub name: String,
    pub kind: TransactionKind,
    pub parent_id: Option<Uuid>,
}

/// Starter categories offered to a new user, all at the root.
///
/// [`Engine::create_default_categories`](crate::Engine::create_default_categories)
/// persists them for an owner.
pub fn default_categories() -> Vec<NewCategory> {
    const EXPENSE: &[&str] = &[
        "Food & Dining",
        "Shopping",
        "Housing",
        "Transportation",
        "Vehicle",
        "Entertainment",
        "Healthcare",
        "Insurance",
        "Personal Care",
        "Education",
        "Gifts & Donations",
        "Investments",
    ];
    const INCOME: &[&str] = &["Salary", "Business", "Gifts", "Investments"];
    const TRANSFER: &[&str] = &["Transfer In", "Transfer Out"];

    [
        (TransactionKind::Expense, EXPENSE),
        (TransactionKind::Income, INCOME),
        (TransactionKind::Transfer, TRANSFER),
    ]
    .into_iter()
    .flat_map(|(kind, names)| {
        names.iter().map(move |name| NewCategory {
            name: (*name).to_string(),
            kind,
            parent_id: None,
        })
    })
    .collect()
}

/// Assemble a forest from a flat list.
///
/// Siblings are ordered by name, then id. Categories whose parent chain never
/// reaches a root (dangling parent, or a cycle left by corrupted data) are
/// not emitted.
pub(crate) fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let mut by_parent: HashMap<Option<Uuid>, Vec<Category>> = HashMap::new();
    for category in categories {
        by_parent.entry(category.parent_id).or_default().push(category);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    }

    let mut visited = HashSet::new();
    attach(None, &mut by_parent, &mut visited)
}

fn attach(
    parent: Option<Uuid>,
    by_parent: &mut HashMap<Option<Uuid>, Vec<Category>>,
    visited: &mut HashSet<Uuid>,
) -> Vec<CategoryNode> {
    let Some(siblings) = by_parent.remove(&parent) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(siblings.len());
    for category in siblings {
        if !visited.insert(category.id) {
            continue;
        }
        let children = attach(Some(category.id), by_parent, visited);
        out.push(CategoryNode { category, children });
    }
    out
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub name_norm: String,
    pub kind: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id),
            user_id: ActiveValue::Set(category.user_id),
            parent_id: ActiveValue::Set(category.parent_id),
            name: ActiveValue::Set(category.name.clone()),
            name_norm: ActiveValue::Set(normalize_name_key(&category.name)),
            kind: ActiveValue::Set(category.kind.as_str().to_string()),
            created_at: ActiveValue::Set(category.created_at),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            parent_id: model.parent_id,
            name: model.name,
            kind: TransactionKind::try_from(model.kind.as_str())
                .map_err(|_| EngineError::InvalidCategory(format!("invalid kind: {}", model.kind)))?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: Uuid, parent_id: Option<Uuid>, name: &str) -> Category {
        Category {
            id,
            user_id: Uuid::nil(),
            parent_id,
            name: name.to_string(),
            kind: TransactionKind::Expense,
            created_at: Utc::now(),
        }
    }

    fn names(nodes: &[CategoryNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.category.name.as_str()).collect()
    }

    #[test]
    fn tree_orders_siblings_by_name() {
        let food = Uuid::new_v4();
        let tree = build_tree(vec![
            category(Uuid::new_v4(), Some(food), "Restaurants"),
            category(Uuid::new_v4(), None, "Shopping"),
            category(food, None, "Food"),
            category(Uuid::new_v4(), Some(food), "Groceries"),
        ]);

        assert_eq!(names(&tree), ["Food", "Shopping"]);
        assert_eq!(names(&tree[0].children), ["Groceries", "Restaurants"]);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn tree_skips_corrupted_chains() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let tree = build_tree(vec![
            category(Uuid::new_v4(), None, "Root"),
            category(a, Some(b), "A"),
            category(b, Some(a), "B"),
            category(Uuid::new_v4(), Some(Uuid::new_v4()), "Orphan"),
        ]);

        assert_eq!(names(&tree), ["Root"]);
    }

    #[test]
    fn defaults_cover_every_kind() {
        let defaults = default_categories();
        assert_eq!(defaults.len(), 18);
        let count = |kind| defaults.iter().filter(|c| c.kind == kind).count();
        assert_eq!(count(TransactionKind::Expense), 12);
        assert_eq!(count(TransactionKind::Income), 4);
        assert_eq!(count(TransactionKind::Transfer), 2);
        assert!(defaults.iter().all(|c| c.parent_id.is_none()));
    }
}
