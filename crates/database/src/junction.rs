//! Many-to-many link tables.
//!
//! The registry is built once at start-up and handed to the repositories that
//! need it. Lookups are symmetric: registering `(A, B) -> J` answers both
//! `(A, B)` and `(B, A)`.

use crate::error::DbError;
use core_types::Table;
use std::collections::HashMap;

/// A resolved junction together with the key columns for each side, in the
/// order the caller asked for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionLink {
    pub table: Table,
    pub left_key: String,
    pub right_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct JunctionRegistry {
    links: HashMap<(Table, Table), Table>,
}

impl JunctionRegistry {
    /// Builds a registry from `(left, right, junction)` triples.
    pub fn new(links: impl IntoIterator<Item = (Table, Table, Table)>) -> Self {
        Self {
            links: links
                .into_iter()
                .map(|(left, right, junction)| ((left, right), junction))
                .collect(),
        }
    }

    /// The link tables of the recipe schema.
    pub fn recipe_schema() -> Self {
        Self::new([
            (Table::Ingredient, Table::Recipe, Table::IngredientRecipe),
            (Table::Users, Table::Recipe, Table::UserFavourite),
            (Table::Category, Table::Users, Table::CategoryUser),
            (Table::Cuisine, Table::Users, Table::CuisineUser),
        ])
    }

    /// Looks up `(left, right)`, then `(right, left)`.
    pub fn resolve(&self, left: Table, right: Table) -> Option<Table> {
        self.links
            .get(&(left, right))
            .or_else(|| self.links.get(&(right, left)))
            .copied()
    }

    /// Resolves the junction and derives the key column of each side.
    pub fn link(&self, left: Table, right: Table) -> Result<JunctionLink, DbError> {
        let not_found = || DbError::JunctionNotFound { left, right };
        let table = self.resolve(left, right).ok_or_else(not_found)?;
        let left_key = left.owner_key().ok_or_else(not_found)?;
        let right_key = right.owner_key().ok_or_else(not_found)?;

        Ok(JunctionLink {
            table,
            left_key,
            right_key,
        })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_symmetric() {
        let registry = JunctionRegistry::recipe_schema();

        assert_eq!(
            registry.resolve(Table::Users, Table::Recipe),
            Some(Table::UserFavourite)
        );
        assert_eq!(
            registry.resolve(Table::Recipe, Table::Users),
            Some(Table::UserFavourite)
        );
        assert_eq!(
            registry.resolve(Table::Recipe, Table::Ingredient),
            Some(Table::IngredientRecipe)
        );
    }

    #[test]
    fn unregistered_pairs_are_not_found() {
        let registry = JunctionRegistry::recipe_schema();
        assert_eq!(registry.resolve(Table::Recipe, Table::Comment), None);
        assert_eq!(registry.resolve(Table::Users, Table::Users), None);
        assert!(matches!(
            registry.link(Table::Comment, Table::Recipe),
            Err(DbError::JunctionNotFound { .. })
        ));
    }

    #[test]
    fn alternate_registries_can_be_injected() {
        let registry = JunctionRegistry::new([(Table::Recipe, Table::Comment, Table::UserFavourite)]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.resolve(Table::Comment, Table::Recipe),
            Some(Table::UserFavourite)
        );
        assert_eq!(registry.resolve(Table::Users, Table::Recipe), None);
        assert!(JunctionRegistry::default().is_empty());
    }

    #[test]
    fn link_keys_follow_argument_order() {
        let registry = JunctionRegistry::recipe_schema();

        let link = registry.link(Table::Recipe, Table::Users).unwrap();
        assert_eq!(link.table, Table::UserFavourite);
        assert_eq!(link.left_key, "recipe_id");
        assert_eq!(link.right_key, "users_id");

        let link = registry.link(Table::Users, Table::Recipe).unwrap();
        assert_eq!(link.left_key, "users_id");
        assert_eq!(link.right_key, "recipe_id");
    }

    #[test]
    fn junction_tables_have_no_owner_key() {
        let registry = JunctionRegistry::new([(
            Table::UserFavourite,
            Table::Recipe,
            Table::IngredientRecipe,
        )]);
        assert_eq!(
            registry.resolve(Table::UserFavourite, Table::Recipe),
            Some(Table::IngredientRecipe)
        );
        assert!(registry.link(Table::UserFavourite, Table::Recipe).is_err());
    }
}
