use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a table of the recipe schema.
///
/// Two properties are derived from the identifier alone: whether the table is
/// a junction (many-to-many link) table, and the foreign-key column other
/// tables use to point at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Category,
    CategoryUser,
    Comment,
    Cuisine,
    CuisineUser,
    Ingredient,
    IngredientRecipe,
    Recipe,
    RecipeStep,
    UnitOfMeasurement,
    UserFavourite,
    Users,
}

/// Tables whose only purpose is linking two other tables.
pub const JUNCTION_TABLES: &[Table] = &[
    Table::CategoryUser,
    Table::CuisineUser,
    Table::IngredientRecipe,
    Table::UserFavourite,
];

impl Table {
    pub const ALL: [Table; 12] = [
        Table::Category,
        Table::CategoryUser,
        Table::Comment,
        Table::Cuisine,
        Table::CuisineUser,
        Table::Ingredient,
        Table::IngredientRecipe,
        Table::Recipe,
        Table::RecipeStep,
        Table::UnitOfMeasurement,
        Table::UserFavourite,
        Table::Users,
    ];

    /// The table name as it appears in SQL.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Category => "category",
            Table::CategoryUser => "category_user",
            Table::Comment => "comment",
            Table::Cuisine => "cuisine",
            Table::CuisineUser => "cuisine_user",
            Table::Ingredient => "ingredient",
            Table::IngredientRecipe => "ingredient_recipe",
            Table::Recipe => "recipe",
            Table::RecipeStep => "recipe_step",
            Table::UnitOfMeasurement => "unit_of_measurement",
            Table::UserFavourite => "user_favourite",
            Table::Users => "users",
        }
    }

    pub fn is_junction(&self) -> bool {
        JUNCTION_TABLES.contains(self)
    }

    /// The foreign-key column referencing this table, e.g. `recipe_id`.
    ///
    /// Junction tables are never referenced, so they have none.
    pub fn owner_key(&self) -> Option<String> {
        if self.is_junction() {
            None
        } else {
            Some(format!("{}_id", self.name()))
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .iter()
            .copied()
            .find(|table| table.name() == s)
            .ok_or_else(|| CoreError::UnknownTable(s.to_string()))
    }
}
