//! Domain view models, request payloads and table identifiers shared by the
//! database and web-server crates.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{JUNCTION_TABLES, Table};
pub use error::CoreError;
pub use structs::{
    CreatedObject, Ingredient, Page, PageParams, RecipeSummary, RecipeView, Review, ReviewCreate,
    Step, UserFavourite, UserFavouriteCreate,
};
