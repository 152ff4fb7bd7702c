use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const DEFAULT_PAGE_SIZE: u64 = 10;

/// A recipe together with its aggregated ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeView {
    pub recipe_id: i64,
    pub recipe_name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub rate: Option<Decimal>,
    pub calorie: i32,
    pub cooking_time: i32,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub unit_of_measurement: String,
    pub quantity: Decimal,
}

/// One row of a recipe listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RecipeSummary {
    #[sqlx(rename = "id")]
    pub recipe_id: i64,
    #[sqlx(rename = "name")]
    pub recipe_name: String,
    pub calorie: i32,
    pub cooking_time: i32,
    pub rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Step {
    #[sqlx(rename = "number")]
    pub step_number: i32,
    #[serde(rename = "text")]
    pub description: String,
    pub duration: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub comment_id: i64,
    pub username: String,
    pub star: i32,
    pub comment_text: String,
    pub created_date: DateTime<Utc>,
}

/// Request body of `POST /leave/review`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCreate {
    pub user_id: i64,
    pub recipe_id: i64,
    pub comment_text: String,
    pub star: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserFavourite {
    pub favourite_id: i64,
    pub recipe_id: i64,
    pub recipe_name: String,
    pub image_url: Option<String>,
}

/// Request body of `POST /user/favourite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFavouriteCreate {
    pub user_id: i64,
    pub recipe_id: i64,
}

/// Response for a successfully created row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedObject {
    pub id: i64,
    pub code: String,
    pub status: String,
    pub message: String,
}

impl CreatedObject {
    pub fn new(id: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            code: "201".to_string(),
            status: "Created".to_string(),
            message: message.into(),
        }
    }
}

/// Paging query parameters. Missing values fall back to page 1 of 10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub size: Option<u64>,
}

impl PageParams {
    /// Page number, 1-based. Zero is treated as the first page.
    pub fn page(&self) -> u64 {
        match self.page {
            None | Some(0) => 1,
            Some(page) => page,
        }
    }

    pub fn size(&self) -> u64 {
        match self.size {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(size) => size,
        }
    }

    /// Rows to skip. `None` when the page lies beyond what a `u64` can address.
    pub fn offset(&self) -> Option<u64> {
        (self.page() - 1).checked_mul(self.size())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(rename = "number")]
    pub page_number: u64,
    #[serde(rename = "number_of_elements")]
    pub page_size: u64,
    #[serde(rename = "total_elements")]
    pub elements_count: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, params: PageParams, elements_count: u64) -> Self {
        let page_size = params.size();
        Self {
            content,
            page_number: params.page(),
            page_size,
            elements_count,
            total_pages: elements_count.div_ceil(page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn page_params_fall_back_to_defaults() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.size(), 10);
        assert_eq!(params.offset(), Some(0));

        let params = PageParams { page: Some(0), size: Some(25) };
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), Some(0));

        let params = PageParams { page: Some(3), size: Some(25) };
        assert_eq!(params.offset(), Some(50));
    }

    #[test]
    fn huge_page_has_no_offset() {
        let params = PageParams { page: Some(u64::MAX), size: Some(10) };
        assert_eq!(params.offset(), None);

        let params = PageParams { page: Some(2), size: Some(u64::MAX) };
        assert_eq!(params.offset(), Some(u64::MAX));
    }

    #[test]
    fn total_pages_rounds_up() {
        let params = PageParams { page: Some(1), size: Some(10) };
        assert_eq!(Page::<i64>::new(vec![], params, 0).total_pages, 0);
        assert_eq!(Page::<i64>::new(vec![], params, 10).total_pages, 1);
        assert_eq!(Page::<i64>::new(vec![], params, 11).total_pages, 2);
    }

    #[test]
    fn step_serializes_description_as_text() {
        let step = Step { step_number: 1, description: "Boil water".into(), duration: 5 };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["text"], "Boil water");
        assert_eq!(json["step_number"], 1);
    }

    #[test]
    fn ingredients_decode_from_aggregated_json() {
        let raw = serde_json::json!([
            {"ingredient_id": 4, "ingredient_name": "flour", "unit_of_measurement": "g", "quantity": 250.5}
        ]);
        let ingredients: Vec<Ingredient> = serde_json::from_value(raw).unwrap();
        assert_eq!(ingredients[0].quantity, dec!(250.5));
    }
}
