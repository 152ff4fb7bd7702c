use crate::error::{AppError, ServiceErrorMapper, TransportError};
use core_types::{
    CreatedObject, Page, PageParams, RecipeSummary, RecipeView, Review, ReviewCreate, Step,
    UserFavourite, UserFavouriteCreate,
};
use database::{RecipeFilter, RecipeRepository, TransactionRunner, TxOptions};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Recipe use cases. Each call validates its input, runs in one transaction
/// and converts any failure into a [`TransportError`] exactly once.
#[derive(Debug, Clone)]
pub struct RecipeService {
    runner: TransactionRunner,
    repo: Arc<RecipeRepository>,
    mapper: ServiceErrorMapper,
}

impl RecipeService {
    pub fn new(runner: TransactionRunner, repo: Arc<RecipeRepository>, mapper: ServiceErrorMapper) -> Self {
        Self { runner, repo, mapper }
    }

    pub async fn get_recipe(&self, recipe_id: i64) -> Result<RecipeView, TransportError> {
        validate_id("recipe_id", recipe_id).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        self.runner
            .run_with(TxOptions::read_only(), move |tx| {
                async move { Ok::<_, AppError>(repo.get_recipe(&mut **tx, recipe_id).await?) }.boxed()
            })
            .await
            .map_err(|e| self.reject(e))
    }

    pub async fn get_recipe_steps(&self, recipe_id: i64) -> Result<Vec<Step>, TransportError> {
        validate_id("recipe_id", recipe_id).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        self.runner
            .run_with(TxOptions::read_only(), move |tx| {
                async move { Ok::<_, AppError>(repo.get_recipe_steps(&mut **tx, recipe_id).await?) }
                    .boxed()
            })
            .await
            .map_err(|e| self.reject(e))
    }

    pub async fn get_recipe_reviews(&self, recipe_id: i64) -> Result<Vec<Review>, TransportError> {
        validate_id("recipe_id", recipe_id).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        self.runner
            .run_with(TxOptions::read_only(), move |tx| {
                async move { Ok::<_, AppError>(repo.get_recipe_reviews(&mut **tx, recipe_id).await?) }
                    .boxed()
            })
            .await
            .map_err(|e| self.reject(e))
    }

    /// Stores a review and updates the recipe rate in the same transaction.
    pub async fn leave_review(&self, review: ReviewCreate) -> Result<CreatedObject, TransportError> {
        validate_review(&review).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        let id = self
            .runner
            .run(move |tx| {
                async move { Ok::<_, AppError>(repo.leave_review(&mut **tx, &review).await?) }.boxed()
            })
            .await
            .map_err(|e| self.reject(e))?;

        tracing::info!(review_id = id, "review stored");
        Ok(CreatedObject::new(id, "review was left"))
    }

    pub async fn list_recipes(
        &self,
        filter: RecipeFilter,
        page: PageParams,
    ) -> Result<Page<RecipeSummary>, TransportError> {
        validate_page(page).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        self.runner
            .run_with(TxOptions::read_only(), move |tx| {
                async move { Ok::<_, AppError>(repo.list_recipes(&mut **tx, &filter, page).await?) }
                    .boxed()
            })
            .await
            .map_err(|e| self.reject(e))
    }

    pub async fn get_user_favourites(&self, user_id: i64) -> Result<Vec<UserFavourite>, TransportError> {
        validate_id("user_id", user_id).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        self.runner
            .run_with(TxOptions::read_only(), move |tx| {
                async move { Ok::<_, AppError>(repo.get_user_favourites(&mut **tx, user_id).await?) }
                    .boxed()
            })
            .await
            .map_err(|e| self.reject(e))
    }

    pub async fn add_to_favourite(
        &self,
        favourite: UserFavouriteCreate,
    ) -> Result<CreatedObject, TransportError> {
        validate_favourite(favourite.user_id, favourite.recipe_id).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        let id = self
            .runner
            .run(move |tx| {
                async move {
                    Ok::<_, AppError>(
                        repo.add_to_favourite(&mut **tx, favourite.user_id, favourite.recipe_id)
                            .await?,
                    )
                }
                .boxed()
            })
            .await
            .map_err(|e| self.reject(e))?;

        Ok(CreatedObject::new(id, "recipe was added to favourites"))
    }

    pub async fn remove_favourite(&self, user_id: i64, recipe_id: i64) -> Result<(), TransportError> {
        validate_favourite(user_id, recipe_id).map_err(|e| self.reject(e))?;
        let repo = self.repo.clone();
        self.runner
            .run(move |tx| {
                async move {
                    Ok::<_, AppError>(repo.remove_favourite(&mut **tx, user_id, recipe_id).await?)
                }
                .boxed()
            })
            .await
            .map_err(|e| self.reject(e))
    }

    /// Maps an error to its transport form and logs it. Server faults are
    /// logged at `error`, client faults at `warn`.
    pub fn reject(&self, err: AppError) -> TransportError {
        let transport = self.mapper.to_transport(&err);
        if transport.status.is_server_error() {
            tracing::error!(error = %err, status = %transport.status, "request failed");
        } else {
            tracing::warn!(error = %err, status = %transport.status, "request rejected");
        }
        transport
    }
}

#[derive(Default)]
struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.0.insert(field.to_string(), message.to_string());
        }
    }

    fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation { fields: self.0 })
        }
    }
}

fn validate_id(field: &str, id: i64) -> Result<(), AppError> {
    let mut errors = FieldErrors::default();
    errors.check(id > 0, field, "must be a positive id");
    errors.finish()
}

fn validate_review(review: &ReviewCreate) -> Result<(), AppError> {
    let mut errors = FieldErrors::default();
    errors.check(review.user_id > 0, "user_id", "must be a positive id");
    errors.check(review.recipe_id > 0, "recipe_id", "must be a positive id");
    errors.check(!review.comment_text.trim().is_empty(), "comment_text", "must not be empty");
    errors.check((1..=5).contains(&review.star), "star", "must be between 1 and 5");
    errors.finish()
}

fn validate_page(page: PageParams) -> Result<(), AppError> {
    let mut errors = FieldErrors::default();
    let addressable = page
        .offset()
        .is_some_and(|offset| i64::try_from(offset).is_ok());
    errors.check(addressable, "page", "is too large for the page size");
    errors.check(i64::try_from(page.size()).is_ok(), "size", "is too large");
    errors.finish()
}

fn validate_favourite(user_id: i64, recipe_id: i64) -> Result<(), AppError> {
    let mut errors = FieldErrors::default();
    errors.check(user_id > 0, "user_id", "must be a positive id");
    errors.check(recipe_id > 0, "recipe_id", "must be a positive id");
    errors.finish()
}
