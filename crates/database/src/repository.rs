use crate::error::{ClassifiedError, ClassifyExt, DbError};
use crate::junction::JunctionRegistry;
use crate::query::{Combinator, FilterMap, FilterParams, SqlValue, compose, push_where};
use core_types::{
    Ingredient, Page, PageParams, RecipeSummary, RecipeView, Review, ReviewCreate, Step, Table,
    UserFavourite,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use std::sync::Arc;

/// Filters accepted by the recipe listing. Every field maps to a `recipe` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecipeFilter {
    pub name: Option<String>,
    pub calorie_from: Option<i32>,
    pub calorie_till: Option<i32>,
    pub cooking_time_from: Option<i32>,
    pub cooking_time_till: Option<i32>,
}

impl FilterParams for RecipeFilter {
    fn filter_map(&self) -> FilterMap {
        let fields: [(&'static str, Option<SqlValue>); 5] = [
            ("name", self.name.clone().map(SqlValue::from)),
            ("calorie_from", self.calorie_from.map(SqlValue::from)),
            ("calorie_till", self.calorie_till.map(SqlValue::from)),
            ("cooking_time_from", self.cooking_time_from.map(SqlValue::from)),
            ("cooking_time_till", self.cooking_time_till.map(SqlValue::from)),
        ];
        fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect()
    }
}

// A recipe row with its ingredients aggregated into a JSON array.
#[derive(FromRow)]
struct RecipeRow {
    id: i64,
    name: String,
    description: String,
    image: Option<String>,
    rate: Option<Decimal>,
    calorie: i32,
    cooking_time: i32,
    ingredients: Json<Vec<Ingredient>>,
}

impl From<RecipeRow> for RecipeView {
    fn from(row: RecipeRow) -> Self {
        Self {
            recipe_id: row.id,
            recipe_name: row.name,
            description: row.description,
            image_url: row.image,
            rate: row.rate,
            calorie: row.calorie,
            cooking_time: row.cooking_time,
            ingredients: row.ingredients.0,
        }
    }
}

/// Data access for recipes and everything hanging off them.
///
/// Every method runs on a connection borrowed from the caller's transaction and
/// returns errors already classified.
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    table: Table,
    junctions: Arc<JunctionRegistry>,
}

impl RecipeRepository {
    pub fn new(junctions: Arc<JunctionRegistry>) -> Self {
        Self {
            table: Table::Recipe,
            junctions,
        }
    }

    /// Fetches one recipe with its ingredient list.
    pub async fn get_recipe(&self, conn: &mut PgConnection, id: i64) -> Result<RecipeView, DbError> {
        let link = self.junctions.link(Table::Ingredient, self.table)?;
        let stmt = format!(
            r#"
            SELECT r.id, r.name, r.description, r.image, r.rate, r.calorie, r.cooking_time,
                COALESCE((
                    SELECT json_agg(json_build_object(
                        'ingredient_id', ing.id,
                        'ingredient_name', ing.name,
                        'unit_of_measurement', uom.name,
                        'quantity', ir.quantity) ORDER BY ing.name)
                    FROM {ingredient} ing
                    JOIN {uom} uom ON uom.id = ing.unit_of_measurement_id
                    JOIN {junction} ir ON ir.{ingredient_key} = ing.id
                    WHERE ir.{recipe_key} = r.id
                ), '[]'::json) AS ingredients
            FROM {recipe} r
            WHERE r.id = $1
            "#,
            ingredient = Table::Ingredient,
            uom = Table::UnitOfMeasurement,
            junction = link.table,
            ingredient_key = link.left_key,
            recipe_key = link.right_key,
            recipe = self.table,
        );
        let args = [SqlValue::from(id)];

        let row = sqlx::query_as::<_, RecipeRow>(&stmt)
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .classify(&stmt, &args)?;

        Ok(row.into())
    }

    /// Fetches the steps of a recipe in order. An unknown recipe has no steps.
    pub async fn get_recipe_steps(
        &self,
        conn: &mut PgConnection,
        recipe_id: i64,
    ) -> Result<Vec<Step>, DbError> {
        let stmt = format!(
            "SELECT number, duration, description FROM {} WHERE recipe_id = $1 ORDER BY number",
            Table::RecipeStep
        );
        let args = [SqlValue::from(recipe_id)];

        sqlx::query_as::<_, Step>(&stmt)
            .bind(recipe_id)
            .fetch_all(&mut *conn)
            .await
            .classify(&stmt, &args)
    }

    /// Fetches the reviews of a recipe, newest first.
    pub async fn get_recipe_reviews(
        &self,
        conn: &mut PgConnection,
        recipe_id: i64,
    ) -> Result<Vec<Review>, DbError> {
        let stmt = format!(
            r#"
            SELECT c.id AS comment_id, c.text AS comment_text, c.star, c.created_date, u.username
            FROM {comment} c
            JOIN {users} u ON u.id = c.users_id
            WHERE c.recipe_id = $1
            ORDER BY c.created_date DESC, c.id DESC
            "#,
            comment = Table::Comment,
            users = Table::Users,
        );
        let args = [SqlValue::from(recipe_id)];

        sqlx::query_as::<_, Review>(&stmt)
            .bind(recipe_id)
            .fetch_all(&mut *conn)
            .await
            .classify(&stmt, &args)
    }

    /// Stores a review and refreshes the recipe's average rating. Returns the review id.
    pub async fn leave_review(
        &self,
        conn: &mut PgConnection,
        review: &ReviewCreate,
    ) -> Result<i64, DbError> {
        let stmt = format!(
            "INSERT INTO {} (users_id, recipe_id, text, star, created_date) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING id",
            Table::Comment
        );
        let args = [
            SqlValue::from(review.user_id),
            SqlValue::from(review.recipe_id),
            SqlValue::from(review.comment_text.as_str()),
            SqlValue::from(review.star),
        ];

        let id: i64 = sqlx::query_scalar(&stmt)
            .bind(review.user_id)
            .bind(review.recipe_id)
            .bind(&review.comment_text)
            .bind(review.star)
            .fetch_one(&mut *conn)
            .await
            .classify(&stmt, &args)?;

        self.update_recipe_rate(conn, review.recipe_id).await?;
        Ok(id)
    }

    async fn update_recipe_rate(&self, conn: &mut PgConnection, recipe_id: i64) -> Result<(), DbError> {
        let stmt = format!(
            "UPDATE {recipe} SET rate = (SELECT round(avg(star)::numeric, 1) FROM {comment} WHERE recipe_id = $1) \
             WHERE id = $1",
            recipe = self.table,
            comment = Table::Comment,
        );
        let args = [SqlValue::from(recipe_id)];

        let result = sqlx::query(&stmt)
            .bind(recipe_id)
            .execute(&mut *conn)
            .await
            .classify(&stmt, &args)?;

        if result.rows_affected() == 0 {
            return Err(ClassifiedError::no_rows_changed(&stmt, &args).into());
        }
        Ok(())
    }

    /// Marks a recipe as a favourite of a user. Returns the favourite id.
    pub async fn add_to_favourite(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<i64, DbError> {
        self.link_rows(conn, (Table::Users, user_id), (self.table, recipe_id))
            .await
    }

    pub async fn get_user_favourites(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> Result<Vec<UserFavourite>, DbError> {
        let link = self.junctions.link(Table::Users, self.table)?;
        let stmt = format!(
            r#"
            SELECT f.id AS favourite_id, r.id AS recipe_id, r.name AS recipe_name, r.image AS image_url
            FROM {junction} f
            JOIN {recipe} r ON r.id = f.{recipe_key}
            WHERE f.{user_key} = $1
            ORDER BY f.id
            "#,
            junction = link.table,
            recipe = self.table,
            recipe_key = link.right_key,
            user_key = link.left_key,
        );
        let args = [SqlValue::from(user_id)];

        sqlx::query_as::<_, UserFavourite>(&stmt)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await
            .classify(&stmt, &args)
    }

    /// Removes a favourite. Removing one that does not exist is `NoRowsChanged`.
    pub async fn remove_favourite(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<(), DbError> {
        self.unlink_rows(conn, (Table::Users, user_id), (self.table, recipe_id))
            .await
    }

    /// Lists recipes matching `filter`, one page at a time.
    pub async fn list_recipes(
        &self,
        conn: &mut PgConnection,
        filter: &RecipeFilter,
        page: PageParams,
    ) -> Result<Page<RecipeSummary>, DbError> {
        let predicate = compose(&filter.filter_map(), Combinator::And);

        let mut count_args = Vec::new();
        let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", self.table));
        push_where(&mut count, predicate.as_ref(), &mut count_args);
        let count_stmt = count.sql().to_string();

        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await
            .classify(&count_stmt, &count_args)?;

        let limit = i64::try_from(page.size()).unwrap_or(i64::MAX);
        let offset = page
            .offset()
            .and_then(|offset| i64::try_from(offset).ok())
            .unwrap_or(i64::MAX);

        let mut args = Vec::new();
        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT id, name, calorie, cooking_time, rate FROM {}",
            self.table
        ));
        push_where(&mut select, predicate.as_ref(), &mut args);
        select.push(" ORDER BY id LIMIT ").push_bind(limit);
        select.push(" OFFSET ").push_bind(offset);
        args.extend([SqlValue::from(limit), SqlValue::from(offset)]);
        let stmt = select.sql().to_string();

        let content = select
            .build_query_as::<RecipeSummary>()
            .fetch_all(&mut *conn)
            .await
            .classify(&stmt, &args)?;

        Ok(Page::new(content, page, u64::try_from(total).unwrap_or_default()))
    }

    /// Inserts a row into the junction between two tables. Returns the new row id.
    pub async fn link_rows(
        &self,
        conn: &mut PgConnection,
        (left, left_id): (Table, i64),
        (right, right_id): (Table, i64),
    ) -> Result<i64, DbError> {
        let link = self.junctions.link(left, right)?;
        let stmt = format!(
            "INSERT INTO {} ({}, {}) VALUES ($1, $2) RETURNING id",
            link.table, link.left_key, link.right_key
        );
        let args = [SqlValue::from(left_id), SqlValue::from(right_id)];

        sqlx::query_scalar(&stmt)
            .bind(left_id)
            .bind(right_id)
            .fetch_one(&mut *conn)
            .await
            .classify(&stmt, &args)
    }

    /// Deletes the junction row between two rows.
    pub async fn unlink_rows(
        &self,
        conn: &mut PgConnection,
        (left, left_id): (Table, i64),
        (right, right_id): (Table, i64),
    ) -> Result<(), DbError> {
        let link = self.junctions.link(left, right)?;
        let stmt = format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            link.table, link.left_key, link.right_key
        );
        let args = [SqlValue::from(left_id), SqlValue::from(right_id)];

        let result = sqlx::query(&stmt)
            .bind(left_id)
            .bind(right_id)
            .execute(&mut *conn)
            .await
            .classify(&stmt, &args)?;

        if result.rows_affected() == 0 {
            return Err(ClassifiedError::no_rows_changed(&stmt, &args).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Reason;
    use crate::transaction::TransactionRunner;
    use sqlx::PgPool;

    fn repository() -> Arc<RecipeRepository> {
        Arc::new(RecipeRepository::new(Arc::new(JunctionRegistry::recipe_schema())))
    }

    async fn seed(pool: &PgPool) -> anyhow::Result<(i64, i64)> {
        let user_id: i64 = sqlx::query_scalar("INSERT INTO users (username) VALUES ('alice') RETURNING id")
            .fetch_one(pool)
            .await?;
        let recipe_id: i64 = sqlx::query_scalar(
            "INSERT INTO recipe (name, description, calorie, cooking_time) \
             VALUES ('Pancakes', 'Fluffy', 350, 20) RETURNING id",
        )
        .fetch_one(pool)
        .await?;
        sqlx::query(
            "INSERT INTO recipe (name, calorie, cooking_time) \
             VALUES ('Salad', 120, 10), ('Lasagne', 800, 90)",
        )
        .execute(pool)
        .await?;
        Ok((user_id, recipe_id))
    }

    #[test]
    fn recipe_filter_only_maps_set_fields() {
        let filter = RecipeFilter {
            calorie_from: Some(100),
            cooking_time_till: Some(30),
            ..RecipeFilter::default()
        };

        let map = filter.filter_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("calorie_from"), Some(&SqlValue::Int(100)));
        assert_eq!(map.get("cooking_time_till"), Some(&SqlValue::Int(30)));
        assert!(RecipeFilter::default().filter_map().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires database setup"]
    async fn duplicate_favourite_already_exists(pool: PgPool) -> anyhow::Result<()> {
        let (user_id, recipe_id) = seed(&pool).await?;
        let repo = repository();
        let mut conn = pool.acquire().await?;

        repo.add_to_favourite(&mut conn, user_id, recipe_id).await?;
        let err = repo
            .add_to_favourite(&mut conn, user_id, recipe_id)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(Reason::AlreadyExists));

        let err = repo.add_to_favourite(&mut conn, user_id, 9_999).await.unwrap_err();
        assert_eq!(err.reason(), Some(Reason::ParentNotFound));

        let favourites = repo.get_user_favourites(&mut conn, user_id).await?;
        assert_eq!(favourites.len(), 1);
        assert_eq!(favourites[0].recipe_name, "Pancakes");

        repo.remove_favourite(&mut conn, user_id, recipe_id).await?;
        let err = repo
            .remove_favourite(&mut conn, user_id, recipe_id)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(Reason::NoRowsChanged));
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires database setup"]
    async fn unknown_recipe_is_not_found(pool: PgPool) -> anyhow::Result<()> {
        let (_, recipe_id) = seed(&pool).await?;
        let repo = repository();
        let mut conn = pool.acquire().await?;

        let recipe = repo.get_recipe(&mut conn, recipe_id).await?;
        assert_eq!(recipe.recipe_name, "Pancakes");
        assert!(recipe.ingredients.is_empty());

        let err = repo.get_recipe(&mut conn, 9_999).await.unwrap_err();
        assert_eq!(err.reason(), Some(Reason::NotFound));
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires database setup"]
    async fn review_updates_rate_and_check_constraint_is_classified(
        pool: PgPool,
    ) -> anyhow::Result<()> {
        let (user_id, recipe_id) = seed(&pool).await?;
        let repo = repository();
        let mut conn = pool.acquire().await?;

        let review = ReviewCreate {
            user_id,
            recipe_id,
            comment_text: "Great".to_string(),
            star: 4,
        };
        repo.leave_review(&mut conn, &review).await?;
        let recipe = repo.get_recipe(&mut conn, recipe_id).await?;
        assert_eq!(recipe.rate, Some(Decimal::new(40, 1)));

        let reviews = repo.get_recipe_reviews(&mut conn, recipe_id).await?;
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].username, "alice");

        let out_of_range = ReviewCreate { star: 9, ..review };
        let err = repo.leave_review(&mut conn, &out_of_range).await.unwrap_err();
        assert_eq!(err.reason(), Some(Reason::FailsCheckConstraint));
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires database setup"]
    async fn failed_unit_of_work_leaves_no_partial_write(pool: PgPool) -> anyhow::Result<()> {
        let (user_id, recipe_id) = seed(&pool).await?;
        let repo = repository();
        let runner = TransactionRunner::new(pool.clone());
        let review = ReviewCreate {
            user_id,
            recipe_id,
            comment_text: "Never visible".to_string(),
            star: 5,
        };

        let writer = repo.clone();
        let result = runner
            .run(move |tx| {
                Box::pin(async move {
                    writer.leave_review(&mut **tx, &review).await?;
                    writer.add_to_favourite(&mut **tx, user_id, 9_999).await?;
                    Ok::<_, DbError>(())
                })
            })
            .await;
        assert_eq!(result.unwrap_err().reason(), Some(Reason::ParentNotFound));

        let stmt = "SELECT id FROM comment WHERE recipe_id = $1";
        let err = sqlx::query_scalar::<_, i64>(stmt)
            .bind(recipe_id)
            .fetch_one(&pool)
            .await
            .classify(stmt, &[SqlValue::from(recipe_id)])
            .unwrap_err();
        assert_eq!(err.reason(), Some(Reason::NotFound));
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires database setup"]
    async fn list_recipes_applies_range_filters(pool: PgPool) -> anyhow::Result<()> {
        seed(&pool).await?;
        let repo = repository();
        let mut conn = pool.acquire().await?;

        let filter = RecipeFilter {
            calorie_from: Some(100),
            calorie_till: Some(400),
            ..RecipeFilter::default()
        };
        let page = repo
            .list_recipes(&mut conn, &filter, PageParams { page: Some(1), size: Some(1) })
            .await?;
        assert_eq!(page.elements_count, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.content.len(), 1);

        let everything = repo
            .list_recipes(&mut conn, &RecipeFilter::default(), PageParams::default())
            .await?;
        assert_eq!(everything.elements_count, 3);
        Ok(())
    }
}
