//! Repository for the `products` table.

use sqlx::PgPool;
use stockpile_core::csv::ProductRow;
use stockpile_core::types::DbId;

use crate::models::product::{Product, ProductFilter};

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const COLUMNS: &str = "\
    id, name, sku, sku_normalized, description, active, created_at, updated_at";

/// WHERE clause with fixed placeholder positions; absent filters are
/// neutralized with `$n IS NULL` so the same bind order serves both the
/// list and count queries.
const FILTER_CLAUSE: &str = "\
    WHERE ($1::text IS NULL OR sku_normalized = $1) \
      AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
      AND ($3::text IS NULL OR description ILIKE '%' || $3 || '%') \
      AND ($4::boolean IS NULL OR active = $4)";

/// Provides CRUD and batch-upsert operations for products.
pub struct ProductRepo;

impl ProductRepo {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Find a product by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Product>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a product by its normalized SKU.
    pub async fn find_by_normalized_sku(
        pool: &PgPool,
        sku_normalized: &str,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE sku_normalized = $1");
        sqlx::query_as::<_, Product>(&query)
            .bind(sku_normalized)
            .fetch_optional(pool)
            .await
    }

    /// Find a product other than `exclude_id` holding the given normalized
    /// SKU. Used for conflict checks on direct updates.
    pub async fn find_sku_conflict(
        pool: &PgPool,
        sku_normalized: &str,
        exclude_id: DbId,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE sku_normalized = $1 AND id != $2");
        sqlx::query_as::<_, Product>(&query)
            .bind(sku_normalized)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await
    }

    /// List products matching the filter, newest first, plus the total
    /// matching count for pagination.
    pub async fn list(
        pool: &PgPool,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), sqlx::Error> {
        let sku_normalized = filter
            .sku
            .as_deref()
            .map(stockpile_core::sku::normalize_sku);

        let list_query = format!(
            "SELECT {COLUMNS} FROM products {FILTER_CLAUSE} \
             ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        );
        let items = sqlx::query_as::<_, Product>(&list_query)
            .bind(sku_normalized.as_deref())
            .bind(filter.name.as_deref())
            .bind(filter.description.as_deref())
            .bind(filter.active)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM products {FILTER_CLAUSE}");
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(sku_normalized.as_deref())
            .bind(filter.name.as_deref())
            .bind(filter.description.as_deref())
            .bind(filter.active)
            .fetch_one(pool)
            .await?;

        Ok((items, total))
    }

    /// Which of the given normalized SKUs already exist. Used to classify
    /// created-vs-updated before an upsert.
    pub async fn existing_normalized_skus(
        pool: &PgPool,
        skus: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT sku_normalized FROM products WHERE sku_normalized = ANY($1)")
            .bind(skus)
            .fetch_all(pool)
            .await
    }

    /// Fetch products by normalized SKU set.
    pub async fn fetch_by_normalized_skus(
        pool: &PgPool,
        skus: &[String],
    ) -> Result<Vec<Product>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE sku_normalized = ANY($1)");
        sqlx::query_as::<_, Product>(&query)
            .bind(skus)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a new product.
    pub async fn insert(
        pool: &PgPool,
        name: &str,
        sku: &str,
        sku_normalized: &str,
        description: Option<&str>,
        active: bool,
    ) -> Result<Product, sqlx::Error> {
        let query = format!(
            "INSERT INTO products (name, sku, sku_normalized, description, active) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(name)
            .bind(sku)
            .bind(sku_normalized)
            .bind(description)
            .bind(active)
            .fetch_one(pool)
            .await
    }

    /// Overwrite every supplied field of an existing product.
    pub async fn overwrite(
        pool: &PgPool,
        id: DbId,
        name: &str,
        sku: &str,
        sku_normalized: &str,
        description: Option<&str>,
        active: bool,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!(
            "UPDATE products SET \
                 name = $2, sku = $3, sku_normalized = $4, description = $5, \
                 active = $6, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .bind(name)
            .bind(sku)
            .bind(sku_normalized)
            .bind(description)
            .bind(active)
            .fetch_optional(pool)
            .await
    }

    /// Partially update a product. The SKU pair travels together so the
    /// normalized form can never drift from the raw one.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        sku_pair: Option<(&str, &str)>,
        description: Option<&str>,
        active: Option<bool>,
    ) -> Result<Option<Product>, sqlx::Error> {
        let (sku, sku_normalized) = match sku_pair {
            Some((sku, normalized)) => (Some(sku), Some(normalized)),
            None => (None, None),
        };
        let query = format!(
            "UPDATE products SET \
                 name = COALESCE($2, name), \
                 sku = COALESCE($3, sku), \
                 sku_normalized = COALESCE($4, sku_normalized), \
                 description = COALESCE($5, description), \
                 active = COALESCE($6, active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .bind(name)
            .bind(sku)
            .bind(sku_normalized)
            .bind(description)
            .bind(active)
            .fetch_optional(pool)
            .await
    }

    /// Upsert a deduplicated batch in one atomic statement, conflict target
    /// the normalized SKU. Conflicting rows keep their id and `created_at`;
    /// name, raw SKU, and description are replaced.
    pub async fn upsert_batch(pool: &PgPool, rows: &[ProductRow]) -> Result<(), sqlx::Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        let skus: Vec<&str> = rows.iter().map(|row| row.sku.as_str()).collect();
        let normalized: Vec<&str> = rows.iter().map(|row| row.sku_normalized.as_str()).collect();
        let descriptions: Vec<Option<&str>> =
            rows.iter().map(|row| row.description.as_deref()).collect();
        let actives: Vec<bool> = rows.iter().map(|row| row.active).collect();

        sqlx::query(
            "INSERT INTO products (name, sku, sku_normalized, description, active) \
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::boolean[]) \
             ON CONFLICT (sku_normalized) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 sku = EXCLUDED.sku, \
                 description = EXCLUDED.description, \
                 updated_at = NOW()",
        )
        .bind(&names)
        .bind(&skus)
        .bind(&normalized)
        .bind(&descriptions)
        .bind(&actives)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete a product by ID.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every product, returning the number of rows removed.
    pub async fn delete_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products").execute(pool).await?;
        Ok(result.rows_affected() as i64)
    }

}
