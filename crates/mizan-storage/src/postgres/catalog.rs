use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mizan_core::books::{Category, Product};
use mizan_primitives::{Amount, Quantity};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

/// Row type mapping the `categories` table.
#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    name_ar: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            name_ar: row.name_ar,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row type mapping the `products` table.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    name_ar: Option<String>,
    sku: Option<String>,
    barcode: Option<String>,
    category_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    cost_price: Decimal,
    sale_price: Decimal,
    quantity: Decimal,
    min_quantity: Decimal,
    unit: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            name_ar: row.name_ar,
            sku: row.sku,
            barcode: row.barcode,
            category_id: row.category_id,
            supplier_id: row.supplier_id,
            cost_price: Amount::from(row.cost_price),
            sale_price: Amount::from(row.sale_price),
            quantity: Quantity::from(row.quantity),
            min_quantity: Quantity::from(row.min_quantity),
            unit: row.unit,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[instrument(skip_all, fields(category_id = %category.id))]
pub async fn upsert_category(conn: &mut PgConnection, category: &Category) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO categories (id, name, name_ar, description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            name_ar = EXCLUDED.name_ar,
            description = EXCLUDED.description,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(&category.name_ar)
    .bind(&category.description)
    .bind(category.created_at)
    .bind(category.updated_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to save category {}", category.id))?;
    Ok(())
}

pub async fn delete_category(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to delete category {id}"))?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn load_categories(pool: &PgPool) -> Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        r"
        SELECT id, name, name_ar, description, created_at, updated_at
        FROM categories
        ORDER BY created_at ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load categories")?;

    Ok(rows.into_iter().map(Category::from).collect())
}

#[instrument(skip_all, fields(product_id = %product.id))]
pub async fn upsert_product(conn: &mut PgConnection, product: &Product) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO products (
            id, name, name_ar, sku, barcode, category_id, supplier_id, cost_price,
            sale_price, quantity, min_quantity, unit, description, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            name_ar = EXCLUDED.name_ar,
            sku = EXCLUDED.sku,
            barcode = EXCLUDED.barcode,
            category_id = EXCLUDED.category_id,
            supplier_id = EXCLUDED.supplier_id,
            cost_price = EXCLUDED.cost_price,
            sale_price = EXCLUDED.sale_price,
            quantity = EXCLUDED.quantity,
            min_quantity = EXCLUDED.min_quantity,
            unit = EXCLUDED.unit,
            description = EXCLUDED.description,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.name_ar)
    .bind(&product.sku)
    .bind(&product.barcode)
    .bind(product.category_id)
    .bind(product.supplier_id)
    .bind(Decimal::from(product.cost_price))
    .bind(Decimal::from(product.sale_price))
    .bind(Decimal::from(product.quantity))
    .bind(Decimal::from(product.min_quantity))
    .bind(&product.unit)
    .bind(&product.description)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to save product {}", product.id))?;
    Ok(())
}

pub async fn delete_product(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to delete product {id}"))?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn load_products(pool: &PgPool) -> Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, name_ar, sku, barcode, category_id, supplier_id, cost_price,
               sale_price, quantity, min_quantity, unit, description, created_at, updated_at
        FROM products
        ORDER BY created_at ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load products")?;

    Ok(rows.into_iter().map(Product::from).collect())
}
