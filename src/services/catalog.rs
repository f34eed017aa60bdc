//! SQLite-backed product storage: the write side used by product creation
//! and the read side used by the dashboard and public pages.

use crate::models::{
    OwnerStats, Product, ProductHighlight, ProductImage, ProductOwner, ProductStatus,
    ProductWithDetails,
};
use crate::services::products::{BatchWriter, StoreError, WriteStatement};
use crate::services::slug::SlugRegistry;
use crate::Database;
use anyhow::{Context, Result};
use rusqlite::{ErrorCode, OptionalExtension, Transaction, TransactionBehavior};

const PRODUCT_COLUMNS: &str = "p.id, p.user_id, p.slug, p.title, p.price, p.currency, p.description, p.contact_method, p.contact_value, p.video_url, p.status, p.view_count, p.created_at, p.updated_at";

fn is_slug_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg.contains("products.user_id")
                && msg.contains("products.slug")
        }
        _ => false,
    }
}

fn backend(err: rusqlite::Error, context: &str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err).context(context.to_string()))
}

fn execute(tx: &Transaction<'_>, statement: &WriteStatement) -> rusqlite::Result<usize> {
    match statement {
        WriteStatement::InsertProduct(p) => tx.execute(
            r#"
            INSERT INTO products (
                id, user_id, slug, title, price, currency, description,
                contact_method, contact_value, video_url, status,
                view_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?13)
            "#,
            rusqlite::params![
                p.id,
                p.user_id,
                p.slug,
                p.title,
                p.price,
                p.currency.to_string(),
                p.description,
                p.contact_method.to_string(),
                p.contact_value,
                p.video_url,
                p.status.to_string(),
                p.created_at,
                p.updated_at,
            ],
        ),
        WriteStatement::InsertHighlight(h) => tx.execute(
            "INSERT INTO product_highlights (id, product_id, text, display_order) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![h.id, h.product_id, h.text, h.display_order],
        ),
        WriteStatement::InsertImage(i) => tx.execute(
            "INSERT INTO product_images (id, product_id, storage_key, cdn_url, display_order, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![i.id, i.product_id, i.storage_key, i.cdn_url, i.display_order, i.created_at],
        ),
    }
}

impl SlugRegistry for Database {
    fn exists(&self, slug: &str, owner: &str) -> Result<bool, StoreError> {
        let conn = self.get()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM products WHERE user_id = ? AND slug = ?",
                (owner, slug),
                |row| row.get(0),
            )
            .map_err(|e| backend(e, "slug lookup failed"))?;
        Ok(count > 0)
    }
}

impl BatchWriter for Database {
    fn write_batch(&self, statements: &[WriteStatement]) -> Result<(), StoreError> {
        let mut conn = self.get()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| backend(e, "could not begin transaction"))?;

        for statement in statements {
            if let Err(err) = execute(&tx, statement) {
                // Dropping the transaction rolls back everything written so far.
                return Err(match statement {
                    WriteStatement::InsertProduct(p) if is_slug_conflict(&err) => {
                        StoreError::SlugTaken {
                            slug: p.slug.clone(),
                        }
                    }
                    _ => backend(err, "batch insert failed"),
                });
            }
        }

        tx.commit().map_err(|e| backend(e, "commit failed"))?;
        Ok(())
    }

    fn purge_product(&self, product_id: &str) -> Result<(), StoreError> {
        let mut conn = self.get()?;
        let tx = conn
            .transaction()
            .map_err(|e| backend(e, "could not begin transaction"))?;
        for sql in [
            "DELETE FROM product_images WHERE product_id = ?",
            "DELETE FROM product_highlights WHERE product_id = ?",
            "DELETE FROM products WHERE id = ?",
        ] {
            tx.execute(sql, [product_id])
                .map_err(|e| backend(e, "purge failed"))?;
        }
        tx.commit().map_err(|e| backend(e, "commit failed"))?;
        Ok(())
    }
}

fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        user_id: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        price: row.get(4)?,
        currency: row.get::<_, String>(5)?.parse().unwrap_or_default(),
        description: row.get(6)?,
        contact_method: row.get::<_, String>(7)?.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                "unknown contact method".into(),
            )
        })?,
        contact_value: row.get(8)?,
        video_url: row.get(9)?,
        status: row.get::<_, String>(10)?.parse().unwrap_or_default(),
        view_count: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub fn list_products(db: &Database, owner: &str) -> Result<Vec<Product>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM products p WHERE p.user_id = ? ORDER BY p.created_at DESC, p.rowid DESC",
        PRODUCT_COLUMNS
    ))?;
    let products = stmt
        .query_map([owner], row_to_product)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(products)
}

pub fn get_product(db: &Database, owner: &str, slug: &str) -> Result<Option<Product>> {
    let conn = db.get()?;
    let product = conn
        .query_row(
            &format!(
                "SELECT {} FROM products p WHERE p.user_id = ? AND p.slug = ?",
                PRODUCT_COLUMNS
            ),
            (owner, slug),
            row_to_product,
        )
        .optional()?;
    Ok(product)
}

pub fn list_highlights(db: &Database, product_id: &str) -> Result<Vec<ProductHighlight>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, product_id, text, display_order FROM product_highlights WHERE product_id = ? ORDER BY display_order",
    )?;
    let highlights = stmt
        .query_map([product_id], |row| {
            Ok(ProductHighlight {
                id: row.get(0)?,
                product_id: row.get(1)?,
                text: row.get(2)?,
                display_order: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(highlights)
}

pub fn list_images(db: &Database, product_id: &str) -> Result<Vec<ProductImage>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, product_id, storage_key, cdn_url, display_order, created_at FROM product_images WHERE product_id = ? ORDER BY display_order",
    )?;
    let images = stmt
        .query_map([product_id], |row| {
            Ok(ProductImage {
                id: row.get(0)?,
                product_id: row.get(1)?,
                storage_key: row.get(2)?,
                cdn_url: row.get(3)?,
                display_order: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Looks up an active product by its owner's username and slug.
pub fn get_public_product(
    db: &Database,
    username: &str,
    slug: &str,
) -> Result<Option<ProductWithDetails>> {
    let conn = db.get()?;
    let found = conn
        .query_row(
            &format!(
                "SELECT {}, u.username, u.name FROM products p JOIN users u ON u.id = p.user_id WHERE u.username = ? AND p.slug = ? AND p.status = ?",
                PRODUCT_COLUMNS
            ),
            (username, slug, ProductStatus::Active.to_string()),
            |row| {
                let product = row_to_product(row)?;
                let owner = ProductOwner {
                    username: row.get(14)?,
                    name: row.get(15)?,
                };
                Ok((product, owner))
            },
        )
        .optional()?;
    drop(conn);

    match found {
        Some((product, user)) => {
            let highlights = list_highlights(db, &product.id)?;
            let images = list_images(db, &product.id)?;
            Ok(Some(ProductWithDetails {
                product,
                highlights,
                images,
                user,
            }))
        }
        None => Ok(None),
    }
}

pub fn record_view(db: &Database, product_id: &str) -> Result<()> {
    let conn = db.get()?;
    conn.execute(
        "UPDATE products SET view_count = view_count + 1 WHERE id = ?",
        [product_id],
    )
    .context("failed to record product view")?;
    Ok(())
}

pub fn owner_stats(db: &Database, owner: &str) -> Result<OwnerStats> {
    let conn = db.get()?;
    let stats = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(view_count), 0) FROM products WHERE user_id = ?",
        [owner],
        |row| {
            Ok(OwnerStats {
                total_products: row.get(0)?,
                total_views: row.get(1)?,
            })
        },
    )?;
    Ok(stats)
}
