//! Product creation: one product row, its highlights and its images are
//! written as a single batch behind a freshly allocated slug.

use crate::models::{
    ContactMethod, CreateProduct, Currency, Product, ProductHighlight, ProductImage,
    ProductStatus, UploadedImage,
};
use crate::services::slug::{self, SlugRegistry, DEFAULT_SLUG_ATTEMPTS};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_MAX_HIGHLIGHTS: usize = 10;
pub const DEFAULT_MAX_IMAGES: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The `(user_id, slug)` uniqueness constraint rejected the write.
    #[error("Slug '{slug}' is already taken")]
    SlugTaken { slug: String },
    #[error("Storage error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("At least one image is required")]
    NoImages,
    #[error("Too many {field}: at most {max} allowed")]
    TooMany { field: &'static str, max: usize },
    #[error("{0}")]
    Invalid(String),
    #[error("Could not allocate a free slug for '{base}' after {attempts} attempts")]
    SlugExhausted { base: String, attempts: u32 },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-fixable input problem.
    Validation,
    /// Lost the slug race; resubmitting may succeed.
    Conflict,
    /// Storage or another collaborator failed.
    Dependency,
}

impl ProductError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) | Self::NoImages | Self::TooMany { .. } | Self::Invalid(_) => {
                ErrorKind::Validation
            }
            Self::SlugExhausted { .. } | Self::Storage(StoreError::SlugTaken { .. }) => {
                ErrorKind::Conflict
            }
            Self::Storage(StoreError::Backend(_)) => ErrorKind::Dependency,
        }
    }
}

/// One row insert inside a product batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteStatement {
    InsertProduct(Product),
    InsertHighlight(ProductHighlight),
    InsertImage(ProductImage),
}

impl WriteStatement {
    pub fn product_id(&self) -> &str {
        match self {
            Self::InsertProduct(p) => &p.id,
            Self::InsertHighlight(h) => &h.product_id,
            Self::InsertImage(i) => &i.product_id,
        }
    }
}

/// Commits an ordered list of statements.
pub trait BatchWriter {
    fn write_batch(&self, statements: &[WriteStatement]) -> Result<(), StoreError>;

    /// Whether a failed batch is guaranteed to leave nothing behind.
    fn is_atomic(&self) -> bool {
        true
    }

    /// Removes every row belonging to `product_id`. Used to clean up after a
    /// failed batch on writers that are not atomic.
    fn purge_product(&self, product_id: &str) -> Result<(), StoreError>;
}

pub trait ProductStore: SlugRegistry + BatchWriter {}

impl<T: SlugRegistry + BatchWriter + ?Sized> ProductStore for T {}

#[derive(Debug, Clone, Copy)]
pub struct CreateLimits {
    pub max_highlights: usize,
    pub max_images: usize,
    pub slug_attempts: u32,
}

impl Default for CreateLimits {
    fn default() -> Self {
        Self {
            max_highlights: DEFAULT_MAX_HIGHLIGHTS,
            max_images: DEFAULT_MAX_IMAGES,
            slug_attempts: DEFAULT_SLUG_ATTEMPTS,
        }
    }
}

/// Input that passed validation, ready to be turned into rows.
#[derive(Debug, Clone)]
struct ProductDraft {
    title: String,
    price: String,
    currency: Currency,
    description: Option<String>,
    highlights: Vec<String>,
    contact_method: ContactMethod,
    contact_value: String,
    video_url: Option<String>,
    images: Vec<UploadedImage>,
    status: ProductStatus,
}

fn required(value: String, field: &'static str) -> Result<String, ProductError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProductError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProductDraft {
    fn validate(
        input: CreateProduct,
        owner: &str,
        limits: &CreateLimits,
    ) -> Result<Self, ProductError> {
        let title = required(input.title, "title")?;
        let price = required(input.price, "price")?;

        let highlights: Vec<String> = input
            .highlights
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if highlights.is_empty() {
            return Err(ProductError::MissingField("highlights"));
        }
        if highlights.len() > limits.max_highlights {
            return Err(ProductError::TooMany {
                field: "highlights",
                max: limits.max_highlights,
            });
        }

        let contact_method = input
            .contact_method
            .ok_or(ProductError::MissingField("contactMethod"))?;
        let contact_value = required(input.contact_value, "contactValue")?;

        if input.images.is_empty() {
            return Err(ProductError::NoImages);
        }
        if input.images.len() > limits.max_images {
            return Err(ProductError::TooMany {
                field: "images",
                max: limits.max_images,
            });
        }
        if input
            .images
            .iter()
            .any(|i| i.storage_key.trim().is_empty() || i.cdn_url.trim().is_empty())
        {
            return Err(ProductError::Invalid(
                "Every image needs a storageKey and a cdnUrl".to_string(),
            ));
        }
        let prefix = format!("{}/", owner);
        for image in &input.images {
            if !image.storage_key.starts_with(&prefix) || image.storage_key.contains("..") {
                return Err(ProductError::Invalid(format!(
                    "Image {} does not belong to this account",
                    image.storage_key
                )));
            }
            if !is_http_url(&image.cdn_url) {
                return Err(ProductError::Invalid(
                    "cdnUrl must be an http(s) address".to_string(),
                ));
            }
        }

        let video_url = optional(input.video_url);
        if let Some(url) = &video_url {
            if !is_http_url(url) {
                return Err(ProductError::Invalid(
                    "videoUrl must be an http(s) address".to_string(),
                ));
            }
        }

        Ok(Self {
            title,
            price,
            currency: input.currency.unwrap_or_default(),
            description: optional(input.description),
            highlights,
            contact_method,
            contact_value,
            video_url,
            images: input.images,
            status: input.status.unwrap_or_default(),
        })
    }

    /// Builds the product value and the statements that write it. All rows
    /// share one id and one timestamp.
    fn build(&self, owner: &str, slug: &str) -> (Product, Vec<WriteStatement>) {
        let product_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let product = Product {
            id: product_id.clone(),
            user_id: owner.to_string(),
            slug: slug.to_string(),
            title: self.title.clone(),
            price: self.price.clone(),
            currency: self.currency,
            description: self.description.clone(),
            contact_method: self.contact_method,
            contact_value: self.contact_value.clone(),
            video_url: self.video_url.clone(),
            status: self.status,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };

        let mut statements =
            Vec::with_capacity(1 + self.highlights.len() + self.images.len());
        statements.push(WriteStatement::InsertProduct(product.clone()));

        for (order, text) in self.highlights.iter().enumerate() {
            statements.push(WriteStatement::InsertHighlight(ProductHighlight {
                id: Uuid::new_v4().to_string(),
                product_id: product_id.clone(),
                text: text.clone(),
                display_order: order as i64,
            }));
        }

        for (order, image) in self.images.iter().enumerate() {
            statements.push(WriteStatement::InsertImage(ProductImage {
                id: Uuid::new_v4().to_string(),
                product_id: product_id.clone(),
                storage_key: image.storage_key.clone(),
                cdn_url: image.cdn_url.clone(),
                display_order: order as i64,
                created_at: now,
            }));
        }

        (product, statements)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn submit<W>(writer: &W, product_id: &str, statements: &[WriteStatement]) -> Result<(), StoreError>
where
    W: BatchWriter + ?Sized,
{
    let result = writer.write_batch(statements);

    if let Err(ref err) = result {
        if !writer.is_atomic() {
            match writer.purge_product(product_id) {
                Ok(()) => tracing::warn!(
                    "Removed partial rows of product {} after failed batch: {}",
                    product_id,
                    err
                ),
                Err(cleanup) => tracing::error!(
                    "Cleanup of product {} failed ({}) after batch error: {}",
                    product_id,
                    cleanup,
                    err
                ),
            }
        }
    }

    result
}

/// Validates the input, allocates a slug and commits the product with its
/// highlights and images. A slug lost to a concurrent writer is retried with
/// the next counter value until `limits.slug_attempts` is used up.
pub fn create_product<S>(
    store: &S,
    owner: &str,
    input: CreateProduct,
    limits: &CreateLimits,
) -> Result<Product, ProductError>
where
    S: ProductStore + ?Sized,
{
    let draft = ProductDraft::validate(input, owner, limits)?;
    let base = slug::normalize(&draft.title);
    let mut next_attempt = 1;

    loop {
        let allocation =
            slug::allocate_from(&base, owner, store, next_attempt, limits.slug_attempts)?;
        let (product, statements) = draft.build(owner, &allocation.slug);

        match submit(store, &product.id, &statements) {
            Ok(()) => {
                tracing::info!(
                    "Created product {} ({}) for owner {} with {} statements",
                    product.id,
                    product.slug,
                    owner,
                    statements.len()
                );
                return Ok(product);
            }
            Err(StoreError::SlugTaken { slug }) => {
                tracing::warn!(
                    "Slug '{}' was taken concurrently for owner {}, retrying",
                    slug,
                    owner
                );
                next_attempt = allocation.attempt + 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
