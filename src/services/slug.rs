//! Slug generation for product pages.
//!
//! Titles are transliterated from Vietnamese to ASCII and collapsed into
//! hyphen-separated runs of `[a-z0-9]`. Uniqueness is per owner and is
//! checked through a [`SlugRegistry`], so allocation never touches storage
//! directly.

use super::products::{ProductError, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on candidates tried for one base slug.
pub const DEFAULT_SLUG_ATTEMPTS: u32 = 1000;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid slug regex"));

const VIETNAMESE_MAP: &[(&str, char)] = &[
    ("àáảãạăằắẳẵặâầấẩẫậ", 'a'),
    ("đ", 'd'),
    ("èéẻẽẹêềếểễệ", 'e'),
    ("ìíỉĩị", 'i'),
    ("òóỏõọôồốổỗộơờớởỡợ", 'o'),
    ("ùúủũụưừứửữự", 'u'),
    ("ỳýỷỹỵ", 'y'),
];

/// Answers whether a slug is already used by one of the owner's products.
pub trait SlugRegistry {
    fn exists(&self, slug: &str, owner: &str) -> Result<bool, StoreError>;
}

/// A free slug together with the attempt number that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub slug: String,
    pub attempt: u32,
}

fn transliterate(c: char) -> char {
    VIETNAMESE_MAP
        .iter()
        .find(|(from, _)| from.contains(c))
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

// Decomposed input carries its accents as separate code points.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

pub fn normalize(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text
        .to_lowercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .map(transliterate)
    {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

/// Candidate for the given attempt: the bare base first, then `base-2`, `base-3`, ...
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

pub fn allocate_unique_slug<R>(title: &str, owner: &str, registry: &R) -> Result<String, ProductError>
where
    R: SlugRegistry + ?Sized,
{
    let base = normalize(title);
    allocate_from(&base, owner, registry, 1, DEFAULT_SLUG_ATTEMPTS).map(|a| a.slug)
}

/// Resumable allocation: starts at `first_attempt` and gives up once
/// `max_attempts` candidates have been used up.
pub fn allocate_from<R>(
    base: &str,
    owner: &str,
    registry: &R,
    first_attempt: u32,
    max_attempts: u32,
) -> Result<Allocation, ProductError>
where
    R: SlugRegistry + ?Sized,
{
    if base.is_empty() {
        return Err(ProductError::Invalid(
            "Title must contain at least one letter or digit".to_string(),
        ));
    }

    for attempt in first_attempt.max(1)..=max_attempts {
        let slug = candidate(base, attempt);
        if !registry.exists(&slug, owner)? {
            return Ok(Allocation { slug, attempt });
        }
    }

    Err(ProductError::SlugExhausted {
        base: base.to_string(),
        attempts: max_attempts,
    })
}
