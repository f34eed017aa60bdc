use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    #[serde(rename = "VNĐ")]
    Vnd,
    #[serde(rename = "USD")]
    Usd,
}

impl FromStr for Currency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VNĐ" => Ok(Self::Vnd),
            "USD" => Ok(Self::Usd),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vnd => write!(f, "VNĐ"),
            Self::Usd => write!(f, "USD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    Zalo,
    Whatsapp,
    Phone,
}

impl ContactMethod {
    /// Link the contact button points at.
    pub fn link(&self, value: &str) -> String {
        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        match self {
            Self::Zalo => format!("https://zalo.me/{}", digits),
            Self::Whatsapp => format!("https://wa.me/{}", digits),
            Self::Phone => {
                if value.trim_start().starts_with('+') {
                    format!("tel:+{}", digits)
                } else {
                    format!("tel:{}", digits)
                }
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Zalo => "Nhắn Zalo",
            Self::Whatsapp => "Nhắn WhatsApp",
            Self::Phone => "Gọi điện",
        }
    }
}

impl FromStr for ContactMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zalo" => Ok(Self::Zalo),
            "whatsapp" => Ok(Self::Whatsapp),
            "phone" => Ok(Self::Phone),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ContactMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zalo => write!(f, "zalo"),
            Self::Whatsapp => write!(f, "whatsapp"),
            Self::Phone => write!(f, "phone"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
}

impl FromStr for ProductStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub user_id: String,
    pub slug: String,
    pub title: String,
    pub price: String,
    pub currency: Currency,
    pub description: Option<String>,
    pub contact_method: ContactMethod,
    pub contact_value: String,
    pub video_url: Option<String>,
    pub status: ProductStatus,
    pub view_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHighlight {
    pub id: String,
    pub product_id: String,
    pub text: String,
    pub display_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: String,
    pub product_id: String,
    pub storage_key: String,
    pub cdn_url: String,
    pub display_order: i64,
    pub created_at: i64,
}

/// Owner fields exposed on a public product page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOwner {
    pub username: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithDetails {
    #[serde(flatten)]
    pub product: Product,
    pub highlights: Vec<ProductHighlight>,
    pub images: Vec<ProductImage>,
    pub user: ProductOwner,
}

/// Reference to an image already placed in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    #[serde(alias = "r2Key")]
    pub storage_key: String,
    pub cdn_url: String,
}

/// Body of a product creation request. Every field is optional on the wire
/// so that omissions surface as validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    pub currency: Option<Currency>,
    pub description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    pub contact_method: Option<ContactMethod>,
    #[serde(default)]
    pub contact_value: String,
    pub video_url: Option<String>,
    #[serde(default)]
    pub images: Vec<UploadedImage>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStats {
    pub total_products: i64,
    pub total_views: i64,
}
