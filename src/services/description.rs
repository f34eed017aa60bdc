//! LLM-written product descriptions. Optional and independent of product
//! creation: a failure here only means the seller writes their own text.

use crate::config::AiConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("Missing required fields: title, price, and highlights are required")]
    MissingFields,
    #[error("Description generation is not configured")]
    Disabled,
    #[error("Description provider timed out")]
    Timeout,
    #[error("Description provider failed: {0}")]
    Provider(String),
    #[error("Failed to generate description")]
    Empty,
}

impl DescriptionRequest {
    fn highlights(&self) -> Vec<&str> {
        self.highlights
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), DescriptionError> {
        if self.title.trim().is_empty() || self.price.trim().is_empty() || self.highlights().is_empty()
        {
            return Err(DescriptionError::MissingFields);
        }
        Ok(())
    }
}

pub fn build_prompt(request: &DescriptionRequest) -> String {
    format!(
        "Bạn là copywriter chuyên viết mô tả sản phẩm cho thị trường Việt Nam.

Thông tin sản phẩm:
- Tên: {title}
- Giá: {price} {currency}
- Điểm nổi bật: {highlights}

Yêu cầu viết mô tả:
1. Độ dài: 150-200 từ
2. Tập trung vào lợi ích của khách hàng, không chỉ mô tả tính năng
3. Tone: Thân thiện, chuyên nghiệp, dễ hiểu
4. Kết thúc bằng một call-to-action mềm mại (không aggressive)
5. KHÔNG sử dụng emoji
6. KHÔNG viết quá hoa mỹ hoặc phức tạp
7. Viết bằng tiếng Việt tự nhiên

Hãy viết mô tả sản phẩm:",
        title = request.title.trim(),
        price = request.price.trim(),
        currency = request.currency.trim(),
        highlights = request.highlights().join(", "),
    )
}

#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Returns raw model output for an already validated request.
    async fn generate(&self, request: &DescriptionRequest) -> Result<String, DescriptionError>;
}

/// Validates the request, asks the generator and rejects blank output.
pub async fn describe(
    generator: &dyn DescriptionGenerator,
    request: &DescriptionRequest,
) -> Result<String, DescriptionError> {
    request.validate()?;
    let text = generator.generate(request).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(DescriptionError::Empty);
    }
    Ok(text.to_string())
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

/// Client for the Anthropic Messages API.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicGenerator {
    pub fn new(config: &AiConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("showcase/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

fn provider_error(err: reqwest::Error) -> DescriptionError {
    if err.is_timeout() {
        DescriptionError::Timeout
    } else {
        DescriptionError::Provider(err.to_string())
    }
}

#[async_trait]
impl DescriptionGenerator for AnthropicGenerator {
    async fn generate(&self, request: &DescriptionRequest) -> Result<String, DescriptionError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: build_prompt(request),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(provider_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!("Description provider returned {}: {}", status, detail);
            return Err(DescriptionError::Provider(format!("status {}", status)));
        }

        let parsed: MessagesResponse = response.json().await.map_err(provider_error)?;
        Ok(parsed.first_text().unwrap_or_default().to_string())
    }
}
