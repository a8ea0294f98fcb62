// AI implementation using OpenAI
//
// Infrastructure implementations of BaseEmbeddingService and BaseAssetGenerator.
// What to do with the results (truncation, persistence) lives in the domain layer.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use openai_client::{
    extract_json_object, ChatRequest, ContentPart, ImageRequest, Message, OpenAIClient,
    OpenAIError,
};
use serde::Deserialize;

use super::{BaseAssetGenerator, BaseEmbeddingService, GeneratedAsset, GeneratedVisual};
use crate::config::AssetMode;

// =============================================================================
// Embeddings
// =============================================================================

/// Embedding gateway backed by the OpenAI embeddings endpoint
#[derive(Clone)]
pub struct OpenAIEmbeddingService {
    client: OpenAIClient,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingService {
    pub fn new(client: OpenAIClient, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
        }
    }

    /// Only text-embedding-3 models accept an explicit `dimensions` parameter.
    fn requested_dimensions(&self) -> Option<u32> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dimensions as u32)
    }
}

#[async_trait]
impl BaseEmbeddingService for OpenAIEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .client
            .create_embedding(text, &self.model, self.requested_dimensions())
            .await
            .map_err(|e| log_openai_error(e, &self.model))
            .context("Failed to create embedding")?;

        if embedding.len() != self.dimensions {
            return Err(anyhow!(
                "embedding model {} returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                self.dimensions
            ));
        }

        Ok(embedding)
    }
}

// =============================================================================
// Visual asset generation
// =============================================================================

const GLYPH_PROMPT: &str = "\
Look at the photo and pick the single emoji that best captures its main subject, \
activity, outfit and emotion. Only use what is actually visible. \
Reply with a JSON object: {\"emoji\": \"<one emoji>\", \"description\": \"<plain text, 50 characters or less>\"}";

const STICKER_PROMPT: &str = "\
Look at the photo and describe a social media sticker that captures its main subject, \
activity, outfit and emotion. Only use what is actually visible. \
Reply with a JSON object: {\"emoji\": \"<closest single emoji>\", \"description\": \"<plain text, 50 characters or less>\"}";

/// Shape the vision model is asked to reply with.
#[derive(Debug, Deserialize, PartialEq)]
pub struct VisionReply {
    pub emoji: String,
    pub description: String,
}

/// Parse the vision model's reply, tolerating prose or code fences around the JSON.
pub fn parse_vision_reply(content: &str) -> Result<VisionReply> {
    let json = extract_json_object(content)
        .ok_or_else(|| anyhow!("No valid JSON found in model response"))?;

    let reply: VisionReply =
        serde_json::from_str(json).context("Invalid response format from model")?;

    if reply.emoji.trim().is_empty() || reply.description.trim().is_empty() {
        return Err(anyhow!("Model response is missing emoji or description"));
    }

    Ok(VisionReply {
        emoji: reply.emoji.trim().to_string(),
        description: reply.description.trim().to_string(),
    })
}

fn sticker_image_prompt(reply: &VisionReply) -> String {
    format!(
        "A single glossy sticker in the style of Apple emoji, inspired by {} : {}. \
         Centered, transparent background, no text.",
        reply.emoji, reply.description
    )
}

/// Asset generator backed by OpenAI vision (and image generation for stickers)
#[derive(Clone)]
pub struct OpenAIAssetGenerator {
    client: OpenAIClient,
    vision_model: String,
    image_model: String,
    mode: AssetMode,
}

impl OpenAIAssetGenerator {
    pub fn new(
        client: OpenAIClient,
        vision_model: impl Into<String>,
        image_model: impl Into<String>,
        mode: AssetMode,
    ) -> Self {
        Self {
            client,
            vision_model: vision_model.into(),
            image_model: image_model.into(),
            mode,
        }
    }

    async fn describe(&self, image: &[u8], mime_type: &str) -> Result<VisionReply> {
        let prompt = match self.mode {
            AssetMode::Glyph => GLYPH_PROMPT,
            AssetMode::ImageAsset => STICKER_PROMPT,
        };

        let request = ChatRequest::new(&self.vision_model)
            .message(Message::user_parts(vec![
                ContentPart::text(prompt),
                ContentPart::inline_image(image, mime_type),
            ]))
            .json_object()
            .completion_limit(300);

        tracing::info!(
            model = %self.vision_model,
            image_bytes = image.len(),
            mime_type,
            "Calling OpenAI vision"
        );

        let response = self
            .client
            .chat_completion(request)
            .await
            .map_err(|e| log_openai_error(e, &self.vision_model))
            .context("Failed to call OpenAI vision")?;

        tracing::debug!(
            response_length = response.content.len(),
            "OpenAI vision response received"
        );

        parse_vision_reply(&response.content)
    }
}

#[async_trait]
impl BaseAssetGenerator for OpenAIAssetGenerator {
    async fn generate(&self, image: &[u8], mime_type: &str) -> Result<GeneratedAsset> {
        let reply = self.describe(image, mime_type).await?;

        let visual = match self.mode {
            AssetMode::Glyph => GeneratedVisual::Glyph(reply.emoji.clone()),
            AssetMode::ImageAsset => {
                let bytes = self
                    .client
                    .generate_image(
                        ImageRequest::new(&self.image_model, sticker_image_prompt(&reply))
                            .size("1024x1024")
                            .transparent(),
                    )
                    .await
                    .map_err(|e| log_openai_error(e, &self.image_model))
                    .context("Failed to generate sticker image")?;

                GeneratedVisual::Image {
                    bytes,
                    content_type: "image/png".to_string(),
                }
            }
        };

        Ok(GeneratedAsset {
            visual,
            description: reply.description,
        })
    }
}

fn log_openai_error(error: OpenAIError, model: &str) -> OpenAIError {
    tracing::error!(
        error = %error,
        model,
        transport = error.is_transport(),
        "OpenAI API call failed"
    );
    error
}
