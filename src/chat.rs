// ABOUTME: Chat session management for follow-up conversations about a verdict
// ABOUTME: Holds the append-only history and issues completions for text, topic, and image turns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! # Chat Session
//!
//! An append-only conversation with the nutritionist persona. A session is
//! seeded with the scanned product and its verdict (or a free-standing
//! persona when nothing was scanned), lives entirely in memory, and is
//! discarded when the user returns home.
//!
//! A failed completion does not error the session: the user's turn stays in
//! the history and a canned assistant apology is appended, mirroring how the
//! conversation surface stays usable when the endpoint hiccups.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::llm::{prompts, ChatMessage, ChatRequest, LlmProvider, MessageRole};
use crate::models::{ChatTopic, ProductRecord, Verdict};

/// Assistant turn appended when a completion fails
const FALLBACK_REPLY: &str = "I'm having trouble answering that right now. Please try again.";

/// Model ids used by a chat session
#[derive(Debug, Clone)]
pub struct ChatModels {
    /// Model for text turns (including topic kickoff)
    pub chat: String,
    /// Model for turns carrying an image attachment
    pub vision: String,
}

/// An inlined image attachment on a user turn
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// MIME type (e.g. "image/jpeg")
    pub media_type: String,
    /// Raw image bytes
    pub data: Vec<u8>,
}

impl ImageAttachment {
    /// Encode as a base64 data URL for vision-capable models
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            BASE64.encode(&self.data)
        )
    }
}

/// One entry in the conversation history
#[derive(Debug, Clone)]
pub struct ChatEntry {
    /// Who sent it
    pub role: MessageRole,
    /// Text body
    pub content: String,
    /// Optional image attachment (user turns only)
    pub attachment: Option<ImageAttachment>,
    /// When the entry was appended
    pub sent_at: DateTime<Utc>,
}

impl ChatEntry {
    fn user(content: impl Into<String>, attachment: Option<ImageAttachment>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            attachment,
            sent_at: Utc::now(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            attachment: None,
            sent_at: Utc::now(),
        }
    }
}

/// Append-only chat session with the nutritionist persona
pub struct ChatSession {
    id: Uuid,
    provider: Arc<dyn LlmProvider>,
    models: ChatModels,
    context: Option<(ProductRecord, Verdict)>,
    history: Vec<ChatEntry>,
}

impl ChatSession {
    /// Create a session seeded with a scanned product and its verdict
    #[must_use]
    pub fn for_product(
        provider: Arc<dyn LlmProvider>,
        models: ChatModels,
        product: ProductRecord,
        verdict: Verdict,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            models,
            context: Some((product, verdict)),
            history: Vec::new(),
        }
    }

    /// Create a free-standing session with no scanned product
    #[must_use]
    pub fn freestyle(provider: Arc<dyn LlmProvider>, models: ChatModels) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            models,
            context: None,
            history: Vec::new(),
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Ordered conversation history
    #[must_use]
    pub fn history(&self) -> &[ChatEntry] {
        &self.history
    }

    /// Product context seeded into this session, if any
    #[must_use]
    pub const fn product(&self) -> Option<&(ProductRecord, Verdict)> {
        self.context.as_ref()
    }

    /// Fire the automatic prompt for a topic tile
    ///
    /// Appends the kickoff user turn and the assistant reply.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn kickoff_topic(&mut self, topic: ChatTopic) -> &ChatEntry {
        let system = match &self.context {
            Some((product, verdict)) => prompts::topic_chat_context(product, verdict, topic),
            None => prompts::freestyle_chat_context().to_owned(),
        };

        self.history
            .push(ChatEntry::user(prompts::topic_kickoff_prompt(topic), None));
        self.complete_with(system, self.models.chat.clone()).await
    }

    /// Send a text turn
    ///
    /// Appends the user turn and the assistant reply.
    #[instrument(skip(self, text), fields(session = %self.id))]
    pub async fn send_text(&mut self, text: impl Into<String>) -> &ChatEntry {
        self.history.push(ChatEntry::user(text, None));
        self.complete_with(self.system_context(), self.models.chat.clone())
            .await
    }

    /// Send an image turn, routed to the vision model
    ///
    /// Appends the user turn (caption + attachment) and the assistant reply.
    #[instrument(skip(self, attachment, caption), fields(session = %self.id))]
    pub async fn send_image(
        &mut self,
        attachment: ImageAttachment,
        caption: Option<&str>,
    ) -> &ChatEntry {
        let caption = caption.unwrap_or_else(|| prompts::image_analysis_prompt());
        self.history
            .push(ChatEntry::user(caption, Some(attachment)));
        self.complete_with(self.system_context(), self.models.vision.clone())
            .await
    }

    /// System context for regular turns
    fn system_context(&self) -> String {
        match &self.context {
            Some((product, verdict)) => prompts::product_chat_context(product, verdict),
            None => prompts::freestyle_chat_context().to_owned(),
        }
    }

    /// Issue one completion over the full history and append the reply
    ///
    /// A failure appends the fallback turn instead of surfacing an error.
    async fn complete_with(&mut self, system: String, model: String) -> &ChatEntry {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::system(system));
        for entry in &self.history {
            messages.push(match (&entry.role, &entry.attachment) {
                (MessageRole::User, Some(attachment)) => {
                    ChatMessage::user_with_image(entry.content.clone(), attachment.to_data_url())
                }
                (MessageRole::User, None) => ChatMessage::user(entry.content.clone()),
                _ => ChatMessage::assistant(entry.content.clone()),
            });
        }

        let request = ChatRequest::new(messages).with_model(model);

        let reply = match self.provider.complete(&request).await {
            Ok(response) => {
                debug!("Chat reply: {} chars", response.content.len());
                ChatEntry::assistant(response.content)
            }
            Err(e) => {
                error!("Chat completion failed: {e}");
                ChatEntry::assistant(FALLBACK_REPLY)
            }
        };

        self.history.push(reply);
        self.history.last().expect("history cannot be empty here")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::llm::MockLlmProvider;
    use crate::models::Grade;

    fn models() -> ChatModels {
        ChatModels {
            chat: "chat-model".to_owned(),
            vision: "vision-model".to_owned(),
        }
    }

    fn sample_context() -> (ProductRecord, Verdict) {
        (
            ProductRecord {
                product_name: Some("Rye Crispbread".to_owned()),
                ..ProductRecord::default()
            },
            Verdict {
                grade: Grade::A,
                reasoning: "Whole grain, low sugar.".to_owned(),
                health_risks: vec![],
            },
        )
    }

    #[tokio::test]
    async fn test_send_text_appends_both_turns() {
        let provider = Arc::new(MockLlmProvider::new().with_reply("Plenty of fiber."));
        let (product, verdict) = sample_context();
        let mut session = ChatSession::for_product(provider.clone(), models(), product, verdict);

        let reply = session.send_text("Is this good for digestion?").await;
        assert_eq!(reply.content, "Plenty of fiber.");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].role, MessageRole::User);
        assert_eq!(session.history()[1].role, MessageRole::Assistant);

        // The outgoing request carried the product context and the chat model
        let request = provider.requests().remove(0);
        assert_eq!(request.model.as_deref(), Some("chat-model"));
        assert!(request.messages[0]
            .content
            .as_text()
            .contains("Rye Crispbread"));
    }

    #[tokio::test]
    async fn test_failed_completion_appends_fallback() {
        let provider = Arc::new(
            MockLlmProvider::new().with_failure(AppError::external_service("LLM", "down")),
        );
        let (product, verdict) = sample_context();
        let mut session = ChatSession::for_product(provider, models(), product, verdict);

        let reply = session.send_text("Hello?").await;
        assert_eq!(reply.content, FALLBACK_REPLY);

        // The user's turn survived the failure
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].content, "Hello?");
    }

    #[tokio::test]
    async fn test_image_turn_routes_to_vision_model() {
        let provider = Arc::new(MockLlmProvider::new().with_reply("Looks like an apple. Grade A."));
        let mut session = ChatSession::freestyle(provider.clone(), models());

        let attachment = ImageAttachment {
            media_type: "image/png".to_owned(),
            data: vec![1, 2, 3],
        };
        session.send_image(attachment, None).await;

        let request = provider.requests().remove(0);
        assert_eq!(request.model.as_deref(), Some("vision-model"));
        assert!(request.has_image());
    }

    #[tokio::test]
    async fn test_topic_kickoff_uses_topic_context() {
        let provider = Arc::new(MockLlmProvider::new().with_reply("Sugar dominates the macros."));
        let (product, verdict) = sample_context();
        let mut session = ChatSession::for_product(provider.clone(), models(), product, verdict);

        session.kickoff_topic(ChatTopic::Nutrition).await;

        let request = provider.requests().remove(0);
        assert!(request.messages[0]
            .content
            .as_text()
            .contains("interested in nutrition"));
        assert_eq!(
            session.history()[0].content,
            prompts::topic_kickoff_prompt(ChatTopic::Nutrition)
        );
    }

    #[tokio::test]
    async fn test_history_is_append_only_and_ordered() {
        let provider = Arc::new(
            MockLlmProvider::new()
                .with_reply("First answer.")
                .with_reply("Second answer."),
        );
        let mut session = ChatSession::freestyle(provider, models());

        session.send_text("one").await;
        session.send_text("two").await;

        let contents: Vec<_> = session
            .history()
            .iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(
            contents,
            vec!["one", "First answer.", "two", "Second answer."]
        );
    }

    #[test]
    fn test_attachment_data_url() {
        let attachment = ImageAttachment {
            media_type: "image/jpeg".to_owned(),
            data: b"abc".to_vec(),
        };
        assert_eq!(attachment.to_data_url(), "data:image/jpeg;base64,YWJj");
    }
}
