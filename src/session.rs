// ABOUTME: Screen-flow controller for the scan-to-verdict session
// ABOUTME: Owns view state, drives lookup and grading, and emits alert/haptic effects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! # Scan Session Controller
//!
//! The controller behind the screen flow: home → scan → confirm → analyzing
//! → result card → chat. It owns the only view state (the current
//! [`Screen`]) plus the transient product/verdict/chat data, drives the
//! product lookup and grading calls, and reports presentation side effects
//! (blocking alerts, haptic feedback) as [`UiEffect`] values for a frontend
//! to execute.
//!
//! Failure discipline is uniform and shallow: a rejected call is caught,
//! logged, surfaced as one alert effect, and the screen resets to a
//! known-good screen (home or scan). All state is in-memory and is discarded
//! by [`ScanSession::reset`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, instrument, warn};

use crate::chat::{ChatEntry, ChatModels, ChatSession, ImageAttachment};
use crate::config::LlmConfig;
use crate::errors::ErrorCode;
use crate::external::ProductSource;
use crate::grading::GradingEngine;
use crate::llm::LlmProvider;
use crate::models::{ChatTopic, ProductRecord, Verdict};

/// Vibration pattern (milliseconds) emitted for poor grades
pub const BAD_GRADE_HAPTIC_PATTERN_MS: &[u64] = &[500, 200, 500];

/// Alert shown when a barcode is not in the database
const NOT_FOUND_ALERT: &str = "Product not found. Try scanning again.";

/// Alert shown when the product lookup fails outright
const LOOKUP_FAILED_ALERT: &str = "Unable to fetch product data.";

/// Alert shown when the grading call fails
const ANALYSIS_FAILED_ALERT: &str = "Analysis failed. Please try again.";

/// The screen currently rendered
///
/// Exactly one is current at any time; this is the only view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Landing screen
    Home,
    /// Barcode scanner
    Scan,
    /// Product confirmation card
    Confirm,
    /// Grading in progress
    Analyzing,
    /// Verdict card
    ResultCard,
    /// Chat with the nutritionist persona
    Chat,
}

/// A presentation side effect for the frontend to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    /// Show a blocking alert with this message
    Alert(String),
    /// Fire haptic feedback with this vibration pattern (ms on/off/on)
    Haptic(&'static [u64]),
}

/// Transient view data guarded by the state lock
#[derive(Debug)]
struct ViewState {
    screen: Screen,
    product: Option<ProductRecord>,
    verdict: Option<Verdict>,
    topic: Option<ChatTopic>,
}

impl ViewState {
    const fn new() -> Self {
        Self {
            screen: Screen::Home,
            product: None,
            verdict: None,
            topic: None,
        }
    }
}

/// Screen-flow controller for one scan-to-verdict session
pub struct ScanSession {
    products: Arc<dyn ProductSource>,
    provider: Arc<dyn LlmProvider>,
    grading: GradingEngine,
    chat_models: ChatModels,
    state: Mutex<ViewState>,
    chat: tokio::sync::Mutex<Option<ChatSession>>,
    /// Re-entrancy guard: one lookup/analysis in flight at a time.
    /// Cleared when the in-flight call completes.
    busy: AtomicBool,
}

impl ScanSession {
    /// Create a controller over a product source and an LLM provider
    #[must_use]
    pub fn new(
        products: Arc<dyn ProductSource>,
        provider: Arc<dyn LlmProvider>,
        llm_config: &LlmConfig,
    ) -> Self {
        let grading = GradingEngine::new(provider.clone(), llm_config.grading_model.clone());
        let chat_models = ChatModels {
            chat: llm_config.chat_model.clone(),
            vision: llm_config.vision_model.clone(),
        };

        Self {
            products,
            provider,
            grading,
            chat_models,
            state: Mutex::new(ViewState::new()),
            chat: tokio::sync::Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The screen currently rendered
    #[must_use]
    pub fn screen(&self) -> Screen {
        self.state().screen
    }

    /// The looked-up product, if any
    #[must_use]
    pub fn product(&self) -> Option<ProductRecord> {
        self.state().product.clone()
    }

    /// The grading verdict, if any
    #[must_use]
    pub fn verdict(&self) -> Option<Verdict> {
        self.state().verdict.clone()
    }

    /// The selected chat topic, if any
    #[must_use]
    pub fn topic(&self) -> Option<ChatTopic> {
        self.state().topic
    }

    /// Snapshot of the chat history (empty when no chat is open)
    pub async fn chat_history(&self) -> Vec<ChatEntry> {
        self.chat
            .lock()
            .await
            .as_ref()
            .map(|session| session.history().to_vec())
            .unwrap_or_default()
    }

    /// Switch to the scanner screen
    ///
    /// Allowed from home, the confirmation card, and the result card.
    pub fn start_scanning(&self) {
        let mut state = self.state();
        match state.screen {
            Screen::Home | Screen::Confirm | Screen::ResultCard => {
                state.screen = Screen::Scan;
            }
            other => warn!("Ignoring scan request from {other:?}"),
        }
    }

    /// Handle a decoded barcode from the scanner
    ///
    /// Issues exactly one product lookup. A decode arriving while a lookup
    /// or analysis is already in flight is ignored.
    #[instrument(skip(self))]
    pub async fn submit_barcode(&self, barcode: &str) -> Vec<UiEffect> {
        if self.state().screen != Screen::Scan {
            debug!("Ignoring barcode outside the scanner screen");
            return Vec::new();
        }

        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Ignoring barcode {barcode}: a call is already in flight");
            return Vec::new();
        }

        let result = self.products.product_by_barcode(barcode).await;

        let effects = {
            let mut state = self.state();
            match result {
                Ok(product) => {
                    debug!("Lookup hit: {}", product.display_name());
                    state.product = Some(product);
                    state.screen = Screen::Confirm;
                    Vec::new()
                }
                Err(e)
                    if matches!(
                        e.code,
                        ErrorCode::ResourceNotFound | ErrorCode::InvalidInput
                    ) =>
                {
                    warn!("Barcode {barcode} rejected: {e}");
                    state.screen = Screen::Scan;
                    vec![UiEffect::Alert(NOT_FOUND_ALERT.to_owned())]
                }
                Err(e) => {
                    error!("Product lookup failed: {e}");
                    state.screen = Screen::Scan;
                    vec![UiEffect::Alert(LOOKUP_FAILED_ALERT.to_owned())]
                }
            }
        };

        self.busy.store(false, Ordering::SeqCst);
        effects
    }

    /// Confirm the looked-up product and run the grading call
    ///
    /// Moves to the analyzing screen, issues exactly one grading request,
    /// and lands on the result card. A poor grade (C, D, F) adds a haptic
    /// effect. On failure the screen returns home with no verdict left
    /// behind.
    #[instrument(skip(self))]
    pub async fn confirm_product(&self) -> Vec<UiEffect> {
        let product = {
            let state = self.state();
            if state.screen != Screen::Confirm {
                debug!("Ignoring confirm outside the confirmation screen");
                return Vec::new();
            }
            match state.product.clone() {
                Some(product) => product,
                None => {
                    warn!("Confirmation screen with no product; ignoring");
                    return Vec::new();
                }
            }
        };

        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Ignoring confirm: a call is already in flight");
            return Vec::new();
        }

        self.state().screen = Screen::Analyzing;

        let result = self.grading.grade(&product).await;

        let effects = {
            let mut state = self.state();
            match result {
                Ok(verdict) => {
                    let mut effects = Vec::new();
                    if verdict.grade.is_poor() {
                        effects.push(UiEffect::Haptic(BAD_GRADE_HAPTIC_PATTERN_MS));
                    }
                    debug!("Graded {}: {}", product.display_name(), verdict.grade);
                    state.verdict = Some(verdict);
                    state.screen = Screen::ResultCard;
                    effects
                }
                Err(e) => {
                    error!("Grading failed: {e}");
                    state.verdict = None;
                    state.screen = Screen::Home;
                    vec![UiEffect::Alert(ANALYSIS_FAILED_ALERT.to_owned())]
                }
            }
        };

        self.busy.store(false, Ordering::SeqCst);
        effects
    }

    /// Discard the pending product and go back to the scanner
    pub fn retry_scan(&self) {
        let mut state = self.state();
        if state.screen == Screen::Confirm {
            state.product = None;
            state.screen = Screen::Scan;
        }
    }

    /// Open the chat screen
    ///
    /// From the result card the session is seeded with the product and
    /// verdict; from home it is a free-standing conversation. Selecting a
    /// topic fires its kickoff prompt automatically.
    #[instrument(skip(self))]
    pub async fn open_chat(&self, topic: Option<ChatTopic>) {
        let context = {
            let mut state = self.state();
            match state.screen {
                Screen::Home | Screen::ResultCard => {}
                other => {
                    warn!("Ignoring chat request from {other:?}");
                    return;
                }
            }
            state.topic = topic;
            state.screen = Screen::Chat;
            state.product.clone().zip(state.verdict.clone())
        };

        let mut chat = self.chat.lock().await;
        let has_context = context.is_some();
        let session = match context {
            Some((product, verdict)) => ChatSession::for_product(
                self.provider.clone(),
                self.chat_models.clone(),
                product,
                verdict,
            ),
            None => ChatSession::freestyle(self.provider.clone(), self.chat_models.clone()),
        };
        let session = chat.insert(session);

        if let (Some(topic), true) = (topic, has_context) {
            session.kickoff_topic(topic).await;
        }
    }

    /// Send a text turn in the open chat
    ///
    /// Returns the assistant's reply, or `None` when no chat is open.
    pub async fn send_chat_text(&self, text: &str) -> Option<ChatEntry> {
        if self.state().screen != Screen::Chat {
            return None;
        }
        let mut chat = self.chat.lock().await;
        let session = chat.as_mut()?;
        Some(session.send_text(text).await.clone())
    }

    /// Send an image turn in the open chat
    ///
    /// Returns the assistant's reply, or `None` when no chat is open.
    pub async fn send_chat_image(
        &self,
        attachment: ImageAttachment,
        caption: Option<&str>,
    ) -> Option<ChatEntry> {
        if self.state().screen != Screen::Chat {
            return None;
        }
        let mut chat = self.chat.lock().await;
        let session = chat.as_mut()?;
        Some(session.send_image(attachment, caption).await.clone())
    }

    /// Return home, discarding the product, verdict, topic, and chat history
    pub async fn reset(&self) {
        {
            let mut state = self.state();
            state.product = None;
            state.verdict = None;
            state.topic = None;
            state.screen = Screen::Home;
        }
        *self.chat.lock().await = None;
        self.busy.store(false, Ordering::SeqCst);
        debug!("Session reset to home");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::external::MockProductSource;
    use crate::llm::MockLlmProvider;
    use crate::models::Nutriments;

    fn llm_config() -> LlmConfig {
        LlmConfig {
            base_url: "https://example.test/v1".to_owned(),
            api_key: "key".to_owned(),
            grading_model: "grader".to_owned(),
            chat_model: "chatter".to_owned(),
            vision_model: "seer".to_owned(),
        }
    }

    fn sample_product() -> ProductRecord {
        ProductRecord {
            product_name: Some("Granola".to_owned()),
            nutriments: Nutriments {
                sugars_100g: Some(18.0),
                ..Nutriments::default()
            },
            ..ProductRecord::default()
        }
    }

    #[tokio::test]
    async fn test_happy_path_flow() {
        let products =
            Arc::new(MockProductSource::new().with_product("40084077", sample_product()));
        let provider = Arc::new(MockLlmProvider::new().with_reply(
            r#"{"grade": "B", "reasoning": "Decent.", "health_risks": []}"#,
        ));
        let session = ScanSession::new(products, provider, &llm_config());

        assert_eq!(session.screen(), Screen::Home);
        session.start_scanning();
        assert_eq!(session.screen(), Screen::Scan);

        let effects = session.submit_barcode("40084077").await;
        assert!(effects.is_empty());
        assert_eq!(session.screen(), Screen::Confirm);
        assert!(session.product().is_some());

        let effects = session.confirm_product().await;
        assert!(effects.is_empty());
        assert_eq!(session.screen(), Screen::ResultCard);
        assert!(session.verdict().is_some());
    }

    #[tokio::test]
    async fn test_barcode_ignored_off_scan_screen() {
        let products = Arc::new(MockProductSource::new());
        let provider = Arc::new(MockLlmProvider::new());
        let session = ScanSession::new(products.clone(), provider, &llm_config());

        let effects = session.submit_barcode("40084077").await;
        assert!(effects.is_empty());
        assert_eq!(products.lookup_count(), 0);
    }
}
