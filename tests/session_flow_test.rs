// ABOUTME: Integration tests for the scan-to-verdict screen flow
// ABOUTME: Exercises the ScanSession controller against scripted product and LLM mocks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use nutrijudge::errors::AppError;
use nutrijudge::external::{MockProductSource, ProductSource};
use nutrijudge::llm::{MockLlmProvider, MessageRole};
use nutrijudge::models::{ChatTopic, Grade, ProductRecord};
use nutrijudge::session::{ScanSession, Screen, UiEffect, BAD_GRADE_HAPTIC_PATTERN_MS};

use common::{cereal_product, init_test_logging, test_llm_config, verdict_reply};

const BARCODE: &str = "7622300336738";

fn session_with(
    products: Arc<dyn ProductSource>,
    provider: Arc<MockLlmProvider>,
) -> ScanSession {
    init_test_logging();
    ScanSession::new(products, provider, &test_llm_config())
}

fn stocked_source() -> Arc<MockProductSource> {
    Arc::new(MockProductSource::new().with_product(BARCODE, cereal_product()))
}

/// Drive home → scan → confirm for a stocked barcode
async fn scan_to_confirm(session: &ScanSession) {
    session.start_scanning();
    let effects = session.submit_barcode(BARCODE).await;
    assert!(effects.is_empty(), "clean lookup should emit no effects");
    assert_eq!(session.screen(), Screen::Confirm);
}

#[tokio::test]
async fn unrecognized_barcode_alerts_and_returns_to_scan() {
    let provider = Arc::new(MockLlmProvider::new());
    let session = session_with(Arc::new(MockProductSource::new()), provider.clone());

    session.start_scanning();
    let effects = session.submit_barcode("0000000000000").await;

    assert_eq!(effects.len(), 1);
    assert!(
        matches!(&effects[0], UiEffect::Alert(msg) if msg.contains("not found")),
        "expected a not-found alert, got {effects:?}"
    );
    assert_eq!(session.screen(), Screen::Scan);
    assert!(session.product().is_none());
    // No grading request went out for a failed lookup
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn transport_failure_alerts_and_returns_to_scan() {
    let provider = Arc::new(MockLlmProvider::new());
    let session = session_with(Arc::new(MockProductSource::failing()), provider);

    session.start_scanning();
    let effects = session.submit_barcode(BARCODE).await;

    assert_eq!(effects.len(), 1);
    assert!(matches!(&effects[0], UiEffect::Alert(_)));
    assert_eq!(session.screen(), Screen::Scan);
}

#[tokio::test]
async fn successful_lookup_and_confirm_issue_exactly_one_grading_request() {
    let provider = Arc::new(MockLlmProvider::new().with_reply(verdict_reply("B")));
    let session = session_with(stocked_source(), provider.clone());

    scan_to_confirm(&session).await;
    session.confirm_product().await;

    assert_eq!(session.screen(), Screen::ResultCard);
    assert_eq!(provider.request_count(), 1);

    // The one request is the grading call: JSON mode, grading model,
    // rubric system prompt, product payload
    let request = provider.requests().remove(0);
    assert_eq!(request.model.as_deref(), Some("grader-model"));
    assert!(request.response_format.is_some());
    assert!(request.messages[1]
        .content
        .as_text()
        .contains("Choco Crunch Cereal"));
}

#[tokio::test]
async fn poor_grades_emit_one_haptic_effect() {
    for grade in ["C", "D", "F"] {
        let provider = Arc::new(MockLlmProvider::new().with_reply(verdict_reply(grade)));
        let session = session_with(stocked_source(), provider);

        scan_to_confirm(&session).await;
        let effects = session.confirm_product().await;

        let haptics: Vec<_> = effects
            .iter()
            .filter(|e| matches!(e, UiEffect::Haptic(_)))
            .collect();
        assert_eq!(haptics.len(), 1, "grade {grade} should vibrate once");
        assert_eq!(
            haptics[0],
            &UiEffect::Haptic(BAD_GRADE_HAPTIC_PATTERN_MS),
            "grade {grade} should use the bad-grade pattern"
        );
    }
}

#[tokio::test]
async fn good_grades_emit_no_haptic_effect() {
    for grade in ["S", "A", "B"] {
        let provider = Arc::new(MockLlmProvider::new().with_reply(verdict_reply(grade)));
        let session = session_with(stocked_source(), provider);

        scan_to_confirm(&session).await;
        let effects = session.confirm_product().await;

        assert!(
            effects.iter().all(|e| !matches!(e, UiEffect::Haptic(_))),
            "grade {grade} should not vibrate"
        );
    }
}

#[tokio::test]
async fn reset_discards_all_session_state() {
    let provider = Arc::new(
        MockLlmProvider::new()
            .with_reply(verdict_reply("F"))
            .with_reply("It is mostly sugar."),
    );
    let session = session_with(stocked_source(), provider);

    scan_to_confirm(&session).await;
    session.confirm_product().await;
    session.open_chat(Some(ChatTopic::Health)).await;
    assert!(!session.chat_history().await.is_empty());

    session.reset().await;

    assert_eq!(session.screen(), Screen::Home);
    assert!(session.product().is_none());
    assert!(session.verdict().is_none());
    assert!(session.topic().is_none());
    assert!(session.chat_history().await.is_empty());
}

#[tokio::test]
async fn failed_grading_returns_home_without_partial_verdict() {
    let provider = Arc::new(
        MockLlmProvider::new()
            .with_failure(AppError::external_service("LLM", "endpoint down")),
    );
    let session = session_with(stocked_source(), provider);

    scan_to_confirm(&session).await;
    let effects = session.confirm_product().await;

    assert_eq!(session.screen(), Screen::Home);
    assert!(session.verdict().is_none());
    assert_eq!(effects.len(), 1);
    assert!(matches!(&effects[0], UiEffect::Alert(_)));
}

#[tokio::test]
async fn malformed_grading_json_behaves_like_a_failed_call() {
    let provider =
        Arc::new(MockLlmProvider::new().with_reply("Grade: B. Looks fine to me overall!"));
    let session = session_with(stocked_source(), provider);

    scan_to_confirm(&session).await;
    let effects = session.confirm_product().await;

    assert_eq!(session.screen(), Screen::Home);
    assert!(session.verdict().is_none());
    assert!(matches!(&effects[0], UiEffect::Alert(_)));
}

/// Product source that parks each lookup long enough to overlap another
struct SlowSource {
    inner: MockProductSource,
    delay: Duration,
}

#[async_trait]
impl ProductSource for SlowSource {
    async fn product_by_barcode(&self, barcode: &str) -> Result<ProductRecord, AppError> {
        sleep(self.delay).await;
        self.inner.product_by_barcode(barcode).await
    }
}

#[tokio::test]
async fn second_decode_while_lookup_in_flight_is_ignored() {
    let source = Arc::new(SlowSource {
        inner: MockProductSource::new().with_product(BARCODE, cereal_product()),
        delay: Duration::from_millis(50),
    });
    let provider = Arc::new(MockLlmProvider::new());
    let session = session_with(source.clone(), provider);

    session.start_scanning();
    // The scanner fires the same decode twice in quick succession
    let (first, second) = tokio::join!(
        session.submit_barcode(BARCODE),
        session.submit_barcode(BARCODE),
    );

    assert_eq!(source.inner.lookup_count(), 1, "only one lookup may go out");
    assert!(first.is_empty() && second.is_empty());
    assert_eq!(session.screen(), Screen::Confirm);
}

#[tokio::test]
async fn guard_clears_after_completion_allowing_the_next_scan() {
    let provider = Arc::new(MockLlmProvider::new());
    let session = session_with(Arc::new(MockProductSource::new()), provider);

    session.start_scanning();
    session.submit_barcode("1111111111111").await;
    assert_eq!(session.screen(), Screen::Scan);

    // The guard reset on completion, so a fresh decode goes through
    let effects = session.submit_barcode("2222222222222").await;
    assert_eq!(effects.len(), 1, "second scan must not be swallowed");
}

#[tokio::test]
async fn chat_failure_appends_apology_and_keeps_the_user_turn() {
    let provider = Arc::new(
        MockLlmProvider::new()
            .with_reply(verdict_reply("C"))
            .with_failure(AppError::external_service("LLM", "down")),
    );
    let session = session_with(stocked_source(), provider);

    scan_to_confirm(&session).await;
    session.confirm_product().await;
    session.open_chat(None).await;

    let reply = session.send_chat_text("Is this safe for kids?").await.unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert!(reply.content.contains("trouble"));

    let history = session.chat_history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].content, "Is this safe for kids?");
    assert_eq!(history[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn topic_kickoff_from_result_card_fires_one_chat_completion() {
    let provider = Arc::new(
        MockLlmProvider::new()
            .with_reply(verdict_reply("D"))
            .with_reply("Sugar is the first ingredient."),
    );
    let session = session_with(stocked_source(), provider.clone());

    scan_to_confirm(&session).await;
    session.confirm_product().await;
    session.open_chat(Some(ChatTopic::Nutrition)).await;

    assert_eq!(session.screen(), Screen::Chat);
    assert_eq!(session.topic(), Some(ChatTopic::Nutrition));

    // One grading call + one kickoff call
    assert_eq!(provider.request_count(), 2);
    let kickoff = provider.requests().remove(1);
    assert_eq!(kickoff.model.as_deref(), Some("chat-model"));
    assert!(kickoff.messages[0]
        .content
        .as_text()
        .contains("interested in nutrition"));

    let history = session.chat_history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "Sugar is the first ingredient.");
}

#[tokio::test]
async fn retry_from_confirm_discards_the_pending_product() {
    let provider = Arc::new(MockLlmProvider::new());
    let session = session_with(stocked_source(), provider.clone());

    scan_to_confirm(&session).await;
    session.retry_scan();

    assert_eq!(session.screen(), Screen::Scan);
    assert!(session.product().is_none());
    // Nothing was graded
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn verdict_grades_parse_into_the_closed_set() {
    let provider = Arc::new(MockLlmProvider::new().with_reply(verdict_reply("F")));
    let session = session_with(stocked_source(), provider);

    scan_to_confirm(&session).await;
    session.confirm_product().await;

    let verdict = session.verdict().unwrap();
    assert_eq!(verdict.grade, Grade::F);
    assert!(verdict.grade.is_poor());
    assert_eq!(verdict.health_risks.len(), 2);
}
