//! Paid transcription integration tests

mod helpers;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use serial_test::serial;

use aisha::models::TransactionType;
use aisha::services::Bucket;
use aisha::utils::errors::AishaError;
use helpers::*;

#[tokio::test]
#[serial]
async fn test_transcription_is_charged_per_started_minute() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let user = ctx.create_funded_user(100).await;

    let result = ctx.services.transcription_service
        .transcribe_paid(user.id, test_audio(121))
        .await
        .unwrap();

    assert_eq!(result.text, ctx.speech.text);
    assert_eq!(result.balance, Decimal::from(85));
    assert_eq!(result.transcript.cost, Decimal::from(15));
    assert_eq!(result.transcript.duration_seconds, 121);
    assert_eq!(result.transcript.language.as_deref(), Some("ru"));

    let history = ctx.services.ledger_service.history(user.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, Decimal::from(-15));
    assert_eq!(history[0].kind, TransactionType::Debit);

    let keys = ctx.storage.keys(Bucket::Transcripts).await;
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&result.transcript.audio_key));
    assert!(keys.contains(&result.transcript.transcript_key));
    assert_eq!(
        ctx.storage.content_type(Bucket::Transcripts, &result.transcript.audio_key).await.as_deref(),
        Some("audio/ogg")
    );

    let stored = ctx.services.transcription_service.get_transcript_text(result.transcript.id).await.unwrap();
    assert_eq!(stored, ctx.speech.text);
    assert_eq!(ctx.services.transcription_service.list_transcripts(user.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_each_result_reports_its_own_charge() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let transcription = &ctx.services.transcription_service;
    let user = ctx.create_funded_user(100).await;

    let first = transcription.transcribe_paid(user.id, test_audio(30)).await.unwrap();
    let second = transcription.transcribe_paid(user.id, test_audio(30)).await.unwrap();

    assert_eq!(first.balance, Decimal::from(95));
    assert_eq!(second.balance, Decimal::from(90));
    assert_eq!(ctx.balance(user.id).await, second.balance);
}

#[tokio::test]
#[serial]
async fn test_failed_recognition_is_refunded() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let user = ctx.create_funded_user(100).await;
    ctx.speech.fail.store(true, Ordering::SeqCst);

    let result = ctx.services.transcription_service.transcribe_paid(user.id, test_audio(180)).await;
    assert_matches!(result, Err(AishaError::Transcription(_)));

    assert_eq!(ctx.balance(user.id).await, Decimal::from(100));
    let history = ctx.services.ledger_service.history(user.id, 10).await.unwrap();
    let amounts: Vec<Decimal> = history.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![Decimal::from(15), Decimal::from(-15), Decimal::from(100)]);
    assert!(history[0].description.starts_with("Refund"));

    assert!(ctx.services.ledger_service.audit(user.id).await.unwrap().consistent);
    assert!(ctx.services.transcription_service.list_transcripts(user.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_transcription_without_funds_skips_recognition() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let user = ctx.create_funded_user(10).await;

    let result = ctx.services.transcription_service.transcribe_paid(user.id, test_audio(180)).await;
    assert_matches!(
        result,
        Err(AishaError::InsufficientFunds { required, available })
            if required == Decimal::from(15) && available == Decimal::from(10)
    );

    assert_eq!(ctx.speech.calls.load(Ordering::SeqCst), 0);
    assert!(ctx.storage.keys(Bucket::Transcripts).await.is_empty());
    assert_eq!(ctx.balance(user.id).await, Decimal::from(10));
}

#[tokio::test]
#[serial]
async fn test_overlong_audio_is_rejected_before_charging() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let user = ctx.create_funded_user(1000).await;
    let too_long = ctx.settings.transcription.max_duration_seconds + 1;

    let result = ctx.services.transcription_service.transcribe_paid(user.id, test_audio(too_long)).await;
    assert_matches!(result, Err(AishaError::InvalidInput(_)));
    assert_eq!(ctx.balance(user.id).await, Decimal::from(1000));
}
