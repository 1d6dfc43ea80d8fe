//! Facade behavior: org isolation, context binding, caching, KMS failures.

mod support;

use futures::future::join_all;
use orgvault_keys::{DekCache, EncryptedBlob, FieldContext, OrgCryptoError};
use orgvault_kms::KmsError;
use std::time::Duration;
use support::{harness, provisioned};

// ── Round Trip ──

#[tokio::test]
async fn encrypt_then_decrypt_returns_plaintext() {
    let h = provisioned(&["org-a"]).await;
    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"Offer accepted at 415k", FieldContext::EmailSubject)
        .await
        .unwrap();

    assert_eq!(blob.dek_version, 1);
    assert_eq!(blob.context, FieldContext::EmailSubject);
    let plain = h
        .crypto
        .decrypt_for_org("org-a", &blob, FieldContext::EmailSubject)
        .await
        .unwrap();
    assert_eq!(plain, b"Offer accepted at 415k");
}

#[tokio::test]
async fn string_helpers_roundtrip_through_base64_column() {
    let h = provisioned(&["org-a"]).await;
    let column = h
        .crypto
        .encrypt_str_for_org("org-a", "Call back re: 12 Oak Ln", FieldContext::LeadNotes)
        .await
        .unwrap()
        .to_base64();

    let blob = EncryptedBlob::from_base64(&column).unwrap();
    let text = h
        .crypto
        .decrypt_str_for_org("org-a", &blob, FieldContext::LeadNotes)
        .await
        .unwrap();
    assert_eq!(text, "Call back re: 12 Oak Ln");
}

// ── Isolation ──

#[tokio::test]
async fn other_org_cannot_decrypt() {
    let h = provisioned(&["org-a", "org-b"]).await;
    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"private", FieldContext::DocumentContent)
        .await
        .unwrap();

    let err = h
        .crypto
        .decrypt_for_org("org-b", &blob, FieldContext::DocumentContent)
        .await
        .unwrap_err();
    assert_eq!(err, OrgCryptoError::AuthenticationFailed);
    assert!(err.is_field_level());
}

#[tokio::test]
async fn wrong_context_fails_authentication() {
    let h = provisioned(&["org-a"]).await;
    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"Showing 3pm", FieldContext::CalendarTitle)
        .await
        .unwrap();

    let err = h
        .crypto
        .decrypt_for_org("org-a", &blob, FieldContext::CalendarDescription)
        .await
        .unwrap_err();
    assert_eq!(err, OrgCryptoError::AuthenticationFailed);
}

#[tokio::test]
async fn unprovisioned_org_is_dek_unavailable() {
    let h = harness();
    let err = h
        .crypto
        .encrypt_for_org("org-new", b"x", FieldContext::EmailBody)
        .await
        .unwrap_err();

    match &err {
        OrgCryptoError::DekUnavailable { org_id, .. } => assert_eq!(org_id, "org-new"),
        other => panic!("expected DekUnavailable, got: {other:?}"),
    }
    assert!(err.is_org_fatal());
    assert!(!err.is_retryable());
}

// ── Caching ──

#[tokio::test]
async fn two_decrypts_within_ttl_unwrap_once() {
    let h = provisioned(&["org-a"]).await;
    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"body", FieldContext::EmailBody)
        .await
        .unwrap();

    let cold = h.cold_facade();
    let before = h.kms.unwrap_calls();
    cold.decrypt_for_org("org-a", &blob, FieldContext::EmailBody).await.unwrap();
    cold.decrypt_for_org("org-a", &blob, FieldContext::EmailBody).await.unwrap();
    assert_eq!(h.kms.unwrap_calls() - before, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_decrypts_share_one_cache_entry() {
    let h = provisioned(&["org-a"]).await;
    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"listing price", FieldContext::LeadNotes)
        .await
        .unwrap();

    let cold = h.cold_facade();
    let before = h.kms.unwrap_calls();
    let tasks = (0..32).map(|_| {
        let facade = cold.clone();
        let blob = blob.clone();
        tokio::spawn(async move {
            facade
                .decrypt_for_org("org-a", &blob, FieldContext::LeadNotes)
                .await
        })
    });

    for joined in join_all(tasks).await {
        assert_eq!(joined.unwrap().unwrap(), b"listing price");
    }
    assert_eq!(cold.cache().len().await, 1);
    let unwraps = h.kms.unwrap_calls() - before;
    assert!((1..=32).contains(&unwraps), "unwrapped {unwraps} times");
}

#[tokio::test]
async fn provisioning_seeds_the_cache() {
    let h = provisioned(&["org-a"]).await;
    assert!(h.crypto.cache().contains("org-a", 1).await);

    h.crypto
        .encrypt_for_org("org-a", b"x", FieldContext::EmailSnippet)
        .await
        .unwrap();
    assert_eq!(h.kms.unwrap_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_new_unwrap() {
    let h = provisioned(&["org-a"]).await;
    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"body", FieldContext::EmailBody)
        .await
        .unwrap();

    let cold = h.facade_with_cache(DekCache::new(Duration::from_secs(300), 100));
    cold.decrypt_for_org("org-a", &blob, FieldContext::EmailBody).await.unwrap();
    assert_eq!(h.kms.unwrap_calls(), 1);

    tokio::time::advance(Duration::from_secs(299)).await;
    cold.decrypt_for_org("org-a", &blob, FieldContext::EmailBody).await.unwrap();
    assert_eq!(h.kms.unwrap_calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    cold.decrypt_for_org("org-a", &blob, FieldContext::EmailBody).await.unwrap();
    assert_eq!(h.kms.unwrap_calls(), 2);
}

#[tokio::test]
async fn cached_dek_survives_kms_outage() {
    let h = provisioned(&["org-a"]).await;
    h.kms.fail_with(KmsError::Unavailable("connection reset".into()));

    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"still works", FieldContext::EmailBody)
        .await
        .unwrap();
    assert_eq!(
        h.crypto
            .decrypt_for_org("org-a", &blob, FieldContext::EmailBody)
            .await
            .unwrap(),
        b"still works"
    );
}

// ── KMS Failures ──

#[tokio::test]
async fn kms_outage_on_cache_miss_is_retryable() {
    let h = provisioned(&["org-a"]).await;
    let blob = h
        .crypto
        .encrypt_for_org("org-a", b"body", FieldContext::EmailBody)
        .await
        .unwrap();

    let cold = h.cold_facade();
    h.kms.fail_with(KmsError::Unavailable("timeout".into()));
    let err = cold
        .decrypt_for_org("org-a", &blob, FieldContext::EmailBody)
        .await
        .unwrap_err();
    assert!(matches!(err, OrgCryptoError::KmsUnavailable(_)));
    assert!(err.is_retryable());
    assert!(!cold.cache().contains("org-a", 1).await);

    h.kms.recover();
    assert!(cold.decrypt_for_org("org-a", &blob, FieldContext::EmailBody).await.is_ok());
}

#[tokio::test]
async fn permission_denied_is_kms_unavailable_but_not_retryable() {
    let h = provisioned(&["org-a"]).await;
    let cold = h.cold_facade();
    h.kms.fail_with(KmsError::PermissionDenied("kms:Decrypt denied".into()));

    let err = cold
        .encrypt_for_org("org-a", b"x", FieldContext::EmailBody)
        .await
        .unwrap_err();
    assert!(matches!(err, OrgCryptoError::KmsUnavailable(KmsError::PermissionDenied(_))));
    assert!(err.is_org_fatal());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn rejected_wrapped_key_is_dek_unavailable() {
    let h = provisioned(&["org-a"]).await;
    let cold = h.cold_facade();
    h.kms.fail_with(KmsError::InvalidCiphertext("bad blob".into()));

    let err = cold
        .encrypt_for_org("org-a", b"x", FieldContext::EmailBody)
        .await
        .unwrap_err();
    assert!(matches!(err, OrgCryptoError::DekUnavailable { .. }));
}

#[tokio::test]
async fn never_issued_version_is_a_malformed_field() {
    let h = provisioned(&["org-a"]).await;
    let mut blob = h
        .crypto
        .encrypt_for_org("org-a", b"subject", FieldContext::EmailSubject)
        .await
        .unwrap();
    blob.dek_version = 9;

    let err = h
        .cold_facade()
        .decrypt_for_org("org-a", &blob, FieldContext::EmailSubject)
        .await
        .unwrap_err();
    match err {
        OrgCryptoError::MalformedBlob(ref msg) => assert!(msg.contains("version 9")),
        ref other => panic!("expected MalformedBlob, got: {other:?}"),
    }
    assert!(err.is_field_level());
    assert!(!err.is_org_fatal());
}
