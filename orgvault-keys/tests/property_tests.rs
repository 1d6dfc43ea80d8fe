//! Org-level properties over arbitrary plaintexts and contexts.

mod support;

use orgvault_keys::{FieldContext, OrgCryptoError};
use proptest::prelude::*;
use support::provisioned;

fn any_context() -> impl Strategy<Value = FieldContext> {
    prop::sample::select(FieldContext::ALL.to_vec())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn roundtrip_within_org(plaintext in prop::collection::vec(any::<u8>(), 0..1024),
                            context in any_context()) {
        runtime().block_on(async {
            let h = provisioned(&["org-a"]).await;
            let blob = h.crypto.encrypt_for_org("org-a", &plaintext, context).await.unwrap();
            let out = h.crypto.decrypt_for_org("org-a", &blob, context).await.unwrap();
            assert_eq!(out, plaintext);
        });
    }

    #[test]
    fn dek_isolation_between_orgs(plaintext in prop::collection::vec(any::<u8>(), 0..256),
                                  context in any_context()) {
        runtime().block_on(async {
            let h = provisioned(&["org-a", "org-b"]).await;
            let blob = h.crypto.encrypt_for_org("org-a", &plaintext, context).await.unwrap();
            let err = h.crypto.decrypt_for_org("org-b", &blob, context).await.unwrap_err();
            assert_eq!(err, OrgCryptoError::AuthenticationFailed);
        });
    }
}
