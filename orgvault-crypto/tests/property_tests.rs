//! Property tests for the field cipher's universal guarantees.

use orgvault_crypto::{decrypt, encrypt, CryptoError, DataKey, FieldContext};
use proptest::prelude::*;

fn any_context() -> impl Strategy<Value = FieldContext> {
    prop::sample::select(FieldContext::ALL.to_vec())
}

fn distinct_contexts() -> impl Strategy<Value = (FieldContext, FieldContext)> {
    (any_context(), any_context()).prop_filter("contexts must differ", |(a, b)| a != b)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..2048),
                 version in 1u32..1000,
                 context in any_context()) {
        let key = DataKey::generate();
        let blob = encrypt(&key, version, &plaintext, context).unwrap();
        prop_assert_eq!(decrypt(&key, &blob, context).unwrap(), plaintext);
    }

    #[test]
    fn context_binding(plaintext in prop::collection::vec(any::<u8>(), 0..256),
                       (c1, c2) in distinct_contexts()) {
        let key = DataKey::generate();
        let blob = encrypt(&key, 1, &plaintext, c1).unwrap();
        prop_assert_eq!(decrypt(&key, &blob, c2), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn key_binding(plaintext in prop::collection::vec(any::<u8>(), 0..256),
                   context in any_context()) {
        let dek1 = DataKey::generate();
        let dek2 = DataKey::generate();
        let blob = encrypt(&dek1, 1, &plaintext, context).unwrap();
        prop_assert_eq!(decrypt(&dek2, &blob, context), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn single_bit_flip_detected(plaintext in prop::collection::vec(any::<u8>(), 1..128),
                                position in any::<prop::sample::Index>(),
                                bit in 0u8..8) {
        let key = DataKey::generate();
        let mut blob = encrypt(&key, 1, &plaintext, FieldContext::EmailBody).unwrap();
        let idx = position.index(blob.ciphertext.len());
        blob.ciphertext[idx] ^= 1 << bit;
        prop_assert!(decrypt(&key, &blob, FieldContext::EmailBody).is_err());
    }
}
