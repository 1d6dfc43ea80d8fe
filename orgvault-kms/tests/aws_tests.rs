//! AWS KMS client against a mock endpoint speaking the KMS JSON protocol.

use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use base64::{Engine, engine::general_purpose::STANDARD};
use orgvault_kms::{AwsKmsClient, KmsClient, KmsError, KmsProvider};
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_ID: &str = "alias/orgvault-test";

async fn client_for(endpoint: String) -> AwsKmsClient {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(endpoint)
        .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
        .retry_config(RetryConfig::disabled())
        .load()
        .await;
    AwsKmsClient::from_sdk_config(&sdk_config, KEY_ID)
}

fn kms_json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/x-amz-json-1.1")
}

fn kms_error(status: u16, code: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(
        serde_json::json!({ "__type": code, "message": "mock failure" }).to_string(),
        "application/x-amz-json-1.1",
    )
}

#[tokio::test]
async fn encrypt_returns_ciphertext_blob() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "TrentService.Encrypt"))
        .respond_with(kms_json(serde_json::json!({
            "CiphertextBlob": STANDARD.encode(b"aws-wrapped"),
            "KeyId": KEY_ID,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(server.uri()).await;
    assert_eq!(client.provider(), KmsProvider::Aws);
    assert_eq!(client.wrap_key(&[1u8; 32]).await.unwrap(), b"aws-wrapped");
}

#[tokio::test]
async fn generate_data_key_uses_native_operation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "TrentService.GenerateDataKey"))
        .respond_with(kms_json(serde_json::json!({
            "CiphertextBlob": STANDARD.encode(b"aws-wrapped"),
            "Plaintext": STANDARD.encode([6u8; 32]),
            "KeyId": KEY_ID,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generated = client_for(server.uri()).await.generate_data_key().await.unwrap();
    assert_eq!(generated.plaintext.as_slice(), &[6u8; 32]);
    assert_eq!(generated.wrapped, b"aws-wrapped");
}

#[tokio::test]
async fn service_errors_are_classified_by_code() {
    let cases: [(u16, &str, fn(&KmsError) -> bool); 4] = [
        (400, "NotFoundException", |e| matches!(e, KmsError::KeyNotFound(_))),
        (400, "InvalidCiphertextException", |e| {
            matches!(e, KmsError::InvalidCiphertext(_))
        }),
        (400, "AccessDeniedException", |e| matches!(e, KmsError::PermissionDenied(_))),
        (500, "KMSInternalException", |e| matches!(e, KmsError::Unavailable(_))),
    ];

    for (status, code, check) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "TrentService.Decrypt"))
            .respond_with(kms_error(status, code))
            .mount(&server)
            .await;

        let err = client_for(server.uri())
            .await
            .unwrap_key(b"aws-wrapped")
            .await
            .unwrap_err();
        assert!(check(&err), "{code} mapped to {err:?}");
    }
}

#[tokio::test]
async fn connection_refused_is_unavailable() {
    let endpoint = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let err = client_for(endpoint).await.unwrap_key(b"x").await.unwrap_err();
    assert!(matches!(err, KmsError::Unavailable(_)), "got: {err:?}");
}
