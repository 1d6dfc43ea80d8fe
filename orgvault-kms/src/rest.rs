//! HTTP plumbing shared by the REST providers.

use crate::error::{KmsError, KmsOperation, KmsResult};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub(crate) fn build_http_client(timeout: Duration) -> KmsResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| KmsError::Config(format!("failed to build HTTP client: {e}")))
}

/// Maps an HTTP failure status onto the normalized error categories.
pub(crate) fn classify_status(op: KmsOperation, status: StatusCode, body: &str) -> KmsError {
    let detail = format!("{op} returned {status}: {}", truncate(body));
    match status.as_u16() {
        400 if op == KmsOperation::Unwrap => KmsError::InvalidCiphertext(detail),
        401 | 403 => KmsError::PermissionDenied(detail),
        404 => KmsError::KeyNotFound(detail),
        408 | 429 => KmsError::Unavailable(detail),
        s if s >= 500 => KmsError::Unavailable(detail),
        _ => KmsError::Provider(detail),
    }
}

/// POSTs a JSON body with bearer auth and decodes the JSON reply.
pub(crate) async fn post_json<Req, Resp>(
    client: &Client,
    url: &str,
    token: &str,
    body: &Req,
    op: KmsOperation,
) -> KmsResult<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let resp = client
        .post(url)
        .bearer_auth(token)
        .json(body)
        .send()
        .await
        .map_err(|e| KmsError::Unavailable(format!("{op} request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        debug!("KMS {op} failed with {status}");
        return Err(classify_status(op, status, &text));
    }

    resp.json::<Resp>()
        .await
        .map_err(|e| KmsError::Provider(format!("{op} response could not be decoded: {e}")))
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 256;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let s = |code| StatusCode::from_u16(code).unwrap();
        assert!(matches!(
            classify_status(KmsOperation::Unwrap, s(400), ""),
            KmsError::InvalidCiphertext(_)
        ));
        assert!(matches!(
            classify_status(KmsOperation::Wrap, s(400), ""),
            KmsError::Provider(_)
        ));
        assert!(matches!(
            classify_status(KmsOperation::Wrap, s(403), ""),
            KmsError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_status(KmsOperation::Unwrap, s(404), ""),
            KmsError::KeyNotFound(_)
        ));
        assert!(classify_status(KmsOperation::Unwrap, s(429), "").is_retryable());
        assert!(classify_status(KmsOperation::Unwrap, s(503), "").is_retryable());
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(300);
        let cut = truncate(&body);
        assert!(cut.len() <= 256);
        assert!(body.starts_with(cut));
    }
}
