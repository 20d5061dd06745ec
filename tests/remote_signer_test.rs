mod common;

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::*;
use diagnostic_ledger::crypto::{RemoteSigner, SignatureManager, SigningOracle};
use diagnostic_ledger::LedgerError;

/// Oracle stand-in that signs whatever hash it is sent.
struct SigningResponder {
    secret_key: SecretKey,
}

impl SigningResponder {
    fn new() -> Self {
        Self {
            secret_key: SignatureManager::new().generate_secret_key(),
        }
    }
}

impl Respond for SigningResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let digest = match body["message_hash"].as_str().map(hex::decode) {
            Some(Ok(digest)) => digest,
            _ => return ResponseTemplate::new(400),
        };

        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(&digest).unwrap();
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        let public_key = PublicKey::from_secret_key(&secp, &self.secret_key);

        ResponseTemplate::new(200).set_body_json(json!({
            "signature": hex::encode(signature.serialize_compact()),
            "public_key": hex::encode(public_key.serialize()),
        }))
    }
}

fn remote_signer(server: &MockServer) -> RemoteSigner {
    RemoteSigner::new(
        server.uri(),
        "hsm_signing_key".to_string(),
        Duration::from_secs(2),
    )
    .unwrap()
}

#[tokio::test]
async fn test_remote_signer_sends_message_hash() {
    let server = MockServer::start().await;
    let message = b"canonical bytes";

    Mock::given(method("POST"))
        .and(path("/sign"))
        .and(body_json(json!({
            "key_name": "hsm_signing_key",
            "message_hash": hex::encode(SignatureManager::digest(message)),
        })))
        .respond_with(SigningResponder::new())
        .expect(1)
        .mount(&server)
        .await;

    let signer = remote_signer(&server);
    let attestation = signer.sign(message).await.unwrap();

    assert!(SignatureManager::new().verify_signature(
        message,
        &attestation.signature,
        &attestation.public_key
    ));
    assert_eq!(signer.key_name(), "hsm_signing_key");
}

#[tokio::test]
async fn test_submission_through_remote_oracle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sign"))
        .respond_with(SigningResponder::new())
        .mount(&server)
        .await;

    let service = setup_service_with(Arc::new(remote_signer(&server))).await;
    let record = service
        .submit_record(pneumonia_submission(), "dr-lee")
        .await
        .unwrap();

    assert!(service.verify_signature(record.id, "auditor").await.unwrap());
}

#[tokio::test]
async fn test_oracle_error_status_is_signing_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sign"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = remote_signer(&server).sign(b"payload").await.unwrap_err();
    assert!(matches!(err, LedgerError::SigningUnavailable(_)));
}

#[tokio::test]
async fn test_malformed_oracle_response_is_signing_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sign"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signature": "not-hex",
            "public_key": "02ab",
        })))
        .mount(&server)
        .await;

    let err = remote_signer(&server).sign(b"payload").await.unwrap_err();
    assert!(matches!(err, LedgerError::SigningUnavailable(_)));
}

#[tokio::test]
async fn test_wrong_key_material_aborts_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sign"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signature": hex::encode([7u8; 64]),
            "public_key": hex::encode([2u8; 33]),
        })))
        .mount(&server)
        .await;

    let service = setup_service_with(Arc::new(remote_signer(&server))).await;
    let err = service
        .submit_record(pneumonia_submission(), "dr-lee")
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::SigningUnavailable(_)));
    assert!(service.list_records().await.unwrap().is_empty());
    assert!(service.list_audit_trail().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_oracle_is_signing_unavailable() {
    let signer = RemoteSigner::new(
        "http://127.0.0.1:9".to_string(),
        "hsm_signing_key".to_string(),
        Duration::from_millis(500),
    )
    .unwrap();

    let err = signer.sign(b"payload").await.unwrap_err();
    assert!(matches!(err, LedgerError::SigningUnavailable(_)));
}
