use base64::Engine as _;
use http::HeaderValue;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use privacypass_redemption::{
    Serialize, TokenType, TransientStore,
    auth::{
        BASE64URL,
        authenticate::{BuildError, ChallengeError, TokenChallenge, parse_www_authenticate_header},
        authorize::build_authorization_header,
    },
    pow_tokens::{PowToken, server::Server},
    test_utils::transient_store::MemoryTransientStore,
};

const ORIGIN: &str = "origin.example.org";

fn token_challenge(header_value: &HeaderValue) -> TokenChallenge {
    let challenges = parse_www_authenticate_header(header_value).unwrap();
    assert_eq!(challenges.len(), 1);
    assert_eq!(challenges[0].token_key(), None);
    challenges[0].token_challenge().clone()
}

#[tokio::test]
async fn pow_tokens_cycle() {
    // Origin: Instantiate the in-memory transient store
    let store = MemoryTransientStore::default();

    // Origin: Create server
    let server = Server::new();

    // Origin: Issue a challenge and record its difficulty
    let (header_name, header_value) = server
        .issue_challenge(&store, &mut OsRng, ORIGIN, 4, None)
        .await
        .unwrap();
    assert_eq!(header_name, http::header::WWW_AUTHENTICATE);
    assert!(
        header_value
            .to_str()
            .unwrap()
            .starts_with("PrivateToken challenge=\"")
    );

    // Client: Decode the challenge
    let challenge = token_challenge(&header_value);
    assert_eq!(challenge.token_type(), 0x5750);
    assert_eq!(
        challenge.issuer_name(),
        b"_difficulty-4._alg-0.pow.privacypass.arpa"
    );
    assert_eq!(challenge.origin_info(), ORIGIN.as_bytes());
    assert_eq!(challenge.redemption_context().len(), 32);
    let challenge_digest = challenge.digest().unwrap();
    assert_eq!(store.get(&challenge_digest).await.as_deref(), Some("4"));

    // Client: Solve the challenge
    let token = PowToken::solve(&mut OsRng, &challenge, 4).unwrap();
    let (_, authorization) = build_authorization_header(&token).unwrap();

    // Origin: Redeem the token
    assert!(
        server
            .redeem_authorization_header(&store, &authorization)
            .await
    );
    assert!(!store.contains(&challenge_digest).await);

    // Origin: The challenge cannot be used twice
    assert!(
        !server
            .redeem_authorization_header(&store, &authorization)
            .await
    );
}

#[tokio::test]
async fn challenge_layout() {
    let server = Server::new();
    let context = [0x42u8; 32];
    let challenge = server
        .build_challenge(&mut OsRng, ORIGIN, 16, Some(&context[..]))
        .unwrap();

    let bytes = challenge.challenge();
    assert_eq!(&bytes[..2], &[0x57, 0x50]);
    assert_eq!(&bytes[2..4], &[0x00, 0x2a]);
    assert_eq!(
        &bytes[4..46],
        b"_difficulty-16._alg-0.pow.privacypass.arpa"
    );
    assert_eq!(bytes[46], 32);
    assert_eq!(&bytes[47..79], &context);
    assert_eq!(&bytes[79..81], &[0x00, 0x12]);
    assert_eq!(&bytes[81..], ORIGIN.as_bytes());

    let expected_digest: [u8; 32] = Sha256::digest(bytes).into();
    assert_eq!(challenge.challenge_digest(), &expected_digest);

    let decoded = token_challenge(challenge.header_value());
    assert_eq!(decoded.serialize().unwrap(), bytes);
}

#[tokio::test]
async fn challenge_is_deterministic_for_a_fixed_context() {
    let server = Server::new();
    let context = [7u8; 32];
    let a = server
        .build_challenge(&mut OsRng, ORIGIN, 8, Some(&context[..]))
        .unwrap();
    let b = server
        .build_challenge(&mut OsRng, ORIGIN, 8, Some(&context[..]))
        .unwrap();
    assert_eq!(a.header_value(), b.header_value());
    assert_eq!(a.challenge_digest(), b.challenge_digest());

    let empty = server
        .build_challenge(&mut OsRng, ORIGIN, 8, Some(&[][..]))
        .unwrap();
    assert!(token_challenge(empty.header_value()).redemption_context().is_empty());

    let random_a = server.build_challenge(&mut OsRng, ORIGIN, 8, None).unwrap();
    let random_b = server.build_challenge(&mut OsRng, ORIGIN, 8, None).unwrap();
    assert_ne!(random_a.challenge_digest(), random_b.challenge_digest());
}

#[tokio::test]
async fn invalid_challenge_parameters() {
    let store = MemoryTransientStore::default();
    let server = Server::new();

    for difficulty in [0, 33, u32::MAX] {
        assert_eq!(
            server
                .build_challenge(&mut OsRng, ORIGIN, difficulty, None)
                .unwrap_err(),
            BuildError::InvalidDifficulty(difficulty)
        );
    }

    for len in [1, 31, 33, 64] {
        let context = vec![0u8; len];
        assert_eq!(
            server
                .issue_challenge(&store, &mut OsRng, ORIGIN, 8, Some(&context[..]))
                .await
                .unwrap_err(),
            BuildError::Challenge(ChallengeError::InvalidRedemptionContextLength(len))
        );
    }
    assert!(store.is_empty().await);
}

async fn record(store: &MemoryTransientStore, token: &PowToken, difficulty: &str) {
    store
        .put(*token.challenge_digest(), difficulty.to_owned())
        .await;
}

fn solved_token(difficulty: u32) -> PowToken {
    let challenge = TokenChallenge::new(
        TokenType::Pow,
        &privacypass_redemption::pow_tokens::issuer_name(difficulty),
        Some([9u8; 32]),
        ORIGIN,
    );
    PowToken::solve(&mut OsRng, &challenge, difficulty).unwrap()
}

#[tokio::test]
async fn failed_redemption_keeps_challenge() {
    let store = MemoryTransientStore::default();
    let server = Server::new();
    let token = solved_token(1);
    let token_value = BASE64URL.encode(token.tls_serialize_detached().unwrap());

    // Unknown challenge
    assert!(!server.redeem_token(&store, &token_value).await);

    // Stored difficulty cannot be used
    for stored in ["", "0", "33", "-1", "abc", "1.5", "0x10"] {
        record(&store, &token, stored).await;
        assert!(!server.redeem_token(&store, &token_value).await, "{stored}");
        assert!(store.contains(token.challenge_digest()).await);
    }

    // Difficulty too high for this token
    record(&store, &token, "32").await;
    if !token.meets_difficulty(32) {
        assert!(!server.redeem_token(&store, &token_value).await);
        assert!(store.contains(token.challenge_digest()).await);
    }

    record(&store, &token, "1").await;
    assert!(server.redeem_token(&store, &token_value).await);
    assert!(!store.contains(token.challenge_digest()).await);
}

#[tokio::test]
async fn malformed_tokens_are_rejected_before_lookup() {
    let store = MemoryTransientStore::default();
    let server = Server::new();
    let token = solved_token(1);
    record(&store, &token, "1").await;
    let token_value = BASE64URL.encode(token.tls_serialize_detached().unwrap());
    assert_eq!(token_value.len(), 344);

    let mut wrong_alphabet = token_value.clone();
    wrong_alphabet.replace_range(100..101, "+");

    for value in [
        "".to_owned(),
        token_value[..340].to_owned(),
        format!("{token_value}AAAA"),
        wrong_alphabet,
        format!("AAAA{}", &token_value[4..]),
    ] {
        assert!(!server.redeem_token(&store, &value).await, "{value}");
    }

    for value in [
        format!("Bearer token=\"{token_value}\""),
        format!("PrivateToken token=\"{token_value}"),
        format!("PrivateToken challenge=\"{token_value}\""),
    ] {
        let header_value = HeaderValue::from_str(&value).unwrap();
        assert!(
            !server
                .redeem_authorization_header(&store, &header_value)
                .await
        );
    }
    assert!(store.contains(token.challenge_digest()).await);

    // Scheme is case-insensitive and the token may be unquoted
    let header_value = HeaderValue::from_str(&format!("privatetoken token={token_value}")).unwrap();
    assert!(
        server
            .redeem_authorization_header(&store, &header_value)
            .await
    );
}

#[tokio::test]
async fn publicly_verifiable_tokens_are_not_redeemed() {
    let store = MemoryTransientStore::default();
    let server = Server::new();

    let mut bytes = vec![0u8; 354];
    bytes[1] = 0x02;
    store.put([0u8; 32], "1".to_owned()).await;
    assert!(
        !server
            .redeem_token(&store, &BASE64URL.encode(&bytes))
            .await
    );
    assert!(store.contains(&[0u8; 32]).await);
}
