//! Origin-side implementation of the Publicly Verifiable Token protocol.

use base64::Engine as _;
use http::{HeaderValue, header::HeaderName};
use log::{debug, warn};
use rand::{CryptoRng, RngCore};
use rsa::{Pss, RsaPublicKey, pkcs8::DecodePublicKey};
use sha2::{Digest, Sha256, Sha384};

use crate::{
    TokenInput, TokenKeyId, TokenType, TransientStore,
    auth::{
        BASE64URL,
        authenticate::{build_token_challenge, build_www_authenticate_header},
        authorize::{decode_token, parse_token_value},
    },
    common::{errors::RedeemTokenError, timing_safe::timing_safe_eq},
};

use super::{
    PublicToken,
    directory::{DirectoryFetcher, fetch_token_key},
    salt_length_for_token_key,
    spki::to_legacy_encoding,
    token_key_to_token_key_id,
};

/// Origin-side implementation of the Publicly Verifiable Token protocol.
///
/// The origin challenges clients with a token key discovered from the issuer
/// directory and verifies the issuer's signature when the token is redeemed.
#[derive(Default, Debug)]
pub struct OriginServer {}

impl OriginServer {
    /// Creates a new origin server.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Builds a `WWW-Authenticate` challenge for tokens of `issuer`.
    ///
    /// Fetches the issuer directory through `fetcher`, selects its RSA-PSS
    /// token key and records the key text in `store` under the digest of the
    /// new challenge. The header value has the form
    /// `PrivateToken challenge="...", token-key="..."`.
    ///
    /// Returns `None` if no usable key can be discovered or the challenge
    /// cannot be built. Nothing is stored in that case.
    pub async fn build_www_authenticate_header<F, S, R>(
        &self,
        fetcher: &F,
        store: &S,
        rng: &mut R,
        issuer: &str,
        origin: &str,
        redemption_context: Option<&[u8]>,
    ) -> Option<(HeaderName, HeaderValue)>
    where
        F: DirectoryFetcher,
        S: TransientStore,
        R: RngCore + CryptoRng,
    {
        let token_key = fetch_token_key(fetcher, issuer)
            .await
            .inspect_err(
                |e| warn!(issuer:% = issuer, error:% = e; "Failed to discover token key"),
            )
            .ok()?;

        let (challenge, challenge_text) = build_token_challenge(
            rng,
            TokenType::Public,
            issuer,
            origin,
            redemption_context,
        )
        .inspect_err(|e| debug!(error:% = e; "Failed to build token challenge"))
        .ok()?;
        let header = build_www_authenticate_header(&challenge_text, Some(&token_key))
            .inspect_err(|e| debug!(error:% = e; "Failed to build challenge header"))
            .ok()?;

        let challenge_digest = Sha256::digest(&challenge).into();
        store.put(challenge_digest, token_key).await;
        Some(header)
    }

    /// Redeems the token carried in an `Authorization` header value.
    ///
    /// Returns `true` only if the token carries a valid issuer signature for
    /// a challenge recorded in `store`. The reason of a rejection is logged
    /// and not returned.
    pub async fn redeem_authorization_header<S: TransientStore>(
        &self,
        store: &S,
        header_value: &HeaderValue,
    ) -> bool {
        let result = match header_value.to_str() {
            Ok(value) => match parse_token_value(value, TokenType::Public) {
                Ok(token) => self.redeem(store, token).await,
                Err(e) => Err(e.into()),
            },
            Err(_) => Err(RedeemTokenError::InvalidHeader),
        };
        accepted(result)
    }

    /// Redeems a base64url encoded token. See
    /// [`redeem_authorization_header`](Self::redeem_authorization_header).
    pub async fn redeem_token<S: TransientStore>(&self, store: &S, token_value: &str) -> bool {
        let result = match decode_token(token_value, TokenType::Public) {
            Ok(token) => self.redeem(store, token).await,
            Err(e) => Err(e.into()),
        };
        accepted(result)
    }

    /// Redeems a decoded token.
    ///
    /// The challenge entry is deleted once the signature has been checked,
    /// whether the signature is valid or not. A token key ID that does not
    /// match the recorded key, or a recorded key that cannot be imported,
    /// leaves the entry in place.
    ///
    /// # Errors
    /// Returns the reason the token was rejected.
    pub async fn redeem<S: TransientStore>(
        &self,
        store: &S,
        token: PublicToken,
    ) -> Result<(), RedeemTokenError> {
        let challenge_digest = *token.challenge_digest();
        let token_key = store
            .get(&challenge_digest)
            .await
            .ok_or(RedeemTokenError::MissingChallenge)?;

        let raw_token_key = BASE64URL
            .decode(&token_key)
            .map_err(|_| RedeemTokenError::InvalidTokenKey)?;
        let token_key_id = token_key_to_token_key_id(&raw_token_key);
        if !timing_safe_eq(token.token_key_id(), &token_key_id) {
            return Err(RedeemTokenError::KeyIdMismatch);
        }

        let public_key = import_token_key(&raw_token_key)?;
        let result = verify_authenticator(
            &public_key,
            &token,
            token_key_id,
            salt_length_for_token_key(&token_key),
        );
        store.delete(&challenge_digest).await;
        result
    }
}

fn accepted(result: Result<(), RedeemTokenError>) -> bool {
    result
        .inspect_err(|e| debug!(reason:% = e; "Rejected publicly verifiable token"))
        .is_ok()
}

fn import_token_key(raw_token_key: &[u8]) -> Result<RsaPublicKey, RedeemTokenError> {
    let legacy_key =
        to_legacy_encoding(raw_token_key).map_err(|_| RedeemTokenError::InvalidTokenKey)?;
    RsaPublicKey::from_public_key_der(&legacy_key).map_err(|_| RedeemTokenError::InvalidTokenKey)
}

fn verify_authenticator(
    public_key: &RsaPublicKey,
    token: &PublicToken,
    token_key_id: TokenKeyId,
    salt_length: usize,
) -> Result<(), RedeemTokenError> {
    let token_input = TokenInput::new(
        token.token_type(),
        token.nonce(),
        *token.challenge_digest(),
        token_key_id,
    );
    let hashed = Sha384::digest(token_input.serialize());
    public_key
        .verify(
            Pss::new_with_salt::<Sha384>(salt_length),
            &hashed,
            token.authenticator(),
        )
        .map_err(|_| RedeemTokenError::InvalidSignature)
}
