//! User authentication: bearer tokens (JWTs) and the login password check.
//!
//! There is no session storage. A successful login hands out a signed token
//! and every request that carries it in the `Authorization` header resolves
//! to a current user. Requests without a (valid) token are served anonymously;
//! only mutations insist on a user.

use std::time::Duration;

use http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{model::User, prelude::*, store::CatalogStore};


#[derive(Debug, confique::Config)]
pub(crate) struct AuthConfig {
    /// Secret used to sign and verify bearer tokens (HMAC-SHA256). Anyone
    /// who knows this value can impersonate any user, so treat it like a
    /// private key.
    #[config(env = "JWT_SECRET")]
    pub(crate) jwt_secret: SecretString,

    /// The password accepted by `login`. Users do not have individual
    /// credentials: everyone logs in with their username and this one shared
    /// value. A development stub; at least the value is not hard-coded in the
    /// source anymore.
    #[config(env = "LOGIN_PASSWORD")]
    pub(crate) password: SecretString,

    /// How long issued tokens stay valid, e.g. "30min", "12h" or "7d".
    /// If unset, tokens never expire and verification does not require an
    /// expiry claim.
    pub(crate) token_expiry: Option<TokenLifetime>,
}

/// A duration given as integer plus unit, e.g. "30s", "12h" or "7d".
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(try_from = "String")]
pub(crate) struct TokenLifetime(pub(crate) Duration);

impl TryFrom<String> for TokenLifetime {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        // Allow unit-less zeroes
        if s == "0" {
            return Ok(Self(Duration::ZERO));
        }

        let start_unit = s.find(|c: char| !c.is_ascii_digit())
            .ok_or("no time unit for duration")?;
        let (num, unit) = s.split_at(start_unit);
        let num: u32 = num.parse()
            .map_err(|e| format!("invalid integer for duration: {e}"))?;
        let num: u64 = num.into();

        match unit {
            "ms" => Ok(Self(Duration::from_millis(num))),
            "s" => Ok(Self(Duration::from_secs(num))),
            "min" => Ok(Self(Duration::from_secs(num * 60))),
            "h" => Ok(Self(Duration::from_secs(num * 60 * 60))),
            "d" => Ok(Self(Duration::from_secs(num * 60 * 60 * 24))),
            _ => Err("invalid unit of time for duration".into()),
        }
    }
}

/// The claims embedded in our bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    /// The user's id as hex string.
    pub(crate) sub: String,
    pub(crate) username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) exp: Option<i64>,
}

/// Everything derived from [`AuthConfig`] that lives for the whole process:
/// prepared signing/verification keys plus the login password.
pub(crate) struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Option<Duration>,
    password: SecretString,
}

impl Authenticator {
    pub(crate) fn new(config: AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        if config.token_expiry.is_none() {
            // Tokens are issued without `exp`, so don't demand one.
            validation.validate_exp = false;
            validation.required_spec_claims = Default::default();
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expiry: config.token_expiry.map(|lifetime| lifetime.0),
            password: config.password,
        }
    }

    /// Creates a new signed token for the given user.
    pub(crate) fn issue(&self, user: &User) -> Result<String> {
        let exp = self.expiry.map(|expiry| {
            let exp = chrono::offset::Utc::now()
                + chrono::Duration::from_std(expiry)
                    .expect("failed to convert from std Duration to chrono::Duration");
            exp.timestamp()
        });
        let claims = Claims {
            sub: user.id.to_hex(),
            username: user.username.clone(),
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("failed to sign token")
    }

    /// Checks signature (and expiry, if configured) and returns the claims.
    pub(crate) fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
    }

    pub(crate) fn password_matches(&self, given: &str) -> bool {
        self.password.expose_secret() == given
    }

    /// Resolves the `Authorization` header of a request to a user.
    ///
    /// Anything that does not lead to a known user (no header, different
    /// scheme, bad signature, expired token, unknown id) just means "no
    /// current user"; it is never an error. The request is then served
    /// anonymously and only auth-requiring operations will complain.
    pub(crate) async fn current_user(
        &self,
        headers: &HeaderMap,
        store: &dyn CatalogStore,
    ) -> Option<User> {
        let token = bearer_token(headers)?;
        let claims = match self.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Ignoring invalid bearer token: {e}");
                return None;
            }
        };
        let id = match ObjectId::parse_str(&claims.sub) {
            Ok(id) => id,
            Err(_) => {
                debug!("Bearer token subject '{}' is not a valid user id", claims.sub);
                return None;
            }
        };

        match store.user_by_id(id).await {
            Ok(Some(user)) => {
                trace!("Request authenticated as '{}'", user.username);
                Some(user)
            }
            Ok(None) => {
                debug!("Valid bearer token for unknown user '{}'", claims.username);
                None
            }
            Err(e) => {
                error!("User lookup failed while authenticating a request: {e}");
                None
            }
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header. The
/// scheme comparison is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..7)?;
    scheme.eq_ignore_ascii_case("bearer ").then_some(&value[7..])
}


#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;

    use crate::store::memory::MemStore;
    use super::*;

    fn authenticator(expiry: Option<&str>) -> Authenticator {
        Authenticator::new(AuthConfig {
            jwt_secret: SecretString::from("test-signing-secret"),
            password: SecretString::from("hunter2"),
            token_expiry: expiry.map(|s| TokenLifetime::try_from(s.to_owned()).unwrap()),
        })
    }

    fn test_user() -> User {
        User {
            id: ObjectId::new(),
            username: "mluukkai".into(),
            favorite_genre: "refactoring".into(),
        }
    }

    fn bearer_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn lifetime_parsing() {
        let parse = |s: &str| TokenLifetime::try_from(s.to_owned()).map(|l| l.0);
        assert_eq!(parse("0"), Ok(Duration::ZERO));
        assert_eq!(parse("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse("45min"), Ok(Duration::from_secs(45 * 60)));
        assert_eq!(parse("12h"), Ok(Duration::from_secs(12 * 60 * 60)));
        assert_eq!(parse("7d"), Ok(Duration::from_secs(7 * 24 * 60 * 60)));
        assert!(parse("h").is_err());
        assert!(parse("5fortnights").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn token_round_trip() {
        let auth = authenticator(None);
        let user = test_user();
        let token = auth.issue(&user).unwrap();
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_hex());
        assert_eq!(claims.username, "mluukkai");
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn expiry_is_embedded_when_configured() {
        let auth = authenticator(Some("12h"));
        let token = auth.issue(&test_user()).unwrap();
        let claims = auth.verify(&token).unwrap();
        let exp = claims.exp.expect("token should carry an expiry");
        assert!(exp > chrono::offset::Utc::now().timestamp());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let auth = authenticator(Some("1h"));
        // Hand-craft a token that expired two hours ago (well past the
        // default verification leeway).
        let claims = Claims {
            sub: ObjectId::new().to_hex(),
            username: "mluukkai".into(),
            exp: Some(chrono::offset::Utc::now().timestamp() - 2 * 60 * 60),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-signing-secret"),
        ).unwrap();
        assert!(auth.verify(&token).is_err());
    }

    #[test]
    fn foreign_and_garbage_tokens_are_rejected() {
        let auth = authenticator(None);
        let foreign = Authenticator::new(AuthConfig {
            jwt_secret: SecretString::from("a-different-secret"),
            password: SecretString::from("hunter2"),
            token_expiry: None,
        });
        let token = foreign.issue(&test_user()).unwrap();
        assert!(auth.verify(&token).is_err());
        assert!(auth.verify("definitely.not.a-jwt").is_err());
        assert!(auth.verify("").is_err());
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        for scheme in ["Bearer", "bearer", "BEARER", "bEaReR"] {
            let headers = bearer_headers(&format!("{scheme} token123"));
            assert_eq!(bearer_token(&headers), Some("token123"));
        }
    }

    #[test]
    fn non_bearer_headers_are_ignored() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&bearer_headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&bearer_headers("Bearer")), None);
        assert_eq!(bearer_token(&bearer_headers("Bearertoken")), None);
    }

    #[tokio::test]
    async fn current_user_resolves_known_user() {
        let auth = authenticator(None);
        let store = MemStore::new();
        let user = store.create_user("mluukkai", "refactoring").await.unwrap();
        let token = auth.issue(&user).unwrap();

        let resolved = auth
            .current_user(&bearer_headers(&format!("Bearer {token}")), &store)
            .await;
        assert_eq!(resolved.map(|u| u.username), Some("mluukkai".into()));
    }

    #[tokio::test]
    async fn current_user_is_none_for_unknown_or_invalid() {
        let auth = authenticator(None);
        let store = MemStore::new();

        // Valid signature, but no such user in the store.
        let token = auth.issue(&test_user()).unwrap();
        let headers = bearer_headers(&format!("Bearer {token}"));
        assert!(auth.current_user(&headers, &store).await.is_none());

        // Missing header / tampered token.
        assert!(auth.current_user(&HeaderMap::new(), &store).await.is_none());
        let headers = bearer_headers(&format!("Bearer {token}x"));
        assert!(auth.current_user(&headers, &store).await.is_none());
    }

    #[test]
    fn password_check() {
        let auth = authenticator(None);
        assert!(auth.password_matches("hunter2"));
        assert!(!auth.password_matches("hunter3"));
        assert!(!auth.password_matches(""));
    }
}
