use crate::{api::error::ApiError, domain::Account};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use error_ext::StdErrorExt;
use jsonwebtoken::{
    decode, encode, errors::Error, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::{sync::Arc, time::Duration};
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Header carrying the token, both when issued and when presented.
pub const TOKEN_HEADER: &str = "x-jwt-token";

const ALGORITHM: Algorithm = Algorithm::HS256;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub secret: SecretString,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub token_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub account_number: i32,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates HS256 signed tokens with a shared secret.
pub struct Tokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl Tokens {
    pub fn new(config: &Config) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(ALGORITHM),
            token_ttl: config.token_ttl,
        }
    }

    /// Issue a token for the given account, expiring after the configured TTL.
    pub fn issue(&self, account: &Account) -> Result<String, Error> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            account_number: account.number,
            iat: now.unix_timestamp(),
            exp: (now + self.token_ttl).unix_timestamp(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)?;
        debug!(account_number = account.number, exp = claims.exp, "issued token");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

/// Middleware rejecting requests without a valid token in the [TOKEN_HEADER] header.
pub async fn authorize(
    State(tokens): State<Arc<Tokens>>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match tokens.validate(token) {
        Ok(claims) => {
            debug!(account_number = claims.account_number, "accepted token");
            next.run(request).await
        }

        Err(error) => {
            warn!(error = error.as_chain(), "rejected invalid token");
            ApiError::InvalidToken.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Claims, Config, Tokens, ALGORITHM};
    use crate::domain::Account;
    use assert_matches::assert_matches;
    use jsonwebtoken::{encode, errors::ErrorKind, EncodingKey, Header};
    use secrecy::SecretString;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn config() -> Config {
        Config {
            secret: SecretString::new("test-secret".to_string()),
            token_ttl: Duration::from_secs(3_600),
        }
    }

    fn account() -> Account {
        Account {
            id: 1,
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            number: 4711,
            balance: 0.0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_issue_validate() {
        let tokens = Tokens::new(&config());

        let before = OffsetDateTime::now_utc().unix_timestamp();
        let token = tokens.issue(&account()).expect("token can be issued");
        let claims = tokens.validate(&token).expect("token is valid");

        assert_eq!(claims.account_number, 4711);
        assert!(claims.iat >= before);
        assert_eq!(claims.exp - claims.iat, 3_600);
    }

    #[test]
    fn test_expiry_relative_to_issuance() {
        let mut config = config();
        config.token_ttl = Duration::from_secs(60);
        let tokens = Tokens::new(&config);

        let token = tokens.issue(&account()).expect("token can be issued");
        let claims = tokens.validate(&token).expect("token is valid");
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn test_validate_expired() {
        let tokens = Tokens::new(&config());

        let iat = OffsetDateTime::now_utc().unix_timestamp() - 7_200;
        let claims = Claims {
            account_number: 4711,
            iat,
            exp: iat + 3_600,
        };
        let token = encode(
            &Header::new(ALGORITHM),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("token can be encoded");

        let error = tokens.validate(&token).expect_err("token is expired");
        assert_matches!(error.kind(), ErrorKind::ExpiredSignature);
    }

    #[test]
    fn test_validate_foreign_secret() {
        let tokens = Tokens::new(&config());

        let mut other_config = config();
        other_config.secret = SecretString::new("other-secret".to_string());
        let token = Tokens::new(&other_config)
            .issue(&account())
            .expect("token can be issued");

        let error = tokens.validate(&token).expect_err("token has foreign signature");
        assert_matches!(error.kind(), ErrorKind::InvalidSignature);
    }

    #[test]
    fn test_validate_garbage() {
        let tokens = Tokens::new(&config());
        assert!(tokens.validate("").is_err());
        assert!(tokens.validate("not-a-token").is_err());
    }
}
