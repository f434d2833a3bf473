use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error,
};
use uuid::Uuid;

use crate::models::Claims;

pub fn generate_access_token(
    instructor_id: u64,
    username: String,
    secret: &str,
    ttl: i64,
) -> Result<(String, Claims), Error> {
    generate_access_token_at(instructor_id, username, secret, ttl, Utc::now().timestamp())
}

/// Same as [`generate_access_token`] with an explicit issue time (unix seconds).
pub fn generate_access_token_at(
    instructor_id: u64,
    username: String,
    secret: &str,
    ttl: i64,
    issued_at: i64,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        sub: username,
        instructor_id,
        iat: issued_at,
        exp: issued_at + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    // expiry is exact: no grace period past `exp`
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind;

    const SECRET: &str = "test-secret-test-secret";
    const THIRTY_MINUTES: i64 = 30 * 60;

    #[test]
    fn fresh_token_carries_identity() {
        let (token, issued) = generate_access_token(7, "jdoe".into(), SECRET, THIRTY_MINUTES).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, "jdoe");
        assert_eq!(claims.instructor_id, 7);
        assert_eq!(claims.exp - claims.iat, THIRTY_MINUTES);
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn token_expires_after_thirty_minutes() {
        let now = Utc::now().timestamp();

        let (minute_29, _) =
            generate_access_token_at(7, "jdoe".into(), SECRET, THIRTY_MINUTES, now - 29 * 60).unwrap();
        assert!(verify_token(&minute_29, SECRET).is_ok());

        let (minute_31, _) =
            generate_access_token_at(7, "jdoe".into(), SECRET, THIRTY_MINUTES, now - 31 * 60).unwrap();
        let err = verify_token(&minute_31, SECRET).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = generate_access_token(7, "jdoe".into(), SECRET, THIRTY_MINUTES).unwrap();
        assert!(verify_token(&token, "another-secret-value").is_err());
    }
}
