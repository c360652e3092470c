//! Session token management.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use placebook_core::{Role, UserId};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{AuthError, Identity};

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (decimal user ID).
    pub sub: String,
    /// User role at issuance.
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Interpret the claims as a caller identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Malformed` if `sub` is not a user id.
    pub fn identity(&self) -> Result<Identity, AuthError> {
        let user_id: UserId = self
            .sub
            .parse()
            .map_err(|_| AuthError::Malformed(format!("invalid subject: {}", self.sub)))?;
        Ok(Identity {
            user_id,
            role: self.role,
        })
    }
}

/// A freshly issued session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Always "Bearer".
    pub token_type: String,
    /// Absolute expiration.
    pub expires_at: DateTime<Utc>,
}

/// JWT manager for creating and validating tokens.
///
/// Tokens are stateless: nothing is stored server-side, so a token cannot be
/// revoked before `exp`. Logout discards the client's copy.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtManager {
    /// Create a new JWT manager with a secret key.
    ///
    /// The secret should be at least 32 bytes for security.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `validate_at` against an explicit clock
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Create a JWT manager from a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if hex decoding fails.
    pub fn from_hex_secret(hex_secret: &str, ttl: Duration) -> Result<Self, AuthError> {
        let secret = hex::decode(hex_secret)
            .map_err(|e| AuthError::Config(format!("Invalid hex secret: {e}")))?;
        Ok(Self::new(&secret, ttl))
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    /// Configured token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a user, valid for the configured TTL from now.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue(&self, user_id: UserId, role: Role) -> Result<IssuedToken, AuthError> {
        self.issue_at(user_id, role, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the expiry instant is not representable or token
    /// encoding fails.
    pub fn issue_at(
        &self,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AuthError::Config(format!("Token TTL out of range: {e}")))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Config("Token expiry out of range".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Config(format!("Token encoding failed: {e}")))?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer".to_string(),
            expires_at,
        })
    }

    /// Validate a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `SignatureInvalid` or `Expired`.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`.
    ///
    /// Signature is checked before any claim is trusted. The token is valid
    /// up to and including its `exp` second and expired strictly after.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `SignatureInvalid` or `Expired`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed(e.to_string()),
            })?
            .claims;

        // Reject unusable subjects up front
        claims.identity()?;

        if now.timestamp() > claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Extract token from Authorization header.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn create_manager() -> JwtManager {
        let secret = JwtManager::generate_secret();
        JwtManager::new(&secret, DAY)
    }

    /// Replace one character inside the given JWT segment.
    fn tamper(token: &str, segment: usize) -> String {
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let target = &mut parts[segment];
        let first = target.remove(0);
        target.insert(0, if first == 'A' { 'B' } else { 'A' });
        parts.join(".")
    }

    #[test]
    fn test_generate_secret() {
        let secret1 = JwtManager::generate_secret();
        let secret2 = JwtManager::generate_secret();
        assert_ne!(secret1, secret2);
        assert_eq!(secret1.len(), 32);
    }

    #[test]
    fn test_issue_and_validate() {
        let manager = create_manager();
        let issued = manager.issue(UserId(7), Role::Admin).unwrap();

        assert_eq!(issued.token_type, "Bearer");
        assert!(issued.expires_at > Utc::now());

        let claims = manager.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(
            claims.identity().unwrap(),
            Identity {
                user_id: UserId(7),
                role: Role::Admin
            }
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let manager = create_manager();
        let now = Utc::now();
        let issued = manager.issue_at(UserId(1), Role::User, now).unwrap();
        let exp = issued.expires_at;

        assert!(manager.validate_at(&issued.token, now).is_ok());
        assert!(manager.validate_at(&issued.token, exp).is_ok());
        assert!(matches!(
            manager.validate_at(&issued.token, exp + chrono::Duration::seconds(1)),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_expired_token_against_wall_clock() {
        let manager = create_manager();
        let long_ago = Utc::now() - chrono::Duration::days(3);
        let issued = manager.issue_at(UserId(1), Role::User, long_ago).unwrap();
        assert!(matches!(
            manager.validate(&issued.token),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_ttl_is_configurable() {
        let manager =
            JwtManager::new(&JwtManager::generate_secret(), Duration::from_secs(72 * 3600));
        let now = Utc::now();
        let issued = manager.issue_at(UserId(1), Role::User, now).unwrap();
        assert_eq!(issued.expires_at - now, chrono::Duration::hours(72));
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let manager = JwtManager::new(
            &JwtManager::generate_secret(),
            Duration::from_secs(10_000_000_000 * 3600),
        );
        assert!(matches!(
            manager.issue(UserId(1), Role::User),
            Err(AuthError::Config(_))
        ));

        let near_end = DateTime::<Utc>::MAX_UTC - chrono::Duration::hours(1);
        assert!(matches!(
            create_manager().issue_at(UserId(1), Role::User, near_end),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_tampered_signature() {
        let manager = create_manager();
        let issued = manager.issue(UserId(1), Role::User).unwrap();
        let forged = tamper(&issued.token, 2);
        assert!(matches!(
            manager.validate(&forged),
            Err(AuthError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_tampered_claims() {
        let manager = create_manager();
        let issued = manager.issue(UserId(1), Role::User).unwrap();
        let forged = tamper(&issued.token, 1);
        assert!(matches!(
            manager.validate(&forged),
            Err(AuthError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_foreign_secret() {
        let ours = create_manager();
        let theirs = create_manager();
        let issued = theirs.issue(UserId(1), Role::Admin).unwrap();
        assert!(matches!(
            ours.validate(&issued.token),
            Err(AuthError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let manager = create_manager();
        for garbage in ["", "invalid", "invalid.token.here", "a.b", "..."] {
            assert!(
                matches!(manager.validate(garbage), Err(AuthError::Malformed(_))),
                "expected Malformed for {garbage:?}"
            );
        }
    }

    #[test]
    fn test_non_numeric_subject_is_malformed() {
        let secret = JwtManager::generate_secret();
        let manager = JwtManager::new(&secret, DAY);
        let claims = serde_json::json!({
            "sub": "user_abc",
            "role": "user",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 3600,
        });
        let token =
            encode(&Header::default(), &claims, &EncodingKey::from_secret(&secret)).unwrap();
        assert!(matches!(manager.validate(&token), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_unknown_role_is_malformed() {
        let secret = JwtManager::generate_secret();
        let manager = JwtManager::new(&secret, DAY);
        let claims = serde_json::json!({
            "sub": "1",
            "role": "root",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 3600,
        });
        let token =
            encode(&Header::default(), &claims, &EncodingKey::from_secret(&secret)).unwrap();
        assert!(matches!(manager.validate(&token), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(
            JwtManager::extract_from_header("Bearer abc123"),
            Some("abc123")
        );
        assert_eq!(
            JwtManager::extract_from_header("bearer abc123"),
            Some("abc123")
        );
        assert_eq!(JwtManager::extract_from_header("abc123"), None);
        assert_eq!(JwtManager::extract_from_header("Bearer "), None);
        assert_eq!(JwtManager::extract_from_header("Basic dXNlcjpwdw=="), None);
    }

    #[test]
    fn test_hex_secret() {
        let hex_secret = JwtManager::generate_hex_secret();
        assert_eq!(hex_secret.len(), 64); // 32 bytes = 64 hex chars

        let manager = JwtManager::from_hex_secret(&hex_secret, DAY).unwrap();
        let issued = manager.issue(UserId(3), Role::User).unwrap();
        assert!(manager.validate(&issued.token).is_ok());

        assert!(JwtManager::from_hex_secret("zz", DAY).is_err());
    }
}
