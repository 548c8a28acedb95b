use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::{Investor, Session, TokenRole, User};
use crate::db::store::Store;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::Result;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: TokenRole,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Fields accepted when an investor signs up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvestor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    pub investment_capacity: Option<f64>,
    #[serde(default)]
    pub preferred_crops: Vec<String>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
}

pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_secret: String,
    token_expiry_hours: i64,
    bcrypt_cost: u32,
}

/// Sessions are keyed by a digest so raw bearer tokens never reach storage.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: &AuthConfig) -> Self {
        Self {
            store,
            jwt_secret: config.jwt_secret.clone(),
            token_expiry_hours: config.token_expiry_hours,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?
            .map_err(AppError::from)
    }

    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?
            .map_err(AppError::from)
    }

    pub async fn register_farmer(&self, phone: &str, password: &str) -> Result<(User, String)> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(AppError::validation("Phone number is required"));
        }
        validate_password(password)?;

        if self.store.get_user_by_phone(phone).await?.is_some() {
            return Err(AppError::validation("User already exists with this phone number"));
        }

        let hash = self.hash_password(password).await?;
        let user = match self.store.create_user(&User::new(phone.to_string(), hash)).await {
            Ok(user) => user,
            // Lost a race with a concurrent registration.
            Err(AppError::DatabaseError(DatabaseError::Duplicate(_))) => {
                return Err(AppError::validation("User already exists with this phone number"));
            }
            Err(e) => return Err(e),
        };

        let token = self.issue_token(user.id, TokenRole::Farmer).await?;
        info!("Registered farmer {}", user.id);
        Ok((user, token))
    }

    pub async fn login_farmer(&self, phone: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .store
            .get_user_by_phone(phone.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.issue_token(user.id, TokenRole::Farmer).await?;
        Ok((user, token))
    }

    pub async fn register_investor(&self, new: NewInvestor) -> Result<(Investor, String)> {
        let email = new.email.trim().to_lowercase();
        let phone = new.phone.trim().to_string();
        let name = new.name.trim().to_string();
        if name.is_empty() || email.is_empty() || phone.is_empty() {
            return Err(AppError::validation("Name, email, phone and password are required"));
        }
        validate_password(&new.password)?;

        if self.store.find_investor_by_email_or_phone(&email, &phone).await?.is_some() {
            return Err(AppError::validation("Investor already exists with this email or phone"));
        }

        let now = Utc::now();
        let investor = Investor {
            id: Uuid::new_v4(),
            name,
            email,
            phone,
            password_hash: self.hash_password(&new.password).await?,
            investment_capacity: new.investment_capacity.unwrap_or(0.0),
            preferred_crops: new.preferred_crops,
            preferred_locations: new.preferred_locations,
            role: Investor::ROLE.to_string(),
            is_verified: false,
            created_at: now,
            updated_at: now,
        };

        let investor = match self.store.create_investor(&investor).await {
            Ok(investor) => investor,
            Err(AppError::DatabaseError(DatabaseError::Duplicate(_))) => {
                return Err(AppError::validation("Investor already exists with this email or phone"));
            }
            Err(e) => return Err(e),
        };

        let token = self.issue_token(investor.id, TokenRole::Investor).await?;
        info!("Registered investor {}", investor.id);
        Ok((investor, token))
    }

    pub async fn login_investor(&self, email: &str, password: &str) -> Result<(Investor, String)> {
        let investor = self
            .store
            .get_investor_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &investor.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.issue_token(investor.id, TokenRole::Investor).await?;
        Ok((investor, token))
    }

    /// Signs a token and records its session.
    pub async fn issue_token(&self, subject: Uuid, role: TokenRole) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        let session = Session::new(hash_token(&token), subject, role, self.token_expiry_hours);
        self.store.create_session(&session).await?;

        Ok(token)
    }

    /// Checks the signature, the session and the role, returning the subject id.
    pub async fn validate_token(&self, token: &str, role: TokenRole) -> Result<Uuid> {
        let claims = self.decode_token(token)?;
        if claims.role != role {
            debug!("Token role {} does not match required {}", claims.role, role);
            return Err(AuthError::InvalidToken.into());
        }

        let token_hash = hash_token(token);
        let session = self
            .store
            .get_session(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if session.is_expired() {
            return Err(AuthError::TokenExpired.into());
        }

        let subject = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        if subject != session.subject_id {
            warn!("Session subject mismatch for token");
            return Err(AuthError::InvalidToken.into());
        }

        self.store.touch_session(&token_hash).await?;
        Ok(subject)
    }

    pub async fn authenticate_farmer(&self, token: &str) -> Result<User> {
        let subject = self.validate_token(token, TokenRole::Farmer).await?;
        self.store
            .get_user_by_id(subject)
            .await?
            .ok_or_else(|| AuthError::InvalidToken.into())
    }

    pub async fn authenticate_investor(&self, token: &str) -> Result<Investor> {
        let subject = self.validate_token(token, TokenRole::Investor).await?;
        self.store
            .get_investor_by_id(subject)
            .await?
            .ok_or_else(|| AuthError::InvalidToken.into())
    }

    pub async fn invalidate_token(&self, token: &str) -> Result<()> {
        self.store.delete_session(&hash_token(token)).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.store.cleanup_expired_sessions().await
    }

    fn decode_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    fn service() -> AuthService {
        let config = AuthConfig {
            jwt_secret: "test_secret".into(),
            token_expiry_hours: 1,
            bcrypt_cost: 4,
        };
        AuthService::new(Arc::new(MemoryStore::new()), &config)
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let (user, token) = auth.register_farmer(" 9876543210 ", "secret1").await.unwrap();
        assert_eq!(user.phone, "9876543210");

        let authed = auth.authenticate_farmer(&token).await.unwrap();
        assert_eq!(authed.id, user.id);

        let (again, _) = auth.login_farmer("9876543210", "secret1").await.unwrap();
        assert_eq!(again.id, user.id);

        let err = auth.login_farmer("9876543210", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password_and_duplicates() {
        let auth = service();
        let err = auth.register_farmer("111", "12345").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        auth.register_farmer("111", "123456").await.unwrap();
        let err = auth.register_farmer("111", "123456").await.unwrap_err();
        assert_eq!(err.to_string(), "User already exists with this phone number");
    }

    #[tokio::test]
    async fn test_token_role_is_enforced() {
        let auth = service();
        let (_, token) = auth.register_farmer("222", "123456").await.unwrap();

        let err = auth.authenticate_investor(&token).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_invalidated_token_is_rejected() {
        let auth = service();
        let (_, token) = auth.register_farmer("333", "123456").await.unwrap();

        auth.invalidate_token(&token).await.unwrap();
        let err = auth.authenticate_farmer(&token).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_tokens_issued_together_are_distinct() {
        let auth = service();
        let subject = Uuid::new_v4();
        let first = auth.issue_token(subject, TokenRole::Farmer).await.unwrap();
        let second = auth.issue_token(subject, TokenRole::Farmer).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_investor_email_is_normalised() {
        let auth = service();
        let new = NewInvestor {
            name: "Asha".into(),
            email: "Asha@Example.COM".into(),
            phone: "999".into(),
            password: "123456".into(),
            ..Default::default()
        };
        let (investor, _) = auth.register_investor(new.clone()).await.unwrap();
        assert_eq!(investor.email, "asha@example.com");
        assert_eq!(investor.role, "investor");

        let err = auth.register_investor(new).await.unwrap_err();
        assert_eq!(err.to_string(), "Investor already exists with this email or phone");

        auth.login_investor("ASHA@example.com", "123456").await.unwrap();
    }
}
