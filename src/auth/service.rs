//! Account registration, login and request authentication
//!
//! [`AuthService`] ties the credential hasher and the token service to the
//! user store. Password hashing runs on the blocking pool so that Argon2 does
//! not stall the async workers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::{AppError, AuthError, DbError, HashError};
use crate::models::{AuthResponse, LoginRequest, NewUser, RegisterRequest, User, UserResponse};
use crate::validation;

use super::password::CredentialHasher;
use super::token::TokenService;

/// Identity attached to a request once its bearer token has been verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
}

/// Authentication service
pub struct AuthService<D: Database> {
    db: Arc<D>,
    hasher: CredentialHasher,
    tokens: TokenService,

    /// Digest checked against when the email is unknown, so that login takes
    /// the same Argon2 work either way
    placeholder_digest: Option<String>,
}

impl<D: Database> AuthService<D> {
    /// Create a new authentication service
    pub fn new(db: Arc<D>, hasher: CredentialHasher, tokens: TokenService) -> Self {
        let placeholder_digest = match hasher.hash("youdo-unknown-account") {
            Ok(digest) => Some(digest),
            Err(e) => {
                warn!(error = %e, "Could not prepare placeholder password digest");
                None
            }
        };

        Self {
            db,
            hasher,
            tokens,
            placeholder_digest,
        }
    }

    /// Token service used for issuing and verifying sessions
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new account and open a session for it
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        let name = validation::sanitize(&req.name);
        let email = validation::sanitize(&req.email);

        validation::validate_email(&email)?;
        validation::validate_password(&req.password)?;
        validation::validate_name(&name)?;

        if self.db.email_exists(&email).await? {
            debug!(email = %email, "Registration rejected, email taken");
            return Err(AuthError::EmailTaken.into());
        }

        let password_hash = self.hash_password(req.password).await?;

        let user = match self
            .db
            .create_user(&NewUser::new(email, password_hash, name))
            .await
        {
            Ok(user) => user,
            // Lost a race with a concurrent registration for the same email
            Err(DbError::ConstraintViolation(_)) => return Err(AuthError::EmailTaken.into()),
            Err(e) => return Err(e.into()),
        };

        info!(user_id = user.id, "User registered");
        self.session_for(&user)
    }

    /// Check credentials and open a session
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        let email = validation::sanitize(&req.email);

        let Some(user) = self.db.get_user_by_email(&email).await? else {
            if let Some(digest) = self.placeholder_digest.clone() {
                let _ = self.verify_password(digest, req.password).await;
            }
            debug!("Login failed, unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self.verify_password(user.password_hash.clone(), req.password).await? {
            debug!(user_id = user.id, "Login failed, wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        info!(user_id = user.id, "User logged in");
        self.session_for(&user)
    }

    /// Resolve a bearer token into the identity it was issued for
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        match self.tokens.verify(token) {
            Ok(claims) => Ok(AuthenticatedUser {
                user_id: claims.user_id,
                email: claims.email,
            }),
            Err(e) => {
                debug!(kind = e.kind(), "Token verification failed");
                Err(AuthError::Token(e))
            }
        }
    }

    /// Look up the account behind an authenticated request
    pub async fn current_user(&self, user_id: i64) -> Result<UserResponse, AppError> {
        match self.db.get_user_by_id(user_id).await? {
            Some(user) => Ok(UserResponse::from(&user)),
            None => Err(AuthError::UnknownUser.into()),
        }
    }

    fn session_for(&self, user: &User) -> Result<AuthResponse, AppError> {
        let token = self.tokens.issue(user.id, &user.email)?;
        Ok(AuthResponse {
            token,
            user: UserResponse::from(user),
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, HashError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashError::HashFailed(e.to_string()))?
    }

    async fn verify_password(&self, digest: String, password: String) -> Result<bool, HashError> {
        let hasher = self.hasher.clone();
        let result = tokio::task::spawn_blocking(move || hasher.verify(&digest, &password))
            .await
            .map_err(|e| HashError::HashFailed(e.to_string()))?;

        if let Err(e) = &result {
            warn!(error = %e, "Stored password hash could not be verified");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockDatabase;
    use crate::error::{TokenError, ValidationError};
    use chrono::Utc;
    use std::time::Duration;

    const SECRET: &str = "service-test-secret";

    fn cheap_hasher() -> CredentialHasher {
        CredentialHasher::new(8, 1, 1).unwrap()
    }

    fn create_test_service(db: MockDatabase) -> AuthService<MockDatabase> {
        AuthService::new(
            Arc::new(db),
            cheap_hasher(),
            TokenService::new(SECRET, Duration::from_secs(3600)),
        )
    }

    fn stored_user(id: i64, email: &str, password: &str) -> User {
        let now = Utc::now();
        User {
            id,
            email: email.to_string(),
            password_hash: cheap_hasher().hash(password).unwrap(),
            name: "Ana".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "  Ana  ".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    // Test 1: Successful registration stores a hash and returns a session
    #[tokio::test]
    async fn test_register_success() {
        let mut mock_db = MockDatabase::new();

        mock_db.expect_email_exists().returning(|_| Ok(false));
        mock_db
            .expect_create_user()
            .withf(|u| {
                u.email == "ana@example.com"
                    && u.name == "Ana"
                    && u.password_hash.starts_with("$argon2id$")
                    && u.password_hash != "password123"
            })
            .returning(|u| {
                let now = Utc::now();
                Ok(User {
                    id: 10,
                    email: u.email.clone(),
                    password_hash: u.password_hash.clone(),
                    name: u.name.clone(),
                    created_at: now,
                    updated_at: now,
                })
            });

        let service = create_test_service(mock_db);
        let resp = service
            .register(register_request(" ana@example.com ", "password123"))
            .await
            .unwrap();

        assert_eq!(resp.user.id, 10);
        assert_eq!(resp.user.email, "ana@example.com");
        assert_eq!(resp.user.name, "Ana");

        let who = service.authenticate(&resp.token).unwrap();
        assert_eq!(who.user_id, 10);
        assert_eq!(who.email, "ana@example.com");
    }

    // Test 2: Duplicate email is rejected before hashing
    #[tokio::test]
    async fn test_register_email_taken() {
        let mut mock_db = MockDatabase::new();
        mock_db.expect_email_exists().returning(|_| Ok(true));
        mock_db.expect_create_user().never();

        let service = create_test_service(mock_db);
        let result = service
            .register(register_request("ana@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(AppError::Auth(AuthError::EmailTaken))));
    }

    // Test 3: Constraint race on insert is still reported as EmailTaken
    #[tokio::test]
    async fn test_register_email_taken_race() {
        let mut mock_db = MockDatabase::new();
        mock_db.expect_email_exists().returning(|_| Ok(false));
        mock_db
            .expect_create_user()
            .returning(|_| Err(DbError::ConstraintViolation("UNIQUE".to_string())));

        let service = create_test_service(mock_db);
        let result = service
            .register(register_request("ana@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(AppError::Auth(AuthError::EmailTaken))));
    }

    // Test 4: Invalid fields fail validation without touching the database
    #[tokio::test]
    async fn test_register_validation() {
        let service = create_test_service(MockDatabase::new());

        let result = service
            .register(register_request("not-an-email", "password123"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::InvalidEmail))
        ));

        let result = service
            .register(register_request("ana@example.com", "short1"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::WeakPassword))
        ));

        let mut req = register_request("ana@example.com", "password123");
        req.name = " A ".to_string();
        let result = service.register(req).await;
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::InvalidField { field: "name", .. }))
        ));
    }

    // Test 5: Login with correct credentials
    #[tokio::test]
    async fn test_login_success() {
        let mut mock_db = MockDatabase::new();
        let user = stored_user(3, "ana@example.com", "password123");
        mock_db
            .expect_get_user_by_email()
            .withf(|email| email == "ana@example.com")
            .returning(move |_| Ok(Some(user.clone())));

        let service = create_test_service(mock_db);
        let resp = service
            .login(LoginRequest {
                email: "ana@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(resp.user.id, 3);
        assert_eq!(service.authenticate(&resp.token).unwrap().user_id, 3);
    }

    // Test 6: Wrong password and unknown email give the same error
    #[tokio::test]
    async fn test_login_failures_indistinguishable() {
        let mut mock_db = MockDatabase::new();
        let user = stored_user(3, "ana@example.com", "password123");
        mock_db.expect_get_user_by_email().returning(move |email| {
            if email == "ana@example.com" {
                Ok(Some(user.clone()))
            } else {
                Ok(None)
            }
        });

        let service = create_test_service(mock_db);

        let wrong_password = service
            .login(LoginRequest {
                email: "ana@example.com".to_string(),
                password: "password124".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_email = service
            .login(LoginRequest {
                email: "bob@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            wrong_password,
            AppError::Auth(AuthError::InvalidCredentials)
        ));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    // Test 7: Corrupt stored hash is an internal error, not a mismatch
    #[tokio::test]
    async fn test_login_malformed_stored_hash() {
        let mut mock_db = MockDatabase::new();
        mock_db.expect_get_user_by_email().returning(|email| {
            let now = Utc::now();
            Ok(Some(User {
                id: 1,
                email: email.to_string(),
                password_hash: "garbage".to_string(),
                name: "Ana".to_string(),
                created_at: now,
                updated_at: now,
            }))
        });

        let service = create_test_service(mock_db);
        let result = service
            .login(LoginRequest {
                email: "ana@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Hash(HashError::MalformedDigest(_)))
        ));
    }

    // Test 8: authenticate keeps the token failure kind
    #[tokio::test]
    async fn test_authenticate_failures() {
        let service = create_test_service(MockDatabase::new());

        assert_eq!(
            service.authenticate("garbage"),
            Err(AuthError::Token(TokenError::Malformed))
        );

        let foreign = TokenService::new("other-secret", Duration::from_secs(60))
            .issue(1, "a@b.co")
            .unwrap();
        assert_eq!(
            service.authenticate(&foreign),
            Err(AuthError::Token(TokenError::SignatureInvalid))
        );

        let expired = crate::auth::token::issue_token(1, "a@b.co", SECRET, -1).unwrap();
        assert_eq!(
            service.authenticate(&expired),
            Err(AuthError::Token(TokenError::Expired))
        );
    }

    // Test 9: current_user resolves or reports an unknown user
    #[tokio::test]
    async fn test_current_user() {
        let mut mock_db = MockDatabase::new();
        let user = stored_user(4, "me@example.com", "password123");
        mock_db.expect_get_user_by_id().returning(move |id| {
            if id == 4 {
                Ok(Some(user.clone()))
            } else {
                Ok(None)
            }
        });

        let service = create_test_service(mock_db);

        let me = service.current_user(4).await.unwrap();
        assert_eq!(me.email, "me@example.com");

        let missing = service.current_user(5).await;
        assert!(matches!(
            missing,
            Err(AppError::Auth(AuthError::UnknownUser))
        ));
    }

    // Test 10: Unknown email still pays for a password verification
    #[tokio::test]
    async fn test_login_unknown_email_runs_verification() {
        // Cost high enough that skipping Argon2 would be obvious
        let hasher = CredentialHasher::new(4096, 8, 1).unwrap();
        let known = User {
            password_hash: hasher.hash("password123").unwrap(),
            ..stored_user(1, "known@example.com", "unused1")
        };

        let mut mock_db = MockDatabase::new();
        mock_db.expect_get_user_by_email().returning(move |email| {
            if email == "known@example.com" {
                Ok(Some(known.clone()))
            } else {
                Ok(None)
            }
        });
        let service = AuthService::new(
            Arc::new(mock_db),
            hasher.clone(),
            TokenService::new(SECRET, Duration::from_secs(3600)),
        );

        let digest = service.placeholder_digest.clone().unwrap();
        assert!(digest.contains("m=4096,t=8,p=1"));
        assert!(!hasher.verify(&digest, "password123").unwrap());

        let login = |email: &str| LoginRequest {
            email: email.to_string(),
            password: "password123x".to_string(),
        };

        let started = std::time::Instant::now();
        let wrong_password = service.login(login("known@example.com")).await;
        let wrong_password_time = started.elapsed();

        let started = std::time::Instant::now();
        let unknown_email = service.login(login("ghost@example.com")).await;
        let unknown_email_time = started.elapsed();

        assert!(matches!(
            unknown_email,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(matches!(
            wrong_password,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(
            unknown_email_time * 4 >= wrong_password_time,
            "unknown email took {:?}, wrong password {:?}",
            unknown_email_time,
            wrong_password_time
        );
    }
}
