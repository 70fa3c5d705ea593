//! User service
//!
//! Account registration and credential checks:
//! - `register` validates the form, rejects taken usernames or emails and
//!   stores an argon2id hash
//! - `verify` answers "does this password belong to this email"
//! - `authenticate` is what login uses; it folds an unknown email and a
//!   wrong password into one `InvalidCredentials` outcome

use crate::db::repositories::{is_unique_violation, UserRepository};
use crate::models::{RegisterInput, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 6;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// One message per failed rule, in field order
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("User with this email or username already exists")]
    DuplicateIdentity,

    /// No account with the given email
    #[error("User not found")]
    NotFound,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check a registration form. Every failing rule is reported.
pub fn validate_registration(input: &RegisterInput) -> Result<(), Vec<String>> {
    let username = input.username.trim();
    let email = input.email.trim();

    if username.is_empty()
        || email.is_empty()
        || input.password.is_empty()
        || input.confirm_password.is_empty()
    {
        return Err(vec!["All fields are required".to_string()]);
    }

    let mut errors = Vec::new();
    let username_len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username_len) {
        errors.push(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push("Username must contain only letters and numbers".to_string());
    }
    if !EMAIL_RE.is_match(email) {
        errors.push("Please provide a valid email address".to_string());
    }
    if input.password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_LEN
        ));
    }
    if input.password != input.confirm_password {
        errors.push("Passwords do not match".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Credential store over the user repository
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `Validation` if the form breaks any rule
    /// - `DuplicateIdentity` if the username or email is taken, including
    ///   when a concurrent registration wins the race to the UNIQUE index
    /// - `Internal` for storage or hashing failures
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        validate_registration(&input).map_err(UserServiceError::Validation)?;

        let username = input.username.trim().to_string();
        let email = normalize_email(&input.email);

        if self
            .user_repo
            .exists_by_username_or_email(&username, &email)
            .await
            .context("Failed to check for existing user")?
        {
            tracing::debug!("Registration rejected, identity taken: {}", username);
            return Err(UserServiceError::DuplicateIdentity);
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(username, email, password_hash);

        match self.user_repo.create(&user).await {
            Ok(created) => {
                tracing::info!("Registered user {} ({})", created.username, created.id);
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!("Registration lost a uniqueness race: {}", user.username);
                Err(UserServiceError::DuplicateIdentity)
            }
            Err(e) => Err(UserServiceError::Internal(e)),
        }
    }

    /// Check a password against the account registered under `email`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no account uses this email
    /// - `Internal` for storage failures or a corrupt stored hash
    pub async fn verify(&self, email: &str, password: &str) -> Result<bool, UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(&normalize_email(email))
            .await
            .context("Failed to get user by email")?
            .ok_or(UserServiceError::NotFound)?;

        Ok(verify_password(password, &user.password_hash)?)
    }

    /// Resolve login credentials to a user.
    ///
    /// Blank fields are a `Validation` error. An unknown email and a wrong
    /// password both come back as `InvalidCredentials`; only the debug log
    /// tells them apart.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, UserServiceError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(UserServiceError::Validation(vec![
                "Email and password are required".to_string(),
            ]));
        }

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
        {
            Some(user) => user,
            None => {
                tracing::debug!("Login failed: no account for email {}", email);
                return Err(UserServiceError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!("Login failed: password mismatch for user {}", user.id);
            return Err(UserServiceError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn count(&self) -> Result<i64, UserServiceError> {
        Ok(self.user_repo.count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(SqlxUserRepository::boxed(pool))
    }

    fn registration(username: &str, email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_missing_field_short_circuits() {
        let mut input = registration("alice", "alice@example.com", "secret1");
        input.confirm_password.clear();
        assert_eq!(
            validate_registration(&input).unwrap_err(),
            vec!["All fields are required"]
        );
    }

    #[test]
    fn test_all_rule_failures_reported() {
        let input = RegisterInput {
            username: "a!".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            confirm_password: "1234".to_string(),
        };
        assert_eq!(
            validate_registration(&input).unwrap_err(),
            vec![
                "Username must be between 3 and 20 characters",
                "Username must contain only letters and numbers",
                "Please provide a valid email address",
                "Password must be at least 6 characters long",
                "Passwords do not match",
            ]
        );
    }

    #[test]
    fn test_valid_registration_passes() {
        assert!(validate_registration(&registration("Alice99", " A@B.io ", "secret1")).is_ok());
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[tokio::test]
    async fn test_register_normalizes_email_and_hashes() {
        let service = setup_test_service().await;
        let user = service
            .register(registration("alice", "  Alice@Example.COM ", "secret1"))
            .await
            .expect("Failed to register");

        assert!(user.id > 0);
        assert_eq!(user.email, "alice@example.com");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_ne!(user.password_hash, "secret1");
    }

    #[tokio::test]
    async fn test_duplicate_registration_leaves_count_unchanged() {
        let service = setup_test_service().await;
        service
            .register(registration("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(service.count().await.unwrap(), 1);

        let same_name = service
            .register(registration("alice", "other@example.com", "secret1"))
            .await;
        assert!(matches!(same_name, Err(UserServiceError::DuplicateIdentity)));

        let same_email = service
            .register(registration("bob", "ALICE@example.com", "secret1"))
            .await;
        assert!(matches!(same_email, Err(UserServiceError::DuplicateIdentity)));

        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_invalid_input_stores_nothing() {
        let service = setup_test_service().await;
        let result = service
            .register(registration("al", "alice@example.com", "secret1"))
            .await;
        assert!(matches!(result, Err(UserServiceError::Validation(_))));
        assert_eq!(service.count().await.unwrap(), 0);
    }

    // ========================================================================
    // Verification and authentication
    // ========================================================================

    #[tokio::test]
    async fn test_verify_outcomes() {
        let service = setup_test_service().await;
        service
            .register(registration("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();

        assert!(service.verify("alice@example.com", "secret1").await.unwrap());
        assert!(!service.verify("alice@example.com", "secret2").await.unwrap());
        assert!(matches!(
            service.verify("nobody@example.com", "secret1").await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_collapses_failures() {
        let service = setup_test_service().await;
        let alice = service
            .register(registration("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();

        let user = service
            .authenticate(" ALICE@example.com", "secret1")
            .await
            .expect("valid credentials");
        assert_eq!(user.id, alice.id);

        assert!(matches!(
            service.authenticate("alice@example.com", "wrong!").await,
            Err(UserServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.authenticate("ghost@example.com", "secret1").await,
            Err(UserServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.authenticate("", "").await,
            Err(UserServiceError::Validation(_))
        ));
    }

    #[derive(Debug, Clone)]
    enum Edit {
        Replace(prop::sample::Index, char),
        Insert(prop::sample::Index, char),
        Remove(prop::sample::Index),
    }

    fn edit_strategy() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (any::<prop::sample::Index>(), prop::char::range('!', '~'))
                .prop_map(|(i, c)| Edit::Replace(i, c)),
            (any::<prop::sample::Index>(), prop::char::range('!', '~'))
                .prop_map(|(i, c)| Edit::Insert(i, c)),
            any::<prop::sample::Index>().prop_map(Edit::Remove),
        ]
    }

    fn apply_edits(password: &str, edits: &[Edit]) -> String {
        let mut chars: Vec<char> = password.chars().collect();
        for edit in edits {
            match edit {
                Edit::Replace(i, c) if !chars.is_empty() => {
                    let at = i.index(chars.len());
                    chars[at] = *c;
                }
                Edit::Insert(i, c) => {
                    let at = i.index(chars.len() + 1);
                    chars.insert(at, *c);
                }
                Edit::Remove(i) if !chars.is_empty() => {
                    let at = i.index(chars.len());
                    chars.remove(at);
                }
                _ => {}
            }
        }
        chars.into_iter().collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// A registered password verifies; any altered form of it does not,
        /// whether characters were replaced, inserted or removed.
        #[test]
        fn property_verify_rejects_altered_password(
            password in "[a-zA-Z0-9]{6,16}",
            edits in prop::collection::vec(edit_strategy(), 1..4),
        ) {
            let altered = apply_edits(&password, &edits);
            prop_assume!(altered != password);

            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let service = setup_test_service().await;
                service
                    .register(registration("propuser", "prop@example.com", &password))
                    .await
                    .expect("register should succeed");

                prop_assert!(service.verify("prop@example.com", &password).await.unwrap());
                prop_assert!(!service.verify("prop@example.com", &altered).await.unwrap());
                Ok(())
            });
            result?;
        }
    }

    #[tokio::test]
    async fn test_verify_rejects_appended_and_truncated_password() {
        let service = setup_test_service().await;
        service
            .register(registration("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();

        assert!(!service.verify("alice@example.com", "secret12").await.unwrap());
        assert!(!service.verify("alice@example.com", "secret").await.unwrap());
        assert!(!service.verify("alice@example.com", "").await.unwrap());
    }
}
