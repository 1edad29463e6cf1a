//! User Storage
//! Mission: Securely store user accounts with SQLite and bcrypt

use crate::auth::models::User;
use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

/// Outcome of an account creation attempt
#[derive(Debug)]
pub enum CreateUser {
    Created(User),
    AlreadyExists,
}

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
    bcrypt_cost: u32,
    /// Verified against when the email is unknown, so both failure paths pay
    /// the same bcrypt cost.
    dummy_hash: String,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str, bcrypt_cost: u32) -> Result<Self> {
        let dummy_hash =
            hash("memevault-unknown-account", bcrypt_cost).context("Failed to hash password")?;
        let store = Self {
            db_path: db_path.to_string(),
            bcrypt_cost,
            dummy_hash,
        };
        store.init_db()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open user db at {}", self.db_path))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        let id: String = row.get(0)?;
        let id = Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(User {
            id,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    /// Get user by email (case-insensitive)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let email = normalize_email(email);

        conn.query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
            params![email],
            Self::row_to_user,
        )
        .optional()
        .context("Failed to look up user by email")
    }

    /// Get user by id
    pub fn get_user(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
            params![user_id.to_string()],
            Self::row_to_user,
        )
        .optional()
        .context("Failed to look up user by id")
    }

    /// Check email + password.
    ///
    /// Unknown email and wrong password both come back as `None`.
    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.get_user_by_email(email)? else {
            verify(password, &self.dummy_hash).context("Failed to verify password")?;
            return Ok(None);
        };

        let valid = verify(password, &user.password_hash).context("Failed to verify password")?;
        Ok(valid.then_some(user))
    }

    /// Create a new user; the password is salted and hashed before it touches disk.
    pub fn create_user(&self, email: &str, password: &str) -> Result<CreateUser> {
        let email = normalize_email(email);
        if self.get_user_by_email(&email)?.is_some() {
            return Ok(CreateUser::AlreadyExists);
        }

        let password_hash =
            hash(password, self.bcrypt_cost).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.created_at,
            ],
        );

        match inserted {
            Ok(_) => {}
            // Lost a race with a concurrent registration for the same email.
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Ok(CreateUser::AlreadyExists);
            }
            Err(e) => return Err(e).context("Failed to insert user"),
        }

        info!(user_id = %user.id, "✅ Created user");

        Ok(CreateUser::Created(user))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path, 4).unwrap();
        (store, temp_file)
    }

    fn created(outcome: CreateUser) -> User {
        match outcome {
            CreateUser::Created(user) => user,
            CreateUser::AlreadyExists => panic!("expected a new user"),
        }
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let user = created(store.create_user("Alice@Example.com", "password123").unwrap());
        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "password123");

        let by_email = store.get_user_by_email("ALICE@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = store.get_user(&user.id).unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (store, _temp) = create_test_store();

        created(store.create_user("bob@example.com", "password123").unwrap());
        assert!(matches!(
            store.create_user("bob@example.com", "another-pass").unwrap(),
            CreateUser::AlreadyExists
        ));
    }

    #[test]
    fn test_credential_verification_is_undifferentiated() {
        let (store, _temp) = create_test_store();
        created(store.create_user("carol@example.com", "hunter22").unwrap());

        assert!(store.verify_credentials("carol@example.com", "hunter22").unwrap().is_some());
        assert!(store.verify_credentials("carol@example.com", "wrong").unwrap().is_none());
        assert!(store.verify_credentials("nobody@example.com", "hunter22").unwrap().is_none());
    }

    #[test]
    fn test_unknown_email_pays_the_configured_bcrypt_cost() {
        let (store, _temp) = create_test_store();
        assert!(store.dummy_hash.starts_with("$2b$04$"));

        let temp_file = NamedTempFile::new().unwrap();
        let costly = UserStore::new(temp_file.path().to_str().unwrap(), 6).unwrap();
        assert!(costly.dummy_hash.starts_with("$2b$06$"));
        assert!(costly.verify_credentials("ghost@example.com", "anything").unwrap().is_none());
    }

    #[test]
    fn test_salts_differ_per_record() {
        let (store, _temp) = create_test_store();

        let a = created(store.create_user("a@example.com", "same-password").unwrap());
        let b = created(store.create_user("b@example.com", "same-password").unwrap());
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[test]
    fn test_unknown_user_id() {
        let (store, _temp) = create_test_store();
        assert!(store.get_user(&Uuid::new_v4()).unwrap().is_none());
    }
}
