//! User repository for database operations.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{PackTypeDb, UserEntity, UserRoleDb, UserStatusDb};
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, name, email, password_hash, contact, role, status, \
     current_level, pack_type, invite_code, referred_by, created_at, updated_at";

/// Fields for a new user row.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub contact: Option<&'a str>,
    pub role: UserRoleDb,
    pub status: UserStatusDb,
    pub invite_code: Option<&'a str>,
    pub referred_by: Option<Uuid>,
}

/// Optional profile fields; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub contact: Option<&'a str>,
}

/// Repository for user-related database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Users waiting for admin verification, newest first.
    pub async fn list_pending(&self) -> Result<Vec<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_pending_users");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE status = 'pending' ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Set the membership pack.
    pub async fn update_pack(
        &self,
        id: Uuid,
        pack: PackTypeDb,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_pack");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "UPDATE users SET pack_type = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(pack)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Apply a partial profile update.
    pub async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges<'_>,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_profile");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                contact = COALESCE($4, contact)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.contact)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Insert a user. A duplicate email fails with constraint `uq_users_email`.
    pub async fn insert(
        conn: &mut PgConnection,
        user: &NewUser<'_>,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, contact, role, status, invite_code, referred_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.contact)
        .bind(user.role)
        .bind(user.status)
        .bind(user.invite_code)
        .bind(user.referred_by)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Lock a user row for the rest of the transaction.
    ///
    /// `NO KEY UPDATE` still blocks other lockers and writers but lets
    /// foreign-key checks from concurrent invite inserts through.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR NO KEY UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Lock several user rows in ascending id order.
    ///
    /// A single ordered statement keeps concurrent callers from deadlocking.
    pub async fn lock_many(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<Vec<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_users");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY id FOR NO KEY UPDATE"
        ))
        .bind(ids)
        .fetch_all(conn)
        .await;
        timer.record();
        result
    }

    /// Raise a user's level. Never lowers it.
    pub async fn raise_level(
        conn: &mut PgConnection,
        id: Uuid,
        level: i32,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("raise_user_level");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET current_level = $2
            WHERE id = $1 AND current_level < $2
            "#,
        )
        .bind(id)
        .bind(level)
        .execute(conn)
        .await
        .map(|r| r.rows_affected() > 0);
        timer.record();
        result
    }

    /// Change a user's verification status.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: UserStatusDb,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_user_status");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "UPDATE users SET status = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Non-rejected users that registered with the given group code.
    pub async fn count_registrations_by_code(
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_registrations_by_code");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE invite_code = $1 AND status <> 'rejected'
            "#,
        )
        .bind(code)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Whether an account uses this email (case-insensitive).
    pub async fn email_exists(conn: &mut PgConnection, email: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("user_email_exists");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Whether an admin account exists.
    pub async fn admin_exists(conn: &mut PgConnection) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("admin_exists");
        let result =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(conn)
                .await;
        timer.record();
        result
    }
}
