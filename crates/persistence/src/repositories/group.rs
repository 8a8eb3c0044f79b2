//! Group repository for database operations.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{
    GroupEntity, GroupMemberEntity, GroupPreviewEntity, GroupWithCountsEntity,
    OwnedGroupCountEntity, OwnerGroupProgressEntity,
};
use crate::metrics::QueryTimer;

/// Attempts before giving up on finding an unused group code.
pub const MAX_CODE_ATTEMPTS: usize = 20;

/// Repository for group-related database operations.
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    /// Creates a new GroupRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a group with its member and verified counts.
    pub async fn find_with_counts(
        &self,
        id: Uuid,
    ) -> Result<Option<GroupWithCountsEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_group_with_counts");
        let result = sqlx::query_as::<_, GroupWithCountsEntity>(
            r#"
            SELECT g.id, g.code, g.owner_id, g.group_number, g.created_at,
                   COUNT(i.id) AS members,
                   COUNT(i.id) FILTER (WHERE i.owner_confirmed AND u.status = 'active') AS verified_members
            FROM groups g
            LEFT JOIN invites i ON i.group_id = g.id
            LEFT JOIN users u ON u.id = i.referred_user_id
            WHERE g.id = $1
            GROUP BY g.id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Every group owned by a user with counts, lowest level first.
    pub async fn list_owned_with_counts(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<GroupWithCountsEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_owned_groups_with_counts");
        let result = sqlx::query_as::<_, GroupWithCountsEntity>(
            r#"
            SELECT g.id, g.code, g.owner_id, g.group_number, g.created_at,
                   COUNT(i.id) AS members,
                   COUNT(i.id) FILTER (WHERE i.owner_confirmed AND u.status = 'active') AS verified_members
            FROM groups g
            LEFT JOIN invites i ON i.group_id = g.id
            LEFT JOIN users u ON u.id = i.referred_user_id
            WHERE g.owner_id = $1
            GROUP BY g.id
            ORDER BY g.group_number ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Members of a group in join order.
    pub async fn list_members(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<GroupMemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_members");
        let result = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            SELECT i.id AS invite_id, u.id AS user_id, u.name, u.email, u.contact, u.status,
                   i.owner_confirmed, i.created_at AS joined_at
            FROM invites i
            JOIN users u ON u.id = i.referred_user_id
            WHERE i.group_id = $1
            ORDER BY i.created_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Public preview of a group by code.
    pub async fn preview_by_code(
        &self,
        code: &str,
    ) -> Result<Option<GroupPreviewEntity>, sqlx::Error> {
        let timer = QueryTimer::new("preview_group_by_code");
        let result = sqlx::query_as::<_, GroupPreviewEntity>(
            r#"
            SELECT g.code, g.group_number, o.name AS owner_name,
                   (SELECT COUNT(*) FROM invites i
                    JOIN users u ON u.id = i.referred_user_id
                    WHERE i.group_id = g.id AND i.owner_confirmed AND u.status = 'active') AS verified_members,
                   (SELECT COUNT(*) FROM users r
                    WHERE r.invite_code = g.code AND r.status <> 'rejected') AS registered_with_code
            FROM groups g
            JOIN users o ON o.id = g.owner_id
            WHERE g.code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Groups of every active user with verified counts, for the repair sweep.
    pub async fn list_active_owner_progress(
        &self,
    ) -> Result<Vec<OwnerGroupProgressEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_owner_progress");
        let result = sqlx::query_as::<_, OwnerGroupProgressEntity>(
            r#"
            SELECT o.id AS owner_id, o.name AS owner_name, o.email AS owner_email,
                   g.group_number,
                   COUNT(i.id) FILTER (WHERE i.owner_confirmed AND u.status = 'active') AS verified_members
            FROM users o
            JOIN groups g ON g.owner_id = o.id
            LEFT JOIN invites i ON i.group_id = g.id
            LEFT JOIN users u ON u.id = i.referred_user_id
            WHERE o.status = 'active'
            GROUP BY o.id, g.id
            ORDER BY o.created_at ASC, o.id, g.group_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a group by code and lock it for the rest of the transaction.
    pub async fn find_by_code_for_update(
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<Option<GroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_group_by_code");
        let result = sqlx::query_as::<_, GroupEntity>(
            r#"
            SELECT id, code, owner_id, group_number, created_at
            FROM groups
            WHERE code = $1
            FOR NO KEY UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Find a group by ID inside a transaction.
    pub async fn find_by_id_in(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<GroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_group_by_id");
        let result = sqlx::query_as::<_, GroupEntity>(
            r#"
            SELECT id, code, owner_id, group_number, created_at
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Owned groups with verified counts, lowest level first.
    pub async fn list_owned_counts(
        conn: &mut PgConnection,
        owner_id: Uuid,
    ) -> Result<Vec<OwnedGroupCountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_owned_group_counts");
        let result = sqlx::query_as::<_, OwnedGroupCountEntity>(
            r#"
            SELECT g.id, g.group_number,
                   COUNT(i.id) FILTER (WHERE i.owner_confirmed AND u.status = 'active') AS verified_members
            FROM groups g
            LEFT JOIN invites i ON i.group_id = g.id
            LEFT JOIN users u ON u.id = i.referred_user_id
            WHERE g.owner_id = $1
            GROUP BY g.id
            ORDER BY g.group_number ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(conn)
        .await;
        timer.record();
        result
    }

    /// Confirmed invites whose referred user is active.
    pub async fn count_verified(
        conn: &mut PgConnection,
        group_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_verified_members");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM invites i
            JOIN users u ON u.id = i.referred_user_id
            WHERE i.group_id = $1 AND i.owner_confirmed = true AND u.status = 'active'
            "#,
        )
        .bind(group_id)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Whether the owner already has a group at this level.
    pub async fn owner_has_group(
        conn: &mut PgConnection,
        owner_id: Uuid,
        group_number: i32,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("owner_has_group");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM groups WHERE owner_id = $1 AND group_number = $2)",
        )
        .bind(owner_id)
        .bind(group_number)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Check if code exists.
    pub async fn code_exists(conn: &mut PgConnection, code: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("check_group_code_exists");
        let result =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM groups WHERE code = $1)")
                .bind(code)
                .fetch_one(conn)
                .await;
        timer.record();
        result
    }

    /// Insert a group unless any unique constraint would be violated.
    ///
    /// Returns `None` on conflict, either on `(owner_id, group_number)` or on
    /// the code. A conflict does not abort the surrounding transaction.
    pub async fn insert_if_absent(
        conn: &mut PgConnection,
        owner_id: Uuid,
        group_number: i32,
        code: &str,
    ) -> Result<Option<GroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_group");
        let result = sqlx::query_as::<_, GroupEntity>(
            r#"
            INSERT INTO groups (code, owner_id, group_number)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING id, code, owner_id, group_number, created_at
            "#,
        )
        .bind(code)
        .bind(owner_id)
        .bind(group_number)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Create the owner's group at `group_number` with a fresh code.
    ///
    /// Returns `None` when the owner already has a group at that level.
    /// Code collisions are retried with a new code.
    pub async fn create_with_unique_code<F>(
        conn: &mut PgConnection,
        owner_id: Uuid,
        group_number: i32,
        generator: F,
    ) -> Result<Option<GroupEntity>, sqlx::Error>
    where
        F: Fn() -> String,
    {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generator();
            if Self::code_exists(&mut *conn, &code).await? {
                continue;
            }

            if let Some(group) =
                Self::insert_if_absent(&mut *conn, owner_id, group_number, &code).await?
            {
                return Ok(Some(group));
            }

            if Self::owner_has_group(&mut *conn, owner_id, group_number).await? {
                return Ok(None);
            }
            // Another transaction took the code between check and insert
        }

        Err(sqlx::Error::Protocol(
            "Could not generate unique group code".to_string(),
        ))
    }

    /// Owners of the groups in which a user holds a confirmed invite.
    pub async fn owners_confirming(
        conn: &mut PgConnection,
        referred_user_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("owners_confirming_user");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT g.owner_id
            FROM invites i
            JOIN groups g ON g.id = i.group_id
            WHERE i.referred_user_id = $1 AND i.owner_confirmed = true
            "#,
        )
        .bind(referred_user_id)
        .fetch_all(conn)
        .await;
        timer.record();
        result
    }
}
