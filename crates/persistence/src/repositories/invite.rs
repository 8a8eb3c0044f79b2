//! Invite repository for database operations.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::InviteEntity;
use crate::metrics::QueryTimer;

/// Repository for invite-related database operations.
///
/// Invites are only written inside engine transactions, so every
/// operation here runs on a caller-supplied connection.
pub struct InviteRepository;

impl InviteRepository {
    /// Create an invite unless the user already holds one for the group.
    ///
    /// Returns `None` when `(group_id, referred_user_id)` is taken.
    pub async fn insert_if_absent(
        conn: &mut PgConnection,
        group_id: Uuid,
        inviter_id: Uuid,
        referred_user_id: Uuid,
    ) -> Result<Option<InviteEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_invite");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            INSERT INTO invites (group_id, inviter_id, referred_user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, referred_user_id) DO NOTHING
            RETURNING id, group_id, inviter_id, referred_user_id, owner_confirmed, created_at
            "#,
        )
        .bind(group_id)
        .bind(inviter_id)
        .bind(referred_user_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Find an invite by ID.
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<InviteEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_invite_by_id");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            SELECT id, group_id, inviter_id, referred_user_id, owner_confirmed, created_at
            FROM invites
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Mark an invite as confirmed by the group owner. Idempotent.
    pub async fn confirm(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<InviteEntity>, sqlx::Error> {
        let timer = QueryTimer::new("confirm_invite");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            UPDATE invites
            SET owner_confirmed = true
            WHERE id = $1
            RETURNING id, group_id, inviter_id, referred_user_id, owner_confirmed, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Whether the user has been confirmed into any group.
    pub async fn has_confirmed_invite(
        conn: &mut PgConnection,
        referred_user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("has_confirmed_invite");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM invites
                WHERE referred_user_id = $1 AND owner_confirmed = true
            )
            "#,
        )
        .bind(referred_user_id)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Whether the user has been confirmed into some group at `group_number`.
    pub async fn has_confirmed_invite_at_level(
        conn: &mut PgConnection,
        referred_user_id: Uuid,
        group_number: i32,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("has_confirmed_invite_at_level");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM invites i
                JOIN groups g ON g.id = i.group_id
                WHERE i.referred_user_id = $1
                  AND i.owner_confirmed = true
                  AND g.group_number = $2
            )
            "#,
        )
        .bind(referred_user_id)
        .bind(group_number)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }
}
