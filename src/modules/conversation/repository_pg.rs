use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::model::{
    ConversationRaw, ConversationRow, NewConversation, ParticipantDetailWithConversation,
};
use crate::modules::conversation::repository::ConversationRepository;
use crate::modules::conversation::schema::ConversationEntity;

#[derive(Clone)]
pub struct ConversationPgRepository {
    pool: sqlx::PgPool,
}

impl ConversationPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationPgRepository {
    async fn list_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationRow>, error::SystemError> {
        let rows = sqlx::query_as::<_, ConversationRaw>(
            r#"
            SELECT
                c.id,
                c.title,
                c.is_group,
                c.metadata,
                c.created_at,
                c.updated_at,

                lm.id         AS last_message_id,
                lm.content    AS last_content,
                lm.user_id    AS last_user_id,
                lm.created_at AS last_created_at,

                (
                    SELECT COUNT(*)
                    FROM messages m
                    WHERE m.conversation_id = c.id
                    AND m.user_id <> $1
                    AND (
                        p.last_read_message_id IS NULL
                        OR m.created_at > (
                            SELECT mr.created_at FROM messages mr
                            WHERE mr.id = p.last_read_message_id
                        )
                    )
                )::bigint AS unread_count

            FROM conversations c

            JOIN conversation_participants p
                ON p.conversation_id = c.id
            AND p.user_id = $1
            AND p.left_at IS NULL

            LEFT JOIN LATERAL (
                SELECT id, content, user_id, created_at
                FROM messages m
                WHERE m.conversation_id = c.id
                ORDER BY created_at DESC
                LIMIT 1
            ) lm ON TRUE

            ORDER BY
                COALESCE(lm.created_at, c.updated_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ConversationRow::from).collect())
    }

    async fn find_detail(
        &self,
        conversation_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<Option<ConversationRow>, error::SystemError> {
        let raw = sqlx::query_as::<_, ConversationRaw>(
            r#"
            SELECT
                c.id,
                c.title,
                c.is_group,
                c.metadata,
                c.created_at,
                c.updated_at,

                lm.id         AS last_message_id,
                lm.content    AS last_content,
                lm.user_id    AS last_user_id,
                lm.created_at AS last_created_at,

                (CASE
                    WHEN p.user_id IS NULL THEN 0
                    ELSE (
                        SELECT COUNT(*)
                        FROM messages m
                        WHERE m.conversation_id = c.id
                        AND m.user_id <> $2
                        AND (
                            p.last_read_message_id IS NULL
                            OR m.created_at > (
                                SELECT mr.created_at FROM messages mr
                                WHERE mr.id = p.last_read_message_id
                            )
                        )
                    )
                END)::bigint AS unread_count

            FROM conversations c

            LEFT JOIN conversation_participants p
                ON p.conversation_id = c.id
            AND p.user_id = $2
            AND p.left_at IS NULL

            LEFT JOIN LATERAL (
                SELECT id, content, user_id, created_at
                FROM messages m
                WHERE m.conversation_id = c.id
                ORDER BY created_at DESC
                LIMIT 1
            ) lm ON TRUE

            WHERE c.id = $1
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .bind(viewer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(raw.map(ConversationRow::from))
    }

    async fn participants_for(
        &self,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<ParticipantDetailWithConversation>, error::SystemError> {
        let participants = sqlx::query_as::<_, ParticipantDetailWithConversation>(
            r#"
            SELECT
                p.conversation_id,
                p.user_id,
                u.email,
                u.display_name,
                u.avatar_url,
                p.role,
                p.last_read_message_id,
                p.joined_at
            FROM conversation_participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.conversation_id = ANY($1)
            AND p.left_at IS NULL
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    async fn create(
        &self,
        new: &NewConversation,
    ) -> Result<ConversationEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let id = Uuid::now_v7();
        let conversation = sqlx::query_as::<_, ConversationEntity>(
            r#"
            INSERT INTO conversations (id, title, is_group)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&new.title)
        .bind(new.is_group)
        .fetch_one(tx.as_mut())
        .await?;

        // Creator is a participant too; everyone starts as a plain member.
        let mut member_ids: Vec<Uuid> = vec![new.creator_id];
        for participant_id in &new.participant_ids {
            if !member_ids.contains(participant_id) {
                member_ids.push(*participant_id);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, user_id, role, joined_at)
            SELECT $1, unnest($2::uuid[]), 'member', NOW()
            "#,
        )
        .bind(conversation.id)
        .bind(&member_ids)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(conversation)
    }

    async fn advance_read_pointer(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<u64, error::SystemError> {
        // Only-advance guard: the pointer never moves to a message older
        // than the one already recorded, and the target must belong to the
        // conversation. Re-sending the same id matches and is a no-op.
        let result = sqlx::query(
            r#"
            UPDATE conversation_participants p
            SET last_read_message_id = $3
            WHERE p.conversation_id = $1
            AND p.user_id = $2
            AND p.left_at IS NULL
            AND EXISTS (
                SELECT 1 FROM messages m
                WHERE m.id = $3 AND m.conversation_id = $1
            )
            AND (
                p.last_read_message_id IS NULL
                OR p.last_read_message_id = $3
                OR (SELECT created_at FROM messages WHERE id = $3)
                    >= (SELECT created_at FROM messages WHERE id = p.last_read_message_id)
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn is_active_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM conversation_participants p
                WHERE p.conversation_id = $1
                AND p.user_id = $2
                AND p.left_at IS NULL
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
