use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

pub struct SongRepository;

impl SongRepository {
    /// Flip a song straight to FAILED, bypassing the result-event path.
    /// Only the dead-letter handler does this: the worker that owned the
    /// job never produced an outcome. Re-marking an already-failed song
    /// is a no-op update.
    pub async fn mark_failed(pool: &PgPool, song_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("UPDATE songs SET status = 'FAILED', updated_at = NOW() WHERE id = $1")
            .bind(song_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("Song {} not found in database when processing DLQ", song_id);
        }

        Ok(())
    }
}
