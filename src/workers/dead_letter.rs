use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::{AMQPValue, FieldTable};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::infrastructure::queue::rabbitmq::TRANSCODE_DLQ;
use crate::modules::catalog::repository::SongRepository;
use crate::state::AppState;

/// Last-resort consumer: jobs land here once the broker has exhausted
/// transport-level redelivery without the transcoder ever acking them.
pub async fn start_dead_letter_worker(state: AppState) {
    info!("Starting Dead Letter Worker...");

    let channel = state.queue.get_channel().await;
    let channel_guard = channel.lock().await;

    let mut consumer = channel_guard
        .basic_consume(
            TRANSCODE_DLQ,
            "dead_letter_worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .expect("Failed to create DLQ consumer");

    drop(channel_guard);

    info!("Dead Letter Worker listening on '{}'", TRANSCODE_DLQ);

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                handle_dead_letter(&state, &delivery).await;

                // Always ack: this is the end of the line, requeueing a
                // poison message would loop it forever.
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!("Failed to ack DLQ message: {}", e);
                }
            }
            Err(e) => error!("DLQ consumer error: {}", e),
        }
    }
}

async fn handle_dead_letter(state: &AppState, delivery: &Delivery) {
    error!(
        "Message moved to transcode DLQ: {}",
        String::from_utf8_lossy(&delivery.data)
    );

    if let Some(count) = death_count(delivery) {
        warn!("Message failed after {} delivery attempts", count);
    }

    match extract_song_id(&delivery.data) {
        Some(song_id) => {
            if let Err(e) = SongRepository::mark_failed(&state.db, song_id).await {
                error!("Failed to mark song {} as failed: {}", song_id, e);
            } else {
                warn!(
                    "Updated song {} status to FAILED after dead-lettered transcode job",
                    song_id
                );
            }
        }
        None => error!("DLQ message has no usable songId"),
    }
}

/// The dead-lettered envelope still carries the original job payload;
/// all we need from it is the song identifier.
fn extract_song_id(payload: &[u8]) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("songId")?.as_str()?.parse().ok()
}

fn death_count(delivery: &Delivery) -> Option<i64> {
    let headers = delivery.properties.headers().as_ref()?;
    let (_, death) = headers
        .inner()
        .iter()
        .find(|(k, _)| k.as_str() == "x-death")?;

    let AMQPValue::FieldArray(entries) = death else {
        return None;
    };
    let AMQPValue::FieldTable(first) = entries.as_slice().first()? else {
        return None;
    };
    let (_, count) = first
        .inner()
        .iter()
        .find(|(k, _)| k.as_str() == "count")?;

    match count {
        AMQPValue::LongLongInt(n) => Some(*n),
        AMQPValue::LongInt(n) => Some(i64::from(*n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_song_id_from_dlq_payload() {
        let payload =
            br#"{"songId":"7f8d2f70-3c9e-4a2f-9d55-0b1f6b60a002","rawObjectKey":"raw/x.mp3"}"#;

        assert_eq!(
            extract_song_id(payload),
            Some("7f8d2f70-3c9e-4a2f-9d55-0b1f6b60a002".parse().unwrap())
        );
    }

    #[test]
    fn rejects_payload_without_song_id() {
        assert_eq!(extract_song_id(br#"{"rawObjectKey":"raw/x.mp3"}"#), None);
        assert_eq!(extract_song_id(br#"{"songId":"not-a-uuid"}"#), None);
        assert_eq!(extract_song_id(b"not json"), None);
    }
}
