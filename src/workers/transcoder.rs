use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::FieldTable;
use tracing::{error, info};

use crate::infrastructure::queue::rabbitmq::{EXCHANGE, RESULT_ROUTING_KEY, TRANSCODE_QUEUE};
use crate::modules::transcode::events::{TranscodeJob, TranscodeResultEvent};
use crate::state::AppState;

pub async fn start_transcoder_worker(state: AppState) {
    info!("🎥 Starting Transcoder Worker...");

    let channel = state.queue.get_channel().await;
    let channel_guard = channel.lock().await;

    let mut consumer = channel_guard
        .basic_consume(
            TRANSCODE_QUEUE,
            "transcoder_worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .expect("Failed to create consumer");

    drop(channel_guard);

    info!("🎥 Transcoder Worker listening on '{}'", TRANSCODE_QUEUE);

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                // Jobs may overlap; the shared worker pool bounds their
                // heavy stages, not this loop.
                let state = state.clone();
                tokio::spawn(async move {
                    process_delivery(state, delivery).await;
                });
            }
            Err(e) => error!("Consumer error: {}", e),
        }
    }
}

async fn process_delivery(state: AppState, delivery: Delivery) {
    let event = match serde_json::from_slice::<TranscodeJob>(&delivery.data) {
        Ok(job) => {
            info!("📦 Received transcoding job for songId: {}", job.song_id);
            Some(run_job(&state, &job).await)
        }
        Err(e) => {
            error!("❌ Failed to parse job payload: {}", e);
            None
        }
    };

    if let Some(event) = event {
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                if let Err(e) = state.queue.publish(EXCHANGE, RESULT_ROUTING_KEY, &payload).await {
                    error!("Failed to publish transcode result: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize transcode result: {}", e),
        }
    }

    // Ack only after the outcome went out; a crash before this point rides
    // broker redelivery into the dead-letter path instead.
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        error!("Failed to ack message: {}", e);
    }
}

async fn run_job(state: &AppState, job: &TranscodeJob) -> TranscodeResultEvent {
    match state
        .transcoder
        .process_audio(job.song_id, &job.raw_object_key)
        .await
    {
        Ok(output) => {
            info!("✅ Job completed successfully for songId: {}", job.song_id);
            TranscodeResultEvent::success(
                job.song_id,
                output.master_playlist_key,
                output.duration_seconds,
            )
        }
        Err(e) => {
            error!("❌ Transcode failed for songId: {}: {}", job.song_id, e);
            TranscodeResultEvent::failure(job.song_id, e.to_string())
        }
    }
}
