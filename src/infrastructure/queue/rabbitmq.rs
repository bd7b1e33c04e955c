use anyhow::{Result, anyhow};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind, options::*,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const EXCHANGE: &str = "music_exchange";
pub const DLX_EXCHANGE: &str = "music_dlx_exchange";

pub const TRANSCODE_QUEUE: &str = "transcode_queue";
pub const TRANSCODE_ROUTING_KEY: &str = "transcode_key";
pub const RESULT_QUEUE: &str = "transcode_result_queue";
pub const RESULT_ROUTING_KEY: &str = "transcode_result_key";

pub const TRANSCODE_DLQ: &str = "transcode_dlq";
pub const RESULT_DLQ: &str = "transcode_result_dlq";

/// Broker-level retry window before a message dead-letters.
const MESSAGE_TTL_MS: i32 = 3_600_000;

#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ at {}", url);
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    /// Declare the exchanges, work queues and dead-letter queues this
    /// service relies on. Declarations are idempotent, so this runs on
    /// every start.
    pub async fn declare_topology(&self) -> Result<()> {
        let channel = self.channel.lock().await;

        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare exchange: {}", e))?;

        channel
            .exchange_declare(
                DLX_EXCHANGE,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare dead-letter exchange: {}", e))?;

        declare_work_queue(&channel, TRANSCODE_QUEUE, TRANSCODE_ROUTING_KEY, TRANSCODE_DLQ).await?;
        declare_work_queue(&channel, RESULT_QUEUE, RESULT_ROUTING_KEY, RESULT_DLQ).await?;

        for dlq in [TRANSCODE_DLQ, RESULT_DLQ] {
            channel
                .queue_declare(
                    dlq,
                    QueueDeclareOptions {
                        durable: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| anyhow!("Failed to declare {}: {}", dlq, e))?;

            channel
                .queue_bind(
                    dlq,
                    DLX_EXCHANGE,
                    dlq,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| anyhow!("Failed to bind {}: {}", dlq, e))?;
        }

        info!("Declared RabbitMQ topology on '{}'", EXCHANGE);
        Ok(())
    }

    async fn publish_internal(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<()> {
        let channel = self.channel.lock().await;

        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2), // Persistent
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        Ok(())
    }

    pub async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> Result<()> {
        if let Err(e) = self.publish_internal(exchange, routing_key, payload).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect().await?;
            self.publish_internal(exchange, routing_key, payload).await?;
        }

        Ok(())
    }

    pub async fn get_channel(&self) -> Arc<Mutex<Channel>> {
        self.channel.clone()
    }
}

/// Durable work queue bound to the topic exchange, dead-lettering expired
/// or rejected messages into `dlq` via the DLX.
async fn declare_work_queue(
    channel: &Channel,
    queue: &str,
    routing_key: &str,
    dlq: &str,
) -> Result<()> {
    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(DLX_EXCHANGE.into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(dlq.into()),
    );
    args.insert("x-message-ttl".into(), AMQPValue::LongInt(MESSAGE_TTL_MS));

    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            args,
        )
        .await
        .map_err(|e| anyhow!("Failed to declare {}: {}", queue, e))?;

    channel
        .queue_bind(
            queue,
            EXCHANGE,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", queue, e))?;

    Ok(())
}
