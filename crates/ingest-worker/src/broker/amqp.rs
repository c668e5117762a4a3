//! AMQP broker client built on `lapin`.
//!
//! One connection carries two channels: one consumes the inbound queue, the
//! other publishes completion notifications. Both queues are declared durable,
//! non-exclusive and non-auto-delete so that producers and this worker can start
//! in any order.

use async_trait::async_trait;
use futures::StreamExt;
use ingest_core::{AckMode, Config};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};

use super::{BrokerError, BrokerResult, Delivery, Disposition, MessageSource, NotificationPublisher};

const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";

/// Connection settings derived from the worker configuration.
#[derive(Debug, Clone)]
pub struct AmqpSettings {
    pub url: String,
    /// Same as `url` with the password masked, for logs.
    pub redacted_url: String,
    pub listen_queue: String,
    pub response_queue: String,
    pub ack_mode: AckMode,
    pub dead_letter_exchange: Option<String>,
    pub consumer_tag: String,
}

impl AmqpSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.amqp_url(),
            redacted_url: config.redacted_amqp_url(),
            listen_queue: config.amqp_listen_key.clone(),
            response_queue: config.amqp_response_key.clone(),
            ack_mode: config.amqp_ack_mode,
            dead_letter_exchange: config.amqp_dead_letter_exchange.clone(),
            consumer_tag: consumer_tag(),
        }
    }

    fn inbound_queue_arguments(&self) -> FieldTable {
        let mut arguments = FieldTable::default();
        if let Some(ref exchange) = self.dead_letter_exchange {
            arguments.insert(
                DEAD_LETTER_EXCHANGE_ARG.into(),
                AMQPValue::LongString(LongString::from(exchange.clone())),
            );
        }
        arguments
    }
}

/// `ingest-worker-{hostname}-{pid}`, so competing consumers are told apart in
/// the broker's management views.
fn consumer_tag() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("ingest-worker-{}-{}", host, std::process::id())
}

fn queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        exclusive: false,
        auto_delete: false,
        ..QueueDeclareOptions::default()
    }
}

/// Open broker connection with its consume and publish channels.
///
/// Acquired once at startup and released with [`AmqpBroker::close`].
pub struct AmqpBroker {
    connection: Connection,
    consume_channel: Channel,
    publish_channel: Channel,
    settings: AmqpSettings,
}

impl AmqpBroker {
    /// Connect, open both channels and declare both queues.
    pub async fn connect(settings: AmqpSettings) -> BrokerResult<Self> {
        tracing::info!(url = %settings.redacted_url, "Connecting to AMQP broker");

        let connection = Connection::connect(&settings.url, ConnectionProperties::default()).await?;

        let consume_channel = connection.create_channel().await?;
        let listen = consume_channel
            .queue_declare(
                &settings.listen_queue,
                queue_options(),
                settings.inbound_queue_arguments(),
            )
            .await?;

        let publish_channel = connection.create_channel().await?;
        let response = publish_channel
            .queue_declare(&settings.response_queue, queue_options(), FieldTable::default())
            .await?;

        tracing::info!(
            listen_queue = %listen.name().as_str(),
            listen_backlog = listen.message_count(),
            response_queue = %response.name().as_str(),
            ack_mode = ?settings.ack_mode,
            dead_letter_exchange = ?settings.dead_letter_exchange,
            "AMQP queues declared"
        );

        Ok(Self {
            connection,
            consume_channel,
            publish_channel,
            settings,
        })
    }

    /// Start consuming the inbound queue.
    pub async fn consume(&self) -> BrokerResult<AmqpSource> {
        let consumer = self
            .consume_channel
            .basic_consume(
                &self.settings.listen_queue,
                &self.settings.consumer_tag,
                BasicConsumeOptions {
                    no_ack: self.settings.ack_mode == AckMode::Auto,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        tracing::info!(
            consumer_tag = %self.settings.consumer_tag,
            queue = %self.settings.listen_queue,
            "Consumer started"
        );

        Ok(AmqpSource {
            consumer,
            channel: self.consume_channel.clone(),
            ack_mode: self.settings.ack_mode,
        })
    }

    pub fn publisher(&self) -> AmqpPublisher {
        AmqpPublisher {
            channel: self.publish_channel.clone(),
            queue: self.settings.response_queue.clone(),
        }
    }

    /// Close both channels and the connection.
    pub async fn close(self) {
        for channel in [&self.consume_channel, &self.publish_channel] {
            if let Err(e) = channel.close(200, "worker shutting down").await {
                tracing::debug!(error = %e, channel_id = channel.id(), "Channel close failed");
            }
        }
        if let Err(e) = self.connection.close(200, "worker shutting down").await {
            tracing::warn!(error = %e, "Failed to close AMQP connection cleanly");
        } else {
            tracing::info!("AMQP connection closed");
        }
    }
}

/// Inbound deliveries from the listen queue.
pub struct AmqpSource {
    consumer: Consumer,
    channel: Channel,
    ack_mode: AckMode,
}

#[async_trait]
impl MessageSource for AmqpSource {
    async fn next_delivery(&mut self) -> Option<BrokerResult<Delivery>> {
        match self.consumer.next().await? {
            Ok(delivery) => Some(Ok(Delivery {
                tag: delivery.delivery_tag,
                body: delivery.data,
            })),
            Err(e) if !self.channel.status().connected() => {
                tracing::error!(error = %e, "Consumer channel lost");
                None
            }
            Err(e) => Some(Err(BrokerError::DeliveryFailed(e.to_string()))),
        }
    }

    async fn settle(&mut self, delivery: &Delivery, disposition: Disposition) -> BrokerResult<()> {
        if self.ack_mode == AckMode::Auto {
            return Ok(());
        }

        match disposition {
            Disposition::Processed => {
                self.channel
                    .basic_ack(delivery.tag, BasicAckOptions::default())
                    .await?
            }
            Disposition::Dropped => {
                self.channel
                    .basic_reject(delivery.tag, BasicRejectOptions { requeue: false })
                    .await?
            }
        }
        Ok(())
    }
}

/// Publishes notifications to the response queue through the default exchange.
#[derive(Clone)]
pub struct AmqpPublisher {
    channel: Channel,
    queue: String,
}

#[async_trait]
impl NotificationPublisher for AmqpPublisher {
    async fn publish(&self, body: &[u8]) -> BrokerResult<()> {
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }
}
