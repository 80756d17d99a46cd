use crate::config::BusConfig;
use crate::error::{NotesError, Result};
use serde::{Deserialize, Serialize};

/// An "upload occurred" event as published on the bus.
///
/// Field names follow the producer's JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadEvent {
    #[serde(rename = "fileKey")]
    pub file_key: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub timestamp: i64,
}

/// One delivery from the stream. `event` is None when the payload was
/// malformed; the delivery must still be acknowledged so the stream
/// advances past it.
#[derive(Debug)]
pub struct Delivery {
    pub stream_id: String,
    pub event: Option<UploadEvent>,
}

/// Consumer-group reader over a Redis Stream.
///
/// At-least-once delivery is assumed: the worker's cache short-circuit is
/// the only correctness mechanism against duplicate redelivery. Events are
/// acknowledged after processing regardless of outcome; failures are
/// logged, not re-enqueued.
pub struct EventConsumer {
    conn: redis::aio::MultiplexedConnection,
    topic: String,
    group: String,
    consumer: String,
    block_timeout_ms: u64,
    batch_size: usize,
}

impl EventConsumer {
    /// Connect and ensure the consumer group exists (the stream is created
    /// if needed). The consumer name is unique per worker instance.
    pub async fn connect(config: &BusConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| NotesError::Bus(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| NotesError::Bus(format!("Failed to connect to Redis: {}", e)))?;

        // XGROUP CREATE <topic> <group> 0 MKSTREAM is idempotent:
        // BUSYGROUP means the group already exists
        let group_result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&config.topic)
            .arg(&config.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        if let Err(e) = group_result {
            if !e.to_string().contains("BUSYGROUP") {
                return Err(NotesError::Bus(format!(
                    "Failed to create consumer group: {}",
                    e
                )));
            }
        }

        let consumer = format!("worker-{}", uuid::Uuid::new_v4());
        log::info!(
            "Subscribed to topic {} as {} (group {})",
            config.topic,
            consumer,
            config.group
        );

        Ok(Self {
            conn,
            topic: config.topic.clone(),
            group: config.group.clone(),
            consumer,
            block_timeout_ms: config.block_timeout_ms,
            batch_size: config.batch_size,
        })
    }

    /// Read the next batch of not-yet-delivered events, blocking up to the
    /// configured timeout. Returns an empty vec when nothing arrived.
    pub async fn read_batch(&mut self) -> Result<Vec<Delivery>> {
        // ">" reads only messages never delivered to any consumer in the group
        let response: redis::Value = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(self.batch_size)
            .arg("BLOCK")
            .arg(self.block_timeout_ms)
            .arg("STREAMS")
            .arg(&self.topic)
            .arg(">")
            .query_async(&mut self.conn)
            .await
            .map_err(|e| NotesError::Bus(format!("XREADGROUP failed: {}", e)))?;

        let deliveries = parse_stream_entries(&response)
            .into_iter()
            .map(|(stream_id, raw)| {
                let event = match serde_json::from_str::<UploadEvent>(&raw) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        log::warn!(
                            "Skipping malformed event payload at {}: {}",
                            stream_id,
                            e
                        );
                        None
                    }
                };
                Delivery { stream_id, event }
            })
            .collect();

        Ok(deliveries)
    }

    /// Acknowledge one delivery so the group advances past it
    pub async fn ack(&mut self, stream_id: &str) -> Result<()> {
        let _: i64 = redis::cmd("XACK")
            .arg(&self.topic)
            .arg(&self.group)
            .arg(stream_id)
            .query_async(&mut self.conn)
            .await
            .map_err(|e| NotesError::Bus(format!("XACK {} failed: {}", stream_id, e)))?;
        Ok(())
    }
}

/// Flatten an XREADGROUP response into (stream_id, data) pairs.
///
/// Response format: [[stream_name, [[id, [field, value, ...]], ...]]].
/// The event JSON rides in the "data" field; entries without it are ignored.
fn parse_stream_entries(response: &redis::Value) -> Vec<(String, String)> {
    let mut entries = Vec::new();

    let streams = match response {
        redis::Value::Array(streams) => streams,
        _ => return entries,
    };

    for stream in streams {
        let stream_data = match stream {
            redis::Value::Array(data) if data.len() >= 2 => data,
            _ => continue,
        };

        let messages = match &stream_data[1] {
            redis::Value::Array(msgs) => msgs,
            _ => continue,
        };

        for message in messages {
            let msg_data = match message {
                redis::Value::Array(data) if data.len() >= 2 => data,
                _ => continue,
            };

            let stream_id = match &msg_data[0] {
                redis::Value::BulkString(id) => String::from_utf8_lossy(id).to_string(),
                _ => continue,
            };

            let fields = match &msg_data[1] {
                redis::Value::Array(fields) => fields,
                _ => continue,
            };

            let mut iter = fields.iter();
            while let (Some(key), Some(val)) = (iter.next(), iter.next()) {
                if let (redis::Value::BulkString(k), redis::Value::BulkString(v)) = (key, val) {
                    if k.as_slice() == b"data".as_slice() {
                        entries.push((
                            stream_id.clone(),
                            String::from_utf8_lossy(v).to_string(),
                        ));
                    }
                }
            }
        }
    }

    entries
}
