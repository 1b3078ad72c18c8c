//! Standalone adapters for the engine ports: a reward sink that only logs
//! and a transport that writes each delivered payload as a JSON line.

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{SinkError, TransportError};
use crate::notify::ChannelType;
use crate::ports::{NotificationTransport, RewardSink};
use crate::quest::QuestReward;

/// Accepts every reward and logs it
#[derive(Debug, Default)]
pub struct TracingRewardSink;

#[async_trait]
impl RewardSink for TracingRewardSink {
    async fn apply(&self, player_id: &str, reward: &QuestReward) -> Result<(), SinkError> {
        info!(
            player_id,
            reward_type = reward.reward_type().as_str(),
            "Granted {}",
            reward.describe()
        );
        Ok(())
    }
}

/// Writes `{"player_id", "channel", "payload"}` lines to any async writer
pub struct JsonLinesTransport<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl JsonLinesTransport<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> NotificationTransport for JsonLinesTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(
        &self,
        player_id: &str,
        channel: ChannelType,
        payload: &serde_json::Value,
    ) -> Result<(), TransportError> {
        let line = json!({
            "player_id": player_id,
            "channel": channel,
            "payload": payload,
        });
        let mut bytes = serde_json::to_vec(&line)
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        bytes.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&bytes)
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        debug!(player_id, channel = channel.as_str(), "Wrote notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_lines() {
        let transport = JsonLinesTransport::new(Vec::<u8>::new());
        transport
            .send("ash", ChannelType::Toast, &json!({"type": "quest_started"}))
            .await
            .unwrap();
        transport
            .send("misty", ChannelType::Modal, &json!({"type": "quest_completed"}))
            .await
            .unwrap();

        let written = transport.writer.into_inner();
        let lines: Vec<serde_json::Value> = String::from_utf8(written)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["player_id"], "ash");
        assert_eq!(lines[0]["channel"], "toast");
        assert_eq!(lines[1]["payload"]["type"], "quest_completed");
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts() {
        assert!(
            TracingRewardSink
                .apply("ash", &QuestReward::gold(10))
                .await
                .is_ok()
        );
    }
}
