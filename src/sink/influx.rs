//! InfluxDB v2 sink.
//!
//! Writes single points through the `/api/v2/write` endpoint in line
//! protocol with millisecond precision. Transport failures and 5xx/429
//! responses map to transient [`SinkError`]s (the [`Writer`](super::Writer)
//! retries those); other non-2xx responses are permanent rejections.

use async_trait::async_trait;

use crate::config::SinkConfig;

use super::{FieldValue, Point, PointSink, SinkError};

pub struct InfluxSink {
    client: reqwest::Client,
    write_url: String,
    token: String,
}

impl InfluxSink {
    /// Build the sink from config. Fails only on an unbuildable HTTP client;
    /// a missing token is reported per-write so offline runs stay usable.
    pub fn new(cfg: &SinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let write_url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ms",
            cfg.url.trim_end_matches('/'),
            cfg.org,
            cfg.bucket
        );

        Ok(Self {
            client,
            write_url,
            token: cfg.token.clone(),
        })
    }
}

#[async_trait]
impl PointSink for InfluxSink {
    async fn write(&mut self, point: &Point) -> Result<(), SinkError> {
        if self.token.is_empty() {
            return Err(SinkError::NotConfigured);
        }

        let body = to_line_protocol(point)?;

        let response = self
            .client
            .post(&self.write_url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status.as_u16() == 429 {
            // overloaded or restarting — retryable
            return Err(SinkError::Transport(format!("HTTP {status}: {body}")));
        }
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn sink_name(&self) -> &str {
        "influxdb"
    }
}

// ============================================================================
// Line protocol
// ============================================================================

/// Render one point as an Influx line protocol record.
pub fn to_line_protocol(point: &Point) -> Result<String, SinkError> {
    if point.fields.is_empty() {
        return Err(SinkError::EmptyPoint {
            measurement: point.measurement,
        });
    }

    let mut line = escape_measurement(point.measurement);

    for (key, value) in &point.tags {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    line.push(' ');
    for (i, (key, value)) in point.fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&escape_tag(key));
        line.push('=');
        match value {
            FieldValue::Float(v) => line.push_str(&format!("{v}")),
            FieldValue::Int(v) => line.push_str(&format!("{v}i")),
            FieldValue::Bool(v) => line.push_str(if *v { "true" } else { "false" }),
        }
    }

    line.push(' ');
    line.push_str(&point.timestamp_ms.to_string());
    Ok(line)
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Escaping for tag keys, tag values, and field keys (comma, equals, space).
fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_protocol_shapes_tags_fields_and_timestamp() {
        let point = Point::new("AirValve", 1_717_000_000_123)
            .tag("line_name", "L1")
            .tag("valve_name", "V3")
            .field_i64("value", 840)
            .field_bool("anomaly", false)
            .field_f64("z_score", 1.25);

        let line = to_line_protocol(&point).unwrap();
        assert_eq!(
            line,
            "AirValve,line_name=L1,valve_name=V3 value=840i,anomaly=false,z_score=1.25 1717000000123"
        );
    }

    #[test]
    fn tag_values_with_spaces_are_escaped() {
        let point = Point::new("GenericState", 1)
            .tag("machine_name", "Press 03")
            .field_i64("value", 2);
        let line = to_line_protocol(&point).unwrap();
        assert!(line.starts_with("GenericState,machine_name=Press\\ 03 "));
    }

    #[test]
    fn fieldless_point_is_an_error() {
        let point = Point::new("Empty", 1);
        assert!(matches!(
            to_line_protocol(&point),
            Err(SinkError::EmptyPoint { .. })
        ));
    }
}
