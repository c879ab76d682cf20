//! Server-Sent Events decoding for task progress streams.
//!
//! The backend emits one JSON object per `data:` line and never folds an
//! event across several lines, so each line is decoded on its own. Lines
//! without the prefix (comments, keepalives, blank separators) are skipped.
//! A `data:` line that fails to parse is logged and dropped; it never ends
//! the stream.

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use crate::error::{Result, TaskError};

/// Field prefix of a payload line.
pub const DATA_PREFIX: &str = "data:";

/// Decode a single line.
///
/// Returns `Ok(None)` for lines that carry no `data:` field and
/// [`TaskError::MalformedEvent`] when the payload is not a valid `T`.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<Option<T>> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };

    let payload = payload.trim();
    trace!(frame = payload, "sse data frame");

    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| TaskError::MalformedEvent(format!("{e}: {payload}")))
}

/// Turn a line source into a lazy sequence of decoded events.
///
/// Events come out in the order their lines arrive. An error from the line
/// source is passed through once and ends the sequence.
pub fn decode<T, S>(lines: S) -> impl Stream<Item = Result<T>> + Send
where
    T: DeserializeOwned + Send,
    S: Stream<Item = Result<String>> + Send,
{
    async_stream::stream! {
        let mut lines = std::pin::pin!(lines);

        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => match decode_line::<T>(&line) {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "dropping malformed event"),
                },
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
    }
}
