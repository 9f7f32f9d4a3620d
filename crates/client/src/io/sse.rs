use serde_json::Value;

use super::Lines;
use crate::Error;

/// The line the service sends once a stream has nothing more to say.
const DONE_LINE: &str = "data: done";
const DATA_FIELD: &str = "data:";

/// Decodes a server-sent event stream into JSON payloads.
///
/// Every event line looks like `data: {"eventId": ..., "data": {...}}`,
/// and the inner `data` object is what gets yielded. The stream is
/// finite and can't be restarted: once it ends or fails, every further
/// call returns `None` and the connection has been released.
pub struct EventStream {
    lines: Option<Lines>,
}

impl EventStream {
    #[inline]
    pub(crate) fn new(lines: Lines) -> Self {
        Self { lines: Some(lines) }
    }

    /// Returns `true` if the stream is over and its connection released.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.lines.is_none()
    }

    /// Reads the next event payload.
    pub async fn next_payload(&mut self) -> Result<Option<Value>, Error> {
        let Some(lines) = &mut self.lines else {
            return Ok(None);
        };
        let result = read_payload(lines).await;
        if !matches!(result, Ok(Some(_))) {
            self.lines = None;
        }
        result
    }
}

async fn read_payload(lines: &mut Lines) -> Result<Option<Value>, Error> {
    loop {
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        if line.trim().is_empty() {
            continue;
        }
        if line == DONE_LINE {
            trace!("event stream finished");
            return Ok(None);
        }
        if line.starts_with(':') {
            // Comment lines only keep the connection alive.
            continue;
        }
        trace!("got sse line: {line}");
        return parse_line(&line).map(Some);
    }
}

fn parse_line(line: &str) -> Result<Value, Error> {
    let Some(rest) = line.strip_prefix(DATA_FIELD) else {
        return Err(Error::malformed(line));
    };
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    let mut envelope: Value =
        serde_json::from_str(rest).map_err(|_| Error::malformed(line))?;
    match envelope.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(Error::malformed(line)),
    }
}
