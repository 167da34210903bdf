//! Pure message validation (§4.2), applied to every decoded frame before
//! dispatch. Never inspects `payload`.

use crate::message::{MAX_HEADER_COUNT, MAX_HEADER_VALUE_LEN, MAX_QUEUE_NAME_LEN};
use crate::protocol::Frame;

/// Validate a decoded frame, returning a human-readable rejection reason
/// on the first rule violated. Rule order matches §4.2's listing.
pub fn validate(frame: &Frame) -> Result<(), String> {
    if frame.id.is_empty() {
        return Err("id is empty".to_string());
    }

    if let Some(queue) = &frame.queue {
        if queue.len() > MAX_QUEUE_NAME_LEN {
            return Err(format!(
                "queue name exceeds {MAX_QUEUE_NAME_LEN} bytes"
            ));
        }
        if !queue
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        {
            return Err("queue name contains characters outside [A-Za-z0-9._-]".to_string());
        }
    }

    if frame.headers.len() > MAX_HEADER_COUNT {
        return Err(format!("header count exceeds {MAX_HEADER_COUNT}"));
    }

    for (key, value) in &frame.headers {
        if key.is_empty() {
            return Err("header key is empty".to_string());
        }
        if value.len() > MAX_HEADER_VALUE_LEN {
            return Err(format!(
                "header value for '{key}' exceeds {MAX_HEADER_VALUE_LEN} bytes"
            ));
        }
    }

    Ok(())
}
