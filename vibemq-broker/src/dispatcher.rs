//! The command dispatcher (§4.6): maps each incoming command to its
//! handler. Each handler is a function of `(session, frame, ctx)` and
//! returns the single response frame the protocol mandates, if any.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use bytes::Bytes;
use serde::Serialize;

// Layer 3: Internal module imports
use crate::error::{CODE_INVALID_QUEUE, CODE_NOT_AUTHENTICATED, CODE_RATE_LIMITED, CODE_UNKNOWN_COMMAND};
use crate::manager::QueueManager;
use crate::message::BrokerMessage;
use crate::monitoring::Monitor;
use crate::protocol::{CommandType, Frame};
use crate::queue::{QueueError, QueueOptionsWire};
use crate::ratelimit::MessageLimiter;
use crate::registry::{ClientSession, ConnectionRegistry};

/// Shared collaborators every dispatch handler needs.
pub struct DispatchContext {
    /// The queue orchestrator.
    pub manager: Arc<QueueManager>,
    /// The connection registry (for subscribe/unsubscribe bookkeeping).
    pub registry: Arc<ConnectionRegistry>,
    /// Per-session message-rate limiter.
    pub message_limiter: Arc<MessageLimiter>,
    /// Counters/gauges for the `/metrics/` snapshot.
    pub monitor: Arc<Monitor>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueInfoPayload {
    name: String,
    mode: crate::queue::DeliveryMode,
    max_queue_size: u32,
    current_size: usize,
    overflow_strategy: crate::queue::OverflowStrategy,
    max_retry_attempts: u32,
    enable_dead_letter_queue: bool,
}

/// Dispatch one already-validated, already-authenticated-or-exempt frame.
/// Returns the response frame to send back to `session`'s peer, if the
/// command mandates one (§6's response column); `Deliver` traffic is
/// pushed by the queue manager directly and is not a dispatcher return
/// value.
pub fn dispatch(session: &Arc<ClientSession>, frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    if !ctx.message_limiter.try_admit(&session.id) {
        ctx.monitor.record_rate_limited();
        return Some(Frame::error(frame.id, CODE_RATE_LIMITED, "message rate limit exceeded"));
    }

    match frame.command {
        CommandType::Ping => Some(Frame::new(CommandType::Pong, frame.id)),

        CommandType::Disconnect => None,

        CommandType::Publish => handle_publish(frame, ctx),

        CommandType::Subscribe => handle_subscribe(session, frame, ctx),

        CommandType::Unsubscribe => handle_unsubscribe(session, frame, ctx),

        CommandType::Ack => {
            ctx.manager.acknowledge(&frame.id);
            None
        }

        CommandType::CreateQueue => handle_create_queue(frame, ctx),

        CommandType::DeleteQueue => handle_delete_queue(frame, ctx),

        CommandType::QueueInfo => handle_queue_info(frame, ctx),

        CommandType::ListQueues => handle_list_queues(frame, ctx),

        CommandType::Connect
        | CommandType::ConnectAck
        | CommandType::Pong
        | CommandType::PublishAck
        | CommandType::SubscribeAck
        | CommandType::UnsubscribeAck
        | CommandType::Deliver
        | CommandType::Error => Some(Frame::error(
            frame.id,
            CODE_UNKNOWN_COMMAND,
            "command has no client-side dispatch handler",
        )),
    }
}

fn handle_publish(frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    let Some(queue) = frame.queue.clone() else {
        return Some(Frame::error(frame.id, CODE_INVALID_QUEUE, "publish requires a queue"));
    };

    let message = BrokerMessage::new(frame.id.clone(), queue.clone(), frame.payload, frame.headers, 0);
    match ctx.manager.publish(message) {
        Ok(()) => Some(Frame::new(CommandType::PublishAck, frame.id).with_queue(queue)),
        Err(QueueError::NotFound(name)) => Some(Frame::error(
            frame.id,
            CODE_INVALID_QUEUE,
            format!("queue '{name}' does not exist"),
        )),
    }
}

fn handle_subscribe(session: &Arc<ClientSession>, frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    let Some(queue) = frame.queue.clone() else {
        return Some(Frame::error(frame.id, CODE_INVALID_QUEUE, "subscribe requires a queue"));
    };
    ctx.manager.create_queue(&queue, None);
    ctx.registry.subscribe(&queue, &session.id);
    Some(Frame::new(CommandType::SubscribeAck, frame.id).with_queue(queue))
}

fn handle_unsubscribe(session: &Arc<ClientSession>, frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    let Some(queue) = frame.queue.clone() else {
        return Some(Frame::error(frame.id, CODE_INVALID_QUEUE, "unsubscribe requires a queue"));
    };
    ctx.registry.unsubscribe(&queue, &session.id);
    Some(Frame::new(CommandType::UnsubscribeAck, frame.id).with_queue(queue))
}

fn handle_create_queue(frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    let Some(queue) = frame.queue.clone() else {
        return Some(Frame::error(frame.id, CODE_INVALID_QUEUE, "createQueue requires a queue"));
    };

    let options = match &frame.payload {
        Some(bytes) if !bytes.is_empty() => match QueueOptionsWire::parse(bytes) {
            Ok(wire) => Some(wire.into()),
            Err(e) => {
                return Some(Frame::error(
                    frame.id,
                    crate::error::CODE_INVALID_MESSAGE,
                    format!("malformed queue options: {e}"),
                ))
            }
        },
        _ => None,
    };

    ctx.manager.create_queue(&queue, options);
    Some(Frame::new(CommandType::CreateQueue, frame.id).with_queue(queue))
}

fn handle_delete_queue(frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    let Some(queue) = frame.queue.clone() else {
        return Some(Frame::error(frame.id, CODE_INVALID_QUEUE, "deleteQueue requires a queue"));
    };
    if ctx.manager.delete_queue(&queue) {
        Some(Frame::new(CommandType::DeleteQueue, frame.id).with_queue(queue))
    } else {
        Some(Frame::error(
            frame.id,
            CODE_INVALID_QUEUE,
            format!("queue '{queue}' does not exist"),
        ))
    }
}

fn handle_queue_info(frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    let Some(queue_name) = frame.queue.clone() else {
        return Some(Frame::error(frame.id, CODE_INVALID_QUEUE, "queueInfo requires a queue"));
    };
    let Some(queue) = ctx.manager.get_queue(&queue_name) else {
        return Some(Frame::error(
            frame.id,
            CODE_INVALID_QUEUE,
            format!("queue '{queue_name}' does not exist"),
        ));
    };

    let payload = QueueInfoPayload {
        name: queue.name.clone(),
        mode: queue.options.mode,
        max_queue_size: queue.options.max_queue_size,
        current_size: queue.len(),
        overflow_strategy: queue.options.overflow_strategy,
        max_retry_attempts: queue.options.max_retry_attempts,
        enable_dead_letter_queue: queue.options.enable_dead_letter_queue,
    };
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    Some(
        Frame::new(CommandType::QueueInfo, frame.id)
            .with_queue(queue_name)
            .with_payload(Bytes::from(json)),
    )
}

fn handle_list_queues(frame: Frame, ctx: &DispatchContext) -> Option<Frame> {
    let names = ctx.manager.queue_names();
    let json = serde_json::to_vec(&names).unwrap_or_default();
    Some(Frame::new(CommandType::ListQueues, frame.id).with_payload(Bytes::from(json)))
}

/// Build the `Error(NOT_AUTHENTICATED)` frame the read loop sends when a
/// command other than `Connect`/`Ping` arrives before authentication (§4.4).
pub fn not_authenticated_error(id: impl Into<String>) -> Frame {
    Frame::error(id, CODE_NOT_AUTHENTICATED, "session has not authenticated")
}
