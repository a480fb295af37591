//! MessagePack-RPC client for the real-time coprocessor.
//!
//! The coprocessor is reached over TCP through a proxy that speaks
//! MessagePack-RPC: request `[0, msgid, method, params]`, response
//! `[1, msgid, error, result]`. The transport does not tolerate concurrent
//! in-flight calls, so the runtime drives all traffic (telemetry polls and
//! display-triggered setters) through one client handle from the owner
//! task.
//!
//! Calls are synchronous and bounded: each attempt opens a fresh
//! connection with a per-attempt timeout, and a [`RetryPolicy`] decides
//! how many attempts to make and how long to back off between them.
//! Exhaustion surfaces as [`RpcError::NoResponse`]; callers log and move
//! on — telemetry is best-effort and self-healing on the next poll.

use std::{
    io::{BufReader, BufWriter, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use sigbridge_core::SignalValue;
use thiserror::Error;

/// MessagePack-RPC request type tag.
const MSG_REQUEST: u64 = 0;
/// MessagePack-RPC response type tag.
const MSG_RESPONSE: u64 = 1;

/// Errors from a coprocessor call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection, send, or receive failure (includes timeouts).
    #[error("rpc transport: {0}")]
    Io(#[from] std::io::Error),

    /// Peer replied with something that is not a valid response.
    #[error("rpc protocol: {0}")]
    Protocol(String),

    /// Peer returned an application-level error value.
    #[error("rpc remote error: {0}")]
    Remote(String),

    /// Every attempt failed; no response was obtained.
    #[error("rpc call exhausted all attempts")]
    NoResponse,
}

/// Explicit retry policy for one call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts (first try included).
    pub attempts: u32,
    /// Per-attempt connect+response timeout.
    pub timeout: Duration,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Telemetry poll: one shot with a long stall tolerance.
    #[must_use]
    pub fn poll() -> Self {
        Self { attempts: 1, timeout: Duration::from_millis(500), backoff: Duration::ZERO }
    }

    /// Display-triggered setter: quick retry, short timeout.
    #[must_use]
    pub fn setter() -> Self {
        Self {
            attempts: 2,
            timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(50),
        }
    }
}

/// Client handle for the coprocessor RPC proxy.
pub struct CoprocessorClient {
    addr: String,
    msgid: AtomicU32,
}

impl CoprocessorClient {
    /// Create a client for `host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), msgid: AtomicU32::new(0) }
    }

    /// Invoke a remote procedure under a retry policy.
    ///
    /// Blocking socket work runs on the blocking pool; the calling task
    /// waits, which is exactly the bounded-stall behavior the bridge
    /// wants (one in-flight call at a time).
    pub async fn call(
        &self,
        function: &str,
        args: Vec<rmpv::Value>,
        policy: RetryPolicy,
    ) -> Result<rmpv::Value, RpcError> {
        for attempt in 0..policy.attempts {
            if attempt > 0 {
                tokio::time::sleep(policy.backoff).await;
            }

            let addr = self.addr.clone();
            let function_owned = function.to_string();
            let args = args.clone();
            let msgid = self.msgid.fetch_add(1, Ordering::Relaxed);
            let timeout = policy.timeout;

            let outcome = tokio::task::spawn_blocking(move || {
                blocking_call(&addr, msgid, &function_owned, args, timeout)
            })
            .await;

            match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    tracing::debug!(function, attempt, %err, "rpc attempt failed");
                },
                Err(err) => {
                    tracing::debug!(function, attempt, %err, "rpc task failed");
                },
            }
        }
        Err(RpcError::NoResponse)
    }

    /// One telemetry poll: `get_poll_data()` → packed u64 word.
    pub async fn poll_word(&self) -> Result<u64, RpcError> {
        let value = self.call("get_poll_data", Vec::new(), RetryPolicy::poll()).await?;
        value
            .as_u64()
            .ok_or_else(|| RpcError::Protocol(format!("poll returned non-integer: {value}")))
    }

    /// Invoke a named setter with one signal value (setter policy).
    pub async fn call_setter(&self, function: &str, value: SignalValue) -> Result<(), RpcError> {
        self.call(function, vec![to_rpc_value(value)], RetryPolicy::setter()).await?;
        Ok(())
    }
}

/// Signal value → MessagePack argument.
fn to_rpc_value(value: SignalValue) -> rmpv::Value {
    match value {
        SignalValue::Float(v) => rmpv::Value::F64(v),
        SignalValue::Int(v) => rmpv::Value::from(v),
        SignalValue::Bool(v) => rmpv::Value::Boolean(v),
    }
}

/// One request/response round trip on a fresh connection.
fn blocking_call(
    addr: &str,
    msgid: u32,
    function: &str,
    args: Vec<rmpv::Value>,
    timeout: Duration,
) -> Result<rmpv::Value, RpcError> {
    let sock_addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| RpcError::Protocol(format!("unresolvable address '{addr}'")))?;

    let stream = TcpStream::connect_timeout(&sock_addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let request = rmpv::Value::Array(vec![
        rmpv::Value::from(MSG_REQUEST),
        rmpv::Value::from(msgid),
        rmpv::Value::from(function),
        rmpv::Value::Array(args),
    ]);

    let mut writer = BufWriter::new(&stream);
    rmpv::encode::write_value(&mut writer, &request)
        .map_err(|e| RpcError::Protocol(format!("encode failed: {e}")))?;
    writer.flush()?;

    let mut reader = BufReader::new(&stream);
    let response = rmpv::decode::read_value(&mut reader)
        .map_err(|e| RpcError::Protocol(format!("decode failed: {e}")))?;

    let rmpv::Value::Array(mut parts) = response else {
        return Err(RpcError::Protocol("response is not an array".to_string()));
    };
    if parts.len() != 4 || parts[0].as_u64() != Some(MSG_RESPONSE) {
        return Err(RpcError::Protocol("malformed response envelope".to_string()));
    }
    if parts[1].as_u64() != Some(u64::from(msgid)) {
        return Err(RpcError::Protocol("response msgid mismatch".to_string()));
    }
    if !parts[2].is_nil() {
        return Err(RpcError::Remote(parts[2].to_string()));
    }
    Ok(parts.swap_remove(3))
}
