//! Metrics collection.
//!
//! # Metrics
//! - `conn_bytes_read_total` (counter): bytes read, by transport
//! - `conn_bytes_written_total` (counter): wire bytes written, by transport
//! - `conn_handshakes_total` (counter): TLS handshakes, by role and result
//! - `conn_closed_total` (counter): handlers closed, by transport

use crate::net::connection::Role;
use crate::net::transport::TransportKind;

pub fn record_bytes_read(transport: TransportKind, bytes: usize) {
    ::metrics::counter!("conn_bytes_read_total", "transport" => transport.as_str())
        .increment(bytes as u64);
}

pub fn record_bytes_written(transport: TransportKind, bytes: usize) {
    ::metrics::counter!("conn_bytes_written_total", "transport" => transport.as_str())
        .increment(bytes as u64);
}

pub fn record_handshake(role: Role, success: bool) {
    let result = if success { "success" } else { "failure" };
    ::metrics::counter!("conn_handshakes_total", "role" => role.as_str(), "result" => result)
        .increment(1);
}

pub fn record_closed(transport: TransportKind) {
    ::metrics::counter!("conn_closed_total", "transport" => transport.as_str()).increment(1);
}
