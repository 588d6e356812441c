//! Fan-out logic for decoded protocol units.
//!
//! Lock discipline: registry snapshots are taken before any socket I/O, and
//! at most one peer stream lock is held at a time. A recipient's lock is
//! released before the sender's acknowledgement is written, so two sessions
//! routing at each other cannot deadlock.

use std::io::Read;
use std::net::Shutdown;

use crate::error::{RelayError, Result};
use crate::logging::ActivityLog;
use crate::net;
use crate::protocol;
use crate::registry::{ClientHandle, Registry};

/// Best-effort status line to a single peer. A failure here is the peer's
/// problem; its own reader thread will notice the dead socket.
pub fn send_notice(handle: &ClientHandle, text: &str) {
    if let Ok(mut stream) = handle.lock() {
        let _ = net::write_string(&mut *stream, text);
    }
}

/// Deliver `text` from `sender` to one recipient and acknowledge the
/// outcome to the sender. A lookup miss or delivery failure is reported to
/// the sender only and never propagates further.
pub fn route_message(
    registry: &Registry,
    log: &ActivityLog,
    sender: &str,
    sender_out: &ClientHandle,
    to: &str,
    text: &str,
) {
    let recipient = match registry.lookup(to) {
        Some(handle) => handle,
        None => {
            let miss = RelayError::RecipientNotConnected(to.to_string());
            send_notice(sender_out, &miss.to_string());
            return;
        }
    };
    let delivered = match recipient.lock() {
        Ok(mut out) => net::write_string(&mut *out, &format!("{}: {}", sender, text)).is_ok(),
        Err(_) => false,
    };
    if delivered {
        send_notice(sender_out, &format!("Message delivered to {}.", to));
        log.record("message", sender, &format!("to {}: {}", to, text));
    } else {
        send_notice(sender_out, &format!("Failed to deliver message to {}.", to));
    }
}

/// Relay a file payload of exactly `size` bytes from the sender's stream
/// into the recipient's, with no intermediate buffering. The header and the
/// byte span go out under one lock on the recipient so frames from other
/// sessions cannot interleave into the middle of the span.
///
/// An `Err` means the sender's own stream failed and its session must
/// close; every recipient-side failure is absorbed into a notice.
pub fn route_file<R: Read>(
    registry: &Registry,
    log: &ActivityLog,
    sender: &str,
    sender_out: &ClientHandle,
    source: &mut R,
    to: &str,
    filename: &str,
    size: u64,
) -> Result<()> {
    let recipient = match registry.lookup(to) {
        Some(handle) => handle,
        None => {
            // consume the declared bytes so the sender's next unit starts
            // at a frame boundary
            net::drain_exact(source, size)?;
            let miss = RelayError::RecipientNotConnected(to.to_string());
            send_notice(sender_out, &miss.to_string());
            return Ok(());
        }
    };
    let outcome = match recipient.lock() {
        Ok(mut out) => match protocol::write_file_frame(&mut *out, sender, filename, size) {
            Ok(()) => net::relay_exact(source, &mut *out, size),
            Err(_) => Err(net::RelayFailure::Sink { remaining: size }),
        },
        Err(_) => Err(net::RelayFailure::Sink { remaining: size }),
    };
    match outcome {
        Ok(()) => {
            send_notice(sender_out, &format!("File {} sent to {}.", filename, to));
            log.record(
                "file",
                sender,
                &format!("{} ({} bytes) to {}", filename, size, to),
            );
            Ok(())
        }
        Err(net::RelayFailure::Sink { remaining }) => {
            // The recipient's socket failed mid-delivery. Drain what the
            // sender still owes, then report the miss.
            net::drain_exact(source, remaining)?;
            send_notice(sender_out, &format!("Failed to send file to {}.", to));
            Ok(())
        }
        Err(net::RelayFailure::Source(e)) => {
            // The sender died mid-payload. The recipient now holds a
            // half-written span and cannot be resynchronized, so cut it
            // loose; its reader will see the early close as truncation.
            if let Ok(stream) = recipient.lock() {
                let _ = stream.shutdown(Shutdown::Both);
            }
            Err(e)
        }
    }
}

/// Write the user listing to the requesting client only. The names are one
/// registry snapshot, written under a single lock on the requester so the
/// listing arrives contiguously.
pub fn list_users(registry: &Registry, sender_out: &ClientHandle) {
    let names = registry.snapshot_names();
    if let Ok(mut out) = sender_out.lock() {
        let _ = net::write_string(&mut *out, "Connected users:");
        for name in &names {
            let _ = net::write_string(&mut *out, name);
        }
    }
}

/// Write `text` to every registered connection except `exclude`. Failures
/// on individual recipients are skipped and never abort the remainder.
pub fn broadcast(registry: &Registry, text: &str, exclude: Option<&ClientHandle>) {
    for handle in registry.handles_except(exclude) {
        send_notice(&handle, text);
    }
}
