//! Server responsibilities:
//! - accept TCP connections
//! - run the display-name handshake
//! - spawn one session thread per client
//! - dispatch decoded protocol units to the router
//!
//! A session owns two views of its socket: a dedicated read clone for the
//! blocking decode loop and a mutex-wrapped writer registered in the
//! directory, so the shared writer is never locked while waiting on a read.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{RelayError, Result};
use crate::logging::ActivityLog;
use crate::net;
use crate::protocol::{self, Command};
use crate::registry::{ClientHandle, Registry};
use crate::router::{self, send_notice};

pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    log: Arc<ActivityLog>,
}

impl Server {
    pub fn bind(addr: &str, log: ActivityLog) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
            registry: Arc::new(Registry::new()),
            log: Arc::new(log),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop on the calling thread, forever.
    pub fn run(self) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let registry = self.registry.clone();
                    let log = self.log.clone();
                    thread::spawn(move || run_session(stream, &registry, &log));
                }
                Err(e) => eprintln!("Error accepting connection: {}", e),
            }
        }
    }
}

/// Drive one client connection from handshake to cleanup. Cleanup runs on
/// every exit path, graceful or not, and is idempotent.
fn run_session(stream: TcpStream, registry: &Registry, log: &ActivityLog) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let mut reader = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };
    let writer: ClientHandle = Arc::new(Mutex::new(stream));

    // Identifying: one string frame, the display name.
    let name = match net::read_string(&mut reader) {
        Ok(n) => n.trim().to_string(),
        Err(_) => {
            shutdown(&writer);
            return;
        }
    };
    if name.is_empty() {
        send_notice(&writer, "Display name must not be empty.");
        shutdown(&writer);
        return;
    }
    // names are embedded in relayed frames and notices, so they have to
    // leave the composition headroom intact
    if name.len() > protocol::MAX_NAME_LEN {
        send_notice(&writer, "Display name is too long.");
        shutdown(&writer);
        return;
    }

    if let Some(old) = registry.register(&name, writer.clone()) {
        // Last writer wins; the superseded connection is closed, not leaked.
        send_notice(
            &old,
            &format!("Display name {} was taken over by a new connection.", name),
        );
        shutdown(&old);
        log.record("supersede", &name, &peer);
    }
    log.record("connect", &name, &peer);
    println!("{} joined the chat.", name);
    router::broadcast(registry, &format!("{} joined the chat.", name), Some(&writer));

    let exit = session_loop(&mut reader, registry, log, &name, &writer);

    // Closing: a superseded session finds its name already owned by the
    // new connection and skips the departure broadcast.
    if registry.unregister(&name, &writer) {
        router::broadcast(registry, &format!("{} left the chat.", name), Some(&writer));
        log.record("disconnect", &name, &peer);
        println!("{} left the chat.", name);
    }
    shutdown(&writer);

    match exit {
        Ok(()) | Err(RelayError::ConnectionClosed) => {}
        Err(e) => eprintln!("Session for {} ended with error: {}", name, e),
    }
}

/// Active state: decode units and dispatch until the client disconnects,
/// the stream closes, or the sender's own read path fails.
fn session_loop(
    reader: &mut TcpStream,
    registry: &Registry,
    log: &ActivityLog,
    name: &str,
    writer: &ClientHandle,
) -> Result<()> {
    loop {
        let command = match protocol::read_command(reader) {
            Ok(command) => command,
            // the offending frame was consumed whole, the stream is intact
            Err(RelayError::MalformedCommand(reason)) => {
                send_notice(writer, &format!("Invalid command: {}", reason));
                continue;
            }
            Err(e) => return Err(e),
        };
        if let Some(reason) = protocol::validate(&command) {
            // a rejected file command still owes its payload to the stream
            if let Command::File { size, .. } = command {
                net::drain_exact(reader, size)?;
            }
            send_notice(writer, &format!("Invalid command: {}", reason));
            continue;
        }
        match command {
            Command::Message { to, text } => {
                router::route_message(registry, log, name, writer, &to, &text);
            }
            Command::File { to, filename, size } => {
                router::route_file(registry, log, name, writer, reader, &to, &filename, size)?;
            }
            Command::ListUsers => router::list_users(registry, writer),
            Command::Disconnect => return Ok(()),
            Command::Broadcast(text) => {
                router::broadcast(registry, &format!("{}: {}", name, text), Some(writer));
                log.record("broadcast", name, &text);
            }
        }
    }
}

fn shutdown(handle: &ClientHandle) {
    if let Ok(stream) = handle.lock() {
        let _ = stream.shutdown(Shutdown::Both);
    }
}
