//! Reference client: register a display name, print server notifications,
//! persist incoming files and turn stdin commands into protocol units.

use std::fs::{self, File};
use std::io::{self, BufRead};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::thread;

use crate::error::{RelayError, Result};
use crate::net;
use crate::protocol;

/// Incoming files land here, relative to the working directory.
const RECEIVED_DIR: &str = "received_files";

pub fn run_client(ip: &str, port: u16, name: &str) -> io::Result<()> {
    let addr = format!("{}:{}", ip, port);
    let mut stream = TcpStream::connect(&addr)?;
    println!("Connected to {} as {}", addr, name);
    show_commands();

    if net::write_string(&mut stream, name).is_err() {
        eprintln!("Failed to send display name");
        return Ok(());
    }

    // Reader thread: everything from the server is a plain string frame,
    // except file deliveries opening with the reserved tag.
    let mut reader = stream.try_clone()?;
    let reader_thread = thread::spawn(move || loop {
        match net::read_string(&mut reader) {
            Ok(tag) if tag == protocol::TAG_FILE => {
                if let Err(e) = receive_file(&mut reader) {
                    eprintln!("File receive failed: {}", e);
                    break;
                }
            }
            Ok(text) => println!("{}", text),
            // the frame was drained whole, the stream is still in sync
            Err(RelayError::MalformedCommand(reason)) => {
                eprintln!("Dropped an unreadable frame: {}", reason);
            }
            Err(_) => {
                println!("Disconnected from server.");
                break;
            }
        }
    });

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !handle_line(&mut stream, line) {
            break;
        }
    }

    // graceful exit even when stdin ended without /sair
    let _ = protocol::write_disconnect(&mut stream);
    let _ = stream.shutdown(Shutdown::Write);
    let _ = reader_thread.join();
    Ok(())
}

fn show_commands() {
    println!("\nAvailable commands:");
    println!("/send message <recipient> <text> - send a message to one user");
    println!("/send file <recipient> <path>    - send a file to one user");
    println!("/users                           - list connected users");
    println!("/sair                            - leave the chat");
    println!("Anything else is broadcast to everyone.\n");
}

/// Returns false when the session should end; the caller sends the
/// disconnect unit.
fn handle_line(stream: &mut TcpStream, line: &str) -> bool {
    if line == "/sair" {
        return false;
    }
    if line == "/users" {
        let _ = protocol::write_list_users(stream);
    } else if let Some(rest) = line.strip_prefix("/send message ") {
        match rest.split_once(' ') {
            Some((to, text)) if !text.trim().is_empty() => {
                let text = text.trim();
                if text.len() > protocol::MAX_TEXT_LEN {
                    println!("Message too long.");
                } else {
                    let _ = protocol::write_message(stream, to, text);
                }
            }
            _ => println!("Usage: /send message <recipient> <text>"),
        }
    } else if let Some(rest) = line.strip_prefix("/send file ") {
        match rest.split_once(' ') {
            Some((to, path)) => send_file(stream, to, path.trim()),
            None => println!("Usage: /send file <recipient> <path>"),
        }
    } else if line.starts_with('/') {
        println!("Unknown command.");
        show_commands();
    } else if line.len() > protocol::MAX_TEXT_LEN {
        println!("Message too long.");
    } else {
        // a bare line equal to a reserved tag would decode as a command;
        // pad it so it stays plain text
        let text = if protocol::is_reserved_tag(line) {
            format!("{} ", line)
        } else {
            line.to_string()
        };
        let _ = net::write_string(stream, &text);
    }
    true
}

fn send_file(stream: &mut TcpStream, to: &str, path: &str) {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => {
            println!("File not found: {}", path);
            return;
        }
    };
    let size = match file.metadata() {
        Ok(m) => m.len(),
        Err(e) => {
            println!("Cannot read {}: {}", path, e);
            return;
        }
    };
    let filename = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    if protocol::write_file_frame(stream, to, filename, size).is_err() {
        println!("Failed to send file header.");
        return;
    }
    match net::relay_exact(&mut file, stream, size) {
        Ok(()) => println!("Uploading {} ({} bytes) to {}...", filename, size, to),
        Err(e) => println!("File upload failed: {:?}", e),
    }
}

/// The reserved tag was already consumed; read the header, then stream the
/// payload straight to disk. A partial file is discarded, never kept.
fn receive_file(reader: &mut TcpStream) -> Result<()> {
    let sender = net::read_string(reader)?;
    let filename = net::read_string(reader)?;
    let size = net::read_u64(reader)?;
    // keep only the final path component so a hostile filename cannot
    // escape the download directory
    let safe = Path::new(&filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("received.bin")
        .to_string();
    fs::create_dir_all(RECEIVED_DIR)?;
    let dest_path = Path::new(RECEIVED_DIR).join(&safe);
    let mut dest = File::create(&dest_path)?;
    match net::relay_exact(reader, &mut dest, size) {
        Ok(()) => {
            println!(
                "Received file {} ({} bytes) from {} -> {}",
                safe,
                size,
                sender,
                dest_path.display()
            );
            Ok(())
        }
        Err(net::RelayFailure::Source(e)) => {
            let _ = fs::remove_file(&dest_path);
            Err(e)
        }
        Err(net::RelayFailure::Sink { remaining }) => {
            // disk write failed; finish consuming the span so the stream
            // stays at a frame boundary
            net::drain_exact(reader, remaining)?;
            let _ = fs::remove_file(&dest_path);
            println!("Could not save {}: disk write failed.", safe);
            Ok(())
        }
    }
}
