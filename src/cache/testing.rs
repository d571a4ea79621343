//! Test doubles: an in-process RESP server reached through a fake dialer

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::context::CallContext;
use crate::net::{BoxedStream, DialError, Dialer};

/// Dialer whose every connection lands on a shared in-memory keyspace
#[derive(Default)]
pub struct FakeRedisDialer {
    pub data: Arc<Mutex<HashMap<String, String>>>,
    pub commands: Arc<Mutex<Vec<Vec<String>>>>,
    pub dials: AtomicUsize,
    pub refuse: AtomicBool,
    /// The next connection closes on its first data command, without replying
    pub hang_up_next: AtomicBool,
}

impl FakeRedisDialer {
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Commands seen, excluding connection setup chatter
    pub fn data_commands(&self) -> Vec<Vec<String>> {
        self.commands
            .lock()
            .iter()
            .filter(|c| !is_setup(c))
            .cloned()
            .collect()
    }
}

fn is_setup(args: &[String]) -> bool {
    matches!(
        args.first().map(String::as_str),
        Some("CLIENT" | "SELECT" | "AUTH" | "HELLO")
    )
}

#[async_trait]
impl Dialer for FakeRedisDialer {
    async fn dial(
        &self,
        _ctx: &CallContext,
        _network: &str,
        address: &str,
    ) -> Result<BoxedStream, DialError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(DialError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{} refused", address),
            )));
        }
        self.dials.fetch_add(1, Ordering::SeqCst);
        let hang_up = self.hang_up_next.swap(false, Ordering::SeqCst);

        let (near, far) = tokio::io::duplex(4096);
        tokio::spawn(serve(far, self.data.clone(), self.commands.clone(), hang_up));
        Ok(Box::new(near))
    }
}

async fn serve(
    mut io: DuplexStream,
    data: Arc<Mutex<HashMap<String, String>>>,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
    hang_up: bool,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = match io.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        while let Some((args, used)) = parse_command(&buf) {
            buf.drain(..used);
            if hang_up && !is_setup(&args) {
                commands.lock().push(args);
                return;
            }
            let reply = respond(&args, &data);
            commands.lock().push(args);
            if io.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

fn read_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a str> {
    let rest = &buf[*pos..];
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    let line = std::str::from_utf8(&rest[..end]).ok()?;
    *pos += end + 2;
    Some(line)
}

/// One `*N` array of bulk strings, or None until the frame is complete
fn parse_command(buf: &[u8]) -> Option<(Vec<String>, usize)> {
    let mut pos = 0;
    let count: usize = read_line(buf, &mut pos)?.strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len: usize = read_line(buf, &mut pos)?.strip_prefix('$')?.parse().ok()?;
        if buf.len() < pos + len + 2 {
            return None;
        }
        args.push(String::from_utf8_lossy(&buf[pos..pos + len]).into_owned());
        pos += len + 2;
    }
    if let Some(command) = args.first_mut() {
        command.make_ascii_uppercase();
    }
    Some((args, pos))
}

fn respond(args: &[String], data: &Mutex<HashMap<String, String>>) -> String {
    let mut data = data.lock();
    match args.first().map(String::as_str) {
        Some("GET") => match data.get(&args[1]) {
            Some(value) => format!("${}\r\n{}\r\n", value.len(), value),
            None => "$-1\r\n".to_string(),
        },
        Some("SET") => {
            data.insert(args[1].clone(), args[2].clone());
            "+OK\r\n".to_string()
        }
        Some("SETEX") => {
            data.insert(args[1].clone(), args[3].clone());
            "+OK\r\n".to_string()
        }
        Some("EXISTS") => {
            let n = args[1..].iter().filter(|k| data.contains_key(*k)).count();
            format!(":{}\r\n", n)
        }
        Some("DEL") => {
            let n = args[1..].iter().filter(|k| data.remove(*k).is_some()).count();
            format!(":{}\r\n", n)
        }
        Some("PING") => "+PONG\r\n".to_string(),
        _ => "+OK\r\n".to_string(),
    }
}
