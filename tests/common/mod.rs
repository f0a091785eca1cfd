#![allow(dead_code)]

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mill_frame::prelude::*;
use mill_frame::net::tcp::roster::RosterHandle;
use mill_frame::net::tcp::NoOpLogger;

pub struct RunningServer {
    pub addr: SocketAddr,
    pub roster: RosterHandle,
    shutdown: ShutdownHandle,
    worker: Option<JoinHandle<Result<()>>>,
}

impl RunningServer {
    pub fn start<P>(policy: P) -> Self
    where
        P: DispatchPolicy,
        TcpServer<P>: Send + 'static,
    {
        let config = ServerConfig::builder()
            .address("127.0.0.1:0".parse().unwrap())
            .poll_timeout(Some(Duration::from_millis(10)))
            .logger(Arc::new(NoOpLogger))
            .build();
        let mut server = TcpServer::bind(config, policy).unwrap();
        let addr = server.local_addr();
        let roster = server.roster();
        let shutdown = server.shutdown_handle();
        let worker = thread::spawn(move || server.run());
        Self {
            addr,
            roster,
            shutdown,
            worker: Some(worker),
        }
    }

    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    /// Connects `n` clients and waits until the server has accepted all of them.
    pub fn connect_many(&self, n: usize) -> Vec<TcpStream> {
        let clients: Vec<_> = (0..n).map(|_| self.connect()).collect();
        wait_for(|| self.roster.len() == n);
        clients
    }

    pub fn stop(mut self) {
        self.shutdown.shutdown();
        if let Some(worker) = self.worker.take() {
            worker.join().unwrap().unwrap();
        }
    }
}

pub fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached in time");
}

pub fn read_frame(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut frame = vec![0u8; len];
    stream.read_exact(&mut frame).unwrap();
    frame
}

/// Asserts nothing arrives on `stream` within a short grace period.
pub fn assert_silent(stream: &mut TcpStream) {
    stream
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    let mut byte = [0u8; 1];
    match stream.read(&mut byte) {
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
        other => panic!("expected no data, got {:?}", other),
    }
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
}

/// True once the peer has closed the connection.
pub fn is_closed(stream: &mut TcpStream) -> bool {
    let mut byte = [0u8; 1];
    matches!(stream.read(&mut byte), Ok(0) | Err(_))
}
