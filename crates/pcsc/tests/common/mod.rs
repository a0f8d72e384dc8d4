//! In-process stand-in for pcscd used by the integration tests

#![allow(dead_code, unreachable_pub)]

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use smartcard_pcsc::protocol::layout::{
    ConnectStruct, EstablishStruct, Header, ReaderStateArray, ReaderStateEntry, TransmitStruct,
    WaitReaderStateChangeStruct,
};
use smartcard_pcsc::{
    ClientConfig, CommandCode, Context, PcscLiteClient, ReaderFlags, ResultCode, WaitStrategy,
};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes};

/// Context id the daemon hands out
pub const CONTEXT_ID: u32 = 0x0C0F_FEE0;
/// Card handle the daemon hands out
pub const CARD_HANDLE: i32 = 0x0001_2345;
/// Longest the daemon blocks on a wait request
const MAX_WAIT: Duration = Duration::from_millis(20);

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a populated table entry
pub fn reader(name: &str, flags: u32, atr: &[u8]) -> ReaderStateEntry {
    ReaderStateEntry::new(name, ReaderFlags::from_bits(flags), atr, 0).unwrap()
}

/// Scripted answer to a transmit request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with `rv = 0` and these response bytes
    Data(Vec<u8>),
    /// Answer with this result code and no data
    Refuse(ResultCode),
    /// Claim this many response bytes and send none
    Oversized(u32),
}

/// One request seen by the daemon
#[derive(Debug, Clone)]
pub struct Request {
    /// Command code from the header
    pub command: u32,
    /// Fixed-size payload as received
    pub payload: Vec<u8>,
    /// Variable data following the payload
    pub data: Vec<u8>,
}

impl Request {
    /// Decode the payload as `T`
    pub fn payload_as<T: FromBytes>(&self) -> T {
        T::read_from_bytes(&self.payload).unwrap()
    }
}

#[derive(Debug, Default)]
struct State {
    readers: Vec<ReaderStateEntry>,
    replies: VecDeque<Reply>,
    log: Vec<Request>,
}

/// Handle onto a running mock daemon
#[derive(Debug, Clone, Default)]
pub struct MockDaemon {
    state: Arc<Mutex<State>>,
}

impl MockDaemon {
    /// Create a daemon reporting `readers`
    pub fn new(readers: Vec<ReaderStateEntry>) -> Self {
        let daemon = Self::default();
        daemon.set_readers(readers);
        daemon
    }

    /// Serve one end of a socket pair and return the other end
    pub fn spawn(&self) -> UnixStream {
        let (client, server) = UnixStream::pair().unwrap();
        let daemon = self.clone();
        thread::spawn(move || daemon.serve(server));
        client
    }

    /// Bind `path` and serve the first connection made to it
    pub fn listen(&self, path: &Path) {
        let listener = UnixListener::bind(path).unwrap();
        let daemon = self.clone();
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                daemon.serve(stream);
            }
        });
    }

    /// Establish a context over a fresh socket pair
    pub fn context(&self, config: ClientConfig) -> Context {
        let mut client = PcscLiteClient::from_stream(self.spawn());
        client.handshake().unwrap();
        Context::with_backend(client, config).unwrap()
    }

    /// Establish a context that polls quickly
    pub fn polling_context(&self) -> Context {
        self.context(
            ClientConfig::default().with_wait_strategy(WaitStrategy::Poll {
                interval: Duration::from_millis(10),
            }),
        )
    }

    /// Replace the reported readers
    pub fn set_readers(&self, readers: Vec<ReaderStateEntry>) {
        self.state.lock().readers = readers;
    }

    /// Queue an answer for the next transmit
    pub fn push_reply(&self, reply: Reply) {
        self.state.lock().replies.push_back(reply);
    }

    /// Every request received so far
    pub fn log(&self) -> Vec<Request> {
        self.state.lock().log.clone()
    }

    /// Command codes received so far
    pub fn commands(&self) -> Vec<u32> {
        self.state.lock().log.iter().map(|r| r.command).collect()
    }

    /// Requests carrying `command`
    pub fn requests(&self, command: CommandCode) -> Vec<Request> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.command == command.code())
            .cloned()
            .collect()
    }

    fn serve(&self, mut stream: UnixStream) {
        loop {
            let mut header = Header::new_zeroed();
            if stream.read_exact(header.as_mut_bytes()).is_err() {
                return;
            }
            let mut payload = vec![0u8; header.size as usize];
            if stream.read_exact(&mut payload).is_err() {
                return;
            }
            if self.handle(&mut stream, header.command, payload).is_err() {
                return;
            }
        }
    }

    fn handle(&self, stream: &mut UnixStream, command: u32, payload: Vec<u8>) -> std::io::Result<()> {
        let mut request = Request {
            command,
            payload,
            data: Vec::new(),
        };

        let reply = match command {
            c if c == CommandCode::EstablishContext.code() => {
                let mut msg: EstablishStruct = request.payload_as();
                msg.context = CONTEXT_ID;
                msg.as_bytes().to_vec()
            }
            c if c == CommandCode::GetReadersState.code() => {
                let mut table = ReaderStateArray::new_zeroed();
                for (slot, entry) in table.iter_mut().zip(&self.state.lock().readers) {
                    *slot = *entry;
                }
                table.as_bytes().to_vec()
            }
            c if c == CommandCode::WaitReaderStateChange.code() => {
                let mut msg: WaitReaderStateChangeStruct = request.payload_as();
                thread::sleep(Duration::from_millis(msg.timeout.into()).min(MAX_WAIT));
                msg.rv = ResultCode::E_TIMEOUT.code();
                msg.as_bytes().to_vec()
            }
            c if c == CommandCode::Connect.code() => {
                let mut msg: ConnectStruct = request.payload_as();
                let name = msg.reader.split(|b| *b == 0).next().unwrap_or_default().to_vec();
                let known = self
                    .state
                    .lock()
                    .readers
                    .iter()
                    .any(|entry| entry.name_bytes() == name);
                if known {
                    msg.card = CARD_HANDLE;
                    msg.active_protocol = 2;
                } else {
                    msg.rv = ResultCode::E_UNKNOWN_READER.code();
                }
                msg.as_bytes().to_vec()
            }
            c if c == CommandCode::Transmit.code() => {
                let mut msg: TransmitStruct = request.payload_as();
                request.data = vec![0u8; msg.send_length as usize];
                stream.read_exact(&mut request.data)?;

                let reply = self
                    .state
                    .lock()
                    .replies
                    .pop_front()
                    .unwrap_or(Reply::Data(vec![0x90, 0x00]));
                let mut out = Vec::new();
                match reply {
                    Reply::Data(data) => {
                        msg.recv_length = data.len() as u32;
                        out.extend_from_slice(msg.as_bytes());
                        out.extend_from_slice(&data);
                    }
                    Reply::Refuse(code) => {
                        msg.rv = code.code();
                        out.extend_from_slice(msg.as_bytes());
                    }
                    Reply::Oversized(len) => {
                        msg.recv_length = len;
                        out.extend_from_slice(msg.as_bytes());
                    }
                }
                out
            }
            // Everything else succeeds unchanged
            _ => request.payload.clone(),
        };

        self.state.lock().log.push(request);
        write_reply(stream, &reply)
    }
}

fn write_reply(stream: &mut UnixStream, reply: &[u8]) -> std::io::Result<()> {
    stream.write_all(reply)?;
    stream.flush()
}

/// Bytes of a struct, for comparing against logged payloads
pub fn bytes_of<T: IntoBytes + Immutable>(value: &T) -> Vec<u8> {
    value.as_bytes().to_vec()
}
