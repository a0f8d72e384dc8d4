//! Request/response framing over a byte stream

use std::io::{Read, Write};

use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use super::CommandCode;
use super::layout::Header;
use crate::{Error, Result};

/// Frames messages over a duplex stream
///
/// After the first I/O failure the framer is broken and refuses every
/// further call with [`Error::ConnectionBroken`].
#[derive(Debug)]
pub(crate) struct Framer<S> {
    stream: S,
    broken: bool,
}

impl<S: Read + Write> Framer<S> {
    pub(crate) const fn new(stream: S) -> Self {
        Self {
            stream,
            broken: false,
        }
    }

    pub(crate) const fn is_broken(&self) -> bool {
        self.broken
    }

    /// Give up on the connection after a protocol desync
    pub(crate) fn mark_broken(&mut self) {
        if !self.broken {
            debug!("Marking resource manager connection as broken");
        }
        self.broken = true;
    }

    #[cfg(test)]
    pub(crate) fn get_ref(&self) -> &S {
        &self.stream
    }

    fn io<T>(
        &mut self,
        command: CommandCode,
        op: impl FnOnce(&mut S) -> std::io::Result<T>,
    ) -> Result<T> {
        if self.broken {
            return Err(Error::ConnectionBroken);
        }
        op(&mut self.stream).map_err(|source| {
            debug!(%command, error = %source, "Transport failure");
            self.broken = true;
            Error::transport(command, source)
        })
    }

    /// Write the 8-byte message header
    pub(crate) fn send_header(&mut self, command: CommandCode, size: usize) -> Result<()> {
        let size = u32::try_from(size)
            .map_err(|_| Error::InvalidParameter(format!("payload of {size} bytes")))?;
        let header = Header {
            size,
            command: command.code(),
        };
        trace!(%command, size, "Sending header");
        self.write_all(command, header.as_bytes())
    }

    /// Write raw bytes following a header
    pub(crate) fn write_all(&mut self, command: CommandCode, data: &[u8]) -> Result<()> {
        self.io(command, |stream| {
            stream.write_all(data)?;
            stream.flush()
        })
    }

    /// Fill `buf` completely from the stream
    pub(crate) fn read_exact(&mut self, command: CommandCode, buf: &mut [u8]) -> Result<()> {
        self.io(command, |stream| stream.read_exact(buf))
    }

    /// Send header and payload without waiting for the reply
    pub(crate) fn send<T: IntoBytes + Immutable>(
        &mut self,
        command: CommandCode,
        payload: &T,
    ) -> Result<()> {
        let bytes = payload.as_bytes();
        self.send_header(command, bytes.len())?;
        self.write_all(command, bytes)
    }

    /// Read a reply into `payload`, overwriting it in place
    pub(crate) fn receive<T: FromBytes + IntoBytes>(
        &mut self,
        command: CommandCode,
        payload: &mut T,
    ) -> Result<()> {
        self.read_exact(command, payload.as_mut_bytes())?;
        trace!(%command, size = size_of::<T>(), "Received reply");
        Ok(())
    }

    /// Send `payload` and read the daemon's reply back into it
    pub(crate) fn exchange<T: FromBytes + IntoBytes + Immutable>(
        &mut self,
        command: CommandCode,
        payload: &mut T,
    ) -> Result<()> {
        self.send(command, payload)?;
        self.receive(command, payload)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{self, Cursor};

    use super::*;
    use crate::protocol::layout::{EstablishStruct, VersionStruct};

    /// Stream replaying canned input and recording output
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedStream {
        pub(crate) input: Cursor<Vec<u8>>,
        pub(crate) output: Vec<u8>,
    }

    impl ScriptedStream {
        pub(crate) fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exchange_round_trip_in_place() {
        let reply = EstablishStruct {
            scope: 0,
            context: 0x1234_5678,
            rv: 0,
        };
        let mut framer = Framer::new(ScriptedStream::new(reply.as_bytes().to_vec()));

        let mut payload = EstablishStruct {
            scope: 2,
            context: 0,
            rv: 0,
        };
        framer
            .exchange(CommandCode::EstablishContext, &mut payload)
            .unwrap();
        assert_eq!(payload.context, 0x1234_5678);

        let written = &framer.get_ref().output;
        assert_eq!(written.len(), 8 + 12);
        assert_eq!(&written[0..4], &12u32.to_ne_bytes());
        assert_eq!(&written[4..8], &0x01u32.to_ne_bytes());
        assert_eq!(&written[8..12], &2u32.to_ne_bytes());
    }

    #[test]
    fn test_short_read_breaks_connection() {
        let mut framer = Framer::new(ScriptedStream::new(vec![0x04, 0x00]));
        let mut payload = VersionStruct {
            major: 4,
            minor: 3,
            rv: 0,
        };

        let err = framer.exchange(CommandCode::Version, &mut payload).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                command: CommandCode::Version,
                ..
            }
        ));
        assert!(framer.is_broken());

        let written = framer.get_ref().output.len();
        let err = framer.exchange(CommandCode::Version, &mut payload).unwrap_err();
        assert!(matches!(err, Error::ConnectionBroken));
        assert_eq!(framer.get_ref().output.len(), written);
    }

    #[test]
    fn test_mark_broken() {
        let mut framer = Framer::new(ScriptedStream::default());
        framer.mark_broken();
        assert!(matches!(
            framer.send_header(CommandCode::GetReadersState, 0),
            Err(Error::ConnectionBroken)
        ));
        assert!(framer.get_ref().output.is_empty());
    }
}
