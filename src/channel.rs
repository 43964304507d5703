//! The connection between an instrumented process and the capture host.
//!
//! The instrumented process listens, and the host connects. Both ends then
//! exchange a pair of checkpoints, so that neither mistakes some other
//! service for its peer, and switch the socket to non-blocking mode: the
//! instrumented side polls for commands from the host once per frame and
//! must not stall the application while it does.
//!
//! `MessageStream` implements `io::Read` and `io::Write`, so packets and
//! state go over it with the ordinary codec. Writes are buffered; call
//! `flush` to send them.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use crate::codec::{Checkpoint, Deserialize, Serialize};
use crate::error::{Error, Result};

const SEND_BUFFER_SIZE: usize = 1024 * 1024;

const SYN: Checkpoint = Checkpoint("It's a trap!");
const ACK: Checkpoint = Checkpoint(" - Admiral Ackbar");

/// What the host can ask the instrumented process to do.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RemoteCommand {
    /// Capture the next frame.
    Capture,
    /// Stop capturing and close the connection.
    Terminate,
}

impl Serialize for RemoteCommand {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        let n: u32 = match self {
            RemoteCommand::Capture => 1,
            RemoteCommand::Terminate => 2,
        };
        n.serialize(stream)
    }
}

impl Deserialize for RemoteCommand {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<RemoteCommand> {
        match u32::deserialize(stream)? {
            1 => Ok(RemoteCommand::Capture),
            2 => Ok(RemoteCommand::Terminate),
            n => Err(Error::corruption(format!("unknown remote command {}", n))),
        }
    }
}

/// Where a capture session sends its frames, and hears from the host.
pub trait Channel: io::Write {
    /// Return the host's next command, if one has arrived. Don't wait for one.
    fn poll_command(&mut self) -> Result<Option<RemoteCommand>>;
}

pub struct MessageStream {
    socket: TcpStream,
    send_buffer: Vec<u8>,
}

impl MessageStream {
    /// Wait on `port` for the host to connect.
    pub fn listen(port: u16) -> Result<MessageStream> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        log::info!("gl-trace: waiting for a capture host on port {}", port);
        let (socket, peer) = listener.accept()?;
        log::info!("gl-trace: capture host connected from {}", peer);
        MessageStream::handshake(socket, true)
    }

    /// Connect to an instrumented process listening at `address`.
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<MessageStream> {
        let socket = TcpStream::connect(address)?;
        MessageStream::handshake(socket, false)
    }

    fn handshake(mut socket: TcpStream, listening: bool) -> Result<MessageStream> {
        if listening {
            SYN.write(&mut socket)?;
            ACK.read(&mut socket)?;
        } else {
            SYN.read(&mut socket)?;
            ACK.write(&mut socket)?;
        }
        socket.set_nonblocking(true)?;
        socket.set_nodelay(true)?;
        Ok(MessageStream {
            socket,
            send_buffer: Vec::with_capacity(SEND_BUFFER_SIZE),
        })
    }

    /// Send all of `bytes`, retrying while the socket is full.
    fn really_send(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        while !bytes.is_empty() {
            match self.socket.write(bytes) {
                Ok(0) => return Err(io::ErrorKind::ConnectionAborted.into()),
                Ok(n) => bytes = &bytes[n..],
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::yield_now(),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn flush_send_buffer(&mut self) -> io::Result<()> {
        if self.send_buffer.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.send_buffer);
        let result = self.really_send(&pending);
        self.send_buffer = pending;
        self.send_buffer.clear();
        result
    }

    /// True if the peer has sent something we haven't read yet.
    pub fn has_data(&mut self) -> Result<bool> {
        let mut byte = [0_u8; 1];
        match self.socket.peek(&mut byte) {
            Ok(0) => Err(Error::NetworkDisconnect),
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

impl Write for MessageStream {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.send_buffer.len() + bytes.len() > SEND_BUFFER_SIZE {
            self.flush_send_buffer()?;
            if bytes.len() > SEND_BUFFER_SIZE {
                self.really_send(bytes)?;
                return Ok(bytes.len());
            }
        }
        self.send_buffer.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_send_buffer()
    }
}

impl Read for MessageStream {
    /// Wait until some bytes arrive. `read_exact`, and so the codec, keeps
    /// calling this until it has all it asked for.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.socket.read(buf) {
                // The peer closed the connection.
                Ok(0) => return Err(io::ErrorKind::ConnectionAborted.into()),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::yield_now(),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
                Err(err) => return Err(err),
            }
        }
    }
}

impl Channel for MessageStream {
    fn poll_command(&mut self) -> Result<Option<RemoteCommand>> {
        if !self.has_data()? {
            return Ok(None);
        }
        RemoteCommand::deserialize(self).map(Some)
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        // Try to get our data out; there's no one to tell if we can't.
        let _ = self.flush_send_buffer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn test_remote_commands() {
        let bytes = codec::to_bytes(&[RemoteCommand::Capture, RemoteCommand::Terminate][..]).unwrap();
        let commands: Vec<RemoteCommand> = codec::from_bytes(&bytes).unwrap();
        assert_eq!(commands, vec![RemoteCommand::Capture, RemoteCommand::Terminate]);

        let bytes = codec::to_bytes(&3_u32).unwrap();
        assert!(matches!(codec::from_bytes::<RemoteCommand>(&bytes),
                         Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_loopback() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let address = listener.local_addr().unwrap();
        let instrumented = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let mut stream = MessageStream::handshake(socket, true).unwrap();
            while stream.poll_command().unwrap().is_none() {
                thread::yield_now();
            }
            "frame".to_string().serialize(&mut stream).unwrap();
            stream.flush().unwrap();
        });

        let mut host = MessageStream::connect(address).unwrap();
        RemoteCommand::Capture.serialize(&mut host).unwrap();
        host.flush().unwrap();
        assert_eq!(String::deserialize(&mut host).unwrap(), "frame");
        instrumented.join().unwrap();

        // The other end has hung up.
        assert!(matches!(u32::deserialize(&mut host), Err(Error::NetworkDisconnect)));
    }
}
