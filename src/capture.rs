//! The capturing side: watching an application's GL calls, and sending frames.
//!
//! An interposer hands each call to `CaptureSession::call` once the driver
//! has handled it. The session copies the call's pointer arguments, brings
//! its `ContextState` up to date, and, while a capture is in progress,
//! sends the call to the host as a packet. At the end of each frame,
//! `end_frame` finishes any capture in progress and checks whether the host
//! wants another.
//!
//! A captured frame goes over the channel as:
//!
//! - `TraceCapturingBegin`
//! - the context state
//! - `FrameCommandsBegin`
//! - the frame's packets, then any queued messages, then a sentinel
//! - `FrameCommandsEnd`
//! - `TraceCapturingEnd`
//!
//! `receive_frame` reads that back on the host side.

use gleam::gl::{GLbitfield, GLenum, GLintptr, GLsizeiptr};
use std::io;
use std::os::raw::c_void;

use crate::channel::{Channel, RemoteCommand};
use crate::codec::{Checkpoint, Deserialize, Serialize};
use crate::command::{Command, Level, Packet};
use crate::config::{Limits, Options};
use crate::context::ContextState;
use crate::coverage::Coverage;
use crate::dispatch::StateMutators;
use crate::error::{Error, Result};
use crate::pointer_length::PointerLengths;
use crate::trace::Trace;

const TRACE_BEGIN: Checkpoint = Checkpoint("TraceCapturingBegin");
const COMMANDS_BEGIN: Checkpoint = Checkpoint("FrameCommandsBegin");
const COMMANDS_END: Checkpoint = Checkpoint("FrameCommandsEnd");
const TRACE_END: Checkpoint = Checkpoint("TraceCapturingEnd");

pub struct CaptureSession<C: Channel> {
    state: ContextState,
    options: Options,
    coverage: Coverage,
    lengths: PointerLengths,
    mutators: StateMutators,
    channel: C,
    capturing: bool,
    next_packet_id: u64,
    messages: Vec<(Level, String)>,
}

impl<C: Channel> CaptureSession<C> {
    /// Start tracking a context whose driver has the given limits. Nothing
    /// is sent until the host asks for a capture.
    pub fn new(channel: C, options: Options, limits: Limits) -> CaptureSession<C> {
        CaptureSession {
            state: ContextState::new(limits),
            options,
            coverage: Coverage::new(),
            lengths: PointerLengths::new(),
            mutators: StateMutators::new(),
            channel,
            capturing: false,
            next_packet_id: 0,
            messages: vec![],
        }
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Send the context state and start recording calls.
    pub fn begin_frame(&mut self) -> Result<()> {
        if self.capturing {
            return Err(Error::InvalidUsage("a capture is already in progress"));
        }
        log::info!("gl-trace: capturing a frame");
        TRACE_BEGIN.write(&mut self.channel)?;
        self.state.write_snapshot(&mut self.channel, self.options.capture_all_textures)?;
        COMMANDS_BEGIN.write(&mut self.channel)?;
        self.capturing = true;
        Ok(())
    }

    /// Note a diagnostic for the host. It is sent at the end of the frame
    /// being captured, or just logged here if there isn't one.
    pub fn message(&mut self, level: Level, text: String) {
        if self.capturing {
            self.messages.push((level, text));
        } else {
            level.log(&text);
        }
    }

    /// Handle a call the application has just made.
    pub fn call(&mut self, mut command: Command) -> Result<()> {
        self.resolve(&mut command);
        self.mutators.apply(&mut self.state, &command, &mut self.coverage);
        self.record(command)
    }

    /// Replace `command`'s client pointer, if it has one, with either the
    /// bytes it points to or the buffer offset it really is.
    fn resolve(&mut self, command: &mut Command) {
        if command.payload_mut().is_none() {
            return;
        }
        let is_offset = command.offset_target()
            .map_or(false, |target| self.state.bound_buffer(target) != 0);
        let length = if is_offset {
            0
        } else {
            self.lengths.length(command, &self.state, &mut self.coverage)
        };
        if let Some(payload) = command.payload_mut() {
            if is_offset {
                payload.resolve_as_offset();
            } else {
                payload.resolve(length);
            }
        }
    }

    fn record(&mut self, command: Command) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }
        let packet = Packet { id: self.next_packet_id, command };
        self.next_packet_id += 1;
        packet.serialize(&mut self.channel)
    }

    /// Handle `glMapBuffer`, given the pointer the driver returned. Return the
    /// pointer the application should use instead.
    ///
    /// Safety: `driver_ptr` must be null, or the driver's mapping of the
    /// whole buffer bound to `target`.
    pub unsafe fn map_buffer(&mut self, target: GLenum, access: GLenum,
                             driver_ptr: *mut c_void) -> Result<*mut c_void> {
        let alignment = self.state.limits.map_alignment();
        let ptr = match self.state.bound_buffer_mut(target) {
            Some(buffer) => buffer.map_buffer(access, driver_ptr, alignment),
            None => driver_ptr,
        };
        self.record(Command::map_buffer { target, access })?;
        Ok(ptr)
    }

    /// Handle `glMapBufferRange`, as for `map_buffer`.
    ///
    /// Safety: `driver_ptr` must be null, or the driver's mapping of the
    /// given range of the buffer bound to `target`.
    pub unsafe fn map_buffer_range(&mut self, target: GLenum, offset: GLintptr,
                                   length: GLsizeiptr, access: GLbitfield,
                                   driver_ptr: *mut c_void) -> Result<*mut c_void> {
        let alignment = self.state.limits.map_alignment();
        let ptr = match self.state.bound_buffer_mut(target) {
            Some(buffer) if offset >= 0 && length >= 0 => {
                buffer.map_buffer_range(offset as usize, length as usize, access,
                                        driver_ptr, alignment)
            }
            _ => driver_ptr,
        };
        self.record(Command::map_buffer_range { target, offset, length, access })?;
        Ok(ptr)
    }

    /// Handle `glFlushMappedBufferRange`. This must be called before the
    /// driver's flush, so the application's writes reach its mapping first.
    ///
    /// The recorded command's offset is from the start of the buffer, not
    /// the mapping.
    pub fn flush_mapped_buffer_range(&mut self, target: GLenum, offset: GLintptr,
                                     length: GLsizeiptr) -> Result<()> {
        let fix = self.options.fix_bad_flush_range;
        let written = match self.state.bound_buffer_mut(target) {
            Some(buffer) if offset >= 0 && length >= 0 => {
                buffer.flush_mapped_buffer_range(offset as usize, length as usize, fix,
                                                 &mut self.coverage)
            }
            _ => None,
        };
        let command = match written {
            Some(written) => Command::flush_mapped_buffer_range {
                target,
                offset: written.offset as GLintptr,
                length: written.contents.len() as GLsizeiptr,
                contents: written.contents,
            },
            None => Command::flush_mapped_buffer_range { target, offset, length, contents: vec![] },
        };
        self.record(command)
    }

    /// Handle `glUnmapBuffer`. This must be called before the driver's unmap.
    pub fn unmap_buffer(&mut self, target: GLenum) -> Result<()> {
        let written = match self.state.bound_buffer_mut(target) {
            Some(buffer) => match buffer.unmap_buffer() {
                Ok(written) => written,
                Err(_) => {
                    self.coverage.warn_once("glUnmapBuffer called on a buffer that isn't mapped");
                    None
                }
            },
            None => None,
        };
        let command = match written {
            Some(written) => Command::unmap_buffer {
                target,
                offset: written.offset,
                contents: written.contents,
            },
            None => Command::unmap_buffer { target, offset: 0, contents: vec![] },
        };
        self.record(command)
    }

    /// Finish the frame. If we were capturing it, send the end of it. Then
    /// see if the host has asked for anything, and act on it.
    ///
    /// A disconnected host is treated as a request to terminate.
    pub fn end_frame(&mut self) -> Result<Option<RemoteCommand>> {
        if self.capturing {
            self.record(Command::finish {})?;
            for (level, text) in std::mem::take(&mut self.messages) {
                self.record(Command::message { level, text })?;
            }
            self.record(Command::sentinel {})?;
            COMMANDS_END.write(&mut self.channel)?;
            TRACE_END.write(&mut self.channel)?;
            self.channel.flush()?;
            self.capturing = false;
            log::info!("gl-trace: frame capture sent");
        }

        let command = match self.channel.poll_command() {
            Ok(command) => command,
            Err(err) if err.is_disconnect() => {
                log::info!("gl-trace: capture host disconnected");
                return Ok(Some(RemoteCommand::Terminate));
            }
            Err(err) => return Err(err),
        };
        if command == Some(RemoteCommand::Capture) {
            self.begin_frame()?;
        }
        Ok(command)
    }
}

/// Read one captured frame from `stream`, as sent by `CaptureSession`.
///
/// `message` packets are passed on to the `log` crate as they arrive, and
/// also kept in the trace.
pub fn receive_frame<R: io::Read>(stream: &mut R) -> Result<Trace> {
    TRACE_BEGIN.read(stream)?;
    let state = ContextState::deserialize(stream)?;
    COMMANDS_BEGIN.read(stream)?;

    let mut packets: Vec<Packet> = vec![];
    loop {
        let packet = Packet::deserialize(stream)?;
        if let Some(previous) = packets.last() {
            if packet.id != previous.id + 1 {
                return Err(Error::corruption(format!("packet {} followed packet {}",
                                                     packet.id, previous.id)));
            }
        }
        if let Command::message { level, ref text } = packet.command {
            level.log(&format!("gl-trace (remote): {}", text));
        }
        let done = matches!(packet.command, Command::sentinel {});
        packets.push(packet);
        if done {
            break;
        }
    }

    COMMANDS_END.read(stream)?;
    TRACE_END.read(stream)?;
    log::info!("gl-trace: received a frame of {} packets", packets.len());
    Ok(Trace::new(state, packets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Payload;
    use gleam::gl::{self, GLint};
    use std::collections::VecDeque;
    use std::io::Write;

    /// A channel that keeps what is sent, and has a queue of host commands.
    #[derive(Default)]
    struct Loopback {
        sent: Vec<u8>,
        commands: VecDeque<RemoteCommand>,
    }

    impl Write for Loopback {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.sent.write(bytes)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Channel for Loopback {
        fn poll_command(&mut self) -> Result<Option<RemoteCommand>> {
            Ok(self.commands.pop_front())
        }
    }

    fn session() -> CaptureSession<Loopback> {
        CaptureSession::new(Loopback::default(), Options::default(), Limits::default())
    }

    #[test]
    fn test_capture_frame() {
        let mut session = session();
        session.call(Command::gen_textures { names: vec![1] }).unwrap();
        session.call(Command::bind_texture { target: gl::TEXTURE_2D, texture: 1 }).unwrap();
        assert!(session.channel().sent.is_empty());

        session.channel.commands.push_back(RemoteCommand::Capture);
        assert_eq!(session.end_frame().unwrap(), Some(RemoteCommand::Capture));
        assert!(session.is_capturing());

        let pixels = [0xff_u8; 2 * 2 * 4];
        session.call(Command::tex_image_2d {
            target: gl::TEXTURE_2D, level: 0, internal_format: gl::RGBA as GLint,
            width: 2, height: 2, border: 0, format: gl::RGBA, pixel_type: gl::UNSIGNED_BYTE,
            pixels: unsafe { Payload::client(pixels.as_ptr() as *const _) },
        }).unwrap();
        session.message(Level::Warn, "something odd".to_string());
        session.call(Command::draw_arrays { mode: gl::TRIANGLES, first: 0, count: 3 }).unwrap();
        assert_eq!(session.end_frame().unwrap(), None);
        assert!(!session.is_capturing());

        // The snapshot predates the upload, but the state has it now.
        assert_eq!(session.state().textures[&1].updates.len(), 1);

        let trace = receive_frame(&mut &session.channel().sent[..]).unwrap();
        assert!(trace.state.textures[&1].updates.is_empty());
        let opcodes: Vec<&str> = trace.packets.iter().map(|p| p.command.opcode().name()).collect();
        assert_eq!(opcodes, ["tex_image_2d", "draw_arrays", "finish", "message", "sentinel"]);
        match &trace.packets[0].command {
            Command::tex_image_2d { pixels, .. } => assert_eq!(pixels.bytes(), Some(&[0xff_u8; 16][..])),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_offsets_not_copied() {
        let mut session = session();
        session.call(Command::gen_buffers { names: vec![4] }).unwrap();
        session.call(Command::bind_buffer { target: gl::ARRAY_BUFFER, buffer: 4 }).unwrap();
        session.begin_frame().unwrap();
        session.call(Command::vertex_attrib_pointer {
            index: 0, size: 4, attrib_type: gl::FLOAT, normalized: 0, stride: 16,
            pointer: unsafe { Payload::client(32 as *const _) },
        }).unwrap();
        session.end_frame().unwrap();

        let trace = receive_frame(&mut &session.channel().sent[..]).unwrap();
        match &trace.packets[0].command {
            Command::vertex_attrib_pointer { pointer, .. } => assert_eq!(*pointer, Payload::Offset(32)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_mapped_writes() {
        let mut session = session();
        session.call(Command::gen_buffers { names: vec![2] }).unwrap();
        session.call(Command::bind_buffer { target: gl::ARRAY_BUFFER, buffer: 2 }).unwrap();
        session.call(Command::buffer_data {
            target: gl::ARRAY_BUFFER, size: 8, data: Payload::Null, usage: gl::DYNAMIC_DRAW,
        }).unwrap();
        session.begin_frame().unwrap();

        let mut driver_memory = vec![0_u8; 4];
        let ptr = unsafe {
            session.map_buffer_range(gl::ARRAY_BUFFER, 4, 4, gl::MAP_WRITE_BIT,
                                     driver_memory.as_mut_ptr() as *mut c_void).unwrap()
        };
        assert_ne!(ptr, driver_memory.as_mut_ptr() as *mut c_void);
        unsafe { std::ptr::copy_nonoverlapping([5_u8, 6, 7, 8].as_ptr(), ptr as *mut u8, 4) };
        session.unmap_buffer(gl::ARRAY_BUFFER).unwrap();
        session.end_frame().unwrap();

        assert_eq!(driver_memory, vec![5, 6, 7, 8]);
        assert_eq!(session.state().buffers[&2].contents, vec![0, 0, 0, 0, 5, 6, 7, 8]);

        let trace = receive_frame(&mut &session.channel().sent[..]).unwrap();
        assert_eq!(trace.packets[1].command, Command::unmap_buffer {
            target: gl::ARRAY_BUFFER, offset: 4, contents: vec![5, 6, 7, 8],
        });
    }

    #[test]
    fn test_packet_gap() {
        let mut bytes = vec![];
        TRACE_BEGIN.write(&mut bytes).unwrap();
        ContextState::default().serialize(&mut bytes).unwrap();
        COMMANDS_BEGIN.write(&mut bytes).unwrap();
        Packet { id: 5, command: Command::flush {} }.serialize(&mut bytes).unwrap();
        Packet { id: 7, command: Command::sentinel {} }.serialize(&mut bytes).unwrap();
        assert!(matches!(receive_frame(&mut &bytes[..]), Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_double_begin() {
        let mut session = session();
        session.begin_frame().unwrap();
        assert!(matches!(session.begin_frame(), Err(Error::InvalidUsage(_))));
    }
}
