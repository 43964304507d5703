//! Capture a single frame of OpenGL calls, and replay it elsewhere.
//!
//! An instrumented process keeps a `CaptureSession` beside its GL context.
//! The session tracks the context's state as the application makes calls:
//! textures and their uploads, buffers, shaders and programs, framebuffers,
//! and the bindings and enables that tie them together. When a capture host
//! connected over a `MessageStream` asks for a frame, the session sends a
//! snapshot of that state, followed by every call the frame makes.
//!
//! On the host, `receive_frame` reads the snapshot and calls back into a
//! `Trace`, which can be saved to a file, loaded again, and replayed on any
//! GL implementation through the `Driver` trait: first recreating the
//! snapshot's objects and bindings, then issuing the frame's calls with
//! object names translated to the ones the replaying context handed out.

pub mod buffer;
pub mod capture;
pub mod channel;
pub mod codec;
pub mod command;
pub mod config;
pub mod context;
pub mod coverage;
pub mod dispatch;
pub mod driver;
pub mod enums;
pub mod error;
pub mod framebuffer;
pub mod pixels;
pub mod pointer_length;
pub mod program;
pub mod program_arb;
pub mod raw;
pub mod sampler;
pub mod shader;
pub mod texture;
pub mod trace;

pub use capture::{receive_frame, CaptureSession};
pub use channel::{Channel, MessageStream, RemoteCommand};
pub use command::{Command, Level, Opcode, Packet, Payload};
pub use config::{Limits, Options};
pub use context::ContextState;
pub use coverage::Coverage;
pub use driver::{Driver, GleamDriver};
pub use error::{Error, Result};
pub use trace::Trace;
