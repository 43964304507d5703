//! Capture options, and the driver limits capture depends on.

use gleam::gl::{self, GLint, Gl};
use std::io;

use crate::codec::{self, Deserialize as _, Serialize};
use crate::enums;
use crate::error::Result;

/// The port an instrumented process listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 34199;

/// Settings for a capture session.
///
/// Missing fields take their defaults, so a partial settings file is fine.
#[derive(Clone, Debug, serde::Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    /// Treat `glFlushMappedBufferRange(target, 0, 0)` as flushing the whole
    /// mapped range. That's not what GL says, but some applications written
    /// against other APIs expect it.
    pub fix_bad_flush_range: bool,

    /// Keep every texture's contents, not just those the frame seems to use.
    pub capture_all_textures: bool,

    pub server_port: u16,
    pub trace_file: String,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            fix_bad_flush_range: true,
            capture_all_textures: true,
            server_port: DEFAULT_PORT,
            trace_file: "frame.gltrace".to_string(),
        }
    }
}

/// Implementation limits that shape what we record.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Limits {
    pub max_fragment_uniform_vectors: usize,
    pub max_vertex_uniform_vectors: usize,
    pub min_map_buffer_alignment: usize,
}

impl Default for Limits {
    /// The minimums GL 4.1 and GLES 3.0 guarantee.
    fn default() -> Limits {
        Limits {
            max_fragment_uniform_vectors: 224,
            max_vertex_uniform_vectors: 256,
            min_map_buffer_alignment: 64,
        }
    }
}

impl Limits {
    /// Ask `gl` for its limits. This needs a current context.
    pub fn query(gl: &dyn Gl) -> Limits {
        let get = |pname| {
            let mut value: [GLint; 1] = [0];
            unsafe { gl.get_integer_v(pname, &mut value) };
            value[0].max(0) as usize
        };
        Limits {
            max_fragment_uniform_vectors: get(gl::MAX_FRAGMENT_UNIFORM_VECTORS),
            max_vertex_uniform_vectors: get(gl::MAX_VERTEX_UNIFORM_VECTORS),
            min_map_buffer_alignment: get(enums::MIN_MAP_BUFFER_ALIGNMENT),
        }
    }

    /// How many uniform locations a program gets.
    pub fn uniform_slots(&self) -> usize {
        self.max_fragment_uniform_vectors + self.max_vertex_uniform_vectors
    }

    /// The alignment for mapped buffer shadows. Never zero.
    pub fn map_alignment(&self) -> usize {
        self.min_map_buffer_alignment.max(1)
    }
}

impl Serialize for Limits {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.max_fragment_uniform_vectors.serialize(stream)?;
        self.max_vertex_uniform_vectors.serialize(stream)?;
        self.min_map_buffer_alignment.serialize(stream)
    }
}

impl codec::Deserialize for Limits {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Limits> {
        Ok(Limits {
            max_fragment_uniform_vectors: usize::deserialize(stream)?,
            max_vertex_uniform_vectors: usize::deserialize(stream)?,
            min_map_buffer_alignment: usize::deserialize(stream)?,
        })
    }
}

#[test]
fn test_defaults() {
    let options = Options::default();
    assert!(options.fix_bad_flush_range);
    assert_eq!(options.server_port, 65536 - 31337);

    let limits = Limits { min_map_buffer_alignment: 0, ..Limits::default() };
    assert_eq!(limits.map_alignment(), 1);
    assert_eq!(limits.uniform_slots(), 480);
}
