//! Shader objects.
//!
//! GL doesn't destroy a shader when the application deletes it if it is
//! still attached to a program; it only marks it, and the shader goes away
//! once the last program lets go of it. `Shader` keeps the attach count and
//! the mark, and `ContextState` removes the record when both say so.

use gleam::gl::{GLenum, GLuint};
use std::io;

use crate::codec::{Deserialize, Serialize};
use crate::driver::Driver;
use crate::error::{Error, Result};

/// The outcome of the last compile or link.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BuildStatus {
    Unbuilt,
    Success,
    Failure,
}

impl BuildStatus {
    pub fn from_bool(success: bool) -> BuildStatus {
        if success { BuildStatus::Success } else { BuildStatus::Failure }
    }
}

impl Serialize for BuildStatus {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        let n: u32 = match self {
            BuildStatus::Unbuilt => 0,
            BuildStatus::Success => 1,
            BuildStatus::Failure => 2,
        };
        n.serialize(stream)
    }
}

impl Deserialize for BuildStatus {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<BuildStatus> {
        match u32::deserialize(stream)? {
            0 => Ok(BuildStatus::Unbuilt),
            1 => Ok(BuildStatus::Success),
            2 => Ok(BuildStatus::Failure),
            n => Err(Error::corruption(format!("invalid build status {}", n))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shader {
    pub shader_type: GLenum,
    pub compile_status: BuildStatus,
    pub attach_count: u32,
    pub marked_for_delete: bool,
    pub sources: Vec<String>,
}

impl Shader {
    pub fn new(shader_type: GLenum) -> Shader {
        Shader {
            shader_type,
            compile_status: BuildStatus::Unbuilt,
            attach_count: 0,
            marked_for_delete: false,
            sources: vec![],
        }
    }

    pub fn shader_source(&mut self, sources: &[String]) {
        if sources.is_empty() {
            return;
        }
        self.sources = sources.to_vec();
    }

    pub fn compile_shader(&mut self, compiled: bool) {
        self.compile_status = BuildStatus::from_bool(compiled);
    }

    pub fn attach(&mut self) {
        self.attach_count += 1;
    }

    pub fn detach(&mut self) {
        self.attach_count = self.attach_count.saturating_sub(1);
    }

    pub fn delete_shader(&mut self) {
        self.marked_for_delete = true;
    }

    /// True if GL would have destroyed this shader by now.
    pub fn is_dead(&self) -> bool {
        self.marked_for_delete && self.attach_count == 0
    }

    /// Create and compile a shader with this source on `driver`, and return its name.
    pub fn create(&self, driver: &dyn Driver) -> GLuint {
        let handle = driver.create_shader(self.shader_type);
        if self.sources.is_empty() {
            log::warn!("gl-trace: shader {} has no source; creating it empty", handle);
            return handle;
        }

        let strings: Vec<&[u8]> = self.sources.iter().map(|s| s.as_bytes()).collect();
        driver.shader_source(handle, &strings);
        driver.compile_shader(handle);
        handle
    }
}

impl Serialize for Shader {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.shader_type.serialize(stream)?;
        self.compile_status.serialize(stream)?;
        self.attach_count.serialize(stream)?;
        self.marked_for_delete.serialize(stream)?;
        self.sources.serialize(stream)
    }
}

impl Deserialize for Shader {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Shader> {
        Ok(Shader {
            shader_type: Deserialize::deserialize(stream)?,
            compile_status: Deserialize::deserialize(stream)?,
            attach_count: Deserialize::deserialize(stream)?,
            marked_for_delete: Deserialize::deserialize(stream)?,
            sources: Deserialize::deserialize(stream)?,
        })
    }
}

#[test]
fn test_attach_count() {
    let mut shader = Shader::new(gleam::gl::VERTEX_SHADER);
    shader.detach();
    assert_eq!(shader.attach_count, 0);

    shader.attach();
    shader.attach();
    shader.delete_shader();
    assert!(!shader.is_dead());
    shader.detach();
    assert!(!shader.is_dead());
    shader.detach();
    assert!(shader.is_dead());
    shader.detach();
    assert_eq!(shader.attach_count, 0);
}

#[test]
fn test_shader_create() {
    use crate::driver::mock::MockDriver;

    let mut shader = Shader::new(gleam::gl::FRAGMENT_SHADER);
    shader.shader_source(&["void main() {".to_string(), "}".to_string()]);
    shader.compile_shader(true);

    let bytes = crate::codec::to_bytes(&shader).unwrap();
    assert_eq!(crate::codec::from_bytes::<Shader>(&bytes).unwrap(), shader);

    let driver = MockDriver::new();
    let handle = shader.create(&driver);
    assert!(driver.called(&format!("create_shader({})", gleam::gl::FRAGMENT_SHADER)));
    assert!(driver.called(&format!("shader_source({}, ", handle)));
    assert!(driver.called(&format!("compile_shader({})", handle)));
}
