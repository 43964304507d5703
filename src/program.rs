//! GLSL program objects and their uniform values.
//!
//! Uniform locations are only meaningful to the program that handed them
//! out, and a program re-created at replay time may hand out different ones.
//! So a `Program` remembers every name the application looked up with
//! `glGetUniformLocation`, and `create` looks those names up again to build a
//! table from captured locations to replay locations.

use gleam::gl::{GLint, GLuint};
use std::collections::{BTreeMap, HashMap};
use std::io;

use crate::codec::{Deserialize, Serialize};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::shader::BuildStatus;
use crate::trace::Remap;

/// The value stored at one uniform location: a vector of up to four floats
/// or ints, or nothing if the application never set it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Typeless,
    Float { dims: u8, values: [f32; 4] },
    Int { dims: u8, values: [i32; 4] },
}

impl Default for UniformValue {
    fn default() -> UniformValue {
        UniformValue::Typeless
    }
}

impl UniformValue {
    /// Build a value from the first `dims` elements of `values`.
    pub fn float(values: &[f32]) -> UniformValue {
        let mut padded = [0.0; 4];
        let dims = values.len().min(4);
        padded[..dims].copy_from_slice(&values[..dims]);
        UniformValue::Float { dims: dims as u8, values: padded }
    }

    pub fn int(values: &[i32]) -> UniformValue {
        let mut padded = [0; 4];
        let dims = values.len().min(4);
        padded[..dims].copy_from_slice(&values[..dims]);
        UniformValue::Int { dims: dims as u8, values: padded }
    }

    /// Set this value at `location` in the program currently in use on `driver`.
    pub fn apply(&self, driver: &dyn Driver, location: GLint) {
        match *self {
            UniformValue::Typeless => (),
            UniformValue::Float { dims, ref values } => match dims {
                1 => driver.uniform_1fv(location, &values[..1]),
                2 => driver.uniform_2fv(location, &values[..2]),
                3 => driver.uniform_3fv(location, &values[..3]),
                _ => driver.uniform_4fv(location, &values[..]),
            },
            UniformValue::Int { dims, ref values } => match dims {
                1 => driver.uniform_1iv(location, &values[..1]),
                2 => driver.uniform_2iv(location, &values[..2]),
                3 => driver.uniform_3iv(location, &values[..3]),
                _ => driver.uniform_4iv(location, &values[..]),
            },
        }
    }
}

impl Serialize for UniformValue {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        match self {
            UniformValue::Typeless => 0_u8.serialize(stream),
            UniformValue::Float { dims, values } => {
                1_u8.serialize(stream)?;
                dims.serialize(stream)?;
                values.serialize(stream)
            }
            UniformValue::Int { dims, values } => {
                2_u8.serialize(stream)?;
                dims.serialize(stream)?;
                values.serialize(stream)
            }
        }
    }
}

impl Deserialize for UniformValue {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<UniformValue> {
        match u8::deserialize(stream)? {
            0 => Ok(UniformValue::Typeless),
            1 => Ok(UniformValue::Float {
                dims: Deserialize::deserialize(stream)?,
                values: Deserialize::deserialize(stream)?,
            }),
            2 => Ok(UniformValue::Int {
                dims: Deserialize::deserialize(stream)?,
                values: Deserialize::deserialize(stream)?,
            }),
            tag => Err(Error::corruption(format!("invalid uniform value tag {}", tag))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub link_status: BuildStatus,
    pub attached_shaders: Vec<GLuint>,
    /// Indexed by uniform location.
    pub uniforms: Vec<UniformValue>,
    /// Attribute bindings in effect as of the last successful link.
    pub attrib_binds: BTreeMap<String, GLuint>,
    /// Attribute bindings made since then.
    pub pending_attrib_binds: BTreeMap<String, GLuint>,
    /// Every uniform name the application asked about, and the location it got.
    pub uniform_locations: BTreeMap<String, GLint>,
    /// Deleted while current; it goes away once it isn't.
    pub marked_for_delete: bool,
}

impl Program {
    /// Make a program with room for `uniform_slots` uniform locations.
    pub fn new(uniform_slots: usize) -> Program {
        Program {
            link_status: BuildStatus::Unbuilt,
            attached_shaders: vec![],
            uniforms: vec![UniformValue::Typeless; uniform_slots],
            attrib_binds: BTreeMap::new(),
            pending_attrib_binds: BTreeMap::new(),
            uniform_locations: BTreeMap::new(),
            marked_for_delete: false,
        }
    }

    pub fn attach_shader(&mut self, shader: GLuint) {
        self.attached_shaders.push(shader);
    }

    /// Return true if `shader` was attached.
    pub fn detach_shader(&mut self, shader: GLuint) -> bool {
        match self.attached_shaders.iter().position(|&s| s == shader) {
            Some(index) => {
                self.attached_shaders.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn bind_attrib_location(&mut self, index: GLuint, name: &str) {
        self.pending_attrib_binds.insert(name.to_string(), index);
    }

    pub fn link_program(&mut self, linked: bool) {
        self.link_status = BuildStatus::from_bool(linked);
        if linked {
            let pending = std::mem::take(&mut self.pending_attrib_binds);
            self.attrib_binds.extend(pending);
        }
    }

    pub fn get_uniform_location(&mut self, name: &str, location: GLint) {
        self.uniform_locations.insert(name.to_string(), location);
    }

    /// Store `value` at `location`. Locations we have no room for are dropped.
    pub fn set_uniform(&mut self, location: GLint, value: UniformValue) {
        if location < 0 {
            return;
        }
        if let Some(slot) = self.uniforms.get_mut(location as usize) {
            *slot = value;
        }
    }

    /// Create and link a program like this one on `driver`.
    ///
    /// Return its name, and a table mapping the uniform locations the
    /// application used to the new program's locations. This leaves the new
    /// program in use.
    ///
    /// Only locations the application looked up by name are mapped. A value
    /// set at `location + i` through an array upload is restored only if the
    /// application also asked for `name[i]`; otherwise it goes to location -1.
    pub fn create(&self, driver: &dyn Driver, remap: &Remap) -> (GLuint, HashMap<GLint, GLint>) {
        let handle = driver.create_program();
        let mut locations = HashMap::new();
        if self.attached_shaders.is_empty() {
            return (handle, locations);
        }

        for &shader in &self.attached_shaders {
            driver.attach_shader(handle, remap.shaders.get(shader));
        }
        for (name, &index) in &self.attrib_binds {
            driver.bind_attrib_location(handle, index, name);
        }
        driver.link_program(handle);

        // These take effect at the next link, as they would have originally.
        for (name, &index) in &self.pending_attrib_binds {
            driver.bind_attrib_location(handle, index, name);
        }

        for (name, &location) in &self.uniform_locations {
            locations.insert(location, driver.get_uniform_location(handle, name));
        }

        driver.use_program(handle);
        for (location, value) in self.uniforms.iter().enumerate() {
            if *value == UniformValue::Typeless {
                continue;
            }
            let replay_location = locations.get(&(location as GLint)).cloned().unwrap_or(-1);
            value.apply(driver, replay_location);
        }

        (handle, locations)
    }
}

impl Serialize for Program {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.link_status.serialize(stream)?;
        self.attached_shaders.serialize(stream)?;
        self.uniforms.serialize(stream)?;
        self.attrib_binds.serialize(stream)?;
        self.pending_attrib_binds.serialize(stream)?;
        self.uniform_locations.serialize(stream)?;
        self.marked_for_delete.serialize(stream)
    }
}

impl Deserialize for Program {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Program> {
        Ok(Program {
            link_status: Deserialize::deserialize(stream)?,
            attached_shaders: Deserialize::deserialize(stream)?,
            uniforms: Deserialize::deserialize(stream)?,
            attrib_binds: Deserialize::deserialize(stream)?,
            pending_attrib_binds: Deserialize::deserialize(stream)?,
            uniform_locations: Deserialize::deserialize(stream)?,
            marked_for_delete: Deserialize::deserialize(stream)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::driver::mock::MockDriver;

    #[test]
    fn test_uniform_storage() {
        let mut program = Program::new(4);
        program.set_uniform(1, UniformValue::float(&[1.0, 2.0]));
        program.set_uniform(3, UniformValue::int(&[7]));
        program.set_uniform(4, UniformValue::int(&[8]));
        program.set_uniform(-1, UniformValue::int(&[9]));

        assert_eq!(program.uniforms, vec![
            UniformValue::Typeless,
            UniformValue::Float { dims: 2, values: [1.0, 2.0, 0.0, 0.0] },
            UniformValue::Typeless,
            UniformValue::Int { dims: 1, values: [7, 0, 0, 0] },
        ]);

        let bytes = codec::to_bytes(&program).unwrap();
        assert_eq!(codec::from_bytes::<Program>(&bytes).unwrap(), program);
    }

    #[test]
    fn test_pending_binds() {
        let mut program = Program::new(0);
        program.bind_attrib_location(0, "position");
        program.link_program(false);
        assert!(program.attrib_binds.is_empty());
        assert_eq!(program.link_status, BuildStatus::Failure);

        program.link_program(true);
        assert_eq!(program.attrib_binds.get("position"), Some(&0));
        assert!(program.pending_attrib_binds.is_empty());

        program.bind_attrib_location(1, "color");
        assert!(!program.detach_shader(5));
        assert_eq!(program.pending_attrib_binds.len(), 1);
    }

    #[test]
    fn test_create_remaps_uniforms() {
        let mut program = Program::new(8);
        program.attach_shader(1);
        program.attach_shader(2);
        program.link_program(true);
        program.get_uniform_location("tint", 5);
        program.get_uniform_location("scale", 6);
        program.set_uniform(5, UniformValue::float(&[0.5, 0.5, 0.5, 1.0]));
        program.set_uniform(6, UniformValue::float(&[2.0]));

        let mut remap = Remap::default();
        remap.shaders.insert(1, 11);
        remap.shaders.insert(2, 12);

        let driver = MockDriver::new();
        // The mock hands out program names starting at 101.
        driver.set_uniform_location(101, "tint", 0);
        let (handle, locations) = program.create(&driver, &remap);
        assert_eq!(handle, 101);
        assert_eq!(locations.get(&5), Some(&0));
        assert_eq!(locations.get(&6), Some(&-1));

        assert!(driver.called("attach_shader(101, 11)"));
        assert!(driver.called("attach_shader(101, 12)"));
        assert!(driver.called("uniform_4fv(0, [0.5, 0.5, 0.5, 1.0])"));
        assert!(driver.called("uniform_1fv(-1, [2.0])"));
        let link = driver.position("link_program(101)").unwrap();
        let uniform = driver.position("uniform_4fv(").unwrap();
        assert!(link < uniform);
    }

    #[test]
    fn test_create_array_elements_need_names() {
        let mut program = Program::new(8);
        program.attach_shader(1);
        program.link_program(true);
        program.get_uniform_location("weights", 3);
        // glUniform1fv(3, 2, ...) fills locations 3 and 4.
        program.set_uniform(3, UniformValue::float(&[1.0]));
        program.set_uniform(4, UniformValue::float(&[2.0]));

        let driver = MockDriver::new();
        driver.set_uniform_location(101, "weights", 10);
        let (_, locations) = program.create(&driver, &Remap::default());
        assert_eq!(locations.len(), 1);
        assert!(driver.called("uniform_1fv(10, [1.0])"));
        assert!(driver.called("uniform_1fv(-1, [2.0])"));
    }
}
