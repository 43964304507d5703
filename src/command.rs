//! Recorded GL calls, and the packets that carry them.
//!
//! A `Command` has one variant per entry point we record, named after the
//! corresponding `gleam::gl::Gl` method, with a field per argument. Where the
//! application passes a pointer whose length GL leaves implicit, the field is
//! a `Payload`: at capture time it starts out as the raw `ClientPtr`, and the
//! capture session replaces that with a copy of the bytes once the
//! pointer-length resolver has worked out how many there are.
//!
//! Calls that return something record what the driver returned: the names
//! `glGen*` handed out, whether a shader compiled, the location
//! `glGetUniformLocation` found. Replay needs these to translate the
//! application's names into its own.
//!
//! Two variants aren't GL calls. `message` carries a diagnostic from the
//! instrumented process to the host, and `sentinel` marks the end of a frame.

use gleam::gl::{GLbitfield, GLboolean, GLclampf, GLdouble, GLenum, GLfloat, GLint, GLintptr,
                GLsizei, GLsizeiptr, GLuint};
use std::io;

use crate::codec::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::raw::{self, ClientPtr, Simple};

/// A pointer argument's data.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// The application's pointer, not yet copied. This never leaves the
    /// capturing process.
    Client(ClientPtr),

    /// The pointer was really an offset into a buffer object, because one was
    /// bound to the relevant target.
    Offset(usize),

    /// A copy of the data.
    Bytes(Vec<u8>),

    /// The application passed a null pointer.
    Null,
}

impl Payload {
    /// Wrap a pointer the application passed to GL.
    ///
    /// Safety: as for `ClientPtr::new_unchecked`.
    pub unsafe fn client(ptr: *const std::os::raw::c_void) -> Payload {
        Payload::Client(ClientPtr::new_unchecked(ptr))
    }

    /// Replace a client pointer with a copy of the `len` bytes it points to.
    pub fn resolve(&mut self, len: usize) {
        if let Payload::Client(ptr) = *self {
            *self = if ptr.is_null() { Payload::Null } else { Payload::Bytes(ptr.copy(len)) };
        }
    }

    /// Treat a client pointer as an offset into a bound buffer object.
    pub fn resolve_as_offset(&mut self) {
        if let Payload::Client(ptr) = *self {
            *self = Payload::Offset(ptr.addr());
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn offset(&self) -> usize {
        match *self {
            Payload::Offset(offset) => offset,
            _ => 0,
        }
    }

    /// The payload as an array of `T`. Empty unless we have bytes.
    pub fn elements<T: Simple>(&self) -> Vec<T> {
        self.bytes().map(raw::from_bytes).unwrap_or_default()
    }

    /// The payload as a string, less any NUL terminator.
    pub fn string(&self) -> String {
        let bytes = self.bytes().unwrap_or(&[]);
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }
}

impl Serialize for Payload {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        match self {
            Payload::Client(_) => Err(Error::InvalidUsage("serializing an unresolved client pointer")),
            Payload::Null => 0_u8.serialize(stream),
            Payload::Offset(offset) => {
                1_u8.serialize(stream)?;
                offset.serialize(stream)
            }
            Payload::Bytes(bytes) => {
                2_u8.serialize(stream)?;
                bytes.serialize(stream)
            }
        }
    }
}

impl Deserialize for Payload {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Payload> {
        match u8::deserialize(stream)? {
            0 => Ok(Payload::Null),
            1 => Ok(Payload::Offset(Deserialize::deserialize(stream)?)),
            2 => Ok(Payload::Bytes(Deserialize::deserialize(stream)?)),
            tag => Err(Error::corruption(format!("invalid payload tag {}", tag))),
        }
    }
}

/// The severity of a `message` command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Level {
    Verbose,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Pass `text` on to the `log` facade at this level.
    pub fn log(self, text: &str) {
        match self {
            Level::Verbose => log::debug!("{}", text),
            Level::Info => log::info!("{}", text),
            Level::Warn => log::warn!("{}", text),
            Level::Error => log::error!("{}", text),
        }
    }
}

impl Serialize for Level {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        let n: u32 = match self {
            Level::Verbose => 0,
            Level::Info => 1,
            Level::Warn => 2,
            Level::Error => 3,
        };
        n.serialize(stream)
    }
}

impl Deserialize for Level {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Level> {
        match u32::deserialize(stream)? {
            0 => Ok(Level::Verbose),
            1 => Ok(Level::Info),
            2 => Ok(Level::Warn),
            3 => Ok(Level::Error),
            n => Err(Error::corruption(format!("invalid message level {}", n))),
        }
    }
}

/// Define `Command`, its fieldless twin `Opcode`, and their serialization.
macro_rules! commands {
    ( $( $name:ident { $( $field:ident : $type:ty ),* } = $code:literal, )* ) => {
        #[allow(non_camel_case_types)]
        #[derive(Clone, Debug, PartialEq)]
        pub enum Command {
            $( $name { $( $field : $type ),* }, )*
        }

        #[allow(non_camel_case_types)]
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Opcode {
            $( $name = $code, )*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            pub fn from_u32(n: u32) -> Option<Opcode> {
                match n {
                    $( $code => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( Opcode::$name => stringify!($name), )*
                }
            }
        }

        impl Command {
            pub fn opcode(&self) -> Opcode {
                match self {
                    $( Command::$name { .. } => Opcode::$name, )*
                }
            }

            /// Write this command's fields, not including its opcode.
            #[allow(unused_variables)]
            fn serialize_fields<W: io::Write>(&self, stream: &mut W) -> Result<()> {
                match self {
                    $(
                        Command::$name { $( $field ),* } => {
                            $( $field.serialize(stream)?; )*
                            Ok(())
                        }
                    )*
                }
            }

            /// Read the fields of a command whose opcode we've already read.
            #[allow(unused_variables)]
            fn deserialize_fields<R: io::Read>(opcode: Opcode, stream: &mut R) -> Result<Command> {
                match opcode {
                    $(
                        Opcode::$name => Ok(Command::$name {
                            $( $field: <$type as Deserialize>::deserialize(stream)? ),*
                        }),
                    )*
                }
            }
        }
    }
}

#[rustfmt::skip]
commands! {
    active_texture { texture: GLenum } = 1,
    attach_shader { program: GLuint, shader: GLuint } = 2,
    bind_attrib_location { program: GLuint, index: GLuint, name: Payload } = 3,
    bind_buffer { target: GLenum, buffer: GLuint } = 4,
    bind_framebuffer { target: GLenum, framebuffer: GLuint } = 5,
    bind_multi_texture_ext { texunit: GLenum, target: GLenum, texture: GLuint } = 6,
    bind_program_arb { target: GLenum, program: GLuint } = 7,
    bind_renderbuffer { target: GLenum, renderbuffer: GLuint } = 8,
    bind_sampler { unit: GLuint, sampler: GLuint } = 9,
    bind_texture { target: GLenum, texture: GLuint } = 10,
    blend_equation { mode: GLenum } = 11,
    blend_func { sfactor: GLenum, dfactor: GLenum } = 12,
    buffer_data { target: GLenum, size: GLsizeiptr, data: Payload, usage: GLenum } = 13,
    buffer_sub_data { target: GLenum, offset: GLintptr, size: GLsizeiptr, data: Payload } = 14,
    clear { mask: GLbitfield } = 15,
    clear_color { r: GLclampf, g: GLclampf, b: GLclampf, a: GLclampf } = 16,
    clear_depth { depth: GLdouble } = 17,
    clear_stencil { s: GLint } = 18,
    clip_plane { plane: GLenum, equation: Payload } = 19,
    color_mask { r: GLboolean, g: GLboolean, b: GLboolean, a: GLboolean } = 20,
    compile_shader { shader: GLuint, compiled: bool } = 21,
    compressed_tex_image_2d { target: GLenum, level: GLint, internal_format: GLenum, width: GLsizei, height: GLsizei, border: GLint, image_size: GLsizei, data: Payload } = 22,
    create_program { program: GLuint } = 23,
    create_shader { shader_type: GLenum, shader: GLuint } = 24,
    cull_face { mode: GLenum } = 25,
    delete_buffers { n: GLsizei, buffers: Payload } = 26,
    delete_framebuffers { n: GLsizei, framebuffers: Payload } = 27,
    delete_program { program: GLuint } = 28,
    delete_programs_arb { n: GLsizei, programs: Payload } = 29,
    delete_renderbuffers { n: GLsizei, renderbuffers: Payload } = 30,
    delete_samplers { n: GLsizei, samplers: Payload } = 31,
    delete_shader { shader: GLuint } = 32,
    delete_textures { n: GLsizei, textures: Payload } = 33,
    depth_func { func: GLenum } = 34,
    depth_mask { flag: GLboolean } = 35,
    detach_shader { program: GLuint, shader: GLuint } = 36,
    disable { cap: GLenum } = 37,
    disable_vertex_attrib_array { index: GLuint } = 38,
    draw_arrays { mode: GLenum, first: GLint, count: GLsizei } = 39,
    draw_buffer { buf: GLenum } = 40,
    draw_buffers { n: GLsizei, bufs: Payload } = 41,
    draw_elements { mode: GLenum, count: GLsizei, element_type: GLenum, indices: Payload } = 42,
    enable { cap: GLenum } = 43,
    enable_vertex_attrib_array { index: GLuint } = 44,
    finish { } = 45,
    flush { } = 46,
    flush_mapped_buffer_range { target: GLenum, offset: GLintptr, length: GLsizeiptr, contents: Vec<u8> } = 47,
    framebuffer_renderbuffer { target: GLenum, attachment: GLenum, renderbuffertarget: GLenum, renderbuffer: GLuint } = 48,
    framebuffer_texture_2d { target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: GLint } = 49,
    framebuffer_texture_layer { target: GLenum, attachment: GLenum, texture: GLuint, level: GLint, layer: GLint } = 50,
    front_face { mode: GLenum } = 51,
    gen_buffers { names: Vec<GLuint> } = 52,
    gen_framebuffers { names: Vec<GLuint> } = 53,
    gen_programs_arb { names: Vec<GLuint> } = 54,
    gen_renderbuffers { names: Vec<GLuint> } = 55,
    gen_samplers { names: Vec<GLuint> } = 56,
    gen_textures { names: Vec<GLuint> } = 57,
    get_uniform_location { program: GLuint, name: Payload, location: GLint } = 58,
    line_width { width: GLfloat } = 59,
    link_program { program: GLuint, linked: bool } = 60,
    map_buffer { target: GLenum, access: GLenum } = 61,
    map_buffer_range { target: GLenum, offset: GLintptr, length: GLsizeiptr, access: GLbitfield } = 62,
    pixel_store_f { pname: GLenum, param: GLfloat } = 63,
    pixel_store_i { pname: GLenum, param: GLint } = 64,
    pixel_transfer_f { pname: GLenum, param: GLfloat } = 65,
    pixel_transfer_i { pname: GLenum, param: GLint } = 66,
    program_string_arb { target: GLenum, format: GLenum, len: GLsizei, string: Payload } = 67,
    read_buffer { mode: GLenum } = 68,
    renderbuffer_storage { target: GLenum, internal_format: GLenum, width: GLsizei, height: GLsizei } = 69,
    renderbuffer_storage_multisample { target: GLenum, samples: GLsizei, internal_format: GLenum, width: GLsizei, height: GLsizei } = 70,
    sampler_parameter_f { sampler: GLuint, pname: GLenum, param: GLfloat } = 71,
    sampler_parameter_fv { sampler: GLuint, pname: GLenum, params: Payload } = 72,
    sampler_parameter_i { sampler: GLuint, pname: GLenum, param: GLint } = 73,
    scissor { x: GLint, y: GLint, width: GLsizei, height: GLsizei } = 74,
    shader_source { shader: GLuint, sources: Vec<String> } = 75,
    tex_image_2d { target: GLenum, level: GLint, internal_format: GLint, width: GLsizei, height: GLsizei, border: GLint, format: GLenum, pixel_type: GLenum, pixels: Payload } = 76,
    tex_image_3d { target: GLenum, level: GLint, internal_format: GLint, width: GLsizei, height: GLsizei, depth: GLsizei, border: GLint, format: GLenum, pixel_type: GLenum, pixels: Payload } = 77,
    tex_parameter_f { target: GLenum, pname: GLenum, param: GLfloat } = 78,
    tex_parameter_fv { target: GLenum, pname: GLenum, params: Payload } = 79,
    tex_parameter_i { target: GLenum, pname: GLenum, param: GLint } = 80,
    tex_parameter_iv { target: GLenum, pname: GLenum, params: Payload } = 81,
    tex_sub_image_2d { target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint, width: GLsizei, height: GLsizei, format: GLenum, pixel_type: GLenum, pixels: Payload } = 82,
    tex_sub_image_3d { target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint, zoffset: GLint, width: GLsizei, height: GLsizei, depth: GLsizei, format: GLenum, pixel_type: GLenum, pixels: Payload } = 83,
    uniform_1f { location: GLint, v0: GLfloat } = 84,
    uniform_2f { location: GLint, v0: GLfloat, v1: GLfloat } = 85,
    uniform_3f { location: GLint, v0: GLfloat, v1: GLfloat, v2: GLfloat } = 86,
    uniform_4f { location: GLint, v0: GLfloat, v1: GLfloat, v2: GLfloat, v3: GLfloat } = 87,
    uniform_1i { location: GLint, v0: GLint } = 88,
    uniform_2i { location: GLint, v0: GLint, v1: GLint } = 89,
    uniform_3i { location: GLint, v0: GLint, v1: GLint, v2: GLint } = 90,
    uniform_4i { location: GLint, v0: GLint, v1: GLint, v2: GLint, v3: GLint } = 91,
    uniform_1fv { location: GLint, count: GLsizei, value: Payload } = 92,
    uniform_2fv { location: GLint, count: GLsizei, value: Payload } = 93,
    uniform_3fv { location: GLint, count: GLsizei, value: Payload } = 94,
    uniform_4fv { location: GLint, count: GLsizei, value: Payload } = 95,
    uniform_1iv { location: GLint, count: GLsizei, value: Payload } = 96,
    uniform_2iv { location: GLint, count: GLsizei, value: Payload } = 97,
    uniform_3iv { location: GLint, count: GLsizei, value: Payload } = 98,
    uniform_4iv { location: GLint, count: GLsizei, value: Payload } = 99,
    unmap_buffer { target: GLenum, offset: usize, contents: Vec<u8> } = 100,
    use_program { program: GLuint } = 101,
    vertex_attrib_pointer { index: GLuint, size: GLint, attrib_type: GLenum, normalized: GLboolean, stride: GLsizei, pointer: Payload } = 102,
    viewport { x: GLint, y: GLint, width: GLsizei, height: GLsizei } = 103,

    message { level: Level, text: String } = 1000,
    sentinel { } = 1001,
}

impl Command {
    /// The command's pointer argument, if it has one.
    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        use Command::*;
        match self {
            bind_attrib_location { name, .. } | get_uniform_location { name, .. } => Some(name),
            buffer_data { data, .. }
            | buffer_sub_data { data, .. }
            | compressed_tex_image_2d { data, .. } => Some(data),
            clip_plane { equation, .. } => Some(equation),
            delete_buffers { buffers: names, .. }
            | delete_framebuffers { framebuffers: names, .. }
            | delete_programs_arb { programs: names, .. }
            | delete_renderbuffers { renderbuffers: names, .. }
            | delete_samplers { samplers: names, .. }
            | delete_textures { textures: names, .. } => Some(names),
            draw_buffers { bufs, .. } => Some(bufs),
            draw_elements { indices, .. } => Some(indices),
            program_string_arb { string, .. } => Some(string),
            sampler_parameter_fv { params, .. }
            | tex_parameter_fv { params, .. }
            | tex_parameter_iv { params, .. } => Some(params),
            tex_image_2d { pixels, .. }
            | tex_image_3d { pixels, .. }
            | tex_sub_image_2d { pixels, .. }
            | tex_sub_image_3d { pixels, .. } => Some(pixels),
            uniform_1fv { value, .. } | uniform_2fv { value, .. }
            | uniform_3fv { value, .. } | uniform_4fv { value, .. }
            | uniform_1iv { value, .. } | uniform_2iv { value, .. }
            | uniform_3iv { value, .. } | uniform_4iv { value, .. } => Some(value),
            vertex_attrib_pointer { pointer, .. } => Some(pointer),
            _ => None,
        }
    }

    /// If this command's pointer argument is an offset whenever a buffer is
    /// bound to some target, return that target.
    pub fn offset_target(&self) -> Option<GLenum> {
        use Command::*;
        match self {
            tex_image_2d { .. }
            | tex_image_3d { .. }
            | tex_sub_image_2d { .. }
            | tex_sub_image_3d { .. }
            | compressed_tex_image_2d { .. } => Some(gleam::gl::PIXEL_UNPACK_BUFFER),
            vertex_attrib_pointer { .. } => Some(gleam::gl::ARRAY_BUFFER),
            draw_elements { .. } => Some(gleam::gl::ELEMENT_ARRAY_BUFFER),
            _ => None,
        }
    }
}

/// A command, as sent over the channel or stored in a trace.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub id: u64,
    pub command: Command,
}

impl Serialize for Packet {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        (self.command.opcode() as u32).serialize(stream)?;
        self.id.serialize(stream)?;
        self.command.serialize_fields(stream)
    }
}

impl Deserialize for Packet {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Packet> {
        let code = u32::deserialize(stream)?;
        let opcode = Opcode::from_u32(code)
            .ok_or_else(|| Error::corruption(format!("unknown opcode {}", code)))?;
        let id = u64::deserialize(stream)?;
        let command = Command::deserialize_fields(opcode, stream)?;
        Ok(Packet { id, command })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use gleam::gl;

    #[test]
    fn test_opcodes() {
        for &opcode in Opcode::ALL {
            assert_eq!(Opcode::from_u32(opcode as u32), Some(opcode));
        }
        assert_eq!(Opcode::from_u32(0), None);
        assert_eq!(Opcode::tex_image_2d.name(), "tex_image_2d");
        assert_eq!(Command::sentinel {}.opcode(), Opcode::sentinel);
    }

    #[test]
    fn test_packets() {
        let packets = vec![
            Packet { id: 5, command: Command::bind_texture { target: gl::TEXTURE_2D, texture: 3 } },
            Packet {
                id: 6,
                command: Command::tex_image_2d {
                    target: gl::TEXTURE_2D, level: 0, internal_format: gl::RGBA as GLint,
                    width: 1, height: 1, border: 0, format: gl::RGBA,
                    pixel_type: gl::UNSIGNED_BYTE, pixels: Payload::Bytes(vec![1, 2, 3, 4]),
                },
            },
            Packet {
                id: 7,
                command: Command::vertex_attrib_pointer {
                    index: 0, size: 3, attrib_type: gl::FLOAT, normalized: 0, stride: 12,
                    pointer: Payload::Offset(24),
                },
            },
            Packet { id: 8, command: Command::shader_source { shader: 1, sources: vec!["x".into()] } },
            Packet { id: 9, command: Command::message { level: Level::Warn, text: "hi".into() } },
            Packet { id: 10, command: Command::sentinel {} },
        ];
        let bytes = codec::to_bytes(&packets).unwrap();
        assert_eq!(codec::from_bytes::<Vec<Packet>>(&bytes).unwrap(), packets);
    }

    #[test]
    fn test_unresolved_pointer() {
        let data = [0_u8; 4];
        let mut command = Command::buffer_data {
            target: gl::ARRAY_BUFFER,
            size: 4,
            data: unsafe { Payload::client(data.as_ptr() as *const _) },
            usage: gl::STATIC_DRAW,
        };
        let packet = Packet { id: 1, command: command.clone() };
        assert!(matches!(codec::to_bytes(&packet), Err(Error::InvalidUsage(_))));

        command.payload_mut().unwrap().resolve(4);
        assert_eq!(command.payload_mut().unwrap().bytes(), Some(&[0_u8; 4][..]));
    }

    #[test]
    fn test_bad_opcode() {
        let mut bytes = vec![];
        9999_u32.serialize(&mut bytes).unwrap();
        1_u64.serialize(&mut bytes).unwrap();
        assert!(matches!(codec::from_bytes::<Packet>(&bytes), Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_payload_decoding() {
        let names = Payload::Bytes(raw::slice_as_bytes(&[3_u32, 4]).to_vec());
        assert_eq!(names.elements::<GLuint>(), vec![3, 4]);
        assert_eq!(Payload::Null.elements::<GLuint>(), Vec::<GLuint>::new());
        assert_eq!(Payload::Bytes(b"tint\0".to_vec()).string(), "tint");
        assert_eq!(Payload::Offset(16).offset(), 16);
    }
}
