//! GL enumerants that `gleam::gl` doesn't define.
//!
//! gleam's bindings cover OpenGL 3.3 compatibility and GLES 3.0. Applications
//! we capture also use a few extensions and newer entry points, so their
//! values live here.

use gleam::gl::GLenum;

pub const ATOMIC_COUNTER_BUFFER: GLenum = 0x92C0;
pub const DRAW_INDIRECT_BUFFER: GLenum = 0x8F3F;
pub const MIN_MAP_BUFFER_ALIGNMENT: GLenum = 0x90BC;

// GL_ARB_vertex_program / GL_ARB_fragment_program
pub const VERTEX_PROGRAM_ARB: GLenum = 0x8620;
pub const FRAGMENT_PROGRAM_ARB: GLenum = 0x8804;
pub const PROGRAM_FORMAT_ASCII_ARB: GLenum = 0x8875;

// GL_EXT_texture_sRGB_decode
pub const TEXTURE_SRGB_DECODE_EXT: GLenum = 0x8A48;
pub const DECODE_EXT: GLenum = 0x8A49;

pub const TEXTURE_MAX_ANISOTROPY_EXT: GLenum = 0x84FE;
