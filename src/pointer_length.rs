//! Working out how many bytes a pointer argument points to.
//!
//! Many GL entry points take a bare pointer and leave its length implied by
//! other arguments, or by state: a texture upload's size depends on the
//! format, the type, and the current unpack parameters, and if a pixel
//! unpack buffer is bound, the "pointer" isn't a pointer at all. Before a
//! call's `Payload` can be copied, we look its opcode up here.

use gleam::gl::{self, GLdouble, GLenum, GLfloat, GLint, GLuint};
use std::collections::HashMap;
use std::mem::size_of;

use crate::command::{Command, Opcode};
use crate::context::ContextState;
use crate::coverage::Coverage;
use crate::pixels::{self, ImageShape};

pub type LengthFn = fn(&Command, &ContextState, &mut Coverage) -> usize;

/// The length functions, by opcode.
pub struct PointerLengths {
    table: HashMap<Opcode, LengthFn>,
}

impl Default for PointerLengths {
    fn default() -> PointerLengths {
        PointerLengths::new()
    }
}

impl PointerLengths {
    pub fn new() -> PointerLengths {
        use Opcode::*;

        let mut table: HashMap<Opcode, LengthFn> = HashMap::new();
        for &opcode in &[tex_image_2d, tex_image_3d, tex_sub_image_2d, tex_sub_image_3d] {
            table.insert(opcode, texture_upload);
        }
        table.insert(compressed_tex_image_2d, compressed_texture_upload);
        for &opcode in &[buffer_data, buffer_sub_data] {
            table.insert(opcode, buffer_upload);
        }
        for &opcode in &[delete_buffers, delete_framebuffers, delete_programs_arb,
                         delete_renderbuffers, delete_samplers, delete_textures, draw_buffers] {
            table.insert(opcode, name_array);
        }
        for &opcode in &[uniform_1fv, uniform_2fv, uniform_3fv, uniform_4fv,
                         uniform_1iv, uniform_2iv, uniform_3iv, uniform_4iv] {
            table.insert(opcode, uniform_array);
        }
        for &opcode in &[tex_parameter_fv, tex_parameter_iv, sampler_parameter_fv] {
            table.insert(opcode, parameter_vector);
        }
        for &opcode in &[bind_attrib_location, get_uniform_location] {
            table.insert(opcode, c_string);
        }
        table.insert(clip_plane, |_, _, _| 4 * size_of::<GLdouble>());
        table.insert(program_string_arb, program_string);
        table.insert(draw_elements, element_indices);
        table.insert(vertex_attrib_pointer, vertex_array);

        PointerLengths { table }
    }

    /// The number of bytes `command`'s pointer argument refers to.
    pub fn length(&self, command: &Command, state: &ContextState, coverage: &mut Coverage) -> usize {
        let opcode = command.opcode();
        match self.table.get(&opcode) {
            Some(length) => length(command, state, coverage),
            None => {
                coverage.unimplemented(&format!("pointer length for {}", opcode.name()));
                0
            }
        }
    }
}

fn non_negative(n: impl Into<i64>) -> usize {
    n.into().max(0) as usize
}

fn texture_upload(command: &Command, state: &ContextState, coverage: &mut Coverage) -> usize {
    if state.bound_buffer(gl::PIXEL_UNPACK_BUFFER) != 0 {
        return 0;
    }
    let shape = match *command {
        Command::tex_image_2d { width, height, format, pixel_type, .. }
        | Command::tex_sub_image_2d { width, height, format, pixel_type, .. } => {
            ImageShape { width, height, depth: 1, format, pixel_type }
        }
        Command::tex_image_3d { width, height, depth, format, pixel_type, .. }
        | Command::tex_sub_image_3d { width, height, depth, format, pixel_type, .. } => {
            ImageShape { width, height, depth, format, pixel_type }
        }
        _ => return 0,
    };
    pixels::image_size(&shape, &state.pixel_store, coverage)
}

fn compressed_texture_upload(command: &Command, state: &ContextState, _: &mut Coverage) -> usize {
    if state.bound_buffer(gl::PIXEL_UNPACK_BUFFER) != 0 {
        return 0;
    }
    match *command {
        Command::compressed_tex_image_2d { image_size, .. } => non_negative(image_size),
        _ => 0,
    }
}

/// `glBufferData` and `glBufferSubData` say how many bytes they read.
fn buffer_upload(command: &Command, _: &ContextState, _: &mut Coverage) -> usize {
    match *command {
        Command::buffer_data { size, .. } | Command::buffer_sub_data { size, .. } => {
            size.max(0) as usize
        }
        _ => 0,
    }
}

fn name_array(command: &Command, _: &ContextState, _: &mut Coverage) -> usize {
    use Command::*;
    match *command {
        delete_buffers { n, .. }
        | delete_framebuffers { n, .. }
        | delete_programs_arb { n, .. }
        | delete_renderbuffers { n, .. }
        | delete_samplers { n, .. }
        | delete_textures { n, .. } => non_negative(n) * size_of::<GLuint>(),
        draw_buffers { n, .. } => non_negative(n) * size_of::<GLenum>(),
        _ => 0,
    }
}

fn uniform_array(command: &Command, _: &ContextState, _: &mut Coverage) -> usize {
    use Command::*;
    let (count, dims, elt_size) = match *command {
        uniform_1fv { count, .. } => (count, 1, size_of::<GLfloat>()),
        uniform_2fv { count, .. } => (count, 2, size_of::<GLfloat>()),
        uniform_3fv { count, .. } => (count, 3, size_of::<GLfloat>()),
        uniform_4fv { count, .. } => (count, 4, size_of::<GLfloat>()),
        uniform_1iv { count, .. } => (count, 1, size_of::<GLint>()),
        uniform_2iv { count, .. } => (count, 2, size_of::<GLint>()),
        uniform_3iv { count, .. } => (count, 3, size_of::<GLint>()),
        uniform_4iv { count, .. } => (count, 4, size_of::<GLint>()),
        _ => return 0,
    };
    non_negative(count) * dims * elt_size
}

/// `gl{Tex,Sampler}Parameter{f,i}v` read four values for the border color,
/// and one for everything else.
fn parameter_vector(command: &Command, _: &ContextState, _: &mut Coverage) -> usize {
    let pname = match *command {
        Command::tex_parameter_fv { pname, .. }
        | Command::tex_parameter_iv { pname, .. }
        | Command::sampler_parameter_fv { pname, .. } => pname,
        _ => return 0,
    };
    let count = if pname == gl::TEXTURE_BORDER_COLOR { 4 } else { 1 };
    // GLfloat and GLint are the same size.
    count * size_of::<GLfloat>()
}

/// Names are NUL-terminated; keep the terminator.
fn c_string(command: &Command, _: &ContextState, _: &mut Coverage) -> usize {
    match command {
        Command::bind_attrib_location { name, .. } | Command::get_uniform_location { name, .. } => {
            match name {
                crate::command::Payload::Client(ptr) if !ptr.is_null() => ptr.c_str_len() + 1,
                _ => 0,
            }
        }
        _ => 0,
    }
}

fn program_string(command: &Command, _: &ContextState, _: &mut Coverage) -> usize {
    match *command {
        Command::program_string_arb { len, .. } => non_negative(len),
        _ => 0,
    }
}

fn element_size(element_type: GLenum) -> usize {
    match element_type {
        gl::UNSIGNED_BYTE => 1,
        gl::UNSIGNED_SHORT => 2,
        gl::UNSIGNED_INT => 4,
        _ => 0,
    }
}

/// With an element array buffer bound, the indices pointer is an offset and
/// there is nothing to copy. Otherwise the count and type say how much to read.
fn element_indices(command: &Command, state: &ContextState, coverage: &mut Coverage) -> usize {
    if state.bound_buffer(gl::ELEMENT_ARRAY_BUFFER) != 0 {
        return 0;
    }
    match *command {
        Command::draw_elements { count, element_type, .. } => {
            let size = element_size(element_type);
            if size == 0 {
                coverage.unimplemented("glDrawElements index type");
            }
            non_negative(count) * size
        }
        _ => 0,
    }
}

/// We can't tell how far a client-side vertex array extends until a draw
/// call says how many vertices it uses, so we only handle buffer offsets.
fn vertex_array(_: &Command, state: &ContextState, coverage: &mut Coverage) -> usize {
    if state.bound_buffer(gl::ARRAY_BUFFER) == 0 {
        coverage.unimplemented("client-side vertex arrays");
    }
    0
}
