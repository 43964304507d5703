//! Applying recorded commands to a `ContextState`.
//!
//! Capture runs every call the application makes through here after the
//! driver has handled it, once its payload has been copied. The table is
//! keyed by opcode; commands with no entry, like draws and clears, don't
//! change any state we track.
//!
//! Mapping, unmapping, and flushing buffers aren't here: those need the
//! driver's pointers, so the capture session handles them itself.

use gleam::gl::{self, GLenum};
use std::collections::HashMap;

use crate::command::{Command, Opcode, Payload};
use crate::context::ContextState;
use crate::coverage::Coverage;
use crate::pixels::{self, ImageShape};

pub type Mutator = fn(&mut ContextState, &Command, &mut Coverage);

/// Add an entry to a mutator table. The body runs with the command's named
/// fields bound by reference.
macro_rules! mutator {
    ( $table:ident, $name:ident { $( $field:ident ),* } => | $state:ident, $coverage:pat | $body:expr ) => {
        $table.insert(Opcode::$name, |$state: &mut ContextState, command: &Command,
                                      $coverage: &mut Coverage| {
            if let Command::$name { $( $field, )* .. } = command {
                $body;
            }
        });
    }
}

pub struct StateMutators {
    table: HashMap<Opcode, Mutator>,
}

impl Default for StateMutators {
    fn default() -> StateMutators {
        StateMutators::new()
    }
}

impl StateMutators {
    #[rustfmt::skip]
    pub fn new() -> StateMutators {
        let mut table: HashMap<Opcode, Mutator> = HashMap::new();

        // Textures.
        mutator!(table, active_texture { texture } => |s, _| s.active_texture(*texture));
        mutator!(table, gen_textures { names } => |s, _| s.gen_textures(names));
        mutator!(table, bind_texture { target, texture } => |s, _| s.bind_texture(*target, *texture));
        mutator!(table, bind_multi_texture_ext { texunit, target, texture } =>
                 |s, _| s.bind_multi_texture_ext(*texunit, *target, *texture));
        mutator!(table, delete_textures { textures } =>
                 |s, _| s.delete_textures(&textures.elements()));
        mutator!(table, tex_image_2d { target, level, internal_format, width, height, border,
                                       format, pixel_type, pixels } => |s, c| {
            let shape = ImageShape { width: *width, height: *height, depth: 1,
                                     format: *format, pixel_type: *pixel_type };
            let data = unpack_pixels(s, pixels, Some(&shape), c);
            s.tex_image_2d(*target, *level, *internal_format, *width, *height, *border,
                           *format, *pixel_type, data.as_deref())
        });
        mutator!(table, tex_image_3d { target, level, internal_format, width, height, depth,
                                       border, format, pixel_type, pixels } => |s, c| {
            let shape = ImageShape { width: *width, height: *height, depth: *depth,
                                     format: *format, pixel_type: *pixel_type };
            let data = unpack_pixels(s, pixels, Some(&shape), c);
            s.tex_image_3d(*target, *level, *internal_format, *width, *height, *depth, *border,
                           *format, *pixel_type, data.as_deref())
        });
        mutator!(table, tex_sub_image_2d { target, level, xoffset, yoffset, width, height,
                                           format, pixel_type, pixels } => |s, c| {
            let shape = ImageShape { width: *width, height: *height, depth: 1,
                                     format: *format, pixel_type: *pixel_type };
            let data = unpack_pixels(s, pixels, Some(&shape), c);
            s.tex_sub_image_2d(*target, *level, *xoffset, *yoffset, *width, *height,
                               *format, *pixel_type, data.as_deref())
        });
        mutator!(table, tex_sub_image_3d { target, level, xoffset, yoffset, zoffset,
                                           width, height, depth, format, pixel_type,
                                           pixels } => |s, c| {
            let shape = ImageShape { width: *width, height: *height, depth: *depth,
                                     format: *format, pixel_type: *pixel_type };
            let data = unpack_pixels(s, pixels, Some(&shape), c);
            s.tex_sub_image_3d(*target, *level, *xoffset, *yoffset, *zoffset,
                               *width, *height, *depth, *format, *pixel_type, data.as_deref())
        });
        mutator!(table, compressed_tex_image_2d { target, level, internal_format, width, height,
                                                  border, image_size, data } => |s, c| {
            let data = match data {
                Payload::Offset(_) => unpack_bytes(s, data, (*image_size).max(0) as usize, c),
                _ => unpack_pixels(s, data, None, c),
            };
            s.compressed_tex_image_2d(*target, *level, *internal_format, *width, *height,
                                      *border, data.as_deref())
        });
        mutator!(table, tex_parameter_i { target, pname, param } =>
                 |s, _| s.tex_parameter_i(*target, *pname, *param));
        mutator!(table, tex_parameter_f { target, pname, param } =>
                 |s, _| s.tex_parameter_f(*target, *pname, *param));
        mutator!(table, tex_parameter_fv { target, pname, params } =>
                 |s, _| s.tex_parameter_fv(*target, *pname, &params.elements()));
        mutator!(table, tex_parameter_iv { target, pname, params } =>
                 |s, _| s.tex_parameter_iv(*target, *pname, &params.elements()));
        mutator!(table, pixel_store_i { pname, param } => |s, _| s.pixel_store_i(*pname, *param));
        mutator!(table, pixel_store_f { pname, param } => |s, _| s.pixel_store_f(*pname, *param));
        mutator!(table, pixel_transfer_i { pname, param } => |s, _| s.pixel_transfer_i(*pname, *param));
        mutator!(table, pixel_transfer_f { pname, param } => |s, _| s.pixel_transfer_f(*pname, *param));

        // Buffers.
        mutator!(table, gen_buffers { names } => |s, _| s.gen_buffers(names));
        mutator!(table, bind_buffer { target, buffer } => |s, _| s.bind_buffer(*target, *buffer));
        mutator!(table, delete_buffers { buffers } => |s, _| s.delete_buffers(&buffers.elements()));
        mutator!(table, buffer_data { target, size, data, usage } =>
                 |s, _| s.buffer_data(*target, *size, data.bytes(), *usage));
        mutator!(table, buffer_sub_data { target, offset, data } =>
                 |s, _| s.buffer_sub_data(*target, *offset, data.bytes().unwrap_or(&[])));

        // Shaders and programs.
        mutator!(table, create_shader { shader_type, shader } =>
                 |s, _| s.create_shader(*shader_type, *shader));
        mutator!(table, shader_source { shader, sources } => |s, _| s.shader_source(*shader, sources));
        mutator!(table, compile_shader { shader, compiled } =>
                 |s, _| s.compile_shader(*shader, *compiled));
        mutator!(table, delete_shader { shader } => |s, _| s.delete_shader(*shader));
        mutator!(table, create_program { program } => |s, _| s.create_program(*program));
        mutator!(table, attach_shader { program, shader } => |s, _| s.attach_shader(*program, *shader));
        mutator!(table, detach_shader { program, shader } => |s, _| s.detach_shader(*program, *shader));
        mutator!(table, link_program { program, linked } => |s, _| s.link_program(*program, *linked));
        mutator!(table, bind_attrib_location { program, index, name } =>
                 |s, _| s.bind_attrib_location(*program, *index, &name.string()));
        mutator!(table, get_uniform_location { program, name, location } =>
                 |s, c| s.get_uniform_location(*program, &name.string(), *location, c));
        mutator!(table, use_program { program } => |s, _| s.use_program(*program));
        mutator!(table, delete_program { program } => |s, _| s.delete_program(*program));

        // Uniforms.
        mutator!(table, uniform_1f { location, v0 } => |s, _| s.uniform_f(*location, 1, &[*v0]));
        mutator!(table, uniform_2f { location, v0, v1 } =>
                 |s, _| s.uniform_f(*location, 2, &[*v0, *v1]));
        mutator!(table, uniform_3f { location, v0, v1, v2 } =>
                 |s, _| s.uniform_f(*location, 3, &[*v0, *v1, *v2]));
        mutator!(table, uniform_4f { location, v0, v1, v2, v3 } =>
                 |s, _| s.uniform_f(*location, 4, &[*v0, *v1, *v2, *v3]));
        mutator!(table, uniform_1i { location, v0 } => |s, _| s.uniform_i(*location, 1, &[*v0]));
        mutator!(table, uniform_2i { location, v0, v1 } =>
                 |s, _| s.uniform_i(*location, 2, &[*v0, *v1]));
        mutator!(table, uniform_3i { location, v0, v1, v2 } =>
                 |s, _| s.uniform_i(*location, 3, &[*v0, *v1, *v2]));
        mutator!(table, uniform_4i { location, v0, v1, v2, v3 } =>
                 |s, _| s.uniform_i(*location, 4, &[*v0, *v1, *v2, *v3]));
        mutator!(table, uniform_1fv { location, value } =>
                 |s, _| s.uniform_f(*location, 1, &value.elements()));
        mutator!(table, uniform_2fv { location, value } =>
                 |s, _| s.uniform_f(*location, 2, &value.elements()));
        mutator!(table, uniform_3fv { location, value } =>
                 |s, _| s.uniform_f(*location, 3, &value.elements()));
        mutator!(table, uniform_4fv { location, value } =>
                 |s, _| s.uniform_f(*location, 4, &value.elements()));
        mutator!(table, uniform_1iv { location, value } =>
                 |s, _| s.uniform_i(*location, 1, &value.elements()));
        mutator!(table, uniform_2iv { location, value } =>
                 |s, _| s.uniform_i(*location, 2, &value.elements()));
        mutator!(table, uniform_3iv { location, value } =>
                 |s, _| s.uniform_i(*location, 3, &value.elements()));
        mutator!(table, uniform_4iv { location, value } =>
                 |s, _| s.uniform_i(*location, 4, &value.elements()));

        // ARB assembly programs.
        mutator!(table, gen_programs_arb { names } => |s, _| s.gen_programs_arb(names));
        mutator!(table, bind_program_arb { target, program } =>
                 |s, _| s.bind_program_arb(*target, *program));
        mutator!(table, program_string_arb { target, format, string } =>
                 |s, c| s.program_string_arb(*target, *format, string.bytes().unwrap_or(&[]), c));
        mutator!(table, delete_programs_arb { programs } =>
                 |s, _| s.delete_programs_arb(&programs.elements()));

        // Capabilities.
        mutator!(table, enable { cap } => |s, _| s.enable(*cap));
        mutator!(table, disable { cap } => |s, _| s.disable(*cap));
        mutator!(table, enable_vertex_attrib_array { index } =>
                 |s, _| s.enable_vertex_attrib_array(*index));
        mutator!(table, disable_vertex_attrib_array { index } =>
                 |s, _| s.disable_vertex_attrib_array(*index));
        mutator!(table, clip_plane { plane, equation } => |s, _| {
            let values = equation.elements::<f64>();
            if let [a, b, c, d] = values[..] {
                s.clip_plane(*plane, [a, b, c, d]);
            }
        });

        // Framebuffers and renderbuffers.
        mutator!(table, gen_framebuffers { names } => |s, _| s.gen_framebuffers(names));
        mutator!(table, bind_framebuffer { target, framebuffer } =>
                 |s, _| s.bind_framebuffer(*target, *framebuffer));
        mutator!(table, delete_framebuffers { framebuffers } =>
                 |s, _| s.delete_framebuffers(&framebuffers.elements()));
        mutator!(table, framebuffer_renderbuffer { target, attachment, renderbuffertarget,
                                                   renderbuffer } =>
                 |s, _| s.framebuffer_renderbuffer(*target, *attachment, *renderbuffertarget,
                                                   *renderbuffer));
        mutator!(table, framebuffer_texture_2d { target, attachment, textarget, texture, level } =>
                 |s, _| s.framebuffer_texture_2d(*target, *attachment, *textarget, *texture, *level));
        mutator!(table, framebuffer_texture_layer { target, attachment, texture, level, layer } =>
                 |s, _| s.framebuffer_texture_layer(*target, *attachment, *texture, *level, *layer));
        mutator!(table, draw_buffer { buf } => |s, _| s.draw_buffer(*buf));
        mutator!(table, draw_buffers { bufs } => |s, _| s.draw_buffers(&bufs.elements::<GLenum>()));
        mutator!(table, read_buffer { mode } => |s, _| s.read_buffer(*mode));
        mutator!(table, gen_renderbuffers { names } => |s, _| s.gen_renderbuffers(names));
        mutator!(table, bind_renderbuffer { target, renderbuffer } =>
                 |s, _| s.bind_renderbuffer(*target, *renderbuffer));
        mutator!(table, delete_renderbuffers { renderbuffers } =>
                 |s, _| s.delete_renderbuffers(&renderbuffers.elements()));
        mutator!(table, renderbuffer_storage { target, internal_format, width, height } =>
                 |s, _| s.renderbuffer_storage(*target, *internal_format, *width, *height));
        mutator!(table, renderbuffer_storage_multisample { target, samples, internal_format,
                                                           width, height } =>
                 |s, _| s.renderbuffer_storage_multisample(*target, *samples, *internal_format,
                                                           *width, *height));

        // Samplers.
        mutator!(table, gen_samplers { names } => |s, _| s.gen_samplers(names));
        mutator!(table, bind_sampler { unit, sampler } => |s, _| s.bind_sampler(*unit, *sampler));
        mutator!(table, delete_samplers { samplers } =>
                 |s, _| s.delete_samplers(&samplers.elements()));
        mutator!(table, sampler_parameter_i { sampler, pname, param } =>
                 |s, _| s.sampler_parameter_i(*sampler, *pname, *param));
        mutator!(table, sampler_parameter_f { sampler, pname, param } =>
                 |s, _| s.sampler_parameter_f(*sampler, *pname, *param));
        mutator!(table, sampler_parameter_fv { sampler, pname, params } =>
                 |s, _| s.sampler_parameter_fv(*sampler, *pname, &params.elements()));

        StateMutators { table }
    }

    /// Bring `state` up to date with `command`. The command's payload must
    /// already have been resolved.
    pub fn apply(&self, state: &mut ContextState, command: &Command, coverage: &mut Coverage) {
        if let Some(mutate) = self.table.get(&command.opcode()) {
            mutate(state, command, coverage);
        }
    }

    /// True if `opcode` changes any state we track.
    pub fn mutates(&self, opcode: Opcode) -> bool {
        self.table.contains_key(&opcode)
    }
}

/// The pixels a texture upload supplies. If they come from a pixel unpack
/// buffer, take them from our copy of its contents.
fn unpack_pixels(state: &ContextState, payload: &Payload, shape: Option<&ImageShape>,
                 coverage: &mut Coverage) -> Option<Vec<u8>> {
    match (payload, shape) {
        (Payload::Bytes(bytes), _) => Some(bytes.clone()),
        (Payload::Offset(_), Some(shape)) => {
            let len = pixels::image_size(shape, &state.pixel_store, coverage);
            unpack_bytes(state, payload, len, coverage)
        }
        _ => None,
    }
}

fn unpack_bytes(state: &ContextState, payload: &Payload, len: usize,
                coverage: &mut Coverage) -> Option<Vec<u8>> {
    let handle = state.bound_buffer(gl::PIXEL_UNPACK_BUFFER);
    let buffer = state.buffers.get(&handle)?;
    let start = payload.offset();
    let contents = start.checked_add(len).and_then(|end| buffer.contents.get(start..end));
    if contents.is_none() {
        coverage.warn_once("texture upload reads past the end of the pixel unpack buffer");
    }
    contents.map(|c| c.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::UniformValue;
    use crate::raw;
    use gleam::gl::GLint;

    fn run(state: &mut ContextState, commands: Vec<Command>) {
        let mutators = StateMutators::new();
        let mut coverage = Coverage::new();
        for command in commands {
            mutators.apply(state, &command, &mut coverage);
        }
    }

    #[test]
    fn test_texture_commands() {
        let mut state = ContextState::default();
        run(&mut state, vec![
            Command::gen_textures { names: vec![1, 2] },
            Command::bind_texture { target: gl::TEXTURE_2D, texture: 1 },
            Command::tex_image_2d {
                target: gl::TEXTURE_2D, level: 0, internal_format: gl::RGBA as GLint,
                width: 1, height: 1, border: 0, format: gl::RGBA, pixel_type: gl::UNSIGNED_BYTE,
                pixels: Payload::Bytes(vec![9, 8, 7, 6]),
            },
            Command::tex_parameter_i {
                target: gl::TEXTURE_2D, pname: gl::TEXTURE_MIN_FILTER,
                param: gl::NEAREST as GLint,
            },
            Command::delete_textures {
                n: 1,
                textures: Payload::Bytes(raw::slice_as_bytes(&[2_u32]).to_vec()),
            },
        ]);

        assert_eq!(state.bound_texture(gl::TEXTURE_2D), 1);
        assert!(!state.textures.contains_key(&2));
        let texture = &state.textures[&1];
        assert_eq!(texture.updates.len(), 1);
        assert_eq!(texture.updates[0].pixels.as_deref(), Some(&[9, 8, 7, 6][..]));
    }

    #[test]
    fn test_upload_from_unpack_buffer() {
        let mut state = ContextState::default();
        run(&mut state, vec![
            Command::gen_buffers { names: vec![5] },
            Command::bind_buffer { target: gl::PIXEL_UNPACK_BUFFER, buffer: 5 },
            Command::buffer_data {
                target: gl::PIXEL_UNPACK_BUFFER, size: 8,
                data: Payload::Bytes(vec![0, 0, 0, 0, 1, 2, 3, 4]), usage: gl::STREAM_DRAW,
            },
            Command::gen_textures { names: vec![1] },
            Command::bind_texture { target: gl::TEXTURE_2D, texture: 1 },
            Command::tex_image_2d {
                target: gl::TEXTURE_2D, level: 0, internal_format: gl::RGBA as GLint,
                width: 1, height: 1, border: 0, format: gl::RGBA, pixel_type: gl::UNSIGNED_BYTE,
                pixels: Payload::Offset(4),
            },
        ]);
        assert_eq!(state.textures[&1].updates[0].pixels.as_deref(), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn test_uniform_commands() {
        let mut state = ContextState::default();
        run(&mut state, vec![
            Command::create_program { program: 3 },
            Command::link_program { program: 3, linked: true },
            Command::use_program { program: 3 },
            Command::uniform_2f { location: 0, v0: 1.0, v1: 2.0 },
            Command::uniform_1iv {
                location: 1, count: 2,
                value: Payload::Bytes(raw::slice_as_bytes(&[7_i32, 8]).to_vec()),
            },
        ]);

        let program = &state.programs[&3];
        assert_eq!(program.uniforms[0], UniformValue::float(&[1.0, 2.0]));
        assert_eq!(program.uniforms[1], UniformValue::int(&[7]));
        assert_eq!(program.uniforms[2], UniformValue::int(&[8]));
    }

    #[test]
    fn test_untracked_commands() {
        let mutators = StateMutators::new();
        assert!(!mutators.mutates(Opcode::draw_arrays));
        assert!(!mutators.mutates(Opcode::unmap_buffer));
        assert!(mutators.mutates(Opcode::clip_plane));

        let mut state = ContextState::default();
        run(&mut state, vec![
            Command::clip_plane {
                plane: gl::CLIP_PLANE0,
                equation: Payload::Bytes(raw::slice_as_bytes(&[1.0_f64, 0.0, 0.0, 2.0]).to_vec()),
            },
            Command::draw_arrays { mode: gl::TRIANGLES, first: 0, count: 3 },
        ]);
        assert_eq!(state.clip_planes[&gl::CLIP_PLANE0], [1.0, 0.0, 0.0, 2.0]);
    }
}
