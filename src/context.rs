//! A shadow copy of the state of a GL context.
//!
//! Capture keeps a `ContextState` up to date with every call the application
//! makes, so that when a frame capture begins, we can write out everything
//! the frame might depend on: every live object, with its contents, and every
//! binding. Replay reads the snapshot back and rebuilds it on a fresh context
//! before playing the frame's commands.
//!
//! Each method here corresponds to a GL entry point, and takes its
//! arguments. Entry points that return something take the value the driver
//! actually returned as well, since we only see the call after the driver
//! has handled it.
//!
//! We are not a validation layer. Calls GL would reject are mostly ignored
//! here too, without comment: an invalid target, an unknown name, a buffer
//! operation with nothing bound.

use gleam::gl::{self, GLenum, GLfloat, GLint, GLintptr, GLsizei, GLsizeiptr, GLuint};
use std::collections::{BTreeMap, BTreeSet};
use std::io;

use crate::buffer::Buffer;
use crate::codec::{write_len, Checkpoint, Deserialize, Serialize};
use crate::config::Limits;
use crate::coverage::Coverage;
use crate::driver::Driver;
use crate::enums;
use crate::error::Result;
use crate::framebuffer::{Attachment, Framebuffer, Renderbuffer};
use crate::pixels::{PixelStore, PixelTransfer};
use crate::program::{Program, UniformValue};
use crate::program_arb::ProgramArb;
use crate::sampler::Sampler;
use crate::shader::Shader;
use crate::texture::{Texture, TextureUpdate};

#[derive(Debug, PartialEq)]
pub struct ContextState {
    pub textures: BTreeMap<GLuint, Texture>,
    /// Keyed by texture unit and target, like `(GL_TEXTURE0, GL_TEXTURE_2D)`.
    pub texture_units: BTreeMap<(GLenum, GLenum), GLuint>,
    pub pixel_store: PixelStore,
    pub pixel_transfer: PixelTransfer,

    pub buffers: BTreeMap<GLuint, Buffer>,
    pub buffer_bindings: BTreeMap<GLenum, GLuint>,

    pub shaders: BTreeMap<GLuint, Shader>,
    pub programs: BTreeMap<GLuint, Program>,

    pub program_arb_bindings: BTreeMap<GLenum, GLuint>,
    pub programs_arb: BTreeMap<GLuint, ProgramArb>,

    pub enable_caps: BTreeMap<GLenum, bool>,
    /// Capabilities like `GL_TEXTURE_2D` that are enabled per texture unit.
    pub texture_enable_caps: BTreeMap<(GLenum, GLenum), bool>,

    pub framebuffers: BTreeMap<GLuint, Framebuffer>,
    /// Keyed by `GL_READ_FRAMEBUFFER` and `GL_DRAW_FRAMEBUFFER`.
    pub framebuffer_bindings: BTreeMap<GLenum, GLuint>,
    pub renderbuffers: BTreeMap<GLuint, Renderbuffer>,
    pub renderbuffer_bindings: BTreeMap<GLenum, GLuint>,

    pub clip_planes: BTreeMap<GLenum, [f64; 4]>,
    /// The default framebuffer's draw buffer. Framebuffer objects keep their own.
    pub draw_buffer: GLenum,
    pub read_buffer: GLenum,

    pub samplers: BTreeMap<GLuint, Sampler>,
    /// Keyed by texture unit index, not `GL_TEXTUREn`.
    pub sampler_bindings: BTreeMap<GLuint, GLuint>,

    pub vertex_attrib_enabled: BTreeMap<GLuint, bool>,
    pub active_texture: GLenum,
    pub current_program: GLuint,

    /// The capture driver's limits. These size new programs' uniform storage.
    pub limits: Limits,
}

impl Default for ContextState {
    fn default() -> ContextState {
        ContextState::new(Limits::default())
    }
}

fn is_buffer_target(target: GLenum) -> bool {
    matches!(target,
             gl::ARRAY_BUFFER | gl::ELEMENT_ARRAY_BUFFER |
             gl::PIXEL_PACK_BUFFER | gl::PIXEL_UNPACK_BUFFER |
             gl::COPY_READ_BUFFER | gl::COPY_WRITE_BUFFER |
             gl::TRANSFORM_FEEDBACK_BUFFER | gl::UNIFORM_BUFFER | gl::TEXTURE_BUFFER |
             enums::ATOMIC_COUNTER_BUFFER | enums::DRAW_INDIRECT_BUFFER)
}

fn is_texture_target(target: GLenum) -> bool {
    matches!(target,
             gl::TEXTURE_1D | gl::TEXTURE_2D | gl::TEXTURE_3D |
             gl::TEXTURE_1D_ARRAY | gl::TEXTURE_2D_ARRAY | gl::TEXTURE_RECTANGLE |
             gl::TEXTURE_CUBE_MAP | gl::TEXTURE_BUFFER |
             gl::TEXTURE_2D_MULTISAMPLE | gl::TEXTURE_2D_MULTISAMPLE_ARRAY)
}

fn is_program_arb_target(target: GLenum) -> bool {
    target == enums::VERTEX_PROGRAM_ARB || target == enums::FRAGMENT_PROGRAM_ARB
}

/// Capabilities that `glEnable` sets on the active texture unit only.
fn is_texture_unit_cap(cap: GLenum) -> bool {
    matches!(cap,
             gl::TEXTURE_1D | gl::TEXTURE_2D | gl::TEXTURE_3D | gl::TEXTURE_CUBE_MAP |
             gl::TEXTURE_GEN_Q | gl::TEXTURE_GEN_R | gl::TEXTURE_GEN_S | gl::TEXTURE_GEN_T)
}

/// The target a texture must be bound to for an upload to `image_target` to
/// affect it. Cube map faces belong to the cube map.
fn texture_binding_target(image_target: GLenum) -> GLenum {
    match image_target {
        gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z => gl::TEXTURE_CUBE_MAP,
        target => target,
    }
}

/// Null out every slot in `bindings` that refers to `handle`.
fn unbind<K>(bindings: &mut BTreeMap<K, GLuint>, handle: GLuint) {
    for bound in bindings.values_mut() {
        if *bound == handle {
            *bound = 0;
        }
    }
}

impl ContextState {
    pub fn new(limits: Limits) -> ContextState {
        ContextState {
            textures: BTreeMap::new(),
            texture_units: BTreeMap::new(),
            pixel_store: PixelStore::default(),
            pixel_transfer: PixelTransfer::default(),
            buffers: BTreeMap::new(),
            buffer_bindings: BTreeMap::new(),
            shaders: BTreeMap::new(),
            programs: BTreeMap::new(),
            program_arb_bindings: BTreeMap::new(),
            programs_arb: BTreeMap::new(),
            enable_caps: BTreeMap::new(),
            texture_enable_caps: BTreeMap::new(),
            framebuffers: BTreeMap::new(),
            framebuffer_bindings: BTreeMap::new(),
            renderbuffers: BTreeMap::new(),
            renderbuffer_bindings: BTreeMap::new(),
            clip_planes: BTreeMap::new(),
            draw_buffer: gl::NONE,
            read_buffer: gl::NONE,
            samplers: BTreeMap::new(),
            sampler_bindings: BTreeMap::new(),
            vertex_attrib_enabled: BTreeMap::new(),
            active_texture: gl::TEXTURE0,
            current_program: 0,
            limits,
        }
    }

    // Lookups of bound objects.

    /// The name bound to `target` on the active texture unit, or zero.
    pub fn bound_texture(&self, target: GLenum) -> GLuint {
        self.texture_units.get(&(self.active_texture, target)).cloned().unwrap_or(0)
    }

    fn bound_texture_mut(&mut self, target: GLenum) -> Option<&mut Texture> {
        let handle = self.bound_texture(texture_binding_target(target));
        self.textures.get_mut(&handle)
    }

    pub fn bound_buffer(&self, target: GLenum) -> GLuint {
        self.buffer_bindings.get(&target).cloned().unwrap_or(0)
    }

    /// The buffer object bound to `target`, if any.
    pub fn bound_buffer_mut(&mut self, target: GLenum) -> Option<&mut Buffer> {
        if !is_buffer_target(target) {
            return None;
        }
        let handle = self.bound_buffer(target);
        self.buffers.get_mut(&handle)
    }

    pub fn bound_framebuffer(&self, target: GLenum) -> GLuint {
        let slot = match target {
            gl::READ_FRAMEBUFFER => gl::READ_FRAMEBUFFER,
            gl::FRAMEBUFFER | gl::DRAW_FRAMEBUFFER => gl::DRAW_FRAMEBUFFER,
            _ => return 0,
        };
        self.framebuffer_bindings.get(&slot).cloned().unwrap_or(0)
    }

    fn bound_framebuffer_mut(&mut self, target: GLenum) -> Option<&mut Framebuffer> {
        let handle = self.bound_framebuffer(target);
        self.framebuffers.get_mut(&handle)
    }

    fn bound_renderbuffer_mut(&mut self, target: GLenum) -> Option<&mut Renderbuffer> {
        if target != gl::RENDERBUFFER {
            return None;
        }
        let handle = self.renderbuffer_bindings.get(&target).cloned().unwrap_or(0);
        self.renderbuffers.get_mut(&handle)
    }

    // Textures.

    pub fn active_texture(&mut self, texture: GLenum) {
        self.active_texture = texture;
    }

    pub fn gen_textures(&mut self, textures: &[GLuint]) {
        for &handle in textures.iter().filter(|&&h| h != 0) {
            self.textures.entry(handle).or_default();
        }
    }

    pub fn bind_texture(&mut self, target: GLenum, texture: GLuint) {
        let unit = self.active_texture;
        self.bind_multi_texture_ext(unit, target, texture);
    }

    pub fn bind_multi_texture_ext(&mut self, texunit: GLenum, target: GLenum, texture: GLuint) {
        if !is_texture_target(target) {
            return;
        }
        if texture != 0 {
            let record = self.textures.entry(texture).or_insert_with(|| Texture::new(target));
            if record.target == 0 {
                record.target = target;
            }
        }
        self.texture_units.insert((texunit, target), texture);
    }

    pub fn delete_textures(&mut self, textures: &[GLuint]) {
        for &handle in textures.iter().filter(|&&h| h != 0) {
            unbind(&mut self.texture_units, handle);
            for &slot in &[gl::READ_FRAMEBUFFER, gl::DRAW_FRAMEBUFFER] {
                if let Some(framebuffer) = self.bound_framebuffer_mut(slot) {
                    framebuffer.forget_texture(handle);
                }
            }
            self.textures.remove(&handle);
        }
    }

    fn texture_update(&mut self, update: TextureUpdate) {
        if let Some(texture) = self.bound_texture_mut(update.target) {
            texture.append_update(update);
        }
    }

    fn new_update(&self, target: GLenum, level: GLint, width: GLsizei, height: GLsizei,
                  format: GLenum, pixel_type: GLenum, pixels: Option<&[u8]>) -> TextureUpdate {
        TextureUpdate {
            target,
            level,
            internal_format: 0,
            xoffset: 0,
            yoffset: 0,
            zoffset: 0,
            width,
            height,
            depth: None,
            border: 0,
            format,
            pixel_type,
            pixel_store: self.pixel_store,
            pixel_transfer: self.pixel_transfer,
            pixels: pixels.map(|p| p.to_vec()),
            compressed: false,
            sub_image: false,
        }
    }

    pub fn tex_image_2d(&mut self, target: GLenum, level: GLint, internal_format: GLint,
                        width: GLsizei, height: GLsizei, border: GLint,
                        format: GLenum, pixel_type: GLenum, pixels: Option<&[u8]>) {
        let update = TextureUpdate {
            internal_format,
            border,
            ..self.new_update(target, level, width, height, format, pixel_type, pixels)
        };
        self.texture_update(update);
    }

    pub fn tex_image_3d(&mut self, target: GLenum, level: GLint, internal_format: GLint,
                        width: GLsizei, height: GLsizei, depth: GLsizei, border: GLint,
                        format: GLenum, pixel_type: GLenum, pixels: Option<&[u8]>) {
        let update = TextureUpdate {
            internal_format,
            border,
            depth: Some(depth),
            ..self.new_update(target, level, width, height, format, pixel_type, pixels)
        };
        self.texture_update(update);
    }

    pub fn tex_sub_image_2d(&mut self, target: GLenum, level: GLint,
                            xoffset: GLint, yoffset: GLint, width: GLsizei, height: GLsizei,
                            format: GLenum, pixel_type: GLenum, pixels: Option<&[u8]>) {
        let update = TextureUpdate {
            xoffset,
            yoffset,
            sub_image: true,
            ..self.new_update(target, level, width, height, format, pixel_type, pixels)
        };
        self.texture_update(update);
    }

    pub fn tex_sub_image_3d(&mut self, target: GLenum, level: GLint,
                            xoffset: GLint, yoffset: GLint, zoffset: GLint,
                            width: GLsizei, height: GLsizei, depth: GLsizei,
                            format: GLenum, pixel_type: GLenum, pixels: Option<&[u8]>) {
        let update = TextureUpdate {
            xoffset,
            yoffset,
            zoffset,
            depth: Some(depth),
            sub_image: true,
            ..self.new_update(target, level, width, height, format, pixel_type, pixels)
        };
        self.texture_update(update);
    }

    pub fn compressed_tex_image_2d(&mut self, target: GLenum, level: GLint,
                                   internal_format: GLenum, width: GLsizei, height: GLsizei,
                                   border: GLint, data: Option<&[u8]>) {
        let update = TextureUpdate {
            internal_format: internal_format as GLint,
            border,
            compressed: true,
            ..self.new_update(target, level, width, height, 0, 0, data)
        };
        self.texture_update(update);
    }

    pub fn tex_parameter_i(&mut self, target: GLenum, pname: GLenum, param: GLint) {
        if let Some(texture) = self.bound_texture_mut(target) {
            texture.tex_parameter_i(pname, param);
        }
    }

    pub fn tex_parameter_f(&mut self, target: GLenum, pname: GLenum, param: GLfloat) {
        if let Some(texture) = self.bound_texture_mut(target) {
            texture.tex_parameter_f(pname, param);
        }
    }

    pub fn tex_parameter_fv(&mut self, target: GLenum, pname: GLenum, params: &[GLfloat]) {
        if let Some(texture) = self.bound_texture_mut(target) {
            texture.tex_parameter_fv(pname, params);
        }
    }

    pub fn tex_parameter_iv(&mut self, target: GLenum, pname: GLenum, params: &[GLint]) {
        if let Some(texture) = self.bound_texture_mut(target) {
            texture.tex_parameter_iv(pname, params);
        }
    }

    pub fn pixel_store_i(&mut self, pname: GLenum, param: GLint) {
        self.pixel_store.pixel_store_i(pname, param);
    }

    pub fn pixel_store_f(&mut self, pname: GLenum, param: GLfloat) {
        self.pixel_store.pixel_store_f(pname, param);
    }

    pub fn pixel_transfer_i(&mut self, pname: GLenum, param: GLint) {
        self.pixel_transfer.pixel_transfer_i(pname, param);
    }

    pub fn pixel_transfer_f(&mut self, pname: GLenum, param: GLfloat) {
        self.pixel_transfer.pixel_transfer_f(pname, param);
    }

    // Buffers.

    pub fn gen_buffers(&mut self, buffers: &[GLuint]) {
        for &handle in buffers.iter().filter(|&&h| h != 0) {
            self.buffers.entry(handle).or_default();
        }
    }

    pub fn bind_buffer(&mut self, target: GLenum, buffer: GLuint) {
        if !is_buffer_target(target) {
            return;
        }
        if buffer != 0 {
            let record = self.buffers.entry(buffer).or_insert_with(|| Buffer::new(target));
            if record.target == 0 {
                record.target = target;
            }
        }
        self.buffer_bindings.insert(target, buffer);
    }

    pub fn delete_buffers(&mut self, buffers: &[GLuint]) {
        for &handle in buffers.iter().filter(|&&h| h != 0) {
            unbind(&mut self.buffer_bindings, handle);
            self.buffers.remove(&handle);
        }
    }

    pub fn buffer_data(&mut self, target: GLenum, size: GLsizeiptr, data: Option<&[u8]>,
                       usage: GLenum) {
        if size < 0 {
            return;
        }
        if let Some(buffer) = self.bound_buffer_mut(target) {
            buffer.buffer_data(size as usize, data, usage);
        }
    }

    pub fn buffer_sub_data(&mut self, target: GLenum, offset: GLintptr, data: &[u8]) {
        if offset < 0 {
            return;
        }
        if let Some(buffer) = self.bound_buffer_mut(target) {
            buffer.buffer_sub_data(offset as usize, data);
        }
    }

    // Shaders and programs.

    pub fn create_shader(&mut self, shader_type: GLenum, shader: GLuint) {
        if shader != 0 {
            self.shaders.insert(shader, Shader::new(shader_type));
        }
    }

    pub fn shader_source(&mut self, shader: GLuint, sources: &[String]) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            record.shader_source(sources);
        }
    }

    pub fn compile_shader(&mut self, shader: GLuint, compiled: bool) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            record.compile_shader(compiled);
        }
    }

    pub fn delete_shader(&mut self, shader: GLuint) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            record.delete_shader();
            if record.is_dead() {
                self.shaders.remove(&shader);
            }
        }
    }

    /// Note that a program no longer holds on to `shader`.
    fn release_shader(&mut self, shader: GLuint) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            record.detach();
            if record.is_dead() {
                self.shaders.remove(&shader);
            }
        }
    }

    pub fn create_program(&mut self, program: GLuint) {
        if program != 0 {
            self.programs.insert(program, Program::new(self.limits.uniform_slots()));
        }
    }

    pub fn attach_shader(&mut self, program: GLuint, shader: GLuint) {
        let (record, shader_record) = match (self.programs.get_mut(&program),
                                             self.shaders.get_mut(&shader)) {
            (Some(record), Some(shader_record)) => (record, shader_record),
            _ => return,
        };
        record.attach_shader(shader);
        shader_record.attach();
    }

    pub fn detach_shader(&mut self, program: GLuint, shader: GLuint) {
        let detached = match self.programs.get_mut(&program) {
            Some(record) => record.detach_shader(shader),
            None => false,
        };
        if detached {
            self.release_shader(shader);
        }
    }

    pub fn link_program(&mut self, program: GLuint, linked: bool) {
        if let Some(record) = self.programs.get_mut(&program) {
            record.link_program(linked);
        }
    }

    pub fn bind_attrib_location(&mut self, program: GLuint, index: GLuint, name: &str) {
        if let Some(record) = self.programs.get_mut(&program) {
            record.bind_attrib_location(index, name);
        }
    }

    pub fn get_uniform_location(&mut self, program: GLuint, name: &str, location: GLint,
                                coverage: &mut Coverage) {
        match self.programs.get_mut(&program) {
            Some(record) => record.get_uniform_location(name, location),
            None if location != -1 => {
                coverage.warn_once("glGetUniformLocation succeeded on a program we never saw created");
            }
            None => (),
        }
    }

    pub fn use_program(&mut self, program: GLuint) {
        if program != 0 && !self.programs.contains_key(&program) {
            return;
        }
        let previous = std::mem::replace(&mut self.current_program, program);
        if previous != program
            && self.programs.get(&previous).map_or(false, |record| record.marked_for_delete)
        {
            self.destroy_program(previous);
        }
    }

    /// GL keeps a deleted program alive while it is in use, so we do too.
    pub fn delete_program(&mut self, program: GLuint) {
        if program == 0 {
            return;
        }
        if program == self.current_program {
            if let Some(record) = self.programs.get_mut(&program) {
                record.marked_for_delete = true;
            }
            return;
        }
        self.destroy_program(program);
    }

    fn destroy_program(&mut self, program: GLuint) {
        if let Some(record) = self.programs.remove(&program) {
            for shader in record.attached_shaders {
                self.release_shader(shader);
            }
        }
    }

    /// Apply `glUniform{dims}fv(location, count, values)` to the current program.
    pub fn uniform_f(&mut self, location: GLint, dims: usize, values: &[f32]) {
        self.set_uniforms(location, dims, values, UniformValue::float);
    }

    pub fn uniform_i(&mut self, location: GLint, dims: usize, values: &[i32]) {
        self.set_uniforms(location, dims, values, UniformValue::int);
    }

    fn set_uniforms<T>(&mut self, location: GLint, dims: usize, values: &[T],
                       make: fn(&[T]) -> UniformValue) {
        if location < 0 || dims == 0 {
            return;
        }
        let program = match self.programs.get_mut(&self.current_program) {
            Some(program) => program,
            None => return,
        };
        for (i, element) in values.chunks_exact(dims).enumerate() {
            program.set_uniform(location + i as GLint, make(element));
        }
    }

    // ARB assembly programs.

    pub fn gen_programs_arb(&mut self, programs: &[GLuint]) {
        for &handle in programs.iter().filter(|&&h| h != 0) {
            self.programs_arb.entry(handle).or_default();
        }
    }

    pub fn bind_program_arb(&mut self, target: GLenum, program: GLuint) {
        if !is_program_arb_target(target) {
            return;
        }
        if program != 0 {
            let record = self.programs_arb.entry(program).or_insert_with(|| ProgramArb::new(target));
            if !record.bind_target(target) {
                return;
            }
        }
        self.program_arb_bindings.insert(target, program);
    }

    pub fn program_string_arb(&mut self, target: GLenum, format: GLenum, string: &[u8],
                              coverage: &mut Coverage) {
        if !is_program_arb_target(target) {
            return;
        }
        let handle = self.program_arb_bindings.get(&target).cloned().unwrap_or(0);
        if let Some(record) = self.programs_arb.get_mut(&handle) {
            record.program_string(target, format, string, coverage);
        }
    }

    pub fn delete_programs_arb(&mut self, programs: &[GLuint]) {
        for &handle in programs.iter().filter(|&&h| h != 0) {
            unbind(&mut self.program_arb_bindings, handle);
            self.programs_arb.remove(&handle);
        }
    }

    // Capabilities.

    fn set_cap(&mut self, cap: GLenum, enabled: bool) {
        if is_texture_unit_cap(cap) {
            self.texture_enable_caps.insert((self.active_texture, cap), enabled);
        } else {
            self.enable_caps.insert(cap, enabled);
        }
    }

    pub fn enable(&mut self, cap: GLenum) {
        self.set_cap(cap, true);
    }

    pub fn disable(&mut self, cap: GLenum) {
        self.set_cap(cap, false);
    }

    pub fn enable_vertex_attrib_array(&mut self, index: GLuint) {
        self.vertex_attrib_enabled.insert(index, true);
    }

    pub fn disable_vertex_attrib_array(&mut self, index: GLuint) {
        self.vertex_attrib_enabled.insert(index, false);
    }

    pub fn clip_plane(&mut self, plane: GLenum, equation: [f64; 4]) {
        self.clip_planes.insert(plane, equation);
    }

    // Framebuffers and renderbuffers.

    pub fn gen_framebuffers(&mut self, framebuffers: &[GLuint]) {
        for &handle in framebuffers.iter().filter(|&&h| h != 0) {
            self.framebuffers.entry(handle).or_default();
        }
    }

    pub fn bind_framebuffer(&mut self, target: GLenum, framebuffer: GLuint) {
        if framebuffer != 0 && !self.framebuffers.contains_key(&framebuffer) {
            return;
        }
        let (read, draw) = match target {
            gl::FRAMEBUFFER => (true, true),
            gl::READ_FRAMEBUFFER => (true, false),
            gl::DRAW_FRAMEBUFFER => (false, true),
            _ => return,
        };
        if read {
            self.framebuffer_bindings.insert(gl::READ_FRAMEBUFFER, framebuffer);
        }
        if draw {
            self.framebuffer_bindings.insert(gl::DRAW_FRAMEBUFFER, framebuffer);
        }
    }

    pub fn delete_framebuffers(&mut self, framebuffers: &[GLuint]) {
        for &handle in framebuffers.iter().filter(|&&h| h != 0) {
            unbind(&mut self.framebuffer_bindings, handle);
            self.framebuffers.remove(&handle);
        }
    }

    pub fn framebuffer_renderbuffer(&mut self, target: GLenum, attachment: GLenum,
                                    renderbuffertarget: GLenum, renderbuffer: GLuint) {
        if let Some(framebuffer) = self.bound_framebuffer_mut(target) {
            framebuffer.framebuffer_renderbuffer(attachment, renderbuffertarget, renderbuffer);
        }
    }

    pub fn framebuffer_texture_2d(&mut self, target: GLenum, attachment: GLenum,
                                  textarget: GLenum, texture: GLuint, level: GLint) {
        if let Some(framebuffer) = self.bound_framebuffer_mut(target) {
            framebuffer.framebuffer_texture_2d(attachment, textarget, texture, level);
        }
    }

    pub fn framebuffer_texture_layer(&mut self, target: GLenum, attachment: GLenum,
                                     texture: GLuint, level: GLint, layer: GLint) {
        if let Some(framebuffer) = self.bound_framebuffer_mut(target) {
            framebuffer.framebuffer_texture_layer(attachment, texture, level, layer);
        }
    }

    pub fn draw_buffer(&mut self, buf: GLenum) {
        match self.bound_framebuffer_mut(gl::DRAW_FRAMEBUFFER) {
            Some(framebuffer) => framebuffer.draw_buffers(&[buf]),
            None => self.draw_buffer = buf,
        }
    }

    pub fn draw_buffers(&mut self, bufs: &[GLenum]) {
        match self.bound_framebuffer_mut(gl::DRAW_FRAMEBUFFER) {
            Some(framebuffer) => framebuffer.draw_buffers(bufs),
            None => self.draw_buffer = bufs.first().cloned().unwrap_or(gl::NONE),
        }
    }

    pub fn read_buffer(&mut self, mode: GLenum) {
        match self.bound_framebuffer_mut(gl::READ_FRAMEBUFFER) {
            Some(framebuffer) => framebuffer.read_buffer(mode),
            None => self.read_buffer = mode,
        }
    }

    pub fn gen_renderbuffers(&mut self, renderbuffers: &[GLuint]) {
        for &handle in renderbuffers.iter().filter(|&&h| h != 0) {
            self.renderbuffers.entry(handle).or_default();
        }
    }

    pub fn bind_renderbuffer(&mut self, target: GLenum, renderbuffer: GLuint) {
        if target != gl::RENDERBUFFER {
            return;
        }
        if renderbuffer != 0 {
            match self.renderbuffers.get_mut(&renderbuffer) {
                Some(record) if record.target == 0 => record.target = target,
                Some(_) => (),
                None => return,
            }
        }
        self.renderbuffer_bindings.insert(target, renderbuffer);
    }

    pub fn delete_renderbuffers(&mut self, renderbuffers: &[GLuint]) {
        for &handle in renderbuffers.iter().filter(|&&h| h != 0) {
            unbind(&mut self.renderbuffer_bindings, handle);
            for &slot in &[gl::READ_FRAMEBUFFER, gl::DRAW_FRAMEBUFFER] {
                if let Some(framebuffer) = self.bound_framebuffer_mut(slot) {
                    framebuffer.forget_renderbuffer(handle);
                }
            }
            self.renderbuffers.remove(&handle);
        }
    }

    pub fn renderbuffer_storage(&mut self, target: GLenum, internal_format: GLenum,
                                width: GLsizei, height: GLsizei) {
        self.renderbuffer_storage_multisample(target, 0, internal_format, width, height);
    }

    pub fn renderbuffer_storage_multisample(&mut self, target: GLenum, samples: GLsizei,
                                            internal_format: GLenum,
                                            width: GLsizei, height: GLsizei) {
        if let Some(record) = self.bound_renderbuffer_mut(target) {
            record.renderbuffer_storage_multisample(target, samples, internal_format,
                                                    width, height);
        }
    }

    // Samplers.

    pub fn gen_samplers(&mut self, samplers: &[GLuint]) {
        for &handle in samplers.iter().filter(|&&h| h != 0) {
            self.samplers.entry(handle).or_default();
        }
    }

    pub fn bind_sampler(&mut self, unit: GLuint, sampler: GLuint) {
        if sampler != 0 && !self.samplers.contains_key(&sampler) {
            return;
        }
        self.sampler_bindings.insert(unit, sampler);
    }

    pub fn delete_samplers(&mut self, samplers: &[GLuint]) {
        for &handle in samplers.iter().filter(|&&h| h != 0) {
            unbind(&mut self.sampler_bindings, handle);
            self.samplers.remove(&handle);
        }
    }

    pub fn sampler_parameter_i(&mut self, sampler: GLuint, pname: GLenum, param: GLint) {
        if let Some(record) = self.samplers.get_mut(&sampler) {
            record.sampler_parameter_i(pname, param);
        }
    }

    pub fn sampler_parameter_f(&mut self, sampler: GLuint, pname: GLenum, param: GLfloat) {
        if let Some(record) = self.samplers.get_mut(&sampler) {
            record.sampler_parameter_f(pname, param);
        }
    }

    pub fn sampler_parameter_fv(&mut self, sampler: GLuint, pname: GLenum, params: &[GLfloat]) {
        if let Some(record) = self.samplers.get_mut(&sampler) {
            record.sampler_parameter_fv(pname, params);
        }
    }

    // Snapshots.

    /// Textures bound to some unit or attached to some framebuffer.
    pub fn textures_in_use(&self) -> BTreeSet<GLuint> {
        let mut in_use: BTreeSet<GLuint> = self.texture_units.values().cloned().collect();
        for framebuffer in self.framebuffers.values() {
            for attached in framebuffer.attachments.values() {
                match *attached {
                    Attachment::Texture2D { texture, .. }
                    | Attachment::TextureLayer { texture, .. } => { in_use.insert(texture); }
                    Attachment::Renderbuffer { .. } => (),
                }
            }
        }
        in_use.remove(&0);
        in_use
    }

    /// Write this state to `stream`. Unless `all_textures` is set, texel data
    /// is left out for textures the frame doesn't seem to use.
    pub fn write_snapshot<W: io::Write>(&self, stream: &mut W, all_textures: bool) -> Result<()> {
        Checkpoint("ContextStateBegin").write(stream)?;

        Checkpoint("TexturesBegin").write(stream)?;
        if all_textures {
            self.textures.serialize(stream)?;
        } else {
            let in_use = self.textures_in_use();
            write_len(stream, self.textures.len())?;
            for (handle, texture) in &self.textures {
                handle.serialize(stream)?;
                if in_use.contains(handle) {
                    texture.serialize(stream)?;
                } else {
                    texture.without_pixels().serialize(stream)?;
                }
            }
        }
        self.texture_units.serialize(stream)?;
        Checkpoint("TexturesEnd").write(stream)?;

        self.pixel_store.serialize(stream)?;
        self.pixel_transfer.serialize(stream)?;

        Checkpoint("BuffersBegin").write(stream)?;
        self.buffers.serialize(stream)?;
        self.buffer_bindings.serialize(stream)?;
        Checkpoint("BuffersEnd").write(stream)?;

        Checkpoint("ShadersBegin").write(stream)?;
        self.shaders.serialize(stream)?;
        Checkpoint("ShadersEnd").write(stream)?;

        Checkpoint("ProgramsBegin").write(stream)?;
        self.programs.serialize(stream)?;
        Checkpoint("ProgramsEnd").write(stream)?;

        Checkpoint("ProgramsARBBegin").write(stream)?;
        self.program_arb_bindings.serialize(stream)?;
        self.programs_arb.serialize(stream)?;
        Checkpoint("ProgramsARBEnd").write(stream)?;

        Checkpoint("EnableCapsBegin").write(stream)?;
        self.enable_caps.serialize(stream)?;
        self.texture_enable_caps.serialize(stream)?;
        Checkpoint("EnableCapsEnd").write(stream)?;

        Checkpoint("FramebufferObjectsBegin").write(stream)?;
        self.framebuffers.serialize(stream)?;
        self.framebuffer_bindings.serialize(stream)?;
        self.renderbuffers.serialize(stream)?;
        self.renderbuffer_bindings.serialize(stream)?;
        Checkpoint("FramebufferObjectsEnd").write(stream)?;

        self.clip_planes.serialize(stream)?;
        self.draw_buffer.serialize(stream)?;
        self.read_buffer.serialize(stream)?;
        self.samplers.serialize(stream)?;
        self.sampler_bindings.serialize(stream)?;
        self.vertex_attrib_enabled.serialize(stream)?;
        self.active_texture.serialize(stream)?;
        self.current_program.serialize(stream)?;
        self.limits.serialize(stream)?;

        Checkpoint("ContextStateEnd").write(stream)
    }

    /// Restore the context-wide state that object creation and binding
    /// don't cover. This is for replay, on a context whose objects have been
    /// created already.
    pub fn restore(&self, driver: &dyn Driver) {
        driver.bind_framebuffer(gl::FRAMEBUFFER, 0);
        if self.draw_buffer != gl::NONE {
            driver.draw_buffers(&[self.draw_buffer]);
        }
        if self.read_buffer != gl::NONE {
            driver.read_buffer(self.read_buffer);
        }

        for (&cap, &enabled) in &self.enable_caps {
            if enabled { driver.enable(cap) } else { driver.disable(cap) }
        }
        for (&(unit, cap), &enabled) in &self.texture_enable_caps {
            driver.active_texture(unit);
            if enabled { driver.enable(cap) } else { driver.disable(cap) }
        }
        for (&index, &enabled) in &self.vertex_attrib_enabled {
            if enabled {
                driver.enable_vertex_attrib_array(index);
            } else {
                driver.disable_vertex_attrib_array(index);
            }
        }
        for (&plane, equation) in &self.clip_planes {
            driver.clip_plane(plane, equation);
        }
        driver.active_texture(self.active_texture);
    }
}

impl Serialize for ContextState {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.write_snapshot(stream, true)
    }
}

impl Deserialize for ContextState {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<ContextState> {
        Checkpoint("ContextStateBegin").read(stream)?;

        Checkpoint("TexturesBegin").read(stream)?;
        let textures = Deserialize::deserialize(stream)?;
        let texture_units = Deserialize::deserialize(stream)?;
        Checkpoint("TexturesEnd").read(stream)?;

        let pixel_store = Deserialize::deserialize(stream)?;
        let pixel_transfer = Deserialize::deserialize(stream)?;

        Checkpoint("BuffersBegin").read(stream)?;
        let buffers = Deserialize::deserialize(stream)?;
        let buffer_bindings = Deserialize::deserialize(stream)?;
        Checkpoint("BuffersEnd").read(stream)?;

        Checkpoint("ShadersBegin").read(stream)?;
        let shaders = Deserialize::deserialize(stream)?;
        Checkpoint("ShadersEnd").read(stream)?;

        Checkpoint("ProgramsBegin").read(stream)?;
        let programs = Deserialize::deserialize(stream)?;
        Checkpoint("ProgramsEnd").read(stream)?;

        Checkpoint("ProgramsARBBegin").read(stream)?;
        let program_arb_bindings = Deserialize::deserialize(stream)?;
        let programs_arb = Deserialize::deserialize(stream)?;
        Checkpoint("ProgramsARBEnd").read(stream)?;

        Checkpoint("EnableCapsBegin").read(stream)?;
        let enable_caps = Deserialize::deserialize(stream)?;
        let texture_enable_caps = Deserialize::deserialize(stream)?;
        Checkpoint("EnableCapsEnd").read(stream)?;

        Checkpoint("FramebufferObjectsBegin").read(stream)?;
        let framebuffers = Deserialize::deserialize(stream)?;
        let framebuffer_bindings = Deserialize::deserialize(stream)?;
        let renderbuffers = Deserialize::deserialize(stream)?;
        let renderbuffer_bindings = Deserialize::deserialize(stream)?;
        Checkpoint("FramebufferObjectsEnd").read(stream)?;

        let state = ContextState {
            textures,
            texture_units,
            pixel_store,
            pixel_transfer,
            buffers,
            buffer_bindings,
            shaders,
            programs,
            program_arb_bindings,
            programs_arb,
            enable_caps,
            texture_enable_caps,
            framebuffers,
            framebuffer_bindings,
            renderbuffers,
            renderbuffer_bindings,
            clip_planes: Deserialize::deserialize(stream)?,
            draw_buffer: Deserialize::deserialize(stream)?,
            read_buffer: Deserialize::deserialize(stream)?,
            samplers: Deserialize::deserialize(stream)?,
            sampler_bindings: Deserialize::deserialize(stream)?,
            vertex_attrib_enabled: Deserialize::deserialize(stream)?,
            active_texture: Deserialize::deserialize(stream)?,
            current_program: Deserialize::deserialize(stream)?,
            limits: Deserialize::deserialize(stream)?,
        };

        Checkpoint("ContextStateEnd").read(stream)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::driver::mock::MockDriver;
    use crate::error::Error;

    fn round_trip(state: &ContextState) -> ContextState {
        let bytes = codec::to_bytes(state).unwrap();
        codec::from_bytes(&bytes).unwrap()
    }

    /// A state with at least one of everything.
    fn populated() -> ContextState {
        let mut coverage = Coverage::new();
        let mut state = ContextState::default();

        state.gen_textures(&[1, 2]);
        state.active_texture(gl::TEXTURE1);
        state.bind_texture(gl::TEXTURE_2D, 1);
        state.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);
        state.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA8 as GLint, 2, 2, 0,
                           gl::RGBA, gl::UNSIGNED_BYTE, Some(&[0xaa; 16]));
        state.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as GLint);
        state.enable(gl::TEXTURE_2D);
        state.enable(gl::BLEND);
        state.disable(gl::DEPTH_TEST);

        state.gen_buffers(&[3]);
        state.bind_buffer(gl::ARRAY_BUFFER, 3);
        state.buffer_data(gl::ARRAY_BUFFER, 8, Some(&[1, 2, 3, 4, 5, 6, 7, 8]), gl::DYNAMIC_DRAW);

        state.create_shader(gl::VERTEX_SHADER, 4);
        state.shader_source(4, &["void main() {}".to_string()]);
        state.compile_shader(4, true);
        state.create_program(5);
        state.attach_shader(5, 4);
        state.bind_attrib_location(5, 0, "position");
        state.link_program(5, true);
        state.get_uniform_location(5, "tint", 2, &mut coverage);
        state.use_program(5);
        state.uniform_f(2, 4, &[1.0, 0.0, 0.0, 1.0]);

        state.gen_programs_arb(&[6]);
        state.bind_program_arb(enums::VERTEX_PROGRAM_ARB, 6);
        state.program_string_arb(enums::VERTEX_PROGRAM_ARB, enums::PROGRAM_FORMAT_ASCII_ARB,
                                 b"!!ARBvp1.0\nEND", &mut coverage);

        state.gen_renderbuffers(&[7]);
        state.bind_renderbuffer(gl::RENDERBUFFER, 7);
        state.renderbuffer_storage(gl::RENDERBUFFER, gl::DEPTH_COMPONENT24, 64, 64);
        state.gen_framebuffers(&[8]);
        state.bind_framebuffer(gl::FRAMEBUFFER, 8);
        state.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, 1, 0);
        state.framebuffer_renderbuffer(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, gl::RENDERBUFFER, 7);
        state.draw_buffers(&[gl::COLOR_ATTACHMENT0]);

        state.gen_samplers(&[9]);
        state.bind_sampler(1, 9);
        state.sampler_parameter_i(9, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);

        state.clip_plane(gl::CLIP_PLANE0, [0.0, 1.0, 0.0, -0.5]);
        state.enable_vertex_attrib_array(0);
        state.disable_vertex_attrib_array(1);
        state
    }

    #[test]
    fn test_round_trip() {
        let empty = ContextState::default();
        assert_eq!(round_trip(&empty), empty);

        let state = populated();
        assert_eq!(round_trip(&state), state);
    }

    #[test]
    fn test_populated_state() {
        let state = populated();
        assert_eq!(state.bound_texture(gl::TEXTURE_2D), 1);
        assert_eq!(state.texture_enable_caps.get(&(gl::TEXTURE1, gl::TEXTURE_2D)), Some(&true));
        assert!(!state.enable_caps.contains_key(&gl::TEXTURE_2D));
        assert_eq!(state.textures[&1].updates.len(), 1);
        assert_eq!(state.textures[&1].updates[0].pixel_store.unpack_alignment, 1);
        assert_eq!(state.buffers[&3].contents, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(state.programs[&5].uniforms[2],
                   UniformValue::Float { dims: 4, values: [1.0, 0.0, 0.0, 1.0] });
        assert_eq!(state.shaders[&4].attach_count, 1);
        assert_eq!(state.framebuffers[&8].draw_buffers, vec![gl::COLOR_ATTACHMENT0]);
        // The draw buffer went to the framebuffer object, not the default framebuffer.
        assert_eq!(state.draw_buffer, gl::NONE);
        assert_eq!(state.renderbuffers[&7].width, 64);
        assert_eq!(state.programs_arb[&6].program_string, b"!!ARBvp1.0\nEND".to_vec());
    }

    #[test]
    fn test_lazy_creation() {
        let mut state = ContextState::default();

        // Textures, buffers, and ARB programs spring into existence when bound.
        state.bind_texture(gl::TEXTURE_CUBE_MAP, 10);
        assert_eq!(state.textures[&10].target, gl::TEXTURE_CUBE_MAP);
        state.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, 11);
        assert_eq!(state.buffers[&11].target, gl::ELEMENT_ARRAY_BUFFER);
        state.bind_program_arb(enums::FRAGMENT_PROGRAM_ARB, 12);
        assert!(state.programs_arb.contains_key(&12));

        // Framebuffers, renderbuffers, and samplers don't.
        state.bind_framebuffer(gl::FRAMEBUFFER, 13);
        state.bind_renderbuffer(gl::RENDERBUFFER, 14);
        state.bind_sampler(0, 15);
        assert!(state.framebuffer_bindings.is_empty());
        assert!(state.renderbuffer_bindings.is_empty());
        assert!(state.sampler_bindings.is_empty());

        // Invalid targets are ignored entirely.
        state.bind_texture(gl::ARRAY_BUFFER, 16);
        state.bind_buffer(gl::TEXTURE_2D, 17);
        assert!(!state.textures.contains_key(&16));
        assert!(!state.buffers.contains_key(&17));

        // An ARB program can't move to another target.
        state.bind_program_arb(enums::VERTEX_PROGRAM_ARB, 12);
        assert!(!state.program_arb_bindings.contains_key(&enums::VERTEX_PROGRAM_ARB));

        // Cube map faces reach the texture bound to the cube map target.
        state.tex_image_2d(gl::TEXTURE_CUBE_MAP_NEGATIVE_Y, 0, gl::RGBA as GLint, 1, 1, 0,
                           gl::RGBA, gl::UNSIGNED_BYTE, None);
        assert_eq!(state.textures[&10].updates.len(), 1);
    }

    #[test]
    fn test_deletion_unbinds() {
        let mut state = populated();

        state.delete_textures(&[0, 1]);
        assert!(!state.textures.contains_key(&1));
        assert_eq!(state.bound_texture(gl::TEXTURE_2D), 0);
        assert!(!state.framebuffers[&8].attachments.contains_key(&gl::COLOR_ATTACHMENT0));

        state.delete_renderbuffers(&[7]);
        assert!(state.framebuffers[&8].attachments.is_empty());
        assert_eq!(state.renderbuffer_bindings[&gl::RENDERBUFFER], 0);

        state.delete_buffers(&[3]);
        assert_eq!(state.bound_buffer(gl::ARRAY_BUFFER), 0);
        state.delete_framebuffers(&[8]);
        assert_eq!(state.bound_framebuffer(gl::READ_FRAMEBUFFER), 0);
        state.delete_samplers(&[9]);
        assert_eq!(state.sampler_bindings[&1], 0);
        state.delete_programs_arb(&[6]);
        assert_eq!(state.program_arb_bindings[&enums::VERTEX_PROGRAM_ARB], 0);

        // The state still satisfies the binding invariant, and still round-trips.
        assert_eq!(round_trip(&state), state);
    }

    #[test]
    fn test_deferred_shader_deletion() {
        let mut state = ContextState::default();
        state.create_shader(gl::FRAGMENT_SHADER, 1);
        state.create_program(2);
        state.attach_shader(2, 1);

        state.delete_shader(1);
        assert!(state.shaders[&1].marked_for_delete);

        // Detaching a shader that isn't attached changes nothing.
        state.create_program(3);
        state.detach_shader(3, 1);
        assert!(state.shaders.contains_key(&1));

        state.detach_shader(2, 1);
        assert!(!state.shaders.contains_key(&1));

        // A shader that was never attached goes away immediately.
        state.create_shader(gl::VERTEX_SHADER, 4);
        state.delete_shader(4);
        assert!(!state.shaders.contains_key(&4));

        // Deleting a program releases its shaders.
        state.create_shader(gl::VERTEX_SHADER, 5);
        state.attach_shader(3, 5);
        state.delete_shader(5);
        state.delete_program(3);
        assert!(!state.programs.contains_key(&3));
        assert!(!state.shaders.contains_key(&5));
    }

    #[test]
    fn test_program_in_use_survives_deletion() {
        let mut state = ContextState::default();
        state.create_program(1);
        state.use_program(1);
        state.delete_program(1);
        assert!(state.programs.contains_key(&1));

        // Uniform arrays fill consecutive locations.
        state.uniform_i(3, 2, &[1, 2, 3, 4]);
        assert_eq!(state.programs[&1].uniforms[3], UniformValue::int(&[1, 2]));
        assert_eq!(state.programs[&1].uniforms[4], UniformValue::int(&[3, 4]));
    }

    #[test]
    fn test_deleted_program_goes_when_unused() {
        let mut state = ContextState::default();
        state.create_shader(gl::VERTEX_SHADER, 1);
        state.create_program(2);
        state.attach_shader(2, 1);
        state.delete_shader(1);

        state.use_program(2);
        state.delete_program(2);
        assert!(state.programs[&2].marked_for_delete);
        assert!(state.shaders.contains_key(&1));

        // Re-selecting the current program doesn't release it.
        state.use_program(2);
        assert!(state.programs.contains_key(&2));

        state.use_program(0);
        assert!(!state.programs.contains_key(&2));
        assert!(!state.shaders.contains_key(&1));

        // A program that was never deleted stays when it's no longer current.
        state.create_program(3);
        state.use_program(3);
        state.use_program(0);
        assert!(state.programs.contains_key(&3));
    }

    #[test]
    fn test_shader_shared_by_two_programs() {
        let mut state = ContextState::default();
        state.create_shader(gl::FRAGMENT_SHADER, 1);
        state.create_program(2);
        state.create_program(3);
        state.attach_shader(2, 1);
        state.attach_shader(3, 1);
        state.delete_shader(1);

        state.detach_shader(2, 1);
        assert!(state.shaders.contains_key(&1));
        assert_eq!(state.shaders[&1].attach_count, 1);

        state.detach_shader(3, 1);
        assert!(!state.shaders.contains_key(&1));

        // Detaching again finds nothing to release.
        state.detach_shader(3, 1);
        assert!(!state.shaders.contains_key(&1));
        assert!(state.programs[&3].attached_shaders.is_empty());
    }

    #[test]
    fn test_unused_texture_data_dropped() {
        let mut state = populated();
        state.gen_textures(&[20]);
        state.bind_texture(gl::TEXTURE_2D, 20);
        state.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA8 as GLint, 1, 1, 0,
                           gl::RGBA, gl::UNSIGNED_BYTE, Some(&[1, 2, 3, 4]));
        // Texture 1 is still attached to framebuffer 8; 20 is bound.
        // Unbinding 20 leaves it unused.
        state.bind_texture(gl::TEXTURE_2D, 0);

        let mut bytes = vec![];
        state.write_snapshot(&mut bytes, false).unwrap();
        let reloaded: ContextState = codec::from_bytes(&bytes).unwrap();
        assert!(reloaded.textures[&1].updates[0].pixels.is_some());
        assert_eq!(reloaded.textures[&20].updates.len(), 1);
        assert_eq!(reloaded.textures[&20].updates[0].pixels, None);
    }

    #[test]
    fn test_truncated_snapshot() {
        let bytes = codec::to_bytes(&populated()).unwrap();
        let result = codec::from_bytes::<ContextState>(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(Error::StreamCorruption(_))));

        let mut bad = bytes.clone();
        // Clobber the first byte of "ContextStateBegin".
        bad[1] = b'X';
        let result = codec::from_bytes::<ContextState>(&bad);
        assert!(matches!(result, Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_restore() {
        let state = populated();
        let driver = MockDriver::new();
        state.restore(&driver);

        let calls = driver.calls();
        assert_eq!(calls[0], format!("bind_framebuffer({}, 0)", gl::FRAMEBUFFER));
        assert!(driver.called(&format!("enable({})", gl::BLEND)));
        assert!(driver.called(&format!("disable({})", gl::DEPTH_TEST)));

        let unit = driver.position(&format!("active_texture({})", gl::TEXTURE1)).unwrap();
        let texture_2d = driver.position(&format!("enable({})", gl::TEXTURE_2D)).unwrap();
        assert!(unit < texture_2d);
        assert!(driver.called("enable_vertex_attrib_array(0)"));
        assert!(driver.called("disable_vertex_attrib_array(1)"));
        assert_eq!(calls.last().unwrap(), &format!("active_texture({})", gl::TEXTURE1));
        // The default framebuffer's draw buffer was never set.
        assert!(!driver.called("draw_buffers("));
    }
}
