//! The GL calls replay needs to make.
//!
//! Re-creating objects, restoring bindings, and playing back a frame all go
//! through the `Driver` trait rather than through `gleam::gl::Gl` directly.
//! Its methods are named after gleam's, with the raw-pointer arguments
//! replaced by slices. `GleamDriver` implements it for any `&dyn Gl`; the
//! `mock` module has a recording implementation for tests.
//!
//! Some entry points replay needs are outside what gleam binds: samplers,
//! `GL_ARB_vertex_program` objects, pixel transfer, clip planes. `GleamDriver`
//! logs each of those once and carries on without them.

use gleam::gl::{self, GLbitfield, GLboolean, GLclampf, GLdouble, GLenum, GLfloat, GLint,
                GLintptr, GLsizei, GLsizeiptr, GLuint, Gl};
use std::cell::RefCell;
use std::ptr;

use crate::coverage::Coverage;
use crate::raw::DriverMapping;

#[rustfmt::skip]
pub trait Driver {
    fn active_texture(&self, texture: GLenum);
    fn attach_shader(&self, program: GLuint, shader: GLuint);
    fn bind_attrib_location(&self, program: GLuint, index: GLuint, name: &str);
    fn bind_buffer(&self, target: GLenum, buffer: GLuint);
    fn bind_framebuffer(&self, target: GLenum, framebuffer: GLuint);
    fn bind_program_arb(&self, target: GLenum, program: GLuint);
    fn bind_renderbuffer(&self, target: GLenum, renderbuffer: GLuint);
    fn bind_sampler(&self, unit: GLuint, sampler: GLuint);
    fn bind_texture(&self, target: GLenum, texture: GLuint);
    fn blend_equation(&self, mode: GLenum);
    fn blend_func(&self, sfactor: GLenum, dfactor: GLenum);
    /// Allocate `size` bytes of storage, initialized from `data` if present.
    fn buffer_data(&self, target: GLenum, size: GLsizeiptr, data: Option<&[u8]>, usage: GLenum);
    fn buffer_sub_data(&self, target: GLenum, offset: GLintptr, data: &[u8]);
    fn clear(&self, mask: GLbitfield);
    fn clear_color(&self, r: GLclampf, g: GLclampf, b: GLclampf, a: GLclampf);
    fn clear_depth(&self, depth: GLdouble);
    fn clear_stencil(&self, s: GLint);
    fn clip_plane(&self, plane: GLenum, equation: &[GLdouble; 4]);
    fn color_mask(&self, r: bool, g: bool, b: bool, a: bool);
    fn compile_shader(&self, shader: GLuint);
    fn compressed_tex_image_2d(&self, target: GLenum, level: GLint, internal_format: GLenum,
                               width: GLsizei, height: GLsizei, border: GLint, data: &[u8]);
    fn create_program(&self) -> GLuint;
    fn create_shader(&self, shader_type: GLenum) -> GLuint;
    fn cull_face(&self, mode: GLenum);
    fn delete_buffers(&self, buffers: &[GLuint]);
    fn delete_framebuffers(&self, framebuffers: &[GLuint]);
    fn delete_program(&self, program: GLuint);
    fn delete_programs_arb(&self, programs: &[GLuint]);
    fn delete_renderbuffers(&self, renderbuffers: &[GLuint]);
    fn delete_samplers(&self, samplers: &[GLuint]);
    fn delete_shader(&self, shader: GLuint);
    fn delete_textures(&self, textures: &[GLuint]);
    fn depth_func(&self, func: GLenum);
    fn depth_mask(&self, flag: bool);
    fn detach_shader(&self, program: GLuint, shader: GLuint);
    fn disable(&self, cap: GLenum);
    fn disable_vertex_attrib_array(&self, index: GLuint);
    fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei);
    fn draw_buffers(&self, bufs: &[GLenum]);
    fn draw_elements(&self, mode: GLenum, count: GLsizei, element_type: GLenum, indices_offset: GLuint);
    fn enable(&self, cap: GLenum);
    fn enable_vertex_attrib_array(&self, index: GLuint);
    fn finish(&self);
    fn flush(&self);
    fn flush_mapped_buffer_range(&self, target: GLenum, offset: GLintptr, length: GLsizeiptr);
    fn framebuffer_renderbuffer(&self, target: GLenum, attachment: GLenum,
                                renderbuffertarget: GLenum, renderbuffer: GLuint);
    fn framebuffer_texture_2d(&self, target: GLenum, attachment: GLenum, textarget: GLenum,
                              texture: GLuint, level: GLint);
    fn framebuffer_texture_layer(&self, target: GLenum, attachment: GLenum, texture: GLuint,
                                 level: GLint, layer: GLint);
    fn front_face(&self, mode: GLenum);
    fn gen_buffers(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_programs_arb(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_renderbuffers(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_samplers(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_textures(&self, n: GLsizei) -> Vec<GLuint>;
    fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint;
    fn line_width(&self, width: GLfloat);
    fn link_program(&self, program: GLuint);
    /// Map a range of the buffer bound to `target`. Return `None` if the
    /// driver refuses.
    fn map_buffer_range(&self, target: GLenum, offset: GLintptr, length: GLsizeiptr,
                        access: GLbitfield) -> Option<DriverMapping>;
    fn pixel_store_f(&self, pname: GLenum, param: GLfloat);
    fn pixel_store_i(&self, pname: GLenum, param: GLint);
    fn pixel_transfer_f(&self, pname: GLenum, param: GLfloat);
    fn pixel_transfer_i(&self, pname: GLenum, param: GLint);
    fn program_string_arb(&self, target: GLenum, format: GLenum, string: &[u8]);
    fn read_buffer(&self, mode: GLenum);
    fn renderbuffer_storage(&self, target: GLenum, internalformat: GLenum,
                            width: GLsizei, height: GLsizei);
    fn renderbuffer_storage_multisample(&self, target: GLenum, samples: GLsizei,
                                        internalformat: GLenum, width: GLsizei, height: GLsizei);
    fn sampler_parameter_f(&self, sampler: GLuint, pname: GLenum, param: GLfloat);
    fn sampler_parameter_fv(&self, sampler: GLuint, pname: GLenum, params: &[GLfloat]);
    fn sampler_parameter_i(&self, sampler: GLuint, pname: GLenum, param: GLint);
    fn scissor(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei);
    fn shader_source(&self, shader: GLuint, strings: &[&[u8]]);
    fn tex_image_2d(&self, target: GLenum, level: GLint, internal_format: GLint,
                    width: GLsizei, height: GLsizei, border: GLint,
                    format: GLenum, ty: GLenum, opt_data: Option<&[u8]>);
    fn tex_image_3d(&self, target: GLenum, level: GLint, internal_format: GLint,
                    width: GLsizei, height: GLsizei, depth: GLsizei, border: GLint,
                    format: GLenum, ty: GLenum, opt_data: Option<&[u8]>);
    fn tex_parameter_f(&self, target: GLenum, pname: GLenum, param: GLfloat);
    fn tex_parameter_fv(&self, target: GLenum, pname: GLenum, params: &[GLfloat]);
    fn tex_parameter_i(&self, target: GLenum, pname: GLenum, param: GLint);
    fn tex_sub_image_2d(&self, target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint,
                        width: GLsizei, height: GLsizei, format: GLenum, ty: GLenum, data: &[u8]);
    fn tex_sub_image_2d_pbo(&self, target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint,
                            width: GLsizei, height: GLsizei, format: GLenum, ty: GLenum,
                            offset: usize);
    fn tex_sub_image_3d(&self, target: GLenum, level: GLint,
                        xoffset: GLint, yoffset: GLint, zoffset: GLint,
                        width: GLsizei, height: GLsizei, depth: GLsizei,
                        format: GLenum, ty: GLenum, data: &[u8]);
    fn uniform_1fv(&self, location: GLint, values: &[f32]);
    fn uniform_2fv(&self, location: GLint, values: &[f32]);
    fn uniform_3fv(&self, location: GLint, values: &[f32]);
    fn uniform_4fv(&self, location: GLint, values: &[f32]);
    fn uniform_1iv(&self, location: GLint, values: &[i32]);
    fn uniform_2iv(&self, location: GLint, values: &[i32]);
    fn uniform_3iv(&self, location: GLint, values: &[i32]);
    fn uniform_4iv(&self, location: GLint, values: &[i32]);
    fn unmap_buffer(&self, target: GLenum) -> bool;
    fn use_program(&self, program: GLuint);
    fn vertex_attrib_pointer(&self, index: GLuint, size: GLint, type_: GLenum, normalized: bool,
                             stride: GLsizei, offset: GLuint);
    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei);
}

/// A `Driver` that issues calls through a `gleam::gl::Gl` implementation.
pub struct GleamDriver<'g> {
    gl: &'g dyn Gl,
    coverage: RefCell<Coverage>,
}

impl<'g> GleamDriver<'g> {
    pub fn new(gl: &'g dyn Gl) -> GleamDriver<'g> {
        GleamDriver { gl, coverage: RefCell::new(Coverage::new()) }
    }

    pub fn gl(&self) -> &'g dyn Gl {
        self.gl
    }

    fn unimplemented(&self, entry_point: &str) {
        self.coverage.borrow_mut().unimplemented(entry_point);
    }
}

/// Forward methods whose signatures match gleam's exactly.
macro_rules! forward {
    ( $( fn $method:ident ( $( $arg:ident : $type:ty ),* ) $( -> $ret:ty )? ; )* ) => {
        $(
            fn $method(&self, $( $arg : $type ),* ) $( -> $ret )? {
                self.gl.$method( $( $arg ),* )
            }
        )*
    }
}

#[rustfmt::skip]
impl<'g> Driver for GleamDriver<'g> {
    forward! {
        fn active_texture(texture: GLenum);
        fn attach_shader(program: GLuint, shader: GLuint);
        fn bind_attrib_location(program: GLuint, index: GLuint, name: &str);
        fn bind_buffer(target: GLenum, buffer: GLuint);
        fn bind_framebuffer(target: GLenum, framebuffer: GLuint);
        fn bind_renderbuffer(target: GLenum, renderbuffer: GLuint);
        fn bind_texture(target: GLenum, texture: GLuint);
        fn blend_equation(mode: GLenum);
        fn blend_func(sfactor: GLenum, dfactor: GLenum);
        fn clear(mask: GLbitfield);
        fn clear_color(r: GLclampf, g: GLclampf, b: GLclampf, a: GLclampf);
        fn clear_depth(depth: GLdouble);
        fn clear_stencil(s: GLint);
        fn color_mask(r: bool, g: bool, b: bool, a: bool);
        fn compile_shader(shader: GLuint);
        fn compressed_tex_image_2d(target: GLenum, level: GLint, internal_format: GLenum,
                                   width: GLsizei, height: GLsizei, border: GLint, data: &[u8]);
        fn create_program() -> GLuint;
        fn create_shader(shader_type: GLenum) -> GLuint;
        fn cull_face(mode: GLenum);
        fn delete_buffers(buffers: &[GLuint]);
        fn delete_framebuffers(framebuffers: &[GLuint]);
        fn delete_program(program: GLuint);
        fn delete_renderbuffers(renderbuffers: &[GLuint]);
        fn delete_shader(shader: GLuint);
        fn delete_textures(textures: &[GLuint]);
        fn depth_func(func: GLenum);
        fn depth_mask(flag: bool);
        fn detach_shader(program: GLuint, shader: GLuint);
        fn disable(cap: GLenum);
        fn disable_vertex_attrib_array(index: GLuint);
        fn draw_arrays(mode: GLenum, first: GLint, count: GLsizei);
        fn draw_buffers(bufs: &[GLenum]);
        fn draw_elements(mode: GLenum, count: GLsizei, element_type: GLenum, indices_offset: GLuint);
        fn enable(cap: GLenum);
        fn enable_vertex_attrib_array(index: GLuint);
        fn finish();
        fn flush();
        fn framebuffer_renderbuffer(target: GLenum, attachment: GLenum,
                                    renderbuffertarget: GLenum, renderbuffer: GLuint);
        fn framebuffer_texture_2d(target: GLenum, attachment: GLenum, textarget: GLenum,
                                  texture: GLuint, level: GLint);
        fn framebuffer_texture_layer(target: GLenum, attachment: GLenum, texture: GLuint,
                                     level: GLint, layer: GLint);
        fn front_face(mode: GLenum);
        fn gen_buffers(n: GLsizei) -> Vec<GLuint>;
        fn gen_framebuffers(n: GLsizei) -> Vec<GLuint>;
        fn gen_renderbuffers(n: GLsizei) -> Vec<GLuint>;
        fn gen_textures(n: GLsizei) -> Vec<GLuint>;
        fn get_uniform_location(program: GLuint, name: &str) -> GLint;
        fn line_width(width: GLfloat);
        fn link_program(program: GLuint);
        fn pixel_store_i(pname: GLenum, param: GLint);
        fn read_buffer(mode: GLenum);
        fn renderbuffer_storage(target: GLenum, internalformat: GLenum,
                                width: GLsizei, height: GLsizei);
        fn scissor(x: GLint, y: GLint, width: GLsizei, height: GLsizei);
        fn shader_source(shader: GLuint, strings: &[&[u8]]);
        fn tex_image_2d(target: GLenum, level: GLint, internal_format: GLint,
                        width: GLsizei, height: GLsizei, border: GLint,
                        format: GLenum, ty: GLenum, opt_data: Option<&[u8]>);
        fn tex_image_3d(target: GLenum, level: GLint, internal_format: GLint,
                        width: GLsizei, height: GLsizei, depth: GLsizei, border: GLint,
                        format: GLenum, ty: GLenum, opt_data: Option<&[u8]>);
        fn tex_parameter_f(target: GLenum, pname: GLenum, param: GLfloat);
        fn tex_parameter_i(target: GLenum, pname: GLenum, param: GLint);
        fn tex_sub_image_2d(target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint,
                            width: GLsizei, height: GLsizei, format: GLenum, ty: GLenum,
                            data: &[u8]);
        fn tex_sub_image_2d_pbo(target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint,
                                width: GLsizei, height: GLsizei, format: GLenum, ty: GLenum,
                                offset: usize);
        fn tex_sub_image_3d(target: GLenum, level: GLint,
                            xoffset: GLint, yoffset: GLint, zoffset: GLint,
                            width: GLsizei, height: GLsizei, depth: GLsizei,
                            format: GLenum, ty: GLenum, data: &[u8]);
        fn uniform_1fv(location: GLint, values: &[f32]);
        fn uniform_2fv(location: GLint, values: &[f32]);
        fn uniform_3fv(location: GLint, values: &[f32]);
        fn uniform_4fv(location: GLint, values: &[f32]);
        fn uniform_1iv(location: GLint, values: &[i32]);
        fn uniform_2iv(location: GLint, values: &[i32]);
        fn uniform_3iv(location: GLint, values: &[i32]);
        fn uniform_4iv(location: GLint, values: &[i32]);
        fn use_program(program: GLuint);
        fn vertex_attrib_pointer(index: GLuint, size: GLint, type_: GLenum, normalized: bool,
                                 stride: GLsizei, offset: GLuint);
        fn viewport(x: GLint, y: GLint, width: GLsizei, height: GLsizei);
    }

    fn buffer_data(&self, target: GLenum, size: GLsizeiptr, data: Option<&[u8]>, usage: GLenum) {
        let size_bytes = size.max(0) as usize;
        match data {
            Some(data) if data.len() >= size_bytes => {
                self.gl.buffer_data_untyped(target, size, data.as_ptr() as *const _, usage)
            }
            Some(data) => {
                // Don't let the driver read past the end of what we have.
                let mut padded = data.to_vec();
                padded.resize(size_bytes, 0);
                self.gl.buffer_data_untyped(target, size, padded.as_ptr() as *const _, usage)
            }
            None => self.gl.buffer_data_untyped(target, size, ptr::null(), usage),
        }
    }

    fn buffer_sub_data(&self, target: GLenum, offset: GLintptr, data: &[u8]) {
        self.gl.buffer_sub_data_untyped(target, offset, data.len() as GLsizeiptr,
                                        data.as_ptr() as *const _)
    }

    fn map_buffer_range(&self, target: GLenum, offset: GLintptr, length: GLsizeiptr,
                        access: GLbitfield) -> Option<DriverMapping> {
        let ptr = self.gl.map_buffer_range(target, offset, length, access);
        if ptr.is_null() {
            return None;
        }
        // Safe because the driver has mapped `length` bytes at `ptr` for us.
        Some(unsafe { DriverMapping::new_unchecked(ptr, length.max(0) as usize) })
    }

    fn unmap_buffer(&self, target: GLenum) -> bool {
        let result: GLboolean = self.gl.unmap_buffer(target);
        result != gl::FALSE
    }

    fn pixel_store_f(&self, pname: GLenum, param: GLfloat) {
        // Every pixel-store parameter gleam can reach is integral.
        self.gl.pixel_store_i(pname, param as GLint);
    }

    fn renderbuffer_storage_multisample(&self, target: GLenum, samples: GLsizei,
                                        internalformat: GLenum, width: GLsizei, height: GLsizei) {
        if samples > 0 {
            self.unimplemented("glRenderbufferStorageMultisample");
        }
        self.gl.renderbuffer_storage(target, internalformat, width, height);
    }

    fn tex_parameter_fv(&self, target: GLenum, pname: GLenum, params: &[GLfloat]) {
        match params {
            [param] => self.gl.tex_parameter_f(target, pname, *param),
            _ => self.unimplemented("glTexParameterfv"),
        }
    }

    fn bind_program_arb(&self, _target: GLenum, _program: GLuint) {
        self.unimplemented("glBindProgramARB");
    }

    fn bind_sampler(&self, _unit: GLuint, _sampler: GLuint) {
        self.unimplemented("glBindSampler");
    }

    fn clip_plane(&self, _plane: GLenum, _equation: &[GLdouble; 4]) {
        self.unimplemented("glClipPlane");
    }

    fn delete_programs_arb(&self, _programs: &[GLuint]) {
        self.unimplemented("glDeleteProgramsARB");
    }

    fn delete_samplers(&self, _samplers: &[GLuint]) {
        self.unimplemented("glDeleteSamplers");
    }

    fn flush_mapped_buffer_range(&self, _target: GLenum, _offset: GLintptr, _length: GLsizeiptr) {
        self.unimplemented("glFlushMappedBufferRange");
    }

    fn gen_programs_arb(&self, _n: GLsizei) -> Vec<GLuint> {
        self.unimplemented("glGenProgramsARB");
        vec![]
    }

    fn gen_samplers(&self, _n: GLsizei) -> Vec<GLuint> {
        self.unimplemented("glGenSamplers");
        vec![]
    }

    fn pixel_transfer_f(&self, _pname: GLenum, _param: GLfloat) {
        self.unimplemented("glPixelTransferf");
    }

    fn pixel_transfer_i(&self, _pname: GLenum, _param: GLint) {
        self.unimplemented("glPixelTransferi");
    }

    fn program_string_arb(&self, _target: GLenum, _format: GLenum, _string: &[u8]) {
        self.unimplemented("glProgramStringARB");
    }

    fn sampler_parameter_f(&self, _sampler: GLuint, _pname: GLenum, _param: GLfloat) {
        self.unimplemented("glSamplerParameterf");
    }

    fn sampler_parameter_fv(&self, _sampler: GLuint, _pname: GLenum, _params: &[GLfloat]) {
        self.unimplemented("glSamplerParameterfv");
    }

    fn sampler_parameter_i(&self, _sampler: GLuint, _pname: GLenum, _param: GLint) {
        self.unimplemented("glSamplerParameteri");
    }
}

/// A `Driver` that records the calls made on it, for tests.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::fmt::Debug;

    #[derive(Default)]
    pub struct MockDriver {
        calls: RefCell<Vec<String>>,
        next_name: RefCell<GLuint>,
        uniform_locations: RefCell<HashMap<(GLuint, String), GLint>>,
        bound_buffers: RefCell<HashMap<GLenum, GLuint>>,
        buffer_storage: RefCell<HashMap<GLuint, Vec<u8>>>,
    }

    impl MockDriver {
        pub fn new() -> MockDriver {
            MockDriver { next_name: RefCell::new(100), ..MockDriver::default() }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        /// True if some logged call starts with `prefix`, like `"bind_texture(3553, "`.
        pub fn called(&self, prefix: &str) -> bool {
            self.position(prefix).is_some()
        }

        /// The position in the log of the first call starting with `prefix`.
        pub fn position(&self, prefix: &str) -> Option<usize> {
            self.calls.borrow().iter().position(|c| c.starts_with(prefix))
        }

        /// Make `get_uniform_location(program, name)` return `location`.
        pub fn set_uniform_location(&self, program: GLuint, name: &str, location: GLint) {
            self.uniform_locations.borrow_mut().insert((program, name.to_string()), location);
        }

        /// The contents of the buffer object named `buffer`.
        pub fn buffer_contents(&self, buffer: GLuint) -> Vec<u8> {
            self.buffer_storage.borrow().get(&buffer).cloned().unwrap_or_default()
        }

        fn log(&self, method: &str, args: &[&dyn Debug]) {
            let args: Vec<String> = args.iter().map(|arg| format!("{:?}", arg)).collect();
            self.calls.borrow_mut().push(format!("{}({})", method, args.join(", ")));
        }

        fn names(&self, method: &str, n: GLsizei) -> Vec<GLuint> {
            self.log(method, &[&n]);
            let mut next = self.next_name.borrow_mut();
            (0..n).map(|_| { *next += 1; *next }).collect()
        }

        fn bound_storage(&self, target: GLenum) -> GLuint {
            self.bound_buffers.borrow().get(&target).cloned().unwrap_or(0)
        }
    }

    macro_rules! logged {
        ( $( fn $method:ident ( $( $arg:ident : $type:ty ),* ) ; )* ) => {
            $(
                fn $method(&self, $( $arg : $type ),* ) {
                    self.log(stringify!($method), &[ $( & $arg ),* ]);
                }
            )*
        }
    }

    #[rustfmt::skip]
    impl Driver for MockDriver {
        logged! {
            fn active_texture(texture: GLenum);
            fn attach_shader(program: GLuint, shader: GLuint);
            fn bind_attrib_location(program: GLuint, index: GLuint, name: &str);
            fn bind_framebuffer(target: GLenum, framebuffer: GLuint);
            fn bind_program_arb(target: GLenum, program: GLuint);
            fn bind_renderbuffer(target: GLenum, renderbuffer: GLuint);
            fn bind_sampler(unit: GLuint, sampler: GLuint);
            fn bind_texture(target: GLenum, texture: GLuint);
            fn blend_equation(mode: GLenum);
            fn blend_func(sfactor: GLenum, dfactor: GLenum);
            fn clear(mask: GLbitfield);
            fn clear_color(r: GLclampf, g: GLclampf, b: GLclampf, a: GLclampf);
            fn clear_depth(depth: GLdouble);
            fn clear_stencil(s: GLint);
            fn clip_plane(plane: GLenum, equation: &[GLdouble; 4]);
            fn color_mask(r: bool, g: bool, b: bool, a: bool);
            fn compile_shader(shader: GLuint);
            fn compressed_tex_image_2d(target: GLenum, level: GLint, internal_format: GLenum,
                                       width: GLsizei, height: GLsizei, border: GLint,
                                       data: &[u8]);
            fn cull_face(mode: GLenum);
            fn delete_buffers(buffers: &[GLuint]);
            fn delete_framebuffers(framebuffers: &[GLuint]);
            fn delete_program(program: GLuint);
            fn delete_programs_arb(programs: &[GLuint]);
            fn delete_renderbuffers(renderbuffers: &[GLuint]);
            fn delete_samplers(samplers: &[GLuint]);
            fn delete_shader(shader: GLuint);
            fn delete_textures(textures: &[GLuint]);
            fn depth_func(func: GLenum);
            fn depth_mask(flag: bool);
            fn detach_shader(program: GLuint, shader: GLuint);
            fn disable(cap: GLenum);
            fn disable_vertex_attrib_array(index: GLuint);
            fn draw_arrays(mode: GLenum, first: GLint, count: GLsizei);
            fn draw_buffers(bufs: &[GLenum]);
            fn draw_elements(mode: GLenum, count: GLsizei, element_type: GLenum,
                             indices_offset: GLuint);
            fn enable(cap: GLenum);
            fn enable_vertex_attrib_array(index: GLuint);
            fn finish();
            fn flush();
            fn flush_mapped_buffer_range(target: GLenum, offset: GLintptr, length: GLsizeiptr);
            fn framebuffer_renderbuffer(target: GLenum, attachment: GLenum,
                                        renderbuffertarget: GLenum, renderbuffer: GLuint);
            fn framebuffer_texture_2d(target: GLenum, attachment: GLenum, textarget: GLenum,
                                      texture: GLuint, level: GLint);
            fn framebuffer_texture_layer(target: GLenum, attachment: GLenum, texture: GLuint,
                                         level: GLint, layer: GLint);
            fn front_face(mode: GLenum);
            fn line_width(width: GLfloat);
            fn link_program(program: GLuint);
            fn pixel_store_f(pname: GLenum, param: GLfloat);
            fn pixel_store_i(pname: GLenum, param: GLint);
            fn pixel_transfer_f(pname: GLenum, param: GLfloat);
            fn pixel_transfer_i(pname: GLenum, param: GLint);
            fn program_string_arb(target: GLenum, format: GLenum, string: &[u8]);
            fn read_buffer(mode: GLenum);
            fn renderbuffer_storage(target: GLenum, internalformat: GLenum,
                                    width: GLsizei, height: GLsizei);
            fn renderbuffer_storage_multisample(target: GLenum, samples: GLsizei,
                                                internalformat: GLenum,
                                                width: GLsizei, height: GLsizei);
            fn sampler_parameter_f(sampler: GLuint, pname: GLenum, param: GLfloat);
            fn sampler_parameter_fv(sampler: GLuint, pname: GLenum, params: &[GLfloat]);
            fn sampler_parameter_i(sampler: GLuint, pname: GLenum, param: GLint);
            fn scissor(x: GLint, y: GLint, width: GLsizei, height: GLsizei);
            fn shader_source(shader: GLuint, strings: &[&[u8]]);
            fn tex_image_2d(target: GLenum, level: GLint, internal_format: GLint,
                            width: GLsizei, height: GLsizei, border: GLint,
                            format: GLenum, ty: GLenum, opt_data: Option<&[u8]>);
            fn tex_image_3d(target: GLenum, level: GLint, internal_format: GLint,
                            width: GLsizei, height: GLsizei, depth: GLsizei, border: GLint,
                            format: GLenum, ty: GLenum, opt_data: Option<&[u8]>);
            fn tex_parameter_f(target: GLenum, pname: GLenum, param: GLfloat);
            fn tex_parameter_fv(target: GLenum, pname: GLenum, params: &[GLfloat]);
            fn tex_parameter_i(target: GLenum, pname: GLenum, param: GLint);
            fn tex_sub_image_2d(target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint,
                                width: GLsizei, height: GLsizei, format: GLenum, ty: GLenum,
                                data: &[u8]);
            fn tex_sub_image_2d_pbo(target: GLenum, level: GLint, xoffset: GLint, yoffset: GLint,
                                    width: GLsizei, height: GLsizei, format: GLenum, ty: GLenum,
                                    offset: usize);
            fn tex_sub_image_3d(target: GLenum, level: GLint,
                                xoffset: GLint, yoffset: GLint, zoffset: GLint,
                                width: GLsizei, height: GLsizei, depth: GLsizei,
                                format: GLenum, ty: GLenum, data: &[u8]);
            fn uniform_1fv(location: GLint, values: &[f32]);
            fn uniform_2fv(location: GLint, values: &[f32]);
            fn uniform_3fv(location: GLint, values: &[f32]);
            fn uniform_4fv(location: GLint, values: &[f32]);
            fn uniform_1iv(location: GLint, values: &[i32]);
            fn uniform_2iv(location: GLint, values: &[i32]);
            fn uniform_3iv(location: GLint, values: &[i32]);
            fn uniform_4iv(location: GLint, values: &[i32]);
            fn use_program(program: GLuint);
            fn vertex_attrib_pointer(index: GLuint, size: GLint, type_: GLenum, normalized: bool,
                                     stride: GLsizei, offset: GLuint);
            fn viewport(x: GLint, y: GLint, width: GLsizei, height: GLsizei);
        }

        fn bind_buffer(&self, target: GLenum, buffer: GLuint) {
            self.log("bind_buffer", &[&target, &buffer]);
            self.bound_buffers.borrow_mut().insert(target, buffer);
        }

        fn buffer_data(&self, target: GLenum, size: GLsizeiptr, data: Option<&[u8]>, usage: GLenum) {
            self.log("buffer_data", &[&target, &size, &data.map(|d| d.len()), &usage]);
            let mut contents = data.map(|d| d.to_vec()).unwrap_or_default();
            contents.resize(size.max(0) as usize, 0);
            let buffer = self.bound_storage(target);
            self.buffer_storage.borrow_mut().insert(buffer, contents);
        }

        fn buffer_sub_data(&self, target: GLenum, offset: GLintptr, data: &[u8]) {
            self.log("buffer_sub_data", &[&target, &offset, &data.len()]);
            let buffer = self.bound_storage(target);
            let mut storage = self.buffer_storage.borrow_mut();
            let contents = storage.entry(buffer).or_default();
            let start = offset.max(0) as usize;
            if contents.len() < start + data.len() {
                contents.resize(start + data.len(), 0);
            }
            contents[start..start + data.len()].copy_from_slice(data);
        }

        fn map_buffer_range(&self, target: GLenum, offset: GLintptr, length: GLsizeiptr,
                            access: GLbitfield) -> Option<DriverMapping> {
            self.log("map_buffer_range", &[&target, &offset, &length, &access]);
            let buffer = self.bound_storage(target);
            let mut storage = self.buffer_storage.borrow_mut();
            let contents = storage.get_mut(&buffer)?;
            let (start, len) = (offset.max(0) as usize, length.max(0) as usize);
            if start + len > contents.len() {
                return None;
            }
            // The storage isn't resized while mapped, so the pointer stays valid.
            let ptr = unsafe { contents.as_mut_ptr().add(start) };
            Some(unsafe { DriverMapping::new_unchecked(ptr as *mut _, len) })
        }

        fn unmap_buffer(&self, target: GLenum) -> bool {
            self.log("unmap_buffer", &[&target]);
            true
        }

        fn create_program(&self) -> GLuint {
            self.log("create_program", &[]);
            let mut next = self.next_name.borrow_mut();
            *next += 1;
            *next
        }

        fn create_shader(&self, shader_type: GLenum) -> GLuint {
            self.log("create_shader", &[&shader_type]);
            let mut next = self.next_name.borrow_mut();
            *next += 1;
            *next
        }

        fn gen_buffers(&self, n: GLsizei) -> Vec<GLuint> { self.names("gen_buffers", n) }
        fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint> { self.names("gen_framebuffers", n) }
        fn gen_programs_arb(&self, n: GLsizei) -> Vec<GLuint> { self.names("gen_programs_arb", n) }
        fn gen_renderbuffers(&self, n: GLsizei) -> Vec<GLuint> { self.names("gen_renderbuffers", n) }
        fn gen_samplers(&self, n: GLsizei) -> Vec<GLuint> { self.names("gen_samplers", n) }
        fn gen_textures(&self, n: GLsizei) -> Vec<GLuint> { self.names("gen_textures", n) }

        fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
            self.log("get_uniform_location", &[&program, &name]);
            self.uniform_locations.borrow().get(&(program, name.to_string())).cloned().unwrap_or(-1)
        }
    }
}
