//! Saved frames, and replaying them.
//!
//! A trace file holds the snapshot of the context taken when capture began,
//! followed by the frame's packets. Replay happens in three steps:
//! `create_resources` makes a fresh object for everything in the snapshot,
//! `bind_resources` puts the bindings back, and `render` plays the packets.
//!
//! Object names in the trace are the application's. The driver we replay
//! on hands out its own, so every name passes through a `Remap` on its way
//! to the driver. Uniform locations get the same treatment, per program.

use gleam::gl::{self, GLenum, GLint, GLintptr, GLsizei, GLsizeiptr, GLuint};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::codec::{Checkpoint, Deserialize, Serialize};
use crate::command::{Command, Packet, Payload};
use crate::context::ContextState;
use crate::coverage::Coverage;
use crate::driver::Driver;
use crate::error::{Error, Result};

/// Written after the opening checkpoint in native byte order, so that a
/// trace read on a machine of the other endianness fails at once.
const ENDIAN_MARKER: u32 = 0x12345678;

/// Translation from the application's names for one kind of object to the
/// replay driver's.
#[derive(Clone, Debug, Default)]
pub struct HandleMap(HashMap<GLuint, GLuint>);

impl HandleMap {
    pub fn insert(&mut self, recorded: GLuint, replayed: GLuint) {
        if recorded != 0 {
            self.0.insert(recorded, replayed);
        }
    }

    /// Pair up names from a `glGen*` call with the driver's.
    pub fn insert_all(&mut self, recorded: &[GLuint], replayed: &[GLuint]) {
        for (&recorded, &replayed) in recorded.iter().zip(replayed) {
            self.insert(recorded, replayed);
        }
    }

    /// The driver's name for `recorded`. Zero stays zero, and so does
    /// anything we've never heard of.
    pub fn get(&self, recorded: GLuint) -> GLuint {
        self.0.get(&recorded).cloned().unwrap_or(0)
    }

    pub fn translate(&self, recorded: &[GLuint]) -> Vec<GLuint> {
        recorded.iter().map(|&name| self.get(name)).collect()
    }

    pub fn remove(&mut self, recorded: GLuint) {
        self.0.remove(&recorded);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Remap {
    pub textures: HandleMap,
    pub buffers: HandleMap,
    pub shaders: HandleMap,
    pub programs: HandleMap,
    pub programs_arb: HandleMap,
    pub renderbuffers: HandleMap,
    pub framebuffers: HandleMap,
    pub samplers: HandleMap,
    /// For each recorded program, recorded uniform location to replayed.
    pub uniforms: HashMap<GLuint, HashMap<GLint, GLint>>,
}

impl Remap {
    /// The replay location for `location` in the recorded program `program`,
    /// or -1 if there isn't one.
    pub fn uniform_location(&self, program: GLuint, location: GLint) -> GLint {
        self.uniforms.get(&program)
            .and_then(|locations| locations.get(&location))
            .cloned()
            .unwrap_or(-1)
    }
}

/// The bits of context state `render` has to follow itself, in recorded terms.
struct Cursor {
    active_texture: GLenum,
    program: GLuint,
}

pub struct Trace {
    pub state: ContextState,
    pub packets: Vec<Packet>,
    pub remap: Remap,
}

impl Trace {
    pub fn new(state: ContextState, packets: Vec<Packet>) -> Trace {
        Trace { state, packets, remap: Remap::default() }
    }

    pub fn save<W: Write>(&self, stream: &mut W) -> Result<()> {
        Checkpoint("GLTrace").write(stream)?;
        stream.write_all(&ENDIAN_MARKER.to_ne_bytes())?;
        self.state.serialize(stream)?;
        self.packets.serialize(stream)
    }

    pub fn load<R: Read>(stream: &mut R) -> Result<Trace> {
        Checkpoint("GLTrace").read(stream)?;
        let mut marker = [0_u8; 4];
        stream.read_exact(&mut marker)?;
        if u32::from_ne_bytes(marker) != ENDIAN_MARKER {
            return Err(Error::corruption("trace was written with a different byte order"));
        }

        let state = ContextState::deserialize(stream)?;
        let packets: Vec<Packet> = Deserialize::deserialize(stream)?;
        let last = packets.len().saturating_sub(1);
        if let Some(i) = packets.iter().position(|p| matches!(p.command, Command::sentinel {})) {
            if i != last {
                return Err(Error::corruption(format!("sentinel at packet {} of {}",
                                                     i, packets.len())));
            }
        }
        Ok(Trace::new(state, packets))
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut stream = BufWriter::new(File::create(path)?);
        self.save(&mut stream)?;
        stream.flush()?;
        Ok(())
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Trace> {
        let mut stream = BufReader::new(File::open(path)?);
        Trace::load(&mut stream)
    }

    /// Make a replay-side object for every object in the snapshot.
    pub fn create_resources(&mut self, driver: &dyn Driver) {
        let state = &self.state;
        let remap = &mut self.remap;

        for (&handle, texture) in &state.textures {
            remap.textures.insert(handle, texture.create(driver));
        }
        for (&handle, buffer) in &state.buffers {
            remap.buffers.insert(handle, buffer.create(driver));
        }
        for (&handle, shader) in &state.shaders {
            remap.shaders.insert(handle, shader.create(driver));
        }
        for (&handle, program) in &state.programs {
            let (replayed, locations) = program.create(driver, remap);
            remap.programs.insert(handle, replayed);
            remap.uniforms.insert(handle, locations);
        }
        for (&handle, program) in &state.programs_arb {
            remap.programs_arb.insert(handle, program.create(driver));
        }
        for (&handle, renderbuffer) in &state.renderbuffers {
            remap.renderbuffers.insert(handle, renderbuffer.create(driver));
        }
        for (&handle, framebuffer) in &state.framebuffers {
            let replayed = framebuffer.create(driver, remap);
            remap.framebuffers.insert(handle, replayed);
        }
        for (&handle, sampler) in &state.samplers {
            remap.samplers.insert(handle, sampler.create(driver));
        }

        log::debug!("gl-trace: created {} textures, {} buffers, {} programs, {} framebuffers",
                    remap.textures.len(), remap.buffers.len(), remap.programs.len(),
                    remap.framebuffers.len());
    }

    /// Restore the snapshot's bindings. Call this after `create_resources`.
    pub fn bind_resources(&self, driver: &dyn Driver) {
        let state = &self.state;
        let remap = &self.remap;

        for (&(unit, target), &texture) in &state.texture_units {
            driver.active_texture(unit);
            driver.bind_texture(target, remap.textures.get(texture));
        }
        state.pixel_store.apply(driver);
        state.pixel_transfer.apply(driver);
        for (&target, &buffer) in &state.buffer_bindings {
            driver.bind_buffer(target, remap.buffers.get(buffer));
        }
        driver.use_program(remap.programs.get(state.current_program));
        for (&target, &program) in &state.program_arb_bindings {
            driver.bind_program_arb(target, remap.programs_arb.get(program));
        }
        for (&target, &renderbuffer) in &state.renderbuffer_bindings {
            driver.bind_renderbuffer(target, remap.renderbuffers.get(renderbuffer));
        }

        // This binds framebuffer zero, to set up the default framebuffer's
        // draw and read buffers, and ends with the right unit active.
        state.restore(driver);
        for (&target, &framebuffer) in &state.framebuffer_bindings {
            driver.bind_framebuffer(target, remap.framebuffers.get(framebuffer));
        }
        for (&unit, &sampler) in &state.sampler_bindings {
            driver.bind_sampler(unit, remap.samplers.get(sampler));
        }
    }

    /// Play the frame's packets on `driver`, stopping at the sentinel.
    pub fn render(&mut self, driver: &dyn Driver, coverage: &mut Coverage) {
        let mut cursor = Cursor {
            active_texture: self.state.active_texture,
            program: self.state.current_program,
        };
        for packet in &self.packets {
            log::trace!("gl-trace: replaying packet {}: {}", packet.id, packet.command.opcode().name());
            if !replay_one(driver, &mut self.remap, &mut cursor, &packet.command, coverage) {
                break;
            }
        }
    }

    /// Create, bind, and render.
    pub fn replay(&mut self, driver: &dyn Driver, coverage: &mut Coverage) {
        self.create_resources(driver);
        self.bind_resources(driver);
        self.render(driver, coverage);
    }
}

/// Write bytes the application stored through a mapping back into the
/// buffer bound to `target`, the same way.
fn write_mapped(driver: &dyn Driver, target: GLenum, offset: usize, contents: &[u8],
                coverage: &mut Coverage) {
    if contents.is_empty() {
        return;
    }
    match driver.map_buffer_range(target, offset as GLintptr, contents.len() as GLsizeiptr,
                                  gl::MAP_WRITE_BIT) {
        Some(mut mapping) => {
            mapping.write_at(0, contents);
            driver.unmap_buffer(target);
        }
        None => {
            coverage.warn_once("couldn't map a buffer to replay the application's writes to it");
        }
    }
}

/// Draw with indices the application passed from its own memory, by way of
/// a temporary element array buffer.
fn draw_client_elements(driver: &dyn Driver, mode: GLenum, count: GLsizei, element_type: GLenum,
                        indices: &[u8]) {
    let temp = match driver.gen_buffers(1).first() {
        Some(&temp) => temp,
        None => return,
    };
    driver.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, temp);
    driver.buffer_data(gl::ELEMENT_ARRAY_BUFFER, indices.len() as GLsizeiptr, Some(indices),
                       gl::STREAM_DRAW);
    driver.draw_elements(mode, count, element_type, 0);
    // The indices came from client memory, so nothing was bound before.
    driver.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, 0);
    driver.delete_buffers(&[temp]);
}

/// Replay one command. Return false at the end of the frame.
#[rustfmt::skip]
fn replay_one(driver: &dyn Driver, remap: &mut Remap, cursor: &mut Cursor, command: &Command,
              coverage: &mut Coverage) -> bool {
    use Command::*;

    // Pass a call through with its arguments unchanged.
    macro_rules! simple {
        ( $method:ident ( $( $arg:ident ),* ) ) => { driver.$method( $( *$arg ),* ) }
    }

    match command {
        active_texture { texture } => {
            cursor.active_texture = *texture;
            driver.active_texture(*texture);
        }
        attach_shader { program, shader } => {
            driver.attach_shader(remap.programs.get(*program), remap.shaders.get(*shader));
        }
        bind_attrib_location { program, index, name } => {
            driver.bind_attrib_location(remap.programs.get(*program), *index, &name.string());
        }
        bind_buffer { target, buffer } => driver.bind_buffer(*target, remap.buffers.get(*buffer)),
        bind_framebuffer { target, framebuffer } => {
            driver.bind_framebuffer(*target, remap.framebuffers.get(*framebuffer));
        }
        bind_multi_texture_ext { texunit, target, texture } => {
            driver.active_texture(*texunit);
            driver.bind_texture(*target, remap.textures.get(*texture));
            driver.active_texture(cursor.active_texture);
        }
        bind_program_arb { target, program } => {
            driver.bind_program_arb(*target, remap.programs_arb.get(*program));
        }
        bind_renderbuffer { target, renderbuffer } => {
            driver.bind_renderbuffer(*target, remap.renderbuffers.get(*renderbuffer));
        }
        bind_sampler { unit, sampler } => driver.bind_sampler(*unit, remap.samplers.get(*sampler)),
        bind_texture { target, texture } => driver.bind_texture(*target, remap.textures.get(*texture)),
        blend_equation { mode } => simple!(blend_equation(mode)),
        blend_func { sfactor, dfactor } => simple!(blend_func(sfactor, dfactor)),
        buffer_data { target, size, data, usage } => {
            driver.buffer_data(*target, *size, data.bytes(), *usage);
        }
        buffer_sub_data { target, offset, data, .. } => {
            if let Some(bytes) = data.bytes() {
                driver.buffer_sub_data(*target, *offset, bytes);
            }
        }
        clear { mask } => simple!(clear(mask)),
        clear_color { r, g, b, a } => simple!(clear_color(r, g, b, a)),
        clear_depth { depth } => simple!(clear_depth(depth)),
        clear_stencil { s } => simple!(clear_stencil(s)),
        clip_plane { plane, equation } => {
            if let [a, b, c, d] = equation.elements::<f64>()[..] {
                driver.clip_plane(*plane, &[a, b, c, d]);
            }
        }
        color_mask { r, g, b, a } => driver.color_mask(*r != 0, *g != 0, *b != 0, *a != 0),
        compile_shader { shader, .. } => driver.compile_shader(remap.shaders.get(*shader)),
        compressed_tex_image_2d { target, level, internal_format, width, height, border, data, .. } => {
            if let Payload::Offset(_) = data {
                coverage.unimplemented("compressed texture uploads from a pixel unpack buffer");
            } else {
                driver.compressed_tex_image_2d(*target, *level, *internal_format, *width, *height,
                                               *border, data.bytes().unwrap_or(&[]));
            }
        }
        create_program { program } => remap.programs.insert(*program, driver.create_program()),
        create_shader { shader_type, shader } => {
            remap.shaders.insert(*shader, driver.create_shader(*shader_type));
        }
        cull_face { mode } => simple!(cull_face(mode)),
        delete_buffers { buffers, .. } => {
            let names = buffers.elements::<GLuint>();
            driver.delete_buffers(&remap.buffers.translate(&names));
            names.iter().for_each(|&name| remap.buffers.remove(name));
        }
        delete_framebuffers { framebuffers, .. } => {
            let names = framebuffers.elements::<GLuint>();
            driver.delete_framebuffers(&remap.framebuffers.translate(&names));
            names.iter().for_each(|&name| remap.framebuffers.remove(name));
        }
        delete_program { program } => {
            driver.delete_program(remap.programs.get(*program));
            remap.programs.remove(*program);
            remap.uniforms.remove(program);
        }
        delete_programs_arb { programs, .. } => {
            let names = programs.elements::<GLuint>();
            driver.delete_programs_arb(&remap.programs_arb.translate(&names));
            names.iter().for_each(|&name| remap.programs_arb.remove(name));
        }
        delete_renderbuffers { renderbuffers, .. } => {
            let names = renderbuffers.elements::<GLuint>();
            driver.delete_renderbuffers(&remap.renderbuffers.translate(&names));
            names.iter().for_each(|&name| remap.renderbuffers.remove(name));
        }
        delete_samplers { samplers, .. } => {
            let names = samplers.elements::<GLuint>();
            driver.delete_samplers(&remap.samplers.translate(&names));
            names.iter().for_each(|&name| remap.samplers.remove(name));
        }
        delete_shader { shader } => {
            driver.delete_shader(remap.shaders.get(*shader));
            remap.shaders.remove(*shader);
        }
        delete_textures { textures, .. } => {
            let names = textures.elements::<GLuint>();
            driver.delete_textures(&remap.textures.translate(&names));
            names.iter().for_each(|&name| remap.textures.remove(name));
        }
        depth_func { func } => simple!(depth_func(func)),
        depth_mask { flag } => driver.depth_mask(*flag != 0),
        detach_shader { program, shader } => {
            driver.detach_shader(remap.programs.get(*program), remap.shaders.get(*shader));
        }
        disable { cap } => simple!(disable(cap)),
        disable_vertex_attrib_array { index } => simple!(disable_vertex_attrib_array(index)),
        draw_arrays { mode, first, count } => simple!(draw_arrays(mode, first, count)),
        draw_buffer { buf } => driver.draw_buffers(&[*buf]),
        draw_buffers { bufs, .. } => driver.draw_buffers(&bufs.elements::<GLenum>()),
        draw_elements { mode, count, element_type, indices } => match indices {
            Payload::Offset(offset) => {
                driver.draw_elements(*mode, *count, *element_type, *offset as GLuint);
            }
            Payload::Bytes(bytes) => draw_client_elements(driver, *mode, *count, *element_type, bytes),
            _ => (),
        },
        enable { cap } => simple!(enable(cap)),
        enable_vertex_attrib_array { index } => simple!(enable_vertex_attrib_array(index)),
        finish {} => driver.finish(),
        flush {} => driver.flush(),
        flush_mapped_buffer_range { target, offset, contents, .. } => {
            write_mapped(driver, *target, *offset as usize, contents, coverage);
        }
        framebuffer_renderbuffer { target, attachment, renderbuffertarget, renderbuffer } => {
            driver.framebuffer_renderbuffer(*target, *attachment, *renderbuffertarget,
                                            remap.renderbuffers.get(*renderbuffer));
        }
        framebuffer_texture_2d { target, attachment, textarget, texture, level } => {
            driver.framebuffer_texture_2d(*target, *attachment, *textarget,
                                          remap.textures.get(*texture), *level);
        }
        framebuffer_texture_layer { target, attachment, texture, level, layer } => {
            driver.framebuffer_texture_layer(*target, *attachment, remap.textures.get(*texture),
                                             *level, *layer);
        }
        front_face { mode } => simple!(front_face(mode)),
        gen_buffers { names } => {
            remap.buffers.insert_all(names, &driver.gen_buffers(names.len() as GLsizei));
        }
        gen_framebuffers { names } => {
            remap.framebuffers.insert_all(names, &driver.gen_framebuffers(names.len() as GLsizei));
        }
        gen_programs_arb { names } => {
            remap.programs_arb.insert_all(names, &driver.gen_programs_arb(names.len() as GLsizei));
        }
        gen_renderbuffers { names } => {
            remap.renderbuffers.insert_all(names, &driver.gen_renderbuffers(names.len() as GLsizei));
        }
        gen_samplers { names } => {
            remap.samplers.insert_all(names, &driver.gen_samplers(names.len() as GLsizei));
        }
        gen_textures { names } => {
            remap.textures.insert_all(names, &driver.gen_textures(names.len() as GLsizei));
        }
        get_uniform_location { program, name, location } => {
            if *location != -1 {
                let replayed = driver.get_uniform_location(remap.programs.get(*program),
                                                           &name.string());
                remap.uniforms.entry(*program).or_default().insert(*location, replayed);
            }
        }
        line_width { width } => simple!(line_width(width)),
        link_program { program, .. } => driver.link_program(remap.programs.get(*program)),
        // What the application writes arrives with the unmap or flush.
        map_buffer { .. } | map_buffer_range { .. } => (),
        pixel_store_f { pname, param } => simple!(pixel_store_f(pname, param)),
        pixel_store_i { pname, param } => simple!(pixel_store_i(pname, param)),
        pixel_transfer_f { pname, param } => simple!(pixel_transfer_f(pname, param)),
        pixel_transfer_i { pname, param } => simple!(pixel_transfer_i(pname, param)),
        program_string_arb { target, format, string, .. } => {
            driver.program_string_arb(*target, *format, string.bytes().unwrap_or(&[]));
        }
        read_buffer { mode } => simple!(read_buffer(mode)),
        renderbuffer_storage { target, internal_format, width, height } => {
            simple!(renderbuffer_storage(target, internal_format, width, height))
        }
        renderbuffer_storage_multisample { target, samples, internal_format, width, height } => {
            simple!(renderbuffer_storage_multisample(target, samples, internal_format, width, height))
        }
        sampler_parameter_f { sampler, pname, param } => {
            driver.sampler_parameter_f(remap.samplers.get(*sampler), *pname, *param);
        }
        sampler_parameter_fv { sampler, pname, params } => {
            driver.sampler_parameter_fv(remap.samplers.get(*sampler), *pname, &params.elements());
        }
        sampler_parameter_i { sampler, pname, param } => {
            driver.sampler_parameter_i(remap.samplers.get(*sampler), *pname, *param);
        }
        scissor { x, y, width, height } => simple!(scissor(x, y, width, height)),
        shader_source { shader, sources } => {
            let strings: Vec<&[u8]> = sources.iter().map(|s| s.as_bytes()).collect();
            driver.shader_source(remap.shaders.get(*shader), &strings);
        }
        tex_image_2d { target, level, internal_format, width, height, border, format, pixel_type,
                       pixels } => {
            if pixels.offset() != 0 {
                coverage.unimplemented("glTexImage2D from a nonzero pixel unpack buffer offset");
            } else {
                driver.tex_image_2d(*target, *level, *internal_format, *width, *height, *border,
                                    *format, *pixel_type, pixels.bytes());
            }
        }
        tex_image_3d { target, level, internal_format, width, height, depth, border, format,
                       pixel_type, pixels } => {
            if pixels.offset() != 0 {
                coverage.unimplemented("glTexImage3D from a nonzero pixel unpack buffer offset");
            } else {
                driver.tex_image_3d(*target, *level, *internal_format, *width, *height, *depth,
                                    *border, *format, *pixel_type, pixels.bytes());
            }
        }
        tex_parameter_f { target, pname, param } => simple!(tex_parameter_f(target, pname, param)),
        tex_parameter_fv { target, pname, params } => {
            driver.tex_parameter_fv(*target, *pname, &params.elements());
        }
        tex_parameter_i { target, pname, param } => simple!(tex_parameter_i(target, pname, param)),
        tex_parameter_iv { target, pname, params } => match params.elements::<GLint>()[..] {
            [param] => driver.tex_parameter_i(*target, *pname, param),
            _ => { coverage.unimplemented("glTexParameteriv with several values"); }
        },
        tex_sub_image_2d { target, level, xoffset, yoffset, width, height, format, pixel_type,
                           pixels } => match pixels {
            Payload::Offset(offset) => {
                driver.tex_sub_image_2d_pbo(*target, *level, *xoffset, *yoffset, *width, *height,
                                            *format, *pixel_type, *offset);
            }
            Payload::Bytes(bytes) => {
                driver.tex_sub_image_2d(*target, *level, *xoffset, *yoffset, *width, *height,
                                        *format, *pixel_type, bytes);
            }
            _ => (),
        },
        tex_sub_image_3d { target, level, xoffset, yoffset, zoffset, width, height, depth, format,
                           pixel_type, pixels } => match pixels {
            Payload::Bytes(bytes) => {
                driver.tex_sub_image_3d(*target, *level, *xoffset, *yoffset, *zoffset,
                                        *width, *height, *depth, *format, *pixel_type, bytes);
            }
            Payload::Offset(_) => {
                coverage.unimplemented("glTexSubImage3D from a pixel unpack buffer");
            }
            _ => (),
        },
        uniform_1f { location, v0 } => {
            driver.uniform_1fv(remap.uniform_location(cursor.program, *location), &[*v0]);
        }
        uniform_2f { location, v0, v1 } => {
            driver.uniform_2fv(remap.uniform_location(cursor.program, *location), &[*v0, *v1]);
        }
        uniform_3f { location, v0, v1, v2 } => {
            driver.uniform_3fv(remap.uniform_location(cursor.program, *location),
                               &[*v0, *v1, *v2]);
        }
        uniform_4f { location, v0, v1, v2, v3 } => {
            driver.uniform_4fv(remap.uniform_location(cursor.program, *location),
                               &[*v0, *v1, *v2, *v3]);
        }
        uniform_1i { location, v0 } => {
            driver.uniform_1iv(remap.uniform_location(cursor.program, *location), &[*v0]);
        }
        uniform_2i { location, v0, v1 } => {
            driver.uniform_2iv(remap.uniform_location(cursor.program, *location), &[*v0, *v1]);
        }
        uniform_3i { location, v0, v1, v2 } => {
            driver.uniform_3iv(remap.uniform_location(cursor.program, *location),
                               &[*v0, *v1, *v2]);
        }
        uniform_4i { location, v0, v1, v2, v3 } => {
            driver.uniform_4iv(remap.uniform_location(cursor.program, *location),
                               &[*v0, *v1, *v2, *v3]);
        }
        uniform_1fv { location, value, .. } => {
            driver.uniform_1fv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        uniform_2fv { location, value, .. } => {
            driver.uniform_2fv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        uniform_3fv { location, value, .. } => {
            driver.uniform_3fv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        uniform_4fv { location, value, .. } => {
            driver.uniform_4fv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        uniform_1iv { location, value, .. } => {
            driver.uniform_1iv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        uniform_2iv { location, value, .. } => {
            driver.uniform_2iv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        uniform_3iv { location, value, .. } => {
            driver.uniform_3iv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        uniform_4iv { location, value, .. } => {
            driver.uniform_4iv(remap.uniform_location(cursor.program, *location), &value.elements());
        }
        unmap_buffer { target, offset, contents } => {
            write_mapped(driver, *target, *offset, contents, coverage);
        }
        use_program { program } => {
            cursor.program = *program;
            driver.use_program(remap.programs.get(*program));
        }
        vertex_attrib_pointer { index, size, attrib_type, normalized, stride, pointer } => {
            match pointer {
                Payload::Offset(offset) => {
                    driver.vertex_attrib_pointer(*index, *size, *attrib_type, *normalized != 0,
                                                 *stride, *offset as GLuint);
                }
                _ => { coverage.unimplemented("client-side vertex arrays"); }
            }
        }
        viewport { x, y, width, height } => simple!(viewport(x, y, width, height)),
        message { level, text } => level.log(text),
        sentinel {} => return false,
    }
    true
}

impl Serialize for Trace {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.save(stream)
    }
}

impl Deserialize for Trace {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Trace> {
        Trace::load(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_bytes;
    use crate::command::Level;
    use crate::driver::mock::MockDriver;

    #[test]
    fn test_end_to_end() {
        let mut state = ContextState::default();
        state.gen_textures(&[1]);
        state.bind_texture(gl::TEXTURE_2D, 1);
        let pixels = vec![0x40_u8; 64 * 64 * 4];
        state.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA8 as GLint, 64, 64, 0,
                           gl::RGBA, gl::UNSIGNED_BYTE, Some(&pixels));
        state.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as GLint);

        let packets = vec![
            Packet { id: 0, command: Command::draw_arrays { mode: gl::TRIANGLES, first: 0, count: 3 } },
            Packet { id: 1, command: Command::sentinel {} },
        ];
        let bytes = to_bytes(&Trace::new(state, packets)).unwrap();
        let mut trace = Trace::load(&mut &bytes[..]).unwrap();

        let texture = &trace.state.textures[&1];
        assert_eq!(texture.updates.len(), 1);
        assert!(!texture.updates[0].sub_image);
        assert_eq!(texture.updates[0].pixels.as_ref().map(|p| p.len()), Some(16384));

        let driver = MockDriver::new();
        let mut coverage = Coverage::new();
        trace.replay(&driver, &mut coverage);
        let texture = trace.remap.textures.get(1);
        assert_ne!(texture, 0);
        assert!(driver.called(&format!("bind_texture({}, {})", gl::TEXTURE_2D, texture)));
        assert!(driver.called(&format!("tex_parameter_i({}, {}, {})", gl::TEXTURE_2D,
                                       gl::TEXTURE_MIN_FILTER, gl::NEAREST)));
        assert!(driver.called(&format!("draw_arrays({}, 0, 3)", gl::TRIANGLES)));
    }

    #[test]
    fn test_bad_header() {
        let mut bytes = vec![];
        Checkpoint("GLTrace").write(&mut bytes).unwrap();
        bytes.extend_from_slice(&ENDIAN_MARKER.swap_bytes().to_ne_bytes());
        assert!(matches!(Trace::load(&mut &bytes[..]), Err(Error::StreamCorruption(_))));

        let mut bytes = vec![];
        Checkpoint("NotATrace").write(&mut bytes).unwrap();
        assert!(matches!(Trace::load(&mut &bytes[..]), Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_misplaced_sentinel() {
        let packets = vec![
            Packet { id: 0, command: Command::sentinel {} },
            Packet { id: 1, command: Command::flush {} },
        ];
        let bytes = to_bytes(&Trace::new(ContextState::default(), packets)).unwrap();
        assert!(matches!(Trace::load(&mut &bytes[..]), Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_render_remaps_names() {
        let packets = vec![
            Command::gen_textures { names: vec![7] },
            Command::bind_texture { target: gl::TEXTURE_2D, texture: 7 },
            Command::create_program { program: 3 },
            Command::link_program { program: 3, linked: true },
            Command::get_uniform_location {
                program: 3, name: Payload::Bytes(b"tint\0".to_vec()), location: 5,
            },
            Command::use_program { program: 3 },
            Command::uniform_1f { location: 5, v0: 0.5 },
            Command::uniform_1f { location: 6, v0: 0.25 },
            Command::delete_textures { n: 1, textures: Payload::Bytes(vec![7, 0, 0, 0]) },
            Command::message { level: Level::Info, text: "done".into() },
            Command::sentinel {},
            Command::clear { mask: gl::COLOR_BUFFER_BIT },
        ];
        let packets = packets.into_iter().enumerate()
            .map(|(id, command)| Packet { id: id as u64, command })
            .collect();
        let mut trace = Trace::new(ContextState::default(), packets);

        // Nothing in the snapshot, so the driver's names start with the packets.
        let driver = MockDriver::new();
        driver.set_uniform_location(102, "tint", 9);
        let mut coverage = Coverage::new();
        trace.render(&driver, &mut coverage);

        assert!(driver.called(&format!("bind_texture({}, 101)", gl::TEXTURE_2D)));
        assert!(driver.called("use_program(102)"));
        assert!(driver.called("uniform_1fv(9, [0.5])"));
        assert!(driver.called("uniform_1fv(-1, [0.25])"));
        assert!(driver.called("delete_textures([101])"));
        assert_eq!(trace.remap.textures.get(7), 0);
        assert!(!driver.called("clear("));
    }

    #[test]
    fn test_render_buffer_writes() {
        let mut state = ContextState::default();
        state.gen_buffers(&[2]);
        state.bind_buffer(gl::ARRAY_BUFFER, 2);
        state.buffer_data(gl::ARRAY_BUFFER, 8, None, gl::DYNAMIC_DRAW);

        let packets = vec![
            Packet { id: 0, command: Command::map_buffer { target: gl::ARRAY_BUFFER,
                                                           access: gl::WRITE_ONLY } },
            Packet { id: 1, command: Command::unmap_buffer { target: gl::ARRAY_BUFFER, offset: 4,
                                                             contents: vec![1, 2, 3, 4] } },
        ];
        let mut trace = Trace::new(state, packets);
        let driver = MockDriver::new();
        let mut coverage = Coverage::new();
        trace.replay(&driver, &mut coverage);

        let buffer = trace.remap.buffers.get(2);
        assert_eq!(driver.buffer_contents(buffer), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(driver.called(&format!("unmap_buffer({})", gl::ARRAY_BUFFER)));
    }

    #[test]
    fn test_handle_map() {
        let mut map = HandleMap::default();
        map.insert_all(&[1, 0, 2], &[10, 11, 12]);
        assert_eq!(map.translate(&[2, 1, 0, 5]), vec![12, 10, 0, 0]);
        map.remove(1);
        assert_eq!(map.get(1), 0);
        assert_eq!(map.len(), 1);
    }
}
