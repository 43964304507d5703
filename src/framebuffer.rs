//! Framebuffer and renderbuffer objects.

use gleam::gl::{self, GLenum, GLint, GLsizei, GLuint};
use std::collections::BTreeMap;
use std::io;

use crate::codec::{Deserialize, Serialize};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::trace::Remap;

/// What is attached at one attachment point of a framebuffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Attachment {
    Renderbuffer { renderbuffertarget: GLenum, renderbuffer: GLuint },
    Texture2D { textarget: GLenum, texture: GLuint, level: GLint },
    TextureLayer { texture: GLuint, level: GLint, layer: GLint },
}

impl Attachment {
    /// Attach the replay-time counterpart of this at `attachment` on the
    /// framebuffer bound to `GL_FRAMEBUFFER`.
    pub fn create(&self, driver: &dyn Driver, attachment: GLenum, remap: &Remap) {
        match *self {
            Attachment::Renderbuffer { renderbuffertarget, renderbuffer } => {
                driver.framebuffer_renderbuffer(gl::FRAMEBUFFER, attachment, renderbuffertarget,
                                                remap.renderbuffers.get(renderbuffer));
            }
            Attachment::Texture2D { textarget, texture, level } => {
                driver.framebuffer_texture_2d(gl::FRAMEBUFFER, attachment, textarget,
                                              remap.textures.get(texture), level);
            }
            Attachment::TextureLayer { texture, level, layer } => {
                driver.framebuffer_texture_layer(gl::FRAMEBUFFER, attachment,
                                                 remap.textures.get(texture), level, layer);
            }
        }
    }
}

impl Serialize for Attachment {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        match *self {
            Attachment::Renderbuffer { renderbuffertarget, renderbuffer } => {
                1_u8.serialize(stream)?;
                renderbuffertarget.serialize(stream)?;
                renderbuffer.serialize(stream)
            }
            Attachment::Texture2D { textarget, texture, level } => {
                2_u8.serialize(stream)?;
                textarget.serialize(stream)?;
                texture.serialize(stream)?;
                level.serialize(stream)
            }
            Attachment::TextureLayer { texture, level, layer } => {
                3_u8.serialize(stream)?;
                texture.serialize(stream)?;
                level.serialize(stream)?;
                layer.serialize(stream)
            }
        }
    }
}

impl Deserialize for Attachment {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Attachment> {
        match u8::deserialize(stream)? {
            1 => Ok(Attachment::Renderbuffer {
                renderbuffertarget: Deserialize::deserialize(stream)?,
                renderbuffer: Deserialize::deserialize(stream)?,
            }),
            2 => Ok(Attachment::Texture2D {
                textarget: Deserialize::deserialize(stream)?,
                texture: Deserialize::deserialize(stream)?,
                level: Deserialize::deserialize(stream)?,
            }),
            3 => Ok(Attachment::TextureLayer {
                texture: Deserialize::deserialize(stream)?,
                level: Deserialize::deserialize(stream)?,
                layer: Deserialize::deserialize(stream)?,
            }),
            tag => Err(Error::corruption(format!("invalid framebuffer attachment tag {}", tag))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Framebuffer {
    pub attachments: BTreeMap<GLenum, Attachment>,
    /// Empty if never set.
    pub draw_buffers: Vec<GLenum>,
    /// `GL_NONE` if never set.
    pub read_buffer: GLenum,
}

impl Framebuffer {
    pub fn new() -> Framebuffer {
        Framebuffer::default()
    }

    fn attach(&mut self, attachment: GLenum, handle: GLuint, what: Attachment) {
        if handle == 0 {
            self.attachments.remove(&attachment);
        } else {
            self.attachments.insert(attachment, what);
        }
    }

    pub fn framebuffer_renderbuffer(&mut self, attachment: GLenum, renderbuffertarget: GLenum,
                                    renderbuffer: GLuint) {
        self.attach(attachment, renderbuffer,
                    Attachment::Renderbuffer { renderbuffertarget, renderbuffer });
    }

    pub fn framebuffer_texture_2d(&mut self, attachment: GLenum, textarget: GLenum,
                                  texture: GLuint, level: GLint) {
        self.attach(attachment, texture, Attachment::Texture2D { textarget, texture, level });
    }

    pub fn framebuffer_texture_layer(&mut self, attachment: GLenum, texture: GLuint,
                                     level: GLint, layer: GLint) {
        self.attach(attachment, texture, Attachment::TextureLayer { texture, level, layer });
    }

    pub fn draw_buffers(&mut self, bufs: &[GLenum]) {
        self.draw_buffers = bufs.to_vec();
    }

    pub fn read_buffer(&mut self, mode: GLenum) {
        self.read_buffer = mode;
    }

    /// Drop any attachments of the renderbuffer `renderbuffer`, which is being deleted.
    pub fn forget_renderbuffer(&mut self, renderbuffer: GLuint) {
        self.attachments.retain(|_, attached| match *attached {
            Attachment::Renderbuffer { renderbuffer: r, .. } => r != renderbuffer,
            _ => true,
        });
    }

    /// Drop any attachments of the texture `texture`, which is being deleted.
    pub fn forget_texture(&mut self, texture: GLuint) {
        self.attachments.retain(|_, attached| match *attached {
            Attachment::Texture2D { texture: t, .. } | Attachment::TextureLayer { texture: t, .. } => {
                t != texture
            }
            _ => true,
        });
    }

    /// Create a framebuffer like this one, attached to the replay-time
    /// counterparts of our attachments, and return its name.
    ///
    /// This leaves the new framebuffer bound to `GL_FRAMEBUFFER`.
    pub fn create(&self, driver: &dyn Driver, remap: &Remap) -> GLuint {
        let handle = match driver.gen_framebuffers(1).first() {
            Some(&handle) => handle,
            None => return 0,
        };
        driver.bind_framebuffer(gl::FRAMEBUFFER, handle);
        for (&attachment, attached) in &self.attachments {
            attached.create(driver, attachment, remap);
        }
        if !self.draw_buffers.is_empty() {
            driver.draw_buffers(&self.draw_buffers);
        }
        if self.read_buffer != gl::NONE {
            driver.read_buffer(self.read_buffer);
        }
        handle
    }
}

impl Serialize for Framebuffer {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.attachments.serialize(stream)?;
        self.draw_buffers.serialize(stream)?;
        self.read_buffer.serialize(stream)
    }
}

impl Deserialize for Framebuffer {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Framebuffer> {
        Ok(Framebuffer {
            attachments: Deserialize::deserialize(stream)?,
            draw_buffers: Deserialize::deserialize(stream)?,
            read_buffer: Deserialize::deserialize(stream)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Renderbuffer {
    pub target: GLenum,
    pub samples: GLsizei,
    pub internal_format: GLenum,
    pub width: GLsizei,
    pub height: GLsizei,
}

impl Renderbuffer {
    pub fn new(target: GLenum) -> Renderbuffer {
        Renderbuffer { target, ..Renderbuffer::default() }
    }

    pub fn renderbuffer_storage_multisample(&mut self, target: GLenum, samples: GLsizei,
                                            internal_format: GLenum,
                                            width: GLsizei, height: GLsizei) {
        *self = Renderbuffer { target, samples, internal_format, width, height };
    }

    pub fn create(&self, driver: &dyn Driver) -> GLuint {
        let handle = match driver.gen_renderbuffers(1).first() {
            Some(&handle) => handle,
            None => return 0,
        };
        if self.target == 0 {
            return handle;
        }
        driver.bind_renderbuffer(self.target, handle);
        if self.width > 0 && self.height > 0 {
            if self.samples > 0 {
                driver.renderbuffer_storage_multisample(self.target, self.samples,
                                                        self.internal_format,
                                                        self.width, self.height);
            } else {
                driver.renderbuffer_storage(self.target, self.internal_format,
                                            self.width, self.height);
            }
        }
        handle
    }
}

impl Serialize for Renderbuffer {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.target.serialize(stream)?;
        self.samples.serialize(stream)?;
        self.internal_format.serialize(stream)?;
        self.width.serialize(stream)?;
        self.height.serialize(stream)
    }
}

impl Deserialize for Renderbuffer {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Renderbuffer> {
        Ok(Renderbuffer {
            target: Deserialize::deserialize(stream)?,
            samples: Deserialize::deserialize(stream)?,
            internal_format: Deserialize::deserialize(stream)?,
            width: Deserialize::deserialize(stream)?,
            height: Deserialize::deserialize(stream)?,
        })
    }
}
