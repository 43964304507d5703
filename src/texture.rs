//! Texture objects and their upload history.
//!
//! We don't try to model a texture's contents as an image. Instead, a
//! `Texture` keeps the list of upload calls that produced its current
//! contents, each with its own copy of the pixels and the pixel store state
//! it was made under. To re-create the texture, we simply make those calls
//! again, in order.
//!
//! The list is pruned as it grows: a full-image upload (`glTexImage2D` and
//! friends) replaces everything previously uploaded to the same level of the
//! same target, sub-image updates included. Sub-image updates are always
//! appended.

use gleam::gl::{self, GLenum, GLfloat, GLint, GLsizei, GLuint};
use std::io;

use crate::codec::{Deserialize, Serialize};
use crate::driver::Driver;
use crate::error::Result;
use crate::pixels::{PixelStore, PixelTransfer};
use crate::sampler::{ParamValue, SamplerParams};

/// One upload call, with everything needed to make it again.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureUpdate {
    pub target: GLenum,
    pub level: GLint,
    pub internal_format: GLint,
    pub xoffset: GLint,
    pub yoffset: GLint,
    pub zoffset: GLint,
    pub width: GLsizei,
    pub height: GLsizei,
    /// Present for three-dimensional uploads.
    pub depth: Option<GLsizei>,
    pub border: GLint,
    /// For compressed uploads, this is zero; `internal_format` says it all.
    pub format: GLenum,
    pub pixel_type: GLenum,
    pub pixel_store: PixelStore,
    pub pixel_transfer: PixelTransfer,
    /// `None` means the texels are undefined: the application passed a null
    /// pointer, or the data came from a pixel unpack buffer.
    pub pixels: Option<Vec<u8>>,
    pub compressed: bool,
    pub sub_image: bool,
}

impl TextureUpdate {
    /// Make this upload on `driver`, into the texture currently bound to `self.target`.
    pub fn upload(&self, driver: &dyn Driver) {
        self.pixel_store.apply(driver);
        self.pixel_transfer.apply(driver);

        let pixels = self.pixels.as_deref();
        match (self.sub_image, self.compressed, self.depth) {
            (false, true, _) => {
                driver.compressed_tex_image_2d(self.target, self.level, self.internal_format as GLenum,
                                               self.width, self.height, self.border,
                                               pixels.unwrap_or(&[]));
            }
            (false, false, None) => {
                driver.tex_image_2d(self.target, self.level, self.internal_format,
                                    self.width, self.height, self.border,
                                    self.format, self.pixel_type, pixels);
            }
            (false, false, Some(depth)) => {
                driver.tex_image_3d(self.target, self.level, self.internal_format,
                                    self.width, self.height, depth, self.border,
                                    self.format, self.pixel_type, pixels);
            }
            (true, _, None) => {
                if let Some(pixels) = pixels {
                    driver.tex_sub_image_2d(self.target, self.level, self.xoffset, self.yoffset,
                                            self.width, self.height,
                                            self.format, self.pixel_type, pixels);
                }
            }
            (true, _, Some(depth)) => {
                if let Some(pixels) = pixels {
                    driver.tex_sub_image_3d(self.target, self.level,
                                            self.xoffset, self.yoffset, self.zoffset,
                                            self.width, self.height, depth,
                                            self.format, self.pixel_type, pixels);
                }
            }
        }
    }
}

impl Serialize for TextureUpdate {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.target.serialize(stream)?;
        self.level.serialize(stream)?;
        self.internal_format.serialize(stream)?;
        self.xoffset.serialize(stream)?;
        self.yoffset.serialize(stream)?;
        self.zoffset.serialize(stream)?;
        self.width.serialize(stream)?;
        self.height.serialize(stream)?;
        self.depth.serialize(stream)?;
        self.border.serialize(stream)?;
        self.format.serialize(stream)?;
        self.pixel_type.serialize(stream)?;
        self.pixel_store.serialize(stream)?;
        self.pixel_transfer.serialize(stream)?;
        self.pixels.serialize(stream)?;
        self.compressed.serialize(stream)?;
        self.sub_image.serialize(stream)
    }
}

impl Deserialize for TextureUpdate {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<TextureUpdate> {
        Ok(TextureUpdate {
            target: Deserialize::deserialize(stream)?,
            level: Deserialize::deserialize(stream)?,
            internal_format: Deserialize::deserialize(stream)?,
            xoffset: Deserialize::deserialize(stream)?,
            yoffset: Deserialize::deserialize(stream)?,
            zoffset: Deserialize::deserialize(stream)?,
            width: Deserialize::deserialize(stream)?,
            height: Deserialize::deserialize(stream)?,
            depth: Deserialize::deserialize(stream)?,
            border: Deserialize::deserialize(stream)?,
            format: Deserialize::deserialize(stream)?,
            pixel_type: Deserialize::deserialize(stream)?,
            pixel_store: Deserialize::deserialize(stream)?,
            pixel_transfer: Deserialize::deserialize(stream)?,
            pixels: Deserialize::deserialize(stream)?,
            compressed: Deserialize::deserialize(stream)?,
            sub_image: Deserialize::deserialize(stream)?,
        })
    }
}

/// A texture object.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    /// Zero until the texture is first bound.
    pub target: GLenum,
    pub sampling: SamplerParams,
    pub base_level: GLint,
    pub max_level: GLint,
    pub priority: GLfloat,
    pub depth_texture_mode: GLenum,
    pub generate_mipmap: GLint,
    pub updates: Vec<TextureUpdate>,
}

impl Default for Texture {
    fn default() -> Texture {
        Texture {
            target: 0,
            sampling: SamplerParams::default(),
            base_level: 0,
            max_level: 1000,
            priority: 1.0,
            depth_texture_mode: gl::LUMINANCE,
            generate_mipmap: 0,
            updates: vec![],
        }
    }
}

impl Texture {
    pub fn new(target: GLenum) -> Texture {
        Texture { target, ..Texture::default() }
    }

    /// Record an upload, pruning the updates it supersedes.
    pub fn append_update(&mut self, update: TextureUpdate) {
        if !update.sub_image {
            self.updates.retain(|old| (old.level, old.target) != (update.level, update.target));
        }
        self.updates.push(update);
    }

    /// A copy of this texture with its update history, but none of the texels.
    pub fn without_pixels(&self) -> Texture {
        let mut copy = self.clone();
        for update in &mut copy.updates {
            update.pixels = None;
        }
        copy
    }

    fn set(&mut self, pname: GLenum, value: ParamValue) {
        if self.sampling.set(pname, value) {
            return;
        }
        let (int, float) = match value {
            ParamValue::Int(i) => (i, i as GLfloat),
            ParamValue::Float(f) => (f as GLint, f),
            ParamValue::Color(_) => return,
        };
        match pname {
            gl::TEXTURE_BASE_LEVEL => self.base_level = int,
            gl::TEXTURE_MAX_LEVEL => self.max_level = int,
            gl::TEXTURE_PRIORITY => self.priority = float,
            gl::DEPTH_TEXTURE_MODE => self.depth_texture_mode = int as GLenum,
            gl::GENERATE_MIPMAP => self.generate_mipmap = int,
            // The driver will reject anything else.
            _ => (),
        }
    }

    pub fn tex_parameter_i(&mut self, pname: GLenum, param: GLint) {
        self.set(pname, ParamValue::Int(param));
    }

    pub fn tex_parameter_f(&mut self, pname: GLenum, param: GLfloat) {
        self.set(pname, ParamValue::Float(param));
    }

    pub fn tex_parameter_fv(&mut self, pname: GLenum, params: &[GLfloat]) {
        if !self.sampling.set_fv(pname, params) {
            if let Some(&param) = params.first() {
                self.set(pname, ParamValue::Float(param));
            }
        }
    }

    pub fn tex_parameter_iv(&mut self, pname: GLenum, params: &[GLint]) {
        if !self.sampling.set_iv(pname, params) {
            if let Some(&param) = params.first() {
                self.set(pname, ParamValue::Int(param));
            }
        }
    }

    /// Create a texture with this state on `driver`, and return its name.
    ///
    /// This leaves the new texture bound to its target on the active texture unit.
    pub fn create(&self, driver: &dyn Driver) -> GLuint {
        let handle = match driver.gen_textures(1).first() {
            Some(&handle) => handle,
            None => return 0,
        };
        if self.target == 0 {
            // Never bound, so never given contents or parameters.
            return handle;
        }

        driver.bind_texture(self.target, handle);
        for update in &self.updates {
            update.upload(driver);
        }

        let target = self.target;
        self.sampling.for_each(|pname, value| match value {
            ParamValue::Int(i) => driver.tex_parameter_i(target, pname, i),
            ParamValue::Float(f) => driver.tex_parameter_f(target, pname, f),
            ParamValue::Color(c) => driver.tex_parameter_fv(target, pname, &c),
        });
        driver.tex_parameter_i(target, gl::TEXTURE_BASE_LEVEL, self.base_level);
        driver.tex_parameter_i(target, gl::TEXTURE_MAX_LEVEL, self.max_level);
        handle
    }
}

impl Serialize for Texture {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.target.serialize(stream)?;
        self.sampling.serialize(stream)?;
        self.base_level.serialize(stream)?;
        self.max_level.serialize(stream)?;
        self.priority.serialize(stream)?;
        self.depth_texture_mode.serialize(stream)?;
        self.generate_mipmap.serialize(stream)?;
        self.updates.serialize(stream)
    }
}

impl Deserialize for Texture {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Texture> {
        Ok(Texture {
            target: Deserialize::deserialize(stream)?,
            sampling: Deserialize::deserialize(stream)?,
            base_level: Deserialize::deserialize(stream)?,
            max_level: Deserialize::deserialize(stream)?,
            priority: Deserialize::deserialize(stream)?,
            depth_texture_mode: Deserialize::deserialize(stream)?,
            generate_mipmap: Deserialize::deserialize(stream)?,
            updates: Deserialize::deserialize(stream)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn full_update(target: GLenum, level: GLint, width: GLsizei, height: GLsizei) -> TextureUpdate {
    TextureUpdate {
        target,
        level,
        internal_format: gl::RGBA8 as GLint,
        xoffset: 0,
        yoffset: 0,
        zoffset: 0,
        width,
        height,
        depth: None,
        border: 0,
        format: gl::RGBA,
        pixel_type: gl::UNSIGNED_BYTE,
        pixel_store: PixelStore::default(),
        pixel_transfer: PixelTransfer::default(),
        pixels: Some(vec![0x7f; (width * height * 4) as usize]),
        compressed: false,
        sub_image: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::driver::mock::MockDriver;

    fn sub_update(level: GLint, x: GLint) -> TextureUpdate {
        TextureUpdate {
            xoffset: x,
            sub_image: true,
            ..full_update(gl::TEXTURE_2D, level, 1, 1)
        }
    }

    #[test]
    fn test_supersession() {
        let mut texture = Texture::new(gl::TEXTURE_2D);
        texture.append_update(full_update(gl::TEXTURE_2D, 0, 4, 4));
        texture.append_update(full_update(gl::TEXTURE_2D, 1, 2, 2));
        texture.append_update(sub_update(0, 1));
        texture.append_update(sub_update(0, 2));
        assert_eq!(texture.updates.len(), 4);

        // A new level 0 image drops the old one and its sub-image updates, but not level 1.
        texture.append_update(full_update(gl::TEXTURE_2D, 0, 8, 8));
        assert_eq!(texture.updates.len(), 2);
        assert_eq!(texture.updates[0].level, 1);
        assert_eq!(texture.updates[1].width, 8);

        // Different cube map faces are different targets.
        let mut cube = Texture::new(gl::TEXTURE_CUBE_MAP);
        cube.append_update(full_update(gl::TEXTURE_CUBE_MAP_POSITIVE_X, 0, 4, 4));
        cube.append_update(full_update(gl::TEXTURE_CUBE_MAP_NEGATIVE_X, 0, 4, 4));
        cube.append_update(full_update(gl::TEXTURE_CUBE_MAP_POSITIVE_X, 0, 4, 4));
        assert_eq!(cube.updates.len(), 2);
        assert_eq!(cube.updates[0].target, gl::TEXTURE_CUBE_MAP_NEGATIVE_X);
    }

    #[test]
    fn test_parameters() {
        let mut texture = Texture::new(gl::TEXTURE_2D);
        texture.tex_parameter_i(gl::TEXTURE_MIN_FILTER, gl::NEAREST as GLint);
        texture.tex_parameter_f(gl::TEXTURE_MAX_LEVEL, 3.0);
        texture.tex_parameter_fv(gl::TEXTURE_BORDER_COLOR, &[1.0, 0.0, 0.0, 1.0]);
        texture.tex_parameter_iv(gl::TEXTURE_PRIORITY, &[0]);
        assert_eq!(texture.sampling.min_filter, gl::NEAREST);
        assert_eq!(texture.max_level, 3);
        assert_eq!(texture.sampling.border_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(texture.priority, 0.0);
        assert_eq!(texture.depth_texture_mode, gl::LUMINANCE);

        texture.append_update(full_update(gl::TEXTURE_2D, 0, 2, 2));
        let bytes = codec::to_bytes(&texture).unwrap();
        assert_eq!(codec::from_bytes::<Texture>(&bytes).unwrap(), texture);
    }

    #[test]
    fn test_create() {
        let mut texture = Texture::new(gl::TEXTURE_2D);
        texture.append_update(full_update(gl::TEXTURE_2D, 0, 2, 2));
        texture.append_update(sub_update(0, 1));
        texture.tex_parameter_i(gl::TEXTURE_MAG_FILTER, gl::NEAREST as GLint);

        let driver = MockDriver::new();
        let handle = texture.create(&driver);
        let bind = driver.position(&format!("bind_texture({}, {})", gl::TEXTURE_2D, handle)).unwrap();
        let image = driver.position("tex_image_2d(").unwrap();
        let sub_image = driver.position("tex_sub_image_2d(").unwrap();
        let unpack = driver.position(&format!("pixel_store_i({}, 4)", gl::UNPACK_ALIGNMENT)).unwrap();
        let filter = driver.position(&format!("tex_parameter_i({}, {}, {})",
                                              gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST))
            .unwrap();
        assert!(bind < unpack && unpack < image && image < sub_image && sub_image < filter);

        // A texture that was never bound gets a name and nothing else.
        let driver = MockDriver::new();
        assert_ne!(Texture::default().create(&driver), 0);
        assert_eq!(driver.calls().len(), 1);
    }
}
