//! Pixel store and pixel transfer state, and the size of pixel rectangles.
//!
//! The bytes an application hands to `glTexImage2D` only mean something in
//! light of the `GL_UNPACK_*` pixel-store parameters in effect at the time of
//! the call: they decide the row stride, the padding, and how many leading
//! pixels, rows, and images to skip. Capture uses `image_size` to work out how
//! many bytes to copy out of the application's memory, and every texture
//! update record keeps the state it was uploaded with, so that replay can
//! interpret the bytes the same way.

use gleam::gl::{self, GLenum, GLfloat, GLint};
use image::png::PNGEncoder;
use image::ColorType;
use std::{fs, io, path};

use crate::codec::{Deserialize, Serialize};
use crate::coverage::Coverage;
use crate::driver::Driver;
use crate::error::Result;

/// The `glPixelStore` parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PixelStore {
    pub pack_swap_bytes: bool,
    pub pack_lsb_first: bool,
    pub pack_row_length: GLint,
    pub pack_image_height: GLint,
    pub pack_skip_pixels: GLint,
    pub pack_skip_rows: GLint,
    pub pack_skip_images: GLint,
    pub pack_alignment: GLint,

    pub unpack_swap_bytes: bool,
    pub unpack_lsb_first: bool,
    pub unpack_row_length: GLint,
    pub unpack_image_height: GLint,
    pub unpack_skip_pixels: GLint,
    pub unpack_skip_rows: GLint,
    pub unpack_skip_images: GLint,
    pub unpack_alignment: GLint,
}

impl Default for PixelStore {
    fn default() -> PixelStore {
        PixelStore {
            pack_swap_bytes: false,
            pack_lsb_first: false,
            pack_row_length: 0,
            pack_image_height: 0,
            pack_skip_pixels: 0,
            pack_skip_rows: 0,
            pack_skip_images: 0,
            pack_alignment: 4,
            unpack_swap_bytes: false,
            unpack_lsb_first: false,
            unpack_row_length: 0,
            unpack_image_height: 0,
            unpack_skip_pixels: 0,
            unpack_skip_rows: 0,
            unpack_skip_images: 0,
            unpack_alignment: 4,
        }
    }
}

impl PixelStore {
    pub fn pixel_store_i(&mut self, pname: GLenum, param: GLint) {
        match pname {
            gl::PACK_SWAP_BYTES => self.pack_swap_bytes = param != 0,
            gl::PACK_LSB_FIRST => self.pack_lsb_first = param != 0,
            gl::PACK_ROW_LENGTH => self.pack_row_length = param,
            gl::PACK_IMAGE_HEIGHT => self.pack_image_height = param,
            gl::PACK_SKIP_PIXELS => self.pack_skip_pixels = param,
            gl::PACK_SKIP_ROWS => self.pack_skip_rows = param,
            gl::PACK_SKIP_IMAGES => self.pack_skip_images = param,
            gl::PACK_ALIGNMENT => self.pack_alignment = param,
            gl::UNPACK_SWAP_BYTES => self.unpack_swap_bytes = param != 0,
            gl::UNPACK_LSB_FIRST => self.unpack_lsb_first = param != 0,
            gl::UNPACK_ROW_LENGTH => self.unpack_row_length = param,
            gl::UNPACK_IMAGE_HEIGHT => self.unpack_image_height = param,
            gl::UNPACK_SKIP_PIXELS => self.unpack_skip_pixels = param,
            gl::UNPACK_SKIP_ROWS => self.unpack_skip_rows = param,
            gl::UNPACK_SKIP_IMAGES => self.unpack_skip_images = param,
            gl::UNPACK_ALIGNMENT => self.unpack_alignment = param,
            // The driver will flag this with GL_INVALID_ENUM.
            _ => (),
        }
    }

    pub fn pixel_store_f(&mut self, pname: GLenum, param: GLfloat) {
        self.pixel_store_i(pname, param as GLint);
    }

    /// Make `driver`'s pixel store state match this.
    pub fn apply(&self, driver: &dyn Driver) {
        let params: [(GLenum, GLint); 16] = [
            (gl::PACK_SWAP_BYTES, self.pack_swap_bytes as GLint),
            (gl::PACK_LSB_FIRST, self.pack_lsb_first as GLint),
            (gl::PACK_ROW_LENGTH, self.pack_row_length),
            (gl::PACK_IMAGE_HEIGHT, self.pack_image_height),
            (gl::PACK_SKIP_PIXELS, self.pack_skip_pixels),
            (gl::PACK_SKIP_ROWS, self.pack_skip_rows),
            (gl::PACK_SKIP_IMAGES, self.pack_skip_images),
            (gl::PACK_ALIGNMENT, self.pack_alignment),
            (gl::UNPACK_SWAP_BYTES, self.unpack_swap_bytes as GLint),
            (gl::UNPACK_LSB_FIRST, self.unpack_lsb_first as GLint),
            (gl::UNPACK_ROW_LENGTH, self.unpack_row_length),
            (gl::UNPACK_IMAGE_HEIGHT, self.unpack_image_height),
            (gl::UNPACK_SKIP_PIXELS, self.unpack_skip_pixels),
            (gl::UNPACK_SKIP_ROWS, self.unpack_skip_rows),
            (gl::UNPACK_SKIP_IMAGES, self.unpack_skip_images),
            (gl::UNPACK_ALIGNMENT, self.unpack_alignment),
        ];
        for &(pname, param) in &params {
            driver.pixel_store_i(pname, param);
        }
    }
}

impl Serialize for PixelStore {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.pack_swap_bytes.serialize(stream)?;
        self.pack_lsb_first.serialize(stream)?;
        self.pack_row_length.serialize(stream)?;
        self.pack_image_height.serialize(stream)?;
        self.pack_skip_pixels.serialize(stream)?;
        self.pack_skip_rows.serialize(stream)?;
        self.pack_skip_images.serialize(stream)?;
        self.pack_alignment.serialize(stream)?;
        self.unpack_swap_bytes.serialize(stream)?;
        self.unpack_lsb_first.serialize(stream)?;
        self.unpack_row_length.serialize(stream)?;
        self.unpack_image_height.serialize(stream)?;
        self.unpack_skip_pixels.serialize(stream)?;
        self.unpack_skip_rows.serialize(stream)?;
        self.unpack_skip_images.serialize(stream)?;
        self.unpack_alignment.serialize(stream)
    }
}

impl Deserialize for PixelStore {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<PixelStore> {
        Ok(PixelStore {
            pack_swap_bytes: Deserialize::deserialize(stream)?,
            pack_lsb_first: Deserialize::deserialize(stream)?,
            pack_row_length: Deserialize::deserialize(stream)?,
            pack_image_height: Deserialize::deserialize(stream)?,
            pack_skip_pixels: Deserialize::deserialize(stream)?,
            pack_skip_rows: Deserialize::deserialize(stream)?,
            pack_skip_images: Deserialize::deserialize(stream)?,
            pack_alignment: Deserialize::deserialize(stream)?,
            unpack_swap_bytes: Deserialize::deserialize(stream)?,
            unpack_lsb_first: Deserialize::deserialize(stream)?,
            unpack_row_length: Deserialize::deserialize(stream)?,
            unpack_image_height: Deserialize::deserialize(stream)?,
            unpack_skip_pixels: Deserialize::deserialize(stream)?,
            unpack_skip_rows: Deserialize::deserialize(stream)?,
            unpack_skip_images: Deserialize::deserialize(stream)?,
            unpack_alignment: Deserialize::deserialize(stream)?,
        })
    }
}

/// The legacy `glPixelTransfer` parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PixelTransfer {
    pub map_color: bool,
    pub map_stencil: bool,
    pub index_shift: GLint,
    pub index_offset: GLint,
    /// Red, green, blue, alpha, depth.
    pub scale: [GLfloat; 5],
    /// Red, green, blue, alpha, depth.
    pub bias: [GLfloat; 5],
}

impl Default for PixelTransfer {
    fn default() -> PixelTransfer {
        PixelTransfer {
            map_color: false,
            map_stencil: false,
            index_shift: 0,
            index_offset: 0,
            scale: [1.0; 5],
            bias: [0.0; 5],
        }
    }
}

const SCALE_PNAMES: [GLenum; 5] =
    [gl::RED_SCALE, gl::GREEN_SCALE, gl::BLUE_SCALE, gl::ALPHA_SCALE, gl::DEPTH_SCALE];
const BIAS_PNAMES: [GLenum; 5] =
    [gl::RED_BIAS, gl::GREEN_BIAS, gl::BLUE_BIAS, gl::ALPHA_BIAS, gl::DEPTH_BIAS];

impl PixelTransfer {
    pub fn pixel_transfer_f(&mut self, pname: GLenum, param: GLfloat) {
        match pname {
            gl::MAP_COLOR => self.map_color = param != 0.0,
            gl::MAP_STENCIL => self.map_stencil = param != 0.0,
            gl::INDEX_SHIFT => self.index_shift = param as GLint,
            gl::INDEX_OFFSET => self.index_offset = param as GLint,
            _ => {
                if let Some(i) = SCALE_PNAMES.iter().position(|&p| p == pname) {
                    self.scale[i] = param;
                } else if let Some(i) = BIAS_PNAMES.iter().position(|&p| p == pname) {
                    self.bias[i] = param;
                }
            }
        }
    }

    pub fn pixel_transfer_i(&mut self, pname: GLenum, param: GLint) {
        match pname {
            gl::INDEX_SHIFT => self.index_shift = param,
            gl::INDEX_OFFSET => self.index_offset = param,
            _ => self.pixel_transfer_f(pname, param as GLfloat),
        }
    }

    /// Make `driver`'s pixel transfer state match this.
    pub fn apply(&self, driver: &dyn Driver) {
        driver.pixel_transfer_i(gl::MAP_COLOR, self.map_color as GLint);
        driver.pixel_transfer_i(gl::MAP_STENCIL, self.map_stencil as GLint);
        driver.pixel_transfer_i(gl::INDEX_SHIFT, self.index_shift);
        driver.pixel_transfer_i(gl::INDEX_OFFSET, self.index_offset);
        for (&pname, &value) in SCALE_PNAMES.iter().zip(&self.scale) {
            driver.pixel_transfer_f(pname, value);
        }
        for (&pname, &value) in BIAS_PNAMES.iter().zip(&self.bias) {
            driver.pixel_transfer_f(pname, value);
        }
    }
}

impl Serialize for PixelTransfer {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.map_color.serialize(stream)?;
        self.map_stencil.serialize(stream)?;
        self.index_shift.serialize(stream)?;
        self.index_offset.serialize(stream)?;
        self.scale.serialize(stream)?;
        self.bias.serialize(stream)
    }
}

impl Deserialize for PixelTransfer {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<PixelTransfer> {
        Ok(PixelTransfer {
            map_color: Deserialize::deserialize(stream)?,
            map_stencil: Deserialize::deserialize(stream)?,
            index_shift: Deserialize::deserialize(stream)?,
            index_offset: Deserialize::deserialize(stream)?,
            scale: Deserialize::deserialize(stream)?,
            bias: Deserialize::deserialize(stream)?,
        })
    }
}

/// Round `value` up to a multiple of `base`.
pub fn round_up(value: usize, base: usize) -> usize {
    let base = base.max(1);
    (value + base - 1) / base * base
}

/// Return the size in bytes of one pixel of the given `format` and `pixel_type`,
/// or zero if we don't know.
pub fn bytes_per_pixel(format: GLenum, pixel_type: GLenum, coverage: &mut Coverage) -> usize {
    let component_size = match pixel_type {
        gl::UNSIGNED_BYTE | gl::BYTE => 1,
        gl::UNSIGNED_SHORT | gl::SHORT | gl::HALF_FLOAT => 2,
        gl::UNSIGNED_INT | gl::INT | gl::FLOAT => 4,

        // Packed types describe the whole pixel.
        gl::UNSIGNED_BYTE_3_3_2 | gl::UNSIGNED_BYTE_2_3_3_REV => return 1,
        gl::UNSIGNED_SHORT_5_6_5
        | gl::UNSIGNED_SHORT_5_6_5_REV
        | gl::UNSIGNED_SHORT_4_4_4_4
        | gl::UNSIGNED_SHORT_4_4_4_4_REV
        | gl::UNSIGNED_SHORT_5_5_5_1
        | gl::UNSIGNED_SHORT_1_5_5_5_REV => return 2,
        gl::UNSIGNED_INT_8_8_8_8
        | gl::UNSIGNED_INT_8_8_8_8_REV
        | gl::UNSIGNED_INT_10_10_10_2
        | gl::UNSIGNED_INT_2_10_10_10_REV => return 4,

        gl::BITMAP => {
            coverage.unimplemented("GL_BITMAP pixel data");
            return 0;
        }
        _ => {
            coverage.unimplemented("pixel type in pixel size computation");
            return 0;
        }
    };

    let components = match format {
        gl::RED | gl::GREEN | gl::BLUE | gl::ALPHA | gl::LUMINANCE | gl::DEPTH_COMPONENT => 1,
        gl::LUMINANCE_ALPHA => 2,
        gl::RGB | gl::BGR => 3,
        gl::RGBA | gl::BGRA => 4,
        gl::COLOR_INDEX => {
            coverage.unimplemented("GL_COLOR_INDEX pixel data");
            0
        }
        _ => {
            coverage.unimplemented("pixel format in pixel size computation");
            0
        }
    };

    component_size * components
}

/// The dimensions and layout of a pixel rectangle passed to an upload call.
#[derive(Copy, Clone, Debug)]
pub struct ImageShape {
    pub width: GLint,
    pub height: GLint,
    pub depth: GLint,
    pub format: GLenum,
    pub pixel_type: GLenum,
}

/// Return the number of bytes an upload of `shape` reads from client memory,
/// given the unpack parameters in `store`.
///
/// Rows are padded to the unpack alignment, and skipped pixels, rows, and
/// images count against the total. The last row only extends as far as the
/// image's own width, not the row length.
pub fn image_size(shape: &ImageShape, store: &PixelStore, coverage: &mut Coverage) -> usize {
    if shape.width <= 0 || shape.height <= 0 || shape.depth <= 0 {
        return 0;
    }
    let pixel_size = bytes_per_pixel(shape.format, shape.pixel_type, coverage);
    if pixel_size == 0 {
        return 0;
    }

    let (width, height, depth) = (shape.width as usize, shape.height as usize, shape.depth as usize);
    let alignment = store.unpack_alignment.max(1) as usize;
    let row_width = if store.unpack_row_length > 0 { store.unpack_row_length as usize } else { width };
    let row_bytes = round_up(pixel_size * row_width, alignment);
    let image_rows = if store.unpack_image_height > 0 { store.unpack_image_height as usize } else { height };
    let image_bytes = row_bytes * image_rows;

    let skipped = pixel_size * store.unpack_skip_pixels.max(0) as usize
        + row_bytes * store.unpack_skip_rows.max(0) as usize
        + image_bytes * store.unpack_skip_images.max(0) as usize;
    let last_row = round_up(pixel_size * width, alignment);

    skipped + (depth - 1) * image_bytes + (height - 1) * row_bytes + last_row
}

/// Write a tightly packed pixel rectangle as a PNG file.
pub fn write_png<P: AsRef<path::Path>>(path: P, data: &[u8], width: u32, height: u32,
                                       format: GLenum, pixel_type: GLenum) -> io::Result<()> {
    let color_type = match (format, pixel_type) {
        (gl::RGBA, gl::UNSIGNED_BYTE) => ColorType::Rgba8,
        (gl::RGB, gl::UNSIGNED_BYTE) => ColorType::Rgb8,
        (gl::RED, gl::UNSIGNED_BYTE) | (gl::LUMINANCE, gl::UNSIGNED_BYTE) => ColorType::L8,
        _ => {
            let msg = format!("gl-trace: write_png: unsupported format/pixel type combination: \
                               0x{:x}, 0x{:x}", format, pixel_type);
            return Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
        }
    };

    let file = fs::File::create(path)?;
    let encoder = PNGEncoder::new(file);
    encoder.encode(data, width, height, color_type)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))
}
