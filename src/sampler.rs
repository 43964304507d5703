//! Sampler objects, and the sampling parameters they share with textures.

use gleam::gl::{self, GLenum, GLfloat, GLint, GLuint};
use std::io;

use crate::codec::{Deserialize, Serialize};
use crate::driver::Driver;
use crate::enums;
use crate::error::Result;

/// A parameter value, as passed to `glTexParameter*` or `glSamplerParameter*`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int(GLint),
    Float(GLfloat),
    Color([GLfloat; 4]),
}

/// The sampling parameters that textures and sampler objects both carry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SamplerParams {
    pub min_filter: GLenum,
    pub mag_filter: GLenum,
    pub min_lod: GLfloat,
    pub max_lod: GLfloat,
    pub wrap_s: GLenum,
    pub wrap_t: GLenum,
    pub wrap_r: GLenum,
    pub border_color: [GLfloat; 4],
    pub compare_mode: GLenum,
    pub compare_func: GLenum,
    pub srgb_decode: GLenum,
    pub max_anisotropy: GLfloat,
}

impl Default for SamplerParams {
    fn default() -> SamplerParams {
        SamplerParams {
            min_filter: gl::NEAREST_MIPMAP_LINEAR,
            mag_filter: gl::LINEAR,
            min_lod: -1000.0,
            max_lod: 1000.0,
            wrap_s: gl::REPEAT,
            wrap_t: gl::REPEAT,
            wrap_r: gl::REPEAT,
            border_color: [0.0; 4],
            compare_mode: gl::NONE,
            compare_func: gl::ALWAYS,
            srgb_decode: enums::DECODE_EXT,
            max_anisotropy: 1.0,
        }
    }
}

impl SamplerParams {
    /// Apply a single-valued parameter. Return false if `pname` isn't one of ours.
    pub fn set(&mut self, pname: GLenum, value: ParamValue) -> bool {
        let as_enum = |value: ParamValue| match value {
            ParamValue::Int(i) => i as GLenum,
            ParamValue::Float(f) => f as GLenum,
            ParamValue::Color(c) => c[0] as GLenum,
        };
        let as_float = |value: ParamValue| match value {
            ParamValue::Int(i) => i as GLfloat,
            ParamValue::Float(f) => f,
            ParamValue::Color(c) => c[0],
        };

        match pname {
            gl::TEXTURE_MIN_FILTER => self.min_filter = as_enum(value),
            gl::TEXTURE_MAG_FILTER => self.mag_filter = as_enum(value),
            gl::TEXTURE_MIN_LOD => self.min_lod = as_float(value),
            gl::TEXTURE_MAX_LOD => self.max_lod = as_float(value),
            gl::TEXTURE_WRAP_S => self.wrap_s = as_enum(value),
            gl::TEXTURE_WRAP_T => self.wrap_t = as_enum(value),
            gl::TEXTURE_WRAP_R => self.wrap_r = as_enum(value),
            gl::TEXTURE_COMPARE_MODE => self.compare_mode = as_enum(value),
            gl::TEXTURE_COMPARE_FUNC => self.compare_func = as_enum(value),
            enums::TEXTURE_SRGB_DECODE_EXT => self.srgb_decode = as_enum(value),
            enums::TEXTURE_MAX_ANISOTROPY_EXT => self.max_anisotropy = as_float(value),
            gl::TEXTURE_BORDER_COLOR => match value {
                ParamValue::Color(color) => self.border_color = color,
                // Only the vector forms can set this.
                _ => return false,
            },
            _ => return false,
        }
        true
    }

    /// Apply a `...Parameterfv` call.
    pub fn set_fv(&mut self, pname: GLenum, params: &[GLfloat]) -> bool {
        if pname == gl::TEXTURE_BORDER_COLOR {
            if params.len() < 4 {
                return false;
            }
            return self.set(pname, ParamValue::Color([params[0], params[1], params[2], params[3]]));
        }
        match params.first() {
            Some(&param) => self.set(pname, ParamValue::Float(param)),
            None => false,
        }
    }

    /// Apply a `...Parameteriv` call. Integer border colors are normalized.
    pub fn set_iv(&mut self, pname: GLenum, params: &[GLint]) -> bool {
        if pname == gl::TEXTURE_BORDER_COLOR {
            if params.len() < 4 {
                return false;
            }
            let mut color = [0.0; 4];
            for (c, &p) in color.iter_mut().zip(params) {
                *c = p as GLfloat / GLint::max_value() as GLfloat;
            }
            return self.set(pname, ParamValue::Color(color));
        }
        match params.first() {
            Some(&param) => self.set(pname, ParamValue::Int(param)),
            None => false,
        }
    }

    /// Call `f` with every parameter and its value, in a fixed order.
    pub fn for_each<F: FnMut(GLenum, ParamValue)>(&self, mut f: F) {
        f(gl::TEXTURE_MIN_FILTER, ParamValue::Int(self.min_filter as GLint));
        f(gl::TEXTURE_MAG_FILTER, ParamValue::Int(self.mag_filter as GLint));
        f(gl::TEXTURE_MIN_LOD, ParamValue::Float(self.min_lod));
        f(gl::TEXTURE_MAX_LOD, ParamValue::Float(self.max_lod));
        f(gl::TEXTURE_WRAP_S, ParamValue::Int(self.wrap_s as GLint));
        f(gl::TEXTURE_WRAP_T, ParamValue::Int(self.wrap_t as GLint));
        f(gl::TEXTURE_WRAP_R, ParamValue::Int(self.wrap_r as GLint));
        f(gl::TEXTURE_BORDER_COLOR, ParamValue::Color(self.border_color));
        f(gl::TEXTURE_COMPARE_MODE, ParamValue::Int(self.compare_mode as GLint));
        f(gl::TEXTURE_COMPARE_FUNC, ParamValue::Int(self.compare_func as GLint));
        f(enums::TEXTURE_SRGB_DECODE_EXT, ParamValue::Int(self.srgb_decode as GLint));
        f(enums::TEXTURE_MAX_ANISOTROPY_EXT, ParamValue::Float(self.max_anisotropy));
    }
}

impl Serialize for SamplerParams {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.min_filter.serialize(stream)?;
        self.mag_filter.serialize(stream)?;
        self.min_lod.serialize(stream)?;
        self.max_lod.serialize(stream)?;
        self.wrap_s.serialize(stream)?;
        self.wrap_t.serialize(stream)?;
        self.wrap_r.serialize(stream)?;
        self.border_color.serialize(stream)?;
        self.compare_mode.serialize(stream)?;
        self.compare_func.serialize(stream)?;
        self.srgb_decode.serialize(stream)?;
        self.max_anisotropy.serialize(stream)
    }
}

impl Deserialize for SamplerParams {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<SamplerParams> {
        Ok(SamplerParams {
            min_filter: Deserialize::deserialize(stream)?,
            mag_filter: Deserialize::deserialize(stream)?,
            min_lod: Deserialize::deserialize(stream)?,
            max_lod: Deserialize::deserialize(stream)?,
            wrap_s: Deserialize::deserialize(stream)?,
            wrap_t: Deserialize::deserialize(stream)?,
            wrap_r: Deserialize::deserialize(stream)?,
            border_color: Deserialize::deserialize(stream)?,
            compare_mode: Deserialize::deserialize(stream)?,
            compare_func: Deserialize::deserialize(stream)?,
            srgb_decode: Deserialize::deserialize(stream)?,
            max_anisotropy: Deserialize::deserialize(stream)?,
        })
    }
}

/// A sampler object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sampler {
    pub params: SamplerParams,
}

impl Sampler {
    pub fn new() -> Sampler {
        Sampler::default()
    }

    pub fn sampler_parameter_i(&mut self, pname: GLenum, param: GLint) {
        self.params.set(pname, ParamValue::Int(param));
    }

    pub fn sampler_parameter_f(&mut self, pname: GLenum, param: GLfloat) {
        self.params.set(pname, ParamValue::Float(param));
    }

    pub fn sampler_parameter_fv(&mut self, pname: GLenum, params: &[GLfloat]) {
        self.params.set_fv(pname, params);
    }

    pub fn sampler_parameter_iv(&mut self, pname: GLenum, params: &[GLint]) {
        self.params.set_iv(pname, params);
    }

    /// Create a sampler with this state on `driver`, and return its name.
    pub fn create(&self, driver: &dyn Driver) -> GLuint {
        let handle = match driver.gen_samplers(1).first() {
            Some(&handle) => handle,
            None => return 0,
        };
        self.params.for_each(|pname, value| match value {
            ParamValue::Int(i) => driver.sampler_parameter_i(handle, pname, i),
            ParamValue::Float(f) => driver.sampler_parameter_f(handle, pname, f),
            ParamValue::Color(c) => driver.sampler_parameter_fv(handle, pname, &c),
        });
        handle
    }
}

impl Serialize for Sampler {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.params.serialize(stream)
    }
}

impl Deserialize for Sampler {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Sampler> {
        Ok(Sampler { params: Deserialize::deserialize(stream)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::driver::mock::MockDriver;

    #[test]
    fn test_sampler_parameters() {
        let mut sampler = Sampler::new();
        sampler.sampler_parameter_i(gl::TEXTURE_MIN_FILTER, gl::NEAREST as GLint);
        sampler.sampler_parameter_f(gl::TEXTURE_MAX_LOD, 4.0);
        sampler.sampler_parameter_fv(gl::TEXTURE_BORDER_COLOR, &[0.25, 0.5, 0.75, 1.0]);
        sampler.sampler_parameter_iv(gl::TEXTURE_BORDER_COLOR, &[0, 0, 0, GLint::max_value()]);
        // Border color can't be set through the scalar forms.
        sampler.sampler_parameter_f(gl::TEXTURE_BORDER_COLOR, 0.5);

        assert_eq!(sampler.params.min_filter, gl::NEAREST);
        assert_eq!(sampler.params.max_lod, 4.0);
        assert_eq!(sampler.params.border_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(sampler.params.mag_filter, gl::LINEAR);

        let bytes = codec::to_bytes(&sampler).unwrap();
        assert_eq!(codec::from_bytes::<Sampler>(&bytes).unwrap(), sampler);
    }

    #[test]
    fn test_sampler_create() {
        let mut sampler = Sampler::new();
        sampler.sampler_parameter_i(gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);

        let driver = MockDriver::new();
        let handle = sampler.create(&driver);
        assert_ne!(handle, 0);
        assert!(driver.called(&format!("sampler_parameter_i({}, {}, {})",
                                       handle, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE)));
        assert!(driver.called(&format!("sampler_parameter_fv({}, {}, ",
                                       handle, gl::TEXTURE_BORDER_COLOR)));
    }
}
