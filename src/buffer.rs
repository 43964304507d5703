//! Buffer objects, and the bookkeeping for mapped buffers.
//!
//! When the application maps a buffer for writing, we can't see what it
//! writes into the driver's memory. So instead of handing it the driver's
//! pointer, we give it a shadow copy of the mapped range, and copy the shadow
//! back, both into our own record of the contents and into the driver's
//! mapping, when the application unmaps or flushes. Read-only mappings need
//! none of this, and get the driver's pointer directly.

use gleam::gl::{self, GLbitfield, GLenum, GLuint};
use std::io;
use std::os::raw::c_void;

use crate::codec::{Deserialize, Serialize};
use crate::coverage::Coverage;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::raw::{AlignedBuf, DriverMapping};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MapState {
    Unmapped,
    /// Mapped by `glMapBuffer`.
    MappedWhole,
    /// Mapped by `glMapBufferRange`.
    MappedRange,
}

impl MapState {
    fn to_u32(self) -> u32 {
        match self {
            MapState::Unmapped => 0,
            MapState::MappedWhole => 1,
            MapState::MappedRange => 2,
        }
    }

    fn from_u32(n: u32) -> Option<MapState> {
        match n {
            0 => Some(MapState::Unmapped),
            1 => Some(MapState::MappedWhole),
            2 => Some(MapState::MappedRange),
            _ => None,
        }
    }
}

/// Bytes copied from a write mapping's shadow back into the buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct WrittenRange {
    /// Offset from the start of the buffer.
    pub offset: usize,
    pub contents: Vec<u8>,
}

#[derive(Debug)]
pub struct Buffer {
    /// Zero until the buffer is first bound.
    pub target: GLenum,
    pub usage: GLenum,
    pub contents: Vec<u8>,
    pub map_state: MapState,
    /// A `GL_READ_ONLY`-style enum for whole mappings, `GL_MAP_*_BIT` flags for ranges.
    pub map_access: GLbitfield,
    pub map_offset: usize,
    pub map_size: usize,

    /// Only present for write mappings.
    shadow: Option<AlignedBuf>,
    driver_mapping: Option<DriverMapping>,
}

impl Default for Buffer {
    fn default() -> Buffer {
        Buffer::new(0)
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Buffer) -> bool {
        self.target == other.target
            && self.usage == other.usage
            && self.contents == other.contents
            && self.map_state == other.map_state
            && self.map_access == other.map_access
            && self.map_offset == other.map_offset
            && self.map_size == other.map_size
    }
}

impl Buffer {
    pub fn new(target: GLenum) -> Buffer {
        Buffer {
            target,
            usage: gl::STATIC_DRAW,
            contents: vec![],
            map_state: MapState::Unmapped,
            map_access: 0,
            map_offset: 0,
            map_size: 0,
            shadow: None,
            driver_mapping: None,
        }
    }

    /// Replace the buffer's contents. If `data` is shorter than `size`, the
    /// rest is zero.
    ///
    /// New storage unmaps the buffer, discarding anything written to the
    /// mapping but not yet copied back.
    pub fn buffer_data(&mut self, size: usize, data: Option<&[u8]>, usage: GLenum) {
        let mut contents = data.map(|data| data[..size.min(data.len())].to_vec()).unwrap_or_default();
        contents.resize(size, 0);
        self.contents = contents;
        self.usage = usage;
        self.forget_mapping();
    }

    fn forget_mapping(&mut self) {
        self.map_state = MapState::Unmapped;
        self.map_access = 0;
        self.map_offset = 0;
        self.map_size = 0;
        self.shadow = None;
        self.driver_mapping = None;
    }

    /// Overwrite part of the contents. Writes past the end are ignored, as GL
    /// would reject them.
    pub fn buffer_sub_data(&mut self, offset: usize, data: &[u8]) {
        match offset.checked_add(data.len()) {
            Some(end) if end <= self.contents.len() => {
                self.contents[offset..end].copy_from_slice(data);
            }
            _ => (),
        }
    }

    /// Note that the driver has mapped the whole buffer at `driver_ptr`, and
    /// return the pointer the application should write through.
    ///
    /// Safety: `driver_ptr` must be null, or point to the driver's mapping of
    /// the whole buffer, valid until the buffer is unmapped.
    pub unsafe fn map_buffer(&mut self, access: GLenum, driver_ptr: *mut c_void,
                             alignment: usize) -> *mut c_void {
        let write = access == gl::WRITE_ONLY || access == gl::READ_WRITE;
        let size = self.contents.len();
        self.begin_map(MapState::MappedWhole, access, 0, size, write, driver_ptr, alignment)
    }

    /// Note that the driver has mapped `length` bytes at `offset`, and return
    /// the pointer the application should use.
    ///
    /// Safety: as for `map_buffer`, for the mapped range.
    pub unsafe fn map_buffer_range(&mut self, offset: usize, length: usize, access: GLbitfield,
                                   driver_ptr: *mut c_void, alignment: usize) -> *mut c_void {
        let write = access & gl::MAP_WRITE_BIT != 0;
        self.begin_map(MapState::MappedRange, access, offset, length, write, driver_ptr, alignment)
    }

    unsafe fn begin_map(&mut self, state: MapState, access: GLbitfield,
                        offset: usize, size: usize, write: bool,
                        driver_ptr: *mut c_void, alignment: usize) -> *mut c_void {
        let end = match offset.checked_add(size) {
            Some(end) if end <= self.contents.len() => end,
            _ => return driver_ptr,
        };
        if driver_ptr.is_null() || self.map_state != MapState::Unmapped {
            return driver_ptr;
        }

        self.map_state = state;
        self.map_access = access;
        self.map_offset = offset;
        self.map_size = size;
        if !write {
            return driver_ptr;
        }

        let shadow = match AlignedBuf::from_slice(&self.contents[offset..end], alignment) {
            Some(shadow) => shadow,
            None => {
                log::error!("gl-trace: couldn't allocate {} bytes to shadow a mapped buffer", size);
                self.map_state = MapState::Unmapped;
                return driver_ptr;
            }
        };
        self.driver_mapping = Some(DriverMapping::new_unchecked(driver_ptr, size));
        self.shadow.insert(shadow).as_mut_ptr()
    }

    fn copies_back_on_unmap(&self) -> bool {
        match self.map_state {
            MapState::Unmapped => false,
            MapState::MappedWhole => {
                self.map_access == gl::WRITE_ONLY || self.map_access == gl::READ_WRITE
            }
            MapState::MappedRange => {
                self.map_access & gl::MAP_WRITE_BIT != 0
                    && self.map_access & gl::MAP_FLUSH_EXPLICIT_BIT == 0
            }
        }
    }

    /// Copy `len` bytes at `offset` in the mapping from the shadow into the
    /// contents and the driver's mapping.
    fn copy_back(&mut self, offset: usize, len: usize) -> Option<WrittenRange> {
        let shadow = self.shadow.as_ref()?;
        let end = offset.checked_add(len)?.min(shadow.len());
        if offset >= end {
            return None;
        }
        let written = shadow.as_slice()[offset..end].to_vec();

        let start = self.map_offset + offset;
        if let Some(dest) = self.contents.get_mut(start..start + written.len()) {
            dest.copy_from_slice(&written);
        }
        if let Some(mapping) = self.driver_mapping.as_mut() {
            mapping.write_at(offset, &written);
        }
        Some(WrittenRange { offset: start, contents: written })
    }

    /// Apply a `glFlushMappedBufferRange` call. `offset` is relative to the
    /// start of the mapping. Return the bytes flushed, if any.
    ///
    /// Some applications flush a zero-length range at offset zero, expecting
    /// that to flush everything; if `fix_bad_flush` is set, we oblige.
    pub fn flush_mapped_buffer_range(&mut self, offset: usize, length: usize, fix_bad_flush: bool,
                                     coverage: &mut Coverage) -> Option<WrittenRange> {
        if self.map_state != MapState::MappedRange || self.map_access & gl::MAP_WRITE_BIT == 0 {
            return None;
        }
        let mut length = length;
        if offset == 0 && length == 0 {
            coverage.warn_once("glFlushMappedBufferRange called with zero offset and length");
            if !fix_bad_flush {
                return None;
            }
            length = self.map_size;
        }
        self.copy_back(offset, length)
    }

    /// Apply a `glUnmapBuffer` call. Return an error if the buffer wasn't
    /// mapped; otherwise return the bytes copied back, if any.
    ///
    /// This must run before the driver's unmap, while its mapping is still valid.
    pub fn unmap_buffer(&mut self) -> Result<Option<WrittenRange>> {
        if self.map_state == MapState::Unmapped {
            return Err(Error::InvalidUsage("unmapping a buffer that isn't mapped"));
        }
        let written = if self.copies_back_on_unmap() {
            self.copy_back(0, self.map_size)
        } else {
            None
        };

        self.forget_mapping();
        Ok(written)
    }

    /// Create a buffer with this state on `driver`, and return its name.
    ///
    /// This leaves the new buffer bound to its target.
    pub fn create(&self, driver: &dyn Driver) -> GLuint {
        let handle = match driver.gen_buffers(1).first() {
            Some(&handle) => handle,
            None => return 0,
        };
        if self.target != 0 {
            driver.bind_buffer(self.target, handle);
            driver.buffer_data(self.target, self.contents.len() as isize,
                               Some(&self.contents), self.usage);
        }
        handle
    }
}

impl Serialize for Buffer {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.target.serialize(stream)?;
        self.usage.serialize(stream)?;
        self.contents.serialize(stream)?;
        self.map_state.to_u32().serialize(stream)?;
        self.map_access.serialize(stream)?;
        self.map_offset.serialize(stream)?;
        self.map_size.serialize(stream)
    }
}

impl Deserialize for Buffer {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<Buffer> {
        let target = Deserialize::deserialize(stream)?;
        let usage = Deserialize::deserialize(stream)?;
        let contents = Deserialize::deserialize(stream)?;
        let map_state = MapState::from_u32(Deserialize::deserialize(stream)?)
            .ok_or_else(|| Error::corruption("invalid buffer map state"))?;
        Ok(Buffer {
            target,
            usage,
            contents,
            map_state,
            map_access: Deserialize::deserialize(stream)?,
            map_offset: Deserialize::deserialize(stream)?,
            map_size: Deserialize::deserialize(stream)?,
            shadow: None,
            driver_mapping: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    fn buffer_with(contents: &[u8]) -> Buffer {
        let mut buffer = Buffer::new(gl::ARRAY_BUFFER);
        buffer.buffer_data(contents.len(), Some(contents), gl::DYNAMIC_DRAW);
        buffer
    }

    /// Write `bytes` through the pointer `map_buffer` returned.
    fn scribble(ptr: *mut c_void, bytes: &[u8]) {
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len()) }
    }

    #[test]
    fn test_unmap_unmapped() {
        let mut buffer = buffer_with(&[1, 2, 3]);
        assert!(matches!(buffer.unmap_buffer(), Err(Error::InvalidUsage(_))));
        assert_eq!(buffer.contents, vec![1, 2, 3]);
    }

    #[test]
    fn test_write_mapping_copies_back() {
        let mut buffer = buffer_with(&[0; 8]);
        let mut driver_memory = vec![0_u8; 8];
        let driver_ptr = driver_memory.as_mut_ptr() as *mut c_void;

        let ptr = unsafe { buffer.map_buffer(gl::WRITE_ONLY, driver_ptr, 16) };
        assert_ne!(ptr, driver_ptr);
        assert_eq!(ptr as usize % 16, 0);
        assert_eq!(buffer.map_state, MapState::MappedWhole);

        scribble(ptr, &[9, 8, 7, 6]);
        let written = buffer.unmap_buffer().unwrap().unwrap();
        assert_eq!(written.offset, 0);
        assert_eq!(written.contents, vec![9, 8, 7, 6, 0, 0, 0, 0]);
        assert_eq!(buffer.contents, vec![9, 8, 7, 6, 0, 0, 0, 0]);
        assert_eq!(driver_memory, vec![9, 8, 7, 6, 0, 0, 0, 0]);
        assert_eq!(buffer.map_state, MapState::Unmapped);
    }

    #[test]
    fn test_new_storage_unmaps() {
        let mut buffer = buffer_with(&[0; 8]);
        let mut driver_memory = vec![0_u8; 4];
        let driver_ptr = driver_memory.as_mut_ptr() as *mut c_void;

        let ptr = unsafe { buffer.map_buffer_range(4, 4, gl::MAP_WRITE_BIT, driver_ptr, 16) };
        scribble(ptr, &[1, 2, 3, 4]);
        buffer.buffer_data(2, Some(&[5, 6]), gl::STATIC_DRAW);

        assert_eq!(buffer.map_state, MapState::Unmapped);
        assert_eq!((buffer.map_offset, buffer.map_size), (0, 0));
        assert!(buffer.shadow.is_none());
        assert!(matches!(buffer.unmap_buffer(), Err(Error::InvalidUsage(_))));
        assert_eq!(buffer.contents, vec![5, 6]);
        assert_eq!(driver_memory, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_read_mapping_uses_driver_pointer() {
        let mut buffer = buffer_with(&[1, 2, 3, 4]);
        let mut driver_memory = vec![1_u8, 2, 3, 4];
        let driver_ptr = driver_memory.as_mut_ptr() as *mut c_void;

        let ptr = unsafe { buffer.map_buffer(gl::READ_ONLY, driver_ptr, 16) };
        assert_eq!(ptr, driver_ptr);
        assert_eq!(buffer.unmap_buffer().unwrap(), None);
        assert_eq!(buffer.contents, vec![1, 2, 3, 4]);

        let ptr = unsafe { buffer.map_buffer_range(1, 2, gl::MAP_READ_BIT, driver_ptr, 1) };
        assert_eq!(ptr, driver_ptr);
        assert_eq!(buffer.map_state, MapState::MappedRange);
        assert_eq!(buffer.unmap_buffer().unwrap(), None);
    }

    #[test]
    fn test_range_mapping() {
        let mut buffer = buffer_with(&[0; 8]);
        let mut driver_memory = vec![0_u8; 4];
        let driver_ptr = driver_memory.as_mut_ptr() as *mut c_void;

        let ptr = unsafe { buffer.map_buffer_range(4, 4, gl::MAP_WRITE_BIT, driver_ptr, 4) };
        scribble(ptr, &[1, 2, 3, 4]);
        let written = buffer.unmap_buffer().unwrap().unwrap();
        assert_eq!(written, WrittenRange { offset: 4, contents: vec![1, 2, 3, 4] });
        assert_eq!(buffer.contents, vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(driver_memory, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_explicit_flush() {
        let mut coverage = Coverage::new();
        let mut buffer = buffer_with(&[0; 8]);
        let mut driver_memory = vec![0_u8; 8];
        let driver_ptr = driver_memory.as_mut_ptr() as *mut c_void;
        let access = gl::MAP_WRITE_BIT | gl::MAP_FLUSH_EXPLICIT_BIT;

        let ptr = unsafe { buffer.map_buffer_range(0, 8, access, driver_ptr, 1) };
        scribble(ptr, &[5; 8]);
        let flushed = buffer.flush_mapped_buffer_range(2, 2, true, &mut coverage).unwrap();
        assert_eq!(flushed, WrittenRange { offset: 2, contents: vec![5, 5] });
        assert_eq!(buffer.contents, vec![0, 0, 5, 5, 0, 0, 0, 0]);

        // Explicit-flush mappings don't copy back on unmap.
        assert_eq!(buffer.unmap_buffer().unwrap(), None);
        assert_eq!(driver_memory, vec![0, 0, 5, 5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_bad_flush() {
        let access = gl::MAP_WRITE_BIT | gl::MAP_FLUSH_EXPLICIT_BIT;
        for &fix in &[true, false] {
            let mut coverage = Coverage::new();
            let mut buffer = buffer_with(&[0; 4]);
            let mut driver_memory = vec![0_u8; 4];
            let driver_ptr = driver_memory.as_mut_ptr() as *mut c_void;

            let ptr = unsafe { buffer.map_buffer_range(0, 4, access, driver_ptr, 1) };
            scribble(ptr, &[3; 4]);
            let flushed = buffer.flush_mapped_buffer_range(0, 0, fix, &mut coverage);
            assert!(coverage.reported("glFlushMappedBufferRange called with zero offset and length"));
            if fix {
                assert_eq!(flushed.unwrap().contents, vec![3; 4]);
                assert_eq!(buffer.contents, vec![3; 4]);
            } else {
                assert_eq!(flushed, None);
                assert_eq!(buffer.contents, vec![0; 4]);
            }
        }
    }

    #[test]
    fn test_buffer_data() {
        let mut buffer = Buffer::new(gl::ARRAY_BUFFER);
        buffer.buffer_data(4, None, gl::STREAM_DRAW);
        assert_eq!(buffer.contents, vec![0; 4]);
        buffer.buffer_sub_data(2, &[1, 2]);
        buffer.buffer_sub_data(3, &[1, 2]);
        assert_eq!(buffer.contents, vec![0, 0, 1, 2]);
        assert_eq!(buffer.usage, gl::STREAM_DRAW);

        let bytes = codec::to_bytes(&buffer).unwrap();
        assert_eq!(codec::from_bytes::<Buffer>(&bytes).unwrap(), buffer);
    }
}
