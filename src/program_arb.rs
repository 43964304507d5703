//! `GL_ARB_vertex_program` and `GL_ARB_fragment_program` assembly programs.

use gleam::gl::{GLenum, GLuint};
use std::io;

use crate::codec::{Deserialize, Serialize};
use crate::coverage::Coverage;
use crate::driver::Driver;
use crate::enums;
use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramArb {
    /// Zero until the program is first bound.
    pub target: GLenum,
    pub program_string: Vec<u8>,
}

impl ProgramArb {
    pub fn new(target: GLenum) -> ProgramArb {
        ProgramArb { target, program_string: vec![] }
    }

    /// Note a binding to `target`. A program may only ever be bound to one
    /// target; return false if this is a different one.
    pub fn bind_target(&mut self, target: GLenum) -> bool {
        if self.target == 0 {
            self.target = target;
        }
        self.target == target
    }

    pub fn program_string(&mut self, target: GLenum, format: GLenum, string: &[u8],
                          coverage: &mut Coverage) {
        if !self.bind_target(target) {
            return;
        }
        if format != enums::PROGRAM_FORMAT_ASCII_ARB {
            coverage.unimplemented("glProgramStringARB with a format other than ASCII");
            return;
        }
        self.program_string = string.to_vec();
    }

    pub fn create(&self, driver: &dyn Driver) -> GLuint {
        let handle = match driver.gen_programs_arb(1).first() {
            Some(&handle) => handle,
            None => return 0,
        };
        if self.target != 0 {
            driver.bind_program_arb(self.target, handle);
            driver.program_string_arb(self.target, enums::PROGRAM_FORMAT_ASCII_ARB,
                                      &self.program_string);
        }
        handle
    }
}

impl Serialize for ProgramArb {
    fn serialize<W: io::Write>(&self, stream: &mut W) -> Result<()> {
        self.target.serialize(stream)?;
        self.program_string.serialize(stream)
    }
}

impl Deserialize for ProgramArb {
    fn deserialize<R: io::Read>(stream: &mut R) -> Result<ProgramArb> {
        Ok(ProgramArb {
            target: Deserialize::deserialize(stream)?,
            program_string: Deserialize::deserialize(stream)?,
        })
    }
}

#[test]
fn test_program_string() {
    let mut coverage = Coverage::new();
    let mut program = ProgramArb::default();
    program.program_string(enums::VERTEX_PROGRAM_ARB, enums::PROGRAM_FORMAT_ASCII_ARB,
                           b"!!ARBvp1.0\nEND", &mut coverage);
    assert_eq!(program.target, enums::VERTEX_PROGRAM_ARB);
    assert_eq!(program.program_string, b"!!ARBvp1.0\nEND".to_vec());

    // Wrong target, then wrong format: both ignored.
    program.program_string(enums::FRAGMENT_PROGRAM_ARB, enums::PROGRAM_FORMAT_ASCII_ARB,
                           b"!!ARBfp1.0\nEND", &mut coverage);
    program.program_string(enums::VERTEX_PROGRAM_ARB, 0, b"", &mut coverage);
    assert_eq!(program.program_string, b"!!ARBvp1.0\nEND".to_vec());
    assert!(coverage.reported("glProgramStringARB with a format other than ASCII"));
}
