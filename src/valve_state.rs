use std::fmt;

use num_derive::FromPrimitive;

/// Discriminant is the ASCII letter used on the wire and in storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum ValveState {
    A = b'A',
    // обе катушки выключены
    Center = b'C',
    B = b'B',
}

impl ValveState {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Decodes any state letter, legal for the running variant or not.
    pub fn from_tag(tag: u8) -> Option<Self> {
        num::FromPrimitive::from_u8(tag)
    }

    pub fn letter(self) -> char {
        self.tag() as char
    }
}

impl fmt::Display for ValveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}
