//! Completion tags.
//!
//! Every submission carries a 64-bit `user_data` value which the ring
//! returns unchanged on the matching completion. ringrpc packs three
//! things into it: the operation kind, the generation of the arena slot
//! that owns the record, and the slot index.
//!
//! ```text
//! [kind:8][generation:24][slot:32]
//! ```

use std::fmt;

/// Which I/O operation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpKind {
    /// Waiting for a client to connect on the listening socket.
    Accept = 1,
    /// Vectored read of the request into a single buffer.
    Read = 2,
    /// Vectored write of a response frame list.
    Write = 3,
    /// Read of the shutdown eventfd; completes when a stop signal arrives.
    Wake = 4,
}

impl OpKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(OpKind::Accept),
            2 => Some(OpKind::Read),
            3 => Some(OpKind::Write),
            4 => Some(OpKind::Wake),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Accept => "accept",
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::Wake => "wake",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const KIND_SHIFT: u32 = 56;
const GEN_SHIFT: u32 = 32;
const GEN_MASK: u64 = 0xFF_FFFF;
const SLOT_MASK: u64 = 0xFFFF_FFFF;

/// Tag stored in `user_data` and handed back on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OpToken(pub u64);

impl OpToken {
    /// Never produced by the arena (kind byte 0xFF is not a valid kind).
    pub const NONE: Self = Self(u64::MAX);

    #[inline]
    pub fn new(kind: OpKind, generation: u32, slot: usize) -> Self {
        Self(
            ((kind as u64) << KIND_SHIFT)
                | ((generation as u64 & GEN_MASK) << GEN_SHIFT)
                | (slot as u64 & SLOT_MASK),
        )
    }

    #[inline]
    pub fn kind(self) -> Option<OpKind> {
        OpKind::from_u8((self.0 >> KIND_SHIFT) as u8)
    }

    /// Only the low 24 bits of a slot generation survive the encoding.
    #[inline]
    pub fn generation(self) -> u32 {
        ((self.0 >> GEN_SHIFT) & GEN_MASK) as u32
    }

    #[inline]
    pub fn slot(self) -> usize {
        (self.0 & SLOT_MASK) as usize
    }
}

impl fmt::Display for OpToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{}#{}.{}", kind, self.slot(), self.generation()),
            None => write!(f, "invalid({:#x})", self.0),
        }
    }
}
