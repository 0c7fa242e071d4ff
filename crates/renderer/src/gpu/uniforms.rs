use bytemuck::Pod;

use super::reflect::{MemberKind, UniformBlockLayout};

/// CPU copy of one program's uniform block, flushed to the GPU before a draw
/// whenever a write touched it.
pub(crate) struct UniformBlock {
    layout: UniformBlockLayout,
    data: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformBlockLayout) -> Self {
        // wgpu rejects zero-sized uniform bindings; std140 rounds to 16 anyway.
        let size = layout.size.max(16).next_multiple_of(16) as usize;
        Self {
            layout,
            data: vec![0; size],
            dirty: true,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Writes `value` at `offset` if the member there has the expected kind.
    pub fn write<T: Pod>(&mut self, offset: u32, kind: MemberKind, value: T) -> bool {
        let matches = self
            .layout
            .members
            .iter()
            .any(|member| member.offset == offset && member.kind == kind);
        if !matches {
            return false;
        }
        let bytes = bytemuck::bytes_of(&value);
        let start = offset as usize;
        let Some(slot) = self.data.get_mut(start..start + bytes.len()) else {
            return false;
        };
        if slot != bytes {
            slot.copy_from_slice(bytes);
            self.dirty = true;
        }
        true
    }

    /// Returns the bytes to upload if anything changed since the last call.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(&self.data)
    }
}
