//! GC object header
//!
//! Every registered object carries a header that stores metadata for the GC.

use crate::object::ObjKind;

/// GC header stored alongside each heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcHeader {
    /// Mark bit (true = reached during the current cycle)
    marked: bool,

    /// Variant of the object this header belongs to
    kind: ObjKind,

    /// Accounted size of the object, record plus owned buffers
    size: usize,
}

impl GcHeader {
    /// Create an unmarked header
    pub fn new(kind: ObjKind, size: usize) -> Self {
        Self {
            marked: false,
            kind,
            size,
        }
    }

    /// Check if this object is marked
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Mark this object as reachable
    #[inline]
    pub fn mark(&mut self) {
        self.marked = true;
    }

    /// Unmark this object (for next GC cycle)
    #[inline]
    pub fn unmark(&mut self) {
        self.marked = false;
    }

    /// Get the object kind
    #[inline]
    pub fn kind(&self) -> ObjKind {
        self.kind
    }

    /// Get the accounted size
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_starts_unmarked() {
        let header = GcHeader::new(ObjKind::String, 64);
        assert!(!header.is_marked());
        assert_eq!(header.kind(), ObjKind::String);
        assert_eq!(header.size(), 64);
    }

    #[test]
    fn test_header_mark_unmark() {
        let mut header = GcHeader::new(ObjKind::Closure, 32);

        header.mark();
        assert!(header.is_marked());

        header.unmark();
        assert!(!header.is_marked());
    }
}
