use crate::error::{LayoutError, LayoutResult};
use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

/// A zero-initialized instance of the probed root type.
///
/// No constructor runs and no destructor runs on drop, so the bytes can be
/// toggled freely mid-probe. Padding bytes start zeroed and [`Dummy::zero`]
/// re-blanks them along with everything else.
pub(crate) struct Dummy {
    data: NonNull<u8>,
    layout: Layout,
}

impl Dummy {
    pub(crate) fn fabricate(name: &'static str, size: usize, align: usize) -> LayoutResult<Self> {
        let layout =
            Layout::from_size_align(size, align).map_err(|_| LayoutError::Uninstantiable(name))?;

        if layout.size() == 0 {
            return Ok(Self {
                data: NonNull::dangling(),
                layout,
            });
        }

        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let data = match NonNull::new(ptr) {
            Some(p) => p,
            None => alloc::handle_alloc_error(layout),
        };

        Ok(Self { data, layout })
    }

    #[inline]
    pub(crate) fn base(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Re-blanks the whole instance, padding included.
    #[inline]
    pub(crate) fn zero(&mut self) {
        unsafe { self.data.as_ptr().write_bytes(0, self.layout.size()) };
    }

    #[inline]
    pub(crate) fn poke(&mut self, at: usize, value: u8) {
        debug_assert!(at < self.layout.size());
        unsafe { *self.data.as_ptr().add(at) = value };
    }
}

impl Drop for Dummy {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            unsafe { alloc::dealloc(self.data.as_ptr(), self.layout) };
        }
    }
}
