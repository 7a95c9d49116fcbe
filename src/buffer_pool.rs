//! In-memory `BufferPoolManager`: the minimal fetch/new/unpin/delete
//! surface spec.md §6 names, backed by the replacer for eviction.
//!
//! Grounded on `examples/small-db-small-db/src/btree/page_cache.rs`'s
//! approach of wrapping page storage behind a page-id-keyed map guarded
//! by its own lock, and on `original_source`'s `BufferPoolManagerInstance`
//! for the fetch/unpin/pin-count contract. Persistence to a `DiskManager`
//! is out of this crate's scope — pages simply live until evicted or
//! deleted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use crate::error::{Error, ErrorKind, Result};
use crate::page::{Page, PageId, PageRef};
use crate::replacer::{FrameId, LruReplacer};

/// Fetch/new/unpin/delete over buffer-pool-resident pages, the surface
/// the B+Tree and its callers depend on. A trait (rather than a
/// concrete type baked into the tree) so tests can swap in smaller
/// pools or instrumented fakes.
pub trait BufferPoolManager: Send + Sync {
    fn fetch_page(&self, page_id: PageId) -> Result<PageRef>;
    fn new_page(&self) -> Result<PageRef>;
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()>;
    fn delete_page(&self, page_id: PageId) -> Result<()>;
}

struct Frame {
    page: PageRef,
    pin_count: usize,
    #[allow(dead_code)]
    dirty: bool,
}

struct Inner {
    pages: HashMap<PageId, Frame>,
    page_to_frame: HashMap<PageId, FrameId>,
    frame_to_page: HashMap<FrameId, PageId>,
    free_frames: Vec<FrameId>,
}

/// A fixed-capacity in-memory pool. When no free frame is available,
/// evicts via the LRU replacer; if nothing is evictable (every frame
/// pinned), `fetch_page`/`new_page` fail with `OutOfMemory`.
pub struct InMemoryBufferPoolManager {
    capacity: usize,
    replacer: LruReplacer,
    inner: Mutex<Inner>,
    next_page_id: AtomicI32,
}

impl InMemoryBufferPoolManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            replacer: LruReplacer::new(capacity),
            inner: Mutex::new(Inner {
                pages: HashMap::with_capacity(capacity),
                page_to_frame: HashMap::with_capacity(capacity),
                frame_to_page: HashMap::with_capacity(capacity),
                free_frames: (0..capacity as FrameId).collect(),
            }),
            next_page_id: AtomicI32::new(0),
        }
    }

    fn allocate_frame(&self, inner: &mut Inner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_frames.pop() {
            return Ok(frame_id);
        }
        let victim = self
            .replacer
            .victim()
            .ok_or_else(|| Error::new(ErrorKind::OutOfMemory, "no evictable frame"))?;
        if let Some(evicted_page_id) = inner.frame_to_page.remove(&victim) {
            inner.pages.remove(&evicted_page_id);
            inner.page_to_frame.remove(&evicted_page_id);
        }
        Ok(victim)
    }
}

impl BufferPoolManager for InMemoryBufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Result<PageRef> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pages.contains_key(&page_id) {
            let frame_id = inner.page_to_frame[&page_id];
            let frame = inner.pages.get_mut(&page_id).unwrap();
            frame.pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(frame.page.clone());
        }
        Err(Error::new(
            ErrorKind::OutOfRange,
            format!("page {} not resident and has no backing store", page_id),
        ))
    }

    fn new_page(&self) -> Result<PageRef> {
        let mut inner = self.inner.lock().unwrap();
        let frame_id = self.allocate_frame(&mut inner)?;
        let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        let page = Page::new(page_id);
        inner.pages.insert(
            page_id,
            Frame {
                page: page.clone(),
                pin_count: 1,
                dirty: false,
            },
        );
        inner.page_to_frame.insert(page_id, frame_id);
        inner.frame_to_page.insert(frame_id, page_id);
        self.replacer.pin(frame_id);
        Ok(page)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let frame_id = *inner
            .page_to_frame
            .get(&page_id)
            .ok_or_else(|| Error::internal(format!("unpin of non-resident page {}", page_id)))?;
        let frame = inner.pages.get_mut(&page_id).unwrap();
        if is_dirty {
            frame.dirty = true;
        }
        if frame.pin_count == 0 {
            return Ok(());
        }
        frame.pin_count -= 1;
        if frame.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        Ok(())
    }

    fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(frame) = inner.pages.get(&page_id) {
            if frame.pin_count > 0 {
                return Err(Error::internal(format!(
                    "cannot delete pinned page {}",
                    page_id
                )));
            }
        } else {
            return Ok(());
        }
        let frame_id = inner.page_to_frame.remove(&page_id).unwrap();
        inner.frame_to_page.remove(&frame_id);
        inner.pages.remove(&page_id);
        self.replacer.pin(frame_id);
        inner.free_frames.push(frame_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_then_fetch_roundtrips() {
        let pool = InMemoryBufferPoolManager::new(4);
        let page = pool.new_page().unwrap();
        let page_id = page.page_id();
        pool.unpin_page(page_id, false).unwrap();

        let fetched = pool.fetch_page(page_id).unwrap();
        assert_eq!(fetched.page_id(), page_id);
        pool.unpin_page(page_id, false).unwrap();
    }

    #[test]
    fn out_of_memory_when_all_pinned() {
        let pool = InMemoryBufferPoolManager::new(2);
        let _a = pool.new_page().unwrap();
        let _b = pool.new_page().unwrap();
        let err = pool.new_page().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    }

    #[test]
    fn unpinned_page_is_evicted_for_new_page() {
        let pool = InMemoryBufferPoolManager::new(1);
        let a = pool.new_page().unwrap();
        let a_id = a.page_id();
        pool.unpin_page(a_id, false).unwrap();

        let b = pool.new_page().unwrap();
        assert_ne!(a_id, b.page_id());
        assert!(pool.fetch_page(a_id).is_err());
    }

    #[test]
    fn delete_frees_the_frame() {
        let pool = InMemoryBufferPoolManager::new(1);
        let a = pool.new_page().unwrap();
        let a_id = a.page_id();
        pool.unpin_page(a_id, false).unwrap();
        pool.delete_page(a_id).unwrap();

        let b = pool.new_page().unwrap();
        assert_ne!(a_id, b.page_id());
    }
}
