/*!
label.rs - sorted, page-bucketed interval index over the address space.

Grounded on `examples/original_source/bare68k/machine_src/glue/label.c`: each
label owns one node per page it touches, the starting page's node is
insertion-sorted by entry start address, and every later page gets its node
pushed to the front of that page's list (cheap, and fine because `find`'s
early-exit only relies on the *starting* page being sorted). Rather than a
linked intrusive node chain, each `LabelSlot` simply records which pages it
touched, so `remove` can walk that list directly.

`add` returns `Result<LabelId, LabelError>` rather than the bare
`Option<LabelId>` sketched in SPEC_FULL.md §4.C, matching `Memory`'s
fallible-setup convention (`error::LabelError` already distinguishes why an
add failed; throwing that away behind an `Option` would make every caller
re-derive it from scratch).
*/

use std::any::Any;
use std::collections::HashSet;

use crate::error::LabelError;
use crate::memory::PAGE_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(u32);

struct LabelSlot {
    addr: u32,
    end: u32,
    data: Option<Box<dyn Any>>,
    pages: Vec<u32>,
}

/// Sorted, page-bucketed interval index. See SPEC_FULL.md §4.C.
pub struct LabelIndex {
    num_pages: u32,
    slots: Vec<Option<LabelSlot>>,
    free_list: Vec<u32>,
    page_lists: Vec<Vec<LabelId>>,
    cleanup: Option<Box<dyn Fn(LabelId, Box<dyn Any>)>>,
}

impl LabelIndex {
    pub fn new(num_pages: u32) -> LabelIndex {
        LabelIndex {
            num_pages,
            slots: Vec::new(),
            free_list: Vec::new(),
            page_lists: (0..num_pages).map(|_| Vec::new()).collect(),
            cleanup: None,
        }
    }

    /// Invoked with each entry's `data` payload when it is removed, mirroring
    /// `label_cleanup_func_t`.
    pub fn set_cleanup_hook(&mut self, hook: Option<Box<dyn Fn(LabelId, Box<dyn Any>)>>) {
        self.cleanup = hook;
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Number of live entries (slots with a chain, per invariant 3).
    pub fn total_labels(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn alloc_slot(&mut self, slot: LabelSlot) -> LabelId {
        if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = Some(slot);
            LabelId(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(slot));
            LabelId(index)
        }
    }

    /// Install a label over `[addr, addr+size-1]`.
    pub fn add(&mut self, addr: u32, size: u32, data: Option<Box<dyn Any>>) -> Result<LabelId, LabelError> {
        if size == 0 {
            return Err(LabelError::ZeroSize);
        }
        let end = addr + size - 1;
        let start_page = addr >> PAGE_SHIFT;
        let end_page = end >> PAGE_SHIFT;
        if end_page >= self.num_pages {
            return Err(LabelError::OutOfRange {
                end_page,
                num_pages: self.num_pages,
            });
        }

        let id = self.alloc_slot(LabelSlot {
            addr,
            end,
            data,
            pages: (start_page..=end_page).collect(),
        });

        let slots = &self.slots;
        let start_list = &self.page_lists[start_page as usize];
        let pos = start_list
            .iter()
            .position(|other| slots[other.0 as usize].as_ref().unwrap().addr > addr)
            .unwrap_or(start_list.len());
        self.page_lists[start_page as usize].insert(pos, id);

        for page in (start_page + 1)..=end_page {
            self.page_lists[page as usize].insert(0, id);
        }

        Ok(id)
    }

    /// Remove a single entry by id, running the cleanup hook on its payload.
    pub fn remove(&mut self, id: LabelId) {
        let slot = match self.slots[id.0 as usize].take() {
            Some(slot) => slot,
            None => return,
        };
        for page in &slot.pages {
            let list = &mut self.page_lists[*page as usize];
            if let Some(pos) = list.iter().position(|other| *other == id) {
                list.remove(pos);
            }
        }
        self.free_list.push(id.0);
        if let (Some(cleanup), Some(data)) = (self.cleanup.as_ref(), slot.data) {
            cleanup(id, data);
        }
    }

    /// Remove every entry fully contained in `[addr, addr+size-1]`. Returns
    /// the count removed.
    pub fn remove_inside(&mut self, addr: u32, size: u32) -> usize {
        if size == 0 || self.num_pages == 0 {
            return 0;
        }
        let end = addr + size - 1;
        let start_page = (addr >> PAGE_SHIFT).min(self.num_pages - 1);
        let end_page = (end >> PAGE_SHIFT).min(self.num_pages - 1);

        let mut victims = HashSet::new();
        for page in start_page..=end_page {
            for &id in &self.page_lists[page as usize] {
                let slot = self.slots[id.0 as usize].as_ref().unwrap();
                if slot.addr >= addr && slot.end <= end {
                    victims.insert(id);
                }
            }
        }
        let count = victims.len();
        for id in victims {
            self.remove(id);
        }
        count
    }

    /// Find the entry containing `addr`, if any.
    pub fn find(&self, addr: u32) -> Option<LabelId> {
        let page = addr >> PAGE_SHIFT;
        let list = self.page_lists.get(page as usize)?;
        for &id in list {
            let slot = self.slots[id.0 as usize].as_ref().unwrap();
            if slot.addr > addr {
                break;
            }
            if addr <= slot.end {
                return Some(id);
            }
        }
        None
    }

    /// Every distinct entry intersecting `[addr, addr+size-1]`.
    pub fn find_intersecting(&self, addr: u32, size: u32) -> Vec<LabelId> {
        if size == 0 {
            return Vec::new();
        }
        let end = addr + size - 1;
        let start_page = (addr >> PAGE_SHIFT).min(self.num_pages.saturating_sub(1));
        let end_page = (end >> PAGE_SHIFT).min(self.num_pages.saturating_sub(1));

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for page in start_page..=end_page {
            let Some(list) = self.page_lists.get(page as usize) else {
                continue;
            };
            for &id in list {
                let slot = self.slots[id.0 as usize].as_ref().unwrap();
                if slot.addr <= end && addr <= slot.end && seen.insert(id) {
                    out.push(id);
                }
            }
        }
        out
    }

    /// Read back an entry's `(addr, size)` span.
    pub fn span(&self, id: LabelId) -> Option<(u32, u32)> {
        self.slots[id.0 as usize]
            .as_ref()
            .map(|slot| (slot.addr, slot.end - slot.addr + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PAGE_SIZE;

    #[test]
    fn add_rejects_zero_size() {
        let mut labels = LabelIndex::new(4);
        assert_eq!(labels.add(0, 0, None).unwrap_err(), LabelError::ZeroSize);
    }

    #[test]
    fn add_rejects_out_of_range() {
        let mut labels = LabelIndex::new(1);
        let err = labels.add(PAGE_SIZE, 1, None).unwrap_err();
        assert_eq!(err, LabelError::OutOfRange { end_page: 1, num_pages: 1 });
    }

    #[test]
    fn find_locates_containing_entry() {
        let mut labels = LabelIndex::new(4);
        let id = labels.add(0x100, 0x10, None).unwrap();
        assert_eq!(labels.find(0x108), Some(id));
        assert_eq!(labels.find(0x200), None);
    }

    #[test]
    fn multi_page_label_removable_from_every_page() {
        let mut labels = LabelIndex::new(4);
        let id = labels.add(PAGE_SIZE - 4, 16, None).unwrap();
        assert_eq!(labels.find(PAGE_SIZE - 4), Some(id));
        assert_eq!(labels.find(PAGE_SIZE + 4), Some(id));
        labels.remove(id);
        assert_eq!(labels.find(PAGE_SIZE - 4), None);
        assert_eq!(labels.find(PAGE_SIZE + 4), None);
        assert_eq!(labels.total_labels(), 0);
    }

    #[test]
    fn remove_inside_only_removes_fully_contained_entries() {
        let mut labels = LabelIndex::new(4);
        let inside = labels.add(0x100, 0x10, None).unwrap();
        let straddling = labels.add(0x100, PAGE_SIZE, None).unwrap();
        let count = labels.remove_inside(0x0, 0x200);
        assert_eq!(count, 1);
        assert_eq!(labels.find(0x108), None);
        assert!(labels.find(PAGE_SIZE + 8).is_some());
        let _ = (inside, straddling);
    }

    #[test]
    fn find_intersecting_deduplicates_multi_page_entries() {
        let mut labels = LabelIndex::new(4);
        let id = labels.add(PAGE_SIZE - 4, 16, None).unwrap();
        let hits = labels.find_intersecting(0, 2 * PAGE_SIZE);
        assert_eq!(hits, vec![id]);
    }

    #[test]
    fn remove_invokes_cleanup_with_payload() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(None));
        let seen_clone = seen.clone();
        let mut labels = LabelIndex::new(4);
        labels.set_cleanup_hook(Some(Box::new(move |_id, data| {
            *seen_clone.borrow_mut() = data.downcast_ref::<u32>().copied();
        })));
        let id = labels.add(0x10, 0x10, Some(Box::new(99u32))).unwrap();
        labels.remove(id);
        assert_eq!(*seen.borrow(), Some(99));
    }
}
