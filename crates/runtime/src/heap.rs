//! The heap: a preallocated slab of `Var` cells backing `Vector` values.
//!
//! A `Vector`'s stack head is `Var::Vector(Option<CellId>)`, pointing at the
//! first cell of a singly-linked (forward only; GC mark-sweep never needs
//! to walk backward) chain of heap cells. `append` walks to the tail, so
//! callers building a long vector one element at a time pay O(n); the
//! reference implementation keeps a tail pointer on the vector head for
//! O(1) append, which would be the natural follow-up if profiling ever
//! shows this mattering.

use senie_core::var::Var;
use tracing::debug;

pub const HEAP_SIZE: usize = 1024;
pub const HEAP_MIN_SIZE: usize = 10;

#[derive(Debug, Clone)]
struct Cell {
    value: Var,
    next: Option<usize>,
    mark: bool,
    in_use: bool,
}

/// Mark-and-sweep heap of `Var` cells with a free list, sized once at VM
/// construction (no further growth: exhaustion after a forced GC is fatal,
/// matching the reference implementation's fixed slab).
#[derive(Debug)]
pub struct Heap {
    cells: Vec<Cell>,
    free: Vec<usize>,
}

impl Heap {
    pub fn new(size: usize) -> Self {
        let cells = vec![
            Cell {
                value: Var::Int(0),
                next: None,
                mark: false,
                in_use: false,
            };
            size
        ];
        let free = (0..size).rev().collect();
        Heap { cells, free }
    }

    pub fn avail(&self) -> usize {
        self.free.len()
    }

    pub fn needs_gc(&self, watermark: usize) -> bool {
        self.free.len() < watermark
    }

    /// Pops a cell from the free list, resetting it, or `None` if exhausted.
    fn alloc(&mut self, value: Var) -> Option<usize> {
        let idx = self.free.pop()?;
        self.cells[idx] = Cell {
            value,
            next: None,
            mark: false,
            in_use: true,
        };
        Some(idx)
    }

    /// An empty vector head. No allocation occurs until the first `append`.
    pub fn construct(&self) -> Option<usize> {
        None
    }

    pub fn length(&self, head: Option<usize>) -> usize {
        let mut n = 0;
        let mut cur = head;
        while let Some(idx) = cur {
            n += 1;
            cur = self.cells[idx].next;
        }
        n
    }

    pub fn get(&self, head: Option<usize>, index: usize) -> Option<&Var> {
        let mut cur = head;
        let mut i = 0;
        while let Some(idx) = cur {
            if i == index {
                return Some(&self.cells[idx].value);
            }
            cur = self.cells[idx].next;
            i += 1;
        }
        None
    }

    pub fn iter(&self, head: Option<usize>) -> impl Iterator<Item = &Var> + '_ {
        HeapIter {
            heap: self,
            cur: head,
        }
    }

    /// Appends `value` to the chain rooted at `head`, returning the
    /// (possibly new) head and `None` if the heap is exhausted.
    pub fn append(&mut self, head: Option<usize>, value: Var) -> Option<Option<usize>> {
        let new_idx = self.alloc(value)?;
        match head {
            None => Some(Some(new_idx)),
            Some(h) => {
                let mut cur = h;
                while let Some(next) = self.cells[cur].next {
                    cur = next;
                }
                self.cells[cur].next = Some(new_idx);
                Some(Some(h))
            }
        }
    }

    /// Mark-and-sweep. `roots` is every stack slot in `[0, sp)`; any
    /// `Var::Vector` root marks its whole chain reachable. Unmarked cells
    /// are reset to a default `Int` and relinked into the free list.
    pub fn collect<'a>(&mut self, roots: impl Iterator<Item = &'a Var>) {
        for c in &mut self.cells {
            c.mark = false;
        }
        for root in roots {
            if let Var::Vector(Some(head)) = root {
                self.mark_chain(*head);
            }
        }
        self.free.clear();
        let mut freed = 0;
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            if cell.in_use && !cell.mark {
                cell.value = Var::Int(0);
                cell.next = None;
                cell.in_use = false;
                freed += 1;
            }
            if !cell.in_use {
                self.free.push(idx);
            }
        }
        debug!(freed, avail = self.free.len(), "heap gc collected");
    }

    fn mark_chain(&mut self, head: usize) {
        let mut cur = Some(head);
        while let Some(idx) = cur {
            if self.cells[idx].mark {
                break;
            }
            self.cells[idx].mark = true;
            if let Var::Vector(Some(nested)) = self.cells[idx].value.clone() {
                self.mark_chain(nested);
            }
            cur = self.cells[idx].next;
        }
    }
}

struct HeapIter<'a> {
    heap: &'a Heap,
    cur: Option<usize>,
}

impl<'a> Iterator for HeapIter<'a> {
    type Item = &'a Var;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        self.cur = self.heap.cells[idx].next;
        Some(&self.heap.cells[idx].value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_builds_a_chain_in_order() {
        let mut h = Heap::new(8);
        let mut head = h.construct();
        head = h.append(head, Var::Int(1)).unwrap();
        head = h.append(head, Var::Int(2)).unwrap();
        head = h.append(head, Var::Int(3)).unwrap();
        assert_eq!(h.length(head), 3);
        let collected: Vec<_> = h.iter(head).cloned().collect();
        assert_eq!(collected, vec![Var::Int(1), Var::Int(2), Var::Int(3)]);
    }

    #[test]
    fn gc_frees_unreachable_cells_and_keeps_reachable_ones() {
        let mut h = Heap::new(4);
        let mut head = h.construct();
        head = h.append(head, Var::Int(10)).unwrap();
        head = h.append(head, Var::Int(20)).unwrap();
        assert_eq!(h.avail(), 2);

        let roots = vec![Var::Vector(head)];
        h.collect(roots.iter());
        assert_eq!(h.avail(), 2);
        assert_eq!(h.length(head), 2);

        h.collect(std::iter::empty());
        assert_eq!(h.avail(), 4);
    }

    #[test]
    fn allocation_fails_once_heap_is_exhausted() {
        let mut h = Heap::new(2);
        let mut head = h.construct();
        head = h.append(head, Var::Int(1)).unwrap();
        head = h.append(head, Var::Int(2)).unwrap();
        assert!(h.append(head, Var::Int(3)).is_none());
    }
}
