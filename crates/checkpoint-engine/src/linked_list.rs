//! A doubly-linked list with O(1) head/tail push/pop and a cursor that
//! supports forward/backward traversal, delete-at-cursor, and
//! insert-before. Used as the bucket chains of [`crate::hash_map`] and as
//! the child lists of [`crate::tree`].
//!
//! Sorting is a deliberate bubble sort: every list this type backs is short
//! (a hash bucket chain or one tree node's children), so the simplicity of
//! bubble sort outweighs its asymptotic cost.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Link<T> = Rc<RefCell<Node<T>>>;

struct Node<T> {
    payload: T,
    next: Option<Link<T>>,
    prev: Option<Weak<RefCell<Node<T>>>>,
}

pub struct CheckpointList<T> {
    head: Option<Link<T>>,
    tail: Option<Link<T>>,
    len: usize,
}

impl<T> Default for CheckpointList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CheckpointList<T> {
    pub fn new() -> Self {
        CheckpointList {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_front(&mut self, payload: T) {
        let node = Rc::new(RefCell::new(Node {
            payload,
            next: self.head.clone(),
            prev: None,
        }));

        match self.head.take() {
            Some(old_head) => {
                old_head.borrow_mut().prev = Some(Rc::downgrade(&node));
                self.head = Some(node);
            }
            None => {
                self.tail = Some(node.clone());
                self.head = Some(node);
            }
        }
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let old_head = self.head.take()?;
        match old_head.borrow_mut().next.take() {
            Some(new_head) => {
                new_head.borrow_mut().prev = None;
                self.head = Some(new_head);
            }
            None => {
                self.tail = None;
            }
        }
        self.len -= 1;
        let node = Rc::try_unwrap(old_head)
            .unwrap_or_else(|_| panic!("dangling reference to popped node"))
            .into_inner();
        Some(node.payload)
    }

    pub fn push_back(&mut self, payload: T) {
        let node = Rc::new(RefCell::new(Node {
            payload,
            next: None,
            prev: self.tail.as_ref().map(Rc::downgrade),
        }));

        match self.tail.take() {
            Some(old_tail) => {
                old_tail.borrow_mut().next = Some(node.clone());
                self.tail = Some(node);
            }
            None => {
                self.head = Some(node.clone());
                self.tail = Some(node);
            }
        }
        self.len += 1;
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let old_tail = self.tail.take()?;
        let prev = old_tail.borrow_mut().prev.take();
        match prev.and_then(|weak| weak.upgrade()) {
            Some(new_tail) => {
                new_tail.borrow_mut().next = None;
                self.tail = Some(new_tail);
            }
            None => {
                self.head = None;
            }
        }
        self.len -= 1;
        let node = Rc::try_unwrap(old_tail)
            .unwrap_or_else(|_| panic!("dangling reference to popped node"))
            .into_inner();
        Some(node.payload)
    }

    pub fn cursor_front(&mut self) -> Cursor<'_, T> {
        let head = self.head.clone();
        Cursor {
            list: self,
            current: head,
        }
    }

    pub fn cursor_back(&mut self) -> Cursor<'_, T> {
        let tail = self.tail.clone();
        Cursor {
            list: self,
            current: tail,
        }
    }
}

impl<T: Clone> CheckpointList<T> {
    /// Snapshot every payload in list order. Used by read-only traversals
    /// (bucket iteration, tree-children DFS, serialization) that don't need
    /// cursor-based mutation.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.head.clone();
        while let Some(node) = cur {
            out.push(node.borrow().payload.clone());
            cur = node.borrow().next.clone();
        }
        out
    }
}

/// A cursor over a [`CheckpointList`], positioned at a node (or invalid if
/// the list is empty).
pub struct Cursor<'a, T> {
    list: &'a mut CheckpointList<T>,
    current: Option<Link<T>>,
}

impl<'a, T> Cursor<'a, T> {
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.current
            .as_ref()
            .map(|n| n.borrow().next.is_some())
            .unwrap_or(false)
    }

    pub fn has_prev(&self) -> bool {
        self.current
            .as_ref()
            .map(|n| n.borrow().prev.is_some())
            .unwrap_or(false)
    }

    pub fn advance(&mut self) -> bool {
        let next = match &self.current {
            Some(n) => n.borrow().next.clone(),
            None => None,
        };
        match next {
            Some(n) => {
                self.current = Some(n);
                true
            }
            None => false,
        }
    }

    pub fn retreat(&mut self) -> bool {
        let prev = match &self.current {
            Some(n) => n.borrow().prev.clone().and_then(|w| w.upgrade()),
            None => None,
        };
        match prev {
            Some(n) => {
                self.current = Some(n);
                true
            }
            None => false,
        }
    }

    pub fn with_payload<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.current.as_ref().map(|n| f(&n.borrow().payload))
    }

    pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.current.as_ref().map(|n| f(&mut n.borrow_mut().payload))
    }

    /// Deletes the node the cursor points at. The cursor moves to the
    /// successor if there is one, else the predecessor, else becomes
    /// invalid. Returns `false` if the list is now empty, `true` otherwise.
    pub fn delete(&mut self) -> bool {
        self.delete_and_take();
        !self.list.is_empty()
    }

    /// Like [`delete`](Cursor::delete), but hands the removed payload back
    /// to the caller instead of dropping it (ownership transfer, matching
    /// the map's `remove` contract).
    pub fn delete_and_take(&mut self) -> Option<T> {
        let old = self.current.take()?;

        let next = old.borrow().next.clone();
        let prev = old.borrow().prev.clone().and_then(|w| w.upgrade());

        match (&prev, &next) {
            (None, None) => {
                self.list.head = None;
                self.list.tail = None;
                self.current = None;
            }
            (None, Some(n)) => {
                n.borrow_mut().prev = None;
                self.list.head = Some(n.clone());
                self.current = Some(n.clone());
            }
            (Some(p), None) => {
                p.borrow_mut().next = None;
                self.list.tail = Some(p.clone());
                self.current = Some(p.clone());
            }
            (Some(p), Some(n)) => {
                p.borrow_mut().next = Some(n.clone());
                n.borrow_mut().prev = Some(Rc::downgrade(p));
                self.current = Some(n.clone());
            }
        }

        self.list.len -= 1;
        let node = Rc::try_unwrap(old)
            .unwrap_or_else(|_| panic!("dangling reference to deleted node"))
            .into_inner();
        Some(node.payload)
    }

    /// Inserts `payload` as the predecessor of the cursor's current node.
    /// The cursor continues to point at the same node.
    pub fn insert_before(&mut self, payload: T) {
        let cur = match &self.current {
            Some(n) => n.clone(),
            None => {
                self.list.push_back(payload);
                self.current = self.list.tail.clone();
                return;
            }
        };

        let prev = cur.borrow().prev.clone().and_then(|w| w.upgrade());
        let new_node = Rc::new(RefCell::new(Node {
            payload,
            next: Some(cur.clone()),
            prev: prev.as_ref().map(Rc::downgrade),
        }));

        match prev {
            Some(p) => {
                p.borrow_mut().next = Some(new_node.clone());
            }
            None => {
                self.list.head = Some(new_node.clone());
            }
        }
        cur.borrow_mut().prev = Some(Rc::downgrade(&new_node));
        self.list.len += 1;
    }
}

impl<T: Clone> CheckpointList<T> {
    /// Bubble sort, swapping adjacent payloads until a full pass makes no
    /// swaps. Retained deliberately unsophisticated: every list this type
    /// backs is short.
    pub fn sort(&mut self, ascending: bool, compare: impl Fn(&T, &T) -> std::cmp::Ordering) {
        if self.len < 2 {
            return;
        }

        loop {
            let mut swapped = false;
            let mut cur = self.head.clone();
            while let Some(node) = cur {
                let next = node.borrow().next.clone();
                if let Some(next_node) = &next {
                    let mut ordering = compare(&node.borrow().payload, &next_node.borrow().payload);
                    if !ascending {
                        ordering = ordering.reverse();
                    }
                    if ordering == std::cmp::Ordering::Greater {
                        std::mem::swap(
                            &mut node.borrow_mut().payload,
                            &mut next_node.borrow_mut().payload,
                        );
                        swapped = true;
                    }
                }
                cur = next;
            }
            if !swapped {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_invariants() {
        let list: CheckpointList<i32> = CheckpointList::new();
        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn push_front_and_pop_front_is_lifo() {
        let mut list = CheckpointList::new();
        list.push_front(1);
        list.push_front(2);
        list.push_front(3);
        assert_eq!(list.pop_front(), Some(3));
        assert_eq!(list.pop_front(), Some(2));
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_front(), None);
    }

    #[test]
    fn push_back_and_pop_front_is_fifo() {
        let mut list = CheckpointList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_front(), Some(2));
        assert_eq!(list.pop_front(), Some(3));
    }

    #[test]
    fn cursor_delete_middle_splices_correctly() {
        let mut list = CheckpointList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);

        let mut cursor = list.cursor_front();
        cursor.advance(); // points at 2
        let still_non_empty = cursor.delete();
        assert!(still_non_empty);
        assert_eq!(cursor.with_payload(|v| *v), Some(3));

        let values: Vec<i32> = list.to_vec();
        assert_eq!(values, vec![1, 3]);
    }

    #[test]
    fn cursor_delete_last_element_reports_empty() {
        let mut list = CheckpointList::new();
        list.push_back(42);
        let mut cursor = list.cursor_front();
        assert!(!cursor.delete());
        assert!(list.is_empty());
    }

    #[test]
    fn insert_before_head_prepends() {
        let mut list = CheckpointList::new();
        list.push_back(2);
        let mut cursor = list.cursor_front();
        cursor.insert_before(1);
        let values: Vec<i32> = list.to_vec();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn sort_ascending_bubbles_into_order() {
        let mut list = CheckpointList::new();
        for v in [5, 3, 4, 1, 2] {
            list.push_back(v);
        }
        list.sort(true, |a: &i32, b: &i32| a.cmp(b));
        let values: Vec<i32> = list.to_vec();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }
}
