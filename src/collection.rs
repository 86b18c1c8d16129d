use crate::controller::ControllerKind;
use crate::presentable::{EntryId, Presentable, PresentableState};

/// Ordered collection of stack entries, bottom to top.
///
/// Structure is a flat list with parent back-links: simple, O(n) per
/// structural query, and it keeps every subtree contiguous because children
/// are always inserted immediately after their parent's last descendant.
/// Only the presenter mutates it; observers get read-only iteration.
#[derive(Default)]
pub struct PresentableCollection {
    entries: Vec<Presentable>,
}

impl PresentableCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bottom-to-top iteration; reversible for top-down walks.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Presentable> {
        self.entries.iter()
    }

    pub fn get(&self, id: EntryId) -> Option<&Presentable> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut Presentable> {
        self.entries.iter_mut().find(|entry| entry.id() == id)
    }

    pub(crate) fn index_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    pub(crate) fn at(&self, index: usize) -> Option<&Presentable> {
        self.entries.get(index)
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut Presentable> {
        self.entries.get_mut(index)
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> Presentable {
        self.entries.remove(index)
    }

    /// Insert an entry. Roots are appended at the top; an entry with a parent
    /// is inserted immediately after the parent's last descendant, keeping
    /// each subtree contiguous and nearest-descendant-first.
    pub(crate) fn insert(&mut self, entry: Presentable) {
        match entry.parent() {
            None => self.entries.push(entry),
            Some(parent) => {
                let index = self
                    .last_descendant_index(parent)
                    .or_else(|| self.index_of(parent))
                    .map(|i| i + 1)
                    .unwrap_or(self.entries.len());
                self.entries.insert(index, entry);
            }
        }
    }

    /// Walk parent links to decide whether `id` sits in `ancestor`'s subtree.
    pub fn is_descendant(&self, id: EntryId, ancestor: EntryId) -> bool {
        let mut current = self.get(id).and_then(|entry| entry.parent());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get(parent).and_then(|entry| entry.parent());
        }
        false
    }

    /// Index of the last entry belonging to `parent`'s subtree, scanning from
    /// the top of the stack downward.
    fn last_descendant_index(&self, parent: EntryId) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.id() == parent || self.is_descendant(entry.id(), parent))
    }

    /// Direct children of `id`, in collection (nearest-inserted-first) order.
    pub fn children_of(&self, id: EntryId) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|entry| entry.parent() == Some(id))
            .map(|entry| entry.id())
            .collect()
    }

    /// Depth-first post-order over `root`'s subtree, children in collection
    /// order: the teardown sequence that disposes every descendant before
    /// its parent.
    pub(crate) fn teardown_order(&self, root: EntryId) -> Vec<EntryId> {
        let mut order = Vec::new();
        self.collect_post_order(root, &mut order);
        order
    }

    fn collect_post_order(&self, id: EntryId, order: &mut Vec<EntryId>) {
        for child in self.children_of(id) {
            self.collect_post_order(child, order);
        }
        order.push(id);
    }

    /// Root id of the subtree containing `id`.
    pub(crate) fn root_of(&self, id: EntryId) -> EntryId {
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|entry| entry.parent()) {
            current = parent;
        }
        current
    }

    pub fn roots(&self) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|entry| entry.parent().is_none())
            .map(|entry| entry.id())
            .collect()
    }

    /// The topmost entry that has not been dismissed: the activation
    /// candidate.
    pub fn topmost_live(&self) -> Option<EntryId> {
        self.entries
            .iter()
            .rev()
            .find(|entry| {
                matches!(
                    entry.state(),
                    PresentableState::Initialized
                        | PresentableState::Presented
                        | PresentableState::Active
                )
            })
            .map(|entry| entry.id())
    }

    /// Z-index for a same-layer group: how many other tracked entries share
    /// `layer` and precede `id` in collection order.
    pub fn z_index_of(&self, id: EntryId, layer: i32) -> usize {
        self.entries
            .iter()
            .take_while(|entry| entry.id() != id)
            .filter(|entry| entry.layer() == layer)
            .count()
    }

    pub fn find_by_kind(&self, kind: ControllerKind) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|entry| entry.kind() == kind)
            .map(|entry| entry.id())
            .collect()
    }

    pub fn find_by_tag(&self, tag: i64) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|entry| entry.tag() == tag)
            .map(|entry| entry.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PresentOptions;
    use crate::presentable::PresentableCore;

    fn entry(id: EntryId, parent: Option<EntryId>, layer: i32) -> Presentable {
        let core =
            PresentableCore::new(id, ControllerKind("test"), PresentOptions::empty(), layer, 0);
        Presentable::new(core, parent)
    }

    fn ids(collection: &PresentableCollection) -> Vec<EntryId> {
        collection.iter().map(|e| e.id()).collect()
    }

    #[test]
    fn roots_append_at_top() {
        let mut collection = PresentableCollection::new();
        collection.insert(entry(1, None, 0));
        collection.insert(entry(2, None, 0));
        collection.insert(entry(3, None, 0));
        assert_eq!(ids(&collection), vec![1, 2, 3]);
    }

    #[test]
    fn children_stay_contiguous_with_their_subtree() {
        let mut collection = PresentableCollection::new();
        collection.insert(entry(1, None, 0));
        collection.insert(entry(2, None, 0));
        // Child of 1 goes right after 1, before root 2.
        collection.insert(entry(3, Some(1), 0));
        assert_eq!(ids(&collection), vec![1, 3, 2]);
        // Grandchild goes after 3; a second child of 1 goes after the whole
        // subtree of the first child.
        collection.insert(entry(4, Some(3), 0));
        collection.insert(entry(5, Some(1), 0));
        assert_eq!(ids(&collection), vec![1, 3, 4, 5, 2]);
        assert!(collection.is_descendant(4, 1));
        assert!(!collection.is_descendant(2, 1));
    }

    #[test]
    fn teardown_order_is_children_first() {
        let mut collection = PresentableCollection::new();
        collection.insert(entry(1, None, 0));
        collection.insert(entry(2, Some(1), 0));
        collection.insert(entry(3, Some(2), 0));
        collection.insert(entry(4, Some(1), 0));
        assert_eq!(collection.teardown_order(1), vec![3, 2, 4, 1]);
    }

    #[test]
    fn z_index_counts_preceding_same_layer_entries() {
        let mut collection = PresentableCollection::new();
        collection.insert(entry(1, None, 0));
        collection.insert(entry(2, None, 7));
        collection.insert(entry(3, None, 0));
        collection.insert(entry(4, None, 0));
        assert_eq!(collection.z_index_of(1, 0), 0);
        assert_eq!(collection.z_index_of(2, 7), 0);
        assert_eq!(collection.z_index_of(3, 0), 1);
        assert_eq!(collection.z_index_of(4, 0), 2);
    }

    #[test]
    fn topmost_live_skips_dismissed_entries() {
        let mut collection = PresentableCollection::new();
        collection.insert(entry(1, None, 0));
        collection.insert(entry(2, None, 0));
        assert_eq!(collection.topmost_live(), Some(2));
        collection
            .get(2)
            .unwrap()
            .core()
            .request_dismiss(crate::error::DismissReason::Requested, None);
        assert_eq!(collection.topmost_live(), Some(1));
    }
}
