//! Keyed-children differ.
//!
//! Walks both child lists with one-element look-ahead, which catches the
//! common single insert, single removal, replace and adjacent swap cases
//! cheaply. Everything left over after the walk is removed or appended, and a
//! move table pairs removals with insertions of the same key so matching live
//! nodes are reused instead of rebuilt.
//!
//! Edits that are each followed by an unchanged key cost one operation per
//! added or removed key. Two adjacent edits defeat the look-ahead: from that
//! point every old key is removed and every new key appended at the end, with
//! surviving keys turned into moves.
use crate::diff_engine::{diff_help, push_patch};
use crate::node::{KeyedElement, VNode};
use crate::types::{EntryState, KeyedChildrenPatch, KeyedEntry, KeyedInsert, MovedNode, Patch, PatchAction};
use log::trace;
use std::collections::HashMap;

/// Appended to a key that is already in the move table. Duplicate keys stay
/// distinct this way, but the pairing between duplicates is positional.
const DUPLICATE_KEY_SUFFIX: &str = "\u{1f}dup";

#[derive(Default)]
struct MoveTable {
    keyed: KeyedChildrenPatch,
    changes: HashMap<String, usize>,
}

impl MoveTable {
    fn new_entry(&mut self, key: String, state: EntryState, vnode: &VNode, index: Option<usize>) -> usize {
        let id = self.keyed.entries.len();
        self.keyed.entries.push(KeyedEntry { state, vnode: vnode.clone(), index, remove_slot: None });
        self.changes.insert(key, id);
        id
    }

    fn push_insert(&mut self, entry: usize, position: Option<usize>) {
        match position {
            Some(index) => self.keyed.inserts.push(KeyedInsert { index, entry }),
            None => self.keyed.end_inserts.push(entry),
        }
    }

    /// Record `vnode` appearing under `key` at new position `position`
    /// (`None` for the trailing run).
    fn insert_node(&mut self, key: &str, vnode: &VNode, position: Option<usize>) {
        let mut key = key.to_string();
        loop {
            let Some(&id) = self.changes.get(&key) else {
                let id = self.new_entry(key, EntryState::Inserted, vnode, position);
                self.push_insert(id, position);
                return;
            };

            let entry = &self.keyed.entries[id];
            if let (EntryState::Removed, Some(old_index)) = (entry.state, entry.index) {
                let old_node = entry.vnode.clone();
                let remove_slot = entry.remove_slot;
                let mut sub_patches = Vec::new();
                diff_help(&old_node, vnode, &mut sub_patches, old_index);

                let entry = &mut self.keyed.entries[id];
                entry.state = EntryState::Moved;
                entry.index = position;
                if let Some(slot) = remove_slot {
                    self.keyed.patches[slot].action =
                        PatchAction::RemoveKeyed(Some(MovedNode { entry: id, patches: sub_patches }));
                }
                trace!("KeyedDiff: key {:?} moved from old index {} to {:?}", key, old_index, position);
                self.push_insert(id, position);
                return;
            }

            key.push_str(DUPLICATE_KEY_SUFFIX);
        }
    }

    /// Record `vnode` at old pre-order `index` disappearing from under `key`.
    fn remove_node(&mut self, key: &str, vnode: &VNode, index: usize) {
        let mut key = key.to_string();
        loop {
            let Some(&id) = self.changes.get(&key) else {
                let slot = self.keyed.patches.len();
                push_patch(&mut self.keyed.patches, index, PatchAction::RemoveKeyed(None));
                let id = self.new_entry(key, EntryState::Removed, vnode, Some(index));
                self.keyed.entries[id].remove_slot = Some(slot);
                return;
            };

            if self.keyed.entries[id].state == EntryState::Inserted {
                let new_node = self.keyed.entries[id].vnode.clone();
                let mut sub_patches = Vec::new();
                diff_help(vnode, &new_node, &mut sub_patches, index);
                self.keyed.entries[id].state = EntryState::Moved;
                trace!("KeyedDiff: key {:?} at old index {} moves back", key, index);
                push_patch(
                    &mut self.keyed.patches,
                    index,
                    PatchAction::RemoveKeyed(Some(MovedNode { entry: id, patches: sub_patches })),
                );
                return;
            }

            key.push_str(DUPLICATE_KEY_SUFFIX);
        }
    }
}

pub(crate) fn diff_keyed_children(x_parent: &KeyedElement, y_parent: &KeyedElement, patches: &mut Vec<Patch>, root_index: usize) {
    let x_kids = &x_parent.children;
    let y_kids = &y_parent.children;
    let mut table = MoveTable::default();
    let mut x_index = 0;
    let mut y_index = 0;
    let mut index = root_index;

    while x_index < x_kids.len() && y_index < y_kids.len() {
        let (x_key, x_node) = &x_kids[x_index];
        let (y_key, y_node) = &y_kids[y_index];

        if x_key == y_key {
            index += 1;
            diff_help(x_node, y_node, &mut table.keyed.patches, index);
            index += x_node.descendants();
            x_index += 1;
            y_index += 1;
            continue;
        }

        let x_next = x_kids.get(x_index + 1);
        let y_next = y_kids.get(y_index + 1);
        let old_match = matches!(x_next, Some((key, _)) if key == y_key);
        let new_match = matches!(y_next, Some((key, _)) if key == x_key);

        match (x_next, y_next) {
            // swap x and y
            (Some((x_next_key, x_next_node)), Some((_, y_next_node))) if old_match && new_match => {
                index += 1;
                diff_help(x_node, y_next_node, &mut table.keyed.patches, index);
                table.insert_node(y_key, y_node, Some(y_index));
                index += x_node.descendants();

                index += 1;
                table.remove_node(x_next_key, x_next_node, index);
                index += x_next_node.descendants();

                x_index += 2;
                y_index += 2;
            }
            // insert y
            (_, Some((_, y_next_node))) if new_match => {
                index += 1;
                table.insert_node(y_key, y_node, Some(y_index));
                diff_help(x_node, y_next_node, &mut table.keyed.patches, index);
                index += x_node.descendants();

                x_index += 1;
                y_index += 2;
            }
            // remove x
            (Some((_, x_next_node)), _) if old_match => {
                index += 1;
                table.remove_node(x_key, x_node, index);
                index += x_node.descendants();

                index += 1;
                diff_help(x_next_node, y_node, &mut table.keyed.patches, index);
                index += x_next_node.descendants();

                x_index += 2;
                y_index += 1;
            }
            // remove x, insert y
            (Some((x_next_key, x_next_node)), Some((y_next_key, y_next_node))) if x_next_key == y_next_key => {
                index += 1;
                table.remove_node(x_key, x_node, index);
                table.insert_node(y_key, y_node, Some(y_index));
                index += x_node.descendants();

                index += 1;
                diff_help(x_next_node, y_next_node, &mut table.keyed.patches, index);
                index += x_next_node.descendants();

                x_index += 2;
                y_index += 2;
            }
            _ => break,
        }
    }

    for (x_key, x_node) in &x_kids[x_index..] {
        index += 1;
        table.remove_node(x_key, x_node, index);
        index += x_node.descendants();
    }

    for (y_key, y_node) in &y_kids[y_index..] {
        table.insert_node(y_key, y_node, None);
    }

    if !table.keyed.is_empty() {
        trace!(
            "KeyedDiff: {} local patch(es), {} insert(s), {} end insert(s), {} move(s)",
            table.keyed.patches.len(),
            table.keyed.inserts.len(),
            table.keyed.end_inserts.len(),
            table.keyed.moves()
        );
        push_patch(patches, root_index, PatchAction::DiffKeyedChildren(table.keyed));
    }
}
