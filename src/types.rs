//! Patch representation shared by the differ, the locator and the applier.
use crate::events::{EventRoute, Mapper};
use crate::facts::FactsDiff;
use crate::live::LiveId;
use crate::node::{CustomPatch, VNode};
use std::fmt;

/// One mutation, addressed by the pre-order index of its target in the old
/// snapshot. `target` and `route` stay empty until the locator runs.
pub struct Patch {
    pub index: usize,
    pub action: PatchAction,
    pub(crate) target: Option<LiveId>,
    pub(crate) route: Option<EventRoute>,
}

impl Patch {
    pub(crate) fn new(index: usize, action: PatchAction) -> Self {
        Patch { index, action, target: None, route: None }
    }

    /// The live node this patch was attached to, once located.
    pub fn target(&self) -> Option<LiveId> {
        self.target
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("index", &self.index)
            .field("action", &self.action)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

pub enum PatchAction {
    /// Replace the whole subtree with a fresh render.
    Redraw(VNode),
    /// Patches of a memoized subtree, indexed from 0 inside it.
    RecurseIntoMemo(Vec<Patch>),
    RetagMapper(Vec<Mapper>),
    ReplaceText(String),
    UpdateFacts(FactsDiff),
    RunCustomPatch(CustomPatch),
    RemoveTrailingChildren { from: usize, count: usize },
    AppendChildren { from: usize, nodes: Vec<VNode> },
    DiffKeyedChildren(KeyedChildrenPatch),
    /// Removal of one keyed child; `Some` when the child is moved, not dropped.
    RemoveKeyed(Option<MovedNode>),
}

impl PatchAction {
    pub fn name(&self) -> &'static str {
        match self {
            PatchAction::Redraw(_) => "REDRAW",
            PatchAction::RecurseIntoMemo(_) => "RECURSE_INTO_MEMO",
            PatchAction::RetagMapper(_) => "RETAG_MAPPER",
            PatchAction::ReplaceText(_) => "REPLACE_TEXT",
            PatchAction::UpdateFacts(_) => "UPDATE_FACTS",
            PatchAction::RunCustomPatch(_) => "RUN_CUSTOM_PATCH",
            PatchAction::RemoveTrailingChildren { .. } => "REMOVE_TRAILING_CHILDREN",
            PatchAction::AppendChildren { .. } => "APPEND_CHILDREN",
            PatchAction::DiffKeyedChildren(_) => "DIFF_KEYED_CHILDREN",
            PatchAction::RemoveKeyed(_) => "REMOVE_KEYED",
        }
    }
}

impl fmt::Display for PatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for PatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchAction::Redraw(node) => f.debug_tuple("Redraw").field(node).finish(),
            PatchAction::RecurseIntoMemo(sub) => f.debug_tuple("RecurseIntoMemo").field(sub).finish(),
            PatchAction::RetagMapper(taggers) => f.debug_tuple("RetagMapper").field(&taggers.len()).finish(),
            PatchAction::ReplaceText(text) => f.debug_tuple("ReplaceText").field(text).finish(),
            PatchAction::UpdateFacts(diff) => f.debug_tuple("UpdateFacts").field(diff).finish(),
            PatchAction::RunCustomPatch(_) => f.write_str("RunCustomPatch(<fn>)"),
            PatchAction::RemoveTrailingChildren { from, count } => f
                .debug_struct("RemoveTrailingChildren")
                .field("from", from)
                .field("count", count)
                .finish(),
            PatchAction::AppendChildren { from, nodes } => f
                .debug_struct("AppendChildren")
                .field("from", from)
                .field("nodes", nodes)
                .finish(),
            PatchAction::DiffKeyedChildren(keyed) => f.debug_tuple("DiffKeyedChildren").field(keyed).finish(),
            PatchAction::RemoveKeyed(moved) => f.debug_tuple("RemoveKeyed").field(moved).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Seen only on the new side so far.
    Inserted,
    /// Seen only on the old side so far.
    Removed,
    /// Seen on both sides: the old live node is detached and reinserted.
    Moved,
}

/// Move-table record for one key.
#[derive(Debug)]
pub struct KeyedEntry {
    pub state: EntryState,
    pub vnode: VNode,
    /// Old pre-order index while `Removed`, new child position afterwards.
    pub index: Option<usize>,
    /// Slot of the pending `RemoveKeyed` patch in the local patch list.
    pub(crate) remove_slot: Option<usize>,
}

/// Insert (or move) an entry at position `index` of the new child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyedInsert {
    pub index: usize,
    pub entry: usize,
}

#[derive(Debug)]
pub struct MovedNode {
    pub entry: usize,
    pub patches: Vec<Patch>,
}

/// Everything needed to reconcile one keyed child list.
///
/// Applied as: `patches` (in-place diffs and removals, moved nodes detached),
/// then `inserts` in ascending position, then `end_inserts` appended.
#[derive(Debug, Default)]
pub struct KeyedChildrenPatch {
    pub patches: Vec<Patch>,
    pub inserts: Vec<KeyedInsert>,
    pub end_inserts: Vec<usize>,
    pub entries: Vec<KeyedEntry>,
}

impl KeyedChildrenPatch {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.inserts.is_empty() && self.end_inserts.is_empty()
    }

    /// Moves recorded in this patch (entries matched on both sides).
    pub fn moves(&self) -> usize {
        self.entries.iter().filter(|e| e.state == EntryState::Moved).count()
    }
}

/// Total number of patches, counting nested sub-lists.
pub fn count_patches(patches: &[Patch]) -> usize {
    patches
        .iter()
        .map(|patch| {
            1 + match &patch.action {
                PatchAction::RecurseIntoMemo(sub) => count_patches(sub),
                PatchAction::DiffKeyedChildren(keyed) => count_patches(&keyed.patches),
                PatchAction::RemoveKeyed(Some(moved)) => count_patches(&moved.patches),
                _ => 0,
            }
        })
        .sum()
}
