//! Virtual-tree reconciliation engine.
//!
//! View code builds immutable snapshots ([`node::VNode`]). [`update`] diffs the
//! previous snapshot against the next one, locates the affected live nodes
//! and applies the minimal set of mutations to the [`live::LiveDom`].
mod applier;
pub mod config;
pub mod converters;
mod diff_engine;
pub mod errors;
pub mod events;
pub mod facts;
pub mod html_generator;
mod keyed;
pub mod live;
mod locator;
pub mod node;
mod render;
pub mod scheduler;
pub mod types;

pub use applier::apply_patches;
pub use config::ReconcilerConfig;
pub use diff_engine::diff;
pub use errors::ReconcilerError;
pub use events::{Dispatcher, Message};
pub use live::{LiveDom, LiveId};
pub use node::VNode;
pub use render::{apply_facts, render_node};

use log::{debug, error, info};
use types::count_patches;

/// Render `vnode` as a fresh, detached live subtree under the root route.
pub fn render(dom: &mut LiveDom, vnode: &VNode) -> Result<LiveId, ReconcilerError> {
    let route = dom.root_route().clone();
    render_node(dom, vnode, &route)
}

/// Bring the live tree at `root`, currently showing `old`, in line with `new`.
/// Returns the (possibly replaced) root.
pub fn update(dom: &mut LiveDom, root: LiveId, old: &VNode, new: &VNode) -> Result<LiveId, ReconcilerError> {
    let patches = diff(old, new);
    debug!("update: {} patch(es) for {}", count_patches(&patches), root);
    apply_patches(dom, root, old, patches)
}

/// Owns a live document and the snapshot currently shown in it.
pub struct Reconciler {
    dom: LiveDom,
    current: Option<(VNode, LiveId)>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_config(dispatcher, ReconcilerConfig::default())
    }

    pub fn with_config(dispatcher: Dispatcher, config: ReconcilerConfig) -> Self {
        info!("Reconciler initialized (record_mutations: {})", config.record_mutations);
        let dom = if config.record_mutations { LiveDom::with_journal(dispatcher) } else { LiveDom::new(dispatcher) };
        Reconciler { dom, current: None, config }
    }

    /// Render `vnode` from scratch, dropping whatever was mounted before.
    pub fn mount(&mut self, vnode: VNode) -> Result<LiveId, ReconcilerError> {
        if let Some((_, old_root)) = self.current.take() {
            self.dom.destroy(old_root)?;
        }
        let root = render(&mut self.dom, &vnode)?;
        debug!("Reconciler: mounted {} ({} live nodes)", root, self.dom.len());
        self.current = Some((vnode, root));
        Ok(root)
    }

    /// Show `vnode`, diffing against the current snapshot when there is one.
    ///
    /// A failed update can leave the live tree partly patched, so on error the
    /// mounted tree is destroyed and nothing stays mounted. The next call
    /// renders from scratch.
    pub fn reconcile(&mut self, vnode: VNode) -> Result<LiveId, ReconcilerError> {
        let Some((old, root)) = self.current.take() else {
            return self.mount(vnode);
        };
        match update(&mut self.dom, root, &old, &vnode) {
            Ok(root) => {
                self.current = Some((vnode, root));
                Ok(root)
            }
            Err(err) => {
                error!("Reconciler: update of {} failed, unmounting: {}", root, err);
                if self.dom.contains(root) {
                    self.dom.destroy(root)?;
                }
                Err(err)
            }
        }
    }

    pub fn root(&self) -> Option<LiveId> {
        self.current.as_ref().map(|(_, root)| *root)
    }

    pub fn snapshot(&self) -> Option<&VNode> {
        self.current.as_ref().map(|(vnode, _)| vnode)
    }

    pub fn dom(&self) -> &LiveDom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut LiveDom {
        &mut self.dom
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Markup of the mounted tree, empty when nothing is mounted.
    pub fn to_html(&self) -> Result<String, ReconcilerError> {
        match self.root() {
            Some(root) => html_generator::to_html(&self.dom, root),
            None => Ok(String::new()),
        }
    }

    /// Mutations recorded since the last call, as JSON.
    pub fn drain_journal(&mut self) -> Result<String, ReconcilerError> {
        converters::mutations_to_json(&self.dom.take_mutations())
    }
}
