//! Frame scheduling for a model/update/view program.
//!
//! Asynchronous model changes are coalesced: however many arrive between two
//! frames, the view is drawn once. Synchronous changes draw immediately. The
//! host drives frames by calling [`Program::animation_frame`] whenever
//! [`Program::needs_frame`] says so.
use crate::config::ReconcilerConfig;
use crate::errors::ReconcilerError;
use crate::events::{Dispatcher, EventOutcome, Message};
use crate::live::LiveId;
use crate::node::VNode;
use crate::Reconciler;
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    /// No frame requested.
    Idle,
    /// A frame is requested but the model has not changed since the last draw.
    FrameScheduled,
    /// A frame is requested and a model change is waiting for it.
    FrameScheduledWithPendingUpdate,
}

type Inbox = Rc<RefCell<VecDeque<(Message, bool)>>>;

pub struct Program<M> {
    model: M,
    update: Box<dyn Fn(&mut M, Message)>,
    view: Box<dyn Fn(&M) -> VNode>,
    reconciler: Reconciler,
    inbox: Inbox,
    state: DrawState,
    draws: usize,
}

impl<M> Program<M> {
    /// Build the program and mount the initial view.
    pub fn new(
        config: ReconcilerConfig,
        model: M,
        update: impl Fn(&mut M, Message) + 'static,
        view: impl Fn(&M) -> VNode + 'static,
    ) -> Result<Self, ReconcilerError> {
        let inbox: Inbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink = inbox.clone();
        let dispatcher: Dispatcher = Rc::new(move |message: Message, is_sync: bool| {
            sink.borrow_mut().push_back((message, is_sync));
        });

        let mut reconciler = Reconciler::with_config(dispatcher, config);
        reconciler.mount(view(&model))?;

        Ok(Program {
            model,
            update: Box::new(update),
            view: Box::new(view),
            reconciler,
            inbox,
            state: DrawState::Idle,
            draws: 0,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    /// Redraws performed since mounting.
    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn needs_frame(&self) -> bool {
        self.state != DrawState::Idle
    }

    fn draw(&mut self) -> Result<(), ReconcilerError> {
        let next = (self.view)(&self.model);
        self.reconciler.reconcile(next)?;
        self.draws += 1;
        Ok(())
    }

    /// Replace the model. A synchronous change draws now; an asynchronous one
    /// waits for the next frame.
    pub fn set_model(&mut self, model: M, is_sync: bool) -> Result<(), ReconcilerError> {
        self.model = model;
        self.model_changed(is_sync)
    }

    fn model_changed(&mut self, is_sync: bool) -> Result<(), ReconcilerError> {
        if is_sync {
            self.draw()?;
            if self.state == DrawState::FrameScheduledWithPendingUpdate {
                self.state = DrawState::FrameScheduled;
            }
        } else {
            if self.state == DrawState::Idle {
                trace!("Program: requesting animation frame");
            }
            self.state = DrawState::FrameScheduledWithPendingUpdate;
        }
        Ok(())
    }

    /// Host callback for one animation frame.
    pub fn animation_frame(&mut self) -> Result<(), ReconcilerError> {
        match self.state {
            DrawState::Idle => Ok(()),
            DrawState::FrameScheduled => {
                self.state = DrawState::Idle;
                Ok(())
            }
            DrawState::FrameScheduledWithPendingUpdate => {
                self.draw()?;
                self.state = DrawState::FrameScheduled;
                Ok(())
            }
        }
    }

    /// Run `update` for every message the live tree has dispatched so far.
    pub fn process_messages(&mut self) -> Result<usize, ReconcilerError> {
        let mut processed = 0;
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some((message, is_sync)) = next else { break };
            (self.update)(&mut self.model, message);
            self.model_changed(is_sync)?;
            processed += 1;
        }
        if processed > 0 {
            debug!("Program: processed {} message(s), state {:?}", processed, self.state);
        }
        Ok(processed)
    }

    /// Fire a host event at a live node and feed the resulting messages
    /// through `update`.
    pub fn dispatch_event(&mut self, target: LiveId, event: &str, payload: &Message) -> Result<EventOutcome, ReconcilerError> {
        let outcome = self.reconciler.dom().dispatch_event(target, event, payload)?;
        self.process_messages()?;
        Ok(outcome)
    }
}
