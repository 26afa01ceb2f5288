//! Mock indicator that records cues

use crate::platform::traits::{Cue, Indicator};
use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

/// Indicator that records every cue it is asked to play
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    cues: Rc<RefCell<Vec<Cue>>>,
}

impl RecordingIndicator {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues played so far, oldest first
    pub fn cues(&self) -> Vec<Cue> {
        self.cues.borrow().clone()
    }

    /// Number of times `cue` was played
    pub fn count(&self, cue: Cue) -> usize {
        self.cues.borrow().iter().filter(|c| **c == cue).count()
    }
}

impl Indicator for RecordingIndicator {
    fn cue(&mut self, cue: Cue) {
        self.cues.borrow_mut().push(cue);
    }
}
