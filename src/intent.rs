use crate::focus::FocusShape;
use crate::stimulus::{Placement, StimulusId};
use std::sync::mpsc::Sender;

/// Something the presentation layer should do; the engine never renders itself
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    PlaceFocus {
        shape: FocusShape,
        offset: f64,
        scale: f64,
    },
    ShowStimuli {
        left: StimulusId,
        right: StimulusId,
        placement: Placement,
    },
    HideStimuli,
    RelocateFocus {
        offset: f64,
    },
    PlayFeedback {
        correct: bool,
    },
}

/// Receiver of intents emitted by a running session
pub trait IntentSink {
    fn emit(&mut self, intent: Intent);
}

impl IntentSink for Vec<Intent> {
    fn emit(&mut self, intent: Intent) {
        self.push(intent);
    }
}

/// A dropped receiver only means nobody is watching; the session carries on.
impl IntentSink for Sender<Intent> {
    fn emit(&mut self, intent: Intent) {
        let _ = self.send(intent);
    }
}

impl<S: IntentSink + ?Sized> IntentSink for &mut S {
    fn emit(&mut self, intent: Intent) {
        (**self).emit(intent);
    }
}
