use viewer_bridge::{
    ControllerState, DisplaySlot, PipelineOutcome, PresentationUpdate, Presenter, SlotContent,
};

/// Presenter that keeps every update, in order.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub updates: Vec<PresentationUpdate>,
}

impl Presenter for RecordingPresenter {
    fn publish(&mut self, update: PresentationUpdate) {
        self.updates.push(update);
    }
}

impl RecordingPresenter {
    /// Every state the controller entered.
    pub fn states(&self) -> Vec<ControllerState> {
        self.updates
            .iter()
            .filter_map(|u| match u {
                PresentationUpdate::StateChanged { state } => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Every published outcome. Exactly one for a well-behaved request.
    pub fn outcomes(&self) -> Vec<&PipelineOutcome> {
        self.updates
            .iter()
            .filter_map(|u| match u {
                PresentationUpdate::Outcome { outcome } => Some(outcome),
                _ => None,
            })
            .collect()
    }

    /// Status messages shown on a slot, in order.
    pub fn statuses(&self, slot: DisplaySlot) -> Vec<&str> {
        self.updates
            .iter()
            .filter_map(|u| match u {
                PresentationUpdate::Status { slot: s, message } if *s == slot => {
                    Some(message.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// The last content published for a slot.
    pub fn slot(&self, slot: DisplaySlot) -> Option<&SlotContent> {
        self.updates.iter().rev().find_map(|u| match u {
            PresentationUpdate::Slot { slot: s, content } if *s == slot => Some(content),
            _ => None,
        })
    }

    /// Index of the first update matching `pred`.
    pub fn position(&self, pred: impl Fn(&PresentationUpdate) -> bool) -> Option<usize> {
        self.updates.iter().position(pred)
    }
}
