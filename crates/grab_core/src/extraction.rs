//! Stage machine for one pass over the unlock service.
//!
//! The engine drives the browser and reports each finished step; `advance`
//! returns the stage that step leaves the session in. Steps that only
//! degrade (an input that could not be filled, a submit control that was not
//! found) still move forward.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    Navigating,
    InputFilled,
    Submitted,
    InterstitialClearing,
    ResultReady,
    Failed,
}

impl ExtractionStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExtractionStage::ResultReady | ExtractionStage::Failed)
    }
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionStage::Navigating => "navigating",
            ExtractionStage::InputFilled => "input-filled",
            ExtractionStage::Submitted => "submitted",
            ExtractionStage::InterstitialClearing => "interstitial-clearing",
            ExtractionStage::ResultReady => "result-ready",
            ExtractionStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionEvent {
    /// Landing page loaded and the input step finished; `filled` is false
    /// when every locator missed.
    InputAttempted { filled: bool },
    /// Submit step finished; `clicked` is false when every locator missed.
    SubmitAttempted { clicked: bool },
    /// Pop-up pages closed and dismissal controls tried.
    InterstitialsHandled,
    /// Result list appeared and its anchors were read.
    ResultsListed,
    /// Timeout or browser error.
    Fault,
}

/// Pure transition function. Out-of-order events fail the session.
pub fn advance(stage: ExtractionStage, event: ExtractionEvent) -> ExtractionStage {
    use ExtractionEvent as E;
    use ExtractionStage as S;

    match (stage, event) {
        (S::Failed, _) | (S::ResultReady, _) => stage,
        (_, E::Fault) => S::Failed,
        (S::Navigating, E::InputAttempted { .. }) => S::InputFilled,
        (S::InputFilled, E::SubmitAttempted { .. }) => S::Submitted,
        (S::Submitted, E::InterstitialsHandled) => S::InterstitialClearing,
        (S::InterstitialClearing, E::ResultsListed) => S::ResultReady,
        _ => S::Failed,
    }
}
