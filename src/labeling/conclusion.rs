//! Evidence-tally votes used by the "conclusion" family of label functions.
//!
//! These collapse counts of positive and negative cue votes into a single
//! vote. The margin rule is a heuristic, not a calibrated decision: a
//! sentence needs at least one more positive cue than negative cues before
//! it escapes a negative vote.

use crate::data::labels::Label;

/// Minimum `positive - negative` margin for a sentence to count as concluding.
pub const CONCLUSION_MARGIN: i64 = 1;

/// Counts of the cue label functions that fired on one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvidenceTally {
    /// Cue votes supporting the relation (association, biomarker, direction, ...).
    pub positive: u32,
    /// Cue votes against it (method description, title sentences).
    pub negative: u32,
    /// Set when an explicit "no association" or "weak association" cue fired.
    pub contradicted: bool,
}

impl EvidenceTally {
    pub fn new(positive: u32, negative: u32) -> Self {
        Self {
            positive,
            negative,
            contradicted: false,
        }
    }

    pub fn contradicted(mut self) -> Self {
        self.contradicted = true;
        self
    }

    fn margin(&self) -> i64 {
        i64::from(self.positive) - i64::from(self.negative)
    }

    /// Negative unless the positive margin clears [`CONCLUSION_MARGIN`], in which case abstain.
    pub fn no_conclusion_vote(&self) -> Label {
        if self.margin() >= CONCLUSION_MARGIN {
            Label::Abstain
        } else {
            Label::Negative
        }
    }

    /// Negative on contradicting evidence, positive when the tally concludes, else abstain.
    pub fn conclusion_vote(&self) -> Label {
        if self.contradicted {
            Label::Negative
        } else if self.no_conclusion_vote() == Label::Abstain {
            Label::Positive
        } else {
            Label::Abstain
        }
    }
}
