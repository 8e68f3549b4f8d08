use std::collections::HashSet;

use tracing::trace;

use super::record::{schedule_date, ProgrammeRecord};
use super::tokens::Token;

// Markup template literals. Matched exactly, never trimmed: if the upstream
// template drifts, extraction stops matching.
const BLOCK_TAG: &str = "h3";
const SUBTITLE_BLOCK_TAG: &str = "h4";
const ROOT_TAG: &str = "html";
const DATE_ATTR: &str = "content";
const PID_ATTR: &str = "data-pid";
const TIME_VALUE: &str = "timezone--time";
const TITLE_VALUE: &str = "programme__title ";
const SUBTITLE_VALUE: &str = "programme__subtitle centi";
const NAME_VALUE: &str = "name";
const REPEAT_VALUE: &str = "Repeat";

/// Position inside a programme block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Idle,
    AwaitDate,
    AwaitTimeContainer,
    AwaitTimeText,
    AwaitPid,
    AwaitTitleContainer,
    AwaitTitleName,
    AwaitTitleText,
    AwaitSubtitleContainer,
    AwaitSubtitleName,
    SubtitleText,
    RepeatCheck,
    Finished,
}

impl Step {
    /// Title captured and no subtitle left half-read.
    fn is_complete(self) -> bool {
        matches!(
            self,
            Step::AwaitSubtitleContainer | Step::RepeatCheck | Step::Finished
        )
    }
}

/// Input to the transition table. An open tag is presented as a block start
/// (if it is one) followed by each of its attributes in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue<'a> {
    BlockStart,
    Attribute { key: &'a str, value: &'a str },
    Text(&'a str),
    SubtitleEnd,
    DocumentEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect<'a> {
    Advance,
    BeginBlock,
    SetDate(&'a str),
    SetTime(&'a str),
    SetPid(&'a str),
    SetTitle(&'a str),
    AppendSubtitle(&'a str),
    MarkRepeat,
    Flush,
}

/// The block grammar. `None` means the cue is irrelevant at this step.
pub fn advance(step: Step, cue: Cue<'_>) -> Option<(Step, Effect<'_>)> {
    use Step::*;

    let next = match (step, cue) {
        (_, Cue::BlockStart) => (AwaitDate, Effect::BeginBlock),
        (Idle, _) => return None,
        (_, Cue::DocumentEnd) => (Idle, Effect::Flush),
        (AwaitSubtitleContainer | AwaitSubtitleName | SubtitleText, Cue::SubtitleEnd) => {
            (RepeatCheck, Effect::Advance)
        }
        (AwaitDate, Cue::Attribute { key: DATE_ATTR, value }) => {
            (AwaitTimeContainer, Effect::SetDate(value))
        }
        (AwaitTimeContainer, Cue::Attribute { value: TIME_VALUE, .. }) => {
            (AwaitTimeText, Effect::Advance)
        }
        (AwaitTimeText, Cue::Text(text)) => (AwaitPid, Effect::SetTime(text)),
        (AwaitPid, Cue::Attribute { key: PID_ATTR, value }) => {
            (AwaitTitleContainer, Effect::SetPid(value))
        }
        (AwaitTitleContainer, Cue::Attribute { value: TITLE_VALUE, .. }) => {
            (AwaitTitleName, Effect::Advance)
        }
        (AwaitTitleName, Cue::Attribute { value: NAME_VALUE, .. }) => {
            (AwaitTitleText, Effect::Advance)
        }
        (AwaitTitleText, Cue::Text(text)) => (AwaitSubtitleContainer, Effect::SetTitle(text)),
        (AwaitSubtitleContainer, Cue::Attribute { value: SUBTITLE_VALUE, .. }) => {
            (AwaitSubtitleName, Effect::Advance)
        }
        (AwaitSubtitleName, Cue::Attribute { value: NAME_VALUE, .. }) => {
            (SubtitleText, Effect::Advance)
        }
        (SubtitleText, Cue::Text(text)) => (SubtitleText, Effect::AppendSubtitle(text)),
        (RepeatCheck, Cue::Attribute { value: REPEAT_VALUE, .. }) => {
            (Finished, Effect::MarkRepeat)
        }
        _ => return None,
    };
    Some(next)
}

/// Rebuilds programme records from a token stream, one document at a time.
///
/// The set of emitted PIDs lives as long as the extractor, so a programme
/// that shows up on several pages of a run is only reported once.
#[derive(Debug, Default)]
pub struct Extractor {
    expected: String,
    seen: HashSet<String>,
    step: Step,
    current: ProgrammeRecord,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare for a new document whose records must carry `expected`.
    /// Drops any block a previous document left unfinished.
    pub fn begin_document(&mut self, expected: &str) {
        self.expected = expected.to_string();
        self.step = Step::Idle;
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Feed one token. Returns the record completed by it, if any.
    pub fn feed(&mut self, token: &Token) -> Option<ProgrammeRecord> {
        match token {
            Token::Open { name, attrs } => {
                let emitted = if name == BLOCK_TAG {
                    self.apply(Cue::BlockStart)
                } else {
                    None
                };
                for (key, value) in attrs {
                    self.apply(Cue::Attribute { key, value });
                }
                emitted
            }
            Token::Text(text) => self.apply(Cue::Text(text)),
            Token::Close(name) if name == SUBTITLE_BLOCK_TAG => self.apply(Cue::SubtitleEnd),
            Token::Close(name) if name == ROOT_TAG => self.apply(Cue::DocumentEnd),
            Token::Close(_) => None,
        }
    }

    fn apply(&mut self, cue: Cue<'_>) -> Option<ProgrammeRecord> {
        let (next, effect) = advance(self.step, cue)?;
        let mut emitted = None;
        match effect {
            Effect::Advance => {}
            Effect::BeginBlock => {
                emitted = self.flush();
                self.current = ProgrammeRecord::default();
            }
            Effect::SetDate(value) => self.current.date = schedule_date(value),
            Effect::SetTime(text) => self.current.time = text.to_string(),
            Effect::SetPid(value) => self.current.pid = value.to_string(),
            Effect::SetTitle(text) => self.current.title = text.to_string(),
            Effect::AppendSubtitle(text) => self.current.push_subtitle(text),
            Effect::MarkRepeat => self.current.repeat = true,
            Effect::Flush => emitted = self.flush(),
        }
        self.step = next;
        emitted
    }

    /// Hand out the current block if it is complete, dated for this page and
    /// not reported before.
    fn flush(&mut self) -> Option<ProgrammeRecord> {
        if self.step == Step::Idle {
            return None;
        }
        if !self.step.is_complete() {
            trace!(step = ?self.step, pid = %self.current.pid, "Abandoning incomplete block");
            return None;
        }
        if self.current.date != self.expected {
            trace!(date = %self.current.date, pid = %self.current.pid, "Skipping block from another day");
            return None;
        }
        if !self.seen.insert(self.current.pid.clone()) {
            trace!(pid = %self.current.pid, "Skipping repeated PID");
            return None;
        }
        Some(std::mem::take(&mut self.current))
    }
}

// ── Tests ──
