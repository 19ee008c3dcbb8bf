use std::collections::VecDeque;

pub const DEFAULT_MAX_LINES: usize = 5_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineClass {
    #[default]
    Info,
    Success,
    Danger,
}

impl LineClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineClass::Info => "info",
            LineClass::Success => "success",
            LineClass::Danger => "danger",
        }
    }
}

/// One rendered console line. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub text: String,
    pub class: LineClass,
}

impl ConsoleLine {
    pub fn new(text: impl Into<String>, class: LineClass) -> Self {
        Self {
            text: text.into(),
            class,
        }
    }
}

/// Append-only, ordered log of console lines with a retention cap.
///
/// Retention is capped: once `max_lines` is exceeded the oldest lines
/// are evicted and counted in `evicted_total`. `tail_seq` is a monotone
/// counter of every line ever appended, so a view following the tail
/// never observes reordering.
#[derive(Debug)]
pub struct Transcript {
    lines: VecDeque<ConsoleLine>,
    max_lines: usize,
    tail_seq: u64,
    evicted_total: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl Transcript {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
            tail_seq: 0,
            evicted_total: 0,
        }
    }

    /// Append `text`, splitting on line breaks; every resulting segment
    /// inherits `class`. Returns the number of lines added.
    pub fn append(&mut self, text: &str, class: LineClass) -> usize {
        let mut added = 0;
        for segment in text.split('\n') {
            self.push_line(ConsoleLine::new(segment, class));
            added += 1;
        }
        added
    }

    fn push_line(&mut self, line: ConsoleLine) {
        self.lines.push_back(line);
        self.tail_seq += 1;
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
            self.evicted_total += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Monotone count of lines ever appended.
    pub fn tail_seq(&self) -> u64 {
        self.tail_seq
    }

    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    pub fn last(&self) -> Option<&ConsoleLine> {
        self.lines.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_splits_on_line_breaks_with_shared_class() {
        let mut transcript = Transcript::default();
        let added = transcript.append("one\ntwo\nthree", LineClass::Success);
        assert_eq!(added, 3);
        assert_eq!(transcript.len(), 3);
        assert!(transcript.iter().all(|l| l.class == LineClass::Success));
        assert_eq!(transcript.last().map(|l| l.text.as_str()), Some("three"));
    }

    #[test]
    fn line_count_matches_sum_of_segments_across_calls() {
        let mut transcript = Transcript::default();
        let mut expected = 0;
        for text in ["a", "b\nc", "d\ne\nf", ""] {
            expected += transcript.append(text, LineClass::Info);
        }
        assert_eq!(transcript.len(), expected);
        assert_eq!(transcript.tail_seq(), expected as u64);
    }

    #[test]
    fn earlier_lines_are_never_altered_by_later_appends() {
        let mut transcript = Transcript::default();
        transcript.append("first", LineClass::Danger);
        let before: Vec<ConsoleLine> = transcript.iter().cloned().collect();
        transcript.append("second\nthird", LineClass::Info);
        let after: Vec<ConsoleLine> = transcript.iter().take(before.len()).cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn cap_evicts_oldest_and_counts_evictions() {
        let mut transcript = Transcript::new(3);
        transcript.append("1\n2\n3\n4\n5", LineClass::Info);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.evicted_total(), 2);
        assert_eq!(transcript.tail_seq(), 5);
        let texts: Vec<&str> = transcript.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["3", "4", "5"]);
    }
}
