//! Ranging round extraction from POLL/RESPONSE sequence numbers
//!
//! A ranging round is three consecutive sequence numbers `(s, s+1, s+2)` for
//! which the mobile node logged both the POLL it sent and the RESPONSE it got
//! back. Two matching policies are available:
//!
//! - [`MatchingPolicy::SlidingWindow`] slides a window of three over the POLL
//!   numbers one step at a time, so consecutive rounds overlap by two frames.
//! - [`MatchingPolicy::DisjointRuns`] cuts runs of consecutive numbers present
//!   in both sets into non-overlapping triples. Kept for compatibility with
//!   older result sets only.

use crate::core::{SequenceNumber, SequenceTriple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How POLL and RESPONSE sequence numbers are grouped into rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingPolicy {
    /// Overlapping windows over contiguous POLL numbers
    #[default]
    SlidingWindow,
    /// Legacy non-overlapping triples over the POLL/RESPONSE intersection
    DisjointRuns,
}

/// Sequence numbers of one mobile node, ready for round extraction
#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    polls: Vec<SequenceNumber>,
    responses: BTreeSet<SequenceNumber>,
    policy: MatchingPolicy,
}

impl SequenceMatcher {
    /// POLL numbers are sorted and de-duplicated; input order does not matter
    pub fn new<P, R>(poll_sequence_numbers: P, response_sequence_numbers: R, policy: MatchingPolicy) -> Self
    where
        P: IntoIterator<Item = SequenceNumber>,
        R: IntoIterator<Item = SequenceNumber>,
    {
        let polls: BTreeSet<SequenceNumber> = poll_sequence_numbers.into_iter().collect();
        Self {
            polls: polls.into_iter().collect(),
            responses: response_sequence_numbers.into_iter().collect(),
            policy,
        }
    }

    pub fn policy(&self) -> MatchingPolicy {
        self.policy
    }

    /// Lazily yield the rounds in increasing order of their first number.
    ///
    /// Each call starts over from the beginning.
    pub fn triples(&self) -> Triples<'_> {
        match self.policy {
            MatchingPolicy::SlidingWindow => Triples::SlidingWindow(SlidingWindowTriples {
                polls: &self.polls,
                responses: &self.responses,
                index: 0,
            }),
            MatchingPolicy::DisjointRuns => Triples::DisjointRuns(DisjointRunTriples {
                polls: self.polls.iter(),
                responses: &self.responses,
                current: Vec::with_capacity(3),
            }),
        }
    }
}

/// Iterator over the rounds of one [`SequenceMatcher`]
#[derive(Debug, Clone)]
pub enum Triples<'a> {
    SlidingWindow(SlidingWindowTriples<'a>),
    DisjointRuns(DisjointRunTriples<'a>),
}

impl Iterator for Triples<'_> {
    type Item = SequenceTriple;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Triples::SlidingWindow(inner) => inner.next(),
            Triples::DisjointRuns(inner) => inner.next(),
        }
    }
}

/// Overlapping windows `(poll[i], poll[i+1], poll[i+2])` with strict +1 steps
#[derive(Debug, Clone)]
pub struct SlidingWindowTriples<'a> {
    polls: &'a [SequenceNumber],
    responses: &'a BTreeSet<SequenceNumber>,
    index: usize,
}

impl Iterator for SlidingWindowTriples<'_> {
    type Item = SequenceTriple;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(window) = self.polls.get(self.index..self.index + 3) {
            self.index += 1;

            let triple = [window[0], window[1], window[2]];
            if is_contiguous(&triple) && triple.iter().all(|s| self.responses.contains(s)) {
                return Some(triple);
            }
        }
        None
    }
}

/// Non-overlapping triples cut from runs of consecutive matched numbers.
///
/// A trailing run shorter than three is dropped.
#[derive(Debug, Clone)]
pub struct DisjointRunTriples<'a> {
    polls: std::slice::Iter<'a, SequenceNumber>,
    responses: &'a BTreeSet<SequenceNumber>,
    current: Vec<SequenceNumber>,
}

impl Iterator for DisjointRunTriples<'_> {
    type Item = SequenceTriple;

    fn next(&mut self) -> Option<Self::Item> {
        for &sequence_number in self.polls.by_ref() {
            if !self.responses.contains(&sequence_number) {
                continue;
            }

            match self.current.last() {
                Some(&last) if last.checked_add(1) == Some(sequence_number) => {
                    self.current.push(sequence_number)
                }
                _ => {
                    self.current.clear();
                    self.current.push(sequence_number);
                }
            }

            if self.current.len() == 3 {
                let triple = [self.current[0], self.current[1], self.current[2]];
                self.current.clear();
                return Some(triple);
            }
        }
        None
    }
}

fn is_contiguous(triple: &SequenceTriple) -> bool {
    triple[0].checked_add(1) == Some(triple[1]) && triple[1].checked_add(1) == Some(triple[2])
}
