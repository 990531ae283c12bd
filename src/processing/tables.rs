//! In-memory anchor, mobile node and frame tables

use crate::core::{Anchor, Frame, MacAddress, MobileNode, SequenceNumber, SequenceTriple};
use std::collections::{BTreeMap, HashMap};

/// Anchors with lookup by table order and by MAC address
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorTable {
    anchors: Vec<Anchor>,
    index_by_mac: HashMap<MacAddress, usize>,
}

impl AnchorTable {
    /// One entry per MAC address: a later row replaces an earlier one in place
    pub fn new(rows: Vec<Anchor>) -> Self {
        let mut anchors: Vec<Anchor> = Vec::with_capacity(rows.len());
        let mut index_by_mac = HashMap::with_capacity(rows.len());

        for anchor in rows {
            match index_by_mac.get(&anchor.mac_address) {
                Some(&i) => anchors[i] = anchor,
                None => {
                    index_by_mac.insert(anchor.mac_address, anchors.len());
                    anchors.push(anchor);
                }
            }
        }
        Self { anchors, index_by_mac }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Anchor> {
        self.anchors.get(index)
    }

    pub fn by_mac(&self, mac_address: MacAddress) -> Option<&Anchor> {
        self.index_by_mac.get(&mac_address).map(|&i| &self.anchors[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    /// The shared processing delay, if every anchor has the same one
    pub fn uniform_processing_time(&self) -> Option<f64> {
        let first = self.anchors.first()?.message_processing_time;
        self.anchors
            .iter()
            .all(|anchor| anchor.message_processing_time == first)
            .then_some(first)
    }

    /// Distinct processing delays in table order
    pub fn distinct_processing_times(&self) -> Vec<f64> {
        let mut delays: Vec<f64> = Vec::new();
        for anchor in &self.anchors {
            if !delays.contains(&anchor.message_processing_time) {
                delays.push(anchor.message_processing_time);
            }
        }
        delays
    }
}

/// All logged frames of a run, in log order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTable {
    frames: Vec<Frame>,
}

impl FrameTable {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Order-preserving filter
    pub fn filter<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a Frame> + 'a
    where
        F: Fn(&Frame) -> bool + 'a,
    {
        self.frames.iter().filter(move |frame| predicate(frame))
    }

    /// POLL and RESPONSE frames of one mobile node, indexed by sequence number
    pub fn node_frames(&self, mobile: MacAddress) -> NodeFrames<'_> {
        let mut polls: BTreeMap<SequenceNumber, Vec<&Frame>> = BTreeMap::new();
        let mut responses: BTreeMap<SequenceNumber, Vec<&Frame>> = BTreeMap::new();

        for frame in &self.frames {
            if frame.is_poll_from(mobile) {
                polls.entry(frame.sequence_number).or_default().push(frame);
            } else if frame.is_response_to(mobile) {
                responses.entry(frame.sequence_number).or_default().push(frame);
            }
        }

        NodeFrames { polls, responses }
    }
}

/// Frame view of a single mobile node
#[derive(Debug, Clone)]
pub struct NodeFrames<'a> {
    polls: BTreeMap<SequenceNumber, Vec<&'a Frame>>,
    responses: BTreeMap<SequenceNumber, Vec<&'a Frame>>,
}

impl<'a> NodeFrames<'a> {
    pub fn poll_sequence_numbers(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        self.polls.keys().copied()
    }

    pub fn response_sequence_numbers(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        self.responses.keys().copied()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.values().map(Vec::len).sum()
    }

    pub fn response_count(&self) -> usize {
        self.responses.values().map(Vec::len).sum()
    }

    /// POLL frames whose sequence number is in the round, ascending
    pub fn round_polls(&self, sequence_numbers: &SequenceTriple) -> Vec<&'a Frame> {
        collect_round(&self.polls, sequence_numbers)
    }

    /// RESPONSE frames whose sequence number is in the round, ascending
    pub fn round_responses(&self, sequence_numbers: &SequenceTriple) -> Vec<&'a Frame> {
        collect_round(&self.responses, sequence_numbers)
    }
}

fn collect_round<'a>(
    frames: &BTreeMap<SequenceNumber, Vec<&'a Frame>>,
    sequence_numbers: &SequenceTriple,
) -> Vec<&'a Frame> {
    let mut wanted = *sequence_numbers;
    wanted.sort_unstable();

    let mut selected = Vec::with_capacity(3);
    let mut previous = None;
    for sequence_number in wanted {
        if previous == Some(sequence_number) {
            continue;
        }
        previous = Some(sequence_number);
        if let Some(matching) = frames.get(&sequence_number) {
            selected.extend(matching.iter().copied());
        }
    }
    selected
}

/// Everything a localization run reads
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub anchors: AnchorTable,
    pub mobiles: Vec<MobileNode>,
    pub frames: FrameTable,
}
