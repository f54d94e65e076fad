// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catch tables under construction.
//!
//! A try statement owns one catch table: a handler label, its nesting depth
//! and a list of protected ranges. The list starts with one range spanning
//! the try block; inlining a `finally` replay inside the block splits the
//! open range around the replay.

use kestrel_macros::index_newtype;

use crate::bytecode::Label;

index_newtype! {
    /// A catch table owned by the function builder.
    pub struct CatchTableId(u32) => "ct";
}

/// A `[begin, end)` range between two labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPair {
    /// First protected instruction
    pub begin: Label,
    /// One past the last protected instruction
    pub end: Label,
}

impl LabelPair {
    /// Creates a label pair.
    pub fn new(begin: Label, end: Label) -> Self {
        Self { begin, end }
    }
}

/// One try statement's protected ranges and handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchTable {
    handler: Label,
    depth: u32,
    ranges: Vec<LabelPair>,
}

impl CatchTable {
    /// Creates a table protecting one range.
    pub fn new(handler: Label, depth: u32, range: LabelPair) -> Self {
        Self {
            handler,
            depth,
            ranges: vec![range],
        }
    }

    /// The handler entry.
    pub fn handler(&self) -> Label {
        self.handler
    }

    /// The try-nesting depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The protected ranges in creation order.
    pub fn ranges(&self) -> &[LabelPair] {
        &self.ranges
    }

    /// Carves `inlined` out of the open (last) range.
    ///
    /// The open range `[b, e)` becomes `[b, inlined.begin)` and
    /// `[inlined.end, e)`.
    pub fn split(&mut self, inlined: LabelPair) {
        if let Some(open) = self.ranges.pop() {
            self.ranges.push(LabelPair::new(open.begin, inlined.begin));
            self.ranges.push(LabelPair::new(inlined.end, open.end));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_replaces_open_range() {
        let (b, e, ib, ie, h) = (
            Label::new(0),
            Label::new(1),
            Label::new(2),
            Label::new(3),
            Label::new(4),
        );
        let mut table = CatchTable::new(h, 1, LabelPair::new(b, e));
        table.split(LabelPair::new(ib, ie));
        assert_eq!(
            table.ranges(),
            &[LabelPair::new(b, ib), LabelPair::new(ie, e)]
        );
        assert_eq!(table.handler(), h);
    }

    #[test]
    fn test_repeated_split_keeps_earlier_pieces() {
        let l: Vec<Label> = (0..6).map(Label::new).collect();
        let mut table = CatchTable::new(l[5], 2, LabelPair::new(l[0], l[1]));
        table.split(LabelPair::new(l[2], l[3]));
        table.split(LabelPair::new(l[4], l[5]));
        assert_eq!(table.ranges().len(), 3);
        assert_eq!(table.ranges()[0], LabelPair::new(l[0], l[2]));
        assert_eq!(table.ranges()[1], LabelPair::new(l[3], l[4]));
        assert_eq!(table.ranges()[2], LabelPair::new(l[5], l[1]));
    }
}
