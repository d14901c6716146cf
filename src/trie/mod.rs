//! Prefix-merging aggregation trie with count-weighted sibling promotion.
//!
//! One [`TrieNode`] per distinct `(parent, frame-label)` pair. The root is
//! synthetic, labeled `"root"`, and is never emitted by [`Trie::dump_to`].
//!
//! Sibling order self-tunes: whenever a sibling is passed over while
//! searching for an insertion point, it is compared against the
//! previously-visited sibling and, if more heavily used, its *payload* is
//! swapped forward in place (label, counts, first-child pointer) — never the
//! sibling-list pointers themselves. This keeps every `&TrieNode` address
//! stable across inserts, which matters once a caller holds a reference
//! into the trie (e.g. mid-[`Trie::dump_to`]).

#[cfg(test)]
mod test;

use std::io::{self, Write};

/// A single node in the aggregation trie.
///
/// `subtree_count` is always >= `leaf_count` and >= the sum of the
/// `subtree_count`s of its direct children.
pub struct TrieNode {
    label: String,
    leaf_count: u64,
    subtree_count: u64,
    first_child: Option<Box<TrieNode>>,
    next_sibling: Option<Box<TrieNode>>,
}

impl TrieNode {
    fn new(label: &str) -> Self {
        TrieNode {
            label: label.to_owned(),
            leaf_count: 0,
            subtree_count: 0,
            first_child: None,
            next_sibling: None,
        }
    }

    /// Finds the child labeled `label`, creating it if absent, applying
    /// move-to-front-by-field-swap promotion along the way.
    fn find_or_insert_mtf(&mut self, label: &str) -> &mut TrieNode {
        if self.first_child.is_none() {
            self.first_child = Some(Box::new(TrieNode::new(label)));
            return self.first_child.as_deref_mut().unwrap();
        }

        // Two siblings need to be live at once (the one we just passed and
        // the one we're examining) so their payloads can be swapped without
        // touching `next_sibling` links. `Option<Box<_>>` ownership doesn't
        // let the borrow checker see that `prev` and `curr` never alias, so
        // the walk is done with raw pointers under one `&mut self` borrow;
        // every pointer stays inside the subtree owned by `self`.
        unsafe {
            let mut prev: *mut TrieNode = std::ptr::null_mut();
            let mut curr: *mut TrieNode = self.first_child.as_deref_mut().unwrap();

            loop {
                let curr_ref = &mut *curr;
                if curr_ref.label == label {
                    return curr_ref;
                }

                if !prev.is_null() {
                    let prev_ref = &mut *prev;
                    if prev_ref.subtree_count < curr_ref.subtree_count {
                        std::mem::swap(&mut prev_ref.label, &mut curr_ref.label);
                        std::mem::swap(&mut prev_ref.leaf_count, &mut curr_ref.leaf_count);
                        std::mem::swap(&mut prev_ref.subtree_count, &mut curr_ref.subtree_count);
                        std::mem::swap(&mut prev_ref.first_child, &mut curr_ref.first_child);
                    }
                }

                match curr_ref.next_sibling.as_deref_mut() {
                    Some(next) => {
                        prev = curr;
                        curr = next;
                    }
                    None => {
                        curr_ref.next_sibling = Some(Box::new(TrieNode::new(label)));
                        return curr_ref.next_sibling.as_deref_mut().unwrap();
                    }
                }
            }
        }
    }
}

/// An aggregation trie mapping canonicalized stacks to sample counts.
pub struct Trie {
    root: TrieNode,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    /// An empty trie with a synthetic `"root"` root node.
    pub fn new() -> Trie {
        Trie {
            root: TrieNode::new("root"),
        }
    }

    /// Inserts `stack`, a `';'`-delimited canonical stack string, with
    /// weight 1. A no-op on an empty string.
    pub fn add(&mut self, stack: &str) {
        self.add_weighted(stack, 1);
    }

    /// Inserts `stack` with the given weight. Equivalent to `weight` calls
    /// of [`Trie::add`] in terms of total counts — not in terms of the
    /// sibling-promotion side effects of interleaved calls, since the
    /// weighted call only walks the trie once.
    pub fn add_weighted(&mut self, stack: &str, weight: u64) {
        if stack.is_empty() || weight == 0 {
            return;
        }

        self.root.subtree_count += weight;
        let mut node = &mut self.root;
        for token in stack.split(';') {
            node = node.find_or_insert_mtf(token);
            node.subtree_count += weight;
        }
        node.leaf_count += weight;
    }

    /// Writes folded-stack output via a pre-order walk.
    /// Uses an explicit stack rather than recursion so the walk cannot
    /// overflow the host stack on a deeply recursive sampled program.
    pub fn dump_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        enum Frame<'a> {
            Enter(&'a TrieNode),
            Leave,
        }

        let mut stack = vec![Frame::Enter(&self.root)];
        let mut path: Vec<&str> = Vec::new();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    let is_root = std::ptr::eq(node, &self.root);
                    if !is_root {
                        path.push(node.label.as_str());
                        if node.leaf_count > 0 {
                            writeln!(writer, "{} {}", path.join(";"), node.leaf_count)?;
                        }
                    }

                    if let Some(sibling) = node.next_sibling.as_deref() {
                        stack.push(Frame::Enter(sibling));
                    }
                    if !is_root {
                        stack.push(Frame::Leave);
                    }
                    if let Some(child) = node.first_child.as_deref() {
                        stack.push(Frame::Enter(child));
                    }
                }
                Frame::Leave => {
                    path.pop();
                }
            }
        }

        Ok(())
    }

    /// Same as [`Trie::dump_to`] but returns the folded-stack text directly.
    pub fn dump_to_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a `Vec<u8>` never fails.
        self.dump_to(&mut buf).expect("in-memory write cannot fail");
        String::from_utf8(buf).expect("folded-stack output is always UTF-8")
    }

    /// Releases the entire node graph. Equivalent to dropping the trie;
    /// provided as an explicit, named lifecycle operation.
    pub fn destroy(self) {}
}

impl Drop for Trie {
    fn drop(&mut self) {
        // Iterative teardown: hand nodes to an explicit stack and clear
        // their links before they drop, so each `Box<TrieNode>`
        // drop is O(1) instead of recursing through `first_child`/
        // `next_sibling`.
        let mut stack = Vec::new();
        if let Some(child) = self.root.first_child.take() {
            stack.push(child);
        }
        while let Some(mut node) = stack.pop() {
            if let Some(sibling) = node.next_sibling.take() {
                stack.push(sibling);
            }
            if let Some(child) = node.first_child.take() {
                stack.push(child);
            }
        }
    }
}
