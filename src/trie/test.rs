use super::*;

fn lines(trie: &Trie) -> Vec<String> {
    trie.dump_to_string()
        .lines()
        .map(|s| s.to_owned())
        .collect()
}

#[test]
fn empty_stack_is_a_noop() {
    let mut trie = Trie::new();
    trie.add("");
    assert_eq!(trie.dump_to_string(), "");
}

#[test]
fn single_frame_increments_one_root_child() {
    let mut trie = Trie::new();
    trie.add("main.py:hello:world");
    assert_eq!(lines(&trie), vec!["main.py:hello:world 1"]);
}

/// S1 — single stack four times.
#[test]
fn s1_single_stack_repeated() {
    let mut trie = Trie::new();
    for _ in 0..4 {
        trie.add("main.py:hello:world");
    }
    assert_eq!(lines(&trie), vec!["main.py:hello:world 4"]);
}

/// S2 — divergent leaves under a shared prefix.
#[test]
fn s2_divergent_leaves() {
    let mut trie = Trie::new();
    trie.add("main.py:hello:world");
    trie.add("main.py:hello:world");
    trie.add("main.py:hello:x");
    trie.add("main.py:hello:world");

    let mut got = lines(&trie);
    got.sort();
    let mut want = vec!["main.py:hello:world 3", "main.py:hello:x 1"];
    want.sort();
    assert_eq!(got, want);
}

/// S3 — MTF promotion is a single bubble pass per insert, not a full sort:
/// it approximates descending subtree-count order but doesn't guarantee it,
/// since a node already matched on a given call is returned immediately,
/// without being compared against what follows it.
#[test]
fn s3_mtf_promotion_orders_by_count() {
    let mut trie = Trie::new();

    // Interleave rather than grouping, so promotion actually has to do work
    // across the run instead of each label arriving in one contiguous burst.
    let groups = ["main.py;hello;world", "main.py;hello;x", "main.py;hello;b", "main.py;hello;c"];
    let counts = [3usize, 8, 6, 1];
    let mut order = Vec::new();
    for i in 0..*counts.iter().max().unwrap() {
        for (g, c) in groups.iter().zip(counts.iter()) {
            if i < *c {
                order.push(*g);
            }
        }
    }

    for stack in order {
        trie.add(stack);
    }

    assert_eq!(
        lines(&trie),
        vec![
            "main.py;hello;x 8",
            "main.py;hello;world 3",
            "main.py;hello;b 6",
            "main.py;hello;c 1",
        ]
    );
}

/// S4 — multi-thread attribution.
#[test]
fn s4_multi_thread_attribution() {
    let mut trie = Trie::new();
    trie.add("MainThread;main.py:hello:world");
    trie.add("MainThread;main.py:hello:world");
    trie.add("main.py:hello:world");
    trie.add("main.py:hello:world");
    trie.add("main.py:hello:x");
    trie.add("main.py:hello:b");

    let mut got = lines(&trie);
    got.sort();
    let mut want = vec![
        "MainThread;main.py:hello:world 2",
        "main.py:hello:world 2",
        "main.py:hello:x 1",
        "main.py:hello:b 1",
    ];
    want.sort();
    assert_eq!(got, want);
}

#[test]
fn add_weighted_matches_repeated_add_in_total_count() {
    let mut a = Trie::new();
    for _ in 0..5 {
        a.add("x;y;z");
    }

    let mut b = Trie::new();
    b.add_weighted("x;y;z", 5);

    assert_eq!(a.dump_to_string(), b.dump_to_string());
}

#[test]
fn sibling_labels_are_unique_and_counts_sum_to_inserts() {
    let mut trie = Trie::new();
    let stacks = ["a;b", "a;c", "a;b", "a;d", "a;c", "a;c"];
    for s in stacks {
        trie.add(s);
    }

    let out = trie.dump_to_string();
    let total: u64 = out
        .lines()
        .map(|l| l.rsplit(' ').next().unwrap().parse::<u64>().unwrap())
        .sum();
    assert_eq!(total, stacks.len() as u64);

    let labels: Vec<&str> = out.lines().map(|l| l.rsplit_once(' ').unwrap().0).collect();
    let mut unique = labels.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(labels.len(), unique.len());
}

#[test]
fn round_trip_through_folded_text_reconstructs_counts() {
    let mut trie = Trie::new();
    trie.add("a;b;c");
    trie.add("a;b;c");
    trie.add("a;b;d");
    trie.add("a;e");

    let folded = trie.dump_to_string();

    let mut rebuilt = Trie::new();
    for line in folded.lines() {
        let (stack, count) = line.rsplit_once(' ').unwrap();
        let count: u64 = count.parse().unwrap();
        rebuilt.add_weighted(stack, count);
    }

    let mut original: Vec<String> = trie.dump_to_string().lines().map(String::from).collect();
    let mut round_tripped: Vec<String> = rebuilt.dump_to_string().lines().map(String::from).collect();
    original.sort();
    round_tripped.sort();
    assert_eq!(original, round_tripped);
}

#[test]
fn zero_weight_add_weighted_is_a_noop() {
    let mut trie = Trie::new();
    trie.add_weighted("a;b", 0);
    assert_eq!(trie.dump_to_string(), "");
}

#[test]
fn destroy_releases_deep_trees_without_overflow() {
    let mut trie = Trie::new();
    let mut stack = String::new();
    for i in 0..50_000 {
        if i > 0 {
            stack.push(';');
        }
        stack.push_str("frame");
    }
    trie.add(&stack);
    trie.destroy();
}
