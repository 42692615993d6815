//! N-peer convergence tests.
//!
//! A full mesh isn't how a real cluster syncs — peers gossip pairwise, and
//! convergence has to happen transitively through a chain of partial merges,
//! not just from one big all-to-all merge. These tests simulate that.

use kv_crdt::{IntCounter, OrSet, Rga};
use kv_types::{ElementId, ReplicaId, Timestamp};
use std::collections::HashSet;

fn replica(n: u8) -> ReplicaId {
    ReplicaId::new(format!("r{n}"))
}

fn id(n: u8, seq: u64) -> ElementId {
    ElementId::new(Timestamp::from_nanos(seq as i64), replica(n), seq)
}

#[derive(Clone)]
struct Entity {
    content: Rga<char>,
    tags: OrSet<String>,
    counter: IntCounter,
}

impl Entity {
    fn new() -> Self {
        Self { content: Rga::new(), tags: OrSet::new(), counter: IntCounter::new() }
    }

    fn merge(&mut self, other: &Self) {
        self.content.merge(&other.content);
        self.tags.merge(&other.tags);
        self.counter.merge(&other.counter);
    }
}

fn assert_all_converged(entities: &[Entity]) {
    let ref_str: String = entities[0].content.to_vec().into_iter().collect();
    let ref_tags: HashSet<_> = entities[0].tags.iter().cloned().collect();
    let ref_val = entities[0].counter.value();

    for (i, e) in entities.iter().enumerate().skip(1) {
        let s: String = e.content.to_vec().into_iter().collect();
        assert_eq!(s, ref_str, "RGA diverged at replica {i}");
        let t: HashSet<_> = e.tags.iter().cloned().collect();
        assert_eq!(t, ref_tags, "OrSet diverged at replica {i}");
        assert_eq!(e.counter.value(), ref_val, "IntCounter diverged at replica {i}");
    }
}

/// Three replicas, each makes an independent local edit, then converge
/// through a gossip chain (1→2, 2→3, 3→1, 1→2, 2→3) rather than a full mesh.
#[test]
fn chain_gossip_reaches_full_convergence() {
    let mut replicas: Vec<Entity> = (0..3).map(|_| Entity::new()).collect();

    replicas[0].content.insert(id(1, 1), None, 'a');
    replicas[0].tags.add("alpha".to_string(), id(1, 1));
    replicas[0].counter.apply_delta(replica(1), 5);

    replicas[1].content.insert(id(2, 1), None, 'b');
    replicas[1].tags.add("beta".to_string(), id(2, 1));
    replicas[1].counter.apply_delta(replica(2), 3);

    replicas[2].content.insert(id(3, 1), None, 'c');
    replicas[2].tags.add("gamma".to_string(), id(3, 1));
    replicas[2].counter.apply_delta(replica(3), 7);

    // Gossip rounds: no peer ever talks to all others in one step.
    for (src, dst) in [(0, 1), (1, 2), (2, 0), (0, 1), (1, 2)] {
        let src_snapshot = replicas[src].clone();
        replicas[dst].merge(&src_snapshot);
    }

    assert_all_converged(&replicas);
    assert_eq!(replicas[1].counter.value(), 15);
}

/// A single replica's OR-Set survives high churn: many add/remove cycles on
/// the same value, interleaved with merges from a peer that only observes
/// some of them, must still converge with no spurious tombstone leaks.
#[test]
fn orset_churn_converges_under_partial_observation() {
    let mut a: OrSet<&str> = OrSet::new();
    let mut b: OrSet<&str> = OrSet::new();

    for round in 0..50u64 {
        a.add("shared", id(1, round * 2));
        if round % 3 == 0 {
            let snapshot = a.clone();
            b.merge(&snapshot);
        }
        a.remove(&"shared", round as i64 * 2 + 1000);
    }

    let final_a = a.clone();
    b.merge(&final_a);
    a.merge(&b);

    assert_eq!(a.contains(&"shared"), b.contains(&"shared"));
}

/// Interleaved write+merge: a replica keeps writing locally between partial
/// merges from a peer, and must still converge once fully synced both ways.
#[test]
fn interleaved_writes_and_merges_converge() {
    let mut r1 = Entity::new();
    let mut r2 = Entity::new();

    r1.counter.apply_delta(replica(1), 1);
    let snap = r1.clone();
    r2.merge(&snap);

    r1.counter.apply_delta(replica(1), 2);
    r2.counter.apply_delta(replica(2), 10);
    let snap = r2.clone();
    r1.merge(&snap);

    r2.counter.apply_delta(replica(2), 4);
    let snap = r1.clone();
    r2.merge(&snap);

    let snap = r2.clone();
    r1.merge(&snap);

    assert_eq!(r1.counter.value(), r2.counter.value());
    assert_eq!(r1.counter.value(), 17);
}

/// A larger peer set (a small "team", not the full enterprise-scale original)
/// all writing distinct tags concurrently converges through pairwise merges.
#[test]
fn team_scale_tag_convergence() {
    const N: u8 = 10;
    let mut replicas: Vec<OrSet<String>> = (0..N).map(|_| OrSet::new()).collect();

    for i in 0..N {
        replicas[i as usize].add(format!("tag-{i}"), id(i, 1));
    }

    // ring gossip: each peer merges from its neighbor, twice around.
    for _ in 0..2 {
        for i in 0..N {
            let from = ((i + 1) % N) as usize;
            let snapshot = replicas[from].clone();
            replicas[i as usize].merge(&snapshot);
        }
    }

    let expected: HashSet<String> = (0..N).map(|i| format!("tag-{i}")).collect();
    for r in &replicas {
        let got: HashSet<String> = r.iter().cloned().collect();
        assert_eq!(got, expected);
    }
}
