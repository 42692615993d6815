//! Adversarial and stress tests for CRDT correctness under hostile conditions.
//!
//! Covers three categories:
//! 1. Split-brain / partition recovery — peers diverge completely while offline
//! 2. High-contention concurrency — many peers racing with shuffled merge order
//! 3. Resurrection bugs — deletion conflicts and late-arriving operations

use kv_crdt::{IntCounter, LwwRegister, OrSet, Rga, VectorClock};
use kv_types::{ElementId, ReplicaId, Timestamp};
use std::collections::HashSet;

struct IdGen {
    replica: ReplicaId,
    next: u64,
}

impl IdGen {
    fn new(replica: &str) -> Self {
        Self { replica: ReplicaId::new(replica), next: 0 }
    }

    fn next(&mut self) -> ElementId {
        self.next += 1;
        ElementId::new(Timestamp::from_nanos(self.next as i64), self.replica.clone(), self.next)
    }
}

fn push_str(rga: &mut Rga<char>, gen: &mut IdGen, s: &str) {
    for ch in s.chars() {
        let origin = rga.origin_for_index(rga.len());
        rga.insert(gen.next(), origin, ch);
    }
}

fn insert_at(rga: &mut Rga<char>, gen: &mut IdGen, index: usize, ch: char) -> ElementId {
    let origin = rga.origin_for_index(index);
    let id = gen.next();
    rga.insert(id.clone(), origin, ch);
    id
}

fn as_string(rga: &Rga<char>) -> String {
    rga.to_vec().into_iter().collect()
}

fn vc(name: &str, n: u64) -> VectorClock {
    let mut clock = VectorClock::new();
    let r = ReplicaId::new(name);
    for _ in 0..n {
        clock.inc(r.clone());
    }
    clock
}

// ═══════════════════════════════════════════════════════════════════════════
// 1. SPLIT-BRAIN / PARTITION RECOVERY
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn rga_split_brain_delete_and_append() {
    // "Hello" diverges: A deletes "ello" and writes " World"; B appends " there".
    let mut gen_a = IdGen::new("a");
    let mut base = Rga::new();
    push_str(&mut base, &mut gen_a, "Hello");
    let mut a = base.clone();
    let mut b = base.clone();
    let mut gen_b = IdGen::new("b");

    for idx in (1..=4).rev() {
        let id = a.id_at(idx).unwrap();
        a.delete_by_id(&id, 10);
    }
    push_str(&mut a, &mut gen_a, " World");
    push_str(&mut b, &mut gen_b, " there");

    let merged_a = a.merged(&b);
    let merged_b = b.merged(&a);
    assert_eq!(as_string(&merged_a), as_string(&merged_b));

    let result = as_string(&merged_a);
    assert_eq!(result.matches('H').count(), 1, "duplicate 'H' in: {result}");
    assert!(!result.contains("ello"), "deleted 'ello' reappeared in: {result}");
    assert!(result.contains("World"));
    assert!(result.contains("there"));
}

#[test]
fn rga_split_brain_overlapping_deletes() {
    // "ABCDEF": A deletes "BCD", B deletes "CDE" → union "AF" survives.
    let mut gen = IdGen::new("a");
    let mut base = Rga::new();
    push_str(&mut base, &mut gen, "ABCDEF");
    let mut a = base.clone();
    let mut b = base.clone();

    for idx in [3, 2, 1] {
        let id = a.id_at(idx).unwrap();
        a.delete_by_id(&id, 10);
    }
    assert_eq!(as_string(&a), "AEF");

    for idx in [4, 3, 2] {
        let id = b.id_at(idx).unwrap();
        b.delete_by_id(&id, 20);
    }
    assert_eq!(as_string(&b), "ABF");

    a.merge(&b);
    b.merge(&a);
    assert_eq!(as_string(&a), as_string(&b));
    assert_eq!(as_string(&a), "AF");
}

#[test]
fn rga_split_brain_concurrent_inserts_at_same_position() {
    let mut gen_shared = IdGen::new("base");
    let mut base = Rga::new();
    push_str(&mut base, &mut gen_shared, "AC");
    let mut a = base.clone();
    let mut b = base.clone();
    let mut gen_a = IdGen::new("a");
    let mut gen_b = IdGen::new("b");

    insert_at(&mut a, &mut gen_a, 1, 'B');
    insert_at(&mut b, &mut gen_b, 1, 'X');

    let merged_a = a.merged(&b);
    let merged_b = b.merged(&a);
    let result_a = as_string(&merged_a);
    assert_eq!(result_a, as_string(&merged_b));
    assert!(result_a.contains('B') && result_a.contains('X'));
    assert!(result_a.starts_with('A') && result_a.ends_with('C'));
    assert_eq!(result_a.len(), 4);
}

#[test]
fn rga_three_way_partition_and_cascading_merge() {
    let mut gen_shared = IdGen::new("base");
    let mut base = Rga::new();
    push_str(&mut base, &mut gen_shared, "Base");
    let mut a = base.clone();
    let mut b = base.clone();
    let mut c = base.clone();
    let mut gen_a = IdGen::new("a");
    let mut gen_b = IdGen::new("b");
    let mut gen_c = IdGen::new("c");

    push_str(&mut a, &mut gen_a, " Alpha");
    insert_at(&mut b, &mut gen_b, 0, 'P');
    for idx in (0..4).rev() {
        let id = c.id_at(idx).unwrap();
        c.delete_by_id(&id, 5);
    }
    push_str(&mut c, &mut gen_c, "New");

    a.merge(&b);
    a.merge(&c);
    b.merge(&a);
    c.merge(&a);

    assert_eq!(as_string(&a), as_string(&b));
    assert_eq!(as_string(&b), as_string(&c));
}

#[test]
fn orset_split_brain_add_remove_divergence() {
    let mut gen = IdGen::new("shared");
    let mut shared: OrSet<String> = OrSet::new();
    shared.add("alpha".into(), gen.next());
    shared.add("beta".into(), gen.next());
    shared.add("gamma".into(), gen.next());

    let mut a = shared.clone();
    let mut b = shared.clone();
    let mut gen_a = IdGen::new("a");

    a.add("delta".into(), gen_a.next());
    a.add("epsilon".into(), gen_a.next());

    b.remove(&"alpha".to_string(), 100);
    b.remove(&"beta".to_string(), 100);

    a.merge(&b);
    b.merge(&a);

    let items_a: HashSet<_> = a.iter().cloned().collect();
    let items_b: HashSet<_> = b.iter().cloned().collect();
    assert_eq!(items_a, items_b);

    assert!(!a.contains(&"alpha".to_string()));
    assert!(!a.contains(&"beta".to_string()));
    assert!(a.contains(&"gamma".to_string()));
    assert!(a.contains(&"delta".to_string()));
    assert!(a.contains(&"epsilon".to_string()));
}

#[test]
fn lww_register_split_brain_both_write() {
    let r1 = ReplicaId::new("r1");
    let r2 = ReplicaId::new("r2");
    let mut a = LwwRegister::new(b"initial".to_vec(), Timestamp::from_nanos(1000), r1.clone(), vc("r1", 1));
    let mut b = a.clone();

    a.set(b"from_A".to_vec(), Timestamp::from_nanos(2000), r1.clone(), vc("r1", 2));
    b.set(b"from_B".to_vec(), Timestamp::from_nanos(3000), r2.clone(), vc("r2", 1));

    let merged_ab = a.merged(&b);
    let merged_ba = b.merged(&a);
    assert_eq!(merged_ab.data(), merged_ba.data());
    assert_eq!(merged_ab.data(), b"from_B");
}

#[test]
fn lww_register_split_brain_same_timestamp_tiebreak() {
    let ts = Timestamp::from_nanos(5000);
    let a = LwwRegister::new(b"A_value".to_vec(), ts, ReplicaId::new("peer-a"), vc("peer-a", 1));
    let b = LwwRegister::new(b"B_value".to_vec(), ts, ReplicaId::new("peer-b"), vc("peer-b", 1));

    let merged_ab = a.merged(&b);
    let merged_ba = b.merged(&a);
    assert_eq!(merged_ab.data(), merged_ba.data());
    // Higher replica ID wins the tiebreak, deterministically either direction.
    assert_eq!(merged_ab.data(), b"B_value");
}

#[test]
fn counter_split_brain_independent_operations() {
    let mut a = IntCounter::new();
    let mut b = IntCounter::new();
    a.apply_delta(ReplicaId::new("a"), 10);
    a.apply_delta(ReplicaId::new("a"), -3);
    b.apply_delta(ReplicaId::new("b"), 7);
    b.apply_delta(ReplicaId::new("b"), -2);

    let merged_ab = a.merged(&b);
    let merged_ba = b.merged(&a);
    assert_eq!(merged_ab.value(), merged_ba.value());
    assert_eq!(merged_ab.value(), 12);
}

// ═══════════════════════════════════════════════════════════════════════════
// 2. HIGH-CONTENTION CONCURRENCY
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn vector_clock_many_peers_concurrent_increments() {
    let replicas: Vec<ReplicaId> = (0..8).map(|i| ReplicaId::new(format!("p{i}"))).collect();
    let mut clocks: Vec<VectorClock> = replicas.iter().map(|_| VectorClock::new()).collect();
    for (clock, r) in clocks.iter_mut().zip(&replicas) {
        clock.inc(r.clone());
    }

    for i in 0..replicas.len() {
        for j in 0..replicas.len() {
            if i != j {
                assert!(clocks[i].is_concurrent(&clocks[j]), "p{i} and p{j} should be concurrent");
            }
        }
    }

    let mut merged = VectorClock::new();
    for clock in &clocks {
        merged.update(clock);
    }
    for (clock, _r) in clocks.iter().zip(&replicas) {
        assert!(merged.dominates(clock));
    }
}

#[test]
fn lww_register_exact_same_timestamp_different_values_all_peers() {
    let ts = Timestamp::from_nanos(42);
    let registers: Vec<LwwRegister> = (0..6)
        .map(|i| {
            let r = ReplicaId::new(format!("p{i}"));
            LwwRegister::new(format!("v{i}").into_bytes(), ts, r.clone(), vc(&format!("p{i}"), 1))
        })
        .collect();

    // Merging in any order must land on the same winner: highest replica id.
    let mut forward = registers[0].clone();
    for r in &registers[1..] {
        forward = forward.merged(r);
    }
    let mut backward = registers[registers.len() - 1].clone();
    for r in registers[..registers.len() - 1].iter().rev() {
        backward = backward.merged(r);
    }
    assert_eq!(forward.data(), backward.data());
}

#[test]
fn rga_interleaved_insert_delete_stress() {
    let mut gen_a = IdGen::new("a");
    let mut gen_b = IdGen::new("b");
    let mut base = Rga::new();
    push_str(&mut base, &mut gen_a, "0123456789");
    let mut a = base.clone();
    let mut b = base.clone();

    for idx in [8, 6, 4, 2, 0] {
        let id = a.id_at(idx).unwrap();
        a.delete_by_id(&id, 10);
    }
    for i in 0..5 {
        insert_at(&mut b, &mut gen_b, i * 2, 'x');
    }

    let merged_a = a.merged(&b);
    let merged_b = b.merged(&a);
    assert_eq!(as_string(&merged_a), as_string(&merged_b));
}

// ═══════════════════════════════════════════════════════════════════════════
// 3. RESURRECTION BUGS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn orset_resurrection_classic_scenario() {
    // Classic OR-Set bug test: remove observes the add, re-add after is independent.
    let mut gen = IdGen::new("a");
    let mut set: OrSet<&str> = OrSet::new();
    let first = gen.next();
    set.add("x", first);
    set.remove(&"x", 10);
    assert!(!set.contains(&"x"));

    set.add("x", gen.next());
    assert!(set.contains(&"x"), "re-add with a fresh id must resurrect the element");
}

#[test]
fn orset_stale_add_does_not_override_delete() {
    // A peer replays an old add (same id already tombstoned) after the remove
    // has already been observed — must stay removed.
    let mut gen = IdGen::new("a");
    let id = gen.next();
    let mut set: OrSet<&str> = OrSet::new();
    set.add("x", id.clone());
    set.remove(&"x", 10);

    set.add("x", id); // same tombstoned id replayed
    assert!(!set.contains(&"x"));
}

#[test]
fn orset_concurrent_add_and_remove_add_wins() {
    let mut gen = IdGen::new("a");
    let mut set1: OrSet<&str> = OrSet::new();
    set1.add("item", gen.next());

    let mut set2 = set1.clone();
    set2.remove(&"item", 10);
    set1.add("item", gen.next()); // concurrent re-add, fresh id

    let mut merged1 = set1.clone();
    merged1.merge(&set2);
    assert!(merged1.contains(&"item"));

    let mut merged2 = set2.clone();
    merged2.merge(&set1);
    assert!(merged2.contains(&"item"));
}

#[test]
fn orset_remove_then_independent_readd_by_third_peer() {
    let mut gen_a = IdGen::new("a");
    let mut shared: OrSet<&str> = OrSet::new();
    shared.add("x", gen_a.next());

    let mut peer_b = shared.clone();
    peer_b.remove(&"x", 10);

    let mut peer_c = shared.clone();
    let mut gen_c = IdGen::new("c");
    peer_c.add("x", gen_c.next()); // independent re-add, unaware of the remove

    peer_b.merge(&peer_c);
    assert!(peer_b.contains(&"x"), "peer_c's independent add must survive peer_b's earlier remove");
}

#[test]
fn orset_cascading_add_remove_add_remove() {
    let mut gen = IdGen::new("a");
    let mut set: OrSet<&str> = OrSet::new();
    for round in 0..4 {
        set.add("x", gen.next());
        assert!(set.contains(&"x"));
        set.remove(&"x", 10 + round);
        assert!(!set.contains(&"x"));
    }
}

#[test]
fn orset_multiple_peers_remove_same_element_then_one_readds() {
    let mut gen = IdGen::new("a");
    let mut shared: OrSet<&str> = OrSet::new();
    shared.add("x", gen.next());

    let mut b = shared.clone();
    let mut c = shared.clone();
    b.remove(&"x", 10);
    c.remove(&"x", 10);

    let mut d = shared.clone();
    let mut gen_d = IdGen::new("d");
    d.add("x", gen_d.next());

    b.merge(&c);
    b.merge(&d);
    assert!(b.contains(&"x"), "d's fresh add must survive two independent removes");
}

#[test]
fn rga_delete_then_merge_preserves_tombstones() {
    let mut gen = IdGen::new("a");
    let mut a = Rga::new();
    push_str(&mut a, &mut gen, "abc");
    let deleted_id = a.id_at(1).unwrap();
    a.delete_by_id(&deleted_id, 10);
    let b = a.clone();

    a.merge(&b);
    assert!(a.is_tombstoned(&deleted_id), "tombstone must survive self-merge");
    assert_eq!(as_string(&a), "ac");
}

#[test]
fn rga_concurrent_delete_same_character() {
    let mut gen = IdGen::new("a");
    let mut a = Rga::new();
    push_str(&mut a, &mut gen, "abc");
    let mut b = a.clone();

    let target = a.id_at(1).unwrap();
    a.delete_by_id(&target, 10);
    b.delete_by_id(&target, 20);

    a.merge(&b);
    b.merge(&a);
    assert_eq!(as_string(&a), as_string(&b));
    assert_eq!(as_string(&a), "ac");
}

#[test]
fn lww_register_stale_write_does_not_resurrect_old_value() {
    let r1 = ReplicaId::new("r1");
    let mut reg = LwwRegister::new(b"v1".to_vec(), Timestamp::from_nanos(100), r1.clone(), vc("r1", 1));
    reg.set(b"v2".to_vec(), Timestamp::from_nanos(200), r1.clone(), vc("r1", 2));
    assert_eq!(reg.data(), b"v2");

    // A stale write with an earlier timestamp must not win.
    let accepted = reg.set(b"stale".to_vec(), Timestamp::from_nanos(50), r1.clone(), vc("r1", 3));
    assert!(!accepted);
    assert_eq!(reg.data(), b"v2");
}

#[test]
fn counter_resurrection_via_stale_merge() {
    // Merging an older snapshot back in must never decrease a per-replica max.
    let mut current = IntCounter::new();
    current.apply_delta(ReplicaId::new("r1"), 10);
    let stale_snapshot = current.clone();
    current.apply_delta(ReplicaId::new("r1"), 5);

    current.merge(&stale_snapshot);
    assert_eq!(current.value(), 15);
}

#[test]
fn vector_clock_stale_update_does_not_regress() {
    let r1 = ReplicaId::new("r1");
    let mut clock = VectorClock::new();
    clock.inc(r1.clone());
    clock.inc(r1.clone());
    clock.inc(r1.clone());
    assert_eq!(clock.get(&r1), 3);

    let mut stale = VectorClock::new();
    stale.inc(r1.clone());

    clock.update(&stale);
    assert_eq!(clock.get(&r1), 3, "pointwise-max merge must never regress a counter");
}

#[test]
fn full_entity_split_brain_scenario() {
    // A composite entity (title + tags + view counter) fully diverges and
    // reconverges, combining LWW, OR-Set and counter semantics at once.
    let r1 = ReplicaId::new("r1");
    let r2 = ReplicaId::new("r2");
    let mut gen = IdGen::new("r1");

    let mut title = LwwRegister::new(b"Draft".to_vec(), Timestamp::from_nanos(1), r1.clone(), vc("r1", 1));
    let mut tags: OrSet<&str> = OrSet::new();
    tags.add("work", gen.next());
    let mut views = IntCounter::new();
    views.apply_delta(r1.clone(), 1);

    let mut title_b = title.clone();
    let mut tags_b = tags.clone();
    let mut views_b = views.clone();

    title.set(b"Published".to_vec(), Timestamp::from_nanos(5), r1.clone(), vc("r1", 2));
    tags.add("urgent", gen.next());
    views.apply_delta(r1, 3);

    let mut gen_b = IdGen::new("r2");
    title_b.set(b"Archived".to_vec(), Timestamp::from_nanos(3), r2.clone(), vc("r2", 1));
    tags_b.remove(&"work", 10);
    views_b.apply_delta(r2, 2);

    title.merge(&title_b);
    tags.merge(&tags_b);
    views.merge(&views_b);

    assert_eq!(title.data(), b"Published"); // later timestamp wins
    assert!(!tags.contains(&"work"));
    assert!(tags.contains(&"urgent"));
    assert_eq!(views.value(), 6);
}

#[test]
fn full_entity_three_peer_cascading_sync() {
    let r1 = ReplicaId::new("r1");
    let r2 = ReplicaId::new("r2");
    let r3 = ReplicaId::new("r3");

    let mut c1 = IntCounter::new();
    let mut c2 = IntCounter::new();
    let mut c3 = IntCounter::new();
    c1.apply_delta(r1, 4);
    c2.apply_delta(r2, 9);
    c3.apply_delta(r3, 1);

    // Chain: 1←2, 2←3, 3←1, then a second pass to finish propagation.
    c1.merge(&c2);
    c2.merge(&c3);
    c3.merge(&c1);
    c1.merge(&c3);
    c2.merge(&c1);

    assert_eq!(c1.value(), 14);
    assert_eq!(c2.value(), 14);
    assert_eq!(c3.value(), 14);
}
