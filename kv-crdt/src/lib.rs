//! Per-type CRDT value algebra for crdt-kv.
//!
//! This crate provides the Conflict-free Replicated Data Types backing every
//! value kind the store exposes:
//!
//! - [`LwwRegister`] — Last-Writer-Wins register, backs `String`
//! - [`IntCounter`] / [`FloatCounter`] — accumulative counters
//! - [`OrSet`] — Observed-Remove Set (add-wins), backs `Set`
//! - [`Rga`] — Replicated Growable Array, backs `List`
//! - [`CrdtHash`] — OR-field LWW hash with per-field counters, backs `Hash`
//! - [`ZSet`] — sorted set with LWW score and per-replica counter delta
//! - [`VectorClock`] — causality tracking across replicas
//! - [`CrdtValue`] — the tagged envelope tying a payload to an optional TTL
//!
//! Every CRDT here satisfies the usual convergence properties:
//! - **Commutative**: `merge(a, b) == merge(b, a)`
//! - **Associative**: `merge(merge(a, b), c) == merge(a, merge(b, c))`
//! - **Idempotent**: `merge(a, a) == a`
//!
//! so replicas converge to the same state regardless of delivery order.

mod counter;
mod hash;
mod lww;
mod orset;
mod rga;
mod value;
mod vector_clock;
mod zset;

pub use counter::{FloatCounter, IntCounter};
pub use hash::CrdtHash;
pub use lww::LwwRegister;
pub use orset::OrSet;
pub use rga::Rga;
pub use value::{vector_clock_of, CrdtData, CrdtValue, Error, Result};
pub use vector_clock::{CausalOrder, VectorClock};
pub use zset::ZSet;
