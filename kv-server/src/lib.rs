//! Single-node command façade sitting between a wire gateway and the Store.
//!
//! [`Server`] exposes exactly two entry points: [`Server::execute`] for a
//! command freshly parsed from this replica's own client traffic, and
//! [`Server::handle_operation`] for an [`kv_types::Operation`] replayed from
//! a peer. Both end up calling the same [`kv_store::Store`] mutators; what
//! differs is the origin metadata each path stamps on the mutation.

mod command;
mod error;
mod reply;
mod server;

pub use command::{Command, SetExistence};
pub use error::{CommandError, CommandResult};
pub use reply::CommandReply;
pub use server::Server;
