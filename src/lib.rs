//! Asynchronous atoms with automatic dependency discovery.
//!
//! A [`Graph`] holds nodes of two kinds: roots ([`Var`]) holding a value
//! set from the outside, and derived nodes computed by an async resolver
//! from other nodes. A resolver reads other nodes through a [`Context`];
//! every read is recorded, and when a node resolves all nodes that read
//! it are evaluated again.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use futures::executor::LocalPool;
//!
//! let mut pool = LocalPool::new();
//! let graph = atoms::Graph::new(pool.spawner());
//!
//! let name = graph.var(String::from("cat"));
//! let shout = {
//!     let name = name.node();
//!     graph.computed(move |cx| async move { cx.get_or_default(name) + "!" })
//! };
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let _subscription = graph
//!     .subscribe(shout, {
//!         let seen = seen.clone();
//!         move |value: &String| seen.borrow_mut().push(value.clone())
//!     })
//!     .unwrap();
//!
//! pool.run_until_stalled();
//! name.set(String::from("dog")).unwrap();
//! pool.run_until_stalled();
//!
//! assert_eq!(*seen.borrow(), vec!["cat!", "dog!"]);
//! ```

pub mod macros;

mod context;
mod dependencies;
mod error;
mod evaluation;
mod graph;
mod node;
mod options;
mod subscription;
mod var;

pub use context::Context;
pub use error::{BoxError, Cause, Error, ResolverFailure};
pub use evaluation::State;
pub use graph::Graph;
pub use node::{Definition, Node, NodeId, ResolverFn};
pub use options::{EdgePolicy, Options};
pub use subscription::Subscription;
pub use var::{Toggle, Var};
