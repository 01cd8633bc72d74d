//! Weave Scope: dirty checking over a tree of scopes
//!
//! Watchers registered on a [`Scope`] are evaluated by [`Scope::digest`] until the tree is
//! stable. The tree shares one set of queues for deferred work: `eval_async` expressions run at
//! the start of each digest pass, `apply_async` expressions are coalesced into a single
//! `apply`, and `post_digest` tasks run once the digest has finished.
//!
//! Deferred digests are spawned on a [`futures::task::LocalSpawn`], e.g. the spawner of a
//! [`futures::executor::LocalPool`]:
//!
//! ```
//! use futures::executor::LocalPool;
//! use weave_scope::{Scope, Value};
//!
//! let mut pool = LocalPool::new();
//! let scope = Scope::new_root(pool.spawner());
//! scope.set("counter", 0);
//!
//! scope
//!     .apply_async(|scope| {
//!         scope.set("counter", 1);
//!         Ok(())
//!     })
//!     .unwrap();
//! pool.run_until_stalled();
//! assert_eq!(scope.get("counter"), Value::from(1));
//! ```

pub mod collection;
pub mod config;
pub mod digest;
pub mod errors;
pub mod events;
pub mod provider;
pub mod scope;
pub mod value;
pub mod watch_group;

pub use config::{DigestConfig, DEFAULT_DIGEST_TTL};
pub use errors::{Phase, ScopeError};
pub use events::{Event, DESTROY_EVENT};
pub use provider::{register, RootScopeProvider, NG_MODULE, ROOT_SCOPE};
pub use scope::{Deregistration, Scope};
pub use value::Value;
pub use watch_group::{watch_fn, WatchFn};
