//! Utilities for draining reactive producers in tests and asserting on what
//! they emitted.
//!
//! A [`Producer`] emits zero or more values and terminates at most once. A
//! [`TestScope`] subscribes to it, blocks until it finishes, fails or times
//! out, and hands back a [`CapturedResult`]. Subscriptions made through the
//! scope are cancelled when it goes out of scope.
//!
//! Typical usage:
//! ```no_run
//! use reactive_harness::{Fixtures, ProducerExt, Song, TestScope};
//!
//! let scope = TestScope::new();
//! let fixtures = Fixtures::default();
//! let songs = fixtures
//!     .resolve::<Vec<Song>>("songs")
//!     .map(|songs| songs.into_iter().filter(|song| song.band_id == 1).collect::<Vec<_>>());
//!
//! let result = scope.capture(songs);
//! assert!(result.is_completed());
//! if let Some(songs) = result.first() {
//!     println!("{} songs", songs.len());
//! }
//! ```

mod api;
mod config;
mod error;
mod fixtures;
mod harness;
mod models;
mod numeric;
mod operators;
mod producer;
mod sources;
mod subject;
mod subscription;

pub use api::ApiClient;
pub use config::{bundled_fixture_dir, HarnessConfig, API_BASE_URL_ENV, DEFAULT_API_BASE_URL};
pub use error::{ApiError, FixtureError, HarnessError, HarnessResult};
pub use fixtures::Fixtures;
pub use harness::{CapturedResult, Outcome, TestScope};
pub use models::{Album, Band, Post, Song};
pub use numeric::{prime_or_none, IntegerProducerExt};
pub use operators::{
    Catch, Collect, Delay, DropFirst, Filter, FilterMap, FlatMap, Map, MapErr, ProducerExt,
    SetFailure, SubscribeOn,
};
pub use producer::{BoxProducer, Producer};
pub use sources::{
    empty, fail, just, never, sequence, Empty, Fail, Just, Never, Promise, Resolver, Sequence,
};
pub use subject::Subject;
pub use subscription::{Event, Subscriber, Subscription};
