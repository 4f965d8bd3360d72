//! Batch loader implementation.
//!
//! A [`BatchLoader`] collects every `load` issued during one scheduler pass,
//! then calls the underlying [`BatchLoad`] exactly once over the deduplicated
//! keys. The first caller to enqueue a key into an empty batch becomes the
//! dispatcher: it yields once so sibling futures polled in the same pass can
//! join, then runs the fetch and fans results back out.

use std::any::type_name;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{DependencyError, LoadError};
use crate::scope::LoaderHandle;

/// A batch-fetch function.
///
/// `load_batch` receives deduplicated keys in first-seen order and must return
/// exactly one value per key, positionally aligned.
#[async_trait]
pub trait BatchLoad: Send + Sync + 'static {
  type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
  type Value: Clone + Send + Sync + 'static;

  async fn load_batch(&self, keys: &[Self::Key]) -> Result<Vec<Self::Value>, LoadError>;

  /// Upper bound on keys per `load_batch` call. `None` means unbounded.
  fn max_batch_size(&self) -> Option<usize> {
    None
  }
}

type Waiter<V> = oneshot::Sender<Result<V, LoadError>>;

struct State<K, V> {
  /// Successful results, kept for the lifetime of the loader.
  cache: HashMap<K, V>,
  /// Keys waiting for the next dispatch, in first-seen order.
  queued: Vec<K>,
  /// Callers waiting on queued or in-flight keys.
  waiters: HashMap<K, Vec<Waiter<V>>>,
  /// Whether a dispatcher has been elected for `queued`.
  scheduled: bool,
}

/// Deduplicating, caching front for a [`BatchLoad`].
///
/// One instance lives for exactly one resolve scope.
pub struct BatchLoader<L: BatchLoad> {
  name: &'static str,
  batch: L,
  state: Mutex<State<L::Key, L::Value>>,
}

impl<L: BatchLoad> BatchLoader<L> {
  /// Wrap a batch function, naming the loader after its type.
  pub fn new(batch: L) -> Self {
    Self::named(type_name::<L>(), batch)
  }

  /// Wrap a batch function under an explicit name.
  pub fn named(name: &'static str, batch: L) -> Self {
    Self {
      name,
      batch,
      state: Mutex::new(State {
        cache: HashMap::new(),
        queued: Vec::new(),
        waiters: HashMap::new(),
        scheduled: false,
      }),
    }
  }

  /// Recover a typed loader from a type-erased scope handle.
  pub fn from_handle(handle: LoaderHandle) -> Result<std::sync::Arc<Self>, DependencyError> {
    handle
      .downcast::<Self>()
      .map_err(|_| DependencyError::TypeMismatch {
        loader: type_name::<L>().to_string(),
      })
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// The wrapped batch function.
  pub fn inner(&self) -> &L {
    &self.batch
  }

  /// Load a single key.
  ///
  /// Concurrent loads of the same key share one fetch; completed keys are
  /// served from the cache.
  pub async fn load(&self, key: L::Key) -> Result<L::Value, LoadError> {
    let (receiver, leads) = {
      let mut guard = self.lock();
      let state = &mut *guard;

      if let Some(value) = state.cache.get(&key) {
        return Ok(value.clone());
      }

      let (sender, receiver) = oneshot::channel();
      let enqueued = match state.waiters.entry(key) {
        Entry::Occupied(mut entry) => {
          entry.get_mut().push(sender);
          false
        }
        Entry::Vacant(entry) => {
          let key = entry.key().clone();
          entry.insert(vec![sender]);
          state.queued.push(key);
          true
        }
      };

      let leads = enqueued && !state.scheduled;
      if leads {
        state.scheduled = true;
      }
      (receiver, leads)
    };

    if leads {
      let mut dispatch = Dispatch {
        loader: self,
        keys: Vec::new(),
        delivered: 0,
        taken: false,
      };
      // Let every load issued in this scheduler pass join the batch.
      tokio::task::yield_now().await;
      self.dispatch(&mut dispatch).await;
    }

    receiver.await.unwrap_or_else(|_| {
      Err(LoadError::Abandoned {
        loader: self.name.to_string(),
      })
    })
  }

  /// Load several keys in the same tick.
  pub async fn load_many(
    &self,
    keys: impl IntoIterator<Item = L::Key>,
  ) -> Result<Vec<L::Value>, LoadError> {
    try_join_all(keys.into_iter().map(|key| self.load(key))).await
  }

  /// Seed the cache. Existing entries are left untouched.
  pub fn prime(&self, key: L::Key, value: L::Value) {
    self.lock().cache.entry(key).or_insert(value);
  }

  /// Drop one cached key so the next load fetches it again.
  pub fn clear(&self, key: &L::Key) {
    self.lock().cache.remove(key);
  }

  pub fn clear_all(&self) {
    self.lock().cache.clear();
  }

  /// Number of keys currently cached.
  pub fn cached_len(&self) -> usize {
    self.lock().cache.len()
  }

  async fn dispatch(&self, dispatch: &mut Dispatch<'_, L>) {
    let keys = {
      let mut state = self.lock();
      state.scheduled = false;
      std::mem::take(&mut state.queued)
    };
    dispatch.keys = keys.clone();
    dispatch.taken = true;

    if keys.is_empty() {
      return;
    }

    let chunk_size = self
      .batch
      .max_batch_size()
      .filter(|size| *size > 0)
      .unwrap_or(keys.len());

    for chunk in keys.chunks(chunk_size) {
      let result = self.fetch(chunk).await;
      let failed = result.as_ref().err().cloned();
      self.deliver(chunk, result);
      dispatch.delivered += chunk.len();

      // A failed chunk fails the rest of the tick as well.
      if let Some(error) = failed {
        let rest = &keys[dispatch.delivered..];
        self.deliver(rest, Err(error));
        dispatch.delivered = keys.len();
        break;
      }
    }
  }

  async fn fetch(&self, keys: &[L::Key]) -> Result<Vec<L::Value>, LoadError> {
    debug!(loader = self.name, keys = keys.len(), "batch_dispatched");

    let values = self.batch.load_batch(keys).await?;
    if values.len() != keys.len() {
      return Err(LoadError::LengthMismatch {
        loader: self.name.to_string(),
        expected: keys.len(),
        actual: values.len(),
      });
    }
    Ok(values)
  }

  fn deliver(&self, keys: &[L::Key], result: Result<Vec<L::Value>, LoadError>) {
    let mut guard = self.lock();
    let state = &mut *guard;

    match result {
      Ok(values) => {
        for (key, value) in keys.iter().zip(values) {
          for waiter in state.waiters.remove(key).unwrap_or_default() {
            // Receiver may have been dropped by a cancelled caller
            let _ = waiter.send(Ok(value.clone()));
          }
          state.cache.insert(key.clone(), value);
        }
      }
      Err(error) => {
        for key in keys {
          for waiter in state.waiters.remove(key).unwrap_or_default() {
            let _ = waiter.send(Err(error.clone()));
          }
        }
      }
    }
  }

  fn lock(&self) -> MutexGuard<'_, State<L::Key, L::Value>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<L: BatchLoad> Debug for BatchLoader<L> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BatchLoader")
      .field("name", &self.name)
      .field("cached", &self.cached_len())
      .finish()
  }
}

/// Tracks the keys owned by a dispatching load.
///
/// If the dispatcher is dropped before it delivers, the remaining waiters are
/// released so they observe [`LoadError::Abandoned`] instead of hanging.
struct Dispatch<'a, L: BatchLoad> {
  loader: &'a BatchLoader<L>,
  keys: Vec<L::Key>,
  delivered: usize,
  taken: bool,
}

impl<L: BatchLoad> Drop for Dispatch<'_, L> {
  fn drop(&mut self) {
    let mut guard = self.loader.lock();
    let state = &mut *guard;

    let undelivered = if self.taken {
      self.keys.split_off(self.delivered.min(self.keys.len()))
    } else {
      state.scheduled = false;
      std::mem::take(&mut state.queued)
    };

    for key in &undelivered {
      state.waiters.remove(key);
    }
  }
}
