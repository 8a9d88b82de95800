use super::config::PoolConfig;
use crate::core::{Result, ShardError};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Creates, checks and tears down pooled objects.
#[async_trait]
pub trait PoolableFactory: Send + Sync + 'static {
    type Object: Send + 'static;

    /// Builds a fresh object.
    async fn make_object(&self) -> Result<Self::Object>;

    /// Prepares an idle object for a new borrower.
    async fn activate_object(&self, _object: &mut Self::Object) -> Result<()> {
        Ok(())
    }

    /// Health check used by `test_on_borrow` / `test_on_return`.
    async fn validate_object(&self, _object: &mut Self::Object) -> bool {
        true
    }

    /// Releases an object that leaves the pool for good.
    async fn destroy_object(&self, _object: Self::Object) {}
}

/// Generic object pool
///
/// Objects are created lazily on borrow up to `max_total`. Borrowers that
/// find the pool exhausted wait up to `max_wait` for a returned object.
pub struct ObjectPool<F: PoolableFactory> {
    inner: Arc<PoolInner<F>>,
}

struct PoolInner<F: PoolableFactory> {
    factory: F,
    config: PoolConfig,
    /// Objects waiting to be borrowed
    idle: Mutex<VecDeque<IdleObject<F::Object>>>,
    /// Objects alive, idle and borrowed together
    total: AtomicUsize,
    closed: AtomicBool,
}

struct IdleObject<T> {
    object: T,
    created_at: Instant,
    last_used: Instant,
}

impl<T> IdleObject<T> {
    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.created_at.elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }
}

impl<F: PoolableFactory> Clone for ObjectPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: PoolableFactory> ObjectPool<F> {
    /// Create a pool. No object is created until the first borrow or
    /// [`prefill`](Self::prefill).
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                idle: Mutex::new(VecDeque::new()),
                total: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Create idle objects until `min_idle` is reached
    pub async fn prefill(&self) -> Result<()> {
        while self.inner.total.load(Ordering::SeqCst) < self.inner.config.min_idle {
            let Some(object) = self.try_create().await? else {
                break;
            };
            let now = Instant::now();
            self.inner.idle.lock().await.push_back(IdleObject {
                object,
                created_at: now,
                last_used: now,
            });
        }
        Ok(())
    }

    /// Borrow an object from the pool
    pub async fn get_resource(&self) -> Result<PoolGuard<F>> {
        let start = Instant::now();

        loop {
            if self.is_closed() {
                return Err(ShardError::PoolClosed);
            }

            // Reuse an idle object if one passes activation and validation
            if let Some(mut idle) = self.take_idle().await {
                match self.prepare(&mut idle.object).await {
                    Ok(()) => return Ok(self.guard(idle.object, idle.created_at)),
                    Err(err) => {
                        debug!("Discarding idle object: {}", err);
                        self.inner.discard(idle.object).await;
                        continue;
                    }
                }
            }

            // Create a new object if under limit
            if let Some(object) = self.try_create().await? {
                return Ok(self.guard(object, Instant::now()));
            }

            if start.elapsed() >= self.inner.config.max_wait {
                return Err(ShardError::PoolTimeout(format!(
                    "no object available after {:?} (max_total {})",
                    self.inner.config.max_wait, self.inner.config.max_total
                )));
            }

            // Wait a bit before retrying
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Pop the first usable idle object, destroying stale ones on the way
    async fn take_idle(&self) -> Option<IdleObject<F::Object>> {
        let mut stale = Vec::new();
        let found = {
            let mut idle = self.inner.idle.lock().await;
            let mut found = None;
            while let Some(candidate) = idle.pop_front() {
                if candidate.is_expired(self.inner.config.max_lifetime)
                    || candidate.is_idle_too_long(self.inner.config.idle_timeout)
                {
                    stale.push(candidate.object);
                } else {
                    found = Some(candidate);
                    break;
                }
            }
            found
        };

        for object in stale {
            debug!("Evicting stale pooled object");
            self.inner.discard(object).await;
        }

        found
    }

    async fn prepare(&self, object: &mut F::Object) -> Result<()> {
        self.inner.factory.activate_object(object).await?;
        if self.inner.config.test_on_borrow && !self.inner.factory.validate_object(object).await {
            return Err(ShardError::ConnectionError(
                "pooled object failed validation".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a new object if a slot is free
    async fn try_create(&self) -> Result<Option<F::Object>> {
        let total = &self.inner.total;
        let mut current = total.load(Ordering::SeqCst);
        loop {
            if current >= self.inner.config.max_total {
                return Ok(None);
            }
            match total.compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        match self.inner.factory.make_object().await {
            Ok(object) => {
                debug!("Created pooled object ({} alive)", current + 1);
                Ok(Some(object))
            }
            Err(err) => {
                total.fetch_sub(1, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn guard(&self, object: F::Object, created_at: Instant) -> PoolGuard<F> {
        PoolGuard {
            object: Some(object),
            created_at,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Close the pool and destroy every idle object.
    ///
    /// Borrowed objects are destroyed when they come back.
    pub async fn destroy(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);

        let drained: Vec<_> = {
            let mut idle = self.inner.idle.lock().await;
            idle.drain(..).collect()
        };
        for entry in drained {
            self.inner.discard(entry.object).await;
        }
    }

    /// Get pool statistics
    pub async fn stats(&self) -> PoolStats {
        let idle = self.inner.idle.lock().await;
        let total = self.inner.total.load(Ordering::SeqCst);

        PoolStats {
            total,
            idle: idle.len(),
            active: total.saturating_sub(idle.len()),
            max_total: self.inner.config.max_total,
        }
    }
}

impl<F: PoolableFactory> PoolInner<F> {
    async fn discard(&self, object: F::Object) {
        self.factory.destroy_object(object).await;
        self.total.fetch_sub(1, Ordering::SeqCst);
    }

    async fn give_back(&self, mut object: F::Object, created_at: Instant) {
        if self.closed.load(Ordering::SeqCst) {
            self.discard(object).await;
            return;
        }

        if self.config.test_on_return && !self.factory.validate_object(&mut object).await {
            debug!("Returned object failed validation");
            self.discard(object).await;
            return;
        }

        self.idle.lock().await.push_back(IdleObject {
            object,
            created_at,
            last_used: Instant::now(),
        });
    }
}

/// Object pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub idle: usize,
    pub active: usize,
    pub max_total: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} idle, max {}",
            self.active, self.total, self.idle, self.max_total
        )
    }
}

/// RAII guard for a borrowed object
///
/// Returns the object to the pool when dropped. When the object cannot go
/// back inline, the drop spawns the full return path on the current tokio
/// runtime: a closed pool destroys it and `test_on_return` validates it.
/// That return finishes shortly after the drop, while
/// [`close`](Self::close) finishes it before resolving.
pub struct PoolGuard<F: PoolableFactory> {
    object: Option<F::Object>,
    created_at: Instant,
    pool: Arc<PoolInner<F>>,
}

impl<F: PoolableFactory> PoolGuard<F> {
    /// Return the object to the pool.
    pub async fn close(mut self) -> Result<()> {
        if let Some(object) = self.object.take() {
            self.pool.give_back(object, self.created_at).await;
        }
        Ok(())
    }

    /// Destroy the object instead of returning it, freeing its slot.
    pub async fn invalidate(mut self) {
        if let Some(object) = self.object.take() {
            debug!("Invalidating broken pooled object");
            self.pool.discard(object).await;
        }
    }
}

impl<F: PoolableFactory> Deref for PoolGuard<F> {
    type Target = F::Object;

    fn deref(&self) -> &Self::Target {
        self.object.as_ref().expect("object already returned to pool")
    }
}

impl<F: PoolableFactory> DerefMut for PoolGuard<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.object.as_mut().expect("object already returned to pool")
    }
}

impl<F: PoolableFactory> Drop for PoolGuard<F> {
    fn drop(&mut self) {
        let Some(object) = self.object.take() else {
            return;
        };

        // An open pool with no return check takes the object back inline
        let inline = !self.pool.closed.load(Ordering::SeqCst) && !self.pool.config.test_on_return;
        if inline {
            if let Ok(mut idle) = self.pool.idle.try_lock() {
                idle.push_back(IdleObject {
                    object,
                    created_at: self.created_at,
                    last_used: Instant::now(),
                });
                return;
            }
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(&self.pool);
                let created_at = self.created_at;
                handle.spawn(async move {
                    pool.give_back(object, created_at).await;
                });
            }
            Err(_) => {
                warn!("PoolGuard dropped outside a tokio runtime; object released without destroy_object. Use close().await.");
                drop(object);
                self.pool.total.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
