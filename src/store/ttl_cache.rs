use anyhow::Result;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Instant;

type ProducerFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
type Producer<A, T> = Box<dyn Fn(A) -> ProducerFuture<T> + Send + Sync>;

/// Last produced value and when it was produced
#[derive(Debug)]
struct CacheEntry<T> {
    value: Option<T>,
    fetched_at: Option<Instant>,
}

impl<T: Clone> CacheEntry<T> {
    fn fresh(&self, ttl: Duration) -> Option<T> {
        match (&self.value, self.fetched_at) {
            (Some(value), Some(fetched_at)) if fetched_at.elapsed() < ttl => Some(value.clone()),
            _ => None,
        }
    }
}

/// Memoizes a single expensive async producer for a fixed lifetime.
///
/// By default callers that race on an expired entry each invoke the
/// producer. `with_single_flight` makes them queue behind the first
/// caller and reuse its result instead.
pub struct TtlCache<A, T> {
    producer: Producer<A, T>,
    ttl: Duration,
    entry: Mutex<CacheEntry<T>>,
    fetch_gate: Option<tokio::sync::Mutex<()>>,
}

impl<A, T> TtlCache<A, T>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new<F, Fut>(ttl: Duration, producer: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            producer: Box::new(move |args| -> ProducerFuture<T> { Box::pin(producer(args)) }),
            ttl,
            entry: Mutex::new(CacheEntry {
                value: None,
                fetched_at: None,
            }),
            fetch_gate: None,
        }
    }

    pub fn with_single_flight(mut self) -> Self {
        self.fetch_gate = Some(tokio::sync::Mutex::new(()));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, invoking the producer when nothing was fetched
    /// yet or the last successful fetch is older than the TTL.
    /// Producer errors are returned and leave the entry as it was.
    pub async fn get_data(&self, args: A) -> Result<T> {
        if let Some(value) = self.fresh_value() {
            return Ok(value);
        }

        match &self.fetch_gate {
            None => self.fetch(args).await,
            Some(gate) => {
                let _in_flight = gate.lock().await;
                // Whoever held the gate before us may have refreshed the entry
                if let Some(value) = self.fresh_value() {
                    return Ok(value);
                }
                self.fetch(args).await
            }
        }
    }

    /// Treat the entry as expired on the next `get_data`
    pub fn reset_cache(&self) {
        let mut entry = self.entry.lock();
        entry.value = None;
        entry.fetched_at = None;
    }

    fn fresh_value(&self) -> Option<T> {
        self.entry.lock().fresh(self.ttl)
    }

    async fn fetch(&self, args: A) -> Result<T> {
        let value = (self.producer)(args).await?;

        let mut entry = self.entry.lock();
        entry.value = Some(value.clone());
        entry.fetched_at = Some(Instant::now());
        Ok(value)
    }
}

impl<A, T: std::fmt::Debug> std::fmt::Debug for TtlCache<A, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("entry", &*self.entry.lock())
            .field("single_flight", &self.fetch_gate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_cache(ttl: Duration) -> (TtlCache<(), usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = TtlCache::new(ttl, move |_: ()| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
            }
        });
        (cache, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_reused_within_ttl() {
        let (cache, calls) = counting_cache(Duration::from_secs(1));

        assert_eq!(cache.get_data(()).await.unwrap(), 1);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(cache.get_data(()).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_refetched_after_ttl() {
        let (cache, calls) = counting_cache(Duration::from_secs(1));

        cache.get_data(()).await.unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(cache.get_data(()).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forces_refetch() {
        let (cache, calls) = counting_cache(Duration::from_secs(3600));

        cache.get_data(()).await.unwrap();
        cache.reset_cache();
        cache.get_data(()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache: TtlCache<(), String> = TtlCache::new(Duration::from_secs(60), move |_: ()| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    anyhow::bail!("token endpoint unavailable")
                }
                Ok("token".to_string())
            }
        });

        assert!(cache.get_data(()).await.is_err());
        assert_eq!(cache.get_data(()).await.unwrap(), "token");
        assert_eq!(cache.get_data(()).await.unwrap(), "token");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_callers_each_fetch_by_default() {
        let (cache, calls) = counting_cache(Duration::from_secs(60));

        let (a, b) = tokio::join!(cache.get_data(()), cache.get_data(()));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_shares_one_fetch() {
        let (cache, calls) = counting_cache(Duration::from_secs(60));
        let cache = cache.with_single_flight();

        let (a, b) = tokio::join!(cache.get_data(()), cache.get_data(()));
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_receives_arguments() {
        let cache = TtlCache::new(Duration::from_secs(60), |scope: String| async move {
            Ok(format!("token-for-{}", scope))
        });
        assert_eq!(
            cache.get_data("management".to_string()).await.unwrap(),
            "token-for-management"
        );
    }
}
