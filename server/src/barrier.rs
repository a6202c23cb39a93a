//! Counted rendezvous used for the join, ready and end phases.

use tokio::sync::watch;

/// Releases every waiter once `parties` tasks have arrived.
///
/// The arrival count lives in a watch channel, so arriving and observing the
/// count happen under the same lock.
#[derive(Debug)]
pub struct Rendezvous {
    parties: usize,
    arrivals: watch::Sender<usize>,
}

impl Rendezvous {
    pub fn new(parties: usize) -> Self {
        let (arrivals, _) = watch::channel(0);
        Self { parties, arrivals }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    pub fn arrived(&self) -> usize {
        *self.arrivals.borrow()
    }

    pub fn is_released(&self) -> bool {
        self.arrived() >= self.parties
    }

    /// Registers one arrival and waits for the rest. Returns true for the
    /// task whose arrival released the barrier.
    pub async fn wait(&self) -> bool {
        let mut rx = self.arrivals.subscribe();
        let mut releaser = false;
        self.arrivals.send_modify(|count| {
            *count += 1;
            releaser = *count == self.parties;
        });
        if !releaser {
            self.wait_on(&mut rx).await;
        }
        releaser
    }

    /// Waits for release without counting as an arrival.
    pub async fn released(&self) {
        let mut rx = self.arrivals.subscribe();
        self.wait_on(&mut rx).await;
    }

    async fn wait_on(&self, rx: &mut watch::Receiver<usize>) {
        let parties = self.parties;
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|count| *count >= parties).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_releases_all_parties() {
        let barrier = Arc::new(Rendezvous::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move { barrier.wait().await })
            })
            .collect();

        let mut releasers = 0;
        for handle in handles {
            if handle.await.unwrap() {
                releasers += 1;
            }
        }
        assert_eq!(releasers, 1);
        assert_eq!(barrier.arrived(), 4);
        assert!(barrier.is_released());
    }

    #[tokio::test]
    async fn test_blocks_until_last_arrival() {
        let barrier = Arc::new(Rendezvous::new(2));
        let early = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!early.is_finished());
        assert_eq!(barrier.arrived(), 1);

        assert!(barrier.wait().await);
        assert!(!early.await.unwrap());
    }

    #[tokio::test]
    async fn test_observer_does_not_count() {
        let barrier = Arc::new(Rendezvous::new(1));
        let observer = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.released().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(barrier.arrived(), 0);
        assert!(barrier.wait().await);
        timeout(Duration::from_secs(1), observer)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_observer_returns_immediately() {
        let barrier = Rendezvous::new(1);
        barrier.wait().await;
        timeout(Duration::from_millis(100), barrier.released())
            .await
            .unwrap();
    }
}
