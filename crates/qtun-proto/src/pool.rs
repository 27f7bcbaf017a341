use std::{sync::Arc, time::Duration};

use qtun_core::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
	client::{DialerOpts, dial},
	connection::TunnelConnection,
	error::{Error, PoolShuttingDownSnafu, PoolTimeoutSnafu},
};

const REFILL_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded MPMC queue of authenticated, idle tunnel connections.
///
/// Refill workers dial continuously and push onto the queue; callers pop
/// with a timeout. A single [`CancellationToken`] stops both the retry wait
/// and the blocking push/pop so shutdown is prompt.
pub struct Pool {
	tx:       crossfire::mpmc::AsyncTx<TunnelConnection>,
	rx:       crossfire::mpmc::AsyncRx<TunnelConnection>,
	cancel:   CancellationToken,
	capacity: usize,
}

impl Pool {
	pub fn capacity_for(target_size: usize) -> usize {
		target_size.max(1)
	}

	pub fn worker_count(target_size: usize) -> usize {
		(target_size / 10 + 1).max(1)
	}

	pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
		let (tx, rx) = crossfire::mpmc::bounded_async(capacity);
		Self { tx, rx, cancel, capacity }
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Spawns the refill worker pool; returns once all workers have been
	/// launched (they run until `cancel` fires).
	pub fn spawn_refill_workers(self: &Arc<Self>, dialer: Arc<DialerOpts>, count: usize) {
		for id in 0..count {
			let pool = self.clone();
			let dialer = dialer.clone();
			tokio::spawn(async move { pool.refill_loop(id, dialer).await });
		}
	}

	async fn refill_loop(&self, worker_id: usize, dialer: Arc<DialerOpts>) {
		loop {
			tokio::select! {
				_ = self.cancel.cancelled() => {
					info!(target: "[POOL]", "refill worker {worker_id} stopping");
					return;
				}
				result = dial(&dialer) => {
					match result {
						Ok(conn) => {
							tokio::select! {
								_ = self.cancel.cancelled() => return,
								send = self.tx.send(conn) => {
									if send.is_err() {
										return;
									}
								}
							}
						}
						Err(err) => {
							warn!(target: "[POOL]", "refill worker {worker_id} dial failed: {err}");
							tokio::select! {
								_ = self.cancel.cancelled() => return,
								_ = tokio::time::sleep(REFILL_RETRY_DELAY) => {}
							}
						}
					}
				}
			}
		}
	}

	/// Dequeues one pooled connection, failing the caller after 30s rather
	/// than retrying: a pool-acquire timeout refuses the waiting SOCKS5
	/// client instead of making it wait indefinitely.
	pub async fn acquire(&self) -> Result<TunnelConnection, Error> {
		tokio::select! {
			_ = self.cancel.cancelled() => PoolShuttingDownSnafu.fail(),
			res = tokio::time::timeout(DEQUEUE_TIMEOUT, self.rx.recv()) => {
				match res {
					Ok(Ok(conn)) => Ok(conn),
					Ok(Err(_)) => PoolShuttingDownSnafu.fail(),
					Err(_) => PoolTimeoutSnafu { seconds: DEQUEUE_TIMEOUT.as_secs() }.fail(),
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn worker_count_is_sub_linear_in_pool_size() {
		assert_eq!(Pool::worker_count(128), 13);
		assert_eq!(Pool::worker_count(1), 1);
		assert_eq!(Pool::worker_count(0), 1);
	}

	#[test_log::test(tokio::test)]
	async fn shutdown_unblocks_acquire_immediately() {
		let cancel = CancellationToken::new();
		let pool = Pool::new(4, cancel.clone());
		cancel.cancel();
		let err = pool.acquire().await.unwrap_err();
		assert!(matches!(err, Error::PoolShuttingDown { .. }));
	}
}
