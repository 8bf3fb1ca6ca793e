//! 连接管理器
//!
//! 持有一个延迟创建的连接池，对外提供就绪等待、带重试的查询和关闭操作。
//! 连接池句柄的状态机：
//!
//! ```text
//! 无 --ensure_pool--> 活动 --可重试错误且仍有剩余次数--> 无 --ensure_pool--> 活动 ...
//!                      \--shutdown--> 无
//! ```
//!
//! 任何时刻最多只有一个活动连接池；替换前先停掉它的探活任务并尽力关闭旧池。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::connector::Connector;
use super::error::DbError;
use super::statement::{QueryOutput, Statement};

/// 连接管理器的可调参数
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// 单次查询的默认尝试次数（含第一次）
    pub attempts: u32,
    /// 重建连接池后重试前的等待时间
    pub retry_backoff: Duration,
    /// 探活间隔
    pub probe_interval: Duration,
    /// 关闭旧连接池的最长等待时间
    pub close_grace: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_backoff: Duration::from_millis(500),
            probe_interval: Duration::from_secs(30),
            close_grace: Duration::from_secs(5),
        }
    }
}

/// 某一代连接池的句柄
///
/// `generation` 在每次重建时递增，可用来判断两次取得的是否为同一个连接池。
#[derive(Debug, Clone)]
pub struct PoolHandle<P> {
    pool: P,
    generation: u64,
}

impl<P> PoolHandle<P> {
    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct ActivePool<P> {
    pool: P,
    generation: u64,
    probe: JoinHandle<()>,
}

/// 数据库连接管理器
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    options: ManagerOptions,
    slot: Mutex<Option<ActivePool<C::Pool>>>,
    generations: AtomicU64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self::with_options(connector, ManagerOptions::default())
    }

    pub fn with_options(connector: C, options: ManagerOptions) -> Self {
        Self {
            connector: Arc::new(connector),
            options,
            slot: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// 当前是否持有活动连接池
    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// 返回当前连接池，不存在时创建一个并启动探活任务
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn ensure_pool(&self) -> PoolHandle<C::Pool> {
        let mut slot = self.slot();
        if let Some(active) = slot.as_ref() {
            return PoolHandle {
                pool: active.pool.clone(),
                generation: active.generation,
            };
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let pool = self.connector.connect();
        let probe = tokio::spawn(run_probe(
            Arc::clone(&self.connector),
            pool.clone(),
            self.options.probe_interval,
        ));
        info!(generation, "Database pool created");

        *slot = Some(ActivePool {
            pool: pool.clone(),
            generation,
            probe,
        });
        PoolHandle { pool, generation }
    }

    /// 反复执行存活探测直到成功，超过 `retries` 次后返回 `NotReady`
    pub async fn wait_until_ready(&self, retries: u32, delay: Duration) -> Result<(), DbError> {
        let liveness = Statement::liveness();
        for attempt in 1..=retries {
            let handle = self.ensure_pool();
            match self.connector.execute(handle.pool(), &liveness).await {
                Ok(_) => {
                    info!(attempt, "Database is ready");
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, retries, error = %err, "Database not ready yet");
                    if attempt < retries {
                        time::sleep(delay).await;
                    }
                }
            }
        }
        Err(DbError::not_ready(retries))
    }

    /// 使用默认尝试次数执行语句
    pub async fn query(&self, stmt: &Statement) -> Result<QueryOutput, DbError> {
        self.query_with_attempts(stmt, self.options.attempts).await
    }

    /// 执行语句；遇到连接类错误时丢弃连接池、等待片刻后重试，
    /// 其余错误或次数用尽时原样返回。
    pub async fn query_with_attempts(
        &self,
        stmt: &Statement,
        attempts: u32,
    ) -> Result<QueryOutput, DbError> {
        let mut remaining = attempts.max(1);
        loop {
            let handle = self.ensure_pool();
            match self.connector.execute(handle.pool(), stmt).await {
                Ok(output) => return Ok(output),
                Err(err) if remaining > 1 && err.is_retryable() => {
                    remaining -= 1;
                    warn!(
                        generation = handle.generation(),
                        remaining,
                        error = %err,
                        "Retryable database error, rebuilding pool"
                    );
                    self.recycle(handle.generation()).await;
                    time::sleep(self.options.retry_backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// 通过存活探测语句检查数据库是否可用
    pub async fn ping(&self) -> Result<(), DbError> {
        self.query(&Statement::liveness()).await.map(|_| ())
    }

    /// 停止探活、关闭并清空连接池；没有连接池时什么也不做
    pub async fn shutdown(&self) {
        let retired = self.slot().take();
        if let Some(active) = retired {
            info!(generation = active.generation, "Closing database pool");
            self.dispose(active).await;
        }
    }

    /// 丢弃指定代的连接池；如果它已被其他请求替换则保持不动
    async fn recycle(&self, generation: u64) {
        let retired = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some(active) if active.generation == generation => slot.take(),
                _ => None,
            }
        };

        match retired {
            Some(active) => self.dispose(active).await,
            None => debug!(generation, "Pool already replaced, skipping teardown"),
        }
    }

    async fn dispose(&self, active: ActivePool<C::Pool>) {
        active.probe.abort();
        let generation = active.generation;
        if time::timeout(self.options.close_grace, self.connector.close(active.pool))
            .await
            .is_err()
        {
            warn!(generation, "Timed out closing database pool");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActivePool<C::Pool>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = slot.take() {
            active.probe.abort();
        }
    }
}

/// 周期性执行存活探测，结果和错误都被忽略
async fn run_probe<C: Connector>(connector: Arc<C>, pool: C::Pool, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let liveness = Statement::liveness();

    loop {
        ticker.tick().await;
        if let Err(err) = connector.execute(&pool, &liveness).await {
            trace!(error = %err, "Health probe failed");
        }
    }
}
