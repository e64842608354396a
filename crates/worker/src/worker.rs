//! Job worker: polls the gateway and dispatches jobs to a handler.
//!
//! Runs the loop:
//! ```text
//! Activate (up to free capacity) → Spawn handlers → Pause / Back off
//! ```
//! until closed, then waits for in-flight handlers.

use std::sync::Arc;
use std::time::Duration;

use domath_core::JobKey;
use domath_gateway::{ActivateJobsRequest, GatewayClient};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{GatewayJobClient, HandlerError, JobHandler, WorkerConfig};

/// Errors surfaced by a job worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Worker could not be opened
    #[error("invalid worker configuration: {0}")]
    Config(String),

    /// A handler reported an unrecoverable error
    #[error("worker stopped after fatal handler error: {0}")]
    Fatal(String),

    /// The poll loop itself died
    #[error("worker task failed: {0}")]
    Join(String),
}

/// Builds and opens a [`JobWorker`].
pub struct JobWorkerBuilder {
    gateway: Arc<dyn GatewayClient>,
    config: WorkerConfig,
    handler: Option<Arc<dyn JobHandler>>,
}

impl JobWorkerBuilder {
    /// Start a worker for `gateway` with default policy for the DoMath job type.
    pub fn new(gateway: Arc<dyn GatewayClient>) -> Self {
        Self {
            gateway,
            config: WorkerConfig::new(domath_core::JOB_TYPE),
            handler: None,
        }
    }

    /// Replace the whole worker policy.
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the job type.
    pub fn job_type(mut self, job_type: impl Into<String>) -> Self {
        self.config.job_type = job_type.into();
        self
    }

    /// Set the handler.
    pub fn handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Open the subscription. Returns immediately; jobs are handled on
    /// tokio tasks. Must be called within a tokio runtime.
    pub fn open(self) -> Result<JobWorker, WorkerError> {
        let handler = self
            .handler
            .ok_or_else(|| WorkerError::Config("no handler set".to_string()))?;
        if self.config.job_type.trim().is_empty() {
            return Err(WorkerError::Config("job type is empty".to_string()));
        }
        if self.config.max_jobs_active == 0 {
            return Err(WorkerError::Config("max_jobs_active must be positive".to_string()));
        }

        let token = CancellationToken::new();
        let poll_loop = PollLoop {
            job_client: GatewayJobClient::new(self.gateway.clone()),
            gateway: self.gateway,
            handler,
            semaphore: Arc::new(Semaphore::new(self.config.max_jobs_active as usize)),
            config: self.config.clone(),
            token: token.clone(),
            tasks: JoinSet::new(),
            fatal: None,
            consecutive_errors: 0,
        };

        info!(
            "Job worker {} opened for job type {}",
            self.config.worker_name, self.config.job_type
        );

        Ok(JobWorker {
            config: self.config,
            token,
            task: tokio::spawn(poll_loop.run()),
        })
    }
}

/// Handle to an open job subscription.
pub struct JobWorker {
    config: WorkerConfig,
    token: CancellationToken,
    task: JoinHandle<Result<(), WorkerError>>,
}

impl JobWorker {
    /// Job type this worker serves.
    pub fn job_type(&self) -> &str {
        &self.config.job_type
    }

    /// Worker name sent to the gateway.
    pub fn worker_name(&self) -> &str {
        &self.config.worker_name
    }

    /// Stop activating jobs. In-flight handlers keep running.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Whether the worker has been closed, by [`close`](Self::close) or by
    /// a fatal handler error.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the worker is closed.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    /// Wait for the poll loop and all in-flight handlers to finish.
    pub async fn await_close(self) -> Result<(), WorkerError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(WorkerError::Join(e.to_string())),
        }
    }
}

type HandlerOutcome = (JobKey, Result<(), HandlerError>);

struct PollLoop {
    gateway: Arc<dyn GatewayClient>,
    job_client: GatewayJobClient,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    tasks: JoinSet<HandlerOutcome>,
    fatal: Option<String>,
    consecutive_errors: u32,
}

impl PollLoop {
    async fn run(mut self) -> Result<(), WorkerError> {
        while !self.token.is_cancelled() {
            while let Some(finished) = self.tasks.try_join_next() {
                self.record(finished);
            }

            let capacity = self.semaphore.available_permits() as u32;
            if capacity == 0 {
                trace!("All {} handler slots busy", self.config.max_jobs_active);
                tokio::select! {
                    _ = self.token.cancelled() => break,
                    Some(finished) = self.tasks.join_next() => self.record(finished),
                }
                continue;
            }

            let request = ActivateJobsRequest {
                job_type: self.config.job_type.clone(),
                worker: self.config.worker_name.clone(),
                timeout: self.config.timeout,
                max_jobs_to_activate: capacity,
                request_timeout: self.config.request_timeout,
                fetch_variables: self.config.fetch_variables.clone(),
            };

            let result = tokio::select! {
                _ = self.token.cancelled() => break,
                result = self.gateway.activate_jobs(&request) => result,
            };

            match result {
                Ok(jobs) if jobs.is_empty() => {
                    self.consecutive_errors = 0;
                    self.pause(self.config.poll_interval).await;
                }
                Ok(jobs) => {
                    self.consecutive_errors = 0;
                    debug!("Activated {} jobs of type {}", jobs.len(), self.config.job_type);
                    for job in jobs {
                        if !self.dispatch(job).await {
                            break;
                        }
                    }
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    let delay = self.config.backoff.delay(self.consecutive_errors);
                    warn!(
                        "Job activation failed ({} in a row), retrying in {:?}: {}",
                        self.consecutive_errors, delay, e
                    );
                    self.pause(delay).await;
                }
            }
        }

        if !self.tasks.is_empty() {
            info!("Waiting for {} in-flight jobs", self.tasks.len());
        }
        while let Some(finished) = self.tasks.join_next().await {
            self.record(finished);
        }

        info!("Job worker {} closed", self.config.worker_name);
        match self.fatal {
            Some(message) => Err(WorkerError::Fatal(message)),
            None => Ok(()),
        }
    }

    /// Hand `job` to the handler once a slot is free. Returns `false`, and
    /// drops the job, when the worker is closed first.
    async fn dispatch(&mut self, job: domath_core::Job) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit.filter(|_| !self.token.is_cancelled()) else {
            debug!("Worker closing, not handling job {}", job.key);
            return false;
        };

        let handler = self.handler.clone();
        let client = self.job_client.clone();
        let token = self.token.clone();
        let key = job.key;

        trace!("Dispatching job {}", key);
        self.tasks.spawn(async move {
            let result = handler.handle(&client, job).await;
            // Cancel before freeing the slot so a waiting dispatch sees it.
            if result.is_err() {
                token.cancel();
            }
            drop(permit);
            (key, result)
        });
        true
    }

    fn record(&mut self, finished: Result<HandlerOutcome, JoinError>) {
        let message = match finished {
            Ok((key, Ok(()))) => {
                trace!("Job {} handled", key);
                return;
            }
            Ok((key, Err(e))) => format!("job {}: {}", key, e),
            Err(e) => format!("handler task failed: {}", e),
        };

        error!("{}", message);
        self.token.cancel();
        self.fatal.get_or_insert(message);
    }

    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobClient;
    use async_trait::async_trait;
    use domath_core::{CompleteJobCommand, FailJobCommand, Job};
    use domath_gateway::{GatewayError, Topology};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockGateway {
        batches: Mutex<VecDeque<domath_gateway::Result<Vec<Job>>>>,
        requests: Mutex<Vec<ActivateJobsRequest>>,
        completed: Mutex<Vec<CompleteJobCommand>>,
    }

    impl MockGateway {
        fn with_batches(batches: Vec<domath_gateway::Result<Vec<Job>>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl GatewayClient for MockGateway {
        async fn topology(&self) -> domath_gateway::Result<Topology> {
            Ok(Topology::default())
        }

        async fn activate_jobs(&self, request: &ActivateJobsRequest) -> domath_gateway::Result<Vec<Job>> {
            self.requests.lock().unwrap().push(request.clone());
            self.batches.lock().unwrap().pop_front().unwrap_or(Ok(vec![]))
        }

        async fn complete_job(&self, command: &CompleteJobCommand) -> domath_gateway::Result<()> {
            self.completed.lock().unwrap().push(command.clone());
            Ok(())
        }

        async fn fail_job(&self, _command: &FailJobCommand) -> domath_gateway::Result<()> {
            Ok(())
        }
    }

    /// Completes every job; fails fatally on job keys listed in `fatal_on`.
    #[derive(Default)]
    struct CountingHandler {
        handled: AtomicUsize,
        fatal_on: Vec<i64>,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, client: &dyn JobClient, job: Job) -> Result<(), HandlerError> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            if self.fatal_on.contains(&job.key.get()) {
                return Err(HandlerError::Fatal("boom".to_string()));
            }
            client
                .complete_job(CompleteJobCommand::new(job.key))
                .await
                .map_err(|e| HandlerError::Fatal(e.to_string()))
        }
    }

    /// Sleeps before completing, to keep a slot busy for a while.
    struct SlowHandler {
        delay: Duration,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl SlowHandler {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobHandler for SlowHandler {
        async fn handle(&self, _client: &dyn JobClient, _job: Job) -> Result<(), HandlerError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Holds every job until `release` is notified.
    #[derive(Default)]
    struct BlockingHandler {
        started: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl JobHandler for BlockingHandler {
        async fn handle(&self, _client: &dyn JobClient, _job: Job) -> Result<(), HandlerError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(())
        }
    }

    fn fast_config() -> WorkerConfig {
        let mut config = WorkerConfig::new("DoMathTask");
        config.poll_interval = Duration::from_millis(5);
        config.backoff.initial = Duration::from_millis(5);
        config.backoff.max = Duration::from_millis(20);
        config.max_jobs_active = 4;
        config
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_delivers_jobs_and_closes() {
        let gateway = MockGateway::with_batches(vec![Ok(vec![
            Job::new(1, "DoMathTask", 3),
            Job::new(2, "DoMathTask", 3),
        ])]);
        let handler = Arc::new(CountingHandler::default());

        let worker = JobWorkerBuilder::new(gateway.clone())
            .config(fast_config())
            .handler(handler.clone())
            .open()
            .unwrap();

        wait_until(|| handler.handled.load(Ordering::SeqCst) == 2).await;
        worker.close();
        assert!(worker.is_closed());
        worker.await_close().await.unwrap();

        assert_eq!(gateway.completed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_requests_respect_capacity() {
        let gateway = MockGateway::with_batches(vec![]);
        let worker = JobWorkerBuilder::new(gateway.clone())
            .config(fast_config())
            .handler(Arc::new(CountingHandler::default()))
            .open()
            .unwrap();

        wait_until(|| gateway.requests.lock().unwrap().len() >= 2).await;
        worker.close();
        worker.await_close().await.unwrap();

        let requests = gateway.requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.max_jobs_to_activate <= 4));
        assert!(requests.iter().all(|r| r.job_type == "DoMathTask"));
    }

    #[tokio::test]
    async fn test_activation_errors_are_retried() {
        let gateway = MockGateway::with_batches(vec![
            Err(GatewayError::Status { status: 503, body: "unavailable".to_string() }),
            Err(GatewayError::Status { status: 503, body: "unavailable".to_string() }),
            Ok(vec![Job::new(5, "DoMathTask", 1)]),
        ]);
        let handler = Arc::new(CountingHandler::default());

        let worker = JobWorkerBuilder::new(gateway.clone())
            .config(fast_config())
            .handler(handler.clone())
            .open()
            .unwrap();

        wait_until(|| handler.handled.load(Ordering::SeqCst) == 1).await;
        worker.close();
        worker.await_close().await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_handler_error_stops_worker() {
        let gateway = MockGateway::with_batches(vec![Ok(vec![Job::new(9, "DoMathTask", 3)])]);
        let handler = Arc::new(CountingHandler {
            fatal_on: vec![9],
            ..Default::default()
        });

        let worker = JobWorkerBuilder::new(gateway)
            .config(fast_config())
            .handler(handler)
            .open()
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), worker.closed())
            .await
            .expect("worker did not stop");

        match worker.await_close().await {
            Err(WorkerError::Fatal(message)) => assert!(message.contains("job 9")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_stops_rest_of_batch() {
        let gateway = MockGateway::with_batches(vec![Ok(vec![
            Job::new(1, "DoMathTask", 3),
            Job::new(2, "DoMathTask", 3),
            Job::new(3, "DoMathTask", 3),
            Job::new(4, "DoMathTask", 3),
        ])]);
        let handler = Arc::new(CountingHandler {
            fatal_on: vec![1],
            ..Default::default()
        });
        let mut config = fast_config();
        config.max_jobs_active = 1;

        let worker = JobWorkerBuilder::new(gateway.clone())
            .config(config)
            .handler(handler.clone())
            .open()
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), worker.closed())
            .await
            .expect("worker did not stop");
        let result = worker.await_close().await;

        assert!(matches!(result, Err(WorkerError::Fatal(_))));
        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
        assert!(gateway.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_drains_in_flight_jobs() {
        let gateway = MockGateway::with_batches(vec![Ok(vec![Job::new(1, "DoMathTask", 3)])]);
        let handler = Arc::new(SlowHandler::new(Duration::from_millis(100)));

        let worker = JobWorkerBuilder::new(gateway)
            .config(fast_config())
            .handler(handler.clone())
            .open()
            .unwrap();

        wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;
        worker.close();
        assert_eq!(handler.finished.load(Ordering::SeqCst), 0);

        worker.await_close().await.unwrap();
        assert_eq!(handler.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_busy_slots_shrink_activation_requests() {
        let gateway = MockGateway::with_batches(vec![Ok(vec![Job::new(1, "DoMathTask", 3)])]);
        let handler = Arc::new(BlockingHandler::default());
        let mut config = fast_config();
        config.max_jobs_active = 3;

        let worker = JobWorkerBuilder::new(gateway.clone())
            .config(config)
            .handler(handler.clone())
            .open()
            .unwrap();

        wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;
        wait_until(|| gateway.requests.lock().unwrap().len() >= 3).await;

        {
            let requests = gateway.requests.lock().unwrap();
            assert_eq!(requests[0].max_jobs_to_activate, 3);
            assert!(requests[1..].iter().all(|r| r.max_jobs_to_activate == 2));
        }

        handler.release.notify_one();
        worker.close();
        worker.await_close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_requires_handler() {
        let gateway = MockGateway::with_batches(vec![]);
        let result = JobWorkerBuilder::new(gateway).open();
        assert!(matches!(result, Err(WorkerError::Config(_))));
    }

    #[tokio::test]
    async fn test_open_rejects_empty_job_type() {
        let gateway = MockGateway::with_batches(vec![]);
        let result = JobWorkerBuilder::new(gateway)
            .job_type("")
            .handler(Arc::new(CountingHandler::default()))
            .open();
        assert!(matches!(result, Err(WorkerError::Config(_))));
    }
}
