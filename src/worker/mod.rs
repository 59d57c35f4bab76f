use crate::aggregator::FundingAggregator;
use crate::errors::ScanError;
use crate::models::{FundingQuote, FundingTable};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const QUEUE_CAPACITY: usize = 64;

enum Job {
    Scan {
        exchanges: Vec<String>,
        reply: oneshot::Sender<FundingTable>,
    },
    Ticker {
        ticker: String,
        exchanges: Vec<String>,
        reply: oneshot::Sender<Vec<FundingQuote>>,
    },
}

/// Background task that runs aggregations one job at a time.
pub struct ScanWorker;

impl ScanWorker {
    /// Starts the worker loop and returns the handle chat handlers submit through.
    /// The loop ends once every handle is dropped.
    pub fn spawn(aggregator: FundingAggregator, job_timeout: Duration) -> ScanHandle {
        let (tx, mut rx) = mpsc::channel::<Job>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            tracing::info!("Scan worker started");
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Scan { exchanges, reply } => {
                        let table = aggregator.collect(&exchanges).await;
                        if reply.send(table).is_err() {
                            tracing::warn!("Scan result dropped: requester gave up");
                        }
                    }
                    Job::Ticker {
                        ticker,
                        exchanges,
                        reply,
                    } => {
                        let rows = aggregator.collect_for_ticker(&ticker, &exchanges).await;
                        if reply.send(rows).is_err() {
                            tracing::warn!("[{ticker}] lookup result dropped: requester gave up");
                        }
                    }
                }
            }
            tracing::info!("Scan worker stopped");
        });

        ScanHandle { tx, job_timeout }
    }
}

/// Submits jobs to the worker. Each job carries its own reply channel, so a
/// caller only ever receives the result of the job it submitted.
#[derive(Clone)]
pub struct ScanHandle {
    tx: mpsc::Sender<Job>,
    job_timeout: Duration,
}

impl ScanHandle {
    pub async fn scan(&self, exchanges: Vec<String>) -> Result<FundingTable, ScanError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Scan { exchanges, reply }, rx).await
    }

    pub async fn scan_ticker(&self, ticker: &str, exchanges: Vec<String>) -> Result<Vec<FundingQuote>, ScanError> {
        let (reply, rx) = oneshot::channel();
        let job = Job::Ticker {
            ticker: ticker.to_string(),
            exchanges,
            reply,
        };
        self.submit(job, rx).await
    }

    async fn submit<T>(&self, job: Job, rx: oneshot::Receiver<T>) -> Result<T, ScanError> {
        // queue wait counts toward the job timeout
        let deadline = tokio::time::Instant::now() + self.job_timeout;

        tokio::time::timeout_at(deadline, self.tx.send(job))
            .await
            .map_err(|_| ScanError::Timeout(self.job_timeout))?
            .map_err(|_| ScanError::WorkerUnavailable)?;

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(ScanError::WorkerUnavailable),
            Err(_) => Err(ScanError::Timeout(self.job_timeout)),
        }
    }
}
