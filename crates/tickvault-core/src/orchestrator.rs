//! Concurrent fan-out of fetch requests, keyed fan-in of results.
//!
//! The task group is explicit: every request is spawned, every task is
//! joined, and no task's failure cancels a sibling. The returned map always
//! has exactly one entry per requested source identity.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use crate::domain::{FetchRequest, FetchResult, Symbol};
use crate::fetch::SourceFetcher;

pub struct Orchestrator {
    parallelism: usize,
    deadline: Option<Duration>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            parallelism: 4,
            deadline: None,
        }
    }
}

impl Orchestrator {
    pub fn new(parallelism: usize, deadline: Option<Duration>) -> Self {
        Self {
            parallelism: parallelism.max(1),
            deadline,
        }
    }

    /// Execute all requests concurrently and block until every one has an
    /// outcome (or the optional overall deadline elapses, in which case the
    /// stragglers are aborted and recorded as failures).
    ///
    /// Requests are expected to carry distinct source identities; the result
    /// map is keyed by them.
    pub async fn run(
        &self,
        fetcher: Arc<SourceFetcher>,
        requests: Vec<FetchRequest>,
    ) -> BTreeMap<Symbol, FetchResult> {
        let mut results: BTreeMap<Symbol, FetchResult> = BTreeMap::new();
        if requests.is_empty() {
            return results;
        }

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks: JoinSet<(Symbol, FetchResult)> = JoinSet::new();

        for request in &requests {
            let request = request.clone();
            let fetcher = Arc::clone(&fetcher);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let symbol = request.source.symbol.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            symbol,
                            FetchResult::Failure {
                                reason: String::from("fetch slot unavailable"),
                                attempts: 0,
                            },
                        )
                    }
                };
                let result = fetcher.fetch(&request).await;
                (symbol, result)
            });
        }

        let deadline = self.deadline.map(|limit| Instant::now() + limit);
        let mut deadline_hit = false;

        while !tasks.is_empty() {
            let joined = match deadline {
                Some(at) => match timeout_at(at, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(
                            outstanding = tasks.len(),
                            "run deadline elapsed; aborting outstanding fetch tasks"
                        );
                        deadline_hit = true;
                        tasks.abort_all();
                        while tasks.join_next().await.is_some() {}
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            match joined {
                Some(Ok((symbol, result))) => {
                    results.insert(symbol, result);
                }
                Some(Err(join_error)) => {
                    // A panicking task loses its key here; the backfill pass
                    // below restores completeness for it.
                    tracing::error!(error = %join_error, "fetch task aborted");
                }
                None => break,
            }
        }

        for request in &requests {
            results
                .entry(request.source.symbol.clone())
                .or_insert_with(|| {
                    let reason = if deadline_hit {
                        "run deadline elapsed before fetch completed"
                    } else {
                        "fetch task terminated before producing a result"
                    };
                    FetchResult::Failure {
                        reason: reason.to_owned(),
                        attempts: 0,
                    }
                });
        }

        results
    }
}
