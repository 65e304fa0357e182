use crate::config::{self, RunConfig};
use crate::error::{RecordError, SkipReason};
use crate::gateway::Gateway;
use crate::items::ItemSource;
use crate::metrics::{self, MetricVector};
use crate::models::{Completion, EvaluationItem, Task, TaskResult, Usage};
use crate::normalize::normalize;
use crate::prompts::{PromptStrategy, Technique};
use crate::results::{FrozenResults, ResultMatrix};
use crate::retry::{RetryOutcome, RetryPolicy};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// What happened to a single item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Scored {
        metrics: MetricVector,
        completion: Completion,
    },
    Skipped(SkipReason),
}

/// Drives models, tasks and techniques through the gateway and scores the replies
pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    items: Arc<dyn ItemSource>,
    retry: RetryPolicy,
    sample_limit: usize,
    seed: u64,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn Gateway>, items: Arc<dyn ItemSource>, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            items,
            retry,
            sample_limit: config::default_sample_limit(),
            seed: config::default_seed(),
            concurrency: config::default_concurrency(),
        }
    }

    pub fn from_config(config: &RunConfig, gateway: Arc<dyn Gateway>, items: Arc<dyn ItemSource>) -> Self {
        Self::new(gateway, items, RetryPolicy::from_config(&config.retry))
            .with_sample_limit(config.sample_limit)
            .with_seed(config.seed)
            .with_concurrency(config.concurrency)
    }

    pub fn with_sample_limit(mut self, sample_limit: usize) -> Self {
        self.sample_limit = sample_limit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of triples evaluated at once; results keep cross-product order
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Evaluate every (model, task, technique) combination in that nesting order
    pub async fn run(
        &self,
        models: &[String],
        tasks: &[Task],
        techniques: &[Technique],
    ) -> Result<FrozenResults, RecordError> {
        let triples: Vec<(&str, Task, Technique)> = models
            .iter()
            .flat_map(|model| {
                tasks.iter().flat_map(move |&task| {
                    techniques
                        .iter()
                        .map(move |&technique| (model.as_str(), task, technique))
                })
            })
            .collect();
        let total = triples.len();

        let mut evaluations = stream::iter(triples.into_iter().enumerate())
            .map(|(index, (model, task, technique))| async move {
                tracing::info!(
                    "Evaluating {} on {} with {} ({}/{})",
                    model,
                    task,
                    technique,
                    index + 1,
                    total
                );
                let result = self.evaluate(model, task, technique).await;
                (model, task, technique, result)
            })
            .buffered(self.concurrency);

        let mut matrix = ResultMatrix::new();
        while let Some((model, task, technique, result)) = evaluations.next().await {
            matrix.record(model, task, technique, result)?;
        }
        Ok(matrix.freeze())
    }

    /// Average scores of `model` on up to `sample_limit` items of `task` prompted with `technique`
    pub async fn evaluate(&self, model: &str, task: Task, technique: Technique) -> TaskResult {
        let items = match self.items.items(task, self.sample_limit, self.seed) {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("Could not load {} items: {:#}", task, e);
                return TaskResult::empty(0);
            }
        };

        let mut sum = MetricVector::ZERO;
        let mut usage = Usage::default();
        let mut successful = 0;
        let mut total = 0;

        for item in items.take(self.sample_limit) {
            total += 1;
            match self.evaluate_item(model, task, technique, &item).await {
                ItemOutcome::Scored {
                    metrics,
                    completion,
                } => {
                    sum += metrics;
                    usage.record(
                        completion.input_tokens,
                        completion.output_tokens,
                        completion.latency,
                    );
                    successful += 1;
                }
                ItemOutcome::Skipped(reason) => {
                    tracing::warn!(
                        "Skipped item {} ({} / {} / {}): {}",
                        item.id,
                        model,
                        task,
                        technique,
                        reason
                    );
                }
            }
        }

        let result = TaskResult::from_sums(sum, successful, total, usage);
        if result.has_data {
            tracing::info!(
                "{} / {} / {}: {}/{} items scored, f1 {:.3}, rougeL {:.3}",
                model,
                task,
                technique,
                successful,
                total,
                result.metrics.f1,
                result.metrics.rouge_l
            );
        } else {
            tracing::warn!(
                "{} / {} / {}: no item could be scored ({} attempted)",
                model,
                task,
                technique,
                total
            );
        }
        result
    }

    async fn evaluate_item(
        &self,
        model: &str,
        task: Task,
        technique: Technique,
        item: &EvaluationItem,
    ) -> ItemOutcome {
        let context = match item.task_context(task) {
            Ok(context) => context,
            Err(reason) => return ItemOutcome::Skipped(reason),
        };
        let reference = match item.reference() {
            Ok(reference) => reference,
            Err(reason) => return ItemOutcome::Skipped(reason),
        };

        let conversation = technique.build(&context);

        let completion = match self.retry.complete(self.gateway.as_ref(), model, &conversation).await {
            RetryOutcome::Success(completion) => completion,
            RetryOutcome::Failure { kind, attempts } => {
                return ItemOutcome::Skipped(SkipReason::Gateway { kind, attempts });
            }
        };

        if completion.text.trim().is_empty() {
            return ItemOutcome::Skipped(SkipReason::EmptyResponse);
        }

        let metrics = metrics::score(&normalize(reference), &normalize(&completion.text));
        tracing::debug!("Item {} scored {:?}", item.id, metrics);

        ItemOutcome::Scored {
            metrics,
            completion,
        }
    }
}
