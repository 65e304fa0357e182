use crate::error::SkipReason;
use crate::metrics::MetricVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered messages sent to the model in one call
pub type Conversation = Vec<Message>;

/// Category of evaluation item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Factual question answering, optionally grounded in a context passage
    Qa,
    /// Short arithmetic and logic problems
    Reasoning,
    /// Condense a passage into a reference summary
    Summarization,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::Qa, Task::Reasoning, Task::Summarization];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Qa => "qa",
            Task::Reasoning => "reasoning",
            Task::Summarization => "summarization",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Task::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown task: {}", s))
    }
}

/// One sourced question or passage with its reference answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub id: String,
    #[serde(default)]
    pub question: Option<String>,
    /// Supporting passage for a question
    #[serde(default)]
    pub context: Option<String>,
    /// Passage to summarize
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "answers")]
    pub references: Vec<String>,
}

impl EvaluationItem {
    pub fn question(id: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: Some(question.into()),
            context: None,
            text: None,
            references: vec![answer.into()],
        }
    }

    pub fn passage(id: impl Into<String>, text: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: None,
            context: None,
            text: Some(text.into()),
            references: vec![summary.into()],
        }
    }

    /// Prompt-facing view of the item for `task`, or the field that is missing
    pub fn task_context(&self, task: Task) -> Result<TaskContext<'_>, SkipReason> {
        let body = match task {
            Task::Qa | Task::Reasoning => ItemBody::Question {
                question: self.required("question", self.question.as_deref())?,
                context: self.context.as_deref().filter(|c| !c.trim().is_empty()),
            },
            Task::Summarization => ItemBody::Passage {
                text: self.required("text", self.text.as_deref())?,
            },
        };
        Ok(TaskContext { task, body })
    }

    /// The reference answer used for scoring (the first one listed)
    pub fn reference(&self) -> Result<&str, SkipReason> {
        self.required(
            "references",
            self.references.first().map(String::as_str),
        )
    }

    fn required<'a>(&self, field: &'static str, value: Option<&'a str>) -> Result<&'a str, SkipReason> {
        match value {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(SkipReason::MalformedItem {
                item_id: self.id.clone(),
                field,
            }),
        }
    }
}

/// What a prompt strategy needs to know about an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext<'a> {
    pub task: Task,
    pub body: ItemBody<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemBody<'a> {
    Question {
        question: &'a str,
        context: Option<&'a str>,
    },
    Passage {
        text: &'a str,
    },
}

/// Successful gateway reply
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency: Duration,
}

/// Token and latency totals over the successful items of a triple
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_seconds: f64,
}

impl Usage {
    pub fn record(&mut self, input_tokens: u32, output_tokens: u32, latency: Duration) {
        self.input_tokens += u64::from(input_tokens);
        self.output_tokens += u64::from(output_tokens);
        self.latency_seconds += latency.as_secs_f64();
    }

    /// Mean gateway latency per call, 0 when nothing was recorded
    pub fn mean_latency(&self, calls: usize) -> f64 {
        if calls == 0 {
            0.0
        } else {
            self.latency_seconds / calls as f64
        }
    }
}

/// Averaged scores for one (model, task, technique) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub metrics: MetricVector,
    pub successful: usize,
    pub total: usize,
    /// False when no item could be scored; `metrics` is then all zeros
    pub has_data: bool,
    pub usage: Usage,
}

impl TaskResult {
    /// Turn running sums into a result, averaging over `successful`
    pub fn from_sums(sum: MetricVector, successful: usize, total: usize, usage: Usage) -> Self {
        if successful == 0 {
            return Self::empty(total);
        }
        Self {
            metrics: sum.averaged(successful),
            successful,
            total,
            has_data: true,
            usage,
        }
    }

    /// Result for a triple in which no item could be scored
    pub fn empty(total: usize) -> Self {
        Self {
            metrics: MetricVector::ZERO,
            successful: 0,
            total,
            has_data: false,
            usage: Usage::default(),
        }
    }
}
