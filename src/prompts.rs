use crate::models::{Conversation, ItemBody, Message, Task, TaskContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Builds the messages sent to a model for one item
pub trait PromptStrategy {
    fn build(&self, ctx: &TaskContext<'_>) -> Conversation;
}

/// Prompting technique used to elicit a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// Single instruction followed by the item
    Standard,
    /// Worked examples precede the item
    FewShot,
    /// Reason step by step before answering
    ChainOfThought,
    /// Several independent solutions reconciled into one answer
    SelfConsistency,
    /// Answer in the voice of a topic expert
    RolePrompting,
    /// Thought, Action, Observation, Answer
    React,
}

impl Technique {
    pub const ALL: [Technique; 6] = [
        Technique::Standard,
        Technique::FewShot,
        Technique::ChainOfThought,
        Technique::SelfConsistency,
        Technique::RolePrompting,
        Technique::React,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::Standard => "standard",
            Technique::FewShot => "few_shot",
            Technique::ChainOfThought => "chain_of_thought",
            Technique::SelfConsistency => "self_consistency",
            Technique::RolePrompting => "role_prompting",
            Technique::React => "react",
        }
    }

    fn system_prompt(&self, task: Task) -> &'static str {
        match self {
            Technique::Standard | Technique::FewShot => match task {
                Task::Summarization => {
                    "You are a helpful assistant that writes concise, accurate summaries \
                     that keep the key facts of the original text."
                }
                Task::Qa | Task::Reasoning => {
                    "You are a helpful assistant. Give direct, concise answers without explanations."
                }
            },
            Technique::ChainOfThought => {
                "You are a helpful assistant that solves problems step by step. \
                 Show your reasoning first, then state the final answer on its own line."
            }
            Technique::SelfConsistency => {
                "You are a helpful assistant that solves every problem in three independent ways. \
                 Compare the three results, reconcile any disagreement, and finish with a single final answer."
            }
            Technique::RolePrompting => persona(task),
            Technique::React => {
                "You are a helpful assistant that follows the ReAct protocol for every request:\n\
                 1. Thought: analyze what is being asked\n\
                 2. Action: decide what needs to be done\n\
                 3. Observation: note the relevant information\n\
                 4. Answer: give the final answer"
            }
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technique {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Technique::ALL
            .into_iter()
            .find(|technique| technique.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown prompting technique: {}", s))
    }
}

impl PromptStrategy for Technique {
    fn build(&self, ctx: &TaskContext<'_>) -> Conversation {
        let mut messages = vec![Message::system(self.system_prompt(ctx.task))];

        if *self == Technique::FewShot {
            for example in few_shot_examples(ctx.task) {
                messages.push(Message::user(render(&example.body)));
                messages.push(Message::assistant(example.answer));
            }
        }

        messages.push(Message::user(render(&ctx.body)));
        messages
    }
}

fn persona(task: Task) -> &'static str {
    match task {
        Task::Qa => "You are an expert researcher with deep, broad knowledge across many fields.",
        Task::Reasoning => {
            "You are a mathematics professor who excels at breaking complex problems into simple steps."
        }
        Task::Summarization => {
            "You are a senior editor who distills long articles into faithful, precise summaries."
        }
    }
}

/// User-facing text for an item body
fn render(body: &ItemBody<'_>) -> String {
    match body {
        ItemBody::Question {
            question,
            context: Some(context),
        } => format!("Context: {}\n\nQuestion: {}\n\nAnswer:", context, question),
        ItemBody::Question {
            question,
            context: None,
        } => format!("Question: {}\n\nAnswer:", question),
        ItemBody::Passage { text } => format!("Summarize the following text:\n\n{}", text),
    }
}

struct Example {
    body: ItemBody<'static>,
    answer: &'static str,
}

fn question(question: &'static str, answer: &'static str) -> Example {
    Example {
        body: ItemBody::Question {
            question,
            context: None,
        },
        answer,
    }
}

fn few_shot_examples(task: Task) -> Vec<Example> {
    match task {
        Task::Qa => vec![
            question("What is the capital of Spain?", "Madrid"),
            question("Who wrote 'Hamlet'?", "William Shakespeare"),
            question("What is the chemical symbol for silver?", "Ag"),
        ],
        Task::Reasoning => vec![
            question(
                "If a book costs $30 and is on sale for 10% off, what is the sale price?",
                "10% of $30 is $3, and $30 - $3 = $27. The sale price is $27.",
            ),
            question(
                "If a car travels at 50 miles per hour, how far will it travel in 2 hours?",
                "Distance is speed times time: 50 x 2 = 100. It travels 100 miles.",
            ),
        ],
        Task::Summarization => vec![
            Example {
                body: ItemBody::Passage {
                    text: "The Great Wall of China is a series of walls and fortifications in northern \
                           China. It is not one continuous wall but a collection of walls built by \
                           different dynasties, mainly to protect Chinese states from nomadic invasions.",
                },
                answer: "The Great Wall of China is a set of defensive walls in northern China built \
                         by several dynasties to guard against nomadic invasions.",
            },
            Example {
                body: ItemBody::Passage {
                    text: "Photosynthesis is the process by which plants convert light energy into \
                           chemical energy. It takes place in the chloroplasts of plant cells using \
                           chlorophyll, requires sunlight, carbon dioxide and water, and produces \
                           glucose and oxygen.",
                },
                answer: "Photosynthesis is how plants use chlorophyll to turn sunlight, carbon \
                         dioxide and water into glucose and oxygen.",
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn qa_context() -> TaskContext<'static> {
        TaskContext {
            task: Task::Qa,
            body: ItemBody::Question {
                question: "What is the capital of France?",
                context: None,
            },
        }
    }

    fn roles(conversation: &Conversation) -> Vec<Role> {
        conversation.iter().map(|m| m.role).collect()
    }

    #[test]
    fn test_technique_names_round_trip() {
        for technique in Technique::ALL {
            assert_eq!(technique.as_str().parse::<Technique>().unwrap(), technique);
            let json = serde_json::to_string(&technique).unwrap();
            assert_eq!(json, format!("\"{}\"", technique.as_str()));
        }
        assert!("tree_of_thought".parse::<Technique>().is_err());
    }

    #[test]
    fn test_standard_prompt() {
        let conversation = Technique::Standard.build(&qa_context());
        assert_eq!(roles(&conversation), vec![Role::System, Role::User]);
        assert_eq!(
            conversation[1].content,
            "Question: What is the capital of France?\n\nAnswer:"
        );
    }

    #[test]
    fn test_question_with_context() {
        let ctx = TaskContext {
            task: Task::Qa,
            body: ItemBody::Question {
                question: "Where did the cat sit?",
                context: Some("The cat sat on the mat."),
            },
        };
        let conversation = Technique::Standard.build(&ctx);
        assert!(conversation[1].content.starts_with("Context: The cat sat on the mat."));
        assert!(conversation[1].content.contains("Question: Where did the cat sit?"));
    }

    #[test]
    fn test_few_shot_prepends_examples() {
        let conversation = Technique::FewShot.build(&qa_context());
        assert_eq!(
            roles(&conversation),
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
            ]
        );
        assert_eq!(conversation[2].content, "Madrid");
        assert!(conversation.last().unwrap().content.contains("capital of France"));
    }

    #[test]
    fn test_few_shot_summarization_examples() {
        let ctx = TaskContext {
            task: Task::Summarization,
            body: ItemBody::Passage { text: "Some article." },
        };
        let conversation = Technique::FewShot.build(&ctx);
        assert_eq!(conversation.len(), 6);
        assert!(conversation[1].content.starts_with("Summarize the following text:"));
        assert_eq!(
            conversation[5].content,
            "Summarize the following text:\n\nSome article."
        );
    }

    #[test]
    fn test_system_scaffolding_per_technique() {
        let ctx = qa_context();
        let system = |technique: Technique| technique.build(&ctx)[0].content.clone();

        assert!(system(Technique::ChainOfThought).contains("step by step"));
        assert!(system(Technique::SelfConsistency).contains("three independent ways"));
        assert!(system(Technique::RolePrompting).contains("expert researcher"));
        let react = system(Technique::React);
        for stage in ["Thought:", "Action:", "Observation:", "Answer:"] {
            assert!(react.contains(stage), "missing {}", stage);
        }
    }

    #[test]
    fn test_role_persona_depends_on_task() {
        let ctx = TaskContext {
            task: Task::Reasoning,
            body: ItemBody::Question {
                question: "If x + y = 10 and x - y = 4, what is x?",
                context: None,
            },
        };
        let conversation = Technique::RolePrompting.build(&ctx);
        assert!(conversation[0].content.contains("mathematics professor"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let ctx = qa_context();
        for technique in Technique::ALL {
            assert_eq!(technique.build(&ctx), technique.build(&ctx));
        }
    }
}
