use crate::models::{EvaluationItem, Task};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Finite sequence of items for one task
pub type ItemStream = Box<dyn Iterator<Item = EvaluationItem> + Send>;

/// Supplies evaluation items per task
///
/// Every call returns a fresh sequence, so the same task can be evaluated
/// once per model and technique with identical items.
pub trait ItemSource: Send + Sync {
    fn items(&self, task: Task, sample_limit: usize, seed: u64) -> Result<ItemStream>;
}

/// Shuffle with a seeded generator and keep the first `sample_limit` items
fn seeded_sample(mut items: Vec<EvaluationItem>, sample_limit: usize, seed: u64) -> ItemStream {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    items.truncate(sample_limit);
    Box::new(items.into_iter())
}

/// Item sets compiled into the binary
#[derive(Debug, Clone)]
pub struct BuiltinItems {
    sets: HashMap<Task, Vec<EvaluationItem>>,
}

impl Default for BuiltinItems {
    fn default() -> Self {
        Self::empty()
            .with(Task::Qa, qa_items())
            .with(Task::Reasoning, reasoning_items())
            .with(Task::Summarization, summarization_items())
    }
}

impl BuiltinItems {
    /// No items for any task
    pub fn empty() -> Self {
        Self {
            sets: HashMap::new(),
        }
    }

    /// Replace the items for `task`
    pub fn with(mut self, task: Task, items: Vec<EvaluationItem>) -> Self {
        self.sets.insert(task, items);
        self
    }
}

impl ItemSource for BuiltinItems {
    fn items(&self, task: Task, sample_limit: usize, seed: u64) -> Result<ItemStream> {
        let items = self.sets.get(&task).cloned().unwrap_or_default();
        Ok(seeded_sample(items, sample_limit, seed))
    }
}

/// Items read from `<dir>/<task>.jsonl`, one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonlItems {
    dir: PathBuf,
}

impl JsonlItems {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, task: Task) -> PathBuf {
        self.dir.join(format!("{}.jsonl", task))
    }
}

impl ItemSource for JsonlItems {
    fn items(&self, task: Task, sample_limit: usize, seed: u64) -> Result<ItemStream> {
        let path = self.path_for(task);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read item file: {}", path.display()))?;

        Ok(seeded_sample(parse_jsonl(&path, &content), sample_limit, seed))
    }
}

fn parse_jsonl(path: &Path, content: &str) -> Vec<EvaluationItem> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(
                    "Skipping unparsable line {} in {}: {}",
                    index + 1,
                    path.display(),
                    e
                );
                None
            }
        })
        .collect()
}

fn qa_items() -> Vec<EvaluationItem> {
    vec![
        EvaluationItem::question("qa-1", "What is the capital of France?", "Paris"),
        EvaluationItem::question("qa-2", "Who wrote 'Romeo and Juliet'?", "William Shakespeare"),
        EvaluationItem::question("qa-3", "What is the chemical symbol for gold?", "Au"),
        EvaluationItem::question("qa-4", "What year did World War II end?", "1945"),
        EvaluationItem::question("qa-5", "What is the largest planet in our solar system?", "Jupiter"),
        EvaluationItem {
            context: Some(
                "The Amazon River in South America is the largest river by discharge volume of water \
                 in the world. It flows through Peru, Colombia and Brazil before emptying into the \
                 Atlantic Ocean."
                    .to_string(),
            ),
            ..EvaluationItem::question("qa-6", "Into which ocean does the Amazon River empty?", "the Atlantic Ocean")
        },
    ]
}

fn reasoning_items() -> Vec<EvaluationItem> {
    vec![
        EvaluationItem::question(
            "reasoning-1",
            "If a shirt costs $25 and is on sale for 20% off, what is the sale price?",
            "$20",
        ),
        EvaluationItem::question(
            "reasoning-2",
            "If a train travels at 60 miles per hour, how far will it travel in 2.5 hours?",
            "150 miles",
        ),
        EvaluationItem::question(
            "reasoning-3",
            "If x + y = 10 and x - y = 4, what is the value of x?",
            "7",
        ),
        EvaluationItem::question(
            "reasoning-4",
            "A box contains 3 red balls, 4 green balls, and 5 blue balls. What is the probability of drawing a red ball?",
            "0.25",
        ),
        EvaluationItem::question(
            "reasoning-5",
            "If today is Tuesday, what day will it be 100 days from now?",
            "Thursday",
        ),
    ]
}

fn summarization_items() -> Vec<EvaluationItem> {
    vec![
        EvaluationItem::passage(
            "summarization-1",
            "The International Space Station (ISS) is a modular space station in low Earth orbit. It is a \
             multinational collaborative project involving five participating space agencies: NASA (United \
             States), Roscosmos (Russia), JAXA (Japan), ESA (Europe), and CSA (Canada). The ownership and use \
             of the space station is established by intergovernmental treaties and agreements. The station \
             serves as a microgravity and space environment research laboratory in which scientific research \
             is conducted in astrobiology, astronomy, meteorology, physics, and other fields.",
            "The ISS is a multinational space station in low Earth orbit that serves as a microgravity \
             research lab for scientific studies across various fields.",
        ),
        EvaluationItem::passage(
            "summarization-2",
            "Climate change refers to long-term shifts in temperatures and weather patterns. These shifts \
             may be natural, but since the 1800s, human activities have been the main driver of climate \
             change, primarily due to the burning of fossil fuels like coal, oil, and gas, which produces \
             heat-trapping gases. The main sources of greenhouse gas emissions are electricity production, \
             agriculture, industry, transportation, and buildings. Mitigation strategies include using \
             renewable energy sources, improving energy efficiency, and changing consumption patterns.",
            "Climate change is a long-term shift in temperatures and weather driven mainly by human burning \
             of fossil fuels; it can be mitigated with renewable energy, efficiency and changed consumption.",
        ),
        EvaluationItem::passage(
            "summarization-3",
            "Quantum computing is a type of computation that harnesses the collective properties of quantum \
             states, such as superposition, interference, and entanglement, to perform calculations. The \
             devices that perform quantum computations are known as quantum computers. Though current \
             quantum computers are too small to outperform usual (classical) computers for practical \
             applications, they are believed to be capable of solving certain computational problems, such \
             as integer factorization, substantially faster than classical computers.",
            "Quantum computers use superposition, interference and entanglement to compute; they are still \
             too small for practical use but may solve problems like integer factorization much faster.",
        ),
        EvaluationItem::passage(
            "summarization-4",
            "The human genome is the complete set of nucleic acid sequences for humans, encoded as DNA \
             within the 23 chromosome pairs in cell nuclei and in a small DNA molecule found within \
             individual mitochondria. The Human Genome Project produced the first complete sequences of \
             individual human genomes. As of 2022, thousands of human genomes have been completely \
             sequenced, and many more have been mapped at lower levels of resolution. The resulting data \
             are used worldwide in biomedical science, anthropology, forensics, and other branches of science.",
            "The human genome is the full DNA sequence of humans; since the Human Genome Project thousands \
             of genomes have been sequenced and the data is used across biomedical and other sciences.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn ids(stream: ItemStream) -> Vec<String> {
        stream.map(|item| item.id).collect()
    }

    fn numbered(count: usize) -> Vec<EvaluationItem> {
        (0..count)
            .map(|i| EvaluationItem::question(format!("q{}", i), format!("Question {}?", i), "A"))
            .collect()
    }

    #[test]
    fn test_builtin_sets_are_well_formed() {
        let source = BuiltinItems::default();
        for task in Task::ALL {
            let items: Vec<_> = source.items(task, usize::MAX, 42).unwrap().collect();
            assert!(!items.is_empty(), "no items for {}", task);
            for item in &items {
                assert!(item.task_context(task).is_ok(), "{} is malformed", item.id);
                assert!(item.reference().is_ok());
            }
        }
    }

    #[test]
    fn test_sample_limit_caps_items() {
        let source = BuiltinItems::empty().with(Task::Qa, numbered(10));
        assert_eq!(source.items(Task::Qa, 3, 42).unwrap().count(), 3);
        assert_eq!(source.items(Task::Qa, 50, 42).unwrap().count(), 10);
    }

    #[test]
    fn test_same_seed_same_order() {
        let source = BuiltinItems::empty().with(Task::Qa, numbered(20));
        let first = ids(source.items(Task::Qa, 20, 7).unwrap());
        let second = ids(source.items(Task::Qa, 20, 7).unwrap());
        assert_eq!(first, second);

        let other_seed = ids(source.items(Task::Qa, 20, 8).unwrap());
        assert_ne!(first, other_seed);
    }

    #[test]
    fn test_missing_task_yields_no_items() {
        let source = BuiltinItems::empty();
        assert_eq!(source.items(Task::Reasoning, 5, 42).unwrap().count(), 0);
    }

    #[test]
    fn test_jsonl_source_drops_bad_lines() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("qa.jsonl")).unwrap();
        writeln!(file, r#"{{"id": "a", "question": "Q1?", "answers": ["A1"]}}"#).unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"id": "b", "question": "Q2?", "references": ["A2"]}}"#).unwrap();

        let source = JsonlItems::new(dir.path());
        let mut found = ids(source.items(Task::Qa, 10, 42).unwrap());
        found.sort();
        assert_eq!(found, vec!["a", "b"]);
    }

    #[test]
    fn test_jsonl_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = JsonlItems::new(dir.path());
        let err = source.items(Task::Summarization, 5, 42).err().unwrap();
        assert!(err.to_string().contains("summarization.jsonl"));
    }
}
