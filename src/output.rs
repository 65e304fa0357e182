use crate::metrics::MetricVector;
use crate::models::Task;
use crate::results::{FrozenResults, ResultEntry};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print evaluation results in the specified format
pub fn print_results(results: &FrozenResults, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_plain(results)),
        OutputFormat::Json => print_json(results),
    }
}

const HEADER: [&str; 6] = ["F1", "BLEU", "ROUGE-1", "ROUGE-2", "ROUGE-L", "Substr"];
const LABEL_WIDTH: usize = 18;
const CELL_WIDTH: usize = 8;
/// Width of the metric cells, each preceded by a space, minus the first space
const METRICS_WIDTH: usize = HEADER.len() * (CELL_WIDTH + 1) - 1;

fn metric_header(first: &str) -> String {
    let names: String = HEADER
        .iter()
        .map(|name| format!(" {:<width$}", name, width = CELL_WIDTH))
        .collect();
    format!("{:<width$}{}", first, names, width = LABEL_WIDTH)
}

fn metric_cells(metrics: &MetricVector) -> String {
    metrics
        .named()
        .iter()
        .map(|(_, value)| format!(" {:<width$.3}", value, width = CELL_WIDTH))
        .collect()
}

/// Render results as plain text tables, one block per model
pub fn render_plain(results: &FrozenResults) -> String {
    PlainReport(results).to_string()
}

struct PlainReport<'a>(&'a FrozenResults);

impl fmt::Display for PlainReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let results = self.0;
        if results.is_empty() {
            return writeln!(f, "No results were recorded.");
        }

        let models = results.models();
        for (i, model) in models.iter().enumerate() {
            writeln!(f, "=== {} ===", model)?;
            writeln!(f)?;

            let entries: Vec<&ResultEntry> = results.iter().filter(|e| e.model == *model).collect();
            for task in tasks_of(&entries) {
                write_task_table(f, &entries, task)?;
            }
            write_summary(f, &entries)?;

            if i < models.len() - 1 {
                writeln!(f)?;
                writeln!(f, "{}", "=".repeat(50))?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn write_task_table(
    f: &mut fmt::Formatter<'_>,
    entries: &[&ResultEntry],
    task: Task,
) -> fmt::Result {
    writeln!(f, "📋 {}", task.as_str().to_uppercase())?;
    let header = format!(
        "{} {:<width$} {:<width$} {}",
        metric_header("Technique"),
        "Items",
        "Tokens",
        "Latency",
        width = CELL_WIDTH
    );
    writeln!(f, "{}", header)?;
    writeln!(f, "{}", "-".repeat(header.len()))?;

    for entry in entries.iter().filter(|e| e.task == task) {
        let result = &entry.result;
        let items = format!("{}/{}", result.successful, result.total);
        if result.has_data {
            let usage = &result.usage;
            writeln!(
                f,
                "{:<label$}{} {:<cell$} {:<cell$} {:.2}s",
                entry.technique.as_str(),
                metric_cells(&result.metrics),
                items,
                usage.input_tokens + usage.output_tokens,
                usage.mean_latency(result.successful),
                label = LABEL_WIDTH,
                cell = CELL_WIDTH
            )?;
        } else {
            writeln!(
                f,
                "{:<label$} {:<metrics$} {}",
                entry.technique.as_str(),
                "no data",
                items,
                label = LABEL_WIDTH,
                metrics = METRICS_WIDTH
            )?;
        }
    }
    writeln!(f)
}

fn write_summary(f: &mut fmt::Formatter<'_>, entries: &[&ResultEntry]) -> fmt::Result {
    writeln!(f, "📊 SUMMARY (mean over techniques with data)")?;
    let header = metric_header("Task");
    writeln!(f, "{}", header)?;
    writeln!(f, "{}", "-".repeat(header.len()))?;
    for task in tasks_of(entries) {
        match task_average(entries, task) {
            Some(average) => writeln!(
                f,
                "{:<width$}{}",
                task.as_str(),
                metric_cells(&average),
                width = LABEL_WIDTH
            )?,
            None => writeln!(f, "{:<width$} no data", task.as_str(), width = LABEL_WIDTH)?,
        }
    }
    Ok(())
}

/// Tasks in the order they were first recorded
fn tasks_of(entries: &[&ResultEntry]) -> Vec<Task> {
    let mut tasks = Vec::new();
    for entry in entries {
        if !tasks.contains(&entry.task) {
            tasks.push(entry.task);
        }
    }
    tasks
}

/// Mean metrics for `task` over the techniques that produced data
fn task_average(entries: &[&ResultEntry], task: Task) -> Option<MetricVector> {
    let mut sum = MetricVector::ZERO;
    let mut count = 0;
    for entry in entries.iter().filter(|e| e.task == task && e.result.has_data) {
        sum += entry.result.metrics;
        count += 1;
    }
    (count > 0).then(|| sum.averaged(count))
}

/// Print results in JSON format
fn print_json(results: &FrozenResults) {
    match serde_json::to_string_pretty(results) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Error serializing results to JSON: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskResult, Usage};
    use crate::prompts::Technique;
    use crate::results::ResultMatrix;
    use std::time::Duration;

    fn scored(f1: f64) -> TaskResult {
        let sum = MetricVector {
            f1,
            bleu: 0.5,
            rouge1: 0.5,
            rouge2: 0.25,
            rouge_l: 0.5,
            substring_match: 1.0,
        };
        let mut usage = Usage::default();
        usage.record(10, 5, Duration::from_millis(500));
        TaskResult::from_sums(sum, 1, 2, usage)
    }

    fn create_test_results() -> FrozenResults {
        let mut matrix = ResultMatrix::new();
        matrix
            .record("gpt-4o-mini", Task::Qa, Technique::Standard, scored(0.8))
            .unwrap();
        matrix
            .record("gpt-4o-mini", Task::Qa, Technique::FewShot, scored(0.4))
            .unwrap();
        matrix
            .record("gpt-4o-mini", Task::Qa, Technique::React, TaskResult::empty(2))
            .unwrap();
        matrix
            .record("gpt-3.5-turbo", Task::Reasoning, Technique::Standard, TaskResult::empty(2))
            .unwrap();
        matrix.freeze()
    }

    #[test]
    fn test_plain_output_lists_models_and_techniques() {
        let text = render_plain(&create_test_results());

        assert!(text.contains("=== gpt-4o-mini ==="));
        assert!(text.contains("=== gpt-3.5-turbo ==="));
        assert!(text.contains("📋 QA"));
        assert!(text.contains("📋 REASONING"));
        assert!(text.contains("few_shot"));
        assert!(text.contains("1/2"));
        assert!(text.find("gpt-4o-mini").unwrap() < text.find("gpt-3.5-turbo").unwrap());
    }

    #[test]
    fn test_plain_output_flags_missing_data() {
        let text = render_plain(&create_test_results());
        let react_line = text.lines().find(|l| l.starts_with("react")).unwrap();
        assert!(react_line.contains("no data"));
        assert!(react_line.contains("0/2"));
        assert!(text.lines().any(|l| l.starts_with("reasoning") && l.contains("no data")));
    }

    #[test]
    fn test_summary_averages_techniques_with_data() {
        let results = create_test_results();
        let entries: Vec<&ResultEntry> = results.iter().collect();

        let average = task_average(&entries, Task::Qa).unwrap();
        assert!((average.f1 - 0.6).abs() < 1e-9);
        assert!(task_average(&entries, Task::Reasoning).is_none());

        let text = render_plain(&results);
        let summary_line = text.lines().find(|l| l.starts_with("qa ")).unwrap();
        assert!(summary_line.contains("0.600"));
    }

    #[test]
    fn test_plain_output_shows_usage_and_latency() {
        let text = render_plain(&create_test_results());
        assert!(text.lines().any(|l| l.starts_with("Technique") && l.ends_with("Latency")));

        let standard_line = text.lines().find(|l| l.starts_with("standard")).unwrap();
        assert!(standard_line.contains(" 15 "));
        assert!(standard_line.ends_with("0.50s"));
    }

    #[test]
    fn test_plain_output_columns_line_up() {
        let text = render_plain(&create_test_results());
        let standard_line = text.lines().find(|l| l.starts_with("standard")).unwrap();
        let react_line = text.lines().find(|l| l.starts_with("react")).unwrap();
        let header = text.lines().find(|l| l.starts_with("Technique")).unwrap();

        let items_column = header.find("Items").unwrap();
        assert_eq!(standard_line.find("1/2"), Some(items_column));
        assert_eq!(react_line.find("0/2"), Some(items_column));
    }

    #[test]
    fn test_empty_results() {
        let results = ResultMatrix::new().freeze();
        assert_eq!(render_plain(&results), "No results were recorded.\n");
    }

    #[test]
    fn test_json_output() {
        // This test mainly ensures the JSON serialization doesn't panic
        print_json(&create_test_results());
    }

    #[test]
    fn test_print_results_formats() {
        let results = create_test_results();
        print_results(&results, OutputFormat::Plain);
        print_results(&results, OutputFormat::Json);
    }
}
