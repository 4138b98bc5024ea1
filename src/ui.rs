use colored::Colorize;
use stackgraph::{StackChange, StackOutcome, Value};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

/// Colored rendering of a slot value
///
/// Deferred outputs are shown in magenta so they stand out from literals.
pub fn value(value: &Value) -> String {
    match value {
        Value::Deferred(_) => value.to_string().magenta().to_string(),
        _ => truncate(&value.to_string(), 60),
    }
}

/// One-word label for a rollout outcome
pub fn outcome_label(outcome: &StackOutcome) -> String {
    match outcome {
        StackOutcome::Provisioned { .. } => "provisioned".green().to_string(),
        StackOutcome::Failed { .. } => "failed".red().bold().to_string(),
        StackOutcome::Skipped { .. } => "skipped".yellow().to_string(),
    }
}

/// Symbol and label for a plan diff entry
pub fn change_label(change: &StackChange) -> String {
    match change {
        StackChange::Added => format!("{} added", "+".green()),
        StackChange::Removed => format!("{} removed", "-".red()),
        StackChange::Changed { .. } => format!("{} changed", "~".yellow()),
        StackChange::Unchanged => format!("{} unchanged", "=".dimmed()),
    }
}

/// Cut a single-line rendering of `text` to at most `max_len` characters
pub fn truncate(text: &str, max_len: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let multiline = line.len() < text.trim_end().len();
    if line.chars().count() <= max_len && !multiline {
        line.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = line.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}
