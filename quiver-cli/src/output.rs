//! Styled terminal output utilities.

use owo_colors::OwoColorize;
use quiver_migrate::{MigrationEvent, MigrationObserver};

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.len()).dimmed());
    println!();
}

/// Print a section header
pub fn section(text: &str) {
    println!("{}", text.bold().white());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// Print a resource being created
pub fn added(text: &str) {
    println!("  {} {}", "+".green().bold(), text);
}

/// Print a resource being deleted
pub fn removed(text: &str) {
    println!("  {} {}", "-".red().bold(), text);
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print dimmed text
pub fn dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Style text as success (green)
pub fn style_success(text: &str) -> String {
    text.green().to_string()
}

/// Style text as pending (yellow)
pub fn style_pending(text: &str) -> String {
    text.yellow().to_string()
}

/// Style text as error (red)
pub fn style_error(text: &str) -> String {
    text.red().to_string()
}

/// Renders migration progress on the terminal.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl MigrationObserver for ConsoleObserver {
    fn on_event(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::MigrationStarted { name } => {
                newline();
                println!("Applying migration `{}`", name.green());
                newline();
            }
            MigrationEvent::Deleting(resource) => dim(&format!("  Deleting {resource}...")),
            MigrationEvent::Deleted(resource) => success(&format!("Deleted {resource}")),
            MigrationEvent::Creating(resource) => dim(&format!("  Creating {resource}...")),
            MigrationEvent::Created(resource) => success(&format!("Created {resource}")),
            MigrationEvent::StepFailed { resource, reason } => {
                error(&format!("Failed on {resource}: {reason}"));
            }
            MigrationEvent::RollbackStarted { steps } => {
                warn(&format!("Attempting to roll back {steps} change(s)..."));
            }
            MigrationEvent::RollbackStepFailed { resource, reason } => {
                error(&format!("Rollback of {resource} failed: {reason}"));
            }
            MigrationEvent::RollbackFinished { succeeded, failed } => {
                if *failed == 0 {
                    success(&format!("Rolled back {succeeded} change(s)"));
                } else {
                    warn(&format!(
                        "Rolled back {succeeded} change(s), {failed} could not be rolled back"
                    ));
                }
            }
            MigrationEvent::MigrationSucceeded { name } => {
                success(&format!("Applied migration `{name}`"));
            }
            MigrationEvent::MigrationErrored { name, .. } => {
                error(&format!("Migration `{name}` failed"));
            }
        }
    }
}
