use anyhow::{Context, Result};
use std::io::{self, Write};

/// Read a line of input from the terminal.
///
/// Returns `None` once stdin is closed.
pub fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }

    // Trim whitespace and newlines
    Ok(Some(input.trim().to_string()))
}

pub fn print_header(title: &str) {
    println!("\n== {} ==", title);
}

pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

pub fn print_error(message: &str) {
    println!("❌ {}", message);
}

pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
