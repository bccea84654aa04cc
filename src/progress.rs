use console::style;

/// Print a numbered pipeline step header.
pub fn step(n: u32, total: u32, msg: &str) {
    println!("\n{} {msg}", style(format!("[Step {n}/{total}]")).cyan());
}

/// Print an indented detail line under the current step.
pub fn note(msg: &str) {
    println!("  {msg}");
}

/// Print a warning that does not stop the run.
pub fn warn(msg: &str) {
    println!("  {} {msg}", style("Warning:").yellow());
}
