use crate::dispatch::{Line, Report};
use colored::Colorize;

pub fn disable_color() {
    colored::control::set_override(false);
}

pub fn format_line(line: &Line) -> String {
    match line {
        Line::Heading(s) => format!("\n{}", s.bold().blue()),
        Line::Success(s) => format!("{} {}", "✓".green(), s.green()),
        Line::Info(s) => s.cyan().to_string(),
        Line::Warning(s) => format!("{} {}", "!".yellow(), s.yellow()),
        Line::Error(s) => format!("{} {}", "✗".red(), s.red()),
        Line::Hint(s) => format!("  {} {}", "hint:".yellow(), s),
        Line::Detail(s) => format!("  {}", s).dimmed().to_string(),
        Line::Text(s) => s.clone(),
    }
}

pub fn print_report(report: &Report) {
    for line in report.lines() {
        println!("{}", format_line(line));
    }
}

pub fn banner(app_name: &str, host: &str, model: &str) -> String {
    format!(
        "{} {}\n{}\n",
        app_name.bold().magenta(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed(),
        format!("backend {} | model {} | type `help` for commands, `exit` to quit", host, model).dimmed(),
    )
}

const COMMANDS: &[(&str, &str)] = &[
    ("help", "show this help"),
    ("version", "show the version"),
    ("status", "backend, model and working directory"),
    ("clear", "clear the screen"),
    ("pwd", "print the working directory"),
    ("cd <path>", "change the working directory"),
    ("test-ollama", "check the backend and list its models"),
    ("models", "list installed models"),
    ("scan", "detect the framework of the current project"),
    ("exit, quit, q, bye", "leave"),
];

const EXAMPLES: &[&str] = &[
    "create a REST API with JWT authentication",
    "add monolog logging",
    "generate a UserController with CRUD actions",
    "add validation to src/Controller/UserController.php",
    "analyze my code",
    "start the server",
    "how do I hash passwords in PHP?",
];

pub fn help() -> Report {
    let mut report = Report::default();
    report.heading("Commands");
    let width = COMMANDS.iter().map(|(c, _)| c.len()).max().unwrap_or(0);
    for (command, about) in COMMANDS {
        report.text(format!("  {:<width$}  {}", command, about, width = width));
    }
    report.heading("Or just describe what you want");
    for example in EXAMPLES {
        report.detail(*example);
    }
    report
}
