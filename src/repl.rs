//! Interactive shell.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use serde_json::Value;

use crate::engine::{Engine, ResultSet};
use crate::error::Result;
use crate::plan::ShowTables;
use crate::session::Context;

/// Shell configuration.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Prompt string.
    pub prompt: String,
    /// Show timing information.
    pub timing: bool,
    /// Max rows to display.
    pub max_rows: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "sql> ".into(),
            timing: true,
            max_rows: 100,
        }
    }
}

/// Reads statements terminated by `;` and prints their rows tab separated.
pub struct Repl {
    engine: Engine,
    config: ReplConfig,
    database: Option<String>,
}

impl Repl {
    pub fn new(engine: Engine) -> Self {
        Self::with_config(engine, ReplConfig::default())
    }

    pub fn with_config(engine: Engine, config: ReplConfig) -> Self {
        Self {
            engine,
            config,
            database: None,
        }
    }

    /// Run the shell until EOF or `.quit`.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut input = String::new();

        println!("Type .help for commands, or enter SQL statements terminated by ';'");
        loop {
            let prompt = if input.is_empty() {
                self.config.prompt.as_str()
            } else {
                "  -> "
            };
            print!("{}", prompt);
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                println!();
                break;
            }
            let line = line.trim_end();

            if input.is_empty() && is_command(line) {
                if self.handle_command(line.trim())? {
                    break;
                }
                continue;
            }
            if line.is_empty() && input.is_empty() {
                continue;
            }

            if !input.is_empty() {
                input.push(' ');
            }
            input.push_str(line);
            if !input.ends_with(';') {
                continue;
            }

            let sql = std::mem::take(&mut input);
            let mut out = stdout.lock();
            if let Err(e) = self.execute(&sql, &mut out) {
                eprintln!("Error: {}", e);
            }
        }

        Ok(())
    }

    /// Run one statement and write its result to `out`.
    pub fn execute(&self, sql: &str, out: &mut impl Write) -> Result<()> {
        let mut ctx = self.engine.context();
        if let Some(db) = &self.database {
            ctx = Context::new(db.clone()).with_id(ctx.id());
        }

        let start = Instant::now();
        let rs = self.engine.execute(&ctx, sql)?;
        print_result_set(&rs, self.config.max_rows, out)?;
        if self.config.timing {
            writeln!(out, "Time: {:.3}ms", start.elapsed().as_secs_f64() * 1000.0)?;
        }
        Ok(())
    }

    /// Returns true when the shell should exit.
    fn handle_command(&mut self, cmd: &str) -> Result<bool> {
        let cmd = cmd.trim_start_matches(&['.', '\\'][..]);
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        let command = parts.first().map(|s| s.to_lowercase());

        match command.as_deref() {
            Some("help") | Some("h") | Some("?") => print_help(),
            Some("quit") | Some("exit") | Some("q") => return Ok(true),
            Some("databases") => {
                for db in self.engine.catalog().databases() {
                    println!("{}", db.name());
                }
            }
            Some("use") => match parts.get(1) {
                Some(name) if self.engine.catalog().database(name).is_some() => {
                    self.database = Some(name.to_string());
                }
                Some(name) => eprintln!("Unknown database: {}", name),
                None => eprintln!("Usage: .use <database>"),
            },
            Some("tables") => {
                let ctx = self.engine.context();
                let name = self.database.as_deref().unwrap_or(ctx.current_database());
                match self.engine.catalog().database(name) {
                    Some(db) => {
                        let show = ShowTables::new(Some(name.to_string())).bind(db);
                        for row in show.rows() {
                            println!("{}", format_row(&row));
                        }
                    }
                    None => eprintln!("No database selected"),
                }
            }
            Some("explain") => {
                let sql = parts[1..].join(" ");
                if sql.is_empty() {
                    eprintln!("Usage: .explain <sql>");
                } else {
                    match self.engine.explain(&self.engine.context(), &sql) {
                        Ok(plan) => print!("{}", plan),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
            }
            Some("processes") => {
                for p in self.engine.processes().list() {
                    println!("{}\t{}\t{}", p.id, p.started.to_rfc3339(), p.query);
                }
            }
            Some("timing") => {
                self.config.timing = !self.config.timing;
                println!("Timing: {}", if self.config.timing { "on" } else { "off" });
            }
            Some(cmd) => {
                eprintln!("Unknown command: .{}", cmd);
                eprintln!("Type .help for available commands");
            }
            None => {}
        }

        Ok(false)
    }
}

fn is_command(input: &str) -> bool {
    input.starts_with('.') || input.starts_with('\\')
}

fn print_help() {
    println!("Commands:");
    println!("  .help, .h, .?           Show this help message");
    println!("  .quit, .exit, .q        Exit the shell");
    println!("  .databases              List databases");
    println!("  .use <database>         Change the current database");
    println!("  .tables                 List tables of the current database");
    println!("  .explain <sql>          Show the analyzed plan");
    println!("  .processes              List running queries");
    println!("  .timing                 Toggle timing display");
    println!();
    println!("SQL Statements:");
    println!("  SELECT cols FROM t[, t2] [WHERE ...] [GROUP BY ...] [ORDER BY ...] [LIMIT n] [OFFSET n]");
    println!("  SHOW TABLES [FROM db]");
    println!("  DESCRIBE t");
    println!("  SHOW CREATE TABLE t");
    println!("  KILL [QUERY|CONNECTION] id");
    println!();
}

/// Write a header line, then one tab separated line per row.
pub fn print_result_set(rs: &ResultSet, max_rows: usize, out: &mut impl Write) -> io::Result<()> {
    if rs.schema.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", rs.columns().join("\t"))?;

    let limit = rs.len().min(max_rows);
    for row in rs.iter().take(limit) {
        writeln!(out, "{}", format_row(row))?;
    }
    if rs.len() > limit {
        writeln!(out, "... ({} more rows)", rs.len() - limit)?;
    }
    writeln!(out, "({} rows)", rs.len())
}

fn format_row(row: &[Value]) -> String {
    row.iter().map(format_value).collect::<Vec<_>>().join("\t")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}
