//! JSON output for the CLI
//!
//! Every command prints exactly one JSON object on stdout. Logs go to
//! stderr.

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

fn success(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

fn failure(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

fn emit(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    emit(&success(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    emit(&failure(code, message))
}
