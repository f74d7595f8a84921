use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::commands::{CommandOutput, CommandResult};
use crate::error::CliError;

/// Metadata wrapped around every JSON answer.
#[derive(Debug, Serialize)]
struct Meta {
    request_id: String,
    generated_at: String,
    degraded: bool,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Envelope {
    meta: Meta,
    data: Value,
}

pub fn render(result: CommandResult, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match result.output {
        CommandOutput::Text(text) => {
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            out.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                out.write_all(b"\n")?;
            }
        }
        CommandOutput::Json(data) => {
            let envelope = Envelope {
                meta: Meta {
                    request_id: Uuid::new_v4().to_string(),
                    generated_at: OffsetDateTime::now_utc()
                        .format(&Rfc3339)
                        .unwrap_or_default(),
                    degraded: result.degraded,
                    warnings: result.warnings,
                },
                data,
            };
            let payload = if pretty {
                serde_json::to_string_pretty(&envelope)?
            } else {
                serde_json::to_string(&envelope)?
            };
            writeln!(out, "{payload}")?;
        }
    }

    out.flush()?;
    Ok(())
}
