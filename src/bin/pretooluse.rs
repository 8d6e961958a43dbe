use anyhow::{Context, Result};
use std::io::{self, Read, Write};
use std::sync::Arc;

use tool_correction_hooks::config::{self, LoadedConfig};
use tool_correction_hooks::{logging, Decision, Evaluation, Interceptor, JsonFileStore};

/// PreToolUse hook: block unknown tool names, rewrite parameters, or stay silent.
///
/// Always exits 0. Anything that prevents a confident decision results in no
/// output, which the agent treats as allow.
#[tokio::main]
async fn main() -> Result<()> {
    let LoadedConfig { config, warnings } = config::load_config();
    logging::init(&config);
    config::report_warnings(&warnings);

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        tracing::warn!(error = %e, "failed to read hook payload, allowing");
        return Ok(());
    }

    let store = Arc::new(JsonFileStore::new(&config.rules_file));
    let interceptor = Interceptor::new(store, config);

    match interceptor.evaluate_with_budget(input).await {
        Evaluation::Done(decision) => {
            if let Err(e) = emit(&decision) {
                tracing::warn!(error = %e, "failed to write hook response");
            }
            Ok(())
        }
        Evaluation::TimedOut => {
            // The blocking store read may still be running; do not wait for it.
            let _ = io::stdout().flush();
            std::process::exit(0);
        }
    }
}

fn emit(decision: &Decision) -> Result<()> {
    let Some(output) = decision.to_output() else {
        return Ok(());
    };
    let json = serde_json::to_string(&output).context("Failed to serialize output")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json).context("Failed to write stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
