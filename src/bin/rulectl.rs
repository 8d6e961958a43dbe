use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tool_correction_hooks::config::{self, Config, LoadedConfig};
use tool_correction_hooks::{
    logging, preview_line, Decision, HookInput, Interceptor, JsonFileStore, MatchKind, Rule,
    RuleKey, RuleStore,
};

/// Manage the correction rules read by the `pretooluse` hook
#[derive(Parser)]
#[command(name = "rulectl", version, about)]
struct Cli {
    /// Rules file to operate on (overrides TOOLFIX_RULES_FILE and config files)
    #[arg(long, global = true)]
    rules_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a rule, or update the target/message of an existing one
    Add {
        #[command(flatten)]
        key: KeyArgs,
        /// Replacement: tool name, flag, command, literal or full recipe
        #[arg(long)]
        to: String,
        /// Explanation shown to the agent when the rule fires
        #[arg(long)]
        message: Option<String>,
    },
    /// Remove the rule with exactly this key
    Remove {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// List rules in the order they are applied
    List {
        /// Only rules for this tool
        #[arg(long)]
        tool: Option<String>,
        /// Print JSON instead of one line per rule
        #[arg(long)]
        json: bool,
    },
    /// Dry-run the hook against a tool call without executing anything
    Check {
        /// Tool name of the simulated call
        #[arg(long)]
        tool: String,
        /// Tool input as a JSON object, e.g. '{"command": "grep -r x"}'
        #[arg(long, default_value = "{}")]
        input: String,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// Pattern to match: tool name, flag, command, literal, regex or recipe prefix
    #[arg(long)]
    from: String,
    /// Tool whose input is corrected (empty for tool-name aliases)
    #[arg(long, default_value = "")]
    tool: String,
    /// Parameter of the tool input to correct
    #[arg(long, default_value = "")]
    param: String,
    /// Shell command the rule is scoped to
    #[arg(long, default_value = "")]
    command: String,
    /// alias, literal, flag, command, regex or recipe
    #[arg(long)]
    kind: Option<MatchKind>,
}

impl KeyArgs {
    fn match_kind(&self) -> Result<MatchKind> {
        match self.kind {
            Some(kind) => Ok(kind),
            None if self.tool.is_empty() && self.param.is_empty() && self.command.is_empty() => {
                Ok(MatchKind::Alias)
            }
            None => bail!("--kind is required for parameter rules"),
        }
    }

    fn key(&self) -> Result<RuleKey> {
        Ok(RuleKey {
            from: self.from.clone(),
            tool: self.tool.clone(),
            param: self.param.clone(),
            command: self.command.clone(),
            match_kind: self.match_kind()?,
        })
    }

    fn into_rule(self, to: String, message: Option<String>) -> Result<Rule> {
        let match_kind = self.match_kind()?;
        let mut rule = Rule::correction(self.tool, self.param, match_kind, self.from, to)
            .scoped_to(self.command);
        rule.message = message.filter(|m| !m.trim().is_empty());
        Ok(rule)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let LoadedConfig {
        config: mut config,
        warnings,
    } = config::load_config();
    if let Some(path) = cli.rules_file.clone() {
        config.rules_file = path;
    }
    config.log_filter = match cli.verbose {
        0 => config.log_filter,
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    logging::init(&config);
    config::report_warnings(&warnings);

    let store = Arc::new(JsonFileStore::new(&config.rules_file));
    match cli.command {
        Commands::Add { key, to, message } => add(store.as_ref(), key, to, message),
        Commands::Remove { key } => remove(store.as_ref(), key),
        Commands::List { tool, json } => list(store.as_ref(), tool.as_deref(), json),
        Commands::Check { tool, input } => check(store, config, tool, &input),
    }
}

fn add(store: &JsonFileStore, key: KeyArgs, to: String, message: Option<String>) -> Result<()> {
    let rule = key.into_rule(to, message)?;
    rule.validate().context("Refusing to store invalid rule")?;

    let described = rule.key().to_string();
    store
        .upsert(rule)
        .with_context(|| format!("Failed to write {}", store.path().display()))?;
    println!("saved {}", described);
    Ok(())
}

fn remove(store: &JsonFileStore, key: KeyArgs) -> Result<()> {
    let key = key.key()?;
    let removed = store
        .delete(&key)
        .with_context(|| format!("Failed to update {}", store.path().display()))?;
    if !removed {
        bail!("no rule matches {}", key);
    }
    println!("removed {}", key);
    Ok(())
}

fn list(store: &JsonFileStore, tool: Option<&str>, json: bool) -> Result<()> {
    let rules: Vec<Rule> = store
        .list()
        .with_context(|| format!("Failed to read {}", store.path().display()))?
        .into_iter()
        .filter(|rule| tool.map_or(true, |t| rule.tool == t))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    if rules.is_empty() {
        println!("no rules in {}", store.path().display());
        return Ok(());
    }
    for rule in &rules {
        println!(
            "{}  ->  {}",
            rule.key(),
            preview_line(&rule.to, 60)
        );
    }
    Ok(())
}

fn check(store: Arc<JsonFileStore>, config: Config, tool: String, input: &str) -> Result<()> {
    let tool_input: HashMap<String, serde_json::Value> =
        serde_json::from_str(input).context("--input must be a JSON object")?;
    let hook_input = HookInput {
        tool_name: tool,
        tool_input,
        session_id: None,
        transcript_path: None,
        cwd: None,
        hook_event_name: Some("PreToolUse".to_string()),
    };

    let interceptor = Interceptor::new(store, config);
    let decision = interceptor.evaluate(&hook_input);
    match &decision {
        Decision::Allow => println!("allow (no change)"),
        Decision::Block { message } => println!("block: {}", message),
        Decision::Rewrite { corrections } => {
            println!("allow with rewrite:");
            for c in corrections {
                println!("  {}: {:?} -> {:?}", c.param, c.original, c.corrected);
                for d in &c.descriptions {
                    println!("    - {}", d);
                }
            }
        }
    }
    if let Some(output) = decision.to_output() {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
