use anyhow::{bail, Context};
use colored::Colorize;
use dl_contract::{FileLedger, KeyValueLedger, Record, RecordService};
use serde_json::json;

use crate::cli::*;
use crate::config::CliConfig;

/// What a command produced, before it is rendered.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Done { message: String, height: u64 },
    Record(Record),
    Records(Vec<Record>),
    Exists { id: String, exists: bool },
    Payload(Vec<u8>),
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.ledger {
        config.ledger.path = path;
    }
    let path = config.ledger.path.clone();
    let ledger = FileLedger::open(config.ledger)
        .with_context(|| format!("failed to open ledger {}", path.display()))?;

    let outcome = execute(&ledger, cli.command)?;
    render(&outcome, &cli.format)
}

/// Run one command inside its own transaction, committing on success.
///
/// Any error drops the transaction, so nothing it wrote reaches the ledger.
pub fn execute(ledger: &FileLedger, command: Command) -> anyhow::Result<Outcome> {
    if let Command::Compact = command {
        ledger.compact()?;
        return Ok(Outcome::Done {
            message: "Ledger compacted".into(),
            height: ledger.height()?,
        });
    }

    let service = RecordService::new();
    let tx = ledger.begin();
    let outcome = apply(&service, &tx, command)?;
    let height = tx.commit().context("transaction rejected")?;

    Ok(match outcome {
        Outcome::Done { message, .. } => Outcome::Done { message, height },
        other => other,
    })
}

fn apply(service: &RecordService, tx: &dyn KeyValueLedger, command: Command) -> anyhow::Result<Outcome> {
    let done = |message: String| Outcome::Done { message, height: 0 };
    let outcome = match command {
        Command::Init => {
            service.init_ledger(tx)?;
            done("Ledger initialized with bootstrap data".into())
        }
        Command::Create(args) => {
            let record = record_from_args(args);
            service.create(tx, &record)?;
            done(format!("Created data {}", record.id))
        }
        Command::Read(args) => Outcome::Record(service.read(tx, &args.id)?),
        Command::Update(args) => {
            let record = record_from_args(args);
            service.update(tx, &record)?;
            done(format!("Updated data {}", record.id))
        }
        Command::Delete(args) => {
            service.delete(tx, &args.id)?;
            done(format!("Deleted data {}", args.id))
        }
        Command::Exists(args) => {
            let exists = service.exists(tx, &args.id)?;
            Outcome::Exists { id: args.id, exists }
        }
        Command::List => Outcome::Records(service.list_all(tx)?),
        Command::Invoke(args) => {
            let response = service.dispatch(tx, &args.function, args.args.as_slice());
            if !response.is_ok() {
                bail!("{} failed: {}", args.function, response.message);
            }
            Outcome::Payload(response.payload)
        }
        Command::Compact => bail!("compact cannot run inside a transaction"),
    };
    Ok(outcome)
}

fn record_from_args(args: RecordArgs) -> Record {
    Record {
        id: args.id,
        task_id: args.task_id,
        company_code: args.company_code,
        letter_number: args.letter_num,
        predicted_value: args.predict_value,
        predicted_deviation: args.predict_divation,
        f_value: args.f_value,
    }
}

fn render(outcome: &Outcome, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(outcome)?),
        OutputFormat::Text => render_text(outcome),
    }
    Ok(())
}

fn to_json(outcome: &Outcome) -> anyhow::Result<String> {
    let value = match outcome {
        Outcome::Done { message, height } => json!({ "status": "ok", "message": message, "height": height }),
        Outcome::Record(record) => serde_json::to_value(record)?,
        Outcome::Records(records) => serde_json::to_value(records)?,
        Outcome::Exists { id, exists } => json!({ "id": id, "exists": exists }),
        Outcome::Payload(payload) if payload.is_empty() => json!({ "status": "ok" }),
        Outcome::Payload(payload) => serde_json::from_slice(payload)?,
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn render_text(outcome: &Outcome) {
    match outcome {
        Outcome::Done { message, height } => {
            println!("{} {} {}", "✓".green().bold(), message, format!("(height {height})").dimmed());
        }
        Outcome::Record(record) => print_record(record),
        Outcome::Records(records) if records.is_empty() => println!("No data."),
        Outcome::Records(records) => {
            for record in records {
                println!(
                    "{}  task {}  company {}  {} {} {} {}",
                    record.id.yellow().bold(),
                    record.task_id,
                    record.company_code,
                    record.letter_number,
                    record.predicted_value.cyan(),
                    record.predicted_deviation,
                    record.f_value,
                );
            }
        }
        Outcome::Exists { id, exists: true } => println!("Data {} {}", id.yellow(), "exists".green()),
        Outcome::Exists { id, exists: false } => println!("Data {} {}", id.yellow(), "does not exist".red()),
        Outcome::Payload(payload) if payload.is_empty() => println!("{}", "✓".green().bold()),
        Outcome::Payload(payload) => println!("{}", String::from_utf8_lossy(payload)),
    }
}

fn print_record(record: &Record) {
    println!("Data {}", record.id.yellow().bold());
    println!("  Task:       {}", record.task_id);
    println!("  Company:    {}", record.company_code);
    println!("  Letter:     {}", record.letter_number);
    println!("  Predicted:  {}", record.predicted_value.cyan());
    println!("  Deviation:  {}", record.predicted_deviation);
    println!("  F value:    {}", record.f_value);
}
