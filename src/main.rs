//! bookhaven command-line shell

use std::env;
use std::process::ExitCode;

use bookhaven::{
    Authenticator, Console, ConsoleConfig, ConsoleError, ConsoleResult, CrudEngine, RowSet,
    SearchOutcome, StaffAuthenticator, TableGroup,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: bookhaven [--json] <command>
  tables
  list <table>
  search <table> <term>
  add <table> <column=value>...
  edit <table> <key> <column=value>...
  delete <table> <key> --yes

credentials: BOOKHAVEN_EMAIL, BOOKHAVEN_PASSWORD
database:    BOOKHAVEN_DATABASE_URL";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (args, flags) = split_flags(env::args().skip(1));
    if args.is_empty() || flags.iter().any(|f| f == "--help" || f == "-h") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(&args, &flags).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String], flags: &[String]) -> ConsoleResult<()> {
    let json = flags.iter().any(|f| f == "--json");
    let config = ConsoleConfig::from_env()?;
    let console = Console::bootstrap(&config).await?;

    let email = env::var("BOOKHAVEN_EMAIL").unwrap_or_default();
    let password = env::var("BOOKHAVEN_PASSWORD").unwrap_or_default();
    let session = StaffAuthenticator::new(console.provider().clone())
        .authenticate(&email, &password)
        .await?;
    tracing::info!(user = %session.banner(), "signed in");
    let engine = console.engine(session);

    match arg(args, 0)? {
        "tables" => print_tables(&engine),
        "list" => print_rows(&engine.list(arg(args, 1)?).await?, json),
        "search" => match engine.search(arg(args, 1)?, &rest(args, 2).join(" ")).await? {
            SearchOutcome::Matches(rows) => {
                print_rows(&rows, json);
                eprintln!("Found {} record(s)", rows.len());
            }
            SearchOutcome::NoResults => eprintln!("No records found"),
        },
        "add" => {
            let fields = assignments(rest(args, 2))?;
            let rows = engine.create(arg(args, 1)?, &fields).await?;
            eprintln!("Record added!");
            print_rows(&rows, json);
        }
        "edit" => {
            let table = arg(args, 1)?;
            let key = arg(args, 2)?;
            let record = engine.record(table, key).await?;
            let mut form = engine.edit_form(table, &record).await?;
            for (column, value) in assignments(rest(args, 3))? {
                if !form.set(&column, Some(value)) {
                    return Err(ConsoleError::UnknownColumn {
                        table: table.to_string(),
                        column,
                    });
                }
            }
            let rows = engine.update(table, &form.key_value, &form.values()).await?;
            eprintln!("Record updated!");
            print_rows(&rows, json);
        }
        "delete" => {
            let confirmed = flags.iter().any(|f| f == "--yes");
            let rows = engine.delete(arg(args, 1)?, arg(args, 2)?, confirmed).await?;
            eprintln!("Record deleted!");
            print_rows(&rows, json);
        }
        other => {
            return Err(ConsoleError::InvalidConfig(format!(
                "unknown command {other}\n{USAGE}"
            )));
        }
    }
    Ok(())
}

/// Splits `--flag` and `-h` arguments from positional ones, keeping order.
fn split_flags(args: impl IntoIterator<Item = String>) -> (Vec<String>, Vec<String>) {
    args.into_iter()
        .partition(|a| !(a.starts_with("--") || a == "-h"))
}

fn arg(args: &[String], idx: usize) -> ConsoleResult<&str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| ConsoleError::InvalidConfig(format!("missing argument\n{USAGE}")))
}

fn rest(args: &[String], from: usize) -> &[String] {
    args.get(from..).unwrap_or(&[])
}

/// `column=value` pairs; the value may be empty.
fn assignments(args: &[String]) -> ConsoleResult<Vec<(String, String)>> {
    args.iter()
        .map(|a| {
            a.split_once('=')
                .map(|(c, v)| (c.to_string(), v.to_string()))
                .ok_or_else(|| ConsoleError::InvalidConfig(format!("expected column=value, got {a}")))
        })
        .collect()
}

fn print_tables(engine: &CrudEngine) {
    println!("Welcome, {}!", engine.session().banner());
    for group in [TableGroup::Tables, TableGroup::Relationships] {
        println!("{group:?}:");
        for entry in engine.visible_tables().iter().filter(|e| e.group == group) {
            let caps = engine.capabilities(&entry.table);
            let flags: String = [
                (caps.view, 'v'),
                (caps.add, 'a'),
                (caps.edit, 'e'),
                (caps.delete, 'd'),
            ]
            .iter()
            .map(|(on, c)| if *on { *c } else { '-' })
            .collect();
            println!("  {flags}  {:<22} {}", entry.table, entry.title);
        }
    }
}

fn print_rows(rows: &RowSet, json: bool) {
    if json {
        match serde_json::to_string_pretty(rows) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("error: {e}"),
        }
        return;
    }
    println!("{}", rows.columns.join("\t"));
    for record in &rows.rows {
        println!("{}", record.display_values().join("\t"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(args: &[&str]) -> (Vec<String>, Vec<String>) {
        split_flags(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn flags_do_not_shift_positional_arguments() {
        let (args, flags) = split(&["delete", "member", "--yes", "5"]);
        assert_eq!(args, ["delete", "member", "5"]);
        assert_eq!(flags, ["--yes"]);
        assert_eq!(arg(&args, 2).unwrap(), "5");

        let (args, flags) = split(&["--json", "list", "book"]);
        assert_eq!(args, ["list", "book"]);
        assert_eq!(flags, ["--json"]);
    }

    #[test]
    fn assignments_need_an_equals_sign() {
        let (args, _) = split(&["add", "member", "fname=Ann", "--yes", "phone="]);
        assert_eq!(
            assignments(rest(&args, 2)).unwrap(),
            [
                ("fname".to_string(), "Ann".to_string()),
                ("phone".to_string(), String::new())
            ]
        );
        assert!(assignments(&["fname".to_string()]).is_err());
    }
}
