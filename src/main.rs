//! Purpose: `parsegate` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::aot::Shell;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

mod serve;

use parsegate::api::{
    Dataset, Error, ErrorKind, FileType, default_data_dir, parse_record, to_exit_code,
};

#[derive(Parser)]
#[command(
    name = "parsegate",
    version,
    about = "HTTP gateway that parses fixed-layout data files, locally or via a peer",
    after_help = r#"EXAMPLES
  $ parsegate parse books json
  $ parsegate parse books
  $ parsegate serve --bind 127.0.0.1:9700 --peer-url http://127.0.0.1:9701

NOTES
  - Data files live at <data-dir>/<set>/<set>.<ext> (default: ./data)
  - Supported sets: books, movies
  - Supported formats: txt, xml, yaml, json, csv"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        help = "Data directory (default: $PARSEGATE_DATA_DIR or ./data)",
        value_hint = ValueHint::DirPath
    )]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the HTTP gateway")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:9700", help = "Bind address (host:port)")]
        bind: String,
        #[arg(
            long,
            default_value = "http://127.0.0.1:9701",
            help = "Base URL of the peer gateway used in forward mode"
        )]
        peer_url: String,
        #[arg(
            long,
            default_value_t = 30_000,
            help = "Timeout for forwarded peer requests, in milliseconds"
        )]
        peer_timeout_ms: u64,
    },
    #[command(
        about = "Parse a data set locally and print the record as JSON",
        long_about = "Parse one file (set + format) or, with the format omitted, all five \
                      formats for the set. Per-format failures in all-formats mode are \
                      reported inline instead of aborting."
    )]
    Parse {
        #[arg(help = "Set name (books, movies)")]
        set: String,
        #[arg(help = "File type (txt, xml, yaml, json, csv); omit to parse all")]
        file_type: Option<String>,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);

    match cli.command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "parsegate", &mut std::io::stdout());
            Ok(())
        }
        Command::Parse { set, file_type } => {
            let dataset: Dataset = set.parse()?;
            let payload = match file_type {
                Some(file_type) => {
                    let file_type: FileType = file_type.parse()?;
                    let record = parse_record(&data_dir, dataset, file_type)?;
                    json!({
                        "set": dataset.as_str(),
                        "format": file_type.as_str(),
                        "data": record,
                    })
                }
                None => {
                    let mut result = serde_json::Map::new();
                    for file_type in FileType::ALL {
                        let entry = match parse_record(&data_dir, dataset, file_type) {
                            Ok(record) => Value::Object(record),
                            Err(err) => json!({ "error": err.to_string() }),
                        };
                        result.insert(file_type.as_str().to_string(), entry);
                    }
                    json!({ "set": dataset.as_str(), "data": result })
                }
            };
            emit_json(&payload)
        }
        Command::Serve {
            bind,
            peer_url,
            peer_timeout_ms,
        } => {
            let bind: SocketAddr = bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_hint("Use a host:port value like 127.0.0.1:9700.")
            })?;
            let config = serve::ServeConfig {
                bind,
                data_dir,
                peer_url,
                peer_timeout: Duration::from_millis(peer_timeout_ms),
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to start async runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))
        }
    }
}

fn emit_json(payload: &Value) -> Result<(), Error> {
    let rendered = serde_json::to_string_pretty(payload).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output json")
            .with_source(err)
    })?;
    println!("{rendered}");
    Ok(())
}

fn emit_error(err: &Error) {
    let mut body = serde_json::Map::new();
    body.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    if let Some(message) = err.message() {
        body.insert("message".to_string(), json!(message));
    }
    if let Some(path) = err.path() {
        body.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(hint) = err.hint() {
        body.insert("hint".to_string(), json!(hint));
    }
    eprintln!("{}", json!({ "error": body }));
}
