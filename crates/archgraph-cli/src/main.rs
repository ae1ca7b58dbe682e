use archgraph_core::{
    ArchConfig, Catalog, CatalogData, Engine, Graph, MatchKind, ParseSource, ParsedArchitecture,
    ServiceDefinition,
};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ARCHGRAPH_LOG";

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Core(archgraph_core::Error),
    Json(serde_json::Error),
    NoDiagram,
    NoMatch(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Core(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::NoDiagram => write!(
                f,
                "Input is not a diagram payload (expected an object with a `services` array)"
            ),
            CliError::NoMatch(query) => write!(f, "No catalog entry matches [{query}]"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<archgraph_core::Error> for CliError {
    fn from(value: archgraph_core::Error) -> Self {
        Self::Core(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Message,
    Structured,
    Text,
    Extract,
    Nodes,
    Iac,
    Resolve,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    pretty: bool,
    verbose: bool,
    catalog: Option<String>,
    config: Option<String>,
}

#[derive(Serialize)]
struct MessageOut {
    source: ParseSource,
    architecture: ParsedArchitecture,
    graph: Graph,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveOut<'a> {
    query: &'a str,
    kind: MatchKind,
    definition: &'a ServiceDefinition,
}

fn usage() -> &'static str {
    "archgraph\n\
\n\
USAGE:\n\
  archgraph [message] [--pretty] [<path>|-]\n\
  archgraph structured [--pretty] [<path>|-]\n\
  archgraph text [--pretty] [<path>|-]\n\
  archgraph extract [--pretty] [<path>|-]\n\
  archgraph nodes [--pretty] [<path>|-]\n\
  archgraph iac [--pretty] [<path>|-]\n\
  archgraph resolve <query>\n\
\n\
OPTIONS:\n\
  --catalog <path>   JSON or YAML catalog overlay (services, aliases, relationships)\n\
  --config <path>    JSON or YAML config merged onto the defaults\n\
  --verbose, -v      debug logging on stderr\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - message picks the structured path when the reply embeds a diagram payload, else the text path.\n\
  - nodes parses like message and prints the flat node/edge graph.\n\
  - Logging honours the ARCHGRAPH_LOG filter (e.g. ARCHGRAPH_LOG=archgraph_core=trace).\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();
    let mut command_seen = false;

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        let command = match a.as_str() {
            "message" => Some(Command::Message),
            "structured" => Some(Command::Structured),
            "text" => Some(Command::Text),
            "extract" => Some(Command::Extract),
            "nodes" => Some(Command::Nodes),
            "iac" => Some(Command::Iac),
            "resolve" => Some(Command::Resolve),
            _ => None,
        };
        if let Some(command) = command.filter(|_| !command_seen && args.input.is_none()) {
            args.command = command;
            command_seen = true;
            continue;
        }

        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--catalog" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.catalog = Some(path.clone());
            }
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if args.command == Command::Resolve && args.input.is_none() {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "archgraph_core=debug,archgraph=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn is_yaml(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

fn build_engine(args: &Args) -> Result<Engine, CliError> {
    let mut engine = Engine::new();
    if let Some(path) = args.config.as_deref() {
        let text = std::fs::read_to_string(path)?;
        let config = if is_yaml(path) {
            ArchConfig::from_yaml_str(&text)?
        } else {
            ArchConfig::from_json_str(&text)?
        };
        engine = engine.with_config(config);
    }
    if let Some(path) = args.catalog.as_deref() {
        let text = std::fs::read_to_string(path)?;
        let overlay = if is_yaml(path) {
            CatalogData::from_yaml_str(&text)?
        } else {
            CatalogData::from_json_str(&text)?
        };
        let catalog = Catalog::builtin().extend(overlay, path)?;
        tracing::debug!(path, services = catalog.len(), "catalog overlay applied");
        engine = engine.with_catalog(Arc::new(catalog));
    }
    Ok(engine)
}

fn run(args: Args) -> Result<(), CliError> {
    let engine = build_engine(&args)?;

    if args.command == Command::Resolve {
        let query = args.input.as_deref().unwrap_or_default();
        let Some(resolution) = engine.catalog().resolve_with_kind(query) else {
            return Err(CliError::NoMatch(query.to_string()));
        };
        return write_json(
            &ResolveOut {
                query,
                kind: resolution.kind,
                definition: resolution.definition,
            },
            args.pretty,
        );
    }

    let text = read_input(args.input.as_deref())?;
    match args.command {
        Command::Message => {
            let parsed = engine.parse_message(&text);
            let graph = engine.build_graph(&parsed.architecture);
            write_json(
                &MessageOut {
                    source: parsed.source,
                    architecture: parsed.architecture,
                    graph,
                },
                args.pretty,
            )
        }
        Command::Structured => {
            let payload: serde_json::Value = serde_json::from_str(&text)?;
            let arch = engine.parse_structured(&payload).ok_or(CliError::NoDiagram)?;
            write_json(&arch, args.pretty)
        }
        Command::Text => write_json(&engine.parse_text(&text), args.pretty),
        Command::Extract => write_json(&engine.extract_text(&text), args.pretty),
        Command::Nodes => {
            let parsed = engine.parse_message(&text);
            write_json(&engine.build_graph(&parsed.architecture), args.pretty)
        }
        Command::Iac => write_json(&engine.extract_iac(&text), args.pretty),
        Command::Resolve => Ok(()),
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => {}
        Err(err @ (CliError::NoDiagram | CliError::NoMatch(_))) => {
            eprintln!("{err}");
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("archgraph")
            .chain(items.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn default_command_is_message_from_stdin() {
        let args = parse_args(&argv(&[])).unwrap();
        assert_eq!(args.command, Command::Message);
        assert_eq!(args.input, None);
    }

    #[test]
    fn command_words_after_the_input_are_paths() {
        let args = parse_args(&argv(&["nodes", "--pretty", "text"])).unwrap();
        assert_eq!(args.command, Command::Nodes);
        assert_eq!(args.input.as_deref(), Some("text"));
        assert!(args.pretty);
    }

    #[test]
    fn options_take_values() {
        let args = parse_args(&argv(&[
            "--catalog", "c.yaml", "--config", "x.json", "-v", "-",
        ]))
        .unwrap();
        assert_eq!(args.catalog.as_deref(), Some("c.yaml"));
        assert_eq!(args.config.as_deref(), Some("x.json"));
        assert!(args.verbose);
        assert_eq!(args.input.as_deref(), Some("-"));
        assert!(is_yaml("c.yaml"));
        assert!(!is_yaml("x.json"));
    }

    #[test]
    fn bad_arguments_are_usage_errors() {
        assert!(matches!(parse_args(&argv(&["--bogus"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_args(&argv(&["--catalog"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_args(&argv(&["a", "b"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_args(&argv(&["resolve"])), Err(CliError::Usage(_))));
    }
}
