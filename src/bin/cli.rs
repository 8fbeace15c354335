use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use tracing_subscriber::EnvFilter;

use wirefold::{
    format_debug, format_headers_only, format_json, Message, ParseError, Parser, ParserConfig,
    ParserMode, ParserState, ResponseTemplate,
};

/// wirefold CLI: incremental HTTP/1.x message parser and response renderer.
///
/// Escape sequences (\r, \n, \t, \\) in --raw values are interpreted so you
/// can pass a full HTTP message as a single shell argument.
#[derive(ClapParser)]
#[command(name = "wirefold-cli", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse every HTTP message in the input and print each one.
    ///
    /// Reads from FILE, --raw, or stdin.
    Parse(ParseArgs),
    /// Render a JSON response description to HTTP wire bytes.
    Respond(RespondArgs),
}

#[derive(clap::Args)]
struct ParseArgs {
    /// Path to a file containing raw HTTP bytes.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Raw HTTP string (escape sequences \r \n \t \\ are expanded).
    #[arg(long)]
    raw: Option<String>,

    /// Grammar to parse with.
    #[arg(short, long, default_value = "both", value_enum)]
    mode: ModeArg,

    /// Output format.
    #[arg(short, long, default_value = "json", value_enum)]
    format: OutputFormat,

    /// Pretty-print JSON output (ignored for other formats).
    #[arg(short, long)]
    pretty: bool,

    /// Feed the input in pieces of this many bytes.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// JSON file with parser limits; flags below override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum allowed body size in bytes.
    #[arg(long)]
    max_body_size: Option<usize>,

    /// Maximum number of headers allowed.
    #[arg(long)]
    max_headers: Option<usize>,
}

#[derive(clap::Args)]
struct RespondArgs {
    /// Path to a JSON response description.
    #[arg(value_name = "TEMPLATE")]
    template: Option<PathBuf>,

    /// Inline JSON response description.
    #[arg(long)]
    raw: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Request,
    Response,
    Both,
}

impl From<ModeArg> for ParserMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Request => ParserMode::Request,
            ModeArg::Response => ParserMode::Response,
            ModeArg::Both => ParserMode::Both,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable debug output
    Debug,
    /// Start line + headers only
    Headers,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Command::Parse(args) => run_parse(&args),
        Command::Respond(args) => run_respond(&args),
    };
    process::exit(code);
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_parse(args: &ParseArgs) -> i32 {
    // When no input source is provided and stdin is a terminal (not piped),
    // show help instead of blocking.
    if args.file.is_none() && args.raw.is_none() && std::io::stdin().is_terminal() {
        Cli::command().print_help().ok();
        println!();
        return 0;
    }

    let data = match read_input(args.raw.as_deref(), args.file.as_deref()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            return 1;
        }
    };

    if data.is_empty() {
        eprintln!("Error: empty input");
        return 1;
    }

    let config = match load_config(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return 1;
        }
    };

    let chunk_size = args
        .chunk_size
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(data.len());

    let messages = match parse_all(&data, args.mode.into(), config, chunk_size) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Parse error: {e}");
            return 2;
        }
    };

    for message in &messages {
        let output = match args.format {
            OutputFormat::Json => format_json(message, args.pretty),
            OutputFormat::Debug => format_debug(message),
            OutputFormat::Headers => format_headers_only(message),
        };
        println!("{output}");
    }
    0
}

/// Feed `data` in `chunk_size` pieces, collecting every message it holds.
fn parse_all(
    data: &[u8],
    mode: ParserMode,
    config: ParserConfig,
    chunk_size: usize,
) -> Result<Vec<Message>, ParseError> {
    // Each message is taken before the bytes after it are fed.
    let config = ParserConfig {
        pause_on_complete: true,
        ..config
    };
    let mut parser = Parser::with_config(mode, config);
    let mut messages = Vec::new();

    for piece in data.chunks(chunk_size) {
        let mut rest = piece;
        while !rest.is_empty() {
            let consumed = parser.execute(rest)?;
            rest = &rest[consumed..];
            if parser.state() == ParserState::Complete {
                let keep_alive = parser.should_keep_alive();
                messages.extend(parser.take_message());
                if !keep_alive {
                    if !rest.is_empty() {
                        tracing::warn!(ignored = rest.len(), "bytes after a closing message");
                    }
                    return Ok(messages);
                }
            }
        }
    }

    parser.finish()?;
    messages.extend(parser.take_message());
    Ok(messages)
}

fn load_config(args: &ParseArgs) -> Result<ParserConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
        None => ParserConfig::default(),
    };
    if let Some(max) = args.max_body_size {
        config.max_body_size = max;
    }
    if let Some(max) = args.max_headers {
        config.max_headers_count = max;
    }
    Ok(config)
}

fn run_respond(args: &RespondArgs) -> i32 {
    let data = match read_input(args.raw.as_deref(), args.template.as_deref()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            return 1;
        }
    };

    let template: ResponseTemplate = match serde_json::from_slice(&data) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid response description: {e}");
            return 2;
        }
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(&template.to_bytes()).and_then(|()| stdout.flush()) {
        eprintln!("Error writing output: {e}");
        return 1;
    }
    0
}

/// Read input bytes from --raw, a file, or stdin.
fn read_input(raw: Option<&str>, file: Option<&Path>) -> Result<Vec<u8>, std::io::Error> {
    if let Some(raw) = raw {
        return Ok(unescape(raw).into_bytes());
    }
    match file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Expand C-style escape sequences (`\r`, `\n`, `\t`, `\\`) in a string.
///
/// Any other `\X` sequence is kept as-is (both the backslash and `X`).
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('r') => out.push('\r'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
