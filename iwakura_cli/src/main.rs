use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use codesnake::{Block, CodeWidth, Label, LineIndex};
use iwakura::{
    generate, parse, run_with, scan_spanned, Error, Iwakura, SearchPath, Span, TemplateSource,
    Token, Value, Vars,
};
use tracing::info;
use yansi::Paint;

#[derive(Parser, Debug)]
#[command(name = "iwakura", version, about = "Render [% templates %]")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a template from the search path to stdout
    Render {
        name: String,
        /// Directory to look for templates in, searched in order (default: `.`)
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,
        /// Bind a variable: integers and `nil` are parsed, anything else is text
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
        /// Print the token stream to stderr
        #[arg(long)]
        tokens: bool,
        /// Print the compiled program to stderr
        #[arg(long)]
        disasm: bool,
    },
    /// Render each line typed as a template
    Repl,
}

#[derive(Debug, Default, Clone, Copy)]
struct Diagnostics {
    tokens: bool,
    disasm: bool,
}

fn parse_assignment(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, found `{arg}`"))?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_value(raw: &str) -> Value {
    if raw == "nil" {
        Value::Nil
    } else if let Ok(int) = raw.parse::<i64>() {
        Value::Integer(int)
    } else {
        Value::from(raw)
    }
}

// Enable with `RUST_LOG=iwakura=debug` or `RUST_LOG=iwakura=trace`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

/// Runs each phase separately so the intermediate forms can be shown
fn render_staged(text: &str, vars: &Vars, show: Diagnostics) -> Result<String, Error> {
    let spanned = scan_spanned(text)?;
    if show.tokens {
        for (token, span) in &spanned {
            eprintln!("{} {token:?}", format!("[{span:?}]").dim());
        }
    }
    let tokens: Vec<Token> = spanned.into_iter().map(|(token, _)| token).collect();
    let program = generate(&parse(&tokens)?);
    if show.disasm {
        eprint!("{program}");
    }
    Ok(run_with(&program, vars)?)
}

/// Renders `name` through the engine, or phase by phase when diagnostics are on
fn render_template<S: TemplateSource>(
    engine: &Iwakura<S>,
    name: &str,
    vars: &Vars,
    show: Diagnostics,
) -> Result<String, Error> {
    info!(name, ?show, "rendering template");
    if show.tokens || show.disasm {
        let text = engine.load(name)?;
        render_staged(&text, vars, show)
    } else {
        engine.render(name, vars)
    }
}

fn make_block<'a>(idx: &'a LineIndex, span: Span, message: String) -> Option<Block<&'a str, String>> {
    Block::new(
        idx,
        [Label::new(span)
            .with_text(message.red().to_string())
            .with_style(|s| s.red().bold().to_string())],
    )
}

/// Where in the line an error points, if anywhere
fn error_span(src: &str, err: &Error) -> Option<Span> {
    match err {
        Error::Scan(err) => Some(err.span()),
        Error::Syntax(err) => {
            let tokens = scan_spanned(src).ok()?;
            // errors at the end of input point at the last token
            let (_, span) = tokens.get(err.position()).or(tokens.last())?;
            Some(span.clone())
        }
        _ => None,
    }
}

fn report(src: &str, err: &Error) {
    let idx = LineIndex::new(src);
    let block = error_span(src, err).and_then(|span| make_block(&idx, span, err.to_string()));
    match block {
        Some(block) => {
            let block = block.map_code(|c| CodeWidth::new(c, c.len()));
            println!("{}[repl]", block.prologue());
            print!("{block}");
            println!("{}", block.epilogue());
        }
        None => println!("{}", err.red()),
    }
}

/// What a line typed into the REPL turned out to be
#[derive(Debug, PartialEq, Eq)]
enum ReplLine {
    /// Render it as a template
    Template,
    /// A `:` command, with the feedback to print
    Command(String),
    Quit,
}

fn repl_command(line: &str, show: &mut Diagnostics, vars: &mut Vars) -> ReplLine {
    let on_off = |on: bool| if on { "on" } else { "off" };
    match line.trim() {
        ":tokens" => {
            show.tokens = !show.tokens;
            ReplLine::Command(format!("token display {}", on_off(show.tokens)))
        }
        ":disasm" => {
            show.disasm = !show.disasm;
            ReplLine::Command(format!("disassembly {}", on_off(show.disasm)))
        }
        ":quit" => ReplLine::Quit,
        cmd if cmd.starts_with(":set ") => {
            match parse_assignment(cmd.trim_start_matches(":set ").trim()) {
                Ok((key, value)) => {
                    let message = format!("{key} = {value}");
                    vars.insert(key, parse_value(&value));
                    ReplLine::Command(message)
                }
                Err(err) => ReplLine::Command(err),
            }
        }
        _ => ReplLine::Template,
    }
}

fn repl() -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    let mut show = Diagnostics::default();
    let mut vars = Vars::new();
    info!("starting repl");

    while let Ok(input) = readline.readline(">> ") {
        readline.add_history_entry(input.as_str())?;
        match repl_command(&input, &mut show, &mut vars) {
            ReplLine::Template => match render_staged(&input, &vars, show) {
                Ok(output) => println!("{output}"),
                Err(err) => report(&input, &err),
            },
            ReplLine::Command(feedback) => println!("{}", feedback.dim()),
            ReplLine::Quit => break,
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            name,
            include,
            set,
            tokens,
            disasm,
        } => {
            let search = if include.is_empty() {
                SearchPath::default()
            } else {
                SearchPath::new(include)
            };
            let vars: Vars = set
                .iter()
                .map(|(key, value)| (key, parse_value(value)))
                .collect();
            let engine = Iwakura::new(search);
            let output = render_template(&engine, &name, &vars, Diagnostics { tokens, disasm })
                .with_context(|| format!("failed to render `{name}`"))?;
            print!("{output}");
        }
        Command::Repl => repl()?,
    }

    Ok(())
}
