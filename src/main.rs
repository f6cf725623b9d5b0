use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::{Args, Subcommand};
use env_logger::Builder;
use log::{debug, info};
use serde::Serialize;

use phrasal::grammar::{GrammarSymbol, SymbolClass, SymbolTarget};
use phrasal::parser::parse_statement;
use phrasal::scanner::{lines, Scanner};
use phrasal::stack::{GrammarScope, GrammarStack};

#[derive(ClapParser, Debug)]
#[command(version, about = "Phrase grammar parser", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize { filename: Option<PathBuf> },

    /// Parses input from a file, one statement per line, and prints each tree
    Parse {
        filename: Option<PathBuf>,

        #[command(flatten)]
        grammar: GrammarArgs,

        /// Print one JSON record per statement
        #[arg(long)]
        json: bool,
    },
}

/// User grammar declared in a scope above the builtins before parsing.
#[derive(Args, Debug, Default)]
struct GrammarArgs {
    /// Value producing phrase, e.g. "sum from <expression> to <expression>"
    #[arg(long = "phrase", value_name = "PATTERN")]
    phrases: Vec<String>,

    /// Statement pattern, e.g. "print <expression>"
    #[arg(long = "sentence", value_name = "PATTERN")]
    sentences: Vec<String>,

    /// Block header pattern, e.g. "repeat with <argument> from <expression> to <expression>"
    #[arg(long = "block", value_name = "PATTERN")]
    blocks: Vec<String>,

    /// Type name, e.g. "hash set"
    #[arg(long = "type", value_name = "PATTERN")]
    types: Vec<String>,
}

impl GrammarArgs {
    fn scope(&self) -> Result<GrammarScope> {
        let mut scope = GrammarScope::new();

        let groups = [
            (SymbolClass::TYPE, &self.types),
            (SymbolClass::PHRASE, &self.phrases),
            (SymbolClass::SENTENCE, &self.sentences),
            (SymbolClass::BLOCK, &self.blocks),
        ];

        for (class, patterns) in groups {
            for pattern in patterns {
                let symbol = GrammarSymbol::from_pattern(class, SymbolTarget::Custom, pattern)?;
                debug!("User grammar: {}", symbol);
                scope.add(symbol);
            }
        }

        Ok(scope)
    }
}

#[derive(Serialize)]
struct Record<'r> {
    line: usize,
    log: &'r str,
    code: &'r str,
}

/// Reads the contents of a file into a Vec<u8>
fn read_file(filename: PathBuf) -> Result<Vec<u8>> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'phrasal::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("phrasal::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn parse(buf: &[u8], grammar: &GrammarArgs, json: bool) -> Result<bool> {
    let tokens = match Scanner::tokenize(buf) {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!("Tokenization debug: {}", e);
            eprintln!("{}", e);
            return Ok(false);
        }
    };

    let mut stack = GrammarStack::with_predefined();
    stack.push(grammar.scope()?);
    let base = stack.depth();

    let mut parsed = true;

    for statement in lines(&tokens) {
        let line = statement.first().map_or(0, |token| token.line);

        let expression = match parse_statement(&mut stack, statement) {
            Ok(expression) => expression,
            Err(e) => {
                debug!("Parse debug: {}", e);
                eprintln!("{}", e);
                parsed = false;
                continue;
            }
        };

        let log = expression.to_log(&stack);
        let code = expression.to_code(&stack);

        if json {
            println!("{}", serde_json::to_string(&Record { line, log: &log, code: &code })?);
        } else {
            println!("{}", log);
        }

        let Some((target, class)) = expression
            .symbol()
            .map(|id| (stack.symbol(id).target(), stack.symbol(id).class()))
        else {
            continue;
        };

        if target == SymbolTarget::End && stack.depth() > base {
            stack.pop();
        } else if class.contains(SymbolClass::BLOCK) {
            stack.push_block(&expression);
        }
    }

    if stack.depth() > base {
        info!("{} block(s) left open at end of input", stack.depth() - base);
    }

    Ok(parsed)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename } => match filename {
            Some(filename) => {
                info!("Running Tokenize subcommand");
                let buf = read_file(filename)?;
                let mut tokenized = true;

                for token in Scanner::new(&buf) {
                    match token {
                        Ok(token) => {
                            debug!("Scanned token: {}", token);

                            println!("{}", token);
                        }

                        Err(e) => {
                            tokenized = false;

                            debug!("Tokenization debug: {}", e);

                            eprintln!("{}", e);

                            break;
                        }
                    }
                }

                if !tokenized {
                    debug!("Tokenization failed, exiting with code 65");

                    std::process::exit(65);
                }

                info!("Tokenization completed successfully");
            }
            None => {
                info!("No filepath provided for Tokenize");

                println!("No input filepath was provided. Exiting...");

                std::process::exit(0);
            }
        },

        Commands::Parse {
            filename,
            grammar,
            json,
        } => match filename {
            Some(filename) => {
                info!("Running Parse subcommand");
                let buf = read_file(filename)?;

                if !parse(&buf, &grammar, json)? {
                    debug!("Parse failed, exiting with code 65");
                    std::process::exit(65);
                }

                info!("Parse subcommand completed");
            }
            None => {
                info!("No filepath provided for Parse");
                println!("No input filepath was provided. Exiting...");
                std::process::exit(0);
            }
        },
    }

    Ok(())
}
