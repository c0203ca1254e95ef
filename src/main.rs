use bindexpr::cli::{self, CliError, EvalOptions};
use bindexpr::output::{to_json, to_json_pretty};
use clap::{Parser as ClapParser, Subcommand};
use log::LevelFilter;
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "bindexpr")]
#[command(about = "bindexpr - parse, inspect and evaluate UI binding expressions")]
#[command(version)]
struct Cli {
    /// Recover from lexical errors instead of failing
    #[arg(long, global = true)]
    lenient: bool,

    /// Log cache misses and rewrite passes to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a source expression against a JSON data context
    Eval {
        /// The source expression, e.g. "Price * Quantity"
        expression: String,

        /// JSON data context (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the tokens of an expression
    Tokens {
        text: String,
    },

    /// Parse a full binding string and describe each binding
    Parse {
        /// e.g. "Text Name, Mode=OneWay; Visible IsActive"
        text: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        bindexpr::logging::init_with_level(LevelFilter::Debug);
    } else {
        bindexpr::logging::init_from_env();
    }

    let result = match cli.command {
        Commands::Eval {
            expression,
            input,
            pretty,
        } => run_eval(expression, input, pretty, cli.lenient),
        Commands::Tokens { text } => cli::execute_tokens(&text, cli.lenient).map(|tokens| {
            for token in tokens {
                println!("{:>4}  {:<18} {}", token.position, format!("{:?}", token.kind), token.text);
            }
        }),
        Commands::Parse { text } => cli::describe_bindings(&text, cli.lenient).map(|lines| {
            for line in lines {
                println!("{}", line);
            }
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_eval(expression: String, input: Option<String>, pretty: bool, lenient: bool) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(CliError::Io)?;
            if buffer.trim().is_empty() {
                return Err(CliError::NoInput);
            }
            Some(buffer)
        }
        None => None,
    };

    let options = EvalOptions {
        expression,
        input,
        lenient,
    };
    let value = cli::execute_eval(&options)?;
    let json = if pretty {
        to_json_pretty(&value)
    } else {
        to_json(&value)
    };
    println!("{}", json);
    Ok(())
}
