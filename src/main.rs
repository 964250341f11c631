use jobshell::Interpreter;
use jobshell::config::{ShellArgs, ShellConfig};
use rustyline::DefaultEditor;
use std::env;
use std::process;

fn init_logging(log_level: &str) {
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: ShellArgs = argh::from_env();
    init_logging(&args.log_level);
    let config = ShellConfig::try_from(&args)?;

    let mut interpreter = match Interpreter::new(config) {
        Ok(interpreter) => interpreter,
        Err(err) => {
            eprintln!("{err}");
            process::exit(0);
        }
    };
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "shell started");

    let mut editor = DefaultEditor::new()?;
    let code = interpreter.repl(&mut editor);
    process::exit(code)
}
