use std::process::ExitCode;

use clap::Parser;

use lungo::builtins;
use lungo::class::{ClassLoader, Classes, DirSource};
use lungo::errors::VmError;
use lungo::runtime::Interpreter;

/// A stupidly simple JVM: loads a compiled class file and interprets
/// its main method.
#[derive(Parser)]
#[command(name = "lungo", version)]
struct Args {
    /// Name of the class to run, without the .class suffix.
    class_name: String,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            eprint!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args.class_name) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lungo: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(class_name: &str) -> Result<(), VmError> {
    let mut classes = Classes::new();
    builtins::register(&mut classes)?;

    let source = DirSource::new(".");
    ClassLoader::new(&mut classes, &source).load(class_name)?;

    let mut interpreter = Interpreter::new(classes);
    interpreter.run()
}
