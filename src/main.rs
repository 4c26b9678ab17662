use csv2xlsx::{ConversionRequest, ConvertError, Converter, RunLog};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const INTERRUPTED_EXIT_CODE: i32 = 130;

fn main() {
    let app = clap::App::new("csv2xlsx")
    .version(env!("CARGO_PKG_VERSION"))
    .author("Ruslan Nasonov <rus.nasonov@gmail.com>")
    .about("Convert csv to xlsx");

    let app = app.arg(
        clap::Arg::with_name("input")
        .short("i")
        .long("input")
        .takes_value(true)
        .required(true)
        .help("File to convert, .csv is appended if missing")
    );

    let app = app.arg(
        clap::Arg::with_name("delimeter")
        .short("d")
        .long("delimeter")
        .alias("delimiter")
        .takes_value(true)
        .allow_hyphen_values(true)
        .required(true)
        .help("Delimiter used in the input file (usually ,)")
    );

    let app = app.arg(
        clap::Arg::with_name("output")
        .short("o")
        .long("output")
        .takes_value(true)
        .required(true)
        .help("Name for the xlsx file, the date and .xlsx are appended")
    );

    let matches = app.get_matches();

    let input = matches.value_of("input").expect("Input is not set");
    let delimiter = matches.value_of("delimeter").expect("Delimiter is not set");
    let output = matches.value_of("output").expect("Output is not set");
    let request = ConversionRequest::new(input, delimiter, output);

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    let handler = move || {
        // A second Ctrl-C leaves at once, even while a read or write is blocked.
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        eprintln!("Stopping, press Ctrl-C again to exit immediately.");
    };
    if let Err(err) = ctrlc::set_handler(handler) {
        eprintln!("Cannot install Ctrl-C handler: {}", err);
    }

    let log = match RunLog::create(Path::new("."), chrono::Local::now()) {
        Ok(log) => log,
        Err(err) => {
            println!("Could not open the debug log: {}", err);
            std::process::exit(1);
        }
    };

    let mut converter = Converter::new(log).with_interrupt(interrupted);
    match converter.run(&request) {
        Ok(conversion) => {
            println!("Wrote {} row(s) to {}", conversion.rows, conversion.output.display());
        },
        Err(err) => {
            println!("{}", err.headline());
            println!("{}", err);
            let code = match err {
                ConvertError::Interrupted { .. } => INTERRUPTED_EXIT_CODE,
                _ => 1,
            };
            std::process::exit(code);
        }
    };
}
