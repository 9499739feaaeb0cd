use std::io::Write;

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Installs the global logger. Lines read `LEVEL: service: message`.
///
/// `RUST_LOG`, when set, takes precedence over the `debug` flag.
pub fn init(service_name: &str, debug: bool, log_to_stdout: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let service_name = service_name.to_string();

    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .parse_env(Env::default())
        .target(if log_to_stdout {
            Target::Stdout
        } else {
            Target::Stderr
        })
        .format(move |buf, record| {
            writeln!(buf, "{}: {}: {}", record.level(), service_name, record.args())
        });

    // A second init (tests, self-test mode) keeps the first logger.
    let _ = builder.try_init();
}
