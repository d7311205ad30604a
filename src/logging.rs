use tracing_subscriber::filter::{EnvFilter, LevelFilter};

const CRATE_TARGET: &str = "scatfield";

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(level_for(0), LevelFilter::WARN);
        assert_eq!(level_for(1), LevelFilter::INFO);
        assert_eq!(level_for(2), LevelFilter::DEBUG);
        assert_eq!(level_for(3), LevelFilter::TRACE);
        assert_eq!(level_for(u8::MAX), LevelFilter::TRACE);
    }

    #[test]
    fn dependencies_stay_at_warn() {
        assert_eq!(default_directives(2), "warn,scatfield=debug");
        for verbosity in 0..4 {
            assert!(EnvFilter::try_new(default_directives(verbosity)).is_ok());
        }
    }
}

/// Level of the crate's own events for a count of `-v` flags.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn default_directives(verbosity: u8) -> String {
    let level = level_for(verbosity).to_string().to_ascii_lowercase();
    format!("warn,{CRATE_TARGET}={level}")
}

/// Installs the stderr subscriber. A set `RUST_LOG` replaces the verbosity flag.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(verbosity)))
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level_for(verbosity).into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .init();
}
