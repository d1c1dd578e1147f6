//! Terminal capabilities and tracing setup.

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn should_use_progress_bar(stderr_is_terminal: bool, quiet: bool, json: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !json && !dumb_terminal
}

/// Log level from the CLI flags. `RUST_LOG` still wins when set.
pub(crate) fn default_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color_env_requested() && !is_dumb_terminal())
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_priority() {
        assert_eq!(default_level(true, 2), "error");
        assert_eq!(default_level(false, 0), "info");
        assert_eq!(default_level(false, 1), "debug");
        assert_eq!(default_level(false, 5), "trace");
    }

    #[test]
    fn test_progress_bar_only_on_interactive_terminals() {
        assert!(should_use_progress_bar(true, false, false, false));
        assert!(!should_use_progress_bar(false, false, false, false));
        assert!(!should_use_progress_bar(true, true, false, false));
        assert!(!should_use_progress_bar(true, false, true, false));
        assert!(!should_use_progress_bar(true, false, false, true));
    }
}
