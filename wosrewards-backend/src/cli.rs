/// Parsed command-line arguments.
pub struct CliArgs {
    /// Path to configuration file, if provided via `--config-path` or `-c`.
    pub config_path: Option<String>,
    pub help_requested: bool,
}

impl CliArgs {
    /// Supported flags:
    /// - `--config-path <path>`, `--config-path=<path>`, `-c <path>` or `-c=<path>`
    /// - `--help` or `-h`
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    fn from_args(args: &[String]) -> Self {
        Self {
            config_path: Self::extract_config_path(args),
            help_requested: args.iter().skip(1).any(|a| a == "--help" || a == "-h"),
        }
    }

    pub fn print_help() {
        eprintln!(
            "Usage: wosrewards-backend [--config-path PATH] [--help]\n\n\
             --config-path, -c    Path to configuration file (overrides WOSREWARDS_CONFIG_PATH env var)\n\n\
             Runs the HTTP API and, unless worker.enabled is false, the job worker."
        );
    }

    fn extract_config_path(args: &[String]) -> Option<String> {
        let mut rest = args.iter().skip(1);
        while let Some(a) = rest.next() {
            if let Some(stripped) = a
                .strip_prefix("--config-path=")
                .or_else(|| a.strip_prefix("-c="))
            {
                return Some(stripped.to_string());
            }
            if a == "--config-path" || a == "-c" {
                return rest.next().cloned();
            }
        }
        None
    }
}
