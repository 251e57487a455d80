//! Command-line arguments.

use std::path::PathBuf;

use crate::error::ReplayError;

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Script to replay.
    pub script: PathBuf,
    /// Economy config file. Falls back to `starclick-config.yaml` when it
    /// exists, then to defaults.
    pub config: Option<PathBuf>,
    /// Catalog file. The standard catalog is used when absent.
    pub catalog: Option<PathBuf>,
    /// Overrides `service.rng_seed`.
    pub seed: Option<u64>,
    /// Replay against `infrastructure.postgres_url` instead of memory.
    pub postgres: bool,
}

impl Args {
    /// Parse arguments, excluding the program name.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Usage`] for unknown flags, missing values, a
    /// non-numeric seed, or a missing or repeated script path.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ReplayError> {
        let mut script = None;
        let mut config = None;
        let mut catalog = None;
        let mut seed = None;
        let mut postgres = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(value(&arg, args.next())?)),
                "--catalog" => catalog = Some(PathBuf::from(value(&arg, args.next())?)),
                "--postgres" => postgres = true,
                "--seed" => {
                    let raw = value(&arg, args.next())?;
                    let parsed = raw.parse::<u64>().ok().ok_or_else(|| {
                        usage(format!("--seed expects an unsigned integer, got {raw:?}"))
                    })?;
                    seed = Some(parsed);
                }
                flag if flag.starts_with("--") => {
                    return Err(usage(format!("unknown option {flag}")));
                }
                _ if script.is_some() => {
                    return Err(usage(format!("unexpected argument {arg:?}")));
                }
                _ => script = Some(PathBuf::from(arg)),
            }
        }

        Ok(Self {
            script: script.ok_or_else(|| usage("missing script path".to_owned()))?,
            config,
            catalog,
            seed,
            postgres,
        })
    }
}

fn value(flag: &str, next: Option<String>) -> Result<String, ReplayError> {
    next.ok_or_else(|| usage(format!("{flag} requires a value")))
}

const fn usage(message: String) -> ReplayError {
    ReplayError::Usage { message }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ReplayError> {
        Args::parse(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn script_with_options() {
        let args = parse(&["run.json", "--seed", "42", "--config", "c.yaml"]).unwrap();
        assert_eq!(args.script, PathBuf::from("run.json"));
        assert_eq!(args.config, Some(PathBuf::from("c.yaml")));
        assert_eq!(args.catalog, None);
        assert_eq!(args.seed, Some(42));
        assert!(!args.postgres);
    }

    #[test]
    fn postgres_flag_takes_no_value() {
        let args = parse(&["--postgres", "run.json"]).unwrap();
        assert!(args.postgres);
        assert_eq!(args.script, PathBuf::from("run.json"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse(&[]), Err(ReplayError::Usage { .. })));
        assert!(matches!(parse(&["a.json", "b.json"]), Err(ReplayError::Usage { .. })));
        assert!(matches!(parse(&["a.json", "--seed"]), Err(ReplayError::Usage { .. })));
        assert!(matches!(parse(&["a.json", "--seed", "x"]), Err(ReplayError::Usage { .. })));
        assert!(matches!(parse(&["a.json", "--verbose"]), Err(ReplayError::Usage { .. })));
    }
}
