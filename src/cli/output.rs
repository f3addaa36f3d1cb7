use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
    pub verbose: bool,
}

/// Decide on ANSI colors from the `--no-color` flag, the configured color
/// mode ("auto" | "always" | "never"), `NO_COLOR` and whether stdout is a TTY.
pub fn detect_color(color_flag: bool, mode: &str) -> bool {
    if !color_flag {
        return false;
    }
    match mode {
        "always" => true,
        "never" => false,
        _ => std::env::var("NO_COLOR").is_err() && std::io::stdout().is_terminal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_color_flag_always_wins() {
        assert!(!detect_color(false, "always"));
    }

    #[test]
    fn explicit_modes() {
        assert!(detect_color(true, "always"));
        assert!(!detect_color(true, "never"));
    }

    #[test]
    fn format_names() {
        assert_eq!(OutputFormat::from_name("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_name("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::from_name("yaml"), OutputFormat::Text);
    }
}
