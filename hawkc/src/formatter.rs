use colored::*;
use hawkc_core::client::{HawkState, Instance};
use hawkc_core::config::ConfigError;
use hawkc_core::error::CallError;
use hawkc_core::transport::TransportError;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct InstanceList(pub Vec<Instance>);

/// Names returned by the listing commands, under a heading.
pub struct NameList(pub &'static str, pub Vec<String>);

/// Confirmation of an instance operation.
pub struct Done(pub &'static str, pub String);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.0)
    }
}

fn state(state: HawkState) -> ColoredString {
    let label = state.to_string();
    match state {
        HawkState::Running => label.green(),
        HawkState::Stopped => label.red(),
        HawkState::Updating => label.yellow(),
    }
}

impl From<InstanceList> for FormattedString {
    fn from(InstanceList(instances): InstanceList) -> Self {
        if instances.is_empty() {
            return FormattedString("No instances found.".yellow().to_string());
        }

        let width = instances.iter().map(|i| i.name.len()).max().unwrap_or(0);
        let mut out = String::new();
        for instance in instances {
            let name = format!("{:width$}", instance.name);
            out.push_str(&format!("{}  {}", name.bold(), state(instance.state)));
            if let Some(message) = &instance.message {
                out.push_str(&format!("  {}", message.dimmed()));
            }
            out.push('\n');
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<NameList> for FormattedString {
    fn from(NameList(heading, names): NameList) -> Self {
        if names.is_empty() {
            return FormattedString(format!("No {} found.", heading.to_lowercase()).yellow().to_string());
        }

        let mut out = format!("{heading}:\n");
        for name in names {
            out.push_str(&format!("  - {}\n", name.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<Done> for FormattedString {
    fn from(Done(verb, name): Done) -> Self {
        FormattedString(format!("{} instance '{}'", verb.green().bold(), name))
    }
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            format!("Call Failed ({}):", err.kind()).red().bold(),
            err
        ))
    }
}

impl From<TransportError> for FormattedString {
    fn from(err: TransportError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Connection Error:".red().bold(), err))
    }
}

impl From<ConfigError> for FormattedString {
    fn from(err: ConfigError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Invalid Configuration:".red().bold(), err))
    }
}

impl From<serde_json::Error> for FormattedString {
    fn from(err: serde_json::Error) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Failed to render JSON:".red().bold(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(formatted: impl FnOnce() -> FormattedString) -> String {
        colored::control::set_override(false);
        formatted().0
    }

    #[test]
    fn display_ends_with_a_single_newline() {
        let err = plain(|| FormattedString::from(TransportError::NotOpen));

        let shown = FormattedString(err).to_string();
        assert!(shown.ends_with("'\n"));
        assert!(!shown.ends_with("\n\n"));
    }

    #[test]
    fn empty_instance_list_prints_a_notice() {
        let out = plain(|| FormattedString::from(InstanceList(vec![])));
        assert_eq!(out, "No instances found.");
    }

    #[test]
    fn instances_print_one_per_line() {
        let out = plain(|| {
            FormattedString::from(InstanceList(vec![
                Instance::new("alpha", HawkState::Running),
                Instance::new("beta", HawkState::Stopped).with_message("Sync pending"),
            ]))
        });

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("alpha"));
        assert!(lines[0].contains("RUNNING"));
        assert!(lines[1].contains("STOPPED"));
        assert!(lines[1].ends_with("Sync pending"));
    }

    #[test]
    fn name_lists_have_a_heading() {
        let out = plain(|| {
            FormattedString::from(NameList(
                "Backends",
                vec!["org.hawk.orientdb.OrientDatabase".to_string()],
            ))
        });
        assert_eq!(out, "Backends:\n  - org.hawk.orientdb.OrientDatabase");

        let out = plain(|| FormattedString::from(NameList("Plugins", vec![])));
        assert_eq!(out, "No plugins found.");
    }
}
