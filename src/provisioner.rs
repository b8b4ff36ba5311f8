//! The provisioning run: every variable into every environment, then a summary

use crate::config::{Environment, Settings, VariableEntry};
use crate::tool::{CallOutcome, EnvTool};
use colored::Colorize;
use std::io::{self, Write};

/// Outcome of one (variable, environment) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResult {
    pub name: String,
    pub environment: Environment,
    pub outcome: CallOutcome,
}

/// Everything a run did, in the order it happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub results: Vec<PairResult>,
    /// Generated `(name, value)` pairs in manifest order.
    pub generated: Vec<(String, String)>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Pushes an ordered set of variables into a list of environments.
///
/// Pairs are processed one at a time, variables in declaration order and
/// environments in list order. A failed pair is reported and skipped; the run
/// always finishes with the closing summary.
pub struct Provisioner {
    entries: Vec<VariableEntry>,
    environments: Vec<Environment>,
    app_url: String,
}

impl Provisioner {
    pub fn new(
        entries: Vec<VariableEntry>,
        environments: Vec<Environment>,
        settings: &Settings,
    ) -> Self {
        Self {
            entries,
            environments,
            app_url: settings.app_url.clone(),
        }
    }

    pub fn entries(&self) -> &[VariableEntry] {
        &self.entries
    }

    /// Runs every pair through `tool`, writing the report to `out`.
    ///
    /// Tool failures never stop the run. Only a failure to write to `out`
    /// is returned as an error.
    pub fn run<W: Write>(&self, tool: &dyn EnvTool, out: &mut W) -> io::Result<RunReport> {
        let mut report = RunReport::default();

        writeln!(
            out,
            "{}\n",
            format!("=== Setting environment variables with {} ===", tool.name()).bold()
        )?;

        for entry in &self.entries {
            writeln!(out, "📝 Configuring {}...", entry.name.bold())?;

            for &environment in &self.environments {
                let outcome = tool.add(&entry.name, &entry.value, environment);
                writeln!(out, "{}", outcome_line(&entry.name, environment, &outcome))?;
                report.results.push(PairResult {
                    name: entry.name.clone(),
                    environment,
                    outcome,
                });
            }
        }

        report.generated = self
            .entries
            .iter()
            .filter(|e| e.generated)
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect();

        self.write_summary(&report, out)?;
        Ok(report)
    }

    fn write_summary<W: Write>(&self, report: &RunReport, out: &mut W) -> io::Result<()> {
        writeln!(out, "\n✅ {}", "Process completed!".green().bold())?;
        writeln!(
            out,
            "   {} set, {} failed",
            report.succeeded().to_string().green(),
            report.failed().to_string().red()
        )?;

        // printed in clear text on purpose, so the value can be copied elsewhere
        for (name, value) in &report.generated {
            writeln!(out, "\n{} generated: {}", name, value)?;
        }

        writeln!(out, "\nNext steps:")?;
        writeln!(
            out,
            "1. Wait 2-3 minutes for the platform's automatic redeploy to finish"
        )?;
        writeln!(out, "2. Try: {}", self.app_url)?;
        writeln!(out, "3. It should respond without an HTTP 500")?;
        Ok(())
    }
}

/// Formats the report line for one pair.
pub fn outcome_line(name: &str, environment: Environment, outcome: &CallOutcome) -> String {
    match outcome {
        CallOutcome::Success => format!("   ✅ {} → {}", name, environment),
        CallOutcome::ToolError(msg) => {
            format!("   ⚠️  {} → {}: {}", name, environment, msg.yellow())
        }
        CallOutcome::Timeout => format!("   ❌ {} → {}: {}", name, environment, "Timeout".red()),
        CallOutcome::LaunchError(msg) => {
            format!("   ❌ {} → {}: {}", name, environment, msg.red())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Manifest;
    use crate::tool::tests::MockTool;

    fn builtin_provisioner() -> Provisioner {
        let entries = Manifest::builtin().resolve_with(|_| None).unwrap();
        Provisioner::new(entries, Environment::ALL.to_vec(), &Settings::default())
    }

    fn run_to_string(provisioner: &Provisioner, tool: &MockTool) -> (RunReport, String) {
        colored::control::set_override(false);
        let mut out = Vec::new();
        let report = provisioner.run(tool, &mut out).unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_calls_every_pair_in_order() {
        let provisioner = builtin_provisioner();
        let tool = MockTool::new();
        let (report, _) = run_to_string(&provisioner, &tool);

        let order: Vec<_> = tool
            .calls()
            .into_iter()
            .map(|(name, _, env)| format!("{}/{}", name, env))
            .collect();
        assert_eq!(
            order,
            vec![
                "DATABASE_URL/production",
                "DATABASE_URL/preview",
                "DATABASE_URL/development",
                "JWT_SECRET/production",
                "JWT_SECRET/preview",
                "JWT_SECRET/development",
                "TMDB_READ_ACCESS_TOKEN/production",
                "TMDB_READ_ACCESS_TOKEN/preview",
                "TMDB_READ_ACCESS_TOKEN/development",
            ]
        );
        assert_eq!(report.succeeded(), 9);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn test_generated_secret_is_pushed_and_printed_once() {
        let provisioner = builtin_provisioner();
        let secret = provisioner.entries()[1].value.clone();
        let tool = MockTool::new();
        let (report, output) = run_to_string(&provisioner, &tool);

        let pushed: Vec<_> = tool
            .calls()
            .into_iter()
            .filter(|(name, _, _)| name == "JWT_SECRET")
            .map(|(_, value, _)| value)
            .collect();
        assert_eq!(pushed, vec![secret.clone(); 3]);

        assert_eq!(report.generated, vec![("JWT_SECRET".to_string(), secret.clone())]);
        assert_eq!(
            output.matches(&format!("JWT_SECRET generated: {}", secret)).count(),
            1
        );
    }

    #[test]
    fn test_failures_do_not_stop_the_run() {
        let provisioner = builtin_provisioner();
        let tool = MockTool::new();
        tool.respond(
            "DATABASE_URL",
            Environment::Production,
            CallOutcome::ToolError("denied".to_string()),
        );
        tool.respond("JWT_SECRET", Environment::Preview, CallOutcome::Timeout);
        tool.respond(
            "TMDB_READ_ACCESS_TOKEN",
            Environment::Development,
            CallOutcome::LaunchError("broken pipe".to_string()),
        );

        let (report, output) = run_to_string(&provisioner, &tool);
        assert_eq!(tool.calls().len(), 9);
        assert_eq!(report.succeeded(), 6);
        assert_eq!(report.failed(), 3);

        assert!(output.contains("⚠️  DATABASE_URL → production: denied"));
        assert!(output.contains("❌ JWT_SECRET → preview: Timeout"));
        assert!(output.contains("❌ TMDB_READ_ACCESS_TOKEN → development: broken pipe"));
        assert!(output.contains("6 set, 3 failed"));
        assert_eq!(output.matches("Process completed!").count(), 1);
    }

    #[test]
    fn test_one_line_per_pair() {
        let provisioner = builtin_provisioner();
        let tool = MockTool::new();
        let (_, output) = run_to_string(&provisioner, &tool);
        let pair_lines = output.lines().filter(|l| l.contains(" → ")).count();
        assert_eq!(pair_lines, 9);
    }

    #[test]
    fn test_summary_follows_pairs() {
        let provisioner = builtin_provisioner();
        let tool = MockTool::new();
        let (_, output) = run_to_string(&provisioner, &tool);

        let last_pair = output.rfind(" → ").unwrap();
        let banner = output.find("Process completed!").unwrap();
        let secret = output.find("JWT_SECRET generated:").unwrap();
        let url = output.find(crate::config::DEFAULT_APP_URL).unwrap();
        assert!(last_pair < banner && banner < secret && secret < url);
        assert!(output.contains("Next steps:"));
    }

    #[test]
    fn test_environment_subset() {
        let entries = vec![VariableEntry {
            name: "ONLY".to_string(),
            value: "v".to_string(),
            generated: false,
        }];
        let provisioner =
            Provisioner::new(entries, vec![Environment::Preview], &Settings::default());
        let tool = MockTool::new();
        let (report, output) = run_to_string(&provisioner, &tool);
        assert_eq!(report.results.len(), 1);
        assert!(report.generated.is_empty());
        assert!(!output.contains("generated:"));
    }

    #[test]
    fn test_outcome_line_formats() {
        colored::control::set_override(false);
        assert_eq!(
            outcome_line("A", Environment::Production, &CallOutcome::Success),
            "   ✅ A → production"
        );
        assert_eq!(
            outcome_line("A", Environment::Preview, &CallOutcome::Timeout),
            "   ❌ A → preview: Timeout"
        );
    }
}
