use std::{
    io::{self, Write},
    sync::Mutex,
};

use anyhow::{Result, anyhow};
use stepwise_types::{
    ContextualizedFeature, FeatureResult, RunResult, ScenarioResult, SkipReason, StepStatus, Tally,
};

use super::Reporter;

/// Which sections the console reporter prints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleReporterConfig {
    pub print_results: bool,
    pub print_progress: bool,
    pub print_summary: bool,
}

/// Plain-text reporter writing to stdout or any other sink.
pub struct ConsoleReporter {
    config: ConsoleReporterConfig,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleReporter {
    pub fn new(config: ConsoleReporterConfig) -> Self {
        Self::with_writer(config, io::stdout())
    }

    pub fn with_writer(config: ConsoleReporterConfig, writer: impl Write + Send + 'static) -> Self {
        Self {
            config,
            out: Mutex::new(Box::new(writer)),
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut out = self.out.lock().map_err(|_| anyhow!("console reporter output lock poisoned"))?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }
}

fn context_suffix(feature: &ContextualizedFeature) -> String {
    if feature.context.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = feature.context.iter().map(|(key, value)| format!("{key}={value}")).collect();
    format!(" [{}]", pairs.join(", "))
}

fn summary_line(label: &str, tally: Tally) -> String {
    format!(
        "{label} {} failed, {} skipped, {} passed, {} total",
        tally.failed,
        tally.skipped,
        tally.passed,
        tally.total()
    )
}

impl Reporter for ConsoleReporter {
    fn progress(&self, label: &str, detail: &str) -> Result<()> {
        if !self.config.print_progress {
            return Ok(());
        }
        self.write_lines(&[format!("    > {label}: {detail}")])
    }

    fn feature_started(&self, feature: &ContextualizedFeature) -> Result<()> {
        self.write_lines(&[format!("Feature: {}{}", feature.name(), context_suffix(feature))])
    }

    fn scenario_finished(&self, _feature: &ContextualizedFeature, result: &ScenarioResult) -> Result<()> {
        let mut lines = Vec::new();
        if result.skipped {
            lines.push(format!("  - {} (skipped)", result.name));
        } else if result.success {
            let retried = if result.tries > 1 {
                format!(" (passed after {} tries)", result.tries)
            } else {
                String::new()
            };
            lines.push(format!("  ✔ {}{retried}", result.name));
        } else {
            lines.push(format!("  ✖ {} ({} tries)", result.name, result.tries));
            if let Some(error) = &result.error {
                lines.push(format!("      {}", error.message));
            }
        }

        if self.config.print_results {
            for step in &result.steps {
                let marker = match step.status {
                    StepStatus::Passed => "✔",
                    StepStatus::Failed => "✖",
                    StepStatus::Skipped => "-",
                };
                lines.push(format!("      {marker} {} {} ({} ms)", step.keyword, step.text, step.duration_ms));
            }
        }
        self.write_lines(&lines)
    }

    fn feature_finished(&self, result: &FeatureResult) -> Result<()> {
        match &result.skip_reason {
            Some(SkipReason::Tagged) => self.write_lines(&[format!("  Feature \"{}\" skipped", result.name)]),
            Some(SkipReason::FailedDependency(dependency)) => self.write_lines(&[format!(
                "  Feature \"{}\" skipped because \"{dependency}\" failed",
                result.name
            )]),
            None => Ok(()),
        }
    }

    fn run_finished(&self, result: &RunResult) -> Result<()> {
        if !self.config.print_summary {
            return Ok(());
        }
        self.write_lines(&[
            String::new(),
            summary_line("Feature Summary:  ", Tally::features(result)),
            summary_line("Scenario Summary: ", Tally::scenarios(result)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use stepwise_types::{Context, Feature};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().expect("buffer lock").clone()).expect("utf8")
        }
    }

    fn passed(name: &str) -> ScenarioResult {
        ScenarioResult {
            name: name.into(),
            success: true,
            skipped: false,
            tries: 1,
            retry_configuration: None,
            error: None,
            steps: Vec::new(),
        }
    }

    #[test]
    fn prints_summary_for_passing_run() {
        let buffer = SharedBuffer::default();
        let reporter = ConsoleReporter::with_writer(
            ConsoleReporterConfig {
                print_summary: true,
                ..Default::default()
            },
            buffer.clone(),
        );
        let features = (0..5)
            .map(|index| FeatureResult::from_scenarios(format!("F{index}"), Context::new(), vec![passed("s")]))
            .collect();
        let run = RunResult::from_features(features, Utc::now());
        reporter.run_finished(&run).expect("reported");

        let output = buffer.contents();
        assert!(output.contains("Feature Summary:   0 failed, 0 skipped, 5 passed, 5 total"), "{output}");
        assert!(output.contains("Scenario Summary:  0 failed, 0 skipped, 5 passed, 5 total"), "{output}");
    }

    #[test]
    fn progress_is_printed_only_when_enabled() {
        let buffer = SharedBuffer::default();
        let quiet = ConsoleReporter::with_writer(ConsoleReporterConfig::default(), buffer.clone());
        quiet.progress("GET", "/things").expect("reported");
        assert!(buffer.contents().is_empty());

        let verbose = ConsoleReporter::with_writer(
            ConsoleReporterConfig {
                print_progress: true,
                ..Default::default()
            },
            buffer.clone(),
        );
        verbose.progress("GET", "/things").expect("reported");
        assert_eq!(buffer.contents(), "    > GET: /things\n");
    }

    #[test]
    fn feature_header_includes_context() {
        let buffer = SharedBuffer::default();
        let reporter = ConsoleReporter::with_writer(ConsoleReporterConfig::default(), buffer.clone());
        let mut context = Context::new();
        context.insert("deviceType".into(), "sensor".into());
        let feature = ContextualizedFeature::new(
            Arc::new(Feature {
                name: "Devices".into(),
                ..Default::default()
            }),
            context,
        );
        reporter.feature_started(&feature).expect("reported");
        assert_eq!(buffer.contents(), "Feature: Devices [deviceType=sensor]\n");
    }
}
