use serde::Serialize;

use crate::result::{RunReport, RunSummary};

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    summary: RunSummary,
}

pub fn render(report: &RunReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        report,
        summary: report.summary(),
    })
}

pub fn print(report: &RunReport) {
    match render(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize JSON: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Mode;
    use crate::result::EntityOutcome;

    #[test]
    fn report_and_summary_share_one_object() {
        let mut report = RunReport::new(Mode::Delete, "md.xml", true);
        report.entities.push(EntityOutcome::skipped("urn:a"));
        report.error = Some("boom".to_string());

        let value: serde_json::Value = serde_json::from_str(&render(&report).unwrap()).unwrap();
        assert_eq!(value["mode"], "delete");
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["entities"][0]["action"], "skipped");
        assert_eq!(value["summary"]["skipped"], 1);
        assert_eq!(value["error"], "boom");
    }
}
