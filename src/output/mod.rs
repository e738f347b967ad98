pub mod json;
pub mod terminal;

use crate::result::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => json::print(report),
        OutputFormat::Terminal => terminal::print(report),
    }
}
