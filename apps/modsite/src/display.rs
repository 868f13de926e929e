//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::Style;
use modsite_errors::status;
use modsite_fetch::FetchInfo;
use modsite_types::{ModuleVersionState, PackageVersionState, VersionMapEntry};
use serde::Serialize;
use std::io;

/// Result of one fetch, read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub module_path: String,
    pub requested_version: String,
    pub resolved_version: Option<String>,
    pub status: u16,
    pub error: Option<String>,
    pub units: usize,
    pub packages: usize,
    /// Package states other than OK.
    pub incomplete: Vec<PackageVersionState>,
}

/// Outcome of one queued task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub status: u16,
    pub error: Option<String>,
}

/// Everything recorded about one requested module version.
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub version_map: Option<VersionMapEntry>,
    pub module: Option<ModuleVersionState>,
    pub packages: Vec<PackageVersionState>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum OperationResult {
    Fetch(FetchReport),
    Tasks(Vec<TaskReport>),
    State(StateReport),
    InFlight(Vec<FetchInfo>),
    Success(String),
}

impl OperationResult {
    /// Whether any module ended in a non-success status.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        match self {
            Self::Fetch(report) => !status::is_success(report.status),
            Self::Tasks(tasks) => tasks.iter().any(|t| !status::is_success(t.status)),
            Self::State(_) | Self::InFlight(_) | Self::Success(_) => false,
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    colors: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self {
            json_output,
            colors: console::Term::stdout().features().colors_supported(),
        }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }
        match result {
            OperationResult::Fetch(report) => self.render_fetch(report),
            OperationResult::Tasks(tasks) => self.render_tasks(tasks),
            OperationResult::State(report) => self.render_state(report),
            OperationResult::InFlight(infos) => self.render_in_flight(infos),
            OperationResult::Success(message) => {
                println!("{}", self.style(Style::new().green()).apply_to(message));
                Ok(())
            }
        }
    }

    fn render_fetch(&self, report: &FetchReport) -> io::Result<()> {
        println!(
            "{}@{}",
            Style::new().bold().apply_to(&report.module_path),
            report
                .resolved_version
                .as_deref()
                .unwrap_or(&report.requested_version)
        );
        println!("Status:      {}", self.status_text(report.status));
        if let Some(error) = &report.error {
            println!("Error:       {error}");
        }
        println!("Units:       {}", report.units);
        println!("Packages:    {}", report.packages);

        if !report.incomplete.is_empty() {
            println!();
            println!("Incomplete packages:");
            self.print_package_states(&report.incomplete);
        }
        Ok(())
    }

    fn render_tasks(&self, tasks: &[TaskReport]) -> io::Result<()> {
        let mut table = new_table(&["Task", "Status", "Error"]);
        for task in tasks {
            table.add_row(vec![
                Cell::new(&task.task),
                self.status_cell(task.status),
                Cell::new(task.error.as_deref().unwrap_or("-")),
            ]);
        }
        println!("{table}");
        Ok(())
    }

    fn render_state(&self, report: &StateReport) -> io::Result<()> {
        if report.version_map.is_none() && report.module.is_none() {
            println!("No state recorded.");
            return Ok(());
        }
        if let Some(entry) = &report.version_map {
            println!(
                "{}@{} -> {}",
                Style::new().bold().apply_to(&entry.module_path),
                entry.requested_version,
                entry.resolved_version.as_deref().unwrap_or("-")
            );
        }
        if let Some(state) = &report.module {
            println!("Status:      {}", self.status_text(state.status));
            if let Some(error) = &state.error {
                println!("Error:       {error}");
            }
            println!(
                "go.mod:      {}",
                match (&state.go_mod_path, state.has_go_mod) {
                    (Some(path), true) => path.clone(),
                    (Some(path), false) => format!("{path} (synthesized)"),
                    (None, _) => "-".to_string(),
                }
            );
            println!("Attempts:    {}", state.try_count);
            println!("Processed:   {}", state.last_processed_at.to_rfc3339());
            println!("App version: {}", state.app_version);
        }
        if !report.packages.is_empty() {
            println!();
            self.print_package_states(&report.packages);
        }
        Ok(())
    }

    fn render_in_flight(&self, infos: &[FetchInfo]) -> io::Result<()> {
        if infos.is_empty() {
            println!("No fetches in flight.");
            return Ok(());
        }
        let mut table = new_table(&["Module", "Version", "Phase", "Zip size", "Started", "Status"]);
        for info in infos {
            table.add_row(vec![
                Cell::new(&info.module_path),
                Cell::new(&info.version),
                Cell::new(info.phase.as_str()),
                Cell::new(info.zip_size.map_or_else(|| "-".to_string(), format_size)),
                Cell::new(info.start.format("%H:%M:%S").to_string()),
                info.status.map_or_else(|| Cell::new("-"), |code| self.status_cell(code)),
            ]);
        }
        println!("{table}");
        Ok(())
    }

    fn print_package_states(&self, states: &[PackageVersionState]) {
        let mut table = new_table(&["Package", "Status", "Error"]);
        for state in states {
            table.add_row(vec![
                Cell::new(&state.package_path),
                self.status_cell(state.status),
                Cell::new(state.error.as_deref().unwrap_or("-")),
            ]);
        }
        println!("{table}");
    }

    fn status_cell(&self, code: u16) -> Cell {
        let cell = Cell::new(code);
        if !self.colors {
            return cell;
        }
        match code {
            status::OK => cell.fg(Color::Green),
            status::HAS_INCOMPLETE_PACKAGES | status::SERVICE_UNAVAILABLE => cell.fg(Color::Yellow),
            _ => cell.fg(Color::Red),
        }
    }

    fn status_text(&self, code: u16) -> String {
        let style = match code {
            status::OK => Style::new().green(),
            status::HAS_INCOMPLETE_PACKAGES | status::SERVICE_UNAVAILABLE => Style::new().yellow(),
            _ => Style::new().red(),
        };
        self.style(style).apply_to(code).to_string()
    }

    fn style(&self, style: Style) -> Style {
        if self.colors {
            style
        } else {
            Style::new()
        }
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
