use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::controller::{Notice, NoticeLevel};
use crate::filter::{ALL_CATEGORIES, CategoryFilter, Filter};
use crate::task::{Category, Task};

const DESCRIPTION_WIDTH: usize = 40;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, today))]
    pub fn print_task_table(&mut self, tasks: &[Task], today: NaiveDate) -> anyhow::Result<()> {
        let paint = self.color && io::stdout().is_terminal();
        write_task_table(io::stdout().lock(), tasks, today, paint)
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_json(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, tasks)?;
        writeln!(out)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "description {}", task.description)?;
        writeln!(out, "due         {}", task.due_date.format("%Y-%m-%d"))?;
        writeln!(out, "category    {}", task.category.label())?;
        writeln!(out, "completed   {}", if task.completed { "yes" } else { "no" })?;

        Ok(())
    }

    pub fn print_filter_summary(&mut self, filter: &Filter, shown: usize, total: usize) -> anyhow::Result<()> {
        if filter.is_pass_through() {
            return Ok(());
        }
        let mut out = io::stdout().lock();
        writeln!(out)?;
        writeln!(out, "{shown} of {total} tasks")?;
        Ok(())
    }

    pub fn print_categories(&mut self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let paint = self.color && io::stdout().is_terminal();
        writeln!(out, "{:<10} {}", ALL_CATEGORIES, CategoryFilter::All.label())?;
        for category in Category::known() {
            let name = format!("{:<10}", category.as_str());
            writeln!(out, "{} {}", paint_if(paint, &name, category_color(&category)), category.label())?;
        }
        Ok(())
    }

    pub fn print_notices(&mut self, notices: &[Notice]) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        let paint = self.color && io::stderr().is_terminal();
        for notice in notices {
            let code = match notice.level {
                NoticeLevel::Success => "32",
                NoticeLevel::Error => "31",
            };
            writeln!(err, "{}: {}", paint_if(paint, notice.title(), code), notice.message)?;
        }
        Ok(())
    }
}

const EMPTY_LIST_MESSAGE: &str = "No tasks found. Create a new task to get started!";

fn write_task_table<W: Write>(mut writer: W, tasks: &[Task], today: NaiveDate, paint: bool) -> anyhow::Result<()> {
    if tasks.is_empty() {
        writeln!(writer, "{EMPTY_LIST_MESSAGE}")?;
        return Ok(());
    }
    write_table(writer, table_headers(), table_rows(tasks, today, paint))
}

fn table_headers() -> Vec<String> {
    ["ID", "Done", "Due", "Category", "Title", "Description"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn table_rows(tasks: &[Task], today: NaiveDate, paint: bool) -> Vec<Vec<String>> {
    tasks
        .iter()
        .map(|task| {
            let due = task.due_date.format("%Y-%m-%d").to_string();
            let due = if task.is_overdue(today) {
                paint_if(paint, &due, "31")
            } else {
                due
            };

            vec![
                paint_if(paint, task.id.as_str(), "33"),
                if task.completed { "x".to_string() } else { String::new() },
                due,
                paint_if(paint, task.category.label(), category_color(&task.category)),
                task.title.clone(),
                truncate(&task.description, DESCRIPTION_WIDTH),
            ]
        })
        .collect()
}

fn category_color(category: &Category) -> &'static str {
    match category.bucket() {
        Category::Work => "34",
        Category::Personal => "32",
        Category::Important => "31",
        Category::Shopping => "35",
        _ => "90",
    }
}

fn paint_if(paint: bool, text: &str, code: &str) -> String {
    if !paint {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn truncate(text: &str, max_width: usize) -> String {
    let single_line = text.replace('\n', " ");
    if UnicodeWidthStr::width(single_line.as_str()) <= max_width {
        return single_line;
    }

    let mut out = String::new();
    let mut width = 0;
    for ch in single_line.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width + 1 > max_width {
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out.push('…');
    out
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
