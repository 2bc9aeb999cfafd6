//! Interactive review loop: the terminal counterpart of the dashboard's
//! PREV/NEXT and ADD/REM buttons.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};

use crate::db::{self, PgSubmissionStore};
use crate::images::FsImageStore;
use crate::misreport;
use crate::models::RankedSchool;
use crate::report;
use crate::store::{Dashboard, ViewState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    Next,
    Prev,
    /// 1-based school position.
    Goto(usize),
    Date(NaiveDate),
    /// 1-based record position within the current school.
    Add(usize),
    Remove(usize),
    /// Drops the cached records of the current school and fetches them again.
    Reload,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ReviewCommand, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or("").to_ascii_lowercase();
    let arg = parts.next();
    let position = |arg: Option<&str>| -> Result<usize, String> {
        arg.and_then(|raw| raw.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| format!("`{verb}` needs a positive number"))
    };

    match verb.as_str() {
        "n" | "next" => Ok(ReviewCommand::Next),
        "p" | "prev" => Ok(ReviewCommand::Prev),
        "g" | "goto" => position(arg).map(ReviewCommand::Goto),
        "a" | "add" => position(arg).map(ReviewCommand::Add),
        "r" | "rem" | "remove" => position(arg).map(ReviewCommand::Remove),
        "d" | "date" => arg
            .and_then(|raw| raw.parse::<NaiveDate>().ok())
            .map(ReviewCommand::Date)
            .ok_or_else(|| "`date` needs YYYY-MM-DD".to_string()),
        "l" | "reload" => Ok(ReviewCommand::Reload),
        "q" | "quit" | "exit" => Ok(ReviewCommand::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command `{other}`")),
    }
}

const HELP: &str = "commands: n(ext) | p(rev) | g(oto) <n> | d(ate) <YYYY-MM-DD> | a(dd) <row> | r(em) <row> | (re)l(oad) | q(uit)";

pub struct ReviewSession {
    pool: PgPool,
    dashboard: Dashboard<PgSubmissionStore, FsImageStore>,
    view: ViewState,
    ranked: Vec<RankedSchool>,
    html: Option<PathBuf>,
}

impl ReviewSession {
    pub fn new(
        pool: PgPool,
        dashboard: Dashboard<PgSubmissionStore, FsImageStore>,
        html: Option<PathBuf>,
    ) -> Self {
        Self {
            pool,
            dashboard,
            view: ViewState::default(),
            ranked: Vec::new(),
            html,
        }
    }

    pub async fn open(&mut self, date: NaiveDate, index: usize) {
        self.dashboard.select_date(&mut self.view, date);
        self.ranked = self.dashboard.rank_schools(date).await;
        self.view.jump_to(index, self.ranked.len());
        if self.view.current_index != index && !self.ranked.is_empty() {
            warn!(index, last = self.ranked.len() - 1, "index past the end of the ranking");
        }
    }

    /// Prints the current school and refreshes the HTML page if requested.
    pub async fn show(&mut self) -> anyhow::Result<()> {
        let Some(date) = self.view.selected_date else {
            println!("Please select a date.");
            return Ok(());
        };
        let Some(school) = self.ranked.get(self.view.current_index).cloned() else {
            println!("No school data found for the selected date.");
            return Ok(());
        };

        let position = self.view.position(self.ranked.len());
        let records = self.dashboard.records(school.school_id, date).await;
        print!(
            "{}",
            report::build_review(date, &position, &school, &records, self.dashboard.images())
        );

        if let Some(out) = &self.html {
            let page =
                report::build_review_html(date, &position, &school, &records, self.dashboard.images());
            std::fs::write(out, page)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Review page written to {}.", out.display());
        }
        Ok(())
    }

    /// Applies one command; returns `false` when the session should end.
    pub async fn apply(&mut self, command: ReviewCommand) -> anyhow::Result<bool> {
        match command {
            ReviewCommand::Next => self.view.next(self.ranked.len()),
            ReviewCommand::Prev => self.view.prev(),
            ReviewCommand::Goto(n) => self.view.jump_to(n - 1, self.ranked.len()),
            ReviewCommand::Date(date) => self.open(date, 0).await,
            ReviewCommand::Add(row) => {
                self.flag(row, true).await;
                return Ok(true);
            }
            ReviewCommand::Remove(row) => {
                self.flag(row, false).await;
                return Ok(true);
            }
            ReviewCommand::Reload => {
                if let (Some(date), Some(school)) =
                    (self.view.selected_date, self.ranked.get(self.view.current_index))
                {
                    self.dashboard.forget(school.school_id, date);
                }
            }
            ReviewCommand::Quit => return Ok(false),
        }
        self.show().await?;
        Ok(true)
    }

    async fn flag(&mut self, row: usize, add: bool) {
        let (Some(date), Some(school)) = (
            self.view.selected_date,
            self.ranked.get(self.view.current_index).cloned(),
        ) else {
            println!("Nothing selected.");
            return;
        };
        let records = self.dashboard.records(school.school_id, date).await;
        let Some(record) = records.get(row - 1) else {
            println!("No record {row} for this school.");
            return;
        };

        if add {
            let check = misreport::check(record);
            match db::append_suspect(&self.pool, record, &check.issues_text()).await {
                Ok(()) => println!("Record added to suspect list successfully!"),
                Err(err) => error!("error adding record to suspect list: {err}"),
            }
        } else {
            match db::remove_suspect(&self.pool, school.school_id, record.timestamp).await {
                Ok(_) => println!("Record removed from suspect list successfully!"),
                Err(err) => error!("error removing record from suspect list: {err}"),
            }
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.show().await?;
        println!("{HELP}");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_command(&line) {
                Ok(command) => {
                    if !self.apply(command).await? {
                        break;
                    }
                }
                Err(message) => println!("{message}\n{HELP}"),
            }
        }
        Ok(())
    }
}
