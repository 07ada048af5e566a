use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use dotenvy::dotenv;
use tracing::info;

use service::api::{ApiClient, RecordPatch};
use service::feed::{FeedEvent, LiveFeed};
use service::records::{self, RecordFilter};
use service::session::SessionStore;
use service::storage::FileStorage;

const USAGE: &str = "usage: console <command>
  login <username> <password>
  logout
  whoami
  records [search] [YYYY-MM-DD]
  today
  export <path>
  delete <id>
  rename <id> <name>
  stats
  trends [days]
  feed";

struct App {
    client: Arc<ApiClient>,
    session: SessionStore<ApiClient>,
    config: configs::AppConfig,
}

impl App {
    async fn start() -> anyhow::Result<Self> {
        let config = configs::AppConfig::load_and_validate().context("loading configuration")?;
        common::utils::logging::init_logging(&config.logging.format);
        info!(base_url = %config.api.base_url, storage = %config.storage.path, "console starting");

        common::env::check_storage_path(&config.storage.path).await?;
        let storage = FileStorage::open(&config.storage.path).await?;
        let client = Arc::new(ApiClient::new(&config.api, storage.clone()).await?);
        let session = SessionStore::restore(Arc::clone(&client), storage).await;
        Ok(Self { client, session, config })
    }

    async fn require_login(&self) -> anyhow::Result<()> {
        if !self.session.is_authenticated().await {
            bail!("not logged in; run `console login <username> <password>` first");
        }
        Ok(())
    }
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(idx).map(String::as_str).ok_or_else(|| anyhow!("missing <{name}>\n{USAGE}"))
}

fn parse_id(raw: &str) -> anyhow::Result<i64> {
    raw.parse::<i64>().with_context(|| format!("invalid record id: {raw}"))
}

fn print_records(list: &[service::api::AttendanceRecord]) {
    for r in list {
        println!("{:>6}  {}  {}", r.id, r.timestamp.format("%Y-%m-%d %H:%M:%S"), r.name);
    }
    println!("{} record(s)", list.len());
}

async fn run(args: &[String]) -> anyhow::Result<()> {
    let Some(command) = args.first().map(String::as_str) else {
        bail!("{USAGE}");
    };
    let app = App::start().await?;

    match command {
        "login" => {
            let username = arg(args, 1, "username")?;
            let password = arg(args, 2, "password")?;
            let teacher = app.session.try_login(username, password).await?;
            println!("logged in as {} ({})", teacher.name, teacher.username);
        }
        "logout" => {
            app.session.logout().await;
            println!("logged out");
        }
        "whoami" => match app.session.teacher().await {
            Some(t) => println!("{} ({}, id {})", t.name, t.username, t.id),
            None => println!("not logged in"),
        },
        "records" => {
            app.require_login().await?;
            let mut filter = RecordFilter::new();
            if let Some(search) = args.get(1) {
                filter = filter.with_search(search.clone());
            }
            if let Some(date) = args.get(2) {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").with_context(|| format!("invalid date: {date}"))?;
                filter = filter.on_date(date);
            }
            let all = app.client.fetch_attendance_records().await?;
            print_records(&filter.apply(&all));
        }
        "today" => {
            app.require_login().await?;
            let mut today = app.client.fetch_today_attendance().await?;
            records::sort_newest_first(&mut today);
            let summary = records::summarize(&today);
            print_records(&today);
            println!("present today: {} distinct student(s)", summary.unique_students);
            if let Some(latest) = records::latest(&today) {
                println!("latest recognition: {} at {}", latest.name, latest.timestamp.format("%H:%M:%S"));
            }
        }
        "export" => {
            app.require_login().await?;
            let default_name = records::export_file_name(chrono::Local::now().date_naive());
            let path = args.get(1).cloned().unwrap_or(default_name);
            let mut all = app.client.fetch_attendance_records().await?;
            records::sort_newest_first(&mut all);
            let csv = records::export_csv(&all)?;
            tokio::fs::write(&path, csv).await.with_context(|| format!("writing {path}"))?;
            println!("exported {} record(s) to {path}", all.len());
        }
        "delete" => {
            app.require_login().await?;
            let id = parse_id(arg(args, 1, "id")?)?;
            app.client.delete_attendance_record(id).await?;
            println!("deleted record {id}");
        }
        "rename" => {
            app.require_login().await?;
            let id = parse_id(arg(args, 1, "id")?)?;
            let name = arg(args, 2, "name")?;
            let updated = app.client.update_attendance_record(id, &RecordPatch::name(name)).await?;
            println!("record {} is now {}", updated.id, updated.name);
        }
        "stats" => {
            app.require_login().await?;
            let stats = app.client.fetch_attendance_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        "trends" => {
            app.require_login().await?;
            let days = match args.get(1) {
                Some(raw) => Some(
                    raw.parse::<NonZeroU32>()
                        .with_context(|| format!("days must be a positive integer, got {raw}"))?,
                ),
                None => None,
            };
            let trends = app.client.fetch_attendance_trends(days).await?;
            println!("{}", serde_json::to_string_pretty(&trends)?);
        }
        "feed" => {
            app.require_login().await?;
            let interval = app.config.feed.poll_interval();
            let mut feed = LiveFeed::new(Arc::clone(&app.client), interval).spawn();
            println!("watching check-ins every {}s (ctrl-c to stop)", interval.as_secs());
            loop {
                tokio::select! {
                    event = feed.recv() => match event {
                        Some(FeedEvent::CheckIn(r)) => println!("{}  {}", r.timestamp.format("%H:%M:%S"), r.name),
                        Some(FeedEvent::Error(e)) => eprintln!("poll failed: {e}"),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            feed.stop();
        }
        other => bail!("unknown command `{other}`\n{USAGE}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // 提前加载 .env，使得 RUST_LOG / API_BASE_URL 等环境变量生效
    dotenv().ok();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
