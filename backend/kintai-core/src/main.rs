// src/main.rs

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kintai_core::attendance::{
    AttendanceService, BatchRequest, ClockInRequest, ClockOutRequest, ClockOutcome, HalfDayInput,
    InputProvider, StatusLevel, StatusSink,
};
use kintai_core::clock::{Clock, SystemClock};
use kintai_core::config::{AppConfig, EnvOverrides};
use kintai_core::error::{AttendanceError, NotFoundCause};
use kintai_core::holidays::get_holidays;
use kintai_core::notification::{ClockOutInfo, TeamsWebhookNotifier};
use kintai_core::shift_catalog::WorkMode;
use kintai_core::time_utils::{format_date_jp, ClockTime};
use kintai_core::workbook::{TimesheetStore, XlsxTimesheetStore};

// --- Command Line ---

#[derive(Parser)]
#[command(name = "kintai")]
#[command(version)]
#[command(about = "出退勤を月次のExcelタイムシートに記録します", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Copy)]
struct ModeArgs {
    /// リモート勤務
    #[arg(long, conflicts_with = "office")]
    remote: bool,

    /// 出社 (既定)
    #[arg(long)]
    office: bool,
}

impl ModeArgs {
    fn work_mode(&self) -> WorkMode {
        if self.remote {
            WorkMode::Remote
        } else {
            WorkMode::Office
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// 出勤を記録します
    ClockIn {
        #[arg(long)]
        shift: String,
        #[command(flatten)]
        mode: ModeArgs,
        /// 対象日 (既定: 今日)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// 予定どおりの開始・終了時刻を記入する
        #[arg(long)]
        assumed: bool,
        /// Teamsに投稿しない
        #[arg(long)]
        no_post: bool,
    },

    /// 退勤を記録します
    ClockOut {
        #[arg(long)]
        shift: String,
        #[command(flatten)]
        mode: ModeArgs,
        /// 日付をまたいで前日のシフトを退勤する
        #[arg(long)]
        cross_midnight: bool,
        #[arg(long)]
        no_post: bool,
        #[arg(long)]
        next_workday: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        next_shift: String,
        #[arg(long)]
        next_mode: Option<WorkMode>,
        /// 管理職名、または @All管理職
        #[arg(long, default_value = "")]
        mention: String,
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// 複数日に同じシフトを記入します
    Batch {
        #[arg(long)]
        shift: String,
        #[command(flatten)]
        mode: ModeArgs,
        #[arg(required = true)]
        dates: Vec<NaiveDate>,
    },

    /// 指定月の祝日を表示します
    Holidays {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },

    /// 対象日のタイムシートのパスを表示します
    Locate {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

// --- Terminal Interaction ---

fn prompt(label: &str) -> Option<String> {
    eprint!("{}", label);
    io::stderr().flush().ok();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Empty input cancels.
fn prompt_required(label: &str) -> Option<String> {
    prompt(label).filter(|s| !s.is_empty())
}

fn prompt_time(label: &str) -> Option<ClockTime> {
    loop {
        let raw = prompt_required(label)?;
        match raw.parse::<ClockTime>() {
            Ok(time) => return Some(time),
            Err(e) => eprintln!("{}", e),
        }
    }
}

struct TerminalInput;

impl InputProvider for TerminalInput {
    fn late_reason(&self) -> Option<String> {
        prompt_required("遅刻理由を入力してください: ")
    }

    fn half_day(&self) -> Option<HalfDayInput> {
        let start = prompt_time("開始時刻 (HH:MM): ")?;
        let end = prompt_time("終了時刻 (HH:MM): ")?;
        let remark = prompt("備考 (任意): ")?;
        Some(HalfDayInput { start, end, remark })
    }

    fn remark(&self, label: &str) -> Option<String> {
        prompt_required(&format!("{} ", label))
    }
}

struct TerminalStatus;

impl StatusSink for TerminalStatus {
    fn report(&self, message: &str, level: StatusLevel) {
        let tag = match level {
            StatusLevel::Info => "情報",
            StatusLevel::Warning => "警告",
            StatusLevel::Error => "エラー",
        };
        eprintln!("[{}] {}", tag, message);
    }
}

/// Operator-facing text for a hard failure.
fn describe(err: &AttendanceError) -> String {
    match err {
        AttendanceError::TimesheetNotFound { cause: NotFoundCause::FolderUnset, .. } => {
            "タイムシートのフォルダが設定されていません。settings.json を確認してください。"
                .to_string()
        }
        AttendanceError::TimesheetNotFound { cause: NotFoundCause::NameUnset, .. } => {
            "表示名が設定されていません。settings.json を確認してください。".to_string()
        }
        AttendanceError::TimesheetNotFound { folder, year, month, .. } => format!(
            "{}年{}月のタイムシートが見つかりません。\nフォルダ: {}\nファイル名: {}",
            year,
            month,
            folder,
            err.expected_file_pattern().unwrap_or_default()
        ),
        AttendanceError::TimesheetLocked { .. } => {
            format!("{}\nExcelを閉じてから再実行してください。", err)
        }
        other => other.to_string(),
    }
}

fn finish(result: Result<ClockOutcome, AttendanceError>, done: &str) -> ExitCode {
    match result {
        Ok(ClockOutcome::Recorded { warning }) => {
            println!("{}", done);
            if let Some(warning) = warning {
                println!("{}", warning);
            }
            ExitCode::SUCCESS
        }
        Ok(ClockOutcome::Cancelled) => ExitCode::SUCCESS,
        Ok(ClockOutcome::Failed) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", describe(&e));
            ExitCode::FAILURE
        }
    }
}

// --- Startup ---

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let env = EnvOverrides::from_env().context("Failed to read KINTAI_* environment")?;
    init_tracing(env.log_file.as_deref())?;

    let settings_path = env.settings_path();
    let config = AppConfig::load(&settings_path);
    debug!("Settings loaded from {:?}", settings_path);
    let clock = SystemClock::with_override(env.effective_test_date(&config));

    let notifier = TeamsWebhookNotifier::new().context("Failed to build HTTP client")?;
    let service = AttendanceService::new(config, XlsxTimesheetStore::new(), notifier, clock);
    let today = service.clock().today();

    let code = match cli.command {
        Command::ClockIn {
            shift,
            mode,
            date,
            assumed,
            no_post,
        } => {
            let request = ClockInRequest {
                shift,
                work_mode: mode.work_mode(),
                date: date.unwrap_or(today),
                assumed,
                no_post,
            };
            let result = service
                .clock_in(&request, &TerminalInput, &TerminalStatus)
                .await;
            finish(
                result,
                &format!("{} {} 出勤を記録しました", format_date_jp(request.date), request.shift),
            )
        }

        Command::ClockOut {
            shift,
            mode,
            cross_midnight,
            no_post,
            next_workday,
            next_shift,
            next_mode,
            mention,
            comment,
        } => {
            let request = ClockOutRequest {
                shift,
                work_mode: mode.work_mode(),
                no_post,
                cross_midnight,
                info: ClockOutInfo {
                    next_workday,
                    next_shift,
                    next_work_mode: next_mode,
                    mention,
                    comment,
                },
            };
            let result = service.clock_out(&request, &TerminalStatus).await;
            finish(result, &format!("{} 退勤を記録しました", request.shift))
        }

        Command::Batch { shift, mode, dates } => {
            let request = BatchRequest {
                dates,
                shift,
                work_mode: mode.work_mode(),
            };
            match service.batch_write(&request, &TerminalInput, &TerminalStatus) {
                Ok(summary) => {
                    println!(
                        "一括登録が完了しました: 成功 {} 件 / 失敗 {} 件",
                        summary.succeeded, summary.failed
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", describe(&e));
                    ExitCode::FAILURE
                }
            }
        }

        Command::Holidays { year, month } => {
            let holidays = get_holidays(year, month);
            if holidays.is_empty() {
                println!("{}年{}月に祝日はありません", year, month);
            }
            for day in holidays {
                println!("{}", format_date_jp(day));
            }
            ExitCode::SUCCESS
        }

        Command::Locate { date } => {
            let date = date.unwrap_or(today);
            match XlsxTimesheetStore::new().locate(service.config(), date) {
                Ok(path) => {
                    println!("{}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", describe(&e));
                    ExitCode::FAILURE
                }
            }
        }
    };

    info!("kintai finished");
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("エラー: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
